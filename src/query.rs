//! Pure query functions over an in-memory snapshot of the collection.
//! Nothing here mutates the slice it is given.

use std::cmp::Ordering;
use icu_collator::{Collator, CollatorOptions};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::model::{Movie, MAX_RATING};

/// Conjunctive predicate set. `None` fields impose no constraint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieFilter {
    /// Case-insensitive substring of `genre`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    /// Inclusive lower bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_rating: Option<f64>,
}

impl MovieFilter {
    pub fn is_empty(&self) -> bool {
        self.genre.is_none() && self.year.is_none() && self.min_rating.is_none()
    }

    pub fn matches(&self, movie: &Movie) -> bool {
        if let Some(genre) = &self.genre {
            if !contains_ignore_case(&movie.genre, genre) {
                return false;
            }
        }
        if let Some(year) = self.year {
            if movie.year != year {
                return false;
            }
        }
        if let Some(min) = self.min_rating {
            if movie.rating < min {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// Newest first
    Year,
    /// Highest first
    Rating,
    /// Alphabetical
    Title,
}

impl SortKey {
    /// Unknown keys yield `None`, which sorts as a no-op.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "year" => Some(SortKey::Year),
            "rating" => Some(SortKey::Rating),
            "title" => Some(SortKey::Title),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Year => "year",
            SortKey::Rating => "rating",
            SortKey::Title => "title",
        }
    }

    fn compare(&self, a: &Movie, b: &Movie, collator: Option<&Collator>) -> Ordering {
        match self {
            SortKey::Year => b.year.cmp(&a.year),
            SortKey::Rating => OrderedFloat(b.rating).cmp(&OrderedFloat(a.rating)),
            SortKey::Title => compare_titles(collator, &a.title, &b.title),
        }
    }
}

pub fn filter(movies: &[Movie], criteria: &MovieFilter) -> Vec<Movie> {
    movies.iter().filter(|m| criteria.matches(m)).cloned().collect()
}

pub fn sort(mut movies: Vec<Movie>, key: Option<SortKey>) -> Vec<Movie> {
    if let Some(key) = key {
        let collator = if key == SortKey::Title { title_collator() } else { None };
        movies.sort_by(|a, b| key.compare(a, b, collator.as_ref()));
    }
    movies
}

/// Case-insensitive substring match on `title`. An empty term matches all.
pub fn search_by_title(movies: &[Movie], term: &str) -> Vec<Movie> {
    movies
    .iter()
    .filter(|m| contains_ignore_case(&m.title, term))
    .cloned()
    .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingStats {
    #[serde(rename = "totalMovies")]
    pub total_count: usize,
    /// Rounded to 2 decimals
    pub average_rating: f64,
    pub max_rating: f64,
    pub min_rating: f64,
    #[serde(rename = "ratingDistribution")]
    pub distribution: RatingDistribution,
}

/// Half-open buckets `[0,2) [2,4) [4,6) [6,8)` plus the closed `[8,10]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RatingDistribution {
    #[serde(rename = "0-2")]
    pub zero_to_two: usize,
    #[serde(rename = "2-4")]
    pub two_to_four: usize,
    #[serde(rename = "4-6")]
    pub four_to_six: usize,
    #[serde(rename = "6-8")]
    pub six_to_eight: usize,
    #[serde(rename = "8-10")]
    pub eight_to_ten: usize,
}

impl RatingDistribution {
    fn record(&mut self, rating: f64) {
        // Out-of-range ratings (only possible in a hand-edited store) land nowhere
        let bucket = match rating {
            r if (0.0..2.0).contains(&r) => &mut self.zero_to_two,
            r if (2.0..4.0).contains(&r) => &mut self.two_to_four,
            r if (4.0..6.0).contains(&r) => &mut self.four_to_six,
            r if (6.0..8.0).contains(&r) => &mut self.six_to_eight,
            r if (8.0..=MAX_RATING).contains(&r) => &mut self.eight_to_ten,
            _ => return,
        };
        *bucket += 1;
    }
}

/// `None` for an empty collection: average/min/max are undefined there.
pub fn rating_stats(movies: &[Movie]) -> Option<RatingStats> {
    let max = movies.iter().map(|m| OrderedFloat(m.rating)).max()?;
    let min = movies.iter().map(|m| OrderedFloat(m.rating)).min()?;

    let total: f64 = movies.iter().map(|m| m.rating).sum();
    let average = total / movies.len() as f64;

    let mut distribution = RatingDistribution::default();
    for movie in movies {
        distribution.record(movie.rating);
    }

    Some(RatingStats {
        total_count: movies.len(),
        average_rating: round_to_cents(average),
        max_rating: max.into_inner(),
        min_rating: min.into_inner(),
        distribution,
    })
}

fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    needle.is_empty() || haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Root (`und`) Unicode collation at tertiary strength: accents and case
/// only break ties between otherwise equal titles, lowercase first.
fn title_collator() -> Option<Collator> {
    match Collator::try_new(&Default::default(), CollatorOptions::new()) {
        Ok(collator) => Some(collator),
        Err(e) => {
            warn!(error = ?e, "title collator unavailable, sorting by folded code points");
            None
        }
    }
}

fn compare_titles(collator: Option<&Collator>, a: &str, b: &str) -> Ordering {
    let order = match collator {
        Some(collator) => collator.compare(a, b),
        None => a.to_lowercase().cmp(&b.to_lowercase()),
    };
    order.then_with(|| b.cmp(a))
}
