use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Earliest year a movie can carry (first surviving motion picture).
pub const MIN_YEAR: i32 = 1888;
pub const MAX_TITLE_CHARS: usize = 100;
pub const MAX_RATING: f64 = 10.0;

/// The atomic unit of the catalog
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    /// System-assigned, never reused after deletion
    pub id: u64,
    pub title: String,
    pub director: String,
    pub year: i32,
    pub genre: String,
    pub rating: f64,
    #[serde(default)]
    pub description: String,

    /// Set once on creation
    #[serde(with = "iso_millis")]
    pub created_at: DateTime<Utc>,

    /// Refreshed on every successful mutation
    #[serde(with = "iso_millis")]
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied by a caller when adding a movie. Identity and timestamps
/// are assigned by the catalog.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NewMovie {
    pub title: String,
    pub director: String,
    pub year: i32,
    pub genre: String,
    pub rating: f64,
    #[serde(default)]
    pub description: String,
}

impl NewMovie {
    pub fn into_movie(self, id: u64, stamp: DateTime<Utc>) -> Movie {
        Movie {
            id,
            title: self.title,
            director: self.director,
            year: self.year,
            genre: self.genre,
            rating: self.rating,
            description: self.description,
            created_at: stamp,
            updated_at: stamp,
        }
    }
}

/// Partial update. Only `Some` fields overwrite the stored record; `id` and
/// `created_at` have no slot here and cannot be changed through a patch.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct MoviePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub director: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl MoviePatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.director.is_none()
            && self.year.is_none()
            && self.genre.is_none()
            && self.rating.is_none()
            && self.description.is_none()
    }

    /// Field-by-field merge onto `movie`. Does not touch timestamps.
    pub fn apply(self, movie: &mut Movie) {
        if let Some(title) = self.title {
            movie.title = title;
        }
        if let Some(director) = self.director {
            movie.director = director;
        }
        if let Some(year) = self.year {
            movie.year = year;
        }
        if let Some(genre) = self.genre {
            movie.genre = genre;
        }
        if let Some(rating) = self.rating {
            movie.rating = rating;
        }
        if let Some(description) = self.description {
            movie.description = description;
        }
    }
}

/// Current wall-clock time at the precision the store persists.
pub fn now_stamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// A stamp strictly after `previous`, so `updated_at` always moves forward
/// even when two mutations land within the same millisecond.
pub fn next_stamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = now_stamp();
    if now > previous {
        now
    } else {
        previous.trunc_subsecs(3) + Duration::milliseconds(1)
    }
}

/// RFC 3339 with millisecond precision and a `Z` suffix.
pub mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(ts: &DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Movie {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        NewMovie {
            title: "Dune".into(),
            director: "Villeneuve".into(),
            year: 2021,
            genre: "Sci-Fi".into(),
            rating: 8.5,
            description: String::new(),
        }
        .into_movie(1, ts)
    }

    #[test]
    fn test_wire_format_uses_camel_case_and_millis() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["createdAt"], "2024-05-01T12:00:00.000Z");
        assert_eq!(json["updatedAt"], "2024-05-01T12:00:00.000Z");
        assert_eq!(json["id"], 1);
        assert!(json.get("created_at").is_none());
    }

    #[test]
    fn test_missing_description_defaults_to_empty() {
        let raw = r#"{"id":3,"title":"Alien","director":"Scott","year":1979,"genre":"Horror",
            "rating":8.4,"createdAt":"2024-01-01T00:00:00.000Z","updatedAt":"2024-01-01T00:00:00.000Z"}"#;
        let movie: Movie = serde_json::from_str(raw).unwrap();
        assert_eq!(movie.description, "");
    }

    #[test]
    fn test_patch_overwrites_only_supplied_fields() {
        let mut movie = sample();
        let patch = MoviePatch { rating: Some(9.0), ..Default::default() };
        patch.apply(&mut movie);
        assert_eq!(movie.rating, 9.0);
        assert_eq!(movie.title, "Dune");
        assert_eq!(movie.id, 1);
    }

    #[test]
    fn test_patch_ignores_identity_fields_in_body() {
        let patch: MoviePatch = serde_json::from_str(r#"{"id": 42, "createdAt": "x", "genre": "Drama"}"#).unwrap();
        assert_eq!(patch.genre.as_deref(), Some("Drama"));
        assert!(patch.title.is_none());
    }

    #[test]
    fn test_next_stamp_is_strictly_later() {
        let far_future = Utc.with_ymd_and_hms(2999, 1, 1, 0, 0, 0).unwrap();
        assert!(next_stamp(far_future) > far_future);

        let past = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();
        assert!(next_stamp(past) > past);
    }
}
