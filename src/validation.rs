//! Request validation for movie bodies. Runs before the catalog sees any
//! input; the catalog trusts what comes out of here.

use chrono::{Datelike, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::model::{MoviePatch, NewMovie, MAX_RATING, MAX_TITLE_CHARS, MIN_YEAR};

#[derive(Debug, Clone, PartialEq, Error)]
#[error("validation failed: {}", .messages.join("; "))]
pub struct ValidationError {
    pub messages: Vec<String>,
}

impl ValidationError {
    pub fn single(message: impl Into<String>) -> Self {
        Self { messages: vec![message.into()] }
    }
}

pub fn max_year() -> i32 {
    Utc::now().year() + 5
}

/// Every field required. Strings come back trimmed; numeric fields may be
/// JSON numbers or numeric strings (form posts send strings).
pub fn validate_new_movie(body: &Value) -> Result<NewMovie, ValidationError> {
    let fields = as_object(body)?;
    let mut check = Checker::default();

    let title = check.required(fields, "title", "Title is required", title_rule);
    let director = check.required(fields, "director", "Director is required", text_rule);
    let year = check.required(fields, "year", "Year is required", year_rule);
    let genre = check.required(fields, "genre", "Genre is required", text_rule);
    let rating = check.required(fields, "rating", "Rating is required", rating_rule);
    let description = check.optional(fields, "description", description_rule);

    match (title, director, year, genre, rating) {
        (Some(title), Some(director), Some(year), Some(genre), Some(rating)) if check.is_clean() => {
            Ok(NewMovie {
                title,
                director,
                year,
                genre,
                rating,
                description: description.unwrap_or_default(),
            })
        }
        _ => Err(check.into_error()),
    }
}

/// Same per-field rules as creation, applied only to the fields present.
/// `null` counts as absent. Identity and timestamp keys are ignored.
pub fn validate_patch(body: &Value) -> Result<MoviePatch, ValidationError> {
    let fields = as_object(body)?;
    let mut check = Checker::default();

    let patch = MoviePatch {
        title: check.present(fields, "title", "Title is required", title_rule),
        director: check.present(fields, "director", "Director is required", text_rule),
        year: check.present(fields, "year", "Year is required", year_rule),
        genre: check.present(fields, "genre", "Genre is required", text_rule),
        rating: check.present(fields, "rating", "Rating is required", rating_rule),
        description: check.optional(fields, "description", description_rule),
    };

    if check.is_clean() {
        Ok(patch)
    } else {
        Err(check.into_error())
    }
}

fn as_object(body: &Value) -> Result<&Map<String, Value>, ValidationError> {
    body.as_object()
    .ok_or_else(|| ValidationError::single("Request body must be a JSON object"))
}

#[derive(Default)]
struct Checker {
    messages: Vec<String>,
}

impl Checker {
    fn is_clean(&self) -> bool {
        self.messages.is_empty()
    }

    fn into_error(self) -> ValidationError {
        ValidationError { messages: self.messages }
    }

    fn apply<T>(&mut self, value: &Value, rule: impl Fn(&Value) -> Result<T, String>) -> Option<T> {
        match rule(value) {
            Ok(v) => Some(v),
            Err(message) => {
                self.messages.push(message);
                None
            }
        }
    }

    /// Missing, `null` and blank strings all count as absent.
    fn required<T>(
        &mut self,
        fields: &Map<String, Value>,
        key: &str,
        missing: &str,
        rule: impl Fn(&Value) -> Result<T, String>,
    ) -> Option<T> {
        match fields.get(key) {
            Some(value) if !is_blank(value) => self.apply(value, rule),
            _ => {
                self.messages.push(missing.to_string());
                None
            }
        }
    }

    /// Absent or `null` is fine; anything else must satisfy `rule`,
    /// including not being blank.
    fn present<T>(
        &mut self,
        fields: &Map<String, Value>,
        key: &str,
        blank: &str,
        rule: impl Fn(&Value) -> Result<T, String>,
    ) -> Option<T> {
        match fields.get(key) {
            None | Some(Value::Null) => None,
            Some(value) if is_blank(value) => {
                self.messages.push(blank.to_string());
                None
            }
            Some(value) => self.apply(value, rule),
        }
    }

    fn optional<T>(
        &mut self,
        fields: &Map<String, Value>,
        key: &str,
        rule: impl Fn(&Value) -> Result<T, String>,
    ) -> Option<T> {
        match fields.get(key) {
            None | Some(Value::Null) => None,
            Some(value) => self.apply(value, rule),
        }
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

// --- FIELD RULES ---

fn text_rule(value: &Value) -> Result<String, String> {
    value
    .as_str()
    .map(|s| s.trim().to_string())
    .ok_or_else(|| "Text fields must be strings".to_string())
}

fn title_rule(value: &Value) -> Result<String, String> {
    let title = text_rule(value).map_err(|_| "Title must be a string".to_string())?;
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(format!("Title must not exceed {} characters", MAX_TITLE_CHARS));
    }
    Ok(title)
}

fn description_rule(value: &Value) -> Result<String, String> {
    text_rule(value).map_err(|_| "Description must be a string".to_string())
}

fn year_rule(value: &Value) -> Result<i32, String> {
    let max = max_year();
    let invalid = || format!("Year must be an integer between {} and {}", MIN_YEAR, max);

    let year = match value {
        Value::Number(n) => n.as_i64().ok_or_else(invalid)?,
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| invalid())?,
        _ => return Err(invalid()),
    };

    if year < i64::from(MIN_YEAR) || year > i64::from(max) {
        return Err(invalid());
    }
    i32::try_from(year).map_err(|_| invalid())
}

fn rating_rule(value: &Value) -> Result<f64, String> {
    let invalid = || format!("Rating must be a number between 0 and {}", MAX_RATING);

    let rating = match value {
        Value::Number(n) => n.as_f64().ok_or_else(invalid)?,
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| invalid())?,
        _ => return Err(invalid()),
    };

    if !rating.is_finite() || !(0.0..=MAX_RATING).contains(&rating) {
        return Err(invalid());
    }
    Ok(rating)
}
