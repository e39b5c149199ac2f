use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use percent_encoding::percent_decode_str;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

use crate::catalog::MovieCatalog;
use crate::error::{CatalogError, CatalogResult};
use crate::model::iso_millis;
use crate::query::{MovieFilter, SortKey};
use crate::validation::{validate_new_movie, validate_patch, ValidationError};

// Request bodies larger than this are refused outright
const MAX_BODY_BYTES: u64 = 64 * 1024;

pub struct MovieServer {
    catalog: Arc<MovieCatalog>,
}

impl MovieServer {
    pub fn new(catalog: Arc<MovieCatalog>) -> Self {
        Self { catalog }
    }

    /// Serves until Ctrl-C.
    pub async fn run(&self, addr: SocketAddr) -> Result<(), warp::Error> {
        let (bound, server) = warp::serve(routes(self.catalog.clone()))
        .try_bind_with_graceful_shutdown(addr, async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })?;
        info!("movie API listening on http://{}/api/movies", bound);
        server.await;
        info!("server stopped");
        Ok(())
    }
}

/// Failures a handler can hit, mapped onto HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("worker task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Catalog(e) if e.is_not_found() => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn into_response(self, context: &str, received: Option<&Value>) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Validation(v) => json!({
                "success": false,
                "error": "Validation failed",
                "messages": v.messages,
                "receivedData": received.cloned().unwrap_or(Value::Null),
            }),
            ApiError::Catalog(e) if e.is_not_found() => json!({
                "success": false,
                "error": "Movie not found",
                "message": e.to_string(),
            }),
            other => {
                error!(error = %other, "{}", context);
                json!({
                    "success": false,
                    "error": context,
                    "message": other.to_string(),
                })
            }
        };
        respond(status, body)
    }
}

/// Query string of `GET /api/movies`. Empty values count as absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListParams {
    pub filter: MovieFilter,
    pub sort_by: Option<String>,
}

impl ListParams {
    pub fn from_query(params: &HashMap<String, String>) -> Result<Self, ValidationError> {
        let value = |key: &str| params.get(key).map(String::as_str).filter(|v| !v.trim().is_empty());
        let mut messages = Vec::new();

        let year = value("year").and_then(|raw| match raw.trim().parse::<i32>() {
            Ok(year) => Some(year),
            Err(_) => {
                messages.push(format!("year must be an integer, got '{}'", raw));
                None
            }
        });

        let min_rating = value("minRating").and_then(|raw| match raw.trim().parse::<f64>() {
            Ok(r) if r.is_finite() => Some(r),
            _ => {
                messages.push(format!("minRating must be a number, got '{}'", raw));
                None
            }
        });

        if !messages.is_empty() {
            return Err(ValidationError { messages });
        }

        Ok(Self {
            filter: MovieFilter {
                genre: value("genre").map(str::to_string),
                year,
                min_rating,
            },
            sort_by: value("sortBy").or_else(|| value("sort")).map(str::to_string),
        })
    }

    pub fn sort_key(&self) -> Option<SortKey> {
        let key = self.sort_by.as_deref().and_then(SortKey::parse);
        if key.is_none() {
            if let Some(raw) = &self.sort_by {
                debug!(sort_by = %raw, "ignoring unknown sort key");
            }
        }
        key
    }

    fn echo(&self) -> Value {
        json!({
            "genre": self.filter.genre,
            "year": self.filter.year,
            "minRating": self.filter.min_rating,
            "sortBy": self.sort_by,
        })
    }
}

pub fn routes(catalog: Arc<MovieCatalog>) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let started = Instant::now();
    let movies = warp::path("api").and(warp::path("movies"));

    // 1. GET /api
    let api_info = warp::get()
    .and(warp::path("api"))
    .and(warp::path::end())
    .map(|| warp::reply::json(&api_description()));

    // 2. GET /api/health
    let health = warp::get()
    .and(warp::path!("api" / "health"))
    .map(move || {
        warp::reply::json(&json!({
            "status": "healthy",
            "timestamp": iso_millis::format(&Utc::now()),
            "uptimeSeconds": started.elapsed().as_secs_f64(),
            "memory": { "residentBytes": resident_memory_bytes() },
        }))
    });

    // 3. GET /api/movies?genre&year&minRating&sortBy
    let list = warp::get()
    .and(movies.clone())
    .and(warp::path::end())
    .and(warp::query::<HashMap<String, String>>())
    .and(with_catalog(catalog.clone()))
    .and_then(list_movies);

    // 4. GET /api/movies/search/:title
    let search = warp::get()
    .and(movies.clone())
    .and(warp::path("search"))
    .and(warp::path::param::<String>())
    .and(warp::path::end())
    .and(with_catalog(catalog.clone()))
    .and_then(search_movies);

    // 5. GET /api/movies/stats/rating
    let stats = warp::get()
    .and(movies.clone())
    .and(warp::path("stats"))
    .and(warp::path("rating"))
    .and(warp::path::end())
    .and(with_catalog(catalog.clone()))
    .and_then(rating_stats);

    // 6. GET /api/movies/:id
    let get_one = warp::get()
    .and(movies.clone())
    .and(warp::path::param::<u64>())
    .and(warp::path::end())
    .and(with_catalog(catalog.clone()))
    .and_then(get_movie);

    // 7. POST /api/movies
    let create = warp::post()
    .and(movies.clone())
    .and(warp::path::end())
    .and(movie_body())
    .and(with_catalog(catalog.clone()))
    .and_then(create_movie);

    // 8. PUT /api/movies/:id
    let update = warp::put()
    .and(movies.clone())
    .and(warp::path::param::<u64>())
    .and(warp::path::end())
    .and(movie_body())
    .and(with_catalog(catalog.clone()))
    .and_then(update_movie);

    // 9. DELETE /api/movies/:id
    let delete = warp::delete()
    .and(movies)
    .and(warp::path::param::<u64>())
    .and(warp::path::end())
    .and(with_catalog(catalog))
    .and_then(delete_movie);

    api_info
    .or(health)
    .or(list)
    .or(search)
    .or(stats)
    .or(get_one)
    .or(create)
    .or(update)
    .or(delete)
    .recover(handle_rejection)
    .with(warp::log::custom(log_request))
}

fn with_catalog(catalog: Arc<MovieCatalog>) -> impl Filter<Extract = (Arc<MovieCatalog>,), Error = Infallible> + Clone {
    warp::any().map(move || catalog.clone())
}

/// JSON or url-encoded form. Form fields arrive as strings; validation
/// accepts numeric strings for `year` and `rating`.
fn movie_body() -> impl Filter<Extract = (Value,), Error = Rejection> + Clone {
    let json = warp::body::json::<Value>();
    let form = warp::body::form::<HashMap<String, String>>().map(form_to_value);
    warp::body::content_length_limit(MAX_BODY_BYTES).and(json.or(form).unify())
}

fn form_to_value(fields: HashMap<String, String>) -> Value {
    Value::Object(fields.into_iter().map(|(k, v)| (k, Value::String(v))).collect())
}

/// Catalog calls do blocking file I/O; keep them off the async workers.
async fn blocking<T, F>(catalog: Arc<MovieCatalog>, op: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&MovieCatalog) -> CatalogResult<T> + Send + 'static,
{
    Ok(tokio::task::spawn_blocking(move || op(&catalog)).await??)
}

fn respond(status: StatusCode, body: Value) -> Response {
    warp::reply::with_status(warp::reply::json(&body), status).into_response()
}

// --- READ HANDLERS ---

async fn list_movies(params: HashMap<String, String>, catalog: Arc<MovieCatalog>) -> Result<Response, Infallible> {
    let result: Result<Response, ApiError> = async {
        let params = ListParams::from_query(&params)?;
        let (criteria, sort) = (params.filter.clone(), params.sort_key());
        let movies = blocking(catalog, move |c| c.list(&criteria, sort)).await?;
        Ok(respond(StatusCode::OK, json!({
            "success": true,
            "count": movies.len(),
            "filters": params.echo(),
            "data": movies,
        })))
    }
    .await;
    Ok(result.unwrap_or_else(|e| e.into_response("Failed to fetch movies", None)))
}

async fn get_movie(id: u64, catalog: Arc<MovieCatalog>) -> Result<Response, Infallible> {
    let result = blocking(catalog, move |c| c.find_by_id(id)).await;
    Ok(match result {
        Ok(movie) => respond(StatusCode::OK, json!({ "success": true, "data": movie })),
        Err(e) => e.into_response("Failed to fetch movie", None),
    })
}

async fn search_movies(raw_term: String, catalog: Arc<MovieCatalog>) -> Result<Response, Infallible> {
    let term = percent_decode_str(&raw_term).decode_utf8_lossy().to_lowercase();
    let needle = term.clone();
    let result = blocking(catalog, move |c| c.search(&needle)).await;
    Ok(match result {
        Ok(movies) => respond(StatusCode::OK, json!({
            "success": true,
            "count": movies.len(),
            "searchTerm": term,
            "data": movies,
        })),
        Err(e) => e.into_response("Failed to search movies", None),
    })
}

async fn rating_stats(catalog: Arc<MovieCatalog>) -> Result<Response, Infallible> {
    let result = blocking(catalog, |c| c.rating_stats()).await;
    Ok(match result {
        Ok(Some(stats)) => respond(StatusCode::OK, json!({ "success": true, "data": stats })),
        Ok(None) => respond(StatusCode::OK, json!({
            "success": true,
            "message": "No movies for statistics",
            "data": {},
        })),
        Err(e) => e.into_response("Failed to compute statistics", None),
    })
}

// --- WRITE HANDLERS ---

async fn create_movie(body: Value, catalog: Arc<MovieCatalog>) -> Result<Response, Infallible> {
    let result: Result<Response, ApiError> = async {
        let fields = validate_new_movie(&body)?;
        let movie = blocking(catalog, move |c| c.create(fields)).await?;
        Ok(respond(StatusCode::CREATED, json!({
            "success": true,
            "message": "Movie added",
            "data": movie,
        })))
    }
    .await;
    Ok(result.unwrap_or_else(|e| e.into_response("Failed to add movie", Some(&body))))
}

async fn update_movie(id: u64, body: Value, catalog: Arc<MovieCatalog>) -> Result<Response, Infallible> {
    let result: Result<Response, ApiError> = async {
        let patch = validate_patch(&body)?;
        let movie = blocking(catalog, move |c| c.update(id, patch)).await?;
        Ok(respond(StatusCode::OK, json!({
            "success": true,
            "message": "Movie updated",
            "data": movie,
        })))
    }
    .await;
    Ok(result.unwrap_or_else(|e| e.into_response("Failed to update movie", Some(&body))))
}

async fn delete_movie(id: u64, catalog: Arc<MovieCatalog>) -> Result<Response, Infallible> {
    let result = blocking(catalog, move |c| c.delete(id)).await;
    Ok(match result {
        Ok(movie) => respond(StatusCode::OK, json!({
            "success": true,
            "message": "Movie deleted",
            "data": movie,
        })),
        Err(e) => e.into_response("Failed to delete movie", None),
    })
}

// --- PLUMBING ---

async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        return Ok(respond(StatusCode::BAD_REQUEST, json!({
            "success": false,
            "error": "Invalid JSON body",
            "message": e.to_string(),
        })));
    }

    if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        return Ok(respond(StatusCode::PAYLOAD_TOO_LARGE, json!({
            "success": false,
            "error": "Request body too large",
            "message": format!("limit is {} bytes", MAX_BODY_BYTES),
        })));
    }

    if err.find::<warp::reject::LengthRequired>().is_some() {
        return Ok(respond(StatusCode::LENGTH_REQUIRED, json!({
            "success": false,
            "error": "Content-Length required",
            "message": "Request bodies must declare their length",
        })));
    }

    if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        return Ok(respond(StatusCode::UNSUPPORTED_MEDIA_TYPE, json!({
            "success": false,
            "error": "Unsupported media type",
            "message": "Send application/json or application/x-www-form-urlencoded",
        })));
    }

    // Unknown paths and known paths with the wrong verb both read as "no such route"
    if err.is_not_found() || err.find::<warp::reject::MethodNotAllowed>().is_some() {
        return Ok(respond(StatusCode::NOT_FOUND, json!({
            "success": false,
            "error": "Route not found",
            "message": "The requested path does not exist",
            "timestamp": iso_millis::format(&Utc::now()),
        })));
    }

    error!(rejection = ?err, "unhandled rejection");
    Ok(respond(StatusCode::INTERNAL_SERVER_ERROR, json!({
        "success": false,
        "error": "Internal server error",
        "message": "Something went wrong. Please try again later.",
        "timestamp": iso_millis::format(&Utc::now()),
    })))
}

fn log_request(req: warp::log::Info<'_>) {
    let status = req.status().as_u16();
    let elapsed_ms = req.elapsed().as_secs_f64() * 1000.0;
    if status >= 400 {
        warn!(method = %req.method(), path = req.path(), status, elapsed_ms, "request failed");
    } else {
        info!(method = %req.method(), path = req.path(), status, elapsed_ms, "request served");
    }
}

/// Resident set size of this process; `None` where the platform hides it.
fn resident_memory_bytes() -> Option<u64> {
    let pid = sysinfo::get_current_pid().ok()?;
    let mut system = sysinfo::System::new();
    system.refresh_process(pid);
    system.process(pid).map(|process| process.memory())
}

fn api_description() -> Value {
    json!({
        "api": "Movie Collection API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Manage a collection of movies",
        "endpoints": {
            "movies": {
                "getAll": "GET /api/movies",
                "getOne": "GET /api/movies/:id",
                "create": "POST /api/movies",
                "update": "PUT /api/movies/:id",
                "delete": "DELETE /api/movies/:id",
                "search": "GET /api/movies/search/:title",
                "stats": "GET /api/movies/stats/rating"
            }
        },
        "queryParameters": {
            "genre": "?genre=drama",
            "year": "?year=2020",
            "minRating": "?minRating=7.5",
            "sortBy": "?sortBy=rating"
        }
    })
}
