use std::sync::Arc;

use marquee::server::routes;
use marquee::MovieCatalog;
use serde_json::{json, Value};
use tempfile::TempDir;
use warp::http::StatusCode;
use warp::Filter;

fn setup() -> (TempDir, Arc<MovieCatalog>) {
    let dir = TempDir::new().unwrap();
    let catalog = Arc::new(MovieCatalog::open(dir.path().join("movies.json")));
    (dir, catalog)
}

async fn call<F>(api: &F, method: &str, path: &str, body: Option<Value>) -> (StatusCode, Value)
where
    F: Filter + 'static,
    F::Extract: warp::Reply + Send,
{
    let mut request = warp::test::request().method(method).path(path);
    if let Some(body) = body {
        request = request.json(&body);
    }
    let resp = request.reply(api).await;
    let body = serde_json::from_slice(resp.body()).unwrap();
    (resp.status(), body)
}

fn dune() -> Value {
    json!({
        "title": "Dune",
        "director": "Villeneuve",
        "year": 2021,
        "genre": "Sci-Fi",
        "rating": 8.5
    })
}

#[tokio::test]
async fn test_create_returns_201_with_assigned_fields() {
    let (_dir, catalog) = setup();
    let api = routes(catalog);

    let (status, body) = call(&api, "POST", "/api/movies", Some(dune())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Movie added");
    assert_eq!(body["data"]["id"], 1);
    assert_eq!(body["data"]["description"], "");
    assert_eq!(body["data"]["createdAt"], body["data"]["updatedAt"]);
    assert!(body["data"]["createdAt"].as_str().unwrap().ends_with('Z'));
}

#[tokio::test]
async fn test_create_rejects_invalid_fields() {
    let (_dir, catalog) = setup();
    let api = routes(catalog.clone());

    let mut bad = dune();
    bad["title"] = json!("x".repeat(101));
    bad["rating"] = json!(11);
    let (status, body) = call(&api, "POST", "/api/movies", Some(bad)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Validation failed");
    assert_eq!(body["messages"].as_array().unwrap().len(), 2);
    assert_eq!(body["receivedData"]["rating"], 11);

    assert!(catalog.all().unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_json_is_a_bad_request() {
    let (_dir, catalog) = setup();
    let api = routes(catalog);

    let resp = warp::test::request()
        .method("POST")
        .path("/api/movies")
        .header("content-type", "application/json")
        .body("{ \"title\": ")
        .reply(&api)
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(resp.body()).unwrap();
    assert_eq!(body["error"], "Invalid JSON body");
}

#[tokio::test]
async fn test_form_post_creates_movie() {
    let (_dir, catalog) = setup();
    let api = routes(catalog);

    let resp = warp::test::request()
        .method("POST")
        .path("/api/movies")
        .header("content-type", "application/x-www-form-urlencoded")
        .body("title=Dune&director=V&year=2021&genre=Sci-Fi&rating=8.5")
        .reply(&api)
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = serde_json::from_slice(resp.body()).unwrap();
    assert_eq!(body["data"]["id"], 1);
    assert_eq!(body["data"]["year"], 2021);
    assert_eq!(body["data"]["rating"], 8.5);
}

#[tokio::test]
async fn test_unsupported_body_type_is_415() {
    let (_dir, catalog) = setup();
    let api = routes(catalog);
    call(&api, "POST", "/api/movies", Some(dune())).await;

    let resp = warp::test::request()
        .method("PUT")
        .path("/api/movies/1")
        .header("content-type", "text/plain")
        .body("rating=9")
        .reply(&api)
        .await;
    assert_eq!(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let body: Value = serde_json::from_slice(resp.body()).unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Unsupported media type");
}

#[tokio::test]
async fn test_list_filters_and_sorts() {
    let (_dir, catalog) = setup();
    let api = routes(catalog);

    for movie in [
        json!({"title": "Arrival", "director": "Villeneuve", "year": 2016, "genre": "Sci-Fi", "rating": 7.9}),
        json!({"title": "Blade Runner", "director": "Scott", "year": 1982, "genre": "Sci-Fi", "rating": 8.1}),
        json!({"title": "Casablanca", "director": "Curtiz", "year": 1942, "genre": "Drama", "rating": 8.5}),
    ] {
        let (status, _) = call(&api, "POST", "/api/movies", Some(movie)).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = call(&api, "GET", "/api/movies", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);

    let (_, body) = call(&api, "GET", "/api/movies?genre=sci&minRating=8&sortBy=rating", None).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["data"][0]["title"], "Blade Runner");
    assert_eq!(body["filters"]["genre"], "sci");
    assert_eq!(body["filters"]["minRating"], 8.0);

    let (_, body) = call(&api, "GET", "/api/movies?sortBy=year", None).await;
    let years: Vec<i64> = body["data"].as_array().unwrap().iter().map(|m| m["year"].as_i64().unwrap()).collect();
    assert_eq!(years, vec![2016, 1982, 1942]);

    let (status, _) = call(&api, "GET", "/api/movies?year=recent", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_one_and_missing() {
    let (_dir, catalog) = setup();
    let api = routes(catalog);
    call(&api, "POST", "/api/movies", Some(dune())).await;

    let (status, body) = call(&api, "GET", "/api/movies/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "Dune");

    let (status, body) = call(&api, "GET", "/api/movies/42", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Movie not found");
}

#[tokio::test]
async fn test_partial_update() {
    let (_dir, catalog) = setup();
    let api = routes(catalog);
    let (_, created) = call(&api, "POST", "/api/movies", Some(dune())).await;

    let (status, body) = call(&api, "PUT", "/api/movies/1", Some(json!({"rating": 9.0, "id": 77}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Movie updated");
    assert_eq!(body["data"]["id"], 1);
    assert_eq!(body["data"]["rating"], 9.0);
    assert_eq!(body["data"]["title"], "Dune");
    assert_eq!(body["data"]["createdAt"], created["data"]["createdAt"]);
    assert_ne!(body["data"]["updatedAt"], created["data"]["updatedAt"]);

    let (status, _) = call(&api, "PUT", "/api/movies/1", Some(json!({"year": 1700}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&api, "PUT", "/api/movies/5", Some(json!({"rating": 1}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete() {
    let (_dir, catalog) = setup();
    let api = routes(catalog.clone());
    call(&api, "POST", "/api/movies", Some(dune())).await;

    let (status, body) = call(&api, "DELETE", "/api/movies/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Movie deleted");
    assert_eq!(body["data"]["title"], "Dune");

    let (status, _) = call(&api, "DELETE", "/api/movies/1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(catalog.all().unwrap().is_empty());
}

#[tokio::test]
async fn test_search_decodes_and_echoes_term() {
    let (_dir, catalog) = setup();
    let api = routes(catalog);
    call(&api, "POST", "/api/movies", Some(dune())).await;
    call(&api, "POST", "/api/movies", Some(json!({
        "title": "Blade Runner", "director": "Scott", "year": 1982, "genre": "Sci-Fi", "rating": 8.1
    })))
    .await;

    let (status, body) = call(&api, "GET", "/api/movies/search/BLADE%20RUN", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["searchTerm"], "blade run");
    assert_eq!(body["data"][0]["title"], "Blade Runner");
}

#[tokio::test]
async fn test_stats_empty_and_populated() {
    let (_dir, catalog) = setup();
    let api = routes(catalog);

    let (status, body) = call(&api, "GET", "/api/movies/stats/rating", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({}));
    assert_eq!(body["message"], "No movies for statistics");

    for rating in [1.0, 5.0, 10.0] {
        let mut movie = dune();
        movie["rating"] = json!(rating);
        call(&api, "POST", "/api/movies", Some(movie)).await;
    }

    let (_, body) = call(&api, "GET", "/api/movies/stats/rating", None).await;
    let stats = &body["data"];
    assert_eq!(stats["totalMovies"], 3);
    assert_eq!(stats["averageRating"], 5.33);
    assert_eq!(stats["maxRating"], 10.0);
    assert_eq!(stats["minRating"], 1.0);
    assert_eq!(stats["ratingDistribution"]["0-2"], 1);
    assert_eq!(stats["ratingDistribution"]["4-6"], 1);
    assert_eq!(stats["ratingDistribution"]["8-10"], 1);
}

#[tokio::test]
async fn test_unknown_routes_are_404() {
    let (_dir, catalog) = setup();
    let api = routes(catalog);

    let (status, body) = call(&api, "GET", "/api/nothing-here", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Route not found");

    let (status, _) = call(&api, "PATCH", "/api/movies/1", Some(json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_info_and_health() {
    let (_dir, catalog) = setup();
    let api = routes(catalog);

    let (status, body) = call(&api, "GET", "/api", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["endpoints"]["movies"]["create"], "POST /api/movies");

    let (status, body) = call(&api, "GET", "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert!(body["memory"]["residentBytes"].as_u64().unwrap() > 0);
}
