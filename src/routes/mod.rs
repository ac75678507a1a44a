//! Router assembly: HTTP endpoints, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;

/// Build the application router with:
/// - correction at `/correct` and model status at `/healthz`
/// - read-only cloud library under `/cloud/...`
/// - practice bank and progress under `/bank/...`
/// - deck generation at `/make_deck`
/// - CORS (allow any origin/method/headers) for the mobile client
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(http::http_health))
        .route("/correct", post(http::http_post_correct))
        // Cloud library
        .route("/cloud/decks", get(http::http_cloud_decks))
        .route("/cloud/decks/:deck_id", get(http::http_cloud_deck))
        .route("/cloud/books", get(http::http_cloud_books))
        .route("/cloud/books/:name", get(http::http_cloud_book))
        // Bank + progress
        .route("/bank/items", get(http::http_bank_items))
        .route("/bank/random", get(http::http_bank_random))
        .route("/bank/books", get(http::http_bank_books))
        .route("/bank/import", post(http::http_bank_import))
        .route("/bank/progress/complete", post(http::http_progress_complete))
        .route("/bank/progress", get(http::http_progress))
        // Deck maker
        .route("/make_deck", post(http::http_make_deck))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::AppConfig;
    use crate::state::test_support::{memory_state, test_config};

    fn app_with(config: AppConfig) -> Router {
        build_router(Arc::new(memory_state(config, vec![])))
    }

    async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, body)
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn healthz_without_key() {
        let app = app_with(test_config());
        let (status, body) = call(&app, get_req("/healthz")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "no_key", "provider": "gemini" }));
    }

    #[tokio::test]
    async fn import_then_browse_the_bank() {
        let app = app_with(test_config());
        let text = "ZH: 我昨天去了商店。\n難度: 3\n標籤: daily\nHINTS:\n- 時態: 過去式\n\n題: 你喜歡水果嗎？\nTAGS: food\n";
        let (status, body) = call(&app, post_json("/bank/import", json!({ "text": text }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["imported"], 2);
        assert_eq!(body["errors"], json!([]));

        let (status, items) = call(&app, get_req("/bank/items?tag=daily")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(items.as_array().unwrap().len(), 1);
        assert_eq!(items[0]["zh"], "我昨天去了商店。");
        assert_eq!(items[0]["difficulty"], 3);
        assert_eq!(items[0]["hints"][0]["category"], "morphological");
        assert_eq!(items[0]["completed"], false);

        let (_, books) = call(&app, get_req("/bank/books")).await;
        let names: Vec<&str> = books.as_array().unwrap().iter().filter_map(|b| b["name"].as_str()).collect();
        assert_eq!(names, vec!["daily", "food"]);
        assert_eq!(books[1]["difficultyMin"], 2);

        let (status, pick) = call(&app, get_req("/bank/random?tag=food")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(pick["zh"], "你喜歡水果嗎？");
    }

    #[tokio::test]
    async fn correct_offline_updates_progress() {
        let mut cfg = test_config();
        cfg.force_simple_correct = true;
        let app = app_with(cfg);

        let req = json!({
            "zh": "我買了一些水果",
            "en": "I bought some fruits",
            "bankItemId": "item-7",
            "deviceId": "phone",
        });
        let (status, body) = call(&app, post_json("/correct", req)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["corrected"], "I bought some fruit");
        assert_eq!(body["score"], 95);
        assert_eq!(body["errors"][0]["type"], "pragmatic");
        assert!(body["errors"][0]["id"].as_str().is_some_and(|s| !s.is_empty()));

        let (_, progress) = call(&app, get_req("/bank/progress?deviceId=phone")).await;
        assert_eq!(progress["completedIds"], json!(["item-7"]));
        assert_eq!(progress["records"][0]["attempts"], 1);
        assert_eq!(progress["records"][0]["lastScore"], 95);
    }

    #[tokio::test]
    async fn correct_without_model_is_a_server_error() {
        let app = app_with(test_config());
        let (status, body) = call(&app, post_json("/correct", json!({ "zh": "x", "en": "y" }))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["detail"].is_string());
    }

    #[tokio::test]
    async fn manual_progress_mark() {
        let app = app_with(test_config());
        let (status, body) = call(&app, post_json("/bank/progress/complete", json!({ "itemId": "abc" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["itemId"], "abc");
        assert_eq!(body["completed"], true);

        let (_, progress) = call(&app, get_req("/bank/progress")).await;
        assert_eq!(progress["deviceId"], "default");
        assert_eq!(progress["completedIds"], json!(["abc"]));
    }

    #[tokio::test]
    async fn bad_queries_and_missing_things() {
        let app = app_with(test_config());
        let (status, _) = call(&app, get_req("/bank/items?limit=500")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let (status, _) = call(&app, get_req("/bank/items?difficulty=9")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        for uri in ["/bank/items?offset=-1", "/bank/items?difficulty=-1", "/bank/random?difficulty=-1", "/bank/items?limit=lots"] {
            let (status, body) = call(&app, get_req(uri)).await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{uri}");
            assert!(body["detail"].is_string(), "{uri}");
        }
        let (status, body) = call(&app, get_req("/bank/random")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "no_item");
        let (status, _) = call(&app, get_req("/cloud/decks/missing")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cloud_library() {
        let app = app_with(test_config());
        let (_, decks) = call(&app, get_req("/cloud/decks")).await;
        assert_eq!(decks[0]["id"], "starter-phrases");
        assert_eq!(decks[0]["count"], 3);

        let (status, deck) = call(&app, get_req("/cloud/decks/common-errors")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(deck["cards"].as_array().unwrap().len(), 2);

        let (status, book) = call(&app, get_req("/cloud/books/Daily%20Conversations")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(book["items"][0]["id"], "conv-greet");
    }
}
