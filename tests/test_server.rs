//! Integration test: Server API endpoints

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::{highly_adaptive_household, trained_bundle};
use riverbank_adapt::inference::{Predictor, SharedPredictor};
use riverbank_adapt::server::{create_router, AppState, ServerConfig, API_KEY_HEADER};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tower::ServiceExt;

const ADMIN_KEY: &str = "test-admin-key";

fn test_state(artifacts_dir: &Path) -> Arc<AppState> {
    state_with_key(artifacts_dir, Some(ADMIN_KEY))
}

fn state_with_key(artifacts_dir: &Path, admin_api_key: Option<&str>) -> Arc<AppState> {
    let bundle = trained_bundle(200, 6);
    bundle.save(artifacts_dir).unwrap();
    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        artifacts_dir: artifacts_dir.to_path_buf(),
        admin_api_key: admin_api_key.map(str::to_string),
    };
    let predictor = SharedPredictor::new(Predictor::load(artifacts_dir).unwrap());
    Arc::new(AppState::new(config, predictor))
}

async fn send(app: axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_reload(body: &Value, key: Option<&str>) -> Request<Body> {
    let mut request = Request::builder()
        .method("POST")
        .uri("/api/model/reload")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(key) = key {
        request = request.header(API_KEY_HEADER, key);
    }
    request.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let tmp = tempfile::tempdir().unwrap();
    let app = create_router(test_state(&tmp.path().join("artifacts")));
    let (status, body) = send(app, get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_model_and_schema_endpoints() {
    let tmp = tempfile::tempdir().unwrap();
    let state = test_state(&tmp.path().join("artifacts"));

    let (status, body) = send(create_router(Arc::clone(&state)), get("/api/model")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["model_name"].is_string());
    assert_eq!(body["target_classes"].as_array().unwrap().len(), 3);

    let (status, body) = send(create_router(state), get("/api/schema")).await;
    assert_eq!(status, StatusCode::OK);
    let features = body["features"].as_array().unwrap();
    assert_eq!(features.len(), 23);
    assert_eq!(features[0]["name"], "Gender");
    assert_eq!(features[0]["type"], "categorical");
    assert_eq!(features[1]["name"], "Age");
    assert_eq!(features[1]["min"], 18.0);
}

#[tokio::test]
async fn test_predict_endpoint() {
    let tmp = tempfile::tempdir().unwrap();
    let app = create_router(test_state(&tmp.path().join("artifacts")));
    let household = Value::Object(highly_adaptive_household());

    let (status, body) = send(app, post_json("/api/predict", &household)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let prediction = &body["prediction"];
    assert!(prediction["label"].is_string());
    assert!(prediction["confidence"].as_f64().unwrap() > 0.0);
    let total: f64 = prediction["probabilities"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["probability"].as_f64().unwrap())
        .sum();
    assert!((total - 1.0).abs() < 1e-6);
    assert!(!prediction["recommendations"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_predict_unknown_category_is_422() {
    let tmp = tempfile::tempdir().unwrap();
    let app = create_router(test_state(&tmp.path().join("artifacts")));
    let mut household = highly_adaptive_household();
    household.insert("Gender".into(), json!("Other"));

    let (status, body) = send(app, post_json("/api/predict", &Value::Object(household))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], true);
    assert_eq!(body["kind"], "unknown_category");
    assert_eq!(body["column"], "Gender");
}

#[tokio::test]
async fn test_predict_missing_field_is_422() {
    let tmp = tempfile::tempdir().unwrap();
    let app = create_router(test_state(&tmp.path().join("artifacts")));
    let mut household = highly_adaptive_household();
    household.remove("Age");

    let (status, body) = send(app, post_json("/api/predict", &Value::Object(household))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "schema_mismatch");
    assert_eq!(body["missing"], json!(["Age"]));
}

#[tokio::test]
async fn test_predict_malformed_json_is_400() {
    let tmp = tempfile::tempdir().unwrap();
    let app = create_router(test_state(&tmp.path().join("artifacts")));
    let request = Request::builder()
        .method("POST")
        .uri("/api/predict")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"Gender\": "))
        .unwrap();

    let (status, body) = send(app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], true);
}

#[tokio::test]
async fn test_reload_endpoint() {
    let tmp = tempfile::tempdir().unwrap();
    let artifacts = tmp.path().join("artifacts");
    let state = test_state(&artifacts);

    let (status, body) = send(create_router(Arc::clone(&state)), post_reload(&json!({}), Some(ADMIN_KEY))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, _) = send(create_router(Arc::clone(&state)), post_reload(&json!({ "path": "." }), Some(ADMIN_KEY))).await;
    assert_eq!(status, StatusCode::OK);

    let missing = artifacts.join("missing");
    let (status, body) = send(
        create_router(Arc::clone(&state)),
        post_reload(&json!({ "path": missing }), Some(ADMIN_KEY)),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["kind"], "artifact_load");

    // The previous bundle keeps serving.
    let household = Value::Object(highly_adaptive_household());
    let (status, _) = send(create_router(state), post_json("/api/predict", &household)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_reload_requires_admin_key() {
    let tmp = tempfile::tempdir().unwrap();
    let state = test_state(&tmp.path().join("artifacts"));
    let before = state.predictor.current();

    let (status, body) = send(create_router(Arc::clone(&state)), post_reload(&json!({}), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "unauthorized");

    let (status, _) = send(create_router(Arc::clone(&state)), post_reload(&json!({}), Some("guess"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(Arc::ptr_eq(&before, &state.predictor.current()));
}

#[tokio::test]
async fn test_reload_disabled_without_configured_key() {
    let tmp = tempfile::tempdir().unwrap();
    let state = state_with_key(&tmp.path().join("artifacts"), None);

    let (status, body) = send(create_router(state), post_reload(&json!({}), Some(ADMIN_KEY))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["kind"], "forbidden");
}

#[tokio::test]
async fn test_reload_rejects_path_outside_artifacts_dir() {
    let tmp = tempfile::tempdir().unwrap();
    let artifacts = tmp.path().join("artifacts");
    let state = test_state(&artifacts);
    let before = state.predictor.current();

    // A complete, valid bundle that merely lives elsewhere.
    let outside = tmp.path().join("elsewhere");
    trained_bundle(150, 4).save(&outside).unwrap();

    for path in [json!(outside), json!(artifacts.join("..").join("elsewhere")), json!("../elsewhere")] {
        let (status, body) = send(
            create_router(Arc::clone(&state)),
            post_reload(&json!({ "path": path }), Some(ADMIN_KEY)),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{path}");
        assert_eq!(body["kind"], "forbidden");
    }
    assert!(Arc::ptr_eq(&before, &state.predictor.current()));
}

#[tokio::test]
async fn test_root_serves_html() {
    let tmp = tempfile::tempdir().unwrap();
    let app = create_router(test_state(&tmp.path().join("artifacts")));
    let response = app.oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let html = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(html.contains("/api/predict"));
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let tmp = tempfile::tempdir().unwrap();
    let app = create_router(test_state(&tmp.path().join("artifacts")));
    let (status, body) = send(app, get("/api/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], true);
}
