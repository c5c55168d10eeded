//! End-to-end tests driving the router in-memory against a SQLite store.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Request, StatusCode,
    },
};
use burn::backend::ndarray::NdArrayDevice;
use http_body_util::BodyExt;
use sea_orm::{ConnectOptions, Database, EntityTrait};
use serde_json::{json, Value};
use tower::ServiceExt;

use catdog::{
    app,
    config::Config,
    db::{entities::prelude::Feedback, FeedbackStore},
    predictor::{CatDogModel, Predictor},
    state::AppState,
};

const TOKEN: &str = "test-token";
const BOUNDARY: &str = "catdog-test-boundary";

fn test_config() -> Config {
    Config {
        port: 0,
        database_url: "sqlite::memory:".to_string(),
        model_path: "models/test".to_string(),
        api_token: TOKEN.to_string(),
    }
}

async fn test_state(predictor: Predictor) -> Arc<AppState> {
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1);

    let db = Database::connect(opt).await.unwrap();
    let store = FeedbackStore::new(db);
    store.create_tables().await.unwrap();

    Arc::new(AppState {
        config: test_config(),
        store,
        predictor,
    })
}

fn loaded_predictor() -> Predictor {
    let device = NdArrayDevice::default();
    Predictor::from_model(CatDogModel::new(&device), "models/test")
}

fn unloaded_predictor() -> Predictor {
    Predictor::load("/nonexistent/model")
}

fn jpeg_bytes() -> Vec<u8> {
    let img = image::RgbImage::from_fn(80, 60, |x, y| {
        image::Rgb([(x * 3) as u8, (y * 4) as u8, 96])
    });
    let mut buf = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, image::ImageOutputFormat::Jpeg(85))
        .unwrap();
    buf.into_inner()
}

fn multipart_body(filename: &str, content_type: &str, payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
             Content-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(payload);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn predict_request(token: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/predict")
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn feedback_request(payload: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/feedback")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn predict_classifies_jpeg_and_returns_feedback_id() {
    let state = test_state(loaded_predictor()).await;

    let body = multipart_body("kitty.jpg", "image/jpeg", &jpeg_bytes());
    let response = app(state.clone())
        .oneshot(predict_request(TOKEN, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["filename"], "kitty.jpg");
    assert!(json["prediction"] == "Cat" || json["prediction"] == "Dog");
    assert!(json["confidence"].as_str().unwrap().ends_with('%'));
    assert!(json["probabilities"]["cat"].as_f64().unwrap() >= 0.0);
    assert!(json["probabilities"]["dog"].as_f64().unwrap() >= 0.0);
    assert!(json["feedback_id"].as_i64().unwrap() >= 1);

    let rows = Feedback::find()
        .all(state.store.connection())
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].feed_back_value, 0);
}

#[tokio::test]
async fn predict_rejects_non_image_upload_without_side_effects() {
    let state = test_state(loaded_predictor()).await;

    let body = multipart_body("notes.txt", "text/plain", b"just some text");
    let response = app(state.clone())
        .oneshot(predict_request(TOKEN, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let rows = Feedback::find()
        .all(state.store.connection())
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn predict_requires_valid_bearer_token() {
    let state = test_state(loaded_predictor()).await;

    let body = multipart_body("kitty.jpg", "image/jpeg", &jpeg_bytes());
    let response = app(state.clone())
        .oneshot(predict_request("wrong-token", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let rows = Feedback::find()
        .all(state.store.connection())
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn predict_returns_503_when_model_is_missing() {
    let state = test_state(unloaded_predictor()).await;

    let body = multipart_body("kitty.jpg", "image/jpeg", &jpeg_bytes());
    let response = app(state)
        .oneshot(predict_request(TOKEN, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn feedback_round_trip_updates_the_stored_row() {
    let state = test_state(loaded_predictor()).await;

    let body = multipart_body("kitty.jpg", "image/jpeg", &jpeg_bytes());
    let response = app(state.clone())
        .oneshot(predict_request(TOKEN, body))
        .await
        .unwrap();
    let feedback_id = json_body(response).await["feedback_id"].as_i64().unwrap();

    let response = app(state.clone())
        .oneshot(feedback_request(
            json!({"feedback_id": feedback_id, "feedback_value": 2}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "success");

    let row = Feedback::find_by_id(feedback_id as i32)
        .one(state.store.connection())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.feed_back_value, 2);
}

#[tokio::test]
async fn feedback_rejects_out_of_range_values_before_any_store_call() {
    let state = test_state(loaded_predictor()).await;

    for value in [0, 3, -1] {
        let response = app(state.clone())
            .oneshot(feedback_request(
                json!({"feedback_id": 1, "feedback_value": value}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    let response = app(state.clone())
        .oneshot(feedback_request(json!({"feedback_value": 1})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn feedback_on_unknown_id_is_not_found() {
    let state = test_state(loaded_predictor()).await;

    let response = app(state)
        .oneshot(feedback_request(
            json!({"feedback_id": 9999, "feedback_value": 1}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_reports_model_state() {
    for (predictor, expected) in [(loaded_predictor(), true), (unloaded_predictor(), false)] {
        let state = test_state(predictor).await;

        let response = app(state)
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["model_loaded"], expected);
    }
}

#[tokio::test]
async fn api_info_reflects_the_predictor() {
    let state = test_state(loaded_predictor()).await;

    let response = app(state)
        .oneshot(
            Request::builder()
                .uri("/api/info")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["model_loaded"], true);
    assert_eq!(json["model_path"], "models/test");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    assert!(json["parameters"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn html_pages_render() {
    let state = test_state(unloaded_predictor()).await;

    for uri in ["/", "/info", "/inference"] {
        let response = app(state.clone())
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("false"));
    }
}
