use std::{sync::Arc, time::Instant};

use axum::{
    extract::{Multipart, State},
    http::HeaderMap,
    response::Html,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    auth::verify_token,
    db::FeedbackValue,
    error::AppError,
    predictor::IMAGE_SIZE,
    state::AppState,
};

#[derive(Serialize)]
pub struct Probabilities {
    pub cat: f64,
    pub dog: f64,
}

#[derive(Serialize)]
pub struct PredictResponse {
    pub filename: String,
    pub prediction: String,
    pub confidence: String,
    pub probabilities: Probabilities,
    pub feedback_id: i32,
}

pub async fn predict_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<PredictResponse>, AppError> {
    verify_token(&headers, &state.config.api_token)?;

    if !state.predictor.is_loaded() {
        return Err(AppError::ModelUnavailable);
    }

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidUpload(e.to_string()))?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or("upload").to_string();
            let content_type = field.content_type().unwrap_or_default().to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::InvalidUpload(e.to_string()))?;

            upload = Some((filename, content_type, bytes));
            break;
        }
    }

    let Some((filename, content_type, bytes)) = upload else {
        return Err(AppError::InvalidUpload("missing file field".into()));
    };

    if !content_type.starts_with("image/") {
        return Err(AppError::InvalidUpload(format!(
            "unsupported content type: {content_type}"
        )));
    }

    let started = Instant::now();
    let prediction = state.predictor.predict(&bytes)?;
    let inference_time = started.elapsed().as_secs_f64();

    let feedback = state
        .store
        .create_initial_feedback(prediction.prob_cat as f64, prediction.prob_dog as f64)
        .await?;

    // The prediction and feedback row are already committed at this point,
    // so a failed monitoring insert only loses the timing sample.
    if let Err(e) = state
        .store
        .insert_monitoring(inference_time, true, feedback.id)
        .await
    {
        warn!("Failed to record monitoring row for feedback {}: {e}", feedback.id);
    }

    info!(
        "Classified {filename} as {} ({:.2}s), feedback id {}",
        prediction.label, inference_time, feedback.id
    );

    Ok(Json(PredictResponse {
        filename,
        prediction: prediction.label.to_string(),
        confidence: format!("{:.2}%", prediction.confidence * 100.0),
        probabilities: Probabilities {
            cat: prediction.prob_cat as f64,
            dog: prediction.prob_dog as f64,
        },
        feedback_id: feedback.id,
    }))
}

#[derive(Deserialize)]
pub struct FeedbackRequest {
    pub feedback_id: Option<i32>,
    pub feedback_value: Option<i32>,
}

#[derive(Serialize)]
pub struct FeedbackResponse {
    pub status: &'static str,
}

pub async fn feedback_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<FeedbackRequest>,
) -> Result<Json<FeedbackResponse>, AppError> {
    let (Some(feedback_id), Some(raw_value)) = (payload.feedback_id, payload.feedback_value)
    else {
        return Err(AppError::InvalidFeedback);
    };

    let value = FeedbackValue::from_raw(raw_value).ok_or(AppError::InvalidFeedback)?;

    match state.store.update_feedback(feedback_id, value).await? {
        Some(_) => Ok(Json(FeedbackResponse { status: "success" })),
        None => Err(AppError::FeedbackNotFound),
    }
}

#[derive(Serialize)]
pub struct ApiInfo {
    pub model_loaded: bool,
    pub model_path: String,
    pub version: &'static str,
    pub parameters: usize,
}

pub async fn api_info_handler(State(state): State<Arc<AppState>>) -> Json<ApiInfo> {
    Json(ApiInfo {
        model_loaded: state.predictor.is_loaded(),
        model_path: state.predictor.model_path().display().to_string(),
        version: env!("CARGO_PKG_VERSION"),
        parameters: state.predictor.parameter_count(),
    })
}

#[derive(Serialize)]
pub struct Health {
    pub status: &'static str,
    pub model_loaded: bool,
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Health> {
    Json(Health {
        status: "healthy",
        model_loaded: state.predictor.is_loaded(),
    })
}

pub async fn welcome_page(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html><html><head><title>Cats vs Dogs</title></head>\
         <body><h1>Cats vs Dogs Classifier</h1>\
         <p>Model loaded: {}</p>\
         <p><a href=\"/inference\">Try it</a> &middot; <a href=\"/info\">Model info</a></p>\
         </body></html>",
        state.predictor.is_loaded()
    ))
}

pub async fn info_page(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html><html><head><title>Model info</title></head>\
         <body><h1>Cats vs Dogs Classifier</h1>\
         <ul>\
         <li>Version: {}</li>\
         <li>Classes: Cat, Dog</li>\
         <li>Input size: {size}x{size}</li>\
         <li>Parameters: {}</li>\
         <li>Model loaded: {}</li>\
         </ul></body></html>",
        env!("CARGO_PKG_VERSION"),
        state.predictor.parameter_count(),
        state.predictor.is_loaded(),
        size = IMAGE_SIZE,
    ))
}

pub async fn inference_page(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html><html><head><title>Inference</title></head>\
         <body><h1>Upload an image</h1>\
         <p>Model loaded: {}</p>\
         <form action=\"/api/predict\" method=\"post\" enctype=\"multipart/form-data\">\
         <input type=\"file\" name=\"file\" accept=\"image/*\">\
         <button type=\"submit\">Predict</button>\
         </form></body></html>",
        state.predictor.is_loaded()
    ))
}
