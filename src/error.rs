use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::DbErr;
use thiserror::Error;

use crate::predictor::PredictorError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Missing or invalid bearer token")]
    Unauthorized,

    #[error("Invalid image upload: {0}")]
    InvalidUpload(String),

    #[error("Invalid feedback payload")]
    InvalidFeedback,

    #[error("Feedback not found")]
    FeedbackNotFound,

    #[error("Model not available")]
    ModelUnavailable,

    #[error("Storage error: {0}")]
    Storage(#[from] DbErr),

    #[error("Prediction error: {0}")]
    Predictor(#[from] PredictorError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::InvalidUpload { .. } | AppError::InvalidFeedback => StatusCode::BAD_REQUEST,
            AppError::FeedbackNotFound => StatusCode::NOT_FOUND,
            AppError::ModelUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Predictor(e) => match e {
                PredictorError::NotLoaded => StatusCode::SERVICE_UNAVAILABLE,
                PredictorError::InvalidImage(_) => StatusCode::BAD_REQUEST,
                PredictorError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        };

        (status, self.to_string()).into_response()
    }
}
