//! Cat/dog inference service.
//!
//! Accepts an image upload, classifies it with a pretrained CNN, persists
//! the prediction as a `feedback` row and lets the client rate it later.
//! JSON API plus a few thin HTML pages.
//!
//! The server is a thin orchestration layer: handlers check the bearer
//! token, validate the upload, call the predictor, write to the store and
//! shape the response. Isolation and locking are the database's job.

use std::{sync::Arc, time::Duration};

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    routing::{get, post},
    Router,
};

use signal::{
    ctrl_c,
    unix::{signal, SignalKind},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod predictor;
pub mod routes;
pub mod state;

use routes::{
    api_info_handler, feedback_handler, health_handler, inference_page, info_page,
    predict_handler, welcome_page,
};
use state::AppState;

/// Builds the router against an explicit state so tests can drive it
/// in-memory without binding a socket.
pub fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/", get(welcome_page))
        .route("/info", get(info_page))
        .route("/inference", get(inference_page))
        .route("/api/predict", post(predict_handler))
        .route("/api/feedback", post(feedback_handler))
        .route("/api/info", get(api_info_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn start_server() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::new().await;

    info!("Starting server...");

    let address = format!("0.0.0.0:{}", state.config.port);
    let app = app(state);

    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await.unwrap();
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    println!("Server shutting down...");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
