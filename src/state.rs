use std::sync::Arc;

use crate::{config::Config, db::FeedbackStore, predictor::Predictor};

/// Everything a request handler needs, built once at startup and passed by
/// reference. There is no ambient global connection or model handle.
pub struct AppState {
    pub config: Config,
    pub store: FeedbackStore,
    pub predictor: Predictor,
}

impl AppState {
    pub async fn new() -> Arc<Self> {
        let config = Config::load();

        let store = FeedbackStore::connect(&config.database_url)
            .await
            .expect("Database misconfigured!");
        store
            .create_tables()
            .await
            .expect("Schema migration failed!");

        let predictor = Predictor::load(&config.model_path);

        Arc::new(Self {
            config,
            store,
            predictor,
        })
    }
}
