//! # Feedback store
//!
//! Owns the two persisted tables:
//!
//! - `feedback` — one row per prediction, created with `feed_back_value = 0`
//!   and later overwritten by the user's rating (1 = positive, 2 = negative).
//! - `monitoring` — one row per inference attempt, keyed to its feedback row
//!   by foreign key.
//!
//! Every operation runs a single statement against the backend, so atomicity
//! and isolation are delegated entirely to the database. A missing row on
//! update is a normal empty result, not an error; only connection or
//! constraint failures surface as `DbErr`.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ConnectOptions, Database, DatabaseConnection, DbErr,
    EntityTrait,
};
use sea_orm_migration::MigratorTrait;

pub mod entities;
pub mod migrations;

use entities::prelude::Feedback;
use entities::{feedback, monitoring};
use migrations::Migrator;

/// A user's verdict on a prediction. `0` (no feedback yet) is not
/// representable here; rows start at 0 and only ever move to 1 or 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackValue {
    Positive = 1,
    Negative = 2,
}

impl FeedbackValue {
    pub fn from_raw(value: i32) -> Option<Self> {
        match value {
            1 => Some(Self::Positive),
            2 => Some(Self::Negative),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct FeedbackStore {
    db: DatabaseConnection,
}

impl FeedbackStore {
    pub async fn connect(database_url: &str) -> Result<Self, DbErr> {
        let opt = ConnectOptions::new(database_url);
        let db = Database::connect(opt).await?;

        Ok(Self { db })
    }

    /// Wraps an existing connection. Lets tests and callers inject their
    /// own backend instead of going through a URL.
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Idempotent: applies any pending migrations.
    pub async fn create_tables(&self) -> Result<(), DbErr> {
        Migrator::up(&self.db, None).await
    }

    /// Idempotent: reverts all applied migrations.
    pub async fn drop_tables(&self) -> Result<(), DbErr> {
        Migrator::down(&self.db, None).await
    }

    /// Inserts a feedback row with no user verdict yet and returns it with
    /// the store-assigned id.
    pub async fn create_initial_feedback(
        &self,
        prob_cat: f64,
        prob_dog: f64,
    ) -> Result<feedback::Model, DbErr> {
        let row = feedback::ActiveModel {
            feed_back_value: Set(0),
            prob_cat: Set(prob_cat),
            prob_dog: Set(prob_dog),
            last_modified: Set(Utc::now()),
            ..Default::default()
        };

        row.insert(&self.db).await
    }

    /// Overwrites the verdict on an existing row, last writer wins.
    /// Returns `Ok(None)` when no row has that id.
    pub async fn update_feedback(
        &self,
        feedback_id: i32,
        value: FeedbackValue,
    ) -> Result<Option<feedback::Model>, DbErr> {
        let Some(existing) = Feedback::find_by_id(feedback_id).one(&self.db).await? else {
            return Ok(None);
        };

        let mut row: feedback::ActiveModel = existing.into();
        row.feed_back_value = Set(value as i32);
        row.last_modified = Set(Utc::now());

        Ok(Some(row.update(&self.db).await?))
    }

    /// Records one inference attempt. Fails if `feedback_id` does not
    /// reference an existing feedback row.
    pub async fn insert_monitoring(
        &self,
        inference_time: f64,
        succes: bool,
        feedback_id: i32,
    ) -> Result<(), DbErr> {
        let row = monitoring::ActiveModel {
            feedback_id: Set(feedback_id),
            timestamp: Set(Utc::now()),
            inference_time: Set(inference_time),
            succes: Set(succes),
            ..Default::default()
        };

        row.insert(&self.db).await.map(|_| ())
    }
}
