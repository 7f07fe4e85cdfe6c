//! `ApplicationStore` trait — async interface for application persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DatabaseError;
use crate::intake::model::{ApplicationRecord, NewApplication};

/// Backend-agnostic, append-only application store.
#[async_trait]
pub trait ApplicationStore: Send + Sync {
    /// Create the schema if it does not exist yet.
    async fn init_schema(&self) -> Result<(), DatabaseError>;

    /// Insert one application in its own transaction and return the stored row.
    async fn insert_application(
        &self,
        application: &NewApplication,
        created_at: DateTime<Utc>,
    ) -> Result<ApplicationRecord, DatabaseError>;

    /// Get an application by its surrogate id.
    async fn get_application(&self, id: i64) -> Result<Option<ApplicationRecord>, DatabaseError>;

    /// Most recent applications first, up to `limit`.
    async fn list_applications(&self, limit: usize)
    -> Result<Vec<ApplicationRecord>, DatabaseError>;

    /// Total number of stored applications.
    async fn count_applications(&self) -> Result<u64, DatabaseError>;
}
