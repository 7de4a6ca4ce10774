//! Persistence gateway for the news table.
//!
//! The pipeline reads the identities already stored (for duplicate
//! suppression) and writes enriched records back in one batch. The
//! [`supabase`] module implements this over the Supabase REST API.

pub mod supabase;

use crate::error::Result;
use crate::models::{ExistingKeys, PersistableRecord};
use async_trait::async_trait;

#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Cheap round trip proving the store is reachable and the table readable.
    async fn check_ready(&self) -> Result<()>;

    /// Every stored URL and title.
    async fn query_existing_keys(&self) -> Result<ExistingKeys>;

    /// Insert `records` as one batch; returns how many rows were written.
    async fn insert_batch(&self, records: &[PersistableRecord]) -> Result<usize>;
}
