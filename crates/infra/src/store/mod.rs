//! Append-only time-series stores consumed by the engine.
//!
//! Two series are kept: stock snapshots keyed by (location, product) and price
//! versions keyed by location. Neither supports update or delete. Each store
//! assigns a strictly increasing `sequence` on append; that sequence is the
//! tie-break for records sharing a timestamp or effective date.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use palletflow_core::{LocationId, ProductId};
use palletflow_ledger::{DateRange, NewPriceVersion, NewStockSnapshot, PriceVersion, StockSnapshot};

use crate::error::StoreError;

pub mod in_memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use in_memory::{InMemoryPriceStore, InMemorySnapshotStore};
#[cfg(feature = "postgres")]
pub use postgres::{apply_schema, PostgresPriceStore, PostgresSnapshotStore};

/// Stock snapshot log.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Append a validated snapshot and return it with its assigned sequence.
    async fn append(&self, snapshot: NewStockSnapshot) -> Result<StockSnapshot, StoreError>;

    /// Greatest snapshot of the key recorded at or before `at`.
    async fn latest_as_of(
        &self,
        location_id: LocationId,
        product_id: ProductId,
        at: DateTime<Utc>,
    ) -> Result<Option<StockSnapshot>, StoreError>;

    /// Exactly one latest snapshot per product of the location at or before
    /// `at`, ordered by product id.
    async fn latest_per_product(
        &self,
        location_id: LocationId,
        at: DateTime<Utc>,
    ) -> Result<Vec<StockSnapshot>, StoreError>;

    /// Snapshots a report over `[from, until)` reads: per product the latest
    /// snapshot recorded before `from`, plus every snapshot with
    /// `from <= recorded_at < until`. Ordered by `(recorded_at, sequence)`.
    async fn report_window(
        &self,
        location_id: LocationId,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<StockSnapshot>, StoreError>;
}

/// Price version log.
#[async_trait]
pub trait PriceStore: Send + Sync {
    async fn append(&self, version: NewPriceVersion) -> Result<PriceVersion, StoreError>;

    /// Version in effect on `date`.
    async fn effective_at(
        &self,
        location_id: LocationId,
        date: NaiveDate,
    ) -> Result<Option<PriceVersion>, StoreError>;

    /// Version in effect at the range start plus every version starting inside
    /// the range, ordered by `(valid_from, sequence)`.
    async fn changes_within(
        &self,
        location_id: LocationId,
        range: DateRange,
    ) -> Result<Vec<PriceVersion>, StoreError>;
}
