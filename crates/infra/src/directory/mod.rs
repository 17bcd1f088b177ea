//! Locations, products and orders the ledger refers to.
//!
//! Snapshot and price writes only check that their referents exist; orders are
//! read to compute reservations. Registration is exposed for the binaries that
//! own this data (and for tests).

use async_trait::async_trait;

use palletflow_core::{LocationId, ProductId};
use palletflow_ledger::{Location, Order, Product};

use crate::error::StoreError;

pub mod in_memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use in_memory::InMemoryDirectory;
#[cfg(feature = "postgres")]
pub use postgres::PostgresDirectory;

#[async_trait]
pub trait LocationDirectory: Send + Sync {
    async fn location(&self, id: LocationId) -> Result<Option<Location>, StoreError>;

    /// Insert or replace a location.
    async fn register_location(&self, location: Location) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    async fn register_product(&self, product: Product) -> Result<(), StoreError>;
}

#[async_trait]
pub trait OrderDirectory: Send + Sync {
    /// Every order whose status is `Open`, with its lines, ordered by id.
    async fn open_orders(&self) -> Result<Vec<Order>, StoreError>;

    /// Insert an order or replace its status and lines.
    async fn upsert_order(&self, order: Order) -> Result<(), StoreError>;
}
