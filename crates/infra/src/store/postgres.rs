//! Postgres-backed snapshot and price stores.
//!
//! Sequences come from `BIGSERIAL` columns, so ordering across concurrent
//! writers is decided by the database. As-of lookups are single indexed
//! queries (`DISTINCT ON` for one row per product).
//!
//! ## Error Mapping
//!
//! | PostgreSQL code | `StoreError` | Scenario |
//! |-----------------|--------------|----------|
//! | `23514` | `Corrupt` | Check constraint (negative quantity or price) |
//! | `23505`, `23503` | `Backend` | Should not occur for append-only tables |
//! | other / pool / IO | `Backend` | Connectivity and driver failures |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use palletflow_core::{LocationId, ProductId};
use palletflow_ledger::{DateRange, NewPriceVersion, NewStockSnapshot, PriceVersion, StockSnapshot};

use super::{PriceStore, SnapshotStore};
use crate::error::StoreError;

const SCHEMA: &str = include_str!("../../migrations/0001_ledger.sql");

/// Create the ledger tables if they do not exist yet.
pub async fn apply_schema(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| map_sqlx_error("apply_schema", e))?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct PostgresSnapshotStore {
    pool: Arc<PgPool>,
}

impl PostgresSnapshotStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait]
impl SnapshotStore for PostgresSnapshotStore {
    #[instrument(skip(self, snapshot), fields(location_id = %snapshot.location_id, product_id = %snapshot.product_id), err)]
    async fn append(&self, snapshot: NewStockSnapshot) -> Result<StockSnapshot, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO stock_snapshots (location_id, product_id, quantity, recorded_at)
            VALUES ($1, $2, $3, $4)
            RETURNING sequence
            "#,
        )
        .bind(snapshot.location_id.as_uuid())
        .bind(snapshot.product_id.as_uuid())
        .bind(snapshot.quantity)
        .bind(snapshot.recorded_at)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("append_snapshot", e))?;

        let sequence: i64 = row
            .try_get("sequence")
            .map_err(|e| StoreError::Corrupt(format!("missing sequence: {e}")))?;

        Ok(snapshot.with_sequence(sequence as u64))
    }

    #[instrument(skip(self), err)]
    async fn latest_as_of(
        &self,
        location_id: LocationId,
        product_id: ProductId,
        at: DateTime<Utc>,
    ) -> Result<Option<StockSnapshot>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT location_id, product_id, quantity, recorded_at, sequence
            FROM stock_snapshots
            WHERE location_id = $1 AND product_id = $2 AND recorded_at <= $3
            ORDER BY recorded_at DESC, sequence DESC
            LIMIT 1
            "#,
        )
        .bind(location_id.as_uuid())
        .bind(product_id.as_uuid())
        .bind(at)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("latest_as_of", e))?;

        row.map(|r| snapshot_from_row(&r)).transpose()
    }

    #[instrument(skip(self), err)]
    async fn latest_per_product(
        &self,
        location_id: LocationId,
        at: DateTime<Utc>,
    ) -> Result<Vec<StockSnapshot>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT ON (product_id)
                location_id, product_id, quantity, recorded_at, sequence
            FROM stock_snapshots
            WHERE location_id = $1 AND recorded_at <= $2
            ORDER BY product_id, recorded_at DESC, sequence DESC
            "#,
        )
        .bind(location_id.as_uuid())
        .bind(at)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("latest_per_product", e))?;

        rows.iter().map(snapshot_from_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn report_window(
        &self,
        location_id: LocationId,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<StockSnapshot>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT location_id, product_id, quantity, recorded_at, sequence
            FROM (
                (
                    SELECT DISTINCT ON (product_id)
                        location_id, product_id, quantity, recorded_at, sequence
                    FROM stock_snapshots
                    WHERE location_id = $1 AND recorded_at < $2
                    ORDER BY product_id, recorded_at DESC, sequence DESC
                )
                UNION ALL
                (
                    SELECT location_id, product_id, quantity, recorded_at, sequence
                    FROM stock_snapshots
                    WHERE location_id = $1 AND recorded_at >= $2 AND recorded_at < $3
                )
            ) AS report_window
            ORDER BY recorded_at ASC, sequence ASC
            "#,
        )
        .bind(location_id.as_uuid())
        .bind(from)
        .bind(until)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("report_window", e))?;

        rows.iter().map(snapshot_from_row).collect()
    }
}

#[derive(Debug, Clone)]
pub struct PostgresPriceStore {
    pool: Arc<PgPool>,
}

impl PostgresPriceStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait]
impl PriceStore for PostgresPriceStore {
    #[instrument(skip(self, version), fields(location_id = %version.location_id, valid_from = %version.valid_from), err)]
    async fn append(&self, version: NewPriceVersion) -> Result<PriceVersion, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO price_versions (location_id, price, valid_from)
            VALUES ($1, $2, $3)
            RETURNING sequence
            "#,
        )
        .bind(version.location_id.as_uuid())
        .bind(version.price)
        .bind(version.valid_from)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("append_price", e))?;

        let sequence: i64 = row
            .try_get("sequence")
            .map_err(|e| StoreError::Corrupt(format!("missing sequence: {e}")))?;

        Ok(version.with_sequence(sequence as u64))
    }

    #[instrument(skip(self), err)]
    async fn effective_at(
        &self,
        location_id: LocationId,
        date: NaiveDate,
    ) -> Result<Option<PriceVersion>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT location_id, price, valid_from, sequence
            FROM price_versions
            WHERE location_id = $1 AND valid_from <= $2
            ORDER BY valid_from DESC, sequence DESC
            LIMIT 1
            "#,
        )
        .bind(location_id.as_uuid())
        .bind(date)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("effective_at", e))?;

        row.map(|r| price_from_row(&r)).transpose()
    }

    #[instrument(skip(self), err)]
    async fn changes_within(
        &self,
        location_id: LocationId,
        range: DateRange,
    ) -> Result<Vec<PriceVersion>, StoreError> {
        let before = sqlx::query(
            r#"
            SELECT location_id, price, valid_from, sequence
            FROM price_versions
            WHERE location_id = $1 AND valid_from < $2
            ORDER BY valid_from DESC, sequence DESC
            LIMIT 1
            "#,
        )
        .bind(location_id.as_uuid())
        .bind(range.start())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("changes_within", e))?;

        let inside = sqlx::query(
            r#"
            SELECT location_id, price, valid_from, sequence
            FROM price_versions
            WHERE location_id = $1 AND valid_from >= $2 AND valid_from <= $3
            ORDER BY valid_from ASC, sequence ASC
            "#,
        )
        .bind(location_id.as_uuid())
        .bind(range.start())
        .bind(range.end())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("changes_within", e))?;

        let inside = inside
            .iter()
            .map(price_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        // A version starting on the first day already covers it.
        let starts_on_change = inside
            .first()
            .is_some_and(|v| v.valid_from == range.start());

        let mut out = Vec::with_capacity(inside.len() + 1);
        if !starts_on_change {
            if let Some(row) = before {
                out.push(price_from_row(&row)?);
            }
        }
        out.extend(inside);
        Ok(out)
    }
}

// SQLx row types

#[derive(Debug)]
struct SnapshotRow {
    location_id: Uuid,
    product_id: Uuid,
    quantity: i64,
    recorded_at: DateTime<Utc>,
    sequence: i64,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for SnapshotRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(SnapshotRow {
            location_id: row.try_get("location_id")?,
            product_id: row.try_get("product_id")?,
            quantity: row.try_get("quantity")?,
            recorded_at: row.try_get("recorded_at")?,
            sequence: row.try_get("sequence")?,
        })
    }
}

impl From<SnapshotRow> for StockSnapshot {
    fn from(row: SnapshotRow) -> Self {
        StockSnapshot {
            location_id: LocationId::from_uuid(row.location_id),
            product_id: ProductId::from_uuid(row.product_id),
            quantity: row.quantity,
            recorded_at: row.recorded_at,
            sequence: row.sequence as u64,
        }
    }
}

#[derive(Debug)]
struct PriceRow {
    location_id: Uuid,
    price: Decimal,
    valid_from: NaiveDate,
    sequence: i64,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for PriceRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(PriceRow {
            location_id: row.try_get("location_id")?,
            price: row.try_get("price")?,
            valid_from: row.try_get("valid_from")?,
            sequence: row.try_get("sequence")?,
        })
    }
}

impl From<PriceRow> for PriceVersion {
    fn from(row: PriceRow) -> Self {
        PriceVersion {
            location_id: LocationId::from_uuid(row.location_id),
            // NUMERIC(18, 4) pads the scale; strip it back to what was written.
            price: row.price.normalize(),
            valid_from: row.valid_from,
            sequence: row.sequence as u64,
        }
    }
}

fn snapshot_from_row(row: &sqlx::postgres::PgRow) -> Result<StockSnapshot, StoreError> {
    SnapshotRow::from_row(row)
        .map(Into::into)
        .map_err(|e| StoreError::Corrupt(format!("failed to deserialize snapshot row: {e}")))
}

fn price_from_row(row: &sqlx::postgres::PgRow) -> Result<PriceVersion, StoreError> {
    PriceRow::from_row(row)
        .map(Into::into)
        .map_err(|e| StoreError::Corrupt(format!("failed to deserialize price row: {e}")))
}

pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23514") => StoreError::Corrupt(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {operation}"))
        }
        _ => StoreError::Backend(format!("sqlx error in {operation}: {err}")),
    }
}
