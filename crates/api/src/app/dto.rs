use std::str::FromStr;

use axum::response::Response;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use palletflow_core::{LocationId, ProductId};
use palletflow_ledger::{LocationKind, OrderLine, OrderStatus};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterLocationRequest {
    pub name: String,
    pub kind: LocationKind,
}

#[derive(Debug, Deserialize)]
pub struct RegisterProductRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct UpsertOrderRequest {
    pub facility_id: LocationId,
    #[serde(default = "default_order_status")]
    pub status: OrderStatus,
    #[serde(default)]
    pub lines: Vec<OrderLine>,
}

fn default_order_status() -> OrderStatus {
    OrderStatus::Open
}

#[derive(Debug, Deserialize)]
pub struct RecordStockRequest {
    pub product_id: ProductId,
    pub quantity: i64,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct AddPalletsRequest {
    pub product_id: ProductId,
    pub amount: i64,
    pub recorded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct CollectPalletsRequest {
    pub product_id: ProductId,
    pub resulting_quantity: i64,
    pub recorded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct RecordPriceRequest {
    pub price: Decimal,
    pub valid_from: NaiveDate,
}

// -------------------------
// Query strings
// -------------------------

#[derive(Debug, Deserialize)]
pub struct StockQuery {
    /// Defaults to now.
    pub as_of: Option<DateTime<Utc>>,
    /// Restrict the answer to a single product.
    pub product_id: Option<ProductId>,
}

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct DateRangeQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct ReportsQuery {
    /// Comma-separated location ids.
    pub locations: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    /// Comma-separated facility ids.
    pub facilities: String,
    pub as_of: Option<DateTime<Utc>>,
}

// -------------------------
// Parsing helpers
// -------------------------

pub fn parse_id<T>(raw: &str) -> Result<T, Response>
where
    T: FromStr<Err = palletflow_core::DomainError>,
{
    T::from_str(raw).map_err(|e| errors::bad_request("invalid_id", e.to_string()))
}

/// Split `a,b,c` into ids, skipping empty segments.
pub fn parse_id_list(raw: &str) -> Result<Vec<LocationId>, Response> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_id::<LocationId>)
        .collect()
}
