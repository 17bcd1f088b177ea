//! Sellable stock at processing facilities.
//!
//! `available = latest snapshot quantity - open reservations`. A negative result
//! means more pallets were promised than are on hand; it is reported, not
//! clamped.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use palletflow_core::{LocationId, ProductId, ValueObject};

use crate::snapshot::StockSnapshot;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableStock {
    pub product_id: ProductId,
    /// Quantity of the winning snapshot (0 when only reservations exist).
    pub on_hand: i64,
    pub reserved: i64,
    pub available: i64,
    /// Facility and instant of the snapshot `on_hand` was read from.
    pub source_location: Option<LocationId>,
    pub recorded_at: Option<DateTime<Utc>>,
}

impl ValueObject for AvailableStock {}

impl AvailableStock {
    pub fn is_overcommitted(&self) -> bool {
        self.available < 0
    }
}

/// Combine facility snapshots with reservations, one row per product.
///
/// When several facilities report the same product, the snapshot with the
/// greatest `(recorded_at, sequence)` across all of them wins. Products that
/// are reserved but never stocked still get a row. Rows are ordered by product.
pub fn available_stock(
    snapshots: impl IntoIterator<Item = StockSnapshot>,
    reservations: &BTreeMap<ProductId, i64>,
) -> Vec<AvailableStock> {
    let mut latest: BTreeMap<ProductId, StockSnapshot> = BTreeMap::new();
    for s in snapshots {
        let newer = latest
            .get(&s.product_id)
            .map_or(true, |current| current.order_key() < s.order_key());
        if newer {
            latest.insert(s.product_id, s);
        }
    }

    let mut rows: BTreeMap<ProductId, AvailableStock> = latest
        .into_iter()
        .map(|(product_id, s)| {
            let reserved = reservations.get(&product_id).copied().unwrap_or(0);
            let row = AvailableStock {
                product_id,
                on_hand: s.quantity,
                reserved,
                available: s.quantity - reserved,
                source_location: Some(s.location_id),
                recorded_at: Some(s.recorded_at),
            };
            (product_id, row)
        })
        .collect();

    for (product_id, reserved) in reservations {
        rows.entry(*product_id).or_insert_with(|| AvailableStock {
            product_id: *product_id,
            on_hand: 0,
            reserved: *reserved,
            available: -*reserved,
            source_location: None,
            recorded_at: None,
        });
    }

    rows.into_values().collect()
}
