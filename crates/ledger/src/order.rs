//! Orders and the pallets they reserve.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use palletflow_core::{DomainError, DomainResult, LocationId, OrderId, ProductId};

/// Order lifecycle. Only `Open` orders reserve stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Open,
    Collected,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub pallet_amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Facility the pallets are collected from.
    pub facility_id: LocationId,
    pub status: OrderStatus,
    pub lines: Vec<OrderLine>,
}

impl Order {
    pub fn is_open(&self) -> bool {
        self.status == OrderStatus::Open
    }
}

/// Pallets promised but not yet collected, summed per product over open orders.
///
/// A sum that no longer fits in an `i64` is rejected rather than wrapped.
pub fn reservations_by_product<'a>(
    orders: impl IntoIterator<Item = &'a Order>,
) -> DomainResult<BTreeMap<ProductId, i64>> {
    let mut reserved: BTreeMap<ProductId, i64> = BTreeMap::new();
    for order in orders.into_iter().filter(|o| o.is_open()) {
        for line in &order.lines {
            let total = reserved.entry(line.product_id).or_insert(0);
            *total = total.checked_add(line.pallet_amount).ok_or_else(|| {
                DomainError::validation(format!(
                    "reserved pallets of product {} exceed the supported range",
                    line.product_id
                ))
            })?;
        }
    }
    Ok(reserved)
}
