//! Locations and pallet types as seen by the ledger.

use serde::{Deserialize, Serialize};

use palletflow_core::{LocationId, ProductId};

/// What a location does with pallets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    /// Moves pallets between sites.
    Carrier,
    /// Stores and processes pallets; its stock can be reserved by orders.
    ProcessingFacility,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
    pub kind: LocationKind,
}

impl Location {
    pub fn new(id: LocationId, name: impl Into<String>, kind: LocationKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
        }
    }

    pub fn is_facility(&self) -> bool {
        self.kind == LocationKind::ProcessingFacility
    }
}

/// Pallet type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
}

impl Product {
    pub fn new(id: ProductId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}
