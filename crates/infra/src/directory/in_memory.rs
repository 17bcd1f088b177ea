use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use palletflow_core::{LocationId, OrderId, ProductId};
use palletflow_ledger::{Location, Order, Product};

use super::{LocationDirectory, OrderDirectory, ProductCatalog};
use crate::error::StoreError;

#[derive(Debug, Default)]
struct Records {
    locations: HashMap<LocationId, Location>,
    products: HashMap<ProductId, Product>,
    orders: HashMap<OrderId, Order>,
}

/// In-memory locations, products and orders (tests/dev).
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    records: RwLock<Records>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Records>, StoreError> {
        self.records
            .write()
            .map_err(|_| StoreError::Poisoned("directory"))
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Records>, StoreError> {
        self.records
            .read()
            .map_err(|_| StoreError::Poisoned("directory"))
    }
}

#[async_trait]
impl LocationDirectory for InMemoryDirectory {
    async fn location(&self, id: LocationId) -> Result<Option<Location>, StoreError> {
        Ok(self.read()?.locations.get(&id).cloned())
    }

    async fn register_location(&self, location: Location) -> Result<(), StoreError> {
        self.write()?.locations.insert(location.id, location);
        Ok(())
    }
}

#[async_trait]
impl ProductCatalog for InMemoryDirectory {
    async fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.read()?.products.get(&id).cloned())
    }

    async fn register_product(&self, product: Product) -> Result<(), StoreError> {
        self.write()?.products.insert(product.id, product);
        Ok(())
    }
}

#[async_trait]
impl OrderDirectory for InMemoryDirectory {
    async fn open_orders(&self) -> Result<Vec<Order>, StoreError> {
        let mut open: Vec<Order> = self
            .read()?
            .orders
            .values()
            .filter(|o| o.is_open())
            .cloned()
            .collect();
        open.sort_by_key(|o| o.id);
        Ok(open)
    }

    async fn upsert_order(&self, order: Order) -> Result<(), StoreError> {
        self.write()?.orders.insert(order.id, order);
        Ok(())
    }
}
