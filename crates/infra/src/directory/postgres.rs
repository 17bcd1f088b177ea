use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use palletflow_core::{LocationId, OrderId, ProductId};
use palletflow_ledger::{Location, LocationKind, Order, OrderLine, OrderStatus, Product};

use super::{LocationDirectory, OrderDirectory, ProductCatalog};
use crate::error::StoreError;
use crate::store::postgres::map_sqlx_error;

/// Locations, products and open orders read from the ledger schema.
#[derive(Debug, Clone)]
pub struct PostgresDirectory {
    pool: Arc<PgPool>,
}

impl PostgresDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

fn parse_kind(raw: &str) -> Result<LocationKind, StoreError> {
    match raw {
        "carrier" => Ok(LocationKind::Carrier),
        "processing_facility" => Ok(LocationKind::ProcessingFacility),
        other => Err(StoreError::Corrupt(format!("unknown location kind: {other}"))),
    }
}

fn kind_str(kind: LocationKind) -> &'static str {
    match kind {
        LocationKind::Carrier => "carrier",
        LocationKind::ProcessingFacility => "processing_facility",
    }
}

fn status_str(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Open => "open",
        OrderStatus::Collected => "collected",
        OrderStatus::Cancelled => "cancelled",
    }
}

fn corrupt(what: &str) -> impl Fn(sqlx::Error) -> StoreError + '_ {
    move |e| StoreError::Corrupt(format!("failed to deserialize {what} row: {e}"))
}

#[async_trait]
impl LocationDirectory for PostgresDirectory {
    #[instrument(skip(self), err)]
    async fn location(&self, id: LocationId) -> Result<Option<Location>, StoreError> {
        let row = sqlx::query("SELECT location_id, name, kind FROM locations WHERE location_id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("location", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let name: String = row.try_get("name").map_err(corrupt("location"))?;
        let kind: String = row.try_get("kind").map_err(corrupt("location"))?;
        Ok(Some(Location::new(id, name, parse_kind(&kind)?)))
    }

    #[instrument(skip(self, location), fields(location_id = %location.id), err)]
    async fn register_location(&self, location: Location) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO locations (location_id, name, kind)
            VALUES ($1, $2, $3)
            ON CONFLICT (location_id) DO UPDATE SET name = EXCLUDED.name, kind = EXCLUDED.kind
            "#,
        )
        .bind(location.id.as_uuid())
        .bind(&location.name)
        .bind(kind_str(location.kind))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("register_location", e))?;
        Ok(())
    }
}

#[async_trait]
impl ProductCatalog for PostgresDirectory {
    #[instrument(skip(self), err)]
    async fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query("SELECT name FROM products WHERE product_id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("product", e))?;

        row.map(|r| {
            r.try_get::<String, _>("name")
                .map(|name| Product::new(id, name))
                .map_err(corrupt("product"))
        })
        .transpose()
    }

    #[instrument(skip(self, product), fields(product_id = %product.id), err)]
    async fn register_product(&self, product: Product) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO products (product_id, name)
            VALUES ($1, $2)
            ON CONFLICT (product_id) DO UPDATE SET name = EXCLUDED.name
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("register_product", e))?;
        Ok(())
    }
}

#[async_trait]
impl OrderDirectory for PostgresDirectory {
    #[instrument(skip(self), err)]
    async fn open_orders(&self) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT o.order_id, o.facility_id, l.product_id, l.pallet_amount
            FROM orders o
            LEFT JOIN order_lines l ON l.order_id = o.order_id
            WHERE o.status = 'open'
            ORDER BY o.order_id
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("open_orders", e))?;

        let mut orders: BTreeMap<Uuid, Order> = BTreeMap::new();
        for row in rows {
            let order_id: Uuid = row.try_get("order_id").map_err(corrupt("order"))?;
            let facility_id: Uuid = row.try_get("facility_id").map_err(corrupt("order"))?;
            let product_id: Option<Uuid> = row.try_get("product_id").map_err(corrupt("order"))?;
            let pallet_amount: Option<i64> = row.try_get("pallet_amount").map_err(corrupt("order"))?;

            let order = orders.entry(order_id).or_insert_with(|| Order {
                id: OrderId::from_uuid(order_id),
                facility_id: LocationId::from_uuid(facility_id),
                status: OrderStatus::Open,
                lines: Vec::new(),
            });
            // Orders without lines come back with NULL line columns.
            if let (Some(product_id), Some(pallet_amount)) = (product_id, pallet_amount) {
                order.lines.push(OrderLine {
                    product_id: ProductId::from_uuid(product_id),
                    pallet_amount,
                });
            }
        }

        Ok(orders.into_values().collect())
    }

    #[instrument(skip(self, order), fields(order_id = %order.id, status = ?order.status), err)]
    async fn upsert_order(&self, order: Order) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("upsert_order", e))?;

        sqlx::query(
            r#"
            INSERT INTO orders (order_id, facility_id, status)
            VALUES ($1, $2, $3)
            ON CONFLICT (order_id) DO UPDATE
                SET facility_id = EXCLUDED.facility_id, status = EXCLUDED.status
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.facility_id.as_uuid())
        .bind(status_str(order.status))
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("upsert_order", e))?;

        sqlx::query("DELETE FROM order_lines WHERE order_id = $1")
            .bind(order.id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("upsert_order", e))?;

        for line in &order.lines {
            sqlx::query(
                "INSERT INTO order_lines (order_id, product_id, pallet_amount) VALUES ($1, $2, $3)",
            )
            .bind(order.id.as_uuid())
            .bind(line.product_id.as_uuid())
            .bind(line.pallet_amount)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("upsert_order", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("upsert_order", e))?;
        Ok(())
    }
}
