//! Registration of products and orders. Locations register under `/locations`.

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{post, put},
    Json, Router,
};

use palletflow_core::{OrderId, ProductId};
use palletflow_infra::LedgerEngine;
use palletflow_ledger::{Order, Product};

use crate::app::{dto, errors};

pub fn products_router() -> Router {
    Router::new().route("/", post(register_product))
}

pub fn orders_router() -> Router {
    Router::new().route("/:id", put(upsert_order))
}

pub async fn register_product(
    Extension(engine): Extension<LedgerEngine>,
    body: Result<Json<dto::RegisterProductRequest>, JsonRejection>,
) -> Response {
    let Json(body) = try_extract!(body);

    match engine.register_product(Product::new(ProductId::new(), body.name)).await {
        Ok(product) => (StatusCode::CREATED, Json(product)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn upsert_order(
    Extension(engine): Extension<LedgerEngine>,
    Path(id): Path<String>,
    body: Result<Json<dto::UpsertOrderRequest>, JsonRejection>,
) -> Response {
    let id: OrderId = try_response!(dto::parse_id(&id));
    let Json(body) = try_extract!(body);

    let order = Order {
        id,
        facility_id: body.facility_id,
        status: body.status,
        lines: body.lines,
    };
    match engine.upsert_order(order).await {
        Ok(order) => Json(order).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}
