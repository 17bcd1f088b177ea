//! Location registration plus the per-location stock, price and report
//! endpoints.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Extension, Path, Query,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use palletflow_core::LocationId;
use palletflow_infra::LedgerEngine;
use palletflow_ledger::Location;

use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(register_location))
        .route("/:id/stock", post(record_stock).get(latest_stock))
        .route("/:id/stock/add", post(add_pallets))
        .route("/:id/stock/collect", post(collect_pallets))
        .route("/:id/prices", post(record_price).get(price_changes))
        .route("/:id/prices/at", get(price_at))
        .route("/:id/report", get(location_report))
}

pub async fn register_location(
    Extension(engine): Extension<LedgerEngine>,
    body: Result<Json<dto::RegisterLocationRequest>, JsonRejection>,
) -> Response {
    let Json(body) = try_extract!(body);
    let location = Location::new(LocationId::new(), body.name, body.kind);

    match engine.register_location(location).await {
        Ok(location) => (StatusCode::CREATED, Json(location)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn record_stock(
    Extension(engine): Extension<LedgerEngine>,
    Path(id): Path<String>,
    body: Result<Json<dto::RecordStockRequest>, JsonRejection>,
) -> Response {
    let location_id: LocationId = try_response!(dto::parse_id(&id));
    let Json(body) = try_extract!(body);

    match engine
        .record_stock(location_id, body.product_id, body.quantity, body.recorded_at)
        .await
    {
        Ok(snapshot) => (StatusCode::CREATED, Json(snapshot)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn add_pallets(
    Extension(engine): Extension<LedgerEngine>,
    Path(id): Path<String>,
    body: Result<Json<dto::AddPalletsRequest>, JsonRejection>,
) -> Response {
    let location_id: LocationId = try_response!(dto::parse_id(&id));
    let Json(body) = try_extract!(body);
    let recorded_at = body.recorded_at.unwrap_or_else(Utc::now);

    match engine
        .add_pallets(location_id, body.product_id, body.amount, recorded_at)
        .await
    {
        Ok(snapshot) => (StatusCode::CREATED, Json(snapshot)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn collect_pallets(
    Extension(engine): Extension<LedgerEngine>,
    Path(id): Path<String>,
    body: Result<Json<dto::CollectPalletsRequest>, JsonRejection>,
) -> Response {
    let location_id: LocationId = try_response!(dto::parse_id(&id));
    let Json(body) = try_extract!(body);
    let recorded_at = body.recorded_at.unwrap_or_else(Utc::now);

    match engine
        .collect_pallets(location_id, body.product_id, body.resulting_quantity, recorded_at)
        .await
    {
        Ok(snapshot) => (StatusCode::CREATED, Json(snapshot)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

/// Latest snapshot per product, or of one product when `product_id` is given.
pub async fn latest_stock(
    Extension(engine): Extension<LedgerEngine>,
    Path(id): Path<String>,
    query: Result<Query<dto::StockQuery>, QueryRejection>,
) -> Response {
    let location_id: LocationId = try_response!(dto::parse_id(&id));
    let Query(query) = try_extract!(query);
    let as_of = query.as_of.unwrap_or_else(Utc::now);

    let result = match query.product_id {
        Some(product_id) => engine
            .stock_as_of(location_id, product_id, as_of)
            .await
            .map(|s| s.into_iter().collect::<Vec<_>>()),
        None => engine.latest_stock_per_product(location_id, as_of).await,
    };

    match result {
        Ok(snapshots) => Json(snapshots).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn record_price(
    Extension(engine): Extension<LedgerEngine>,
    Path(id): Path<String>,
    body: Result<Json<dto::RecordPriceRequest>, JsonRejection>,
) -> Response {
    let location_id: LocationId = try_response!(dto::parse_id(&id));
    let Json(body) = try_extract!(body);

    match engine
        .record_price(location_id, body.price, body.valid_from)
        .await
    {
        Ok(version) => (StatusCode::CREATED, Json(version)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn price_changes(
    Extension(engine): Extension<LedgerEngine>,
    Path(id): Path<String>,
    query: Result<Query<dto::DateRangeQuery>, QueryRejection>,
) -> Response {
    let location_id: LocationId = try_response!(dto::parse_id(&id));
    let Query(range) = try_extract!(query);

    match engine.price_changes(location_id, range.start, range.end).await {
        Ok(versions) => Json(versions).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn price_at(
    Extension(engine): Extension<LedgerEngine>,
    Path(id): Path<String>,
    query: Result<Query<dto::DateQuery>, QueryRejection>,
) -> Response {
    let location_id: LocationId = try_response!(dto::parse_id(&id));
    let Query(query) = try_extract!(query);

    match engine.price_at(location_id, query.date).await {
        Ok(Some(version)) => Json(version).into_response(),
        Ok(None) => errors::json_error(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("no price in effect on {}", query.date),
        ),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn location_report(
    Extension(engine): Extension<LedgerEngine>,
    Path(id): Path<String>,
    query: Result<Query<dto::DateRangeQuery>, QueryRejection>,
) -> Response {
    let location_id: LocationId = try_response!(dto::parse_id(&id));
    let Query(range) = try_extract!(query);

    match engine.build_report(location_id, range.start, range.end).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}
