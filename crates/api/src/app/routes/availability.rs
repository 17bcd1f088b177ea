use axum::{
    extract::{rejection::QueryRejection, Extension, Query},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};

use palletflow_infra::LedgerEngine;

use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/", get(available_stock))
}

/// `GET /availability?facilities=a,b[&as_of=]`
pub async fn available_stock(
    Extension(engine): Extension<LedgerEngine>,
    query: Result<Query<dto::AvailabilityQuery>, QueryRejection>,
) -> Response {
    let Query(query) = try_extract!(query);
    let facilities = try_response!(dto::parse_id_list(&query.facilities));

    let result = match query.as_of {
        Some(at) => engine.available_stock_as_of(&facilities, at).await,
        None => engine.available_stock(&facilities).await,
    };

    match result {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}
