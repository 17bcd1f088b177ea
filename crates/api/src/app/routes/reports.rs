use axum::{
    extract::{rejection::QueryRejection, Extension, Query},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};

use palletflow_infra::LedgerEngine;

use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/", get(multi_location_report))
}

/// `GET /reports?locations=a,b&start=&end=`: one report per location, in the
/// order given.
pub async fn multi_location_report(
    Extension(engine): Extension<LedgerEngine>,
    query: Result<Query<dto::ReportsQuery>, QueryRejection>,
) -> Response {
    let Query(query) = try_extract!(query);
    let locations = try_response!(dto::parse_id_list(&query.locations));

    match engine.build_reports(&locations, query.start, query.end).await {
        Ok(reports) => Json(reports).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}
