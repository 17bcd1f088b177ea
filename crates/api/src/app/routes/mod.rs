use axum::Router;

/// Unwrap an extractor result or answer 400 with the rejection text.
macro_rules! try_extract {
    ($e:expr) => {
        match $e {
            Ok(v) => v,
            Err(rejection) => {
                return $crate::app::errors::bad_request("invalid_request", rejection.body_text())
            }
        }
    };
}

/// Unwrap a `Result<_, Response>` or return the response.
macro_rules! try_response {
    ($e:expr) => {
        match $e {
            Ok(v) => v,
            Err(resp) => return resp,
        }
    };
}

pub mod availability;
pub mod directory;
pub mod locations;
pub mod reports;
pub mod system;

/// Router for all ledger endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/locations", locations::router())
        .nest("/products", directory::products_router())
        .nest("/orders", directory::orders_router())
        .nest("/reports", reports::router())
        .nest("/availability", availability::router())
}
