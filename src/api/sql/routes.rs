// SQL gateway route definitions

use axum::{routing::post, Router};

use crate::config::state::AppState;
use super::handler;

/// Creates router with the three SQL endpoints
pub fn sql_routes() -> Router<AppState> {
    Router::new()
        .route("/verify-sql-connection", post(handler::verify_connection_handler))
        .route("/trigger-sql-query", post(handler::table_query_handler))
        .route("/sql-query", post(handler::raw_query_handler))
}
