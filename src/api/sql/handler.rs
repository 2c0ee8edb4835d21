// SQL gateway handlers

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use tracing::{field, info, instrument, Span};

use crate::config::state::AppState;
use crate::database::ConnectionParams;
use crate::utils::error::GatewayError;
use crate::utils::response_handler::HandlerResponse;
use super::request::{RawQueryRequest, TableQueryRequest, VerifyConnectionRequest};

/// Opens a connection with the supplied parameters, then closes it and clears the tenant slot
#[instrument(name = "verify_sql_connection", skip(state, payload), fields(tenant = field::Empty))]
pub async fn verify_connection_handler(
    State(state): State<AppState>,
    payload: Result<Json<VerifyConnectionRequest>, JsonRejection>,
) -> Result<HandlerResponse, GatewayError> {
    let Json(request) = payload?;
    let params: ConnectionParams = request.validate(state.environment.db_port)?;
    let tenant: String = request.connection.tenant_key(&params);
    Span::current().record("tenant", tenant.as_str());

    state.connections.verify(&tenant, &params).await?;

    info!("MySQL connection verified for {}", params.database);
    Ok(HandlerResponse::new(StatusCode::OK).message("MySQL connection verified successfully"))
}

/// Runs `SELECT * FROM <table> [WHERE <condition>]` on the tenant's connection
#[instrument(name = "trigger_sql_query", skip(state, payload), fields(tenant = field::Empty))]
pub async fn table_query_handler(
    State(state): State<AppState>,
    payload: Result<Json<TableQueryRequest>, JsonRejection>,
) -> Result<HandlerResponse, GatewayError> {
    let Json(request) = payload?;
    let (params, sql) = request.validate(state.environment.db_port)?;

    run(&state, request.connection.tenant_key(&params), &params, &sql).await
}

/// Runs the caller's SQL verbatim on the tenant's connection
#[instrument(name = "sql_query", skip(state, payload), fields(tenant = field::Empty))]
pub async fn raw_query_handler(
    State(state): State<AppState>,
    payload: Result<Json<RawQueryRequest>, JsonRejection>,
) -> Result<HandlerResponse, GatewayError> {
    let Json(request) = payload?;
    let (params, sql) = request.validate(state.environment.db_port)?;

    run(&state, request.connection.tenant_key(&params), &params, &sql).await
}

async fn run(
    state: &AppState,
    tenant: String,
    params: &ConnectionParams,
    sql: &str,
) -> Result<HandlerResponse, GatewayError> {
    Span::current().record("tenant", tenant.as_str());

    let data: Value = state.connections.execute(&tenant, params, sql).await?;

    Ok(HandlerResponse::new(StatusCode::OK).data(data))
}
