// Start of file: src/main.rs

use std::sync::Arc;
use anyhow::Context;
use axum::serve;
use tokio::net::TcpListener;

use sql_gateway::config::{environment::EnvironmentVariables, state::AppState};
use sql_gateway::core::{logging::init_tracing, server};
use sql_gateway::database::MySqlConnector;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let environment: Arc<EnvironmentVariables> = Arc::new(
        EnvironmentVariables::load().context("Failed to load environment configuration")?,
    );
    tracing::debug!("Loaded environment configuration: {:#?}", environment);
    let state: AppState = AppState::new(environment.clone(), Arc::new(MySqlConnector::new()));

    let app: axum::Router = server::create_app(state.clone());
    let listener: TcpListener = server::setup_listener(&environment).await?;

    tracing::info!("Server is running on {}", listener.local_addr()?);

    serve(listener, app)
        .with_graceful_shutdown(server::shutdown_signal())
        .await?;

    // Connections live as long as the server; close them once it has drained
    state.shutdown().await;

    Ok(())
}

// End of file: src/main.rs
