// Application state shared with every handler

use std::sync::Arc;
use crate::config::environment::EnvironmentVariables;
use crate::database::{Connector, ConnectionRegistry};

#[derive(Debug, Clone)]
pub struct AppState {
    pub environment: Arc<EnvironmentVariables>,
    pub connections: ConnectionRegistry,
}

impl AppState {
    /// Builds the state around an environment and the connector used to reach tenant databases
    pub fn new(environment: Arc<EnvironmentVariables>, connector: Arc<dyn Connector>) -> Self {
        Self {
            environment,
            connections: ConnectionRegistry::new(connector),
        }
    }

    /// Closes every cached tenant connection
    pub async fn shutdown(&self) {
        self.connections.close_all().await;
        tracing::info!("Tenant connections closed");
    }
}
