// =============================================================================
// CONNECTION SEAMS - parameters, connector and tenant connection traits
// =============================================================================

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

/// Connection parameters supplied with each request. Never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl ConnectionParams {
    /// Registry key used when the caller does not name a tenant
    pub fn fallback_tenant_key(&self) -> String {
        format!("{}@{}:{}/{}", self.user, self.host, self.port, self.database)
    }
}

// Keeps the password out of logs and span fields
impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"********")
            .field("database", &self.database)
            .finish()
    }
}

/// A single live connection owned by one tenant slot of the registry.
#[async_trait]
pub trait TenantConnection: Send {
    /// Identifier assigned when the connection was opened
    fn id(&self) -> Uuid;

    /// False once the connection hit a transport error or a query was abandoned mid-flight
    fn is_connected(&self) -> bool;

    /// Confirms a cached connection is still usable before it is handed out again
    async fn check(&mut self) -> bool {
        self.is_connected()
    }

    /// Runs one SQL statement verbatim and returns the JSON payload for the response
    async fn query(&mut self, sql: &str) -> Result<Value, sqlx::Error>;

    /// Gracefully terminates the connection
    async fn close(self: Box<Self>) -> Result<(), sqlx::Error>;
}

/// Opens tenant connections.
#[async_trait]
pub trait Connector: Send + Sync + fmt::Debug {
    async fn connect(&self, params: &ConnectionParams) -> Result<Box<dyn TenantConnection>, sqlx::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ConnectionParams {
        ConnectionParams {
            host: "db.internal".into(),
            port: 3306,
            user: "reporting".into(),
            password: "hunter2".into(),
            database: "sales".into(),
        }
    }

    #[test]
    fn debug_output_hides_password() {
        let rendered: String = format!("{:?}", params());

        assert!(rendered.contains("db.internal"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn fallback_key_identifies_the_target_database() {
        assert_eq!(params().fallback_tenant_key(), "reporting@db.internal:3306/sales");
    }
}
