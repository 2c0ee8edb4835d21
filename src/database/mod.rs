pub mod connection;
pub mod mysql;
pub mod registry;

pub use connection::{ConnectionParams, Connector, TenantConnection};
pub use mysql::MySqlConnector;
pub use registry::ConnectionRegistry;
