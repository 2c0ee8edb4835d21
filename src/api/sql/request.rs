// Request bodies of the SQL endpoints and their validation

use serde::Deserialize;

use crate::database::ConnectionParams;
use crate::utils::error::GatewayError;

pub const MISSING_CONNECTION_PARAMETERS: &str = "Missing required database connection parameters";
pub const MISSING_PARAMETERS: &str = "Missing required parameters";
pub const INVALID_TABLE_NAME: &str = "Invalid table name";

/// Connection fields shared by every endpoint
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionFields {
    pub host: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    pub port: Option<u16>,
    pub tenant_name: Option<String>,
}

impl ConnectionFields {
    /// Connection parameters, or `None` when any required field is absent or empty
    pub fn params(&self, default_port: u16) -> Option<ConnectionParams> {
        Some(ConnectionParams {
            host: present(&self.host)?.to_string(),
            port: self.port.unwrap_or(default_port),
            user: present(&self.user)?.to_string(),
            password: present(&self.password)?.to_string(),
            database: present(&self.database)?.to_string(),
        })
    }

    /// Registry key: the tenant name, or one derived from the target database
    pub fn tenant_key(&self, params: &ConnectionParams) -> String {
        match present(&self.tenant_name) {
            Some(name) => name.to_string(),
            None => params.fallback_tenant_key(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyConnectionRequest {
    #[serde(flatten)]
    pub connection: ConnectionFields,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableQueryRequest {
    #[serde(flatten)]
    pub connection: ConnectionFields,
    pub table_name: Option<String>,
    pub condition: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawQueryRequest {
    #[serde(flatten)]
    pub connection: ConnectionFields,
    pub sql_query: Option<String>,
}

impl VerifyConnectionRequest {
    pub fn validate(&self, default_port: u16) -> Result<ConnectionParams, GatewayError> {
        self.connection
            .params(default_port)
            .ok_or(GatewayError::Validation(MISSING_CONNECTION_PARAMETERS))
    }
}

impl TableQueryRequest {
    /// Connection parameters plus the SELECT statement to run
    pub fn validate(&self, default_port: u16) -> Result<(ConnectionParams, String), GatewayError> {
        let params: Option<ConnectionParams> = self.connection.params(default_port);

        let (params, table_name) = match (params, present(&self.table_name)) {
            (Some(params), Some(table_name)) => (params, table_name),
            _ => return Err(GatewayError::Validation(MISSING_PARAMETERS)),
        };

        if !is_valid_table_name(table_name) {
            return Err(GatewayError::Validation(INVALID_TABLE_NAME));
        }

        Ok((params, build_table_query(table_name, present(&self.condition))))
    }
}

impl RawQueryRequest {
    pub fn validate(&self, default_port: u16) -> Result<(ConnectionParams, String), GatewayError> {
        match (self.connection.params(default_port), present(&self.sql_query)) {
            (Some(params), Some(sql)) => Ok((params, sql.to_string())),
            _ => Err(GatewayError::Validation(MISSING_PARAMETERS)),
        }
    }
}

/// Table names are restricted to ASCII letters and underscores
pub fn is_valid_table_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c: char| c.is_ascii_alphabetic() || c == '_')
}

/// The condition fragment is appended verbatim; only the table name is constrained.
pub fn build_table_query(table_name: &str, condition: Option<&str>) -> String {
    match condition {
        Some(condition) => format!("SELECT * FROM `{}` WHERE {}", table_name, condition),
        None => format!("SELECT * FROM `{}`", table_name),
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s: &&str| !s.is_empty())
}
