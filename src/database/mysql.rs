// =============================================================================
// MYSQL CONNECTOR - tenant connections over sqlx
// =============================================================================

use std::future::Future;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use futures_util::TryStreamExt;
use serde_json::{json, Map, Value};
use sqlx::mysql::{MySql, MySqlConnectOptions, MySqlRow};
use sqlx::{Column, ConnectOptions, Connection, Decode, Either, Executor, MySqlConnection, Row, Type, TypeInfo, ValueRef};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::connection::{ConnectionParams, Connector, TenantConnection};

/// Opens one dedicated `MySqlConnection` per tenant.
#[derive(Debug, Default, Clone)]
pub struct MySqlConnector;

impl MySqlConnector {
    pub fn new() -> Self {
        Self
    }

    fn connect_options(params: &ConnectionParams) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&params.host)
            .port(params.port)
            .username(&params.user)
            .password(&params.password)
            .database(&params.database)
    }
}

#[async_trait]
impl Connector for MySqlConnector {
    async fn connect(&self, params: &ConnectionParams) -> Result<Box<dyn TenantConnection>, sqlx::Error> {
        let conn: MySqlConnection = Self::connect_options(params).connect().await?;
        let id: Uuid = Uuid::new_v4();

        info!(connection_id = %id, host = %params.host, database = %params.database, "Connected to MySQL");

        Ok(Box::new(MySqlTenantConnection {
            id,
            conn,
            health: ConnectionHealth::default(),
        }))
    }
}

pub struct MySqlTenantConnection {
    id: Uuid,
    conn: MySqlConnection,
    health: ConnectionHealth,
}

#[async_trait]
impl TenantConnection for MySqlTenantConnection {
    fn id(&self) -> Uuid {
        self.id
    }

    fn is_connected(&self) -> bool {
        self.health.is_connected()
    }

    async fn check(&mut self) -> bool {
        if !self.health.is_connected() {
            return false;
        }

        // The server may have dropped an idle socket (wait_timeout, restart)
        match self.health.track(self.conn.ping()).await {
            Ok(()) => true,
            Err(err) => {
                warn!(connection_id = %self.id, "Ping failed, connection marked as disconnected: {}", err);
                self.health.mark_broken();
                false
            }
        }
    }

    async fn query(&mut self, sql: &str) -> Result<Value, sqlx::Error> {
        let result: Result<Value, sqlx::Error> = self.health.track(run_statement(&mut self.conn, sql)).await;

        if let Err(err) = &result {
            if !self.health.is_connected() {
                warn!(connection_id = %self.id, "Connection marked as disconnected: {}", err);
            }
        }

        result
    }

    async fn close(self: Box<Self>) -> Result<(), sqlx::Error> {
        let this: MySqlTenantConnection = *self;
        debug!(connection_id = %this.id, "Closing MySQL connection");
        this.conn.close().await
    }
}

/// Runs one statement over the text protocol and shapes the response payload
async fn run_statement(conn: &mut MySqlConnection, sql: &str) -> Result<Value, sqlx::Error> {
    let mut outcome: StatementOutcome = StatementOutcome::default();

    {
        let mut results = (&mut *conn).fetch_many(sql);
        while let Some(item) = results.try_next().await? {
            match item {
                Either::Left(done) => outcome.push_done(done.rows_affected(), done.last_insert_id()),
                Either::Right(row) => outcome.push_row(row_to_json(&row)),
            }
        }
    }

    // An empty result set carries no row to read columns from; ask the server instead
    let has_columns: bool = if outcome.needs_column_lookup() {
        (&mut *conn)
            .describe(sql)
            .await
            .map(|described| !described.columns().is_empty())
            .unwrap_or(false)
    } else {
        false
    };

    Ok(outcome.into_payload(has_columns))
}

/// Rows and result packets streamed back for one statement
#[derive(Debug, Default)]
struct StatementOutcome {
    rows: Vec<Value>,
    affected_rows: u64,
    insert_id: u64,
}

impl StatementOutcome {
    fn push_row(&mut self, row: Value) {
        self.rows.push(row);
    }

    fn push_done(&mut self, affected_rows: u64, insert_id: u64) {
        self.affected_rows += affected_rows;
        if insert_id != 0 {
            self.insert_id = insert_id;
        }
    }

    fn needs_column_lookup(&self) -> bool {
        self.rows.is_empty() && self.affected_rows == 0 && self.insert_id == 0
    }

    /// Row array when the statement produced a result set, result packet otherwise
    fn into_payload(self, has_columns: bool) -> Value {
        if !self.rows.is_empty() || has_columns {
            return Value::Array(self.rows);
        }

        json!({
            "affectedRows": self.affected_rows,
            "insertId": self.insert_id,
        })
    }
}

/// Tracks whether the connection can be handed out again.
#[derive(Debug, Default)]
struct ConnectionHealth {
    broken: bool,
    // Still set if an operation future was dropped before completing
    in_flight: bool,
}

impl ConnectionHealth {
    fn is_connected(&self) -> bool {
        !self.broken && !self.in_flight
    }

    fn mark_broken(&mut self) {
        self.broken = true;
    }

    async fn track<T, F>(&mut self, operation: F) -> Result<T, sqlx::Error>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        self.in_flight = true;
        let result: Result<T, sqlx::Error> = operation.await;
        self.in_flight = false;

        if let Err(err) = &result {
            if is_transport_error(err) {
                self.broken = true;
            }
        }

        result
    }
}

fn is_transport_error(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::Protocol(_) | sqlx::Error::WorkerCrashed
    )
}

/// How a column's value is turned into JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Null,
    Boolean,
    Signed,
    Unsigned,
    Float,
    Double,
    Json,
    Date,
    DateTime,
    Timestamp,
    Binary,
    Text,
}

fn column_kind(type_name: &str) -> ColumnKind {
    let unsigned: bool = type_name.ends_with(" UNSIGNED");

    match type_name.trim_end_matches(" UNSIGNED") {
        "NULL" => ColumnKind::Null,
        "BOOLEAN" => ColumnKind::Boolean,
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" if unsigned => ColumnKind::Unsigned,
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => ColumnKind::Signed,
        "FLOAT" => ColumnKind::Float,
        "DOUBLE" => ColumnKind::Double,
        "JSON" => ColumnKind::Json,
        "DATE" => ColumnKind::Date,
        "DATETIME" => ColumnKind::DateTime,
        "TIMESTAMP" => ColumnKind::Timestamp,
        "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BINARY" | "VARBINARY" | "BIT" => ColumnKind::Binary,
        // DECIMAL stays a string to keep its precision
        _ => ColumnKind::Text,
    }
}

/// Same shape as JavaScript's `Date.toISOString()`
fn iso_string(value: NaiveDateTime) -> Value {
    Value::String(value.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
}

fn buffer(bytes: Vec<u8>) -> Value {
    json!({ "type": "Buffer", "data": bytes })
}

/// Converts a row into a `{ column: value }` object
pub fn row_to_json(row: &MySqlRow) -> Value {
    let mut object: Map<String, Value> = Map::with_capacity(row.len());

    for column in row.columns() {
        let index: usize = column.ordinal();
        let value: Value = decode_column(row, index, column_kind(column.type_info().name()));
        object.insert(column.name().to_string(), value);
    }

    Value::Object(object)
}

fn decode_column(row: &MySqlRow, index: usize, kind: ColumnKind) -> Value {
    let is_null: bool = row.try_get_raw(index).map(|raw| raw.is_null()).unwrap_or(true);
    if is_null {
        return Value::Null;
    }

    let decoded: Option<Value> = match kind {
        ColumnKind::Null => return Value::Null,
        ColumnKind::Boolean => decode::<bool>(row, index).map(Value::Bool),
        ColumnKind::Signed => decode::<i64>(row, index).map(Value::from),
        ColumnKind::Unsigned => decode::<u64>(row, index).map(Value::from),
        ColumnKind::Float => decode::<f32>(row, index).map(|v: f32| Value::from(f64::from(v))),
        ColumnKind::Double => decode::<f64>(row, index).map(Value::from),
        ColumnKind::Json => decode::<Value>(row, index),
        ColumnKind::Date => decode::<NaiveDate>(row, index).map(|d: NaiveDate| Value::String(d.to_string())),
        ColumnKind::DateTime => decode::<NaiveDateTime>(row, index).map(iso_string),
        ColumnKind::Timestamp => decode::<DateTime<Utc>>(row, index).map(|d: DateTime<Utc>| iso_string(d.naive_utc())),
        ColumnKind::Binary => decode::<Vec<u8>>(row, index).map(buffer),
        ColumnKind::Text => None,
    };

    decoded
        .or_else(|| decode_text(row, index))
        .unwrap_or(Value::Null)
}

fn decode<'r, T>(row: &'r MySqlRow, index: usize) -> Option<T>
where
    T: Decode<'r, MySql> + Type<MySql>,
{
    row.try_get(index).ok()
}

// Text-protocol values are UTF-8 text whatever the column type
fn decode_text(row: &MySqlRow, index: usize) -> Option<Value> {
    row.try_get_unchecked::<String, _>(index).ok().map(Value::String)
}
