// =============================================================================
// CONNECTION REGISTRY - one cached connection per tenant
// =============================================================================

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::connection::{ConnectionParams, Connector, TenantConnection};
use crate::utils::error::GatewayError;

/// A tenant's cached connection. `None` until first use and after verification.
type Slot = Arc<Mutex<Option<Box<dyn TenantConnection>>>>;

/// Maps tenant keys to their cached connection.
/// Each slot is locked for the whole acquire/execute or acquire/close sequence,
/// so requests for the same tenant run one at a time while different tenants
/// proceed concurrently. Slots are emptied, never removed.
#[derive(Clone)]
pub struct ConnectionRegistry {
    connector: Arc<dyn Connector>,
    slots: Arc<RwLock<HashMap<String, Slot>>>,
}

impl fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("connector", &self.connector)
            .finish_non_exhaustive()
    }
}

impl ConnectionRegistry {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            slots: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Runs one statement on the tenant's connection, opening it first if needed
    pub async fn execute(
        &self,
        tenant: &str,
        params: &ConnectionParams,
        sql: &str,
    ) -> Result<Value, GatewayError> {
        let slot: Slot = self.slot(tenant).await;
        let mut guard = slot.lock().await;

        let conn: &mut Box<dyn TenantConnection> = self
            .acquire(&mut guard, tenant, params)
            .await
            .map_err(GatewayError::Connect)?;

        debug!(tenant, connection_id = %conn.id(), "Executing query: {}", sql);

        conn.query(sql).await.map_err(GatewayError::Query)
    }

    /// Opens (or reuses) the tenant's connection, then closes it and clears the slot
    pub async fn verify(&self, tenant: &str, params: &ConnectionParams) -> Result<(), GatewayError> {
        let slot: Slot = self.slot(tenant).await;
        let mut guard = slot.lock().await;

        self.acquire(&mut guard, tenant, params)
            .await
            .map_err(GatewayError::Unverified)?;

        if let Some(conn) = guard.take() {
            let id: uuid::Uuid = conn.id();
            match conn.close().await {
                Ok(()) => info!(tenant, connection_id = %id, "Verified connection closed"),
                Err(e) => warn!(tenant, connection_id = %id, "Error closing verified connection: {}", e),
            }
        }

        Ok(())
    }

    /// Tenants that currently hold an open connection
    pub async fn open_tenants(&self) -> Vec<String> {
        let slots: Vec<(String, Slot)> = {
            let map = self.slots.read().await;
            map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        };

        let mut open: Vec<String> = Vec::new();
        for (tenant, slot) in slots {
            if slot.lock().await.is_some() {
                open.push(tenant);
            }
        }
        open.sort();
        open
    }

    /// Closes every cached connection. Called once at shutdown.
    pub async fn close_all(&self) {
        let slots: Vec<(String, Slot)> = {
            let map = self.slots.read().await;
            map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        };

        for (tenant, slot) in slots {
            if let Some(conn) = slot.lock().await.take() {
                info!(tenant = %tenant, "Closing connection...");
                if let Err(e) = conn.close().await {
                    warn!(tenant = %tenant, "Error closing connection: {}", e);
                }
            }
        }
    }

    async fn slot(&self, tenant: &str) -> Slot {
        {
            let slots = self.slots.read().await;
            if let Some(slot) = slots.get(tenant) {
                return slot.clone();
            }
        }

        let mut slots = self.slots.write().await;
        slots.entry(tenant.to_string()).or_default().clone()
    }

    async fn acquire<'a>(
        &self,
        slot: &'a mut Option<Box<dyn TenantConnection>>,
        tenant: &str,
        params: &ConnectionParams,
    ) -> Result<&'a mut Box<dyn TenantConnection>, sqlx::Error> {
        if let Some(mut conn) = slot.take() {
            if conn.is_connected() && conn.check().await {
                debug!(tenant, connection_id = %conn.id(), "Reusing existing connection");
                return Ok(slot.insert(conn));
            }
            warn!(tenant, connection_id = %conn.id(), "Cached connection is disconnected. Will recreate.");
        }

        info!(tenant, host = %params.host, database = %params.database, "Opening new connection");
        let conn: Box<dyn TenantConnection> = self.connector.connect(params).await?;

        Ok(slot.insert(conn))
    }
}
