//! Builds a context for a backend descriptor, dispatching on its kind.
//! One pool per backend name, created on first use and shared by all later contexts.

use crate::catalog::BackendDescriptor;
use crate::config::{BackendKind, PoolSettings};
use crate::context::{EmbeddedContext, PersistenceContext, ServerContext};
use crate::error::ContextCreationError;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

pub struct ContextFactory {
    settings: PoolSettings,
    server_pools: RwLock<HashMap<String, PgPool>>,
    embedded_pools: RwLock<HashMap<String, SqlitePool>>,
}

impl ContextFactory {
    pub fn new(settings: PoolSettings) -> Self {
        ContextFactory {
            settings,
            server_pools: RwLock::new(HashMap::new()),
            embedded_pools: RwLock::new(HashMap::new()),
        }
    }

    /// Open a fresh context on `descriptor`. The context owns one pooled connection until dropped.
    pub async fn create(
        &self,
        descriptor: &Arc<BackendDescriptor>,
    ) -> Result<Box<dyn PersistenceContext>, ContextCreationError> {
        let connect_err = |source| ContextCreationError::Connect {
            backend: descriptor.name.clone(),
            source,
        };
        match descriptor.kind {
            BackendKind::RelationalServer => {
                let pool = self.server_pool(descriptor).await?;
                let conn = pool.acquire().await.map_err(connect_err)?;
                Ok(Box::new(ServerContext::new(Arc::clone(descriptor), conn)))
            }
            BackendKind::EmbeddedFile => {
                let pool = self.embedded_pool(descriptor).await?;
                let conn = pool.acquire().await.map_err(connect_err)?;
                Ok(Box::new(EmbeddedContext::new(Arc::clone(descriptor), conn)))
            }
        }
    }

    /// Round-trip `SELECT 1` against the backend.
    pub async fn ping(&self, descriptor: &Arc<BackendDescriptor>) -> Result<(), ContextCreationError> {
        let connect_err = |source| ContextCreationError::Connect {
            backend: descriptor.name.clone(),
            source,
        };
        match descriptor.kind {
            BackendKind::RelationalServer => {
                let pool = self.server_pool(descriptor).await?;
                sqlx::query("SELECT 1").execute(&pool).await.map_err(connect_err)?;
            }
            BackendKind::EmbeddedFile => {
                let pool = self.embedded_pool(descriptor).await?;
                sqlx::query("SELECT 1").execute(&pool).await.map_err(connect_err)?;
            }
        }
        Ok(())
    }

    /// Close every pool. Contexts still alive keep their connection until dropped.
    pub async fn close(&self) {
        let server: Vec<PgPool> = self
            .server_pools
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, p)| p)
            .collect();
        let embedded: Vec<SqlitePool> = self
            .embedded_pools
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, p)| p)
            .collect();
        for pool in server {
            pool.close().await;
        }
        for pool in embedded {
            pool.close().await;
        }
    }

    fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.acquire_timeout_secs)
    }

    async fn server_pool(&self, descriptor: &BackendDescriptor) -> Result<PgPool, ContextCreationError> {
        let cached = self
            .server_pools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&descriptor.name)
            .cloned();
        if let Some(pool) = cached {
            return Ok(pool);
        }

        let options = PgConnectOptions::from_str(&descriptor.connection_string).map_err(|source| {
            ContextCreationError::InvalidConnectionString {
                backend: descriptor.name.clone(),
                source,
            }
        })?;
        let pool = PgPoolOptions::new()
            .max_connections(self.settings.max_connections)
            .acquire_timeout(self.acquire_timeout())
            .connect_with(options)
            .await
            .map_err(|source| ContextCreationError::Connect {
                backend: descriptor.name.clone(),
                source,
            })?;
        tracing::info!(backend = %descriptor.name, "server pool opened");

        let mut pools = self.server_pools.write().unwrap_or_else(PoisonError::into_inner);
        Ok(pools.entry(descriptor.name.clone()).or_insert(pool).clone())
    }

    async fn embedded_pool(&self, descriptor: &BackendDescriptor) -> Result<SqlitePool, ContextCreationError> {
        let cached = self
            .embedded_pools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&descriptor.name)
            .cloned();
        if let Some(pool) = cached {
            return Ok(pool);
        }

        let options = SqliteConnectOptions::from_str(&descriptor.connection_string)
            .map_err(|source| ContextCreationError::InvalidConnectionString {
                backend: descriptor.name.clone(),
                source,
            })?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(self.settings.max_connections)
            .acquire_timeout(self.acquire_timeout())
            .connect_with(options)
            .await
            .map_err(|source| ContextCreationError::Connect {
                backend: descriptor.name.clone(),
                source,
            })?;
        tracing::info!(backend = %descriptor.name, "embedded pool opened");

        let mut pools = self.embedded_pools.write().unwrap_or_else(PoisonError::into_inner);
        Ok(pools.entry(descriptor.name.clone()).or_insert(pool).clone())
    }
}
