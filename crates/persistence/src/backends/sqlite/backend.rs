//! Connection pool and configuration for the SQLite backend.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{BackendError, StorageError, StorageResult};

use super::schema;

/// SQLite store for institutions, memberships, academic records and audit.
#[derive(Clone)]
pub struct SqliteBackend {
    pool: Pool<SqliteConnectionManager>,
    config: SqliteBackendConfig,
    is_memory: bool,
}

impl fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("config", &self.config)
            .field("is_memory", &self.is_memory)
            .finish_non_exhaustive()
    }
}

/// Pool and connection settings.
///
/// Missing fields take their [`Default`] values when deserialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteBackendConfig {
    /// Pool size. A `:memory:` database always gets exactly one connection,
    /// since each connection would see its own empty database.
    pub max_connections: u32,
    /// Idle connections kept open; clamped to `max_connections`.
    pub min_connections: u32,
    /// How long to wait for a pooled connection, in milliseconds.
    pub connection_timeout_ms: u64,
    /// How long a writer waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u32,
    /// Use write-ahead logging for file databases.
    pub enable_wal: bool,
    /// Turn on `PRAGMA foreign_keys`.
    pub enable_foreign_keys: bool,
}

impl Default for SqliteBackendConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            connection_timeout_ms: 30_000,
            busy_timeout_ms: 5_000,
            enable_wal: true,
            enable_foreign_keys: true,
        }
    }
}

fn connection_failed<E: ToString>(e: E) -> StorageError {
    StorageError::Backend(BackendError::ConnectionFailed {
        backend_name: "sqlite".to_string(),
        message: e.to_string(),
    })
}

impl SqliteBackend {
    /// A private database that disappears with the backend.
    pub fn in_memory() -> StorageResult<Self> {
        Self::with_config(":memory:", SqliteBackendConfig::default())
    }

    /// Opens (or creates) the database file at `path` with default settings.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        Self::with_config(path, SqliteBackendConfig::default())
    }

    /// Opens `path` (`:memory:` for a private database) with `config`.
    pub fn with_config<P: AsRef<Path>>(
        path: P,
        mut config: SqliteBackendConfig,
    ) -> StorageResult<Self> {
        let path_str = path.as_ref().to_string_lossy();
        let is_memory = path_str == ":memory:";
        if is_memory {
            config.max_connections = 1;
        }
        config.min_connections = config.min_connections.min(config.max_connections);

        let busy_timeout = Duration::from_millis(config.busy_timeout_ms as u64);
        let foreign_keys = config.enable_foreign_keys;
        let wal = config.enable_wal && !is_memory;

        let manager = SqliteConnectionManager::file(path.as_ref()).with_init(move |conn| {
            conn.busy_timeout(busy_timeout)?;
            if foreign_keys {
                conn.execute_batch("PRAGMA foreign_keys = ON")?;
            }
            if wal {
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
            }
            Ok(())
        });

        let pool = Pool::builder()
            .max_size(config.max_connections)
            .min_idle(Some(config.min_connections))
            .connection_timeout(Duration::from_millis(config.connection_timeout_ms))
            .build(manager)
            .map_err(connection_failed)?;

        info!(
            path = %path_str,
            max_connections = config.max_connections,
            wal,
            "opened sqlite backend"
        );

        Ok(Self {
            pool,
            config,
            is_memory,
        })
    }

    /// Creates the tables if they do not exist. Safe to call repeatedly.
    pub fn init_schema(&self) -> StorageResult<()> {
        let conn = self.get_connection()?;
        schema::initialize_schema(&conn)
    }

    pub(crate) fn get_connection(
        &self,
    ) -> StorageResult<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(connection_failed)
    }

    pub(crate) fn pool(&self) -> &Pool<SqliteConnectionManager> {
        &self.pool
    }

    /// `true` for `:memory:` databases.
    pub fn is_memory(&self) -> bool {
        self.is_memory
    }

    /// The effective configuration, after in-memory adjustments.
    pub fn config(&self) -> &SqliteBackendConfig {
        &self.config
    }
}
