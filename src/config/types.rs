//! Raw config types matching the JSON document (`database` section).
//! PascalCase aliases let an existing appsettings-style file be used as-is.

use serde::{Deserialize, Serialize};

/// Backend names the shop needs at runtime unless the config overrides `required`.
pub const DEFAULT_REQUIRED_BACKENDS: &[&str] = &["MariaDb", "Sqlite"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Server-based store, reached over the PostgreSQL wire protocol.
    #[serde(alias = "RelationalServer", alias = "server")]
    RelationalServer,
    /// File-based SQLite store.
    #[serde(alias = "EmbeddedFile", alias = "embedded")]
    EmbeddedFile,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::RelationalServer => f.write_str("relational_server"),
            BackendKind::EmbeddedFile => f.write_str("embedded_file"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BackendEntry {
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(alias = "ConnectionString")]
    pub connection_string: String,
    /// Inferred from the connection string when omitted.
    #[serde(default, alias = "Kind")]
    pub kind: Option<BackendKind>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    #[default]
    Static,
    Fallback,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoolSettings {
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    5
}

fn default_acquire_timeout_secs() -> u64 {
    30
}

impl Default for PoolSettings {
    fn default() -> Self {
        PoolSettings {
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(alias = "Databases")]
    pub databases: Vec<BackendEntry>,
    #[serde(default, alias = "Active")]
    pub active: Option<String>,
    #[serde(default = "default_required", alias = "Required")]
    pub required: Vec<String>,
    #[serde(default)]
    pub policy: PolicyKind,
    #[serde(default)]
    pub pool: PoolSettings,
}

fn default_required() -> Vec<String> {
    DEFAULT_REQUIRED_BACKENDS.iter().map(|s| s.to_string()).collect()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(alias = "Database")]
    pub database: DatabaseConfig,
}
