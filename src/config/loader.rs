//! Load config from a JSON file or string, then apply environment overrides.

use crate::config::AppConfig;
use crate::error::ConfigError;
use std::path::Path;

/// Env var naming the config file. Default `config/shop.json`.
pub const CONFIG_PATH_ENV: &str = "SHOP_CONFIG";
/// Env var overriding `database.active`.
pub const ACTIVE_BACKEND_ENV: &str = "SHOP_ACTIVE_BACKEND";

pub fn config_path() -> String {
    std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "config/shop.json".into())
}

pub fn from_json_str(raw: &str) -> Result<AppConfig, ConfigError> {
    serde_json::from_str(raw).map_err(|e| ConfigError::Load(format!("invalid config json: {}", e)))
}

/// Read and parse the config file, then apply env overrides.
pub async fn load_from_path(path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    let mut config = from_json_str(&raw)?;
    apply_env_overrides(&mut config);
    Ok(config)
}

pub fn apply_env_overrides(config: &mut AppConfig) {
    if let Ok(active) = std::env::var(ACTIVE_BACKEND_ENV) {
        let active = active.trim();
        if !active.is_empty() {
            tracing::info!(active = %active, "active backend overridden from environment");
            config.database.active = Some(active.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shop.json");
        tokio::fs::write(
            &path,
            r#"{ "database": { "databases": [
                { "name": "MariaDb", "connection_string": "postgres://localhost/shop" },
                { "name": "Sqlite", "connection_string": "sqlite://shop.db" }
            ], "active": "Sqlite" } }"#,
        )
        .await
        .unwrap();

        let config = load_from_path(&path).await.unwrap();
        assert_eq!(config.database.databases.len(), 2);
    }

    #[tokio::test]
    async fn missing_file_is_load_error() {
        let err = load_from_path("/definitely/not/here.json").await.unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }

    #[tokio::test]
    async fn shipped_sample_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/shop.json");
        let config = load_from_path(&path).await.unwrap();
        let catalog = crate::catalog::BackendCatalog::load(&config.database).unwrap();
        let server = catalog.get("MariaDb").unwrap();
        assert_eq!(server.kind, crate::config::BackendKind::RelationalServer);
        assert!(server.connection_string.starts_with("postgres://"));
        let embedded = catalog.get("Sqlite").unwrap();
        assert_eq!(embedded.connection_string, "sqlite://data/shop.db?mode=rwc");
    }

    #[test]
    fn malformed_json_is_load_error() {
        assert!(matches!(from_json_str("{ nope"), Err(ConfigError::Load(_))));
    }
}
