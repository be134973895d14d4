//! Backend catalog: the validated, immutable set of configured backends.

use crate::config::{resolve_kind, validate, BackendKind, DatabaseConfig};
use crate::error::ConfigError;
use serde::Serialize;
use std::sync::Arc;

/// One configured backend. Immutable once loaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendDescriptor {
    pub name: String,
    pub connection_string: String,
    pub kind: BackendKind,
}

/// Public view of a descriptor; never carries the connection string.
#[derive(Clone, Debug, Serialize)]
pub struct BackendSummary {
    pub name: String,
    pub kind: BackendKind,
}

impl From<&BackendDescriptor> for BackendSummary {
    fn from(d: &BackendDescriptor) -> Self {
        BackendSummary {
            name: d.name.clone(),
            kind: d.kind,
        }
    }
}

/// Ordered, name-unique list of backends. Safe to share across threads without locking.
#[derive(Debug)]
pub struct BackendCatalog {
    entries: Vec<Arc<BackendDescriptor>>,
    default_active: usize,
}

impl BackendCatalog {
    /// Validate the `database` section and build the catalog. Any error here aborts startup.
    pub fn load(config: &DatabaseConfig) -> Result<Self, ConfigError> {
        validate(config)?;

        let mut entries = Vec::with_capacity(config.databases.len());
        for entry in &config.databases {
            let (kind, connection_string) = resolve_kind(entry)?;
            entries.push(Arc::new(BackendDescriptor {
                name: entry.name.clone(),
                connection_string,
                kind,
            }));
        }

        let default_active = match &config.active {
            Some(name) => entries
                .iter()
                .position(|d| &d.name == name)
                .ok_or_else(|| ConfigError::UnknownActive(name.clone()))?,
            None => 0,
        };

        Ok(BackendCatalog {
            entries,
            default_active,
        })
    }

    pub fn get(&self, name: &str) -> Option<&Arc<BackendDescriptor>> {
        self.entries.iter().find(|d| d.name == name)
    }

    pub fn contains(&self, descriptor: &BackendDescriptor) -> bool {
        self.entries.iter().any(|d| d.as_ref() == descriptor)
    }

    /// The backend designated active by configuration.
    pub fn default_active(&self) -> &Arc<BackendDescriptor> {
        &self.entries[self.default_active]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<BackendDescriptor>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{from_json_str, BackendEntry, PolicyKind, PoolSettings};

    #[test]
    fn loads_with_configured_active() {
        let config = from_json_str(
            r#"{ "database": { "databases": [
                { "name": "MariaDb", "connection_string": "postgres://localhost/shop" },
                { "name": "Sqlite", "connection_string": "Data Source=shop.db" }
            ], "active": "Sqlite" } }"#,
        )
        .unwrap();
        let catalog = BackendCatalog::load(&config.database).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.default_active().name, "Sqlite");
        assert_eq!(catalog.default_active().kind, BackendKind::EmbeddedFile);
        assert_eq!(catalog.get("MariaDb").unwrap().kind, BackendKind::RelationalServer);
        assert!(catalog.get("Postgres").is_none());
    }

    #[test]
    fn first_entry_is_default_active() {
        let config = DatabaseConfig {
            databases: vec![BackendEntry {
                name: "Only".into(),
                connection_string: "sqlite://only.db".into(),
                kind: None,
            }],
            active: None,
            required: vec![],
            policy: PolicyKind::Static,
            pool: PoolSettings::default(),
        };
        let catalog = BackendCatalog::load(&config).unwrap();
        assert_eq!(catalog.default_active().name, "Only");
    }

    #[test]
    fn missing_required_fails_load() {
        let config = from_json_str(
            r#"{ "database": { "databases": [
                { "name": "Sqlite", "connection_string": "sqlite://shop.db" }
            ] } }"#,
        )
        .unwrap();
        let err = BackendCatalog::load(&config.database).unwrap_err();
        assert!(err.to_string().contains("MariaDb"));
    }
}
