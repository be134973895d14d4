//! Config validation: backend names, connection strings, required backends.

use crate::config::{BackendEntry, BackendKind, DatabaseConfig};
use crate::error::ConfigError;
use std::collections::HashSet;

pub fn validate(config: &DatabaseConfig) -> Result<(), ConfigError> {
    let mut names = HashSet::new();
    for (i, entry) in config.databases.iter().enumerate() {
        if entry.name.trim().is_empty() {
            return Err(ConfigError::EmptyName(i));
        }
        if entry.connection_string.trim().is_empty() {
            return Err(ConfigError::EmptyConnectionString(entry.name.clone()));
        }
        if !names.insert(entry.name.as_str()) {
            return Err(ConfigError::DuplicateName(entry.name.clone()));
        }
        resolve_kind(entry)?;
    }

    for required in &config.required {
        if !names.contains(required.as_str()) {
            return Err(ConfigError::MissingBackend(required.clone()));
        }
    }

    if config.databases.is_empty() {
        return Err(ConfigError::Load("no backends configured".into()));
    }

    if let Some(active) = &config.active {
        if !names.contains(active.as_str()) {
            return Err(ConfigError::UnknownActive(active.clone()));
        }
    }

    Ok(())
}

/// Kind and normalised connection URL for one entry. The scheme decides the kind; an
/// explicit `kind` must agree with it and is only needed when the scheme is unknown.
/// ADO-style `Data Source=<file>` strings become SQLite URLs.
pub fn resolve_kind(entry: &BackendEntry) -> Result<(BackendKind, String), ConfigError> {
    let raw = entry.connection_string.trim();
    let lower = raw.to_ascii_lowercase();

    let inferred = if lower.starts_with("postgres://") || lower.starts_with("postgresql://") {
        Some((BackendKind::RelationalServer, raw.to_string()))
    } else if lower.starts_with("sqlite:") {
        Some((BackendKind::EmbeddedFile, raw.to_string()))
    } else {
        data_source_file(raw).map(|file| (BackendKind::EmbeddedFile, format!("sqlite://{}?mode=rwc", file)))
    };

    let (kind, url) = match (entry.kind, inferred) {
        (Some(kind), Some((found, _))) if kind != found => {
            return Err(ConfigError::KindMismatch {
                name: entry.name.clone(),
                kind,
                inferred: found,
            })
        }
        (_, Some(found)) => found,
        (Some(kind), None) => (kind, raw.to_string()),
        (None, None) => {
            return Err(ConfigError::UnknownKind {
                name: entry.name.clone(),
                connection: raw.to_string(),
            })
        }
    };

    // Every pooled connection to an in-memory database opens its own empty store, so
    // a migrated schema would never be visible to contexts.
    if kind == BackendKind::EmbeddedFile && is_in_memory(&url) {
        return Err(ConfigError::InMemoryEmbedded(entry.name.clone()));
    }
    Ok((kind, url))
}

fn is_in_memory(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.contains(":memory:") || lower.contains("mode=memory")
}

fn data_source_file(raw: &str) -> Option<String> {
    raw.split(';').find_map(|part| {
        let (key, value) = part.split_once('=')?;
        let key = key.trim().to_ascii_lowercase();
        if matches!(key.as_str(), "data source" | "datasource" | "filename") {
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_string())
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PolicyKind, PoolSettings};

    fn entry(name: &str, conn: &str) -> BackendEntry {
        BackendEntry {
            name: name.into(),
            connection_string: conn.into(),
            kind: None,
        }
    }

    fn config(entries: Vec<BackendEntry>) -> DatabaseConfig {
        DatabaseConfig {
            databases: entries,
            active: None,
            required: vec!["MariaDb".into(), "Sqlite".into()],
            policy: PolicyKind::Static,
            pool: PoolSettings::default(),
        }
    }

    #[test]
    fn valid_pair_passes() {
        let c = config(vec![
            entry("MariaDb", "postgres://localhost/shop"),
            entry("Sqlite", "sqlite://shop.db"),
        ]);
        assert!(validate(&c).is_ok());
    }

    #[test]
    fn missing_required_is_named() {
        let c = config(vec![entry("MariaDb", "postgres://localhost/shop")]);
        match validate(&c) {
            Err(ConfigError::MissingBackend(name)) => assert_eq!(name, "Sqlite"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn duplicate_and_empty_entries_rejected() {
        let dup = config(vec![
            entry("MariaDb", "postgres://a/b"),
            entry("MariaDb", "postgres://c/d"),
        ]);
        assert!(matches!(validate(&dup), Err(ConfigError::DuplicateName(n)) if n == "MariaDb"));

        let empty = config(vec![entry("MariaDb", "  ")]);
        assert!(matches!(validate(&empty), Err(ConfigError::EmptyConnectionString(_))));

        let unnamed = config(vec![entry("", "postgres://a/b")]);
        assert!(matches!(validate(&unnamed), Err(ConfigError::EmptyName(0))));
    }

    #[test]
    fn unknown_active_rejected() {
        let mut c = config(vec![
            entry("MariaDb", "postgres://localhost/shop"),
            entry("Sqlite", "sqlite://shop.db"),
        ]);
        c.active = Some("Postgres".into());
        assert!(matches!(validate(&c), Err(ConfigError::UnknownActive(n)) if n == "Postgres"));
    }

    #[test]
    fn kind_inference() {
        let (kind, url) = resolve_kind(&entry("a", "postgresql://u@h/db")).unwrap();
        assert_eq!(kind, BackendKind::RelationalServer);
        assert_eq!(url, "postgresql://u@h/db");

        let (kind, url) = resolve_kind(&entry("b", "Data Source=data/shop.db;Cache=Shared")).unwrap();
        assert_eq!(kind, BackendKind::EmbeddedFile);
        assert_eq!(url, "sqlite://data/shop.db?mode=rwc");

        assert!(matches!(
            resolve_kind(&entry("d", "Server=localhost;Database=shop")),
            Err(ConfigError::UnknownKind { .. })
        ));

        let mut explicit = entry("e", "mysql-ish");
        explicit.kind = Some(BackendKind::RelationalServer);
        assert_eq!(resolve_kind(&explicit).unwrap().0, BackendKind::RelationalServer);

        let mut agreeing = entry("f", "sqlite://shop.db");
        agreeing.kind = Some(BackendKind::EmbeddedFile);
        assert_eq!(resolve_kind(&agreeing).unwrap().1, "sqlite://shop.db");
    }

    #[test]
    fn explicit_kind_must_match_scheme() {
        let mut server_on_file = entry("MariaDb", "sqlite://x.db");
        server_on_file.kind = Some(BackendKind::RelationalServer);
        match resolve_kind(&server_on_file) {
            Err(ConfigError::KindMismatch { name, kind, inferred }) => {
                assert_eq!(name, "MariaDb");
                assert_eq!(kind, BackendKind::RelationalServer);
                assert_eq!(inferred, BackendKind::EmbeddedFile);
            }
            other => panic!("unexpected: {:?}", other),
        }

        let mut file_on_server = entry("Sqlite", "postgres://localhost/shop");
        file_on_server.kind = Some(BackendKind::EmbeddedFile);
        let c = config(vec![entry("MariaDb", "postgres://localhost/shop"), file_on_server]);
        assert!(matches!(validate(&c), Err(ConfigError::KindMismatch { name, .. }) if name == "Sqlite"));
    }

    #[test]
    fn in_memory_sqlite_rejected() {
        for conn in ["Data Source=:memory:", "sqlite::memory:", "sqlite://shop?mode=memory&cache=shared"] {
            let c = config(vec![entry("MariaDb", "postgres://localhost/shop"), entry("Sqlite", conn)]);
            assert!(
                matches!(validate(&c), Err(ConfigError::InMemoryEmbedded(ref n)) if n == "Sqlite"),
                "{}",
                conn
            );
        }
    }
}
