//! Versioned schema migrations, applied to every configured backend at startup.
//! Each kind has its own append-only list; applied versions are recorded in
//! `_schema_migrations`, so re-running is a no-op.

use crate::catalog::{BackendCatalog, BackendDescriptor};
use crate::config::BackendKind;
use crate::error::MigrationError;
use sqlx::postgres::PgConnectOptions;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Connection, PgConnection, SqliteConnection};
use std::str::FromStr;

pub const LEDGER_TABLE: &str = "_schema_migrations";

#[derive(Debug)]
pub struct Migration {
    pub version: i64,
    pub description: &'static str,
    pub statements: &'static [&'static str],
}

pub static SERVER_MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create categories and products",
        statements: &[
            r#"CREATE TABLE IF NOT EXISTS categories (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT
            )"#,
            r#"CREATE TABLE IF NOT EXISTS products (
                id TEXT PRIMARY KEY,
                category_id TEXT NOT NULL REFERENCES categories(id),
                name TEXT NOT NULL,
                description TEXT,
                price_cents BIGINT NOT NULL CHECK (price_cents >= 0),
                stock BIGINT NOT NULL DEFAULT 0
            )"#,
            "CREATE INDEX IF NOT EXISTS idx_products_category ON products(category_id)",
        ],
    },
    Migration {
        version: 2,
        description: "create users",
        statements: &[r#"CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                display_name TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                is_admin BOOLEAN NOT NULL DEFAULT FALSE
            )"#],
    },
    Migration {
        version: 3,
        description: "create orders",
        statements: &[
            r#"CREATE TABLE IF NOT EXISTS orders (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id),
                product_id TEXT NOT NULL REFERENCES products(id),
                quantity BIGINT NOT NULL CHECK (quantity > 0),
                total_cents BIGINT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL
            )"#,
            "CREATE INDEX IF NOT EXISTS idx_orders_user ON orders(user_id)",
        ],
    },
];

pub static EMBEDDED_MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create categories and products",
        statements: &[
            r#"CREATE TABLE IF NOT EXISTS categories (
                id TEXT PRIMARY KEY NOT NULL,
                name TEXT NOT NULL,
                description TEXT
            )"#,
            r#"CREATE TABLE IF NOT EXISTS products (
                id TEXT PRIMARY KEY NOT NULL,
                category_id TEXT NOT NULL REFERENCES categories(id),
                name TEXT NOT NULL,
                description TEXT,
                price_cents INTEGER NOT NULL CHECK (price_cents >= 0),
                stock INTEGER NOT NULL DEFAULT 0
            )"#,
            "CREATE INDEX IF NOT EXISTS idx_products_category ON products(category_id)",
        ],
    },
    Migration {
        version: 2,
        description: "create users",
        statements: &[r#"CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY NOT NULL,
                email TEXT NOT NULL UNIQUE,
                display_name TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                is_admin BOOLEAN NOT NULL DEFAULT 0
            )"#],
    },
    Migration {
        version: 3,
        description: "create orders",
        statements: &[
            r#"CREATE TABLE IF NOT EXISTS orders (
                id TEXT PRIMARY KEY NOT NULL,
                user_id TEXT NOT NULL REFERENCES users(id),
                product_id TEXT NOT NULL REFERENCES products(id),
                quantity INTEGER NOT NULL CHECK (quantity > 0),
                total_cents INTEGER NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL
            )"#,
            "CREATE INDEX IF NOT EXISTS idx_orders_user ON orders(user_id)",
        ],
    },
];

pub fn migrations_for(kind: BackendKind) -> &'static [Migration] {
    match kind {
        BackendKind::RelationalServer => SERVER_MIGRATIONS,
        BackendKind::EmbeddedFile => EMBEDDED_MIGRATIONS,
    }
}

#[derive(Clone, Debug)]
pub struct MigrationReport {
    pub backend: String,
    pub kind: BackendKind,
    /// Versions applied by this run, ascending. Empty when the schema was already current.
    pub applied: Vec<i64>,
}

/// Migrate every backend in the catalog, in catalog order. The first failure aborts.
pub async fn migrate_all(catalog: &BackendCatalog) -> Result<Vec<MigrationReport>, MigrationError> {
    let mut reports = Vec::with_capacity(catalog.len());
    for descriptor in catalog.iter() {
        let report = migrate_backend(descriptor).await?;
        tracing::info!(
            backend = %report.backend,
            kind = %report.kind,
            applied = ?report.applied,
            "backend schema is current"
        );
        reports.push(report);
    }
    Ok(reports)
}

pub async fn migrate_backend(descriptor: &BackendDescriptor) -> Result<MigrationReport, MigrationError> {
    let applied = match descriptor.kind {
        BackendKind::RelationalServer => migrate_server(descriptor).await?,
        BackendKind::EmbeddedFile => migrate_embedded(descriptor).await?,
    };
    Ok(MigrationReport {
        backend: descriptor.name.clone(),
        kind: descriptor.kind,
        applied,
    })
}

/// Create the ledger, read applied versions, then run each pending migration in its own
/// transaction together with its ledger row.
macro_rules! apply_pending {
    ($conn:expr, $descriptor:expr, $insert_ledger:expr) => {{
        let conn = $conn;
        let backend = &$descriptor.name;
        let create_ledger = format!(
            "CREATE TABLE IF NOT EXISTS {} (version BIGINT PRIMARY KEY, description TEXT NOT NULL, applied_at TEXT NOT NULL)",
            LEDGER_TABLE
        );
        sqlx::query(&create_ledger)
            .execute(&mut *conn)
            .await
            .map_err(|source| MigrationError::Apply {
                backend: backend.clone(),
                version: 0,
                description: "create migration ledger",
                source,
            })?;
        let done: Vec<i64> = sqlx::query_scalar(&format!("SELECT version FROM {}", LEDGER_TABLE))
            .fetch_all(&mut *conn)
            .await
            .map_err(|source| MigrationError::Apply {
                backend: backend.clone(),
                version: 0,
                description: "read migration ledger",
                source,
            })?;

        let mut applied = Vec::new();
        for m in migrations_for($descriptor.kind).iter().filter(|m| !done.contains(&m.version)) {
            let fail = |source| MigrationError::Apply {
                backend: backend.clone(),
                version: m.version,
                description: m.description,
                source,
            };
            let mut tx = conn.begin().await.map_err(fail)?;
            for stmt in m.statements {
                sqlx::query(stmt).execute(&mut *tx).await.map_err(fail)?;
            }
            sqlx::query($insert_ledger)
                .bind(m.version)
                .bind(m.description)
                .bind(chrono::Utc::now().to_rfc3339())
                .execute(&mut *tx)
                .await
                .map_err(fail)?;
            tx.commit().await.map_err(fail)?;
            tracing::debug!(backend = %backend, version = m.version, description = m.description, "migration applied");
            applied.push(m.version);
        }
        applied
    }};
}

async fn migrate_server(descriptor: &BackendDescriptor) -> Result<Vec<i64>, MigrationError> {
    let connect_err = |source| MigrationError::Connect {
        backend: descriptor.name.clone(),
        source,
    };
    ensure_database_exists(&descriptor.connection_string)
        .await
        .map_err(connect_err)?;
    let mut conn = PgConnection::connect(&descriptor.connection_string)
        .await
        .map_err(connect_err)?;
    let applied = apply_pending!(
        &mut conn,
        descriptor,
        "INSERT INTO _schema_migrations (version, description, applied_at) VALUES ($1, $2, $3)"
    );
    let _ = conn.close().await;
    Ok(applied)
}

async fn migrate_embedded(descriptor: &BackendDescriptor) -> Result<Vec<i64>, MigrationError> {
    let connect_err = |source| MigrationError::Connect {
        backend: descriptor.name.clone(),
        source,
    };
    let options = SqliteConnectOptions::from_str(&descriptor.connection_string)
        .map_err(connect_err)?
        .create_if_missing(true);
    if let Some(parent) = options.get_filename().parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| MigrationError::Prepare {
                backend: descriptor.name.clone(),
                message: format!("create {}: {}", parent.display(), e),
            })?;
    }
    let mut conn: SqliteConnection = options.connect().await.map_err(connect_err)?;
    let applied = apply_pending!(
        &mut conn,
        descriptor,
        "INSERT INTO _schema_migrations (version, description, applied_at) VALUES (?, ?, ?)"
    );
    let _ = conn.close().await;
    Ok(applied)
}

/// Ensure the database in `database_url` exists; create it if not. Connects to the
/// default `postgres` database to run CREATE DATABASE.
async fn ensure_database_exists(database_url: &str) -> Result<(), sqlx::Error> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = PgConnectOptions::from_str(&admin_url)?;
    let mut conn: PgConnection = opts.connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists.0 {
        tracing::info!(database = %db_name, "creating database");
        sqlx::query(&format!("CREATE DATABASE {}", quote_ident(&db_name)))
            .execute(&mut conn)
            .await?;
    }
    let _ = conn.close().await;
    Ok(())
}

fn parse_db_name_from_url(url: &str) -> Result<(String, String), sqlx::Error> {
    let scheme_end = url.find("://").map(|i| i + 3).unwrap_or(0);
    let path_start = url[scheme_end..]
        .find('/')
        .map(|i| scheme_end + i + 1)
        .ok_or_else(|| sqlx::Error::Configuration("database url has no path".into()))?;
    let path_and_query = url.get(path_start..).unwrap_or("");
    let db_name = path_and_query.split('?').next().unwrap_or("").trim();
    let base = url.get(..path_start).unwrap_or(url);
    let admin_url = format!("{}postgres", base);
    Ok((admin_url, db_name.to_string()))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
