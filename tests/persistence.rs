//! Catalog → migration → selection → context, end to end against SQLite files.

use serde_json::json;
use shop_data::config::{from_json_str, PoolSettings};
use shop_data::{
    bootstrap, migrate_all, migrate_backend, BackendCatalog, BackendKind, CancellationToken, Category,
    ConfigError, ContextCreationError, ContextFactory, ListQuery, Order, OrderStatus, PersistenceError, Product,
    SelectionError, StartupError, User,
};
use sqlx::{Connection, SqliteConnection};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn sqlite_url(dir: &Path, file: &str) -> String {
    format!("sqlite://{}?mode=rwc", dir.join(file).display())
}

/// Two SQLite files named like the production pair, `Sqlite` active.
fn two_file_config(dir: &TempDir) -> shop_data::AppConfig {
    let raw = json!({
        "database": {
            "databases": [
                { "name": "MariaDb", "connection_string": sqlite_url(dir.path(), "primary.db") },
                { "name": "Sqlite", "connection_string": sqlite_url(dir.path(), "embedded.db") }
            ],
            "active": "Sqlite"
        }
    });
    from_json_str(&raw.to_string()).unwrap()
}

/// `[MariaDb (server), Sqlite (file)]`, active `Sqlite`; only the SQLite file is migrated.
async fn scenario_catalog(dir: &TempDir) -> Arc<BackendCatalog> {
    let raw = json!({
        "database": {
            "databases": [
                { "name": "MariaDb", "connection_string": "postgres://shop@127.0.0.1:1/shop" },
                { "name": "Sqlite", "connection_string": sqlite_url(dir.path(), "shop.db") }
            ],
            "active": "Sqlite"
        }
    });
    let config = from_json_str(&raw.to_string()).unwrap();
    let catalog = Arc::new(BackendCatalog::load(&config.database).unwrap());
    migrate_backend(catalog.get("Sqlite").unwrap()).await.unwrap();
    catalog
}

fn factory() -> ContextFactory {
    ContextFactory::new(PoolSettings {
        max_connections: 2,
        acquire_timeout_secs: 2,
    })
}

#[tokio::test]
async fn adding_one_category_saves_one_row() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = scenario_catalog(&dir).await;
    let selector = shop_data::BackendSelector::new(Arc::clone(&catalog));
    let factory = factory();

    let active = selector.active();
    assert_eq!(active.name, "Sqlite");
    assert_eq!(active.kind, BackendKind::EmbeddedFile);

    let mut ctx = factory.create(&active).await.unwrap();
    assert_eq!(ctx.backend().name, "Sqlite");
    ctx.categories().add(&Category::new("Books")).unwrap();
    assert!(ctx.has_changes());

    let saved = ctx.save(&CancellationToken::new()).await.unwrap();
    assert_eq!(saved, 1);
    assert!(!ctx.has_changes());
}

#[tokio::test]
async fn save_without_changes_returns_zero() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = scenario_catalog(&dir).await;
    let factory = factory();

    let mut ctx = factory.create(catalog.default_active()).await.unwrap();
    assert_eq!(ctx.save(&CancellationToken::new()).await.unwrap(), 0);
}

#[tokio::test]
async fn unknown_backend_leaves_selection_alone() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = scenario_catalog(&dir).await;
    let selector = shop_data::BackendSelector::new(catalog);

    let err = selector.set_active("Postgres").unwrap_err();
    assert_eq!(err, SelectionError::UnknownBackend("Postgres".into()));
    assert_eq!(selector.active().name, "Sqlite");
}

#[tokio::test]
async fn unreachable_server_is_context_creation_error() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = scenario_catalog(&dir).await;
    let factory = factory();

    let err = match factory.create(catalog.get("MariaDb").unwrap()).await {
        Ok(_) => panic!("context on unreachable server"),
        Err(e) => e,
    };
    assert!(matches!(err, ContextCreationError::Connect { ref backend, .. } if backend == "MariaDb"));

    // The failure is per unit of work; the embedded backend still serves.
    let mut ctx = factory.create(catalog.get("Sqlite").unwrap()).await.unwrap();
    assert_eq!(ctx.categories().count().await.unwrap(), 0);
}

#[tokio::test]
async fn bootstrap_migrates_every_backend() {
    let dir = tempfile::tempdir().unwrap();
    let config = two_file_config(&dir);
    let state = bootstrap(&config).await.unwrap();
    assert_eq!(state.selector.active().name, "Sqlite");

    // Switching without restart lands on a schema-current backend.
    state.selector.set_active("MariaDb").unwrap();
    let mut ctx = state.context().await.unwrap();
    assert_eq!(ctx.backend().name, "MariaDb");
    ctx.categories().add(&Category::new("Garden")).unwrap();
    assert_eq!(ctx.save(&CancellationToken::new()).await.unwrap(), 1);
}

#[tokio::test]
async fn migrating_twice_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = two_file_config(&dir);
    let catalog = BackendCatalog::load(&config.database).unwrap();

    let first = migrate_all(&catalog).await.unwrap();
    assert!(first.iter().all(|r| r.applied == vec![1, 2, 3]));

    let second = migrate_all(&catalog).await.unwrap();
    assert_eq!(second.len(), 2);
    assert!(second.iter().all(|r| r.applied.is_empty()));
}

#[tokio::test]
async fn missing_required_backend_aborts_startup() {
    let dir = tempfile::tempdir().unwrap();
    let raw = json!({
        "database": {
            "databases": [
                { "name": "MariaDb", "connection_string": sqlite_url(dir.path(), "primary.db") }
            ]
        }
    });
    let config = from_json_str(&raw.to_string()).unwrap();
    match bootstrap(&config).await {
        Err(StartupError::Config(ConfigError::MissingBackend(name))) => assert_eq!(name, "Sqlite"),
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("startup succeeded without a required backend"),
    }
    // Validation runs before any migration touches the configured file.
    assert!(!dir.path().join("primary.db").exists());
}

#[tokio::test]
async fn in_memory_embedded_backend_aborts_startup() {
    let dir = tempfile::tempdir().unwrap();
    let raw = json!({
        "database": {
            "databases": [
                { "name": "MariaDb", "connection_string": sqlite_url(dir.path(), "primary.db") },
                { "name": "Sqlite", "connection_string": "Data Source=:memory:" }
            ],
            "active": "Sqlite"
        }
    });
    let config = from_json_str(&raw.to_string()).unwrap();
    match bootstrap(&config).await {
        Err(StartupError::Config(ConfigError::InMemoryEmbedded(name))) => assert_eq!(name, "Sqlite"),
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("in-memory backend accepted"),
    }
    assert!(!dir.path().join("primary.db").exists());
}

#[tokio::test]
async fn collections_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let state = bootstrap(&two_file_config(&dir)).await.unwrap();
    let token = CancellationToken::new();

    let category = Category::new("Books");
    let mut product = Product::new(&category.id, "The Rust Book", 3999);
    product.stock = 10;
    let user = User::new("ada@example.com", "Ada", "argon2-hash");
    let order = Order::new(&user.id, &product, 2);

    let mut ctx = state.context().await.unwrap();
    ctx.categories().add(&category).unwrap();
    ctx.products().add(&product).unwrap();
    ctx.users().add(&user).unwrap();
    ctx.orders().add(&order).unwrap();
    assert_eq!(ctx.save(&token).await.unwrap(), 4);
    drop(ctx);

    let mut ctx = state.context().await.unwrap();
    let loaded = ctx.orders().find(&order.id).await.unwrap().unwrap();
    assert_eq!(loaded.total_cents, 7998);
    assert_eq!(loaded.status, OrderStatus::Pending);
    assert_eq!(loaded.created_at, order.created_at);
    assert_eq!(ctx.users().find(&user.id).await.unwrap(), Some(user.clone()));

    let in_category = ctx
        .products()
        .list(&ListQuery::new().filter("category_id", category.id.clone()))
        .await
        .unwrap();
    assert_eq!(in_category, vec![product.clone()]);

    let mut paid = loaded.clone();
    paid.status = OrderStatus::Paid;
    ctx.orders().update(&paid).unwrap();
    ctx.orders().remove(&order.id);
    ctx.categories().add(&Category::new("Music")).unwrap();
    assert_eq!(ctx.save(&token).await.unwrap(), 3);

    assert!(ctx.orders().find(&order.id).await.unwrap().is_none());
    assert_eq!(ctx.categories().count().await.unwrap(), 2);
    assert!(ctx.categories().find("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn list_pages_in_key_order() {
    let dir = tempfile::tempdir().unwrap();
    let state = bootstrap(&two_file_config(&dir)).await.unwrap();
    let mut ctx = state.context().await.unwrap();
    for name in ["a", "b", "c", "d", "e"] {
        ctx.categories().add(&Category::new(name)).unwrap();
    }
    ctx.save(&CancellationToken::new()).await.unwrap();

    let all = ctx.categories().list(&ListQuery::new()).await.unwrap();
    assert_eq!(all.len(), 5);
    let page = ctx
        .categories()
        .list(&ListQuery::new().limit(2).offset(1))
        .await
        .unwrap();
    assert_eq!(page, all[1..3].to_vec());

    let err = ctx
        .categories()
        .list(&ListQuery::new().filter("colour", "red"))
        .await
        .unwrap_err();
    assert!(matches!(err, PersistenceError::InvalidQuery(_)));
}

#[tokio::test]
async fn missed_update_rolls_back_whole_save() {
    let dir = tempfile::tempdir().unwrap();
    let state = bootstrap(&two_file_config(&dir)).await.unwrap();
    let mut ctx = state.context().await.unwrap();

    ctx.categories().add(&Category::new("Kept out")).unwrap();
    ctx.categories().update(&Category::new("Never stored")).unwrap();
    let err = ctx.save(&CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, PersistenceError::Concurrency { entity: "category", .. }));

    assert!(ctx.has_changes());
    assert_eq!(ctx.categories().count().await.unwrap(), 0);
}

#[tokio::test]
async fn constraint_violation_commits_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let state = bootstrap(&two_file_config(&dir)).await.unwrap();
    let mut ctx = state.context().await.unwrap();

    ctx.categories().add(&Category::new("Tools")).unwrap();
    ctx.products().add(&Product::new("no-such-category", "Hammer", 1500)).unwrap();
    let err = ctx.save(&CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, PersistenceError::Db(_)));
    assert_eq!(ctx.categories().count().await.unwrap(), 0);
}

#[tokio::test]
async fn save_with_cancelled_token_leaves_store_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let state = bootstrap(&two_file_config(&dir)).await.unwrap();
    let mut ctx = state.context().await.unwrap();
    ctx.categories().add(&Category::new("Toys")).unwrap();

    let cancelled = CancellationToken::new();
    cancelled.cancel();
    let err = ctx.save(&cancelled).await.unwrap_err();
    assert!(matches!(err, PersistenceError::Cancelled));
    assert_eq!(ctx.categories().count().await.unwrap(), 0);

    // Staged work survives the cancellation and can be saved later.
    assert_eq!(ctx.save(&CancellationToken::new()).await.unwrap(), 1);
    assert_eq!(ctx.categories().count().await.unwrap(), 1);
}

#[tokio::test]
async fn contexts_are_isolated_until_save() {
    let dir = tempfile::tempdir().unwrap();
    let state = bootstrap(&two_file_config(&dir)).await.unwrap();

    let mut writer = state.context().await.unwrap();
    let mut reader = state.context().await.unwrap();
    writer.categories().add(&Category::new("Shoes")).unwrap();
    assert_eq!(reader.categories().count().await.unwrap(), 0);

    writer.save(&CancellationToken::new()).await.unwrap();
    assert_eq!(reader.categories().count().await.unwrap(), 1);
}

#[tokio::test]
async fn cancel_while_statements_run_commits_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let state = bootstrap(&two_file_config(&dir)).await.unwrap();
    let mut ctx = state.context().await.unwrap();
    for i in 0..50 {
        ctx.categories().add(&Category::new(format!("c{}", i))).unwrap();
    }

    // Another connection holds the write lock, so the save's inserts wait on it.
    let mut blocker = SqliteConnection::connect(&sqlite_url(dir.path(), "embedded.db")).await.unwrap();
    sqlx::query("BEGIN IMMEDIATE").execute(&mut blocker).await.unwrap();

    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let err = ctx.save(&token).await.unwrap_err();
    assert!(matches!(err, PersistenceError::Cancelled));

    sqlx::query("ROLLBACK").execute(&mut blocker).await.unwrap();
    blocker.close().await.unwrap();

    assert!(ctx.has_changes());
    assert_eq!(ctx.categories().count().await.unwrap(), 0);
    let mut other = state.context().await.unwrap();
    assert_eq!(other.categories().count().await.unwrap(), 0);

    assert_eq!(ctx.save(&CancellationToken::new()).await.unwrap(), 50);
    assert_eq!(other.categories().count().await.unwrap(), 50);
}
