//! Shop data layer: a catalog of relational backends, startup migration of all of
//! them, runtime selection of the active one, and per-unit-of-work persistence contexts.

pub mod catalog;
pub mod config;
pub mod context;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod health;
pub mod migration;
pub mod model;
pub mod response;
pub mod routes;
pub mod selector;
pub mod sql;
pub mod state;

pub use catalog::{BackendCatalog, BackendDescriptor, BackendSummary};
pub use config::{load_from_path, AppConfig, BackendKind, DatabaseConfig};
pub use context::{ContextFactory, EntitySet, ListQuery, PersistenceContext};
pub use error::{
    AppError, ConfigError, ContextCreationError, MigrationError, PersistenceError, SelectionError, StartupError,
};
pub use migration::{migrate_all, migrate_backend, MigrationReport};
pub use model::{Category, Entity, Order, OrderStatus, Product, User};
pub use routes::app_router;
pub use selector::{BackendSelector, FallbackPolicy, SelectionPolicy, StaticPolicy};
pub use state::{bootstrap, AppState};
pub use tokio_util::sync::CancellationToken;
