//! Shared application state and the startup sequence that produces it.

use crate::catalog::BackendCatalog;
use crate::config::{AppConfig, PolicyKind};
use crate::context::{ContextFactory, PersistenceContext};
use crate::error::{ContextCreationError, StartupError};
use crate::migration::migrate_all;
use crate::selector::{BackendSelector, FallbackPolicy};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<BackendCatalog>,
    pub selector: Arc<BackendSelector>,
    pub factory: Arc<ContextFactory>,
    /// Set when the config asks for the health-based policy; feed it with `health::check_backends`.
    pub fallback: Option<Arc<FallbackPolicy>>,
}

impl AppState {
    /// A fresh context on whichever backend is active now.
    pub async fn context(&self) -> Result<Box<dyn PersistenceContext>, ContextCreationError> {
        let descriptor = self.selector.active();
        self.factory.create(&descriptor).await
    }
}

/// Load the catalog, migrate every backend, then build the selector and factory.
/// Nothing is handed out before all backends are schema-current.
pub async fn bootstrap(config: &AppConfig) -> Result<AppState, StartupError> {
    let catalog = Arc::new(BackendCatalog::load(&config.database)?);
    migrate_all(&catalog).await?;

    let (selector, fallback) = match config.database.policy {
        PolicyKind::Static => (BackendSelector::new(Arc::clone(&catalog)), None),
        PolicyKind::Fallback => {
            let policy = Arc::new(FallbackPolicy::new());
            (
                BackendSelector::with_policy(Arc::clone(&catalog), Arc::clone(&policy)),
                Some(policy),
            )
        }
    };
    let factory = ContextFactory::new(config.database.pool.clone());

    tracing::info!(
        backends = catalog.len(),
        active = %selector.active().name,
        "persistence ready"
    );
    Ok(AppState {
        catalog,
        selector: Arc::new(selector),
        factory: Arc::new(factory),
        fallback,
    })
}
