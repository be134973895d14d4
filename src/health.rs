//! Backend health probing that feeds [`FallbackPolicy`].

use crate::catalog::BackendCatalog;
use crate::context::ContextFactory;
use crate::selector::FallbackPolicy;
use std::sync::Arc;
use std::time::Duration;

/// Probe every backend once and record the outcome. Returns `(name, healthy)` in catalog order.
pub async fn check_backends(
    catalog: &BackendCatalog,
    factory: &ContextFactory,
    policy: &FallbackPolicy,
) -> Vec<(String, bool)> {
    let mut out = Vec::with_capacity(catalog.len());
    for descriptor in catalog.iter() {
        let healthy = match factory.ping(descriptor).await {
            Ok(()) => {
                policy.mark_healthy(&descriptor.name);
                true
            }
            Err(e) => {
                tracing::warn!(backend = %descriptor.name, error = %e, "health probe failed");
                policy.mark_unhealthy(&descriptor.name);
                false
            }
        };
        out.push((descriptor.name.clone(), healthy));
    }
    out
}

/// Re-run [`check_backends`] every `period` until the task is aborted.
pub fn spawn_health_checks(
    catalog: Arc<BackendCatalog>,
    factory: Arc<ContextFactory>,
    policy: Arc<FallbackPolicy>,
    period: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            check_backends(&catalog, &factory, &policy).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{from_json_str, PoolSettings};

    #[tokio::test]
    async fn unreachable_backend_marked_unhealthy() {
        let dir = tempfile::tempdir().unwrap();
        let raw = format!(
            r#"{{ "database": {{ "databases": [
                {{ "name": "MariaDb", "connection_string": "postgres://nobody@127.0.0.1:1/shop" }},
                {{ "name": "Sqlite", "connection_string": "sqlite://{}?mode=rwc" }}
            ] }} }}"#,
            dir.path().join("shop.db").display()
        );
        let config = from_json_str(&raw).unwrap();
        let catalog = BackendCatalog::load(&config.database).unwrap();
        let factory = ContextFactory::new(PoolSettings {
            max_connections: 1,
            acquire_timeout_secs: 1,
        });
        let policy = FallbackPolicy::new();

        let results = check_backends(&catalog, &factory, &policy).await;
        assert_eq!(results, vec![("MariaDb".to_string(), false), ("Sqlite".to_string(), true)]);
        assert!(!policy.is_healthy("MariaDb"));
        assert!(policy.is_healthy("Sqlite"));
    }
}
