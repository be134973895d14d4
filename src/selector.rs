//! Backend selection: which catalog entry serves persistence requests right now.
//!
//! The selected descriptor is an `Arc` behind a `RwLock`; readers clone the `Arc`, so a
//! reader sees either the old or the new descriptor as a whole. Every value ever stored
//! comes from the catalog, so no read needs to re-validate.

use crate::catalog::{BackendCatalog, BackendDescriptor};
use crate::error::SelectionError;
use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

/// Decides the active backend from the administratively selected one.
/// Must only ever return an entry of `catalog`.
pub trait SelectionPolicy: Send + Sync {
    fn resolve(&self, catalog: &BackendCatalog, selected: Arc<BackendDescriptor>) -> Arc<BackendDescriptor>;
}

/// The selected backend is the active backend.
#[derive(Debug, Default)]
pub struct StaticPolicy;

impl SelectionPolicy for StaticPolicy {
    fn resolve(&self, _catalog: &BackendCatalog, selected: Arc<BackendDescriptor>) -> Arc<BackendDescriptor> {
        selected
    }
}

/// Health-based fallback: while the selected backend is marked unhealthy, the first
/// healthy catalog entry is active instead. With nothing healthy, the selection stands.
#[derive(Debug, Default)]
pub struct FallbackPolicy {
    unhealthy: RwLock<HashSet<String>>,
}

impl FallbackPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_unhealthy(&self, name: &str) {
        let mut set = self.unhealthy.write().unwrap_or_else(PoisonError::into_inner);
        if set.insert(name.to_string()) {
            tracing::warn!(backend = %name, "backend marked unhealthy");
        }
    }

    pub fn mark_healthy(&self, name: &str) {
        let mut set = self.unhealthy.write().unwrap_or_else(PoisonError::into_inner);
        if set.remove(name) {
            tracing::info!(backend = %name, "backend healthy again");
        }
    }

    pub fn is_healthy(&self, name: &str) -> bool {
        !self
            .unhealthy
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(name)
    }
}

impl SelectionPolicy for FallbackPolicy {
    fn resolve(&self, catalog: &BackendCatalog, selected: Arc<BackendDescriptor>) -> Arc<BackendDescriptor> {
        if self.is_healthy(&selected.name) {
            return selected;
        }
        match catalog.iter().find(|d| self.is_healthy(&d.name)) {
            Some(fallback) => {
                tracing::warn!(selected = %selected.name, fallback = %fallback.name, "selected backend unhealthy, falling back");
                Arc::clone(fallback)
            }
            None => selected,
        }
    }
}

impl<P: SelectionPolicy + ?Sized> SelectionPolicy for Arc<P> {
    fn resolve(&self, catalog: &BackendCatalog, selected: Arc<BackendDescriptor>) -> Arc<BackendDescriptor> {
        (**self).resolve(catalog, selected)
    }
}

pub struct BackendSelector {
    catalog: Arc<BackendCatalog>,
    selected: RwLock<Arc<BackendDescriptor>>,
    policy: Box<dyn SelectionPolicy>,
}

impl BackendSelector {
    /// Static selection starting at the catalog's configured active backend.
    pub fn new(catalog: Arc<BackendCatalog>) -> Self {
        Self::with_policy(catalog, StaticPolicy)
    }

    pub fn with_policy(catalog: Arc<BackendCatalog>, policy: impl SelectionPolicy + 'static) -> Self {
        let selected = Arc::clone(catalog.default_active());
        BackendSelector {
            catalog,
            selected: RwLock::new(selected),
            policy: Box::new(policy),
        }
    }

    /// The backend that should serve the next unit of work.
    pub fn active(&self) -> Arc<BackendDescriptor> {
        self.policy.resolve(&self.catalog, self.selected())
    }

    /// The administratively selected backend, before the policy is applied.
    pub fn selected(&self) -> Arc<BackendDescriptor> {
        // The guarded value is a single Arc; a panicking writer cannot leave it torn.
        Arc::clone(&self.selected.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Swap the selection to `name`. On error the previous selection stays in place.
    pub fn set_active(&self, name: &str) -> Result<Arc<BackendDescriptor>, SelectionError> {
        let next = self
            .catalog
            .get(name)
            .cloned()
            .ok_or_else(|| SelectionError::UnknownBackend(name.to_string()))?;
        let previous = {
            let mut guard = self.selected.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *guard, Arc::clone(&next))
        };
        if previous.name != next.name {
            tracing::info!(from = %previous.name, to = %next.name, "active backend switched");
        }
        Ok(next)
    }

    pub fn catalog(&self) -> &Arc<BackendCatalog> {
        &self.catalog
    }
}
