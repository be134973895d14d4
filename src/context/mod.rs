//! The uniform persistence context handed to business logic, one per unit of work.
//!
//! Reads go straight to the bound backend. Writes are staged in a [`ChangeTracker`]
//! and applied by [`PersistenceContext::save`] as a single transaction.

#[macro_use]
mod driver;

mod embedded;
mod factory;
mod server;
mod tracker;

pub use embedded::EmbeddedContext;
pub use factory::ContextFactory;
pub use server::ServerContext;
pub use tracker::{ChangeOp, ChangeTracker, PendingChange, PreparedChange};

use crate::catalog::BackendDescriptor;
use crate::error::PersistenceError;
use crate::model::{Category, Entity, EntityModel, Order, Product, User};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::marker::PhantomData;
use tokio_util::sync::CancellationToken;

/// A raw row keyed by column name.
pub type Row = Map<String, Value>;

/// Exact-match filters plus paging. Limit defaults to 100 and is capped at 1000.
#[derive(Clone, Debug, Default)]
pub struct ListQuery {
    pub filters: Vec<(String, Value)>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((column.into(), value.into()));
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// Contract every backend-specific context implements. Callers only ever hold a
/// `Box<dyn PersistenceContext>`; use the typed collections (`categories()`, ...) on it.
#[async_trait]
pub trait PersistenceContext: Send {
    /// The backend this context is bound to.
    fn backend(&self) -> &BackendDescriptor;

    async fn fetch_one(&mut self, model: &'static EntityModel, id: &str) -> Result<Option<Row>, PersistenceError>;

    async fn fetch_many(&mut self, model: &'static EntityModel, query: &ListQuery) -> Result<Vec<Row>, PersistenceError>;

    async fn count(&mut self, model: &'static EntityModel) -> Result<i64, PersistenceError>;

    fn changes(&mut self) -> &mut ChangeTracker;

    fn has_changes(&self) -> bool;

    /// Apply all staged changes in one transaction and return the number of affected rows.
    ///
    /// Returns `0` without touching the store when nothing is staged. If `cancel` fires
    /// before the commit starts, the transaction is rolled back, staged changes are kept
    /// and `PersistenceError::Cancelled` is returned. Once the commit has started,
    /// cancellation is no longer observed.
    async fn save(&mut self, cancel: &CancellationToken) -> Result<u64, PersistenceError>;
}

impl dyn PersistenceContext {
    pub fn categories(&mut self) -> EntitySet<'_, Category> {
        EntitySet::new(self)
    }

    pub fn orders(&mut self) -> EntitySet<'_, Order> {
        EntitySet::new(self)
    }

    pub fn products(&mut self) -> EntitySet<'_, Product> {
        EntitySet::new(self)
    }

    pub fn users(&mut self) -> EntitySet<'_, User> {
        EntitySet::new(self)
    }
}

/// Typed view over one collection of a context.
pub struct EntitySet<'a, T> {
    ctx: &'a mut dyn PersistenceContext,
    _entity: PhantomData<fn() -> T>,
}

impl<'a, T: Entity> EntitySet<'a, T> {
    fn new(ctx: &'a mut dyn PersistenceContext) -> Self {
        EntitySet {
            ctx,
            _entity: PhantomData,
        }
    }

    pub async fn find(&mut self, id: &str) -> Result<Option<T>, PersistenceError> {
        match self.ctx.fetch_one(T::MODEL, id).await? {
            Some(row) => Ok(Some(serde_json::from_value(Value::Object(row))?)),
            None => Ok(None),
        }
    }

    pub async fn list(&mut self, query: &ListQuery) -> Result<Vec<T>, PersistenceError> {
        let rows = self.ctx.fetch_many(T::MODEL, query).await?;
        rows.into_iter()
            .map(|row| serde_json::from_value(Value::Object(row)).map_err(PersistenceError::from))
            .collect()
    }

    pub async fn count(&mut self) -> Result<i64, PersistenceError> {
        self.ctx.count(T::MODEL).await
    }

    /// Stage an insert.
    pub fn add(&mut self, entity: &T) -> Result<(), PersistenceError> {
        let row = to_row(entity)?;
        self.ctx.changes().push(T::MODEL, ChangeOp::Insert(row));
        Ok(())
    }

    /// Stage a full update keyed by the entity's id.
    pub fn update(&mut self, entity: &T) -> Result<(), PersistenceError> {
        let row = to_row(entity)?;
        self.ctx.changes().push(T::MODEL, ChangeOp::Update(row));
        Ok(())
    }

    /// Stage a delete.
    pub fn remove(&mut self, id: &str) {
        self.ctx.changes().push(T::MODEL, ChangeOp::Delete(id.to_string()));
    }
}

fn to_row<T: Entity>(entity: &T) -> Result<Row, PersistenceError> {
    match serde_json::to_value(entity)? {
        Value::Object(row) => Ok(row),
        other => Err(PersistenceError::InvalidQuery(format!(
            "{} '{}' did not serialize to an object: {}",
            T::MODEL.entity,
            entity.id(),
            other
        ))),
    }
}
