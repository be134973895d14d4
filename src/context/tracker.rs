//! Staged writes of one unit of work.

use crate::context::Row;
use crate::error::PersistenceError;
use crate::model::EntityModel;
use crate::sql::{self, Dialect, QueryBuf};

#[derive(Clone, Debug)]
pub enum ChangeOp {
    Insert(Row),
    Update(Row),
    Delete(String),
}

#[derive(Clone, Debug)]
pub struct PendingChange {
    pub model: &'static EntityModel,
    pub op: ChangeOp,
}

/// A built statement plus, for updates and deletes, the row it must hit.
#[derive(Debug)]
pub struct PreparedChange {
    pub query: QueryBuf,
    pub expects: Option<(&'static str, String)>,
}

impl PreparedChange {
    /// Turn the affected row count of this statement into an error when it missed its row.
    pub fn check(&self, rows_affected: u64) -> Result<u64, PersistenceError> {
        match &self.expects {
            Some((entity, id)) if rows_affected == 0 => Err(PersistenceError::Concurrency {
                entity: *entity,
                id: id.clone(),
            }),
            _ => Ok(rows_affected),
        }
    }
}

#[derive(Debug, Default)]
pub struct ChangeTracker {
    pending: Vec<PendingChange>,
}

impl ChangeTracker {
    pub fn push(&mut self, model: &'static EntityModel, op: ChangeOp) {
        self.pending.push(PendingChange { model, op });
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingChange> {
        self.pending.iter()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Build every staged change for `dialect`, in staging order.
    pub fn prepare(&self, dialect: Dialect) -> Result<Vec<PreparedChange>, PersistenceError> {
        self.pending
            .iter()
            .map(|change| {
                let model = change.model;
                Ok(match &change.op {
                    ChangeOp::Insert(row) => PreparedChange {
                        query: sql::insert(dialect, model, row)?,
                        expects: None,
                    },
                    ChangeOp::Update(row) => PreparedChange {
                        query: sql::update(dialect, model, row)?,
                        expects: Some((model.entity, sql::row_id(model, row)?)),
                    },
                    ChangeOp::Delete(id) => PreparedChange {
                        query: sql::delete(dialect, model, id),
                        expects: Some((model.entity, id.clone())),
                    },
                })
            })
            .collect()
    }
}
