//! Per-request persistence context on the active backend.

use crate::context::PersistenceContext;
use crate::error::AppError;
use crate::state::AppState;
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};

/// A context created for this request only; dropped (and its connection released)
/// when the handler returns, whatever the outcome.
pub struct UnitOfWork(pub Box<dyn PersistenceContext>);

#[async_trait]
impl FromRequestParts<AppState> for UnitOfWork {
    type Rejection = AppError;

    async fn from_request_parts(_parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let ctx = state.context().await?;
        Ok(UnitOfWork(ctx))
    }
}
