//! Admin handlers: inspect the catalog and switch the active backend.

use crate::catalog::BackendSummary;
use crate::error::AppError;
use crate::extractors::UnitOfWork;
use crate::response::{ok_many, ok_one};
use crate::state::AppState;
use axum::{extract::State, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
pub struct BackendItem {
    #[serde(flatten)]
    pub backend: BackendSummary,
    pub selected: bool,
    pub active: bool,
}

#[derive(Serialize)]
pub struct ActiveBody {
    pub active: BackendSummary,
    pub selected: BackendSummary,
}

#[derive(Deserialize)]
pub struct SetActiveBody {
    pub name: String,
}

#[derive(Serialize)]
pub struct SummaryBody {
    pub backend: BackendSummary,
    pub categories: i64,
    pub orders: i64,
    pub products: i64,
    pub users: i64,
}

pub async fn list_backends(State(state): State<AppState>) -> impl IntoResponse {
    let selected = state.selector.selected();
    let active = state.selector.active();
    let items: Vec<BackendItem> = state
        .catalog
        .iter()
        .map(|d| BackendItem {
            backend: BackendSummary::from(d.as_ref()),
            selected: d.name == selected.name,
            active: d.name == active.name,
        })
        .collect();
    ok_many(items, &active.name)
}

pub async fn get_active(State(state): State<AppState>) -> impl IntoResponse {
    ok_one(ActiveBody {
        active: BackendSummary::from(state.selector.active().as_ref()),
        selected: BackendSummary::from(state.selector.selected().as_ref()),
    })
}

pub async fn set_active(
    State(state): State<AppState>,
    Json(body): Json<SetActiveBody>,
) -> Result<impl IntoResponse, AppError> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("name must not be empty".into()));
    }
    let selected = state.selector.set_active(name)?;
    Ok(ok_one(ActiveBody {
        active: BackendSummary::from(state.selector.active().as_ref()),
        selected: BackendSummary::from(selected.as_ref()),
    }))
}

/// Row counts per collection on the active backend.
pub async fn active_summary(UnitOfWork(mut ctx): UnitOfWork) -> Result<impl IntoResponse, AppError> {
    let backend = BackendSummary::from(ctx.backend());
    let categories = ctx.categories().count().await?;
    let orders = ctx.orders().count().await?;
    let products = ctx.products().count().await?;
    let users = ctx.users().count().await?;
    Ok(ok_one(SummaryBody {
        backend,
        categories,
        orders,
        products,
        users,
    }))
}
