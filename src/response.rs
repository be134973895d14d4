//! `{ "data": ... }` envelopes for the admin routes. Errors use the envelope in `error.rs`.

use axum::{http::StatusCode, Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct DataOne<T> {
    pub data: T,
}

#[derive(Serialize)]
pub struct DataMany<T> {
    pub data: Vec<T>,
    pub meta: ListMeta,
}

/// `active` names the backend serving units of work when the list was taken.
#[derive(Serialize)]
pub struct ListMeta {
    pub count: usize,
    pub active: String,
}

pub fn ok_one<T: Serialize>(data: T) -> (StatusCode, Json<DataOne<T>>) {
    (StatusCode::OK, Json(DataOne { data }))
}

pub fn ok_many<T: Serialize>(data: Vec<T>, active: &str) -> (StatusCode, Json<DataMany<T>>) {
    let meta = ListMeta {
        count: data.len(),
        active: active.to_string(),
    };
    (StatusCode::OK, Json(DataMany { data, meta }))
}
