//! Context bound to an embedded SQLite file.

use crate::sql::Dialect;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Sqlite, SqliteConnection};

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

sqlx_context! {
    /// Holds one pooled connection to the database file until dropped.
    EmbeddedContext {
        db: Sqlite,
        conn: SqliteConnection,
        row: SqliteRow,
        query: SqliteQuery,
        dialect: Dialect::Sqlite,
    }
}
