//! Context bound to a server backend (PostgreSQL wire protocol).

use crate::sql::Dialect;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{PgConnection, Postgres};

type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

sqlx_context! {
    /// Holds one pooled connection for its whole lifetime; dropping the context returns it.
    ServerContext {
        db: Postgres,
        conn: PgConnection,
        row: PgRow,
        query: PgQuery,
        dialect: Dialect::Postgres,
    }
}
