//! Shared body of the per-driver contexts. Each invocation expands in its own module,
//! so the helper fns below do not collide.

macro_rules! sqlx_context {
    (
        $(#[$meta:meta])*
        $name:ident {
            db: $db:ty,
            conn: $conn:ty,
            row: $row:ty,
            query: $query:ident,
            dialect: $dialect:expr $(,)?
        }
    ) => {
        $(#[$meta])*
        pub struct $name {
            descriptor: ::std::sync::Arc<$crate::catalog::BackendDescriptor>,
            conn: ::sqlx::pool::PoolConnection<$db>,
            changes: $crate::context::ChangeTracker,
        }

        impl $name {
            pub fn new(
                descriptor: ::std::sync::Arc<$crate::catalog::BackendDescriptor>,
                conn: ::sqlx::pool::PoolConnection<$db>,
            ) -> Self {
                $name {
                    descriptor,
                    conn,
                    changes: $crate::context::ChangeTracker::default(),
                }
            }
        }

        fn bind_all<'q>(mut query: $query<'q>, params: &[$crate::sql::BindValue]) -> $query<'q> {
            use $crate::sql::BindValue;
            for p in params {
                query = match p.clone() {
                    BindValue::Text(v) => query.bind(v),
                    BindValue::BigInt(v) => query.bind(v),
                    BindValue::Bool(v) => query.bind(v),
                };
            }
            query
        }

        fn decode_row(
            model: &$crate::model::EntityModel,
            row: &$row,
        ) -> Result<$crate::context::Row, $crate::error::PersistenceError> {
            use ::serde_json::Value;
            use ::sqlx::Row as _;
            use $crate::model::ColumnType;
            let mut map = $crate::context::Row::new();
            for c in model.columns {
                let v = match c.type_ {
                    ColumnType::Text => row.try_get::<Option<String>, _>(c.name)?.map(Value::String),
                    ColumnType::BigInt => row.try_get::<Option<i64>, _>(c.name)?.map(|n| Value::Number(n.into())),
                    ColumnType::Bool => row.try_get::<Option<bool>, _>(c.name)?.map(Value::Bool),
                };
                map.insert(c.name.to_string(), v.unwrap_or(Value::Null));
            }
            Ok(map)
        }

        async fn apply(
            conn: &mut $conn,
            changes: &[$crate::context::PreparedChange],
        ) -> Result<u64, $crate::error::PersistenceError> {
            let mut affected = 0;
            for change in changes {
                ::tracing::debug!(sql = %change.query.sql, params = ?change.query.params, "query (tx)");
                let result = bind_all(::sqlx::query(&change.query.sql), &change.query.params)
                    .execute(&mut *conn)
                    .await?;
                affected += change.check(result.rows_affected())?;
            }
            Ok(affected)
        }

        #[::async_trait::async_trait]
        impl $crate::context::PersistenceContext for $name {
            fn backend(&self) -> &$crate::catalog::BackendDescriptor {
                &self.descriptor
            }

            async fn fetch_one(
                &mut self,
                model: &'static $crate::model::EntityModel,
                id: &str,
            ) -> Result<Option<$crate::context::Row>, $crate::error::PersistenceError> {
                let q = $crate::sql::select_by_id($dialect, model, id);
                ::tracing::debug!(sql = %q.sql, params = ?q.params, "query");
                let row = bind_all(::sqlx::query(&q.sql), &q.params)
                    .fetch_optional(&mut *self.conn)
                    .await?;
                row.map(|r| decode_row(model, &r)).transpose()
            }

            async fn fetch_many(
                &mut self,
                model: &'static $crate::model::EntityModel,
                query: &$crate::context::ListQuery,
            ) -> Result<Vec<$crate::context::Row>, $crate::error::PersistenceError> {
                let q = $crate::sql::select_list($dialect, model, query)?;
                ::tracing::debug!(sql = %q.sql, params = ?q.params, "query");
                let rows = bind_all(::sqlx::query(&q.sql), &q.params)
                    .fetch_all(&mut *self.conn)
                    .await?;
                rows.iter().map(|r| decode_row(model, r)).collect()
            }

            async fn count(
                &mut self,
                model: &'static $crate::model::EntityModel,
            ) -> Result<i64, $crate::error::PersistenceError> {
                let q = $crate::sql::count($dialect, model);
                let n: i64 = ::sqlx::query_scalar(&q.sql).fetch_one(&mut *self.conn).await?;
                Ok(n)
            }

            fn changes(&mut self) -> &mut $crate::context::ChangeTracker {
                &mut self.changes
            }

            fn has_changes(&self) -> bool {
                !self.changes.is_empty()
            }

            async fn save(
                &mut self,
                cancel: &::tokio_util::sync::CancellationToken,
            ) -> Result<u64, $crate::error::PersistenceError> {
                use ::sqlx::Connection as _;
                use $crate::error::PersistenceError;
                if self.changes.is_empty() {
                    return Ok(0);
                }
                if cancel.is_cancelled() {
                    return Err(PersistenceError::Cancelled);
                }
                let prepared = self.changes.prepare($dialect)?;

                // Dropping `tx` on the cancel path rolls it back; the tracker is left as is.
                let mut tx = self.conn.begin().await?;
                let affected = ::tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        ::tracing::debug!(backend = %self.descriptor.name, "save cancelled, rolling back");
                        return Err(PersistenceError::Cancelled);
                    }
                    res = apply(&mut tx, &prepared) => res?,
                };
                tx.commit().await?;

                self.changes.clear();
                Ok(affected)
            }
        }
    };
}
