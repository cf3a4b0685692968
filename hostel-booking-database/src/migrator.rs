//! Embedded SQL migrations, applied in order and recorded in
//! `schema_migrations`.

use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl, SimpleAsyncConnection};
use tracing::info;

use crate::error::DatabaseError;
use crate::schema::schema_migrations;

pub const MIGRATIONS: &[(&str, &str)] = &[
    (
        "0001_create_hostel",
        include_str!("../migrations/0001_create_hostel.sql"),
    ),
    (
        "0002_widen_names",
        include_str!("../migrations/0002_widen_names.sql"),
    ),
];

/// Applies all migrations that were not applied yet and returns how many
/// ran.
pub async fn run_migrations(connection: &mut AsyncPgConnection) -> Result<usize, DatabaseError> {
    connection
        .batch_execute(
            "CREATE TABLE IF NOT EXISTS schema_migrations (version VARCHAR(255) PRIMARY KEY, \
             applied_at TIMESTAMPTZ NOT NULL DEFAULT now())",
        )
        .await?;
    let applied: Vec<String> = schema_migrations::table
        .select(schema_migrations::version)
        .load(connection)
        .await?;

    let mut count = 0;
    for &(version, sql) in MIGRATIONS {
        if applied.iter().any(|done| done == version) {
            continue;
        }
        connection
            .transaction(|connection| {
                async move {
                    connection.batch_execute(sql).await?;
                    diesel::insert_into(schema_migrations::table)
                        .values(schema_migrations::version.eq(version))
                        .execute(connection)
                        .await?;
                    Ok::<_, DatabaseError>(())
                }
                .scope_boxed()
            })
            .await?;
        info!(version, "applied migration");
        count += 1;
    }
    Ok(count)
}
