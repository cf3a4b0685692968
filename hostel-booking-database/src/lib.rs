pub mod error;
pub mod migrator;
pub mod models;
pub mod schema;
mod store;

use diesel_async::pooled_connection::deadpool;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::AsyncPgConnection;
use error::DatabaseError;
pub use store::PgStore;

pub type Pool = deadpool::Pool<AsyncPgConnection>;

// https://github.com/tokio-rs/axum/tree/main/examples/diesel-async-postgres

pub fn get_database_connection(database_url: &str) -> Result<Pool, DatabaseError> {
    let config = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
    Ok(Pool::builder(config).build()?)
}

/// Connects and brings the schema up to date.
pub async fn connect_and_migrate(database_url: &str) -> Result<PgStore, DatabaseError> {
    let pool = get_database_connection(database_url)?;
    {
        let mut connection = pool.get().await?;
        migrator::run_migrations(&mut connection).await?;
    }
    Ok(PgStore::new(pool))
}
