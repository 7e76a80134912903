/// Schema migrations
///
/// The SQL files under `natourex-shared/migrations/` are embedded into the
/// binary. They create the `users`, `tours`, `tour_guides` and `reviews`
/// tables plus the `angular_distance` function used by the radius and
/// distance queries. sqlx records applied versions in `_sqlx_migrations`.

use sqlx::{
    migrate::{MigrateDatabase, MigrateError, Migrator},
    postgres::PgPool,
    Postgres,
};
use tracing::{error, info};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Applies the migrations not yet recorded in the database
pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrateError> {
    let known = MIGRATOR.iter().count();

    MIGRATOR.run(pool).await.map_err(|e| {
        error!(error = %e, "Schema migration failed");
        e
    })?;

    info!(migrations = known, "Schema up to date");
    Ok(())
}

/// Creates the database named in `database_url` when it is missing
pub async fn ensure_database_exists(database_url: &str) -> Result<(), sqlx::Error> {
    if Postgres::database_exists(database_url).await? {
        return Ok(());
    }

    info!("Creating missing database");
    Postgres::create_database(database_url).await
}
