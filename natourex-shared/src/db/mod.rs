/// Database layer
///
/// # Modules
///
/// - `pool`: PostgreSQL connection pool with a start-up health check
/// - `migrations`: embedded schema migrations
///
/// Queries live with the PostgreSQL store in `repository::postgres`.

pub mod migrations;
pub mod pool;
