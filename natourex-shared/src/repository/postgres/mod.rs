/// PostgreSQL store
///
/// Implements the repository traits with `sqlx`. Listing queries are built
/// with `QueryBuilder` from a parsed [`ListQuery`]: column names come from the
/// static field catalogs and every value is bound, never interpolated.
///
/// # Transactions
///
/// Writes touching more than one table run in a transaction:
///
/// - tour create/update: `tours` row plus `tour_guides`
/// - review create/update/delete: `reviews` row plus the tour's rating fields
/// - user delete: cascading review removal plus rating refresh
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use natourex_shared::db::pool::{create_pool, DatabaseConfig};
/// use natourex_shared::repository::{postgres::PgStore, Repositories};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig {
///     url: std::env::var("DATABASE_URL")?,
///     ..Default::default()
/// })
/// .await?;
///
/// let repos = Repositories::from_store(Arc::new(PgStore::new(pool)));
/// repos.health.ping().await?;
/// # Ok(())
/// # }
/// ```

mod reviews;
mod tours;
mod users;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::{HealthCheck, RepoError};
use crate::db::pool;
use crate::query::{FieldValue, ListQuery};

/// Store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Maps constraint violations to domain errors
pub(crate) fn map_db_error(err: sqlx::Error) -> RepoError {
    if let sqlx::Error::Database(db) = &err {
        match db.code().as_deref() {
            // unique_violation
            Some("23505") => {
                return RepoError::Duplicate {
                    field: constraint_field(db.constraint()).to_string(),
                }
            }
            // foreign_key_violation
            Some("23503") => {
                return RepoError::InvalidReference(
                    db.constraint().unwrap_or("foreign key").to_string(),
                )
            }
            _ => {}
        }
    }
    RepoError::Database(err)
}

fn constraint_field(constraint: Option<&str>) -> &str {
    match constraint {
        Some("tours_name_key") => "name",
        Some("users_email_key") => "email",
        Some("reviews_tour_user_key") => "tour, user",
        Some(other) => other,
        None => "unknown",
    }
}

fn push_value(builder: &mut QueryBuilder<'_, Postgres>, value: &FieldValue) {
    match value {
        FieldValue::Number(n) => builder.push_bind(*n),
        FieldValue::Text(s) => builder.push_bind(s.clone()),
        FieldValue::Bool(b) => builder.push_bind(*b),
        FieldValue::Id(id) => builder.push_bind(*id),
        FieldValue::Timestamp(ts) => builder.push_bind(*ts),
    };
}

/// Appends filters, ordering and pagination
///
/// `has_where` tells whether the caller already opened a WHERE clause.
/// Missing values sort first ascending and last descending.
pub(crate) fn push_list_query(
    builder: &mut QueryBuilder<'_, Postgres>,
    query: &ListQuery,
    mut has_where: bool,
) {
    for filter in &query.filters {
        builder.push(if has_where { " AND (" } else { " WHERE (" });
        has_where = true;

        for (i, value) in filter.values.iter().enumerate() {
            if i > 0 {
                builder.push(" OR ");
            }
            builder
                .push(filter.field.column)
                .push(" ")
                .push(filter.comparison.sql())
                .push(" ");
            push_value(builder, value);
        }
        builder.push(")");
    }

    if !query.sort.is_empty() {
        builder.push(" ORDER BY ");
        for (i, key) in query.sort.iter().enumerate() {
            if i > 0 {
                builder.push(", ");
            }
            builder.push(key.field.column).push(if key.descending {
                " DESC NULLS LAST"
            } else {
                " ASC NULLS FIRST"
            });
        }
    }

    builder
        .push(" LIMIT ")
        .push_bind(i64::from(query.limit))
        .push(" OFFSET ")
        .push_bind(query.offset() as i64);
}

#[async_trait]
impl HealthCheck for PgStore {
    async fn ping(&self) -> Result<(), RepoError> {
        pool::ping(&self.pool).await.map_err(RepoError::from)
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tour::TOUR_FIELDS;

    fn sql_for(pairs: &[(&str, &str)]) -> String {
        let pairs: Vec<(String, String)> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        let query = ListQuery::parse(&pairs, TOUR_FIELDS, "-createdAt").unwrap();

        let mut builder = QueryBuilder::<Postgres>::new("SELECT id FROM tours WHERE secret_tour = FALSE");
        push_list_query(&mut builder, &query, true);
        builder.sql().to_string()
    }

    #[test]
    fn test_list_query_sql() {
        let sql = sql_for(&[
            ("price[lt]", "1000"),
            ("duration", "5"),
            ("duration", "9"),
            ("sort", "-ratingsAverage,price"),
            ("page", "2"),
            ("limit", "10"),
        ]);

        assert_eq!(
            sql,
            "SELECT id FROM tours WHERE secret_tour = FALSE \
             AND (price < $1) AND (duration = $2 OR duration = $3) \
             ORDER BY ratings_average DESC NULLS LAST, price ASC NULLS FIRST \
             LIMIT $4 OFFSET $5"
        );
    }

    #[test]
    fn test_default_sort_sql() {
        let sql = sql_for(&[]);
        assert!(sql.ends_with("ORDER BY created_at DESC NULLS LAST LIMIT $1 OFFSET $2"));
    }

    #[test]
    fn test_constraint_field_names() {
        assert_eq!(constraint_field(Some("tours_name_key")), "name");
        assert_eq!(constraint_field(Some("users_email_key")), "email");
        assert_eq!(constraint_field(None), "unknown");
    }
}
