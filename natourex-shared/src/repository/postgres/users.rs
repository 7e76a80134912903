//! User queries and credential lookup

use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

use super::reviews::refresh_tour_rating;
use super::{map_db_error, push_list_query, PgStore};
use crate::auth::password::hash_password_blocking;
use crate::models::user::normalize_email;
use crate::models::{CreateUser, UpdateUser, User, UserCredentials, UserRecord};
use crate::query::ListQuery;
use crate::repository::{Credentials, RepoError, Repository};

pub(crate) const USER_COLUMNS: &str = "id, name, email, photo, role, password_hash, created_at";

fn public(record: &UserRecord) -> Result<User, RepoError> {
    record.to_user().map_err(RepoError::Corrupt)
}

#[async_trait]
impl Repository<User> for PgStore {
    async fn find(&self, query: &ListQuery) -> Result<Vec<User>, RepoError> {
        let mut builder =
            QueryBuilder::<Postgres>::new(format!("SELECT {} FROM users", USER_COLUMNS));
        push_list_query(&mut builder, query, false);

        let records = builder
            .build_query_as::<UserRecord>()
            .fetch_all(&self.pool)
            .await?;

        records.iter().map(public).collect()
    }

    async fn find_by_id(&self, id: Uuid, _populate: &[&str]) -> Result<Option<User>, RepoError> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        record.as_ref().map(public).transpose()
    }

    async fn create(&self, input: CreateUser) -> Result<User, RepoError> {
        let hash = hash_password_blocking(input.password.clone()).await?;
        let record = UserRecord::new(&input, hash);

        sqlx::query(
            "INSERT INTO users (id, name, email, photo, role, password_hash, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(record.id)
        .bind(&record.name)
        .bind(&record.email)
        .bind(&record.photo)
        .bind(&record.role)
        .bind(&record.password_hash)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        debug!(user_id = %record.id, "Created user");
        public(&record)
    }

    async fn update(&self, id: Uuid, input: UpdateUser) -> Result<Option<User>, RepoError> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {} FROM users WHERE id = $1 FOR UPDATE",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(mut record) = current else {
            return Ok(None);
        };
        record.apply(input);

        sqlx::query("UPDATE users SET name = $2, email = $3, photo = $4, role = $5 WHERE id = $1")
            .bind(record.id)
            .bind(&record.name)
            .bind(&record.email)
            .bind(&record.photo)
            .bind(&record.role)
            .execute(&mut *tx)
            .await
            .map_err(map_db_error)?;

        tx.commit().await?;
        public(&record).map(Some)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, RepoError> {
        let mut tx = self.pool.begin().await?;

        let reviewed: Vec<Uuid> =
            sqlx::query_scalar("SELECT DISTINCT tour_id FROM reviews WHERE user_id = $1")
                .bind(id)
                .fetch_all(&mut *tx)
                .await?;

        // Reviews and guide assignments cascade
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        for tour_id in reviewed {
            refresh_tour_rating(&mut tx, tour_id).await?;
        }
        tx.commit().await?;

        debug!(user_id = %id, "Deleted user");
        Ok(true)
    }
}

#[async_trait]
impl Credentials for PgStore {
    async fn find_credentials(&self, email: &str) -> Result<Option<UserCredentials>, RepoError> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(normalize_email(email))
        .fetch_optional(&self.pool)
        .await?;

        record
            .map(|record| -> Result<UserCredentials, RepoError> {
                Ok(UserCredentials {
                    user: public(&record)?,
                    password_hash: record.password_hash,
                })
            })
            .transpose()
    }
}
