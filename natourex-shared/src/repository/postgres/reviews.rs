//! Review queries and tour rating refresh

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

use super::{map_db_error, push_list_query, PgStore};
use crate::models::tour::DEFAULT_RATINGS_AVERAGE;
use crate::models::{CreateReview, Review, ReviewAuthor, UpdateReview};
use crate::query::ListQuery;
use crate::repository::{RepoError, Repository};

const REVIEW_SELECT: &str = "SELECT r.id, r.review, r.rating, r.created_at, r.tour_id, r.user_id, \
    u.name AS user_name, u.photo AS user_photo \
    FROM reviews r JOIN users u ON u.id = r.user_id";

/// Review joined with its author
#[derive(Debug, sqlx::FromRow)]
struct ReviewRow {
    id: Uuid,
    review: String,
    rating: f64,
    created_at: DateTime<Utc>,
    tour_id: Uuid,
    user_id: Uuid,
    user_name: String,
    user_photo: String,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Review {
            id: row.id,
            review: row.review,
            rating: row.rating,
            created_at: row.created_at,
            tour: row.tour_id,
            user: ReviewAuthor {
                id: row.user_id,
                name: row.user_name,
                photo: row.user_photo,
            },
        }
    }
}

/// Reviews of one tour, oldest first
pub(super) async fn fetch_tour_reviews(pool: &PgPool, tour_id: Uuid) -> Result<Vec<Review>, RepoError> {
    let rows = sqlx::query_as::<_, ReviewRow>(&format!(
        "{} WHERE r.tour_id = $1 ORDER BY r.created_at ASC",
        REVIEW_SELECT
    ))
    .bind(tour_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Review::from).collect())
}

/// Recomputes `ratings_quantity` and `ratings_average` from the tour's reviews
pub(super) async fn refresh_tour_rating(conn: &mut PgConnection, tour_id: Uuid) -> Result<(), RepoError> {
    sqlx::query(
        "UPDATE tours SET ratings_quantity = s.quantity, ratings_average = s.average
         FROM (
             SELECT COUNT(*)::int4 AS quantity,
                    COALESCE(ROUND(AVG(rating)::numeric, 1)::float8, $2) AS average
             FROM reviews WHERE tour_id = $1
         ) AS s
         WHERE tours.id = $1",
    )
    .bind(tour_id)
    .bind(DEFAULT_RATINGS_AVERAGE)
    .execute(&mut *conn)
    .await?;

    debug!(tour_id = %tour_id, "Refreshed tour rating");
    Ok(())
}

impl PgStore {
    async fn fetch_review(&self, id: Uuid) -> Result<Option<Review>, RepoError> {
        let row = sqlx::query_as::<_, ReviewRow>(&format!("{} WHERE r.id = $1", REVIEW_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Review::from))
    }

    async fn expect_review(&self, id: Uuid) -> Result<Review, RepoError> {
        self.fetch_review(id)
            .await?
            .ok_or_else(|| RepoError::Corrupt(format!("review {} vanished after write", id)))
    }
}

#[async_trait]
impl Repository<Review> for PgStore {
    async fn find(&self, query: &ListQuery) -> Result<Vec<Review>, RepoError> {
        let mut builder = QueryBuilder::<Postgres>::new(REVIEW_SELECT);
        push_list_query(&mut builder, query, false);

        let rows = builder
            .build_query_as::<ReviewRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Review::from).collect())
    }

    async fn find_by_id(&self, id: Uuid, _populate: &[&str]) -> Result<Option<Review>, RepoError> {
        self.fetch_review(id).await
    }

    async fn create(&self, input: CreateReview) -> Result<Review, RepoError> {
        let (Some(tour_id), Some(user_id)) = (input.tour, input.user) else {
            return Err(RepoError::InvalidReference(
                "review must reference a tour and a user".to_string(),
            ));
        };

        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        let visible: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM tours WHERE id = $1 AND NOT secret_tour)",
        )
        .bind(tour_id)
        .fetch_one(&mut *tx)
        .await?;
        if !visible {
            return Err(RepoError::InvalidReference(format!("tour {}", tour_id)));
        }

        sqlx::query(
            "INSERT INTO reviews (id, review, rating, created_at, tour_id, user_id)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(id)
        .bind(input.review.trim())
        .bind(input.rating)
        .bind(Utc::now())
        .bind(tour_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

        refresh_tour_rating(&mut tx, tour_id).await?;
        tx.commit().await?;

        self.expect_review(id).await
    }

    async fn update(&self, id: Uuid, input: UpdateReview) -> Result<Option<Review>, RepoError> {
        let mut tx = self.pool.begin().await?;

        let tour_id: Option<Uuid> = sqlx::query_scalar(
            "UPDATE reviews SET review = COALESCE($2, review), rating = COALESCE($3, rating)
             WHERE id = $1
             RETURNING tour_id",
        )
        .bind(id)
        .bind(input.review.as_deref().map(str::trim))
        .bind(input.rating)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(tour_id) = tour_id else {
            return Ok(None);
        };

        refresh_tour_rating(&mut tx, tour_id).await?;
        tx.commit().await?;

        self.expect_review(id).await.map(Some)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, RepoError> {
        let mut tx = self.pool.begin().await?;

        let tour_id: Option<Uuid> =
            sqlx::query_scalar("DELETE FROM reviews WHERE id = $1 RETURNING tour_id")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(tour_id) = tour_id else {
            return Ok(false);
        };

        refresh_tour_rating(&mut tx, tour_id).await?;
        tx.commit().await?;
        Ok(true)
    }
}
