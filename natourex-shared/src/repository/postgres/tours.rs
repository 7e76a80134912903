//! Tour queries, reports and geospatial lookups

use async_trait::async_trait;
use sqlx::{PgConnection, Postgres, QueryBuilder};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

use super::reviews::fetch_tour_reviews;
use super::users::USER_COLUMNS;
use super::{map_db_error, push_list_query, PgStore};
use crate::analytics::{year_bounds, DifficultyStats, MonthlyPlan, TourDistance, STATS_MIN_RATING};
use crate::geo::{GeoPoint, EARTH_RADIUS_M};
use crate::models::{CreateTour, Tour, TourRecord, UpdateTour, User, UserRecord};
use crate::query::ListQuery;
use crate::repository::{RepoError, Repository, TourAnalytics, POPULATE_REVIEWS};

pub(crate) const TOUR_COLUMNS: &str = "id, name, slug, duration, max_group_size, difficulty, \
    ratings_average, ratings_quantity, price, price_discount, summary, description, image_cover, \
    images, created_at, start_dates, secret_tour, start_location, locations, \
    ARRAY(SELECT tg.user_id FROM tour_guides tg WHERE tg.tour_id = tours.id ORDER BY tg.position) AS guide_ids";

/// Start latitude and longitude extracted from the GeoJSON column
const START_LAT: &str = "(start_location->'coordinates'->>1)::float8";
const START_LNG: &str = "(start_location->'coordinates'->>0)::float8";

impl PgStore {
    /// Resolves guides for a batch of records, preserving guide order
    async fn populate_guides(&self, records: Vec<TourRecord>) -> Result<Vec<Tour>, RepoError> {
        let mut ids: Vec<Uuid> = records.iter().flat_map(|r| r.guide_ids.iter().copied()).collect();
        ids.sort();
        ids.dedup();

        let guides: HashMap<Uuid, User> = if ids.is_empty() {
            HashMap::new()
        } else {
            sqlx::query_as::<_, UserRecord>(&format!(
                "SELECT {} FROM users WHERE id = ANY($1)",
                USER_COLUMNS
            ))
            .bind(&ids)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|r| r.to_user().map(|u| (u.id, u)))
            .collect::<Result<_, _>>()
            .map_err(RepoError::Corrupt)?
        };

        records
            .into_iter()
            .map(|record| {
                let tour_guides = record
                    .guide_ids
                    .iter()
                    .filter_map(|id| guides.get(id).cloned())
                    .collect();
                record.into_tour(tour_guides).map_err(RepoError::Corrupt)
            })
            .collect()
    }

    async fn fetch_visible_tour(&self, id: Uuid) -> Result<Option<TourRecord>, RepoError> {
        let record = sqlx::query_as::<_, TourRecord>(&format!(
            "SELECT {} FROM tours WHERE id = $1 AND secret_tour = FALSE",
            TOUR_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn single(&self, record: TourRecord) -> Result<Tour, RepoError> {
        self.populate_guides(vec![record])
            .await?
            .pop()
            .ok_or_else(|| RepoError::Corrupt("tour vanished while populating".to_string()))
    }
}

/// Replaces a tour's guides, keeping list order in `position`
async fn replace_guides(
    conn: &mut PgConnection,
    tour_id: Uuid,
    guide_ids: &[Uuid],
) -> Result<(), RepoError> {
    sqlx::query("DELETE FROM tour_guides WHERE tour_id = $1")
        .bind(tour_id)
        .execute(&mut *conn)
        .await?;

    if !guide_ids.is_empty() {
        sqlx::query(
            "INSERT INTO tour_guides (tour_id, user_id, position)
             SELECT $1, g.user_id, g.ord::int4
             FROM UNNEST($2::uuid[]) WITH ORDINALITY AS g(user_id, ord)",
        )
        .bind(tour_id)
        .bind(guide_ids)
        .execute(&mut *conn)
        .await
        .map_err(map_db_error)?;
    }

    Ok(())
}

#[async_trait]
impl Repository<Tour> for PgStore {
    async fn find(&self, query: &ListQuery) -> Result<Vec<Tour>, RepoError> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM tours WHERE secret_tour = FALSE",
            TOUR_COLUMNS
        ));
        push_list_query(&mut builder, query, true);

        let records = builder
            .build_query_as::<TourRecord>()
            .fetch_all(&self.pool)
            .await?;

        debug!(count = records.len(), "Fetched tours");
        self.populate_guides(records).await
    }

    async fn find_by_id(&self, id: Uuid, populate: &[&str]) -> Result<Option<Tour>, RepoError> {
        let Some(record) = self.fetch_visible_tour(id).await? else {
            return Ok(None);
        };

        let mut tour = self.single(record).await?;
        if populate.contains(&POPULATE_REVIEWS) {
            tour.reviews = Some(fetch_tour_reviews(&self.pool, id).await?);
        }

        Ok(Some(tour))
    }

    async fn create(&self, input: CreateTour) -> Result<Tour, RepoError> {
        let record = TourRecord::from_create(input);
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO tours (id, name, slug, duration, max_group_size, difficulty,
                ratings_average, ratings_quantity, price, price_discount, summary, description,
                image_cover, images, created_at, start_dates, secret_tour, start_location, locations)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)",
        )
        .bind(record.id)
        .bind(&record.name)
        .bind(&record.slug)
        .bind(record.duration)
        .bind(record.max_group_size)
        .bind(&record.difficulty)
        .bind(record.ratings_average)
        .bind(record.ratings_quantity)
        .bind(record.price)
        .bind(record.price_discount)
        .bind(&record.summary)
        .bind(&record.description)
        .bind(&record.image_cover)
        .bind(&record.images)
        .bind(record.created_at)
        .bind(&record.start_dates)
        .bind(record.secret_tour)
        .bind(&record.start_location)
        .bind(&record.locations)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

        replace_guides(&mut tx, record.id, &record.guide_ids).await?;
        tx.commit().await?;

        debug!(tour_id = %record.id, name = %record.name, "Created tour");
        self.single(record).await
    }

    async fn update(&self, id: Uuid, input: UpdateTour) -> Result<Option<Tour>, RepoError> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, TourRecord>(&format!(
            "SELECT {} FROM tours WHERE id = $1 AND secret_tour = FALSE FOR UPDATE",
            TOUR_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(mut record) = current else {
            return Ok(None);
        };

        let guides_changed = input.guides.is_some();
        record.apply(input);

        sqlx::query(
            "UPDATE tours SET name = $2, slug = $3, duration = $4, max_group_size = $5,
                difficulty = $6, ratings_average = $7, ratings_quantity = $8, price = $9,
                price_discount = $10, summary = $11, description = $12, image_cover = $13,
                images = $14, start_dates = $15, secret_tour = $16, start_location = $17,
                locations = $18
             WHERE id = $1",
        )
        .bind(record.id)
        .bind(&record.name)
        .bind(&record.slug)
        .bind(record.duration)
        .bind(record.max_group_size)
        .bind(&record.difficulty)
        .bind(record.ratings_average)
        .bind(record.ratings_quantity)
        .bind(record.price)
        .bind(record.price_discount)
        .bind(&record.summary)
        .bind(&record.description)
        .bind(&record.image_cover)
        .bind(&record.images)
        .bind(&record.start_dates)
        .bind(record.secret_tour)
        .bind(&record.start_location)
        .bind(&record.locations)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

        if guides_changed {
            replace_guides(&mut tx, record.id, &record.guide_ids).await?;
        }
        tx.commit().await?;

        debug!(tour_id = %id, "Updated tour");
        self.single(record).await.map(Some)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM tours WHERE id = $1 AND secret_tour = FALSE")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl TourAnalytics for PgStore {
    async fn tour_stats(&self) -> Result<Vec<DifficultyStats>, RepoError> {
        let stats = sqlx::query_as::<_, DifficultyStats>(
            "SELECT UPPER(difficulty) AS difficulty,
                    COUNT(*)::int8 AS num_tours,
                    SUM(ratings_quantity)::int8 AS num_ratings,
                    AVG(ratings_average)::float8 AS avg_rating,
                    AVG(price)::float8 AS avg_price,
                    MIN(price)::float8 AS min_price,
                    MAX(price)::float8 AS max_price
             FROM tours
             WHERE ratings_average >= $1
             GROUP BY UPPER(difficulty)
             ORDER BY avg_price ASC",
        )
        .bind(STATS_MIN_RATING)
        .fetch_all(&self.pool)
        .await?;

        Ok(stats)
    }

    async fn monthly_plan(&self, year: i32) -> Result<Vec<MonthlyPlan>, RepoError> {
        let Some((start, end)) = year_bounds(year) else {
            return Ok(Vec::new());
        };

        let plan = sqlx::query_as::<_, MonthlyPlan>(
            "SELECT EXTRACT(MONTH FROM s.start_date AT TIME ZONE 'UTC')::int4 AS month,
                    COUNT(*)::int8 AS num_tour_starts,
                    ARRAY_AGG(t.name::text ORDER BY s.start_date, t.name) AS tours
             FROM tours t
             CROSS JOIN LATERAL UNNEST(t.start_dates) AS s(start_date)
             WHERE s.start_date >= $1 AND s.start_date < $2
             GROUP BY 1
             ORDER BY 1 ASC
             LIMIT 12",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(plan)
    }

    async fn tours_within(&self, center: GeoPoint, radians: f64) -> Result<Vec<Tour>, RepoError> {
        let records = sqlx::query_as::<_, TourRecord>(&format!(
            "SELECT {cols} FROM tours
             WHERE secret_tour = FALSE
               AND start_location IS NOT NULL
               AND angular_distance($1, $2, {lat}, {lng}) <= $3
             ORDER BY created_at ASC",
            cols = TOUR_COLUMNS,
            lat = START_LAT,
            lng = START_LNG,
        ))
        .bind(center.lat)
        .bind(center.lng)
        .bind(radians)
        .fetch_all(&self.pool)
        .await?;

        self.populate_guides(records).await
    }

    async fn distances(
        &self,
        center: GeoPoint,
        multiplier: f64,
    ) -> Result<Vec<TourDistance>, RepoError> {
        let distances = sqlx::query_as::<_, TourDistance>(&format!(
            "SELECT id, name::text AS name,
                    angular_distance($1, $2, {lat}, {lng}) * $3 * $4 AS distance
             FROM tours
             WHERE start_location IS NOT NULL
             ORDER BY distance ASC",
            lat = START_LAT,
            lng = START_LNG,
        ))
        .bind(center.lat)
        .bind(center.lng)
        .bind(EARTH_RADIUS_M)
        .bind(multiplier)
        .fetch_all(&self.pool)
        .await?;

        Ok(distances)
    }
}
