//! In-memory store
//!
//! Implements every repository trait over plain vectors behind a `RwLock`.
//! Used when no `DATABASE_URL` is configured and by the router tests. It keeps
//! the same rules as the PostgreSQL store: unique tour names and emails, one
//! review per (tour, user), cascading deletes and rating refreshes.

use async_trait::async_trait;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;
use uuid::Uuid;

use super::{
    Credentials, HealthCheck, RepoError, Repository, TourAnalytics, POPULATE_REVIEWS,
};
use crate::analytics::{self, DifficultyStats, MonthlyPlan, TourDistance};
use crate::auth::password::hash_password_blocking;
use crate::geo::GeoPoint;
use crate::models::review::RatingSummary;
use crate::models::user::normalize_email;
use crate::models::{
    CreateReview, CreateTour, CreateUser, Review, ReviewAuthor, ReviewRecord, Tour, TourRecord,
    UpdateReview, UpdateTour, UpdateUser, User, UserCredentials, UserRecord,
};
use crate::query::ListQuery;

#[derive(Default)]
struct MemoryData {
    tours: Vec<TourRecord>,
    users: Vec<UserRecord>,
    reviews: Vec<ReviewRecord>,
}

impl MemoryData {
    fn user(&self, id: Uuid) -> Option<&UserRecord> {
        self.users.iter().find(|u| u.id == id)
    }

    /// Visible tours exclude secret ones
    fn visible_tour_index(&self, id: Uuid) -> Option<usize> {
        self.tours.iter().position(|t| t.id == id && !t.secret_tour)
    }

    fn public_user(&self, record: &UserRecord) -> Result<User, RepoError> {
        record.to_user().map_err(RepoError::Corrupt)
    }

    /// Guides in stored order; ids of deleted users are skipped
    fn guides(&self, ids: &[Uuid]) -> Result<Vec<User>, RepoError> {
        ids.iter()
            .filter_map(|id| self.user(*id))
            .map(|record| self.public_user(record))
            .collect()
    }

    fn tour_view(&self, record: &TourRecord) -> Result<Tour, RepoError> {
        let guides = self.guides(&record.guide_ids)?;
        record.clone().into_tour(guides).map_err(RepoError::Corrupt)
    }

    fn review_view(&self, record: &ReviewRecord) -> Result<Review, RepoError> {
        let author = self.user(record.user_id).ok_or_else(|| {
            RepoError::Corrupt(format!("review {} has no author", record.id))
        })?;

        Ok(Review {
            id: record.id,
            review: record.review.clone(),
            rating: record.rating,
            created_at: record.created_at,
            tour: record.tour_id,
            user: ReviewAuthor {
                id: author.id,
                name: author.name.clone(),
                photo: author.photo.clone(),
            },
        })
    }

    fn check_guides(&self, ids: &[Uuid]) -> Result<(), RepoError> {
        match ids.iter().find(|id| self.user(**id).is_none()) {
            Some(missing) => Err(RepoError::InvalidReference(format!("guide {}", missing))),
            None => Ok(()),
        }
    }

    fn check_unique_tour_name(&self, name: &str, except: Option<Uuid>) -> Result<(), RepoError> {
        if self.tours.iter().any(|t| t.name == name && Some(t.id) != except) {
            return Err(RepoError::Duplicate { field: "name".to_string() });
        }
        Ok(())
    }

    fn check_unique_email(&self, email: &str, except: Option<Uuid>) -> Result<(), RepoError> {
        if self.users.iter().any(|u| u.email == email && Some(u.id) != except) {
            return Err(RepoError::Duplicate { field: "email".to_string() });
        }
        Ok(())
    }

    /// Recomputes a tour's rating fields from its reviews
    fn refresh_rating(&mut self, tour_id: Uuid) {
        let ratings: Vec<f64> = self
            .reviews
            .iter()
            .filter(|r| r.tour_id == tour_id)
            .map(|r| r.rating)
            .collect();
        let summary = RatingSummary::from_ratings(&ratings);

        if let Some(tour) = self.tours.iter_mut().find(|t| t.id == tour_id) {
            tour.ratings_quantity = summary.quantity;
            tour.ratings_average = summary.average;
            debug!(
                tour_id = %tour_id,
                ratings_quantity = summary.quantity,
                ratings_average = summary.average,
                "Refreshed tour rating"
            );
        }
    }
}

/// Store keeping all records in process memory
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<MemoryData>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryData>, RepoError> {
        self.data.read().map_err(|_| RepoError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryData>, RepoError> {
        self.data.write().map_err(|_| RepoError::Poisoned)
    }

    /// Inserts a prepared user record, e.g. seed data with a precomputed hash
    pub fn insert_user(&self, record: UserRecord) -> Result<User, RepoError> {
        let mut data = self.write()?;
        data.check_unique_email(&record.email, None)?;
        let user = data.public_user(&record)?;
        data.users.push(record);
        Ok(user)
    }

    /// Inserts a prepared tour record, keeping its id and timestamps
    pub fn insert_tour(&self, record: TourRecord) -> Result<Tour, RepoError> {
        let mut data = self.write()?;
        data.check_unique_tour_name(&record.name, None)?;
        data.check_guides(&record.guide_ids)?;
        let tour = data.tour_view(&record)?;
        data.tours.push(record);
        Ok(tour)
    }
}

#[async_trait]
impl Repository<Tour> for MemoryStore {
    async fn find(&self, query: &ListQuery) -> Result<Vec<Tour>, RepoError> {
        let data = self.read()?;
        let tours = data
            .tours
            .iter()
            .filter(|t| !t.secret_tour)
            .map(|t| data.tour_view(t))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(query.apply(tours, |t, field| t.field_value(field)))
    }

    async fn find_by_id(&self, id: Uuid, populate: &[&str]) -> Result<Option<Tour>, RepoError> {
        let data = self.read()?;
        let Some(index) = data.visible_tour_index(id) else {
            return Ok(None);
        };

        let mut tour = data.tour_view(&data.tours[index])?;
        if populate.contains(&POPULATE_REVIEWS) {
            let reviews = data
                .reviews
                .iter()
                .filter(|r| r.tour_id == id)
                .map(|r| data.review_view(r))
                .collect::<Result<Vec<_>, _>>()?;
            tour.reviews = Some(reviews);
        }

        Ok(Some(tour))
    }

    async fn create(&self, input: CreateTour) -> Result<Tour, RepoError> {
        let record = TourRecord::from_create(input);
        self.insert_tour(record)
    }

    async fn update(&self, id: Uuid, input: UpdateTour) -> Result<Option<Tour>, RepoError> {
        let mut data = self.write()?;
        let Some(index) = data.visible_tour_index(id) else {
            return Ok(None);
        };

        let mut record = data.tours[index].clone();
        record.apply(input);
        data.check_unique_tour_name(&record.name, Some(id))?;
        data.check_guides(&record.guide_ids)?;

        let tour = data.tour_view(&record)?;
        data.tours[index] = record;
        Ok(Some(tour))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, RepoError> {
        let mut data = self.write()?;
        let Some(index) = data.visible_tour_index(id) else {
            return Ok(false);
        };

        data.tours.remove(index);
        data.reviews.retain(|r| r.tour_id != id);
        Ok(true)
    }
}

#[async_trait]
impl Repository<User> for MemoryStore {
    async fn find(&self, query: &ListQuery) -> Result<Vec<User>, RepoError> {
        let data = self.read()?;
        let users = data
            .users
            .iter()
            .map(|u| data.public_user(u))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(query.apply(users, |u, field| u.field_value(field)))
    }

    async fn find_by_id(&self, id: Uuid, _populate: &[&str]) -> Result<Option<User>, RepoError> {
        let data = self.read()?;
        data.user(id).map(|u| data.public_user(u)).transpose()
    }

    async fn create(&self, input: CreateUser) -> Result<User, RepoError> {
        // Fail fast on a taken email before paying for the hash
        self.read()?.check_unique_email(&normalize_email(&input.email), None)?;

        let hash = hash_password_blocking(input.password.clone()).await?;
        self.insert_user(UserRecord::new(&input, hash))
    }

    async fn update(&self, id: Uuid, input: UpdateUser) -> Result<Option<User>, RepoError> {
        let mut data = self.write()?;
        let Some(index) = data.users.iter().position(|u| u.id == id) else {
            return Ok(None);
        };

        let mut record = data.users[index].clone();
        record.apply(input);
        data.check_unique_email(&record.email, Some(id))?;

        let user = data.public_user(&record)?;
        data.users[index] = record;
        Ok(Some(user))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, RepoError> {
        let mut data = self.write()?;
        let Some(index) = data.users.iter().position(|u| u.id == id) else {
            return Ok(false);
        };

        data.users.remove(index);

        let mut touched: Vec<Uuid> = data
            .reviews
            .iter()
            .filter(|r| r.user_id == id)
            .map(|r| r.tour_id)
            .collect();
        touched.dedup();

        data.reviews.retain(|r| r.user_id != id);
        for tour in data.tours.iter_mut() {
            tour.guide_ids.retain(|g| *g != id);
        }
        for tour_id in touched {
            data.refresh_rating(tour_id);
        }

        Ok(true)
    }
}

#[async_trait]
impl Repository<Review> for MemoryStore {
    async fn find(&self, query: &ListQuery) -> Result<Vec<Review>, RepoError> {
        let data = self.read()?;
        let reviews = data
            .reviews
            .iter()
            .map(|r| data.review_view(r))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(query.apply(reviews, |r, field| r.field_value(field)))
    }

    async fn find_by_id(&self, id: Uuid, _populate: &[&str]) -> Result<Option<Review>, RepoError> {
        let data = self.read()?;
        data.reviews
            .iter()
            .find(|r| r.id == id)
            .map(|r| data.review_view(r))
            .transpose()
    }

    async fn create(&self, input: CreateReview) -> Result<Review, RepoError> {
        let (Some(tour_id), Some(user_id)) = (input.tour, input.user) else {
            return Err(RepoError::InvalidReference(
                "review must reference a tour and a user".to_string(),
            ));
        };

        let mut data = self.write()?;
        if data.visible_tour_index(tour_id).is_none() {
            return Err(RepoError::InvalidReference(format!("tour {}", tour_id)));
        }
        if data.user(user_id).is_none() {
            return Err(RepoError::InvalidReference(format!("user {}", user_id)));
        }
        if data
            .reviews
            .iter()
            .any(|r| r.tour_id == tour_id && r.user_id == user_id)
        {
            return Err(RepoError::Duplicate { field: "tour, user".to_string() });
        }

        let record = ReviewRecord {
            id: Uuid::new_v4(),
            review: input.review.trim().to_string(),
            rating: input.rating,
            created_at: chrono::Utc::now(),
            tour_id,
            user_id,
        };
        let review = data.review_view(&record)?;
        data.reviews.push(record);
        data.refresh_rating(tour_id);

        Ok(review)
    }

    async fn update(&self, id: Uuid, input: UpdateReview) -> Result<Option<Review>, RepoError> {
        let mut data = self.write()?;
        let Some(index) = data.reviews.iter().position(|r| r.id == id) else {
            return Ok(None);
        };

        data.reviews[index].apply(input);
        let tour_id = data.reviews[index].tour_id;
        let review = data.review_view(&data.reviews[index])?;
        data.refresh_rating(tour_id);

        Ok(Some(review))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, RepoError> {
        let mut data = self.write()?;
        let Some(index) = data.reviews.iter().position(|r| r.id == id) else {
            return Ok(false);
        };

        let removed = data.reviews.remove(index);
        data.refresh_rating(removed.tour_id);
        Ok(true)
    }
}

#[async_trait]
impl TourAnalytics for MemoryStore {
    async fn tour_stats(&self) -> Result<Vec<DifficultyStats>, RepoError> {
        Ok(analytics::tour_stats(&self.read()?.tours))
    }

    async fn monthly_plan(&self, year: i32) -> Result<Vec<MonthlyPlan>, RepoError> {
        Ok(analytics::monthly_plan(&self.read()?.tours, year))
    }

    async fn tours_within(&self, center: GeoPoint, radians: f64) -> Result<Vec<Tour>, RepoError> {
        let data = self.read()?;
        analytics::tours_within(&data.tours, &center, radians)
            .into_iter()
            .filter(|t| !t.secret_tour)
            .map(|t| data.tour_view(t))
            .collect()
    }

    async fn distances(
        &self,
        center: GeoPoint,
        multiplier: f64,
    ) -> Result<Vec<TourDistance>, RepoError> {
        Ok(analytics::distances(&self.read()?.tours, &center, multiplier))
    }
}

#[async_trait]
impl Credentials for MemoryStore {
    async fn find_credentials(&self, email: &str) -> Result<Option<UserCredentials>, RepoError> {
        let data = self.read()?;
        let email = normalize_email(email);

        data.users
            .iter()
            .find(|u| u.email == email)
            .map(|record| -> Result<UserCredentials, RepoError> {
                Ok(UserCredentials {
                    user: data.public_user(record)?,
                    password_hash: record.password_hash.clone(),
                })
            })
            .transpose()
    }
}

#[async_trait]
impl HealthCheck for MemoryStore {
    async fn ping(&self) -> Result<(), RepoError> {
        self.read().map(|_| ())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
