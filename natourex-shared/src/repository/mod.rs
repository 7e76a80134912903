/// Storage abstraction for tours, users and reviews
///
/// Handlers talk to storage only through the traits in this module, so the
/// same router runs against PostgreSQL in production and against the
/// in-memory store in development and tests.
///
/// # Traits
///
/// - [`Entity`]: a resource served by the generic CRUD handlers (field
///   catalog, default sort, input types, repository lookup)
/// - [`Repository`]: find/get/create/update/delete for one entity
/// - [`TourAnalytics`]: tour reports and geospatial queries
/// - [`Credentials`]: password hash lookup for login
/// - [`HealthCheck`]: readiness probe
///
/// # Find Pipeline (tours)
///
/// Every tour read, update and delete excludes secret tours and resolves
/// guides. `find_by_id` additionally resolves reviews when `"reviews"` is in
/// the populate list.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use natourex_shared::repository::{memory::MemoryStore, Repositories};
///
/// let repos = Repositories::from_store(Arc::new(MemoryStore::new()));
/// assert_eq!(repos.health.backend(), "memory");
/// ```

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::analytics::{DifficultyStats, MonthlyPlan, TourDistance};
use crate::auth::password::PasswordError;
use crate::geo::GeoPoint;
use crate::models::{
    CreateReview, CreateTour, CreateUser, Review, Tour, UpdateReview, UpdateTour, UpdateUser,
    User, UserCredentials,
};
use crate::models::{review::REVIEW_FIELDS, tour::TOUR_FIELDS, user::USER_FIELDS};
use crate::query::{FieldSpec, FieldValue, ListQuery};

/// Populate key resolving a tour's reviews
pub const POPULATE_REVIEWS: &str = "reviews";

/// Errors raised by repositories
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// Unique constraint violated
    #[error("Duplicate field value: {field}. Please use another value!")]
    Duplicate { field: String },

    /// Referenced tour or user does not exist
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// Underlying database failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Stored data cannot be mapped to a model
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// Password hashing failed while creating a user
    #[error("Password error: {0}")]
    Password(#[from] PasswordError),

    /// In-memory store lock poisoned by a panicking writer
    #[error("Store lock poisoned")]
    Poisoned,
}

/// A resource served by the generic CRUD handlers
pub trait Entity: Serialize + Clone + Send + Sync + 'static {
    /// Creation input
    type Create: DeserializeOwned + Validate + Send + 'static;

    /// Partial update input
    type Update: DeserializeOwned + Validate + Send + 'static;

    /// Singular name used in log fields and error messages
    const NAME: &'static str;

    /// Fields accepted for filtering and sorting
    const FIELDS: &'static [FieldSpec];

    /// Sort applied when the query has none
    const DEFAULT_SORT: &'static str = "-createdAt";

    fn id(&self) -> Uuid;

    /// Value of a catalog field, for in-memory evaluation of a [`ListQuery`]
    fn field_value(&self, field: &str) -> Option<FieldValue>;

    /// The repository serving this entity
    fn repository(repos: &Repositories) -> &Arc<dyn Repository<Self>>;
}

/// CRUD operations for one entity
#[async_trait]
pub trait Repository<E: Entity>: Send + Sync {
    /// Filtered, sorted, paginated listing
    async fn find(&self, query: &ListQuery) -> Result<Vec<E>, RepoError>;

    /// Single record, resolving the named relations
    async fn find_by_id(&self, id: Uuid, populate: &[&str]) -> Result<Option<E>, RepoError>;

    async fn create(&self, input: E::Create) -> Result<E, RepoError>;

    /// `None` when no record matches
    async fn update(&self, id: Uuid, input: E::Update) -> Result<Option<E>, RepoError>;

    /// `false` when no record matches
    async fn delete(&self, id: Uuid) -> Result<bool, RepoError>;
}

/// Tour reports and geospatial queries
#[async_trait]
pub trait TourAnalytics: Send + Sync {
    /// Difficulty statistics over tours rated 4.5 or above
    async fn tour_stats(&self) -> Result<Vec<DifficultyStats>, RepoError>;

    /// Tour starts per month of a calendar year
    async fn monthly_plan(&self, year: i32) -> Result<Vec<MonthlyPlan>, RepoError>;

    /// Non-secret tours starting within `radians` of `center`
    async fn tours_within(&self, center: GeoPoint, radians: f64) -> Result<Vec<Tour>, RepoError>;

    /// Distance of every located tour, meters scaled by `multiplier`
    async fn distances(
        &self,
        center: GeoPoint,
        multiplier: f64,
    ) -> Result<Vec<TourDistance>, RepoError>;
}

/// Password lookup for the login flow
#[async_trait]
pub trait Credentials: Send + Sync {
    /// User and hash for an email, case-insensitive
    async fn find_credentials(&self, email: &str) -> Result<Option<UserCredentials>, RepoError>;
}

/// Readiness probe
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn ping(&self) -> Result<(), RepoError>;

    /// Backend name reported by the health endpoint
    fn backend(&self) -> &'static str;
}

/// Every repository the API needs, built once at start-up
#[derive(Clone)]
pub struct Repositories {
    pub tours: Arc<dyn Repository<Tour>>,
    pub users: Arc<dyn Repository<User>>,
    pub reviews: Arc<dyn Repository<Review>>,
    pub analytics: Arc<dyn TourAnalytics>,
    pub credentials: Arc<dyn Credentials>,
    pub health: Arc<dyn HealthCheck>,
}

impl Repositories {
    /// Uses one store for every concern
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: Repository<Tour>
            + Repository<User>
            + Repository<Review>
            + TourAnalytics
            + Credentials
            + HealthCheck
            + 'static,
    {
        Self {
            tours: store.clone(),
            users: store.clone(),
            reviews: store.clone(),
            analytics: store.clone(),
            credentials: store.clone(),
            health: store,
        }
    }
}

impl Entity for Tour {
    type Create = CreateTour;
    type Update = UpdateTour;

    const NAME: &'static str = "tour";
    const FIELDS: &'static [FieldSpec] = TOUR_FIELDS;

    fn id(&self) -> Uuid {
        self.id
    }

    fn field_value(&self, field: &str) -> Option<FieldValue> {
        Tour::field_value(self, field)
    }

    fn repository(repos: &Repositories) -> &Arc<dyn Repository<Self>> {
        &repos.tours
    }
}

impl Entity for User {
    type Create = CreateUser;
    type Update = UpdateUser;

    const NAME: &'static str = "user";
    const FIELDS: &'static [FieldSpec] = USER_FIELDS;

    fn id(&self) -> Uuid {
        self.id
    }

    fn field_value(&self, field: &str) -> Option<FieldValue> {
        User::field_value(self, field)
    }

    fn repository(repos: &Repositories) -> &Arc<dyn Repository<Self>> {
        &repos.users
    }
}

impl Entity for Review {
    type Create = CreateReview;
    type Update = UpdateReview;

    const NAME: &'static str = "review";
    const FIELDS: &'static [FieldSpec] = REVIEW_FIELDS;

    fn id(&self) -> Uuid {
        self.id
    }

    fn field_value(&self, field: &str) -> Option<FieldValue> {
        Review::field_value(self, field)
    }

    fn repository(repos: &Repositories) -> &Arc<dyn Repository<Self>> {
        &repos.reviews
    }
}
