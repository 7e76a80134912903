/// Domain models
///
/// Each model comes in two shapes: the API view (`Tour`, `User`, `Review`),
/// serialized with camelCase keys, and the stored record (`TourRecord`,
/// `UserRecord`, `ReviewRecord`) shared by both repository implementations.
/// Creation and update inputs derive `validator::Validate`.
///
/// # Models
///
/// - `tour`: tours, locations, slug derivation, rating rounding
/// - `user`: accounts and roles
/// - `review`: reviews and tour rating summaries

pub mod review;
pub mod tour;
pub mod user;

pub use review::{CreateReview, Review, ReviewAuthor, ReviewRecord, UpdateReview};
pub use tour::{CreateTour, Difficulty, Location, Tour, TourRecord, UpdateTour};
pub use user::{CreateUser, Role, UpdateUser, User, UserCredentials, UserRecord};
