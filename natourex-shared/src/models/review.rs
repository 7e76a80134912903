/// Review model
///
/// A review belongs to one tour and one user; a user reviews a tour at most
/// once (`reviews_tour_user_key`). Every change to a tour's reviews refreshes
/// the tour's `ratings_quantity` and `ratings_average`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::tour::{round_rating, DEFAULT_RATINGS_AVERAGE};
use crate::query::{FieldKind, FieldSpec, FieldValue};

/// Queryable review fields
pub const REVIEW_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("id", "r.id", FieldKind::Id),
    FieldSpec::new("rating", "r.rating", FieldKind::Number),
    FieldSpec::new("tour", "r.tour_id", FieldKind::Id),
    FieldSpec::new("user", "r.user_id", FieldKind::Id),
    FieldSpec::new("createdAt", "r.created_at", FieldKind::Timestamp),
];

/// Author summary embedded in a review
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewAuthor {
    pub id: Uuid,
    pub name: String,
    pub photo: String,
}

/// Review as returned by the API
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: Uuid,
    pub review: String,
    pub rating: f64,
    pub created_at: DateTime<Utc>,
    pub tour: Uuid,
    pub user: ReviewAuthor,
}

impl Review {
    pub fn field_value(&self, field: &str) -> Option<FieldValue> {
        match field {
            "id" => Some(FieldValue::Id(self.id)),
            "rating" => Some(FieldValue::Number(self.rating)),
            "tour" => Some(FieldValue::Id(self.tour)),
            "user" => Some(FieldValue::Id(self.user.id)),
            "createdAt" => Some(FieldValue::Timestamp(self.created_at)),
            _ => None,
        }
    }
}

/// Stored form of a review
#[derive(Debug, Clone)]
pub struct ReviewRecord {
    pub id: Uuid,
    pub review: String,
    pub rating: f64,
    pub created_at: DateTime<Utc>,
    pub tour_id: Uuid,
    pub user_id: Uuid,
}

impl ReviewRecord {
    pub fn apply(&mut self, input: UpdateReview) {
        if let Some(review) = input.review {
            self.review = review.trim().to_string();
        }
        if let Some(rating) = input.rating {
            self.rating = rating;
        }
    }
}

/// Input for creating a review
///
/// `tour` and `user` are usually filled from the nested route and the
/// authenticated user rather than the body.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateReview {
    #[validate(length(min = 1, message = "Review can not be empty!"))]
    pub review: String,

    #[validate(range(min = 1.0, max = 5.0, message = "Rating must be between 1 and 5"))]
    pub rating: f64,

    #[validate(required(message = "Review must belong to a tour."))]
    pub tour: Option<Uuid>,

    #[validate(required(message = "Review must belong to a user"))]
    pub user: Option<Uuid>,
}

/// Input for editing a review's text or rating
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReview {
    #[validate(length(min = 1, message = "Review can not be empty!"))]
    pub review: Option<String>,

    #[validate(range(min = 1.0, max = 5.0, message = "Rating must be between 1 and 5"))]
    pub rating: Option<f64>,
}

/// Aggregate rating of a tour derived from its reviews
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingSummary {
    pub quantity: i32,
    pub average: f64,
}

impl RatingSummary {
    /// Summarizes ratings; no reviews resets to the default average
    pub fn from_ratings(ratings: &[f64]) -> Self {
        if ratings.is_empty() {
            return Self {
                quantity: 0,
                average: DEFAULT_RATINGS_AVERAGE,
            };
        }

        let sum: f64 = ratings.iter().sum();
        Self {
            quantity: ratings.len() as i32,
            average: round_rating(sum / ratings.len() as f64),
        }
    }
}
