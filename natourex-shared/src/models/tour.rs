/// Tour model
///
/// A tour is stored as a `tours` row plus an ordered `tour_guides` join. Its
/// nested documents (start location and waypoints) live in JSONB columns.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE tours (
///     id UUID PRIMARY KEY,
///     name VARCHAR(40) NOT NULL UNIQUE,
///     slug VARCHAR(60) NOT NULL,
///     duration INTEGER NOT NULL,
///     max_group_size INTEGER NOT NULL,
///     difficulty VARCHAR(10) NOT NULL,
///     ratings_average DOUBLE PRECISION NOT NULL DEFAULT 4.5,
///     ratings_quantity INTEGER NOT NULL DEFAULT 0,
///     price DOUBLE PRECISION NOT NULL,
///     price_discount DOUBLE PRECISION,
///     summary TEXT NOT NULL,
///     description TEXT,
///     image_cover VARCHAR(255) NOT NULL,
///     images TEXT[] NOT NULL DEFAULT '{}',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     start_dates TIMESTAMPTZ[] NOT NULL DEFAULT '{}',
///     secret_tour BOOLEAN NOT NULL DEFAULT FALSE,
///     start_location JSONB,
///     locations JSONB NOT NULL DEFAULT '[]'
/// );
/// ```
///
/// # Write Pipeline
///
/// Repositories apply these steps explicitly:
///
/// 1. `TourRecord::from_create` / `TourRecord::apply` derive the slug from the
///    name and round the rating average to one decimal
/// 2. Guide ids are checked against existing users
/// 3. `TourRecord::into_tour` resolves guides into full user documents

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::types::Json;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::review::Review;
use super::user::User;
use crate::geo::GeoPoint;
use crate::query::{FieldKind, FieldSpec, FieldValue};

/// Rating given to a tour without reviews
pub const DEFAULT_RATINGS_AVERAGE: f64 = 4.5;

/// Queryable tour fields
pub const TOUR_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("id", "id", FieldKind::Id),
    FieldSpec::new("name", "name", FieldKind::Text),
    FieldSpec::new("slug", "slug", FieldKind::Text),
    FieldSpec::new("duration", "duration", FieldKind::Number),
    FieldSpec::new("maxGroupSize", "max_group_size", FieldKind::Number),
    FieldSpec::new("difficulty", "difficulty", FieldKind::Text),
    FieldSpec::new("ratingsAverage", "ratings_average", FieldKind::Number),
    FieldSpec::new("ratingsQuantity", "ratings_quantity", FieldKind::Number),
    FieldSpec::new("price", "price", FieldKind::Number),
    FieldSpec::new("priceDiscount", "price_discount", FieldKind::Number),
    FieldSpec::new("summary", "summary", FieldKind::Text),
    FieldSpec::new("secretTour", "secret_tour", FieldKind::Bool),
    FieldSpec::new("createdAt", "created_at", FieldKind::Timestamp),
];

/// Tour difficulty level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Difficult,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Difficult => "difficult",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "difficult" => Ok(Difficulty::Difficult),
            other => Err(format!("Difficulty is either: easy, medium, difficult (got '{}')", other)),
        }
    }
}

/// GeoJSON point with optional description, used for start and waypoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Always "Point"
    #[serde(rename = "type", default = "point_type")]
    pub kind: String,

    /// `[lng, lat]`
    pub coordinates: [f64; 2],

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Day of the tour this waypoint is visited (waypoints only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<i32>,
}

fn point_type() -> String {
    "Point".to_string()
}

impl Location {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::from_coordinates(self.coordinates)
    }

    fn check(&self) -> Result<(), ValidationError> {
        if self.kind != "Point" {
            return Err(validation_error("location", "Location type must be 'Point'".to_string()));
        }
        GeoPoint::new(self.coordinates[1], self.coordinates[0])
            .map(|_| ())
            .map_err(|e| validation_error("location", e.to_string()))
    }
}

/// Tour as returned by the API, with guides resolved
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tour {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub duration: i32,
    pub max_group_size: i32,
    pub difficulty: Difficulty,
    pub ratings_average: f64,
    pub ratings_quantity: i32,
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_discount: Option<f64>,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub image_cover: String,
    pub images: Vec<String>,

    /// Hidden from API output
    #[serde(skip_serializing)]
    pub created_at: DateTime<Utc>,

    pub start_dates: Vec<DateTime<Utc>>,
    pub secret_tour: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_location: Option<Location>,
    pub locations: Vec<Location>,
    pub guides: Vec<User>,

    /// Present only when reviews were populated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviews: Option<Vec<Review>>,

    /// Derived from `duration`
    pub duration_weeks: f64,
}

impl Tour {
    pub fn field_value(&self, field: &str) -> Option<FieldValue> {
        match field {
            "id" => Some(FieldValue::Id(self.id)),
            "name" => Some(FieldValue::Text(self.name.clone())),
            "slug" => Some(FieldValue::Text(self.slug.clone())),
            "duration" => Some(FieldValue::Number(self.duration.into())),
            "maxGroupSize" => Some(FieldValue::Number(self.max_group_size.into())),
            "difficulty" => Some(FieldValue::Text(self.difficulty.as_str().to_string())),
            "ratingsAverage" => Some(FieldValue::Number(self.ratings_average)),
            "ratingsQuantity" => Some(FieldValue::Number(self.ratings_quantity.into())),
            "price" => Some(FieldValue::Number(self.price)),
            "priceDiscount" => self.price_discount.map(FieldValue::Number),
            "summary" => Some(FieldValue::Text(self.summary.clone())),
            "secretTour" => Some(FieldValue::Bool(self.secret_tour)),
            "createdAt" => Some(FieldValue::Timestamp(self.created_at)),
            _ => None,
        }
    }
}

/// Stored form of a tour, shared by the PostgreSQL and in-memory stores
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TourRecord {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub duration: i32,
    pub max_group_size: i32,
    pub difficulty: String,
    pub ratings_average: f64,
    pub ratings_quantity: i32,
    pub price: f64,
    pub price_discount: Option<f64>,
    pub summary: String,
    pub description: Option<String>,
    pub image_cover: String,
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub start_dates: Vec<DateTime<Utc>>,
    pub secret_tour: bool,
    pub start_location: Option<Json<Location>>,
    pub locations: Json<Vec<Location>>,

    /// Guide user ids in display order
    pub guide_ids: Vec<Uuid>,
}

impl TourRecord {
    /// Builds a new record from validated input
    pub fn from_create(input: CreateTour) -> Self {
        let name = input.name.trim().to_string();
        Self {
            id: Uuid::new_v4(),
            slug: slugify(&name),
            name,
            duration: input.duration,
            max_group_size: input.max_group_size,
            difficulty: input.difficulty.as_str().to_string(),
            ratings_average: round_rating(input.ratings_average.unwrap_or(DEFAULT_RATINGS_AVERAGE)),
            ratings_quantity: input.ratings_quantity.unwrap_or(0),
            price: input.price,
            price_discount: input.price_discount,
            summary: input.summary.trim().to_string(),
            description: input.description.map(|d| d.trim().to_string()),
            image_cover: input.image_cover,
            images: input.images,
            created_at: Utc::now(),
            start_dates: input.start_dates,
            secret_tour: input.secret_tour,
            start_location: input.start_location.map(Json),
            locations: Json(input.locations),
            guide_ids: dedup_ids(input.guides),
        }
    }

    /// Applies a partial update; the slug follows a renamed tour
    pub fn apply(&mut self, input: UpdateTour) {
        if let Some(name) = input.name {
            self.name = name.trim().to_string();
            self.slug = slugify(&self.name);
        }
        if let Some(duration) = input.duration {
            self.duration = duration;
        }
        if let Some(max_group_size) = input.max_group_size {
            self.max_group_size = max_group_size;
        }
        if let Some(difficulty) = input.difficulty {
            self.difficulty = difficulty.as_str().to_string();
        }
        if let Some(avg) = input.ratings_average {
            self.ratings_average = round_rating(avg);
        }
        if let Some(quantity) = input.ratings_quantity {
            self.ratings_quantity = quantity;
        }
        if let Some(price) = input.price {
            self.price = price;
        }
        if let Some(discount) = input.price_discount {
            self.price_discount = Some(discount);
        }
        if let Some(summary) = input.summary {
            self.summary = summary.trim().to_string();
        }
        if let Some(description) = input.description {
            self.description = Some(description.trim().to_string());
        }
        if let Some(image_cover) = input.image_cover {
            self.image_cover = image_cover;
        }
        if let Some(images) = input.images {
            self.images = images;
        }
        if let Some(start_dates) = input.start_dates {
            self.start_dates = start_dates;
        }
        if let Some(secret) = input.secret_tour {
            self.secret_tour = secret;
        }
        if let Some(start_location) = input.start_location {
            self.start_location = Some(Json(start_location));
        }
        if let Some(locations) = input.locations {
            self.locations = Json(locations);
        }
        if let Some(guides) = input.guides {
            self.guide_ids = dedup_ids(guides);
        }
    }

    pub fn start_point(&self) -> Option<GeoPoint> {
        self.start_location.as_ref().map(|l| l.0.point())
    }

    /// Converts into the API shape with resolved guides
    ///
    /// # Errors
    ///
    /// Returns the offending value if the stored difficulty is not recognised.
    pub fn into_tour(self, guides: Vec<User>) -> Result<Tour, String> {
        let difficulty = self.difficulty.parse::<Difficulty>()?;

        Ok(Tour {
            id: self.id,
            duration_weeks: f64::from(self.duration) / 7.0,
            name: self.name,
            slug: self.slug,
            duration: self.duration,
            max_group_size: self.max_group_size,
            difficulty,
            ratings_average: self.ratings_average,
            ratings_quantity: self.ratings_quantity,
            price: self.price,
            price_discount: self.price_discount,
            summary: self.summary,
            description: self.description,
            image_cover: self.image_cover,
            images: self.images,
            created_at: self.created_at,
            start_dates: self.start_dates,
            secret_tour: self.secret_tour,
            start_location: self.start_location.map(|l| l.0),
            locations: self.locations.0,
            guides,
            reviews: None,
        })
    }
}

/// Input for creating a tour
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_create_tour", skip_on_field_errors = false))]
pub struct CreateTour {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 10, max = 40, message = "A tour name must have between 10 and 40 characters"))]
    pub name: String,

    #[validate(range(min = 1, message = "A tour must have a positive duration"))]
    pub duration: i32,

    #[validate(range(min = 1, message = "A tour must have a positive group size"))]
    pub max_group_size: i32,

    pub difficulty: Difficulty,

    #[serde(default, deserialize_with = "rounded_rating")]
    #[validate(range(min = 0.5, max = 5.0, message = "Rating must be between 0.5 and 5.0"))]
    pub ratings_average: Option<f64>,

    #[validate(range(min = 0, message = "Ratings quantity cannot be negative"))]
    pub ratings_quantity: Option<i32>,

    #[validate(range(min = 0.0, message = "A tour price cannot be negative"))]
    pub price: f64,

    pub price_discount: Option<f64>,

    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, message = "A tour must have a summary"))]
    pub summary: String,

    pub description: Option<String>,

    #[validate(length(min = 1, message = "A tour must have a cover image"))]
    pub image_cover: String,

    #[serde(default)]
    pub images: Vec<String>,

    #[serde(default)]
    pub start_dates: Vec<DateTime<Utc>>,

    #[serde(default)]
    pub secret_tour: bool,

    pub start_location: Option<Location>,

    #[serde(default)]
    pub locations: Vec<Location>,

    #[serde(default)]
    pub guides: Vec<Uuid>,
}

/// Discount must stay below price; checked on creation only
fn validate_create_tour(tour: &CreateTour) -> Result<(), ValidationError> {
    if let Some(discount) = tour.price_discount {
        if discount >= tour.price {
            return Err(validation_error(
                "price_discount",
                format!("Discount price ({}) should be below the regular price", discount),
            ));
        }
    }

    check_locations(tour.start_location.as_ref(), Some(&tour.locations))
}

/// Input for a partial tour update
///
/// The discount-vs-price rule is not re-checked here.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_update_tour", skip_on_field_errors = false))]
pub struct UpdateTour {
    #[serde(default, deserialize_with = "trimmed_opt")]
    #[validate(length(min = 10, max = 40, message = "A tour name must have between 10 and 40 characters"))]
    pub name: Option<String>,

    #[validate(range(min = 1, message = "A tour must have a positive duration"))]
    pub duration: Option<i32>,

    #[validate(range(min = 1, message = "A tour must have a positive group size"))]
    pub max_group_size: Option<i32>,

    pub difficulty: Option<Difficulty>,

    #[serde(default, deserialize_with = "rounded_rating")]
    #[validate(range(min = 0.5, max = 5.0, message = "Rating must be between 0.5 and 5.0"))]
    pub ratings_average: Option<f64>,

    #[validate(range(min = 0, message = "Ratings quantity cannot be negative"))]
    pub ratings_quantity: Option<i32>,

    #[validate(range(min = 0.0, message = "A tour price cannot be negative"))]
    pub price: Option<f64>,

    pub price_discount: Option<f64>,

    #[serde(default, deserialize_with = "trimmed_opt")]
    #[validate(length(min = 1, message = "A tour must have a summary"))]
    pub summary: Option<String>,

    pub description: Option<String>,

    pub image_cover: Option<String>,

    pub images: Option<Vec<String>>,

    pub start_dates: Option<Vec<DateTime<Utc>>>,

    pub secret_tour: Option<bool>,

    pub start_location: Option<Location>,

    pub locations: Option<Vec<Location>>,

    pub guides: Option<Vec<Uuid>>,
}

fn validate_update_tour(tour: &UpdateTour) -> Result<(), ValidationError> {
    check_locations(tour.start_location.as_ref(), tour.locations.as_ref())
}

fn check_locations(
    start: Option<&Location>,
    waypoints: Option<&Vec<Location>>,
) -> Result<(), ValidationError> {
    if let Some(start) = start {
        start.check()?;
    }
    for location in waypoints.into_iter().flatten() {
        location.check()?;
    }
    Ok(())
}

fn validation_error(code: &'static str, message: String) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(message.into());
    error
}

// Input is normalized while decoding, so the length and range validators
// see the trimmed text and the stored rating.

fn trimmed<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    String::deserialize(deserializer).map(|s| s.trim().to_string())
}

fn trimmed_opt<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Option::<String>::deserialize(deserializer).map(|s| s.map(|s| s.trim().to_string()))
}

fn rounded_rating<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Option::<f64>::deserialize(deserializer).map(|v| v.map(round_rating))
}

/// Rounds a rating to one decimal (4.666 -> 4.7)
pub fn round_rating(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// URL slug: lowercase alphanumerics separated by single dashes
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

fn dedup_ids(ids: Vec<Uuid>) -> Vec<Uuid> {
    let mut seen = Vec::with_capacity(ids.len());
    for id in ids {
        if !seen.contains(&id) {
            seen.push(id);
        }
    }
    seen
}
