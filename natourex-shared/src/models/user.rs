/// User model
///
/// Users author reviews and act as tour guides. The public [`User`] view never
/// carries the password hash; [`UserRecord`] is the stored form.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY,
///     name VARCHAR(100) NOT NULL,
///     email VARCHAR(255) NOT NULL UNIQUE,
///     photo VARCHAR(255) NOT NULL DEFAULT 'default.jpg',
///     role VARCHAR(20) NOT NULL DEFAULT 'user',
///     password_hash VARCHAR(255) NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```
/// use natourex_shared::models::user::Role;
///
/// let role: Role = "lead-guide".parse().unwrap();
/// assert_eq!(role, Role::LeadGuide);
/// assert_eq!(role.as_str(), "lead-guide");
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use crate::query::{FieldKind, FieldSpec, FieldValue};

/// Photo assigned to users who never uploaded one
pub const DEFAULT_PHOTO: &str = "default.jpg";

/// Queryable user fields
pub const USER_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("id", "id", FieldKind::Id),
    FieldSpec::new("name", "name", FieldKind::Text),
    FieldSpec::new("email", "email", FieldKind::Text),
    FieldSpec::new("role", "role", FieldKind::Text),
    FieldSpec::new("createdAt", "created_at", FieldKind::Timestamp),
];

/// Authorization role
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    #[default]
    User,
    Guide,
    LeadGuide,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Guide => "guide",
            Role::LeadGuide => "lead-guide",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "guide" => Ok(Role::Guide),
            "lead-guide" => Ok(Role::LeadGuide),
            "admin" => Ok(Role::Admin),
            other => Err(format!("Unknown role '{}'", other)),
        }
    }
}

/// Public user view
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub photo: String,
    pub role: Role,

    #[serde(skip_serializing)]
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn field_value(&self, field: &str) -> Option<FieldValue> {
        match field {
            "id" => Some(FieldValue::Id(self.id)),
            "name" => Some(FieldValue::Text(self.name.clone())),
            "email" => Some(FieldValue::Text(self.email.clone())),
            "role" => Some(FieldValue::Text(self.role.as_str().to_string())),
            "createdAt" => Some(FieldValue::Timestamp(self.created_at)),
            _ => None,
        }
    }
}

/// Stored form of a user, including the Argon2id hash
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRecord {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub photo: String,
    pub role: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    /// Builds a record from validated input and an already computed hash
    pub fn new(input: &CreateUser, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: input.name.trim().to_string(),
            email: normalize_email(&input.email),
            photo: input.photo.clone().unwrap_or_else(|| DEFAULT_PHOTO.to_string()),
            role: input.role.unwrap_or_default().as_str().to_string(),
            password_hash,
            created_at: Utc::now(),
        }
    }

    pub fn apply(&mut self, input: UpdateUser) {
        if let Some(name) = input.name {
            self.name = name.trim().to_string();
        }
        if let Some(email) = input.email {
            self.email = normalize_email(&email);
        }
        if let Some(photo) = input.photo {
            self.photo = photo;
        }
        if let Some(role) = input.role {
            self.role = role.as_str().to_string();
        }
    }

    /// Public view without the hash
    ///
    /// # Errors
    ///
    /// Returns the offending value if the stored role is not recognised.
    pub fn to_user(&self) -> Result<User, String> {
        Ok(User {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            photo: self.photo.clone(),
            role: self.role.parse()?,
            created_at: self.created_at,
        })
    }
}

/// Emails are stored trimmed and lowercase
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Input for creating a user (signup)
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUser {
    #[validate(length(min = 1, max = 100, message = "Please tell us your name!"))]
    pub name: String,

    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters long"))]
    pub password: String,

    #[validate(must_match(other = "password", message = "Passwords are not the same!"))]
    pub password_confirm: String,

    #[serde(default)]
    pub photo: Option<String>,

    /// Not accepted from request bodies; set by seeding and administration code
    #[serde(default, skip_deserializing)]
    pub role: Option<Role>,
}

/// Input for updating a user; passwords are not changed here
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUser {
    #[validate(length(min = 1, max = 100, message = "Please tell us your name!"))]
    pub name: Option<String>,

    #[validate(email(message = "Please provide a valid email"))]
    pub email: Option<String>,

    pub photo: Option<String>,

    pub role: Option<Role>,
}

/// Stored user plus hash, returned to the login flow only
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}
