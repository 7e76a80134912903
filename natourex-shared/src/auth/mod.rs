/// Authentication primitives
///
/// # Modules
///
/// - [`password`]: Argon2id hashing and verification
/// - [`jwt`]: HS256 token issuing and validation with user id and role claims
///
/// Request-level enforcement (`protect`, `restrict_to`) lives in the API crate.
///
/// # Example
///
/// ```
/// use chrono::Duration;
/// use natourex_shared::auth::jwt::{create_token, Claims};
/// use natourex_shared::auth::password::{hash_password, verify_password};
/// use natourex_shared::models::user::Role;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("test1234")?;
/// assert!(verify_password("test1234", &hash)?);
///
/// let claims = Claims::new(Uuid::new_v4(), Role::User, Duration::days(90));
/// let token = create_token(&claims, "a-secret-key-that-is-at-least-32-bytes")?;
/// assert!(!token.is_empty());
/// # Ok(())
/// # }
/// ```

pub mod jwt;
pub mod password;
