/// Authentication primitives for Haven
///
/// # Modules
///
/// - [`jwt`]: HS256 token pairs carrying tenant, user, email and role
/// - [`identity`]: the verified [`identity::Identity`] handed to repositories
/// - [`middleware`]: Axum middleware turning a bearer token into an identity
/// - [`password`]: Argon2id password hashing and strength checks
/// - [`verification`]: email verification tokens (random, stored hashed)

pub mod identity;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod verification;
