/// Middleware for the API server
///
/// Authentication middleware lives in `haven_shared::auth::middleware`.

pub mod security;
