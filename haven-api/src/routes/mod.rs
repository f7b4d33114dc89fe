/// API route handlers, organized by resource
///
/// - `health`: Health check endpoint
/// - `auth`: Registration, login, token refresh, email verification
/// - `users`: The authenticated user
/// - `todos`: Todo CRUD and the tenant's public todos

pub mod auth;
pub mod health;
pub mod todos;
pub mod users;
