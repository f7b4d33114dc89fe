/// Database layer for Haven
///
/// - `pool`: PostgreSQL connection pool management with health checks
/// - `migrations`: embedded schema migrations
/// - `scope`: tenant-scoped transactions, the only path to tenant data
/// - `error`: storage error classification
///
/// Repositories live in the `models` module at crate root level.

pub mod error;
pub mod migrations;
pub mod pool;
pub mod scope;

pub use error::StoreError;
pub use scope::{ScopedTx, TenantDb};
