//! # Haven Shared Library
//!
//! Tenant isolation core for the Haven todo service.
//!
//! ## Module Organization
//!
//! - `auth`: token service, verified identity, bearer middleware, passwords
//! - `db`: pool, migrations, and the tenant-scoped transaction boundary
//! - `models`: repositories built exclusively on scoped transactions
//! - `tenant`: the `TenantId` newtype
//!
//! Tenant data is only reachable through [`db::TenantDb::run_scoped`], which
//! binds a transaction-local tenant marker that PostgreSQL row-level
//! security policies compare against every row.

pub mod auth;
pub mod db;
pub mod models;
pub mod tenant;

/// Current version of the Haven shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
