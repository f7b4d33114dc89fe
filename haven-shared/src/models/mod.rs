/// Database models for Haven
///
/// Each model's operations open their own tenant-scoped transaction through
/// [`TenantDb`](crate::db::TenantDb); the `insert` building blocks take an
/// already open [`ScopedTx`](crate::db::ScopedTx) so several writes can share
/// one transaction.
///
/// - `tenant`: tenants and slug validation
/// - `user`: users, lookups, email verification
/// - `todo`: owner-scoped todo CRUD with idempotent create
/// - `todo_view`: public todos with author details
/// - `pagination`: validated limit/offset window

pub mod pagination;
pub mod tenant;
pub mod todo;
pub mod todo_view;
pub mod user;
