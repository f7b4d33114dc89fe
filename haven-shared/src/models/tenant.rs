/// Tenant model and database operations
///
/// Tenants are the isolation boundary. The `tenants` table carries no
/// row-level policy (a slug must be resolvable before any scope exists), so
/// lookups go straight to the pool. Creation still runs inside a scope bound
/// to the new tenant's id, which lets registration insert the tenant and its
/// first user in one transaction.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE tenants (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(255) NOT NULL,
///     slug VARCHAR(63) NOT NULL UNIQUE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::db::{ScopedTx, StoreError, TenantDb};
use crate::tenant::TenantId;

pub const MIN_SLUG_LEN: usize = 3;
pub const MAX_SLUG_LEN: usize = 63;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    /// URL-safe unique handle used at login
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTenant {
    pub name: String,
    pub slug: String,
}

/// Lowercase letters, digits and inner hyphens, 3 to 63 characters
pub fn validate_slug(slug: &str) -> Result<(), StoreError> {
    if !(MIN_SLUG_LEN..=MAX_SLUG_LEN).contains(&slug.len()) {
        return Err(StoreError::validation(
            "slug",
            format!("must be {} to {} characters", MIN_SLUG_LEN, MAX_SLUG_LEN),
        ));
    }

    let allowed = slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !allowed || slug.starts_with('-') || slug.ends_with('-') {
        return Err(StoreError::validation(
            "slug",
            "may contain only lowercase letters, digits and inner hyphens",
        ));
    }

    Ok(())
}

impl Tenant {
    pub fn tenant_id(&self) -> TenantId {
        TenantId::new(self.id)
    }

    /// Inserts the tenant the transaction is scoped to
    ///
    /// The row id is the scope's tenant id, so users created later in the
    /// same transaction belong to it.
    pub async fn insert(tx: &mut ScopedTx, data: CreateTenant) -> Result<Self, StoreError> {
        validate_slug(&data.slug)?;

        let tenant = sqlx::query_as::<_, Tenant>(
            r#"
            INSERT INTO tenants (id, name, slug)
            VALUES ($1, $2, $3)
            RETURNING id, name, slug, created_at, updated_at
            "#,
        )
        .bind(tx.tenant_id().as_uuid())
        .bind(data.name)
        .bind(data.slug)
        .fetch_one(tx.conn())
        .await?;

        Ok(tenant)
    }

    /// Creates a tenant with a fresh id
    ///
    /// # Errors
    ///
    /// - `StoreError::Validation` for a malformed slug
    /// - `StoreError::Conflict` when the slug is taken
    #[instrument(
        skip(db, data),
        fields(db.system = "postgresql", db.operation = "INSERT", db.sql.table = "tenants", slug = %data.slug)
    )]
    pub async fn create(db: &TenantDb, data: CreateTenant) -> Result<Self, StoreError> {
        db.run_scoped(TenantId::generate(), |tx| {
            Box::pin(async move { Tenant::insert(tx, data).await })
        })
        .await
    }

    #[instrument(
        skip(db),
        fields(db.system = "postgresql", db.operation = "SELECT", db.sql.table = "tenants")
    )]
    pub async fn find_by_id(db: &TenantDb, id: TenantId) -> Result<Option<Self>, StoreError> {
        let tenant = sqlx::query_as::<_, Tenant>(
            r#"
            SELECT id, name, slug, created_at, updated_at
            FROM tenants
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(db.pool())
        .await?;

        Ok(tenant)
    }

    #[instrument(
        skip(db),
        fields(db.system = "postgresql", db.operation = "SELECT", db.sql.table = "tenants")
    )]
    pub async fn find_by_slug(db: &TenantDb, slug: &str) -> Result<Option<Self>, StoreError> {
        let tenant = sqlx::query_as::<_, Tenant>(
            r#"
            SELECT id, name, slug, created_at, updated_at
            FROM tenants
            WHERE slug = $1
            "#,
        )
        .bind(slug)
        .fetch_optional(db.pool())
        .await?;

        Ok(tenant)
    }
}
