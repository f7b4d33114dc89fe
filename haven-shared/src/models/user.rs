/// User model and database operations
///
/// Users belong to exactly one tenant. Every operation runs inside a scope
/// bound to that tenant, and the `users_tenant_isolation` policy hides rows of
/// any other tenant, so a lookup by id or email cannot cross tenants even if
/// the id is known.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
///     email VARCHAR(255) NOT NULL,          -- unique per tenant, stored lowercase
///     password_hash VARCHAR(255) NOT NULL,
///     name VARCHAR(255) NOT NULL,
///     role VARCHAR(20) NOT NULL DEFAULT 'member',
///     email_verified BOOLEAN NOT NULL DEFAULT FALSE,
///     verification_token_hash VARCHAR(64),
///     verification_token_expires_at TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use haven_shared::auth::identity::Role;
/// use haven_shared::db::TenantDb;
/// use haven_shared::models::user::{CreateUser, User};
/// use haven_shared::tenant::TenantId;
///
/// # async fn example(db: TenantDb, tenant_id: TenantId) -> Result<(), Box<dyn std::error::Error>> {
/// let user = User::create(
///     &db,
///     tenant_id,
///     CreateUser {
///         email: "user@example.com".to_string(),
///         password_hash: "$argon2id$...".to_string(),
///         name: "Jo".to_string(),
///         role: Role::Member,
///         verification: None,
///     },
/// )
/// .await?;
///
/// let found = User::find_by_email(&db, tenant_id, "USER@example.com").await?;
/// assert_eq!(found.map(|u| u.id), Some(user.id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::auth::identity::Role;
use crate::db::{ScopedTx, StoreError, TenantDb};
use crate::models::pagination::Pagination;
use crate::tenant::TenantId;

const USER_COLUMNS: &str =
    "id, tenant_id, email, password_hash, name, role, email_verified, created_at, updated_at";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,

    /// Argon2id PHC string
    #[serde(skip_serializing)]
    pub password_hash: String,

    pub name: String,

    #[sqlx(try_from = "String")]
    pub role: Role,

    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Hash and expiry of a pending email verification
#[derive(Debug, Clone)]
pub struct PendingVerification {
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateUser {
    pub email: String,
    /// Argon2id hash, never plaintext
    pub password_hash: String,
    pub name: String,
    pub role: Role,
    pub verification: Option<PendingVerification>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub name: Option<String>,
}

/// Emails compare case-insensitively; they are stored trimmed and lowercase
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl User {
    pub fn tenant(&self) -> TenantId {
        TenantId::new(self.tenant_id)
    }

    /// Inserts a user into the tenant the transaction is scoped to
    pub async fn insert(tx: &mut ScopedTx, data: CreateUser) -> Result<Self, StoreError> {
        let (token_hash, expires_at) = match data.verification {
            Some(v) => (Some(v.token_hash), Some(v.expires_at)),
            None => (None, None),
        };

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (tenant_id, email, password_hash, name, role,
                               verification_token_hash, verification_token_expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(tx.tenant_id().as_uuid())
        .bind(normalize_email(&data.email))
        .bind(data.password_hash)
        .bind(data.name)
        .bind(data.role.as_str())
        .bind(token_hash)
        .bind(expires_at)
        .fetch_one(tx.conn())
        .await?;

        Ok(user)
    }

    /// # Errors
    ///
    /// `StoreError::Conflict` when the email is already registered in the tenant
    #[instrument(
        skip(db, data),
        fields(db.system = "postgresql", db.operation = "INSERT", db.sql.table = "users", tenant_id = %tenant_id)
    )]
    pub async fn create(
        db: &TenantDb,
        tenant_id: TenantId,
        data: CreateUser,
    ) -> Result<Self, StoreError> {
        db.run_scoped(tenant_id, |tx| {
            Box::pin(async move { User::insert(tx, data).await })
        })
        .await
    }

    #[instrument(
        skip(db),
        fields(db.system = "postgresql", db.operation = "SELECT", db.sql.table = "users", tenant_id = %tenant_id)
    )]
    pub async fn find_by_id(
        db: &TenantDb,
        tenant_id: TenantId,
        id: Uuid,
    ) -> Result<Option<Self>, StoreError> {
        db.run_scoped(tenant_id, move |tx| {
            Box::pin(async move {
                let user = sqlx::query_as::<_, User>(&format!(
                    "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
                ))
                .bind(id)
                .fetch_optional(tx.conn())
                .await?;

                Ok(user)
            })
        })
        .await
    }

    #[instrument(
        skip(db, email),
        fields(db.system = "postgresql", db.operation = "SELECT", db.sql.table = "users", tenant_id = %tenant_id)
    )]
    pub async fn find_by_email(
        db: &TenantDb,
        tenant_id: TenantId,
        email: &str,
    ) -> Result<Option<Self>, StoreError> {
        let email = normalize_email(email);

        db.run_scoped(tenant_id, move |tx| {
            Box::pin(async move {
                let user = sqlx::query_as::<_, User>(&format!(
                    "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
                ))
                .bind(email)
                .fetch_optional(tx.conn())
                .await?;

                Ok(user)
            })
        })
        .await
    }

    /// Batch lookup; ids outside the tenant are silently absent
    #[instrument(
        skip(db, ids),
        fields(db.system = "postgresql", db.operation = "SELECT", db.sql.table = "users", tenant_id = %tenant_id, count = ids.len())
    )]
    pub async fn find_by_ids(
        db: &TenantDb,
        tenant_id: TenantId,
        ids: &[Uuid],
    ) -> Result<Vec<Self>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = ids.to_vec();

        db.run_scoped(tenant_id, move |tx| {
            Box::pin(async move {
                let users = sqlx::query_as::<_, User>(&format!(
                    "SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1) ORDER BY created_at"
                ))
                .bind(ids)
                .fetch_all(tx.conn())
                .await?;

                Ok(users)
            })
        })
        .await
    }

    /// Newest first
    #[instrument(
        skip(db),
        fields(db.system = "postgresql", db.operation = "SELECT", db.sql.table = "users", tenant_id = %tenant_id)
    )]
    pub async fn list(
        db: &TenantDb,
        tenant_id: TenantId,
        page: Pagination,
    ) -> Result<Vec<Self>, StoreError> {
        db.run_scoped(tenant_id, move |tx| {
            Box::pin(async move {
                let users = sqlx::query_as::<_, User>(&format!(
                    r#"
                    SELECT {USER_COLUMNS}
                    FROM users
                    ORDER BY created_at DESC
                    LIMIT $1 OFFSET $2
                    "#
                ))
                .bind(page.limit())
                .bind(page.offset())
                .fetch_all(tx.conn())
                .await?;

                Ok(users)
            })
        })
        .await
    }

    #[instrument(
        skip(db),
        fields(db.system = "postgresql", db.operation = "SELECT", db.sql.table = "users", tenant_id = %tenant_id)
    )]
    pub async fn count(db: &TenantDb, tenant_id: TenantId) -> Result<i64, StoreError> {
        db.run_scoped(tenant_id, |tx| {
            Box::pin(async move {
                let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
                    .fetch_one(tx.conn())
                    .await?;

                Ok(count)
            })
        })
        .await
    }

    /// # Errors
    ///
    /// `StoreError::NotFound` when no such user exists in the tenant
    #[instrument(
        skip(db, data),
        fields(db.system = "postgresql", db.operation = "UPDATE", db.sql.table = "users", tenant_id = %tenant_id)
    )]
    pub async fn update(
        db: &TenantDb,
        tenant_id: TenantId,
        id: Uuid,
        data: UpdateUser,
    ) -> Result<Self, StoreError> {
        db.run_scoped(tenant_id, move |tx| {
            Box::pin(async move {
                sqlx::query_as::<_, User>(&format!(
                    r#"
                    UPDATE users
                    SET name = COALESCE($2, name), updated_at = NOW()
                    WHERE id = $1
                    RETURNING {USER_COLUMNS}
                    "#
                ))
                .bind(id)
                .bind(data.name)
                .fetch_optional(tx.conn())
                .await?
                .ok_or(StoreError::NotFound("user"))
            })
        })
        .await
    }

    /// Replaces any pending verification token
    #[instrument(
        skip(db, pending),
        fields(db.system = "postgresql", db.operation = "UPDATE", db.sql.table = "users", tenant_id = %tenant_id)
    )]
    pub async fn set_verification_token(
        db: &TenantDb,
        tenant_id: TenantId,
        id: Uuid,
        pending: PendingVerification,
    ) -> Result<(), StoreError> {
        db.run_scoped(tenant_id, move |tx| {
            Box::pin(async move {
                let result = sqlx::query(
                    r#"
                    UPDATE users
                    SET verification_token_hash = $2,
                        verification_token_expires_at = $3,
                        updated_at = NOW()
                    WHERE id = $1
                    "#,
                )
                .bind(id)
                .bind(pending.token_hash)
                .bind(pending.expires_at)
                .execute(tx.conn())
                .await?;

                if result.rows_affected() == 0 {
                    return Err(StoreError::NotFound("user"));
                }
                Ok(())
            })
        })
        .await
    }

    /// Marks the holder of an unexpired token as verified and consumes the token
    ///
    /// # Errors
    ///
    /// `StoreError::NotFound` when the hash is unknown in the tenant or expired
    #[instrument(
        skip(db, token_hash),
        fields(db.system = "postgresql", db.operation = "UPDATE", db.sql.table = "users", tenant_id = %tenant_id)
    )]
    pub async fn verify_email(
        db: &TenantDb,
        tenant_id: TenantId,
        token_hash: &str,
    ) -> Result<Self, StoreError> {
        let token_hash = token_hash.to_string();

        db.run_scoped(tenant_id, move |tx| {
            Box::pin(async move {
                sqlx::query_as::<_, User>(&format!(
                    r#"
                    UPDATE users
                    SET email_verified = TRUE,
                        verification_token_hash = NULL,
                        verification_token_expires_at = NULL,
                        updated_at = NOW()
                    WHERE verification_token_hash = $1
                      AND verification_token_expires_at > NOW()
                    RETURNING {USER_COLUMNS}
                    "#
                ))
                .bind(token_hash)
                .fetch_optional(tx.conn())
                .await?
                .ok_or(StoreError::NotFound("verification token"))
            })
        })
        .await
    }
}
