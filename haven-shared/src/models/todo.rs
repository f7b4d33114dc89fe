/// Todo model and database operations
///
/// Todos are owned by a user inside a tenant. All operations take the
/// caller's verified [`Identity`]: the tenant scopes the transaction and the
/// user id restricts writes to the owner. Updates and deletes that match no
/// row (absent, someone else's, or another tenant's) fail with
/// `StoreError::NotFound`.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE todos (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL,                 -- (tenant_id, user_id) references users
///     title VARCHAR(255) NOT NULL,
///     description TEXT NOT NULL DEFAULT '',
///     completed BOOLEAN NOT NULL DEFAULT FALSE,
///     is_public BOOLEAN NOT NULL DEFAULT FALSE,
///     due_date TIMESTAMPTZ,
///     completed_at TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::auth::identity::Identity;
use crate::db::{ScopedTx, StoreError, TenantDb};
use crate::models::pagination::Pagination;

pub const MAX_TITLE_LEN: usize = 255;
pub const MAX_DESCRIPTION_LEN: usize = 10_000;

const TODO_COLUMNS: &str = "id, tenant_id, user_id, title, description, completed, is_public, \
                            due_date, completed_at, created_at, updated_at";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Todo {
    pub id: Uuid,
    pub tenant_id: Uuid,
    /// Owner
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub completed: bool,
    /// Visible to every user of the tenant
    pub is_public: bool,
    pub due_date: Option<DateTime<Utc>>,
    /// Set when the todo transitions to completed, cleared when reopened
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct CreateTodo {
    /// Client-chosen id; retrying a create with the same id returns the
    /// existing todo instead of inserting a duplicate
    pub id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub is_public: bool,
    pub due_date: Option<DateTime<Utc>>,
}

/// Only `Some` fields change; `due_date: Some(None)` clears the due date
#[derive(Debug, Clone, Default)]
pub struct UpdateTodo {
    pub title: Option<String>,
    pub description: Option<String>,
    pub completed: Option<bool>,
    pub is_public: Option<bool>,
    pub due_date: Option<Option<DateTime<Utc>>>,
}

impl UpdateTodo {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.completed.is_none()
            && self.is_public.is_none()
            && self.due_date.is_none()
    }
}

fn validate_title(title: &str) -> Result<(), StoreError> {
    if title.trim().is_empty() {
        return Err(StoreError::validation("title", "must not be blank"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(StoreError::validation(
            "title",
            format!("must be at most {} characters", MAX_TITLE_LEN),
        ));
    }
    Ok(())
}

fn validate_description(description: &str) -> Result<(), StoreError> {
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(StoreError::validation(
            "description",
            format!("must be at most {} characters", MAX_DESCRIPTION_LEN),
        ));
    }
    Ok(())
}

impl Todo {
    /// Inserts a todo owned by `owner` into the transaction's tenant
    ///
    /// With a caller-supplied id the insert is idempotent: a conflicting id
    /// already owned by `owner` yields the stored todo; any other conflict is
    /// `StoreError::Conflict`. Ids are unique per tenant, so an id used in
    /// another tenant inserts like a fresh one.
    pub async fn insert(tx: &mut ScopedTx, owner: Uuid, data: CreateTodo) -> Result<Self, StoreError> {
        validate_title(&data.title)?;
        validate_description(&data.description)?;

        let id = data.id.unwrap_or_else(Uuid::new_v4);

        let inserted = sqlx::query_as::<_, Todo>(&format!(
            r#"
            INSERT INTO todos (id, tenant_id, user_id, title, description, is_public, due_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (tenant_id, id) DO NOTHING
            RETURNING {TODO_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(tx.tenant_id().as_uuid())
        .bind(owner)
        .bind(data.title)
        .bind(data.description)
        .bind(data.is_public)
        .bind(data.due_date)
        .fetch_optional(tx.conn())
        .await?;

        if let Some(todo) = inserted {
            return Ok(todo);
        }

        // Id already taken: a retry of our own create, or a collision
        sqlx::query_as::<_, Todo>(&format!(
            "SELECT {TODO_COLUMNS} FROM todos WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(tx.conn())
        .await?
        .ok_or_else(|| StoreError::Conflict {
            constraint: "todos_pkey".to_string(),
        })
    }

    #[instrument(
        skip(db, identity, data),
        fields(db.system = "postgresql", db.operation = "INSERT", db.sql.table = "todos", tenant_id = %identity.tenant_id)
    )]
    pub async fn create(db: &TenantDb, identity: &Identity, data: CreateTodo) -> Result<Self, StoreError> {
        let owner = identity.user_id;

        db.run_scoped(identity.tenant_id, move |tx| {
            Box::pin(async move { Todo::insert(tx, owner, data).await })
        })
        .await
    }

    /// Any todo of the caller's tenant; visibility rules are the caller's business
    #[instrument(
        skip(db, identity),
        fields(db.system = "postgresql", db.operation = "SELECT", db.sql.table = "todos", tenant_id = %identity.tenant_id)
    )]
    pub async fn find_by_id(db: &TenantDb, identity: &Identity, id: Uuid) -> Result<Option<Self>, StoreError> {
        db.run_scoped(identity.tenant_id, move |tx| {
            Box::pin(async move {
                let todo = sqlx::query_as::<_, Todo>(&format!(
                    "SELECT {TODO_COLUMNS} FROM todos WHERE id = $1"
                ))
                .bind(id)
                .fetch_optional(tx.conn())
                .await?;

                Ok(todo)
            })
        })
        .await
    }

    /// The caller's own todos, newest first
    #[instrument(
        skip(db, identity),
        fields(db.system = "postgresql", db.operation = "SELECT", db.sql.table = "todos", tenant_id = %identity.tenant_id)
    )]
    pub async fn find_by_owner(
        db: &TenantDb,
        identity: &Identity,
        page: Pagination,
    ) -> Result<Vec<Self>, StoreError> {
        let owner = identity.user_id;

        db.run_scoped(identity.tenant_id, move |tx| {
            Box::pin(async move {
                let todos = sqlx::query_as::<_, Todo>(&format!(
                    r#"
                    SELECT {TODO_COLUMNS}
                    FROM todos
                    WHERE user_id = $1
                    ORDER BY created_at DESC
                    LIMIT $2 OFFSET $3
                    "#
                ))
                .bind(owner)
                .bind(page.limit())
                .bind(page.offset())
                .fetch_all(tx.conn())
                .await?;

                Ok(todos)
            })
        })
        .await
    }

    #[instrument(
        skip(db, identity),
        fields(db.system = "postgresql", db.operation = "SELECT", db.sql.table = "todos", tenant_id = %identity.tenant_id)
    )]
    pub async fn count_by_owner(db: &TenantDb, identity: &Identity) -> Result<i64, StoreError> {
        let owner = identity.user_id;

        db.run_scoped(identity.tenant_id, move |tx| {
            Box::pin(async move {
                let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM todos WHERE user_id = $1")
                    .bind(owner)
                    .fetch_one(tx.conn())
                    .await?;

                Ok(count)
            })
        })
        .await
    }

    /// Applies the present fields of `data` to one of the caller's todos
    ///
    /// Completing sets `completed_at` once; reopening clears it.
    #[instrument(
        skip(db, identity, data),
        fields(db.system = "postgresql", db.operation = "UPDATE", db.sql.table = "todos", tenant_id = %identity.tenant_id)
    )]
    pub async fn update(
        db: &TenantDb,
        identity: &Identity,
        id: Uuid,
        data: UpdateTodo,
    ) -> Result<Self, StoreError> {
        if let Some(ref title) = data.title {
            validate_title(title)?;
        }
        if let Some(ref description) = data.description {
            validate_description(description)?;
        }

        // Build the SET list from the fields present; $1 = id, $2 = owner
        let mut query = String::from("UPDATE todos SET updated_at = NOW()");
        let mut bind_count = 2;

        if data.title.is_some() {
            bind_count += 1;
            query.push_str(&format!(", title = ${}", bind_count));
        }
        if data.description.is_some() {
            bind_count += 1;
            query.push_str(&format!(", description = ${}", bind_count));
        }
        if let Some(completed) = data.completed {
            bind_count += 1;
            query.push_str(&format!(", completed = ${}", bind_count));
            if completed {
                query.push_str(", completed_at = CASE WHEN completed THEN completed_at ELSE NOW() END");
            } else {
                query.push_str(", completed_at = NULL");
            }
        }
        if data.is_public.is_some() {
            bind_count += 1;
            query.push_str(&format!(", is_public = ${}", bind_count));
        }
        if data.due_date.is_some() {
            bind_count += 1;
            query.push_str(&format!(", due_date = ${}", bind_count));
        }

        query.push_str(&format!(
            " WHERE id = $1 AND user_id = $2 RETURNING {TODO_COLUMNS}"
        ));

        let owner = identity.user_id;

        db.run_scoped(identity.tenant_id, move |tx| {
            Box::pin(async move {
                let mut q = sqlx::query_as::<_, Todo>(&query).bind(id).bind(owner);

                if let Some(title) = data.title {
                    q = q.bind(title);
                }
                if let Some(description) = data.description {
                    q = q.bind(description);
                }
                if let Some(completed) = data.completed {
                    q = q.bind(completed);
                }
                if let Some(is_public) = data.is_public {
                    q = q.bind(is_public);
                }
                if let Some(due_date) = data.due_date {
                    q = q.bind(due_date);
                }

                q.fetch_optional(tx.conn())
                    .await?
                    .ok_or(StoreError::NotFound("todo"))
            })
        })
        .await
    }

    #[instrument(
        skip(db, identity),
        fields(db.system = "postgresql", db.operation = "DELETE", db.sql.table = "todos", tenant_id = %identity.tenant_id)
    )]
    pub async fn delete(db: &TenantDb, identity: &Identity, id: Uuid) -> Result<(), StoreError> {
        let owner = identity.user_id;

        db.run_scoped(identity.tenant_id, move |tx| {
            Box::pin(async move {
                let result = sqlx::query("DELETE FROM todos WHERE id = $1 AND user_id = $2")
                    .bind(id)
                    .bind(owner)
                    .execute(tx.conn())
                    .await?;

                if result.rows_affected() == 0 {
                    return Err(StoreError::NotFound("todo"));
                }
                Ok(())
            })
        })
        .await
    }
}
