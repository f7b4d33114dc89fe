/// Read-only todo projection with author details
///
/// Backed by `tenant_todo_view`, which joins todos to their owners and
/// filters on the tenant marker itself in addition to the base-table
/// policies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::db::{StoreError, TenantDb};
use crate::models::pagination::Pagination;
use crate::tenant::TenantId;

const VIEW_COLUMNS: &str = "id, tenant_id, user_id, user_name, user_email, title, description, \
                            completed, is_public, due_date, completed_at, created_at, updated_at";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TenantTodo {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub user_email: String,
    pub title: String,
    pub description: String,
    pub completed: bool,
    pub is_public: bool,
    pub due_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TenantTodo {
    /// Public todos of every user in the tenant, newest first
    #[instrument(
        skip(db),
        fields(db.system = "postgresql", db.operation = "SELECT", db.sql.table = "tenant_todo_view", tenant_id = %tenant_id)
    )]
    pub async fn find_public(
        db: &TenantDb,
        tenant_id: TenantId,
        page: Pagination,
    ) -> Result<Vec<Self>, StoreError> {
        db.run_scoped(tenant_id, move |tx| {
            Box::pin(async move {
                let todos = sqlx::query_as::<_, TenantTodo>(&format!(
                    r#"
                    SELECT {VIEW_COLUMNS}
                    FROM tenant_todo_view
                    WHERE is_public
                    ORDER BY created_at DESC
                    LIMIT $1 OFFSET $2
                    "#
                ))
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
        skip(db),
        fields(db.system = "postgresql", db.operation = "SELECT", db.sql.table = "tenant_todo_view", tenant_id = %tenant_id)
    )]
    pub async fn count_public(db: &TenantDb, tenant_id: TenantId) -> Result<i64, StoreError> {
        db.run_scoped(tenant_id, |tx| {
            Box::pin(async move {
                let count: i64 =
                    sqlx::query_scalar("SELECT COUNT(*) FROM tenant_todo_view WHERE is_public")
                        .fetch_one(tx.conn())
                        .await?;

                Ok(count)
            })
        })
        .await
    }
}
