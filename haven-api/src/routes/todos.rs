/// Todo endpoints
///
/// Every handler receives the caller's [`Identity`] from the auth middleware
/// and hands it to the repository, which scopes the transaction to the
/// caller's tenant. Todos of other tenants are therefore never found, and a
/// todo of another user in the same tenant is only readable when public.
///
/// ```text
/// GET    /v1/todos?limit=20&offset=0
/// POST   /v1/todos
/// GET    /v1/todos/public?limit=20&offset=0
/// GET    /v1/todos/:id
/// PATCH  /v1/todos/:id
/// DELETE /v1/todos/:id
/// ```

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use haven_shared::{
    auth::identity::Identity,
    models::{
        pagination::Pagination,
        todo::{CreateTodo, Todo, UpdateTodo},
        todo_view::TenantTodo,
    },
};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateTodoRequest {
    /// Optional client-generated id; repeating a create with it is harmless
    pub id: Option<Uuid>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_public: bool,
    pub due_date: Option<DateTime<Utc>>,
}

/// Absent fields are left alone; `"due_date": null` clears the due date
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTodoRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub completed: Option<bool>,
    pub is_public: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub due_date: Option<Option<DateTime<Utc>>>,
}

/// Distinguishes an explicit `null` (`Some(None)`) from a missing field (`None`)
fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl From<UpdateTodoRequest> for UpdateTodo {
    fn from(req: UpdateTodoRequest) -> Self {
        UpdateTodo {
            title: req.title,
            description: req.description,
            completed: req.completed,
            is_public: req.is_public,
            due_date: req.due_date,
        }
    }
}

fn todo_not_found() -> ApiError {
    ApiError::NotFound("Todo not found".to_string())
}

/// The caller's own todos, newest first
pub async fn list_todos(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Page<Todo>>> {
    let page = Pagination::from_query(query.limit, query.offset)?;

    let items = Todo::find_by_owner(&state.db, &identity, page).await?;
    let total = Todo::count_by_owner(&state.db, &identity).await?;

    Ok(Json(Page {
        items,
        total,
        limit: page.limit(),
        offset: page.offset(),
    }))
}

pub async fn create_todo(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<CreateTodoRequest>,
) -> ApiResult<(StatusCode, Json<Todo>)> {
    let todo = Todo::create(
        &state.db,
        &identity,
        CreateTodo {
            id: req.id,
            title: req.title,
            description: req.description,
            is_public: req.is_public,
            due_date: req.due_date,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(todo)))
}

/// Public todos of every user in the caller's tenant, with author details
pub async fn list_public_todos(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Page<TenantTodo>>> {
    let page = Pagination::from_query(query.limit, query.offset)?;

    let items = TenantTodo::find_public(&state.db, identity.tenant_id, page).await?;
    let total = TenantTodo::count_public(&state.db, identity.tenant_id).await?;

    Ok(Json(Page {
        items,
        total,
        limit: page.limit(),
        offset: page.offset(),
    }))
}

/// A todo the caller owns, or a public one of the same tenant
pub async fn get_todo(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Todo>> {
    let todo = Todo::find_by_id(&state.db, &identity, id)
        .await?
        .filter(|todo| todo.user_id == identity.user_id || todo.is_public)
        .ok_or_else(todo_not_found)?;

    Ok(Json(todo))
}

pub async fn update_todo(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTodoRequest>,
) -> ApiResult<Json<Todo>> {
    let update = UpdateTodo::from(req);
    if update.is_empty() {
        return Err(ApiError::BadRequest("No fields to update".to_string()));
    }

    let todo = Todo::update(&state.db, &identity, id, update).await?;
    Ok(Json(todo))
}

pub async fn delete_todo(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    Todo::delete(&state.db, &identity, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
