use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use tracing::instrument;

use super::models::{
    CreateTodoRequest, ListTodosQuery, TodoListResponse, TodoModel, UpdateTodoRequest,
};
use crate::auth::types::Claims;
use crate::shared::{AppError, AppState};

/// POST /api/v1/todos
#[instrument(name = "create_todo", skip(state, claims, req))]
pub async fn create_todo(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateTodoRequest>,
) -> Result<(StatusCode, Json<TodoModel>), AppError> {
    let todo = state.todos.create_todo(&claims.user_id, req).await?;
    Ok((StatusCode::CREATED, Json(todo)))
}

/// GET /api/v1/todos
///
/// Supports `status`, `q` (search), `limit` and `offset` query parameters.
#[instrument(name = "list_todos", skip(state, claims, query))]
pub async fn list_todos(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ListTodosQuery>,
) -> Result<Json<TodoListResponse>, AppError> {
    Ok(Json(state.todos.list_todos(&claims.user_id, query).await?))
}

/// GET /api/v1/todos/:id
#[instrument(name = "get_todo", skip(state, claims))]
pub async fn get_todo(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<TodoModel>, AppError> {
    Ok(Json(state.todos.get_todo(&claims.user_id, &id).await?))
}

/// PUT /api/v1/todos/:id
#[instrument(name = "update_todo", skip(state, claims, req))]
pub async fn update_todo(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(req): Json<UpdateTodoRequest>,
) -> Result<Json<TodoModel>, AppError> {
    Ok(Json(
        state.todos.update_todo(&claims.user_id, &id, req).await?,
    ))
}

/// DELETE /api/v1/todos/:id
#[instrument(name = "delete_todo", skip(state, claims))]
pub async fn delete_todo(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.todos.delete_todo(&claims.user_id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
