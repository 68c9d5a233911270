use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument};

use super::models::{
    CreateTodoRequest, ListTodosQuery, TodoListResponse, TodoModel, UpdateTodoRequest,
};
use super::repository::TodoRepository;
use crate::shared::AppError;

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;
const MAX_TITLE_LENGTH: usize = 200;

/// Service for todo business logic. Every operation is scoped to the
/// calling user; another user's todos are indistinguishable from absent
/// ones.
pub struct TodoService {
    todos: Arc<dyn TodoRepository>,
}

impl TodoService {
    pub fn new(todos: Arc<dyn TodoRepository>) -> Self {
        Self { todos }
    }

    #[instrument(skip(self, req))]
    pub async fn create_todo(
        &self,
        user_id: &str,
        req: CreateTodoRequest,
    ) -> Result<TodoModel, AppError> {
        validate_title(&req.title)?;

        let todo = TodoModel::new(user_id, req);
        self.todos.create(&todo).await?;

        info!(todo_id = %todo.id, user_id = %user_id, "todo created");
        Ok(todo)
    }

    #[instrument(skip(self))]
    pub async fn get_todo(&self, user_id: &str, id: &str) -> Result<TodoModel, AppError> {
        let todo = self
            .todos
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("todo not found".to_string()))?;

        if todo.user_id != user_id {
            return Err(AppError::NotFound("todo not found".to_string()));
        }
        Ok(todo)
    }

    #[instrument(skip(self, query))]
    pub async fn list_todos(
        &self,
        user_id: &str,
        query: ListTodosQuery,
    ) -> Result<TodoListResponse, AppError> {
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = query.offset.unwrap_or(0).max(0);

        let (todos, total) = match (query.status, query.q) {
            (Some(status), _) => {
                self.todos
                    .list_by_status(user_id, status, limit, offset)
                    .await?
            }
            (None, Some(q)) if !q.trim().is_empty() => {
                self.todos.search(user_id, q.trim(), limit, offset).await?
            }
            _ => self.todos.list_by_user(user_id, limit, offset).await?,
        };

        Ok(TodoListResponse {
            todos,
            total,
            limit,
            offset,
        })
    }

    #[instrument(skip(self, req))]
    pub async fn update_todo(
        &self,
        user_id: &str,
        id: &str,
        req: UpdateTodoRequest,
    ) -> Result<TodoModel, AppError> {
        let mut todo = self.get_todo(user_id, id).await?;

        if let Some(title) = req.title {
            validate_title(&title)?;
            todo.title = title;
        }
        if let Some(description) = req.description {
            todo.description = description;
        }
        if let Some(status) = req.status {
            todo.status = status;
        }
        if let Some(priority) = req.priority {
            todo.priority = priority;
        }
        if let Some(due_date) = req.due_date {
            todo.due_date = Some(due_date);
        }
        todo.updated_at = Utc::now();

        self.todos.update(&todo).await?;

        info!(todo_id = %todo.id, user_id = %user_id, "todo updated");
        Ok(todo)
    }

    #[instrument(skip(self))]
    pub async fn delete_todo(&self, user_id: &str, id: &str) -> Result<(), AppError> {
        let todo = self.get_todo(user_id, id).await?;
        self.todos.delete(&todo.id).await?;

        info!(todo_id = %todo.id, user_id = %user_id, "todo deleted");
        Ok(())
    }
}

fn validate_title(title: &str) -> Result<(), AppError> {
    if title.trim().is_empty() {
        return Err(AppError::Validation("title is required".to_string()));
    }
    if title.len() > MAX_TITLE_LENGTH {
        return Err(AppError::Validation(format!(
            "title must be at most {MAX_TITLE_LENGTH} characters"
        )));
    }
    Ok(())
}
