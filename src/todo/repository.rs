use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Mutex;
use tracing::{debug, instrument, warn};

use super::models::{TodoModel, TodoPriority, TodoStatus};
use crate::shared::AppError;

/// Trait for todo persistence. List operations are paginated and return
/// the total match count alongside the page.
#[async_trait]
pub trait TodoRepository: Send + Sync {
    async fn create(&self, todo: &TodoModel) -> Result<(), AppError>;
    async fn get_by_id(&self, id: &str) -> Result<Option<TodoModel>, AppError>;
    async fn list_by_user(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<TodoModel>, i64), AppError>;
    async fn list_by_status(
        &self,
        user_id: &str,
        status: TodoStatus,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<TodoModel>, i64), AppError>;
    async fn search(
        &self,
        user_id: &str,
        query: &str,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<TodoModel>, i64), AppError>;
    async fn update(&self, todo: &TodoModel) -> Result<(), AppError>;
    async fn delete(&self, id: &str) -> Result<(), AppError>;
}

/// In-memory implementation of TodoRepository for development and testing
pub struct InMemoryTodoRepository {
    todos: Mutex<HashMap<String, TodoModel>>,
}

impl Default for InMemoryTodoRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTodoRepository {
    pub fn new() -> Self {
        Self {
            todos: Mutex::new(HashMap::new()),
        }
    }

    fn page(
        &self,
        mut matches: Vec<TodoModel>,
        limit: i64,
        offset: i64,
    ) -> (Vec<TodoModel>, i64) {
        // Newest first, matching the database ordering.
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = matches.len() as i64;
        let page = matches
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        (page, total)
    }
}

#[async_trait]
impl TodoRepository for InMemoryTodoRepository {
    #[instrument(skip(self, todo))]
    async fn create(&self, todo: &TodoModel) -> Result<(), AppError> {
        let mut todos = self.todos.lock().unwrap();
        todos.insert(todo.id.clone(), todo.clone());
        debug!(todo_id = %todo.id, user_id = %todo.user_id, "todo created in memory");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_by_id(&self, id: &str) -> Result<Option<TodoModel>, AppError> {
        let todos = self.todos.lock().unwrap();
        Ok(todos.get(id).cloned())
    }

    #[instrument(skip(self))]
    async fn list_by_user(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<TodoModel>, i64), AppError> {
        let todos = self.todos.lock().unwrap();
        let matches = todos
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        Ok(self.page(matches, limit, offset))
    }

    #[instrument(skip(self))]
    async fn list_by_status(
        &self,
        user_id: &str,
        status: TodoStatus,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<TodoModel>, i64), AppError> {
        let todos = self.todos.lock().unwrap();
        let matches = todos
            .values()
            .filter(|t| t.user_id == user_id && t.status == status)
            .cloned()
            .collect();
        Ok(self.page(matches, limit, offset))
    }

    #[instrument(skip(self))]
    async fn search(
        &self,
        user_id: &str,
        query: &str,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<TodoModel>, i64), AppError> {
        let needle = query.to_lowercase();
        let todos = self.todos.lock().unwrap();
        let matches = todos
            .values()
            .filter(|t| {
                t.user_id == user_id
                    && (t.title.to_lowercase().contains(&needle)
                        || t.description.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect();
        Ok(self.page(matches, limit, offset))
    }

    #[instrument(skip(self, todo))]
    async fn update(&self, todo: &TodoModel) -> Result<(), AppError> {
        let mut todos = self.todos.lock().unwrap();
        if !todos.contains_key(&todo.id) {
            warn!(todo_id = %todo.id, "todo not found for update");
            return Err(AppError::NotFound("todo not found".to_string()));
        }
        todos.insert(todo.id.clone(), todo.clone());
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &str) -> Result<(), AppError> {
        let mut todos = self.todos.lock().unwrap();
        if todos.remove(id).is_none() {
            warn!(todo_id = %id, "todo not found for deletion");
            return Err(AppError::NotFound("todo not found".to_string()));
        }
        Ok(())
    }
}

/// PostgreSQL implementation of the todo repository
pub struct PostgresTodoRepository {
    pool: PgPool,
}

impl PostgresTodoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_todo(row: &PgRow) -> Result<TodoModel, AppError> {
    let status: String = row.get("status");
    let priority: String = row.get("priority");

    Ok(TodoModel {
        id: row.get("id"),
        user_id: row.get("user_id"),
        title: row.get("title"),
        description: row.get("description"),
        status: TodoStatus::from_str(&status)
            .map_err(|_| AppError::Database(format!("unknown todo status: {status}")))?,
        priority: TodoPriority::from_str(&priority)
            .map_err(|_| AppError::Database(format!("unknown todo priority: {priority}")))?,
        due_date: row.get("due_date"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

const TODO_COLUMNS: &str =
    "id, user_id, title, description, status, priority, due_date, created_at, updated_at";

#[async_trait]
impl TodoRepository for PostgresTodoRepository {
    #[instrument(skip(self, todo))]
    async fn create(&self, todo: &TodoModel) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO todos (id, user_id, title, description, status, priority, due_date, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(&todo.id)
        .bind(&todo.user_id)
        .bind(&todo.title)
        .bind(&todo.description)
        .bind(todo.status.to_string())
        .bind(todo.priority.to_string())
        .bind(todo.due_date)
        .bind(todo.created_at)
        .bind(todo.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "failed to create todo in database");
            AppError::Database(format!("failed to create todo: {e}"))
        })?;

        debug!(todo_id = %todo.id, "todo created in database");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_by_id(&self, id: &str) -> Result<Option<TodoModel>, AppError> {
        let row = sqlx::query(&format!("SELECT {TODO_COLUMNS} FROM todos WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, todo_id = %id, "failed to fetch todo");
                AppError::Database(format!("failed to get todo: {e}"))
            })?;

        row.as_ref().map(row_to_todo).transpose()
    }

    #[instrument(skip(self))]
    async fn list_by_user(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<TodoModel>, i64), AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {TODO_COLUMNS} FROM todos WHERE user_id = $1 \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(format!("failed to list todos: {e}")))?;

        let total: i64 = sqlx::query("SELECT COUNT(*) FROM todos WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("failed to count todos: {e}")))?
            .get(0);

        let todos = rows.iter().map(row_to_todo).collect::<Result<_, _>>()?;
        Ok((todos, total))
    }

    #[instrument(skip(self))]
    async fn list_by_status(
        &self,
        user_id: &str,
        status: TodoStatus,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<TodoModel>, i64), AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {TODO_COLUMNS} FROM todos WHERE user_id = $1 AND status = $2 \
             ORDER BY created_at DESC LIMIT $3 OFFSET $4"
        ))
        .bind(user_id)
        .bind(status.to_string())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(format!("failed to list todos: {e}")))?;

        let total: i64 =
            sqlx::query("SELECT COUNT(*) FROM todos WHERE user_id = $1 AND status = $2")
                .bind(user_id)
                .bind(status.to_string())
                .fetch_one(&self.pool)
                .await
                .map_err(|e| AppError::Database(format!("failed to count todos: {e}")))?
                .get(0);

        let todos = rows.iter().map(row_to_todo).collect::<Result<_, _>>()?;
        Ok((todos, total))
    }

    #[instrument(skip(self))]
    async fn search(
        &self,
        user_id: &str,
        query: &str,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<TodoModel>, i64), AppError> {
        let pattern = format!("%{query}%");

        let rows = sqlx::query(&format!(
            "SELECT {TODO_COLUMNS} FROM todos WHERE user_id = $1 \
             AND (title ILIKE $2 OR description ILIKE $2) \
             ORDER BY created_at DESC LIMIT $3 OFFSET $4"
        ))
        .bind(user_id)
        .bind(&pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(format!("failed to search todos: {e}")))?;

        let total: i64 = sqlx::query(
            "SELECT COUNT(*) FROM todos WHERE user_id = $1 \
             AND (title ILIKE $2 OR description ILIKE $2)",
        )
        .bind(user_id)
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::Database(format!("failed to count todos: {e}")))?
        .get(0);

        let todos = rows.iter().map(row_to_todo).collect::<Result<_, _>>()?;
        Ok((todos, total))
    }

    #[instrument(skip(self, todo))]
    async fn update(&self, todo: &TodoModel) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE todos SET title = $2, description = $3, status = $4, priority = $5, \
             due_date = $6, updated_at = $7 WHERE id = $1",
        )
        .bind(&todo.id)
        .bind(&todo.title)
        .bind(&todo.description)
        .bind(todo.status.to_string())
        .bind(todo.priority.to_string())
        .bind(todo.due_date)
        .bind(todo.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, todo_id = %todo.id, "failed to update todo");
            AppError::Database(format!("failed to update todo: {e}"))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("todo not found".to_string()));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM todos WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, todo_id = %id, "failed to delete todo");
                AppError::Database(format!("failed to delete todo: {e}"))
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("todo not found".to_string()));
        }
        Ok(())
    }
}
