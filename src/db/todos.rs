use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::AppError;
use crate::models::{normalize_title, Todo};

const TODO_COLUMNS: &str = "id, user_id, title, is_done, created_at, updated_at";

/// Creates a task owned by `owner_id`, not done, with both timestamps set to now.
///
/// Fails with `AppError::ValidationError` when the trimmed title is empty or longer
/// than 150 characters.
pub async fn create(pool: &SqlitePool, owner_id: i64, title: &str) -> Result<Todo, AppError> {
    let title = normalize_title(title)?;
    let now = Utc::now();

    let todo = sqlx::query_as::<_, Todo>(&format!(
        "INSERT INTO todos (user_id, title, is_done, created_at, updated_at) \
         VALUES (?, ?, FALSE, ?, ?) RETURNING {TODO_COLUMNS}"
    ))
    .bind(owner_id)
    .bind(title)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await?;

    Ok(todo)
}

/// All tasks owned by `owner_id`, newest first.
pub async fn list_for(pool: &SqlitePool, owner_id: i64) -> Result<Vec<Todo>, AppError> {
    let todos = sqlx::query_as::<_, Todo>(&format!(
        "SELECT {TODO_COLUMNS} FROM todos WHERE user_id = ? ORDER BY created_at DESC, id DESC"
    ))
    .bind(owner_id)
    .fetch_all(pool)
    .await?;

    Ok(todos)
}

/// Looks a task up by id *and* owner. Handlers must go through this; there is no
/// id-only lookup.
pub async fn get_owned(
    pool: &SqlitePool,
    task_id: i64,
    owner_id: i64,
) -> Result<Option<Todo>, AppError> {
    let todo = sqlx::query_as::<_, Todo>(&format!(
        "SELECT {TODO_COLUMNS} FROM todos WHERE id = ? AND user_id = ?"
    ))
    .bind(task_id)
    .bind(owner_id)
    .fetch_optional(pool)
    .await?;

    Ok(todo)
}

/// Flips the stored completion flag. `todo` only identifies the row; its `is_done`
/// may be stale.
pub async fn toggle(pool: &SqlitePool, todo: &Todo) -> Result<Todo, AppError> {
    let updated = sqlx::query_as::<_, Todo>(&format!(
        "UPDATE todos SET is_done = NOT is_done, updated_at = ? WHERE id = ? AND user_id = ? \
         RETURNING {TODO_COLUMNS}"
    ))
    .bind(Utc::now())
    .bind(todo.id)
    .bind(todo.user_id)
    .fetch_optional(pool)
    .await?;

    updated.ok_or_else(|| AppError::NotFound("Task not found".into()))
}

/// Replaces the title, with the same validation as [`create`].
pub async fn rename(pool: &SqlitePool, todo: &Todo, new_title: &str) -> Result<Todo, AppError> {
    let title = normalize_title(new_title)?;

    let updated = sqlx::query_as::<_, Todo>(&format!(
        "UPDATE todos SET title = ?, updated_at = ? WHERE id = ? AND user_id = ? \
         RETURNING {TODO_COLUMNS}"
    ))
    .bind(title)
    .bind(Utc::now())
    .bind(todo.id)
    .bind(todo.user_id)
    .fetch_optional(pool)
    .await?;

    updated.ok_or_else(|| AppError::NotFound("Task not found".into()))
}

/// Permanently removes the task.
pub async fn delete(pool: &SqlitePool, todo: &Todo) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM todos WHERE id = ? AND user_id = ?")
        .bind(todo.id)
        .bind(todo.user_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Task not found".into()));
    }
    Ok(())
}

pub async fn count(pool: &SqlitePool) -> Result<i64, AppError> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM todos")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
