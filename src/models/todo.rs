use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use crate::error::AppError;

/// Longest accepted task title, in characters, after trimming.
pub const MAX_TITLE_CHARS: usize = 150;

pub const EMPTY_TITLE: &str = "Task title cannot be empty.";
pub const TITLE_TOO_LONG: &str = "Task title must be under 150 characters.";

/// A to-do item as stored in the `todos` table.
#[derive(Debug, Clone, Serialize, FromRow, PartialEq)]
pub struct Todo {
    pub id: i64,
    /// Owning user; every lookup and mutation is scoped by it.
    pub user_id: i64,
    pub title: String,
    pub is_done: bool,
    pub created_at: DateTime<Utc>,
    /// Refreshed on every toggle or rename.
    pub updated_at: DateTime<Utc>,
}

/// Trims a submitted title and checks it is 1..=150 characters long.
pub fn normalize_title(raw: &str) -> Result<String, AppError> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(AppError::validation(EMPTY_TITLE));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(AppError::validation(TITLE_TOO_LONG));
    }
    Ok(title.to_string())
}
