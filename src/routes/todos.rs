//! Task handlers. All of them sit behind `RequireAuth` and only reach tasks through
//! `db::todos::get_owned`, so a task id belonging to someone else behaves exactly
//! like one that does not exist.

use actix_web::{get, post, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;

use crate::{
    auth::{AuthenticatedUser, CurrentUser, FlashLevel, RequireAuth, Session},
    db,
    error::AppError,
    models::normalize_title,
    views::{redirect, render, PAGE_DASHBOARD},
};

pub const TASK_NOT_FOUND: &str = "Task not found.";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TitleForm {
    pub title: String,
}

/// Flashes validation failures; anything else is a real error.
fn flash_validation(session: &Session, error: AppError) -> Result<(), AppError> {
    match error {
        AppError::ValidationError(msgs) => {
            for msg in msgs {
                session.flash(FlashLevel::Danger, msg);
            }
            Ok(())
        }
        other => Err(other),
    }
}

/// Lists the user's tasks, newest first.
#[get("/dashboard", wrap = "RequireAuth")]
pub async fn dashboard(
    pool: web::Data<SqlitePool>,
    owner: AuthenticatedUser,
    session: Session,
    user: CurrentUser,
) -> Result<HttpResponse, AppError> {
    let todos = db::todos::list_for(&pool, owner.0).await?;
    Ok(render(&session, &user, PAGE_DASHBOARD, json!({ "todos": todos })))
}

#[post("/dashboard", wrap = "RequireAuth")]
pub async fn create_todo(
    pool: web::Data<SqlitePool>,
    owner: AuthenticatedUser,
    session: Session,
    form: web::Form<TitleForm>,
) -> Result<HttpResponse, AppError> {
    match db::todos::create(&pool, owner.0, &form.title).await {
        Ok(todo) => {
            log::debug!("User {} created task {}", owner.0, todo.id);
            session.flash(FlashLevel::Success, "Task added.");
        }
        Err(e) => flash_validation(&session, e)?,
    }
    Ok(redirect("/dashboard"))
}

#[post("/todo/{id}/toggle", wrap = "RequireAuth")]
pub async fn toggle_todo(
    pool: web::Data<SqlitePool>,
    owner: AuthenticatedUser,
    session: Session,
    todo_id: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    match db::todos::get_owned(&pool, todo_id.into_inner(), owner.0).await? {
        Some(todo) => {
            db::todos::toggle(&pool, &todo).await?;
            session.flash(FlashLevel::Success, "Task updated.");
        }
        None => session.flash(FlashLevel::Warning, TASK_NOT_FOUND),
    }
    Ok(redirect("/dashboard"))
}

#[post("/todo/{id}/delete", wrap = "RequireAuth")]
pub async fn delete_todo(
    pool: web::Data<SqlitePool>,
    owner: AuthenticatedUser,
    session: Session,
    todo_id: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    match db::todos::get_owned(&pool, todo_id.into_inner(), owner.0).await? {
        Some(todo) => {
            db::todos::delete(&pool, &todo).await?;
            session.flash(FlashLevel::Info, "Task deleted.");
        }
        None => session.flash(FlashLevel::Warning, TASK_NOT_FOUND),
    }
    Ok(redirect("/dashboard"))
}

/// Renames a task. The title is validated before the task is looked up.
#[post("/todo/{id}/edit", wrap = "RequireAuth")]
pub async fn edit_todo(
    pool: web::Data<SqlitePool>,
    owner: AuthenticatedUser,
    session: Session,
    todo_id: web::Path<i64>,
    form: web::Form<TitleForm>,
) -> Result<HttpResponse, AppError> {
    let title = match normalize_title(&form.title) {
        Ok(title) => title,
        Err(e) => {
            flash_validation(&session, e)?;
            return Ok(redirect("/dashboard"));
        }
    };

    match db::todos::get_owned(&pool, todo_id.into_inner(), owner.0).await? {
        Some(todo) => {
            db::todos::rename(&pool, &todo, &title).await?;
            session.flash(FlashLevel::Success, "Task title saved.");
        }
        None => session.flash(FlashLevel::Warning, TASK_NOT_FOUND),
    }
    Ok(redirect("/dashboard"))
}
