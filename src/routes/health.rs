use actix_web::{get, web, HttpResponse};
use serde_json::json;
use sqlx::SqlitePool;

use crate::{db, error::AppError};

/// Liveness probe.
#[get("/health")]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

/// Row counts, proving the database is reachable.
#[get("/db-ping")]
pub async fn db_ping(pool: web::Data<SqlitePool>) -> Result<HttpResponse, AppError> {
    let users = db::users::count(&pool).await?;
    let todos = db::todos::count(&pool).await?;
    Ok(HttpResponse::Ok().json(json!({ "users": users, "todos": todos })))
}
