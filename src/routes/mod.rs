pub mod auth;
pub mod health;
pub mod todos;

use actix_web::web;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(auth::index)
        .service(auth::register_page)
        .service(auth::register)
        .service(auth::login_page)
        .service(auth::login)
        .service(auth::logout)
        .service(auth::forgot_password_page)
        .service(auth::forgot_password)
        .service(auth::reset_password_page)
        .service(auth::reset_password)
        .service(todos::dashboard)
        .service(todos::create_todo)
        .service(todos::toggle_todo)
        .service(todos::delete_todo)
        .service(todos::edit_todo)
        .service(health::health)
        .service(health::db_ping);
}
