use actix_web::{middleware::Logger, web, App, HttpServer};
use std::io;

use todoapp::auth::{CsrfGuard, LoadUser, PasswordHasher, SessionMiddleware, SessionSettings};
use todoapp::config::Config;
use todoapp::{db, routes};

fn to_io_error(e: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e.to_string())
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env().map_err(to_io_error)?;
    let pool = db::connect(&config.database_url)
        .await
        .map_err(to_io_error)?;
    db::init_schema(&pool).await.map_err(to_io_error)?;

    let hasher = PasswordHasher::new(config.password_hash_rounds);
    log::debug!("Hashing passwords with {} PBKDF2 rounds", hasher.rounds());
    let session_settings = SessionSettings::new(&config.secret_key, config.session_cookie_secure);
    let csrf_enabled = !config.testing;
    if !csrf_enabled {
        log::warn!("TESTING is set: CSRF protection is disabled");
    }

    log::info!("Starting todoapp server at {}", config.server_url());
    HttpServer::new(move || {
        // Registration order is inside-out: the logger sees every request first,
        // then the session is loaded, CSRF checked, and the user resolved.
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(hasher))
            .wrap(LoadUser)
            .wrap(CsrfGuard::new(csrf_enabled))
            .wrap(SessionMiddleware::new(session_settings.clone()))
            .wrap(Logger::default())
            .configure(routes::config)
    })
    .bind((config.server_host.as_str(), config.server_port))?
    .run()
    .await
}
