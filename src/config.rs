use std::env;

use rand::{distributions::Alphanumeric, Rng};

use crate::auth::password::DEFAULT_ROUNDS;
use crate::error::AppError;

pub struct Config {
    pub database_url: String,
    pub server_port: u16,
    pub server_host: String,
    pub secret_key: String,
    /// Test mode disables the CSRF guard.
    pub testing: bool,
    pub password_hash_rounds: u32,
    pub session_cookie_secure: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let secret_key = match env::var("SECRET_KEY") {
            Ok(key) if !key.is_empty() => key,
            _ => {
                log::warn!("SECRET_KEY not set; generating an ephemeral key, sessions will not survive a restart");
                random_secret()
            }
        };

        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://db.sqlite3?mode=rwc".to_string()),
            server_port: parse_var("SERVER_PORT", 8080)?,
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            secret_key,
            testing: flag_var("TESTING"),
            password_hash_rounds: parse_var("PASSWORD_HASH_ROUNDS", DEFAULT_ROUNDS)?,
            session_cookie_secure: flag_var("SESSION_COOKIE_SECURE"),
        })
    }

    /// In-memory database, fixed key and cheap hashing, with CSRF checks left on.
    pub fn for_tests() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            server_port: 8080,
            server_host: "127.0.0.1".to_string(),
            secret_key: "test-secret".to_string(),
            testing: false,
            password_hash_rounds: 1_000,
            session_cookie_secure: false,
        }
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server_host, self.server_port)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, AppError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{} must be a number, got {:?}", name, raw))),
        Err(_) => Ok(default),
    }
}

fn flag_var(name: &str) -> bool {
    env::var(name)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

fn random_secret() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}
