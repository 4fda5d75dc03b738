#![allow(dead_code)]

use actix_web::{
    body::{to_bytes, MessageBody},
    cookie::Cookie,
    dev::{Service, ServiceResponse},
    http::{header, StatusCode},
    test, web,
};
use serde_json::Value;
use sqlx::SqlitePool;
use todoapp::auth::session::SESSION_COOKIE_NAME;
use todoapp::config::Config;
use todoapp::db;

pub const TEST_SECRET: &str = "test-secret";

/// Builds the full application around `$pool`, the way `main` does.
macro_rules! test_app {
    ($pool:expr) => {
        test_app!($pool, true)
    };
    ($pool:expr, $csrf_enabled:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(actix_web::web::Data::new($pool.clone()))
                .app_data(actix_web::web::Data::new(
                    todoapp::auth::PasswordHasher::new(1_000),
                ))
                .wrap(todoapp::auth::LoadUser)
                .wrap(todoapp::auth::CsrfGuard::new($csrf_enabled))
                .wrap(todoapp::auth::SessionMiddleware::new(
                    todoapp::auth::SessionSettings::new(common::TEST_SECRET, false),
                ))
                .wrap(actix_web::middleware::Logger::default())
                .configure(todoapp::routes::config),
        )
        .await
    };
}

pub async fn test_pool() -> SqlitePool {
    let config = Config::for_tests();
    let pool = db::connect(&config.database_url)
        .await
        .expect("Failed to open in-memory database");
    db::init_schema(&pool)
        .await
        .expect("Failed to create schema");
    pool
}

pub struct TestResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub body: web::Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or_else(|e| {
            panic!(
                "Response is not JSON ({}): {}",
                e,
                String::from_utf8_lossy(&self.body)
            )
        })
    }

    pub fn flash_messages(&self) -> Vec<String> {
        self.json()["flashes"]
            .as_array()
            .map(|flashes| {
                flashes
                    .iter()
                    .filter_map(|f| f["message"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// A browser stand-in: keeps the session cookie and the last CSRF token it saw.
#[derive(Default)]
pub struct TestClient {
    pub cookie: Option<Cookie<'static>>,
    pub csrf_token: Option<String>,
}

impl TestClient {
    pub fn new() -> Self {
        Self::default()
    }

    async fn send<S, B>(&mut self, app: &S, req: test::TestRequest) -> TestResponse
    where
        S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
        B: MessageBody,
    {
        let req = match &self.cookie {
            Some(cookie) => req.cookie(cookie.clone()),
            None => req,
        };

        let response = match test::try_call_service(app, req.to_request()).await {
            Ok(resp) => {
                if let Some(cookie) = resp
                    .response()
                    .cookies()
                    .find(|c| c.name() == SESSION_COOKIE_NAME)
                {
                    self.cookie = Some(cookie.into_owned());
                }
                let status = resp.status();
                let location = resp
                    .headers()
                    .get(header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let body = test::read_body(resp).await;
                TestResponse {
                    status,
                    location,
                    body,
                }
            }
            Err(err) => {
                let resp = err.error_response();
                let status = resp.status();
                let body = to_bytes(resp.into_body()).await.unwrap_or_default();
                TestResponse {
                    status,
                    location: None,
                    body,
                }
            }
        };

        if let Ok(Value::Object(page)) = serde_json::from_slice::<Value>(&response.body) {
            if let Some(token) = page.get("csrf_token").and_then(Value::as_str) {
                self.csrf_token = Some(token.to_string());
            }
        }
        response
    }

    pub async fn get<S, B>(&mut self, app: &S, uri: &str) -> TestResponse
    where
        S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
        B: MessageBody,
    {
        self.send(app, test::TestRequest::get().uri(uri)).await
    }

    /// POSTs a urlencoded form with the current CSRF token added.
    pub async fn post_form<S, B>(&mut self, app: &S, uri: &str, form: &[(&str, &str)]) -> TestResponse
    where
        S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
        B: MessageBody,
    {
        let mut fields: Vec<(String, String)> = form
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        if let Some(token) = &self.csrf_token {
            fields.push(("csrf_token".to_string(), token.clone()));
        }
        self.send(app, test::TestRequest::post().uri(uri).set_form(&fields))
            .await
    }

    /// POSTs a urlencoded form exactly as given.
    pub async fn post_form_raw<S, B>(
        &mut self,
        app: &S,
        uri: &str,
        form: &[(&str, &str)],
    ) -> TestResponse
    where
        S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
        B: MessageBody,
    {
        self.send(app, test::TestRequest::post().uri(uri).set_form(form))
            .await
    }

    /// Follows a redirect with a GET, returning the response unchanged otherwise.
    pub async fn follow<S, B>(&mut self, app: &S, resp: TestResponse) -> TestResponse
    where
        S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
        B: MessageBody,
    {
        match (resp.status, resp.location.clone()) {
            (StatusCode::FOUND, Some(location)) => self.get(app, &location).await,
            _ => resp,
        }
    }

    pub async fn register<S, B>(&mut self, app: &S, name: &str, email: &str, password: &str) -> TestResponse
    where
        S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
        B: MessageBody,
    {
        if self.csrf_token.is_none() {
            self.get(app, "/register").await;
        }
        self.post_form(
            app,
            "/register",
            &[
                ("name", name),
                ("email", email),
                ("password", password),
                ("confirm_password", password),
            ],
        )
        .await
    }

    pub async fn login<S, B>(&mut self, app: &S, email: &str, password: &str) -> TestResponse
    where
        S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
        B: MessageBody,
    {
        if self.csrf_token.is_none() {
            self.get(app, "/login").await;
        }
        self.post_form(app, "/login", &[("email", email), ("password", password)])
            .await
    }
}
