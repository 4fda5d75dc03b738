//! Cookie-held sessions.
//!
//! The whole session state travels in a signed cookie (see [`crate::auth::token`]);
//! the server keeps nothing between requests. [`SessionMiddleware`] decodes the
//! cookie once per request and hands handlers a request-scoped [`Session`]. The
//! cookie is only re-issued when the state actually changed.

use std::cell::RefCell;
use std::rc::Rc;

use actix_web::{
    cookie::{time::Duration as CookieDuration, Cookie, SameSite},
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use chrono::{DateTime, Duration, Utc};
use futures::future::{ready, LocalBoxFuture, Ready};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};

use crate::auth::token::{decode_session, encode_session, SessionKeys};
use crate::error::AppError;
use crate::models::User;

pub const SESSION_COOKIE_NAME: &str = "session";
/// Absolute session lifetime, counted from `issued_at`.
pub const SESSION_LIFETIME_HOURS: i64 = 8;
/// How long a started password reset stays usable.
pub const RESET_TTL_MINUTES: i64 = 15;
pub const CSRF_TOKEN_LENGTH: usize = 64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Success,
    Info,
    Warning,
    Danger,
}

/// A one-shot notice shown on the next rendered page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Flash {
    pub category: FlashLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingReset {
    pub user_id: i64,
    pub started_at: DateTime<Utc>,
}

/// Outcome of checking the password-reset sub-state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetWindow {
    /// No reset has been started in this session.
    NoReset,
    /// A reset for this user id is pending and within its TTL.
    Active(i64),
    /// The pending reset outlived its TTL and has just been cleared.
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionState {
    pub issued_at: DateTime<Utc>,
    /// Set once a user logs in; the cookie then carries a `Max-Age`.
    #[serde(default)]
    pub permanent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csrf_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset: Option<PendingReset>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flashes: Vec<Flash>,
}

impl SessionState {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            issued_at: now,
            permanent: false,
            user_id: None,
            user_name: None,
            csrf_token: None,
            reset: None,
            flashes: Vec::new(),
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.issued_at + Duration::hours(SESSION_LIFETIME_HOURS)
    }

    /// When the cookie itself stops being accepted: the end of the session
    /// lifetime, or the end of a pending reset's window if that comes later.
    pub fn cookie_expires_at(&self) -> DateTime<Utc> {
        let lifetime_end = self.expires_at();
        match self.reset {
            Some(pending) => {
                lifetime_end.max(pending.started_at + Duration::minutes(RESET_TTL_MINUTES))
            }
            None => lifetime_end,
        }
    }

    /// Logs the user out once the 8 hour lifetime is over. Only reachable when a
    /// pending reset kept the cookie alive past it.
    pub fn drop_expired_login(&mut self, now: DateTime<Utc>) {
        if self.user_id.is_some() && now > self.expires_at() {
            self.user_id = None;
            self.user_name = None;
            self.permanent = false;
        }
    }

    /// Drops everything, including the CSRF token and any pending reset, and logs
    /// `user` in with a fresh 8 hour lifetime.
    pub fn begin_session(&mut self, user: &User, now: DateTime<Utc>) {
        *self = Self::new(now);
        self.permanent = true;
        self.user_id = Some(user.id);
        self.user_name = Some(user.name.clone());
    }

    pub fn end_session(&mut self, now: DateTime<Utc>) {
        *self = Self::new(now);
    }

    /// Records a pending reset for `user_id`. Does not log anyone in.
    pub fn begin_password_reset(&mut self, user_id: i64, now: DateTime<Utc>) {
        self.reset = Some(PendingReset {
            user_id,
            started_at: now,
        });
    }

    /// Checks the pending reset against its TTL, clearing it once expired.
    ///
    /// A reset is still valid at exactly `started_at + 15 minutes`.
    pub fn validate_reset_window(&mut self, now: DateTime<Utc>) -> ResetWindow {
        match self.reset {
            None => ResetWindow::NoReset,
            Some(pending) if now - pending.started_at > Duration::minutes(RESET_TTL_MINUTES) => {
                self.reset = None;
                ResetWindow::Expired
            }
            Some(pending) => ResetWindow::Active(pending.user_id),
        }
    }

    pub fn consume_reset(&mut self) {
        self.reset = None;
    }

    /// Returns the CSRF token, generating it on first use.
    pub fn csrf_token(&mut self) -> &str {
        self.csrf_token.get_or_insert_with(generate_csrf_token)
    }

    pub fn flash(&mut self, category: FlashLevel, message: impl Into<String>) {
        self.flashes.push(Flash {
            category,
            message: message.into(),
        });
    }
}

fn generate_csrf_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CSRF_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

struct SessionInner {
    state: SessionState,
    changed: bool,
}

/// Request-scoped handle to the current session.
///
/// Cloning is cheap; all clones refer to the same state for the lifetime of the request.
#[derive(Clone)]
pub struct Session(Rc<RefCell<SessionInner>>);

impl Session {
    pub fn new(state: SessionState) -> Self {
        Session(Rc::new(RefCell::new(SessionInner {
            state,
            changed: false,
        })))
    }

    fn update<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let mut inner = self.0.borrow_mut();
        let before = inner.state.clone();
        let result = f(&mut inner.state);
        if inner.state != before {
            inner.changed = true;
        }
        result
    }

    pub fn current_user_id(&self) -> Option<i64> {
        self.0.borrow().state.user_id
    }

    pub fn begin_session(&self, user: &User) {
        self.update(|state| state.begin_session(user, Utc::now()));
    }

    pub fn end_session(&self) {
        self.update(|state| state.end_session(Utc::now()));
    }

    pub fn begin_password_reset(&self, user_id: i64) {
        self.update(|state| state.begin_password_reset(user_id, Utc::now()));
    }

    pub fn validate_reset_window(&self) -> ResetWindow {
        self.update(|state| state.validate_reset_window(Utc::now()))
    }

    pub fn consume_reset(&self) {
        self.update(SessionState::consume_reset);
    }

    /// Returns the CSRF token, generating and storing one if the session has none.
    pub fn csrf_token(&self) -> String {
        self.update(|state| state.csrf_token().to_string())
    }

    /// The CSRF token if one was ever issued, without creating it.
    pub fn existing_csrf_token(&self) -> Option<String> {
        self.0.borrow().state.csrf_token.clone()
    }

    pub fn flash(&self, category: FlashLevel, message: impl Into<String>) {
        self.update(|state| state.flash(category, message));
    }

    /// Drains the queued flash messages.
    pub fn take_flashes(&self) -> Vec<Flash> {
        self.update(|state| std::mem::take(&mut state.flashes))
    }

    /// The state to persist, if anything changed during the request.
    fn changed_state(&self) -> Option<SessionState> {
        let inner = self.0.borrow();
        inner.changed.then(|| inner.state.clone())
    }
}

/// Key and cookie attributes used by [`SessionMiddleware`].
#[derive(Clone)]
pub struct SessionSettings {
    pub keys: SessionKeys,
    pub cookie_secure: bool,
}

impl SessionSettings {
    pub fn new(secret: &str, cookie_secure: bool) -> Self {
        Self {
            keys: SessionKeys::from_secret(secret.as_bytes()),
            cookie_secure,
        }
    }

    fn cookie(&self, state: &SessionState) -> Result<Cookie<'static>, AppError> {
        let value = encode_session(state, &self.keys)?;
        let mut builder = Cookie::build(SESSION_COOKIE_NAME, value)
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.cookie_secure);
        if state.permanent {
            let remaining = (state.cookie_expires_at() - Utc::now())
                .num_seconds()
                .max(0);
            builder = builder.max_age(CookieDuration::seconds(remaining));
        }
        Ok(builder.finish())
    }
}

/// Loads the session from its cookie and writes it back if a handler changed it.
///
/// Invalid, tampered or expired cookies start a fresh anonymous session.
pub struct SessionMiddleware {
    settings: Rc<SessionSettings>,
}

impl SessionMiddleware {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            settings: Rc::new(settings),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SessionMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = SessionMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SessionMiddlewareService {
            service,
            settings: Rc::clone(&self.settings),
        }))
    }
}

pub struct SessionMiddlewareService<S> {
    service: S,
    settings: Rc<SessionSettings>,
}

impl<S, B> Service<ServiceRequest> for SessionMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let state = req
            .cookie(SESSION_COOKIE_NAME)
            .and_then(|cookie| match decode_session(cookie.value(), &self.settings.keys) {
                Ok(mut state) => {
                    state.drop_expired_login(Utc::now());
                    Some(state)
                }
                Err(e) => {
                    log::debug!("Discarding session cookie: {}", e);
                    None
                }
            })
            .unwrap_or_else(|| SessionState::new(Utc::now()));

        let session = Session::new(state);
        req.extensions_mut().insert(session.clone());

        let settings = Rc::clone(&self.settings);
        let fut = self.service.call(req);

        Box::pin(async move {
            let mut res = fut.await?;
            if let Some(state) = session.changed_state() {
                let cookie = settings.cookie(&state)?;
                res.response_mut()
                    .add_cookie(&cookie)
                    .map_err(|e| AppError::InternalServerError(e.to_string()))?;
            }
            Ok(res)
        })
    }
}
