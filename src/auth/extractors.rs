use actix_web::dev::Payload;
use actix_web::{Error as ActixError, FromRequest, HttpMessage, HttpRequest};
use std::future::{ready, Ready};

use crate::auth::session::Session;
use crate::error::AppError;
use crate::models::User;

/// Extracts the request's [`Session`] handle.
///
/// Requires `SessionMiddleware`; without it the request fails with a 500.
impl FromRequest for Session {
    type Error = ActixError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        match req.extensions().get::<Session>().cloned() {
            Some(session) => ready(Ok(session)),
            None => {
                let err = AppError::InternalServerError(
                    "Session not found in request. Ensure SessionMiddleware is active.".to_string(),
                );
                ready(Err(err.into()))
            }
        }
    }
}

/// The user loaded by `LoadUser` for this request, if anyone is logged in.
#[derive(Debug, Clone, Default)]
pub struct CurrentUser(pub Option<User>);

impl FromRequest for CurrentUser {
    type Error = ActixError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let user = req.extensions().get::<CurrentUser>().cloned().unwrap_or_default();
        ready(Ok(user))
    }
}

/// The authenticated user's id, taken from the session.
///
/// Meant for handlers behind `RequireAuth`. Anywhere else a missing login is an
/// `AppError::Unauthorized`.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser(pub i64);

impl FromRequest for AuthenticatedUser {
    type Error = ActixError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let user_id = req
            .extensions()
            .get::<Session>()
            .and_then(Session::current_user_id);
        match user_id {
            Some(user_id) => ready(Ok(AuthenticatedUser(user_id))),
            None => {
                let err = AppError::Unauthorized("Login required".to_string());
                ready(Err(err.into()))
            }
        }
    }
}
