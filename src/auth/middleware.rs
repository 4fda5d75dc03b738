use std::rc::Rc;

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header,
    web, Error, HttpMessage, HttpResponse,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use sqlx::SqlitePool;

use crate::auth::extractors::CurrentUser;
use crate::auth::session::{FlashLevel, Session};
use crate::db;

pub const LOGIN_PATH: &str = "/login";
pub const LOGIN_REQUIRED_NOTICE: &str = "Please log in to continue.";

/// `/login?next=<path>` for a request that needs an authenticated user.
pub fn login_redirect_target(requested_path: &str) -> String {
    format!("{}?next={}", LOGIN_PATH, urlencoding::encode(requested_path))
}

/// Resolves the session's user id to a full `User` once per request.
///
/// The result is stored in request extensions as [`CurrentUser`]. Without a session
/// user id no query is issued.
pub struct LoadUser;

impl<S, B> Transform<S, ServiceRequest> for LoadUser
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = LoadUserService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(LoadUserService {
            service: Rc::new(service),
        }))
    }
}

pub struct LoadUserService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for LoadUserService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let user_id = req
            .extensions()
            .get::<Session>()
            .and_then(Session::current_user_id);
        let pool = req.app_data::<web::Data<SqlitePool>>().cloned();
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            let user = match (user_id, pool) {
                (Some(id), Some(pool)) => db::users::find_by_id(pool.get_ref(), id).await?,
                _ => None,
            };
            req.extensions_mut().insert(CurrentUser(user));
            service.call(req).await
        })
    }
}

/// Guards a resource or scope: anonymous requests are redirected to the login page
/// with the requested path as `next`, and a notice is flashed.
pub struct RequireAuth;

impl<S, B> Transform<S, ServiceRequest> for RequireAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RequireAuthService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequireAuthService { service }))
    }
}

pub struct RequireAuthService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for RequireAuthService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let session = req.extensions().get::<Session>().cloned();
        let authenticated = session
            .as_ref()
            .and_then(Session::current_user_id)
            .is_some();

        if authenticated {
            let fut = self.service.call(req);
            return Box::pin(async move { fut.await.map(ServiceResponse::map_into_left_body) });
        }

        if let Some(session) = &session {
            session.flash(FlashLevel::Warning, LOGIN_REQUIRED_NOTICE);
        }
        let location = login_redirect_target(req.path());
        log::debug!("Anonymous request to {} redirected to login", req.path());

        let response = HttpResponse::Found()
            .insert_header((header::LOCATION, location))
            .finish()
            .map_into_right_body();
        Box::pin(async move { Ok(req.into_response(response)) })
    }
}
