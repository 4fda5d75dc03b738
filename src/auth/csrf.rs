//! Anti-forgery check for state-changing requests.
//!
//! The expected token lives in the session (see [`Session::csrf_token`]); clients echo
//! it back in the `X-CSRF-Token` header or a `csrf_token` form field. The form body is
//! buffered to read the field and then handed back to the handler untouched.

use std::rc::Rc;

use actix_http::h1;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    http::Method,
    web, Error, HttpMessage,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::auth::session::Session;
use crate::error::AppError;

pub const CSRF_HEADER: &str = "X-CSRF-Token";
pub const REASON_CSRF_INVALID: &str = "CSRF token missing or invalid.";

#[derive(Debug, Default, Deserialize)]
struct CsrfForm {
    #[serde(default)]
    csrf_token: Option<String>,
}

/// Whether `method` can change server state and therefore needs a token.
pub fn is_mutating(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

/// Compares the submitted token with the session's in constant time.
///
/// Fails if either side is missing or empty.
pub fn tokens_match(submitted: Option<&str>, expected: Option<&str>) -> bool {
    match (submitted, expected) {
        (Some(submitted), Some(expected)) if !submitted.is_empty() && !expected.is_empty() => {
            let a = Sha256::digest(submitted.as_bytes());
            let b = Sha256::digest(expected.as_bytes());
            a.ct_eq(&b).into()
        }
        _ => false,
    }
}

fn bytes_to_payload(buf: web::Bytes) -> Payload {
    let (_, mut payload) = h1::Payload::create(true);
    payload.unread_data(buf);
    Payload::from(payload)
}

async fn submitted_token(req: &mut ServiceRequest) -> Result<Option<String>, Error> {
    if let Some(header) = req
        .headers()
        .get(CSRF_HEADER)
        .and_then(|value| value.to_str().ok())
    {
        return Ok(Some(header.to_string()));
    }

    let body = req.extract::<web::Bytes>().await?;
    req.set_payload(bytes_to_payload(body.clone()));

    let token = std::str::from_utf8(&body)
        .ok()
        .and_then(|raw| web::Query::<CsrfForm>::from_query(raw).ok())
        .and_then(|form| form.into_inner().csrf_token);
    Ok(token)
}

/// Rejects mutating requests whose CSRF token does not match the session's.
///
/// Must be wrapped inside [`crate::auth::session::SessionMiddleware`]. Constructed
/// disabled only in test mode.
pub struct CsrfGuard {
    enabled: bool,
}

impl CsrfGuard {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl<S, B> Transform<S, ServiceRequest> for CsrfGuard
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = CsrfGuardService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(CsrfGuardService {
            service: Rc::new(service),
            enabled: self.enabled,
        }))
    }
}

pub struct CsrfGuardService<S> {
    service: Rc<S>,
    enabled: bool,
}

impl<S, B> Service<ServiceRequest> for CsrfGuardService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        if !self.enabled || !is_mutating(req.method()) {
            let fut = self.service.call(req);
            return Box::pin(fut);
        }

        let service = Rc::clone(&self.service);
        Box::pin(async move {
            let expected = req
                .extensions()
                .get::<Session>()
                .and_then(Session::existing_csrf_token);
            let submitted = submitted_token(&mut req).await?;

            if !tokens_match(submitted.as_deref(), expected.as_deref()) {
                log::warn!(
                    "Rejected {} {}: CSRF token missing or invalid",
                    req.method(),
                    req.path()
                );
                return Err(AppError::BadRequest(REASON_CSRF_INVALID.into()).into());
            }

            service.call(req).await
        })
    }
}
