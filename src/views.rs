//! Response helpers shared by the handlers.
//!
//! HTML templating lives outside this crate; a "rendered" page is a JSON document
//! carrying everything a template needs: page name, CSRF token, pending flash
//! messages, the logged-in user and the page's own context.

use actix_web::{http::header, HttpResponse};
use serde_json::{json, Map, Value};

use crate::auth::{CurrentUser, Session};

pub const PAGE_LOGIN: &str = "login";
pub const PAGE_REGISTER: &str = "register";
pub const PAGE_DASHBOARD: &str = "dashboard";
pub const PAGE_FORGOT_PASSWORD: &str = "forgot_password";
pub const PAGE_RESET_PASSWORD: &str = "reset_password";

/// Renders `page` with `context` merged in. Drains the session's flash messages.
///
/// `context` must be a JSON object (or `null` for none).
pub fn render(session: &Session, user: &CurrentUser, page: &str, context: Value) -> HttpResponse {
    let mut body = Map::new();
    body.insert("page".into(), json!(page));
    body.insert("csrf_token".into(), json!(session.csrf_token()));
    body.insert("flashes".into(), json!(session.take_flashes()));
    body.insert(
        "user".into(),
        match &user.0 {
            Some(user) => json!({ "id": user.id, "name": user.name }),
            None => Value::Null,
        },
    );
    if let Value::Object(extra) = context {
        body.extend(extra);
    }

    HttpResponse::Ok().json(Value::Object(body))
}

/// `302 Found` to `location`.
pub fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, location))
        .finish()
}
