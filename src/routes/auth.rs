use actix_web::{get, post, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    auth::{
        normalize_email, verify_password, CurrentUser, FlashLevel, ForgotPasswordForm, LoginForm,
        PasswordHasher, RegisterForm, ResetPasswordForm, ResetWindow, Session,
    },
    db,
    error::{validation_messages, AppError, DUPLICATE_EMAIL},
    views::{
        redirect, render, PAGE_FORGOT_PASSWORD, PAGE_LOGIN, PAGE_REGISTER, PAGE_RESET_PASSWORD,
    },
};

pub const FORGOT_PASSWORD_NOTICE: &str =
    "If the email exists, you'll be able to reset the password next.";
pub const RESET_NOT_FOUND: &str = "Password reset session not found or expired. Please try again.";
pub const RESET_EXPIRED: &str = "Password reset session expired. Please try again.";
pub const RESET_USER_MISSING: &str = "User not found. Please try again.";

#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    pub next: Option<String>,
}

/// Only local absolute paths are accepted as a post-login target.
fn safe_next(next: Option<&str>) -> Option<&str> {
    next.filter(|n| n.starts_with('/') && !n.starts_with("//") && !n.contains('\\'))
}

/// Entry point: dashboard for logged-in sessions, login otherwise.
#[get("/")]
pub async fn index(session: Session) -> HttpResponse {
    if session.current_user_id().is_some() {
        redirect("/dashboard")
    } else {
        redirect("/login")
    }
}

#[get("/register")]
pub async fn register_page(session: Session, user: CurrentUser) -> HttpResponse {
    render(&session, &user, PAGE_REGISTER, json!({}))
}

/// Creates an account.
///
/// Every check runs and all failures are flashed together; the form is re-rendered
/// with the submitted name and email. On success the user is sent to the login page,
/// not logged in.
#[post("/register")]
pub async fn register(
    pool: web::Data<SqlitePool>,
    hasher: web::Data<PasswordHasher>,
    session: Session,
    user: CurrentUser,
    form: web::Form<RegisterForm>,
) -> Result<HttpResponse, AppError> {
    let form = form.into_inner().normalized();

    let mut errors = match form.validate() {
        Ok(()) => Vec::new(),
        Err(e) => validation_messages(&e, RegisterForm::FIELDS),
    };
    if db::users::find_by_email(&pool, &form.email).await?.is_some() {
        errors.push(DUPLICATE_EMAIL.to_string());
    }

    if errors.is_empty() {
        let hasher = hasher.get_ref().to_owned();
        let password = form.password.clone();
        let password_hash = web::block(move || hasher.hash(&password)).await?;

        match db::users::create(&pool, &form.name, &form.email, &password_hash).await {
            Ok(created) => {
                log::info!("Registered user {}", created.id);
                session.flash(FlashLevel::Success, "Registration successful. Please log in.");
                return Ok(redirect("/login"));
            }
            // Lost a race with a concurrent registration for the same email.
            Err(AppError::ValidationError(msgs)) => errors.extend(msgs),
            Err(e) => return Err(e),
        }
    }

    for error in errors {
        session.flash(FlashLevel::Danger, error);
    }
    Ok(render(
        &session,
        &user,
        PAGE_REGISTER,
        json!({ "name": form.name, "email": form.email }),
    ))
}

#[get("/login")]
pub async fn login_page(session: Session, user: CurrentUser) -> HttpResponse {
    render(&session, &user, PAGE_LOGIN, json!({}))
}

/// Checks credentials and starts a fresh session.
///
/// Unknown accounts and wrong passwords get the same message.
#[post("/login")]
pub async fn login(
    pool: web::Data<SqlitePool>,
    session: Session,
    user: CurrentUser,
    query: web::Query<LoginQuery>,
    form: web::Form<LoginForm>,
) -> Result<HttpResponse, AppError> {
    let LoginForm { email, password } = form.into_inner();
    let email = normalize_email(&email);

    let found = db::users::find_by_email(&pool, &email).await?;
    let verified = match &found {
        Some(account) => {
            let stored = account.password_hash.clone();
            web::block(move || verify_password(&password, &stored)).await?
        }
        None => false,
    };

    let account = match found {
        Some(account) if verified => account,
        _ => {
            log::info!("Failed login attempt");
            session.flash(FlashLevel::Danger, "Invalid email or password.");
            return Ok(render(&session, &user, PAGE_LOGIN, json!({ "email": email })));
        }
    };

    session.begin_session(&account);
    log::info!("User {} logged in", account.id);
    session.flash(
        FlashLevel::Success,
        format!("Welcome back, {}!", account.first_name()),
    );

    let target = safe_next(query.next.as_deref()).unwrap_or("/dashboard");
    Ok(redirect(target))
}

#[get("/logout")]
pub async fn logout(session: Session) -> HttpResponse {
    if let Some(user_id) = session.current_user_id() {
        log::info!("User {} logged out", user_id);
    }
    session.end_session();
    session.flash(FlashLevel::Info, "You have been logged out.");
    redirect("/login")
}

#[get("/forgot-password")]
pub async fn forgot_password_page(session: Session, user: CurrentUser) -> HttpResponse {
    render(&session, &user, PAGE_FORGOT_PASSWORD, json!({}))
}

/// Starts a password reset for an existing account.
///
/// The response is the same whether or not the account exists.
#[post("/forgot-password")]
pub async fn forgot_password(
    pool: web::Data<SqlitePool>,
    session: Session,
    user: CurrentUser,
    form: web::Form<ForgotPasswordForm>,
) -> Result<HttpResponse, AppError> {
    let email = normalize_email(&form.email);

    if let Some(account) = db::users::find_by_email(&pool, &email).await? {
        session.begin_password_reset(account.id);
        log::info!("Password reset started for user {}", account.id);
    }

    session.flash(FlashLevel::Info, FORGOT_PASSWORD_NOTICE);
    Ok(render(&session, &user, PAGE_FORGOT_PASSWORD, json!({})))
}

/// The reset target if the session holds an unexpired reset, otherwise the redirect
/// back to the start of the flow.
fn pending_reset(session: &Session) -> Result<i64, HttpResponse> {
    match session.validate_reset_window() {
        ResetWindow::Active(user_id) => Ok(user_id),
        ResetWindow::Expired => {
            log::info!("Password reset window expired");
            session.flash(FlashLevel::Warning, RESET_EXPIRED);
            Err(redirect("/forgot-password"))
        }
        ResetWindow::NoReset => {
            session.flash(FlashLevel::Warning, RESET_NOT_FOUND);
            Err(redirect("/forgot-password"))
        }
    }
}

#[get("/reset-password")]
pub async fn reset_password_page(session: Session, user: CurrentUser) -> HttpResponse {
    match pending_reset(&session) {
        Ok(_) => render(&session, &user, PAGE_RESET_PASSWORD, json!({})),
        Err(response) => response,
    }
}

/// Sets a new password for the pending reset target and consumes the reset.
#[post("/reset-password")]
pub async fn reset_password(
    pool: web::Data<SqlitePool>,
    hasher: web::Data<PasswordHasher>,
    session: Session,
    user: CurrentUser,
    form: web::Form<ResetPasswordForm>,
) -> Result<HttpResponse, AppError> {
    let user_id = match pending_reset(&session) {
        Ok(user_id) => user_id,
        Err(response) => return Ok(response),
    };

    let form = form.into_inner();
    if let Err(e) = form.validate() {
        for error in validation_messages(&e, ResetPasswordForm::FIELDS) {
            session.flash(FlashLevel::Danger, error);
        }
        return Ok(render(&session, &user, PAGE_RESET_PASSWORD, json!({})));
    }

    let hasher = hasher.get_ref().to_owned();
    let password = form.password;
    let password_hash = web::block(move || hasher.hash(&password)).await?;
    if !db::users::update_password_hash(&pool, user_id, &password_hash).await? {
        session.consume_reset();
        session.flash(FlashLevel::Danger, RESET_USER_MISSING);
        return Ok(redirect("/forgot-password"));
    }

    session.consume_reset();
    log::info!("Password updated for user {}", user_id);
    session.flash(FlashLevel::Success, "Password updated. Please log in.");
    Ok(redirect("/login"))
}
