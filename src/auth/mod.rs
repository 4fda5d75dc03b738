pub mod csrf;
pub mod extractors;
pub mod middleware;
pub mod password;
pub mod session;
pub mod token;

use std::borrow::Cow;

use serde::Deserialize;
use validator::{Validate, ValidationError};

// Re-export necessary items
pub use csrf::CsrfGuard;
pub use extractors::{AuthenticatedUser, CurrentUser};
pub use middleware::{LoadUser, RequireAuth};
pub use password::{verify_password, PasswordHasher};
pub use session::{FlashLevel, ResetWindow, Session, SessionMiddleware, SessionSettings};

pub const INVALID_EMAIL: &str = "Enter a valid email address.";

/// Trims and lowercases an email address the way it is stored.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Deliberately permissive: at least 6 characters, containing `@` and `.`.
fn validate_email_shape(email: &str) -> Result<(), ValidationError> {
    if email.chars().count() >= 6 && email.contains('@') && email.contains('.') {
        return Ok(());
    }
    let mut err = ValidationError::new("email");
    err.message = Some(Cow::Borrowed(INVALID_EMAIL));
    Err(err)
}

/// Represents the payload of the login form.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Represents the payload of the registration form.
///
/// `validate()` reports every failing field at once; the duplicate-email check needs
/// the database and is done by the handler.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct RegisterForm {
    #[validate(length(min = 2, message = "Name must be at least 2 characters."))]
    pub name: String,
    #[validate(custom = "validate_email_shape")]
    pub email: String,
    #[validate(
        length(min = 8, message = "Password must be at least 8 characters."),
        must_match(other = "confirm_password", message = "Passwords do not match.")
    )]
    pub password: String,
    pub confirm_password: String,
}

impl RegisterForm {
    /// Field order in which validation messages are reported.
    pub const FIELDS: &'static [&'static str] = &["name", "email", "password"];

    /// Trims the name and normalizes the email; passwords are left as typed.
    pub fn normalized(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            email: normalize_email(&self.email),
            ..self
        }
    }
}

/// Represents the payload of the forgot-password form.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ForgotPasswordForm {
    pub email: String,
}

/// Represents the payload of the reset-password form.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct ResetPasswordForm {
    #[validate(
        length(min = 8, message = "Password must be at least 8 characters."),
        must_match(other = "confirm_password", message = "Passwords do not match.")
    )]
    pub password: String,
    pub confirm_password: String,
}

impl ResetPasswordForm {
    pub const FIELDS: &'static [&'static str] = &["password"];
}
