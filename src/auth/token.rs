use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::auth::session::SessionState;
use crate::error::AppError;

/// The claims of a session cookie: the session state plus its absolute expiry.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Expiration timestamp (seconds since epoch), see [`SessionState::cookie_expires_at`].
    pub exp: i64,
    #[serde(flatten)]
    pub state: SessionState,
}

/// HS256 keys derived from the configured secret.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SessionKeys {
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

/// Signs the session state into a cookie value.
pub fn encode_session(state: &SessionState, keys: &SessionKeys) -> Result<String, AppError> {
    // `exp` has whole-second precision; round up so the cookie never dies early.
    let expires_at = state.cookie_expires_at();
    let claims = SessionClaims {
        exp: expires_at.timestamp() + i64::from(expires_at.timestamp_subsec_nanos() > 0),
        state: state.clone(),
    };

    encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
        .map_err(|e| AppError::InternalServerError(format!("Failed to sign session: {}", e)))
}

/// Verifies a cookie value and returns the session state it carries.
///
/// Fails with `AppError::Unauthorized` if the signature is wrong, the token is
/// malformed, or the session has expired along with any pending reset.
pub fn decode_session(token: &str, keys: &SessionKeys) -> Result<SessionState, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    let data = decode::<SessionClaims>(token, &keys.decoding, &validation)?;
    Ok(data.claims.state)
}
