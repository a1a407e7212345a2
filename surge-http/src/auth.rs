//! Auth token handling

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, NO_PAD};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use serde::Deserialize;

use crate::errors::{HttpError, HttpResult};

/// Name of the response header carrying the access token
pub const AUTH_HEADER: &str = "authentication";

/// Name of the cookie carrying the refresh token
pub const REFRESH_COOKIE: &str = "refreshId";

// Token segments are unpadded base64url, but padded input is accepted too.
const SEGMENT_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    NO_PAD.with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Credentials of a logged in client
#[derive(Debug, Clone)]
pub(crate) struct AuthState {
    pub token: String,
    pub cookie: Option<String>,
    pub user_id: u64,
}

impl AuthState {
    /// State for servers running without authentication
    pub fn anonymous(user_id: u64) -> Self {
        Self {
            token: String::new(),
            cookie: None,
            user_id,
        }
    }
}

#[derive(Deserialize)]
struct Claims {
    #[serde(rename = "userId")]
    user_id: u64,
}

/// Read the user id from the payload segment of a JWT
///
/// The signature is not verified.
pub fn decode_user_id(token: &str) -> HttpResult<u64> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| HttpError::TokenDecode("token has no payload segment".to_string()))?;

    let decoded = SEGMENT_ENGINE
        .decode(payload)
        .map_err(|e| HttpError::TokenDecode(format!("payload {:?}: {}", payload, e)))?;

    let claims: Claims = serde_json::from_slice(&decoded)
        .map_err(|e| HttpError::TokenDecode(format!("claims: {}", e)))?;

    Ok(claims.user_id)
}
