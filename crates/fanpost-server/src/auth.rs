//! Bearer-token identity verification.
//!
//! The external identity collaborator is specified only by its contract:
//! authenticate(request) → stable user id. Tokens here are
//! `<user_id>.<hex HMAC-SHA256(user_id, identity_secret)>`: self-contained,
//! verified in constant time, no token store required. The
//! [`AuthUser`] extractor rejects with 401 before a handler ever runs.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::ApiError;
use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

/// The authenticated user id, extracted from the bearer token.
pub struct AuthUser(pub String);

/// Mint a token for a user id. Used by operators to issue credentials and
/// by the test suite.
pub fn mint_token(user_id: &str, identity_secret: &str) -> String {
    format!("{user_id}.{}", tag(user_id, identity_secret))
}

/// Verify a bearer token, returning the user id it names.
pub fn verify_token(token: &str, identity_secret: &str) -> Option<String> {
    let (user_id, presented_tag) = token.rsplit_once('.')?;
    if user_id.is_empty() {
        return None;
    }
    let expected = tag(user_id, identity_secret);
    let matches: bool = expected
        .as_bytes()
        .ct_eq(presented_tag.as_bytes())
        .into();
    matches.then(|| user_id.to_string())
}

fn tag(user_id: &str, identity_secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(identity_secret.as_bytes())
        .expect("HMAC accepts any key length");
    mac.update(user_id.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthorized)?;

        let user_id =
            verify_token(token, &state.identity_secret).ok_or(ApiError::Unauthorized)?;
        Ok(AuthUser(user_id))
    }
}
