//! Credential claims inspection
//!
//! Reads the unverified expiry hint out of an access credential for renewal
//! scheduling. The signature segment is never checked here: verification is
//! the identity provider's job, and nothing security-relevant hangs off this
//! inspection. A credential that cannot be decoded is treated as expired.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use host_traits::time::Clock;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Claims carried by an access credential. Only `exp` drives any logic.
#[derive(Debug, Clone, Deserialize)]
pub struct Claims {
    /// Expiry as Unix epoch seconds.
    pub exp: i64,
    /// Subject, when present. Informational only.
    #[serde(default)]
    pub sub: Option<String>,
}

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("credential has no claims segment")]
    MissingSegment,

    #[error("claims segment is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("claims segment is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decode the claims segment of a credential. Never panics on malformed
/// input; every failure mode is a [`DecodeError`].
pub fn decode(credential: &str) -> Result<Claims, DecodeError> {
    let payload = credential
        .split('.')
        .nth(1)
        .ok_or(DecodeError::MissingSegment)?;
    // Issuers vary on padding; strip it so both forms decode.
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('='))?;
    let claims = serde_json::from_slice(&bytes)?;
    Ok(claims)
}

/// Whether `credential` expires within `window` of the clock's now.
///
/// Returns `true` on any decode failure: an unreadable credential is treated
/// as already expired rather than surfaced as an error.
pub fn expires_within(credential: &str, window: Duration, clock: &dyn Clock) -> bool {
    match decode(credential) {
        Ok(claims) => claims.exp <= clock.unix_timestamp() + window.as_secs() as i64,
        Err(e) => {
            debug!(error = %e, "treating undecodable credential as expired");
            true
        }
    }
}
