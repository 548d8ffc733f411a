use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use acs_core::{PrincipalId, RoleId};

/// Default lifetime of an access token.
pub const ACCESS_TOKEN_TTL_MINUTES: i64 = 20;

/// Longest access-token lifetime configuration accepts (one day).
pub const MAX_ACCESS_TOKEN_TTL_MINUTES: i64 = 1440;

/// Access-token claims (transport-agnostic).
///
/// Signing and encoding belong to the transport layer; this is the decoded
/// payload a handler receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject / principal identifier.
    pub sub: PrincipalId,

    /// Role the principal held when the token was issued.
    pub role_id: RoleId,

    pub issued_at: DateTime<Utc>,

    pub expires_at: DateTime<Utc>,
}

impl AccessClaims {
    /// Claims valid from `now` for `ttl`.
    ///
    /// A window that cannot be represented fails with `InvalidTimeWindow`.
    pub fn issue(
        sub: PrincipalId,
        role_id: RoleId,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<Self, TokenValidationError> {
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or(TokenValidationError::InvalidTimeWindow)?;
        Ok(Self {
            sub,
            role_id,
            issued_at: now,
            expires_at,
        })
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

/// Deterministically validate the claims' time window against `now`.
pub fn validate_claims(claims: &AccessClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}
