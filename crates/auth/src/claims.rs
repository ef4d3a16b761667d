use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockbook_core::UserId;

use crate::Role;

/// Claims carried by an access token.
///
/// `iat`/`exp` are encoded as unix seconds, as registered JWT claims require.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject: the user id.
    pub sub: UserId,
    pub email: String,
    pub role: Role,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub iat: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub exp: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (iat is in the future)")]
    NotYetValid,

    #[error("invalid token time window (exp <= iat)")]
    InvalidTimeWindow,
}

/// Check the time window of already-decoded claims against `now`.
pub fn validate_claims(claims: &JwtClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.exp <= claims.iat {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.iat {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.exp {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn claims(iat: DateTime<Utc>, exp: DateTime<Utc>) -> JwtClaims {
        JwtClaims {
            sub: UserId::new(),
            email: "ana@shop.com".to_string(),
            role: Role::User,
            iat,
            exp,
        }
    }

    #[test]
    fn window_checks() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let c = claims(t0, t0 + Duration::hours(1));
        assert_eq!(validate_claims(&c, t0), Ok(()));
        assert_eq!(
            validate_claims(&c, t0 - Duration::seconds(1)),
            Err(TokenValidationError::NotYetValid)
        );
        assert_eq!(
            validate_claims(&c, t0 + Duration::hours(1)),
            Err(TokenValidationError::Expired)
        );
        assert_eq!(
            validate_claims(&claims(t0, t0), t0),
            Err(TokenValidationError::InvalidTimeWindow)
        );
    }

    #[test]
    fn timestamps_serialize_as_unix_seconds() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let json = serde_json::to_value(claims(t0, t0 + Duration::seconds(60))).unwrap();
        assert_eq!(json["iat"], 1_704_067_200);
        assert_eq!(json["exp"], 1_704_067_260);
        assert_eq!(json["role"], "user");
    }
}
