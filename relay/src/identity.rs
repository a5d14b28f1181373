//! Connect-time identity resolution.
//!
//! The socket handshake carries a `userId` query parameter. In
//! [`IdentityMode::QueryParam`] that value is trusted as-is, so any client
//! can claim any user. [`IdentityMode::SignedToken`] instead requires a
//! `token` parameter holding an HS256 JWT issued by the session layer, and
//! the user id is taken from its `sub` claim.

use std::time::Duration;

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Claims carried by a connect token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    /// Expiry as a Unix timestamp.
    pub exp: usize,
}

/// How the relay decides who a connection belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityMode {
    /// Trust the `userId` query parameter. A missing id registers the
    /// connection under the empty (anonymous) user.
    QueryParam,
    /// Require a signed token; `userId`, if also sent, must match it.
    SignedToken {
        /// HS256 secret shared with the session layer.
        secret: String,
    },
}

/// Identity resolution failures. All of them reject the upgrade with 401.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    /// Signed mode without a `token` parameter.
    #[error("missing connect token")]
    MissingToken,

    /// Token failed signature or expiry checks.
    #[error("invalid connect token: {0}")]
    InvalidToken(String),

    /// `userId` parameter disagrees with the token subject.
    #[error("userId does not match token subject")]
    SubjectMismatch,

    /// Token could not be issued.
    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Resolves the user id of an incoming connection.
#[derive(Debug, Clone)]
pub struct IdentityVerifier {
    mode: IdentityMode,
}

impl IdentityVerifier {
    /// Creates a verifier for the given mode.
    #[must_use]
    pub const fn new(mode: IdentityMode) -> Self {
        Self { mode }
    }

    /// Creates a verifier that trusts the query parameter.
    #[must_use]
    pub const fn trusting() -> Self {
        Self::new(IdentityMode::QueryParam)
    }

    /// Creates a verifier that requires tokens signed with `secret`.
    #[must_use]
    pub fn signed(secret: impl Into<String>) -> Self {
        Self::new(IdentityMode::SignedToken {
            secret: secret.into(),
        })
    }

    /// Returns the mode.
    #[must_use]
    pub const fn mode(&self) -> &IdentityMode {
        &self.mode
    }

    /// Returns true if identities are taken on trust.
    #[must_use]
    pub const fn is_trusting(&self) -> bool {
        matches!(self.mode, IdentityMode::QueryParam)
    }

    /// Resolves the user id from the handshake parameters.
    ///
    /// # Errors
    ///
    /// In signed mode, returns an error if the token is missing, invalid,
    /// expired, or names a different user than `user_id`.
    pub fn resolve(&self, user_id: Option<&str>, token: Option<&str>) -> Result<String, IdentityError> {
        match &self.mode {
            IdentityMode::QueryParam => Ok(user_id.unwrap_or_default().to_string()),
            IdentityMode::SignedToken { secret } => {
                let token = token.ok_or(IdentityError::MissingToken)?;
                let data = decode::<Claims>(
                    token,
                    &DecodingKey::from_secret(secret.as_bytes()),
                    &Validation::default(),
                )
                .map_err(|e| IdentityError::InvalidToken(e.to_string()))?;

                match user_id {
                    Some(claimed) if claimed != data.claims.sub => Err(IdentityError::SubjectMismatch),
                    _ => Ok(data.claims.sub),
                }
            }
        }
    }
}

/// Issues a connect token for `user_id` valid for `ttl`.
///
/// # Errors
///
/// Returns an error if encoding fails.
pub fn sign_token(secret: &str, user_id: &str, ttl: Duration) -> Result<String, IdentityError> {
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (chrono::Utc::now().timestamp().max(0) as u64).saturating_add(ttl.as_secs()) as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| IdentityError::Signing(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";
    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn test_trusting_uses_query_param() {
        let verifier = IdentityVerifier::trusting();
        assert!(verifier.is_trusting());
        assert_eq!(verifier.resolve(Some("u1"), None), Ok("u1".to_string()));
    }

    #[test]
    fn test_trusting_missing_user_is_anonymous() {
        let verifier = IdentityVerifier::trusting();
        assert_eq!(verifier.resolve(None, None), Ok(String::new()));
    }

    #[test]
    fn test_signed_accepts_valid_token() {
        let verifier = IdentityVerifier::signed(SECRET);
        let token = sign_token(SECRET, "u1", HOUR).expect("sign");

        assert_eq!(verifier.resolve(None, Some(&token)), Ok("u1".to_string()));
        assert_eq!(verifier.resolve(Some("u1"), Some(&token)), Ok("u1".to_string()));
    }

    #[test]
    fn test_signed_requires_token() {
        let verifier = IdentityVerifier::signed(SECRET);
        assert_eq!(verifier.resolve(Some("u1"), None), Err(IdentityError::MissingToken));
    }

    #[test]
    fn test_signed_rejects_other_secret() {
        let verifier = IdentityVerifier::signed(SECRET);
        let token = sign_token("someone-else", "u1", HOUR).expect("sign");

        assert!(matches!(
            verifier.resolve(None, Some(&token)),
            Err(IdentityError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_signed_rejects_claimed_user_mismatch() {
        let verifier = IdentityVerifier::signed(SECRET);
        let token = sign_token(SECRET, "u1", HOUR).expect("sign");

        assert_eq!(
            verifier.resolve(Some("u2"), Some(&token)),
            Err(IdentityError::SubjectMismatch)
        );
    }

    #[test]
    fn test_signed_rejects_expired_token() {
        let verifier = IdentityVerifier::signed(SECRET);
        let claims = Claims {
            sub: "u1".to_string(),
            exp: 1_000,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .expect("encode");

        assert!(matches!(
            verifier.resolve(None, Some(&token)),
            Err(IdentityError::InvalidToken(_))
        ));
    }
}
