/// JWT claims shared by access and password-reset tokens.
///
/// Both token kinds use one payload shape; the `purpose` claim is what keeps
/// a reset token from ever passing as an access token.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a token is allowed to be exchanged for.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    Access,
    PasswordReset,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user email)
    pub sub: String,
    /// Token purpose
    pub purpose: TokenPurpose,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Issuer
    pub iss: String,
    /// Token id; set on reset tokens, consumed server-side
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

impl Claims {
    /// Claims for a session access token.
    pub fn access(email: String, expiry_seconds: i64, issuer: String) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: email,
            purpose: TokenPurpose::Access,
            exp: now + expiry_seconds,
            iat: now,
            iss: issuer,
            jti: None,
        }
    }

    /// Claims for a password-reset token, carrying the jti that the
    /// server-side consumed-token record is keyed by.
    pub fn reset(email: String, expiry_seconds: i64, issuer: String, jti: Uuid) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: email,
            purpose: TokenPurpose::PasswordReset,
            exp: now + expiry_seconds,
            iat: now,
            iss: issuer,
            jti: Some(jti.to_string()),
        }
    }

    pub fn is_expired(&self) -> bool {
        let now = chrono::Utc::now().timestamp();
        self.exp < now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_claims_creation() {
        let claims = Claims::access("test@example.com".to_string(), 1800, "campus".to_string());

        assert_eq!(claims.sub, "test@example.com");
        assert_eq!(claims.purpose, TokenPurpose::Access);
        assert_eq!(claims.iss, "campus");
        assert!(claims.jti.is_none());
        assert!(!claims.is_expired());
    }

    #[test]
    fn reset_claims_carry_jti() {
        let jti = Uuid::new_v4();
        let claims = Claims::reset("test@example.com".to_string(), 300, "campus".to_string(), jti);

        assert_eq!(claims.purpose, TokenPurpose::PasswordReset);
        assert_eq!(claims.jti, Some(jti.to_string()));
    }

    #[test]
    fn purpose_serializes_snake_case() {
        let jti = Uuid::new_v4();
        let claims = Claims::reset("a@x.com".to_string(), 300, "campus".to_string(), jti);
        let json = serde_json::to_string(&claims).unwrap();

        assert!(json.contains(r#""purpose":"password_reset""#));
    }

    #[test]
    fn expired_claims_detected() {
        let claims = Claims::access("a@x.com".to_string(), -10, "campus".to_string());
        assert!(claims.is_expired());
    }
}
