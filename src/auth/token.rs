/// Token issuance and validation.
///
/// Access tokens and password-reset tokens are both JWTs signed with the
/// configured secret; they differ in lifetime and in the `purpose` claim,
/// and each codec rejects the other kind.

use std::str::FromStr;

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::auth::claims::{Claims, TokenPurpose};
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError, ConfigError};

fn signing_algorithm(config: &JwtSettings) -> Result<Algorithm, AppError> {
    Algorithm::from_str(&config.algorithm).map_err(|_| {
        AppError::Config(ConfigError::InvalidValue(format!(
            "unknown signing algorithm: {}",
            config.algorithm
        )))
    })
}

fn validation(config: &JwtSettings) -> Result<Validation, AppError> {
    let mut validation = Validation::new(signing_algorithm(config)?);
    validation.set_issuer(&[&config.issuer]);
    // Tokens expire exactly at the embedded instant
    validation.leeway = 0;
    Ok(validation)
}

/// Issue a session access token for a user.
///
/// # Errors
/// Returns error if the algorithm is unknown or encoding fails.
pub fn issue_access_token(email: &str, config: &JwtSettings) -> Result<String, AppError> {
    let claims = Claims::access(
        email.to_string(),
        config.access_token_expiry_minutes * 60,
        config.issuer.clone(),
    );

    encode(
        &Header::new(signing_algorithm(config)?),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
}

/// Issue a password-reset token for a user.
///
/// Returns the encoded token together with its jti so the caller can record
/// it for single-use enforcement.
pub fn issue_reset_token(email: &str, config: &JwtSettings) -> Result<(String, Uuid), AppError> {
    let jti = Uuid::new_v4();
    let claims = Claims::reset(
        email.to_string(),
        config.reset_token_expiry_minutes * 60,
        config.issuer.clone(),
        jti,
    );

    let token = encode(
        &Header::new(signing_algorithm(config)?),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))?;

    Ok((token, jti))
}

fn decode_claims(token: &str, config: &JwtSettings) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation(config)?,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::warn!("Token validation error: {}", e);
        AppError::Auth(AuthError::InvalidToken)
    })
}

/// Validate an access token and extract its claims.
///
/// # Errors
/// Fails with `AuthError::InvalidToken` when the signature is invalid, the
/// token has expired, or the token was minted for another purpose.
pub fn verify_access_token(token: &str, config: &JwtSettings) -> Result<Claims, AppError> {
    let claims = decode_claims(token, config)?;

    if claims.purpose != TokenPurpose::Access {
        tracing::warn!(sub = %claims.sub, "Non-access token presented as access token");
        return Err(AppError::Auth(AuthError::InvalidToken));
    }

    Ok(claims)
}

/// Validate a password-reset token and extract its claims.
///
/// # Errors
/// Fails with `AuthError::InvalidToken` when the signature is invalid, the
/// token has expired, the purpose is wrong, or the jti is missing.
pub fn decode_reset_token(token: &str, config: &JwtSettings) -> Result<Claims, AppError> {
    let claims = decode_claims(token, config)?;

    if claims.purpose != TokenPurpose::PasswordReset || claims.jti.is_none() {
        tracing::warn!(sub = %claims.sub, "Non-reset token presented as reset token");
        return Err(AppError::Auth(AuthError::InvalidToken));
    }

    Ok(claims)
}
