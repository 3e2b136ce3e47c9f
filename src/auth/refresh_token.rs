/// Refresh token management.
///
/// Refresh tokens are opaque 64-character random strings, stored only as
/// SHA-256 hashes, rotated on every refresh and revocable server-side.

use chrono::{Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AuthError};

/// Generate a new cryptographically random refresh token.
///
/// The plaintext goes to the client; the database only ever sees the hash.
pub fn generate_refresh_token() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Save a refresh token to the database.
///
/// # Errors
/// Returns error if the database operation fails.
pub async fn save_refresh_token(
    pool: &PgPool,
    user_id: Uuid,
    token: &str,
    expiry_seconds: i64,
) -> Result<(), AppError> {
    let token_hash = hash_token(token);
    let expires_at = Utc::now() + Duration::seconds(expiry_seconds);

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at, created_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(token_hash)
    .bind(expires_at)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// Validate a refresh token and return the owning user id.
///
/// # Errors
/// Fails with `AuthError::InvalidToken` when the token is unknown, revoked,
/// or expired.
pub async fn validate_refresh_token(pool: &PgPool, token: &str) -> Result<Uuid, AppError> {
    let token_hash = hash_token(token);

    let result = sqlx::query_as::<_, (Uuid, chrono::DateTime<Utc>, bool)>(
        r#"
        SELECT user_id, expires_at, is_revoked
        FROM refresh_tokens
        WHERE token_hash = $1
        "#,
    )
    .bind(&token_hash)
    .fetch_optional(pool)
    .await?;

    match result {
        None => {
            tracing::warn!("Refresh token not found in database");
            Err(AppError::Auth(AuthError::InvalidToken))
        }
        Some((user_id, expires_at, is_revoked)) => {
            if is_revoked {
                tracing::warn!(user_id = %user_id, "Attempt to use revoked refresh token");
                return Err(AppError::Auth(AuthError::InvalidToken));
            }

            if expires_at < Utc::now() {
                tracing::info!(user_id = %user_id, "Refresh token expired");
                return Err(AppError::Auth(AuthError::InvalidToken));
            }

            Ok(user_id)
        }
    }
}

/// Revoke a single refresh token (token rotation).
///
/// # Errors
/// Returns error if the database operation fails.
pub async fn revoke_refresh_token(pool: &PgPool, token: &str) -> Result<(), AppError> {
    let token_hash = hash_token(token);

    sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET is_revoked = true, revoked_at = $1
        WHERE token_hash = $2
        "#,
    )
    .bind(Utc::now())
    .bind(token_hash)
    .execute(pool)
    .await?;

    Ok(())
}

/// Revoke every refresh token a user holds.
pub async fn revoke_all_user_tokens(pool: &PgPool, user_id: Uuid) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET is_revoked = true, revoked_at = $1
        WHERE user_id = $2 AND is_revoked = false
        "#,
    )
    .bind(Utc::now())
    .bind(user_id)
    .execute(pool)
    .await?;

    tracing::info!(user_id = %user_id, "All refresh tokens revoked for user");
    Ok(())
}
