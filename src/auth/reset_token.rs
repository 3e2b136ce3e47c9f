/// Server-side password-reset token records.
///
/// Every reset token minted gets a row keyed by its jti; confirming a reset
/// spends the row. A token whose row is already spent is dead even if its
/// signature and expiry still check out, which makes reset tokens single-use.

use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AuthError};

/// Record a freshly issued reset token.
///
/// # Errors
/// Returns error if the database operation fails.
pub async fn record_reset_token(
    pool: &PgPool,
    jti: Uuid,
    user_id: Uuid,
    expiry_seconds: i64,
) -> Result<(), AppError> {
    let expires_at = Utc::now() + Duration::seconds(expiry_seconds);

    sqlx::query(
        r#"
        INSERT INTO password_reset_tokens (id, user_id, expires_at, created_at)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(jti)
    .bind(user_id)
    .bind(expires_at)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// Spend a reset token record.
///
/// The UPDATE is guarded on `consumed_at IS NULL`, so when two confirms race
/// on the same token exactly one of them wins the row.
///
/// # Errors
/// Fails with `AuthError::InvalidToken` when the jti is unknown or the
/// record was already consumed.
pub async fn consume_reset_token(pool: &PgPool, jti: Uuid) -> Result<(), AppError> {
    let result = sqlx::query(
        r#"
        UPDATE password_reset_tokens
        SET consumed_at = $1
        WHERE id = $2 AND consumed_at IS NULL
        "#,
    )
    .bind(Utc::now())
    .bind(jti)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        tracing::warn!(jti = %jti, "Reset token unknown or already consumed");
        return Err(AppError::Auth(AuthError::InvalidToken));
    }

    Ok(())
}

/// Delete expired reset token records.
///
/// Housekeeping; correctness never depends on it since consumption and JWT
/// expiry are checked on every confirm.
pub async fn purge_expired_reset_tokens(pool: &PgPool) -> Result<u64, AppError> {
    let result = sqlx::query(
        r#"
        DELETE FROM password_reset_tokens
        WHERE expires_at < $1
        "#,
    )
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
