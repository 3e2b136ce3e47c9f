/// Authentication routes
///
/// Login, token refresh, and the authenticated user's profile.

use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::audit::AuditEvent;
use crate::auth::{
    generate_refresh_token, issue_access_token, revoke_refresh_token, save_refresh_token,
    validate_refresh_token, verify_password, Claims,
};
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError, DatabaseError, ErrorContext};
use crate::routes::users::UserResponse;
use crate::validators::is_valid_email;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Login response: the user's public profile plus a token pair.
#[derive(Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// POST /auth/login
///
/// Authenticate with email and password.
///
/// # Errors
/// - 400: Validation error, or email/password mismatch
/// - 500: Internal server error
///
/// # Security notes
/// Unknown email and wrong password collapse into the same error before
/// anything is logged or returned, so responses cannot be used to probe
/// which addresses have accounts.
pub async fn login(
    form: web::Json<LoginRequest>,
    pool: web::Data<PgPool>,
    jwt_config: web::Data<JwtSettings>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_login");

    let email = is_valid_email(&form.email)?;

    let user = sqlx::query_as::<_, (Uuid, String, String, String, chrono::DateTime<Utc>)>(
        "SELECT id, name, email, password_hash, created_at FROM users WHERE email = $1",
    )
    .bind(&email)
    .fetch_optional(pool.get_ref())
    .await?;

    let (user_id, name, user_email, password_hash, created_at) = match user {
        Some(row) => row,
        None => {
            AuditEvent::new("LOGIN", "user", "FAILURE", "Credential check failed").emit();
            return Err(AppError::Auth(AuthError::InvalidCredentials));
        }
    };

    let password_valid = verify_password(&form.password, &password_hash)?;
    if !password_valid {
        AuditEvent::new("LOGIN", "user", "FAILURE", "Credential check failed").emit();
        return Err(AppError::Auth(AuthError::InvalidCredentials));
    }

    let access_token = issue_access_token(&user_email, jwt_config.get_ref())?;
    let refresh_token = generate_refresh_token();

    save_refresh_token(
        pool.get_ref(),
        user_id,
        &refresh_token,
        jwt_config.refresh_token_expiry_seconds,
    )
    .await?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %user_id,
        "User logged in successfully"
    );

    Ok(HttpResponse::Ok().json(AuthResponse {
        user: UserResponse {
            id: user_id.to_string(),
            name,
            email: user_email,
            created_at: created_at.to_rfc3339(),
        },
        access_token,
        refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: jwt_config.access_token_expiry_minutes * 60,
    }))
}

/// POST /auth/refresh
///
/// Exchange a refresh token for a fresh pair. The old refresh token is
/// revoked, so a stolen token stops working after the legitimate client
/// refreshes.
///
/// # Errors
/// - 400: Invalid, expired, or revoked refresh token
/// - 500: Internal server error
pub async fn refresh(
    form: web::Json<RefreshRequest>,
    pool: web::Data<PgPool>,
    jwt_config: web::Data<JwtSettings>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("token_refresh");

    let user_id = validate_refresh_token(pool.get_ref(), &form.refresh_token).await?;

    revoke_refresh_token(pool.get_ref(), &form.refresh_token).await?;

    let user_email = sqlx::query_scalar::<_, String>("SELECT email FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool.get_ref())
        .await?
        .ok_or_else(|| AppError::Database(DatabaseError::NotFound("User not found".to_string())))?;

    let access_token = issue_access_token(&user_email, jwt_config.get_ref())?;
    let refresh_token = generate_refresh_token();

    save_refresh_token(
        pool.get_ref(),
        user_id,
        &refresh_token,
        jwt_config.refresh_token_expiry_seconds,
    )
    .await?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %user_id,
        "Token refreshed successfully"
    );

    Ok(HttpResponse::Ok().json(RefreshResponse {
        access_token,
        refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: jwt_config.access_token_expiry_minutes * 60,
    }))
}

/// GET /auth/profile
///
/// The authenticated user's profile. Claims are injected by the JWT
/// middleware; the subject is the user's email.
///
/// # Errors
/// - 401: Missing or invalid token (handled by middleware)
/// - 404: Account deleted while the token was still live
pub async fn profile(
    claims: web::ReqData<Claims>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let user = sqlx::query_as::<_, (Uuid, String, String, chrono::DateTime<Utc>)>(
        "SELECT id, name, email, created_at FROM users WHERE email = $1",
    )
    .bind(&claims.sub)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| AppError::Database(DatabaseError::NotFound("User not found".to_string())))?;

    Ok(HttpResponse::Ok().json(UserResponse {
        id: user.0.to_string(),
        name: user.1,
        email: user.2,
        created_at: user.3.to_rfc3339(),
    }))
}
