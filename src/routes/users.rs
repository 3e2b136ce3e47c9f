/// User routes
///
/// User CRUD plus the two-phase password-reset flow.

use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::audit::AuditEvent;
use crate::auth::{
    consume_reset_token, decode_reset_token, hash_password, issue_access_token, issue_reset_token,
    purge_expired_reset_tokens, record_reset_token, revoke_all_user_tokens,
};
use crate::configuration::JwtSettings;
use crate::email_client::EmailClient;
use crate::error::{AppError, AuthError, DatabaseError, ErrorContext};
use crate::validators::{is_valid_email, is_valid_name};

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Deserialize)]
pub struct PasswordResetConfirm {
    pub token: String,
    pub password: String,
}

/// Public view of a user; the password hash never leaves the database layer.
#[derive(Serialize)]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub created_at: String,
}

#[derive(Serialize)]
pub struct ResetRequestedResponse {
    pub detail: String,
}

#[derive(Serialize)]
pub struct ResetTokenResponse {
    pub access_token: String,
    pub token_type: String,
}

type UserRow = (Uuid, String, String, chrono::DateTime<Utc>);

fn user_response(row: UserRow) -> UserResponse {
    UserResponse {
        id: row.0.to_string(),
        name: row.1,
        email: row.2,
        created_at: row.3.to_rfc3339(),
    }
}

/// POST /users
///
/// # Errors
/// - 400: Validation errors, or email already registered
/// - 500: Internal server error
pub async fn create_user(
    form: web::Json<CreateUserRequest>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_creation");

    let email = is_valid_email(&form.email)?;
    let name = is_valid_name(&form.name)?;
    let password_hash = hash_password(&form.password)?;

    let user_id = Uuid::new_v4();
    let created_at = Utc::now();

    // The unique constraint on users.email surfaces duplicates as a 400.
    sqlx::query(
        r#"
        INSERT INTO users (id, name, email, password_hash, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(user_id)
    .bind(&name)
    .bind(&email)
    .bind(&password_hash)
    .bind(created_at)
    .bind(created_at)
    .execute(pool.get_ref())
    .await?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %user_id,
        "User created successfully"
    );

    Ok(HttpResponse::Created().json(user_response((user_id, name, email, created_at))))
}

/// GET /users/{user_id}
pub async fn get_user(
    path: web::Path<Uuid>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let user_id = path.into_inner();

    let user = sqlx::query_as::<_, UserRow>(
        "SELECT id, name, email, created_at FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| AppError::Database(DatabaseError::NotFound("User not found".to_string())))?;

    Ok(HttpResponse::Ok().json(user_response(user)))
}

/// GET /users
pub async fn list_users(pool: web::Data<PgPool>) -> Result<HttpResponse, AppError> {
    let users = sqlx::query_as::<_, UserRow>(
        "SELECT id, name, email, created_at FROM users ORDER BY created_at",
    )
    .fetch_all(pool.get_ref())
    .await?;

    let body: Vec<UserResponse> = users.into_iter().map(user_response).collect();

    Ok(HttpResponse::Ok().json(body))
}

/// PUT /users/{user_id}
///
/// Absent fields keep their current value; a supplied password is re-hashed.
pub async fn update_user(
    path: web::Path<Uuid>,
    form: web::Json<UpdateUserRequest>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_update");
    let user_id = path.into_inner();

    let existing = sqlx::query_as::<_, UserRow>(
        "SELECT id, name, email, created_at FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| AppError::Database(DatabaseError::NotFound("User not found".to_string())))?;

    let name = match &form.name {
        Some(name) => is_valid_name(name)?,
        None => existing.1,
    };
    let email = match &form.email {
        Some(email) => is_valid_email(email)?,
        None => existing.2,
    };
    let password_hash = match &form.password {
        Some(password) => Some(hash_password(password)?),
        None => None,
    };

    match &password_hash {
        Some(hash) => {
            sqlx::query(
                r#"
                UPDATE users
                SET name = $1, email = $2, password_hash = $3, updated_at = $4
                WHERE id = $5
                "#,
            )
            .bind(&name)
            .bind(&email)
            .bind(hash)
            .bind(Utc::now())
            .bind(user_id)
            .execute(pool.get_ref())
            .await?;
        }
        None => {
            sqlx::query(
                r#"
                UPDATE users
                SET name = $1, email = $2, updated_at = $3
                WHERE id = $4
                "#,
            )
            .bind(&name)
            .bind(&email)
            .bind(Utc::now())
            .bind(user_id)
            .execute(pool.get_ref())
            .await?;
        }
    }

    tracing::info!(
        request_id = %context.request_id,
        user_id = %user_id,
        "User updated successfully"
    );

    Ok(HttpResponse::Ok().json(user_response((user_id, name, email, existing.3))))
}

/// DELETE /users/{user_id}
pub async fn delete_user(
    path: web::Path<Uuid>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_deletion");
    let user_id = path.into_inner();

    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::Database(DatabaseError::NotFound(
            "User not found".to_string(),
        )));
    }

    tracing::info!(
        request_id = %context.request_id,
        user_id = %user_id,
        "User deleted successfully"
    );

    Ok(HttpResponse::NoContent().finish())
}

fn reset_email_html(name: &str, token: &str) -> String {
    format!(
        "<html><body>\
         <p>Hello {},</p>\
         <p>A password reset was requested for your account. \
         Use the link below within the next few minutes to choose a new password.</p>\
         <p><a href=\"/password-reset?token={}\">Reset your password</a></p>\
         <p>If you did not request this, you can ignore this email.</p>\
         </body></html>",
        name, token
    )
}

/// POST /users/password-reset-request
///
/// Mints a reset token, records it for single-use enforcement, and schedules
/// the email send in the background. The response never waits on delivery;
/// send failures are logged and audited only.
///
/// # Errors
/// - 404: No user with that email
/// - 500: Internal server error
pub async fn request_password_reset(
    form: web::Json<PasswordResetRequest>,
    pool: web::Data<PgPool>,
    jwt_config: web::Data<JwtSettings>,
    email_client: web::Data<EmailClient>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("password_reset_request");

    let email = is_valid_email(&form.email)?;

    let user = sqlx::query_as::<_, (Uuid, String)>(
        "SELECT id, name FROM users WHERE email = $1",
    )
    .bind(&email)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| AppError::Database(DatabaseError::NotFound("User not found".to_string())))?;

    let (user_id, name) = user;

    let purged = purge_expired_reset_tokens(pool.get_ref()).await?;
    if purged > 0 {
        tracing::debug!(purged, "Expired reset tokens removed");
    }

    let (reset_token, jti) = issue_reset_token(&email, jwt_config.get_ref())?;
    record_reset_token(
        pool.get_ref(),
        jti,
        user_id,
        jwt_config.reset_token_expiry_minutes * 60,
    )
    .await?;

    AuditEvent::new("RESET_REQUEST", "user", "SUCCESS", "Reset token issued")
        .with_resource_id(user_id.to_string())
        .emit();

    // Fire-and-forget: the caller gets a 200 once the send is scheduled.
    let client = email_client.get_ref().clone();
    let recipient = email.clone();
    let body = reset_email_html(&name, &reset_token);
    tokio::spawn(async move {
        match client.send_email(&recipient, "Reset Password", &body).await {
            Ok(()) => {
                AuditEvent::new("SEND_EMAIL", "email", "SUCCESS", "Reset email dispatched").emit();
            }
            Err(e) => {
                AuditEvent::new("SEND_EMAIL", "email", "FAILURE", e.to_string()).emit();
            }
        }
    });

    tracing::info!(
        request_id = %context.request_id,
        user_id = %user_id,
        "Password reset requested"
    );

    Ok(HttpResponse::Ok().json(ResetRequestedResponse {
        detail: "Password reset link sent successfully".to_string(),
    }))
}

/// POST /users/password-reset
///
/// Decodes the reset token, spends its server-side record (single use),
/// stores the new password hash, and returns a fresh access token so the
/// user lands in a logged-in session.
///
/// # Errors
/// - 400: Invalid, expired, or already-consumed token; weak password
/// - 404: Account deleted between request and confirm
/// - 500: Internal server error
pub async fn confirm_password_reset(
    form: web::Json<PasswordResetConfirm>,
    pool: web::Data<PgPool>,
    jwt_config: web::Data<JwtSettings>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("password_reset_confirm");

    let claims = decode_reset_token(&form.token, jwt_config.get_ref())?;

    let jti = claims
        .jti
        .as_deref()
        .and_then(|jti| Uuid::parse_str(jti).ok())
        .ok_or(AppError::Auth(AuthError::InvalidToken))?;

    consume_reset_token(pool.get_ref(), jti).await.map_err(|e| {
        AuditEvent::new("RESET_CONFIRM", "token", "FAILURE", "Token reuse or unknown jti")
            .with_resource_id(jti.to_string())
            .emit();
        e
    })?;

    let user_id = sqlx::query_scalar::<_, Uuid>("SELECT id FROM users WHERE email = $1")
        .bind(&claims.sub)
        .fetch_optional(pool.get_ref())
        .await?
        .ok_or_else(|| AppError::Database(DatabaseError::NotFound("User not found".to_string())))?;

    let password_hash = hash_password(&form.password)?;

    sqlx::query(
        r#"
        UPDATE users
        SET password_hash = $1, updated_at = $2
        WHERE id = $3
        "#,
    )
    .bind(&password_hash)
    .bind(Utc::now())
    .bind(user_id)
    .execute(pool.get_ref())
    .await?;

    // A changed password invalidates every outstanding session
    revoke_all_user_tokens(pool.get_ref(), user_id).await?;

    let access_token = issue_access_token(&claims.sub, jwt_config.get_ref())?;

    AuditEvent::new("RESET_CONFIRM", "user", "SUCCESS", "Password updated")
        .with_resource_id(user_id.to_string())
        .emit();

    tracing::info!(
        request_id = %context.request_id,
        user_id = %user_id,
        "Password reset completed"
    );

    Ok(HttpResponse::Ok().json(ResetTokenResponse {
        access_token,
        token_type: "Bearer".to_string(),
    }))
}
