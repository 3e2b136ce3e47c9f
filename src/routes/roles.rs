/// Role membership routes
///
/// Administrators, professors, and students are membership tables over the
/// user directory; one handler set serves all three, parameterized by the
/// role registered on the route scope.

use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, DatabaseError, ErrorContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleKind {
    Administrator,
    Professor,
    Student,
}

impl RoleKind {
    /// Table names are compile-time constants; the queries below only ever
    /// interpolate these, never request input.
    fn table(&self) -> &'static str {
        match self {
            RoleKind::Administrator => "administrators",
            RoleKind::Professor => "professors",
            RoleKind::Student => "students",
        }
    }

    fn resource(&self) -> &'static str {
        match self {
            RoleKind::Administrator => "administrator",
            RoleKind::Professor => "professor",
            RoleKind::Student => "student",
        }
    }
}

#[derive(Deserialize)]
pub struct AssignRoleRequest {
    pub user_id: Uuid,
}

#[derive(Serialize)]
pub struct RoleMembershipResponse {
    pub id: String,
    pub user_id: String,
    pub created_at: String,
}

type MembershipRow = (Uuid, Uuid, chrono::DateTime<Utc>);

fn membership_response(row: MembershipRow) -> RoleMembershipResponse {
    RoleMembershipResponse {
        id: row.0.to_string(),
        user_id: row.1.to_string(),
        created_at: row.2.to_rfc3339(),
    }
}

/// POST /{role}
///
/// Grant the role to an existing user. Each user holds a role at most once.
///
/// # Errors
/// - 400: User already holds the role
/// - 404: User does not exist
/// - 500: Internal server error
pub async fn assign_role(
    kind: web::Data<RoleKind>,
    form: web::Json<AssignRoleRequest>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let kind = **kind;
    let context = ErrorContext::new("role_assignment");

    let user_exists = sqlx::query_scalar::<_, Uuid>("SELECT id FROM users WHERE id = $1")
        .bind(form.user_id)
        .fetch_optional(pool.get_ref())
        .await?;

    if user_exists.is_none() {
        return Err(AppError::Database(DatabaseError::NotFound(
            "User not found".to_string(),
        )));
    }

    let membership_id = Uuid::new_v4();
    let created_at = Utc::now();

    sqlx::query(&format!(
        r#"
        INSERT INTO {} (id, user_id, created_at, updated_at)
        VALUES ($1, $2, $3, $4)
        "#,
        kind.table()
    ))
    .bind(membership_id)
    .bind(form.user_id)
    .bind(created_at)
    .bind(created_at)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        let msg = e.to_string();
        if msg.contains("duplicate key") || msg.contains("unique constraint") {
            AppError::Database(DatabaseError::UniqueConstraintViolation(format!(
                "User is already a {}",
                kind.resource()
            )))
        } else {
            AppError::from(e)
        }
    })?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %form.user_id,
        role = kind.resource(),
        "Role assigned"
    );

    Ok(HttpResponse::Created().json(membership_response((
        membership_id,
        form.user_id,
        created_at,
    ))))
}

/// GET /{role}
pub async fn list_role_members(
    kind: web::Data<RoleKind>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let kind = **kind;

    let members = sqlx::query_as::<_, MembershipRow>(&format!(
        "SELECT id, user_id, created_at FROM {} ORDER BY created_at",
        kind.table()
    ))
    .fetch_all(pool.get_ref())
    .await?;

    let body: Vec<RoleMembershipResponse> = members.into_iter().map(membership_response).collect();

    Ok(HttpResponse::Ok().json(body))
}

/// DELETE /{role}/{id}
pub async fn remove_role_member(
    kind: web::Data<RoleKind>,
    path: web::Path<Uuid>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let kind = **kind;
    let context = ErrorContext::new("role_removal");
    let membership_id = path.into_inner();

    let result = sqlx::query(&format!("DELETE FROM {} WHERE id = $1", kind.table()))
        .bind(membership_id)
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::Database(DatabaseError::NotFound(format!(
            "{} membership not found",
            kind.resource()
        ))));
    }

    tracing::info!(
        request_id = %context.request_id,
        membership_id = %membership_id,
        role = kind.resource(),
        "Role removed"
    );

    Ok(HttpResponse::NoContent().finish())
}
