// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Extension, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    error::{AppError, is_unique_violation},
    handlers::auth::USER_COLUMNS,
    models::user::{AdminCreateUserRequest, AdminUpdateUserRequest, User},
    utils::{
        extract::{AppJson, AppPath},
        hash::hash_password,
        jwt::Claims,
    },
};

fn map_email_conflict(e: sqlx::Error, context: &str) -> AppError {
    if is_unique_violation(&e) {
        AppError::Conflict("Email is already registered".to_string())
    } else {
        tracing::error!("Failed to {}: {:?}", context, e);
        AppError::from(e)
    }
}

/// Lists all users in the system.
/// Admin only.
pub async fn list_users(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY id DESC"
    ))
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list users: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Json(users))
}

/// Creates a user with any role.
/// Admin only.
pub async fn create_user(
    State(pool): State<PgPool>,
    AppJson(payload): AppJson<AdminCreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let hashed_password = hash_password(&payload.password)?;

    let user = sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (name, email, password, phone, role)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING {USER_COLUMNS}"
    ))
    .bind(payload.name.trim())
    .bind(payload.email.trim().to_lowercase())
    .bind(&hashed_password)
    .bind(payload.phone.as_deref().map(str::trim))
    .bind(payload.role.as_str())
    .fetch_one(&pool)
    .await
    .map_err(|e| map_email_conflict(e, "create user"))?;

    tracing::info!(user_id = user.id, role = %user.role, "Admin created user");

    Ok((StatusCode::CREATED, Json(user)))
}

/// Updates name, email, role or password. Absent fields are left alone.
/// Admin only.
pub async fn update_user(
    State(pool): State<PgPool>,
    AppPath(id): AppPath<i64>,
    AppJson(payload): AppJson<AdminUpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    if payload.name.is_none()
        && payload.email.is_none()
        && payload.role.is_none()
        && payload.password.is_none()
    {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        return Ok(Json(user));
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE users SET ");
    let mut separated = builder.separated(", ");

    if let Some(name) = payload.name {
        separated.push("name = ");
        separated.push_bind_unseparated(name.trim().to_string());
    }

    if let Some(email) = payload.email {
        separated.push("email = ");
        separated.push_bind_unseparated(email.trim().to_lowercase());
    }

    if let Some(role) = payload.role {
        separated.push("role = ");
        separated.push_bind_unseparated(role.as_str());
    }

    if let Some(password) = payload.password {
        separated.push("password = ");
        separated.push_bind_unseparated(hash_password(&password)?);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);
    builder.push(format!(" RETURNING {USER_COLUMNS}"));

    let user = builder
        .build_query_as::<User>()
        .fetch_optional(&pool)
        .await
        .map_err(|e| map_email_conflict(e, "update user"))?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}

/// Deletes a user by ID.
/// Admin only. Prevents deleting self.
pub async fn delete_user(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    AppPath(id): AppPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    if id == claims.user_id()? {
        return Err(AppError::BadRequest("Cannot delete yourself".to_string()));
    }

    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete user: {:?}", e);
            AppError::from(e)
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
