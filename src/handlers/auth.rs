// src/handlers/auth.rs

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    config::Config,
    error::{AppError, is_unique_violation},
    models::user::{LoginRequest, RegisterRequest, User},
    utils::{
        extract::AppJson,
        hash::{hash_password, verify_password},
        jwt::{Claims, sign_jwt},
    },
};

pub(crate) const USER_COLUMNS: &str = "id, name, email, password, phone, role, created_at";

/// Registers a new student account.
///
/// Hashes the password using Argon2 before storing it.
/// Returns 201 Created and the user object (excluding password).
pub async fn register(
    State(pool): State<PgPool>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let hashed_password = hash_password(&payload.password)?;
    let email = payload.email.trim().to_lowercase();

    let user = sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (name, email, password, phone, role)
         VALUES ($1, $2, $3, $4, 'student')
         RETURNING {USER_COLUMNS}"
    ))
    .bind(payload.name.trim())
    .bind(&email)
    .bind(&hashed_password)
    .bind(payload.phone.as_deref().map(str::trim))
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict(format!("Email '{}' is already registered", email))
        } else {
            tracing::error!("Failed to register user: {:?}", e);
            AppError::from(e)
        }
    })?;

    tracing::info!(user_id = user.id, "Registered new student");

    Ok((StatusCode::CREATED, Json(json!({ "success": true, "user": user }))))
}

/// Authenticates a user and returns a JWT token.
pub async fn login(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
    ))
    .bind(payload.email.trim().to_lowercase())
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Login DB error: {:?}", e);
        AppError::from(e)
    })?
    .ok_or_else(|| AppError::AuthError("Invalid email or password".to_string()))?;

    // Accounts created through an external login have no local password.
    let stored_hash = user
        .password
        .as_deref()
        .ok_or_else(|| AppError::AuthError("Invalid email or password".to_string()))?;

    if !verify_password(&payload.password, stored_hash)? {
        return Err(AppError::AuthError("Invalid email or password".to_string()));
    }

    let token = sign_jwt(user.id, user.role, &config.jwt_secret, config.jwt_expiration)?;

    Ok(Json(json!({
        "success": true,
        "token": token,
        "type": "Bearer",
        "user": user
    })))
}

/// Returns the authenticated user.
pub async fn me(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
    ))
    .bind(claims.user_id()?)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(json!({ "success": true, "user": user })))
}
