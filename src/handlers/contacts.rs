// src/handlers/contacts.rs

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::contact::{Contact, CreateContactRequest},
    utils::{
        extract::{AppJson, AppPath},
        html::clean_html,
    },
};

const CONTACT_COLUMNS: &str = "id, name, email, phone, message, created_at";

/// Public contact form.
pub async fn create_contact(
    State(pool): State<PgPool>,
    AppJson(payload): AppJson<CreateContactRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let message = clean_html(&payload.message);
    if message.is_empty() {
        return Err(AppError::BadRequest("Message cannot be empty".to_string()));
    }

    let contact = sqlx::query_as::<_, Contact>(&format!(
        "INSERT INTO contacts (name, email, phone, message)
         VALUES ($1, $2, $3, $4)
         RETURNING {CONTACT_COLUMNS}"
    ))
    .bind(clean_html(&payload.name))
    .bind(payload.email.trim().to_lowercase())
    .bind(payload.phone.as_deref().map(str::trim))
    .bind(&message)
    .fetch_one(&pool)
    .await?;

    tracing::info!(contact_id = contact.id, "Contact message received");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": "Message received", "contact": contact })),
    ))
}

/// Admin only.
pub async fn list_contacts(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let contacts = sqlx::query_as::<_, Contact>(&format!(
        "SELECT {CONTACT_COLUMNS} FROM contacts ORDER BY created_at DESC"
    ))
    .fetch_all(&pool)
    .await?;

    Ok(Json(contacts))
}

/// Admin only.
pub async fn delete_contact(
    State(pool): State<PgPool>,
    AppPath(id): AppPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM contacts WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Contact not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
