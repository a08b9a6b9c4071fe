// src/handlers/demo_bookings.rs

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::demo_booking::{CreateDemoBookingRequest, DemoBooking, UpdateBookingStatusRequest},
    utils::extract::{AppJson, AppPath},
};

const BOOKING_COLUMNS: &str =
    "id, name, email, phone, course_id, preferred_date, status, created_at";

/// Public. New bookings start `pending`.
pub async fn create_booking(
    State(pool): State<PgPool>,
    AppJson(payload): AppJson<CreateDemoBookingRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    if payload.preferred_date < chrono::Local::now().date_naive() {
        return Err(AppError::BadRequest(
            "Preferred date cannot be in the past".to_string(),
        ));
    }

    let booking = sqlx::query_as::<_, DemoBooking>(&format!(
        "INSERT INTO demo_bookings (name, email, phone, course_id, preferred_date)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING {BOOKING_COLUMNS}"
    ))
    .bind(payload.name.trim())
    .bind(payload.email.trim().to_lowercase())
    .bind(payload.phone.trim())
    .bind(payload.course_id)
    .bind(payload.preferred_date)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(db) = &e {
            if db.is_foreign_key_violation() {
                return AppError::BadRequest("Unknown course".to_string());
            }
        }
        AppError::from(e)
    })?;

    tracing::info!(booking_id = booking.id, "Demo booked");

    Ok((StatusCode::CREATED, Json(booking)))
}

/// Admin only.
pub async fn list_bookings(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let bookings = sqlx::query_as::<_, DemoBooking>(&format!(
        "SELECT {BOOKING_COLUMNS} FROM demo_bookings ORDER BY preferred_date ASC, created_at DESC"
    ))
    .fetch_all(&pool)
    .await?;

    Ok(Json(bookings))
}

/// Admin only.
pub async fn update_booking_status(
    State(pool): State<PgPool>,
    AppPath(id): AppPath<i64>,
    AppJson(payload): AppJson<UpdateBookingStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    let booking = sqlx::query_as::<_, DemoBooking>(&format!(
        "UPDATE demo_bookings SET status = $1 WHERE id = $2 RETURNING {BOOKING_COLUMNS}"
    ))
    .bind(payload.status.as_str())
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

    Ok(Json(booking))
}

/// Admin only.
pub async fn delete_booking(
    State(pool): State<PgPool>,
    AppPath(id): AppPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM demo_bookings WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Booking not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
