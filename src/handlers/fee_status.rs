// src/handlers/fee_status.rs

use axum::{
    Extension, Json,
    extract::State,
    response::IntoResponse,
};
use sqlx::{PgConnection, PgPool};
use validator::Validate;

use crate::{
    error::AppError,
    models::fee_status::{FeeStatus, UpsertFeeStatusRequest, derive_fee_status},
    utils::{extract::AppJson, jwt::Claims},
};

const FEE_COLUMNS: &str =
    "id, student_id, course_id, total_fee, paid_amount, due_date, status, updated_at";

/// Adds a confirmed payment to the student's fee record for a course.
pub(crate) async fn record_fee_payment(
    conn: &mut PgConnection,
    student_id: i64,
    course_id: i64,
    course_fee: i64,
    amount: i64,
) -> Result<FeeStatus, sqlx::Error> {
    let existing = sqlx::query_as::<_, (i64, i64)>(
        "SELECT total_fee, paid_amount FROM student_fee_status
         WHERE student_id = $1 AND course_id = $2 FOR UPDATE",
    )
    .bind(student_id)
    .bind(course_id)
    .fetch_optional(&mut *conn)
    .await?;

    let (total_fee, paid_amount) = match existing {
        Some((total, paid)) => (total, paid + amount),
        None => (course_fee, amount),
    };

    sqlx::query_as::<_, FeeStatus>(&format!(
        "INSERT INTO student_fee_status (student_id, course_id, total_fee, paid_amount, status)
         VALUES ($1, $2, $3, $4, $5)
         ON CONFLICT (student_id, course_id) DO UPDATE
            SET paid_amount = EXCLUDED.paid_amount, status = EXCLUDED.status, updated_at = NOW()
         RETURNING {FEE_COLUMNS}"
    ))
    .bind(student_id)
    .bind(course_id)
    .bind(total_fee)
    .bind(paid_amount)
    .bind(derive_fee_status(total_fee, paid_amount).as_str())
    .fetch_one(&mut *conn)
    .await
}

pub async fn my_fee_status(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let rows = sqlx::query_as::<_, FeeStatus>(&format!(
        "SELECT {FEE_COLUMNS} FROM student_fee_status
         WHERE student_id = $1 ORDER BY updated_at DESC"
    ))
    .bind(claims.user_id()?)
    .fetch_all(&pool)
    .await?;

    Ok(Json(rows))
}

/// Admin only.
pub async fn list_fee_status(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let rows = sqlx::query_as::<_, FeeStatus>(&format!(
        "SELECT {FEE_COLUMNS} FROM student_fee_status ORDER BY updated_at DESC"
    ))
    .fetch_all(&pool)
    .await?;

    Ok(Json(rows))
}

/// Admin only. Creates or overwrites the fee record; status is derived.
pub async fn upsert_fee_status(
    State(pool): State<PgPool>,
    AppJson(payload): AppJson<UpsertFeeStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let row = sqlx::query_as::<_, FeeStatus>(&format!(
        "INSERT INTO student_fee_status
            (student_id, course_id, total_fee, paid_amount, due_date, status)
         VALUES ($1, $2, $3, $4, $5, $6)
         ON CONFLICT (student_id, course_id) DO UPDATE
            SET total_fee = EXCLUDED.total_fee,
                paid_amount = EXCLUDED.paid_amount,
                due_date = EXCLUDED.due_date,
                status = EXCLUDED.status,
                updated_at = NOW()
         RETURNING {FEE_COLUMNS}"
    ))
    .bind(payload.student_id)
    .bind(payload.course_id)
    .bind(payload.total_fee)
    .bind(payload.paid_amount)
    .bind(payload.due_date)
    .bind(derive_fee_status(payload.total_fee, payload.paid_amount).as_str())
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        // Unknown student or course id
        if let sqlx::Error::Database(db) = &e {
            if db.is_foreign_key_violation() {
                return AppError::BadRequest("Unknown student or course".to_string());
            }
        }
        tracing::error!("Failed to upsert fee status: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Json(row))
}
