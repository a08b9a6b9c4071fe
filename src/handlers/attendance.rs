// src/handlers/attendance.rs

use axum::{
    Extension, Json,
    extract::State,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::attendance::{
        Attendance, AttendanceQuery, AttendanceToken, AttendanceWithStudent,
        GenerateTokenRequest, GenerateTokenResponse, ScanRequest, TokenType,
    },
    services::attendance::{
        AttendanceDay, ScanRejection, check_token, local_day, new_token_value, token_expiry,
    },
    state::AppState,
    utils::{
        extract::{AppJson, AppQuery},
        jwt::Claims,
    },
};

const ATTENDANCE_COLUMNS: &str = "id, student_id, teacher_id, date, in_time, out_time";

/// Issues a fresh QR token for the calling student.
///
/// * Purges every expired token (stand-in for a TTL index).
/// * Deletes all previous tokens of the same type for this student, so only
///   the newest QR code can be scanned.
/// * Inserts the new token valid for the configured TTL.
pub async fn generate_token(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppJson(req): AppJson<GenerateTokenRequest>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id()?;
    let now = Utc::now();
    let expires_at = token_expiry(now, state.config.attendance_token_ttl_secs);
    let token = new_token_value();

    let mut tx = state.pool.begin().await?;

    let purged = sqlx::query("DELETE FROM attendance_tokens WHERE expires_at < $1")
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    if purged > 0 {
        tracing::debug!(purged, "Purged expired attendance tokens");
    }

    sqlx::query("DELETE FROM attendance_tokens WHERE student_id = $1 AND type = $2")
        .bind(student_id)
        .bind(req.kind.as_str())
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        "INSERT INTO attendance_tokens (student_id, type, token, expires_at, used)
         VALUES ($1, $2, $3, $4, FALSE)",
    )
    .bind(student_id)
    .bind(req.kind.as_str())
    .bind(&token)
    .bind(expires_at)
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to store attendance token: {:?}", e);
        AppError::from(e)
    })?;

    tx.commit().await?;

    Ok(Json(GenerateTokenResponse {
        token,
        expires_at,
        kind: req.kind,
    }))
}

fn reject(rejection: ScanRejection, token_id: Option<i64>) -> AppError {
    tracing::warn!(code = rejection.code(), token_id, "Attendance scan rejected");
    AppError::Attendance(rejection)
}

/// Redeems a student's QR token and marks IN or OUT for today.
///
/// The token is consumed before the day rules are checked, so a scan that
/// fails on DUPLICATE_IN / OUT_BEFORE_IN / DUPLICATE_OUT still burns it.
pub async fn scan(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    AppJson(req): AppJson<ScanRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let scanner_id = claims.user_id()?;
    let now = Utc::now();

    // 1. Lookup
    let token = sqlx::query_as::<_, AttendanceToken>(
        "SELECT id, student_id, type, token, expires_at, used
         FROM attendance_tokens WHERE token = $1",
    )
    .bind(req.token.trim())
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| reject(ScanRejection::NotFound, None))?;

    // 2-3. Used / expired
    check_token(&token, now).map_err(|r| reject(r, Some(token.id)))?;

    // 4. Consume. The `used = FALSE` guard makes concurrent scans race-free.
    let consumed = sqlx::query(
        "UPDATE attendance_tokens SET used = TRUE WHERE id = $1 AND used = FALSE",
    )
    .bind(token.id)
    .execute(&pool)
    .await?
    .rows_affected();
    if consumed == 0 {
        return Err(reject(ScanRejection::AlreadyUsed, Some(token.id)));
    }

    // 5. Resolve today's record. Rolled back if the transition is rejected.
    let date = local_day(now);
    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO attendance (student_id, date) VALUES ($1, $2)
         ON CONFLICT (student_id, date) DO NOTHING",
    )
    .bind(token.student_id)
    .bind(date)
    .execute(&mut *tx)
    .await?;

    let record = sqlx::query_as::<_, Attendance>(&format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendance
         WHERE student_id = $1 AND date = $2 FOR UPDATE"
    ))
    .bind(token.student_id)
    .bind(date)
    .fetch_one(&mut *tx)
    .await?;

    // 6-7. IN / OUT rules
    let mut day = AttendanceDay::from(&record);
    day.apply(token.kind, now, scanner_id)
        .map_err(|r| reject(r, Some(token.id)))?;

    // 8. Persist
    let updated = sqlx::query_as::<_, Attendance>(&format!(
        "UPDATE attendance SET teacher_id = $1, in_time = $2, out_time = $3
         WHERE id = $4
         RETURNING {ATTENDANCE_COLUMNS}"
    ))
    .bind(day.teacher_id)
    .bind(day.in_time)
    .bind(day.out_time)
    .bind(record.id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        student_id = token.student_id,
        scanner_id,
        kind = %token.kind,
        "Attendance marked"
    );

    let message = match token.kind {
        TokenType::In => "IN time marked successfully",
        TokenType::Out => "OUT time marked successfully",
    };

    Ok(Json(json!({
        "success": true,
        "message": message,
        "attendance": updated
    })))
}

/// The calling student's attendance, newest first.
pub async fn my_attendance(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let records = sqlx::query_as::<_, Attendance>(&format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendance
         WHERE student_id = $1 ORDER BY date DESC"
    ))
    .bind(claims.user_id()?)
    .fetch_all(&pool)
    .await?;

    Ok(Json(records))
}

/// Staff listing, optionally filtered by day and student.
pub async fn list_attendance(
    State(pool): State<PgPool>,
    AppQuery(params): AppQuery<AttendanceQuery>,
) -> Result<impl IntoResponse, AppError> {
    let records = sqlx::query_as::<_, AttendanceWithStudent>(
        r#"
        SELECT a.id, a.student_id, u.name AS student_name, a.teacher_id,
               a.date, a.in_time, a.out_time
        FROM attendance a
        JOIN users u ON a.student_id = u.id
        WHERE ($1::DATE IS NULL OR a.date = $1)
          AND ($2::BIGINT IS NULL OR a.student_id = $2)
        ORDER BY a.date DESC, u.name ASC
        "#,
    )
    .bind(params.date)
    .bind(params.student_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(records))
}
