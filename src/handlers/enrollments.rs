// src/handlers/enrollments.rs

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgConnection, PgPool};

use crate::{
    error::{AppError, is_unique_violation},
    models::enrollment::{
        CreateEnrollmentRequest, Enrollment, EnrollmentStatus, EnrollmentWithCourse,
    },
    utils::{
        extract::{AppJson, AppPath},
        jwt::Claims,
    },
};

const ENROLLMENT_COLUMNS: &str = "id, student_id, course_id, status, enrolled_at";

/// Inserts an enrollment and bumps the course's `students_count`.
/// Callers run this inside a transaction.
pub(crate) async fn insert_enrollment(
    conn: &mut PgConnection,
    student_id: i64,
    course_id: i64,
    status: EnrollmentStatus,
) -> Result<Enrollment, sqlx::Error> {
    let enrollment = sqlx::query_as::<_, Enrollment>(&format!(
        "INSERT INTO enrollments (student_id, course_id, status)
         VALUES ($1, $2, $3)
         RETURNING {ENROLLMENT_COLUMNS}"
    ))
    .bind(student_id)
    .bind(course_id)
    .bind(status.as_str())
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query("UPDATE courses SET students_count = students_count + 1 WHERE id = $1")
        .bind(course_id)
        .execute(&mut *conn)
        .await?;

    Ok(enrollment)
}

/// Marks the (student, course) enrollment active, creating it if needed.
pub(crate) async fn activate_enrollment(
    conn: &mut PgConnection,
    student_id: i64,
    course_id: i64,
) -> Result<Enrollment, sqlx::Error> {
    let existing = sqlx::query_as::<_, Enrollment>(&format!(
        "UPDATE enrollments SET status = 'active'
         WHERE student_id = $1 AND course_id = $2
         RETURNING {ENROLLMENT_COLUMNS}"
    ))
    .bind(student_id)
    .bind(course_id)
    .fetch_optional(&mut *conn)
    .await?;

    match existing {
        Some(enrollment) => Ok(enrollment),
        None => insert_enrollment(conn, student_id, course_id, EnrollmentStatus::Active).await,
    }
}

/// Enrolls the calling student in a course.
///
/// * One enrollment per (student, course), enforced by the unique index.
/// * Free courses start active, paid ones pending until payment.
/// * `students_count` is incremented in the same transaction.
pub async fn create_enrollment(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    AppJson(req): AppJson<CreateEnrollmentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id()?;

    let price = sqlx::query_scalar::<_, i64>("SELECT price FROM courses WHERE id = $1")
        .bind(req.course_id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Course not found".to_string()))?;

    let mut tx = pool.begin().await?;

    let enrollment = insert_enrollment(
        &mut *tx,
        student_id,
        req.course_id,
        EnrollmentStatus::initial_for_price(price),
    )
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict("Already enrolled in this course".to_string())
        } else {
            tracing::error!("Failed to create enrollment: {:?}", e);
            AppError::from(e)
        }
    })?;

    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(enrollment)))
}

pub async fn my_enrollments(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let enrollments = sqlx::query_as::<_, EnrollmentWithCourse>(
        r#"
        SELECT e.id, e.student_id, e.course_id, c.title AS course_title, e.status, e.enrolled_at
        FROM enrollments e
        JOIN courses c ON e.course_id = c.id
        WHERE e.student_id = $1
        ORDER BY e.enrolled_at DESC
        "#,
    )
    .bind(claims.user_id()?)
    .fetch_all(&pool)
    .await?;

    Ok(Json(enrollments))
}

/// Admin only.
pub async fn list_enrollments(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let enrollments = sqlx::query_as::<_, EnrollmentWithCourse>(
        r#"
        SELECT e.id, e.student_id, e.course_id, c.title AS course_title, e.status, e.enrolled_at
        FROM enrollments e
        JOIN courses c ON e.course_id = c.id
        ORDER BY e.enrolled_at DESC
        "#,
    )
    .fetch_all(&pool)
    .await?;

    Ok(Json(enrollments))
}

/// Admin only. Keeps `students_count` in step, never below zero.
pub async fn delete_enrollment(
    State(pool): State<PgPool>,
    AppPath(id): AppPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;

    let course_id = sqlx::query_scalar::<_, i64>(
        "DELETE FROM enrollments WHERE id = $1 RETURNING course_id",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Enrollment not found".to_string()))?;

    sqlx::query(
        "UPDATE courses SET students_count = GREATEST(0, students_count - 1) WHERE id = $1",
    )
    .bind(course_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}
