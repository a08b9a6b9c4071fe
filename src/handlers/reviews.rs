// src/handlers/reviews.rs

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::{AppError, is_unique_violation},
    models::{review::{CreateReviewRequest, Review}, user::Role},
    utils::{
        extract::{AppJson, AppPath},
        html::clean_html,
        jwt::Claims,
    },
};

/// Posts a review. Only enrolled students may review, once per course.
pub async fn create_review(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    AppJson(payload): AppJson<CreateReviewRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let student_id = claims.user_id()?;

    let enrolled = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM enrollments
                       WHERE student_id = $1 AND course_id = $2 AND status = 'active')",
    )
    .bind(student_id)
    .bind(payload.course_id)
    .fetch_one(&pool)
    .await?;

    if !enrolled {
        return Err(AppError::Forbidden(
            "Only enrolled students can review this course".to_string(),
        ));
    }

    let review = sqlx::query_as::<_, Review>(
        r#"
        WITH inserted AS (
            INSERT INTO reviews (student_id, course_id, rating, comment)
            VALUES ($1, $2, $3, $4)
            RETURNING id, student_id, course_id, rating, comment, created_at
        )
        SELECT i.id, i.student_id, u.name AS student_name, i.course_id, i.rating, i.comment,
               i.created_at
        FROM inserted i
        JOIN users u ON u.id = i.student_id
        "#,
    )
    .bind(student_id)
    .bind(payload.course_id)
    .bind(payload.rating)
    .bind(clean_html(&payload.comment))
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict("You have already reviewed this course".to_string())
        } else {
            tracing::error!("Failed to create review: {:?}", e);
            AppError::from(e)
        }
    })?;

    Ok((StatusCode::CREATED, Json(review)))
}

/// Public.
pub async fn list_course_reviews(
    State(pool): State<PgPool>,
    AppPath(course_id): AppPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let reviews = sqlx::query_as::<_, Review>(
        r#"
        SELECT r.id, r.student_id, u.name AS student_name, r.course_id, r.rating, r.comment,
               r.created_at
        FROM reviews r
        JOIN users u ON u.id = r.student_id
        WHERE r.course_id = $1
        ORDER BY r.created_at DESC
        "#,
    )
    .bind(course_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(reviews))
}

/// The author or an admin may delete a review.
pub async fn delete_review(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    AppPath(id): AppPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let author = sqlx::query_scalar::<_, i64>("SELECT student_id FROM reviews WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Review not found".to_string()))?;

    if claims.role != Role::Admin && author != claims.user_id()? {
        return Err(AppError::Forbidden("Cannot delete another user's review".to_string()));
    }

    sqlx::query("DELETE FROM reviews WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
