// src/handlers/courses.rs

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        course::{Course, CourseQuery, UpsertCourseRequest},
        user::Role,
    },
    utils::{
        extract::{AppJson, AppPath, AppQuery},
        jwt::Claims,
    },
};

const COURSE_COLUMNS: &str =
    "id, title, description, category, price, thumbnail_url, educator_id, \
     students_count, created_at";

/// `%keyword%` for `ILIKE ... ESCAPE '\'`, with the keyword's own wildcards escaped.
fn contains_pattern(keyword: &str) -> String {
    let mut escaped = String::with_capacity(keyword.len() + 2);
    escaped.push('%');
    for c in keyword.trim().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Lists all courses, optionally filtered by category and search keyword.
pub async fn list_courses(
    State(pool): State<PgPool>,
    AppQuery(params): AppQuery<CourseQuery>,
) -> Result<impl IntoResponse, AppError> {
    let search_pattern = params.q.as_deref().map(contains_pattern);

    let courses = sqlx::query_as::<_, Course>(&format!(
        "SELECT {COURSE_COLUMNS} FROM courses
         WHERE ($1::TEXT IS NULL OR category = $1)
           AND ($2::TEXT IS NULL OR title ILIKE $2 ESCAPE '\\')
         ORDER BY created_at DESC"
    ))
    .bind(params.category)
    .bind(search_pattern)
    .fetch_all(&pool)
    .await?;

    Ok(Json(courses))
}

/// Retrieves a single course by ID.
pub async fn get_course(
    State(pool): State<PgPool>,
    AppPath(id): AppPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let course = sqlx::query_as::<_, Course>(&format!(
        "SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Course not found".to_string()))?;

    Ok(Json(course))
}

pub async fn create_course(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    AppJson(payload): AppJson<UpsertCourseRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let course = sqlx::query_as::<_, Course>(&format!(
        "INSERT INTO courses (title, description, category, price, thumbnail_url, educator_id)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING {COURSE_COLUMNS}"
    ))
    .bind(payload.title.trim())
    .bind(&payload.description)
    .bind(payload.category.trim())
    .bind(payload.price)
    .bind(&payload.thumbnail_url)
    .bind(claims.user_id()?)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create course: {:?}", e);
        AppError::from(e)
    })?;

    Ok((StatusCode::CREATED, Json(course)))
}

/// Educators may only touch their own courses; admins may touch any.
async fn ensure_can_manage(pool: &PgPool, claims: &Claims, course_id: i64) -> Result<(), AppError> {
    let owner = sqlx::query_scalar::<_, i64>("SELECT educator_id FROM courses WHERE id = $1")
        .bind(course_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Course not found".to_string()))?;

    if claims.role != Role::Admin && owner != claims.user_id()? {
        return Err(AppError::Forbidden(
            "You can only manage your own courses".to_string(),
        ));
    }
    Ok(())
}

pub async fn update_course(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    AppPath(id): AppPath<i64>,
    AppJson(payload): AppJson<UpsertCourseRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    ensure_can_manage(&pool, &claims, id).await?;

    let course = sqlx::query_as::<_, Course>(&format!(
        "UPDATE courses
         SET title = $1, description = $2, category = $3, price = $4, thumbnail_url = $5
         WHERE id = $6
         RETURNING {COURSE_COLUMNS}"
    ))
    .bind(payload.title.trim())
    .bind(&payload.description)
    .bind(payload.category.trim())
    .bind(payload.price)
    .bind(&payload.thumbnail_url)
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Course not found".to_string()))?;

    Ok(Json(course))
}

pub async fn delete_course(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    AppPath(id): AppPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    ensure_can_manage(&pool, &claims, id).await?;

    sqlx::query("DELETE FROM courses WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete course: {:?}", e);
            AppError::from(e)
        })?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_keyword_wildcards_are_literal() {
        assert_eq!(contains_pattern(" rust "), "%rust%");
        assert_eq!(contains_pattern("100%"), "%100\\%%");
        assert_eq!(contains_pattern("a_b"), "%a\\_b%");
        assert_eq!(contains_pattern(r"c:\dir"), r"%c:\\dir%");
    }
}
