// src/handlers/tests.rs

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::{PgPool, types::Json as SqlJson};
use validator::Validate;

use crate::{
    error::{AppError, is_unique_violation},
    models::{
        test::{Test, TestSummary, UpsertTestRequest, total_marks},
        test_result::{PopulatedResult, ResultQuery, SubmitTestRequest, TestInfo, TestResult},
        user::{Role, UserSummary},
    },
    services::grading::{grade_submission, summarize},
    state::AppState,
    utils::{
        extract::{AppJson, AppPath, AppQuery},
        jwt::Claims,
    },
};

const TEST_COLUMNS: &str = "id, title, description, course_id, questions, duration_minutes, \
                            passing_marks, total_marks, created_by, created_at";
const RESULT_COLUMNS: &str = "id, test_id, student_id, answers, total_marks, obtained_marks, \
                              percentage, status, time_taken, submitted_at";

async fn fetch_test(pool: &PgPool, id: i64) -> Result<Test, AppError> {
    sqlx::query_as::<_, Test>(&format!("SELECT {TEST_COLUMNS} FROM tests WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Test not found".to_string()))
}

/// Lists all tests without their questions.
pub async fn list_tests(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let tests = sqlx::query_as::<_, TestSummary>(
        r#"
        SELECT id, title, description, course_id, duration_minutes, passing_marks, total_marks,
               jsonb_array_length(questions)::BIGINT AS question_count
        FROM tests
        ORDER BY created_at DESC
        "#,
    )
    .fetch_all(&pool)
    .await?;

    Ok(Json(tests))
}

/// Retrieves a single test. Students get the questions without answer keys.
pub async fn get_test(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    AppPath(id): AppPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut test = fetch_test(&pool, id).await?;

    if !claims.role.is_staff() {
        test.questions = SqlJson(test.questions.0.iter().map(|q| q.redacted()).collect());
    }

    Ok(Json(test))
}

/// Creates a test. `total_marks` is derived from the questions.
pub async fn create_test(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    AppJson(payload): AppJson<UpsertTestRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let total = total_marks(&payload.questions);

    let test = sqlx::query_as::<_, Test>(&format!(
        "INSERT INTO tests
            (title, description, course_id, questions, duration_minutes,
             passing_marks, total_marks, created_by)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING {TEST_COLUMNS}"
    ))
    .bind(payload.title.trim())
    .bind(&payload.description)
    .bind(payload.course_id)
    .bind(SqlJson(&payload.questions))
    .bind(payload.duration)
    .bind(payload.passing_marks)
    .bind(total)
    .bind(claims.user_id()?)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create test: {:?}", e);
        AppError::from(e)
    })?;

    Ok((StatusCode::CREATED, Json(test)))
}

/// Replaces a test's content and recomputes `total_marks`.
pub async fn update_test(
    State(pool): State<PgPool>,
    AppPath(id): AppPath<i64>,
    AppJson(payload): AppJson<UpsertTestRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let total = total_marks(&payload.questions);

    let test = sqlx::query_as::<_, Test>(&format!(
        "UPDATE tests SET title = $1, description = $2, course_id = $3, questions = $4,
                duration_minutes = $5, passing_marks = $6, total_marks = $7
         WHERE id = $8
         RETURNING {TEST_COLUMNS}"
    ))
    .bind(payload.title.trim())
    .bind(&payload.description)
    .bind(payload.course_id)
    .bind(SqlJson(&payload.questions))
    .bind(payload.duration)
    .bind(payload.passing_marks)
    .bind(total)
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Test not found".to_string()))?;

    Ok(Json(test))
}

pub async fn delete_test(
    State(pool): State<PgPool>,
    AppPath(id): AppPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM tests WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Test not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Grades and stores a student's single attempt at a test.
///
/// * Rejects a second attempt with `ALREADY_SUBMITTED`; the unique index on
///   (test_id, student_id) covers two submissions racing past the pre-check.
/// * AI-backed parts of grading fall back instead of failing.
pub async fn submit_test(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppPath(test_id): AppPath<i64>,
    AppJson(req): AppJson<SubmitTestRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let student_id = claims.user_id()?;
    let test = fetch_test(&state.pool, test_id).await?;

    let prior = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM test_results WHERE test_id = $1 AND student_id = $2",
    )
    .bind(test_id)
    .bind(student_id)
    .fetch_optional(&state.pool)
    .await?;
    if prior.is_some() {
        tracing::info!(test_id, student_id, "Rejected repeat submission");
        return Err(AppError::AlreadySubmitted);
    }

    let graded = grade_submission(&test.questions.0, &req.answers, state.evaluator.as_ref()).await;
    let summary = summarize(&graded, test.total_marks, test.passing_marks);

    let result = sqlx::query_as::<_, TestResult>(&format!(
        "INSERT INTO test_results
            (test_id, student_id, answers, total_marks, obtained_marks,
             percentage, status, time_taken)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING {RESULT_COLUMNS}"
    ))
    .bind(test_id)
    .bind(student_id)
    .bind(SqlJson(&graded))
    .bind(test.total_marks)
    .bind(summary.obtained_marks)
    .bind(summary.percentage)
    .bind(summary.status.as_str())
    .bind(req.time_taken)
    .fetch_one(&state.pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::AlreadySubmitted
        } else {
            tracing::error!("Failed to store test result: {:?}", e);
            AppError::from(e)
        }
    })?;

    tracing::info!(
        test_id,
        student_id,
        percentage = result.percentage,
        status = %result.status,
        "Test submitted"
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "result": result })),
    ))
}

/// A result with its test and student populated.
/// Students only ever see their own; staff may pick a student with `?studentId=`.
pub async fn get_result(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    AppPath(test_id): AppPath<i64>,
    AppQuery(params): AppQuery<ResultQuery>,
) -> Result<impl IntoResponse, AppError> {
    let caller = claims.user_id()?;
    let student_id = match (claims.role, params.student_id) {
        (Role::Student, Some(other)) if other != caller => {
            return Err(AppError::Forbidden(
                "Students can only view their own results".to_string(),
            ));
        }
        (_, Some(id)) => id,
        (_, None) => caller,
    };

    let result = sqlx::query_as::<_, TestResult>(&format!(
        "SELECT {RESULT_COLUMNS} FROM test_results WHERE test_id = $1 AND student_id = $2"
    ))
    .bind(test_id)
    .bind(student_id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Result not found".to_string()))?;

    let test = sqlx::query_as::<_, TestInfo>(
        "SELECT id, title, total_marks, passing_marks FROM tests WHERE id = $1",
    )
    .bind(test_id)
    .fetch_one(&pool)
    .await?;

    let student =
        sqlx::query_as::<_, UserSummary>("SELECT id, name, email FROM users WHERE id = $1")
            .bind(student_id)
            .fetch_one(&pool)
            .await?;

    Ok(Json(PopulatedResult {
        result,
        test,
        student,
    }))
}

/// All results for a test, best first. Staff only.
pub async fn list_results(
    State(pool): State<PgPool>,
    AppPath(test_id): AppPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let results = sqlx::query_as::<_, TestResult>(&format!(
        "SELECT {RESULT_COLUMNS} FROM test_results
         WHERE test_id = $1 ORDER BY percentage DESC, submitted_at ASC"
    ))
    .bind(test_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(results))
}
