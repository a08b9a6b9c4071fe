// src/handlers/payments.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::{AppError, is_unique_violation},
    handlers::{
        enrollments::{activate_enrollment, insert_enrollment},
        fee_status::record_fee_payment,
    },
    models::{
        enrollment::EnrollmentStatus,
        payment::{
            CreateOrderRequest, CreateOrderResponse, Payment, PaymentStatus, VerifyPaymentRequest,
        },
    },
    services::payment::PaymentGateway,
    state::AppState,
    utils::{extract::AppJson, jwt::Claims},
};

const PAYMENT_COLUMNS: &str = "id, student_id, course_id, razorpay_order_id, razorpay_payment_id, \
                               amount, currency, status, created_at";
const CURRENCY: &str = "INR";

fn gateway(state: &AppState) -> Result<Arc<dyn PaymentGateway>, AppError> {
    state
        .payments
        .clone()
        .ok_or_else(|| AppError::Upstream("Payments are not configured".to_string()))
}

/// Creates a gateway order for a paid course and records it as `created`.
/// A student without an enrollment gets a pending one (counted in `students_count`).
pub async fn create_order(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppJson(req): AppJson<CreateOrderRequest>,
) -> Result<impl IntoResponse, AppError> {
    let gateway = gateway(&state)?;
    let student_id = claims.user_id()?;

    let price = sqlx::query_scalar::<_, i64>("SELECT price FROM courses WHERE id = $1")
        .bind(req.course_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Course not found".to_string()))?;

    if price <= 0 {
        return Err(AppError::BadRequest(
            "This course is free; enroll directly".to_string(),
        ));
    }

    let existing = sqlx::query_scalar::<_, String>(
        "SELECT status FROM enrollments WHERE student_id = $1 AND course_id = $2",
    )
    .bind(student_id)
    .bind(req.course_id)
    .fetch_optional(&state.pool)
    .await?;
    if existing.as_deref() == Some(EnrollmentStatus::Active.as_str()) {
        return Err(AppError::Conflict("Already enrolled in this course".to_string()));
    }

    let receipt = format!("c{}_s{}_{}", req.course_id, student_id, chrono::Utc::now().timestamp());
    let order = gateway.create_order(price, CURRENCY, &receipt).await?;

    let mut tx = state.pool.begin().await?;

    sqlx::query(
        "INSERT INTO payments (student_id, course_id, razorpay_order_id, amount, currency, status)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(student_id)
    .bind(req.course_id)
    .bind(&order.id)
    .bind(order.amount)
    .bind(&order.currency)
    .bind(PaymentStatus::Created.as_str())
    .execute(&mut *tx)
    .await?;

    if existing.is_none() {
        insert_enrollment(&mut *tx, student_id, req.course_id, EnrollmentStatus::Pending)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::Conflict("Enrollment is already being created".to_string())
                } else {
                    AppError::from(e)
                }
            })?;
    }

    tx.commit().await?;

    tracing::info!(
        student_id,
        course_id = req.course_id,
        order_id = %order.id,
        "Payment order created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateOrderResponse {
            order_id: order.id,
            amount: order.amount,
            currency: order.currency,
            key_id: gateway.key_id().to_string(),
        }),
    ))
}

/// Confirms a checkout. A valid signature marks the payment paid, activates
/// the enrollment and records the fee; an invalid one marks it failed.
pub async fn verify_payment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppJson(req): AppJson<VerifyPaymentRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let gateway = gateway(&state)?;
    let student_id = claims.user_id()?;

    let payment = sqlx::query_as::<_, Payment>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE razorpay_order_id = $1 AND student_id = $2"
    ))
    .bind(&req.razorpay_order_id)
    .bind(student_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Payment order not found".to_string()))?;

    if payment.status == PaymentStatus::Paid {
        return Err(AppError::Conflict("Payment already verified".to_string()));
    }

    if !gateway.verify_signature(
        &req.razorpay_order_id,
        &req.razorpay_payment_id,
        &req.razorpay_signature,
    ) {
        sqlx::query("UPDATE payments SET status = $1, razorpay_payment_id = $2 WHERE id = $3")
            .bind(PaymentStatus::Failed.as_str())
            .bind(&req.razorpay_payment_id)
            .bind(payment.id)
            .execute(&state.pool)
            .await?;
        tracing::warn!(payment_id = payment.id, "Payment signature mismatch");
        return Err(AppError::BadRequest("Invalid payment signature".to_string()));
    }

    let mut tx = state.pool.begin().await?;

    let updated = sqlx::query_as::<_, Payment>(&format!(
        "UPDATE payments SET status = $1, razorpay_payment_id = $2
         WHERE id = $3 AND status <> $1
         RETURNING {PAYMENT_COLUMNS}"
    ))
    .bind(PaymentStatus::Paid.as_str())
    .bind(&req.razorpay_payment_id)
    .bind(payment.id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::Conflict("Payment already verified".to_string()))?;

    let enrollment = activate_enrollment(&mut *tx, student_id, payment.course_id).await?;

    let course_fee = sqlx::query_scalar::<_, i64>("SELECT price FROM courses WHERE id = $1")
        .bind(payment.course_id)
        .fetch_one(&mut *tx)
        .await?;
    record_fee_payment(&mut *tx, student_id, payment.course_id, course_fee, payment.amount).await?;

    tx.commit().await?;

    tracing::info!(student_id, payment_id = updated.id, "Payment verified");

    Ok(Json(json!({
        "success": true,
        "message": "Payment verified",
        "payment": updated,
        "enrollment": enrollment
    })))
}

pub async fn my_payments(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let payments = sqlx::query_as::<_, Payment>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE student_id = $1 ORDER BY created_at DESC"
    ))
    .bind(claims.user_id()?)
    .fetch_all(&pool)
    .await?;

    Ok(Json(payments))
}

/// Admin only.
pub async fn list_payments(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let payments = sqlx::query_as::<_, Payment>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments ORDER BY created_at DESC"
    ))
    .fetch_all(&pool)
    .await?;

    Ok(Json(payments))
}
