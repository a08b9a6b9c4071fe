// src/models/enrollment.rs

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::ParseEnumError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    /// Waiting for payment.
    Pending,
    Active,
    Cancelled,
}

impl EnrollmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentStatus::Pending => "pending",
            EnrollmentStatus::Active => "active",
            EnrollmentStatus::Cancelled => "cancelled",
        }
    }

    /// Free courses are usable immediately; paid ones wait for payment.
    pub fn initial_for_price(price: i64) -> Self {
        if price > 0 {
            EnrollmentStatus::Pending
        } else {
            EnrollmentStatus::Active
        }
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnrollmentStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(EnrollmentStatus::Pending),
            "active" => Ok(EnrollmentStatus::Active),
            "cancelled" => Ok(EnrollmentStatus::Cancelled),
            other => Err(ParseEnumError {
                kind: "enrollment status",
                value: other.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for EnrollmentStatus {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Represents the 'enrollments' table. Unique per (student, course).
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub id: i64,
    pub student_id: i64,
    pub course_id: i64,
    #[sqlx(try_from = "String")]
    pub status: EnrollmentStatus,
    pub enrolled_at: chrono::DateTime<chrono::Utc>,
}

/// Enrollment joined with its course title, for "my courses" views.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentWithCourse {
    pub id: i64,
    pub student_id: i64,
    pub course_id: i64,
    pub course_title: String,
    #[sqlx(try_from = "String")]
    pub status: EnrollmentStatus,
    pub enrolled_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEnrollmentRequest {
    pub course_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paid_courses_start_pending() {
        assert_eq!(EnrollmentStatus::initial_for_price(49900), EnrollmentStatus::Pending);
        assert_eq!(EnrollmentStatus::initial_for_price(0), EnrollmentStatus::Active);
    }
}
