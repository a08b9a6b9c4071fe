// src/models/fee_status.rs

use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::ParseEnumError;

/// How much of a course fee has been paid; see [`derive_fee_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeState {
    Pending,
    Partial,
    Paid,
}

impl FeeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeeState::Pending => "pending",
            FeeState::Partial => "partial",
            FeeState::Paid => "paid",
        }
    }
}

impl fmt::Display for FeeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeeState {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(FeeState::Pending),
            "partial" => Ok(FeeState::Partial),
            "paid" => Ok(FeeState::Paid),
            other => Err(ParseEnumError {
                kind: "fee status",
                value: other.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for FeeState {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Represents the 'student_fee_status' table. Unique per (student, course).
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeStatus {
    pub id: i64,
    pub student_id: i64,
    pub course_id: i64,
    pub total_fee: i64,
    pub paid_amount: i64,
    pub due_date: Option<NaiveDate>,
    #[sqlx(try_from = "String")]
    pub status: FeeState,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpsertFeeStatusRequest {
    pub student_id: i64,
    pub course_id: i64,
    #[validate(range(min = 0))]
    pub total_fee: i64,
    #[validate(range(min = 0))]
    pub paid_amount: i64,
    pub due_date: Option<NaiveDate>,
}

pub fn derive_fee_status(total_fee: i64, paid_amount: i64) -> FeeState {
    if paid_amount >= total_fee {
        FeeState::Paid
    } else if paid_amount > 0 {
        FeeState::Partial
    } else {
        FeeState::Pending
    }
}
