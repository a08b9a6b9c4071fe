// src/models/attendance.rs

use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::ParseEnumError;

/// Which side of the day a token marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TokenType {
    In,
    Out,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::In => "IN",
            TokenType::Out => "OUT",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IN" => Ok(TokenType::In),
            "OUT" => Ok(TokenType::Out),
            other => Err(ParseEnumError {
                kind: "attendance token type",
                value: other.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for TokenType {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Represents the 'attendance_tokens' table.
/// A short-lived, single-use QR payload issued to a student.
#[derive(Debug, Clone, FromRow)]
pub struct AttendanceToken {
    pub id: i64,
    pub student_id: i64,
    #[sqlx(rename = "type", try_from = "String")]
    pub kind: TokenType,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
}

/// Represents the 'attendance' table: one row per student per local day.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendance {
    pub id: i64,
    pub student_id: i64,
    pub teacher_id: Option<i64>,
    pub date: NaiveDate,
    pub in_time: Option<DateTime<Utc>>,
    pub out_time: Option<DateTime<Utc>>,
}

/// Attendance row joined with the student's name, for staff listings.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceWithStudent {
    pub id: i64,
    pub student_id: i64,
    pub student_name: String,
    pub teacher_id: Option<i64>,
    pub date: NaiveDate,
    pub in_time: Option<DateTime<Utc>>,
    pub out_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateTokenRequest {
    #[serde(rename = "type")]
    pub kind: TokenType,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateTokenResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: TokenType,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ScanRequest {
    #[validate(length(min = 1, max = 128, message = "Token is required."))]
    pub token: String,
}

/// Filters for the staff attendance listing.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceQuery {
    pub date: Option<NaiveDate>,
    pub student_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_type_uses_uppercase_on_the_wire() {
        let req: GenerateTokenRequest = serde_json::from_str(r#"{"type":"OUT"}"#).unwrap();
        assert_eq!(req.kind, TokenType::Out);
        assert!(serde_json::from_str::<GenerateTokenRequest>(r#"{"type":"in"}"#).is_err());
        assert_eq!(serde_json::to_string(&TokenType::In).unwrap(), "\"IN\"");
    }
}
