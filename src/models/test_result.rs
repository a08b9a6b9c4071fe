// src/models/test_result.rs

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use validator::Validate;

use super::{ParseEnumError, test::QuestionType, user::UserSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Passed,
    Failed,
}

impl ResultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultStatus::Passed => "passed",
            ResultStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResultStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "passed" => Ok(ResultStatus::Passed),
            "failed" => Ok(ResultStatus::Failed),
            other => Err(ParseEnumError {
                kind: "result status",
                value: other.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for ResultStatus {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Grading outcome for a single question, stored in `test_results.answers`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradedAnswer {
    pub question_index: usize,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_answer: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<usize>,
    pub is_correct: bool,
    pub marks_obtained: f64,
    pub max_marks: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    /// Evaluator score out of 10, subjective questions only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

/// Represents the 'test_results' table. Unique per (test, student).
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub id: i64,
    pub test_id: i64,
    pub student_id: i64,
    pub answers: Json<Vec<GradedAnswer>>,
    pub total_marks: f64,
    pub obtained_marks: f64,
    pub percentage: f64,
    #[sqlx(try_from = "String")]
    pub status: ResultStatus,
    pub time_taken: i32,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TestInfo {
    pub id: i64,
    pub title: String,
    pub total_marks: f64,
    pub passing_marks: f64,
}

/// A result with its test and student populated.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulatedResult {
    #[serde(flatten)]
    pub result: TestResult,
    pub test: TestInfo,
    pub student: UserSummary,
}

/// One submitted answer, index-aligned with the test's questions.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedAnswer {
    pub selected_answer: Option<usize>,
    pub text_answer: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitTestRequest {
    #[validate(length(max = 500))]
    pub answers: Vec<SubmittedAnswer>,
    /// Seconds spent on the attempt.
    #[serde(default)]
    #[validate(range(min = 0))]
    pub time_taken: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultQuery {
    pub student_id: Option<i64>,
}
