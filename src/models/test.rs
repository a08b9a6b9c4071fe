// src/models/test.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    Mcq,
    Subjective,
}

/// One question of a test. Stored inside `tests.questions` as JSONB.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[serde(rename = "type")]
    pub question_type: QuestionType,

    pub question: String,

    /// Choices for MCQ questions; empty for subjective ones.
    #[serde(default)]
    pub options: Vec<String>,

    /// Index into `options`. Required for MCQ.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<usize>,

    pub marks: f64,

    /// Authored explanation; generated on demand when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl Question {
    /// Copy safe to show a student before submission.
    pub fn redacted(&self) -> Self {
        Self {
            correct_answer: None,
            explanation: None,
            ..self.clone()
        }
    }
}

/// Represents the 'tests' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Test {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub course_id: Option<i64>,
    pub questions: Json<Vec<Question>>,
    pub duration_minutes: i32,
    pub passing_marks: f64,
    pub total_marks: f64,
    pub created_by: Option<i64>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Listing projection without the question bodies.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSummary {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub course_id: Option<i64>,
    pub duration_minutes: i32,
    pub passing_marks: f64,
    pub total_marks: f64,
    pub question_count: i64,
}

/// DTO for creating or replacing a test.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpsertTestRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub description: String,
    pub course_id: Option<i64>,
    #[validate(custom(function = validate_questions))]
    pub questions: Vec<Question>,
    #[validate(range(min = 1, max = 600))]
    pub duration: i32,
    #[validate(range(min = 0.0, max = 100.0))]
    pub passing_marks: f64,
}

/// Derived total: the sum of every question's marks.
pub fn total_marks(questions: &[Question]) -> f64 {
    questions.iter().map(|q| q.marks).sum()
}

fn validate_questions(questions: &[Question]) -> Result<(), ValidationError> {
    if questions.is_empty() {
        return Err(ValidationError::new("questions_cannot_be_empty"));
    }
    for q in questions {
        if q.question.trim().is_empty() || q.question.len() > 5000 {
            return Err(ValidationError::new("invalid_question_text"));
        }
        if !(q.marks > 0.0) {
            return Err(ValidationError::new("marks_must_be_positive"));
        }
        if q.question_type == QuestionType::Mcq {
            if q.options.len() < 2 {
                return Err(ValidationError::new("mcq_needs_two_options"));
            }
            match q.correct_answer {
                Some(idx) if idx < q.options.len() => {}
                _ => return Err(ValidationError::new("mcq_correct_answer_out_of_range")),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mcq(marks: f64, correct: Option<usize>) -> Question {
        Question {
            question_type: QuestionType::Mcq,
            question: "2 + 2 = ?".to_string(),
            options: vec!["3".to_string(), "4".to_string()],
            correct_answer: correct,
            marks,
            explanation: Some("Basic arithmetic".to_string()),
        }
    }

    #[test]
    fn total_marks_is_sum_of_question_marks() {
        assert_eq!(total_marks(&[mcq(1.0, Some(0)), mcq(2.5, Some(1))]), 3.5);
        assert_eq!(total_marks(&[]), 0.0);
    }

    #[test]
    fn mcq_correct_answer_must_index_an_option() {
        assert!(validate_questions(&[mcq(1.0, Some(1))]).is_ok());
        assert!(validate_questions(&[mcq(1.0, Some(2))]).is_err());
        assert!(validate_questions(&[mcq(1.0, None)]).is_err());
        assert!(validate_questions(&[mcq(0.0, Some(0))]).is_err());
        assert!(validate_questions(&[]).is_err());
    }

    #[test]
    fn redacted_question_hides_answer_key() {
        let q = mcq(1.0, Some(1)).redacted();
        let json = serde_json::to_value(&q).unwrap();
        assert!(json.get("correctAnswer").is_none());
        assert!(json.get("explanation").is_none());
        assert_eq!(json["type"], "mcq");
    }

    #[test]
    fn question_parses_camel_case_payload() {
        let q: Question = serde_json::from_str(
            r#"{"type":"subjective","question":"Explain ownership","marks":5}"#,
        )
        .unwrap();
        assert_eq!(q.question_type, QuestionType::Subjective);
        assert!(q.options.is_empty());
        assert!(q.correct_answer.is_none());
    }
}
