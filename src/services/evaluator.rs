//! AI-backed explanation and subjective-answer scoring.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::{error::AppError, models::test::Question};

/// Score out of 10 plus written feedback for a subjective answer.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectiveEvaluation {
    pub score: f64,
    pub feedback: String,
    pub suggestions: Vec<String>,
}

/// External grader. Callers treat every error as "use the fallback".
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Explains why the correct option of an MCQ is correct.
    async fn explain_mcq(&self, question: &Question) -> Result<String, AppError>;

    async fn evaluate_subjective(
        &self,
        question: &Question,
        answer: &str,
    ) -> Result<SubjectiveEvaluation, AppError>;
}

/// Used when no API key is configured.
pub struct NoopEvaluator;

#[async_trait]
impl Evaluator for NoopEvaluator {
    async fn explain_mcq(&self, _question: &Question) -> Result<String, AppError> {
        Err(AppError::Upstream("AI evaluation is not configured".to_string()))
    }

    async fn evaluate_subjective(
        &self,
        _question: &Question,
        _answer: &str,
    ) -> Result<SubjectiveEvaluation, AppError> {
        Err(AppError::Upstream("AI evaluation is not configured".to_string()))
    }
}

#[derive(Clone)]
pub struct GeminiEvaluator {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct RawEvaluation {
    score: f64,
    #[serde(default)]
    feedback: String,
    #[serde(default)]
    suggestions: Vec<String>,
}

impl GeminiEvaluator {
    pub fn new(api_key: String, model: String) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_key,
            model,
        })
    }

    async fn generate(&self, prompt: &str) -> Result<String, AppError> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        );
        let payload = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": { "temperature": 0.2 }
        });

        let resp = self
            .client
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Gemini request failed: {}", e)))?;

        if !resp.status().is_success() {
            return Err(AppError::Upstream(format!(
                "Gemini returned status {}",
                resp.status()
            )));
        }

        let body: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Gemini response unreadable: {}", e)))?;

        body.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Upstream("Gemini returned no text".to_string()))
    }
}

#[async_trait]
impl Evaluator for GeminiEvaluator {
    async fn explain_mcq(&self, question: &Question) -> Result<String, AppError> {
        let correct = question
            .correct_answer
            .and_then(|i| question.options.get(i))
            .map(String::as_str)
            .unwrap_or("");
        let prompt = format!(
            "Question: {}\nOptions: {}\nCorrect answer: {}\n\
             In at most three sentences, explain to a student why the correct answer is right.",
            question.question,
            question.options.join(" | "),
            correct
        );
        self.generate(&prompt).await
    }

    async fn evaluate_subjective(
        &self,
        question: &Question,
        answer: &str,
    ) -> Result<SubjectiveEvaluation, AppError> {
        let prompt = format!(
            "You are grading a student's written answer.\n\
             Question: {}\nStudent answer: {}\n\
             Reply with only a JSON object: \
             {{\"score\": <number 0-10>, \"feedback\": <string>, \"suggestions\": [<string>]}}",
            question.question, answer
        );
        let text = self.generate(&prompt).await?;
        parse_evaluation(&text)
    }
}

/// Pulls the JSON object out of a model reply, which may be wrapped in prose or code fences.
pub fn parse_evaluation(text: &str) -> Result<SubjectiveEvaluation, AppError> {
    let start = text.find('{');
    let end = text.rfind('}');
    let json = match (start, end) {
        (Some(s), Some(e)) if s < e => &text[s..=e],
        _ => return Err(AppError::Upstream("Evaluation reply had no JSON".to_string())),
    };

    let raw: RawEvaluation = serde_json::from_str(json)
        .map_err(|e| AppError::Upstream(format!("Evaluation reply malformed: {}", e)))?;

    if !raw.score.is_finite() {
        return Err(AppError::Upstream("Evaluation score is not a number".to_string()));
    }

    Ok(SubjectiveEvaluation {
        score: raw.score.clamp(0.0, 10.0),
        feedback: raw.feedback,
        suggestions: raw.suggestions,
    })
}
