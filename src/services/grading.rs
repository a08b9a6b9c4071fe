//! Test scoring.
//!
//! MCQ grading is deterministic. Subjective answers go to an `Evaluator`;
//! any evaluator failure is replaced with a fallback so a submission always
//! completes.

use crate::{
    models::{
        test::{Question, QuestionType},
        test_result::{GradedAnswer, ResultStatus, SubmittedAnswer},
    },
    services::evaluator::{Evaluator, SubjectiveEvaluation},
};

pub const EXPLANATION_FALLBACK: &str = "Explanation is not available at the moment.";
pub const FEEDBACK_FALLBACK: &str =
    "Automatic evaluation is unavailable right now. Your answer has been saved for review.";
pub const BLANK_ANSWER_FEEDBACK: &str = "No answer was provided.";

/// Evaluator score at or above which a subjective answer is shown as correct.
pub const SUBJECTIVE_CORRECT_THRESHOLD: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub obtained_marks: f64,
    pub percentage: f64,
    pub status: ResultStatus,
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Grades one MCQ answer. The explanation is filled in separately.
pub fn grade_mcq(index: usize, question: &Question, selected: Option<usize>) -> GradedAnswer {
    let is_correct = selected.is_some() && selected == question.correct_answer;
    GradedAnswer {
        question_index: index,
        question_type: QuestionType::Mcq,
        selected_answer: selected,
        text_answer: None,
        correct_answer: question.correct_answer,
        is_correct,
        marks_obtained: if is_correct { question.marks } else { 0.0 },
        max_marks: question.marks,
        explanation: None,
        ai_score: None,
        feedback: None,
        suggestions: Vec::new(),
    }
}

/// Scales a 0–10 evaluator score to the question's marks.
pub fn subjective_marks(score: f64, question_marks: f64) -> f64 {
    (score.clamp(0.0, 10.0) / 10.0) * question_marks
}

pub fn grade_subjective(
    index: usize,
    question: &Question,
    answer: Option<String>,
    evaluation: SubjectiveEvaluation,
) -> GradedAnswer {
    GradedAnswer {
        question_index: index,
        question_type: QuestionType::Subjective,
        selected_answer: None,
        text_answer: answer,
        correct_answer: None,
        is_correct: evaluation.score >= SUBJECTIVE_CORRECT_THRESHOLD,
        marks_obtained: subjective_marks(evaluation.score, question.marks),
        max_marks: question.marks,
        explanation: question.explanation.clone(),
        ai_score: Some(evaluation.score),
        feedback: Some(evaluation.feedback),
        suggestions: evaluation.suggestions,
    }
}

/// Grades every question against the index-aligned answers.
/// Missing answers count as unanswered.
pub async fn grade_submission(
    questions: &[Question],
    answers: &[SubmittedAnswer],
    evaluator: &dyn Evaluator,
) -> Vec<GradedAnswer> {
    let mut graded = Vec::with_capacity(questions.len());

    for (index, question) in questions.iter().enumerate() {
        let answer = answers.get(index).cloned().unwrap_or_default();

        match question.question_type {
            QuestionType::Mcq => {
                let mut outcome = grade_mcq(index, question, answer.selected_answer);
                outcome.explanation = Some(match &question.explanation {
                    Some(authored) if !authored.trim().is_empty() => authored.clone(),
                    _ => match evaluator.explain_mcq(question).await {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::warn!("Explanation fallback for question {}: {}", index, e);
                            EXPLANATION_FALLBACK.to_string()
                        }
                    },
                });
                graded.push(outcome);
            }
            QuestionType::Subjective => {
                let text = answer
                    .text_answer
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty());

                let evaluation = match &text {
                    None => SubjectiveEvaluation {
                        score: 0.0,
                        feedback: BLANK_ANSWER_FEEDBACK.to_string(),
                        suggestions: Vec::new(),
                    },
                    Some(t) => match evaluator.evaluate_subjective(question, t).await {
                        Ok(eval) => eval,
                        Err(e) => {
                            tracing::warn!("Evaluation fallback for question {}: {}", index, e);
                            SubjectiveEvaluation {
                                score: 0.0,
                                feedback: FEEDBACK_FALLBACK.to_string(),
                                suggestions: Vec::new(),
                            }
                        }
                    },
                };

                graded.push(grade_subjective(index, question, text, evaluation));
            }
        }
    }

    graded
}

/// Aggregates graded answers. `passing_marks` is compared against the percentage.
pub fn summarize(graded: &[GradedAnswer], total_marks: f64, passing_marks: f64) -> Summary {
    let obtained_marks: f64 = graded.iter().map(|g| g.marks_obtained).sum();
    let percentage = if total_marks > 0.0 {
        round2(obtained_marks / total_marks * 100.0)
    } else {
        0.0
    };
    let status = if percentage >= passing_marks {
        ResultStatus::Passed
    } else {
        ResultStatus::Failed
    };

    Summary {
        obtained_marks,
        percentage,
        status,
    }
}
