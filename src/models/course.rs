// src/models/course.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::utils::validation::validate_media_url;

/// Represents the 'courses' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    /// Price in paise. Zero means free.
    pub price: i64,
    /// Externally hosted image URL.
    pub thumbnail_url: Option<String>,
    pub educator_id: i64,
    /// Denormalized count maintained by enrollment create/delete.
    pub students_count: i32,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CourseQuery {
    pub category: Option<String>,
    pub q: Option<String>,
}

/// DTO for creating or replacing a course.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpsertCourseRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 20000))]
    pub description: String,
    #[validate(length(min = 1, max = 50))]
    pub category: String,
    #[validate(range(min = 0))]
    pub price: i64,
    #[validate(length(max = 500), custom(function = validate_media_url))]
    pub thumbnail_url: Option<String>,
}
