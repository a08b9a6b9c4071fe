// src/models/study_material.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Metadata of a row in 'study_materials'. The PDF bytes are only read on download.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyMaterial {
    pub id: i64,
    pub course_id: Option<i64>,
    pub title: String,
    pub description: String,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i32,
    pub uploaded_by: Option<i64>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, FromRow)]
pub struct MaterialFile {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialQuery {
    pub course_id: Option<i64>,
}
