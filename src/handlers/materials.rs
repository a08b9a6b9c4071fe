// src/handlers/materials.rs

use axum::{
    Extension, Json,
    body::Body,
    extract::{Multipart, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use axum::extract::multipart::MultipartError;
use sqlx::PgPool;

use crate::{
    config::MAX_MATERIAL_BYTES,
    error::AppError,
    models::study_material::{MaterialFile, MaterialQuery, StudyMaterial},
    utils::{
        extract::{AppPath, AppQuery},
        jwt::Claims,
    },
};

const MATERIAL_COLUMNS: &str = "id, course_id, title, description, file_name, content_type, \
                                octet_length(data)::INT AS size_bytes, uploaded_by, created_at";
const PDF: &str = "application/pdf";

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::BadRequest("File exceeds the 10 MB limit".to_string())
    } else {
        AppError::BadRequest(format!("Invalid upload: {}", e.body_text()))
    }
}

#[derive(Default)]
struct UploadForm {
    title: Option<String>,
    description: String,
    course_id: Option<i64>,
    file: Option<(String, Vec<u8>)>,
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => form.title = Some(field.text().await.map_err(multipart_error)?),
            "description" => form.description = field.text().await.map_err(multipart_error)?,
            "courseId" => {
                let raw = field.text().await.map_err(multipart_error)?;
                let raw = raw.trim();
                if !raw.is_empty() {
                    form.course_id = Some(raw.parse().map_err(|_| {
                        AppError::BadRequest("courseId must be a number".to_string())
                    })?);
                }
            }
            "file" => {
                if field.content_type() != Some(PDF) {
                    return Err(AppError::BadRequest("Only PDF files are allowed".to_string()));
                }
                let file_name = field.file_name().unwrap_or("material.pdf").to_string();
                let data = field.bytes().await.map_err(multipart_error)?;
                if data.len() > MAX_MATERIAL_BYTES {
                    return Err(AppError::BadRequest("File exceeds the 10 MB limit".to_string()));
                }
                form.file = Some((file_name, data.to_vec()));
            }
            _ => {}
        }
    }

    Ok(form)
}

/// Uploads a PDF study material, stored inline in the database.
pub async fn upload_material(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let form = read_form(multipart).await?;

    let title = form
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::BadRequest("Title is required".to_string()))?;
    let (file_name, data) = form
        .file
        .ok_or_else(|| AppError::BadRequest("A PDF file is required".to_string()))?;

    let material = sqlx::query_as::<_, StudyMaterial>(&format!(
        "INSERT INTO study_materials
            (course_id, title, description, file_name, content_type, data, uploaded_by)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING {MATERIAL_COLUMNS}"
    ))
    .bind(form.course_id)
    .bind(&title)
    .bind(form.description.trim())
    .bind(&file_name)
    .bind(PDF)
    .bind(&data)
    .bind(claims.user_id()?)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(db) = &e {
            if db.is_foreign_key_violation() {
                return AppError::BadRequest("Unknown course".to_string());
            }
        }
        tracing::error!("Failed to store material: {:?}", e);
        AppError::from(e)
    })?;

    tracing::info!(material_id = material.id, size = material.size_bytes, "Material uploaded");

    Ok((StatusCode::CREATED, Json(material)))
}

pub async fn list_materials(
    State(pool): State<PgPool>,
    AppQuery(query): AppQuery<MaterialQuery>,
) -> Result<impl IntoResponse, AppError> {
    let materials = sqlx::query_as::<_, StudyMaterial>(&format!(
        "SELECT {MATERIAL_COLUMNS} FROM study_materials
         WHERE ($1::BIGINT IS NULL OR course_id = $1)
         ORDER BY created_at DESC"
    ))
    .bind(query.course_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(materials))
}

pub async fn download_material(
    State(pool): State<PgPool>,
    AppPath(id): AppPath<i64>,
) -> Result<Response, AppError> {
    let file = sqlx::query_as::<_, MaterialFile>(
        "SELECT file_name, content_type, data FROM study_materials WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Material not found".to_string()))?;

    // Quotes would break the header value.
    let file_name = file.file_name.replace('"', "");

    Response::builder()
        .header(header::CONTENT_TYPE, file.content_type)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", file_name),
        )
        .body(Body::from(file.data))
        .map_err(|e| AppError::InternalServerError(e.to_string()))
}

pub async fn delete_material(
    State(pool): State<PgPool>,
    AppPath(id): AppPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM study_materials WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Material not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
