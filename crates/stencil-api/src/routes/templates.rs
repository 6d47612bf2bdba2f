//! Template management routes

use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    http::StatusCode,
    routing::get,
};
use bytes::Bytes;
use serde_json::json;
use stencil_auth::{RequireAdmin, RequireAuth};
use stencil_db::{NewImage, NewTemplate, UpdateTemplate};
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::extract::MultipartForm;
use crate::state::AppState;

use super::images::image_url;
use super::types::{ApiResponse, TemplateResponse};

/// Content types accepted for template images
const ALLOWED_IMAGE_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
];

/// Image part of a template form
struct UploadedImage {
    filename: Option<String>,
    content_type: String,
    data: Bytes,
}

/// Parsed multipart template form; blank parts count as absent
#[derive(Default)]
struct TemplateForm {
    title: Option<String>,
    description: Option<String>,
    image: Option<UploadedImage>,
}

impl TemplateForm {
    async fn parse(mut multipart: Multipart, max_image_size: usize) -> Result<Self, ApiError> {
        let mut form = TemplateForm::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "title" => form.title = non_blank(field.text().await?),
                "description" => form.description = non_blank(field.text().await?),
                "image" => {
                    let filename = field.file_name().map(str::to_string);
                    let declared = field.content_type().map(str::to_string);
                    let data = field.bytes().await?;
                    if data.is_empty() {
                        continue;
                    }
                    if data.len() > max_image_size {
                        return Err(ApiError::PayloadTooLarge(format!(
                            "Image exceeds maximum size of {} bytes",
                            max_image_size
                        )));
                    }
                    let content_type = resolve_content_type(declared, filename.as_deref());
                    form.image = Some(UploadedImage {
                        filename,
                        content_type,
                        data,
                    });
                }
                other => debug!("Ignoring unexpected form field: {}", other),
            }
        }

        if let Some(image) = &form.image
            && !ALLOWED_IMAGE_TYPES.contains(&image.content_type.as_str())
        {
            return Err(ApiError::BadRequest(
                "Invalid image file. Only JPEG, PNG, GIF, and WebP are allowed.".to_string(),
            ));
        }

        Ok(form)
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Use the declared part type, falling back to a guess from the filename
fn resolve_content_type(declared: Option<String>, filename: Option<&str>) -> String {
    declared
        .filter(|ct| !ct.is_empty() && ct != "application/octet-stream")
        .or_else(|| {
            filename
                .and_then(|name| mime_guess::from_path(name).first())
                .map(|mime| mime.essence_str().to_string())
        })
        .unwrap_or_else(|| "application/octet-stream".to_string())
        .to_lowercase()
}

fn parse_template_id(id: &str) -> Result<i64, ApiError> {
    id.parse()
        .map_err(|_| ApiError::BadRequest("Invalid template ID format".to_string()))
}

/// Store an uploaded image, returning its ID and public URL
async fn store_image(state: &AppState, image: UploadedImage) -> Result<(String, String), ApiError> {
    let id = state
        .db
        .insert_image(NewImage {
            filename: image.filename,
            content_type: image.content_type,
            data: image.data.to_vec(),
        })
        .await?;
    let url = image_url(&state.settings.public_url, &id);
    Ok((id, url))
}

/// Remove an image that no template references any more
async fn discard_image(state: &AppState, image_id: &str) {
    if let Err(e) = state.db.delete_image(image_id).await {
        warn!("Failed to delete orphaned image {}: {}", image_id, e);
    }
}

/// Drop a freshly stored image when the write meant to reference it failed
async fn release_on_failure<T>(
    state: &AppState,
    image_id: Option<&str>,
    result: Result<T, ApiError>,
) -> Result<T, ApiError> {
    if result.is_err()
        && let Some(image_id) = image_id
    {
        discard_image(state, image_id).await;
    }
    result
}

// ==================== Template Routes ====================

/// GET /api/templates (Authenticated)
async fn list_templates(
    _auth: RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Vec<TemplateResponse>>, ApiError> {
    let templates = state.db.list_templates().await?;
    Ok(Json(templates.into_iter().map(Into::into).collect()))
}

/// GET /api/templates/{id} (Authenticated)
async fn get_template(
    _auth: RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TemplateResponse>, ApiError> {
    let id = parse_template_id(&id)?;
    let template = state
        .db
        .get_template(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Template not found".to_string()))?;

    Ok(Json(template.into()))
}

/// POST /api/templates (Admin only)
async fn create_template(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    MultipartForm(multipart): MultipartForm,
) -> Result<(StatusCode, Json<ApiResponse>), ApiError> {
    let form = TemplateForm::parse(multipart, state.settings.max_image_size).await?;

    let title = form
        .title
        .ok_or_else(|| ApiError::BadRequest("Missing field: title".to_string()))?;
    let description = form
        .description
        .ok_or_else(|| ApiError::BadRequest("Missing field: description".to_string()))?;
    let image = form
        .image
        .ok_or_else(|| ApiError::BadRequest("Missing field: image".to_string()))?;

    debug!("Creating template '{}' for {}", title, admin.email);

    let (image_id, url) = store_image(&state, image).await?;

    let inserted = state
        .db
        .insert_template(NewTemplate {
            title,
            description,
            image_url: Some(url),
            image_id: Some(image_id.clone()),
            created_by: admin.id,
        })
        .await
        .map_err(ApiError::from);
    let template = release_on_failure(&state, Some(image_id.as_str()), inserted).await?;

    info!("Created template {} ({})", template.id, template.title);

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_data(
            "Template created successfully",
            json!({ "template_id": template.id }),
        )),
    ))
}

/// PUT /api/templates/{id} (Admin only)
async fn update_template(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
    MultipartForm(multipart): MultipartForm,
) -> Result<Json<ApiResponse>, ApiError> {
    let id = parse_template_id(&id)?;
    debug!("Updating template {} for {}", id, admin.email);

    let existing = state
        .db
        .get_template(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Template not found".to_string()))?;

    let form = TemplateForm::parse(multipart, state.settings.max_image_size).await?;

    let mut update = UpdateTemplate {
        title: form.title,
        description: form.description,
        ..Default::default()
    };
    if let Some(image) = form.image {
        let (image_id, url) = store_image(&state, image).await?;
        update.image_id = Some(image_id);
        update.image_url = Some(url);
    }
    let new_image_id = update.image_id.clone();

    let result = state
        .db
        .update_template(id, update)
        .await
        .map_err(ApiError::from)
        .and_then(|updated| {
            updated.ok_or_else(|| ApiError::NotFound("Template not found".to_string()))
        });
    release_on_failure(&state, new_image_id.as_deref(), result).await?;

    if let Some(new_image_id) = new_image_id
        && let Some(old) = existing.image_id
        && old != new_image_id
    {
        discard_image(&state, &old).await;
    }

    info!("Updated template {}", id);
    Ok(Json(ApiResponse::ok("Template updated successfully")))
}

/// DELETE /api/templates/{id} (Admin only)
async fn delete_template(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse>, ApiError> {
    let id = parse_template_id(&id)?;
    debug!("Deleting template {} for {}", id, admin.email);

    let deleted = state
        .db
        .delete_template(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Template not found".to_string()))?;

    if let Some(image_id) = deleted.image_id {
        discard_image(&state, &image_id).await;
    }

    info!("Deleted template {}", id);
    Ok(Json(ApiResponse::ok("Template deleted successfully")))
}

/// Create template routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/templates", get(list_templates).post(create_template))
        .route(
            "/api/templates/{id}",
            get(get_template).put(update_template).delete(delete_template),
        )
}
