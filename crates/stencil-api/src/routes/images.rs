//! Image serving

use axum::{
    Router,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Public URL under which an image is served
pub fn image_url(public_url: &str, image_id: &str) -> String {
    format!("{}/api/images/{}", public_url.trim_end_matches('/'), image_id)
}

/// GET /api/images/{image_id}
async fn get_image(
    State(state): State<AppState>,
    Path(image_id): Path<String>,
) -> Result<Response, ApiError> {
    let image_id = Uuid::parse_str(&image_id)
        .map_err(|_| ApiError::BadRequest("Invalid image ID format".to_string()))?
        .to_string();

    let image = state
        .db
        .get_image(&image_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Image not found".to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, image.content_type),
            (header::CACHE_CONTROL, "public, max-age=86400".to_string()),
        ],
        image.data,
    )
        .into_response())
}

/// Create image routes
pub fn routes() -> Router<AppState> {
    Router::new().route("/api/images/{image_id}", get(get_image))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{TestApp, json_request};
    use axum::http::{Method, StatusCode};
    use stencil_db::NewImage;

    #[test]
    fn test_image_url() {
        assert_eq!(
            image_url("http://localhost:8000/", "abc"),
            "http://localhost:8000/api/images/abc"
        );
        assert_eq!(
            image_url("https://cdn.example.com", "abc"),
            "https://cdn.example.com/api/images/abc"
        );
    }

    #[tokio::test]
    async fn test_serve_image() {
        let app = TestApp::new().await;
        let id = app
            .state
            .db
            .insert_image(NewImage {
                filename: Some("a.webp".to_string()),
                content_type: "image/webp".to_string(),
                data: b"RIFF0000WEBP".to_vec(),
            })
            .await
            .unwrap();

        let response = app
            .raw(json_request(Method::GET, &format!("/api/images/{}", id), None, serde_json::Value::Null))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/webp");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"RIFF0000WEBP");
    }

    #[tokio::test]
    async fn test_image_errors() {
        let app = TestApp::new().await;

        let (status, body) = app
            .send(json_request(Method::GET, "/api/images/not-a-uuid", None, serde_json::Value::Null))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Invalid image ID format");

        let (status, _) = app
            .send(json_request(
                Method::GET,
                &format!("/api/images/{}", Uuid::new_v4()),
                None,
                serde_json::Value::Null,
            ))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
