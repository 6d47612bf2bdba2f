//! Image operations

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbError;
use crate::models::{Image, NewImage};

use super::Database;

impl Database {
    /// Store an image and return its generated ID
    pub async fn insert_image(&self, image: NewImage) -> Result<String, DbError> {
        let id = Uuid::new_v4().to_string();
        debug!("Storing image {} ({} bytes)", id, image.data.len());

        sqlx::query(
            r#"
            INSERT INTO images (id, filename, content_type, data, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&image.filename)
        .bind(&image.content_type)
        .bind(&image.data)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    /// Get an image by ID
    pub async fn get_image(&self, id: &str) -> Result<Option<Image>, DbError> {
        let result = sqlx::query(
            r#"
            SELECT id, filename, content_type, data, created_at
            FROM images
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        result.map(|row| Image::try_from(&row).map_err(DbError::from)).transpose()
    }

    /// Delete an image
    pub async fn delete_image(&self, id: &str) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM images WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
