//! Template operations

use chrono::Utc;
use sqlx::Row;

use crate::error::DbError;
use crate::models::{NewTemplate, Template, UpdateTemplate};

use super::Database;

impl Database {
    /// Insert a new template
    pub async fn insert_template(&self, template: NewTemplate) -> Result<Template, DbError> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO templates (title, description, image_url, image_id, created_by, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&template.title)
        .bind(&template.description)
        .bind(&template.image_url)
        .bind(&template.image_id)
        .bind(template.created_by)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .fetch_one(&self.pool)
        .await?;

        Ok(Template {
            id: result.get("id"),
            title: template.title,
            description: template.description,
            image_url: template.image_url,
            image_id: template.image_id,
            created_by: template.created_by,
            created_at: now,
            updated_at: now,
        })
    }

    /// Get a template by ID
    pub async fn get_template(&self, id: i64) -> Result<Option<Template>, DbError> {
        let result = sqlx::query(
            r#"
            SELECT id, title, description, image_url, image_id, created_by, created_at, updated_at
            FROM templates
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        result.map(|row| Template::try_from(&row).map_err(DbError::from)).transpose()
    }

    /// List all templates, newest first
    pub async fn list_templates(&self) -> Result<Vec<Template>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, description, image_url, image_id, created_by, created_at, updated_at
            FROM templates
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| Template::try_from(row).map_err(DbError::from))
            .collect()
    }

    /// Apply a partial update; unset fields keep their stored value
    ///
    /// Returns `None` when no template has the given ID.
    pub async fn update_template(
        &self,
        id: i64,
        update: UpdateTemplate,
    ) -> Result<Option<Template>, DbError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE templates
            SET title = COALESCE(?, title),
                description = COALESCE(?, description),
                image_url = COALESCE(?, image_url),
                image_id = COALESCE(?, image_id),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&update.title)
        .bind(&update.description)
        .bind(&update.image_url)
        .bind(&update.image_id)
        .bind(now.to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_template(id).await
    }

    /// Delete a template, returning the removed row
    pub async fn delete_template(&self, id: i64) -> Result<Option<Template>, DbError> {
        let result = sqlx::query(
            r#"
            DELETE FROM templates
            WHERE id = ?
            RETURNING id, title, description, image_url, image_id, created_by, created_at, updated_at
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        result.map(|row| Template::try_from(&row).map_err(DbError::from)).transpose()
    }
}
