//! User operations

use chrono::Utc;
use sqlx::Row;

use crate::error::DbError;
use crate::models::{NewUser, User};
use crate::repository::Database;

impl Database {
    // ==================== User Operations ====================

    /// Insert a new user
    ///
    /// Fails with [`DbError::Duplicate`] when the email is already registered.
    pub async fn insert_user(&self, user: NewUser) -> Result<User, DbError> {
        let now = Utc::now();

        if self.get_user_by_email(&user.email).await?.is_some() {
            return Err(DbError::Duplicate(format!(
                "User '{}' already exists",
                user.email
            )));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO users (email, username, password_hash, role, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(now.to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            // Lost a race against a concurrent registration
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                DbError::Duplicate(format!("User '{}' already exists", user.email))
            }
            other => DbError::Query(other),
        })?;

        let id: i64 = result.get("id");

        Ok(User {
            id,
            email: user.email,
            username: user.username,
            password_hash: user.password_hash,
            role: user.role,
            created_at: now,
        })
    }

    /// Get a user by email
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
        let result = sqlx::query(
            r#"
            SELECT id, email, username, password_hash, role, created_at
            FROM users
            WHERE email = ?
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        result.map(|row| User::try_from(&row).map_err(DbError::from)).transpose()
    }

    /// Get a user by ID
    pub async fn get_user_by_id(&self, id: i64) -> Result<Option<User>, DbError> {
        let result = sqlx::query(
            r#"
            SELECT id, email, username, password_hash, role, created_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        result.map(|row| User::try_from(&row).map_err(DbError::from)).transpose()
    }

    /// Check if any users exist
    pub async fn has_users(&self) -> Result<bool, DbError> {
        let result = sqlx::query("SELECT COUNT(*) as count FROM users")
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = result.get("count");
        Ok(count > 0)
    }
}
