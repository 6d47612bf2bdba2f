//! Database error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Query(#[from] sqlx::Error),

    #[error("Duplicate entry: {0}")]
    Duplicate(String),
}

impl DbError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, DbError::Duplicate(_))
    }
}
