use uuid::Uuid;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("No entity with id {0}")]
    NotFound(Uuid),

    #[error("{message}")]
    Conflict { message: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Map a write error to a remediation-oriented conflict where possible.
    /// Foreign-key violations surface as advice, not raw database errors.
    pub(crate) fn from_write(err: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(ref db) = err {
            if db.code().as_deref() == Some("23503") {
                return StoreError::Conflict {
                    message: format!(
                        "this {what} is referenced by an active record and cannot be \
                         deleted until it is unlinked"
                    ),
                };
            }
            if db.code().as_deref() == Some("23505") {
                return StoreError::Conflict {
                    message: format!("a {what} with this natural key already exists"),
                };
            }
        }
        StoreError::Database(err)
    }
}
