/// Common error type for ToDo access, sharing and mutation
///
/// Every variant except `Database` is an expected, recoverable outcome that
/// the presentation layer turns into user-facing text. `Database` carries
/// storage faults through untouched.
///
/// # Example
///
/// ```no_run
/// use todoshare_shared::auth::authorization::resolve_access;
/// use todoshare_shared::error::TodoError;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// match resolve_access(&pool, 1, 42).await {
///     Ok((todo, level)) => println!("{} ({})", todo.title, level.as_str()),
///     Err(err) if err.is_access_error() => println!("redirect home"),
///     Err(err) => return Err(err.into()),
/// }
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use validator::ValidationErrors;

/// Result alias used throughout the core
pub type TodoResult<T> = Result<T, TodoError>;

/// Errors returned by the core operations
#[derive(Debug, thiserror::Error)]
pub enum TodoError {
    /// The ToDo or Task id does not exist
    #[error("Resource not found")]
    NotFound,

    /// The resource exists but the caller has no access to it
    #[error("Not authorized to access this resource")]
    Forbidden,

    /// The caller can view the resource but the operation needs more
    #[error("Insufficient access for this operation")]
    InsufficientAccess,

    /// A uniqueness rule was violated on create or update
    #[error("An identical item already exists")]
    Duplicate,

    /// Owner tried to share a ToDo with themselves
    #[error("Cannot share a ToDo with its owner")]
    SelfShare,

    /// Share target username does not exist
    #[error("Unknown user: {0}")]
    UnknownUser(String),

    /// A grant for this user and ToDo already exists
    #[error("ToDo is already shared with this user")]
    AlreadyShared,

    /// Unshare target has no grant on this ToDo
    #[error("ToDo is not shared with this user")]
    NotShared,

    /// Input failed field validation
    #[error("Validation failed: {} errors", .0.len())]
    Validation(Vec<ValidationErrorDetail>),

    /// Storage fault
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Validation error detail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

impl TodoError {
    /// Stable snake_case identifier for the error kind
    pub fn code(&self) -> &'static str {
        match self {
            TodoError::NotFound => "not_found",
            TodoError::Forbidden => "forbidden",
            TodoError::InsufficientAccess => "insufficient_access",
            TodoError::Duplicate => "duplicate",
            TodoError::SelfShare => "self_share",
            TodoError::UnknownUser(_) => "unknown_user",
            TodoError::AlreadyShared => "already_shared",
            TodoError::NotShared => "not_shared",
            TodoError::Validation(_) => "validation_error",
            TodoError::Database(_) => "database_error",
        }
    }

    /// True for errors that should send the user back to a safe default view
    pub fn is_access_error(&self) -> bool {
        matches!(
            self,
            TodoError::NotFound | TodoError::Forbidden | TodoError::InsufficientAccess
        )
    }
}

impl From<ValidationErrors> for TodoError {
    fn from(errors: ValidationErrors) -> Self {
        let mut details: Vec<ValidationErrorDetail> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| ValidationErrorDetail {
                    field: field.to_string(),
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "Validation failed".to_string()),
                })
            })
            .collect();

        // field_errors() is a HashMap
        details.sort_by(|a, b| a.field.cmp(&b.field));

        TodoError::Validation(details)
    }
}

/// Checks whether a sqlx error is a unique violation on the named constraint
pub(crate) fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.is_unique_violation() && db_err.constraint() == Some(constraint)
        }
        _ => false,
    }
}
