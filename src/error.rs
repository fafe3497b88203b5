use thiserror::Error;

/// Errors surfaced by the queue intake and the decision engine.
///
/// Face detection failures never appear here; they degrade to
/// [`crate::faces::DetectionOutcome::Unavailable`].
#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: i64 },

    #[error("queued image {id} was changed by someone else (expected revision {expected})")]
    Conflict { id: i64, expected: i64 },

    #[error("an identical image ({digest}) is already on this person's record")]
    Duplicate { digest: String },

    #[error("database error: {0}")]
    Persistence(#[from] rusqlite::Error),

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type ModerationResult<T> = Result<T, ModerationError>;

impl ModerationError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether the error means the request itself was bad, rather than the
    /// storage behind it.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::NotFound { .. } | Self::Conflict { .. } | Self::Duplicate { .. }
        )
    }
}
