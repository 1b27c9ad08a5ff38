// ============================================================================
// ERRORS — taxonomy shared by the session, effect library and scheduler
// ============================================================================

pub type EditorResult<T> = Result<T, EditorError>;

#[derive(thiserror::Error, Debug)]
pub enum EditorError {
    /// Unreadable path or corrupt data. The previous session is untouched.
    #[error("failed to load image: {0}")]
    LoadFailed(String),

    /// I/O or encoder failure while writing the working buffer.
    #[error("failed to save image: {0}")]
    SaveFailed(String),

    /// An operation that needs a loaded image was invoked without one.
    #[error("no image loaded")]
    EmptySession,

    /// An effect was invoked on a zero-sized buffer.
    #[error("buffer has no pixels")]
    EmptyBuffer,

    #[error("buffer is {found:?} but the session expects {expected:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        found: (u32, u32),
    },

    /// A recompute noticed it was superseded. Internal to the scheduler.
    #[error("recompute superseded by a newer request")]
    CancelledStale,
}

impl EditorError {
    pub fn load_failed(msg: impl Into<String>) -> Self {
        Self::LoadFailed(msg.into())
    }

    pub fn save_failed(msg: impl Into<String>) -> Self {
        Self::SaveFailed(msg.into())
    }

    /// Expected outcomes that should never be surfaced as a user-facing error.
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::CancelledStale | Self::EmptySession)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            EditorError::load_failed("x")
                .to_string()
                .starts_with("failed to load image:")
        );
        assert!(
            EditorError::save_failed("x")
                .to_string()
                .starts_with("failed to save image:")
        );
    }

    #[test]
    fn stale_and_empty_session_are_silent() {
        assert!(EditorError::CancelledStale.is_silent());
        assert!(EditorError::EmptySession.is_silent());
        assert!(!EditorError::EmptyBuffer.is_silent());
        assert!(!EditorError::load_failed("bad").is_silent());
    }
}
