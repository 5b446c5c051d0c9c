//! Error types for verification and cleanup collaborators

use thiserror::Error;

/// Errors a verify or cleanup collaborator can raise.
///
/// None of these reach the learner directly; the dispatcher turns them into
/// a failed result.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// The verification program could not be started
    #[error("Failed to run `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The check ran but its backend misbehaved
    #[error("Verification backend error: {0}")]
    Backend(String),

    /// A verification for this lab is already running
    #[error("Verification already in progress for step {0}")]
    InFlight(usize),

    /// The background task panicked or was aborted
    #[error("Verification task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl VerifyError {
    /// Check if the learner can simply try again
    pub fn is_recoverable(&self) -> bool {
        matches!(self, VerifyError::Spawn { .. } | VerifyError::Backend(_) | VerifyError::InFlight(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn panicked_tasks_are_not_recoverable() {
        let join = tokio::spawn(async { panic!("boom") }).await.unwrap_err();
        let err = VerifyError::from(join);
        assert!(!err.is_recoverable());
        assert!(err.to_string().starts_with("Verification task failed"));
    }

    #[test]
    fn backend_errors_can_be_retried() {
        assert!(VerifyError::Backend("timeout".into()).is_recoverable());
        assert!(VerifyError::InFlight(1).is_recoverable());
    }
}
