//! Running verification checks without letting them take down the session

use super::{CheckFuture, VerifyError, VerifyResult};
use crate::exercise::reveal::RevealState;
use crate::exercise::scoring::completion_points;
use crate::lab::model::Step;

/// Run a collaborator check to completion.
///
/// Errors and panics inside the check become a failed result with a generic
/// message; this never returns an error.
pub async fn dispatch(check: CheckFuture) -> VerifyResult {
    let outcome = tokio::spawn(check).await.map_err(VerifyError::from).and_then(|r| r);
    match outcome {
        Ok(result) => {
            tracing::debug!(success = result.success, "verification finished: {}", result.message);
            result
        }
        Err(e) if e.is_recoverable() => {
            tracing::warn!("verification collaborator failed: {}", e);
            VerifyResult::backend_error()
        }
        Err(e) => {
            tracing::error!("verification collaborator crashed: {}", e);
            VerifyResult::backend_error()
        }
    }
}

/// Allows at most one verification at a time
#[derive(Debug, Default, Clone)]
pub struct VerificationGate {
    in_flight: Option<usize>,
}

impl VerificationGate {
    /// Claim the gate for a step
    pub fn begin(&mut self, step_index: usize) -> Result<(), VerifyError> {
        if let Some(busy) = self.in_flight {
            return Err(VerifyError::InFlight(busy));
        }
        self.in_flight = Some(step_index);
        Ok(())
    }

    /// Release the gate. Returns false if it was not held for this step.
    pub fn finish(&mut self, step_index: usize) -> bool {
        if self.in_flight == Some(step_index) {
            self.in_flight = None;
            true
        } else {
            false
        }
    }

    /// Step currently being verified
    pub fn in_flight(&self) -> Option<usize> {
        self.in_flight
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }
}

/// A step that passed verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub step_index: usize,
    pub step_id: String,
    /// Hints, answers or the solution were used on the primary block
    pub assisted: bool,
    pub points: u32,
}

/// Turn a verification result into a completion, if it passed
pub fn assess(
    step_index: usize,
    step: &Step,
    result: &VerifyResult,
    primary: Option<&RevealState>,
) -> Option<Completion> {
    if !result.success {
        return None;
    }
    let assisted = primary.is_some_and(RevealState::is_assisted);
    Some(Completion {
        step_index,
        step_id: step.id.clone(),
        assisted,
        points: completion_points(primary, step.has_code(), assisted),
    })
}
