//! Step verification
//!
//! The checks themselves are external collaborators (shelling out to `aws`,
//! `mongosh`, ...). This module defines their interfaces and the dispatcher
//! that turns whatever they do into a plain pass/fail result.

pub mod dispatcher;
pub mod error;
pub mod shell;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::lab::model::Step;

pub use dispatcher::{Completion, VerificationGate, assess, dispatch};
pub use error::VerifyError;
pub use shell::{KmsAliasCleanup, ShellVerifier};

/// Message used whenever a collaborator fails instead of answering
pub const BACKEND_ERROR_MESSAGE: &str = "verification backend error";

/// Outcome of a verification or cleanup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResult {
    pub success: bool,
    pub message: String,
}

impl VerifyResult {
    pub fn pass(message: impl Into<String>) -> Self {
        Self { success: true, message: message.into() }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self { success: false, message: message.into() }
    }

    /// The deterministic result for a collaborator that errored
    pub fn backend_error() -> Self {
        Self::fail(BACKEND_ERROR_MESSAGE)
    }
}

/// Future returned by collaborators
pub type CheckFuture = BoxFuture<'static, Result<VerifyResult, VerifyError>>;

/// Checks whether a learner completed a step
pub trait Verifier: Send + Sync {
    /// `connection_uri` fills the `{uri}` placeholder in command arguments
    fn verify(&self, step: &Step, connection_uri: Option<&str>) -> CheckFuture;
}

/// Undoes cloud/database side effects when a step is reset
pub trait Cleanup: Send + Sync {
    fn cleanup(&self, lab_number: u32, connection_uri: Option<&str>) -> CheckFuture;
}

/// Cleanup collaborator that has nothing to undo
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCleanup;

impl Cleanup for NoCleanup {
    fn cleanup(&self, _lab_number: u32, _connection_uri: Option<&str>) -> CheckFuture {
        Box::pin(async { Ok::<_, VerifyError>(VerifyResult::pass("Nothing to clean up")) })
    }
}
