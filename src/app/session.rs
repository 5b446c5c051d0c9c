//! A learner's pass through one lab
//!
//! `LabSession` owns the lab content, the persisted record and the injected
//! collaborators. Reveal and tier operations are synchronous; verification
//! and cleanup hand back futures the caller drives.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use thiserror::Error;

use crate::config::{LabRecord, ProgressStore};
use crate::exercise::blanks::{BlankPosition, locate};
use crate::exercise::editor::HighlightSpan;
use crate::exercise::reveal::{self, RevealState};
use crate::exercise::tier::Tier;
use crate::lab::model::{BlockKey, CodeBlock, Lab, Step};
use crate::telemetry::{TelemetryEvent, TelemetrySink};
use crate::verify::{Cleanup, Completion, VerificationGate, VerifyError, VerifyResult, Verifier, assess, dispatch};

/// Errors from session operations. None of them end the session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Help was already revealed for this block
    #[error("Tier is locked for block {0} once help has been revealed")]
    TierLocked(BlockKey),

    /// The step must pass verification first
    #[error("Step {} must be verified before moving on", .0 + 1)]
    StepLocked(usize),

    #[error("Lab has no step {}", .0 + 1)]
    NoSuchStep(usize),

    #[error("No code block {0}")]
    NoSuchBlock(BlockKey),

    #[error("Block {block} has no hint {}", .index + 1)]
    NoSuchHint { block: BlockKey, index: usize },

    #[error(transparent)]
    Verify(#[from] VerifyError),
}

/// External services a session talks to
#[derive(Clone)]
pub struct Collaborators {
    pub verifier: Arc<dyn Verifier>,
    pub cleanup: Arc<dyn Cleanup>,
    pub telemetry: Arc<dyn TelemetrySink>,
    pub store: Arc<dyn ProgressStore>,
}

/// Session-wide switches
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Show full solutions in place of skeletons
    pub always_show_solutions: bool,
    /// Handed to the verifier and to the cleanup collaborator on reset
    pub connection_uri: Option<String>,
}

/// A verification that has been started but not yet resolved
pub struct PendingVerification {
    pub step_index: usize,
    pub future: BoxFuture<'static, VerifyResult>,
}

/// What a finished verification did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyOutcome {
    pub result: VerifyResult,
    pub completion: Option<Completion>,
}

/// Result of resetting a step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResetReport {
    pub step_index: usize,
    /// Set when cleanup failed; the local reset happened regardless
    pub cleanup_warning: Option<String>,
}

impl ResetReport {
    pub fn from_cleanup(step_index: usize, result: VerifyResult) -> Self {
        let cleanup_warning = (!result.success).then_some(result.message);
        Self { step_index, cleanup_warning }
    }
}

/// One lab in progress
pub struct LabSession {
    lab: Lab,
    record: LabRecord,
    collaborators: Collaborators,
    options: SessionOptions,
    gate: VerificationGate,
}

impl LabSession {
    /// Open a lab, restoring saved progress when the store has any
    pub fn open(lab: Lab, collaborators: Collaborators, options: SessionOptions) -> Self {
        let mut record = match collaborators.store.load(lab.number) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(lab = lab.number, "Failed to load progress, starting fresh: {:#}", e);
                LabRecord::default()
            }
        };
        let last = lab.steps.len().saturating_sub(1);
        record.current_step = record.current_step.min(last);
        tracing::info!(lab = lab.number, step = record.current_step, "opened lab {}", lab.id);

        Self { lab, record, collaborators, options, gate: VerificationGate::default() }
    }

    pub fn lab(&self) -> &Lab {
        &self.lab
    }

    pub fn record(&self) -> &LabRecord {
        &self.record
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn set_always_show_solutions(&mut self, on: bool) {
        self.options.always_show_solutions = on;
    }

    pub fn current_index(&self) -> usize {
        self.record.current_step
    }

    pub fn current_step(&self) -> &Step {
        &self.lab.steps[self.record.current_step]
    }

    fn persist(&self) {
        if let Err(e) = self.collaborators.store.save(self.lab.number, &self.record) {
            tracing::warn!(lab = self.lab.number, "Failed to save progress: {:#}", e);
        }
    }

    fn block(&self, key: BlockKey) -> Result<&CodeBlock, SessionError> {
        self.lab.block(key).ok_or(SessionError::NoSuchBlock(key))
    }

    fn check_hint(&self, key: BlockKey, index: usize) -> Result<(), SessionError> {
        if index < self.block(key)?.hints.len() {
            Ok(())
        } else {
            Err(SessionError::NoSuchHint { block: key, index })
        }
    }

    /// Reveal state for a block; untouched blocks are pristine at the default tier
    pub fn reveal_state(&self, key: BlockKey) -> RevealState {
        self.record.block(key).cloned().unwrap_or_default()
    }

    pub fn tier(&self, key: BlockKey) -> Tier {
        self.record.block(key).map(|s| s.tier).unwrap_or_default()
    }

    /// Switch a block's tier. Refused once anything has been revealed.
    pub fn set_tier(&mut self, key: BlockKey, tier: Tier) -> Result<(), SessionError> {
        self.block(key)?;
        let state = self.record.block_mut(key, Tier::default());
        if state.tier == tier {
            return Ok(());
        }
        if !state.can_change_tier() {
            return Err(SessionError::TierLocked(key));
        }
        state.tier = tier;
        tracing::debug!(block = %key, %tier, "tier changed");
        self.persist();
        Ok(())
    }

    fn step_id(&self, key: BlockKey) -> String {
        self.lab.step(key.step).map(|s| s.id.clone()).unwrap_or_default()
    }

    /// Reveal a hint nudge. Returns the points charged; 0 when already shown.
    pub fn reveal_hint(&mut self, key: BlockKey, hint_index: usize) -> Result<u32, SessionError> {
        self.check_hint(key, hint_index)?;
        let penalty = self.record.block_mut(key, Tier::default()).reveal_hint(hint_index);
        if penalty > 0 {
            tracing::info!(block = %key, hint_index, penalty, "hint revealed");
            self.collaborators.telemetry.record(&TelemetryEvent::HintRevealed {
                lab_number: self.lab.number,
                step_id: self.step_id(key),
                block: key,
                hint_index,
                penalty,
            });
            self.persist();
        }
        Ok(penalty)
    }

    /// Reveal an exact answer. Returns the points charged; 0 when already shown.
    pub fn reveal_answer(&mut self, key: BlockKey, hint_index: usize) -> Result<u32, SessionError> {
        self.check_hint(key, hint_index)?;
        let penalty = self.record.block_mut(key, Tier::default()).reveal_answer(hint_index);
        if penalty > 0 {
            tracing::info!(block = %key, hint_index, penalty, "answer revealed");
            self.collaborators.telemetry.record(&TelemetryEvent::AnswerRevealed {
                lab_number: self.lab.number,
                step_id: self.step_id(key),
                block: key,
                hint_index,
                penalty,
            });
            self.persist();
        }
        Ok(penalty)
    }

    /// Reveal the full solution. Returns the points charged; 0 when already shown.
    pub fn reveal_solution(&mut self, key: BlockKey) -> Result<u32, SessionError> {
        self.block(key)?;
        let penalty = self.record.block_mut(key, Tier::default()).reveal_solution();
        if penalty > 0 {
            tracing::info!(block = %key, penalty, "solution revealed");
            self.collaborators.telemetry.record(&TelemetryEvent::SolutionRevealed {
                lab_number: self.lab.number,
                step_id: self.step_id(key),
                block: key,
                penalty,
            });
            self.persist();
        }
        Ok(penalty)
    }

    /// Whether the block currently shows its full solution
    pub fn shows_solution(&self, key: BlockKey) -> bool {
        self.options.always_show_solutions || self.record.block(key).is_some_and(|s| s.solution_revealed)
    }

    /// The editable code for a block
    pub fn displayed_code(&self, key: BlockKey) -> Result<&str, SessionError> {
        let block = self.block(key)?;
        Ok(reveal::displayed_code(block, &self.reveal_state(key), self.options.always_show_solutions))
    }

    /// Read-only code with revealed answers filled in
    pub fn answers_preview(&self, key: BlockKey) -> Result<String, SessionError> {
        let block = self.block(key)?;
        Ok(reveal::preview_with_answers(block, &self.reveal_state(key), self.options.always_show_solutions))
    }

    /// Blanks in the displayed code; none while the solution is showing
    pub fn blank_positions(&self, key: BlockKey) -> Result<Vec<BlankPosition>, SessionError> {
        let block = self.block(key)?;
        if self.shows_solution(key) {
            return Ok(Vec::new());
        }
        Ok(locate(self.displayed_code(key)?, &block.hints))
    }

    /// Highlights for revealed answers within `answers_preview`
    pub fn answer_highlights(&self, key: BlockKey) -> Result<Vec<HighlightSpan>, SessionError> {
        let block = self.block(key)?;
        if self.shows_solution(key) {
            return Ok(Vec::new());
        }
        let preview = self.answers_preview(key)?;
        Ok(reveal::answer_highlights(&preview, block, &self.reveal_state(key)))
    }

    pub fn effective_score(&self, key: BlockKey) -> u32 {
        self.reveal_state(key).effective_score()
    }

    /// Steps without code never block; others need a passing verification
    pub fn can_continue_from(&self, step: usize) -> bool {
        match self.lab.step(step) {
            Some(s) => !s.has_code() || self.record.is_completed(step),
            None => false,
        }
    }

    pub fn can_continue(&self) -> bool {
        self.can_continue_from(self.current_index())
    }

    /// Move forward one step
    pub fn next_step(&mut self) -> Result<usize, SessionError> {
        let current = self.current_index();
        self.go_to(current + 1)
    }

    /// Move back one step
    pub fn prev_step(&mut self) -> Result<usize, SessionError> {
        let current = self.current_index();
        let target = current.checked_sub(1).ok_or(SessionError::NoSuchStep(current))?;
        self.go_to(target)
    }

    /// Jump to a step. Every step before the target must allow continuing.
    pub fn go_to(&mut self, step: usize) -> Result<usize, SessionError> {
        if step >= self.lab.steps.len() {
            return Err(SessionError::NoSuchStep(step));
        }
        if let Some(blocking) = (0..step).find(|&i| !self.can_continue_from(i)) {
            return Err(SessionError::StepLocked(blocking));
        }
        if step != self.record.current_step {
            self.record.current_step = step;
            self.persist();
        }
        Ok(step)
    }

    pub fn is_verifying(&self) -> bool {
        self.gate.is_busy()
    }

    /// Start verifying the current step. Only one verification runs at a time.
    pub fn begin_verify(&mut self) -> Result<PendingVerification, SessionError> {
        let step_index = self.current_index();
        self.gate.begin(step_index)?;
        tracing::info!(lab = self.lab.number, step = step_index, "verifying step");

        let uri = self.options.connection_uri.as_deref();
        let check = self.collaborators.verifier.verify(self.current_step(), uri);
        Ok(PendingVerification { step_index, future: Box::pin(dispatch(check)) })
    }

    /// Record the result of a verification started with `begin_verify`
    pub fn finish_verify(&mut self, step_index: usize, result: VerifyResult) -> Option<Completion> {
        if !self.gate.finish(step_index) {
            tracing::warn!(step = step_index, "ignoring result for a verification that is not in flight");
            return None;
        }

        let step = self.lab.step(step_index)?;
        let primary = self.lab.block_keys(step_index).first().and_then(|&key| self.record.block(key));
        let completion = assess(step_index, step, &result, primary);

        self.record.outputs.insert(step_index, result);
        if let Some(done) = &completion {
            if self.record.completed_steps.insert(step_index) {
                tracing::info!(step = step_index, points = done.points, assisted = done.assisted, "step completed");
                self.collaborators.telemetry.record(&TelemetryEvent::StepCompleted {
                    lab_number: self.lab.number,
                    step_id: done.step_id.clone(),
                    assisted: done.assisted,
                    points: done.points,
                });
            }
        }
        self.persist();
        completion
    }

    /// Verify the current step and wait for the result
    pub async fn verify_current(&mut self) -> Result<VerifyOutcome, SessionError> {
        let pending = self.begin_verify()?;
        let result = pending.future.await;
        let completion = self.finish_verify(pending.step_index, result.clone());
        Ok(VerifyOutcome { result, completion })
    }

    /// Clear one step locally and return its cleanup.
    ///
    /// The local reset is complete when this returns; the future only runs
    /// the external cleanup and never fails.
    pub fn reset_step(&mut self, step: usize) -> Result<BoxFuture<'static, VerifyResult>, SessionError> {
        if step >= self.lab.steps.len() {
            return Err(SessionError::NoSuchStep(step));
        }
        if self.gate.in_flight() == Some(step) {
            return Err(VerifyError::InFlight(step).into());
        }

        self.record.clear_step(step);
        self.persist();
        tracing::info!(lab = self.lab.number, step, "step reset");

        let cleanup =
            self.collaborators.cleanup.cleanup(self.lab.number, self.options.connection_uri.as_deref());
        Ok(Box::pin(dispatch(cleanup)))
    }

    /// Reset a step and wait for its cleanup
    pub async fn reset_step_with_cleanup(&mut self, step: usize) -> Result<ResetReport, SessionError> {
        let cleanup = self.reset_step(step)?;
        let report = ResetReport::from_cleanup(step, cleanup.await);
        if let Some(warning) = &report.cleanup_warning {
            tracing::warn!(step, "cleanup failed after reset: {}", warning);
        }
        Ok(report)
    }

    /// Forget all progress for this lab
    pub fn reset_lab(&mut self) -> Result<(), SessionError> {
        if let Some(step) = self.gate.in_flight() {
            return Err(VerifyError::InFlight(step).into());
        }
        self.record = LabRecord::default();
        self.persist();
        tracing::info!(lab = self.lab.number, "lab reset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::MemoryStore;
    use crate::exercise::editor::HighlightKind;
    use crate::lab::model::Hint;
    use crate::telemetry::testing::RecordingSink;
    use crate::verify::{CheckFuture, NoCleanup};

    #[derive(Clone, Copy)]
    enum Script {
        Pass,
        Fail,
        Error,
        EchoUri,
    }

    struct ScriptedVerifier(Script);

    impl Verifier for ScriptedVerifier {
        fn verify(&self, step: &Step, connection_uri: Option<&str>) -> CheckFuture {
            let id = step.id.clone();
            match self.0 {
                Script::Pass => Box::pin(async move { Ok::<_, VerifyError>(VerifyResult::pass(format!("{id} ok"))) }),
                Script::Fail => Box::pin(async move { Ok::<_, VerifyError>(VerifyResult::fail(format!("{id} missing"))) }),
                Script::Error => Box::pin(async {
                    Err::<VerifyResult, _>(VerifyError::Backend("mongosh crashed".into()))
                }),
                Script::EchoUri => {
                    let uri = connection_uri.unwrap_or("none").to_string();
                    Box::pin(async move { Ok::<_, VerifyError>(VerifyResult::pass(uri)) })
                }
            }
        }
    }

    struct FailingCleanup;

    impl Cleanup for FailingCleanup {
        fn cleanup(&self, _lab_number: u32, _connection_uri: Option<&str>) -> CheckFuture {
            Box::pin(async { Err::<VerifyResult, _>(VerifyError::Backend("aws unreachable".into())) })
        }
    }

    fn kms_block() -> CodeBlock {
        CodeBlock::new(
            "Terminal",
            "bash",
            "KMS_KEY_ID=$(aws kms create-key --query 'KeyMetadata.KeyId')",
        )
        .with_skeleton(Tier::Guided, "KMS_KEY_ID=$(aws kms _________ --query 'KeyMetadata._______')")
        .with_skeleton(Tier::Expert, "# Create the key and capture its id\nKMS_KEY_ID=$(___)")
        .with_hints(vec![
            Hint::new(1, "_________", "The KMS subcommand that creates a key", "create-key"),
            Hint::new(1, "_______", "The field holding the key's id", "KeyId"),
        ])
    }

    fn lab() -> Lab {
        let step = |id: &str, blocks: Vec<CodeBlock>| Step {
            id: id.into(),
            title: id.into(),
            description: String::new(),
            code_blocks: blocks,
            verify: None,
        };
        Lab {
            number: 1,
            id: "csfle".into(),
            title: "CSFLE".into(),
            description: String::new(),
            steps: vec![
                step("intro", Vec::new()),
                step("cmk", vec![kms_block()]),
                step("alias", vec![kms_block(), kms_block()]),
            ],
        }
    }

    struct Harness {
        session: LabSession,
        store: Arc<MemoryStore>,
        sink: RecordingSink,
    }

    fn harness_with(script: Script, cleanup: Arc<dyn Cleanup>, store: MemoryStore) -> Harness {
        let store = Arc::new(store);
        let sink = RecordingSink::default();
        let collaborators = Collaborators {
            verifier: Arc::new(ScriptedVerifier(script)),
            cleanup,
            telemetry: Arc::new(sink.clone()),
            store: store.clone(),
        };
        let session = LabSession::open(lab(), collaborators, SessionOptions::default());
        Harness { session, store, sink }
    }

    fn harness(script: Script) -> Harness {
        harness_with(script, Arc::new(NoCleanup), MemoryStore::new())
    }

    const CMK: BlockKey = BlockKey { step: 1, block: 0 };

    #[test]
    fn guided_reveal_ledger() {
        let mut h = harness(Script::Pass);
        assert_eq!(h.session.reveal_hint(CMK, 0).unwrap(), 1);
        assert_eq!(h.session.effective_score(CMK), 9);
        assert_eq!(h.session.reveal_answer(CMK, 0).unwrap(), 2);
        assert_eq!(h.session.effective_score(CMK), 7);
        assert_eq!(h.session.reveal_solution(CMK).unwrap(), 5);
        assert_eq!(h.session.effective_score(CMK), 2);
        assert_eq!(h.session.reveal_state(CMK).points_deducted, 8);
    }

    #[test]
    fn repeated_reveals_are_free_and_silent() {
        let mut h = harness(Script::Pass);
        h.session.reveal_hint(CMK, 1).unwrap();
        assert_eq!(h.session.reveal_hint(CMK, 1).unwrap(), 0);
        assert_eq!(h.session.reveal_state(CMK).points_deducted, 1);
        assert_eq!(h.sink.events().len(), 1);
    }

    #[test]
    fn reveals_are_persisted_and_reported() {
        let mut h = harness(Script::Pass);
        h.session.reveal_answer(CMK, 1).unwrap();

        let saved = h.store.snapshot(1).unwrap();
        assert!(saved.block(CMK).unwrap().revealed_answers.contains(&1));
        assert_eq!(
            h.sink.events(),
            vec![TelemetryEvent::AnswerRevealed {
                lab_number: 1,
                step_id: "cmk".into(),
                block: CMK,
                hint_index: 1,
                penalty: 2,
            }]
        );
    }

    #[test]
    fn unknown_hint_is_rejected() {
        let mut h = harness(Script::Pass);
        assert!(matches!(
            h.session.reveal_hint(CMK, 5),
            Err(SessionError::NoSuchHint { index: 5, .. })
        ));
        assert!(matches!(
            h.session.reveal_solution(BlockKey::new(0, 0)),
            Err(SessionError::NoSuchBlock(_))
        ));
    }

    #[test]
    fn tier_locks_after_reveal() {
        let mut h = harness(Script::Pass);
        h.session.set_tier(CMK, Tier::Expert).unwrap();
        h.session.set_tier(CMK, Tier::Guided).unwrap();
        h.session.reveal_hint(CMK, 0).unwrap();

        assert!(matches!(h.session.set_tier(CMK, Tier::Challenge), Err(SessionError::TierLocked(k)) if k == CMK));
        assert!(h.session.set_tier(CMK, Tier::Guided).is_ok());
    }

    #[test]
    fn displayed_code_follows_tier_and_solution() {
        let mut h = harness(Script::Pass);
        let guided = h.session.displayed_code(CMK).unwrap().to_string();
        assert!(guided.contains("_________"));

        // No challenge skeleton, so challenge falls back to guided
        h.session.set_tier(CMK, Tier::Challenge).unwrap();
        assert_eq!(h.session.displayed_code(CMK).unwrap(), guided);

        h.session.set_tier(CMK, Tier::Expert).unwrap();
        assert!(h.session.displayed_code(CMK).unwrap().starts_with("# Create the key"));

        h.session.reveal_solution(CMK).unwrap();
        assert_eq!(h.session.displayed_code(CMK).unwrap(), kms_block().full_solution);
        assert!(h.session.blank_positions(CMK).unwrap().is_empty());
    }

    #[test]
    fn revealed_answers_only_touch_preview() {
        let mut h = harness(Script::Pass);
        h.session.reveal_answer(CMK, 0).unwrap();

        assert!(h.session.displayed_code(CMK).unwrap().contains("aws kms _________ --query"));
        let preview = h.session.answers_preview(CMK).unwrap();
        assert_eq!(preview, "KMS_KEY_ID=$(aws kms create-key --query 'KeyMetadata._______')");

        let spans = h.session.answer_highlights(CMK).unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!((spans[0].line, spans[0].start, spans[0].len), (1, 21, 10));
        assert_eq!(h.session.blank_positions(CMK).unwrap().len(), 2);
    }

    #[test]
    fn keyvault_answer_is_highlighted_on_its_blank() {
        let lab = crate::lab::parse_lab(include_str!("../../demos/csfle-fundamentals.json")).unwrap();
        let collaborators = Collaborators {
            verifier: Arc::new(ScriptedVerifier(Script::Pass)),
            cleanup: Arc::new(NoCleanup),
            telemetry: Arc::new(RecordingSink::default()),
            store: Arc::new(MemoryStore::new()),
        };
        let mut session = LabSession::open(lab, collaborators, SessionOptions::default());
        let keyvault = BlockKey::new(2, 0);

        // Line 10 already spells keyAltNames in the partial filter
        session.reveal_answer(keyvault, 2).unwrap();
        assert_eq!(
            session.answer_highlights(keyvault).unwrap(),
            vec![HighlightSpan { line: 9, start: 6, len: 11, kind: HighlightKind::Answer }]
        );
    }

    #[test]
    fn codeless_steps_never_block() {
        let mut h = harness(Script::Pass);
        assert!(h.session.can_continue());
        assert_eq!(h.session.next_step().unwrap(), 1);
        assert!(!h.session.can_continue());
        assert!(matches!(h.session.next_step(), Err(SessionError::StepLocked(1))));
        assert!(matches!(h.session.go_to(2), Err(SessionError::StepLocked(1))));
        assert_eq!(h.session.prev_step().unwrap(), 0);
        assert!(matches!(h.session.prev_step(), Err(SessionError::NoSuchStep(0))));
    }

    #[tokio::test]
    async fn passing_verification_unlocks_next_step() {
        let mut h = harness(Script::Pass);
        h.session.next_step().unwrap();

        let outcome = h.session.verify_current().await.unwrap();
        assert!(outcome.result.success);
        let done = outcome.completion.unwrap();
        assert!(!done.assisted);
        assert_eq!(done.points, 10);

        assert!(h.session.can_continue());
        assert_eq!(h.session.next_step().unwrap(), 2);
        assert_eq!(h.store.snapshot(1).unwrap().current_step, 2);
        assert_eq!(
            h.sink.events(),
            vec![TelemetryEvent::StepCompleted {
                lab_number: 1,
                step_id: "cmk".into(),
                assisted: false,
                points: 10,
            }]
        );
    }

    #[tokio::test]
    async fn assisted_completion_is_flagged() {
        let mut h = harness(Script::Pass);
        h.session.next_step().unwrap();
        h.session.reveal_hint(CMK, 0).unwrap();

        let done = h.session.verify_current().await.unwrap().completion.unwrap();
        assert!(done.assisted);
        assert_eq!(done.points, 9);
    }

    #[tokio::test]
    async fn only_the_primary_block_marks_assistance() {
        let mut h = harness(Script::Pass);
        h.session.next_step().unwrap();
        h.session.verify_current().await.unwrap();
        h.session.next_step().unwrap();

        h.session.reveal_hint(BlockKey::new(2, 1), 0).unwrap();
        let done = h.session.verify_current().await.unwrap().completion.unwrap();
        assert!(!done.assisted);
        assert_eq!(done.points, 10);
    }

    #[tokio::test]
    async fn completion_is_reported_once() {
        let mut h = harness(Script::Pass);
        h.session.next_step().unwrap();
        h.session.verify_current().await.unwrap();
        h.session.verify_current().await.unwrap();
        assert_eq!(h.sink.events().len(), 1);
    }

    #[tokio::test]
    async fn backend_errors_fail_safely() {
        let mut h = harness(Script::Error);
        h.session.next_step().unwrap();

        let outcome = h.session.verify_current().await.unwrap();
        assert!(!outcome.result.success);
        assert!(!outcome.result.message.is_empty());
        assert!(outcome.completion.is_none());
        assert!(!h.session.can_continue());
        assert!(!h.session.is_verifying());
        assert_eq!(h.session.record().outputs.get(&1), Some(&outcome.result));
    }

    #[tokio::test]
    async fn connection_uri_reaches_the_verifier() {
        let collaborators = Collaborators {
            verifier: Arc::new(ScriptedVerifier(Script::EchoUri)),
            cleanup: Arc::new(NoCleanup),
            telemetry: Arc::new(RecordingSink::default()),
            store: Arc::new(MemoryStore::new()),
        };
        let options = SessionOptions { connection_uri: Some("mongodb://lab:27017".into()), ..Default::default() };
        let mut session = LabSession::open(lab(), collaborators, options);
        session.next_step().unwrap();

        let outcome = session.verify_current().await.unwrap();
        assert_eq!(outcome.result, VerifyResult::pass("mongodb://lab:27017"));
    }

    #[tokio::test]
    async fn failed_verification_keeps_step_locked() {
        let mut h = harness(Script::Fail);
        h.session.next_step().unwrap();
        let outcome = h.session.verify_current().await.unwrap();
        assert_eq!(outcome.result, VerifyResult::fail("cmk missing"));
        assert!(!h.session.can_continue());
    }

    #[tokio::test]
    async fn verification_is_not_reentrant() {
        let mut h = harness(Script::Pass);
        h.session.next_step().unwrap();

        let pending = h.session.begin_verify().unwrap();
        assert!(h.session.is_verifying());
        assert!(matches!(h.session.begin_verify(), Err(SessionError::Verify(VerifyError::InFlight(1)))));
        assert!(h.session.reset_step(1).is_err());

        let result = pending.future.await;
        assert!(h.session.finish_verify(pending.step_index, result.clone()).is_some());
        assert!(h.session.finish_verify(pending.step_index, result).is_none());
        assert!(!h.session.is_verifying());
    }

    #[tokio::test]
    async fn reset_clears_only_that_step() {
        let mut h = harness(Script::Pass);
        h.session.next_step().unwrap();
        h.session.reveal_hint(CMK, 0).unwrap();
        h.session.verify_current().await.unwrap();
        h.session.next_step().unwrap();

        let alias = BlockKey::new(2, 1);
        h.session.reveal_answer(alias, 1).unwrap();
        h.session.verify_current().await.unwrap();

        let report = h.session.reset_step_with_cleanup(1).await.unwrap();
        assert_eq!(report, ResetReport { step_index: 1, cleanup_warning: None });

        let state = h.session.reveal_state(CMK);
        assert!(state.is_pristine());
        assert_eq!(state.points_deducted, 0);
        assert!(!h.session.record().is_completed(1));
        assert!(h.session.record().outputs.get(&1).is_none());

        assert!(h.session.record().is_completed(2));
        assert!(h.session.reveal_state(alias).revealed_answers.contains(&1));
        assert_eq!(h.store.snapshot(1).unwrap(), h.session.record().clone());
    }

    #[tokio::test]
    async fn reset_unlocks_tier() {
        let mut h = harness(Script::Pass);
        h.session.reveal_solution(CMK).unwrap();
        assert!(h.session.set_tier(CMK, Tier::Expert).is_err());

        h.session.reset_step_with_cleanup(1).await.unwrap();
        assert!(h.session.set_tier(CMK, Tier::Expert).is_ok());
    }

    #[tokio::test]
    async fn cleanup_failure_is_only_a_warning() {
        let mut h = harness_with(Script::Pass, Arc::new(FailingCleanup), MemoryStore::new());
        h.session.reveal_hint(CMK, 0).unwrap();

        let report = h.session.reset_step_with_cleanup(1).await.unwrap();
        assert!(report.cleanup_warning.is_some());
        assert!(h.session.reveal_state(CMK).is_pristine());
    }

    #[tokio::test]
    async fn persistence_failures_do_not_interrupt() {
        let mut h = harness_with(Script::Pass, Arc::new(NoCleanup), MemoryStore::failing());
        h.session.next_step().unwrap();
        h.session.reveal_hint(CMK, 0).unwrap();
        let outcome = h.session.verify_current().await.unwrap();
        assert!(outcome.completion.is_some());
        assert!(h.session.record().is_completed(1));
    }

    #[test]
    fn progress_survives_reopen() {
        let mut record = LabRecord { current_step: 9, ..Default::default() };
        record.completed_steps.insert(1);
        record.block_mut(CMK, Tier::Challenge).reveal_hint(0);

        let h = harness_with(Script::Pass, Arc::new(NoCleanup), MemoryStore::new().with_record(1, record));
        assert_eq!(h.session.current_index(), 2);
        assert_eq!(h.session.tier(CMK), Tier::Challenge);
        assert_eq!(h.session.effective_score(CMK), 13);
        assert!(h.session.can_continue_from(1));
    }

    #[test]
    fn reset_lab_forgets_everything() {
        let mut h = harness(Script::Pass);
        h.session.reveal_hint(CMK, 0).unwrap();
        h.session.next_step().unwrap();
        h.session.reset_lab().unwrap();
        assert_eq!(h.session.record(), &LabRecord::default());
        assert_eq!(h.store.snapshot(1), Some(LabRecord::default()));
    }

    #[test]
    fn always_show_solutions_hides_markers() {
        let mut h = harness(Script::Pass);
        h.session.set_always_show_solutions(true);
        assert_eq!(h.session.displayed_code(CMK).unwrap(), kms_block().full_solution);
        assert!(h.session.blank_positions(CMK).unwrap().is_empty());
        assert_eq!(h.session.effective_score(CMK), 10);
    }
}
