//! Authoring audit for hints and skeletons
//!
//! At runtime a hint that points at the wrong line just loses its marker.
//! This pass surfaces those silent drops so authors can fix them.

use std::fmt;

use super::model::{BlockKey, CodeBlock, Lab};

/// Why a hint would not get a marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LintReason {
    /// The hint's line is past the end of the skeleton
    LineOutOfRange,
    /// The referenced line does not contain the hint's blank text
    BlankNotFoundOnLine,
    /// The hint has nothing to reveal as an answer
    EmptyAnswer,
}

impl fmt::Display for LintReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LintReason::LineOutOfRange => write!(f, "line out of range"),
            LintReason::BlankNotFoundOnLine => write!(f, "blank not found on line"),
            LintReason::EmptyAnswer => write!(f, "empty answer"),
        }
    }
}

/// One inconsistency between a hint and its skeleton
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintFinding {
    pub step_id: String,
    pub block: BlockKey,
    pub filename: String,
    pub hint_index: usize,
    pub hint_line: usize,
    pub blank_text: String,
    pub reason: LintReason,
    /// Number of lines in the guided skeleton
    pub skeleton_lines: usize,
    /// Trimmed start of the offending line, when it exists
    pub line_preview: Option<String>,
}

impl fmt::Display for LintFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {} hint #{} (line {}, `{}`): {}",
            self.step_id,
            self.block,
            self.filename,
            self.hint_index,
            self.hint_line,
            self.blank_text,
            self.reason
        )?;
        match (&self.line_preview, self.reason) {
            (Some(preview), _) => write!(f, " | {preview}"),
            (None, LintReason::LineOutOfRange) => {
                write!(f, " | skeleton has {} lines", self.skeleton_lines)
            }
            (None, _) => Ok(()),
        }
    }
}

const PREVIEW_CHARS: usize = 80;

/// Audit every block with a guided skeleton and hints
pub fn lint_lab(lab: &Lab) -> Vec<LintFinding> {
    let mut findings = Vec::new();
    for (step_index, step) in lab.steps.iter().enumerate() {
        for (block_index, block) in step.code_blocks.iter().enumerate() {
            let key = BlockKey::new(step_index, block_index);
            findings.extend(lint_block(&step.id, key, block));
        }
    }
    findings
}

/// Audit one block's hints against its guided skeleton.
///
/// Challenge and expert skeletons are intentionally sparse and usually carry
/// no literal blanks, so only the guided rendering is held to the hints.
pub fn lint_block(step_id: &str, key: BlockKey, block: &CodeBlock) -> Vec<LintFinding> {
    let Some(skeleton) = block.skeletons.guided.as_deref() else {
        return Vec::new();
    };
    let lines: Vec<&str> = skeleton.split('\n').collect();

    let finding = |hint_index: usize, reason: LintReason, preview: Option<String>| {
        let hint = &block.hints[hint_index];
        LintFinding {
            step_id: step_id.to_string(),
            block: key,
            filename: block.filename.clone(),
            hint_index,
            hint_line: hint.line,
            blank_text: hint.blank_text.clone(),
            reason,
            skeleton_lines: lines.len(),
            line_preview: preview,
        }
    };

    let mut findings = Vec::new();
    for (i, hint) in block.hints.iter().enumerate() {
        if hint.answer.trim().is_empty() {
            findings.push(finding(i, LintReason::EmptyAnswer, None));
        }

        let line = hint.line.checked_sub(1).and_then(|idx| lines.get(idx));
        match line {
            None => findings.push(finding(i, LintReason::LineOutOfRange, None)),
            Some(text) if hint.blank_text.is_empty() || !text.contains(&hint.blank_text) => {
                let preview: String = text.trim().chars().take(PREVIEW_CHARS).collect();
                findings.push(finding(i, LintReason::BlankNotFoundOnLine, Some(preview)));
            }
            Some(_) => {}
        }
    }
    findings
}
