//! Per-block reveal bookkeeping
//!
//! Tracks which hints and answers a learner has uncovered for a code block,
//! whether the full solution was shown, and how many points that cost.
//! Reveals only ever grow until the step is reset.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::blanks::locate;
use super::editor::{HighlightKind, HighlightSpan};
use super::scoring::effective_score;
use super::tier::{RevealKind, Tier, select_skeleton};
use crate::lab::model::{CodeBlock, Hint};

/// Reveal state for one code block
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealState {
    /// Active tier
    pub tier: Tier,
    /// Hint indices whose nudge has been shown
    #[serde(default)]
    pub revealed_hints: BTreeSet<usize>,
    /// Hint indices whose exact answer has been shown
    #[serde(default)]
    pub revealed_answers: BTreeSet<usize>,
    /// Whether the full solution has been shown
    #[serde(default)]
    pub solution_revealed: bool,
    /// Points charged so far
    #[serde(default)]
    pub points_deducted: u32,
}

impl RevealState {
    /// Fresh state at the given tier
    pub fn new(tier: Tier) -> Self {
        Self { tier, ..Default::default() }
    }

    /// No help of any kind has been used
    pub fn is_pristine(&self) -> bool {
        self.revealed_hints.is_empty() && self.revealed_answers.is_empty() && !self.solution_revealed
    }

    /// Completion with this state counts as assisted
    pub fn is_assisted(&self) -> bool {
        !self.is_pristine()
    }

    /// Tier can only change while nothing has been revealed
    pub fn can_change_tier(&self) -> bool {
        self.is_pristine()
    }

    /// Reveal a hint nudge. Returns the points charged, 0 if already shown.
    pub fn reveal_hint(&mut self, hint_index: usize) -> u32 {
        if self.solution_revealed || !self.revealed_hints.insert(hint_index) {
            return 0;
        }
        self.charge(RevealKind::Hint)
    }

    /// Reveal an exact answer. Returns the points charged, 0 if already shown.
    pub fn reveal_answer(&mut self, hint_index: usize) -> u32 {
        if self.solution_revealed || !self.revealed_answers.insert(hint_index) {
            return 0;
        }
        self.charge(RevealKind::Answer)
    }

    /// Reveal the full solution. Returns the points charged, 0 if already shown.
    pub fn reveal_solution(&mut self) -> u32 {
        if self.solution_revealed {
            return 0;
        }
        self.solution_revealed = true;
        self.charge(RevealKind::Solution)
    }

    fn charge(&mut self, kind: RevealKind) -> u32 {
        let penalty = self.tier.penalty(kind);
        self.points_deducted += penalty;
        penalty
    }

    /// Ceiling for the tier minus deductions, floored at zero
    pub fn effective_score(&self) -> u32 {
        effective_score(self.tier, self.points_deducted)
    }

    /// Whether the answer for a hint is visible
    pub fn answer_shown(&self, hint_index: usize) -> bool {
        self.solution_revealed || self.revealed_answers.contains(&hint_index)
    }
}

/// The code a learner sees for a block.
///
/// Full solution once revealed (or when solutions are always shown),
/// otherwise the tier's skeleton. Revealed answers never modify this text.
pub fn displayed_code<'a>(block: &'a CodeBlock, state: &RevealState, always_show: bool) -> &'a str {
    if always_show || state.solution_revealed {
        &block.full_solution
    } else {
        select_skeleton(block, state.tier)
    }
}

/// Read-only variant of the skeleton with revealed answers written into
/// their blanks.
pub fn preview_with_answers(block: &CodeBlock, state: &RevealState, always_show: bool) -> String {
    if always_show || state.solution_revealed {
        return block.full_solution.clone();
    }
    substitute(select_skeleton(block, state.tier), &block.hints, state).0
}

/// Spans to highlight for revealed answers within `code`, the text returned
/// by `preview_with_answers`.
///
/// Each answer is searched on its hint's line. A match only counts when it
/// covers text a reveal wrote into a blank, so a token that was already in
/// the skeleton is never painted as an answer. Nothing is highlighted once
/// the full solution is showing.
pub fn answer_highlights(code: &str, block: &CodeBlock, state: &RevealState) -> Vec<HighlightSpan> {
    if state.solution_revealed {
        return Vec::new();
    }
    let (_, written) = substitute(select_skeleton(block, state.tier), &block.hints, state);
    let lines: Vec<&str> = code.split('\n').collect();
    let mut spans = Vec::new();

    for &index in &state.revealed_answers {
        let Some(hint) = block.hints.get(index) else {
            continue;
        };
        if hint.answer.is_empty() {
            continue;
        }
        let Some(text) = hint.line.checked_sub(1).and_then(|i| lines.get(i)) else {
            continue;
        };

        let len = hint.answer.chars().count();
        let fresh = char_matches(text, &hint.answer).find(|&start| {
            written
                .iter()
                .any(|w| w.line == hint.line && start < w.start + w.len && w.start < start + len)
        });
        if let Some(start) = fresh {
            spans.push(HighlightSpan { line: hint.line, start, len, kind: HighlightKind::Answer });
        }
    }

    spans
}

/// Write revealed answers into their blanks, left to right per line.
///
/// Returns the new text and where each answer landed in it. A blank that
/// overlaps one already filled on the same line is skipped.
fn substitute(skeleton: &str, hints: &[Hint], state: &RevealState) -> (String, Vec<HighlightSpan>) {
    let mut positions: Vec<_> = locate(skeleton, hints)
        .into_iter()
        .filter(|p| state.revealed_answers.contains(&p.hint_index))
        .collect();
    positions.sort_by_key(|p| (p.line, p.char_start));

    let mut written = Vec::new();
    let lines: Vec<String> = skeleton
        .split('\n')
        .enumerate()
        .map(|(i, line)| {
            let chars: Vec<char> = line.chars().collect();
            let mut out = String::with_capacity(line.len());
            // Characters consumed from the skeleton line and emitted to `out`
            let mut consumed = 0;
            let mut emitted = 0;

            for p in positions.iter().filter(|p| p.line == i + 1) {
                if p.char_start < consumed || p.char_start > chars.len() {
                    continue;
                }
                let answer = &hints[p.hint_index].answer;
                let len = answer.chars().count();
                out.extend(&chars[consumed..p.char_start]);
                emitted += p.char_start - consumed;
                out.push_str(answer);
                written.push(HighlightSpan { line: i + 1, start: emitted, len, kind: HighlightKind::Answer });
                emitted += len;
                consumed = (p.char_start + p.char_length).min(chars.len());
            }
            out.extend(&chars[consumed..]);
            out
        })
        .collect();

    (lines.join("\n"), written)
}

/// Character offsets of each non-overlapping occurrence of `needle`
fn char_matches<'a>(text: &'a str, needle: &'a str) -> impl Iterator<Item = usize> + 'a {
    text.match_indices(needle).map(move |(byte, _)| text[..byte].chars().count())
}
