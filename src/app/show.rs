//! Plain-text rendering of a step for `lab-coach show`

use std::fmt::Write;

use crate::exercise::blanks::locate;
use crate::exercise::editor::{CellPosition, EditorSurface, HighlightKind, HighlightSpan, MarkerState, place_markers};
use crate::exercise::reveal::{self, RevealState};
use crate::exercise::tier::{Tier, has_skeleton_for};
use crate::lab::model::{CodeBlock, Lab, VerifySpec};

use super::session::SessionError;

const WRAP_WIDTH: usize = 80;

/// What to reveal when printing a step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShowOptions {
    pub tier: Tier,
    pub solution: bool,
    pub answers: bool,
}

impl ShowOptions {
    fn reveal_state(&self, block: &CodeBlock) -> RevealState {
        let mut state = RevealState::new(self.tier);
        state.solution_revealed = self.solution;
        if self.answers {
            state.revealed_answers = (0..block.hints.len()).collect();
        }
        state
    }
}

/// Editor surface over plain lines, no gutter
#[derive(Debug, Default)]
struct TextSurface {
    top: usize,
    highlights: Vec<HighlightSpan>,
}

impl EditorSurface for TextSurface {
    fn cursor_position(&self, line: usize, column: usize) -> Option<CellPosition> {
        if line <= self.top || column == 0 {
            return None;
        }
        Some(CellPosition { x: (column - 1) as u16, y: (line - 1 - self.top) as u16 })
    }

    fn apply_highlight(&mut self, spans: &[HighlightSpan]) {
        self.highlights = spans.to_vec();
    }

    fn on_scroll(&mut self, top: usize, _left: usize) {
        self.top = top;
    }
}

/// Render one step (0-indexed) as text
pub fn render_step(lab: &Lab, step_index: usize, options: &ShowOptions) -> Result<String, SessionError> {
    let step = lab.step(step_index).ok_or(SessionError::NoSuchStep(step_index))?;
    let mut out = String::new();

    let _ = writeln!(out, "Lab {}: {}", lab.number, lab.title);
    let _ = writeln!(out, "Step {}/{}: {}", step_index + 1, lab.steps.len(), step.title);
    if !step.description.is_empty() {
        out.push('\n');
        for line in textwrap::wrap(&step.description, WRAP_WIDTH) {
            let _ = writeln!(out, "{line}");
        }
    }

    for block in &step.code_blocks {
        out.push('\n');
        render_block(&mut out, block, options);
    }

    match &step.verify {
        Some(VerifySpec::Command { program, args, expect }) => {
            let _ = write!(out, "\nVerify: {} {}", program, args.join(" "));
            if let Some(expect) = expect {
                let _ = write!(out, " (expects `{expect}`)");
            }
            out.push('\n');
        }
        Some(VerifySpec::Manual { message }) => {
            let _ = writeln!(out, "\nVerify: manual ({message})");
        }
        None => {}
    }

    Ok(out)
}

fn render_block(out: &mut String, block: &CodeBlock, options: &ShowOptions) {
    let state = options.reveal_state(block);
    let what = if state.solution_revealed {
        "solution".to_string()
    } else if !has_skeleton_for(block, state.tier) {
        format!("{}, no skeleton authored, showing solution", state.tier)
    } else {
        format!("{}, {} points", state.tier, state.tier.ceiling())
    };
    let _ = writeln!(out, "-- {} ({}) [{}] --", block.filename, block.language, what);

    let mut surface = TextSurface::default();
    let lines = if options.answers && !state.solution_revealed {
        let code = reveal::preview_with_answers(block, &state, false);
        surface.apply_highlight(&reveal::answer_highlights(&code, block, &state));
        bracket_answers(&code, &surface.highlights)
    } else {
        let code = reveal::displayed_code(block, &state, false);
        let positions = locate(code, &block.hints);
        surface.on_scroll(0, 0);
        let markers = place_markers(&surface, &positions, &state);
        let mut grid: Vec<Vec<char>> = code.split('\n').map(|l| l.chars().collect()).collect();
        for marker in markers.iter().filter(|m| m.state == MarkerState::Idle) {
            if let Some(cell) =
                grid.get_mut(marker.at.y as usize).and_then(|row| row.get_mut(marker.at.x as usize))
            {
                *cell = '?';
            }
        }
        grid.into_iter().map(|row| row.into_iter().collect()).collect()
    };

    for (i, line) in lines.iter().enumerate() {
        let _ = writeln!(out, "{:>3} | {}", i + 1, line);
    }

    if !block.hints.is_empty() && !state.solution_revealed {
        let _ = writeln!(out, "Hints:");
        for (i, hint) in block.hints.iter().enumerate() {
            let _ = write!(out, "  {}. line {}: {}", i + 1, hint.line, hint.hint);
            if state.answer_shown(i) {
                let _ = write!(out, " -> {}", hint.answer);
            }
            out.push('\n');
        }
    }
}

/// Wrap each answer span in brackets
fn bracket_answers(code: &str, spans: &[HighlightSpan]) -> Vec<String> {
    code.split('\n')
        .enumerate()
        .map(|(i, line)| {
            let mut line_spans: Vec<&HighlightSpan> =
                spans.iter().filter(|s| s.line == i + 1 && s.kind == HighlightKind::Answer).collect();
            line_spans.sort_by_key(|s| std::cmp::Reverse(s.start));

            let mut chars: Vec<char> = line.chars().collect();
            for span in line_spans {
                let end = (span.start + span.len).min(chars.len());
                if span.start > end {
                    continue;
                }
                chars.insert(end, ']');
                chars.insert(span.start, '[');
            }
            chars.into_iter().collect()
        })
        .collect()
}
