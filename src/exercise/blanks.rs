//! Locating blanks in skeleton text
//!
//! Each hint names a line and the literal blank it refers to. The locator
//! turns that into an exact span so markers and answer substitution land on
//! the right underscores, even when several blanks share a line.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::lab::model::Hint;

/// Runs of two or more underscores
static UNDERSCORE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"_{2,}").expect("valid regex"));

/// Where a hint's blank sits in the skeleton. Derived, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlankPosition {
    /// Index of the hint in authoring order
    pub hint_index: usize,
    /// Line number (1-indexed)
    pub line: usize,
    /// Marker column (1-indexed), the midpoint of the blank
    pub column: usize,
    /// Start of the blank within the line, in characters (0-indexed)
    pub char_start: usize,
    /// Length of the blank in characters
    pub char_length: usize,
}

/// A matched span within one line, in bytes
#[derive(Debug, Clone, Copy)]
struct Match {
    start: usize,
    end: usize,
}

/// Find the blank for each hint, in hint order.
///
/// Hints pointing past the end of the skeleton, or whose line has neither the
/// literal blank nor an underscore run at their ordinal, produce nothing.
pub fn locate(skeleton: &str, hints: &[Hint]) -> Vec<BlankPosition> {
    let lines: Vec<&str> = skeleton.split('\n').collect();
    // Byte offset per line past which the next explicit search starts
    let mut cursors: HashMap<usize, usize> = HashMap::new();
    let mut positions = Vec::with_capacity(hints.len());

    for (hint_index, hint) in hints.iter().enumerate() {
        let Some(line_idx) = hint.line.checked_sub(1) else {
            continue;
        };
        let Some(text) = lines.get(line_idx).copied() else {
            continue;
        };

        let cursor = cursors.entry(line_idx).or_insert(0);
        let found = match explicit_match(text, &hint.blank_text, *cursor) {
            Some(m) => {
                *cursor = m.end;
                Some(m)
            }
            None => fallback_match(text, ordinal_on_line(hints, hint_index)),
        };

        if let Some(m) = found {
            positions.push(to_position(text, hint_index, hint.line, m));
        }
    }

    positions
}

/// First occurrence of `blank` at or after `from`
fn explicit_match(text: &str, blank: &str, from: usize) -> Option<Match> {
    if blank.is_empty() || from > text.len() {
        return None;
    }
    let rest = text.get(from..)?;
    rest.find(blank).map(|offset| {
        let start = from + offset;
        Match { start, end: start + blank.len() }
    })
}

/// The `ordinal`-th underscore run on the line
fn fallback_match(text: &str, ordinal: usize) -> Option<Match> {
    underscore_runs(text).into_iter().nth(ordinal)
}

fn underscore_runs(text: &str) -> Vec<Match> {
    UNDERSCORE_RUN.find_iter(text).map(|m| Match { start: m.start(), end: m.end() }).collect()
}

/// How many earlier hints target the same line
fn ordinal_on_line(hints: &[Hint], hint_index: usize) -> usize {
    let line = hints[hint_index].line;
    hints[..hint_index].iter().filter(|h| h.line == line).count()
}

fn to_position(text: &str, hint_index: usize, line: usize, m: Match) -> BlankPosition {
    let char_start = text[..m.start].chars().count();
    let char_length = text[m.start..m.end].chars().count();
    BlankPosition {
        hint_index,
        line,
        column: char_start + char_length / 2 + 1,
        char_start,
        char_length,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    use super::*;

    fn hint(line: usize, blank: &str, answer: &str) -> Hint {
        Hint::new(line, blank, "hint", answer)
    }

    #[test]
    fn empty_hint_list_yields_nothing() {
        assert!(locate("a ___ b", &[]).is_empty());
    }

    #[test]
    fn two_blanks_on_one_line_resolve_left_to_right() {
        let skeleton = "KMS_KEY_ID=$(aws _________ --query 'KeyMetadata._______')";
        let hints = vec![hint(1, "_________", "create-key"), hint(1, "_______", "KeyId")];

        let positions = locate(skeleton, &hints);

        assert_eq!(
            positions,
            vec![
                BlankPosition { hint_index: 0, line: 1, column: 22, char_start: 17, char_length: 9 },
                BlankPosition { hint_index: 1, line: 1, column: 52, char_start: 48, char_length: 7 },
            ]
        );
        assert!(positions[0].char_start + positions[0].char_length <= positions[1].char_start);
    }

    #[test]
    fn identical_blanks_on_a_line_advance_the_cursor() {
        let skeleton = "db.___.insertOne({ ___: 1 })";
        let hints = vec![hint(1, "___", "people"), hint(1, "___", "name")];

        let positions = locate(skeleton, &hints);

        assert_eq!(positions.len(), 2);
        assert_eq!(positions[0].char_start, 3);
        assert_eq!(positions[1].char_start, 19);
    }

    #[test]
    fn out_of_range_line_is_dropped() {
        let hints = vec![hint(3, "___", "x"), hint(0, "___", "y"), hint(1, "___", "z")];
        let positions = locate("___\n", &hints);
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].hint_index, 2);
    }

    #[test]
    fn fallback_uses_ordinal_among_same_line_hints() {
        // Authored blank text no longer matches the skeleton exactly
        let skeleton = "first\nrun __ then ____ then ______";
        let hints = vec![
            hint(2, "________", "a"),
            hint(1, "___", "unrelated"),
            hint(2, "________", "b"),
            hint(2, "________", "c"),
        ];

        let positions = locate(skeleton, &hints);

        let starts: Vec<(usize, usize)> =
            positions.iter().map(|p| (p.hint_index, p.char_start)).collect();
        assert_eq!(starts, vec![(0, 4), (2, 12), (3, 22)]);
    }

    #[test]
    fn fallback_without_enough_runs_drops_hint() {
        let hints = vec![hint(1, "zzz", "a"), hint(1, "zzz", "b")];
        let positions = locate("only __ here", &hints);
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].hint_index, 0);
    }

    #[test]
    fn single_underscores_are_not_blanks() {
        assert!(locate("KMS_KEY_ID=1", &[hint(1, "?", "a")]).is_empty());
    }

    #[test]
    fn columns_are_counted_in_characters() {
        let skeleton = "é → ____";
        let positions = locate(skeleton, &[hint(1, "____", "x")]);
        assert_eq!(positions[0].char_start, 4);
        assert_eq!(positions[0].column, 7);
    }

    proptest! {
        #[test]
        fn never_points_past_the_last_line(
            skeleton in "[a-z_ \n]{0,80}",
            lines in proptest::collection::vec(0usize..8, 0..6),
        ) {
            let hints: Vec<Hint> = lines.iter().map(|l| hint(*l, "__", "a")).collect();
            let total = skeleton.split('\n').count();
            for p in locate(&skeleton, &hints) {
                prop_assert!(p.line >= 1 && p.line <= total);
                prop_assert!(p.char_length >= 2);
            }
        }
    }
}
