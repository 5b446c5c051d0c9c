//! Fill-in-the-blank exercise mechanics
//!
//! Tier selection, blank location, reveal bookkeeping and scoring. Everything
//! here is synchronous and storage-agnostic.

pub mod blanks;
pub mod editor;
pub mod reveal;
pub mod scoring;
pub mod tier;

pub use blanks::{BlankPosition, locate};
pub use editor::{EditorSurface, HighlightKind, HighlightSpan, MarkerState, PlacedMarker, place_markers};
pub use reveal::{RevealState, answer_highlights, displayed_code, preview_with_answers};
pub use tier::{RevealKind, Tier, select_skeleton};
