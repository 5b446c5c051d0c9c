//! Point arithmetic for tiers and completions
//!
//! A block starts at its tier's ceiling and loses points with each reveal.

use super::reveal::RevealState;
use super::tier::Tier;

/// Points for completing a step that has no code to work through
pub const BASE_STEP_POINTS: u32 = 10;

/// Ceiling for `tier` minus deductions, never below zero
pub fn effective_score(tier: Tier, points_deducted: u32) -> u32 {
    tier.ceiling().saturating_sub(points_deducted)
}

/// Points awarded when a step is verified.
///
/// Steps with code earn what is left of the primary block's tier ceiling;
/// steps without code earn the base award, halved when assisted.
pub fn completion_points(primary: Option<&RevealState>, has_code: bool, assisted: bool) -> u32 {
    match primary {
        Some(state) if has_code => state.effective_score(),
        None if has_code => Tier::default().ceiling(),
        _ if assisted => BASE_STEP_POINTS / 2,
        _ => BASE_STEP_POINTS,
    }
}
