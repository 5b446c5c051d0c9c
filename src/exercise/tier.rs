//! Difficulty tiers and their scoring rules

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::lab::model::CodeBlock;

/// Scaffolding level for a code block
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Skeleton with literal blanks and inline hints
    #[default]
    Guided,
    /// Requirements only, less structure
    Challenge,
    /// Objective only
    Expert,
}

/// The kind of help a learner can pay for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevealKind {
    Hint,
    Answer,
    Solution,
}

impl Tier {
    /// All tiers from most to least scaffolded
    pub const ALL: [Tier; 3] = [Tier::Guided, Tier::Challenge, Tier::Expert];

    /// Points available when no help is used
    pub fn ceiling(self) -> u32 {
        match self {
            Tier::Guided => 10,
            Tier::Challenge => 15,
            Tier::Expert => 25,
        }
    }

    /// Points deducted for one reveal of the given kind
    pub fn penalty(self, kind: RevealKind) -> u32 {
        match (kind, self) {
            (RevealKind::Hint, Tier::Guided) => 1,
            (RevealKind::Hint, Tier::Challenge) => 2,
            (RevealKind::Hint, Tier::Expert) => 3,
            (RevealKind::Answer, Tier::Guided) => 2,
            (RevealKind::Answer, Tier::Challenge) => 3,
            (RevealKind::Answer, Tier::Expert) => 5,
            (RevealKind::Solution, Tier::Guided) => 5,
            (RevealKind::Solution, Tier::Challenge) => 8,
            (RevealKind::Solution, Tier::Expert) => 15,
        }
    }

    /// Tiers whose skeletons may stand in for this one, in preference order
    fn fallback_chain(self) -> &'static [Tier] {
        match self {
            Tier::Guided => &[Tier::Guided],
            Tier::Challenge => &[Tier::Challenge, Tier::Guided],
            Tier::Expert => &[Tier::Expert, Tier::Challenge, Tier::Guided],
        }
    }

    /// Next tier when cycling
    pub fn next(self) -> Tier {
        match self {
            Tier::Guided => Tier::Challenge,
            Tier::Challenge => Tier::Expert,
            Tier::Expert => Tier::Guided,
        }
    }

    /// Display label
    pub fn label(self) -> &'static str {
        match self {
            Tier::Guided => "Guided",
            Tier::Challenge => "Challenge",
            Tier::Expert => "Expert",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "guided" | "g" => Ok(Tier::Guided),
            "challenge" | "c" => Ok(Tier::Challenge),
            "expert" | "e" => Ok(Tier::Expert),
            other => Err(format!("unknown tier '{other}' (expected guided, challenge or expert)")),
        }
    }
}

/// Skeleton shown for `tier`, falling back toward more scaffolding and
/// finally to the full solution when nothing was authored.
pub fn select_skeleton(block: &CodeBlock, tier: Tier) -> &str {
    tier.fallback_chain()
        .iter()
        .find_map(|t| block.skeletons.get(*t))
        .unwrap_or(&block.full_solution)
}

/// Whether `select_skeleton` returned an authored skeleton rather than the solution
pub fn has_skeleton_for(block: &CodeBlock, tier: Tier) -> bool {
    tier.fallback_chain().iter().any(|t| block.skeletons.get(*t).is_some())
}
