//! Content model for labs
//!
//! A lab is an ordered list of steps. Each step carries up to a couple of code
//! blocks, and each block has a full solution plus authored skeletons with
//! blanks for the learner to fill in. Content is authored once and never
//! mutated at runtime; only progress over it is tracked.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::exercise::tier::Tier;

/// A hint attached to one blank in a skeleton
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    /// Line number in the skeleton (1-indexed)
    pub line: usize,
    /// The blank pattern as written in the skeleton, e.g. "_________"
    pub blank_text: String,
    /// Conceptual nudge
    pub hint: String,
    /// Exact text that fills the blank
    pub answer: String,
}

impl Hint {
    /// Create a new hint
    pub fn new(
        line: usize,
        blank_text: impl Into<String>,
        hint: impl Into<String>,
        answer: impl Into<String>,
    ) -> Self {
        Self { line, blank_text: blank_text.into(), hint: hint.into(), answer: answer.into() }
    }
}

/// Authored skeleton texts, one per tier
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skeletons {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guided: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expert: Option<String>,
}

impl Skeletons {
    /// The skeleton authored for exactly this tier, without fallback
    pub fn get(&self, tier: Tier) -> Option<&str> {
        match tier {
            Tier::Guided => self.guided.as_deref(),
            Tier::Challenge => self.challenge.as_deref(),
            Tier::Expert => self.expert.as_deref(),
        }
    }

    /// True when no tier has an authored skeleton
    fn is_empty(&self) -> bool {
        self.guided.is_none() && self.challenge.is_none() && self.expert.is_none()
    }
}

/// One editable code block within a step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeBlock {
    /// Name shown above the editor (e.g. "Terminal", "createKey.cjs")
    pub filename: String,
    /// Language used for highlighting
    #[serde(default = "default_language")]
    pub language: String,
    /// Ground-truth solution
    #[serde(alias = "code")]
    pub full_solution: String,
    /// Blanked renderings of the solution
    #[serde(default, skip_serializing_if = "Skeletons::is_empty")]
    pub skeletons: Skeletons,
    /// Hints in authoring order
    #[serde(default, alias = "inlineHints")]
    pub hints: Vec<Hint>,
}

fn default_language() -> String {
    "bash".to_string()
}

impl CodeBlock {
    /// Create a block with only a full solution
    pub fn new(filename: impl Into<String>, language: impl Into<String>, solution: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            language: language.into(),
            full_solution: solution.into(),
            skeletons: Skeletons::default(),
            hints: Vec::new(),
        }
    }

    /// Builder: set the skeleton for a tier
    pub fn with_skeleton(mut self, tier: Tier, skeleton: impl Into<String>) -> Self {
        let skeleton = Some(skeleton.into());
        match tier {
            Tier::Guided => self.skeletons.guided = skeleton,
            Tier::Challenge => self.skeletons.challenge = skeleton,
            Tier::Expert => self.skeletons.expert = skeleton,
        }
        self
    }

    /// Builder: set the hints
    pub fn with_hints(mut self, hints: Vec<Hint>) -> Self {
        self.hints = hints;
        self
    }
}

/// How a step is checked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum VerifySpec {
    /// Run an allow-listed program and look for `expect` in its output
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expect: Option<String>,
    },
    /// Self-checked step; always passes with the given message
    Manual { message: String },
}

/// A single step of a lab
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub code_blocks: Vec<CodeBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify: Option<VerifySpec>,
}

impl Step {
    /// Whether the step has any code the learner must work through
    pub fn has_code(&self) -> bool {
        !self.code_blocks.is_empty()
    }
}

/// A complete lab
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lab {
    /// Lab number, used to namespace persisted progress
    pub number: u32,
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub steps: Vec<Step>,
}

impl Lab {
    /// Get a step by index
    pub fn step(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    /// Get a code block by key
    pub fn block(&self, key: BlockKey) -> Option<&CodeBlock> {
        self.steps.get(key.step).and_then(|s| s.code_blocks.get(key.block))
    }

    /// All block keys belonging to a step. The first one is the primary
    /// block, whose reveals decide whether a completion was assisted.
    pub fn block_keys(&self, step: usize) -> Vec<BlockKey> {
        self.steps
            .get(step)
            .map(|s| (0..s.code_blocks.len()).map(|block| BlockKey::new(step, block)).collect())
            .unwrap_or_default()
    }
}

/// Identifies a code block within a lab: step index plus block index.
///
/// Serialized as `"<step>-<block>"` so it can key JSON maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct BlockKey {
    pub step: usize,
    pub block: usize,
}

impl BlockKey {
    pub fn new(step: usize, block: usize) -> Self {
        Self { step, block }
    }
}

impl fmt::Display for BlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.step, self.block)
    }
}

impl FromStr for BlockKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (step, block) = s.split_once('-').ok_or_else(|| format!("invalid block key: {s}"))?;
        let step = step.trim().parse().map_err(|_| format!("invalid step index in block key: {s}"))?;
        let block =
            block.trim().parse().map_err(|_| format!("invalid block index in block key: {s}"))?;
        Ok(Self { step, block })
    }
}

impl From<BlockKey> for String {
    fn from(key: BlockKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for BlockKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_key_round_trips_through_string() {
        let key = BlockKey::new(2, 1);
        assert_eq!(key.to_string(), "2-1");
        assert_eq!("2-1".parse::<BlockKey>(), Ok(key));
    }

    #[test]
    fn block_key_rejects_garbage() {
        assert!("2".parse::<BlockKey>().is_err());
        assert!("a-b".parse::<BlockKey>().is_err());
    }

    #[test]
    fn code_block_accepts_authoring_aliases() {
        let json = r#"{
            "filename": "Terminal",
            "code": "aws kms create-key",
            "skeletons": { "guided": "aws kms ________" },
            "inlineHints": [
                { "line": 1, "blankText": "________", "hint": "make a key", "answer": "create-key" }
            ]
        }"#;
        let block: CodeBlock = serde_json::from_str(json).unwrap();
        assert_eq!(block.language, "bash");
        assert_eq!(block.full_solution, "aws kms create-key");
        assert_eq!(block.skeletons.get(Tier::Guided), Some("aws kms ________"));
        assert_eq!(block.hints.len(), 1);
    }

    #[test]
    fn verify_spec_is_tagged() {
        let json = r#"{ "kind": "command", "program": "aws", "args": ["--version"], "expect": "aws-cli" }"#;
        let spec: VerifySpec = serde_json::from_str(json).unwrap();
        assert!(matches!(spec, VerifySpec::Command { ref program, .. } if program == "aws"));
    }

    #[test]
    fn lab_block_lookup() {
        let lab = Lab {
            number: 1,
            id: "lab".into(),
            title: "Lab".into(),
            description: String::new(),
            steps: vec![Step {
                id: "s1".into(),
                title: "Step".into(),
                description: String::new(),
                code_blocks: vec![CodeBlock::new("a", "bash", "x"), CodeBlock::new("b", "bash", "y")],
                verify: None,
            }],
        };
        assert_eq!(lab.block(BlockKey::new(0, 1)).map(|b| b.filename.as_str()), Some("b"));
        assert!(lab.block(BlockKey::new(1, 0)).is_none());
        assert_eq!(lab.block_keys(0), vec![BlockKey::new(0, 0), BlockKey::new(0, 1)]);
    }
}
