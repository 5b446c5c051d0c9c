//! Persisted progress for one lab

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::exercise::reveal::RevealState;
use crate::exercise::tier::Tier;
use crate::lab::model::BlockKey;
use crate::verify::VerifyResult;

/// Everything remembered about a learner's pass through a lab
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabRecord {
    /// Steps that passed verification since their last reset
    pub completed_steps: BTreeSet<usize>,

    /// Step the learner was last on
    pub current_step: usize,

    /// Last verification result per step
    pub outputs: BTreeMap<usize, VerifyResult>,

    /// Reveal state per code block
    pub blocks: BTreeMap<BlockKey, RevealState>,
}

impl LabRecord {
    pub fn is_completed(&self, step: usize) -> bool {
        self.completed_steps.contains(&step)
    }

    /// Reveal state for a block, if it was ever touched
    pub fn block(&self, key: BlockKey) -> Option<&RevealState> {
        self.blocks.get(&key)
    }

    /// Reveal state for a block, created at `tier` when missing
    pub fn block_mut(&mut self, key: BlockKey, tier: Tier) -> &mut RevealState {
        self.blocks.entry(key).or_insert_with(|| RevealState::new(tier))
    }

    /// Forget completion, output and reveals for exactly one step
    pub fn clear_step(&mut self, step: usize) {
        self.completed_steps.remove(&step);
        self.outputs.remove(&step);
        self.blocks.retain(|key, _| key.step != step);
    }

    /// Number of completed steps
    pub fn completed_count(&self) -> usize {
        self.completed_steps.len()
    }
}
