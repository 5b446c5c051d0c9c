//! Usage telemetry
//!
//! Reveal and completion events go to an injected sink. Recording never
//! fails from the caller's point of view.

pub mod leaderboard;

use serde::{Deserialize, Serialize};

use crate::lab::model::BlockKey;

pub use leaderboard::LeaderboardSink;

/// Something the learner did that is worth reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TelemetryEvent {
    HintRevealed { lab_number: u32, step_id: String, block: BlockKey, hint_index: usize, penalty: u32 },
    AnswerRevealed { lab_number: u32, step_id: String, block: BlockKey, hint_index: usize, penalty: u32 },
    SolutionRevealed { lab_number: u32, step_id: String, block: BlockKey, penalty: u32 },
    StepCompleted { lab_number: u32, step_id: String, assisted: bool, points: u32 },
}

impl TelemetryEvent {
    pub fn lab_number(&self) -> u32 {
        match self {
            Self::HintRevealed { lab_number, .. }
            | Self::AnswerRevealed { lab_number, .. }
            | Self::SolutionRevealed { lab_number, .. }
            | Self::StepCompleted { lab_number, .. } => *lab_number,
        }
    }

    pub fn step_id(&self) -> &str {
        match self {
            Self::HintRevealed { step_id, .. }
            | Self::AnswerRevealed { step_id, .. }
            | Self::SolutionRevealed { step_id, .. }
            | Self::StepCompleted { step_id, .. } => step_id,
        }
    }
}

/// Destination for telemetry events
pub trait TelemetrySink: Send + Sync {
    fn record(&self, event: &TelemetryEvent);
}

/// Drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl TelemetrySink for NullSink {
    fn record(&self, _event: &TelemetryEvent) {}
}

/// Writes events to the log
#[derive(Debug, Default, Clone)]
pub struct TracingSink {
    user: Option<String>,
}

impl TracingSink {
    pub fn new(user: Option<String>) -> Self {
        Self { user }
    }
}

impl TelemetrySink for TracingSink {
    fn record(&self, event: &TelemetryEvent) {
        let user = self.user.as_deref().unwrap_or("anonymous");
        match serde_json::to_string(event) {
            Ok(json) => tracing::info!(target: "lab_coach::telemetry", user, "{}", json),
            Err(e) => tracing::warn!("Failed to encode telemetry event: {}", e),
        }
    }
}

/// Fans one event out to several sinks
#[derive(Default)]
pub struct MultiSink {
    sinks: Vec<Box<dyn TelemetrySink>>,
}

impl MultiSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl TelemetrySink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

impl TelemetrySink for MultiSink {
    fn record(&self, event: &TelemetryEvent) {
        for sink in &self.sinks {
            sink.record(event);
        }
    }
}


#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::testing::RecordingSink;
    use super::*;

    #[test]
    fn events_serialize_with_type_tag() {
        let event = TelemetryEvent::HintRevealed {
            lab_number: 1,
            step_id: "cmk".into(),
            block: BlockKey::new(2, 0),
            hint_index: 1,
            penalty: 2,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "hint_revealed");
        assert_eq!(json["block"], "2-0");
        assert_eq!(json["penalty"], 2);
    }

    #[test]
    fn multi_sink_forwards_to_all() {
        let first = RecordingSink::default();
        let second = RecordingSink::default();
        let sink = MultiSink::new().with(first.clone()).with(second.clone()).with(NullSink);

        let event =
            TelemetryEvent::StepCompleted { lab_number: 2, step_id: "dek".into(), assisted: false, points: 15 };
        sink.record(&event);

        assert_eq!(first.events(), vec![event.clone()]);
        assert_eq!(second.events(), vec![event]);
    }

    #[test]
    fn accessors_cover_every_variant() {
        let event = TelemetryEvent::SolutionRevealed {
            lab_number: 3,
            step_id: "qe".into(),
            block: BlockKey::new(0, 1),
            penalty: 15,
        };
        assert_eq!(event.lab_number(), 3);
        assert_eq!(event.step_id(), "qe");
    }
}
