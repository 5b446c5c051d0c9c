//! HTTP leaderboard sink

use std::time::Duration;

use reqwest::Client;
use serde_json::{Value, json};

use super::{TelemetryEvent, TelemetrySink};

/// Posts events to the workshop leaderboard service.
///
/// Requests are spawned onto the current tokio runtime and never awaited;
/// failures only reach the log.
#[derive(Debug, Clone)]
pub struct LeaderboardSink {
    client: Client,
    base_url: String,
    email: String,
}

impl LeaderboardSink {
    const TIMEOUT: Duration = Duration::from_secs(10);

    /// Every event is a point entry; reveals post their penalty as negative
    /// points under a shared step id.
    pub const ADD_POINTS: &'static str = "/api/leaderboard/add-points";

    pub fn new(base_url: impl Into<String>, email: impl Into<String>) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(Self::TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            email: email.into(),
        })
    }

    /// JSON body for an event
    pub fn payload(&self, event: &TelemetryEvent) -> Value {
        let (step_id, points, assisted) = match event {
            TelemetryEvent::StepCompleted { points, assisted, .. } => {
                (event.step_id(), i64::from(*points), *assisted)
            }
            TelemetryEvent::HintRevealed { penalty, .. } | TelemetryEvent::AnswerRevealed { penalty, .. } => {
                ("hint-usage", -i64::from(*penalty), false)
            }
            TelemetryEvent::SolutionRevealed { penalty, .. } => ("solution-reveal", -i64::from(*penalty), false),
        };
        json!({
            "email": self.email,
            "stepId": step_id,
            "labNumber": event.lab_number(),
            "points": points,
            "assisted": assisted,
        })
    }
}

impl TelemetrySink for LeaderboardSink {
    fn record(&self, event: &TelemetryEvent) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("No runtime available, dropping leaderboard event");
            return;
        };

        let body = self.payload(event);
        let url = format!("{}{}", self.base_url, Self::ADD_POINTS);
        let client = self.client.clone();

        handle.spawn(async move {
            match client.post(&url).json(&body).send().await {
                Ok(response) if response.status().is_success() => {
                    tracing::debug!(%url, "leaderboard event delivered");
                }
                Ok(response) => {
                    tracing::warn!(%url, status = response.status().as_u16(), "leaderboard rejected event");
                }
                Err(e) => tracing::warn!(%url, "Failed to send leaderboard event: {}", e),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::lab::model::BlockKey;

    fn sink() -> LeaderboardSink {
        LeaderboardSink::new("http://localhost:5173/", "learner@example.com").unwrap()
    }

    #[test]
    fn completion_posts_points() {
        let event =
            TelemetryEvent::StepCompleted { lab_number: 1, step_id: "cmk".into(), assisted: true, points: 7 };
        assert_eq!(
            sink().payload(&event),
            json!({
                "email": "learner@example.com",
                "stepId": "cmk",
                "labNumber": 1,
                "points": 7,
                "assisted": true,
            })
        );
    }

    #[test]
    fn reveals_deduct_points_as_hint_usage() {
        let event = TelemetryEvent::AnswerRevealed {
            lab_number: 1,
            step_id: "cmk".into(),
            block: BlockKey::new(1, 0),
            hint_index: 0,
            penalty: 2,
        };
        assert_eq!(
            sink().payload(&event),
            json!({
                "email": "learner@example.com",
                "stepId": "hint-usage",
                "labNumber": 1,
                "points": -2,
                "assisted": false,
            })
        );
    }

    #[test]
    fn solution_reveals_have_their_own_step_id() {
        let event = TelemetryEvent::SolutionRevealed {
            lab_number: 2,
            step_id: "dek".into(),
            block: BlockKey::new(0, 0),
            penalty: 15,
        };
        let body = sink().payload(&event);
        assert_eq!(body["stepId"], "solution-reveal");
        assert_eq!(body["points"], -15);
        assert_eq!(body["labNumber"], 2);
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        assert_eq!(sink().base_url, "http://localhost:5173");
    }

    #[test]
    fn recording_outside_a_runtime_is_harmless() {
        let event =
            TelemetryEvent::StepCompleted { lab_number: 1, step_id: "cmk".into(), assisted: false, points: 10 };
        sink().record(&event);
    }
}
