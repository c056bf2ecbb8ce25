use serde::Serialize;

use super::steps::{AnalyzeStep, SplitStep};

/// A typed progress notification, tagged with the flight it concerns when
/// the stage runs per flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent<S> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flight_index: Option<usize>,
    #[serde(flatten)]
    pub step: S,
}

impl<S> ProgressEvent<S> {
    /// An event that concerns the whole batch
    pub fn batch(step: S) -> Self {
        Self {
            flight_index: None,
            step,
        }
    }

    /// An event that concerns one flight of the batch
    pub fn flight(index: usize, step: S) -> Self {
        Self {
            flight_index: Some(index),
            step,
        }
    }
}

pub type SplitProgress = ProgressEvent<SplitStep>;
pub type AnalyzeProgress = ProgressEvent<AnalyzeStep>;

/// Progress of an end-to-end run (split, decode, then analyze every flight)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "stage", content = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    Split(SplitStep),
    Analyze(AnalyzeProgress),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::Axis;

    #[test]
    fn test_flight_event_serialization() {
        let event = ProgressEvent::flight(1, AnalyzeStep::AnalyzePidTraceStart(Axis::Pitch));
        insta::assert_json_snapshot!(event, @r#"
        {
          "flight_index": 1,
          "step": "ANALYZE_PID_TRACE_START",
          "payload": "pitch"
        }
        "#);
    }

    #[test]
    fn test_batch_event_omits_index() {
        let event = ProgressEvent::batch(SplitStep::BblsSplitted(2));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"step": "BBLS_SPLITTED", "payload": 2})
        );
    }
}
