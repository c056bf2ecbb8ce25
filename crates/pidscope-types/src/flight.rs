use serde::{Deserialize, Serialize};
use std::fmt;

use crate::header::FlightHeader;
use crate::trace::{Axis, AxisTrace};

/// A decoded flight: its header and the CSV telemetry of its sub-log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecoderResult {
    pub header: FlightHeader,
    pub csv: String,
}

/// Analysis result of one flight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightAnalysisResult {
    /// Header as echoed by the analysis, including derived summary fields
    #[serde(rename = "headdict")]
    pub header: FlightHeader,
    pub roll: AxisTrace,
    pub pitch: AxisTrace,
    pub yaw: AxisTrace,
}

impl FlightAnalysisResult {
    pub fn trace(&self, axis: Axis) -> &AxisTrace {
        match axis {
            Axis::Roll => &self.roll,
            Axis::Pitch => &self.pitch,
            Axis::Yaw => &self.yaw,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The script reported an ERROR step
    ScriptReported,
    /// The script raised or panicked inside the engine
    ExecutionFailed,
    /// The script finished but its outputs could not be read
    MalformedOutput,
}

/// Why one flight produced no analysis result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightFailure {
    pub reason: FailureReason,
    pub message: String,
}

impl FlightFailure {
    pub fn new(reason: FailureReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }
}

impl fmt::Display for FlightFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self.reason {
            FailureReason::ScriptReported => "analysis reported an error",
            FailureReason::ExecutionFailed => "analysis script failed",
            FailureReason::MalformedOutput => "analysis output unreadable",
        };
        write!(f, "{}: {}", reason, self.message)
    }
}

impl std::error::Error for FlightFailure {}

/// Outcome of analyzing a single flight
#[derive(Debug, Clone, PartialEq)]
pub enum FlightOutcome {
    Analyzed(Box<FlightAnalysisResult>),
    Failed(FlightFailure),
}

impl FlightOutcome {
    pub fn is_analyzed(&self) -> bool {
        matches!(self, FlightOutcome::Analyzed(_))
    }

    pub fn into_result(self) -> Result<FlightAnalysisResult, FlightFailure> {
        match self {
            FlightOutcome::Analyzed(result) => Ok(*result),
            FlightOutcome::Failed(failure) => Err(failure),
        }
    }
}
