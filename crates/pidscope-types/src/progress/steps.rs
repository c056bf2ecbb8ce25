use serde::Serialize;

use super::status::RawStatus;
use crate::trace::Axis;

/// Progress of splitting a main log and decoding its sub-logs.
///
/// Payloads are sub-log counts or zero-based sub-log indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "step", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SplitStep {
    Running,
    SplittingBbl,
    BblsSplitted(usize),
    ReadingHeadersStart(usize),
    ReadingHeadersFromSubBblStart(usize),
    ReadingHeadersFromSubBblComplete(usize),
    ReadingHeadersComplete,
    DecodingSubBblStart(usize),
    DecodingSubBblComplete(usize),
    Complete,
}

impl SplitStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            SplitStep::Running => "RUNNING",
            SplitStep::SplittingBbl => "SPLITTING_BBL",
            SplitStep::BblsSplitted(_) => "BBLS_SPLITTED",
            SplitStep::ReadingHeadersStart(_) => "READING_HEADERS_START",
            SplitStep::ReadingHeadersFromSubBblStart(_) => "READING_HEADERS_FROM_SUB_BBL_START",
            SplitStep::ReadingHeadersFromSubBblComplete(_) => {
                "READING_HEADERS_FROM_SUB_BBL_COMPLETE"
            }
            SplitStep::ReadingHeadersComplete => "READING_HEADERS_COMPLETE",
            SplitStep::DecodingSubBblStart(_) => "DECODING_SUB_BBL_START",
            SplitStep::DecodingSubBblComplete(_) => "DECODING_SUB_BBL_COMPLETE",
            SplitStep::Complete => "COMPLETE",
        }
    }

    /// Interpret a script status. Unknown steps and steps missing their
    /// payload yield `None`.
    pub fn from_raw(raw: &RawStatus) -> Option<Self> {
        let step = match raw.step.as_str() {
            "RUNNING" => SplitStep::Running,
            "SPLITTING_BBL" => SplitStep::SplittingBbl,
            "BBLS_SPLITTED" => SplitStep::BblsSplitted(raw.payload_index()?),
            "READING_HEADERS_START" => SplitStep::ReadingHeadersStart(raw.payload_index()?),
            "READING_HEADERS_FROM_SUB_BBL_START" => {
                SplitStep::ReadingHeadersFromSubBblStart(raw.payload_index()?)
            }
            "READING_HEADERS_FROM_SUB_BBL_COMPLETE" => {
                SplitStep::ReadingHeadersFromSubBblComplete(raw.payload_index()?)
            }
            "READING_HEADERS_COMPLETE" => SplitStep::ReadingHeadersComplete,
            "DECODING_SUB_BBL_START" => SplitStep::DecodingSubBblStart(raw.payload_index()?),
            "DECODING_SUB_BBL_COMPLETE" => {
                SplitStep::DecodingSubBblComplete(raw.payload_index()?)
            }
            "COMPLETE" => SplitStep::Complete,
            _ => return None,
        };
        Some(step)
    }
}

/// Progress of analyzing one decoded flight
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalyzeStep {
    Start,
    ReadingCsvStart,
    ReadingCsvComplete,
    WriteHeaddictToJsonStart,
    WriteHeaddictToJsonComplete,
    AnalyzePidStart,
    AnalyzePidTraceStart(Axis),
    AnalyzePidTraceComplete(Axis),
    AnalyzePidComplete,
    Complete,
    Error(String),
}

impl AnalyzeStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalyzeStep::Start => "START",
            AnalyzeStep::ReadingCsvStart => "READING_CSV_START",
            AnalyzeStep::ReadingCsvComplete => "READING_CSV_COMPLETE",
            AnalyzeStep::WriteHeaddictToJsonStart => "WRITE_HEADDICT_TO_JSON_START",
            AnalyzeStep::WriteHeaddictToJsonComplete => "WRITE_HEADDICT_TO_JSON_COMPLETE",
            AnalyzeStep::AnalyzePidStart => "ANALYZE_PID_START",
            AnalyzeStep::AnalyzePidTraceStart(_) => "ANALYZE_PID_TRACE_START",
            AnalyzeStep::AnalyzePidTraceComplete(_) => "ANALYZE_PID_TRACE_COMPLETE",
            AnalyzeStep::AnalyzePidComplete => "ANALYZE_PID_COMPLETE",
            AnalyzeStep::Complete => "COMPLETE",
            AnalyzeStep::Error(_) => "ERROR",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, AnalyzeStep::Error(_))
    }

    /// Interpret a script status. Unknown steps and trace steps without a
    /// recognised axis yield `None`. An ERROR always maps, with or without
    /// a message.
    pub fn from_raw(raw: &RawStatus) -> Option<Self> {
        let axis = || raw.payload_text().and_then(|text| text.parse::<Axis>().ok());
        let step = match raw.step.as_str() {
            "START" => AnalyzeStep::Start,
            "READING_CSV_START" => AnalyzeStep::ReadingCsvStart,
            "READING_CSV_COMPLETE" => AnalyzeStep::ReadingCsvComplete,
            "WRITE_HEADDICT_TO_JSON_START" => AnalyzeStep::WriteHeaddictToJsonStart,
            "WRITE_HEADDICT_TO_JSON_COMPLETE" => AnalyzeStep::WriteHeaddictToJsonComplete,
            "ANALYZE_PID_START" => AnalyzeStep::AnalyzePidStart,
            "ANALYZE_PID_TRACE_START" => AnalyzeStep::AnalyzePidTraceStart(axis()?),
            "ANALYZE_PID_TRACE_COMPLETE" => AnalyzeStep::AnalyzePidTraceComplete(axis()?),
            "ANALYZE_PID_COMPLETE" => AnalyzeStep::AnalyzePidComplete,
            "COMPLETE" => AnalyzeStep::Complete,
            "ERROR" => AnalyzeStep::Error(error_message(raw)),
            _ => return None,
        };
        Some(step)
    }
}

fn error_message(raw: &RawStatus) -> String {
    match (&raw.payload, raw.payload_text()) {
        (_, Some(text)) => text.to_string(),
        (Some(other), None) => other.to_string(),
        (None, None) => "unspecified analysis error".to_string(),
    }
}
