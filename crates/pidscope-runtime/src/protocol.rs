//! File contract between the stages and the scripts they run.
//!
//! Each script reads its inputs from, and writes its outputs to, fixed paths
//! of the sandbox's virtual file store. Request types stage the inputs;
//! response types read and check the outputs.

use pidscope_types::{Axis, AxisTrace, FlightAnalysisResult, FlightHeader};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::sandbox::VirtualFs;
use crate::{Error, Result};

pub const SPLIT_INPUT_PATH: &str = "/log.bbl";
pub const SPLIT_MANIFEST_PATH: &str = "/result.json";
pub const SPLIT_OUTPUT_DIR: &str = "/splits";

pub const ANALYZE_CSV_PATH: &str = "/log.csv";
pub const ANALYZE_HEADER_PATH: &str = "/log-header.json";
pub const RESULTS_DIR: &str = "/results";
pub const HEADDICT_PATH: &str = "/results/headdict.json";

const SIMPLIFIED_PREFIX: &str = "simplified_";

pub fn trace_path(axis: Axis) -> String {
    format!("{}/trace_{}.json", RESULTS_DIR, axis)
}

/// Input of the split script: the main log
#[derive(Debug, Clone, Copy)]
pub struct SplitRequest<'a> {
    pub raw_log: &'a [u8],
}

impl SplitRequest<'_> {
    /// Stage the main log, dropping any manifest or sub-logs left behind by
    /// an earlier split.
    pub fn write_to(&self, fs: &VirtualFs) -> Result<()> {
        fs.remove_if_exists(SPLIT_MANIFEST_PATH);
        fs.clear_dir(SPLIT_OUTPUT_DIR)?;
        fs.write(SPLIT_INPUT_PATH, self.raw_log)
    }
}

/// One flight segment listed by the split script
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ManifestEntry {
    /// Header as the script reported it, before typing
    pub header: Map<String, Value>,
    pub bbl_filename: String,
}

impl ManifestEntry {
    pub fn has_pid_data(&self) -> bool {
        FlightHeader::raw_has_pid_data(&self.header)
    }

    /// Absolute store path of the sub-log
    pub fn sub_log_path(&self) -> String {
        if self.bbl_filename.starts_with('/') {
            self.bbl_filename.clone()
        } else {
            format!("/{}", self.bbl_filename)
        }
    }
}

/// Output of the split script, in split order
#[derive(Debug, Clone, PartialEq)]
pub struct SplitManifest {
    pub entries: Vec<ManifestEntry>,
}

impl SplitManifest {
    /// Consume the manifest from the store.
    ///
    /// `Ok(None)` when the script wrote no manifest; a manifest that does not
    /// parse is a protocol error.
    pub fn read_from(fs: &VirtualFs) -> Result<Option<Self>> {
        if !fs.exists(SPLIT_MANIFEST_PATH) {
            return Ok(None);
        }

        let content = fs.read_to_string(SPLIT_MANIFEST_PATH)?;
        fs.remove(SPLIT_MANIFEST_PATH)?;

        let entries: Vec<ManifestEntry> = serde_json::from_str(&content)
            .map_err(|err| Error::Protocol(format!("malformed split manifest: {}", err)))?;

        Ok(Some(Self { entries }))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Inputs of the analyze script: one flight's telemetry and header
#[derive(Debug, Clone, Copy)]
pub struct AnalyzeRequest<'a> {
    pub csv: &'a str,
    pub header: &'a FlightHeader,
}

impl AnalyzeRequest<'_> {
    /// Stage the inputs after removing the previous flight's results.
    pub fn write_to(&self, fs: &VirtualFs) -> Result<()> {
        fs.clear_dir(RESULTS_DIR)?;
        fs.write(ANALYZE_CSV_PATH, self.csv)?;
        fs.write(ANALYZE_HEADER_PATH, serde_json::to_vec(self.header)?)
    }
}

/// Raw outputs of the analyze script
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzeResponse {
    pub headdict: Map<String, Value>,
    pub roll: AxisTrace,
    pub pitch: AxisTrace,
    pub yaw: AxisTrace,
}

impl AnalyzeResponse {
    pub fn read_from(fs: &VirtualFs) -> Result<Self> {
        let headdict = match serde_json::from_str(&fs.read_to_string(HEADDICT_PATH)?)? {
            Value::Object(map) => map,
            other => {
                return Err(Error::Protocol(format!(
                    "{} holds {} instead of an object",
                    HEADDICT_PATH,
                    json_kind(&other)
                )));
            }
        };

        let read_trace = |axis: Axis| -> Result<AxisTrace> {
            let trace = AxisTrace::from_json(&fs.read_to_string(&trace_path(axis))?)?;
            trace.validate(axis)?;
            Ok(trace)
        };

        Ok(Self {
            headdict,
            roll: read_trace(Axis::Roll)?,
            pitch: read_trace(Axis::Pitch)?,
            yaw: read_trace(Axis::Yaw)?,
        })
    }

    /// Apply header post-processing and type the header.
    pub fn into_result(mut self) -> Result<FlightAnalysisResult> {
        normalize_simplified_fields(&mut self.headdict);
        let header = FlightHeader::from_map(self.headdict)?;

        Ok(FlightAnalysisResult {
            header,
            roll: self.roll,
            pitch: self.pitch,
            yaw: self.yaw,
        })
    }
}

/// Convert `simplified_*` slider values from integer hundredths to a
/// two-decimal string ("1234" becomes "12.34").
///
/// Only non-empty strings with a leading integer are converted; anything
/// else is left untouched.
pub fn normalize_simplified_fields(headdict: &mut Map<String, Value>) {
    for (key, value) in headdict.iter_mut() {
        if !key.starts_with(SIMPLIFIED_PREFIX) {
            continue;
        }
        let Value::String(text) = value else {
            continue;
        };
        if let Some(hundredths) = parse_leading_int(text) {
            *text = format_hundredths(hundredths);
        }
    }
}

/// Leading integer of `text`, ignoring whatever follows it ("85%" is 85).
/// Read as a float so arbitrarily long digit runs still convert.
fn parse_leading_int(text: &str) -> Option<f64> {
    let trimmed = text.trim_start();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };

    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let magnitude: f64 = digits[..end].parse().ok()?;

    Some(if negative { -magnitude } else { magnitude })
}

/// `hundredths / 100` with two decimals; zero never prints as "-0.00".
fn format_hundredths(hundredths: f64) -> String {
    let scaled = hundredths / 100.0;
    let scaled = if scaled == 0.0 { 0.0 } else { scaled };
    format!("{:.2}", scaled)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
