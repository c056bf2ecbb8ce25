use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::trace::Axis;

// NOTE: Wire format
//
// Headers travel as JSON between the split script, the orchestrator and the
// analyze script. The scripts treat every field as text: PID triplets are
// "P,I,D" strings (the analyze script reads `rollPID.split(',')[0]`), numbers
// may arrive as "2000" or 2000, and absent values are "". Fields we do not
// model are kept verbatim: a header is written back exactly as it was read.

pub const ROLL_PID_KEY: &str = "rollPID";
pub const PITCH_PID_KEY: &str = "pitchPID";
pub const YAW_PID_KEY: &str = "yawPID";

/// Flight controller firmware family that recorded the log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FirmwareType {
    #[default]
    Betaflight,
    Kiss,
    Raceflight,
}

impl FirmwareType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FirmwareType::Betaflight => "Betaflight",
            FirmwareType::Kiss => "KISS",
            FirmwareType::Raceflight => "Raceflight",
        }
    }

    /// Classify the free-form `Firmware type:` header value.
    ///
    /// Betaflight logs report themselves as "Cleanflight", so anything that
    /// is not recognisably KISS or Raceflight is treated as Betaflight.
    pub fn from_header_value(value: &str) -> Self {
        if value.contains("KISS") {
            FirmwareType::Kiss
        } else if value.contains("Raceflight") {
            FirmwareType::Raceflight
        } else {
            FirmwareType::Betaflight
        }
    }
}

impl fmt::Display for FirmwareType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FirmwareType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(FirmwareType::from_header_value(&raw))
    }
}

/// Proportional / integral / derivative gains of one axis
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PidGains {
    pub p: f64,
    pub i: f64,
    pub d: f64,
}

impl PidGains {
    pub fn new(p: f64, i: f64, d: f64) -> Self {
        Self { p, i, d }
    }

    pub fn as_array(&self) -> [f64; 3] {
        [self.p, self.i, self.d]
    }
}

impl FromStr for PidGains {
    type Err = Error;

    /// Parses "P,I,D". Older firmware leaves trailing components blank
    /// ("70,45,"); blank components read as zero.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidHeader("empty PID gain field".to_string()));
        }

        let mut gains = [0.0; 3];
        for (slot, part) in gains.iter_mut().zip(trimmed.split(',')) {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            *slot = part.parse::<f64>().map_err(|_| {
                Error::InvalidHeader(format!("invalid PID gain '{}' in '{}'", part, trimmed))
            })?;
        }

        Ok(PidGains::new(gains[0], gains[1], gains[2]))
    }
}

impl fmt::Display for PidGains {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.p, self.i, self.d)
    }
}

impl<'de> Deserialize<'de> for PidGains {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(text) => text.parse().map_err(D::Error::custom),
            Value::Array(items) if items.len() == 3 => {
                let mut gains = [0.0; 3];
                for (slot, item) in gains.iter_mut().zip(&items) {
                    *slot = item
                        .as_f64()
                        .ok_or_else(|| D::Error::custom(format!("invalid PID gain {}", item)))?;
                }
                Ok(PidGains::new(gains[0], gains[1], gains[2]))
            }
            other => Err(D::Error::custom(format!(
                "expected \"P,I,D\" or a 3-element array, got {}",
                other
            ))),
        }
    }
}

/// Per-flight metadata reported by the split script.
///
/// The header is kept exactly as the script reported it and serializes back
/// unchanged, so the analyze script sees the same text the split script
/// wrote. The fields the pipeline relies on are parsed once, on
/// construction.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightHeader {
    raw: Map<String, Value>,
    typed: TypedFields,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct TypedFields {
    #[serde(rename = "fwType", default)]
    firmware: FirmwareType,

    #[serde(rename = "rollPID")]
    roll_pid: PidGains,

    #[serde(rename = "pitchPID")]
    pitch_pid: PidGains,

    #[serde(rename = "yawPID")]
    yaw_pid: PidGains,

    #[serde(rename = "maxThrottle", deserialize_with = "numeric_field", default)]
    max_throttle: Option<f64>,

    #[serde(deserialize_with = "numeric_field", default)]
    tpa_breakpoint: Option<f64>,

    #[serde(deserialize_with = "numeric_field", default)]
    tpa_percent: Option<f64>,
}

impl FlightHeader {
    pub fn from_map(raw: Map<String, Value>) -> Result<Self> {
        let typed = serde_json::from_value(Value::Object(raw.clone()))?;
        Ok(Self { raw, typed })
    }

    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(raw) => Self::from_map(raw),
            other => Err(Error::InvalidHeader(format!(
                "expected an object, got {}",
                other
            ))),
        }
    }

    /// The header as reported, field order included
    pub fn raw(&self) -> &Map<String, Value> {
        &self.raw
    }

    pub fn into_raw(self) -> Map<String, Value> {
        self.raw
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.raw.clone())
    }

    pub fn firmware(&self) -> FirmwareType {
        self.typed.firmware
    }

    pub fn pid(&self, axis: Axis) -> PidGains {
        match axis {
            Axis::Roll => self.typed.roll_pid,
            Axis::Pitch => self.typed.pitch_pid,
            Axis::Yaw => self.typed.yaw_pid,
        }
    }

    pub fn max_throttle(&self) -> Option<f64> {
        self.typed.max_throttle
    }

    pub fn tpa_breakpoint(&self) -> Option<f64> {
        self.typed.tpa_breakpoint
    }

    /// Throttle PID attenuation, filled in by the analysis
    pub fn tpa_percent(&self) -> Option<f64> {
        self.typed.tpa_percent
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.raw.get(key)
    }

    /// Sub-log number assigned by the split script, if reported
    pub fn log_number(&self) -> Option<&str> {
        self.field("logNum").and_then(Value::as_str)
    }

    /// Whether a raw, not yet typed header carries control-loop metadata.
    ///
    /// A flight without PID gains cannot be analyzed; the split script emits
    /// such headers for the empty segment preceding the first recording.
    pub fn raw_has_pid_data(raw: &Map<String, Value>) -> bool {
        [ROLL_PID_KEY, PITCH_PID_KEY, YAW_PID_KEY]
            .iter()
            .all(|key| !is_blank(raw.get(*key)))
    }
}

impl Serialize for FlightHeader {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.raw.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FlightHeader {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = Map::<String, Value>::deserialize(deserializer)?;
        FlightHeader::from_map(raw).map_err(D::Error::custom)
    }
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(text)) => text.trim().is_empty(),
        Some(_) => false,
    }
}

/// Numbers arrive as 2000, "2000" or "" depending on who wrote the header.
fn numeric_field<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<f64>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::Number(number) => Ok(number.as_f64()),
        Value::String(text) if text.trim().is_empty() => Ok(None),
        Value::String(text) => text
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("expected a number, got '{}'", text))),
        other => Err(D::Error::custom(format!("expected a number, got {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn split_script_header() -> Value {
        json!({
            "craftName": "five-inch",
            "fwType": "Cleanflight",
            "logNum": "1",
            "maxThrottle": "2000",
            "pitchPID": "47,84,32",
            "rollPID": "45,80,30",
            "simplified_d_gain": "100",
            "tpa_breakpoint": "1350",
            "tpa_percent": "",
            "yawPID": "45,80,0"
        })
    }

    #[test]
    fn test_parse_split_script_header() {
        let header = FlightHeader::from_value(split_script_header()).unwrap();

        assert_eq!(header.firmware(), FirmwareType::Betaflight);
        assert_eq!(header.pid(Axis::Roll), PidGains::new(45.0, 80.0, 30.0));
        assert_eq!(header.pid(Axis::Yaw), PidGains::new(45.0, 80.0, 0.0));
        assert_eq!(header.max_throttle(), Some(2000.0));
        assert_eq!(header.tpa_breakpoint(), Some(1350.0));
        assert_eq!(header.tpa_percent(), None);
        assert_eq!(header.log_number(), Some("1"));
        assert_eq!(header.field("craftName"), Some(&json!("five-inch")));
    }

    #[test]
    fn test_header_serializes_exactly_as_reported() {
        let mut reported = split_script_header();
        reported["rollPID"] = json!("70,45,");
        let header = FlightHeader::from_value(reported.clone()).unwrap();

        assert_eq!(header.to_value(), reported);
        assert_eq!(
            serde_json::to_string(&header).unwrap(),
            serde_json::to_string(&reported).unwrap()
        );

        let value = serde_json::to_value(&header).unwrap();
        assert_eq!(value["fwType"], json!("Cleanflight"));
        assert_eq!(value["maxThrottle"], json!("2000"));
        assert_eq!(value["rollPID"], json!("70,45,"));
        assert_eq!(value["tpa_percent"], json!(""));

        let reparsed: FlightHeader = serde_json::from_value(value).unwrap();
        assert_eq!(reparsed, header);
        assert_eq!(reparsed.pid(Axis::Roll), PidGains::new(70.0, 45.0, 0.0));
    }

    #[test]
    fn test_non_object_header_is_rejected() {
        assert!(matches!(
            FlightHeader::from_value(json!("rollPID")),
            Err(Error::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_firmware_classification() {
        assert_eq!(FirmwareType::from_header_value("KISS"), FirmwareType::Kiss);
        assert_eq!(
            FirmwareType::from_header_value("Raceflight 1.2"),
            FirmwareType::Raceflight
        );
        assert_eq!(
            FirmwareType::from_header_value("Cleanflight"),
            FirmwareType::Betaflight
        );
        assert_eq!(FirmwareType::from_header_value(""), FirmwareType::Betaflight);
    }

    #[test]
    fn test_pid_gains_parsing() {
        assert_eq!(
            "70,45,".parse::<PidGains>().unwrap(),
            PidGains::new(70.0, 45.0, 0.0)
        );
        assert_eq!(
            " 4.5, 8 ,3 ".parse::<PidGains>().unwrap(),
            PidGains::new(4.5, 8.0, 3.0)
        );
        assert!("".parse::<PidGains>().is_err());
        assert!("a,b,c".parse::<PidGains>().is_err());
        assert_eq!(PidGains::new(45.0, 80.5, 30.0).to_string(), "45,80.5,30");
    }

    #[test]
    fn test_pid_gains_accepts_arrays() {
        let gains: PidGains = serde_json::from_value(json!([40, 75, 28])).unwrap();
        assert_eq!(gains.as_array(), [40.0, 75.0, 28.0]);
    }

    #[test]
    fn test_raw_has_pid_data() {
        let full = split_script_header();
        assert!(FlightHeader::raw_has_pid_data(full.as_object().unwrap()));

        let mut empty_roll = split_script_header();
        empty_roll["rollPID"] = json!("");
        assert!(!FlightHeader::raw_has_pid_data(empty_roll.as_object().unwrap()));

        let mut missing_yaw = split_script_header();
        missing_yaw.as_object_mut().unwrap().remove("yawPID");
        assert!(!FlightHeader::raw_has_pid_data(missing_yaw.as_object().unwrap()));
    }

    #[test]
    fn test_numeric_fields_accept_numbers_from_analysis() {
        let mut value = split_script_header();
        value["tpa_percent"] = json!(35.0);
        let header = FlightHeader::from_value(value).unwrap();
        assert_eq!(header.tpa_percent(), Some(35.0));
    }
}
