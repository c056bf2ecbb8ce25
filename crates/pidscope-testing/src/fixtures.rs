//! Sample blackbox logs in a compact text form.
//!
//! Every flight starts with the same product line, followed by `H key:value`
//! header lines and `I a,b,c` frame lines. That is enough structure for the
//! split contract (flights are delimited by the repeated first line) and for
//! `FakeDecoder` to produce a CSV table.

use pidscope_types::{Axis, DecoderResult, FlightHeader};
use serde_json::json;

pub const PRODUCT_LINE: &str = "H Product:Blackbox flight data recorder by Nicholas Sherlock";

/// CSV columns `FakeDecoder` writes
pub const CSV_COLUMNS: &str = "loopIteration,time (us),rcCommand[0],gyroADC[0]";

/// Builder for one flight of a main log.
#[derive(Debug, Clone)]
pub struct FlightSpec {
    fields: Vec<(String, String)>,
    samples: usize,
}

impl Default for FlightSpec {
    fn default() -> Self {
        Self::new()
    }
}

impl FlightSpec {
    /// A Betaflight flight with full PID data and 32 frames.
    pub fn new() -> Self {
        let fields = [
            ("Firmware type", "Cleanflight"),
            ("Firmware revision", "Betaflight 4.4.2 (025ee87c2) STM32F7X2"),
            ("Craft name", "five-inch"),
            ("rollPID", "45,80,30"),
            ("pitchPID", "47,84,32"),
            ("yawPID", "45,80,0"),
            ("minthrottle", "1070"),
            ("maxthrottle", "2000"),
            ("tpa_breakpoint", "1350"),
            ("debug_mode", "3"),
        ];

        Self {
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            samples: 32,
        }
    }

    /// Set or replace a header field.
    pub fn field(mut self, key: &str, value: &str) -> Self {
        match self.fields.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.fields.push((key.to_string(), value.to_string())),
        }
        self
    }

    pub fn without_field(mut self, key: &str) -> Self {
        self.fields.retain(|(k, _)| k != key);
        self
    }

    /// Drop the PID line of one axis, as firmware does for blank segments.
    pub fn without_pid(self, axis: Axis) -> Self {
        self.without_field(&format!("{}PID", axis))
    }

    pub fn firmware(self, firmware: &str) -> Self {
        self.field("Firmware type", firmware)
    }

    pub fn samples(mut self, samples: usize) -> Self {
        self.samples = samples;
        self
    }

    /// The flight's bytes, starting with the product line.
    pub fn render(&self) -> Vec<u8> {
        let mut out = String::new();
        out.push_str(PRODUCT_LINE);
        out.push('\n');
        for (key, value) in &self.fields {
            out.push_str(&format!("H {}:{}\n", key, value));
        }
        for frame in 0..self.samples {
            out.push_str(&format!(
                "I {},{},{}\n",
                frame * 125,
                1500 + (frame % 7) as i64 * 10,
                (frame % 5) as i64 - 2
            ));
        }
        out.into_bytes()
    }
}

/// A main log holding `flights` back to back.
pub fn main_log(flights: &[FlightSpec]) -> Vec<u8> {
    flights.iter().flat_map(FlightSpec::render).collect()
}

/// A main log of `count` default flights.
pub fn main_log_with_flights(count: usize) -> Vec<u8> {
    main_log(&vec![FlightSpec::new(); count])
}

/// CSV as the decoder would produce it for `samples` frames.
pub fn sample_csv(samples: usize) -> String {
    let mut csv = String::from(CSV_COLUMNS);
    csv.push('\n');
    for frame in 0..samples {
        csv.push_str(&format!("{},{},1500,0\n", frame, frame * 125));
    }
    csv
}

/// Header as the split stage would report it for sub-log `log_num`.
pub fn flight_header(log_num: usize) -> FlightHeader {
    FlightHeader::from_value(json!({
        "craftName": "five-inch",
        "fwType": "Cleanflight",
        "logNum": log_num.to_string(),
        "maxThrottle": "2000",
        "minThrottle": "1070",
        "pitchPID": "47,84,32",
        "rollPID": "45,80,30",
        "simplified_d_gain": "1234",
        "simplified_i_gain": "",
        "tpa_breakpoint": "1350",
        "tpa_percent": "",
        "yawPID": "45,80,0"
    }))
    .expect("fixture header is valid")
}

/// A decoded flight ready for analysis.
pub fn decoded_flight(log_num: usize, samples: usize) -> DecoderResult {
    DecoderResult {
        header: flight_header(log_num),
        csv: sample_csv(samples),
    }
}
