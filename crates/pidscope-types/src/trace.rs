use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Rotational axis of the craft
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Roll,
    Pitch,
    Yaw,
}

impl Axis {
    /// Analysis order of the axes
    pub const ALL: [Axis; 3] = [Axis::Roll, Axis::Pitch, Axis::Yaw];

    pub fn as_str(&self) -> &'static str {
        match self {
            Axis::Roll => "roll",
            Axis::Pitch => "pitch",
            Axis::Yaw => "yaw",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Axis {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "roll" => Ok(Axis::Roll),
            "pitch" => Ok(Axis::Pitch),
            "yaw" => Ok(Axis::Yaw),
            other => Err(Error::InvalidTrace(format!("unknown axis '{}'", other))),
        }
    }
}

/// Step-response curves, one row per response estimate.
///
/// The analysis script writes the low-input response nested (`[[...]]`) and
/// the high-input response flat (`[...]`); both read into rows.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct ResponseCurve(pub Vec<Vec<f64>>);

impl ResponseCurve {
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.0
    }

    /// The primary (first) response row
    pub fn primary(&self) -> Option<&[f64]> {
        self.0.first().map(Vec::as_slice)
    }
}

impl<'de> Deserialize<'de> for ResponseCurve {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Nested(Vec<Vec<f64>>),
            Flat(Vec<f64>),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Nested(rows) => ResponseCurve(rows),
            Repr::Flat(row) => ResponseCurve(vec![row]),
        })
    }
}

/// Normalized 2D histogram with its bin edges
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Histogram2d {
    pub histogram: Vec<Vec<f64>>,
    pub bins: Vec<f64>,
}

/// Response strength binned by throttle
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ThrustResponse {
    pub hist2d_norm: Histogram2d,
}

/// Noise spectrum of one signal over throttle
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NoiseSpectrum {
    pub freq_axis: Vec<f64>,

    /// Smoothed frequency x throttle histogram
    pub hist2d_sm: Vec<Vec<f64>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hist2d: Vec<Vec<f64>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hist2d_norm: Vec<Vec<f64>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub throt_axis: Vec<f64>,

    /// Throttle-binned average amplitude
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub throt_hist_avr: Vec<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

/// Analysis output of one axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisTrace {
    pub gyro: Vec<f64>,
    pub input: Vec<f64>,
    pub time: Vec<f64>,
    pub throttle: Vec<f64>,

    /// Time base of the step-response curves
    pub time_resp: Vec<f64>,
    pub resp_low: ResponseCurve,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resp_high: Option<ResponseCurve>,
    #[serde(default)]
    pub high_mask: Vec<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thr_response: Option<ThrustResponse>,

    pub noise_gyro: NoiseSpectrum,
    pub noise_d: NoiseSpectrum,
    pub noise_debug: NoiseSpectrum,

    /// Filter transmission (gyro vs. unfiltered debug) per frequency
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filter_trans: Vec<f64>,
}

impl AxisTrace {
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Number of samples in the shared time base
    pub fn sample_count(&self) -> usize {
        self.time.len()
    }

    /// Check that every series is aligned to its time base.
    pub fn validate(&self, axis: Axis) -> Result<()> {
        let expected = self.time.len();
        for (name, series) in [
            ("gyro", &self.gyro),
            ("input", &self.input),
            ("throttle", &self.throttle),
        ] {
            if series.len() != expected {
                return Err(Error::InvalidTrace(format!(
                    "{}: '{}' has {} samples but time has {}",
                    axis,
                    name,
                    series.len(),
                    expected
                )));
            }
        }

        let response_len = self.time_resp.len();
        let curves = std::iter::once(("resp_low", &self.resp_low))
            .chain(self.resp_high.as_ref().map(|curve| ("resp_high", curve)));
        for (name, curve) in curves {
            if let Some(row) = curve.rows().iter().find(|row| row.len() != response_len) {
                return Err(Error::InvalidTrace(format!(
                    "{}: '{}' row has {} samples but time_resp has {}",
                    axis,
                    name,
                    row.len(),
                    response_len
                )));
            }
        }

        Ok(())
    }
}
