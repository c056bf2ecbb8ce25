//! In-process script engine for pipeline tests.
//!
//! `ScriptedEngine` does not interpret script sources. It recognises the
//! script by name and performs that script's file contract natively: the
//! split script cuts `/log.bbl` on its repeated first line and reads `H`
//! header lines, the analyze script emits synthetic traces sized to the CSV.
//! Status steps are reported in the same order the real scripts use.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use pidscope_runtime::protocol::{
    ANALYZE_CSV_PATH, ANALYZE_HEADER_PATH, HEADDICT_PATH, SPLIT_INPUT_PATH, SPLIT_MANIFEST_PATH,
    SPLIT_OUTPUT_DIR, trace_path,
};
use pidscope_runtime::{PackageSpec, Script, ScriptEngine, ScriptName, StatusReporter, VirtualFs};
use pidscope_types::Axis;
use serde_json::{Map, Value, json};

/// Header keys the split script always reports, blank when absent
const DEFAULT_HEADER_KEYS: &[&str] = &[
    "tempFile",
    "dynThrottle",
    "craftName",
    "fwType",
    "version",
    "date",
    "rcRate",
    "rcExpo",
    "rcYawExpo",
    "rcYawRate",
    "rates",
    "rollPID",
    "pitchPID",
    "yawPID",
    "deadBand",
    "yawDeadBand",
    "logNum",
    "minThrottle",
    "maxThrottle",
    "tpa_percent",
    "dTermSetPoint",
    "vbatComp",
    "gyro_lpf",
    "gyro_lowpass_hz",
    "dterm_lpf_hz",
    "debug_mode",
    "simplified_master_multiplier",
    "simplified_i_gain",
    "simplified_d_gain",
    "simplified_pi_gain",
    "simplified_dmax_gain",
    "simplified_feedforward_gain",
    "simplified_dterm_filter",
    "simplified_gyro_filter",
];

/// Header line fragments and the key each one fills
const HEADER_TRANSLATIONS: &[(&str, &str)] = &[
    ("dynThrPID:", "dynThrottle"),
    ("Craft name:", "craftName"),
    ("Firmware type:", "fwType"),
    ("Firmware revision:", "version"),
    ("Firmware date:", "fwDate"),
    ("rcRate:", "rcRate"),
    ("rc_rate:", "rcRate"),
    ("rcExpo:", "rcExpo"),
    ("rc_expo:", "rcExpo"),
    ("rates:", "rates"),
    ("rollPID:", "rollPID"),
    ("pitchPID:", "pitchPID"),
    ("yawPID:", "yawPID"),
    (" deadband:", "deadBand"),
    ("yaw_deadband:", "yawDeadBand"),
    ("tpa_breakpoint:", "tpa_breakpoint"),
    ("minthrottle:", "minThrottle"),
    ("maxthrottle:", "maxThrottle"),
    ("dterm_setpoint_weight:", "dTermSetPoint"),
    ("vbat_pid_gain:", "vbatComp"),
    ("gyro_lpf:", "gyro_lpf"),
    ("gyro_lowpass_hz:", "gyro_lowpass_hz"),
    ("dterm_lpf_hz:", "dterm_lpf_hz"),
    ("debug_mode:", "debug_mode"),
    ("simplified_master_multiplier", "simplified_master_multiplier"),
    ("simplified_i_gain", "simplified_i_gain"),
    ("simplified_d_gain", "simplified_d_gain"),
    ("simplified_pi_gain", "simplified_pi_gain"),
    ("simplified_dmax_gain", "simplified_dmax_gain"),
    ("simplified_feedforward_gain", "simplified_feedforward_gain"),
    ("simplified_dterm_filter", "simplified_dterm_filter"),
    ("simplified_gyro_filter", "simplified_gyro_filter"),
];

/// A way to make the analysis of one flight go wrong
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisFault {
    /// Report an ERROR step with this message, then stop cleanly
    Report(String),
    /// Raise, as an uncaught script exception does
    Raise(String),
    Panic(String),
    /// Finish normally with a roll trace whose series are not aligned
    Misaligned,
}

/// Timing of one `run` call
#[derive(Debug, Clone, Copy)]
pub struct ExecutionRecord {
    pub script: ScriptName,
    pub started: Instant,
    pub finished: Instant,
}

#[derive(Debug, Default)]
pub struct ScriptedEngine {
    reporter: Mutex<StatusReporter>,
    faults: HashMap<String, AnalysisFault>,
    split_failure: Option<String>,
    load_failure: Option<String>,
    run_delay: Option<Duration>,
    loads: AtomicUsize,
    installed: Mutex<Vec<PackageSpec>>,
    records: Mutex<Vec<ExecutionRecord>>,
    reported_headers: Mutex<Vec<Map<String, Value>>>,
    received_headers: Mutex<Vec<String>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the analysis of sub-log `log_num` fail with `fault`.
    pub fn with_fault(mut self, log_num: usize, fault: AnalysisFault) -> Self {
        self.faults.insert(log_num.to_string(), fault);
        self
    }

    /// Make the split script raise.
    pub fn with_split_failure(mut self, message: &str) -> Self {
        self.split_failure = Some(message.to_string());
        self
    }

    pub fn with_load_failure(mut self, message: &str) -> Self {
        self.load_failure = Some(message.to_string());
        self
    }

    /// Sleep at the start of every run, so overlapping runs would show.
    pub fn with_run_delay(mut self, delay: Duration) -> Self {
        self.run_delay = Some(delay);
        self
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn installed_packages(&self) -> Vec<PackageSpec> {
        self.installed.lock().unwrap().clone()
    }

    pub fn records(&self) -> Vec<ExecutionRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Headers the split script wrote to its manifest, lead-in segment included
    pub fn reported_headers(&self) -> Vec<Map<String, Value>> {
        self.reported_headers.lock().unwrap().clone()
    }

    /// `/log-header.json` exactly as each analyze run found it
    pub fn received_headers(&self) -> Vec<String> {
        self.received_headers.lock().unwrap().clone()
    }

    /// Highest number of runs observed in flight at once
    pub fn max_concurrent_runs(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    async fn status(&self, step: &str, payload: Option<Value>) {
        let reporter = self.reporter.lock().unwrap().clone();
        reporter.report(step, payload);
        tokio::task::yield_now().await;
    }

    async fn run_split(&self, fs: &VirtualFs) -> Result<()> {
        self.status("RUNNING", None).await;
        if let Some(message) = &self.split_failure {
            anyhow::bail!("{}", message);
        }

        self.status("SPLITTING_BBL", None).await;
        let content = fs.read(SPLIT_INPUT_PATH)?;
        let newline = content
            .iter()
            .position(|b| *b == b'\n')
            .context("No newline in main log")?;
        let first_line = &content[..=newline];

        let mut paths = Vec::new();
        for (index, piece) in split_on(&content, first_line).into_iter().enumerate() {
            let path = format!("{}/{}.bbl", SPLIT_OUTPUT_DIR, index);
            let mut sub_log = first_line.to_vec();
            sub_log.extend_from_slice(piece);
            fs.write(&path, sub_log)?;
            paths.push(path);
        }
        self.status("BBLS_SPLITTED", Some(json!(paths.len() - 1))).await;

        self.status("READING_HEADERS_START", Some(json!(paths.len()))).await;
        let mut manifest = Vec::with_capacity(paths.len());
        for (index, path) in paths.iter().enumerate() {
            self.status("READING_HEADERS_FROM_SUB_BBL_START", Some(json!(index)))
                .await;
            let header = read_header(&fs.read(path)?, path, index);
            self.reported_headers.lock().unwrap().push(header.clone());
            manifest.push(json!({ "bbl_filename": path, "header": header }));
            self.status("READING_HEADERS_FROM_SUB_BBL_COMPLETE", Some(json!(index)))
                .await;
        }
        self.status("READING_HEADERS_COMPLETE", None).await;

        fs.write(SPLIT_MANIFEST_PATH, serde_json::to_vec_pretty(&manifest)?)?;
        self.status("COMPLETE", None).await;
        Ok(())
    }

    async fn run_analyze(&self, fs: &VirtualFs) -> Result<()> {
        self.status("START", None).await;

        let received = fs.read_to_string(ANALYZE_HEADER_PATH)?;
        let mut headdict: Map<String, Value> = serde_json::from_str(&received)?;
        self.received_headers.lock().unwrap().push(received);
        let log_num = headdict
            .get("logNum")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        self.status("READING_CSV_START", None).await;
        let csv = fs.read_to_string(ANALYZE_CSV_PATH)?;
        let samples = csv
            .lines()
            .skip(1)
            .filter(|line| !line.trim().is_empty())
            .count();
        self.status("READING_CSV_COMPLETE", None).await;

        let fault = self.faults.get(&log_num).cloned();
        match &fault {
            Some(AnalysisFault::Report(message)) => {
                self.status("ERROR", Some(json!(message))).await;
                return Ok(());
            }
            Some(AnalysisFault::Raise(message)) => anyhow::bail!("{}", message),
            Some(AnalysisFault::Panic(message)) => panic!("{}", message),
            Some(AnalysisFault::Misaligned) | None => {}
        }

        if samples == 0 {
            self.status("ERROR", Some(json!("No data for equalization!")))
                .await;
            return Ok(());
        }

        self.status("WRITE_HEADDICT_TO_JSON_START", None).await;
        let tpa_percent = tpa_percent(&headdict);
        headdict.insert("tpa_percent".to_string(), json!(tpa_percent));
        fs.write(HEADDICT_PATH, serde_json::to_vec(&headdict)?)?;
        self.status("WRITE_HEADDICT_TO_JSON_COMPLETE", None).await;

        self.status("ANALYZE_PID_START", None).await;
        for axis in Axis::ALL {
            self.status("ANALYZE_PID_TRACE_START", Some(json!(axis.as_str())))
                .await;
            let misaligned = fault == Some(AnalysisFault::Misaligned) && axis == Axis::Roll;
            let trace = synthetic_trace(samples, misaligned);
            fs.write(&trace_path(axis), serde_json::to_vec(&trace)?)?;
            self.status("ANALYZE_PID_TRACE_COMPLETE", Some(json!(axis.as_str())))
                .await;
        }
        self.status("ANALYZE_PID_COMPLETE", None).await;

        self.status("COMPLETE", None).await;
        Ok(())
    }
}

impl ScriptEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    fn load(&self, reporter: StatusReporter) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if let Some(message) = &self.load_failure {
                anyhow::bail!("{}", message);
            }
            *self.reporter.lock().unwrap() = reporter;
            Ok(())
        })
    }

    fn install_packages<'a>(&'a self, packages: &'a [PackageSpec]) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.installed.lock().unwrap().extend_from_slice(packages);
            Ok(())
        })
    }

    fn run<'a>(&'a self, script: &'a Script, fs: &'a VirtualFs) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let _active = ActiveRun::enter(self);
            let started = Instant::now();
            if let Some(delay) = self.run_delay {
                tokio::time::sleep(delay).await;
            }

            let result = match script.name() {
                ScriptName::SplitBbl => self.run_split(fs).await,
                ScriptName::AnalyzeOneFlight => self.run_analyze(fs).await,
            };

            self.records.lock().unwrap().push(ExecutionRecord {
                script: script.name(),
                started,
                finished: Instant::now(),
            });
            result
        })
    }
}

/// Tracks in-flight runs; leaves on drop so panicking runs are counted out.
struct ActiveRun<'a> {
    engine: &'a ScriptedEngine,
}

impl<'a> ActiveRun<'a> {
    fn enter(engine: &'a ScriptedEngine) -> Self {
        let now = engine.active.fetch_add(1, Ordering::SeqCst) + 1;
        engine.max_active.fetch_max(now, Ordering::SeqCst);
        Self { engine }
    }
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        self.engine.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Split on every occurrence of `separator`, keeping the (possibly empty)
/// leading piece.
fn split_on<'a>(content: &'a [u8], separator: &[u8]) -> Vec<&'a [u8]> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut index = 0;
    while index + separator.len() <= content.len() {
        if &content[index..index + separator.len()] == separator {
            pieces.push(&content[start..index]);
            index += separator.len();
            start = index;
        } else {
            index += 1;
        }
    }
    pieces.push(&content[start..]);
    pieces
}

fn read_header(sub_log: &[u8], path: &str, index: usize) -> Map<String, Value> {
    let mut header: Map<String, Value> = DEFAULT_HEADER_KEYS
        .iter()
        .map(|key| (key.to_string(), json!("")))
        .collect();
    header.insert("tpa_breakpoint".to_string(), json!("0"));
    header.insert("tempFile".to_string(), json!(path));
    header.insert("logNum".to_string(), json!(index.to_string()));

    let text = String::from_utf8_lossy(sub_log);
    for line in text.lines() {
        for (fragment, key) in HEADER_TRANSLATIONS {
            if line.contains(fragment) {
                let value = line.rsplit(':').next().unwrap_or_default();
                header.insert(key.to_string(), json!(value));
            }
        }
    }
    header
}

fn tpa_percent(headdict: &Map<String, Value>) -> f64 {
    let firmware = headdict
        .get("fwType")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if firmware.contains("KISS") || firmware.contains("Raceflight") {
        return 0.0;
    }

    let breakpoint = match headdict.get("tpa_breakpoint") {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(1000.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(1000.0),
        _ => 1000.0,
    };
    (breakpoint - 1000.0) / 10.0
}

fn synthetic_trace(samples: usize, misaligned: bool) -> Value {
    let time: Vec<f64> = (0..samples).map(|i| i as f64 * 0.000125).collect();
    let response_len = samples.min(8);
    let gyro_len = if misaligned { samples + 1 } else { samples };
    let spectrum = json!({
        "freq_axis": [0.0, 250.0, 500.0],
        "hist2d_sm": [[0.1, 0.2], [0.3, 0.4], [0.5, 0.6]],
        "throt_hist_avr": [0.25, 0.75]
    });

    json!({
        "gyro": vec![0.5; gyro_len],
        "input": vec![0.5; samples],
        "time": time,
        "throttle": vec![42.0; samples],
        "time_resp": time[..response_len].to_vec(),
        "resp_low": [vec![1.0; response_len]],
        "high_mask": [0.0, 0.0, 0.0, 0.0],
        "noise_gyro": spectrum.clone(),
        "noise_d": spectrum.clone(),
        "noise_debug": spectrum,
        "filter_trans": [1.0, 0.8, 0.5]
    })
}
