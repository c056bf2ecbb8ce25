use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use pidscope_runtime::{BlackboxDecoder, VirtualFs};

use crate::fixtures::CSV_COLUMNS;

/// Marker that makes `FakeDecoder` fail on a sub-log
pub const CORRUPT_MARKER: &str = "H corrupt:1";

/// Decoder over the fixture log format.
///
/// For input `/logfile.bbl` it writes `/logfile.01.csv` with one row per
/// `I` frame, plus a `/logfile.01.gps.csv` side table and an event file the
/// way the native decoder does. Logs without frames produce no output.
#[derive(Debug, Default)]
pub struct FakeDecoder {
    loads: AtomicUsize,
    decodes: AtomicUsize,
}

impl FakeDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn decode_count(&self) -> usize {
        self.decodes.load(Ordering::SeqCst)
    }
}

impl BlackboxDecoder for FakeDecoder {
    fn name(&self) -> &str {
        "fake-blackbox-decode"
    }

    fn load(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn decode<'a>(&'a self, fs: &'a VirtualFs, input_path: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.decodes.fetch_add(1, Ordering::SeqCst);

            let raw = fs.read(input_path).context("decoder input missing")?;
            let text = String::from_utf8_lossy(&raw);
            if text.contains(CORRUPT_MARKER) {
                anyhow::bail!("frame checksum mismatch in {}", input_path);
            }

            let frames: Vec<&str> = text
                .lines()
                .filter_map(|line| line.strip_prefix("I "))
                .collect();
            if frames.is_empty() {
                return Ok(());
            }

            let stem = input_path.trim_end_matches(".bbl");
            let mut csv = String::from(CSV_COLUMNS);
            csv.push('\n');
            for (iteration, frame) in frames.iter().enumerate() {
                csv.push_str(&format!("{},{}\n", iteration, frame));
            }

            fs.write(&format!("{}.01.csv", stem), csv)?;
            fs.write(&format!("{}.01.gps.csv", stem), "time,GPS_coord[0],GPS_coord[1]\n")?;
            fs.write(&format!("{}.01.event", stem), "{\"name\":\"Log start\"}\n")?;
            Ok(())
        })
    }
}
