use pidscope_types::{FlightHeader, RawStatus, SplitStep};
use tracing::{debug, info, warn};

use crate::Result;
use crate::protocol::{SPLIT_INPUT_PATH, SPLIT_OUTPUT_DIR, SplitManifest, SplitRequest};
use crate::sandbox::{ComputationSandbox, ExecutionOutcome};
use crate::scripts::{ScriptLibrary, ScriptName};

/// One flight cut out of the main log
#[derive(Debug, Clone, PartialEq)]
pub struct SplitFlight {
    pub header: FlightHeader,
    /// Raw blackbox bytes of this flight only
    pub sub_log: Vec<u8>,
}

/// Splits a main log into per-flight sub-logs with the split script.
pub struct SplitStage<'a> {
    sandbox: &'a ComputationSandbox,
    scripts: &'a ScriptLibrary,
}

impl<'a> SplitStage<'a> {
    pub fn new(sandbox: &'a ComputationSandbox, scripts: &'a ScriptLibrary) -> Self {
        Self { sandbox, scripts }
    }

    /// Split `raw_log` into flights, in recording order.
    ///
    /// Segments without PID gains are dropped. A failing split script yields
    /// no flights rather than an error.
    pub async fn split<F>(&self, raw_log: &[u8], mut on_progress: Option<F>) -> Result<Vec<SplitFlight>>
    where
        F: FnMut(SplitStep) + Send,
    {
        let script = self.scripts.load(ScriptName::SplitBbl)?;
        let session = self.sandbox.session().await?;
        let fs = session.fs();

        SplitRequest { raw_log }.write_to(fs)?;
        info!(bytes = raw_log.len(), "Splitting main log");

        let outcome = session
            .execute(
                &script,
                Some(|raw: RawStatus| match SplitStep::from_raw(&raw) {
                    Some(step) => {
                        if let Some(f) = on_progress.as_mut() {
                            f(step);
                        }
                    }
                    None => debug!(step = %raw.step, "Ignoring unknown split status"),
                }),
            )
            .await;

        fs.remove_if_exists(SPLIT_INPUT_PATH);

        if let ExecutionOutcome::Failed(message) = outcome {
            warn!(error = %message, "Split script failed, no flights extracted");
            fs.clear_dir(SPLIT_OUTPUT_DIR)?;
            return Ok(Vec::new());
        }

        let Some(manifest) = SplitManifest::read_from(fs)? else {
            warn!("Split script completed without writing a manifest");
            fs.clear_dir(SPLIT_OUTPUT_DIR)?;
            return Ok(Vec::new());
        };

        let segments = manifest.len();
        let mut flights = Vec::with_capacity(segments);
        for (index, entry) in manifest.entries.into_iter().enumerate() {
            let path = entry.sub_log_path();
            let sub_log = fs.read(&path);
            fs.remove_if_exists(&path);

            if !entry.has_pid_data() {
                debug!(index, path = %path, "Skipping segment without PID data");
                continue;
            }

            let sub_log = match sub_log {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!(index, path = %path, error = %err, "Sub-log listed in manifest is missing");
                    continue;
                }
            };

            match FlightHeader::from_map(entry.header) {
                Ok(header) => flights.push(SplitFlight { header, sub_log }),
                Err(err) => {
                    warn!(index, error = %err, "Skipping segment with unreadable header");
                }
            }
        }

        fs.clear_dir(SPLIT_OUTPUT_DIR)?;
        info!(segments, flights = flights.len(), "Split main log");

        Ok(flights)
    }
}
