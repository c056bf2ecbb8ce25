use pidscope_types::{
    AnalyzeStep, DecoderResult, FailureReason, FlightFailure, FlightOutcome, RawStatus,
};
use tracing::{debug, info, warn};

use crate::Result;
use crate::protocol::{
    ANALYZE_CSV_PATH, ANALYZE_HEADER_PATH, AnalyzeRequest, AnalyzeResponse, RESULTS_DIR,
};
use crate::sandbox::{ComputationSandbox, ExecutionOutcome};
use crate::scripts::{ScriptLibrary, ScriptName};

/// Runs the analysis script over one decoded flight.
pub struct AnalyzeStage<'a> {
    sandbox: &'a ComputationSandbox,
    scripts: &'a ScriptLibrary,
}

impl<'a> AnalyzeStage<'a> {
    pub fn new(sandbox: &'a ComputationSandbox, scripts: &'a ScriptLibrary) -> Self {
        Self { sandbox, scripts }
    }

    /// Analyze one flight.
    ///
    /// Anything that goes wrong with this flight alone comes back as
    /// [`FlightOutcome::Failed`]. `Err` means the stage cannot run at all
    /// (missing script, unusable sandbox).
    pub async fn analyze_one<F>(
        &self,
        flight: &DecoderResult,
        mut on_progress: Option<F>,
    ) -> Result<FlightOutcome>
    where
        F: FnMut(AnalyzeStep) + Send,
    {
        let script = self.scripts.load(ScriptName::AnalyzeOneFlight)?;
        let session = self.sandbox.session().await?;
        let fs = session.fs();
        let log_num = flight.header.log_number().unwrap_or("?").to_string();

        AnalyzeRequest {
            csv: &flight.csv,
            header: &flight.header,
        }
        .write_to(fs)?;
        debug!(log_num = %log_num, csv_bytes = flight.csv.len(), "Analyzing flight");

        let mut reported_error: Option<String> = None;
        let outcome = session
            .execute(
                &script,
                Some(|raw: RawStatus| {
                    let Some(step) = AnalyzeStep::from_raw(&raw) else {
                        debug!(step = %raw.step, "Ignoring unknown analyze status");
                        return;
                    };
                    if let AnalyzeStep::Error(message) = &step
                        && reported_error.is_none()
                    {
                        reported_error = Some(message.clone());
                    }
                    if let Some(f) = on_progress.as_mut() {
                        f(step);
                    }
                }),
            )
            .await;

        fs.remove_if_exists(ANALYZE_CSV_PATH);
        fs.remove_if_exists(ANALYZE_HEADER_PATH);

        let result = match (reported_error, outcome) {
            (Some(message), _) => {
                FlightOutcome::Failed(FlightFailure::new(FailureReason::ScriptReported, message))
            }
            (None, ExecutionOutcome::Failed(message)) => {
                FlightOutcome::Failed(FlightFailure::new(FailureReason::ExecutionFailed, message))
            }
            (None, ExecutionOutcome::Completed) => {
                match AnalyzeResponse::read_from(fs).and_then(AnalyzeResponse::into_result) {
                    Ok(result) => FlightOutcome::Analyzed(Box::new(result)),
                    Err(err) => FlightOutcome::Failed(FlightFailure::new(
                        FailureReason::MalformedOutput,
                        err.to_string(),
                    )),
                }
            }
        };

        fs.clear_dir(RESULTS_DIR)?;

        match &result {
            FlightOutcome::Analyzed(_) => info!(log_num = %log_num, "Flight analyzed"),
            FlightOutcome::Failed(failure) => {
                warn!(log_num = %log_num, reason = ?failure.reason, error = %failure.message, "Flight analysis failed")
            }
        }

        Ok(result)
    }
}
