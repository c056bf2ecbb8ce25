use std::sync::Arc;

use pidscope_runtime::{
    AnalyzeStage, BlackboxDecoder, CodecAdapter, ComputationSandbox, RuntimeConfig, ScriptEngine,
    ScriptLibrary, SplitStage, primary_table,
};
use pidscope_types::{
    AnalyzeProgress, AnalyzeStep, DecoderResult, FlightAnalysisResult, FlightOutcome,
    PipelineEvent, ProgressEvent, SplitStep,
};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::report::BatchReport;

/// Builder for [`Analyzer`].
///
/// The engine and decoder are required. Without an explicit config the
/// user config file is loaded; without an explicit script library the
/// config's scripts directory is used.
#[derive(Default)]
pub struct AnalyzerBuilder {
    engine: Option<Arc<dyn ScriptEngine>>,
    decoder: Option<Arc<dyn BlackboxDecoder>>,
    config: Option<RuntimeConfig>,
    scripts: Option<ScriptLibrary>,
}

impl AnalyzerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn engine(mut self, engine: Arc<dyn ScriptEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn decoder(mut self, decoder: Arc<dyn BlackboxDecoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Override where script sources come from.
    pub fn scripts(mut self, scripts: ScriptLibrary) -> Self {
        self.scripts = Some(scripts);
        self
    }

    pub fn build(self) -> Result<Analyzer> {
        let engine = self
            .engine
            .ok_or_else(|| Error::InvalidInput("a script engine is required".to_string()))?;
        let decoder = self
            .decoder
            .ok_or_else(|| Error::InvalidInput("a blackbox decoder is required".to_string()))?;
        let config = match self.config {
            Some(config) => config,
            None => RuntimeConfig::load()?,
        };
        let scripts = self.scripts.unwrap_or_else(|| config.script_library());

        Ok(Analyzer {
            inner: Arc::new(AnalyzerInner {
                sandbox: ComputationSandbox::new(engine, config.package_specs()),
                codec: CodecAdapter::new(decoder),
                scripts,
            }),
        })
    }
}

struct AnalyzerInner {
    sandbox: ComputationSandbox,
    codec: CodecAdapter,
    scripts: ScriptLibrary,
}

/// Splits, decodes and analyzes blackbox logs.
///
/// Clones share one sandbox, so script runs from every clone are queued
/// behind each other in call order.
#[derive(Clone)]
pub struct Analyzer {
    inner: Arc<AnalyzerInner>,
}

impl Analyzer {
    pub fn builder() -> AnalyzerBuilder {
        AnalyzerBuilder::new()
    }

    /// Bring up the sandbox: load the engine and install the analysis
    /// packages. Safe to call repeatedly; a failure is returned again on
    /// every later call.
    pub async fn init(&self) -> Result<()> {
        self.inner.sandbox.initialize().await?;
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.inner.sandbox.is_ready()
    }

    pub fn sandbox(&self) -> &ComputationSandbox {
        &self.inner.sandbox
    }

    /// Split a main log into flights and decode each one.
    ///
    /// Flights come back in recording order. Segments without PID data,
    /// flights the decoder rejects and flights without a telemetry table
    /// are left out.
    pub async fn decode_main_log<F>(
        &self,
        raw_log: &[u8],
        mut on_status: Option<F>,
    ) -> Result<Vec<DecoderResult>>
    where
        F: FnMut(SplitStep) + Send,
    {
        if raw_log.is_empty() {
            return Err(Error::InvalidInput("main log is empty".to_string()));
        }

        let inner = &self.inner;
        let flights = SplitStage::new(&inner.sandbox, &inner.scripts)
            .split(raw_log, on_status.as_mut())
            .await?;

        if flights.is_empty() {
            return Ok(Vec::new());
        }
        inner.codec.ensure_loaded().await?;

        let mut decoded = Vec::with_capacity(flights.len());
        for (index, flight) in flights.into_iter().enumerate() {
            emit(&mut on_status, SplitStep::DecodingSubBblStart(index));

            match inner.codec.decode(&flight.sub_log).await {
                Ok(tables) => match primary_table(&tables) {
                    Some(table) => decoded.push(DecoderResult {
                        header: flight.header,
                        csv: table.content.clone(),
                    }),
                    None => warn!(
                        flight_index = index,
                        log_num = flight.header.log_number().unwrap_or("?"),
                        "No telemetry table decoded, skipping flight"
                    ),
                },
                Err(err) => warn!(
                    flight_index = index,
                    error = %err,
                    "Failed to decode flight, skipping"
                ),
            }

            emit(&mut on_status, SplitStep::DecodingSubBblComplete(index));
        }

        info!(flights = decoded.len(), "Decoded main log");
        Ok(decoded)
    }

    /// Analyze every flight in order, keeping failures next to successes.
    pub async fn analyze_all_detailed<F>(
        &self,
        flights: &[DecoderResult],
        mut on_status: Option<F>,
    ) -> Result<BatchReport>
    where
        F: FnMut(AnalyzeProgress) + Send,
    {
        let inner = &self.inner;
        let stage = AnalyzeStage::new(&inner.sandbox, &inner.scripts);
        let mut report = BatchReport::default();

        for (index, flight) in flights.iter().enumerate() {
            let outcome = stage
                .analyze_one(
                    flight,
                    on_status
                        .as_mut()
                        .map(|f| move |step: AnalyzeStep| f(ProgressEvent::flight(index, step))),
                )
                .await?;

            if let FlightOutcome::Failed(failure) = &outcome {
                warn!(
                    flight_index = index,
                    reason = ?failure.reason,
                    error = %failure.message,
                    "Flight analysis failed"
                );
            }
            report.push(index, outcome);
        }

        info!(
            flights = flights.len(),
            analyzed = report.analyzed_count(),
            failed = report.failed_count(),
            "Analyzed batch"
        );
        Ok(report)
    }

    /// Analyze every flight in order. Flights whose analysis fails are
    /// logged and left out.
    pub async fn analyze_all<F>(
        &self,
        flights: &[DecoderResult],
        on_status: Option<F>,
    ) -> Result<Vec<FlightAnalysisResult>>
    where
        F: FnMut(AnalyzeProgress) + Send,
    {
        let report = self.analyze_all_detailed(flights, on_status).await?;
        Ok(report.into_results())
    }

    /// Split, decode and analyze a main log in one call.
    pub async fn analyze_log<F>(&self, raw_log: &[u8], mut on_status: Option<F>) -> Result<BatchReport>
    where
        F: FnMut(PipelineEvent) + Send,
    {
        let flights = self
            .decode_main_log(
                raw_log,
                on_status
                    .as_mut()
                    .map(|f| move |step: SplitStep| f(PipelineEvent::Split(step))),
            )
            .await?;

        self.analyze_all_detailed(
            &flights,
            on_status
                .as_mut()
                .map(|f| move |event: AnalyzeProgress| f(PipelineEvent::Analyze(event))),
        )
        .await
    }
}

fn emit<F: FnMut(SplitStep)>(on_status: &mut Option<F>, step: SplitStep) {
    if let Some(f) = on_status.as_mut() {
        f(step);
    }
}
