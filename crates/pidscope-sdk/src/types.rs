//! Type re-exports for the SDK.
//!
//! Everything a caller handles when driving an [`Analyzer`](crate::Analyzer)
//! is reachable from here, so hosts do not need to depend on the internal
//! crates directly.

// ============================================================================
// Flight data (from pidscope-types)
// ============================================================================

pub use pidscope_types::{
    Axis, AxisTrace, DecoderResult, FailureReason, FirmwareType, FlightAnalysisResult,
    FlightFailure, FlightHeader, FlightOutcome, Histogram2d, NoiseSpectrum, PidGains,
    ResponseCurve, ThrustResponse,
};

// ============================================================================
// Progress protocol (from pidscope-types)
// ============================================================================

pub use pidscope_types::{
    AnalyzeProgress, AnalyzeStep, PipelineEvent, ProgressEvent, RawStatus, SplitProgress,
    SplitStep,
};

// ============================================================================
// Runtime handles (from pidscope-runtime)
// ============================================================================

pub use pidscope_runtime::{
    ComputationSandbox, ExecutionOutcome, Script, ScriptName, StatusReporter, VirtualFs,
};
