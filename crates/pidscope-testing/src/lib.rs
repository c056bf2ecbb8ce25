//! Testing infrastructure for pidscope integration tests.
//!
//! This crate provides in-process stand-ins for the external collaborators
//! and the data they consume:
//! - `ScriptedEngine`: script engine that performs the split and analyze
//!   file contracts natively, with fault injection and timing records
//! - `FakeDecoder`: blackbox decoder over the fixture log format
//! - `fixtures`: main-log and decoded-flight builders
//! - `assertions`: pipeline-specific checks (progress order, serialization)
//! - `TestWorld`: a scripts directory, config and doubles wired together
//! - `init_test_logging`: tracing subscriber for test output

pub mod assertions;
pub mod decoder;
pub mod engine;
pub mod fixtures;
pub mod logging;
pub mod world;

pub use decoder::FakeDecoder;
pub use engine::{AnalysisFault, ExecutionRecord, ScriptedEngine};
pub use fixtures::FlightSpec;
pub use logging::init_test_logging;
pub use world::TestWorld;
