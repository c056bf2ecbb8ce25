//! pidscope-sdk: PID tuning analysis of multi-flight blackbox logs.
//!
//! # Overview
//!
//! A flight controller records every arming of a session into one blackbox
//! file. `pidscope-sdk` takes that main log, cuts it into one sub-log per
//! flight, decodes each sub-log into CSV telemetry and runs the step
//! response and noise analysis over every flight, reporting typed progress
//! along the way.
//!
//! The heavy lifting happens in two external collaborators the host
//! supplies: a [`ScriptEngine`] that runs the split and analysis scripts,
//! and a [`BlackboxDecoder`]. All script runs share one sandbox and are
//! executed strictly one at a time, in call order.
//!
//! # Quickstart
//!
//! ```no_run
//! use std::sync::Arc;
//! use pidscope_sdk::{Analyzer, BlackboxDecoder, RuntimeConfig, ScriptEngine};
//!
//! # async fn run(
//! #     engine: Arc<dyn ScriptEngine>,
//! #     decoder: Arc<dyn BlackboxDecoder>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let analyzer = Analyzer::builder()
//!     .engine(engine)
//!     .decoder(decoder)
//!     .config(RuntimeConfig::default())
//!     .build()?;
//! analyzer.init().await?;
//!
//! let raw = std::fs::read("LOG00042.BFL")?;
//! let flights = analyzer
//!     .decode_main_log(&raw, Some(|step: pidscope_sdk::types::SplitStep| {
//!         println!("{}", step.as_str());
//!     }))
//!     .await?;
//!
//! let results = analyzer
//!     .analyze_all(&flights, None::<fn(pidscope_sdk::types::AnalyzeProgress)>)
//!     .await?;
//! for result in &results {
//!     println!(
//!         "flight {}: {} roll samples",
//!         result.header.log_number().unwrap_or("?"),
//!         result.roll.sample_count()
//!     );
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! This SDK is a facade over:
//! - `pidscope-types`: flight headers, axis traces and the progress protocol
//! - `pidscope-runtime`: the computation sandbox, the decoder adapter and
//!   the split/analyze script stages
//!
//! # Usage Patterns
//!
//! ## Keeping failures
//!
//! [`Analyzer::analyze_all`] drops flights whose analysis failed.
//! [`Analyzer::analyze_all_detailed`] keeps them in a [`BatchReport`]:
//!
//! ```no_run
//! # async fn run(analyzer: pidscope_sdk::Analyzer, flights: Vec<pidscope_sdk::types::DecoderResult>)
//! #     -> Result<(), Box<dyn std::error::Error>> {
//! use pidscope_sdk::types::AnalyzeProgress;
//!
//! let report = analyzer
//!     .analyze_all_detailed(&flights, None::<fn(AnalyzeProgress)>)
//!     .await?;
//! for (index, failure) in report.failures() {
//!     eprintln!("flight #{} failed: {}", index, failure);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## One-shot
//!
//! ```no_run
//! # async fn run(analyzer: pidscope_sdk::Analyzer, raw: Vec<u8>)
//! #     -> Result<(), Box<dyn std::error::Error>> {
//! use pidscope_sdk::types::PipelineEvent;
//!
//! let report = analyzer
//!     .analyze_log(&raw, Some(|event: PipelineEvent| println!("{:?}", event)))
//!     .await?;
//! println!("{} flights analyzed", report.analyzed_count());
//! # Ok(())
//! # }
//! ```

pub mod analyzer;
pub mod error;
pub mod report;
pub mod types;

pub use analyzer::{Analyzer, AnalyzerBuilder};
pub use error::{Error, Result};
pub use report::{BatchReport, FlightReport};

// Collaborator seams and configuration
pub use pidscope_runtime::{BlackboxDecoder, PackageSpec, RuntimeConfig, ScriptEngine, ScriptLibrary};
