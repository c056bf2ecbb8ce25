//! End-to-end Tests
//!
//! A main log goes in, one analysis result per recorded flight comes out.

use anyhow::Result;
use pidscope_sdk::types::{AnalyzeProgress, AnalyzeStep, Axis, PipelineEvent, ProgressEvent, SplitStep};
use pidscope_sdk::{Analyzer, Error};
use pidscope_testing::assertions::assert_traces_aligned;
use pidscope_testing::fixtures::{CSV_COLUMNS, FlightSpec, main_log};
use pidscope_testing::{FakeDecoder, ScriptedEngine, TestWorld, init_test_logging};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

use crate::{analyzer_for, ready_analyzer};

// =============================================================================
// FULL PIPELINE
// =============================================================================

#[tokio::test]
async fn test_two_flight_log_end_to_end() -> Result<()> {
    init_test_logging();
    let world = TestWorld::new();
    let analyzer = ready_analyzer(&world).await?;

    let flight = FlightSpec::new().field("simplified_d_gain", "1234").samples(24);
    let raw = main_log(&[flight.clone(), flight]);

    let decoded = analyzer.decode_main_log(&raw, None::<fn(SplitStep)>).await?;
    assert_eq!(decoded.len(), 2);
    for flight in &decoded {
        assert!(flight.csv.starts_with(CSV_COLUMNS));
        assert_eq!(flight.csv.lines().count(), 25);
    }

    let results = analyzer
        .analyze_all(&decoded, None::<fn(AnalyzeProgress)>)
        .await?;
    assert_eq!(results.len(), 2);

    let log_numbers: Vec<_> = results
        .iter()
        .map(|result| result.header.log_number())
        .collect();
    assert_eq!(log_numbers, vec![Some("1"), Some("2")]);

    for result in &results {
        assert_traces_aligned(result)?;
        assert_eq!(result.roll.sample_count(), 24);
        assert_eq!(result.header.tpa_percent(), Some(35.0));
        assert_eq!(result.header.field("simplified_d_gain"), Some(&json!("12.34")));
        assert_eq!(result.header.pid(Axis::Roll).as_array(), [45.0, 80.0, 30.0]);
    }

    // every script run left the shared store clean
    assert!(analyzer.sandbox().fs().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_analyze_log_one_shot() -> Result<()> {
    let world = TestWorld::new();
    let analyzer = ready_analyzer(&world).await?;

    let mut events = Vec::new();
    let report = analyzer
        .analyze_log(
            &main_log(&[FlightSpec::new(), FlightSpec::new()]),
            Some(|event| events.push(event)),
        )
        .await?;

    assert_eq!(report.analyzed_count(), 2);
    assert_eq!(report.failed_count(), 0);

    assert_eq!(events.first(), Some(&PipelineEvent::Split(SplitStep::Running)));
    assert_eq!(
        events.last(),
        Some(&PipelineEvent::Analyze(ProgressEvent::flight(1, AnalyzeStep::Complete)))
    );

    // decoding finishes before the first analysis starts
    let last_split = events
        .iter()
        .rposition(|event| matches!(event, PipelineEvent::Split(_)))
        .unwrap();
    let first_analyze = events
        .iter()
        .position(|event| matches!(event, PipelineEvent::Analyze(_)))
        .unwrap();
    assert_eq!(
        events[last_split],
        PipelineEvent::Split(SplitStep::DecodingSubBblComplete(1))
    );
    assert!(last_split < first_analyze);
    Ok(())
}

// =============================================================================
// INITIALIZATION
// =============================================================================

#[tokio::test]
async fn test_pipeline_requires_init() -> Result<()> {
    let world = TestWorld::new();
    let analyzer = analyzer_for(&world)?;
    assert!(!analyzer.is_ready());

    let result = analyzer
        .decode_main_log(&main_log(&[FlightSpec::new()]), None::<fn(SplitStep)>)
        .await;
    assert!(matches!(
        result,
        Err(Error::Runtime(pidscope_runtime::Error::NotInitialized))
    ));
    Ok(())
}

#[tokio::test]
async fn test_init_is_idempotent() -> Result<()> {
    let world = TestWorld::new();
    let analyzer = analyzer_for(&world)?;

    analyzer.init().await?;
    analyzer.clone().init().await?;

    assert!(analyzer.is_ready());
    assert_eq!(world.engine().load_count(), 1);
    // the decoder loads on first decode, not on init
    assert_eq!(world.decoder().load_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_init_failure_is_fatal() -> Result<()> {
    let world = TestWorld::new().with_engine(ScriptedEngine::new().with_load_failure("no wasm"));
    let analyzer = analyzer_for(&world)?;

    for _ in 0..2 {
        let result = analyzer.init().await;
        match result {
            Err(Error::Runtime(pidscope_runtime::Error::Initialization(message))) => {
                assert!(message.contains("no wasm"), "unexpected message: {}", message);
            }
            other => panic!("expected initialization error, got {:?}", other.map(|_| ())),
        }
    }

    assert!(!analyzer.is_ready());
    assert_eq!(world.engine().load_count(), 1);
    Ok(())
}

#[test]
fn test_builder_requires_collaborators() {
    let result = Analyzer::builder()
        .decoder(Arc::new(FakeDecoder::new()))
        .config(pidscope_sdk::RuntimeConfig::default())
        .build();
    assert!(matches!(result, Err(Error::InvalidInput(_))));

    let result = Analyzer::builder()
        .engine(Arc::new(ScriptedEngine::new()))
        .config(pidscope_sdk::RuntimeConfig::default())
        .build();
    assert!(matches!(result, Err(Error::InvalidInput(_))));
}
