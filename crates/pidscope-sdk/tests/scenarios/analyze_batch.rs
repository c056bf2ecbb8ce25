//! Batch Analysis Tests
//!
//! Verifies that a batch is analyzed in input order, that one failing
//! flight does not take the others down, and that concurrent batches share
//! the sandbox one script at a time.

use std::time::Duration;

use anyhow::Result;
use pidscope_sdk::types::{AnalyzeProgress, FailureReason, FlightOutcome};
use pidscope_testing::assertions::{assert_executions_serialized, assert_traces_aligned};
use pidscope_testing::fixtures::decoded_flight;
use pidscope_testing::{AnalysisFault, ScriptedEngine, TestWorld};
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::ready_analyzer;

// =============================================================================
// PARTIAL FAILURE
// =============================================================================

#[tokio::test]
async fn test_one_error_flight_leaves_the_rest() -> Result<()> {
    let world = TestWorld::new().with_engine(
        ScriptedEngine::new().with_fault(2, AnalysisFault::Report("resp_y.size == 0".into())),
    );
    let analyzer = ready_analyzer(&world).await?;
    let flights: Vec<_> = (1..=4).map(|n| decoded_flight(n, 16)).collect();

    let results = analyzer
        .analyze_all(&flights, None::<fn(AnalyzeProgress)>)
        .await?;

    let log_numbers: Vec<_> = results
        .iter()
        .map(|result| result.header.log_number().unwrap_or("?"))
        .collect();
    assert_eq!(log_numbers, vec!["1", "3", "4"]);
    for result in &results {
        assert_traces_aligned(result)?;
    }
    Ok(())
}

#[tokio::test]
async fn test_detailed_report_keeps_failures() -> Result<()> {
    let engine = ScriptedEngine::new()
        .with_fault(1, AnalysisFault::Raise("ValueError: bad csv".into()))
        .with_fault(2, AnalysisFault::Panic("engine trap".into()))
        .with_fault(3, AnalysisFault::Misaligned);
    let world = TestWorld::new().with_engine(engine);
    let analyzer = ready_analyzer(&world).await?;
    let flights: Vec<_> = (1..=4).map(|n| decoded_flight(n, 16)).collect();

    let report = analyzer
        .analyze_all_detailed(&flights, None::<fn(AnalyzeProgress)>)
        .await?;

    let indices: Vec<_> = report.flights.iter().map(|flight| flight.index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3]);

    let reasons: Vec<_> = report
        .failures()
        .map(|(index, failure)| (index, failure.reason))
        .collect();
    assert_eq!(
        reasons,
        vec![
            (0, FailureReason::ExecutionFailed),
            (1, FailureReason::ExecutionFailed),
            (2, FailureReason::MalformedOutput),
        ]
    );
    assert!(report.flights[3].outcome.is_analyzed());
    assert_eq!(report.analyzed_count(), 1);

    let (_, raised) = report.failures().next().unwrap();
    assert!(raised.message.contains("ValueError: bad csv"));

    // a panicking run does not poison the sandbox
    assert!(analyzer.is_ready());
    Ok(())
}

#[tokio::test]
async fn test_flight_without_samples_is_reported() -> Result<()> {
    let world = TestWorld::new();
    let analyzer = ready_analyzer(&world).await?;

    let report = analyzer
        .analyze_all_detailed(&[decoded_flight(1, 0)], None::<fn(AnalyzeProgress)>)
        .await?;

    match &report.flights[0].outcome {
        FlightOutcome::Failed(failure) => {
            assert_eq!(failure.reason, FailureReason::ScriptReported);
            assert_eq!(failure.message, "No data for equalization!");
        }
        FlightOutcome::Analyzed(_) => panic!("a flight without samples cannot be analyzed"),
    }
    assert!(report.into_results().is_empty());
    Ok(())
}

// =============================================================================
// HEADER NORMALIZATION
// =============================================================================

#[tokio::test]
async fn test_simplified_fields_are_scaled() -> Result<()> {
    let world = TestWorld::new();
    let analyzer = ready_analyzer(&world).await?;

    let results = analyzer
        .analyze_all(&[decoded_flight(1, 8)], None::<fn(AnalyzeProgress)>)
        .await?;

    let header = &results[0].header;
    assert_eq!(header.field("simplified_d_gain"), Some(&json!("12.34")));
    // blank values are left as reported
    assert_eq!(header.field("simplified_i_gain"), Some(&json!("")));
    assert_eq!(header.tpa_percent(), Some(35.0));
    Ok(())
}

#[tokio::test]
async fn test_empty_batch() -> Result<()> {
    let world = TestWorld::new();
    let analyzer = ready_analyzer(&world).await?;

    let results = analyzer.analyze_all(&[], None::<fn(AnalyzeProgress)>).await?;

    assert!(results.is_empty());
    assert!(world.engine().records().is_empty());
    Ok(())
}

// =============================================================================
// SHARED SANDBOX
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_batches_share_one_queue() -> Result<()> {
    let world = TestWorld::new()
        .with_engine(ScriptedEngine::new().with_run_delay(Duration::from_millis(5)));
    let analyzer = ready_analyzer(&world).await?;
    let first: Vec<_> = (1..=3).map(|n| decoded_flight(n, 8)).collect();
    let second: Vec<_> = (4..=6).map(|n| decoded_flight(n, 8)).collect();

    let other = analyzer.clone();
    let handle = tokio::spawn(async move {
        other
            .analyze_all(&second, None::<fn(AnalyzeProgress)>)
            .await
    });
    let mine = analyzer
        .analyze_all(&first, None::<fn(AnalyzeProgress)>)
        .await?;
    let theirs = handle.await??;

    assert_eq!(mine.len(), 3);
    assert_eq!(theirs.len(), 3);
    assert_eq!(theirs[0].header.log_number(), Some("4"));

    let engine = world.engine();
    assert_eq!(engine.records().len(), 6);
    assert_eq!(engine.max_concurrent_runs(), 1);
    assert_executions_serialized(&engine.records())?;
    Ok(())
}
