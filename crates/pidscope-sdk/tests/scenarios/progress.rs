//! Progress Tests
//!
//! Verifies the order of progress events callers observe, and their wire form.

use anyhow::Result;
use pidscope_sdk::types::{AnalyzeProgress, AnalyzeStep, SplitStep};
use pidscope_testing::TestWorld;
use pidscope_testing::assertions::{assert_analyze_step_order, expected_analyze_steps};
use pidscope_testing::fixtures::{decoded_flight, main_log_with_flights};
use pretty_assertions::assert_eq;

use crate::ready_analyzer;

#[tokio::test]
async fn test_decoding_steps_follow_split_steps() -> Result<()> {
    let world = TestWorld::new();
    let analyzer = ready_analyzer(&world).await?;

    let mut steps = Vec::new();
    analyzer
        .decode_main_log(&main_log_with_flights(2), Some(|step| steps.push(step)))
        .await?;

    // three segments: the empty lead-in plus two flights
    let mut expected = vec![
        SplitStep::Running,
        SplitStep::SplittingBbl,
        SplitStep::BblsSplitted(2),
        SplitStep::ReadingHeadersStart(3),
    ];
    for index in 0..3 {
        expected.push(SplitStep::ReadingHeadersFromSubBblStart(index));
        expected.push(SplitStep::ReadingHeadersFromSubBblComplete(index));
    }
    expected.extend([
        SplitStep::ReadingHeadersComplete,
        SplitStep::Complete,
        SplitStep::DecodingSubBblStart(0),
        SplitStep::DecodingSubBblComplete(0),
        SplitStep::DecodingSubBblStart(1),
        SplitStep::DecodingSubBblComplete(1),
    ]);

    assert_eq!(steps, expected);
    Ok(())
}

#[tokio::test]
async fn test_analyze_steps_are_tagged_and_ordered() -> Result<()> {
    let world = TestWorld::new();
    let analyzer = ready_analyzer(&world).await?;
    let flights: Vec<_> = (1..=3).map(|n| decoded_flight(n, 8)).collect();

    let mut events: Vec<AnalyzeProgress> = Vec::new();
    analyzer
        .analyze_all(&flights, Some(|event| events.push(event)))
        .await?;

    let per_flight = expected_analyze_steps().len();
    assert_eq!(events.len(), per_flight * flights.len());

    // flights never interleave
    for (chunk_index, chunk) in events.chunks(per_flight).enumerate() {
        assert!(
            chunk
                .iter()
                .all(|event| event.flight_index == Some(chunk_index))
        );
        let steps: Vec<AnalyzeStep> = chunk.iter().map(|event| event.step.clone()).collect();
        assert_analyze_step_order(&steps)?;
    }
    Ok(())
}

#[tokio::test]
async fn test_error_step_reaches_caller() -> Result<()> {
    let world = TestWorld::new();
    let analyzer = ready_analyzer(&world).await?;

    let mut events: Vec<AnalyzeProgress> = Vec::new();
    analyzer
        .analyze_all(&[decoded_flight(1, 0)], Some(|event| events.push(event)))
        .await?;

    let last = events.last().unwrap();
    assert_eq!(last.flight_index, Some(0));
    assert_eq!(
        last.step,
        AnalyzeStep::Error("No data for equalization!".to_string())
    );
    assert!(!events.iter().any(|event| event.step == AnalyzeStep::Complete));
    Ok(())
}

#[tokio::test]
async fn test_progress_wire_form() -> Result<()> {
    let world = TestWorld::new();
    let analyzer = ready_analyzer(&world).await?;

    let mut events: Vec<AnalyzeProgress> = Vec::new();
    analyzer
        .analyze_all(&[decoded_flight(1, 8)], Some(|event| events.push(event)))
        .await?;

    insta::assert_json_snapshot!(&events[5..9], @r#"
    [
      {
        "flight_index": 0,
        "step": "ANALYZE_PID_START"
      },
      {
        "flight_index": 0,
        "step": "ANALYZE_PID_TRACE_START",
        "payload": "roll"
      },
      {
        "flight_index": 0,
        "step": "ANALYZE_PID_TRACE_COMPLETE",
        "payload": "roll"
      },
      {
        "flight_index": 0,
        "step": "ANALYZE_PID_TRACE_START",
        "payload": "pitch"
      }
    ]
    "#);
    Ok(())
}
