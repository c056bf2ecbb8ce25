//! Decode Tests
//!
//! Verifies how a main log becomes decoded flights: one per recording with
//! PID data, in recording order, with undecodable flights left out.

use anyhow::Result;
use pidscope_runtime::ScriptName;
use pidscope_sdk::Error;
use pidscope_sdk::types::{Axis, FirmwareType, SplitStep};
use pidscope_testing::fixtures::{FlightSpec, main_log, main_log_with_flights};
use pidscope_testing::{ScriptedEngine, TestWorld};
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::ready_analyzer;

fn log_numbers(flights: &[pidscope_sdk::types::DecoderResult]) -> Vec<&str> {
    flights
        .iter()
        .map(|flight| flight.header.log_number().unwrap_or("?"))
        .collect()
}

// =============================================================================
// FLIGHT EXTRACTION
// =============================================================================

#[tokio::test]
async fn test_decodes_every_flight_in_order() -> Result<()> {
    let world = TestWorld::new();
    let analyzer = ready_analyzer(&world).await?;

    let decoded = analyzer
        .decode_main_log(&main_log_with_flights(4), None::<fn(SplitStep)>)
        .await?;

    assert_eq!(log_numbers(&decoded), vec!["1", "2", "3", "4"]);
    assert_eq!(world.decoder().decode_count(), 4);
    assert_eq!(world.decoder().load_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_decoded_headers_match_the_split_manifest() -> Result<()> {
    let world = TestWorld::new();
    let analyzer = ready_analyzer(&world).await?;

    let raw = main_log(&[
        FlightSpec::new(),
        FlightSpec::new().field("rollPID", "70,45,").field("Craft name", "whoop"),
    ]);
    let decoded = analyzer.decode_main_log(&raw, None::<fn(SplitStep)>).await?;

    // the lead-in segment has no PID data and yields no flight
    let reported = world.engine().reported_headers();
    assert_eq!(decoded.len(), reported.len() - 1);
    for (flight, expected) in decoded.iter().zip(&reported[1..]) {
        assert_eq!(flight.header.raw(), expected);
        let keys: Vec<_> = flight.header.raw().keys().collect();
        let expected_keys: Vec<_> = expected.keys().collect();
        assert_eq!(keys, expected_keys);
    }

    let second = decoded[1].header.raw();
    assert_eq!(second["fwType"], json!("Cleanflight"));
    assert_eq!(second["maxThrottle"], json!("2000"));
    assert_eq!(second["rollPID"], json!("70,45,"));
    assert_eq!(second["craftName"], json!("whoop"));
    Ok(())
}

#[tokio::test]
async fn test_flights_without_pid_data_are_dropped() -> Result<()> {
    let world = TestWorld::new();
    let analyzer = ready_analyzer(&world).await?;

    let raw = main_log(&[
        FlightSpec::new(),
        FlightSpec::new().without_pid(Axis::Yaw),
        FlightSpec::new().firmware("KISS"),
    ]);
    let decoded = analyzer.decode_main_log(&raw, None::<fn(SplitStep)>).await?;

    assert_eq!(log_numbers(&decoded), vec!["1", "3"]);
    assert_eq!(decoded[1].header.firmware(), FirmwareType::Kiss);
    // the dropped segment never reaches the decoder
    assert_eq!(world.decoder().decode_count(), 2);
    Ok(())
}

#[tokio::test]
async fn test_undecodable_flights_are_skipped() -> Result<()> {
    let world = TestWorld::new();
    let analyzer = ready_analyzer(&world).await?;

    let raw = main_log(&[
        FlightSpec::new(),
        FlightSpec::new().field("corrupt", "1"),
        FlightSpec::new().samples(0),
        FlightSpec::new(),
    ]);
    let decoded = analyzer.decode_main_log(&raw, None::<fn(SplitStep)>).await?;

    assert_eq!(log_numbers(&decoded), vec!["1", "4"]);
    assert_eq!(world.decoder().decode_count(), 4);
    Ok(())
}

// =============================================================================
// EMPTY AND FAILED SPLITS
// =============================================================================

#[tokio::test]
async fn test_empty_log_is_rejected() -> Result<()> {
    let world = TestWorld::new();
    let analyzer = ready_analyzer(&world).await?;

    let result = analyzer.decode_main_log(&[], None::<fn(SplitStep)>).await;
    assert!(matches!(result, Err(Error::InvalidInput(_))));
    assert!(world.engine().records().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_split_failure_yields_no_flights() -> Result<()> {
    let world = TestWorld::new().with_engine(ScriptedEngine::new().with_split_failure("bad log"));
    let analyzer = ready_analyzer(&world).await?;

    let decoded = analyzer
        .decode_main_log(&main_log_with_flights(2), None::<fn(SplitStep)>)
        .await?;

    assert!(decoded.is_empty());
    assert_eq!(world.decoder().load_count(), 0);

    // the sandbox stays usable after a failed script
    assert!(analyzer.is_ready());
    Ok(())
}

#[tokio::test]
async fn test_missing_split_script() -> Result<()> {
    let world = TestWorld::new().without_script(ScriptName::SplitBbl);
    let analyzer = ready_analyzer(&world).await?;

    let result = analyzer
        .decode_main_log(&main_log_with_flights(1), None::<fn(SplitStep)>)
        .await;
    match result {
        Err(Error::NotFound(message)) => assert!(message.contains("split-bbl.py")),
        other => panic!("expected NotFound, got {:?}", other.map(|flights| flights.len())),
    }
    Ok(())
}
