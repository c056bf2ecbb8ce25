//! Serialization of script executions.
//!
//! Concurrent callers must never observe overlapping runs inside the engine,
//! and each caller must receive only the statuses of its own run.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use pidscope_runtime::protocol::{SPLIT_INPUT_PATH, SPLIT_MANIFEST_PATH};
use pidscope_runtime::{ExecutionOutcome, ScriptName};
use pidscope_testing::assertions::assert_executions_serialized;
use pidscope_testing::fixtures::main_log_with_flights;
use pidscope_testing::{ScriptedEngine, TestWorld, init_test_logging};
use pidscope_types::RawStatus;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_executions_never_overlap() -> Result<()> {
    init_test_logging();
    let world =
        TestWorld::new().with_engine(ScriptedEngine::new().with_run_delay(Duration::from_millis(15)));
    let sandbox = Arc::new(world.sandbox());
    sandbox.initialize().await?;
    sandbox.fs().write(SPLIT_INPUT_PATH, main_log_with_flights(2))?;

    let script = world.scripts().load(ScriptName::SplitBbl)?;
    let mut handles = Vec::new();
    for _ in 0..6 {
        let sandbox = Arc::clone(&sandbox);
        let script = script.clone();
        handles.push(tokio::spawn(async move {
            let mut steps = Vec::new();
            let outcome = sandbox
                .execute(&script, Some(|status: RawStatus| steps.push(status.step)))
                .await?;
            anyhow::Ok((outcome, steps))
        }));
    }

    for handle in handles {
        let (outcome, steps) = handle.await??;
        assert_eq!(outcome, ExecutionOutcome::Completed);
        assert_eq!(steps.first().map(String::as_str), Some("RUNNING"));
        assert_eq!(steps.last().map(String::as_str), Some("COMPLETE"));
        assert_eq!(steps.iter().filter(|s| *s == "COMPLETE").count(), 1);
    }

    let engine = world.engine();
    assert_eq!(engine.records().len(), 6);
    assert_eq!(engine.max_concurrent_runs(), 1);
    assert_executions_serialized(&engine.records())?;
    assert!(!sandbox.is_busy());

    Ok(())
}

#[tokio::test]
async fn test_abandoned_execution_holds_the_slot_until_the_script_ends() -> Result<()> {
    let world =
        TestWorld::new().with_engine(ScriptedEngine::new().with_run_delay(Duration::from_millis(50)));
    let sandbox = world.sandbox();
    sandbox.initialize().await?;
    sandbox.fs().write(SPLIT_INPUT_PATH, main_log_with_flights(1))?;
    let script = world.scripts().load(ScriptName::SplitBbl)?;

    let abandoned = tokio::time::timeout(
        Duration::from_millis(10),
        sandbox.execute(&script, None::<fn(RawStatus)>),
    )
    .await;
    assert!(abandoned.is_err());
    assert!(sandbox.is_busy());

    let mut steps = Vec::new();
    let outcome = sandbox
        .execute(&script, Some(|status: RawStatus| steps.push(status.step)))
        .await?;
    assert_eq!(outcome, ExecutionOutcome::Completed);
    assert_eq!(steps.first().map(String::as_str), Some("RUNNING"));
    assert_eq!(steps.iter().filter(|s| *s == "COMPLETE").count(), 1);

    // the abandoned run finished on its own before the next one started
    let engine = world.engine();
    assert_eq!(engine.records().len(), 2);
    assert_eq!(engine.max_concurrent_runs(), 1);
    assert_executions_serialized(&engine.records())?;
    assert!(sandbox.fs().exists(SPLIT_MANIFEST_PATH));
    assert!(!sandbox.is_busy());

    Ok(())
}

#[tokio::test]
async fn test_concurrent_initialization_loads_once() -> Result<()> {
    let world = TestWorld::new().with_package_index("https://cdn.example.org/pid-analyzer");
    let sandbox = world.sandbox();

    let (first, second) = tokio::join!(sandbox.initialize(), sandbox.initialize());
    first?;
    second?;

    let engine = world.engine();
    assert_eq!(engine.load_count(), 1);
    let installed = engine.installed_packages();
    assert_eq!(installed.len(), 3);
    assert_eq!(
        installed[0].location,
        "https://cdn.example.org/pid-analyzer/packages/numpy"
    );
    assert!(sandbox.is_ready());

    Ok(())
}

#[tokio::test]
async fn test_failed_initialization_is_fatal_for_every_caller() -> Result<()> {
    let world =
        TestWorld::new().with_engine(ScriptedEngine::new().with_load_failure("wasm fetch failed"));
    let sandbox = world.sandbox();

    let err = sandbox.initialize().await.unwrap_err();
    assert!(err.to_string().contains("wasm fetch failed"));
    assert!(sandbox.initialize().await.is_err());

    let script = world.scripts().load(ScriptName::SplitBbl)?;
    let result = sandbox.execute(&script, None::<fn(RawStatus)>).await;
    assert!(matches!(
        result,
        Err(pidscope_runtime::Error::Initialization(_))
    ));
    assert_eq!(world.engine().load_count(), 1);

    Ok(())
}
