//! Custom assertions for pipeline behavior.
//!
//! Provides high-level assertions that make tests more readable:
//! - Progress step ordering for one analyzed flight
//! - Mutual exclusion of script executions
//! - Trace alignment of analysis results

use anyhow::{Context, Result};
use pidscope_types::{AnalyzeStep, Axis, FlightAnalysisResult};

use crate::engine::ExecutionRecord;

/// The steps a successful analysis reports, in order.
pub fn expected_analyze_steps() -> Vec<AnalyzeStep> {
    let mut steps = vec![
        AnalyzeStep::Start,
        AnalyzeStep::ReadingCsvStart,
        AnalyzeStep::ReadingCsvComplete,
        AnalyzeStep::WriteHeaddictToJsonStart,
        AnalyzeStep::WriteHeaddictToJsonComplete,
        AnalyzeStep::AnalyzePidStart,
    ];
    for axis in Axis::ALL {
        steps.push(AnalyzeStep::AnalyzePidTraceStart(axis));
        steps.push(AnalyzeStep::AnalyzePidTraceComplete(axis));
    }
    steps.push(AnalyzeStep::AnalyzePidComplete);
    steps.push(AnalyzeStep::Complete);
    steps
}

/// Assert that `steps` is exactly the successful analysis sequence.
pub fn assert_analyze_step_order(steps: &[AnalyzeStep]) -> Result<()> {
    let expected = expected_analyze_steps();
    if steps.len() != expected.len() {
        anyhow::bail!(
            "Expected {} analyze steps, got {}: {:?}",
            expected.len(),
            steps.len(),
            steps
        );
    }

    for (index, (actual, wanted)) in steps.iter().zip(&expected).enumerate() {
        if actual != wanted {
            anyhow::bail!(
                "Analyze step {} is {} but expected {}",
                index,
                actual.as_str(),
                wanted.as_str()
            );
        }
    }

    Ok(())
}

/// Assert that no two executions overlapped in time.
pub fn assert_executions_serialized(records: &[ExecutionRecord]) -> Result<()> {
    let mut sorted = records.to_vec();
    sorted.sort_by_key(|record| record.started);

    for pair in sorted.windows(2) {
        let (earlier, later) = (&pair[0], &pair[1]);
        if later.started < earlier.finished {
            anyhow::bail!(
                "{} started {:?} before {} finished",
                later.script,
                earlier.finished - later.started,
                earlier.script
            );
        }
    }

    Ok(())
}

/// Assert that every axis trace of `result` is aligned to its time base.
pub fn assert_traces_aligned(result: &FlightAnalysisResult) -> Result<()> {
    for axis in Axis::ALL {
        let trace = result.trace(axis);
        trace
            .validate(axis)
            .with_context(|| format!("{} trace is misaligned", axis))?;
        if trace.sample_count() == 0 {
            anyhow::bail!("{} trace has no samples", axis);
        }
    }
    Ok(())
}
