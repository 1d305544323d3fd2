//! Many intervals at once.
//!
//! Independent intervals fan out over a rayon pool; each solve owns its own
//! backend problem, so one [`Dispatcher`] is shared by every worker.
//! Sequential intervals feed each one's energy dispatch into the next one's
//! initial outputs.

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::{info, warn};

use mce_core::MarketInputs;

use crate::error::DispatchError;
use crate::orchestrator::Dispatcher;
use crate::results::DispatchOutcome;

/// Per-interval results of a batch, in input order.
#[derive(Debug)]
pub struct BatchSummary {
    pub success: usize,
    pub failure: usize,
    pub outcomes: Vec<Result<DispatchOutcome, DispatchError>>,
}

impl BatchSummary {
    fn new(outcomes: Vec<Result<DispatchOutcome, DispatchError>>) -> Self {
        let success = outcomes.iter().filter(|o| o.is_ok()).count();
        Self {
            success,
            failure: outcomes.len() - success,
            outcomes,
        }
    }
}

/// Clear independent intervals. `threads == 0` uses rayon's default pool
/// size. A failing interval does not stop the others.
#[cfg(feature = "parallel")]
pub fn dispatch_intervals(
    dispatcher: &Dispatcher,
    intervals: &[MarketInputs],
    threads: usize,
) -> Result<BatchSummary, DispatchError> {
    let mut builder = rayon::ThreadPoolBuilder::new();
    if threads > 0 {
        builder = builder.num_threads(threads);
    }
    let pool = builder
        .build()
        .map_err(|err| DispatchError::Config(format!("building rayon pool for batch dispatch: {err}")))?;

    let outcomes: Vec<_> = pool.install(|| intervals.par_iter().map(|inputs| dispatcher.dispatch(inputs)).collect());
    let summary = BatchSummary::new(outcomes);
    log_summary(&summary);
    Ok(summary)
}

/// Clear independent intervals one after another.
#[cfg(not(feature = "parallel"))]
pub fn dispatch_intervals(
    dispatcher: &Dispatcher,
    intervals: &[MarketInputs],
    _threads: usize,
) -> Result<BatchSummary, DispatchError> {
    let outcomes = intervals.iter().map(|inputs| dispatcher.dispatch(inputs)).collect();
    let summary = BatchSummary::new(outcomes);
    log_summary(&summary);
    Ok(summary)
}

/// Clear consecutive intervals, starting each unit from the energy dispatch
/// of the previous interval. Stops at the first failure.
pub fn dispatch_sequence(
    dispatcher: &Dispatcher,
    intervals: Vec<MarketInputs>,
) -> Result<Vec<DispatchOutcome>, DispatchError> {
    let mut outcomes: Vec<DispatchOutcome> = Vec::with_capacity(intervals.len());
    for inputs in intervals {
        let inputs = match outcomes.last() {
            Some(previous) => inputs.with_initial_outputs(&previous.initial_outputs()),
            None => inputs,
        };
        outcomes.push(dispatcher.dispatch(&inputs)?);
    }
    Ok(outcomes)
}

fn log_summary(summary: &BatchSummary) {
    if summary.failure > 0 {
        warn!(
            success = summary.success,
            failure = summary.failure,
            "batch dispatch finished with failures"
        );
    } else {
        info!(intervals = summary.success, "batch dispatch finished");
    }
}
