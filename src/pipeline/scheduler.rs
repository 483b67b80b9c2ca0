use std::future::Future;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use super::Pipeline;
use crate::errors::PipelineError;

/// Longest wait after repeated failures, as a multiple of the poll interval.
const MAX_BACKOFF_FACTOR: u32 = 8;

/// Upper bound on any wait, keeping deadline arithmetic clear of overflow.
const MAX_DELAY: Duration = Duration::from_secs(30 * 24 * 60 * 60);

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStats {
    pub cycles: u32,
    pub failures: u32,
}

/// Delay before the next cycle after `consecutive_failures` failed cycles in a
/// row: the interval, doubled per extra failure, capped at 8× and at 30 days.
pub fn backoff_delay(interval: Duration, consecutive_failures: u32) -> Duration {
    let exponent = consecutive_failures.saturating_sub(1).min(MAX_BACKOFF_FACTOR.ilog2());
    interval
        .checked_mul(2u32.pow(exponent))
        .unwrap_or(Duration::MAX)
        .min(MAX_DELAY)
}

/// Run cycles on a fixed interval until `shutdown` resolves.
///
/// A cycle always finishes before the next tick is taken, so cycles never
/// overlap; ticks missed while a slow cycle runs are skipped, not queued.
/// Shutdown is only observed between cycles. Failing to prepare the pipeline
/// ends the loop before the first cycle.
pub async fn run<S>(pipeline: &mut Pipeline, period: Duration, shutdown: S) -> Result<SchedulerStats, PipelineError>
where
    S: Future<Output = ()>,
{
    pipeline.prepare().await?;

    let period = period.min(MAX_DELAY);
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    let mut stats = SchedulerStats::default();
    let mut consecutive_failures = 0;
    info!(?period, "Polling started");

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown signal received, stopping");
                break;
            }
            _ = ticker.tick() => {}
        }

        stats.cycles += 1;
        match pipeline.run_cycle().await {
            Ok(_) => consecutive_failures = 0,
            Err(e) => {
                stats.failures += 1;
                consecutive_failures += 1;
                let delay = backoff_delay(period, consecutive_failures);
                error!(error = %e, consecutive_failures, ?delay, "Cycle failed");
                ticker.reset_after(delay);
            }
        }
    }

    info!(cycles = stats.cycles, failures = stats.failures, "Polling stopped");
    Ok(stats)
}
