/// Background revocation sweeper
///
/// Mutating calls already sweep opportunistically; this loop keeps the
/// registries bounded when traffic is idle.
use crate::services::IdentityOrchestrator;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// `tokio::time::interval` panics on a zero period
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// Sweep expired entries every `interval` until `cancel` fires
///
/// Intervals below one millisecond are raised to it.
///
/// # Example
///
/// ```no_run
/// # use identity_core::services::{spawn_revocation_sweeper, IdentityOrchestrator};
/// # use std::sync::Arc;
/// # use std::time::Duration;
/// # use tokio_util::sync::CancellationToken;
/// # async fn example(orchestrator: Arc<IdentityOrchestrator>) {
/// let shutdown = CancellationToken::new();
/// let handle = spawn_revocation_sweeper(orchestrator, Duration::from_secs(60), shutdown.clone());
///
/// // On shutdown:
/// shutdown.cancel();
/// handle.await.ok();
/// # }
/// ```
pub fn spawn_revocation_sweeper(
    orchestrator: Arc<IdentityOrchestrator>,
    interval: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval_timer = tokio::time::interval(interval.max(MIN_SWEEP_INTERVAL));
        interval_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval_timer.tick().await; // first tick fires immediately

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Revocation sweeper stopped");
                    break;
                }
                _ = interval_timer.tick() => {
                    let stats = orchestrator.sweep_expired();
                    debug!(
                        revocations = stats.revocations,
                        refresh_tokens = stats.refresh_tokens,
                        mfa_sessions = stats.mfa_sessions,
                        "Periodic sweep finished"
                    );
                }
            }
        }
    })
}
