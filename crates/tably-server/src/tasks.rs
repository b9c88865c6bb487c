//! Background maintenance tasks.

use std::sync::Arc;
use std::time::Duration;

use tably_auth::SessionRegistry;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Spawns the periodic revoked-token compaction sweep.
///
/// Runs independently of request traffic and bounds the memory growth
/// of the blacklist; without it, revoked tokens accumulate forever.
pub fn spawn_compaction(sessions: Arc<SessionRegistry>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; an empty registry has
        // nothing to sweep, so skip it.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let removed = sessions.compact();
            tracing::debug!(removed, "revoked-token compaction completed");
        }
    })
}
