//! Async tick driver for hosts that do not call [`BingoPlugin::tick`] themselves

use crate::bingo::BingoPlugin;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// One Minecraft second
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_secs(1);

/// Tick `plugin` every `period` until `token` is cancelled
pub fn spawn_tick_loop(plugin: Arc<BingoPlugin>, period: Duration, token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = interval.tick() => {
                    if let Some(report) = plugin.tick(Utc::now()) {
                        for id in &report.finished {
                            tracing::info!("Match {} reached its time limit", id);
                        }
                    }
                }
            }
        }

        tracing::debug!("Tick loop stopped");
    })
}
