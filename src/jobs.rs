use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::sync::watch;

use crate::bank::BankClient;
use crate::error::Result;
use crate::notify::{self, Notifier};
use crate::sync;
use crate::AppState;

/// Periodic sync loop. The first tick fires immediately, so a broken
/// configuration surfaces at startup instead of one interval later; a
/// failure of that first cycle is fatal to the task. Later cycle failures
/// are logged and retried at the next tick.
pub async fn sync_task(
    state: Arc<AppState>,
    client: BankClient,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let mut interval = tokio::time::interval(Duration::from_secs(state.sync_interval));
    let mut first_cycle = true;

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.changed() => {
                tracing::info!("sync task shutting down");
                return Ok(());
            }
        }

        tracing::info!("Running sync cycle...");
        match sync::sync_once(&state.pool, &client).await {
            Ok(()) => {}
            Err(err) if first_cycle => return Err(err),
            Err(err) => tracing::error!("sync cycle failed: {}", err),
        }
        first_cycle = false;
        tracing::info!("Finished sync cycle...");
    }
}

/// Daily report loop: wait for the next trigger instant, send the report,
/// settle for a minute so the same wall-clock second can't trigger twice,
/// then recompute tomorrow's instant.
pub async fn notify_task(
    state: Arc<AppState>,
    notifier: Notifier,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    loop {
        let now = Local::now().naive_local();
        let target = notify::next_notify_instant(now, state.notify_hour);
        let wait = (target - now).to_std().unwrap_or_default();
        tracing::info!("waiting to send a spending report at {}", target);

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = shutdown.changed() => {
                tracing::info!("notify task shutting down");
                return Ok(());
            }
        }

        if let Err(err) = notify::send_report(&state.pool, &state.report_categories, &notifier).await
        {
            tracing::error!("generating/sending report: {}", err);
        }

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(60)) => {}
            _ = shutdown.changed() => {
                tracing::info!("notify task shutting down");
                return Ok(());
            }
        }
    }
}
