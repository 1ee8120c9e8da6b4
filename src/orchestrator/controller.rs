//! Check polling controller.
//!
//! Polls a running check until the backend reports a terminal status, emitting events for
//! presentation layers. Ctrl-C stops watching; the check keeps running server-side.

use crate::api::ApiClient;
use crate::model::{CheckProgress, PollEvent};
use anyhow::{Context, Result};
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{Duration, Instant};

/// Which progress endpoint to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WatchTarget {
    Check,
    VgcList,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct WatchSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

async fn fetch(client: &ApiClient, target: WatchTarget, check_id: &str) -> Result<CheckProgress> {
    let progress = match target {
        WatchTarget::Check => client.check_progress(check_id).await,
        WatchTarget::VgcList => client.vgc_list_progress(check_id).await,
    };
    progress.with_context(|| format!("failed to get progress of {check_id}"))
}

/// Poll until the check completes or fails. Request errors end the watch immediately.
pub(crate) async fn watch_check(
    client: &ApiClient,
    target: WatchTarget,
    check_id: &str,
    settings: WatchSettings,
    event_tx: UnboundedSender<PollEvent>,
) -> Result<CheckProgress> {
    let started = Instant::now();
    let mut ctrl_c = std::pin::pin!(tokio::signal::ctrl_c());

    loop {
        let progress = fetch(client, target, check_id).await?;
        let phase = progress.phase();
        let _ = event_tx.send(PollEvent::Progress {
            check_id: check_id.to_string(),
            phase,
            message: progress.status.message.clone(),
            progress: progress.status.progress,
        });

        if phase.is_terminal() {
            tracing::info!(check_id, ?phase, "check finished");
            let _ = event_tx.send(PollEvent::Finished {
                progress: Box::new(progress.clone()),
            });
            return Ok(progress);
        }

        if started.elapsed() >= settings.timeout {
            anyhow::bail!(
                "check {check_id} still '{}' after {}",
                progress.status.message,
                humantime::format_duration(settings.timeout)
            );
        }

        tokio::select! {
            _ = tokio::time::sleep(settings.interval) => {}
            _ = &mut ctrl_c => {
                let _ = event_tx.send(PollEvent::Info(format!(
                    "Stopped watching; check {check_id} keeps running on the server"
                )));
                return Ok(progress);
            }
        }
    }
}
