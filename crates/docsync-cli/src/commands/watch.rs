//! Watch command handler

use anyhow::{anyhow, Context, Result};
use tokio::sync::mpsc;

use docsync_core::DocSyncStorage;

use crate::output::Output;

/// Print remote updates until Ctrl-C or the channel disconnects
pub async fn watch(storage: &impl DocSyncStorage, output: Output) -> Result<()> {
    let (disconnect_tx, mut disconnect_rx) = mpsc::unbounded_channel();

    let subscription = storage
        .subscribe(
            move |doc_id, update| output.print_update(doc_id, &update),
            move |reason| {
                let _ = disconnect_tx.send(reason.to_string());
            },
        )
        .context("Failed to subscribe to remote updates")?;

    output.message("Watching for remote updates (Ctrl-C to stop)...");

    let result = tokio::select! {
        _ = tokio::signal::ctrl_c() => Ok(()),
        reason = disconnect_rx.recv() => {
            Err(anyhow!("Disconnected: {}", reason.unwrap_or_default()))
        }
    };

    subscription.cancel();
    result
}
