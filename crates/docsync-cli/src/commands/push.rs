//! Push command handler

use std::path::Path;

use anyhow::{Context, Result};

use docsync_core::DocSyncStorage;

use crate::output::Output;

/// Push the contents of a file as one update
pub async fn push(
    storage: &impl DocSyncStorage,
    doc_id: &str,
    update_path: &Path,
    output: &Output,
) -> Result<()> {
    let update = std::fs::read(update_path)
        .with_context(|| format!("Failed to read update: {:?}", update_path))?;

    storage
        .push(doc_id, &update)
        .await
        .with_context(|| format!("Failed to push {}", doc_id))?;

    output.success(&format!("Pushed {} byte(s) to {}", update.len(), doc_id));
    Ok(())
}
