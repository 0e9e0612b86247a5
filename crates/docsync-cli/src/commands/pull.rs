//! Pull command handler

use std::path::Path;

use anyhow::{Context, Result};

use docsync_core::DocSyncStorage;

use crate::output::Output;

/// Pull what a local copy is missing and optionally write it to a file
pub async fn pull(
    storage: &impl DocSyncStorage,
    doc_id: &str,
    state_path: Option<&Path>,
    out_path: Option<&Path>,
    output: &Output,
) -> Result<()> {
    let state = match state_path {
        Some(path) => std::fs::read(path)
            .with_context(|| format!("Failed to read state vector: {:?}", path))?,
        None => Vec::new(),
    };

    let result = storage
        .pull(doc_id, &state)
        .await
        .with_context(|| format!("Failed to pull {}", doc_id))?;

    let Some(result) = result else {
        output.print_not_found(doc_id);
        return Ok(());
    };

    if let Some(path) = out_path {
        std::fs::write(path, &result.data)
            .with_context(|| format!("Failed to write update: {:?}", path))?;
    }

    output.print_pull(doc_id, &result, out_path);
    Ok(())
}
