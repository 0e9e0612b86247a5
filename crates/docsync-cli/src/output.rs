//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use std::path::Path;

use docsync_core::{codec, PullResult};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
#[derive(Debug, Clone, Copy)]
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print the outcome of a pull
    pub fn print_pull(&self, doc_id: &str, result: &PullResult, written_to: Option<&Path>) {
        match self.format {
            OutputFormat::Human => {
                println!("Document:     {}", doc_id);
                println!("Missing:      {} byte(s)", result.data.len());
                match result.state {
                    Some(ref state) => println!("Remote state: {} byte(s)", state.len()),
                    None => println!("Remote state: (not sent)"),
                }
                if let Some(path) = written_to {
                    println!("Written to:   {}", path.display());
                }
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({
                        "doc": doc_id,
                        "found": true,
                        "missing": codec::encode(&result.data),
                        "state": result.state.as_deref().map(codec::encode),
                    })
                );
            }
            OutputFormat::Quiet => {
                if written_to.is_none() {
                    println!("{}", codec::encode(&result.data));
                }
            }
        }
    }

    /// Report a document the server does not have
    pub fn print_not_found(&self, doc_id: &str) {
        match self.format {
            OutputFormat::Human => println!("Document {} not found on the server.", doc_id),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"doc": doc_id, "found": false}));
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print one remote update received while watching
    pub fn print_update(&self, doc_id: &str, update: &[u8]) {
        let now = chrono::Local::now();
        match self.format {
            OutputFormat::Human => {
                println!(
                    "[{}] {} +{} byte(s)",
                    now.format("%H:%M:%S"),
                    doc_id,
                    update.len()
                );
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({
                        "at": now.to_rfc3339(),
                        "doc": doc_id,
                        "update": codec::encode(update),
                    })
                );
            }
            OutputFormat::Quiet => println!("{}", doc_id),
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}
