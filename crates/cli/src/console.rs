//! Terminal implementations of the editor collaborators.
//!
//! Without an editor, files on disk are the documents: there is nothing to save, and
//! "opening" something prints where it is.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use cside_engine::{DebugLaunch, DiagnosticRecord, EditorHost, MessageKind, Notifier, NotifyAction, OutputSink};

/// Editor host printing to stdout.
#[derive(Debug, Default)]
pub struct ConsoleHost;

#[async_trait]
impl EditorHost for ConsoleHost {
	async fn save(&self, _file: &Path) {}

	fn unsaved_documents(&self) -> Vec<PathBuf> {
		Vec::new()
	}

	fn open(&self, file: &Path, line: Option<u32>) {
		match line {
			Some(line) => println!("{}:{}", file.display(), line + 1),
			None => println!("{}", file.display()),
		}
	}

	fn open_folder(&self, dir: &Path) {
		println!("{}", dir.display());
	}

	fn publish_diagnostics(&self, diagnostics: &[DiagnosticRecord]) {
		for d in diagnostics {
			println!(
				"{}:{}:{}: {}: {}",
				d.file.display(),
				d.start.line + 1,
				d.start.column + 1,
				d.severity,
				d.message
			);
		}
	}

	async fn start_debugging(&self, launch: &DebugLaunch) -> Result<(), String> {
		let json = serde_json::to_string_pretty(launch).map_err(|e| e.to_string())?;
		println!("{json}");
		Ok(())
	}
}

/// Notifier writing to stderr.
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
	fn notify(&self, kind: MessageKind, message: &str, actions: &[NotifyAction]) {
		let label = match kind {
			MessageKind::Info => "info",
			MessageKind::Warning => "warning",
			MessageKind::Error => "error",
		};
		eprintln!("{label}: {message}");
		for action in actions {
			match action {
				NotifyAction::ResetBusy => eprintln!("  run `cside reset-busy` to release the lock"),
			}
		}
	}
}

/// Output sink writing engine output to stdout as it arrives.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
	fn append(&self, text: &str) {
		let mut out = std::io::stdout().lock();
		if let Err(e) = out.write_all(text.as_bytes()).and_then(|()| out.flush()) {
			tracing::debug!(error = %e, "Failed to write engine output");
		}
	}
}
