//! Editor-side collaborators of the orchestrator.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;

use crate::DiagnosticRecord;

/// Severity of a user notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
	/// Informational.
	Info,
	/// Something went wrong but nothing was lost.
	Warning,
	/// The command failed.
	Error,
}

/// Follow-up action offered with a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyAction {
	/// Forcibly release the session lock.
	ResetBusy,
}

/// Shows messages to the user.
pub trait Notifier: Send + Sync {
	/// Shows `message`, offering `actions`.
	fn notify(&self, kind: MessageKind, message: &str, actions: &[NotifyAction]);
}

/// Debug session description handed to the editor's debugger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugLaunch {
	/// Display name of the configuration.
	pub name: String,
	/// Debug adapter type.
	#[serde(rename = "type")]
	pub kind: String,
	/// Always `launch`.
	pub request: String,
	/// Program started by the debugger.
	pub program: PathBuf,
	/// Program arguments.
	pub args: Vec<String>,
	/// Working directory.
	pub cwd: PathBuf,
	/// Console the debuggee writes to.
	pub console: String,
	/// Break on the first statement.
	pub stop_at_entry: bool,
}

/// The editor the orchestrator drives.
#[async_trait]
pub trait EditorHost: Send + Sync {
	/// Saves the buffer of `file` if it is open and modified.
	async fn save(&self, file: &Path);

	/// Files with unsaved modifications.
	fn unsaved_documents(&self) -> Vec<PathBuf>;

	/// Opens `file`, optionally at a zero-based line.
	fn open(&self, file: &Path, line: Option<u32>);

	/// Opens `dir` as the workspace folder.
	fn open_folder(&self, dir: &Path);

	/// Replaces the published diagnostics.
	fn publish_diagnostics(&self, diagnostics: &[DiagnosticRecord]);

	/// Starts a debug session.
	async fn start_debugging(&self, launch: &DebugLaunch) -> Result<(), String>;
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn launch_serializes_like_a_launch_configuration() {
		let launch = DebugLaunch {
			name: ".NET Core Launch (console)".into(),
			kind: "coreclr".into(),
			request: "launch".into(),
			program: PathBuf::from("dotnet"),
			args: vec!["/opt/cs-script/cscs.dll".into(), "-d".into()],
			cwd: PathBuf::from("/w"),
			console: "internalConsole".into(),
			stop_at_entry: false,
		};
		let json = serde_json::to_value(&launch).unwrap();
		assert_eq!(json["type"], "coreclr");
		assert_eq!(json["stopAtEntry"], false);
		assert_eq!(json["args"][1], "-d");
		assert_eq!(serde_json::to_value(NotifyAction::ResetBusy).unwrap(), "reset_busy");
	}
}
