//! Engine process invocation.
//!
//! Commands are always built as an argv vector and handed to [`tokio::process::Command`];
//! nothing goes through a shell.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Stdio;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use crate::Result;

/// Output some runtimes print on startup that is not engine output.
const NOISE_PREFIX: &str = "failed to get 100ns ticks";

/// Returns true for lines that carry no engine output.
pub fn is_noise(line: &str) -> bool {
	line.starts_with(NOISE_PREFIX)
}

/// Receives engine output as it is produced.
pub trait OutputSink: Send + Sync {
	/// Appends a chunk of text.
	fn append(&self, text: &str);

	/// Clears everything shown so far.
	fn clear(&self) {}

	/// Appends `text` followed by a newline.
	fn append_line(&self, text: &str) {
		self.append(text);
		self.append("\n");
	}
}

/// Sink accumulating everything into a string.
#[derive(Debug, Default)]
pub struct BufferSink {
	text: Mutex<String>,
}

impl BufferSink {
	/// Creates an empty buffer.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns a copy of the accumulated text.
	pub fn contents(&self) -> String {
		self.text.lock().clone()
	}
}

impl OutputSink for BufferSink {
	fn append(&self, text: &str) {
		self.text.lock().push_str(text);
	}

	fn clear(&self) {
		self.text.lock().clear();
	}
}

/// Result of one engine invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOutput {
	/// Exit code; `None` if the process was killed by a signal.
	pub code: Option<i32>,
	/// Combined stdout and stderr.
	pub text: String,
}

impl EngineOutput {
	/// Output lines with runtime noise removed.
	pub fn lines(&self) -> impl Iterator<Item = &str> {
		self.text.lines().filter(|l| !is_noise(l))
	}

	/// Returns true if the engine exited with code 0.
	pub fn success(&self) -> bool {
		self.code == Some(0)
	}
}

/// One engine invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCommand {
	program: OsString,
	args: Vec<OsString>,
	cwd: Option<PathBuf>,
}

impl EngineCommand {
	/// Creates a command running `program` with no arguments.
	pub fn new(program: impl Into<OsString>) -> Self {
		Self {
			program: program.into(),
			args: Vec::new(),
			cwd: None,
		}
	}

	/// Appends one argument.
	#[must_use]
	pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
		self.args.push(arg.as_ref().to_os_string());
		self
	}

	/// Appends several arguments.
	#[must_use]
	pub fn args<I, S>(mut self, args: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: AsRef<OsStr>,
	{
		self.args.extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
		self
	}

	/// Sets the working directory.
	#[must_use]
	pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
		self.cwd = Some(dir.as_ref().to_path_buf());
		self
	}

	/// Program to execute.
	pub fn program(&self) -> &OsStr {
		&self.program
	}

	/// Arguments after the program.
	pub fn get_args(&self) -> &[OsString] {
		&self.args
	}

	/// Human-readable command line, for display only.
	pub fn display(&self) -> String {
		std::iter::once(&self.program)
			.chain(&self.args)
			.map(|a| {
				let a = a.to_string_lossy();
				if a.is_empty() || a.contains(char::is_whitespace) { format!("\"{a}\"") } else { a.into_owned() }
			})
			.collect::<Vec<_>>()
			.join(" ")
	}

	fn command(&self) -> Command {
		let mut cmd = Command::new(&self.program);
		cmd.args(&self.args).stdin(Stdio::null()).kill_on_drop(true);
		if let Some(cwd) = &self.cwd {
			cmd.current_dir(cwd);
		}
		cmd
	}

	/// Runs to completion and returns stdout followed by stderr.
	pub async fn output(&self) -> Result<EngineOutput> {
		tracing::debug!(command = %self.display(), "Running engine");
		let out = self
			.command()
			.output()
			.await
			.inspect_err(|e| tracing::error!(error = %e, command = %self.display(), "Failed to spawn engine"))?;

		let mut text = String::from_utf8_lossy(&out.stdout).into_owned();
		text.push_str(&String::from_utf8_lossy(&out.stderr));
		tracing::debug!(code = ?out.status.code(), len = text.len(), "Engine finished");
		Ok(EngineOutput {
			code: out.status.code(),
			text,
		})
	}

	/// Runs to completion, forwarding each output line to `sink` as it arrives.
	///
	/// Noise lines are neither forwarded nor accumulated.
	pub async fn stream(&self, sink: &dyn OutputSink) -> Result<EngineOutput> {
		tracing::debug!(command = %self.display(), "Streaming engine");
		let mut child = self
			.command()
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.spawn()
			.inspect_err(|e| tracing::error!(error = %e, command = %self.display(), "Failed to spawn engine"))?;

		let collected = Mutex::new(String::new());
		let stdout = child.stdout.take();
		let stderr = child.stderr.take();
		let (a, b) = tokio::join!(pump(stdout, sink, &collected), pump(stderr, sink, &collected));
		a?;
		b?;

		let status = child.wait().await?;
		tracing::debug!(code = ?status.code(), "Engine finished");
		Ok(EngineOutput {
			code: status.code(),
			text: collected.into_inner(),
		})
	}

	/// Starts the engine and returns without waiting for it.
	pub fn spawn_detached(&self) -> Result<()> {
		let mut child = self
			.command()
			.kill_on_drop(false)
			.stdout(Stdio::null())
			.stderr(Stdio::null())
			.spawn()?;
		let command = self.display();
		tokio::spawn(async move {
			match child.wait().await {
				Ok(status) => tracing::debug!(command, ?status, "Detached engine exited"),
				Err(e) => tracing::warn!(command, error = %e, "Failed to wait on detached engine"),
			}
		});
		Ok(())
	}
}

async fn pump(reader: Option<impl AsyncRead + Unpin>, sink: &dyn OutputSink, collected: &Mutex<String>) -> Result<()> {
	let Some(reader) = reader else {
		return Ok(());
	};
	let mut reader = BufReader::new(reader);
	let mut buf = Vec::new();
	loop {
		buf.clear();
		if reader.read_until(b'\n', &mut buf).await? == 0 {
			return Ok(());
		}
		let chunk = String::from_utf8_lossy(&buf);
		if is_noise(&chunk) {
			continue;
		}
		sink.append(&chunk);
		collected.lock().push_str(&chunk);
	}
}

#[cfg(all(test, unix))]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	fn sh(script: &str) -> EngineCommand {
		EngineCommand::new("/bin/sh").arg("-c").arg(script)
	}

	#[tokio::test]
	async fn buffered_output_and_exit_code() {
		let out = sh("echo out; echo err >&2; exit 3").output().await.unwrap();
		assert_eq!(out.code, Some(3));
		assert_eq!(out.text, "out\nerr\n");
		assert!(!out.success());
	}

	#[tokio::test]
	async fn streamed_output_reaches_sink_without_noise() {
		let sink = BufferSink::new();
		let out = sh("echo 'failed to get 100ns ticks'; echo one; echo two")
			.stream(&sink)
			.await
			.unwrap();
		assert!(out.success());
		assert_eq!(out.text, "one\ntwo\n");
		assert_eq!(sink.contents(), "one\ntwo\n");
	}

	#[tokio::test]
	async fn arguments_are_not_shell_interpreted() {
		let out = EngineCommand::new("/bin/echo").arg("a b; rm -rf x").arg("$HOME").output().await.unwrap();
		assert_eq!(out.text, "a b; rm -rf x $HOME\n");
	}

	#[tokio::test]
	async fn working_directory_is_applied() {
		let dir = tempfile::tempdir().unwrap();
		let out = sh("pwd").current_dir(dir.path()).output().await.unwrap();
		let reported = std::fs::canonicalize(out.text.trim()).unwrap();
		assert_eq!(reported, std::fs::canonicalize(dir.path()).unwrap());
	}

	#[tokio::test]
	async fn missing_program_is_an_error() {
		assert!(EngineCommand::new("/nonexistent/engine").output().await.is_err());
	}

	#[test]
	fn noise_lines_are_filtered() {
		let out = EngineOutput {
			code: Some(0),
			text: "failed to get 100ns ticks\nfile:/w/a.cs\n".to_string(),
		};
		assert_eq!(out.lines().collect::<Vec<_>>(), vec!["file:/w/a.cs"]);
		assert_eq!(EngineCommand::new("dotnet").arg("/opt/cs script/cscs.dll").arg("-l").display(), "dotnet \"/opt/cs script/cscs.dll\" -l");
	}
}
