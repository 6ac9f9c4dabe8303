//! Editor-facing query API.
//!
//! Every query stages the buffer, sends one request and interprets the payload. Transport
//! failures and unexpected payloads degrade to `Ok(None)`; only an exhausted respawn budget
//! is returned as an error so the editor can tell the user the server is gone.

use std::path::Path;
use std::time::Duration;

use cside_proto::{
	CompletionItem, DefinitionTarget, Flag, FormatResult, Operation, PingStatus, Request, payload,
};

use crate::{AnalysisClient, Error, Feature, RequestGenerations, Result, StagedSource, Stager, clear_temp_suffixes};

/// The buffer a query runs against.
#[derive(Debug, Clone, Copy)]
pub struct SourceBuffer<'a> {
	/// Current buffer text, saved or not.
	pub text: &'a str,
	/// Path of the file the buffer belongs to.
	pub file: &'a Path,
	/// Zero-based character offset of the caret.
	pub offset: usize,
}

impl<'a> SourceBuffer<'a> {
	/// Creates a buffer view.
	pub fn new(text: &'a str, file: &'a Path, offset: usize) -> Self {
		Self { text, file, offset }
	}
}

/// Code-intelligence queries against the analysis server.
#[derive(Debug)]
pub struct Syntaxer {
	client: AnalysisClient,
	stager: Stager,
	generations: RequestGenerations,
	back_reference: bool,
}

impl Syntaxer {
	/// Creates the facade. Staged buffers go to `stager`'s scratch directory.
	pub fn new(client: AnalysisClient, stager: Stager) -> Self {
		Self {
			client,
			stager,
			generations: RequestGenerations::new(),
			back_reference: false,
		}
	}

	/// Prefixes staged buffers with a `// source:` line naming the original file.
	#[must_use]
	pub fn with_back_reference(mut self, enabled: bool) -> Self {
		self.back_reference = enabled;
		self
	}

	/// Underlying client.
	pub fn client(&self) -> &AnalysisClient {
		&self.client
	}

	/// Completion candidates at the caret.
	pub async fn completions(&self, buf: SourceBuffer<'_>) -> Result<Option<Vec<CompletionItem>>> {
		let reply = self.query(Feature::Completion, Operation::Completion, &[Flag::Rich], buf).await?;
		Ok(reply.map(|(text, _)| payload::parse_completions(&text)))
	}

	/// Hover text at the caret.
	pub async fn tooltip(&self, buf: SourceBuffer<'_>, hint: &str) -> Result<Option<String>> {
		let op = Operation::Tooltip { hint: hint.to_string() };
		let reply = self.query(Feature::Tooltip, op, &[], buf).await?;
		Ok(reply.map(|(text, staged)| staged.restore_paths(&text)).filter(|t| !t.trim().is_empty()))
	}

	/// Declaration of the symbol at the caret.
	///
	/// Declarations inside the buffer itself point back at the buffer's file.
	pub async fn definition(&self, buf: SourceBuffer<'_>) -> Result<Option<DefinitionTarget>> {
		let reply = self.query(Feature::Definition, Operation::Resolve, &[], buf).await?;
		Ok(reply.and_then(|(text, staged)| {
			let mut target = payload::parse_definition(&text)?;
			if target.file == staged.path() {
				target.file = staged.original().to_path_buf();
				target.line = staged.restore_line(target.line);
			} else {
				target.file = clear_temp_suffixes(&target.file.to_string_lossy()).into();
			}
			Some(target)
		}))
	}

	/// `path(line,col): text` lines for every reference to the symbol at the caret.
	pub async fn references(&self, buf: SourceBuffer<'_>) -> Result<Option<Vec<String>>> {
		self.locations(Feature::References, Operation::References, buf).await
	}

	/// Locations a rename of the symbol at the caret would touch.
	pub async fn rename_context(&self, buf: SourceBuffer<'_>) -> Result<Option<Vec<String>>> {
		self.locations(Feature::Rename, Operation::RenameContext, buf).await
	}

	/// Signature help for the invocation around the caret.
	pub async fn signature_help(&self, buf: SourceBuffer<'_>) -> Result<Option<String>> {
		let reply = self.query(Feature::SignatureHelp, Operation::SignatureHelp, &[Flag::Doc], buf).await?;
		Ok(reply.map(|(text, _)| text))
	}

	/// Formatted replacement for the whole buffer.
	pub async fn format(&self, buf: SourceBuffer<'_>) -> Result<Option<FormatResult>> {
		let reply = self.query(Feature::Format, Operation::Format, &[], buf).await?;
		Ok(reply.and_then(|(text, staged)| {
			let mut result = payload::parse_format(&text)?;
			result.cursor = result.cursor.saturating_sub(staged.offset_shift());
			if staged.line_shift() > 0 {
				result.text = result.text.split_once('\n').map(|(_, rest)| rest.to_string()).unwrap_or_default();
			}
			Some(result)
		}))
	}

	/// Namespaces whose `using` would resolve `word`.
	pub async fn suggest_usings(&self, buf: SourceBuffer<'_>, word: &str) -> Result<Option<Vec<String>>> {
		let op = Operation::SuggestUsings { word: word.to_string() };
		let reply = self.query(Feature::SuggestUsings, op, &[], buf).await?;
		Ok(reply.map(|(text, _)| payload::parse_lines(&text)))
	}

	/// Member documentation at the caret, overloads collapsed.
	pub async fn member_info(&self, buf: SourceBuffer<'_>) -> Result<Option<String>> {
		let flags = [Flag::Rich, Flag::CollapseOverloads];
		let reply = self.query(Feature::MemberInfo, Operation::MemberInfo, &flags, buf).await?;
		Ok(reply.map(|(text, _)| text))
	}

	/// Readiness check.
	pub async fn ping(&self) -> PingStatus {
		self.client.ping().await
	}

	/// Waits for a cold-started server to report ready.
	pub async fn wait_until_ready(&self, timeout: Duration) -> bool {
		self.client.wait_until_ready(timeout, Duration::from_millis(250)).await
	}

	/// Asks the server to exit.
	pub async fn stop(&self) {
		self.client.send_stop().await;
	}

	async fn locations(&self, feature: Feature, op: Operation, buf: SourceBuffer<'_>) -> Result<Option<Vec<String>>> {
		let reply = self.query(feature, op, &[], buf).await?;
		Ok(reply.map(|(text, staged)| {
			payload::parse_lines(&text)
				.iter()
				.map(|line| clear_temp_suffixes(&staged.restore_location(line)))
				.collect()
		}))
	}

	/// Stages `buf`, sends the request and returns the payload with the staged file, which is
	/// still on disk so callers can map paths. The file is removed once the caller drops it.
	async fn query(
		&self,
		feature: Feature,
		op: Operation,
		flags: &[Flag],
		buf: SourceBuffer<'_>,
	) -> Result<Option<(String, StagedSource)>> {
		let ticket = self.generations.begin(feature);
		let staged = match self.stager.stage(buf.text, buf.file, self.back_reference) {
			Ok(staged) => staged,
			Err(e) => {
				tracing::warn!(file = %buf.file.display(), error = %e, "Failed to stage buffer");
				return Ok(None);
			}
		};

		let request = flags.iter().fold(
			Request::new(self.client.client_id(), op)
				.script(staged.path())
				.position(staged.staged_offset(buf.offset)),
			|req, flag| req.flag(*flag),
		);

		let response = match self.client.send(&request).await {
			Ok(Some(response)) => response,
			Ok(None) => return Ok(None),
			Err(e @ Error::RetriesExhausted { .. }) => return Err(e),
			Err(e) => {
				tracing::debug!(op = request.op.name(), error = %e, "Analysis request failed");
				return Ok(None);
			}
		};

		if !self.generations.is_current(&ticket) {
			tracing::debug!(?feature, generation = ticket.generation(), "Discarding superseded response");
			return Ok(None);
		}
		if let Some(error) = response.error() {
			tracing::debug!(op = request.op.name(), error, "Analysis server reported an error");
		}
		Ok(response.into_payload().map(|text| (text, staged)))
	}
}
