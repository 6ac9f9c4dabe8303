//! Typed views over operation-specific response payloads.
//!
//! Parsers never fail loudly: a payload that does not match the expected shape yields an
//! empty or `None` result, which editor features render as "nothing to show".

use std::path::PathBuf;

use serde::Serialize;

/// Readiness reported by the `ping` operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum PingStatus {
	/// The server answered `ready`.
	Ready,
	/// The server answered something else.
	NotReady(String),
	/// No answer could be obtained.
	Error,
}

impl PingStatus {
	/// Interprets a ping payload.
	pub fn from_payload(text: &str) -> Self {
		match text.trim() {
			"ready" => Self::Ready,
			other => Self::NotReady(other.to_string()),
		}
	}

	/// Returns true if the server is ready for queries.
	pub fn is_ready(&self) -> bool {
		matches!(self, Self::Ready)
	}

	/// Returns the status in its textual form: `ready`, `error`, or the raw answer.
	pub fn as_str(&self) -> &str {
		match self {
			Self::Ready => "ready",
			Self::NotReady(text) => text,
			Self::Error => "error",
		}
	}
}

/// Kind tag attached to a completion record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionKind {
	/// Method or extension method.
	Method,
	/// Property.
	Property,
	/// Field or constant.
	Field,
	/// Event.
	Event,
	/// Class, struct, interface or delegate.
	Type,
	/// Enumeration or enum member.
	Enum,
	/// Namespace.
	Namespace,
	/// Language keyword.
	Keyword,
	/// Anything the server reports that has no dedicated variant.
	Text,
}

impl CompletionKind {
	fn from_wire(tag: &str) -> Self {
		match tag.trim().to_ascii_lowercase().as_str() {
			"method" | "extension_method" => Self::Method,
			"property" => Self::Property,
			"field" | "const" => Self::Field,
			"event" => Self::Event,
			"class" | "struct" | "interface" | "type" | "delegate" => Self::Type,
			"enum" | "enum_member" => Self::Enum,
			"namespace" => Self::Namespace,
			"keyword" => Self::Keyword,
			_ => Self::Text,
		}
	}
}

/// One completion candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionItem {
	/// Text displayed in the completion list.
	pub label: String,
	/// Classification used for the list icon.
	pub kind: CompletionKind,
	/// Text inserted on accept; falls back to the label.
	pub insert_text: String,
	/// Documentation, possibly empty.
	pub documentation: String,
}

/// Parses `label\tkind|insertText|doc` records, one per line.
pub fn parse_completions(text: &str) -> Vec<CompletionItem> {
	text.lines()
		.filter(|l| !l.trim().is_empty())
		.map(|line| {
			let (label, rest) = line.split_once('\t').unwrap_or((line, ""));
			let mut parts = rest.splitn(3, '|');
			let kind = CompletionKind::from_wire(parts.next().unwrap_or_default());
			let insert_text = parts.next().filter(|s| !s.is_empty()).unwrap_or(label).to_string();
			let documentation = parts.next().unwrap_or_default().replace("${r}${n}", "\n");
			CompletionItem {
				label: label.to_string(),
				kind,
				insert_text,
				documentation,
			}
		})
		.collect()
}

/// Declaration location returned by the `resolve` operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefinitionTarget {
	/// File containing the declaration.
	pub file: PathBuf,
	/// Zero-based line of the declaration.
	pub line: u32,
}

/// Parses a `file:<path>` / `line:<n>` payload. The line is 1-based on the wire.
pub fn parse_definition(text: &str) -> Option<DefinitionTarget> {
	let mut file = None;
	let mut line = None;
	for entry in text.lines().map(str::trim) {
		if let Some(path) = entry.strip_prefix("file:") {
			file = Some(PathBuf::from(path.trim()));
		} else if let Some(n) = entry.strip_prefix("line:") {
			line = n.trim().parse::<u32>().ok();
		}
	}
	let file = file.filter(|f| !f.as_os_str().is_empty())?;
	Some(DefinitionTarget {
		file,
		line: line.unwrap_or(1).saturating_sub(1),
	})
}

/// Result of the `format` operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormatResult {
	/// Caret offset in the formatted text.
	pub cursor: usize,
	/// Full replacement text of the document.
	pub text: String,
}

/// Parses a format payload: a numeric caret offset line followed by the formatted text.
pub fn parse_format(text: &str) -> Option<FormatResult> {
	let (first, rest) = text.split_once('\n').unwrap_or((text, ""));
	let cursor = first.trim().parse().ok()?;
	Some(FormatResult {
		cursor,
		text: rest.to_string(),
	})
}

/// Splits a payload into its non-empty lines.
pub fn parse_lines(text: &str) -> Vec<String> {
	text.lines().map(str::trim_end).filter(|l| !l.is_empty()).map(str::to_string).collect()
}
