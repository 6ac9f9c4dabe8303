//! Outbound request model and its line-oriented encoding.
//!
//! ```text
//! -client:<pid>
//! -op:<operation>[:<arg>]
//! -script:<path>
//! -pos:<offset>
//! [-doc | -rich | -context:all | -collapseOverloads]
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use crate::{ProtoError, Result};

/// Separator placed between request fields.
pub const FIELD_SEPARATOR: char = '\n';

/// Analysis operation requested from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
	/// Completion candidates at the offset.
	Completion,
	/// Hover text. The hint is forwarded verbatim and may be empty.
	Tooltip {
		/// Free-form hint passed after the operation name.
		hint: String,
	},
	/// Declaration location of the symbol at the offset.
	Resolve,
	/// All references to the symbol at the offset.
	References,
	/// Locations a rename of the symbol at the offset would touch.
	RenameContext,
	/// Signature help for the invocation around the offset.
	SignatureHelp,
	/// Whole-document formatting.
	Format,
	/// Namespaces that would resolve an unknown word.
	SuggestUsings {
		/// The unresolved identifier.
		word: String,
	},
	/// Member documentation at the offset.
	MemberInfo,
	/// Readiness check.
	Ping,
	/// Ask the server to shut down.
	Exit,
}

impl Operation {
	/// Wire name of the operation, without its argument.
	pub fn name(&self) -> &'static str {
		match self {
			Self::Completion => "completion",
			Self::Tooltip { .. } => "tooltip",
			Self::Resolve => "resolve",
			Self::References => "references",
			Self::RenameContext => "rename",
			Self::SignatureHelp => "signaturehelp",
			Self::Format => "format",
			Self::SuggestUsings { .. } => "suggest_usings",
			Self::MemberInfo => "memberinfo",
			Self::Ping => "ping",
			Self::Exit => "exit",
		}
	}

	/// Returns true for operations that act on a staged script.
	pub fn needs_source(&self) -> bool {
		!matches!(self, Self::Ping | Self::Exit)
	}

	fn parse(value: &str) -> Result<Self> {
		let (name, arg) = match value.split_once(':') {
			Some((name, arg)) => (name, Some(arg)),
			None => (value, None),
		};
		let arg = || arg.unwrap_or_default().to_string();
		Ok(match name {
			"completion" => Self::Completion,
			"tooltip" => Self::Tooltip { hint: arg() },
			"resolve" => Self::Resolve,
			"references" => Self::References,
			"rename" => Self::RenameContext,
			"signaturehelp" => Self::SignatureHelp,
			"format" => Self::Format,
			"suggest_usings" => Self::SuggestUsings { word: arg() },
			"memberinfo" => Self::MemberInfo,
			"ping" => Self::Ping,
			"exit" => Self::Exit,
			other => return Err(ProtoError::UnknownOperation(other.to_string())),
		})
	}
}

impl fmt::Display for Operation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Tooltip { hint } => write!(f, "tooltip:{hint}"),
			Self::SuggestUsings { word } => write!(f, "suggest_usings:{word}"),
			other => f.write_str(other.name()),
		}
	}
}

/// Bare switches appended after the positional fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
	/// Include documentation in the payload.
	Doc,
	/// Rich (tab separated) completion records.
	Rich,
	/// Report every context instead of the nearest one.
	ContextAll,
	/// Merge overloads into one member-info entry.
	CollapseOverloads,
}

impl Flag {
	fn as_str(self) -> &'static str {
		match self {
			Self::Doc => "-doc",
			Self::Rich => "-rich",
			Self::ContextAll => "-context:all",
			Self::CollapseOverloads => "-collapseOverloads",
		}
	}

	fn parse(field: &str) -> Option<Self> {
		match field {
			"-doc" => Some(Self::Doc),
			"-rich" => Some(Self::Rich),
			"-context:all" => Some(Self::ContextAll),
			"-collapseOverloads" => Some(Self::CollapseOverloads),
			_ => None,
		}
	}
}

/// One outbound message to the analysis server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
	/// Identity of the calling process; scopes per-client caches on the server.
	pub client: u32,
	/// Requested operation.
	pub op: Operation,
	/// Path of the staged source file.
	pub script: Option<PathBuf>,
	/// Zero-based character offset into the staged source.
	pub position: Option<usize>,
	/// Trailing switches.
	pub flags: Vec<Flag>,
}

impl Request {
	/// Creates a request without source, position or flags.
	pub fn new(client: u32, op: Operation) -> Self {
		Self {
			client,
			op,
			script: None,
			position: None,
			flags: Vec::new(),
		}
	}

	/// Sets the staged source path.
	#[must_use]
	pub fn script(mut self, path: impl AsRef<Path>) -> Self {
		self.script = Some(path.as_ref().to_path_buf());
		self
	}

	/// Sets the character offset.
	#[must_use]
	pub fn position(mut self, offset: usize) -> Self {
		self.position = Some(offset);
		self
	}

	/// Appends a switch; duplicates are ignored.
	#[must_use]
	pub fn flag(mut self, flag: Flag) -> Self {
		if !self.flags.contains(&flag) {
			self.flags.push(flag);
		}
		self
	}

	/// Encodes the request as newline-joined fields.
	pub fn encode(&self) -> String {
		let mut fields = vec![format!("-client:{}", self.client), format!("-op:{}", self.op)];
		if let Some(script) = &self.script {
			fields.push(format!("-script:{}", script.display()));
		}
		if let Some(pos) = self.position {
			fields.push(format!("-pos:{pos}"));
		}
		fields.extend(self.flags.iter().map(|f| f.as_str().to_string()));
		fields.join(&FIELD_SEPARATOR.to_string())
	}

	/// Decodes a request produced by [`Request::encode`].
	pub fn decode(text: &str) -> Result<Self> {
		let mut client = 0;
		let mut op = None;
		let mut script = None;
		let mut position = None;
		let mut flags = Vec::new();

		for field in text.split(FIELD_SEPARATOR).map(|f| f.trim_end_matches('\r')).filter(|f| !f.is_empty()) {
			if let Some(flag) = Flag::parse(field) {
				flags.push(flag);
				continue;
			}
			let (key, value) = field
				.strip_prefix('-')
				.and_then(|f| f.split_once(':'))
				.ok_or_else(|| ProtoError::MalformedField(field.to_string()))?;
			match key {
				"client" => client = value.parse().map_err(|_| ProtoError::MalformedField(field.to_string()))?,
				"op" => op = Some(Operation::parse(value)?),
				"script" => script = Some(PathBuf::from(value)),
				"pos" => position = Some(value.parse().map_err(|_| ProtoError::MalformedField(field.to_string()))?),
				_ => return Err(ProtoError::MalformedField(field.to_string())),
			}
		}

		Ok(Self {
			client,
			op: op.ok_or(ProtoError::MissingOperation)?,
			script,
			position,
			flags,
		})
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn completion_request_layout() {
		let req = Request::new(4242, Operation::Completion).script("/tmp/a.$temp$.cs").position(17).flag(Flag::Rich);
		assert_eq!(req.encode(), "-client:4242\n-op:completion\n-script:/tmp/a.$temp$.cs\n-pos:17\n-rich");
	}

	#[test]
	fn operation_arguments_follow_the_name() {
		let req = Request::new(1, Operation::SuggestUsings { word: "File".into() });
		assert_eq!(req.encode(), "-client:1\n-op:suggest_usings:File");

		let req = Request::new(1, Operation::Tooltip { hint: String::new() });
		assert_eq!(req.encode(), "-client:1\n-op:tooltip:");
	}

	#[test]
	fn ping_carries_no_source() {
		assert!(!Operation::Ping.needs_source());
		assert!(!Operation::Exit.needs_source());
		assert!(Operation::Format.needs_source());
		assert_eq!(Request::new(7, Operation::Ping).encode(), "-client:7\n-op:ping");
	}

	#[test]
	fn duplicate_flags_are_collapsed() {
		let req = Request::new(1, Operation::MemberInfo).flag(Flag::Rich).flag(Flag::Rich).flag(Flag::CollapseOverloads);
		assert_eq!(req.flags, vec![Flag::Rich, Flag::CollapseOverloads]);
	}

	#[test]
	fn decode_accepts_encoded_request() {
		let req = Request::new(9, Operation::Tooltip { hint: "x".into() })
			.script("/w/s.cs")
			.position(3)
			.flag(Flag::ContextAll);
		assert_eq!(Request::decode(&req.encode()).unwrap(), req);
	}

	#[test]
	fn decode_rejects_garbage() {
		assert!(matches!(Request::decode("-client:1"), Err(ProtoError::MissingOperation)));
		assert!(matches!(Request::decode("-client:1\n-op:teleport"), Err(ProtoError::UnknownOperation(op)) if op == "teleport"));
		assert!(matches!(Request::decode("client 1"), Err(ProtoError::MalformedField(_))));
		assert!(matches!(Request::decode("-op:ping\n-pos:abc"), Err(ProtoError::MalformedField(_))));
	}
}
