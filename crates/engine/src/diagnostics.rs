//! Compile-output parsing.
//!
//! The engine reports problems as
//!
//! ```text
//! E:\dev\script.cs(19,11): error CS1525: Unexpected symbol `.'
//! csscript.CompilerException: /home/u/a.cs(12,17): error CS0029: Cannot convert `string' to `int'
//! file:/home/u/lib.cs
//! ```
//!
//! Line and column are 1-based in the text and 0-based in the parsed records.

use std::path::{Path, PathBuf};

use cside_syntaxer::clear_temp_suffixes;
use serde::Serialize;

const PREFIXES: [&str; 2] = ["csscript.CompilerException: ", "file:"];
const SEPARATOR: &str = "):";

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
	/// Compilation error.
	Error,
	/// Compiler warning.
	Warning,
	/// Informational message.
	Info,
	/// Anything without a recognised severity word.
	Unclassified,
}

impl Severity {
	fn from_word(word: &str) -> Self {
		match word {
			"error" => Self::Error,
			"warning" => Self::Warning,
			"info" => Self::Info,
			_ => Self::Unclassified,
		}
	}
}

impl std::fmt::Display for Severity {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(match self {
			Self::Error => "error",
			Self::Warning => "warning",
			Self::Info => "info",
			Self::Unclassified => "message",
		})
	}
}

/// Zero-based text position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Position {
	/// Zero-based line.
	pub line: u32,
	/// Zero-based column.
	pub column: u32,
}

/// One parsed compiler message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticRecord {
	/// File the message refers to, staging marker removed.
	pub file: PathBuf,
	/// Start of the range.
	pub start: Position,
	/// End of the range; the engine only reports points, so it equals `start`.
	pub end: Position,
	/// Severity word of the message.
	pub severity: Severity,
	/// Message after the severity word, e.g. `CS1525: Unexpected symbol`.
	pub message: String,
}

impl DiagnosticRecord {
	/// Returns true for errors and warnings, the only records published to the editor.
	pub fn is_reportable(&self) -> bool {
		matches!(self.severity, Severity::Error | Severity::Warning)
	}
}

/// A `path(line,col): text` location, as printed by reference searches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
	/// File of the location.
	pub file: PathBuf,
	/// Zero-based position.
	pub position: Position,
	/// Everything after the separator.
	pub text: String,
}

/// Parses one line of compiler output.
pub fn parse(line: &str) -> Option<DiagnosticRecord> {
	let line = strip_prefixes(line);
	let Some((file, position, rest)) = split_location(line) else {
		if line.contains(SEPARATOR) || !Path::new(line).exists() {
			return None;
		}
		return Some(DiagnosticRecord {
			file: clear_temp_suffixes(line).into(),
			start: Position::default(),
			end: Position::default(),
			severity: Severity::Unclassified,
			message: String::new(),
		});
	};

	let rest = rest.trim();
	let (word, message) = rest.split_once(' ').unwrap_or((rest, ""));
	Some(DiagnosticRecord {
		file,
		start: position,
		end: position,
		severity: Severity::from_word(word),
		message: message.to_string(),
	})
}

/// Parses a reference or rename location line.
pub fn parse_location(line: &str) -> Option<Location> {
	let (file, position, rest) = split_location(strip_prefixes(line))?;
	Some(Location {
		file,
		position,
		text: rest.trim().to_string(),
	})
}

fn strip_prefixes(mut line: &str) -> &str {
	for prefix in PREFIXES {
		if let Some(rest) = line.strip_prefix(prefix) {
			line = rest.trim();
		}
	}
	line
}

fn split_location(line: &str) -> Option<(PathBuf, Position, &str)> {
	let (head, rest) = line.split_once(SEPARATOR)?;
	let (file, nums) = head.rsplit_once('(')?;
	let (l, c) = nums.split_once(',').unwrap_or((nums, "1"));
	let line_no: u32 = l.trim().parse().ok()?;
	let column: u32 = c.trim().parse().ok()?;
	let position = Position {
		line: line_no.saturating_sub(1),
		column: column.saturating_sub(1),
	};
	Some((clear_temp_suffixes(file.trim()).into(), position, rest))
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn error_line() {
		let rec = parse("E:\\t.cs(19,11): error CS1525: Unexpected symbol").unwrap();
		assert_eq!(rec.file, PathBuf::from("E:\\t.cs"));
		assert_eq!(rec.start, Position { line: 18, column: 10 });
		assert_eq!(rec.end, rec.start);
		assert_eq!(rec.severity, Severity::Error);
		assert!(rec.message.contains("CS1525: Unexpected symbol"));
	}

	#[test]
	fn existing_path_error_line() {
		let file = tempfile::NamedTempFile::new().unwrap();
		let line = format!("{}(3,5): error CS1002: ; expected", file.path().display());
		let rec = parse(&line).unwrap();
		assert_eq!(rec.file, file.path());
		assert_eq!(rec.start, Position { line: 2, column: 4 });
		assert_eq!(rec.message, "CS1002: ; expected");
	}

	#[test]
	fn warning_and_info_lines() {
		let rec = parse("/w/a.cs(2,1): warning CS0168: The variable `e' is declared but never used").unwrap();
		assert_eq!(rec.severity, Severity::Warning);
		assert!(rec.is_reportable());

		let rec = parse("/w/a.cs(2,1): info CS0000: note").unwrap();
		assert_eq!(rec.severity, Severity::Info);
		assert!(!rec.is_reportable());

		let rec = parse("/w/a.cs(2,1): hidden CS8019: Unnecessary using").unwrap();
		assert_eq!(rec.severity, Severity::Unclassified);
	}

	#[test]
	fn compiler_exception_prefix_and_temp_marker() {
		let rec = parse("csscript.CompilerException: /tmp/ab.$temp$.cs(12,17): error CS0029: Cannot convert").unwrap();
		assert_eq!(rec.file, PathBuf::from("/tmp/ab.cs"));
		assert_eq!(rec.start, Position { line: 11, column: 16 });
	}

	#[test]
	fn unparseable_lines() {
		assert_eq!(parse("/definitely/not/here.cs"), None);
		assert_eq!(parse("Compilation failed."), None);
		assert_eq!(parse("/w/a.cs(x,1): error CS1: y"), None);
		assert_eq!(parse(""), None);
	}

	#[test]
	fn bare_file_reference() {
		let file = tempfile::NamedTempFile::new().unwrap();
		let rec = parse(&format!("file:{}", file.path().display())).unwrap();
		assert_eq!(rec.file, file.path());
		assert_eq!(rec.start, Position::default());
		assert_eq!(rec.end, Position::default());
	}

	#[test]
	fn location_lines() {
		let loc = parse_location("/w/lib.$temp$.cs(9,3): Helper.Run();").unwrap();
		assert_eq!(loc.file, PathBuf::from("/w/lib.cs"));
		assert_eq!(loc.position, Position { line: 8, column: 2 });
		assert_eq!(loc.text, "Helper.Run();");
		assert_eq!(parse_location("3 references:"), None);
	}
}
