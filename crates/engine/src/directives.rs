//! Help for `//css_*` script directives, parsed from the engine's `-syntax` output.
//!
//! Each directive section is introduced by a line of dashes directly followed by the
//! directive's signature:
//!
//! ```text
//! ------------------------
//! //css_include <file>;
//! Alias - //css_inc
//! Includes a script file...
//! ------------------------
//! //css_reference <assembly>;
//! ```

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

static SECTION_START: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^-+\r?\n//css_").unwrap());
static RULE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^-+\r?\n").unwrap());

const ALIAS_PREFIX: &str = "Alias - ";

/// One directive's documentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveEntry {
	/// Section text, starting with the directive signature.
	pub text: String,
	/// Zero-based line of the section in the help text.
	pub line: u32,
}

/// Directive documentation keyed by directive name and alias.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectiveHelp {
	entries: BTreeMap<String, DirectiveEntry>,
}

impl DirectiveHelp {
	/// Parses engine syntax help.
	pub fn parse(help: &str) -> Self {
		let starts: Vec<usize> = SECTION_START.find_iter(help).map(|m| m.start()).collect();
		let mut entries = BTreeMap::new();

		for (i, &start) in starts.iter().enumerate() {
			let end = starts.get(i + 1).copied().unwrap_or(help.len());
			let chunk = &help[start..end];
			let Some(body) = RULE.split(chunk).nth(1) else {
				continue;
			};
			let text = body.trim_end().to_string();
			let Some(id) = text.lines().next().and_then(|l| l.split(' ').next()).filter(|id| !id.is_empty()) else {
				continue;
			};
			let entry = DirectiveEntry {
				line: help[..start].matches('\n').count() as u32,
				text: text.clone(),
			};

			let alias = text
				.lines()
				.take(5)
				.find_map(|l| l.strip_prefix(ALIAS_PREFIX).filter(|a| a.starts_with("//css")))
				.map(|a| a.trim().to_string());
			if let Some(alias) = alias {
				entries.insert(alias, entry.clone());
			}
			entries.insert(id.to_string(), entry);
		}

		Self { entries }
	}

	/// Documentation for a directive or alias such as `//css_ref`.
	pub fn get(&self, directive: &str) -> Option<&DirectiveEntry> {
		self.entries.get(directive)
	}

	/// All known directive names and aliases, sorted.
	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.entries.keys().map(String::as_str)
	}

	/// Number of names, aliases included.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Returns true if no directive was found.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

/// Returns the `//css_*` directive touching byte `offset` of `line`, if any.
pub fn directive_at(line: &str, offset: usize) -> Option<&str> {
	let start = line.find("//css_")?;
	let end = line[start..]
		.find(|c: char| c.is_whitespace() || c == ';')
		.map_or(line.len(), |n| start + n);
	(start..=end).contains(&offset).then(|| &line[start..end])
}
