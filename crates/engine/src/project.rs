//! Script project listings and the generated project file.
//!
//! The engine's list-project mode prints one entry per line:
//!
//! ```text
//! file:/home/u/script.cs
//! file:/home/u/lib/helpers.cs
//! ref:System.Xml.dll
//! searchDir:/home/u/lib
//! ```
//!
//! The first `file:` entry is the primary script; the rest are its dependencies.

use std::io;
use std::path::{Path, PathBuf};

use cside_config::paths::PROJECT_FILE_NAME;
use serde::Serialize;

use crate::runner::is_noise;

const COMPILE_PREFIX: &str = "<Compile Include=\"";
const ITEM_SUFFIX: &str = "\"/>";

/// Sources and references making up one script.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProjectDescriptor {
	/// Source files in engine order; the primary script comes first.
	pub files: Vec<PathBuf>,
	/// Referenced assemblies.
	pub refs: Vec<String>,
	/// Directories the engine searches for includes and assemblies.
	pub search_dirs: Vec<PathBuf>,
}

impl ProjectDescriptor {
	/// Splits list-project output into its entries. Unknown lines are ignored.
	pub fn parse(output: &str) -> Self {
		let mut project = Self::default();
		for line in output.lines().map(str::trim).filter(|l| !is_noise(l)) {
			if let Some(file) = line.strip_prefix("file:") {
				project.files.push(PathBuf::from(file.trim()));
			} else if let Some(reference) = line.strip_prefix("ref:") {
				project.refs.push(reference.trim().to_string());
			} else if let Some(dir) = line.strip_prefix("searchDir:") {
				project.search_dirs.push(PathBuf::from(dir.trim()));
			}
		}
		project
	}

	/// The primary script.
	pub fn primary(&self) -> Option<&Path> {
		self.files.first().map(PathBuf::as_path)
	}

	/// Returns true if `file` is one of the sources, ignoring ASCII case.
	pub fn contains(&self, file: &Path) -> bool {
		let wanted = file.to_string_lossy().to_ascii_lowercase();
		self.files.iter().any(|f| f.to_string_lossy().to_ascii_lowercase() == wanted)
	}

	/// Renders an SDK-style project with one `Compile` item per source and one `Reference`
	/// item per assembly.
	pub fn render_csproj(&self) -> String {
		let mut out = String::from(
			"<Project Sdk=\"Microsoft.NET.Sdk\">\n  <PropertyGroup>\n    <OutputType>Exe</OutputType>\n    <EnableDefaultCompileItems>false</EnableDefaultCompileItems>\n  </PropertyGroup>\n  <ItemGroup>\n",
		);
		for file in &self.files {
			out.push_str(&format!("    {COMPILE_PREFIX}{}{ITEM_SUFFIX}\n", escape(&file.to_string_lossy())));
		}
		out.push_str("  </ItemGroup>\n  <ItemGroup>\n");
		for reference in &self.refs {
			out.push_str(&format!("    <Reference Include=\"{}\"{ITEM_SUFFIX}\n", escape(reference)));
		}
		out.push_str("  </ItemGroup>\n</Project>\n");
		out
	}
}

/// Returns the path announced by a `project:<path>` line of `-proj:csproj` output.
pub fn announced_project_file(output: &str) -> Option<PathBuf> {
	output
		.lines()
		.filter(|l| !is_noise(l))
		.find_map(|l| l.trim().strip_prefix("project:"))
		.map(|p| PathBuf::from(p.trim()))
		.filter(|p| !p.as_os_str().is_empty())
}

/// Writes `contents` as the project file inside `proj_dir` and returns its path.
pub fn write_project_file(proj_dir: &Path, contents: &str) -> io::Result<PathBuf> {
	std::fs::create_dir_all(proj_dir)?;
	let path = proj_dir.join(PROJECT_FILE_NAME);
	std::fs::write(&path, contents)?;
	Ok(path)
}

/// Returns the first compiled source of the project file in `proj_dir`.
pub fn parse_proj_dir(proj_dir: &Path) -> io::Result<Option<PathBuf>> {
	let text = std::fs::read_to_string(proj_dir.join(PROJECT_FILE_NAME))?;
	Ok(text.lines().map(str::trim).find_map(|line| {
		let include = line.strip_prefix(COMPILE_PREFIX)?.strip_suffix(ITEM_SUFFIX)?;
		Some(PathBuf::from(unescape(include)))
	}))
}

/// Returns true for files the engine can run.
pub fn is_script(file: &Path) -> bool {
	file.extension()
		.and_then(|e| e.to_str())
		.is_some_and(|e| e.eq_ignore_ascii_case("cs") || e.eq_ignore_ascii_case("csx"))
}

fn escape(text: &str) -> String {
	text.replace('&', "&amp;").replace('"', "&quot;").replace('<', "&lt;").replace('>', "&gt;")
}

fn unescape(text: &str) -> String {
	text.replace("&quot;", "\"").replace("&lt;", "<").replace("&gt;", ">").replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	const LISTING: &str = "\
failed to get 100ns ticks
file:/w/script.cs
searchDir:/w/lib
ref:System.Xml.dll
file:/w/lib/helpers.cs
searchDir:/usr/lib/cs-script
ref:Newtonsoft.Json.dll
file:/w/lib/More.cs
";

	#[test]
	fn listing_splits_by_prefix() {
		let project = ProjectDescriptor::parse(LISTING);
		assert_eq!(
			project.files,
			vec![
				PathBuf::from("/w/script.cs"),
				PathBuf::from("/w/lib/helpers.cs"),
				PathBuf::from("/w/lib/More.cs"),
			]
		);
		assert_eq!(project.refs, vec!["System.Xml.dll", "Newtonsoft.Json.dll"]);
		assert_eq!(project.search_dirs.len(), 2);
		assert_eq!(project.primary(), Some(Path::new("/w/script.cs")));
	}

	#[test]
	fn search_dirs_do_not_affect_files_or_refs() {
		let without: String = LISTING.lines().filter(|l| !l.starts_with("searchDir:")).map(|l| format!("{l}\n")).collect();
		let a = ProjectDescriptor::parse(LISTING);
		let b = ProjectDescriptor::parse(&without);
		assert_eq!(a.files, b.files);
		assert_eq!(a.refs, b.refs);
		assert!(b.search_dirs.is_empty());
	}

	#[test]
	fn membership_ignores_case() {
		let project = ProjectDescriptor::parse(LISTING);
		assert!(project.contains(Path::new("/w/lib/more.cs")));
		assert!(!project.contains(Path::new("/w/other.cs")));
	}

	#[test]
	fn generated_project_names_the_primary_script() {
		let dir = tempfile::tempdir().unwrap();
		let project = ProjectDescriptor {
			files: vec![PathBuf::from("/w/a&b.cs"), PathBuf::from("/w/lib.cs")],
			refs: vec!["System.Xml.dll".into()],
			search_dirs: Vec::new(),
		};
		let path = write_project_file(dir.path(), &project.render_csproj()).unwrap();
		assert_eq!(path, dir.path().join("script.csproj"));

		let text = std::fs::read_to_string(&path).unwrap();
		assert!(text.contains("<Compile Include=\"/w/a&amp;b.cs\"/>"));
		assert!(text.contains("<Reference Include=\"System.Xml.dll\"/>"));
		assert_eq!(parse_proj_dir(dir.path()).unwrap(), Some(PathBuf::from("/w/a&b.cs")));
	}

	#[test]
	fn announced_project_line() {
		assert_eq!(
			announced_project_file("Generating...\nproject:/tmp/x/script.csproj\n"),
			Some(PathBuf::from("/tmp/x/script.csproj"))
		);
		assert_eq!(announced_project_file("error\n"), None);
	}

	#[test]
	fn script_extensions() {
		assert!(is_script(Path::new("a.cs")));
		assert!(is_script(Path::new("A.CSX")));
		assert!(!is_script(Path::new("a.txt")));
		assert!(!is_script(Path::new("cs")));
	}
}
