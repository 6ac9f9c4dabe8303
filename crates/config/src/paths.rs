//! Well-known file locations.

use std::ffi::OsString;
use std::path::PathBuf;

/// Environment variable overriding [`user_dir`].
pub const USER_DIR_ENV: &str = "CSIDE_USER_DIR";
/// File name of the generated project.
pub const PROJECT_FILE_NAME: &str = "script.csproj";

/// Returns the per-user data directory.
///
/// # Resolution Order
///
/// 1. `CSIDE_USER_DIR` environment variable.
/// 2. System config directory (e.g. `$XDG_CONFIG_HOME`) joined with `cside`.
/// 3. System temp directory joined with `cside`.
#[must_use]
pub fn user_dir() -> PathBuf {
	user_dir_from(std::env::var_os(USER_DIR_ENV))
}

fn user_dir_from(over: Option<OsString>) -> PathBuf {
	if let Some(dir) = over.filter(|d| !d.is_empty()) {
		return PathBuf::from(dir);
	}
	dirs::config_dir().unwrap_or_else(std::env::temp_dir).join("cside")
}

/// `settings.json` inside the user directory.
#[must_use]
pub fn settings_file() -> PathBuf {
	user_dir().join("settings.json")
}

/// Directory holding the generated project file.
#[must_use]
pub fn project_dir() -> PathBuf {
	std::env::temp_dir().join("CSSCRIPT").join("cside")
}

/// Directory receiving staged copies of editor buffers.
#[must_use]
pub fn scratch_dir() -> PathBuf {
	project_dir().join("staged")
}

/// Scratch script created by the new-script command.
#[must_use]
pub fn new_script_file() -> PathBuf {
	user_dir().join("new_script.cs")
}

/// Cached engine help text.
#[must_use]
pub fn engine_help_file() -> PathBuf {
	user_dir().join("cs-script.help.txt")
}

/// Cached directive syntax text.
#[must_use]
pub fn syntax_help_file() -> PathBuf {
	user_dir().join("cs-script.syntax.txt")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn override_wins() {
		assert_eq!(user_dir_from(Some("/data/cside".into())), PathBuf::from("/data/cside"));
	}

	#[test]
	fn empty_override_is_ignored() {
		let dir = user_dir_from(Some(OsString::new()));
		assert!(dir.ends_with("cside"));
		assert_ne!(dir, PathBuf::from("cside"));
	}

	#[test]
	fn scratch_lives_under_project_dir() {
		assert!(scratch_dir().starts_with(project_dir()));
		assert!(project_dir().ends_with("CSSCRIPT/cside"));
	}
}
