//! Settings and on-disk locations for cside.
//!
//! Settings are a single JSON document in the user directory. Every field has a default, so
//! a missing or partial file is valid:
//!
//! ```json
//! {
//!   "runtime": "dotnet",
//!   "engine_path": "/opt/cs-script/cscs.dll",
//!   "syntaxer_port": 18003,
//!   "extra_args": ["-dbg"]
//! }
//! ```
//!
//! # Locations
//!
//! * user dir: `$CSIDE_USER_DIR`, else `<config dir>/cside`
//! * scratch dir for staged buffers: `<tmp>/CSSCRIPT/cside/staged`
//! * generated project dir: `<tmp>/CSSCRIPT/cside`

#![warn(missing_docs)]

mod error;
pub mod paths;

use std::path::{Path, PathBuf};

pub use error::{ConfigError, Result};
use serde::{Deserialize, Serialize};

/// Default port of the analysis server.
pub const DEFAULT_SYNTAXER_PORT: u16 = 18003;
/// Default idle timeout handed to the analysis server.
pub const DEFAULT_SYNTAXER_TIMEOUT_MS: u64 = 60_000;
/// Engine option that only makes sense for non-debug runs; stripped from debug launches.
pub const PDB_ONLY_ARG: &str = "-co:/debug:pdbonly";

/// Persisted user settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
	/// Runtime host every engine invocation goes through.
	pub runtime: String,
	/// Script engine assembly or executable.
	pub engine_path: Option<PathBuf>,
	/// Analysis server assembly or executable.
	pub syntaxer_path: Option<PathBuf>,
	/// Runtime host for the analysis server; `None` launches it directly.
	pub syntaxer_host: Option<String>,
	/// Localhost port of the analysis server.
	pub syntaxer_port: u16,
	/// Idle period after which the analysis server exits, in milliseconds.
	pub syntaxer_timeout_ms: u64,
	/// Arguments inserted before the script path on run and check.
	pub extra_args: Vec<String>,
	/// Arguments for debug launches; [`PDB_ONLY_ARG`] is dropped from them.
	pub debug_extra_args: Vec<String>,
	/// Oldest runtime version accepted by the environment check.
	pub min_runtime_version: Option<String>,
	/// Explain project loading before the first load.
	pub show_load_proj_info: bool,
	/// Show the readme after an update.
	pub show_readme: bool,
	/// Run scripts through a globally installed `css` command instead of the engine path.
	pub use_global_css: bool,
	/// Respawn policy of the analysis server.
	pub retry: RetrySettings,
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			runtime: "dotnet".to_string(),
			engine_path: None,
			syntaxer_path: None,
			syntaxer_host: None,
			syntaxer_port: DEFAULT_SYNTAXER_PORT,
			syntaxer_timeout_ms: DEFAULT_SYNTAXER_TIMEOUT_MS,
			extra_args: Vec::new(),
			debug_extra_args: vec![PDB_ONLY_ARG.to_string()],
			min_runtime_version: None,
			show_load_proj_info: true,
			show_readme: true,
			use_global_css: false,
			retry: RetrySettings::default(),
		}
	}
}

/// Bounds on analysis server respawns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
	/// Respawns allowed between two successful connections.
	pub max_attempts: u32,
	/// Initial backoff in milliseconds; doubles per attempt.
	pub backoff_ms: u64,
}

impl Default for RetrySettings {
	fn default() -> Self {
		Self {
			max_attempts: 5,
			backoff_ms: 500,
		}
	}
}

impl Settings {
	/// Loads settings from `path`.
	///
	/// A missing file yields defaults silently; an unreadable or corrupt one yields defaults
	/// with a warning.
	pub fn load(path: &Path) -> Self {
		match Self::try_load(path) {
			Ok(Some(settings)) => settings,
			Ok(None) => Self::default(),
			Err(e) => {
				tracing::warn!(error = %e, "Falling back to default settings");
				Self::default()
			}
		}
	}

	/// Loads settings from `path`, reporting every failure. `Ok(None)` if the file is absent.
	pub fn try_load(path: &Path) -> Result<Option<Self>> {
		let text = match std::fs::read_to_string(path) {
			Ok(text) => text,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
			Err(error) => {
				return Err(ConfigError::Io {
					path: path.to_path_buf(),
					error,
				});
			}
		};
		serde_json::from_str(&text).map(Some).map_err(|error| ConfigError::Json {
			path: path.to_path_buf(),
			error,
		})
	}

	/// Writes settings to `path` as pretty JSON, creating parent directories.
	pub fn save(&self, path: &Path) -> Result<()> {
		let io_err = |error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		};
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent).map_err(io_err)?;
		}
		let json = serde_json::to_string_pretty(self).map_err(|error| ConfigError::Json {
			path: path.to_path_buf(),
			error,
		})?;
		std::fs::write(path, json).map_err(io_err)
	}

	/// Debug launch arguments with [`PDB_ONLY_ARG`] removed.
	pub fn debug_args(&self) -> Vec<String> {
		self.debug_extra_args.iter().filter(|a| *a != PDB_ONLY_ARG).cloned().collect()
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn missing_file_gives_defaults() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("settings.json");
		assert_eq!(Settings::try_load(&path).unwrap(), None);
		assert_eq!(Settings::load(&path), Settings::default());
	}

	#[test]
	fn corrupt_file_gives_defaults() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("settings.json");
		std::fs::write(&path, "{ not json").unwrap();
		assert!(matches!(Settings::try_load(&path), Err(ConfigError::Json { .. })));
		assert_eq!(Settings::load(&path), Settings::default());
	}

	#[test]
	fn partial_file_keeps_other_defaults() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("settings.json");
		std::fs::write(&path, r#"{ "syntaxer_port": 19000, "retry": { "max_attempts": 2 } }"#).unwrap();
		let settings = Settings::load(&path);
		assert_eq!(settings.syntaxer_port, 19000);
		assert_eq!(settings.retry.max_attempts, 2);
		assert_eq!(settings.retry.backoff_ms, 500);
		assert_eq!(settings.runtime, "dotnet");
		assert!(settings.show_load_proj_info);
	}

	#[test]
	fn save_then_load() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("nested").join("settings.json");
		let settings = Settings {
			show_load_proj_info: false,
			engine_path: Some(PathBuf::from("/opt/cscs.dll")),
			..Settings::default()
		};
		settings.save(&path).unwrap();
		assert_eq!(Settings::load(&path), settings);
	}

	#[test]
	fn debug_args_drop_pdb_only() {
		let settings = Settings {
			debug_extra_args: vec![PDB_ONLY_ARG.into(), "-dbg".into()],
			..Settings::default()
		};
		assert_eq!(settings.debug_args(), vec!["-dbg".to_string()]);
		assert!(Settings::default().debug_args().is_empty());
	}
}
