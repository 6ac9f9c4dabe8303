//! Error types for settings persistence.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when reading or writing settings.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error reading or writing a settings file.
	#[error("I/O error on {path}: {error}")]
	Io {
		/// Path to the file that failed.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	/// The settings file is not valid JSON for [`crate::Settings`].
	#[error("invalid settings in {path}: {error}")]
	Json {
		/// Path to the offending file.
		path: PathBuf,
		/// The underlying parse error.
		error: serde_json::Error,
	},
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
