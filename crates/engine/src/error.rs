use std::path::PathBuf;

use crate::session::LockError;

/// A convenient type alias for `Result` with `E` = [`enum@crate::Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Possible errors.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
	/// The session lock could not be taken.
	#[error(transparent)]
	Lock(#[from] LockError),
	/// Spawning or talking to the engine failed.
	#[error("{0}")]
	Io(#[from] std::io::Error),
	/// No engine path is configured.
	#[error("script engine path is not configured")]
	EngineNotConfigured,
	/// The file is not a script the engine understands.
	#[error("\"{}\" is not a valid C# script file", .0.display())]
	NotAScript(PathBuf),
	/// The file does not exist on disk.
	#[error("cannot find file \"{}\"", .0.display())]
	FileNotFound(PathBuf),
	/// The engine produced no usable project for the script.
	#[error("Cannot generate project from the script. Check the //css_ref and //css_in directives.")]
	ProjectGeneration,
	/// The editor refused to start a debug session.
	#[error("debug session failed: {0}")]
	Debug(String),
	/// The analysis server is not configured.
	#[error("analysis server is not configured")]
	SyntaxerUnavailable,
	/// The analysis server failed.
	#[error(transparent)]
	Syntaxer(#[from] cside_syntaxer::Error),
}
