//! Client side of the Syntaxer analysis server.
//!
//! The Syntaxer is an external, long-running process that answers code-intelligence queries
//! for script files over a localhost TCP port. It only understands file paths, so every query
//! first stages the editor buffer into a throwaway file.
//!
//! * [`Supervisor`]: spawns the server on demand with a bounded, backed-off respawn policy
//! * [`AnalysisClient`]: one connection per request, framed by [`cside_proto::framing`]
//! * [`Stager`] / [`StagedSource`]: scoped temp copies of editor buffers
//! * [`RequestGenerations`]: drops responses superseded by a newer request of the same feature
//! * [`Syntaxer`]: the editor-facing facade combining all of the above

#![warn(missing_docs)]

mod client;
mod facade;
mod generation;
mod staging;
mod supervisor;

pub use client::AnalysisClient;
pub use facade::{SourceBuffer, Syntaxer};
pub use generation::{Feature, RequestGenerations, Ticket};
pub use staging::{BACK_REFERENCE_PREFIX, StagedSource, Stager, TEMP_MARKER, clear_temp_suffixes};
pub use supervisor::{ProcessLauncher, Respawn, RetryPolicy, ServerLauncher, ServerSpec, Supervisor};

/// A convenient type alias for `Result` with `E` = [`enum@crate::Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Possible errors.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
	/// Encoding or transport failure during an exchange.
	#[error("{0}")]
	Proto(#[from] cside_proto::ProtoError),
	/// Input/output errors outside of an exchange (staging, spawning).
	#[error("{0}")]
	Io(#[from] std::io::Error),
	/// The server stayed unreachable after the configured number of respawns.
	#[error("analysis server unreachable after {attempts} restart attempts")]
	RetriesExhausted {
		/// Number of respawn attempts made since the last successful connection.
		attempts: u32,
	},
}
