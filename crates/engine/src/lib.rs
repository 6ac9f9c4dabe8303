//! Script engine orchestration for cside.
//!
//! Every user-facing engine command runs as a short-lived engine process under the
//! [`SessionLock`], so overlapping commands cannot corrupt the shared project state the
//! engine keeps on disk. The editor itself is reached through the [`EditorHost`],
//! [`Notifier`] and [`OutputSink`] traits.

#![warn(missing_docs)]

pub mod diagnostics;
pub mod directives;
pub mod environment;
mod error;
mod host;
mod orchestrator;
pub mod project;
mod runner;
mod session;

pub use diagnostics::{DiagnosticRecord, Location, Position, Severity};
pub use directives::DirectiveHelp;
pub use error::{Error, Result};
pub use host::{DebugLaunch, EditorHost, MessageKind, NotifyAction, Notifier};
pub use orchestrator::{EnginePaths, Orchestrator};
pub use project::ProjectDescriptor;
pub use runner::{BufferSink, EngineCommand, EngineOutput, OutputSink, is_noise};
pub use session::{LockError, SessionGuard, SessionLock};
