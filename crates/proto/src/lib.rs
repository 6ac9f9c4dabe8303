//! Wire protocol spoken with the Syntaxer analysis server.
//!
//! The Syntaxer listens on a localhost TCP port and answers exactly one request per
//! connection. Requests are newline-joined `key:value` fields; responses are plain text
//! whose shape depends on the requested operation.
//!
//! * [`Request`] / [`Operation`] / [`Flag`]: outbound message model and encoder
//! * [`Response`]: raw payload with sentinel marker handling
//! * [`framing`]: async read/write of one exchange, including the end-of-message rule
//! * [`payload`]: typed parsers for the operation-specific response shapes

#![warn(missing_docs)]

pub mod framing;
pub mod payload;
pub mod request;
pub mod response;

pub use payload::{CompletionItem, CompletionKind, DefinitionTarget, FormatResult, PingStatus};
pub use request::{Flag, Operation, Request};
pub use response::Response;

/// A convenient type alias for `Result` with `E` = [`ProtoError`].
pub type Result<T, E = ProtoError> = std::result::Result<T, E>;

/// Errors raised while encoding, decoding or transporting protocol messages.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ProtoError {
	/// Input/output errors from the underlying stream.
	#[error("{0}")]
	Io(#[from] std::io::Error),
	/// A request line did not match the `-key:value` shape.
	#[error("malformed request field: {0}")]
	MalformedField(String),
	/// A request had no `-op:` field.
	#[error("request has no operation")]
	MissingOperation,
	/// An `-op:` value named an unknown operation.
	#[error("unknown operation: {0}")]
	UnknownOperation(String),
}
