//! Raw analysis-server responses.

/// Prefix the server uses when it has nothing to report.
pub const NULL_MARKER: &str = "<null>";
/// Prefix the server uses when the request failed on its side.
pub const ERROR_MARKER: &str = "<error>";

/// Raw text returned by the analysis server for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
	raw: String,
}

impl Response {
	/// Wraps raw response text.
	pub fn new(raw: impl Into<String>) -> Self {
		Self { raw: raw.into() }
	}

	/// Returns the unmodified response text.
	pub fn raw(&self) -> &str {
		&self.raw
	}

	/// Returns true if the response starts with [`NULL_MARKER`].
	pub fn is_null(&self) -> bool {
		self.raw.starts_with(NULL_MARKER)
	}

	/// Returns the server-side error text if the response starts with [`ERROR_MARKER`].
	pub fn error(&self) -> Option<&str> {
		self.raw.strip_prefix(ERROR_MARKER).map(str::trim)
	}

	/// Returns the operation payload, or `None` for null/error markers.
	pub fn payload(&self) -> Option<&str> {
		if self.is_null() || self.error().is_some() { None } else { Some(&self.raw) }
	}

	/// Consumes the response, returning the payload if there is one.
	pub fn into_payload(self) -> Option<String> {
		if self.payload().is_some() { Some(self.raw) } else { None }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn markers_hide_payload() {
		assert_eq!(Response::new("<null>").payload(), None);
		assert!(Response::new("<null>").is_null());

		let err = Response::new("<error> cannot load script");
		assert_eq!(err.error(), Some("cannot load script"));
		assert_eq!(err.payload(), None);
		assert_eq!(err.into_payload(), None);
	}

	#[test]
	fn plain_text_is_payload() {
		let resp = Response::new("file:/w/a.cs\nline:3");
		assert_eq!(resp.payload(), Some("file:/w/a.cs\nline:3"));
		assert_eq!(resp.error(), None);
		assert_eq!(resp.into_payload().as_deref(), Some("file:/w/a.cs\nline:3"));
	}
}
