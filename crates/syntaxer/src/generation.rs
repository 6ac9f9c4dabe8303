//! Per-feature request generations.
//!
//! Each editor feature stamps its request with the next generation of its own clock. When the
//! response arrives, it is only delivered if no newer request of the same feature was started
//! in the meantime. Features never invalidate each other.

use std::sync::atomic::{AtomicU64, Ordering};

/// Editor features that issue analysis requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
	/// Completion list.
	Completion,
	/// Hover text.
	Tooltip,
	/// Go to definition.
	Definition,
	/// Find references.
	References,
	/// Rename preparation.
	Rename,
	/// Signature help.
	SignatureHelp,
	/// Document formatting.
	Format,
	/// Code actions suggesting `using` directives.
	SuggestUsings,
	/// Member documentation.
	MemberInfo,
}

impl Feature {
	const COUNT: usize = 9;

	fn index(self) -> usize {
		self as usize
	}
}

/// Token identifying one in-flight request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
	feature: Feature,
	generation: u64,
}

impl Ticket {
	/// Feature the request belongs to.
	pub fn feature(&self) -> Feature {
		self.feature
	}

	/// Generation stamped at issue time.
	pub const fn generation(&self) -> u64 {
		self.generation
	}
}

/// Monotonic generation clocks, one per [`Feature`].
#[derive(Debug, Default)]
pub struct RequestGenerations {
	clocks: [AtomicU64; Feature::COUNT],
}

impl RequestGenerations {
	/// Creates clocks starting at generation 0.
	pub fn new() -> Self {
		Self::default()
	}

	/// Starts a new request for `feature`, superseding any request still in flight.
	pub fn begin(&self, feature: Feature) -> Ticket {
		let generation = self.clocks[feature.index()].fetch_add(1, Ordering::AcqRel).wrapping_add(1);
		Ticket { feature, generation }
	}

	/// Returns true if no newer request of the same feature has begun.
	pub fn is_current(&self, ticket: &Ticket) -> bool {
		self.clocks[ticket.feature.index()].load(Ordering::Acquire) == ticket.generation
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn newer_request_supersedes_older() {
		let gens = RequestGenerations::new();
		let first = gens.begin(Feature::Completion);
		assert!(gens.is_current(&first));
		let second = gens.begin(Feature::Completion);
		assert!(!gens.is_current(&first));
		assert!(gens.is_current(&second));
		assert_eq!(second.generation(), first.generation() + 1);
	}

	#[test]
	fn features_are_independent() {
		let gens = RequestGenerations::new();
		let hover = gens.begin(Feature::Tooltip);
		let _ = gens.begin(Feature::Completion);
		let _ = gens.begin(Feature::MemberInfo);
		assert!(gens.is_current(&hover));
		assert_eq!(hover.feature(), Feature::Tooltip);
	}
}
