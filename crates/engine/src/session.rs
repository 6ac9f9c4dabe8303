//! Single-flight guard for engine commands.
//!
//! The lock is `Idle` or held by exactly one holder token. Acquisition never waits: a caller
//! that finds the lock held gets [`LockError::Busy`] and is expected to tell the user. Each
//! acquisition draws a fresh token, and a guard only clears the lock if its own token is
//! still the holder, so a guard dropped after [`SessionLock::force_reset`] cannot release a
//! newer holder's lock.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

const IDLE: u64 = 0;

/// Reasons an acquisition is refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LockError {
	/// The runtime required by the engine was not found or is too old.
	#[error("cannot detect the required runtime version")]
	EnvironmentNotReady,
	/// Startup work has not finished yet.
	#[error("initialization is in progress")]
	Initializing,
	/// Another command holds the lock.
	#[error("cs-script is busy")]
	Busy,
}

#[derive(Debug, Default)]
struct Inner {
	holder: AtomicU64,
	next_token: AtomicU64,
	environment_ready: AtomicBool,
	initialized: AtomicBool,
}

/// Process-wide session lock. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct SessionLock {
	inner: Arc<Inner>,
}

impl SessionLock {
	/// Creates an idle lock that is neither environment-ready nor initialized.
	pub fn new() -> Self {
		Self::default()
	}

	/// Records the outcome of the environment check.
	pub fn set_environment_ready(&self, ready: bool) {
		self.inner.environment_ready.store(ready, Ordering::Release);
	}

	/// Records that startup work has completed.
	pub fn set_initialized(&self, initialized: bool) {
		self.inner.initialized.store(initialized, Ordering::Release);
	}

	/// Returns true when both preconditions for acquisition hold.
	pub fn is_ready(&self) -> bool {
		self.inner.environment_ready.load(Ordering::Acquire) && self.inner.initialized.load(Ordering::Acquire)
	}

	/// Returns true while some command holds the lock.
	pub fn is_busy(&self) -> bool {
		self.inner.holder.load(Ordering::Acquire) != IDLE
	}

	/// Takes the lock without waiting.
	pub fn try_acquire(&self) -> Result<SessionGuard, LockError> {
		if !self.inner.environment_ready.load(Ordering::Acquire) {
			return Err(LockError::EnvironmentNotReady);
		}
		if !self.inner.initialized.load(Ordering::Acquire) {
			return Err(LockError::Initializing);
		}

		let token = self.inner.next_token.fetch_add(1, Ordering::AcqRel).wrapping_add(1).max(1);
		self.inner
			.holder
			.compare_exchange(IDLE, token, Ordering::AcqRel, Ordering::Acquire)
			.map_err(|_| LockError::Busy)?;
		tracing::trace!(token, "Session lock acquired");
		Ok(SessionGuard {
			inner: self.inner.clone(),
			token,
		})
	}

	/// Clears the lock regardless of who holds it.
	pub fn force_reset(&self) {
		let previous = self.inner.holder.swap(IDLE, Ordering::AcqRel);
		if previous != IDLE {
			tracing::warn!(token = previous, "Session lock forcibly reset");
		}
	}
}

/// Proof of holding the [`SessionLock`]. Releases on drop.
#[derive(Debug)]
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct SessionGuard {
	inner: Arc<Inner>,
	token: u64,
}

impl SessionGuard {
	/// Holder token of this acquisition.
	pub fn token(&self) -> u64 {
		self.token
	}

	/// Releases the lock now.
	pub fn release(self) {}
}

impl Drop for SessionGuard {
	fn drop(&mut self) {
		let released = self
			.inner
			.holder
			.compare_exchange(self.token, IDLE, Ordering::AcqRel, Ordering::Acquire)
			.is_ok();
		tracing::trace!(token = self.token, released, "Session lock guard dropped");
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn ready_lock() -> SessionLock {
		let lock = SessionLock::new();
		lock.set_environment_ready(true);
		lock.set_initialized(true);
		lock
	}

	#[test]
	fn preconditions_are_checked_in_order() {
		let lock = SessionLock::new();
		assert_eq!(lock.try_acquire().unwrap_err(), LockError::EnvironmentNotReady);
		lock.set_environment_ready(true);
		assert_eq!(lock.try_acquire().unwrap_err(), LockError::Initializing);
		lock.set_initialized(true);
		assert!(lock.is_ready());
		assert!(lock.try_acquire().is_ok());
	}

	#[test]
	fn second_acquire_fails_until_release() {
		let lock = ready_lock();
		let guard = lock.try_acquire().unwrap();
		assert!(lock.is_busy());
		assert_eq!(lock.try_acquire().unwrap_err(), LockError::Busy);
		guard.release();
		assert!(!lock.is_busy());
		assert!(lock.try_acquire().is_ok());
	}

	#[test]
	fn force_reset_frees_a_leaked_lock() {
		let lock = ready_lock();
		std::mem::forget(lock.try_acquire().unwrap());
		assert_eq!(lock.try_acquire().unwrap_err(), LockError::Busy);
		lock.force_reset();
		assert!(lock.try_acquire().is_ok());
	}

	#[test]
	fn stale_guard_does_not_release_newer_holder() {
		let lock = ready_lock();
		let stale = lock.try_acquire().unwrap();
		lock.force_reset();
		let current = lock.try_acquire().unwrap();
		assert_ne!(stale.token(), current.token());

		drop(stale);
		assert!(lock.is_busy());
		assert_eq!(lock.try_acquire().unwrap_err(), LockError::Busy);
		drop(current);
		assert!(!lock.is_busy());
	}

	#[test]
	fn guard_released_on_panic() {
		let lock = ready_lock();
		let cloned = lock.clone();
		let result = std::panic::catch_unwind(move || {
			let _guard = cloned.try_acquire().unwrap();
			panic!("command failed");
		});
		assert!(result.is_err());
		assert!(!lock.is_busy());
	}

	#[test]
	fn clones_share_state() {
		let lock = ready_lock();
		let other = lock.clone();
		let _guard = lock.try_acquire().unwrap();
		assert!(other.is_busy());
		assert_eq!(other.try_acquire().unwrap_err(), LockError::Busy);
	}
}
