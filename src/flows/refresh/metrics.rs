// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::provider::RefreshError;

/// Thread-safe counters for scheduled refreshes of one session.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	attempts: AtomicU64,
	success: AtomicU64,
	refused: AtomicU64,
	failure: AtomicU64,
}
impl RefreshMetrics {
	/// Returns the total number of refresh attempts.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of refreshes that produced a new access token.
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Returns the number of refreshes the provider explicitly refused.
	pub fn refusals(&self) -> u64 {
		self.refused.load(Ordering::Relaxed)
	}

	/// Returns the number of failed refreshes, refusals included.
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_success(&self) {
		self.success.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self, error: &RefreshError) {
		if matches!(error, RefreshError::ProviderRefusal { .. }) {
			self.refused.fetch_add(1, Ordering::Relaxed);
		}

		self.failure.fetch_add(1, Ordering::Relaxed);
	}
}
