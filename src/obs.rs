//! Optional observability helpers for authenticated fetches and session refresh.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `oauth2_session_fetch.flow` with the `flow`
//!   and `stage` (call site) fields, plus debug events for refresh failures that are otherwise
//!   swallowed.
//! - Enable `metrics` to increment the `oauth2_session_fetch_flow_total` counter for every
//!   attempt/success/failure, labeled by `flow` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Flow kinds observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// An authenticated request issued by the caller.
	Fetch,
	/// The single DPoP re-signed retry after a redirect.
	Retry,
	/// A scheduled token refresh.
	Refresh,
	/// The one-shot expiry of a session without refresh support.
	Expiry,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Fetch => "fetch",
			FlowKind::Retry => "retry",
			FlowKind::Refresh => "refresh",
			FlowKind::Expiry => "expiry",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a flow.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure, whether propagated to the caller or absorbed by the scheduler.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
