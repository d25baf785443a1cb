// self
use crate::{_prelude::*, obs::FlowKind};

/// Future returned by [`FlowSpan::instrument`]; a plain passthrough without the `tracing` feature.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Future returned by [`FlowSpan::instrument`]; a plain passthrough without the `tracing` feature.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// Span wrapped around a fetch, its redirect retry, or a scheduled refresh.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Opens `oauth2_session_fetch.flow` for `kind` at call site `stage`.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			Self {
				span: tracing::info_span!("oauth2_session_fetch.flow", flow = kind.as_str(), stage),
			}
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Runs `fut` inside the span.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Logs a refresh failure the scheduler absorbed.
pub(crate) fn refresh_failure(session_id: &str, error: &dyn StdError) {
	#[cfg(feature = "tracing")]
	tracing::debug!(session_id, error = %error, "session refresh stopped");
	#[cfg(not(feature = "tracing"))]
	let _ = (session_id, error);
}

/// Logs the expiry of a session that has no way to refresh.
pub(crate) fn session_expired() {
	#[cfg(feature = "tracing")]
	tracing::info!(flow = FlowKind::Expiry.as_str(), "session expired without refresh support");
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn instrument_keeps_the_output() {
		let span = FlowSpan::new(FlowKind::Refresh, "instrument_keeps_the_output");

		assert_eq!(span.instrument(async { 42 }).await, 42);
	}
}
