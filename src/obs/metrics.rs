// self
use crate::obs::{FlowKind, FlowOutcome};

/// Records a flow outcome via the global metrics recorder (when enabled).
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"oauth2_session_fetch_flow_total",
			"flow" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Records the terminal outcome of a fallible flow and hands the result back.
pub fn record_result<T, E>(kind: FlowKind, result: Result<T, E>) -> Result<T, E> {
	match &result {
		Ok(_) => record_flow_outcome(kind, FlowOutcome::Success),
		Err(_) => record_flow_outcome(kind, FlowOutcome::Failure),
	}

	result
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recording_passes_results_through() {
		record_flow_outcome(FlowKind::Expiry, FlowOutcome::Attempt);

		assert_eq!(record_result::<_, ()>(FlowKind::Fetch, Ok(7)), Ok(7));
		assert_eq!(record_result::<u8, _>(FlowKind::Retry, Err("boom")), Err("boom"));
	}
}
