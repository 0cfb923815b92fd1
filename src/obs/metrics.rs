// std
use std::time::Duration as StdDuration;
// self
use crate::{
	_prelude::*,
	obs::{self, FlowKind, FlowOutcome},
};

/// Counts a flow entry in `adal_token_flow_total`.
pub fn record_flow_attempt(kind: FlowKind) {
	#[cfg(feature = "metrics")]
	metrics::counter!(
		"adal_token_flow_total",
		"flow" => kind.as_str(),
		"outcome" => FlowOutcome::Attempt.as_str(),
		"error" => "none"
	)
	.increment(1);

	#[cfg(not(feature = "metrics"))]
	let _ = kind;
}

/// Counts how a flow ended and records how long it took.
///
/// Failures carry the [`obs::error_label`] class so cancellations and provider
/// rejections can be told apart on a dashboard.
pub fn record_flow_result<T>(kind: FlowKind, result: &Result<T>, elapsed: StdDuration) {
	let (outcome, error) = match result {
		Ok(_) => (FlowOutcome::Success, "none"),
		Err(err) => (FlowOutcome::Failure, obs::error_label(err)),
	};

	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"adal_token_flow_total",
			"flow" => kind.as_str(),
			"outcome" => outcome.as_str(),
			"error" => error
		)
		.increment(1);
		metrics::histogram!("adal_token_flow_duration_seconds", "flow" => kind.as_str())
			.record(elapsed.as_secs_f64());
	}

	#[cfg(not(feature = "metrics"))]
	let _ = (kind, outcome, error, elapsed);
}
