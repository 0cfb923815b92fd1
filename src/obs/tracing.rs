// self
use crate::{
	_prelude::*,
	obs::{self, FlowKind, FlowOutcome},
};

/// Future returned by [`FlowSpan::instrument`]; a plain passthrough without `tracing`.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Future returned by [`FlowSpan::instrument`]; a plain passthrough without `tracing`.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// `adal_token.flow` span covering one credential or refresh flow.
///
/// `outcome` and `error` start empty and are filled by [`FlowSpan::settle`].
#[derive(Clone, Debug)]
pub struct FlowSpan {
	kind: FlowKind,
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Opens a span for `kind` at `stage` (the operation name).
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"adal_token.flow",
				flow = kind.as_str(),
				stage,
				outcome = tracing::field::Empty,
				error = tracing::field::Empty,
			);

			Self { kind, span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = stage;

			Self { kind }
		}
	}

	/// Flow the span belongs to.
	pub fn kind(&self) -> FlowKind {
		self.kind
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

	/// Records how the flow ended and returns the outcome label.
	pub fn settle<T>(&self, result: &Result<T>) -> FlowOutcome {
		let outcome = match result {
			Ok(_) => FlowOutcome::Success,
			Err(_) => FlowOutcome::Failure,
		};

		#[cfg(feature = "tracing")]
		{
			self.span.record("outcome", outcome.as_str());

			if let Err(err) = result {
				self.span.record("error", obs::error_label(err));
				self.span.in_scope(|| tracing::debug!(error = %err, "Flow failed."));
			}
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = result.as_ref().err().map(obs::error_label);
		}

		outcome
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn settle_maps_results_to_outcomes() {
		let span = FlowSpan::new(FlowKind::ClientSecret, "client_secret");

		assert_eq!(span.kind(), FlowKind::ClientSecret);
		assert_eq!(span.settle(&Ok::<_, Error>(())), FlowOutcome::Success);
		assert_eq!(span.settle(&Err::<(), _>(Error::Cancelled)), FlowOutcome::Failure);
	}

	#[tokio::test]
	async fn instrument_passes_the_value_through() {
		let span = FlowSpan::new(FlowKind::Refresh, "refresh_token");

		assert_eq!(span.instrument(async { 42 }).await, 42);
	}
}
