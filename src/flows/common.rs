//! Shared helpers for flow implementations (form assembly, cancellation, observability).

// self
use crate::{
	_prelude::*,
	obs::{self, FlowKind, FlowSpan},
	provider::GrantType,
};

/// Starts a token form with the grant type and target resource.
pub(crate) fn token_form(grant: GrantType, resource: &str) -> BTreeMap<String, String> {
	let mut form = BTreeMap::new();

	form.insert("grant_type".into(), grant.as_str().into());
	form.insert("resource".into(), resource.into());

	form
}

/// Races `fut` against `cancel`; cancellation drops the in-flight request.
pub(crate) async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
	F: Future<Output = Result<T>>,
{
	tokio::select! {
		biased;
		_ = cancel.cancelled() => Err(Error::Cancelled),
		result = fut => result,
	}
}

/// Wraps a flow body with its span and attempt/success/failure counters.
pub(crate) async fn observed<T, F>(kind: FlowKind, stage: &'static str, fut: F) -> Result<T>
where
	F: Future<Output = Result<T>>,
{
	let span = FlowSpan::new(kind, stage);
	let started = tokio::time::Instant::now();

	obs::record_flow_attempt(kind);

	let result = span.instrument(fut).await;

	span.settle(&result);
	obs::record_flow_result(kind, &result, started.elapsed());

	result
}
