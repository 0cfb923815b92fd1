// std
use std::sync::atomic::{AtomicU64, Ordering};

/// How the controller obtained (or tried to obtain) a token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefreshPath {
	/// Refresh-token grant against the held token.
	RefreshGrant,
	/// Full credential flow (first acquisition, no refresh token, or a revoked one).
	CredentialFlow,
}

/// Point-in-time copy of [`RefreshMetrics`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RefreshMetricsSnapshot {
	/// Calls to `refresh` or `ensure_fresh` that went to the directory.
	pub attempts: u64,
	/// Attempts that installed a new token.
	pub successes: u64,
	/// Attempts that left the controller without a new token.
	pub failures: u64,
	/// Refresh-token grants sent.
	pub refresh_grants: u64,
	/// Credential flows run.
	pub credential_flows: u64,
	/// New tokens whose callbacks did not all succeed.
	pub callback_failures: u64,
}

/// Lock-free counters describing a controller's refresh history.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	attempts: AtomicU64,
	successes: AtomicU64,
	failures: AtomicU64,
	refresh_grants: AtomicU64,
	credential_flows: AtomicU64,
	callback_failures: AtomicU64,
}
impl RefreshMetrics {
	/// Attempts so far.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Attempts that installed a new token.
	pub fn successes(&self) -> u64 {
		self.successes.load(Ordering::Relaxed)
	}

	/// Attempts that failed.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	/// Number of times `path` was taken.
	pub fn path_count(&self, path: RefreshPath) -> u64 {
		match path {
			RefreshPath::RefreshGrant => self.refresh_grants.load(Ordering::Relaxed),
			RefreshPath::CredentialFlow => self.credential_flows.load(Ordering::Relaxed),
		}
	}

	/// New tokens that were installed but not fully published to callbacks.
	pub fn callback_failures(&self) -> u64 {
		self.callback_failures.load(Ordering::Relaxed)
	}

	/// Copies every counter at once.
	pub fn snapshot(&self) -> RefreshMetricsSnapshot {
		RefreshMetricsSnapshot {
			attempts: self.attempts(),
			successes: self.successes(),
			failures: self.failures(),
			refresh_grants: self.path_count(RefreshPath::RefreshGrant),
			credential_flows: self.path_count(RefreshPath::CredentialFlow),
			callback_failures: self.callback_failures(),
		}
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_path(&self, path: RefreshPath) {
		let counter = match path {
			RefreshPath::RefreshGrant => &self.refresh_grants,
			RefreshPath::CredentialFlow => &self.credential_flows,
		};

		counter.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_success(&self) {
		self.successes.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failures.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_callback_failure(&self) {
		self.callback_failures.fetch_add(1, Ordering::Relaxed);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn snapshot_reflects_recorded_paths() {
		let metrics = RefreshMetrics::default();

		metrics.record_attempt();
		metrics.record_path(RefreshPath::RefreshGrant);
		metrics.record_path(RefreshPath::CredentialFlow);
		metrics.record_success();
		metrics.record_callback_failure();

		assert_eq!(
			metrics.snapshot(),
			RefreshMetricsSnapshot {
				attempts: 1,
				successes: 1,
				failures: 0,
				refresh_grants: 1,
				credential_flows: 1,
				callback_failures: 1,
			},
		);
	}
}
