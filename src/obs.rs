//! Optional observability helpers for credential flows.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `adal_token.flow` with the `flow` and
//!   `stage` (call site) fields.
//!   The span records `outcome` and, on failure, `error` once the flow settles.
//! - Enable `metrics` to increment `adal_token_flow_total{flow, outcome, error}` and to
//!   record `adal_token_flow_duration_seconds{flow}`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Flow kinds observed by the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Interactive device-code flow.
	DeviceCode,
	/// Client-secret flow.
	ClientSecret,
	/// Client-certificate (signed assertion) flow.
	ClientCertificate,
	/// Refresh token grant.
	Refresh,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::DeviceCode => "device_code",
			FlowKind::ClientSecret => "client_secret",
			FlowKind::ClientCertificate => "client_certificate",
			FlowKind::Refresh => "refresh",
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
	/// Failure propagated back to the caller.
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

/// Stable label for the class of a flow failure, used as the `error` span field and
/// metric label.
pub fn error_label(error: &Error) -> &'static str {
	match error {
		Error::Cancelled => "cancelled",
		Error::Expired { .. } => "expired",
		Error::AccessDenied { .. } => "access_denied",
		Error::InvalidCredential { .. } | Error::Credential(_) => "invalid_credential",
		Error::InvalidGrant { .. } => "invalid_grant",
		Error::Transient(_) => "transient",
		Error::Transport(_) => "transport",
		Error::Config(_) | Error::Directory(_) => "config",
		Error::Storage(_) | Error::CallbackFailed { .. } => "callback",
		Error::ExpiryRegressed { .. } => "expiry_regressed",
	}
}
