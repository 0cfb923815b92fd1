//! Provider strategy hook that classifies token endpoint failures.
//!
//! Classification works on primitive data only, so flows stay independent of the HTTP
//! client that produced the failure.

// self
use crate::{_prelude::*, provider::grant::GrantType};

/// Strategy hook that maps provider error payloads onto [`ProviderErrorKind`].
///
/// Implementors must be `Send + Sync` because a controller may be shared across tasks.
/// Override [`ProviderStrategy::augment_token_request`] only when a directory needs extra
/// form fields; the default adds nothing.
pub trait ProviderStrategy: Send + Sync {
	/// Maps low-level HTTP/JSON errors into the crate taxonomy for a token request.
	fn classify_token_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind;

	/// Adds directory-specific form parameters before a request is dispatched.
	fn augment_token_request(&self, _grant: GrantType, _form: &mut BTreeMap<String, String>) {}
}

/// Canonical provider error categories used by strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderErrorKind {
	/// Provider rejected the grant (bad device code or refresh token).
	InvalidGrant,
	/// Client authentication failed (bad secret, assertion, or client id).
	InvalidClient,
	/// The operator declined sign-in or the provider refused access.
	AccessDenied,
	/// The device code or grant expired.
	Expired,
	/// The operator has not finished signing in yet.
	AuthorizationPending,
	/// The client polls too quickly and must widen its interval.
	SlowDown,
	/// Failure is temporary and should be retried by the host.
	Transient,
}

/// Context passed to provider strategies when classifying token errors.
///
/// Only primitive data is kept (status code, OAuth fields, body preview).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderErrorContext {
	/// Grant type associated with the failing request.
	pub grant_type: GrantType,
	/// HTTP status code returned by the provider, when available.
	pub http_status: Option<u16>,
	/// Provider-supplied OAuth `error` field.
	pub oauth_error: Option<String>,
	/// Provider-supplied OAuth `error_description` field.
	pub error_description: Option<String>,
	/// Preview of the response body for non-JSON payloads.
	pub body_preview: Option<String>,
	/// Indicates whether the failure originated from the network/transport layer.
	pub network_error: bool,
}
impl ProviderErrorContext {
	const BODY_PREVIEW_LIMIT: usize = 256;

	/// Creates a new context scoped to the provided grant type.
	pub fn new(grant_type: GrantType) -> Self {
		Self {
			grant_type,
			http_status: None,
			oauth_error: None,
			error_description: None,
			body_preview: None,
			network_error: false,
		}
	}

	/// Convenience constructor for transport-level/network failures.
	pub fn network_failure(grant_type: GrantType) -> Self {
		let mut ctx = Self::new(grant_type);

		ctx.network_error = true;

		ctx
	}

	/// Overrides the network error flag.
	pub fn with_network_error(mut self, network_error: bool) -> Self {
		self.network_error = network_error;

		self
	}

	/// Adds an HTTP status code (e.g., 400, 401, 500).
	pub fn with_http_status(mut self, status: u16) -> Self {
		self.http_status = Some(status);

		self
	}

	/// Adds the OAuth error code string returned by the provider.
	pub fn with_oauth_error(mut self, error: impl Into<String>) -> Self {
		self.oauth_error = Some(error.into());

		self
	}

	/// Adds the OAuth `error_description` field.
	pub fn with_error_description(mut self, description: impl Into<String>) -> Self {
		self.error_description = Some(description.into());

		self
	}

	/// Adds a body preview for providers that return non-JSON payloads.
	pub fn with_body_preview(mut self, body: impl Into<String>) -> Self {
		self.body_preview = Some(truncate_preview(body.into()));

		self
	}
}

/// Default strategy for v1 directories and RFC 6749/8628 providers.
///
/// Structured OAuth fields (`error`, `error_description`) win, then body text hints, then
/// the HTTP status code. Network failures are always transient.
#[derive(Debug, Default)]
pub struct DefaultProviderStrategy;
impl Display for DefaultProviderStrategy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("default-directory-strategy")
	}
}
impl ProviderStrategy for DefaultProviderStrategy {
	fn classify_token_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind {
		if ctx.network_error {
			return ProviderErrorKind::Transient;
		}

		if let Some(kind) =
			classify_oauth_error(ctx.oauth_error.as_deref(), ctx.error_description.as_deref())
		{
			return kind;
		}
		if let Some(kind) = classify_body(ctx.body_preview.as_deref()) {
			return kind;
		}

		classify_status(ctx.http_status)
	}
}

fn truncate_preview(body: String) -> String {
	if body.chars().count() <= ProviderErrorContext::BODY_PREVIEW_LIMIT {
		return body;
	}

	let mut buf = String::new();

	for (idx, ch) in body.chars().enumerate() {
		if idx >= ProviderErrorContext::BODY_PREVIEW_LIMIT {
			buf.push('…');

			break;
		}
		buf.push(ch);
	}

	buf
}

fn classify_oauth_error(
	oauth_error: Option<&str>,
	error_description: Option<&str>,
) -> Option<ProviderErrorKind> {
	oauth_error
		.and_then(match_exact_value)
		.or_else(|| error_description.and_then(match_exact_value))
		.or_else(|| classify_body(error_description))
}

fn match_exact_value(value: &str) -> Option<ProviderErrorKind> {
	let is = |candidates: &[&str]| candidates.iter().any(|c| value.eq_ignore_ascii_case(c));

	if is(&["authorization_pending"]) {
		Some(ProviderErrorKind::AuthorizationPending)
	} else if is(&["slow_down"]) {
		Some(ProviderErrorKind::SlowDown)
	} else if is(&["expired_token", "code_expired"]) {
		Some(ProviderErrorKind::Expired)
	} else if is(&["access_denied", "authorization_declined"]) {
		Some(ProviderErrorKind::AccessDenied)
	} else if is(&["invalid_client", "unauthorized_client"]) {
		Some(ProviderErrorKind::InvalidClient)
	} else if is(&["invalid_grant", "invalid_request", "invalid_resource", "invalid_scope"]) {
		Some(ProviderErrorKind::InvalidGrant)
	} else if is(&["temporarily_unavailable", "server_error"]) {
		Some(ProviderErrorKind::Transient)
	} else {
		None
	}
}

fn classify_body(body: Option<&str>) -> Option<ProviderErrorKind> {
	let body = body?;
	let lowered = body.to_ascii_lowercase();

	match lowered.as_str() {
		text if text.contains("authorization_pending") =>
			Some(ProviderErrorKind::AuthorizationPending),
		text if text.contains("expired_token") || text.contains("code_expired") =>
			Some(ProviderErrorKind::Expired),
		text if text.contains("access_denied") || text.contains("authorization_declined") =>
			Some(ProviderErrorKind::AccessDenied),
		text if text.contains("invalid_grant") => Some(ProviderErrorKind::InvalidGrant),
		text if text.contains("invalid_client") => Some(ProviderErrorKind::InvalidClient),
		text if text.contains("temporarily_unavailable") || text.contains("retry") =>
			Some(ProviderErrorKind::Transient),
		_ => None,
	}
}

fn classify_status(status: Option<u16>) -> ProviderErrorKind {
	match status {
		Some(400 | 404 | 410) => ProviderErrorKind::InvalidGrant,
		Some(401) => ProviderErrorKind::InvalidClient,
		Some(403) => ProviderErrorKind::AccessDenied,
		_ => ProviderErrorKind::Transient,
	}
}
