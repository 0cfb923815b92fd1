//! Crate-level error types shared across flows, the controller, and stores.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Boxed error used for callback and transport payloads.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Directory endpoints could not be resolved.
	#[error(transparent)]
	Directory(#[from] crate::directory::DirectoryError),
	/// Credential material is missing or unusable.
	#[error(transparent)]
	Credential(#[from] crate::credential::CredentialError),
	/// Local configuration or payload problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure; the host may retry with backoff.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Provider rejected the client credentials (secret, assertion, or client id).
	#[error("Provider rejected the client credentials: {reason}.")]
	InvalidCredential {
		/// Provider- or crate-supplied reason string.
		reason: String,
	},
	/// Provider rejected the grant (e.g., a revoked refresh token).
	#[error("Provider rejected the grant: {reason}.")]
	InvalidGrant {
		/// Provider- or crate-supplied reason string.
		reason: String,
	},
	/// The operator declined the sign-in or the provider refused access.
	#[error("Access was denied: {reason}.")]
	AccessDenied {
		/// Provider- or crate-supplied reason string.
		reason: String,
	},
	/// The device code or token expired before the flow completed.
	#[error("Authorization expired before completion: {reason}.")]
	Expired {
		/// Provider- or crate-supplied reason string.
		reason: String,
	},
	/// The caller cancelled the in-flight flow.
	#[error("Token acquisition was cancelled.")]
	Cancelled,
	/// A refreshed token would move the expiry backwards.
	#[error("Refreshed token expires at {refreshed}, before the current expiry {current}.")]
	ExpiryRegressed {
		/// Expiry of the token currently held.
		current: OffsetDateTime,
		/// Expiry of the rejected replacement.
		refreshed: OffsetDateTime,
	},
	/// A registered token callback failed; the new token is still held in memory.
	#[error("Token callback #{index} failed.")]
	CallbackFailed {
		/// Zero-based registration index of the failing callback.
		index: usize,
		/// Error returned by the callback.
		#[source]
		source: BoxError,
	},
}

/// Configuration and payload validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Token payload could not be turned into a [`crate::auth::Token`].
	#[error("Unable to build token.")]
	TokenBuild(#[from] crate::auth::TokenBuilderError),
	/// Client assertion could not be signed.
	#[error("Client assertion could not be signed.")]
	AssertionSigning {
		/// Underlying signing failure.
		#[source]
		source: BoxError,
	},
	/// Token endpoint response carried neither `expires_in` nor `expires_on`.
	#[error("Token endpoint response is missing expires_in and expires_on.")]
	MissingExpiry,
	/// Token endpoint returned an excessively large lifetime.
	#[error("The token lifetime exceeds the supported range.")]
	ExpiresInOutOfRange,
	/// Token endpoint returned a non-positive lifetime.
	#[error("The token lifetime must be positive.")]
	NonPositiveExpiresIn,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}

	/// Wraps a signing failure inside [`ConfigError`].
	pub fn assertion_signing(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::AssertionSigning { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Provider returned an unexpected but non-fatal response.
	#[error("Directory endpoint returned an unexpected response: {message}.")]
	Endpoint {
		/// Provider- or crate-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Endpoint responded with malformed JSON that could not be parsed.
	#[error("Directory endpoint returned malformed JSON.")]
	ResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the directory.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the directory.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
