//! Device-code flow: request a user code, show it, then poll until the operator signs in.
//!
//! Polling waits one interval before every attempt, adds five seconds after `slow_down`, and
//! gives up without another request once the next wait would run past the code's expiry.
//! Cancellation interrupts both the wait and an in-flight request.

// std
use std::time::Duration as StdDuration;
// crates.io
use tokio::time::{self, Instant};
// self
use crate::{
	_prelude::*,
	auth::{ResourceId, Token, TokenSecret},
	credential::DeviceCodeCredential,
	error::ConfigError,
	flows::{FlowClient, common},
	http::TokenHttpClient,
	oauth::{self, Exchange, TokenResponse, TransportErrorMapper},
	obs::FlowKind,
	provider::{GrantType, ProviderErrorKind},
};

const DEFAULT_POLL_INTERVAL: StdDuration = StdDuration::from_secs(5);
const SLOW_DOWN_INCREMENT: StdDuration = StdDuration::from_secs(5);
// Longer lifetimes are clamped so deadline arithmetic cannot overflow.
const MAX_DEVICE_CODE_LIFETIME: StdDuration = StdDuration::from_secs(24 * 60 * 60);

/// Receives the device-code session so the host can show it to the operator.
pub trait DeviceCodePrompt: Send + Sync {
	/// Called once per flow, before polling starts.
	fn on_device_code(&self, session: &DeviceCodeSession);
}
impl<F> DeviceCodePrompt for F
where
	F: Fn(&DeviceCodeSession) + Send + Sync,
{
	fn on_device_code(&self, session: &DeviceCodeSession) {
		self(session)
	}
}

/// Prompt that shows nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct SilentPrompt;
impl DeviceCodePrompt for SilentPrompt {
	fn on_device_code(&self, _: &DeviceCodeSession) {}
}

/// Device authorization issued by the directory.
#[derive(Clone, Debug)]
pub struct DeviceCodeSession {
	/// Code the operator types at the verification URL.
	pub user_code: String,
	/// Page the operator visits.
	pub verification_url: String,
	/// Human-readable instruction returned by the directory (or a synthesized one).
	pub message: String,
	/// Lifetime of the device code.
	pub expires_in: StdDuration,
	/// Wait between polls requested by the directory.
	pub interval: StdDuration,
	/// Instant the session was issued.
	pub issued_at: OffsetDateTime,
	device_code: TokenSecret,
}
impl DeviceCodeSession {
	/// Instant after which the device code is no longer honored.
	pub fn expires_at(&self) -> OffsetDateTime {
		self.issued_at + self.expires_in
	}

	/// Opaque code exchanged while polling.
	pub fn device_code(&self) -> &str {
		self.device_code.expose()
	}
}

#[derive(Debug, Deserialize)]
struct DeviceCodeResponse {
	device_code: String,
	user_code: String,
	#[serde(alias = "verification_uri")]
	verification_url: String,
	#[serde(default, deserialize_with = "oauth::lenient_seconds")]
	expires_in: Option<i64>,
	#[serde(default, deserialize_with = "oauth::lenient_seconds")]
	interval: Option<i64>,
	#[serde(default)]
	message: Option<String>,
}
impl DeviceCodeResponse {
	fn into_session(self, issued_at: OffsetDateTime) -> Result<DeviceCodeSession> {
		let expires_in = match self.expires_in {
			Some(seconds) if seconds > 0 =>
				StdDuration::from_secs(seconds.unsigned_abs()).min(MAX_DEVICE_CODE_LIFETIME),
			Some(_) => return Err(ConfigError::NonPositiveExpiresIn.into()),
			None => return Err(ConfigError::MissingExpiry.into()),
		};
		let interval = self
			.interval
			.filter(|seconds| *seconds > 0)
			.map(|seconds| {
				StdDuration::from_secs(seconds.unsigned_abs()).min(MAX_DEVICE_CODE_LIFETIME)
			})
			.unwrap_or(DEFAULT_POLL_INTERVAL);
		let message = self.message.filter(|value| !value.trim().is_empty()).unwrap_or_else(|| {
			format!(
				"To sign in, use a web browser to open the page {} and enter the code {} to authenticate.",
				self.verification_url, self.user_code
			)
		});

		Ok(DeviceCodeSession {
			user_code: self.user_code,
			verification_url: self.verification_url,
			message,
			expires_in,
			interval,
			issued_at,
			device_code: TokenSecret::new(self.device_code),
		})
	}
}

impl<C, M> FlowClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Runs the full device-code flow: request, prompt, poll.
	pub async fn device_code(
		&self,
		credential: &DeviceCodeCredential,
		resource: &ResourceId,
		cancel: &CancellationToken,
	) -> Result<Token> {
		common::observed(FlowKind::DeviceCode, "device_code", async move {
			let session = self.request_device_code(credential, resource, cancel).await?;

			self.device_code_prompt.on_device_code(&session);

			self.poll_device_code(credential, resource, &session, cancel).await
		})
		.await
	}

	/// Requests a user code and verification URL from the device authorization endpoint.
	pub async fn request_device_code(
		&self,
		credential: &DeviceCodeCredential,
		resource: &ResourceId,
		cancel: &CancellationToken,
	) -> Result<DeviceCodeSession> {
		let form = BTreeMap::from([
			("client_id".to_owned(), credential.application_id().to_string()),
			("resource".to_owned(), resource.to_string()),
		]);
		let issued_at = OffsetDateTime::now_utc();
		let exchange = common::cancellable(
			cancel,
			self.token_endpoint().exchange::<DeviceCodeResponse>(
				&self.directory.device_code_endpoint,
				GrantType::DeviceCode,
				form,
			),
		)
		.await?;

		match exchange {
			Exchange::Granted(response) => response.into_session(issued_at),
			Exchange::Rejected(rejection) => Err(rejection.into_error()),
		}
	}

	/// Polls the token endpoint until the session is approved, declined, expired, or cancelled.
	pub async fn poll_device_code(
		&self,
		credential: &DeviceCodeCredential,
		resource: &ResourceId,
		session: &DeviceCodeSession,
		cancel: &CancellationToken,
	) -> Result<Token> {
		let grant = GrantType::DeviceCode;
		let deadline = Instant::now().checked_add(session.expires_in.min(MAX_DEVICE_CODE_LIFETIME));
		let mut interval = session.interval;
		let mut form = common::token_form(grant, resource);

		form.insert("client_id".into(), credential.application_id().to_string());
		form.insert("code".into(), session.device_code().to_owned());

		loop {
			let next_poll = Instant::now().checked_add(interval);

			if deadline.zip(next_poll).is_none_or(|(deadline, next_poll)| next_poll > deadline) {
				return Err(Error::Expired {
					reason: "the device code expired before sign-in completed".into(),
				});
			}

			common::cancellable(cancel, async {
				time::sleep(interval).await;

				Ok(())
			})
			.await?;

			let issued_at = OffsetDateTime::now_utc();
			let exchange = common::cancellable(
				cancel,
				self.token_endpoint().exchange::<TokenResponse>(
					&self.directory.token_endpoint,
					grant,
					form.clone(),
				),
			)
			.await?;
			let rejection = match exchange {
				Exchange::Granted(response) => return response.into_token(resource, issued_at, None),
				Exchange::Rejected(rejection) => rejection,
			};

			match rejection.kind {
				ProviderErrorKind::AuthorizationPending => {},
				ProviderErrorKind::SlowDown => {
					interval += SLOW_DOWN_INCREMENT;

					#[cfg(feature = "tracing")]
					tracing::debug!(interval_secs = interval.as_secs(), "Device-code polling slowed down.");
				},
				_ => return Err(rejection.into_error()),
			}
		}
	}
}
