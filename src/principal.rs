//! Token lifecycle controller for one service principal and one resource.
//!
//! [`ServicePrincipalToken`] owns the current [`Token`], decides between the refresh grant
//! and a full credential flow, and notifies registered [`TokenCallback`]s after every new
//! token. Refreshes are single-flight: concurrent callers wait on one async guard, and
//! readers never observe a token and state from different refreshes.

pub mod callback;

mod metrics;

pub use callback::*;
pub use metrics::{RefreshMetrics, RefreshMetricsSnapshot, RefreshPath};

// self
use crate::{
	_prelude::*,
	auth::{ResourceId, Token},
	credential::Credential,
	flows::FlowClient,
	http::{ReqwestHttpClient, TokenHttpClient},
	oauth::{ReqwestTransportErrorMapper, TransportErrorMapper},
};

/// Margin before expiry inside which [`ServicePrincipalToken::ensure_fresh`] refreshes.
pub const DEFAULT_REFRESH_SKEW: Duration = Duration::minutes(5);

/// Lifecycle state of the held token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenState {
	/// No token has been acquired yet.
	Uninitialized,
	/// First acquisition is in flight.
	Acquiring,
	/// A token is held and the last refresh succeeded.
	Valid,
	/// A refresh of an existing token is in flight.
	Refreshing,
	/// The last refresh failed; any held token is stale.
	Invalid,
}

#[derive(Debug)]
struct TokenSlot {
	token: Option<Token>,
	state: TokenState,
}

/// Acquires, refreshes, and publishes tokens for one credential and resource.
pub struct ServicePrincipalToken<C = ReqwestHttpClient, M = ReqwestTransportErrorMapper>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	client: FlowClient<C, M>,
	credential: Credential,
	resource: ResourceId,
	refresh_skew: Duration,
	cancellation: CancellationToken,
	slot: RwLock<TokenSlot>,
	callbacks: RwLock<Vec<Arc<dyn TokenCallback>>>,
	refresh_guard: AsyncMutex<()>,
	/// Counters for refresh attempts and outcomes.
	pub refresh_metrics: Arc<RefreshMetrics>,
}
impl<C, M> ServicePrincipalToken<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates an uninitialized controller; no request is sent until the first refresh.
	pub fn new(client: FlowClient<C, M>, credential: Credential, resource: ResourceId) -> Self {
		Self {
			client,
			credential,
			resource,
			refresh_skew: DEFAULT_REFRESH_SKEW,
			cancellation: CancellationToken::new(),
			slot: RwLock::new(TokenSlot { token: None, state: TokenState::Uninitialized }),
			callbacks: RwLock::new(Vec::new()),
			refresh_guard: AsyncMutex::new(()),
			refresh_metrics: Default::default(),
		}
	}

	/// Seeds the controller with a previously persisted token.
	pub fn with_token(self, token: Token) -> Self {
		*self.slot.write() = TokenSlot { token: Some(token), state: TokenState::Valid };

		self
	}

	/// Overrides the pre-expiry refresh margin (negative values clamp to zero).
	pub fn with_refresh_skew(mut self, skew: Duration) -> Self {
		self.refresh_skew = if skew.is_negative() { Duration::ZERO } else { skew };

		self
	}

	/// Uses `cancellation` to abort flows started by [`Self::refresh`] and
	/// [`Self::ensure_fresh`].
	///
	/// Cancellation is sticky: once the token fires, every later call through those methods
	/// returns [`Error::Cancelled`] without sending a request. Use [`Self::refresh_with`] or
	/// [`Self::ensure_fresh_with`] to scope cancellation to a single call.
	pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
		self.cancellation = cancellation;

		self
	}

	/// Appends a callback at construction time.
	pub fn with_callback(self, callback: impl 'static + TokenCallback) -> Self {
		self.callbacks.write().push(Arc::new(callback));

		self
	}

	/// Appends several callbacks at construction time, preserving their order.
	pub fn with_callbacks(self, callbacks: impl IntoIterator<Item = Arc<dyn TokenCallback>>) -> Self {
		self.callbacks.write().extend(callbacks);

		self
	}

	/// Appends a callback after construction; it runs after the ones already registered.
	pub fn register_callback(&self, callback: impl 'static + TokenCallback) {
		self.callbacks.write().push(Arc::new(callback));
	}

	/// Credential the controller authenticates with.
	pub fn credential(&self) -> &Credential {
		&self.credential
	}

	/// Resource tokens are requested for.
	pub fn resource(&self) -> &ResourceId {
		&self.resource
	}

	/// Pre-expiry refresh margin.
	pub fn refresh_skew(&self) -> Duration {
		self.refresh_skew
	}

	/// Cancellation token observed by [`Self::refresh`] and [`Self::ensure_fresh`].
	pub fn cancellation(&self) -> &CancellationToken {
		&self.cancellation
	}

	/// Current lifecycle state.
	pub fn state(&self) -> TokenState {
		self.slot.read().state
	}

	/// Snapshot of the held token, if any.
	pub fn current_token(&self) -> Option<Token> {
		self.slot.read().token.clone()
	}

	/// Returns `true` when a token is held but the refresh that should have replaced it failed.
	pub fn is_stale(&self) -> bool {
		let slot = self.slot.read();

		slot.state == TokenState::Invalid && slot.token.is_some()
	}

	/// Obtains a new token unconditionally.
	///
	/// Uses the refresh grant when the held token carries a refresh token, otherwise runs the
	/// credential's flow. On failure the previous token stays available and the controller
	/// reports [`TokenState::Invalid`].
	pub async fn refresh(&self) -> Result<Token> {
		self.refresh_with(&self.cancellation).await
	}

	/// [`Self::refresh`] observing `cancel` instead of the controller's token.
	pub async fn refresh_with(&self, cancel: &CancellationToken) -> Result<Token> {
		let _singleflight = self.refresh_guard.lock().await;

		self.refresh_locked(cancel).await
	}

	/// Returns the held token, refreshing first when it is missing, stale, or within the skew
	/// of its expiry.
	pub async fn ensure_fresh(&self) -> Result<Token> {
		self.ensure_fresh_with(&self.cancellation).await
	}

	/// [`Self::ensure_fresh`] observing `cancel` instead of the controller's token.
	pub async fn ensure_fresh_with(&self, cancel: &CancellationToken) -> Result<Token> {
		let _singleflight = self.refresh_guard.lock().await;

		if let Some(token) = self.fresh_token(OffsetDateTime::now_utc()) {
			return Ok(token);
		}

		self.refresh_locked(cancel).await
	}

	fn fresh_token(&self, now: OffsetDateTime) -> Option<Token> {
		let slot = self.slot.read();

		if slot.state != TokenState::Valid {
			return None;
		}

		slot.token.as_ref().filter(|token| !token.will_expire_within(self.refresh_skew, now)).cloned()
	}

	async fn refresh_locked(&self, cancel: &CancellationToken) -> Result<Token> {
		let current = {
			let mut slot = self.slot.write();

			slot.state = if slot.token.is_some() {
				TokenState::Refreshing
			} else {
				TokenState::Acquiring
			};

			slot.token.clone()
		};

		self.refresh_metrics.record_attempt();

		let token = match self.obtain(current.as_ref(), cancel).await {
			Ok(token) => token,
			Err(err) => return Err(self.fail(err)),
		};

		if let Some(current) = current.as_ref() {
			if token.expires_on < current.expires_on {
				return Err(self.fail(Error::ExpiryRegressed {
					current: current.expires_on,
					refreshed: token.expires_on,
				}));
			}
		}

		*self.slot.write() = TokenSlot { token: Some(token.clone()), state: TokenState::Valid };

		self.refresh_metrics.record_success();

		#[cfg(feature = "tracing")]
		tracing::debug!(resource = %self.resource, expires_on = %token.expires_on, "Token refreshed.");

		self.notify(&token)?;

		Ok(token)
	}

	async fn obtain(&self, current: Option<&Token>, cancel: &CancellationToken) -> Result<Token> {
		let Some(current) = current.filter(|token| token.refresh_token.is_some()) else {
			return self.run_credential_flow(cancel).await;
		};

		self.refresh_metrics.record_path(RefreshPath::RefreshGrant);

		match self.client.refresh_token(&self.credential, current, cancel).await {
			// A rejected refresh token is recoverable without the operator for
			// non-interactive credentials.
			Err(Error::InvalidGrant { .. })
				if !matches!(self.credential, Credential::DeviceCode(_)) =>
				self.run_credential_flow(cancel).await,
			result => result,
		}
	}

	async fn run_credential_flow(&self, cancel: &CancellationToken) -> Result<Token> {
		self.refresh_metrics.record_path(RefreshPath::CredentialFlow);

		self.credential.acquire(&self.client, &self.resource, cancel).await
	}

	fn fail(&self, err: Error) -> Error {
		self.slot.write().state = TokenState::Invalid;
		self.refresh_metrics.record_failure();

		#[cfg(feature = "tracing")]
		tracing::warn!(resource = %self.resource, error = %err, "Token refresh failed.");

		err
	}

	fn notify(&self, token: &Token) -> Result<()> {
		let callbacks = self.callbacks.read().clone();

		for (index, callback) in callbacks.iter().enumerate() {
			callback.on_token(token).map_err(|source| {
				self.refresh_metrics.record_callback_failure();

				Error::CallbackFailed { index, source }
			})?;
		}

		Ok(())
	}
}
impl<C, M> Debug for ServicePrincipalToken<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let slot = self.slot.read();

		f.debug_struct("ServicePrincipalToken")
			.field("mode", &self.credential.mode())
			.field("resource", &self.resource)
			.field("state", &slot.state)
			.field("token", &slot.token)
			.field("callbacks", &self.callbacks.read().len())
			.finish()
	}
}
