//! Credential flows executed against one directory tenant.

pub mod common;
pub mod device_code;

mod client_certificate;
mod client_secret;
mod refresh;

pub use device_code::*;

// self
use crate::{
	_prelude::*,
	directory::DirectoryConfig,
	http::{ReqwestHttpClient, TokenHttpClient},
	oauth::{ReqwestTransportErrorMapper, TokenEndpoint, TransportErrorMapper},
	provider::{DefaultProviderStrategy, ProviderStrategy},
};

/// Flow client specialized for the crate's default reqwest transport stack.
pub type ReqwestFlowClient = FlowClient<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Runs device-code, client-secret, client-certificate, and refresh grants for one tenant.
///
/// The client owns the transport, the error mapper, and the provider strategy, so each flow
/// only assembles its grant-specific form fields. It holds no token state; the
/// [`crate::principal::ServicePrincipalToken`] controller decides when a flow runs.
#[derive(Clone)]
pub struct FlowClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Endpoints of the tenant every grant targets.
	pub directory: DirectoryConfig,
	/// HTTP client wrapper used for every outbound directory request.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors before surfacing them to callers.
	pub transport_mapper: Arc<M>,
	/// Strategy that classifies token endpoint errors.
	pub strategy: Arc<dyn ProviderStrategy>,
	/// Receives the user code and verification URL during the device-code flow.
	pub device_code_prompt: Arc<dyn DeviceCodePrompt>,
}
impl<C, M> FlowClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a flow client that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		directory: DirectoryConfig,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			directory,
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			strategy: Arc::new(DefaultProviderStrategy),
			device_code_prompt: Arc::new(SilentPrompt),
		}
	}

	/// Replaces the error classification strategy.
	pub fn with_strategy(mut self, strategy: Arc<dyn ProviderStrategy>) -> Self {
		self.strategy = strategy;

		self
	}

	/// Replaces the device-code prompt.
	pub fn with_device_code_prompt(mut self, prompt: impl 'static + DeviceCodePrompt) -> Self {
		self.device_code_prompt = Arc::new(prompt);

		self
	}

	pub(crate) fn token_endpoint(&self) -> TokenEndpoint<'_, C, M> {
		TokenEndpoint {
			http_client: self.http_client.as_ref(),
			error_mapper: self.transport_mapper.as_ref(),
			strategy: self.strategy.as_ref(),
		}
	}
}
impl FlowClient<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a flow client backed by a default reqwest transport.
	pub fn new(directory: DirectoryConfig) -> Self {
		Self::with_http_client(
			directory,
			ReqwestHttpClient::default(),
			Arc::new(ReqwestTransportErrorMapper),
		)
	}
}
impl<C, M> Debug for FlowClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("FlowClient").field("directory", &self.directory).finish()
	}
}
