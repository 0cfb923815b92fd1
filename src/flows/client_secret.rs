//! Client-secret flow: `grant_type=client_credentials` authenticated with a shared secret.

// self
use crate::{
	_prelude::*,
	auth::{ResourceId, Token},
	credential::ClientSecretCredential,
	flows::{FlowClient, common},
	http::TokenHttpClient,
	oauth::TransportErrorMapper,
	obs::FlowKind,
	provider::GrantType,
};

impl<C, M> FlowClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Exchanges the application secret for a token scoped to `resource`.
	pub async fn client_secret(
		&self,
		credential: &ClientSecretCredential,
		resource: &ResourceId,
		cancel: &CancellationToken,
	) -> Result<Token> {
		common::observed(FlowKind::ClientSecret, "client_secret", async move {
			let grant = GrantType::ClientCredentials;
			let mut form = common::token_form(grant, resource);

			credential.client_auth(&mut form);

			common::cancellable(
				cancel,
				self.token_endpoint().request_token(
					&self.directory.token_endpoint,
					grant,
					form,
					resource,
					None,
				),
			)
			.await
		})
		.await
	}
}
