//! Client-certificate flow: `grant_type=client_credentials` with a signed JWT assertion.

// self
use crate::{
	_prelude::*,
	auth::{ResourceId, Token},
	credential::ClientCertificateCredential,
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
	/// Authenticates with a certificate-signed assertion whose audience is the token endpoint.
	pub async fn client_certificate(
		&self,
		credential: &ClientCertificateCredential,
		resource: &ResourceId,
		cancel: &CancellationToken,
	) -> Result<Token> {
		common::observed(FlowKind::ClientCertificate, "client_certificate", async move {
			let grant = GrantType::ClientCredentials;
			let token_endpoint = &self.directory.token_endpoint;
			let mut form = common::token_form(grant, resource);

			credential.client_auth(token_endpoint, &mut form)?;

			common::cancellable(
				cancel,
				self.token_endpoint().request_token(token_endpoint, grant, form, resource, None),
			)
			.await
		})
		.await
	}
}
