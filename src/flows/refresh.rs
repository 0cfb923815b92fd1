//! Refresh grant: trades the held refresh token for a new access token.

// self
use crate::{
	_prelude::*,
	auth::Token,
	credential::Credential,
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
	/// Runs `grant_type=refresh_token` for `token`, authenticating as `credential`.
	///
	/// The prior refresh token is carried over when the response omits a new one.
	pub async fn refresh_token(
		&self,
		credential: &Credential,
		token: &Token,
		cancel: &CancellationToken,
	) -> Result<Token> {
		common::observed(FlowKind::Refresh, "refresh_token", async move {
			let refresh = token.refresh_secret().ok_or_else(|| Error::InvalidGrant {
				reason: "the held token carries no refresh token".into(),
			})?;
			let grant = GrantType::RefreshToken;
			let token_endpoint = &self.directory.token_endpoint;
			let mut form = common::token_form(grant, &token.resource);

			form.insert("refresh_token".into(), refresh.to_owned());
			credential.client_auth(token_endpoint, &mut form)?;

			common::cancellable(
				cancel,
				self.token_endpoint().request_token(
					token_endpoint,
					grant,
					form,
					&token.resource,
					Some(refresh),
				),
			)
			.await
		})
		.await
	}
}
