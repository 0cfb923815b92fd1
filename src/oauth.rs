//! Token endpoint facade: form encoding, response decoding, and error mapping.
//!
//! Directory v1 endpoints encode numeric fields (`expires_in`, `expires_on`, `interval`)
//! either as JSON numbers or as strings, so responses are decoded with lenient DTOs instead
//! of the `oauth2` crate's typed responses. The `oauth2` crate still provides the transport
//! contract ([`AsyncHttpClient`]) that every request goes through.

pub use oauth2;

// crates.io
use oauth2::{
	AsyncHttpClient, HttpClientError, HttpRequest,
	http::{Method, Request, header},
};
use serde::{Deserializer, de::Error as DeError};
// self
use crate::{
	_prelude::*,
	auth::Token,
	error::{ConfigError, TransientError, TransportError},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	provider::{GrantType, ProviderErrorContext, ProviderErrorKind, ProviderStrategy},
};

/// Maps HTTP transport failures into crate [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a crate error.
	fn map_transport_error(
		&self,
		strategy: &dyn ProviderStrategy,
		grant: GrantType,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		strategy: &dyn ProviderStrategy,
		grant: GrantType,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(strategy, grant, meta, *inner),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			HttpClientError::Other(message) =>
				TransportError::Io(std::io::Error::other(message)).into(),
			_ => TransportError::Io(std::io::Error::other("unknown HTTP client failure")).into(),
		}
	}
}

fn map_reqwest_error(
	strategy: &dyn ProviderStrategy,
	grant: GrantType,
	meta: Option<&ResponseMetadata>,
	err: ReqwestError,
) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}

	// Headers arrived but the body did not; the directory answered, so let the strategy decide.
	if let Some(status) = meta.and_then(|value| value.status) {
		let ctx = ProviderErrorContext::network_failure(grant).with_http_status(status);

		if strategy.classify_token_error(&ctx) == ProviderErrorKind::Transient {
			return TransientError::Endpoint {
				message: format!("response body from the directory was cut short: {err}"),
				status: Some(status),
				retry_after: meta.and_then(|value| value.retry_after),
			}
			.into();
		}
	}

	TransportError::from(err).into()
}

/// Outcome of a single token endpoint round trip.
#[derive(Debug)]
pub(crate) enum Exchange<T> {
	/// 2xx response decoded into `T`.
	Granted(T),
	/// Provider answered with an OAuth error payload or a non-success status.
	Rejected(Rejection),
}

/// Classified provider rejection.
#[derive(Clone, Debug)]
pub(crate) struct Rejection {
	pub(crate) kind: ProviderErrorKind,
	pub(crate) message: String,
	pub(crate) status: Option<u16>,
	pub(crate) retry_after: Option<Duration>,
}
impl Rejection {
	/// Converts the rejection into the crate error surfaced to callers.
	pub(crate) fn into_error(self) -> Error {
		let reason = self.message;

		match self.kind {
			ProviderErrorKind::InvalidClient => Error::InvalidCredential { reason },
			ProviderErrorKind::InvalidGrant => Error::InvalidGrant { reason },
			ProviderErrorKind::AccessDenied => Error::AccessDenied { reason },
			ProviderErrorKind::Expired => Error::Expired { reason },
			ProviderErrorKind::AuthorizationPending
			| ProviderErrorKind::SlowDown
			| ProviderErrorKind::Transient => TransientError::Endpoint {
				message: reason,
				status: self.status,
				retry_after: self.retry_after,
			}
			.into(),
		}
	}
}

/// Borrowed view over the transport pieces needed for one request.
pub(crate) struct TokenEndpoint<'a, C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) http_client: &'a C,
	pub(crate) error_mapper: &'a M,
	pub(crate) strategy: &'a dyn ProviderStrategy,
}
impl<C, M> TokenEndpoint<'_, C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// POSTs `form` to `url` and decodes a success body into `T`.
	pub(crate) async fn exchange<T>(
		&self,
		url: &Url,
		grant: GrantType,
		mut form: BTreeMap<String, String>,
	) -> Result<Exchange<T>>
	where
		T: for<'de> Deserialize<'de>,
	{
		self.strategy.augment_token_request(grant, &mut form);

		let meta = ResponseMetadataSlot::default();
		let handle = self.http_client.with_metadata(meta.clone());
		let request = build_form_request(url, &form)?;
		let response = handle.call(request).await.map_err(|err| {
			self.error_mapper.map_transport_error(self.strategy, grant, meta.take().as_ref(), err)
		})?;
		let status = response.status();
		let meta = meta.take();
		let retry_after = meta.as_ref().and_then(|value| value.retry_after);

		if status.is_success() {
			return decode_json(response.body(), Some(status.as_u16())).map(Exchange::Granted);
		}

		Ok(Exchange::Rejected(self.classify(grant, status.as_u16(), retry_after, response.body())))
	}

	/// Runs a token-issuing grant and maps rejections into errors.
	pub(crate) async fn request_token(
		&self,
		url: &Url,
		grant: GrantType,
		form: BTreeMap<String, String>,
		resource: &str,
		fallback_refresh: Option<&str>,
	) -> Result<Token> {
		let issued_at = OffsetDateTime::now_utc();

		match self.exchange::<TokenResponse>(url, grant, form).await? {
			Exchange::Granted(response) => response.into_token(resource, issued_at, fallback_refresh),
			Exchange::Rejected(rejection) => Err(rejection.into_error()),
		}
	}

	fn classify(
		&self,
		grant: GrantType,
		status: u16,
		retry_after: Option<Duration>,
		body: &[u8],
	) -> Rejection {
		let mut ctx = ProviderErrorContext::new(grant).with_http_status(status);
		let message = match serde_json::from_slice::<ErrorResponse>(body) {
			Ok(payload) => {
				ctx = ctx.with_oauth_error(payload.error.clone());

				if let Some(description) = payload.error_description.as_ref() {
					ctx = ctx.with_error_description(description.clone());
				}

				payload.error_description.unwrap_or(payload.error)
			},
			Err(_) => {
				let text = String::from_utf8_lossy(body).into_owned();

				ctx = ctx.with_body_preview(text);

				format!("HTTP status {status}")
			},
		};

		Rejection {
			kind: self.strategy.classify_token_error(&ctx),
			message: first_line(&message),
			status: Some(status),
			retry_after,
		}
	}
}

/// Token endpoint success body.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
	access_token: String,
	#[serde(default)]
	token_type: Option<String>,
	#[serde(default)]
	refresh_token: Option<String>,
	#[serde(default)]
	resource: Option<String>,
	#[serde(default, deserialize_with = "lenient_seconds")]
	expires_in: Option<i64>,
	#[serde(default, deserialize_with = "lenient_seconds")]
	expires_on: Option<i64>,
	#[serde(default, deserialize_with = "lenient_seconds")]
	not_before: Option<i64>,
}
impl TokenResponse {
	/// Builds a [`Token`]; `fallback_refresh` is kept when the response omits one.
	pub(crate) fn into_token(
		self,
		requested_resource: &str,
		issued_at: OffsetDateTime,
		fallback_refresh: Option<&str>,
	) -> Result<Token> {
		let resource = self
			.resource
			.filter(|value| !value.trim().is_empty())
			.unwrap_or_else(|| requested_resource.to_owned());
		let mut builder =
			Token::builder(resource).access_token(self.access_token).issued_at(issued_at);

		builder = match (self.expires_on, self.expires_in) {
			(Some(absolute), _) => builder.expires_on(
				OffsetDateTime::from_unix_timestamp(absolute)
					.map_err(|_| ConfigError::ExpiresInOutOfRange)?,
			),
			(None, Some(relative)) if relative <= 0 =>
				return Err(ConfigError::NonPositiveExpiresIn.into()),
			(None, Some(relative)) => builder.expires_in(Duration::seconds(relative)),
			(None, None) => return Err(ConfigError::MissingExpiry.into()),
		};

		if let Some(not_before) = self.not_before {
			builder = builder.not_before(
				OffsetDateTime::from_unix_timestamp(not_before)
					.map_err(|_| ConfigError::ExpiresInOutOfRange)?,
			);
		}
		if let Some(token_type) = self.token_type {
			builder = builder.token_type(token_type);
		}
		if let Some(refresh) =
			self.refresh_token.filter(|value| !value.trim().is_empty()).or_else(|| fallback_refresh.map(str::to_owned))
		{
			builder = builder.refresh_token(refresh);
		}

		builder.build().map_err(|err| ConfigError::from(err).into())
	}
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
	error: String,
	#[serde(default)]
	error_description: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
	Number(i64),
	Text(String),
}

/// Accepts integer seconds encoded as a JSON number or a numeric string.
pub(crate) fn lenient_seconds<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
	D: Deserializer<'de>,
{
	match Option::<NumberOrText>::deserialize(deserializer)? {
		None => Ok(None),
		Some(NumberOrText::Number(value)) => Ok(Some(value)),
		Some(NumberOrText::Text(text)) => text
			.trim()
			.parse()
			.map(Some)
			.map_err(|_| D::Error::custom(format!("expected integer seconds, found `{text}`"))),
	}
}

/// Decodes a JSON body with path-aware errors.
pub(crate) fn decode_json<T>(body: &[u8], status: Option<u16>) -> Result<T>
where
	T: for<'de> Deserialize<'de>,
{
	let mut deserializer = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| TransientError::ResponseParse { source, status }.into())
}

fn build_form_request(url: &Url, form: &BTreeMap<String, String>) -> Result<HttpRequest> {
	let body = url::form_urlencoded::Serializer::new(String::new()).extend_pairs(form.iter()).finish();
	let request = Request::builder()
		.method(Method::POST)
		.uri(url.as_str())
		.header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
		.header(header::ACCEPT, "application/json")
		.body(body.into_bytes())
		.map_err(ConfigError::from)?;

	Ok(request)
}

fn first_line(message: &str) -> String {
	message.lines().next().unwrap_or_default().trim().trim_end_matches('.').to_owned()
}
