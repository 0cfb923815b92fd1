//! Immutable token value object, lifecycle helpers, and its builder.
//!
//! Instants are kept at whole-second precision so a token written to the cache and read
//! back compares equal to the one in memory.

// self
use crate::{_prelude::*, auth::token::secret::TokenSecret};

const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// Current lifecycle status for a token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStatus {
	/// Token is not yet valid because `not_before` is in the future.
	Pending,
	/// Token is currently valid.
	Active,
	/// Token reached its expiry instant.
	Expired,
}

/// Errors produced by [`TokenBuilder`] and token deserialization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum TokenBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when the access token is empty or whitespace.
	#[error("Access token cannot be empty.")]
	EmptyAccessToken,
	/// Issued when no expiry (absolute or relative) was configured.
	#[error("Expiry must be supplied via expires_on or expires_in.")]
	MissingExpiry,
	/// Issued when an instant cannot be represented.
	#[error("Token instant is out of the supported range.")]
	InstantOutOfRange,
}

/// Access/refresh token pair issued by the directory for one resource.
///
/// Tokens are replaced wholesale on refresh; nothing in the crate mutates a token that has
/// already been handed out.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TokenRepr", into = "TokenRepr")]
pub struct Token {
	/// Access token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Refresh token secret, if the provider issued one.
	pub refresh_token: Option<TokenSecret>,
	/// Expiry instant.
	pub expires_on: OffsetDateTime,
	/// Instant before which the token must not be used.
	pub not_before: OffsetDateTime,
	/// Resource the token was issued for.
	pub resource: String,
	/// Token type reported by the provider (normally `Bearer`).
	pub token_type: String,
}
impl Token {
	/// Returns a builder for assembling tokens from provider responses.
	pub fn builder(resource: impl Into<String>) -> TokenBuilder {
		TokenBuilder::new(resource.into())
	}

	/// Computes the lifecycle status at a given instant.
	pub fn status_at(&self, instant: OffsetDateTime) -> TokenStatus {
		if instant < self.not_before {
			return TokenStatus::Pending;
		}
		if instant >= self.expires_on {
			return TokenStatus::Expired;
		}

		TokenStatus::Active
	}

	/// Convenience helper that checks the status using the current UTC instant.
	pub fn status(&self) -> TokenStatus {
		self.status_at(OffsetDateTime::now_utc())
	}

	/// Returns `true` if the token has expired at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		matches!(self.status_at(instant), TokenStatus::Expired)
	}

	/// Returns `true` if the token is expired relative to the current clock.
	pub fn is_expired(&self) -> bool {
		self.is_expired_at(OffsetDateTime::now_utc())
	}

	/// Returns `true` once `instant` is within `skew` of the expiry.
	pub fn will_expire_within(&self, skew: Duration, instant: OffsetDateTime) -> bool {
		instant >= self.expires_on - skew
	}

	/// Returns the refresh token value, if any.
	pub fn refresh_secret(&self) -> Option<&str> {
		self.refresh_token.as_ref().map(TokenSecret::expose)
	}
}
impl Debug for Token {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Token")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("expires_on", &self.expires_on)
			.field("not_before", &self.not_before)
			.field("resource", &self.resource)
			.field("token_type", &self.token_type)
			.finish()
	}
}

/// On-disk shape of a [`Token`].
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenRepr {
	access_token: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	refresh_token: Option<String>,
	#[serde(with = "time::serde::timestamp")]
	expires_on: OffsetDateTime,
	#[serde(with = "time::serde::timestamp")]
	not_before: OffsetDateTime,
	resource: String,
	#[serde(default = "default_token_type")]
	token_type: String,
}
impl TryFrom<TokenRepr> for Token {
	type Error = TokenBuilderError;

	fn try_from(repr: TokenRepr) -> Result<Self, Self::Error> {
		let mut builder = Token::builder(repr.resource)
			.access_token(repr.access_token)
			.token_type(repr.token_type)
			.not_before(repr.not_before)
			.expires_on(repr.expires_on);

		if let Some(refresh) = repr.refresh_token {
			builder = builder.refresh_token(refresh);
		}

		builder.build()
	}
}
impl From<Token> for TokenRepr {
	fn from(token: Token) -> Self {
		Self {
			access_token: token.access_token.expose().to_owned(),
			refresh_token: token.refresh_token.map(|secret| secret.expose().to_owned()),
			expires_on: token.expires_on,
			not_before: token.not_before,
			resource: token.resource,
			token_type: token.token_type,
		}
	}
}

fn default_token_type() -> String {
	DEFAULT_TOKEN_TYPE.into()
}

/// Builder for [`Token`].
#[derive(Clone, Debug)]
pub struct TokenBuilder {
	resource: String,
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	token_type: Option<String>,
	issued_at: Option<OffsetDateTime>,
	not_before: Option<OffsetDateTime>,
	expires_on: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
}
impl TokenBuilder {
	fn new(resource: String) -> Self {
		Self {
			resource,
			access_token: None,
			refresh_token: None,
			token_type: None,
			issued_at: None,
			not_before: None,
			expires_on: None,
			expires_in: None,
		}
	}

	/// Sets the instant relative expiries are measured from (defaults to now).
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets the not-before instant (defaults to the issued instant).
	pub fn not_before(mut self, instant: OffsetDateTime) -> Self {
		self.not_before = Some(instant);

		self
	}

	/// Sets an absolute expiry instant; wins over [`TokenBuilder::expires_in`].
	pub fn expires_on(mut self, instant: OffsetDateTime) -> Self {
		self.expires_on = Some(instant);

		self
	}

	/// Sets a relative expiry duration from the issued instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Overrides the token type.
	pub fn token_type(mut self, token_type: impl Into<String>) -> Self {
		self.token_type = Some(token_type.into());

		self
	}

	/// Consumes the builder and produces a [`Token`].
	pub fn build(self) -> Result<Token, TokenBuilderError> {
		let access_token = self.access_token.ok_or(TokenBuilderError::MissingAccessToken)?;

		if access_token.is_blank() {
			return Err(TokenBuilderError::EmptyAccessToken);
		}

		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_on = match (self.expires_on, self.expires_in) {
			(Some(instant), _) => instant,
			(None, Some(delta)) => issued_at
				.checked_add(delta)
				.ok_or(TokenBuilderError::InstantOutOfRange)?,
			(None, None) => return Err(TokenBuilderError::MissingExpiry),
		};
		let not_before = self.not_before.unwrap_or(issued_at);

		Ok(Token {
			access_token,
			refresh_token: self.refresh_token.filter(|secret| !secret.is_blank()),
			expires_on: whole_seconds(expires_on)?,
			not_before: whole_seconds(not_before)?,
			resource: self.resource,
			token_type: self
				.token_type
				.filter(|value| !value.trim().is_empty())
				.unwrap_or_else(default_token_type),
		})
	}
}

fn whole_seconds(instant: OffsetDateTime) -> Result<OffsetDateTime, TokenBuilderError> {
	OffsetDateTime::from_unix_timestamp(instant.unix_timestamp())
		.map_err(|_| TokenBuilderError::InstantOutOfRange)
}
