//! Directory endpoint resolution from an authority URL and a tenant.
//!
//! Endpoints follow the v1 layout `{authority}/{tenant}/oauth2/{operation}?api-version=1.0`.
//! Resolution is pure; nothing here touches the network.

// self
use crate::{
	_prelude::*,
	auth::{IdentifierError, TenantId},
};

/// Authority used by the public cloud directory.
pub const PUBLIC_CLOUD_AUTHORITY: &str = "https://login.microsoftonline.com/";

const API_VERSION: &str = "1.0";

/// Errors raised while resolving a [`DirectoryConfig`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum DirectoryError {
	/// Tenant identifier is empty or malformed.
	#[error("Tenant identifier is invalid.")]
	InvalidTenant(#[source] IdentifierError),
	/// Authority URL cannot be parsed.
	#[error("Authority URL `{authority}` is invalid.")]
	InvalidAuthority {
		/// Authority as supplied by the caller.
		authority: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Authority URL parsed but cannot act as a base for endpoint paths.
	#[error("Authority URL `{authority}` must be an absolute http(s) URL with a host.")]
	UnsupportedAuthority {
		/// Authority as supplied by the caller.
		authority: String,
	},
}

/// Immutable endpoint set for one directory tenant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryConfig {
	/// Tenant the endpoints are scoped to.
	pub tenant: TenantId,
	/// Interactive authorization endpoint.
	pub authorize_endpoint: Url,
	/// Token endpoint used for every grant.
	pub token_endpoint: Url,
	/// Device authorization endpoint used by the device-code flow.
	pub device_code_endpoint: Url,
}
impl DirectoryConfig {
	/// Resolves the endpoint set for `tenant` under `authority`.
	pub fn new(authority: impl AsRef<str>, tenant: impl AsRef<str>) -> Result<Self, DirectoryError> {
		let tenant = TenantId::new(tenant.as_ref().trim()).map_err(DirectoryError::InvalidTenant)?;

		if !is_path_segment(&tenant) {
			return Err(DirectoryError::InvalidTenant(IdentifierError::NotPathSegment {
				kind: "Tenant",
			}));
		}

		let authority = authority.as_ref().trim();
		let mut base = Url::parse(authority).map_err(|source| DirectoryError::InvalidAuthority {
			authority: authority.to_owned(),
			source,
		})?;

		if !matches!(base.scheme(), "http" | "https") || !base.has_host() {
			return Err(DirectoryError::UnsupportedAuthority { authority: authority.to_owned() });
		}

		base.set_query(None);
		base.set_fragment(None);

		let endpoint = |operation: &str| -> Result<Url, DirectoryError> {
			let mut url = base.clone();

			url.path_segments_mut()
				.map_err(|_| DirectoryError::UnsupportedAuthority { authority: authority.to_owned() })?
				.pop_if_empty()
				.extend([&*tenant, "oauth2", operation]);
			url.query_pairs_mut().append_pair("api-version", API_VERSION);

			if url.scheme() != base.scheme() || url.host_str() != base.host_str() {
				return Err(DirectoryError::InvalidTenant(IdentifierError::NotPathSegment {
					kind: "Tenant",
				}));
			}

			Ok(url)
		};

		Ok(Self {
			authorize_endpoint: endpoint("authorize")?,
			token_endpoint: endpoint("token")?,
			device_code_endpoint: endpoint("devicecode")?,
			tenant,
		})
	}

	/// Resolves the endpoint set for `tenant` under the public cloud authority.
	pub fn public_cloud(tenant: impl AsRef<str>) -> Result<Self, DirectoryError> {
		Self::new(PUBLIC_CLOUD_AUTHORITY, tenant)
	}
}

fn is_path_segment(tenant: &str) -> bool {
	!matches!(tenant, "." | "..")
		&& !tenant.contains(['/', '\\', '?', '#', ':', '%', '@'])
}
