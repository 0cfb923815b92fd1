//! Credential variants and the flow each one selects.
//!
//! [`Credential`] is a closed set: device code, client secret, or client certificate. Every
//! constructor validates its mandatory fields up front, so a credential that exists is always
//! usable by its flow without further checks.

pub mod certificate;

pub use certificate::{CLIENT_ASSERTION_TYPE, CertificateKey};

// self
use crate::{
	_prelude::*,
	auth::{ApplicationId, ResourceId, Token, TokenSecret},
	flows::FlowClient,
	http::TokenHttpClient,
	oauth::TransportErrorMapper,
	obs::FlowKind,
};

/// Errors raised while building a [`Credential`].
#[derive(Debug, ThisError)]
pub enum CredentialError {
	/// A mandatory field is missing, blank, or malformed.
	#[error("Authentication mode `{mode}` requires a valid `{field}`: {reason}.")]
	InvalidCredential {
		/// Authentication mode being configured.
		mode: AuthMode,
		/// Offending field.
		field: &'static str,
		/// Why the value was rejected.
		reason: String,
	},
	/// Certificate file is missing or cannot be decoded.
	#[error("Certificate `{}` cannot be loaded: {reason}.", path.display())]
	CertificateUnreadable {
		/// Path that was read.
		path: PathBuf,
		/// Loader failure description.
		reason: String,
	},
}

/// Error returned when parsing an unknown [`AuthMode`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Unknown authentication mode `{0}`; expected one of device, secret, cert.")]
pub struct UnknownAuthMode(String);

/// Authentication mode selector used by hosts and error messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AuthMode {
	/// Interactive device-code flow.
	Device,
	/// Client-secret flow.
	Secret,
	/// Client-certificate flow.
	Cert,
}
impl AuthMode {
	/// Stable lowercase label.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Device => "device",
			Self::Secret => "secret",
			Self::Cert => "cert",
		}
	}
}
impl Display for AuthMode {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for AuthMode {
	type Err = UnknownAuthMode;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"device" => Ok(Self::Device),
			"secret" => Ok(Self::Secret),
			"cert" => Ok(Self::Cert),
			_ => Err(UnknownAuthMode(s.to_owned())),
		}
	}
}

/// Device-code credential: only the application identifier is needed.
#[derive(Clone, Debug)]
pub struct DeviceCodeCredential {
	application_id: ApplicationId,
}
impl DeviceCodeCredential {
	/// Validates and wraps the application identifier.
	pub fn new(application_id: impl AsRef<str>) -> Result<Self, CredentialError> {
		Ok(Self { application_id: application_id_for(AuthMode::Device, application_id)? })
	}

	/// Application (client) identifier.
	pub fn application_id(&self) -> &ApplicationId {
		&self.application_id
	}
}

/// Client-secret credential.
#[derive(Clone, Debug)]
pub struct ClientSecretCredential {
	application_id: ApplicationId,
	secret: TokenSecret,
}
impl ClientSecretCredential {
	/// Validates the application identifier and requires a non-blank secret.
	pub fn new(
		application_id: impl AsRef<str>,
		secret: impl Into<String>,
	) -> Result<Self, CredentialError> {
		let application_id = application_id_for(AuthMode::Secret, application_id)?;
		let secret = TokenSecret::new(secret);

		if secret.is_blank() {
			return Err(CredentialError::InvalidCredential {
				mode: AuthMode::Secret,
				field: "secret",
				reason: "value is empty".into(),
			});
		}

		Ok(Self { application_id, secret })
	}

	/// Application (client) identifier.
	pub fn application_id(&self) -> &ApplicationId {
		&self.application_id
	}

	/// Client secret; callers must avoid logging it.
	pub fn secret(&self) -> &TokenSecret {
		&self.secret
	}

	pub(crate) fn client_auth(&self, form: &mut BTreeMap<String, String>) {
		form.insert("client_id".into(), self.application_id.to_string());
		form.insert("client_secret".into(), self.secret.expose().to_owned());
	}
}

/// Client-certificate credential.
///
/// The certificate is loaded when the credential is built, so an unreadable file fails before
/// any network traffic.
#[derive(Clone, Debug)]
pub struct ClientCertificateCredential {
	application_id: ApplicationId,
	certificate_path: PathBuf,
	key: Arc<CertificateKey>,
}
impl ClientCertificateCredential {
	/// Validates the application identifier and loads the certificate at `certificate_path`.
	pub fn new(
		application_id: impl AsRef<str>,
		certificate_path: impl Into<PathBuf>,
	) -> Result<Self, CredentialError> {
		let application_id = application_id_for(AuthMode::Cert, application_id)?;
		let certificate_path = certificate_path.into();

		if certificate_path.as_os_str().is_empty() {
			return Err(CredentialError::InvalidCredential {
				mode: AuthMode::Cert,
				field: "certificate_path",
				reason: "value is empty".into(),
			});
		}

		let key = Arc::new(CertificateKey::load(&certificate_path)?);

		Ok(Self { application_id, certificate_path, key })
	}

	/// Application (client) identifier.
	pub fn application_id(&self) -> &ApplicationId {
		&self.application_id
	}

	/// Path the certificate was loaded from.
	pub fn certificate_path(&self) -> &Path {
		&self.certificate_path
	}

	/// Loaded signing key.
	pub fn key(&self) -> &CertificateKey {
		&self.key
	}

	/// Signs a fresh assertion for `token_endpoint` and adds it to `form`.
	pub(crate) fn client_auth(
		&self,
		token_endpoint: &Url,
		form: &mut BTreeMap<String, String>,
	) -> Result<()> {
		let assertion =
			self.key.sign_assertion(&self.application_id, token_endpoint, OffsetDateTime::now_utc())?;

		form.insert("client_id".into(), self.application_id.to_string());
		form.insert("client_assertion_type".into(), CLIENT_ASSERTION_TYPE.into());
		form.insert("client_assertion".into(), assertion);

		Ok(())
	}
}

/// Credential used by a [`crate::principal::ServicePrincipalToken`].
#[derive(Clone, Debug)]
pub enum Credential {
	/// Device-code flow.
	DeviceCode(DeviceCodeCredential),
	/// Client-secret flow.
	ClientSecret(ClientSecretCredential),
	/// Client-certificate flow.
	ClientCertificate(ClientCertificateCredential),
}
impl Credential {
	/// Builds a device-code credential.
	pub fn device_code(application_id: impl AsRef<str>) -> Result<Self, CredentialError> {
		DeviceCodeCredential::new(application_id).map(Self::DeviceCode)
	}

	/// Builds a client-secret credential.
	pub fn client_secret(
		application_id: impl AsRef<str>,
		secret: impl Into<String>,
	) -> Result<Self, CredentialError> {
		ClientSecretCredential::new(application_id, secret).map(Self::ClientSecret)
	}

	/// Builds a client-certificate credential, loading the certificate immediately.
	pub fn client_certificate(
		application_id: impl AsRef<str>,
		certificate_path: impl Into<PathBuf>,
	) -> Result<Self, CredentialError> {
		ClientCertificateCredential::new(application_id, certificate_path)
			.map(Self::ClientCertificate)
	}

	/// Mode the credential belongs to.
	pub fn mode(&self) -> AuthMode {
		match self {
			Self::DeviceCode(_) => AuthMode::Device,
			Self::ClientSecret(_) => AuthMode::Secret,
			Self::ClientCertificate(_) => AuthMode::Cert,
		}
	}

	/// Flow label used for spans and counters.
	pub fn flow_kind(&self) -> FlowKind {
		match self {
			Self::DeviceCode(_) => FlowKind::DeviceCode,
			Self::ClientSecret(_) => FlowKind::ClientSecret,
			Self::ClientCertificate(_) => FlowKind::ClientCertificate,
		}
	}

	/// Application (client) identifier.
	pub fn application_id(&self) -> &ApplicationId {
		match self {
			Self::DeviceCode(inner) => inner.application_id(),
			Self::ClientSecret(inner) => inner.application_id(),
			Self::ClientCertificate(inner) => inner.application_id(),
		}
	}

	/// Runs the flow that matches this credential.
	pub async fn acquire<C, M>(
		&self,
		client: &FlowClient<C, M>,
		resource: &ResourceId,
		cancel: &CancellationToken,
	) -> Result<Token>
	where
		C: ?Sized + TokenHttpClient,
		M: ?Sized + TransportErrorMapper<C::TransportError>,
	{
		match self {
			Self::DeviceCode(inner) => client.device_code(inner, resource, cancel).await,
			Self::ClientSecret(inner) => client.client_secret(inner, resource, cancel).await,
			Self::ClientCertificate(inner) =>
				client.client_certificate(inner, resource, cancel).await,
		}
	}

	/// Client authentication fields for a token request sent to `token_endpoint`.
	pub(crate) fn client_auth(
		&self,
		token_endpoint: &Url,
		form: &mut BTreeMap<String, String>,
	) -> Result<()> {
		match self {
			Self::DeviceCode(inner) => {
				form.insert("client_id".into(), inner.application_id().to_string());

				Ok(())
			},
			Self::ClientSecret(inner) => {
				inner.client_auth(form);

				Ok(())
			},
			Self::ClientCertificate(inner) => inner.client_auth(token_endpoint, form),
		}
	}
}

fn application_id_for(
	mode: AuthMode,
	value: impl AsRef<str>,
) -> Result<ApplicationId, CredentialError> {
	ApplicationId::new(value.as_ref().trim()).map_err(|err| CredentialError::InvalidCredential {
		mode,
		field: "application_id",
		reason: err.to_string(),
	})
}
