//! Command-line host: acquires a token with the selected credential and caches it on disk.

// std
use std::{convert::Infallible, path::PathBuf, sync::Arc};
// crates.io
use clap::Parser;
use color_eyre::{
	Result,
	eyre::{WrapErr, bail},
};
use tracing_subscriber::EnvFilter;
// self
use adal_token::{
	auth::{ResourceId, Token},
	credential::{AuthMode, Credential},
	directory::{DirectoryConfig, PUBLIC_CLOUD_AUTHORITY},
	flows::{DeviceCodeSession, FlowClient},
	principal::ServicePrincipalToken,
	store::{FileStore, PersistToken, StoreError, TokenStore},
};

#[derive(Debug, Parser)]
#[command(version, about = "Acquire a directory service-principal token and cache it on disk.")]
struct Cli {
	/// Authentication mode: device, secret, or cert.
	#[arg(long, env = "ADAL_MODE", default_value = "device")]
	mode: AuthMode,
	/// Resource the token is requested for.
	#[arg(long, env = "ADAL_RESOURCE")]
	resource: Option<String>,
	/// Directory tenant identifier.
	#[arg(long, env = "ADAL_TENANT_ID")]
	tenant_id: Option<String>,
	/// Application (client) identifier.
	#[arg(long, env = "ADAL_APPLICATION_ID")]
	application_id: Option<String>,
	/// Client secret (secret mode).
	#[arg(long, env = "ADAL_SECRET", hide_env_values = true)]
	secret: Option<String>,
	/// PKCS#12 or PEM certificate holding the signing key (cert mode).
	#[arg(long, env = "ADAL_CERTIFICATE_PATH")]
	certificate_path: Option<PathBuf>,
	/// Token cache file; defaults to `$HOME/.adal/accessToken.json`.
	#[arg(long, env = "ADAL_TOKEN_CACHE_PATH")]
	token_cache_path: Option<PathBuf>,
	/// Directory authority URL.
	#[arg(long, env = "ADAL_AUTHORITY", default_value = PUBLIC_CLOUD_AUTHORITY)]
	authority: String,
	/// Reuse the cached token when it is for the same resource, refreshing only if needed.
	#[arg(long)]
	reuse_cached: bool,
}
impl Cli {
	fn check_mandatory_options(&self) -> Result<()> {
		let mut options = vec![
			("resource", is_given(&self.resource)),
			("tenant-id", is_given(&self.tenant_id)),
			("application-id", is_given(&self.application_id)),
		];

		match self.mode {
			AuthMode::Device => {},
			AuthMode::Secret => options.push(("secret", is_given(&self.secret))),
			AuthMode::Cert => options.push((
				"certificate-path",
				self.certificate_path.as_ref().is_some_and(|path| !path.as_os_str().is_empty()),
			)),
		}

		for (name, given) in options {
			if !given {
				bail!("Authentication mode '{}' requires mandatory option '{name}'.", self.mode);
			}
		}

		Ok(())
	}

	fn credential(&self) -> Result<Credential> {
		let application_id = self.application_id.as_deref().unwrap_or_default();
		let credential = match self.mode {
			AuthMode::Device => Credential::device_code(application_id),
			AuthMode::Secret =>
				Credential::client_secret(application_id, self.secret.clone().unwrap_or_default()),
			AuthMode::Cert => Credential::client_certificate(
				application_id,
				self.certificate_path.clone().unwrap_or_default(),
			),
		};

		Ok(credential?)
	}

	fn token_cache_path(&self) -> Result<PathBuf> {
		if let Some(path) = self.token_cache_path.clone() {
			return Ok(path);
		}

		let Some(home) = dirs::home_dir() else {
			bail!("Cannot locate the home directory; pass --token-cache-path.");
		};

		Ok(home.join(".adal").join("accessToken.json"))
	}
}

fn is_given(value: &Option<String>) -> bool {
	value.as_deref().is_some_and(|value| !value.trim().is_empty())
}

fn print_device_code(session: &DeviceCodeSession) {
	eprintln!("{}", session.message);
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.with_writer(std::io::stderr)
		.init();

	let cli = Cli::parse();

	cli.check_mandatory_options()?;

	let token_cache_path = cli.token_cache_path()?;
	let directory = DirectoryConfig::new(&cli.authority, cli.tenant_id.as_deref().unwrap_or_default())?;
	let resource = ResourceId::new(cli.resource.as_deref().unwrap_or_default().trim())
		.wrap_err("Resource is invalid.")?;
	tracing::info!("Authenticating with mode '{}'.", cli.mode);

	let credential = cli.credential()?;
	let store = Arc::new(FileStore::new(&token_cache_path));
	let saved_to = token_cache_path.clone();
	let client = FlowClient::new(directory).with_device_code_prompt(print_device_code);
	let mut spt = ServicePrincipalToken::new(client, credential, resource.clone())
		.with_callback(PersistToken(store.clone()))
		.with_callback(move |_: &Token| {
			tracing::info!("Acquired token was saved in '{}' file.", saved_to.display());

			Ok::<(), Infallible>(())
		});

	if cli.reuse_cached {
		match store.load() {
			Ok(token) if token.resource == resource.as_ref() => spt = spt.with_token(token),
			Ok(_) => tracing::info!("Cached token is for another resource; acquiring a new one."),
			Err(StoreError::NotFound { .. }) => {},
			Err(e) => tracing::warn!("Ignoring unusable token cache: {e}"),
		}
	}

	let cancel = spt.cancellation().clone();

	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			cancel.cancel();
		}
	});

	let token = if cli.reuse_cached { spt.ensure_fresh().await } else { spt.refresh().await }
		.wrap_err("Failed to acquire a token.")?;

	tracing::info!(expires_on = %token.expires_on, resource = %token.resource, "Token is ready.");

	Ok(())
}
