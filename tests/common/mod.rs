#![allow(dead_code)]

// std
use std::{
	collections::{BTreeMap, VecDeque},
	path::{Path, PathBuf},
	pin::Pin,
	sync::{Arc, Mutex},
};
// crates.io
use httpmock::MockServer;
use oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse, http::StatusCode};
use openssl::{
	asn1::Asn1Time,
	hash::MessageDigest,
	pkey::{PKey, Private},
	rsa::Rsa,
	x509::{X509, X509NameBuilder},
};
use tokio::time::Instant;
// self
use adal_token::{
	directory::DirectoryConfig,
	error::{Error, TransportError},
	flows::{FlowClient, ReqwestFlowClient},
	http::{ResponseMetadata, ResponseMetadataSlot, ReqwestHttpClient, TokenHttpClient},
	oauth::{ReqwestTransportErrorMapper, TransportErrorMapper},
	provider::{GrantType, ProviderStrategy},
	reqwest::Client as ReqwestClient,
};

pub const TENANT: &str = "t1";
pub const APPLICATION_ID: &str = "a1";
pub const RESOURCE: &str = "https://management.core.windows.net/";

/// Reqwest transport that tolerates the mock server's self-signed certificates.
pub fn test_reqwest_http_client() -> ReqwestHttpClient {
	let client = ReqwestClient::builder()
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.build()
		.expect("Failed to build insecure Reqwest client for tests.");

	ReqwestHttpClient::with_client(client)
}

/// Flow client whose authority is the mock server.
pub fn reqwest_flow_client(server: &MockServer) -> ReqwestFlowClient {
	let directory = DirectoryConfig::new(server.base_url(), TENANT)
		.expect("Mock directory config should resolve.");

	FlowClient::with_http_client(
		directory,
		test_reqwest_http_client(),
		Arc::new(ReqwestTransportErrorMapper),
	)
}

pub fn token_path() -> String {
	format!("/{TENANT}/oauth2/token")
}

pub fn device_code_path() -> String {
	format!("/{TENANT}/oauth2/devicecode")
}

/// Request captured by [`ScriptedHttpClient`].
#[derive(Clone, Debug)]
pub struct RecordedRequest {
	pub url: String,
	pub form: BTreeMap<String, String>,
	pub at: Instant,
}
impl RecordedRequest {
	pub fn field(&self, name: &str) -> Option<&str> {
		self.form.get(name).map(String::as_str)
	}
}

#[derive(Default)]
struct Script {
	queued: VecDeque<(u16, String)>,
	fallback: Option<(u16, String)>,
	requests: Vec<RecordedRequest>,
}

/// In-process transport that replays queued responses and records every request.
#[derive(Clone, Default)]
pub struct ScriptedHttpClient(Arc<Mutex<Script>>);
impl ScriptedHttpClient {
	/// Queues one response.
	pub fn push(&self, status: u16, body: impl Into<String>) -> &Self {
		self.0.lock().expect("Script lock should not be poisoned.").queued.push_back((status, body.into()));

		self
	}

	/// Response served whenever the queue is empty.
	pub fn repeat(&self, status: u16, body: impl Into<String>) -> &Self {
		self.0.lock().expect("Script lock should not be poisoned.").fallback = Some((status, body.into()));

		self
	}

	pub fn requests(&self) -> Vec<RecordedRequest> {
		self.0.lock().expect("Script lock should not be poisoned.").requests.clone()
	}

	pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
		self.requests().into_iter().filter(|request| request.url.contains(path)).collect()
	}
}

pub struct ScriptedHandle {
	script: Arc<Mutex<Script>>,
	slot: ResponseMetadataSlot,
}
impl<'c> AsyncHttpClient<'c> for ScriptedHandle {
	type Error = HttpClientError<std::io::Error>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		Box::pin(async move {
			self.slot.take();

			let form = adal_token::url::form_urlencoded::parse(request.body())
				.into_owned()
				.collect::<BTreeMap<_, _>>();
			let next = {
				let mut script = self.script.lock().expect("Script lock should not be poisoned.");

				script.requests.push(RecordedRequest {
					url: request.uri().to_string(),
					form,
					at: Instant::now(),
				});
				script.queued.pop_front().or_else(|| script.fallback.clone())
			};
			let Some((status, body)) = next else {
				return Err(HttpClientError::Io(std::io::Error::new(
					std::io::ErrorKind::ConnectionRefused,
					"script exhausted",
				)));
			};

			self.slot.store(ResponseMetadata { status: Some(status), retry_after: None });

			let mut response = HttpResponse::new(body.into_bytes());

			*response.status_mut() =
				StatusCode::from_u16(status).expect("Scripted status should be valid.");

			Ok(response)
		})
	}
}
impl TokenHttpClient for ScriptedHttpClient {
	type Handle = ScriptedHandle;
	type TransportError = std::io::Error;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		ScriptedHandle { script: self.0.clone(), slot }
	}
}

/// Maps scripted transport failures onto [`TransportError::Io`].
#[derive(Clone, Debug, Default)]
pub struct ScriptedMapper;
impl TransportErrorMapper<std::io::Error> for ScriptedMapper {
	fn map_transport_error(
		&self,
		_strategy: &dyn ProviderStrategy,
		_grant: GrantType,
		_metadata: Option<&ResponseMetadata>,
		error: HttpClientError<std::io::Error>,
	) -> Error {
		match error {
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			other => TransportError::network(other).into(),
		}
	}
}

pub type ScriptedFlowClient = FlowClient<ScriptedHttpClient, ScriptedMapper>;

pub fn scripted_directory() -> DirectoryConfig {
	DirectoryConfig::new("https://login.example.net/", TENANT)
		.expect("Scripted directory config should resolve.")
}

/// Flow client backed by a fresh script.
pub fn scripted_flow_client() -> (ScriptedFlowClient, ScriptedHttpClient) {
	let script = ScriptedHttpClient::default();
	let client = FlowClient::with_http_client(
		scripted_directory(),
		Arc::new(script.clone()),
		Arc::new(ScriptedMapper),
	);

	(client, script)
}

pub fn token_body(access: &str, refresh: Option<&str>, expires_in: i64) -> String {
	let mut body = serde_json::json!({
		"access_token": access,
		"token_type": "Bearer",
		"expires_in": expires_in.to_string(),
		"resource": RESOURCE,
	});

	if let Some(refresh) = refresh {
		body["refresh_token"] = refresh.into();
	}

	body.to_string()
}

pub fn error_body(error: &str) -> String {
	serde_json::json!({ "error": error, "error_description": format!("{error} from directory") })
		.to_string()
}

/// Generates an RSA key with a self-signed certificate.
pub fn self_signed_certificate() -> (PKey<Private>, X509) {
	let key = PKey::from_rsa(Rsa::generate(2048).expect("RSA key should generate."))
		.expect("RSA key should wrap into PKey.");
	let mut name = X509NameBuilder::new().expect("Name builder should allocate.");

	name.append_entry_by_text("CN", "adal-token-it").expect("CN should append.");

	let name = name.build();
	let mut builder = X509::builder().expect("X509 builder should allocate.");

	builder.set_version(2).expect("Version should set.");
	builder.set_subject_name(&name).expect("Subject should set.");
	builder.set_issuer_name(&name).expect("Issuer should set.");
	builder.set_pubkey(&key).expect("Public key should set.");
	builder
		.set_not_before(&Asn1Time::days_from_now(0).expect("Start time should build."))
		.expect("Not-before should set.");
	builder
		.set_not_after(&Asn1Time::days_from_now(1).expect("End time should build."))
		.expect("Not-after should set.");
	builder.sign(&key, MessageDigest::sha256()).expect("Certificate should self-sign.");

	(key, builder.build())
}

/// Writes the certificate and key as one PEM file under `dir`.
pub fn write_pem_certificate(dir: &Path) -> (PathBuf, PKey<Private>, X509) {
	let (key, cert) = self_signed_certificate();
	let path = dir.join("cert.pem");
	let mut pem = cert.to_pem().expect("Certificate should encode.");

	pem.extend(key.private_key_to_pem_pkcs8().expect("Key should encode."));
	std::fs::write(&path, pem).expect("PEM should be written.");

	(path, key, cert)
}
