mod common;

// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use httpmock::prelude::*;
use openssl::{hash::MessageDigest, sign::Verifier};
use tokio_util::sync::CancellationToken;
// self
use adal_token::{
	auth::ResourceId,
	credential::{CLIENT_ASSERTION_TYPE, ClientCertificateCredential, CredentialError},
	error::Error,
};
use common::*;

fn resource() -> ResourceId {
	ResourceId::new(RESOURCE).expect("Resource fixture should be valid.")
}

fn decode_segment(segment: &str) -> serde_json::Value {
	serde_json::from_slice(&URL_SAFE_NO_PAD.decode(segment).expect("JWT segment should decode."))
		.expect("JWT segment should be JSON.")
}

#[tokio::test]
async fn certificate_flow_sends_signed_assertion() {
	let dir = tempfile::tempdir().expect("Temp dir should be created.");
	let (path, key, cert) = write_pem_certificate(dir.path());
	let credential = ClientCertificateCredential::new(APPLICATION_ID, &path)
		.expect("Certificate credential should build.");
	let (client, script) = scripted_flow_client();

	script.push(200, token_body("AT-cert", None, 3600));

	let token = client
		.client_certificate(&credential, &resource(), &CancellationToken::new())
		.await
		.expect("Certificate flow should succeed.");

	assert_eq!(token.access_token.expose(), "AT-cert");

	let requests = script.requests();

	assert_eq!(requests.len(), 1);

	let request = &requests[0];

	assert_eq!(request.field("grant_type"), Some("client_credentials"));
	assert_eq!(request.field("client_id"), Some(APPLICATION_ID));
	assert_eq!(request.field("resource"), Some(RESOURCE));
	assert_eq!(request.field("client_assertion_type"), Some(CLIENT_ASSERTION_TYPE));
	assert_eq!(request.field("client_secret"), None);

	let assertion = request.field("client_assertion").expect("Assertion should be posted.");
	let segments = assertion.split('.').collect::<Vec<_>>();

	assert_eq!(segments.len(), 3);

	let header = decode_segment(segments[0]);
	let claims = decode_segment(segments[1]);
	let thumbprint = URL_SAFE_NO_PAD
		.encode(cert.digest(MessageDigest::sha1()).expect("Thumbprint should compute."));

	assert_eq!(header["alg"], "RS256");
	assert_eq!(header["x5t"], thumbprint);
	assert_eq!(claims["aud"], request.url);
	assert_eq!(claims["iss"], APPLICATION_ID);
	assert_eq!(claims["sub"], APPLICATION_ID);
	assert!(claims["jti"].as_str().is_some_and(|jti| !jti.is_empty()));
	assert!(claims["exp"].as_i64() > claims["nbf"].as_i64());

	let signature = URL_SAFE_NO_PAD.decode(segments[2]).expect("Signature should decode.");
	let mut verifier = Verifier::new(MessageDigest::sha256(), &key).expect("Verifier should build.");

	verifier
		.update(format!("{}.{}", segments[0], segments[1]).as_bytes())
		.expect("Verifier should accept input.");

	assert!(verifier.verify(&signature).expect("Verification should run."));
}

#[tokio::test]
async fn certificate_flow_against_mock_directory() {
	let dir = tempfile::tempdir().expect("Temp dir should be created.");
	let (path, _, _) = write_pem_certificate(dir.path());
	let credential = ClientCertificateCredential::new(APPLICATION_ID, &path)
		.expect("Certificate credential should build.");
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(token_path());
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"access_token":"AT","token_type":"Bearer","expires_in":3599,"expires_on":"1900000000"}"#);
		})
		.await;
	let client = reqwest_flow_client(&server);
	let token = client
		.client_certificate(&credential, &resource(), &CancellationToken::new())
		.await
		.expect("Certificate flow should succeed.");

	mock.assert_async().await;

	assert_eq!(token.expires_on.unix_timestamp(), 1_900_000_000);
	assert_eq!(token.resource, RESOURCE);
}

#[tokio::test]
async fn rejected_assertion_maps_to_invalid_credential() {
	let dir = tempfile::tempdir().expect("Temp dir should be created.");
	let (path, _, _) = write_pem_certificate(dir.path());
	let credential = ClientCertificateCredential::new(APPLICATION_ID, &path)
		.expect("Certificate credential should build.");
	let (client, script) = scripted_flow_client();

	script.push(400, error_body("invalid_client"));

	let err = client
		.client_certificate(&credential, &resource(), &CancellationToken::new())
		.await
		.expect_err("Rejected assertion should fail.");

	assert!(matches!(err, Error::InvalidCredential { .. }), "unexpected error: {err:?}");
}

#[test]
fn unreadable_certificate_fails_without_network() {
	let dir = tempfile::tempdir().expect("Temp dir should be created.");
	let garbage = dir.path().join("cert.pfx");

	std::fs::write(&garbage, b"definitely not DER").expect("Garbage should be written.");

	let err = ClientCertificateCredential::new(APPLICATION_ID, &garbage)
		.expect_err("Garbage certificate should be rejected.");

	assert!(matches!(err, CredentialError::CertificateUnreadable { .. }));
}
