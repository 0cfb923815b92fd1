//! Certificate loading and RS256 client-assertion signing.

// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use openssl::{
	hash::MessageDigest,
	pkcs12::Pkcs12,
	pkey::{Id, PKey, Private},
	sign::Signer,
	x509::X509,
};
// self
use crate::{_prelude::*, credential::CredentialError, error::ConfigError};

/// `client_assertion_type` value for JWT bearer assertions.
pub const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

const ASSERTION_LIFETIME: Duration = Duration::minutes(10);

/// Private key and certificate thumbprint used to sign client assertions.
#[derive(Clone)]
pub struct CertificateKey {
	key: PKey<Private>,
	thumbprint: String,
}
impl CertificateKey {
	/// Loads a PKCS#12 bundle (empty password) or a PEM file holding a certificate and an
	/// RSA private key.
	pub fn load(path: &Path) -> Result<Self, CredentialError> {
		let unreadable = |reason: String| CredentialError::CertificateUnreadable {
			path: path.to_path_buf(),
			reason,
		};
		let bytes = std::fs::read(path).map_err(|err| unreadable(err.to_string()))?;
		let (key, cert) = if looks_like_pem(&bytes) {
			let cert = X509::from_pem(&bytes).map_err(|err| unreadable(err.to_string()))?;
			let key = PKey::private_key_from_pem(&bytes).map_err(|err| unreadable(err.to_string()))?;

			(key, cert)
		} else {
			let parsed = Pkcs12::from_der(&bytes)
				.and_then(|bundle| bundle.parse2(""))
				.map_err(|err| unreadable(err.to_string()))?;

			match (parsed.pkey, parsed.cert) {
				(Some(key), Some(cert)) => (key, cert),
				(None, _) => return Err(unreadable("PKCS#12 bundle has no private key".into())),
				(_, None) => return Err(unreadable("PKCS#12 bundle has no certificate".into())),
			}
		};

		if key.id() != Id::RSA {
			return Err(unreadable("private key is not an RSA key".into()));
		}

		let digest =
			cert.digest(MessageDigest::sha1()).map_err(|err| unreadable(err.to_string()))?;

		Ok(Self { key, thumbprint: URL_SAFE_NO_PAD.encode(digest) })
	}

	/// Base64url SHA-1 thumbprint of the certificate (`x5t` header).
	pub fn thumbprint(&self) -> &str {
		&self.thumbprint
	}

	/// Signs a client assertion for `client_id` targeting `audience`.
	pub fn sign_assertion(
		&self,
		client_id: &str,
		audience: &Url,
		now: OffsetDateTime,
	) -> Result<String, ConfigError> {
		let header = AssertionHeader { alg: "RS256", typ: "JWT", x5t: &self.thumbprint };
		let claims = AssertionClaims {
			aud: audience.as_str(),
			iss: client_id,
			sub: client_id,
			jti: format!("{:032x}", rand::random::<u128>()),
			nbf: now.unix_timestamp(),
			exp: (now + ASSERTION_LIFETIME).unix_timestamp(),
		};
		let header = serde_json::to_vec(&header).map_err(ConfigError::assertion_signing)?;
		let claims = serde_json::to_vec(&claims).map_err(ConfigError::assertion_signing)?;
		let signing_input =
			format!("{}.{}", URL_SAFE_NO_PAD.encode(header), URL_SAFE_NO_PAD.encode(claims));
		let mut signer =
			Signer::new(MessageDigest::sha256(), &self.key).map_err(ConfigError::assertion_signing)?;

		signer.update(signing_input.as_bytes()).map_err(ConfigError::assertion_signing)?;

		let signature = signer.sign_to_vec().map_err(ConfigError::assertion_signing)?;

		Ok(format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature)))
	}
}
impl Debug for CertificateKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CertificateKey")
			.field("key", &"<redacted>")
			.field("thumbprint", &self.thumbprint)
			.finish()
	}
}

#[derive(Serialize)]
struct AssertionHeader<'a> {
	alg: &'static str,
	typ: &'static str,
	x5t: &'a str,
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
	aud: &'a str,
	iss: &'a str,
	sub: &'a str,
	jti: String,
	nbf: i64,
	exp: i64,
}

fn looks_like_pem(bytes: &[u8]) -> bool {
	bytes.windows(b"-----BEGIN".len()).any(|window| window == b"-----BEGIN")
}

#[cfg(test)]
mod tests {
	// crates.io
	use openssl::{
		asn1::Asn1Time,
		rsa::Rsa,
		sign::Verifier,
		x509::{X509, X509NameBuilder},
	};
	// self
	use super::*;

	fn self_signed() -> (PKey<Private>, X509) {
		let key = PKey::from_rsa(Rsa::generate(2048).expect("RSA key should generate."))
			.expect("RSA key should wrap into PKey.");
		let mut name = X509NameBuilder::new().expect("Name builder should allocate.");

		name.append_entry_by_text("CN", "adal-token-unit").expect("CN should append.");

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

	#[test]
	fn pkcs12_bundle_with_empty_password_loads() {
		let (key, cert) = self_signed();
		let bundle = Pkcs12::builder()
			.name("adal-token-unit")
			.pkey(&key)
			.cert(&cert)
			.build2("")
			.expect("PKCS#12 bundle should build.")
			.to_der()
			.expect("PKCS#12 bundle should encode.");
		let dir = tempfile::tempdir().expect("Temp dir should be created.");
		let path = dir.path().join("cert.pfx");

		std::fs::write(&path, bundle).expect("Bundle should be written.");

		let loaded = CertificateKey::load(&path).expect("PKCS#12 bundle should load.");
		let expected = URL_SAFE_NO_PAD
			.encode(cert.digest(MessageDigest::sha1()).expect("Digest should compute."));

		assert_eq!(loaded.thumbprint(), expected);
	}

	#[test]
	fn assertion_is_a_verifiable_rs256_jwt() {
		let (key, cert) = self_signed();
		let dir = tempfile::tempdir().expect("Temp dir should be created.");
		let path = dir.path().join("cert.pem");
		let mut pem = cert.to_pem().expect("Certificate should encode.");

		pem.extend(key.private_key_to_pem_pkcs8().expect("Key should encode."));
		std::fs::write(&path, pem).expect("PEM should be written.");

		let loaded = CertificateKey::load(&path).expect("PEM file should load.");
		let audience = Url::parse("https://login.example.net/t1/oauth2/token?api-version=1.0")
			.expect("Audience fixture should parse.");
		let now = OffsetDateTime::from_unix_timestamp(1_735_689_600).expect("Instant should build.");
		let jwt = loaded.sign_assertion("a1", &audience, now).expect("Assertion should sign.");
		let parts = jwt.split('.').collect::<Vec<_>>();

		assert_eq!(parts.len(), 3);

		let decode = |part: &str| -> serde_json::Value {
			serde_json::from_slice(&URL_SAFE_NO_PAD.decode(part).expect("Segment should decode."))
				.expect("Segment should be JSON.")
		};
		let header = decode(parts[0]);
		let claims = decode(parts[1]);

		assert_eq!(header["alg"], "RS256");
		assert_eq!(header["x5t"], loaded.thumbprint());
		assert_eq!(claims["aud"], audience.as_str());
		assert_eq!(claims["iss"], "a1");
		assert_eq!(claims["sub"], "a1");
		assert_eq!(claims["nbf"], 1_735_689_600_i64);
		assert_eq!(claims["exp"], 1_735_690_200_i64);

		let signature = URL_SAFE_NO_PAD.decode(parts[2]).expect("Signature should decode.");
		let mut verifier =
			Verifier::new(MessageDigest::sha256(), &key).expect("Verifier should build.");

		verifier
			.update(format!("{}.{}", parts[0], parts[1]).as_bytes())
			.expect("Verifier should accept input.");

		assert!(verifier.verify(&signature).expect("Verification should run."));
	}

	#[test]
	fn unreadable_files_are_reported_with_their_path() {
		let dir = tempfile::tempdir().expect("Temp dir should be created.");
		let missing = dir.path().join("missing.pfx");
		let garbage = dir.path().join("garbage.pfx");

		std::fs::write(&garbage, b"not a certificate").expect("Garbage should be written.");

		for path in [missing, garbage] {
			match CertificateKey::load(&path) {
				Err(CredentialError::CertificateUnreadable { path: reported, .. }) =>
					assert_eq!(reported, path),
				other => panic!("Unexpected result: {other:?}"),
			}
		}
	}
}
