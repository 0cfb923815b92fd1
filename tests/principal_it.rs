mod common;

// std
use std::sync::{Arc, Mutex};
// crates.io
use httpmock::prelude::*;
use time::{Duration, OffsetDateTime};
use tokio_util::sync::CancellationToken;
// self
use adal_token::{
	auth::{ResourceId, Token},
	credential::Credential,
	error::{BoxError, Error},
	principal::{RefreshPath, ServicePrincipalToken, TokenState},
	store::{FileStore, MemoryStore, PersistToken, TokenStore, load_token},
};
use common::*;

fn resource() -> ResourceId {
	ResourceId::new(RESOURCE).expect("Resource fixture should be valid.")
}

fn secret_credential() -> Credential {
	Credential::client_secret(APPLICATION_ID, "s3cret").expect("Secret credential should build.")
}

fn scripted_principal() -> (ServicePrincipalToken<ScriptedHttpClient, ScriptedMapper>, ScriptedHttpClient) {
	let (client, script) = scripted_flow_client();

	(ServicePrincipalToken::new(client, secret_credential(), resource()), script)
}

fn held_token(access: &str, refresh: Option<&str>, expires_in: Duration) -> Token {
	let mut builder = Token::builder(RESOURCE).access_token(access).expires_in(expires_in);

	if let Some(refresh) = refresh {
		builder = builder.refresh_token(refresh);
	}

	builder.build().expect("Token fixture should build.")
}

#[tokio::test]
async fn first_refresh_acquires_and_notifies_in_order() {
	let (spt, script) = scripted_principal();
	let calls = Arc::new(Mutex::new(Vec::new()));
	let first = calls.clone();
	let second = calls.clone();
	let spt = spt
		.with_callback(move |token: &Token| {
			first.lock().expect("Lock should not be poisoned.").push(format!("first:{}", token.access_token.expose()));

			Ok::<(), BoxError>(())
		})
		.with_callback(move |token: &Token| {
			second.lock().expect("Lock should not be poisoned.").push(format!("second:{}", token.access_token.expose()));

			Ok::<(), BoxError>(())
		});

	assert_eq!(spt.state(), TokenState::Uninitialized);
	assert!(spt.current_token().is_none());

	script.push(200, token_body("AT1", Some("RT1"), 3600));

	let token = spt.refresh().await.expect("First refresh should acquire a token.");

	assert_eq!(token.access_token.expose(), "AT1");
	assert_eq!(spt.state(), TokenState::Valid);
	assert_eq!(spt.current_token(), Some(token));
	assert_eq!(*calls.lock().expect("Lock should not be poisoned."), ["first:AT1", "second:AT1"]);
	assert_eq!(script.requests()[0].field("grant_type"), Some("client_credentials"));
	assert_eq!(spt.refresh_metrics.successes(), 1);
}

#[tokio::test]
async fn second_refresh_uses_the_refresh_grant_and_keeps_the_old_refresh_token() {
	let (spt, script) = scripted_principal();

	script
		.push(200, token_body("AT1", Some("RT1"), 3600))
		.push(200, token_body("AT2", None, 7200));

	spt.refresh().await.expect("First refresh should succeed.");

	let refreshed = spt.refresh().await.expect("Second refresh should succeed.");
	let requests = script.requests();

	assert_eq!(requests[1].field("grant_type"), Some("refresh_token"));
	assert_eq!(requests[1].field("refresh_token"), Some("RT1"));
	assert_eq!(requests[1].field("client_secret"), Some("s3cret"));
	assert_eq!(requests[1].field("resource"), Some(RESOURCE));
	assert_eq!(refreshed.access_token.expose(), "AT2");
	assert_eq!(refreshed.refresh_secret(), Some("RT1"));
}

#[tokio::test]
async fn failed_refresh_keeps_the_previous_token_and_marks_it_stale() {
	let (spt, script) = scripted_principal();

	script.push(200, token_body("AT1", None, 3600)).push(503, "upstream down");

	let held = spt.refresh().await.expect("First refresh should succeed.");
	let err = spt.refresh().await.expect_err("Second refresh should fail.");

	assert!(matches!(err, Error::Transient(_)), "unexpected error: {err:?}");
	assert_eq!(spt.state(), TokenState::Invalid);
	assert!(spt.is_stale());
	assert_eq!(spt.current_token(), Some(held));
	assert_eq!(spt.refresh_metrics.failures(), 1);
}

#[tokio::test]
async fn callback_failure_is_reported_and_later_callbacks_are_skipped() {
	let (spt, script) = scripted_principal();
	let third_called = Arc::new(Mutex::new(false));
	let flag = third_called.clone();
	let spt = spt
		.with_callback(|_: &Token| Ok::<(), BoxError>(()))
		.with_callback(|_: &Token| Err::<(), BoxError>("disk full".into()));

	spt.register_callback(move |_: &Token| {
		*flag.lock().expect("Lock should not be poisoned.") = true;

		Ok::<(), BoxError>(())
	});
	script.push(200, token_body("AT1", None, 3600));

	let err = spt.refresh().await.expect_err("Failing callback should surface.");

	assert!(matches!(err, Error::CallbackFailed { index: 1, .. }), "unexpected error: {err:?}");
	assert!(!*third_called.lock().expect("Lock should not be poisoned."));
	assert_eq!(spt.refresh_metrics.callback_failures(), 1);
	assert_eq!(spt.current_token().map(|token| token.access_token.expose().to_owned()), Some("AT1".into()));
	assert_eq!(spt.state(), TokenState::Valid);
}

#[tokio::test]
async fn ensure_fresh_skips_fresh_tokens_and_refreshes_inside_the_skew() {
	let (client, script) = scripted_flow_client();
	let fresh = ServicePrincipalToken::new(client, secret_credential(), resource())
		.with_token(held_token("AT-cached", Some("RT-cached"), Duration::hours(1)));
	let token = fresh.ensure_fresh().await.expect("Fresh token should be returned.");

	assert_eq!(token.access_token.expose(), "AT-cached");
	assert!(script.requests().is_empty());

	let (client, script) = scripted_flow_client();
	let expiring = ServicePrincipalToken::new(client, secret_credential(), resource())
		.with_token(held_token("AT-old", Some("RT-old"), Duration::minutes(4)));

	script.push(200, token_body("AT-new", Some("RT-new"), 3600));

	let token = expiring.ensure_fresh().await.expect("Expiring token should refresh.");

	assert_eq!(token.access_token.expose(), "AT-new");
	assert_eq!(script.requests()[0].field("refresh_token"), Some("RT-old"));
}

#[tokio::test]
async fn concurrent_ensure_fresh_calls_share_one_request() {
	let (spt, script) = scripted_principal();

	script.push(200, token_body("AT1", Some("RT1"), 3600));

	let (first, second) = tokio::join!(spt.ensure_fresh(), spt.ensure_fresh());

	assert_eq!(
		first.expect("First caller should succeed."),
		second.expect("Second caller should succeed."),
	);
	assert_eq!(script.requests().len(), 1);
}

#[tokio::test]
async fn refreshed_expiry_may_not_move_backwards() {
	let (client, script) = scripted_flow_client();
	let spt = ServicePrincipalToken::new(client, secret_credential(), resource())
		.with_token(held_token("AT-long", Some("RT"), Duration::hours(10)));

	script.push(200, token_body("AT-short", None, 60));

	let err = spt.refresh().await.expect_err("Regressed expiry should be rejected.");

	assert!(matches!(err, Error::ExpiryRegressed { .. }), "unexpected error: {err:?}");
	assert_eq!(
		spt.current_token().map(|token| token.access_token.expose().to_owned()),
		Some("AT-long".into()),
	);
	assert!(spt.is_stale());
}

#[tokio::test]
async fn revoked_refresh_token_falls_back_to_the_credential_flow() {
	let (client, script) = scripted_flow_client();
	let spt = ServicePrincipalToken::new(client, secret_credential(), resource())
		.with_token(held_token("AT-old", Some("RT-revoked"), Duration::minutes(1)));

	script.push(400, error_body("invalid_grant")).push(200, token_body("AT-new", None, 3600));

	let token = spt.refresh().await.expect("Fallback acquisition should succeed.");
	let requests = script.requests();

	assert_eq!(token.access_token.expose(), "AT-new");
	assert_eq!(requests[0].field("grant_type"), Some("refresh_token"));
	assert_eq!(requests[1].field("grant_type"), Some("client_credentials"));
	assert_eq!(spt.refresh_metrics.path_count(RefreshPath::RefreshGrant), 1);
	assert_eq!(spt.refresh_metrics.path_count(RefreshPath::CredentialFlow), 1);
	assert_eq!(spt.refresh_metrics.snapshot().successes, 1);
}

#[tokio::test]
async fn persistence_callback_writes_the_token_cache() {
	let dir = tempfile::tempdir().expect("Temp dir should be created.");
	let path = dir.path().join(".adal").join("accessToken.json");
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(token_path());
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("AT-disk", Some("RT-disk"), 3600));
		})
		.await;
	let started = OffsetDateTime::now_utc();
	let spt = ServicePrincipalToken::new(reqwest_flow_client(&server), secret_credential(), resource())
		.with_callback(PersistToken(FileStore::new(&path)));
	let token = spt.refresh().await.expect("Refresh should succeed.");

	mock.assert_async().await;

	let cached = load_token(&path).expect("Cache file should load.");

	assert_eq!(cached, token);
	assert!(cached.expires_on > started);
	assert_eq!(FileStore::new(&path).load().expect("Store should load."), token);
}

#[tokio::test]
async fn secret_mode_scenario_persists_the_token_once() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(token_path());
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("AT1", Some("RT1"), 3600));
		})
		.await;
	let store = MemoryStore::default();
	let saves = Arc::new(Mutex::new(0_usize));
	let credential = Credential::client_secret("a1", "s1").expect("Secret credential should build.");
	let resource = ResourceId::new("https://example/").expect("Resource should be valid.");
	let spt = ServicePrincipalToken::new(reqwest_flow_client(&server), credential, resource)
		.with_callback(PersistToken(store.clone()))
		.with_callback({
			let saves = saves.clone();

			move |_: &Token| {
				*saves.lock().expect("Counter lock should not be poisoned.") += 1;

				Ok::<(), BoxError>(())
			}
		});

	spt.refresh().await.expect("Refresh should succeed.");
	mock.assert_async().await;

	let current = spt.current_token().expect("Token should be held.");

	assert_eq!(current.access_token.expose(), "AT1");
	assert_eq!(store.get(), Some(current));
	assert_eq!(*saves.lock().expect("Counter lock should not be poisoned."), 1);
}

#[tokio::test]
async fn controller_cancellation_is_sticky_but_per_call_tokens_are_not() {
	let (spt, script) = scripted_principal();
	let cancel = CancellationToken::new();
	let spt = spt.with_cancellation(cancel.clone());

	cancel.cancel();

	let err = spt.refresh().await.expect_err("Cancelled controller should not acquire.");

	assert!(matches!(err, Error::Cancelled), "unexpected error: {err:?}");
	assert!(script.requests().is_empty());
	assert_eq!(spt.state(), TokenState::Invalid);
	assert!(matches!(spt.ensure_fresh().await, Err(Error::Cancelled)));

	script.push(200, token_body("AT1", Some("RT1"), 3600));

	let token = spt
		.ensure_fresh_with(&CancellationToken::new())
		.await
		.expect("A fresh per-call token should allow acquisition.");

	assert_eq!(token.access_token.expose(), "AT1");
	assert_eq!(spt.state(), TokenState::Valid);
	assert_eq!(script.requests().len(), 1);

	let call = CancellationToken::new();

	call.cancel();

	assert!(matches!(spt.refresh_with(&call).await, Err(Error::Cancelled)));
	assert_eq!(script.requests().len(), 1);
	assert!(spt.is_stale());
}
