#![cfg(feature = "reqwest")]

// std
use std::time::Duration;
// crates.io
use httpmock::prelude::*;
use tokio::sync::mpsc;
// self
use oauth2_session_fetch::{
	_preludet::*,
	FetchOptions,
	auth::KeyHandle,
	event::{ChannelEventSink, SessionEvent},
	flows::SchedulerState,
	proof::DpopKey,
	provider::{RefreshDescriptor, RefreshError, ReqwestTokenRefresher, TokenRefresher},
};

const CLIENT_ID: &str = "client-refresh";

fn refresher(server: &MockServer) -> ReqwestTokenRefresher {
	let endpoint = Url::parse(&server.url("/token"))
		.expect("Mock token endpoint should parse successfully.");

	test_reqwest_token_refresher(endpoint, CLIENT_ID)
}

#[tokio::test]
async fn refresh_grant_posts_form_and_parses_rotation() {
	let server = MockServer::start_async().await;
	let endpoint = server.url("/token");
	let token = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.header("content-type", "application/x-www-form-urlencoded")
				.header("dpop", FakeProofSigner::expected_proof("POST", &endpoint))
				.body_includes("grant_type=refresh_token")
				.body_includes("refresh_token=R1")
				.body_includes("client_id=client-refresh")
				.body_includes("client_secret=s3cret");
			then.status(200).header("content-type", "application/json").body(
				r#"{"access_token":"T2","refresh_token":"R2","token_type":"DPoP","expires_in":120}"#,
			);
		})
		.await;
	let signer = FakeProofSigner::default();
	let refresher = refresher(&server)
		.with_client_secret("s3cret")
		.with_proof_signer(Arc::new(signer.clone()));
	let key = KeyHandle::new("es256-test", ());
	let tokens = refresher
		.refresh("session-1", "R1", Some(&key))
		.await
		.expect("Refresh grant should succeed.");

	token.assert_async().await;

	assert_eq!(tokens.access_token.expose(), "T2");
	assert_eq!(tokens.refresh_token.as_ref().map(|t| t.expose()), Some("R2"));
	assert_eq!(tokens.expires_in, Some(120));
	assert_eq!(signer.signed()[0].ath, None);
}

#[tokio::test]
async fn provider_errors_are_classified_as_refusals() {
	let server = MockServer::start_async().await;
	let _token = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(400)
				.header("content-type", "application/json")
				.body(r#"{"error":"invalid_grant","error_description":"expired"}"#);
		})
		.await;
	let err = refresher(&server)
		.refresh("session-1", "R1", None)
		.await
		.expect_err("Refusal should surface as an error.");

	assert!(matches!(
		err,
		RefreshError::ProviderRefusal { ref error, ref description }
			if error == "invalid_grant" && description.as_deref() == Some("expired")
	));
}

#[tokio::test]
async fn success_without_access_token_is_malformed() {
	let server = MockServer::start_async().await;
	let _token = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(r#"{"token_type":"DPoP"}"#);
		})
		.await;
	let err = refresher(&server)
		.refresh("session-1", "R1", None)
		.await
		.expect_err("Missing access_token should surface as an error.");

	assert!(err.is_missing_access_token());
}

#[tokio::test]
async fn token_endpoint_redirects_are_not_followed() {
	let server = MockServer::start_async().await;
	let _token = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(302).header("location", "https://elsewhere.example/token");
		})
		.await;
	let err = refresher(&server)
		.refresh("session-1", "R1", None)
		.await
		.expect_err("Redirect should not be followed.");

	assert!(matches!(err, RefreshError::TokenEndpoint { status: 302 }));
}

#[tokio::test]
async fn session_refreshes_against_a_live_token_endpoint() {
	let server = MockServer::start_async().await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/token").body_includes("refresh_token=R1");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"access_token":"T2","refresh_token":"R2","expires_in":3600}"#);
		})
		.await;
	let descriptor = RefreshDescriptor::new("session-1", "R1", Arc::new(refresher(&server)));
	let (tx, mut rx) = mpsc::unbounded_channel();
	let fetch = FetchOptions::default()
		.with_transport(Arc::new(test_reqwest_transport()))
		.with_dpop_key(DpopKey::new(
			KeyHandle::new("es256-test", ()),
			Arc::new(FakeProofSigner::default()),
		))
		.with_refresh(descriptor.clone())
		.with_expires_in(6)
		.with_event_sink(Arc::new(ChannelEventSink::new(tx)))
		.build("T1")
		.expect("Authenticated fetch should build inside a runtime.");

	assert!(matches!(rx.recv().await, Some(SessionEvent::TimeoutSet(_))));

	let extended = tokio::time::timeout(Duration::from_secs(10), rx.recv())
		.await
		.expect("Refresh should fire one second after construction.");

	assert_eq!(extended, Some(SessionEvent::SessionExtended(3600)));
	assert_eq!(rx.recv().await, Some(SessionEvent::NewRefreshToken("R2".into())));
	assert!(matches!(rx.recv().await, Some(SessionEvent::TimeoutSet(_))));

	token.assert_async().await;

	assert_eq!(fetch.current_token().access_token.expose(), "T2");
	assert_eq!(descriptor.refresh_token().expose(), "R2");
	assert_eq!(fetch.scheduler_state(), SchedulerState::Scheduled);
}
