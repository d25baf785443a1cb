//! Authenticated fetch for OAuth 2.0 / OpenID Connect sessions: Bearer or DPoP-bound requests
//! whose credentials keep themselves fresh for the lifetime of the session.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod error;
pub mod event;
pub mod flows;
pub mod http;
pub mod obs;
pub mod proof;
pub mod provider;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and test doubles for integration tests; enabled via `cfg(test)` or
	//! the `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::KeyHandle,
		event::{EventSink, SessionEvent},
		http::{FetchRequest, FetchResponse, Transport, TransportFuture},
		proof::{ProofClaims, ProofFuture, ProofSigner},
		provider::{RefreshError, RefreshFuture, RefreshedTokens, TokenRefresher},
	};

	/// Event sink that records every emitted [`SessionEvent`] in order.
	#[derive(Clone, Debug, Default)]
	pub struct RecordingEventSink(Arc<Mutex<Vec<SessionEvent>>>);
	impl RecordingEventSink {
		/// Returns a snapshot of the recorded events.
		pub fn events(&self) -> Vec<SessionEvent> {
			self.0.lock().clone()
		}
	}
	impl EventSink for RecordingEventSink {
		fn emit(&self, event: SessionEvent) {
			self.0.lock().push(event);
		}
	}

	/// Signer producing deterministic `proof:<METHOD>:<htu>` strings so tests can assert
	/// which URL and method a proof was bound to.
	#[derive(Clone, Debug, Default)]
	pub struct FakeProofSigner {
		signed: Arc<Mutex<Vec<ProofClaims>>>,
	}
	impl FakeProofSigner {
		/// Returns every claim set signed so far.
		pub fn signed(&self) -> Vec<ProofClaims> {
			self.signed.lock().clone()
		}

		/// Renders the proof string the signer emits for `method` and `htu`.
		pub fn expected_proof(method: &str, htu: &str) -> String {
			format!("proof:{method}:{htu}")
		}
	}
	impl ProofSigner for FakeProofSigner {
		fn sign<'a>(&'a self, claims: &'a ProofClaims, _key: &'a KeyHandle) -> ProofFuture<'a> {
			Box::pin(async move {
				self.signed.lock().push(claims.clone());

				Ok(Self::expected_proof(&claims.htm, &claims.htu))
			})
		}
	}

	/// Transport that replays queued responses and records every request it receives.
	#[derive(Clone, Debug, Default)]
	pub struct ScriptedTransport {
		responses: Arc<Mutex<Vec<FetchResponse>>>,
		requests: Arc<Mutex<Vec<FetchRequest>>>,
	}
	impl ScriptedTransport {
		/// Queues a response; responses are replayed in insertion order.
		pub fn push_response(&self, response: FetchResponse) {
			self.responses.lock().push(response);
		}

		/// Returns every request sent through the transport.
		pub fn requests(&self) -> Vec<FetchRequest> {
			self.requests.lock().clone()
		}
	}
	impl Transport for ScriptedTransport {
		fn send(&self, request: FetchRequest) -> TransportFuture<'_> {
			Box::pin(async move {
				let fallback = FetchResponse::new(200, request.url.clone());

				self.requests.lock().push(request);

				let mut responses = self.responses.lock();

				Ok(if responses.is_empty() { fallback } else { responses.remove(0) })
			})
		}
	}

	/// Refresher that replays queued outcomes and records the refresh tokens it was handed.
	#[derive(Clone, Debug, Default)]
	pub struct ScriptedRefresher {
		outcomes: Arc<Mutex<Vec<Result<RefreshedTokens, RefreshError>>>>,
		calls: Arc<Mutex<Vec<(String, String, bool)>>>,
	}
	impl ScriptedRefresher {
		/// Queues a refresh outcome.
		pub fn push_outcome(&self, outcome: Result<RefreshedTokens, RefreshError>) {
			self.outcomes.lock().push(outcome);
		}

		/// Returns `(session_id, refresh_token, key_present)` for every call.
		pub fn calls(&self) -> Vec<(String, String, bool)> {
			self.calls.lock().clone()
		}
	}
	impl TokenRefresher for ScriptedRefresher {
		fn refresh<'a>(
			&'a self,
			session_id: &'a str,
			refresh_token: &'a str,
			key: Option<&'a KeyHandle>,
		) -> RefreshFuture<'a> {
			Box::pin(async move {
				self.calls.lock().push((session_id.into(), refresh_token.into(), key.is_some()));

				let mut outcomes = self.outcomes.lock();

				if outcomes.is_empty() {
					return Err(RefreshError::unclassified(std::io::Error::other(
						"No scripted refresh outcome is queued.",
					)));
				}

				outcomes.remove(0)
			})
		}
	}

	/// Builds a reqwest transport that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	#[cfg(feature = "reqwest")]
	pub fn test_reqwest_transport() -> crate::http::ReqwestTransport {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		crate::http::ReqwestTransport::with_client(client)
	}

	/// Builds a token refresher for `token_endpoint` that accepts `httpmock`'s self-signed
	/// certificates and, like [`ReqwestTokenRefresher::new`](crate::provider::ReqwestTokenRefresher::new),
	/// never follows redirects.
	#[cfg(feature = "reqwest")]
	pub fn test_reqwest_token_refresher(
		token_endpoint: Url,
		client_id: &str,
	) -> crate::provider::ReqwestTokenRefresher {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		crate::provider::ReqwestTokenRefresher::with_client(client, token_endpoint, client_id)
	}
}

mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
		time::Duration as StdDuration,
	};

	pub use http::{HeaderMap, HeaderValue, Method};
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::OffsetDateTime;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use ::http as http_types;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};

pub use flows::{AuthenticatedFetch, FetchOptions, build_authenticated_fetch};
