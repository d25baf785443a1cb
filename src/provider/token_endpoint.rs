//! Refresh-token grant against an OAuth 2.0 token endpoint, backed by reqwest.

// crates.io
use ::http::header::{ACCEPT, CONTENT_TYPE};
use reqwest::redirect::Policy;
use url::form_urlencoded::Serializer;
// self
use crate::{
	_prelude::*,
	auth::{KeyHandle, TokenSecret},
	error::{ConfigError, TransportError},
	proof::{DPOP, ProofClaims, ProofSigner},
	provider::{RefreshFuture, TokenRefresher, parse_token_response},
};

/// [`TokenRefresher`] performing `grant_type=refresh_token` with `client_secret_post` or public
/// client authentication.
///
/// Token requests should not follow redirects; [`ReqwestTokenRefresher::new`] builds a client
/// with redirects disabled. When a proof signer is configured and the session is DPoP-bound,
/// the request carries a proof for `POST <token endpoint>`.
#[derive(Clone)]
pub struct ReqwestTokenRefresher {
	client: ReqwestClient,
	token_endpoint: Url,
	client_id: String,
	client_secret: Option<TokenSecret>,
	signer: Option<Arc<dyn ProofSigner>>,
}
impl ReqwestTokenRefresher {
	/// Creates a refresher with its own non-redirecting HTTP client.
	pub fn new(token_endpoint: Url, client_id: impl Into<String>) -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder().redirect(Policy::none()).build()?;

		Ok(Self::with_client(client, token_endpoint, client_id))
	}

	/// Creates a refresher reusing `client`. Configure it to not follow redirects.
	pub fn with_client(
		client: ReqwestClient,
		token_endpoint: Url,
		client_id: impl Into<String>,
	) -> Self {
		Self {
			client,
			token_endpoint,
			client_id: client_id.into(),
			client_secret: None,
			signer: None,
		}
	}

	/// Sets the client secret sent in the form body.
	pub fn with_client_secret(mut self, secret: impl Into<TokenSecret>) -> Self {
		self.client_secret = Some(secret.into());

		self
	}

	/// Sets the signer used for DPoP-bound sessions.
	pub fn with_proof_signer(mut self, signer: Arc<dyn ProofSigner>) -> Self {
		self.signer = Some(signer);

		self
	}

	fn form(&self, refresh_token: &str) -> String {
		let mut form = Serializer::new(String::new());

		form.append_pair("grant_type", "refresh_token")
			.append_pair("refresh_token", refresh_token)
			.append_pair("client_id", &self.client_id);

		if let Some(secret) = &self.client_secret {
			form.append_pair("client_secret", secret.expose());
		}

		form.finish()
	}
}
impl Debug for ReqwestTokenRefresher {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ReqwestTokenRefresher")
			.field("token_endpoint", &self.token_endpoint.as_str())
			.field("client_id", &self.client_id)
			.field("client_secret_set", &self.client_secret.is_some())
			.field("dpop", &self.signer.is_some())
			.finish()
	}
}
impl TokenRefresher for ReqwestTokenRefresher {
	fn refresh<'a>(
		&'a self,
		_session_id: &'a str,
		refresh_token: &'a str,
		key: Option<&'a KeyHandle>,
	) -> RefreshFuture<'a> {
		Box::pin(async move {
			let mut request = self
				.client
				.post(self.token_endpoint.clone())
				.header(CONTENT_TYPE, "application/x-www-form-urlencoded")
				.header(ACCEPT, "application/json")
				.body(self.form(refresh_token));

			if let (Some(signer), Some(key)) = (&self.signer, key) {
				let claims = ProofClaims::new(&Method::POST, &self.token_endpoint, None);

				request = request.header(DPOP, signer.sign(&claims, key).await?);
			}

			let response = request.send().await.map_err(TransportError::from)?;
			let status = response.status().as_u16();
			let body = response.bytes().await.map_err(TransportError::from)?;

			parse_token_response(status, &body)
		})
	}
}
