//! Token refresh capability consumed by the refresh scheduler.
//!
//! The scheduler never talks to an authorization server directly. It calls a
//! [`TokenRefresher`] and classifies the outcome through [`RefreshError`]: provider refusals
//! and responses lacking an access token end the session with an event, everything else stops
//! renewal quietly.

#[cfg(feature = "reqwest")] mod token_endpoint;
#[cfg(feature = "reqwest")] pub use token_endpoint::ReqwestTokenRefresher;

// self
use crate::{
	_prelude::*,
	auth::{KeyHandle, TokenSecret},
	error::{BoxError, ProofError, TransportError},
};

/// Boxed future returned by [`TokenRefresher::refresh`].
pub type RefreshFuture<'a> =
	Pin<Box<dyn Future<Output = Result<RefreshedTokens, RefreshError>> + 'a + Send>>;

/// External capability exchanging a refresh token for new credentials.
pub trait TokenRefresher
where
	Self: Send + Sync,
{
	/// Refreshes the session identified by `session_id`.
	///
	/// `key` is present when the session is DPoP-bound, so the token request can carry a proof.
	fn refresh<'a>(
		&'a self,
		session_id: &'a str,
		refresh_token: &'a str,
		key: Option<&'a KeyHandle>,
	) -> RefreshFuture<'a>;
}

/// Credentials returned by a successful refresh.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefreshedTokens {
	/// New access token.
	pub access_token: TokenSecret,
	/// Rotated refresh token, when the provider issued one.
	pub refresh_token: Option<TokenSecret>,
	/// Lifetime of the new access token in seconds.
	pub expires_in: Option<u64>,
}
impl RefreshedTokens {
	/// Creates a result holding only an access token.
	pub fn new(access_token: impl Into<TokenSecret>) -> Self {
		Self { access_token: access_token.into(), refresh_token: None, expires_in: None }
	}

	/// Sets the rotated refresh token.
	pub fn with_refresh_token(mut self, token: impl Into<TokenSecret>) -> Self {
		self.refresh_token = Some(token.into());

		self
	}

	/// Sets the lifetime in seconds.
	pub fn with_expires_in(mut self, seconds: u64) -> Self {
		self.expires_in = Some(seconds);

		self
	}
}

/// Classified refresh failures.
#[derive(Debug, ThisError)]
pub enum RefreshError {
	/// The authorization server explicitly rejected the refresh.
	#[error("Provider refused to refresh the session: {error}.")]
	ProviderRefusal {
		/// OAuth `error` code.
		error: String,
		/// OAuth `error_description`, when supplied.
		description: Option<String>,
	},
	/// The token endpoint answered successfully but omitted required fields.
	#[error("Token endpoint response is missing required fields: {}.", .missing_fields.join(", "))]
	MalformedResponse {
		/// Names of the missing fields.
		missing_fields: Vec<String>,
	},
	/// The token endpoint answered with an unexpected status and no OAuth error body.
	#[error("Token endpoint returned an unexpected HTTP {status} response.")]
	TokenEndpoint {
		/// HTTP status code.
		status: u16,
	},
	/// The token endpoint returned a body that is not valid token JSON.
	#[error("Token endpoint returned malformed JSON.")]
	ResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Transport failure while calling the token endpoint.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// The token request proof could not be signed.
	#[error(transparent)]
	Proof(#[from] ProofError),
	/// Any other refresher-specific failure.
	#[error("Token refresh failed.")]
	Unclassified {
		/// Refresher-specific failure.
		#[source]
		source: BoxError,
	},
}
impl RefreshError {
	/// Wraps an arbitrary refresher failure.
	pub fn unclassified(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Unclassified { source: Box::new(src) }
	}

	/// Shorthand for a provider refusal.
	pub fn refused(error: impl Into<String>, description: Option<String>) -> Self {
		Self::ProviderRefusal { error: error.into(), description }
	}

	/// Returns `true` when the response was missing the `access_token` field.
	pub fn is_missing_access_token(&self) -> bool {
		matches!(
			self,
			Self::MalformedResponse { missing_fields } if missing_fields.iter().any(|f| f == "access_token")
		)
	}
}

/// Refresh configuration for a session: which session, which refresh token, and who refreshes.
///
/// Clones share the refresh-token cell, so a caller holding a clone observes rotations made by
/// the scheduler.
#[derive(Clone)]
pub struct RefreshDescriptor {
	session_id: String,
	refresh_token: Arc<RwLock<TokenSecret>>,
	refresher: Arc<dyn TokenRefresher>,
}
impl RefreshDescriptor {
	/// Creates a descriptor for `session_id`.
	pub fn new(
		session_id: impl Into<String>,
		refresh_token: impl Into<TokenSecret>,
		refresher: Arc<dyn TokenRefresher>,
	) -> Self {
		Self {
			session_id: session_id.into(),
			refresh_token: Arc::new(RwLock::new(refresh_token.into())),
			refresher,
		}
	}

	/// Session identifier handed to the refresher.
	pub fn session_id(&self) -> &str {
		&self.session_id
	}

	/// Refresh token currently on file.
	pub fn refresh_token(&self) -> TokenSecret {
		self.refresh_token.read().clone()
	}

	pub(crate) fn rotate(&self, token: TokenSecret) {
		*self.refresh_token.write() = token;
	}

	pub(crate) fn refresher(&self) -> &dyn TokenRefresher {
		self.refresher.as_ref()
	}
}
impl Debug for RefreshDescriptor {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshDescriptor")
			.field("session_id", &self.session_id)
			.field("refresh_token", &"<redacted>")
			.finish_non_exhaustive()
	}
}

#[derive(Deserialize)]
struct TokenResponseBody {
	access_token: Option<String>,
	refresh_token: Option<String>,
	expires_in: Option<u64>,
}

#[derive(Deserialize)]
struct ErrorResponseBody {
	error: String,
	error_description: Option<String>,
}

/// Classifies a token endpoint response (RFC 6749 sections 5.1 and 5.2).
///
/// Custom [`TokenRefresher`]s that perform their own HTTP calls can reuse this to get the
/// classification the scheduler expects.
pub fn parse_token_response(status: u16, body: &[u8]) -> Result<RefreshedTokens, RefreshError> {
	if !(200..300).contains(&status) {
		return match serde_json::from_slice::<ErrorResponseBody>(body) {
			Ok(err) => Err(RefreshError::refused(err.error, err.error_description)),
			Err(_) => Err(RefreshError::TokenEndpoint { status }),
		};
	}

	let mut de = serde_json::Deserializer::from_slice(body);
	let parsed: TokenResponseBody = serde_path_to_error::deserialize(&mut de)
		.map_err(|source| RefreshError::ResponseParse { source })?;
	let Some(access_token) = parsed.access_token else {
		return Err(RefreshError::MalformedResponse { missing_fields: vec!["access_token".into()] });
	};

	Ok(RefreshedTokens {
		access_token: TokenSecret::new(access_token),
		refresh_token: parsed.refresh_token.map(TokenSecret::new),
		expires_in: parsed.expires_in,
	})
}
