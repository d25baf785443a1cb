//! DPoP proof claims, the external signing capability, and authorization header assembly.
//!
//! A proof is bound to one HTTP method and one target URL (RFC 9449 section 4.2), so the
//! helpers here build a fresh claim set for every request and never cache signed proofs.

// crates.io
use ::http::header::{AUTHORIZATION, HeaderName};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
// self
use crate::{
	_prelude::*,
	auth::{KeyHandle, TokenSecret},
	error::{ConfigError, ProofError},
};

/// Name of the header carrying the signed proof.
pub const DPOP: HeaderName = HeaderName::from_static("dpop");

/// Boxed future returned by [`ProofSigner::sign`].
pub type ProofFuture<'a> = Pin<Box<dyn Future<Output = Result<String, ProofError>> + 'a + Send>>;

/// External capability that turns [`ProofClaims`] into a compact DPoP proof JWT.
///
/// The signer owns the cryptography (JWS header with the public JWK, algorithm selection,
/// signature). It receives the key by reference only.
pub trait ProofSigner
where
	Self: Send + Sync,
{
	/// Signs `claims` with the key behind `key`.
	fn sign<'a>(&'a self, claims: &'a ProofClaims, key: &'a KeyHandle) -> ProofFuture<'a>;
}

/// Payload claims of a DPoP proof JWT.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofClaims {
	/// Unique proof identifier.
	pub jti: String,
	/// HTTP method of the request the proof is bound to.
	pub htm: String,
	/// Target URI without query and fragment.
	pub htu: String,
	/// Creation time, seconds since the Unix epoch.
	pub iat: i64,
	/// Hash of the access token presented alongside the proof.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub ath: Option<String>,
}
impl ProofClaims {
	/// Builds a fresh claim set for `method` + `target`.
	///
	/// Pass the access token when the proof accompanies a resource request; token endpoint
	/// proofs carry no `ath`.
	pub fn new(method: &Method, target: &Url, access_token: Option<&TokenSecret>) -> Self {
		Self {
			jti: URL_SAFE_NO_PAD.encode(rand::random::<[u8; 16]>()),
			htm: method.as_str().to_owned(),
			htu: normalize_htu(target),
			iat: OffsetDateTime::now_utc().unix_timestamp(),
			ath: access_token.map(TokenSecret::sha256_b64),
		}
	}
}

/// A key handle paired with the signer able to use it.
///
/// Configuring one switches requests from Bearer to DPoP mode.
pub struct DpopKey {
	key: KeyHandle,
	signer: Arc<dyn ProofSigner>,
}
impl DpopKey {
	/// Pairs `key` with `signer`.
	pub fn new(key: KeyHandle, signer: Arc<dyn ProofSigner>) -> Self {
		Self { key, signer }
	}

	/// Borrows the key handle.
	pub fn key(&self) -> &KeyHandle {
		&self.key
	}

	/// Signs a new proof for `method` + `target`.
	pub async fn proof(
		&self,
		method: &Method,
		target: &Url,
		access_token: Option<&TokenSecret>,
	) -> Result<String, ProofError> {
		let claims = ProofClaims::new(method, target, access_token);

		self.signer.sign(&claims, &self.key).await
	}
}
impl Debug for DpopKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("DpopKey").field("key", &self.key).finish_non_exhaustive()
	}
}

/// Produces the headers for one authenticated request.
///
/// Without a key, `Authorization: Bearer <token>` is set. With a key,
/// `Authorization: DPoP <token>` is set together with a `DPoP` proof signed for exactly
/// `method` + `target`. Any caller-supplied `Authorization` header is replaced, never merged;
/// every other header in `headers` is preserved.
pub async fn build_headers(
	target: &Url,
	method: &Method,
	access_token: &TokenSecret,
	key: Option<&DpopKey>,
	mut headers: HeaderMap,
) -> Result<HeaderMap> {
	let scheme = if key.is_some() { "DPoP" } else { "Bearer" };
	let mut authorization =
		header_value("authorization", format!("{scheme} {}", access_token.expose()))?;

	authorization.set_sensitive(true);
	headers.insert(AUTHORIZATION, authorization);

	if let Some(key) = key {
		let proof = key.proof(method, target, Some(access_token)).await?;

		headers.insert(DPOP, header_value("dpop", proof)?);
	}

	Ok(headers)
}

fn header_value(header: &'static str, value: String) -> Result<HeaderValue> {
	HeaderValue::try_from(value)
		.map_err(|source| ConfigError::InvalidHeaderValue { header, source }.into())
}

fn normalize_htu(target: &Url) -> String {
	let mut htu = target.clone();

	htu.set_query(None);
	htu.set_fragment(None);
	let _ = htu.set_username("");
	let _ = htu.set_password(None);

	htu.into()
}

#[cfg(test)]
mod tests {
	// std
	use std::io;
	// self
	use super::*;
	use crate::_preludet::FakeProofSigner;

	struct BrokenSigner;
	impl ProofSigner for BrokenSigner {
		fn sign<'a>(&'a self, _claims: &'a ProofClaims, _key: &'a KeyHandle) -> ProofFuture<'a> {
			Box::pin(async { Err(ProofError::signing(io::Error::other("HSM unavailable"))) })
		}
	}

	fn url(value: &str) -> Url {
		Url::parse(value).expect("Test URL should parse.")
	}

	fn dpop_key(signer: Arc<dyn ProofSigner>) -> DpopKey {
		DpopKey::new(KeyHandle::new("test-key", ()), signer)
	}

	#[tokio::test]
	async fn bearer_mode_overwrites_authorization_and_keeps_other_headers() {
		let mut headers = HeaderMap::new();

		headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic stale"));
		headers.insert("accept", HeaderValue::from_static("text/turtle"));

		let headers = build_headers(
			&url("https://pod.example/profile"),
			&Method::GET,
			&TokenSecret::new("T1"),
			None,
			headers,
		)
		.await
		.expect("Bearer headers should build.");

		assert_eq!(headers.get_all(AUTHORIZATION).iter().count(), 1);
		assert_eq!(headers[AUTHORIZATION], "Bearer T1");
		assert_eq!(headers["accept"], "text/turtle");
		assert!(headers.get(DPOP).is_none());
	}

	#[tokio::test]
	async fn dpop_mode_binds_a_fresh_proof_to_url_and_method() {
		let signer = FakeProofSigner::default();
		let key = dpop_key(Arc::new(signer.clone()));
		let target = url("https://user:pw@pod.example/inbox/?page=2#frag");
		let headers =
			build_headers(&target, &Method::POST, &TokenSecret::new("T1"), Some(&key), HeaderMap::new())
				.await
				.expect("DPoP headers should build.");

		assert_eq!(headers[AUTHORIZATION], "DPoP T1");
		assert_eq!(
			headers[DPOP],
			FakeProofSigner::expected_proof("POST", "https://pod.example/inbox/").as_str()
		);

		let _ =
			build_headers(&target, &Method::POST, &TokenSecret::new("T1"), Some(&key), HeaderMap::new())
				.await
				.expect("DPoP headers should build.");
		let signed = signer.signed();

		assert_eq!(signed.len(), 2);
		assert_ne!(signed[0].jti, signed[1].jti);
		assert_eq!(signed[0].ath.as_deref(), Some(TokenSecret::new("T1").sha256_b64().as_str()));
	}

	#[tokio::test]
	async fn signer_failures_propagate() {
		let key = dpop_key(Arc::new(BrokenSigner));
		let err = build_headers(
			&url("https://pod.example/"),
			&Method::GET,
			&TokenSecret::new("T1"),
			Some(&key),
			HeaderMap::new(),
		)
		.await
		.expect_err("Signer failure should surface.");

		assert!(matches!(err, Error::Proof(ProofError::Signing { .. })));
	}

	#[tokio::test]
	async fn tokens_that_cannot_be_header_values_are_rejected() {
		let err = build_headers(
			&url("https://pod.example/"),
			&Method::GET,
			&TokenSecret::new("bad\ntoken"),
			None,
			HeaderMap::new(),
		)
		.await
		.expect_err("Control characters are not valid in headers.");

		assert!(matches!(
			err,
			Error::Config(ConfigError::InvalidHeaderValue { header: "authorization", .. })
		));
	}

	#[test]
	fn claims_serialize_without_ath_for_token_endpoint_proofs() {
		let claims = ProofClaims::new(&Method::POST, &url("https://op.example/token"), None);
		let json = serde_json::to_value(&claims).expect("Claims should serialize.");

		assert_eq!(json["htm"], "POST");
		assert_eq!(json["htu"], "https://op.example/token");
		assert!(json.get("ath").is_none());
	}
}
