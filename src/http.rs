//! Transport primitives for authenticated requests.
//!
//! The module exposes [`Transport`] so callers can plug any HTTP stack underneath the
//! authenticated fetch. Implementations must report the *final* URL of an exchange in
//! [`FetchResponse::url`]: the redirect-aware DPoP retry compares it with the URL that was
//! requested.

// self
use crate::{_prelude::*, error::TransportError};

/// Boxed future returned by [`Transport::send`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<FetchResponse, TransportError>> + 'a + Send>>;

/// Capability performing exactly one HTTP exchange (following redirects as it sees fit).
pub trait Transport
where
	Self: Send + Sync,
{
	/// Sends `request` and resolves to the final response.
	fn send(&self, request: FetchRequest) -> TransportFuture<'_>;
}

/// Caller-controlled parts of a request.
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
	/// HTTP method; `GET` unless overridden.
	pub method: Method,
	/// Extra headers. An `Authorization` header set here is always replaced.
	pub headers: HeaderMap,
	/// Optional request body.
	pub body: Option<Vec<u8>>,
}
impl RequestOptions {
	/// Overrides the HTTP method.
	pub fn with_method(mut self, method: Method) -> Self {
		self.method = method;

		self
	}

	/// Adds a header, replacing previous values with the same name.
	pub fn with_header(mut self, name: ::http::header::HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Sets the request body.
	pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = Some(body.into());

		self
	}
}

/// A fully prepared request handed to a [`Transport`].
#[derive(Clone, Debug)]
pub struct FetchRequest {
	/// Target URL.
	pub url: Url,
	/// HTTP method.
	pub method: Method,
	/// Complete header set, credentials included.
	pub headers: HeaderMap,
	/// Optional request body.
	pub body: Option<Vec<u8>>,
}

/// Response returned by a [`Transport`].
#[derive(Clone, Debug)]
pub struct FetchResponse {
	/// HTTP status code.
	pub status: u16,
	/// Final URL after any redirects the transport followed.
	pub url: Url,
	/// Response headers.
	pub headers: HeaderMap,
	/// Response body.
	pub body: Vec<u8>,
}
impl FetchResponse {
	/// Creates an empty response with `status` served from `url`.
	pub fn new(status: u16, url: Url) -> Self {
		Self { status, url, headers: HeaderMap::new(), body: Vec::new() }
	}

	/// Sets the body.
	pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = body.into();

		self
	}

	/// Returns `true` for `2xx` statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Returns `true` when the server rejected the presented credentials (`401` or `403`).
	///
	/// RFC 7235 section 3.1 allows either status for refused credentials.
	pub fn is_auth_error(&self) -> bool {
		matches!(self.status, 401 | 403)
	}
}

/// Ambient transport backed by [`ReqwestClient`].
///
/// The default client follows redirects and reports the final URL, which is what the
/// redirect-aware retry relies on.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Transport for ReqwestTransport {
	fn send(&self, request: FetchRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			let FetchRequest { url, method, headers, body } = request;
			let mut builder = self.0.request(method, url).headers(headers);

			if let Some(body) = body {
				builder = builder.body(body);
			}

			let response = builder.send().await?;
			let status = response.status().as_u16();
			let url = response.url().to_owned();
			let headers = response.headers().to_owned();
			let body = response.bytes().await?.to_vec();

			Ok(FetchResponse { status, url, headers, body })
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn status_helpers_classify_auth_failures() {
		let url = Url::parse("https://pod.example/").expect("Test URL should parse.");

		assert!(FetchResponse::new(204, url.clone()).is_success());
		assert!(FetchResponse::new(401, url.clone()).is_auth_error());
		assert!(FetchResponse::new(403, url.clone()).is_auth_error());
		assert!(!FetchResponse::new(404, url.clone()).is_auth_error());
		assert!(!FetchResponse::new(500, url).is_success());
	}

	#[test]
	fn request_options_default_to_get() {
		let options = RequestOptions::default().with_body("x");

		assert_eq!(options.method, Method::GET);
		assert_eq!(options.body.as_deref(), Some(&b"x"[..]));
	}
}
