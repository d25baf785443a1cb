//! Single authenticated HTTP exchange.

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	http::{FetchRequest, FetchResponse, RequestOptions, Transport},
	proof::{self, DpopKey},
};

/// Sends one request to `url` carrying `access_token` (and a DPoP proof for `url` when `key` is
/// set).
///
/// Exactly one transport call is made; retry policy belongs to the caller. Transport errors are
/// returned unchanged.
pub async fn issue(
	transport: &dyn Transport,
	access_token: &TokenSecret,
	url: Url,
	options: &RequestOptions,
	key: Option<&DpopKey>,
) -> Result<FetchResponse> {
	let headers =
		proof::build_headers(&url, &options.method, access_token, key, options.headers.clone())
			.await?;
	let request =
		FetchRequest { url, method: options.method.clone(), headers, body: options.body.clone() };

	Ok(transport.send(request).await?)
}

#[cfg(test)]
mod tests {
	// std
	use std::io;
	// self
	use super::*;
	use crate::{
		_preludet::ScriptedTransport,
		error::TransportError,
		http::TransportFuture,
	};

	struct OfflineTransport;
	impl Transport for OfflineTransport {
		fn send(&self, _request: FetchRequest) -> TransportFuture<'_> {
			Box::pin(async { Err(TransportError::Io(io::Error::other("offline"))) })
		}
	}

	#[tokio::test]
	async fn issues_exactly_one_request_with_caller_options() {
		let transport = ScriptedTransport::default();
		let url = Url::parse("https://pod.example/notes").expect("Test URL should parse.");
		let options = RequestOptions::default()
			.with_method(Method::PUT)
			.with_header(::http::header::CONTENT_TYPE, HeaderValue::from_static("text/plain"))
			.with_body("hello");

		transport.push_response(FetchResponse::new(201, url.clone()));

		let response = issue(&transport, &TokenSecret::new("T1"), url.clone(), &options, None)
			.await
			.expect("Scripted transport should answer.");
		let requests = transport.requests();

		assert_eq!(response.status, 201);
		assert_eq!(requests.len(), 1);
		assert_eq!(requests[0].url, url);
		assert_eq!(requests[0].method, Method::PUT);
		assert_eq!(requests[0].headers["authorization"], "Bearer T1");
		assert_eq!(requests[0].headers["content-type"], "text/plain");
		assert_eq!(requests[0].body.as_deref(), Some(&b"hello"[..]));
	}

	#[tokio::test]
	async fn transport_errors_pass_through() {
		let url = Url::parse("https://pod.example/").expect("Test URL should parse.");
		let err = issue(
			&OfflineTransport,
			&TokenSecret::new("T1"),
			url,
			&RequestOptions::default(),
			None,
		)
		.await
		.expect_err("Offline transport should fail.");

		assert!(matches!(err, Error::Transport(TransportError::Io(_))));
	}
}
