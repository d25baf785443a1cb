//! Crate-level error types surfaced by authenticated fetches and their builders.
//!
//! Refresh failures are deliberately absent: they are classified by
//! [`RefreshError`](crate::provider::RefreshError) and handled inside the refresh scheduler, so
//! they can never fail an unrelated request.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS), propagated verbatim from the network layer.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// The DPoP proof could not be produced.
	#[error(transparent)]
	Proof(#[from] ProofError),
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// No transport was supplied and the default reqwest transport is not compiled in.
	#[error("No transport is configured and the `reqwest` feature is disabled.")]
	MissingTransport,
	/// Construction happened outside a Tokio runtime, so the refresh scheduler cannot run.
	#[error("Authenticated fetch must be built inside a Tokio runtime.")]
	MissingRuntime,
	/// A credential or proof cannot be carried in an HTTP header.
	#[error("The `{header}` header value is not valid.")]
	InvalidHeaderValue {
		/// Header the value was destined for.
		header: &'static str,
		/// Underlying header validation failure.
		#[source]
		source: ::http::header::InvalidHeaderValue,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while sending the request.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while sending the request.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Failures raised by the external DPoP proof signer.
#[derive(Debug, ThisError)]
pub enum ProofError {
	/// The signer could not produce a proof for the request.
	#[error("DPoP proof signing failed.")]
	Signing {
		/// Signer-specific failure.
		#[source]
		source: BoxError,
	},
}
impl ProofError {
	/// Wraps a signer failure.
	pub fn signing(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Signing { source: Box::new(src) }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn transport_errors_keep_their_source() {
		let err = Error::from(TransportError::network(std::io::Error::other("connection reset")));

		assert_eq!(err.to_string(), "Network error occurred while sending the request.");
		assert_eq!(
			StdError::source(&err).map(ToString::to_string),
			Some("connection reset".into())
		);
	}
}
