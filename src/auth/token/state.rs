//! The token state published by the refresh scheduler.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Credentials that are current for a session at a given instant.
///
/// A state is never mutated in place. The refresh scheduler builds a new value and publishes it
/// as a whole, so readers only ever see a fully written state.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenState {
	/// Access token presented to resource servers.
	pub access_token: TokenSecret,
	/// Refresh token associated with the access token, if any.
	pub refresh_token: Option<TokenSecret>,
	/// Declared lifetime of the access token in seconds.
	pub expires_in: Option<u64>,
}
impl TokenState {
	/// Creates a state holding only an access token.
	pub fn new(access_token: impl Into<TokenSecret>) -> Self {
		Self { access_token: access_token.into(), refresh_token: None, expires_in: None }
	}

	/// Sets the refresh token.
	pub fn with_refresh_token(mut self, token: impl Into<TokenSecret>) -> Self {
		self.refresh_token = Some(token.into());

		self
	}

	/// Sets the declared lifetime in seconds.
	pub fn with_expires_in(mut self, seconds: u64) -> Self {
		self.expires_in = Some(seconds);

		self
	}
}
impl Debug for TokenState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenState")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("expires_in", &self.expires_in)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn debug_output_redacts_both_tokens() {
		let state = TokenState::new("T1").with_refresh_token("R1").with_expires_in(30);
		let rendered = format!("{state:?}");

		assert!(!rendered.contains("T1"));
		assert!(!rendered.contains("R1"));
		assert!(rendered.contains("expires_in: Some(30)"));
	}
}
