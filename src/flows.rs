//! The authenticated fetch: request issuance composed with the session's refresh scheduler.

pub mod issue;
pub mod refresh;

pub use issue::issue;
pub use refresh::{RefreshMetrics, RefreshTiming, SchedulerState};

// crates.io
use tokio::sync::watch;
// self
use crate::{
	_prelude::*,
	auth::{TokenSecret, TokenState},
	error::ConfigError,
	event::{EventSink, NoopEventSink},
	flows::refresh::{RefreshScheduler, SchedulerConfig, SchedulerHandle},
	http::{FetchResponse, RequestOptions, Transport},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	proof::DpopKey,
	provider::RefreshDescriptor,
};

/// Construction options for [`AuthenticatedFetch`]. Every field is optional.
#[derive(Default)]
pub struct FetchOptions {
	dpop_key: Option<DpopKey>,
	refresh: Option<RefreshDescriptor>,
	expires_in: Option<u64>,
	event_sink: Option<Arc<dyn EventSink>>,
	transport: Option<Arc<dyn Transport>>,
	timing: RefreshTiming,
	report_unhandled_refresh_errors: bool,
}
impl FetchOptions {
	/// Binds the session to a DPoP key; requests switch from Bearer to DPoP.
	pub fn with_dpop_key(mut self, key: DpopKey) -> Self {
		self.dpop_key = Some(key);

		self
	}

	/// Enables proactive refresh through `descriptor`.
	pub fn with_refresh(mut self, descriptor: RefreshDescriptor) -> Self {
		self.refresh = Some(descriptor);

		self
	}

	/// Declares the lifetime of the initial access token in seconds.
	pub fn with_expires_in(mut self, seconds: u64) -> Self {
		self.expires_in = Some(seconds);

		self
	}

	/// Routes lifecycle events to `sink`.
	pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
		self.event_sink = Some(sink);

		self
	}

	/// Replaces the ambient transport.
	pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
		self.transport = Some(transport);

		self
	}

	/// Overrides the refresh margin and the default token lifetime.
	pub fn with_timing(mut self, timing: RefreshTiming) -> Self {
		self.timing = timing;

		self
	}

	/// Emits [`SessionEvent::RefreshFailed`](crate::event::SessionEvent::RefreshFailed) when a
	/// refresh fails for an unclassified reason instead of stopping silently.
	pub fn report_unhandled_refresh_errors(mut self, enabled: bool) -> Self {
		self.report_unhandled_refresh_errors = enabled;

		self
	}

	/// Builds the fetch for `access_token` and starts its refresh scheduler.
	///
	/// Must be called inside a Tokio runtime.
	pub fn build(self, access_token: impl Into<TokenSecret>) -> Result<AuthenticatedFetch> {
		AuthenticatedFetch::new(access_token, self)
	}
}
impl Debug for FetchOptions {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("FetchOptions")
			.field("dpop_key", &self.dpop_key)
			.field("refresh", &self.refresh)
			.field("expires_in", &self.expires_in)
			.field("event_sink_set", &self.event_sink.is_some())
			.field("transport_set", &self.transport.is_some())
			.field("timing", &self.timing)
			.field("report_unhandled_refresh_errors", &self.report_unhandled_refresh_errors)
			.finish()
	}
}

/// Builds an [`AuthenticatedFetch`]; shorthand for [`FetchOptions::build`].
pub fn build_authenticated_fetch(
	access_token: impl Into<TokenSecret>,
	options: FetchOptions,
) -> Result<AuthenticatedFetch> {
	options.build(access_token)
}

/// Request function that authenticates every call with the session's current access token.
///
/// Cloning is cheap and clones share one refresh scheduler. The scheduler keeps running while
/// any clone is alive, even if no request is ever made, and is aborted once the last clone is
/// dropped.
#[derive(Clone)]
pub struct AuthenticatedFetch(Arc<FetchInner>);
struct FetchInner {
	transport: Arc<dyn Transport>,
	key: Option<Arc<DpopKey>>,
	metrics: Arc<RefreshMetrics>,
	scheduler: SchedulerHandle,
}
impl AuthenticatedFetch {
	fn new(access_token: impl Into<TokenSecret>, options: FetchOptions) -> Result<Self> {
		let FetchOptions {
			dpop_key,
			refresh,
			expires_in,
			event_sink,
			transport,
			timing,
			report_unhandled_refresh_errors,
		} = options;
		let transport = match transport {
			Some(transport) => transport,
			None => default_transport()?,
		};
		let key = dpop_key.map(Arc::new);
		let metrics = Arc::new(RefreshMetrics::default());
		let initial = TokenState {
			access_token: access_token.into(),
			refresh_token: refresh.as_ref().map(RefreshDescriptor::refresh_token),
			expires_in,
		};
		let scheduler = RefreshScheduler::spawn(initial, SchedulerConfig {
			descriptor: refresh,
			key: key.clone(),
			sink: event_sink.unwrap_or_else(|| Arc::new(NoopEventSink)),
			timing,
			report_unhandled: report_unhandled_refresh_errors,
			metrics: metrics.clone(),
		})?;

		Ok(Self(Arc::new(FetchInner { transport, key, metrics, scheduler })))
	}

	/// Sends an authenticated request to `url`.
	///
	/// Responses are returned as-is, including `4xx`/`5xx` ones. The only exception: in DPoP mode,
	/// a `401`/`403` served from a different URL than the one requested (the transport followed
	/// a redirect) is replayed once against that final URL with a proof bound to it. Bearer
	/// tokens are not URL-bound, so Bearer mode never retries.
	pub async fn fetch(&self, url: Url, options: RequestOptions) -> Result<FetchResponse> {
		const KIND: FlowKind = FlowKind::Fetch;

		let span = FlowSpan::new(KIND, "fetch");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.fetch_with_redirect_retry(url, options)).await;

		obs::record_result(KIND, result)
	}

	/// Sends an authenticated `GET` to `url`.
	pub async fn get(&self, url: Url) -> Result<FetchResponse> {
		self.fetch(url, RequestOptions::default()).await
	}

	/// Snapshot of the current token state.
	pub fn current_token(&self) -> Arc<TokenState> {
		self.0.scheduler.tokens.borrow().clone()
	}

	/// Receiver notified every time the scheduler publishes a new token state.
	pub fn subscribe_tokens(&self) -> watch::Receiver<Arc<TokenState>> {
		self.0.scheduler.tokens.clone()
	}

	/// Current state of the refresh scheduler.
	pub fn scheduler_state(&self) -> SchedulerState {
		*self.0.scheduler.state.borrow()
	}

	/// Refresh counters of this session.
	pub fn refresh_metrics(&self) -> &RefreshMetrics {
		&self.0.metrics
	}

	/// Returns `true` when requests carry DPoP proofs.
	pub fn is_dpop(&self) -> bool {
		self.0.key.is_some()
	}

	async fn fetch_with_redirect_retry(
		&self,
		url: Url,
		options: RequestOptions,
	) -> Result<FetchResponse> {
		let inner = &self.0;
		let token = self.current_token();
		let response = issue(
			inner.transport.as_ref(),
			&token.access_token,
			url.clone(),
			&options,
			inner.key.as_deref(),
		)
		.await?;

		if !response.is_auth_error() || response.url == url {
			return Ok(response);
		}

		let Some(key) = inner.key.as_deref() else {
			return Ok(response);
		};
		let span = FlowSpan::new(FlowKind::Retry, "redirected_auth_failure");

		obs::record_flow_outcome(FlowKind::Retry, FlowOutcome::Attempt);

		let token = self.current_token();
		let retried = span
			.instrument(issue(
				inner.transport.as_ref(),
				&token.access_token,
				response.url,
				&options,
				Some(key),
			))
			.await;

		obs::record_result(FlowKind::Retry, retried)
	}
}
impl Debug for AuthenticatedFetch {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthenticatedFetch")
			.field("dpop", &self.is_dpop())
			.field("scheduler_state", &self.scheduler_state())
			.finish_non_exhaustive()
	}
}

#[cfg(feature = "reqwest")]
fn default_transport() -> Result<Arc<dyn Transport>> {
	let client = ReqwestClient::builder().build().map_err(ConfigError::from)?;

	Ok(Arc::new(crate::http::ReqwestTransport::with_client(client)))
}

#[cfg(not(feature = "reqwest"))]
fn default_transport() -> Result<Arc<dyn Transport>> {
	Err(ConfigError::MissingTransport.into())
}
