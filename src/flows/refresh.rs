//! Proactive, self-scheduling session refresh.
//!
//! [`RefreshScheduler`] runs as its own Tokio task for the lifetime of an
//! [`AuthenticatedFetch`](crate::AuthenticatedFetch). It is the only writer of the session's
//! [`TokenState`], which it publishes through a `watch` channel, so requests read a complete
//! state without waiting on a refresh. Each refresh arms the next one a little before the new
//! token expires; a classified failure stops the scheduler for good and the last token stays
//! in use until the resource server rejects it.

mod metrics;
mod timer;

pub use metrics::RefreshMetrics;

// crates.io
use tokio::{
	runtime::Handle,
	sync::{
		mpsc::{self, UnboundedReceiver},
		watch,
	},
	task::JoinHandle,
};
// self
use crate::{
	_prelude::*,
	auth::TokenState,
	error::ConfigError,
	event::{EventSink, SessionEvent, TimerId},
	flows::refresh::timer::TimerSlot,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	proof::DpopKey,
	provider::{RefreshDescriptor, RefreshError, RefreshedTokens},
};

/// Timing policy deriving the refresh delay from a token lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefreshTiming {
	/// How many seconds before expiry the refresh fires.
	pub margin: u64,
	/// Lifetime assumed when the provider does not declare `expires_in`.
	pub default_lifetime: u64,
}
impl RefreshTiming {
	/// Refresh five seconds before expiry.
	pub const REFRESH_BEFORE_EXPIRATION_SECONDS: u64 = 5;
	/// Ten minutes.
	pub const DEFAULT_EXPIRATION_TIME_SECONDS: u64 = 600;

	/// Delay before the next refresh (or expiry) for a token living `expires_in` seconds.
	///
	/// Lifetimes shorter than the margin are used as-is.
	pub fn delay_for(&self, expires_in: Option<u64>) -> StdDuration {
		let seconds = match expires_in {
			Some(lifetime) if lifetime >= self.margin => lifetime - self.margin,
			Some(lifetime) => lifetime,
			None => self.default_lifetime,
		};

		StdDuration::from_secs(seconds)
	}
}
impl Default for RefreshTiming {
	fn default() -> Self {
		Self {
			margin: Self::REFRESH_BEFORE_EXPIRATION_SECONDS,
			default_lifetime: Self::DEFAULT_EXPIRATION_TIME_SECONDS,
		}
	}
}

/// Lifecycle of the refresh scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SchedulerState {
	/// No refresh descriptor: only the expiry timer is armed.
	Idle,
	/// A refresh timer is armed.
	Scheduled,
	/// The refresh capability is being awaited.
	Refreshing,
	/// No timer is armed and none will be.
	Stopped,
}

pub(crate) struct SchedulerConfig {
	pub(crate) descriptor: Option<RefreshDescriptor>,
	pub(crate) key: Option<Arc<DpopKey>>,
	pub(crate) sink: Arc<dyn EventSink>,
	pub(crate) timing: RefreshTiming,
	pub(crate) report_unhandled: bool,
	pub(crate) metrics: Arc<RefreshMetrics>,
}

/// Read side of a running scheduler. Dropping it aborts the scheduler and its live timer.
#[derive(Debug)]
pub(crate) struct SchedulerHandle {
	pub(crate) tokens: watch::Receiver<Arc<TokenState>>,
	pub(crate) state: watch::Receiver<SchedulerState>,
	task: JoinHandle<()>,
}
impl Drop for SchedulerHandle {
	fn drop(&mut self) {
		self.task.abort();
	}
}

pub(crate) struct RefreshScheduler {
	config: SchedulerConfig,
	tokens: watch::Sender<Arc<TokenState>>,
	state: watch::Sender<SchedulerState>,
	timer: TimerSlot,
	ticks: UnboundedReceiver<TimerId>,
}
impl RefreshScheduler {
	/// Publishes `initial`, arms the first timer, and starts the scheduler task.
	///
	/// The first timer is armed before this returns, so its `TimeoutSet` event is observable
	/// as soon as construction completes.
	pub(crate) fn spawn(initial: TokenState, config: SchedulerConfig) -> Result<SchedulerHandle> {
		let runtime = Handle::try_current().map_err(|_| ConfigError::MissingRuntime)?;
		let (scheduler, tokens, state) = Self::new(initial, config);
		let task = runtime.spawn(scheduler.run());

		Ok(SchedulerHandle { tokens, state, task })
	}

	/// Must be called from within a Tokio runtime.
	fn new(
		initial: TokenState,
		config: SchedulerConfig,
	) -> (Self, watch::Receiver<Arc<TokenState>>, watch::Receiver<SchedulerState>) {
		let delay = config.timing.delay_for(initial.expires_in);
		let (tokens, tokens_rx) = watch::channel(Arc::new(initial));
		let (state, state_rx) = watch::channel(SchedulerState::Idle);
		let (ticks_tx, ticks) = mpsc::unbounded_channel();
		let mut scheduler =
			Self { config, tokens, state, timer: TimerSlot::new(ticks_tx), ticks };

		scheduler.arm(delay);

		(scheduler, tokens_rx, state_rx)
	}

	async fn run(mut self) {
		while let Some(id) = self.ticks.recv().await {
			if !self.timer.is_live(id) {
				continue;
			}

			let keep_running = match self.config.descriptor.clone() {
				Some(descriptor) => self.refresh(&descriptor).await,
				None => {
					self.expire();

					false
				},
			};

			if !keep_running {
				break;
			}
		}
	}

	fn arm(&mut self, delay: StdDuration) {
		let id = self.timer.arm(delay);
		let state = if self.config.descriptor.is_some() {
			SchedulerState::Scheduled
		} else {
			SchedulerState::Idle
		};

		self.state.send_replace(state);
		self.config.sink.emit(SessionEvent::TimeoutSet(id));
	}

	fn expire(&mut self) {
		obs::record_flow_outcome(FlowKind::Expiry, FlowOutcome::Attempt);
		obs::session_expired();
		self.timer.cancel();
		self.config.sink.emit(SessionEvent::SessionExpired);
		self.state.send_replace(SchedulerState::Stopped);
		obs::record_flow_outcome(FlowKind::Expiry, FlowOutcome::Success);
	}

	/// Performs one refresh; returns whether the scheduler keeps running.
	async fn refresh(&mut self, descriptor: &RefreshDescriptor) -> bool {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "scheduled_refresh");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.config.metrics.record_attempt();
		self.state.send_replace(SchedulerState::Refreshing);

		let refresh_token = descriptor.refresh_token();
		let key = self.config.key.as_deref().map(DpopKey::key);
		let outcome = span
			.instrument(descriptor.refresher().refresh(
				descriptor.session_id(),
				refresh_token.expose(),
				key,
			))
			.await;

		match obs::record_result(KIND, outcome) {
			Ok(tokens) => {
				self.config.metrics.record_success();
				self.apply(descriptor, tokens);

				true
			},
			Err(err) => {
				self.config.metrics.record_failure(&err);
				self.stop(descriptor, err);

				false
			},
		}
	}

	fn apply(&mut self, descriptor: &RefreshDescriptor, tokens: RefreshedTokens) {
		let RefreshedTokens { access_token, refresh_token, expires_in } = tokens;
		let sink = &self.config.sink;

		sink.emit(SessionEvent::SessionExtended(
			expires_in.unwrap_or(self.config.timing.default_lifetime),
		));

		if let Some(rotated) = &refresh_token {
			sink.emit(SessionEvent::NewRefreshToken(rotated.expose().to_owned()));
			descriptor.rotate(rotated.clone());
		}

		let refresh_token = refresh_token.or_else(|| self.tokens.borrow().refresh_token.clone());

		self.tokens.send_replace(Arc::new(TokenState { access_token, refresh_token, expires_in }));
		self.arm(self.config.timing.delay_for(expires_in));
	}

	fn stop(&mut self, descriptor: &RefreshDescriptor, err: RefreshError) {
		let sink = &self.config.sink;

		self.timer.cancel();
		obs::refresh_failure(descriptor.session_id(), &err);

		match &err {
			RefreshError::ProviderRefusal { error, description } => {
				sink.emit(SessionEvent::AuthError {
					code: error.clone(),
					description: description.clone(),
				});
				sink.emit(SessionEvent::SessionExpired);
			},
			err if err.is_missing_access_token() => sink.emit(SessionEvent::SessionExpired),
			err =>
				if self.config.report_unhandled {
					sink.emit(SessionEvent::RefreshFailed(err.to_string()));
				},
		}

		self.state.send_replace(SchedulerState::Stopped);
	}
}
