//! Session lifecycle events and the sinks that observe them.

// crates.io
use tokio::sync::mpsc::UnboundedSender;
// self
use crate::_prelude::*;

/// Identifier of a scheduled refresh or expiry timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(pub(crate) u64);
impl TimerId {
	/// Raw numeric value; ids increase monotonically per scheduler.
	pub fn get(self) -> u64 {
		self.0
	}
}
impl Display for TimerId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "timer#{}", self.0)
	}
}

/// Notifications emitted at the session's lifecycle transition points.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
	/// The access token was refreshed; carries its lifetime in seconds.
	SessionExtended(u64),
	/// The provider rotated the refresh token.
	NewRefreshToken(String),
	/// A refresh or expiry timer was armed.
	TimeoutSet(TimerId),
	/// The provider refused to refresh the session.
	AuthError {
		/// OAuth `error` code.
		code: String,
		/// OAuth `error_description`, when supplied.
		description: Option<String>,
	},
	/// The session can no longer be renewed.
	SessionExpired,
	/// A refresh failed for an unclassified reason. Only emitted when
	/// [`FetchOptions::report_unhandled_refresh_errors`](crate::FetchOptions::report_unhandled_refresh_errors)
	/// is enabled.
	RefreshFailed(String),
}

/// Observer capability receiving [`SessionEvent`]s.
///
/// Emission happens on the scheduler task, so implementations must not block.
pub trait EventSink
where
	Self: Send + Sync,
{
	/// Receives one event.
	fn emit(&self, event: SessionEvent);
}

/// Sink that discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopEventSink;
impl EventSink for NoopEventSink {
	fn emit(&self, _event: SessionEvent) {}
}

/// Sink forwarding events into an unbounded Tokio channel.
///
/// Events emitted after the receiver is dropped are discarded.
#[derive(Clone, Debug)]
pub struct ChannelEventSink(UnboundedSender<SessionEvent>);
impl ChannelEventSink {
	/// Wraps the sending half of a channel.
	pub fn new(sender: UnboundedSender<SessionEvent>) -> Self {
		Self(sender)
	}
}
impl EventSink for ChannelEventSink {
	fn emit(&self, event: SessionEvent) {
		let _ = self.0.send(event);
	}
}
impl<F> EventSink for F
where
	F: Fn(SessionEvent) + Send + Sync,
{
	fn emit(&self, event: SessionEvent) {
		self(event)
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use tokio::sync::mpsc;
	// self
	use super::*;

	#[test]
	fn channel_sink_forwards_and_tolerates_closed_receivers() {
		let (tx, mut rx) = mpsc::unbounded_channel();
		let sink = ChannelEventSink::new(tx);

		sink.emit(SessionEvent::SessionExtended(42));

		assert_eq!(rx.try_recv().ok(), Some(SessionEvent::SessionExtended(42)));

		drop(rx);
		sink.emit(SessionEvent::SessionExpired);
	}

	#[test]
	fn closures_act_as_sinks() {
		let seen = Arc::new(Mutex::new(Vec::new()));
		let sink = {
			let seen = seen.clone();

			move |event: SessionEvent| seen.lock().push(event)
		};

		sink.emit(SessionEvent::TimeoutSet(TimerId(3)));

		assert_eq!(*seen.lock(), vec![SessionEvent::TimeoutSet(TimerId(3))]);
		assert_eq!(TimerId(3).to_string(), "timer#3");
	}
}
