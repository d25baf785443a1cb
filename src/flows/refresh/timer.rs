//! Cancellable one-shot timers with a single live slot.

// crates.io
use tokio::{sync::mpsc::UnboundedSender, task::JoinHandle};
// self
use crate::{_prelude::*, event::TimerId};

/// A timer that sends its id on the tick channel once its delay elapses.
///
/// Dropping the timer cancels it.
#[derive(Debug)]
pub(crate) struct ScheduledTimer {
	id: TimerId,
	task: JoinHandle<()>,
}
impl ScheduledTimer {
	fn cancel(&self) {
		self.task.abort();
	}
}
impl Drop for ScheduledTimer {
	fn drop(&mut self) {
		self.task.abort();
	}
}

/// Owns the only live [`ScheduledTimer`] of a scheduler.
///
/// Arming always cancels the previous timer before the new one starts, so two timers are never
/// live at once and a stale tick can be recognised by its id.
#[derive(Debug)]
pub(crate) struct TimerSlot {
	ticks: UnboundedSender<TimerId>,
	live: Option<ScheduledTimer>,
	next_id: u64,
}
impl TimerSlot {
	pub(crate) fn new(ticks: UnboundedSender<TimerId>) -> Self {
		Self { ticks, live: None, next_id: 0 }
	}

	/// Cancels the live timer, if any, then arms a new one firing after `delay`.
	///
	/// Must be called from within a Tokio runtime.
	pub(crate) fn arm(&mut self, delay: StdDuration) -> TimerId {
		self.cancel();

		self.next_id += 1;

		let id = TimerId(self.next_id);
		let ticks = self.ticks.clone();
		let task = tokio::spawn(async move {
			tokio::time::sleep(delay).await;

			let _ = ticks.send(id);
		});

		self.live = Some(ScheduledTimer { id, task });

		id
	}

	/// Cancels the live timer and returns its id.
	pub(crate) fn cancel(&mut self) -> Option<TimerId> {
		self.live.take().map(|timer| {
			timer.cancel();

			timer.id
		})
	}

	pub(crate) fn live(&self) -> Option<TimerId> {
		self.live.as_ref().map(|timer| timer.id)
	}

	pub(crate) fn is_live(&self, id: TimerId) -> bool {
		self.live() == Some(id)
	}

	#[cfg(test)]
	pub(crate) fn ticks(&self) -> UnboundedSender<TimerId> {
		self.ticks.clone()
	}
}
