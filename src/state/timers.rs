//! Named, cancellable timers
//!
//! Each slot holds at most one armed timer. Expiry is delivered through the
//! input queue tagged with the arming generation, so an expiry that was
//! already queued when its timer got cancelled is recognised and dropped.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::events::Input;

/// The timers the state machine uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerSlot {
    /// Delays a presence-triggered session start
    SessionStartDebounce,
    /// How long the congratulations overlay stays up
    CongratsDisplay,
}

struct ArmedTimer {
    generation: u64,
    task: JoinHandle<()>,
}

/// Timer slots owned by the state machine
pub struct PendingTimers {
    debounce: Option<ArmedTimer>,
    congrats: Option<ArmedTimer>,
    generation: u64,
    input_tx: mpsc::Sender<Input>,
}

impl PendingTimers {
    pub fn new(input_tx: mpsc::Sender<Input>) -> Self {
        Self {
            debounce: None,
            congrats: None,
            generation: 0,
            input_tx,
        }
    }

    /// Arm a slot, replacing whatever was armed there
    pub fn arm(&mut self, slot: TimerSlot, delay: Duration) {
        self.cancel(slot);

        self.generation += 1;
        let generation = self.generation;
        let tx = self.input_tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Input::TimerFired { slot, generation }).await;
        });

        debug!(?slot, delay_ms = delay.as_millis() as u64, "timer armed");
        *self.slot_mut(slot) = Some(ArmedTimer { generation, task });
    }

    /// Disarm a slot; returns whether a timer was armed
    pub fn cancel(&mut self, slot: TimerSlot) -> bool {
        match self.slot_mut(slot).take() {
            Some(timer) => {
                timer.task.abort();
                debug!(?slot, "timer cancelled");
                true
            }
            None => false,
        }
    }

    pub fn is_armed(&self, slot: TimerSlot) -> bool {
        match slot {
            TimerSlot::SessionStartDebounce => self.debounce.is_some(),
            TimerSlot::CongratsDisplay => self.congrats.is_some(),
        }
    }

    /// Accept an expiry; false when it belongs to a cancelled or replaced arming
    pub fn fire(&mut self, slot: TimerSlot, generation: u64) -> bool {
        let current = self.slot_mut(slot);
        if current
            .as_ref()
            .is_some_and(|timer| timer.generation == generation)
        {
            *current = None;
            true
        } else {
            false
        }
    }

    fn slot_mut(&mut self, slot: TimerSlot) -> &mut Option<ArmedTimer> {
        match slot {
            TimerSlot::SessionStartDebounce => &mut self.debounce,
            TimerSlot::CongratsDisplay => &mut self.congrats,
        }
    }
}

impl Drop for PendingTimers {
    fn drop(&mut self) {
        for timer in [self.debounce.take(), self.congrats.take()].into_iter().flatten() {
            timer.task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_timers() -> (PendingTimers, mpsc::Receiver<Input>) {
        let (tx, rx) = mpsc::channel(16);
        (PendingTimers::new(tx), rx)
    }

    async fn expect_fired(rx: &mut mpsc::Receiver<Input>) -> (TimerSlot, u64) {
        match rx.recv().await {
            Some(Input::TimerFired { slot, generation }) => (slot, generation),
            other => panic!("expected timer expiry, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay() {
        let (mut timers, mut rx) = create_timers();
        timers.arm(TimerSlot::CongratsDisplay, Duration::from_millis(4000));
        assert!(timers.is_armed(TimerSlot::CongratsDisplay));

        let started = tokio::time::Instant::now();
        let (slot, generation) = expect_fired(&mut rx).await;
        assert_eq!(slot, TimerSlot::CongratsDisplay);
        assert!(started.elapsed() >= Duration::from_millis(4000));

        assert!(timers.fire(slot, generation));
        assert!(!timers.is_armed(TimerSlot::CongratsDisplay));
        // Only once
        assert!(!timers.fire(slot, generation));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_previous() {
        let (mut timers, mut rx) = create_timers();
        timers.arm(TimerSlot::SessionStartDebounce, Duration::from_millis(3000));
        tokio::time::sleep(Duration::from_millis(1000)).await;
        timers.arm(TimerSlot::SessionStartDebounce, Duration::from_millis(3000));

        let started = tokio::time::Instant::now();
        let (slot, generation) = expect_fired(&mut rx).await;
        assert!(started.elapsed() >= Duration::from_millis(3000));
        assert!(timers.fire(slot, generation));

        tokio::time::sleep(Duration::from_millis(10_000)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_expiry() {
        let (mut timers, mut rx) = create_timers();
        timers.arm(TimerSlot::SessionStartDebounce, Duration::from_millis(3000));
        assert!(timers.cancel(TimerSlot::SessionStartDebounce));
        assert!(!timers.cancel(TimerSlot::SessionStartDebounce));

        tokio::time::sleep(Duration::from_millis(10_000)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_expiry_of_cancelled_timer_rejected() {
        let (mut timers, mut rx) = create_timers();
        timers.arm(TimerSlot::SessionStartDebounce, Duration::from_millis(10));
        let (slot, generation) = expect_fired(&mut rx).await;

        // Cancelled after the expiry was queued but before it was handled
        timers.cancel(TimerSlot::SessionStartDebounce);
        assert!(!timers.fire(slot, generation));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slots_are_independent() {
        let (mut timers, _rx) = create_timers();
        timers.arm(TimerSlot::SessionStartDebounce, Duration::from_millis(3000));
        timers.arm(TimerSlot::CongratsDisplay, Duration::from_millis(4000));
        timers.cancel(TimerSlot::SessionStartDebounce);

        assert!(!timers.is_armed(TimerSlot::SessionStartDebounce));
        assert!(timers.is_armed(TimerSlot::CongratsDisplay));
    }
}
