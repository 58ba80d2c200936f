//! Power button
//!
//! Press time is taken on assert; on deassert the hold time decides between
//! `Released(elapsed_us)` and `PressedLong`. Only a hold strictly longer than
//! the threshold is a long press.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use super::ButtonBase;

/// Result of a completed press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressOutcome {
    Released { elapsed: Duration },
    LongPressed { elapsed: Duration },
}

/// Classify a hold time against the long-press threshold
pub fn classify(elapsed: Duration, threshold: Duration) -> PressOutcome {
    if elapsed > threshold {
        PressOutcome::LongPressed { elapsed }
    } else {
        PressOutcome::Released { elapsed }
    }
}

/// Idle / pressed state machine for the power button
#[derive(Debug)]
pub struct PowerTiming {
    threshold: Duration,
    pressed_at: Option<Instant>,
}

impl PowerTiming {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            pressed_at: None,
        }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed_at.is_some()
    }

    /// Record an assert. A second assert restarts the hold.
    pub fn press(&mut self, now: Instant) {
        self.pressed_at = Some(now);
    }

    /// Record a deassert. `None` when no press is in progress.
    pub fn release(&mut self, now: Instant) -> Option<PressOutcome> {
        let pressed_at = self.pressed_at.take()?;
        Some(classify(now.saturating_duration_since(pressed_at), self.threshold))
    }
}

pub struct PowerButton {
    pub(super) base: ButtonBase,
    timing: Mutex<PowerTiming>,
}

impl PowerButton {
    pub fn new(base: ButtonBase, long_press: Duration) -> Self {
        Self {
            base,
            timing: Mutex::new(PowerTiming::new(long_press)),
        }
    }

    pub fn is_pressed(&self) -> bool {
        self.timing.lock().is_pressed()
    }

    pub fn handle_event(&self, asserted: bool) {
        if asserted {
            debug!("POWER_BUTTON: pressed");
            self.timing.lock().press(Instant::now());
            self.base.emit_pressed();
            return;
        }

        let outcome = self.timing.lock().release(Instant::now());
        match outcome {
            Some(PressOutcome::Released { elapsed }) => {
                debug!("POWER_BUTTON: released after {:?}", elapsed);
                self.base.emit_released(Some(elapsed.as_micros() as u64));
            }
            Some(PressOutcome::LongPressed { elapsed }) => {
                debug!("POWER_BUTTON: long press ({:?})", elapsed);
                self.base.emit_pressed_long();
            }
            None => debug!("POWER_BUTTON: release without press, ignored"),
        }
    }

    pub fn simulate_press(&self) {
        self.base.emit_pressed();
    }

    pub fn simulate_long_press(&self) {
        self.base.emit_pressed_long();
    }
}
