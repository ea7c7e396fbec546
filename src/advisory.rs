//! State shared with interrupt handlers.
//!
//! The timer and button interrupts may only touch these atomics and
//! enqueue work; the control task reads them without locking and accepts
//! a stale value for a tick.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use embassy_time::Duration;

use crate::control::{InputChannel, UserInput};

const TICK_CONNECTING: Duration = Duration::from_millis(250);
const TICK_IDLE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Button {
    /// Toggle connect.
    S1,
    /// Toggle data send.
    S2,
}

pub struct Advisory {
    discoverable: AtomicBool,
    connecting: AtomicBool,
    inactivity: AtomicU32,
    low_power: AtomicBool,
    debounce: AtomicBool,
}

impl Advisory {
    pub const fn new() -> Self {
        Self {
            discoverable: AtomicBool::new(false),
            connecting: AtomicBool::new(false),
            inactivity: AtomicU32::new(0),
            low_power: AtomicBool::new(false),
            debounce: AtomicBool::new(false),
        }
    }

    pub fn reset(&self) {
        self.discoverable.store(false, Ordering::Relaxed);
        self.connecting.store(false, Ordering::Relaxed);
        self.inactivity.store(0, Ordering::Relaxed);
        self.low_power.store(false, Ordering::Relaxed);
        self.debounce.store(false, Ordering::Relaxed);
    }

    pub fn is_discoverable(&self) -> bool {
        self.discoverable.load(Ordering::Relaxed)
    }

    pub(crate) fn set_discoverable(&self, on: bool) {
        self.discoverable.store(on, Ordering::Relaxed);
    }

    pub fn is_connecting(&self) -> bool {
        self.connecting.load(Ordering::Relaxed)
    }

    pub(crate) fn set_connecting(&self, on: bool) {
        self.connecting.store(on, Ordering::Relaxed);
    }

    pub fn inactivity(&self) -> u32 {
        self.inactivity.load(Ordering::Relaxed)
    }

    pub fn is_low_power(&self) -> bool {
        self.low_power.load(Ordering::Relaxed)
    }

    /// The tick runs faster while a connection is being set up so the
    /// indicator blinks visibly.
    pub fn tick_period(&self) -> Duration {
        if self.is_connecting() {
            TICK_CONNECTING
        } else {
            TICK_IDLE
        }
    }

    /// Timer interrupt body.
    pub fn on_timer_tick(&self, inputs: &InputChannel) {
        // the button interrupt may clear it in between
        let _ = self
            .inactivity
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_add(1));
        self.debounce.store(false, Ordering::Relaxed);
        if self.is_discoverable() {
            let _ = inputs.try_send(UserInput::DiscoverableTick);
        }
    }

    /// Button interrupt body. Returns false when the press was swallowed
    /// by debounce or the input queue was full.
    pub fn on_button(&self, button: Button, inputs: &InputChannel) -> bool {
        if self.debounce.swap(true, Ordering::Relaxed) {
            return false;
        }
        self.inactivity.store(0, Ordering::Relaxed);
        self.low_power.store(false, Ordering::Relaxed);
        let input = match button {
            Button::S1 => UserInput::ToggleConnect,
            Button::S2 => UserInput::ToggleDataSend,
        };
        inputs.try_send(input).is_ok()
    }

    /// Idle hook. Enters low power once the inactivity counter reaches
    /// `timeout`, and only once until the next button press.
    pub fn idle_check(&self, timeout: u32, inputs: &InputChannel) -> bool {
        if self.is_low_power() || self.inactivity() < timeout {
            return false;
        }
        self.low_power.store(true, Ordering::Relaxed);
        let _ = inputs.try_send(UserInput::LowPowerEntered);
        true
    }
}

impl Default for Advisory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_debounce() {
        let adv = Advisory::new();
        let inputs = InputChannel::new();
        assert!(adv.on_button(Button::S1, &inputs));
        assert!(!adv.on_button(Button::S2, &inputs));
        adv.on_timer_tick(&inputs);
        assert!(adv.on_button(Button::S2, &inputs));
        assert_eq!(inputs.try_receive().ok(), Some(UserInput::ToggleConnect));
        assert_eq!(inputs.try_receive().ok(), Some(UserInput::ToggleDataSend));
        assert!(inputs.try_receive().is_err());
    }

    #[test]
    fn test_tick_blinks_only_when_discoverable() {
        let adv = Advisory::new();
        let inputs = InputChannel::new();
        adv.on_timer_tick(&inputs);
        assert!(inputs.try_receive().is_err());
        adv.set_discoverable(true);
        adv.on_timer_tick(&inputs);
        assert_eq!(inputs.try_receive().ok(), Some(UserInput::DiscoverableTick));
        assert_eq!(adv.inactivity(), 2);
    }

    #[test]
    fn test_low_power_after_timeout() {
        let adv = Advisory::new();
        let inputs = InputChannel::new();
        for _ in 0..3 {
            assert!(!adv.idle_check(3, &inputs));
            adv.on_timer_tick(&inputs);
        }
        assert!(adv.idle_check(3, &inputs));
        assert!(adv.is_low_power());
        assert!(!adv.idle_check(3, &inputs));
        assert_eq!(inputs.try_receive().ok(), Some(UserInput::LowPowerEntered));

        adv.on_button(Button::S2, &inputs);
        assert!(!adv.is_low_power());
        assert_eq!(adv.inactivity(), 0);
    }

    #[test]
    fn test_tick_period() {
        let adv = Advisory::new();
        assert_eq!(adv.tick_period(), Duration::from_secs(1));
        adv.set_connecting(true);
        assert_eq!(adv.tick_period(), Duration::from_millis(250));
    }

    #[test]
    fn test_inactivity_counts_every_tick_and_saturates() {
        let adv = Advisory::new();
        let inputs = InputChannel::new();
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..1000 {
                        adv.on_timer_tick(&inputs);
                    }
                });
            }
        });
        assert_eq!(adv.inactivity(), 4000);

        adv.inactivity.store(u32::MAX, Ordering::Relaxed);
        adv.on_timer_tick(&inputs);
        assert_eq!(adv.inactivity(), u32::MAX);
    }
}
