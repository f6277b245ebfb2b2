//! Hardware boundary of the engine.
//!
//! A board implements [`StepperHal`] once; the engine calls it from both
//! interrupt and thread context. Every method must be short and must not
//! call back into the engine.

use crate::config::units::{AxisMask, Timer, NUM_AXIS};

use super::event::{StepperEvent, WaitType};

/// What a spinning caller does on each iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WaitAction {
    /// The step timer interrupt runs elsewhere: just spin again.
    Yield,
    /// No interrupt will run while the caller spins: service one timer
    /// expiry (and the background refill) from the waiting caller.
    ServiceTimer,
}

/// Board-specific services used by the engine.
pub trait StepperHal {
    /// Ticks the timer interrupt spends before the timer is re-armed.
    const TIMER_OVERHEAD: Timer = 0;

    /// Emit `pulses[axis]` step pulses on every axis.
    ///
    /// `direction_up` holds the direction of every axis after inversion.
    /// Direction pins only need to be written if `direction_changed`.
    fn step(&mut self, pulses: [u8; NUM_AXIS], direction_up: AxisMask, direction_changed: bool);

    /// Arm the one-shot step timer to fire after `ticks` ticks.
    fn start_timer(&mut self, ticks: Timer);

    /// Free running millisecond clock.
    fn millis(&self) -> u32;

    /// Current level of reference input `reference` (`axis * 2`, `+ 1` for max).
    fn reference_level(&mut self, reference: usize) -> bool;

    /// Drive the enable output of `axis`; 0 is off, 255 full power.
    fn set_enable(&mut self, axis: usize, level: u8);

    /// Schedule the background refill.
    ///
    /// Only called when the engine runs with
    /// [`BackgroundMode::Deferred`](crate::config::BackgroundMode::Deferred).
    fn request_background(&mut self) {}

    /// Notification hook.
    fn on_event(&mut self, _event: &StepperEvent) {}

    /// Called on every iteration of a spinning engine call.
    fn on_wait(&mut self, kind: WaitType) -> WaitAction {
        self.on_event(&StepperEvent::Wait(kind));
        WaitAction::ServiceTimer
    }
}
