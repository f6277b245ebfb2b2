//! STEP/DIR output of one axis over embedded-hal pins.
//!
//! A board's [`StepperHal::step`](super::StepperHal::step) typically holds
//! one [`StepDirPins`] per axis and forwards each axis' pulse count.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::error::{MotionError, Result};

/// Default STEP pulse width in microseconds.
pub const DEFAULT_PULSE_WIDTH_US: u32 = 2;

/// STEP and DIR pins of one driver.
///
/// Generic over:
/// - `STEP`: STEP pin type (must implement `OutputPin`)
/// - `DIR`: DIR pin type (must implement `OutputPin`)
/// - `DELAY`: Delay provider for the pulse width (must implement `DelayNs`)
pub struct StepDirPins<STEP, DIR, DELAY>
where
    STEP: OutputPin,
    DIR: OutputPin,
    DELAY: DelayNs,
{
    step_pin: STEP,
    dir_pin: DIR,
    delay: DELAY,
    pulse_width_us: u32,

    /// Level last written to DIR (cached to avoid unnecessary pin writes).
    direction_up: Option<bool>,
}

impl<STEP, DIR, DELAY> StepDirPins<STEP, DIR, DELAY>
where
    STEP: OutputPin,
    DIR: OutputPin,
    DELAY: DelayNs,
{
    /// Wrap the pins of one driver.
    pub fn new(step_pin: STEP, dir_pin: DIR, delay: DELAY) -> Self {
        Self {
            step_pin,
            dir_pin,
            delay,
            pulse_width_us: DEFAULT_PULSE_WIDTH_US,
            direction_up: None,
        }
    }

    /// Set the STEP pulse width.
    pub fn with_pulse_width_us(mut self, us: u32) -> Self {
        self.pulse_width_us = us;
        self
    }

    /// Drive DIR high for `up`, low otherwise. Skipped if already there.
    pub fn set_direction(&mut self, up: bool) -> Result<()> {
        if self.direction_up == Some(up) {
            return Ok(());
        }
        if up {
            self.dir_pin.set_high().map_err(|_| MotionError::PinError)?;
        } else {
            self.dir_pin.set_low().map_err(|_| MotionError::PinError)?;
        }
        self.direction_up = Some(up);
        Ok(())
    }

    /// Emit `count` STEP pulses.
    pub fn pulse(&mut self, count: u8) -> Result<()> {
        for _ in 0..count {
            self.step_pin.set_high().map_err(|_| MotionError::PinError)?;
            self.delay.delay_us(self.pulse_width_us);
            self.step_pin.set_low().map_err(|_| MotionError::PinError)?;
            self.delay.delay_us(self.pulse_width_us);
        }
        Ok(())
    }

    /// Set the direction, then emit `count` pulses.
    pub fn output(&mut self, count: u8, up: bool) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        self.set_direction(up)?;
        self.pulse(count)
    }

    /// Hand the pins back.
    pub fn release(self) -> (STEP, DIR, DELAY) {
        (self.step_pin, self.dir_pin, self.delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::digital::{Mock as PinMock, State as PinState, Transaction as PinTransaction};

    fn pulses(count: usize) -> Vec<PinTransaction> {
        (0..count)
            .flat_map(|_| [PinTransaction::set(PinState::High), PinTransaction::set(PinState::Low)])
            .collect()
    }

    #[test]
    fn test_direction_written_once() {
        let step = PinMock::new(&pulses(3));
        let dir = PinMock::new(&[PinTransaction::set(PinState::High)]);

        let mut pins = StepDirPins::new(step, dir, NoopDelay::new());
        pins.output(1, true).unwrap();
        pins.output(2, true).unwrap();

        let (mut step, mut dir, _) = pins.release();
        step.done();
        dir.done();
    }

    #[test]
    fn test_direction_change() {
        let step = PinMock::new(&pulses(2));
        let dir = PinMock::new(&[PinTransaction::set(PinState::Low), PinTransaction::set(PinState::High)]);

        let mut pins = StepDirPins::new(step, dir, NoopDelay::new()).with_pulse_width_us(5);
        pins.output(1, false).unwrap();
        pins.output(1, true).unwrap();

        let (mut step, mut dir, _) = pins.release();
        step.done();
        dir.done();
    }

    #[test]
    fn test_zero_count_touches_nothing() {
        let step = PinMock::new(&[]);
        let dir = PinMock::new(&[]);

        let mut pins = StepDirPins::new(step, dir, NoopDelay::new());
        pins.output(0, true).unwrap();

        let (mut step, mut dir, _) = pins.release();
        step.done();
        dir.done();
    }
}
