//! Unit types and timing constants.
//!
//! All motion arithmetic runs on integers: speeds are steps per second,
//! delays are ticks of the step timer running at [`TIMER_FREQUENCY`].

use serde::Deserialize;

/// Number of axes the engine can drive.
pub const NUM_AXIS: usize = 6;

/// Number of reference inputs (one min and one max switch per axis).
pub const NUM_REFERENCE: usize = NUM_AXIS * 2;

/// Step timer frequency in Hz.
pub const TIMER_FREQUENCY: u32 = 2_000_000;

/// Delay in timer ticks between two scheduling events.
pub type Timer = u32;

/// Speed in steps per second.
pub type StepRate = u32;

/// Unsigned distance in steps.
pub type MDist = u32;

/// Signed machine position in steps.
pub type SDist = i32;

/// Timer value meaning "standing still" (speed zero).
pub const TIMER_STANDSTILL: Timer = Timer::MAX;

/// Smallest delay the step timer accepts.
pub const TIMER_MIN: Timer = 32;

/// Largest delay the step timer accepts.
pub const TIMER_MAX: Timer = Timer::MAX - 1;

/// Maximum step rate a single axis may be configured to.
pub const STEPRATE_MAX: StepRate = 128_000;

/// Timer value of [`STEPRATE_MAX`].
pub const TIMER_MAX_SPEED: Timer = TIMER_FREQUENCY / STEPRATE_MAX;

/// Fastest scheduling rate the step interrupt is budgeted for.
pub const MAX_INTERRUPT_SPEED: StepRate = 65_535 / 7;

/// Timer value of the idle poll while the queue is empty.
pub const IDLE_TIMER: Timer = TIMER_FREQUENCY / 31;

/// Timer value of one wait tick (10 ms).
pub const WAIT_TIMER: Timer = TIMER_FREQUENCY / 100;

/// Convert a speed into a timer value, or back.
///
/// The conversion is its own inverse: `speed_to_timer(timer)` yields the speed.
#[inline]
pub const fn speed_to_timer(speed: StepRate) -> Timer {
    if speed == 0 {
        TIMER_STANDSTILL
    } else {
        TIMER_FREQUENCY / speed
    }
}

/// Convert a timer value into a speed.
#[inline]
pub const fn timer_to_speed(timer: Timer) -> StepRate {
    speed_to_timer(timer)
}

/// Timer value of a given frequency.
#[inline]
pub const fn timer_of_frequency(freq: u32) -> Timer {
    TIMER_FREQUENCY / freq
}

/// Convert an acceleration in steps/s² to the start speed `v0` the
/// ramp calculation uses (`a = v0²`).
pub fn start_speed_from_acceleration(acceleration: f32) -> StepRate {
    if acceleration <= 0.0 {
        0
    } else {
        libm::roundf(libm::sqrtf(acceleration)) as StepRate
    }
}

/// Axis and reference-switch index helpers.
pub mod axis {
    use super::NUM_AXIS;

    /// Reference id of an axis' min (`to_min`) or max switch.
    #[inline]
    pub const fn reference_id(axis: usize, to_min: bool) -> usize {
        axis * 2 + if to_min { 0 } else { 1 }
    }

    /// Whether `axis` is a valid index.
    #[inline]
    pub const fn is_valid(axis: usize) -> bool {
        axis < NUM_AXIS
    }
}

/// Bit set of axes, bit `n` standing for axis `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(transparent)]
pub struct AxisMask(pub u8);

impl AxisMask {
    /// No axis set.
    pub const EMPTY: Self = Self(0);

    /// Whether `axis` is in the set.
    #[inline]
    pub const fn contains(self, axis: usize) -> bool {
        self.0 & (1 << axis) != 0
    }

    /// Add or remove `axis`.
    #[inline]
    pub fn set(&mut self, axis: usize, on: bool) {
        if on {
            self.0 |= 1 << axis;
        } else {
            self.0 &= !(1 << axis);
        }
    }

    /// Mask with `axis` added.
    #[inline]
    pub const fn with(self, axis: usize) -> Self {
        Self(self.0 | (1 << axis))
    }
}

/// Speed override factor, 128 is 100 %.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpeedOverride(pub u8);

impl SpeedOverride {
    /// Factor of 100 %.
    pub const NORMAL: Self = Self(128);

    /// Build from a percent value (1..=199).
    pub fn from_percent(percent: u8) -> Self {
        let raw = (u32::from(percent) * 128 + 50) / 100;
        Self(raw.clamp(1, 255) as u8)
    }

    /// Percent value of this factor.
    pub fn percent(self) -> u8 {
        ((u32::from(self.0) * 100 + 64) / 128) as u8
    }

    /// Apply to a timer value.
    #[inline]
    pub fn apply(self, timer: Timer) -> Timer {
        if self.0 == 128 {
            return timer;
        }
        let scaled = u64::from(timer) * 128 / u64::from(self.0.max(1));
        scaled.clamp(u64::from(TIMER_MIN), u64::from(TIMER_MAX)) as Timer
    }
}

impl Default for SpeedOverride {
    fn default() -> Self {
        Self::NORMAL
    }
}
