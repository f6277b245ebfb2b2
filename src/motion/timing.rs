//! Integer conversions between speeds, timer values and ramp step counts.
//!
//! Acceleration is expressed through a start timer `t0`: the constant
//! acceleration is `a = (F / t0)²` with `F` the timer frequency. Every
//! function here is integer only and safe to call next to the step interrupt.
//!
//! Step counts derived from a continuous speed are scaled by the calibration
//! ratio [`CALIBRATION_NUM`]`/`[`CALIBRATION_DEN`]. It compensates the bias
//! between the discrete timer recurrence used during execution and the
//! continuous `v² = 2·a·s` relation. The value is measured, not derived.

use crate::config::units::{
    speed_to_timer, timer_of_frequency, MDist, StepRate, Timer, MAX_INTERRUPT_SPEED, TIMER_MAX_SPEED,
};

/// Numerator of the ramp calibration ratio.
pub const CALIBRATION_NUM: u64 = 93;

/// Denominator of the ramp calibration ratio.
pub const CALIBRATION_DEN: u64 = 85;

/// Longest ramp, in steps, the timer functions accept.
pub const MAX_ACC_DEC_STEPS: MDist = 0x0100_0000;

/// Start timers above this value use the coarse calibration branch.
const COARSE_START_TIMER: Timer = 6795;

/// Largest number of pulses emitted per scheduling tick.
pub const MAX_STEP_MULTIPLIER: u8 = 7;

/// Integer square root.
pub fn isqrt(value: u64) -> u64 {
    if value < 2 {
        return value;
    }
    // Newton iteration from an upper bound.
    let mut x = 1u64 << ((64 - value.leading_zeros() + 1) / 2);
    loop {
        let y = (x + value / x) / 2;
        if y >= x {
            return x;
        }
        x = y;
    }
}

/// `value * mul / div` without intermediate overflow.
#[inline]
pub fn mul_div(value: u32, mul: u32, div: u32) -> u32 {
    if div == 0 {
        return u32::MAX;
    }
    (u64::from(value) * u64::from(mul) / u64::from(div)).min(u64::from(u32::MAX)) as u32
}

/// Rounded `value * mul / div`.
#[inline]
pub fn round_mul_div(value: u64, mul: u64, div: u64) -> u64 {
    if div == 0 {
        return 0;
    }
    (value * mul + div / 2) / div
}

/// Acceleration (steps/s²) belonging to the start timer `timer_start`.
#[inline]
pub fn acceleration_from_timer(timer_start: Timer) -> u64 {
    let v0 = u64::from(speed_to_timer(timer_start));
    v0 * v0
}

#[inline]
fn calibrated(ad: u64) -> u64 {
    ad / CALIBRATION_NUM * CALIBRATION_DEN
}

#[inline]
fn timer_from_speed_sq(speed_sq: u64) -> Timer {
    let v = isqrt(speed_sq).min(u64::from(u32::MAX)) as StepRate;
    speed_to_timer(v).saturating_add(1)
}

/// `2·a·steps` for a ramp of `steps` steps, `None` on overflow.
fn two_a_s(steps: MDist, timer_start: Timer) -> Option<u64> {
    let steps = steps.min(MAX_ACC_DEC_STEPS);
    let a2 = acceleration_from_timer(timer_start).checked_mul(2)?;
    a2.checked_mul(u64::from(steps))
}

/// Timer value reached after accelerating `steps` steps from standstill.
pub fn get_timer(steps: MDist, timer_start: Timer) -> Timer {
    match two_a_s(steps, timer_start) {
        Some(ad) => timer_from_speed_sq(calibrated(ad)),
        None => TIMER_MAX_SPEED,
    }
}

/// Timer value reached after accelerating `steps` steps starting at `timer_v0`.
pub fn get_timer_accelerating(steps: MDist, timer_v0: Timer, timer_start: Timer) -> Timer {
    let v0 = u64::from(speed_to_timer(timer_v0));
    match two_a_s(steps, timer_start) {
        Some(ad) => timer_from_speed_sq(v0 * v0 + calibrated(ad)),
        None => TIMER_MAX_SPEED,
    }
}

/// Steps needed to accelerate from standstill to `timer`.
pub fn get_acc_steps(timer: Timer, timer_start: Timer) -> MDist {
    let t = u64::from(timer);
    let sq_a2 = t.saturating_mul(t.saturating_sub(1)).saturating_mul(2).max(1);
    let ts = u64::from(timer_start);
    let sq_b = if timer_start > COARSE_START_TIMER {
        (ts * ts / 128) * CALIBRATION_NUM / CALIBRATION_DEN * 128
    } else {
        ts * ts * CALIBRATION_NUM / CALIBRATION_DEN
    };
    (sq_b / sq_a2).min(u64::from(MDist::MAX)) as MDist
}

/// Steps needed to decelerate from `timer` to standstill.
#[inline]
pub fn get_dec_steps(timer: Timer, timer_start: Timer) -> MDist {
    get_acc_steps(timer, timer_start)
}

/// Steps needed to change speed between `timer1` and `timer2`.
pub fn get_acc_steps_between(timer1: Timer, timer2: Timer, timer_start: Timer) -> MDist {
    let (slow, fast) = if timer2 > timer1 {
        (timer2, timer1)
    } else {
        (timer1, timer2)
    };
    get_acc_steps(fast, timer_start).saturating_sub(get_acc_steps(slow, timer_start))
}

/// Pulses emitted per scheduling tick for a move running at `timer_max`.
///
/// Above [`MAX_INTERRUPT_SPEED`] ticks per second several pulses are
/// emitted at once so the interrupt rate stays bounded.
pub fn step_multiplier(timer_max: Timer) -> u8 {
    let mut multiplier = 1u8;
    while multiplier < MAX_STEP_MULTIPLIER {
        if timer_max >= timer_of_frequency(MAX_INTERRUPT_SPEED * u32::from(multiplier)) {
            return multiplier;
        }
        multiplier += 1;
    }
    MAX_STEP_MULTIPLIER
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::units::TIMER_STANDSTILL;

    #[test]
    fn test_isqrt() {
        for v in [0u64, 1, 2, 3, 4, 15, 16, 17, 99, 100, 1 << 40, u64::MAX] {
            let r = isqrt(v);
            assert!(r * r <= v, "isqrt({v}) = {r}");
            assert!((r + 1).checked_mul(r + 1).map_or(true, |sq| sq > v));
        }
    }

    #[test]
    fn test_get_timer_known_values() {
        // v0 = 350 steps/s, 1000 steps of acceleration
        assert_eq!(get_timer(1000, 5714), 134);
        assert_eq!(get_acc_steps(134, 5714), 1002);
        assert_eq!(get_acc_steps(200, 5714), 448);
    }

    #[test]
    fn test_get_timer_zero_steps_is_standstill() {
        assert_eq!(get_timer(0, 5714), TIMER_STANDSTILL);
    }

    #[test]
    fn test_accelerating_is_faster() {
        let t = get_timer_accelerating(100, 1000, 5714);
        assert!(t < 1000);
    }

    #[test]
    fn test_acc_steps_between() {
        let a = get_acc_steps_between(400, 200, 5714);
        let b = get_acc_steps_between(200, 400, 5714);
        assert_eq!(a, b);
        assert_eq!(a, get_acc_steps(200, 5714) - get_acc_steps(400, 5714));
    }

    #[test]
    fn test_step_multiplier_thresholds() {
        assert_eq!(step_multiplier(TIMER_STANDSTILL), 1);
        assert_eq!(step_multiplier(213), 1);
        assert_eq!(step_multiplier(212), 2);
        assert_eq!(step_multiplier(106), 2);
        assert_eq!(step_multiplier(35), 6);
        assert_eq!(step_multiplier(34), 7);
        assert_eq!(step_multiplier(1), 7);
    }
}
