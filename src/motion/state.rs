//! Execution state of the movement at the head of the queue.

use crate::config::units::{MDist, Timer, NUM_AXIS};

use super::movement::{Movement, MovementKind};

/// Timer correction of the first tick of a multiplied ramp, by multiplier.
///
/// The recurrence assumes one pulse per tick; with `k` pulses the first
/// interval is scaled by `num / den` of row `k - 2`.
const FIRST_TICK_CORRECTION: [(u32, u32); 5] = [(1300, 1402), (611, 709), (322, 400), (307, 405), (289, 403)];

/// Per-move scratch state advanced on every scheduling tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MovementState {
    /// Ticks of the movement already scheduled.
    pub n: MDist,
    /// Current timer value, per pulse.
    pub timer: Timer,
    /// Division remainder carried between ticks.
    pub rest: u64,
    /// Pulses per tick.
    pub count: u8,
    /// Bresenham accumulator per axis.
    pub add: [u64; NUM_AXIS],
}

impl MovementState {
    /// Reset for `movement`, which is about to start.
    pub fn init(&mut self, movement: &Movement) {
        let (count, timer) = match &movement.kind {
            MovementKind::Move(mv) => (movement.max_step_multiplier(), mv.ramp.timer_start),
            MovementKind::Wait(wait) => (1, wait.timer),
            MovementKind::Io(_) => (1, 0),
        };
        self.count = count;
        self.timer = timer;
        let seed = u64::from((movement.steps / MDist::from(count.max(1))) >> 1);
        self.add = [seed; NUM_AXIS];
        self.n = 0;
        self.rest = 0;
    }

    /// Scale the first interval of a ramp emitting `count > 1` pulses per tick.
    pub fn correct_first_tick(&mut self) {
        if let Some(&(num, den)) = usize::from(self.count)
            .checked_sub(2)
            .and_then(|idx| FIRST_TICK_CORRECTION.get(idx))
        {
            self.timer = (u64::from(self.timer) * u64::from(num) / u64::from(den)) as Timer;
        }
    }

    /// One accelerating step of the timer recurrence `t -= 2t / (4n + 1)`.
    ///
    /// `n` is the index into the ramp from standstill. Returns `true` once
    /// `max_timer` is reached; the timer is then clamped to it.
    pub fn calc_timer_acc(&mut self, max_timer: Timer, n: MDist, count: u8) -> bool {
        if max_timer < self.timer {
            let cnt = u64::from(count);
            let divisor = (u64::from(n) * 4 + 2).saturating_sub(cnt).max(1);
            let dividend = u64::from(self.timer) * 2 * cnt + self.rest;
            self.rest = dividend % divisor;
            let quot = dividend / divisor;
            self.timer = self.timer.saturating_sub(quot.min(u64::from(Timer::MAX)) as Timer);
            if max_timer >= self.timer {
                self.timer = max_timer;
                return true;
            }
        }
        false
    }

    /// One decelerating step of the timer recurrence `t += 2t / (4n - 1)`.
    ///
    /// `n` counts the steps left until standstill. Returns `true` once
    /// `min_timer` is reached; the timer is then clamped to it.
    pub fn calc_timer_dec(&mut self, min_timer: Timer, n: MDist, count: u8) -> bool {
        if min_timer > self.timer {
            if n <= 1 {
                self.timer = min_timer;
                return true;
            }
            let cnt = u64::from(count);
            let divisor = (u64::from(n) * 4).saturating_sub(1 + cnt).max(1);
            let dividend = u64::from(self.timer) * 2 * cnt + self.rest;
            self.rest = dividend % divisor;
            let quot = dividend / divisor;
            self.timer = self.timer.saturating_add(quot.min(u64::from(Timer::MAX)) as Timer);
            if min_timer <= self.timer {
                self.timer = min_timer;
                return true;
            }
        }
        false
    }
}
