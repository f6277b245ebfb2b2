//! Trapezoidal speed ramp of one move.

use crate::config::units::{MDist, Timer};

use super::timing::{get_acc_steps, get_acc_steps_between, get_dec_steps, round_mul_div};

/// Acceleration and deceleration start timers of a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AccDec {
    /// Start timer of the acceleration (`a = (F / acc)²`).
    pub acc: Timer,
    /// Start timer of the deceleration.
    pub dec: Timer,
}

/// Trapezoidal profile: accelerate, run, decelerate.
///
/// When a move starts or ends at a non-zero junction speed the up or down
/// phase begins part-way into a virtual ramp from standstill;
/// `n_up_offset` / `n_down_offset` hold that entry point in steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Ramp {
    /// Timer at the first step.
    pub timer_start: Timer,
    /// Timer of the plateau.
    pub timer_run: Timer,
    /// Timer at the last step.
    pub timer_stop: Timer,
    /// Steps from `timer_start` to `timer_run`.
    pub up_steps: MDist,
    /// Steps from `timer_run` to `timer_stop`.
    pub down_steps: MDist,
    /// Step index where the down phase begins.
    pub down_start_at: MDist,
    /// Offset into the up ramp.
    pub n_up_offset: MDist,
    /// Offset into the down ramp.
    pub n_down_offset: MDist,
}

impl Ramp {
    /// Compute the up phase reaching `timer_run` from a junction timer.
    pub fn ramp_up(&mut self, timers: AccDec, timer_run: Timer, timer_junction: Timer) {
        self.timer_run = timer_run;
        if timer_junction >= timers.acc {
            // from standstill
            self.timer_start = timers.acc.max(timer_run);
            self.n_up_offset = 0;
            self.up_steps = get_acc_steps(timer_run, timers.acc);
        } else {
            self.timer_start = timer_junction;
            if self.timer_start >= timer_run {
                // accelerate from the junction speed
                self.n_up_offset = get_acc_steps(self.timer_start, timers.acc);
                self.up_steps = get_acc_steps_between(self.timer_start, timer_run, timers.acc);
            } else {
                // entering faster than the plateau: slow down with the dec timer
                self.n_up_offset = get_dec_steps(self.timer_start, timers.dec);
                self.up_steps = get_acc_steps_between(self.timer_start, timer_run, timers.dec);
            }
        }
    }

    /// Compute the down phase from `timer_run` to a junction timer.
    ///
    /// Requires [`ramp_up`](Self::ramp_up) to have set `timer_run`.
    pub fn ramp_down(&mut self, steps: MDist, timers: AccDec, timer_junction: Timer) {
        if timer_junction >= timers.dec {
            // to standstill
            self.timer_stop = timers.dec.max(self.timer_run);
            self.down_steps = get_dec_steps(self.timer_run, timers.dec);
            self.down_start_at = steps.wrapping_sub(self.down_steps);
            self.n_down_offset = 0;
        } else {
            self.timer_stop = timer_junction;
            if self.timer_stop >= self.timer_run {
                // decelerate down to the junction speed
                self.n_down_offset = get_dec_steps(self.timer_stop, timers.dec);
                self.down_steps = get_dec_steps(self.timer_run, timers.dec);
                self.down_start_at = steps
                    .wrapping_sub(self.down_steps)
                    .wrapping_add(self.n_down_offset);
            } else {
                // leaving faster than the plateau: speed up with the acc timer
                self.n_down_offset = get_acc_steps(self.timer_stop, timers.acc);
                let accelerate = get_acc_steps_between(self.timer_stop, self.timer_run, timers.acc);
                self.down_start_at = steps.wrapping_sub(accelerate);
            }
        }
        // down_start_at may wrap below zero here; ramp_run trims it back
        self.down_steps = steps.wrapping_sub(self.down_start_at);
    }

    /// Trim up and down phases if together they exceed `steps`.
    ///
    /// The excess is split in proportion to the square of each phase's
    /// start timer, so both phases keep `steps ∝ v²`.
    pub fn ramp_run(&mut self, steps: MDist, timers: AccDec) {
        if self.up_steps <= steps && steps - self.up_steps >= self.down_steps {
            return;
        }

        let too_many = u64::from(self.up_steps) + u64::from(self.down_steps) - u64::from(steps);
        let up_timer = u64::from(self.phase_timer(self.timer_start > self.timer_run, timers));
        let down_timer = u64::from(self.phase_timer(self.timer_stop < self.timer_run, timers));
        let sq_up = up_timer * up_timer;
        let sq_down = down_timer * down_timer;

        let up = u64::from(self.up_steps);
        let down = u64::from(self.down_steps);
        let mut sub_up = round_mul_div(too_many, sq_up, sq_up + sq_down);
        if sub_up > up {
            sub_up = up;
        } else if too_many - sub_up > down {
            sub_up = too_many - down;
        }

        self.up_steps = (up - sub_up) as MDist;
        self.down_steps = (down - (too_many - sub_up)) as MDist;
        self.down_start_at = steps - self.down_steps;
    }

    #[inline]
    fn phase_timer(&self, accelerating: bool, timers: AccDec) -> Timer {
        if accelerating {
            timers.acc
        } else {
            timers.dec
        }
    }

    /// Build a ramp for a move from and to the given junction timers.
    pub fn build(
        steps: MDist,
        timers: AccDec,
        timer_run: Timer,
        junction_in: Timer,
        junction_out: Timer,
    ) -> Self {
        let mut ramp = Self::default();
        ramp.ramp_up(timers, timer_run, junction_in);
        ramp.ramp_down(steps, timers, junction_out);
        ramp.ramp_run(steps, timers);
        ramp
    }

    /// Whether `up_steps + down_steps <= steps` and the down phase ends at `steps`.
    pub fn is_feasible(&self, steps: MDist) -> bool {
        u64::from(self.up_steps) + u64::from(self.down_steps) <= u64::from(steps)
            && u64::from(self.down_start_at) + u64::from(self.down_steps) == u64::from(steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::units::TIMER_STANDSTILL;

    const TIMERS: AccDec = AccDec { acc: 5714, dec: 5714 };

    #[test]
    fn test_symmetric_ramp_with_plateau() {
        let ramp = Ramp::build(1000, TIMERS, 200, TIMER_STANDSTILL, TIMER_STANDSTILL);
        assert_eq!(ramp.up_steps, 448);
        assert_eq!(ramp.down_steps, 448);
        assert_eq!(ramp.down_start_at, 552);
        assert_eq!(ramp.timer_start, 5714);
        assert_eq!(ramp.timer_stop, 5714);
        assert!(ramp.is_feasible(1000));
    }

    #[test]
    fn test_short_move_is_trimmed() {
        let ramp = Ramp::build(300, TIMERS, 200, TIMER_STANDSTILL, TIMER_STANDSTILL);
        assert_eq!(ramp.up_steps + ramp.down_steps, 300);
        assert_eq!(ramp.up_steps, 150);
        assert!(ramp.is_feasible(300));
    }

    #[test]
    fn test_junction_at_run_speed_has_no_ramp() {
        let ramp = Ramp::build(1000, TIMERS, 200, 200, 200);
        assert_eq!(ramp.up_steps, 0);
        assert_eq!(ramp.down_steps, 0);
        assert_eq!(ramp.down_start_at, 1000);
        assert_eq!(ramp.timer_start, 200);
    }

    #[test]
    fn test_junction_between_rest_and_run() {
        let ramp = Ramp::build(2000, TIMERS, 200, 400, TIMER_STANDSTILL);
        assert_eq!(ramp.n_up_offset, get_acc_steps(400, 5714));
        assert_eq!(ramp.up_steps, get_acc_steps(200, 5714) - get_acc_steps(400, 5714));
        assert!(ramp.is_feasible(2000));
    }

    #[test]
    fn test_entering_faster_than_run() {
        let ramp = Ramp::build(2000, TIMERS, 400, 200, TIMER_STANDSTILL);
        assert_eq!(ramp.timer_start, 200);
        assert_eq!(ramp.up_steps, get_dec_steps(200, 5714) - get_dec_steps(400, 5714));
        assert!(ramp.is_feasible(2000));
    }

    #[test]
    fn test_leaving_faster_than_run() {
        let ramp = Ramp::build(2000, TIMERS, 400, TIMER_STANDSTILL, 200);
        assert_eq!(ramp.timer_stop, 200);
        assert_eq!(ramp.down_steps, get_acc_steps(200, 5714) - get_acc_steps(400, 5714));
        assert_eq!(ramp.down_start_at, 2000 - ramp.down_steps);
        assert!(ramp.is_feasible(2000));
    }
}
