//! Enqueue API: moves, waits and I/O actions.
//!
//! Every call spins while the movement queue is full, servicing the
//! scheduler through [`StepperHal::on_wait`], and never fails for lack of
//! space. Moves that leave the soft limits are rejected before anything is
//! queued.

use crate::config::units::{
    speed_to_timer, AxisMask, MDist, SDist, StepRate, Timer, NUM_AXIS, WAIT_TIMER,
};
use crate::error::{Error, MotionError, Result};
use crate::motion::timing::round_mul_div;
use crate::motion::Movement;

use super::engine::{check_axis, StepperEngine, LEVEL_MAX};
use super::event::{Notice, StepperEvent, WaitType};
use super::hal::StepperHal;

/// Longest move queued as one entry; longer ones are split.
pub const MAX_STEPS_PER_MOVE: MDist = 0xffff;

impl<H: StepperHal> StepperEngine<H> {
    /// Queue a move of `dist` steps per axis.
    ///
    /// Axes with `directions` set move up. `timer_max` is the fastest
    /// timer of the longest axis. `step_mult` stretches the move to
    /// `step_mult` ticks per step of the longest axis.
    ///
    /// Inserts a backlash move first if an axis reverses and backlash
    /// compensation is on.
    pub fn queue_move(
        &mut self,
        dist: &[MDist; NUM_AXIS],
        directions: AxisMask,
        timer_max: Timer,
        step_mult: u8,
    ) -> Result<()> {
        self.check_runnable()?;

        let mut steps: MDist = 0;
        let mut moving = 0u8;
        for (axis, &d) in dist.iter().enumerate() {
            if d != 0 {
                moving |= 1 << axis;
                steps = steps.max(d);
            }
        }
        let direction = directions.0 & moving;

        if steps == 0 {
            debug!("empty move skipped");
            self.notice(Notice::EmptyMoveSkipped);
            return Ok(());
        }
        let steps = steps.saturating_mul(MDist::from(step_mult.max(1)));

        if self.is_backlash_enabled() && self.last_direction.0 & moving != direction {
            self.queue_backlash(dist, directions, moving, direction)?;
        }

        self.last_direction = AxisMask((self.last_direction.0 & !moving) | direction);

        self.wait_until_can_queue()?;
        let prev = self.tail_movement();
        let movement = Movement::new_move(&self.limits, prev.as_ref(), steps, dist, directions, timer_max);
        self.enqueue_and_start_timer(movement, true)
    }

    fn queue_backlash(
        &mut self,
        dist: &[MDist; NUM_AXIS],
        directions: AxisMask,
        moving: u8,
        direction: u8,
    ) -> Result<()> {
        let reversed = (self.last_direction.0 & moving) ^ direction;
        let mut backlash_dist = [0; NUM_AXIS];
        for axis in 0..NUM_AXIS {
            if reversed & (1 << axis) != 0 && dist[axis] != 0 {
                backlash_dist[axis] = self.backlash[axis];
            }
        }
        let backlash_steps = backlash_dist.iter().copied().max().unwrap_or(0);
        if backlash_steps == 0 {
            return Ok(());
        }

        debug!("backlash: {} steps", backlash_steps);
        self.notice(Notice::Backlash);
        self.wait_until_can_queue()?;
        let prev = self.tail_movement();
        let mut movement = Movement::new_move(
            &self.limits,
            prev.as_ref(),
            backlash_steps,
            &backlash_dist,
            directions,
            self.timer_backlash,
        );
        if let Some(mv) = movement.move_data_mut() {
            mv.backlash = true;
        }
        self.enqueue_and_start_timer(movement, false)
    }

    /// Queue a wait of `ticks` ticks of `timer` each.
    ///
    /// The wait also ends at the absolute clock `end_time` (ms) if given.
    /// A `conditional` wait ends as soon as neither pause nor the
    /// conditional hold is set.
    pub fn queue_wait(&mut self, ticks: MDist, timer: Timer, end_time: Option<u32>, conditional: bool) -> Result<()> {
        self.check_runnable()?;
        self.wait_until_can_queue()?;
        self.enqueue_and_start_timer(Movement::new_wait(ticks, timer, end_time, conditional), true)
    }

    /// Queue an I/O action, fired as [`StepperEvent::Io`] when it reaches the head.
    pub fn queue_io(&mut self, tool: u8, level: u16) -> Result<()> {
        self.check_runnable()?;
        self.wait_until_can_queue()?;
        self.enqueue_and_start_timer(Movement::new_io(tool, level), true)
    }

    /// Wait `sec100` hundredths of a second.
    pub fn wait(&mut self, sec100: u16) -> Result<()> {
        self.queue_wait(MDist::from(sec100), WAIT_TIMER, None, false)
    }

    /// Wait up to `sec100` hundredths of a second, ending early once the
    /// conditional hold is released.
    pub fn wait_conditional(&mut self, sec100: u16) -> Result<()> {
        self.queue_wait(MDist::from(sec100), WAIT_TIMER, None, true)
    }

    /// Wait until the millisecond clock reaches `clock_ms`.
    pub fn wait_clock(&mut self, clock_ms: u32) -> Result<()> {
        self.queue_wait(MDist::MAX, WAIT_TIMER, Some(clock_ms), false)
    }

    /// Queue an I/O action.
    pub fn io_control(&mut self, tool: u8, level: u16) -> Result<()> {
        self.queue_io(tool, level)
    }

    // ---------------------------------------------------------------
    // Position based helpers

    /// Move all axes to absolute positions `target`. `v_max` of 0 uses the default speed.
    pub fn move_abs(&mut self, target: &[SDist; NUM_AXIS], v_max: StepRate) -> Result<()> {
        let mut dist = [0; NUM_AXIS];
        let mut directions = AxisMask::EMPTY;
        for axis in 0..NUM_AXIS {
            let from = self.calculated_position[axis];
            let to = target[axis];
            directions.set(axis, to >= from);
            dist[axis] = to.abs_diff(from);
        }
        self.queue_and_split_step(&dist, directions, v_max)
    }

    /// Move all axes by `delta`. `v_max` of 0 uses the default speed.
    pub fn move_rel(&mut self, delta: &[SDist; NUM_AXIS], v_max: StepRate) -> Result<()> {
        let mut dist = [0; NUM_AXIS];
        let mut directions = AxisMask::EMPTY;
        for axis in 0..NUM_AXIS {
            directions.set(axis, delta[axis] >= 0);
            dist[axis] = delta[axis].unsigned_abs();
        }
        self.queue_and_split_step(&dist, directions, v_max)
    }

    /// Move `axis` to absolute position `target`, other axes stay.
    pub fn move_abs_axis(&mut self, axis: usize, target: SDist, v_max: StepRate) -> Result<()> {
        check_axis(axis)?;
        let mut positions = self.calculated_position;
        positions[axis] = target;
        self.move_abs(&positions, v_max)
    }

    /// Move `axis` by `delta`.
    pub fn move_rel_axis(&mut self, axis: usize, delta: SDist, v_max: StepRate) -> Result<()> {
        check_axis(axis)?;
        let mut dist = [0; NUM_AXIS];
        let mut directions = AxisMask::EMPTY;
        dist[axis] = delta.unsigned_abs();
        directions.set(axis, delta > 0);
        self.queue_and_split_step(&dist, directions, v_max)
    }

    /// Check the soft limits, update the planned position and queue the
    /// move, split into pieces of at most [`MAX_STEPS_PER_MOVE`] steps.
    ///
    /// # Errors
    ///
    /// [`MotionError::RangeLimit`] if limit checking is on and an axis would
    /// leave its soft limits; nothing is queued then.
    pub fn queue_and_split_step(&mut self, dist: &[MDist; NUM_AXIS], directions: AxisMask, v_max: StepRate) -> Result<()> {
        self.last_error = None;
        self.check_runnable()?;

        let mut target = [0; NUM_AXIS];
        for axis in 0..NUM_AXIS {
            target[axis] = next_position(self.calculated_position[axis], dist[axis], directions.contains(axis));
            if self.limit_check {
                if let Some(limit) = self.soft_limits[axis].violated_by(target[axis]) {
                    warn!("range limit on axis {}: {}", axis, target[axis]);
                    return Err(self.raise_error(Error::Motion(MotionError::RangeLimit {
                        axis,
                        position: target[axis],
                        limit,
                    })));
                }
            }
        }
        self.calculated_position = target;

        let mut timer_max = if v_max == 0 { self.timer_max_default } else { speed_to_timer(v_max) };
        // never faster than the default speed
        timer_max = timer_max.max(self.timer_max_default);

        let steps = dist.iter().copied().max().unwrap_or(0);
        self.total_steps += u64::from(steps);

        let move_count = (steps / MAX_STEPS_PER_MOVE + MDist::from(steps % MAX_STEPS_PER_MOVE != 0)).max(1);
        let mut done = [0; NUM_AXIS];
        let mut piece = [0; NUM_AXIS];
        for j in 1..move_count {
            for axis in 0..NUM_AXIS {
                let next = round_mul_div(u64::from(dist[axis]), u64::from(j), u64::from(move_count)) as MDist;
                piece[axis] = next - done[axis];
                done[axis] = next;
            }
            self.queue_move(&piece, directions, timer_max, 1)?;
        }
        for axis in 0..NUM_AXIS {
            piece[axis] = dist[axis] - done[axis];
        }
        self.queue_move(&piece, directions, timer_max, 1)
    }

    // ---------------------------------------------------------------
    // Queue mechanics

    /// Spin until the movement queue has a free slot.
    pub(super) fn wait_until_can_queue(&mut self) -> Result<()> {
        while self.movements.is_full() {
            self.pump(WaitType::MovementQueueFull);
            self.check_runnable()?;
        }
        Ok(())
    }

    /// Append `movement`, re-plan and start the timer if idle.
    ///
    /// With `wait_finish` and [`is_wait_finish_move`](Self::is_wait_finish_move)
    /// the call returns once all motion has finished.
    pub(super) fn enqueue_and_start_timer(&mut self, movement: Movement, wait_finish: bool) -> Result<()> {
        if self.movements.enqueue(movement).is_err() {
            // the caller waited for a free slot
            return Ok(());
        }
        self.optimize_movement_queue();

        if self.timer_running {
            if self.movements.count() == 1 && self.steps.is_empty() {
                self.start_movement();
            }
        } else {
            let now = self.hal.millis();
            self.timer_last_check_enable = now;
            self.timer_start_or_on_idle = now;
            for axis in 0..NUM_AXIS {
                self.time_enable[axis] = self.enable_timeout[axis];
                self.set_enable_safe(axis, LEVEL_MAX);
            }
            info!("motion start");
            self.hal.on_event(&StepperEvent::Start);

            if self.start_movement() {
                self.fill_step_buffer();
                self.step_request(false);
            } else {
                self.go_idle();
            }
        }

        if wait_finish && self.wait_finish_move {
            self.wait_busy();
        }
        Ok(())
    }
}

/// Position reached from `pos` after `dist` steps in direction `up`.
fn next_position(pos: SDist, dist: MDist, up: bool) -> SDist {
    if up {
        pos.wrapping_add_unsigned(dist)
    } else {
        pos.wrapping_sub_unsigned(dist)
    }
}
