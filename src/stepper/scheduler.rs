//! Step scheduling: the timer interrupt and the background refill.
//!
//! The timer interrupt ([`StepperEngine::on_step_timer`]) pops one entry of
//! the step buffer, emits its pulses and re-arms the timer with the entry's
//! delay. The background refill advances the head movement and pushes new
//! entries until the step buffer is full. It runs right after the pulse
//! output ([`BackgroundMode::Inline`]) or is requested from the board
//! ([`BackgroundMode::Deferred`]) to run at lower priority.

use crate::buffer::{DirCount, StepBuffer};
use crate::config::units::{AxisMask, MDist, SDist, Timer, IDLE_TIMER, NUM_AXIS, TIMER_MAX};
use crate::config::BackgroundMode;
use crate::error::FatalError;
use crate::motion::{Movement, MovementKind, Phase};

use super::engine::{set_enable_level, StepperEngine, LEVEL_MAX, SYNC_STEP_BUFFER_COUNT};
use super::event::StepperEvent;
use super::hal::StepperHal;

impl<H: StepperHal> StepperEngine<H> {
    /// Step timer interrupt handler.
    ///
    /// Emits the next buffered entry, or keeps the idle poll running.
    pub fn on_step_timer(&mut self) {
        self.step_request(true);
    }

    /// Deferred background refill, requested through
    /// [`StepperHal::request_background`].
    pub fn on_background(&mut self) {
        self.fill_step_buffer();
    }

    /// Advance the head movement until the step buffer is full.
    pub fn fill_step_buffer(&mut self) {
        self.background_pending = false;
        while !self.movements.is_empty() {
            if !self.calc_next_steps(true) {
                break;
            }
            if self.movements.head().is_some_and(Movement::is_finished) {
                self.movements.dequeue();
            }
        }
        self.update_enable_timeout();
    }

    /// Push at most one step-buffer entry.
    ///
    /// Returns `false` once nothing more can be pushed now, either because
    /// the step buffer is full or the queue is empty. Lets a caller refill
    /// in short slices it can preempt.
    pub fn fill_step_buffer_once(&mut self) -> bool {
        self.background_pending = false;
        let more = !self.movements.is_empty() && self.calc_next_steps(false);
        if more && self.movements.head().is_some_and(Movement::is_finished) {
            self.movements.dequeue();
        }
        if !more {
            self.update_enable_timeout();
        }
        more
    }

    /// Begin the head movement. Returns `false` if it finished at once.
    pub(super) fn start_movement(&mut self) -> bool {
        self.calc_next_steps(false);
        if self.movements.head().is_some_and(Movement::is_finished) {
            self.movements.dequeue();
            false
        } else {
            true
        }
    }

    /// Timer expiry: output one entry, then schedule the refill.
    ///
    /// `isr` is `false` for the first call that starts the timer from idle.
    pub(super) fn step_request(&mut self, isr: bool) {
        if isr && !self.timer_running {
            self.continue_idle();
            return;
        }
        let Some(entry) = self.steps.head().copied() else {
            self.go_idle();
            return;
        };
        if self.emergency_stop {
            self.abort_move();
            return;
        }

        self.step_out(entry);

        if self.check_reference {
            if let Some(reference) = self.hit_reference() {
                error!("unexpected reference {}", reference);
                self.raise_fatal(FatalError::UnexpectedReference { reference });
                self.emergency_stop();
                return;
            }
        }

        match self.background {
            BackgroundMode::Inline => self.fill_step_buffer(),
            BackgroundMode::Deferred => {
                if self.background_pending {
                    self.isr_busy_count = self.isr_busy_count.wrapping_add(1);
                } else {
                    self.background_pending = true;
                    self.hal.request_background();
                }
            }
        }
    }

    fn step_out(&mut self, entry: StepBuffer) {
        self.hal.start_timer(entry.timer.saturating_sub(H::TIMER_OVERHEAD));
        self.timer_running = true;

        let dc = entry.dir_count;
        let mut pulses = [0u8; NUM_AXIS];
        let mut direction_up = self.last_direction_up.unwrap_or(AxisMask::EMPTY);
        let mut any = false;
        for axis in 0..NUM_AXIS {
            let count = dc.count(axis);
            if count == 0 {
                continue;
            }
            any = true;
            pulses[axis] = count;
            let up = dc.direction_up(axis);
            direction_up.set(axis, up);
            if !dc.is_no_count() {
                let delta = SDist::from(count);
                let pos = &mut self.current_position[axis];
                *pos = if up { pos.wrapping_add(delta) } else { pos.wrapping_sub(delta) };
            }
        }
        self.steps.dequeue();

        if any {
            let changed = self.last_direction_up != Some(direction_up);
            self.last_direction_up = Some(direction_up);
            self.hal
                .step(pulses, AxisMask(direction_up.0 ^ self.invert_direction.0), changed);
        }
    }

    /// Advance the head movement by one tick, or by ticks until the step
    /// buffer is full when `continues` is set.
    ///
    /// Returns `true` when the head finished or, without `continues`,
    /// after one entry was pushed. Returns `false` if the step buffer
    /// cannot take more now.
    pub(super) fn calc_next_steps(&mut self, continues: bool) -> bool {
        let Some(head) = self.movements.h2t_first() else {
            return false;
        };
        let held = self.pause || self.wait_conditional;
        loop {
            if self.steps.is_full() {
                return false;
            }
            let movement = self.movements.get_mut(head);

            if movement.phase == Phase::Ready {
                // waits and I/O start in sync with the pulses buffered before them
                if !matches!(movement.kind, MovementKind::Move(_)) && self.steps.count() > SYNC_STEP_BUFFER_COUNT {
                    return false;
                }
                self.state.init(movement);
                match movement.kind {
                    MovementKind::Move(ref mv) => {
                        for axis in 0..NUM_AXIS {
                            if mv.distance[axis] != 0 {
                                self.time_enable[axis] = 0;
                                set_enable_level(&mut self.hal, &mut self.enable_level, axis, LEVEL_MAX);
                            }
                        }
                    }
                    MovementKind::Wait(wait) => {
                        movement.phase = Phase::Waiting;
                        if wait.is_end(held, self.hal.millis()) {
                            self.state.n = movement.steps;
                        }
                    }
                    MovementKind::Io(io) => self.hal.on_event(&StepperEvent::Io(io)),
                }
            }

            let steps = movement.steps;
            if steps <= self.state.n {
                if let MovementKind::Move(mv) = &movement.kind {
                    for axis in 0..NUM_AXIS {
                        if mv.distance[axis] != 0 {
                            self.time_enable[axis] = self.enable_timeout[axis];
                        }
                    }
                }
                movement.phase = Phase::Done;
                return true;
            }

            let mut dc = DirCount::EMPTY;
            if let MovementKind::Move(mv) = &movement.kind {
                let left = steps - self.state.n;
                if self.state.count > 1 && left <= MDist::from(self.state.count) {
                    dc = mv.last_step_dir_count;
                    self.state.count = left as u8;
                } else {
                    dc = mv.dir_count.directions_only();
                    let total = u64::from(steps);
                    for axis in 0..NUM_AXIS {
                        let d = mv.distance[axis];
                        if d == 0 {
                            continue;
                        }
                        let add = &mut self.state.add[axis];
                        *add += u64::from(d);
                        if *add >= total {
                            *add -= total;
                            dc.set_count(axis, mv.dir_count.count(axis));
                        }
                    }
                }
                if mv.backlash {
                    dc.set_no_count();
                }
            }

            let count = self.state.count;
            let n = self.state.n;
            match &mut movement.kind {
                MovementKind::Move(mv) => {
                    let ramp = &mut mv.ramp;
                    if movement.phase == Phase::Ready {
                        if self.state.timer == ramp.timer_run {
                            movement.phase = Phase::Run;
                        } else {
                            movement.phase = if self.state.timer > ramp.timer_run {
                                Phase::UpAcc
                            } else {
                                Phase::UpDec
                            };
                            if count > 1 && ramp.n_up_offset == 0 {
                                self.state.correct_first_tick();
                            } else if count <= 1 && ramp.n_up_offset == 0 && movement.phase == Phase::UpDec {
                                ramp.n_up_offset = 1;
                            }
                        }
                    } else {
                        if movement.phase <= Phase::Run && n >= ramp.down_start_at {
                            self.state.rest = 0;
                            movement.phase = if ramp.timer_stop > self.state.timer {
                                Phase::DownDec
                            } else {
                                Phase::DownAcc
                            };
                        }
                        match movement.phase {
                            Phase::UpAcc => {
                                if self.state.calc_timer_acc(ramp.timer_run, n + ramp.n_up_offset, count) {
                                    movement.phase = Phase::Run;
                                }
                            }
                            Phase::UpDec => {
                                if self
                                    .state
                                    .calc_timer_dec(ramp.timer_run, ramp.n_up_offset.wrapping_sub(n), count)
                                {
                                    movement.phase = Phase::Run;
                                }
                            }
                            Phase::DownDec => {
                                self.state
                                    .calc_timer_dec(ramp.timer_stop, steps - n + ramp.n_down_offset, count);
                            }
                            Phase::DownAcc => {
                                self.state.calc_timer_acc(
                                    ramp.timer_stop,
                                    ramp.n_down_offset.wrapping_sub(steps - n - 1),
                                    count,
                                );
                            }
                            _ => {}
                        }
                    }
                }
                MovementKind::Wait(wait) => {
                    if wait.is_end(held, self.hal.millis()) {
                        self.state.n = steps;
                    }
                }
                MovementKind::Io(_) => {}
            }

            let timer = (u64::from(self.state.timer) * u64::from(count)).min(u64::from(TIMER_MAX)) as Timer;
            let timer = self.speed_override.apply(timer);
            if self.steps.enqueue(StepBuffer::new(timer, dc)).is_err() {
                return false;
            }

            self.state.n = self.state.n.checked_add(MDist::from(count)).unwrap_or(steps);

            if !continues {
                return true;
            }
        }
    }

    /// Count down the per-axis enable timeouts, about once a second.
    fn update_enable_timeout(&mut self) {
        let now = self.hal.millis();
        // 1024 is close enough to a second
        let elapsed = now.wrapping_sub(self.timer_last_check_enable) / 1024;
        if elapsed == 0 {
            return;
        }
        self.timer_last_check_enable = now;
        let elapsed = elapsed.min(u32::from(u8::MAX)) as u8;
        for axis in 0..NUM_AXIS {
            if self.time_enable[axis] == 0 {
                continue;
            }
            self.time_enable[axis] = self.time_enable[axis].saturating_sub(elapsed);
            if self.time_enable[axis] == 0 {
                set_enable_level(&mut self.hal, &mut self.enable_level, axis, self.idle_level);
            }
        }
    }

    /// Stop stepping and start the idle poll.
    pub(super) fn go_idle(&mut self) {
        self.timer_running = false;
        self.timer_start_or_on_idle = self.hal.millis();
        self.hal.start_timer(IDLE_TIMER);
        self.on_idle(0);
    }

    fn continue_idle(&mut self) {
        self.hal.start_timer(IDLE_TIMER);
        let idle_ms = self.hal.millis().wrapping_sub(self.timer_start_or_on_idle);
        self.on_idle(idle_ms);
    }

    fn on_idle(&mut self, idle_ms: u32) {
        self.hal.on_event(&StepperEvent::Idle { idle_ms });
        if self.enable_timeout_all != 0 && idle_ms > u32::from(self.enable_timeout_all) * 1000 {
            let mut changed = false;
            for axis in 0..NUM_AXIS {
                changed |= set_enable_level(&mut self.hal, &mut self.enable_level, axis, self.idle_level);
            }
            if changed {
                info!("axes disabled after {} ms idle", idle_ms);
                self.hal.on_event(&StepperEvent::Disable);
            }
        }
    }
}
