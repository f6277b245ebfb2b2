//! Stop, abort, pause and emergency handling.

use crate::buffer::RingBufferQueue;
use crate::config::units::{speed_to_timer, timer_to_speed, MDist, StepRate, NUM_AXIS, WAIT_TIMER};
use crate::config::BackgroundMode;
use crate::error::Result;
use crate::motion::timing::round_mul_div;
use crate::motion::Movement;

use super::engine::{StepperEngine, MOVEMENT_BUFFER_SIZE};
use super::event::WaitType;
use super::hal::{StepperHal, WaitAction};

type MovementQueue = RingBufferQueue<Movement, MOVEMENT_BUFFER_SIZE>;

impl<H: StepperHal> StepperEngine<H> {
    /// Decelerate to a stop and drop everything queued behind the current move.
    ///
    /// `v0_dec` is the deceleration start speed; 0 uses the move's own.
    /// Returns once the engine is idle.
    pub fn stop_move(&mut self, v0_dec: StepRate) {
        if self.request_stop(v0_dec) {
            self.wait_busy();
            self.reconcile_position();
        }
    }

    /// Replace the queue with a decelerate-to-stop move, without waiting.
    ///
    /// An active wait at the head is ended instead; a queue whose head has
    /// not started moving is aborted. Returns `true` if a stop move was queued.
    pub fn request_stop(&mut self, v0_dec: StepRate) -> bool {
        let Some(head_idx) = self.movements.h2t_first() else {
            return false;
        };
        let head = *self.movements.get(head_idx);

        if head.is_active_wait() {
            self.state.n = head.steps;
            return false;
        }
        let Some(mv) = head.move_data().filter(|_| head.is_processing_move()) else {
            self.abort_move();
            return false;
        };

        let dec_timer = if v0_dec != 0 { speed_to_timer(v0_dec) } else { mv.timers.dec };

        self.sub_total_steps();
        self.movements.remove_tail(head_idx);
        let stop = Movement::new_stop(&head, self.state.timer, dec_timer);
        if let Some(current) = self.movements.head_mut() {
            current.steps = self.state.n;
        }
        debug!("stop move: {} steps", stop.steps);
        self.total_steps += u64::from(stop.steps);
        // the head was just trimmed, there is room
        self.movements.enqueue(stop).is_ok()
    }

    /// Drop all queued work at once, without deceleration.
    ///
    /// The planned position is reset to the position actually output.
    pub fn abort_move(&mut self) {
        self.sub_total_steps();
        self.steps.clear();
        self.movements.clear();
        self.reconcile_position();
        self.go_idle();
    }

    /// Hold motion at the first point the axes can stop without ramp.
    ///
    /// Inserts a conditional wait after the first entry whose exit speed is
    /// below every axis' jerk speed, or at the tail if there is none. Motion
    /// resumes with [`continue_move`](Self::continue_move).
    pub fn pause_move(&mut self) -> Result<()> {
        if self.pause {
            return Ok(());
        }
        self.check_runnable()?;
        self.wait_until_can_queue()?;
        // a free slot is guaranteed from here on
        self.pause = true;

        let wait = Movement::new_wait(MDist::MAX, WAIT_TIMER, None, true);
        let mut cursor = self.movements.h2t_first();
        while let Some(idx) = cursor {
            if self.can_pause_after(self.movements.get(idx)) {
                debug!("pause inserted after slot {}", idx);
                self.movements.insert(MovementQueue::next_index(idx), wait);
                return Ok(());
            }
            cursor = self.movements.h2t_next(idx);
        }
        self.enqueue_and_start_timer(wait, false)
    }

    /// Release a pause.
    pub fn continue_move(&mut self) {
        self.pause = false;
    }

    /// Latch the emergency stop and abort all motion.
    ///
    /// Queueing fails until [`emergency_stop_resurrect`](Self::emergency_stop_resurrect).
    pub fn emergency_stop(&mut self) {
        warn!("emergency stop");
        self.emergency_stop = true;
        self.abort_move();
    }

    /// Clear the emergency stop and any latched fatal error.
    pub fn emergency_stop_resurrect(&mut self) {
        self.abort_move();
        self.emergency_stop = false;
        self.fatal_error = None;
        info!("emergency stop cleared");
    }

    /// Spin until all queued motion has finished.
    pub fn wait_busy(&mut self) {
        while self.timer_running {
            self.pump(WaitType::WaitBusy);
        }
    }

    /// One iteration of a spinning call.
    pub(super) fn pump(&mut self, kind: WaitType) {
        if self.hal.on_wait(kind) == WaitAction::ServiceTimer {
            self.on_step_timer();
            if self.background == BackgroundMode::Deferred && self.background_pending {
                self.fill_step_buffer();
            }
        }
    }

    pub(crate) fn reconcile_position(&mut self) {
        self.calculated_position = self.current_position;
    }

    /// Take the steps not yet output off the total.
    fn sub_total_steps(&mut self) {
        let n = u64::from(self.state.n);
        for movement in self.movements.iter().filter(|m| m.is_active_move()) {
            self.total_steps = self.total_steps.saturating_sub(u64::from(movement.steps));
            if movement.is_processing_move() {
                self.total_steps += n;
            }
        }
    }

    fn can_pause_after(&self, movement: &Movement) -> bool {
        if !movement.is_active_move() {
            return true;
        }
        let Some(mv) = movement.move_data() else {
            return true;
        };
        let speed_stop = u64::from(timer_to_speed(mv.ramp.timer_stop));
        let steps = u64::from(movement.steps);
        (0..NUM_AXIS).all(|axis| {
            let d = u64::from(mv.planned[axis]);
            let v = if d == steps { speed_stop } else { round_mul_div(speed_stop, d, steps) };
            u64::from(self.limits.max_jerk_speed[axis]) > v
        })
    }
}
