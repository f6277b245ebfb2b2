//! Reference switches and homing.

use crate::config::units::{axis, SDist, StepRate, NUM_REFERENCE};
use crate::error::{Error, MotionError, Result};

use super::engine::{check_axis, StepperEngine, REFERENCE_STABLE_TIME};
use super::event::{Notice, StepperEvent, WaitType};
use super::hal::StepperHal;
use super::queue::MAX_STEPS_PER_MOVE;

/// Parameters of a reference move.
///
/// Zero fields fall back to defaults derived from the engine configuration.
/// Search distances are capped to what the movement queue holds in one go,
/// `MOVEMENT_BUFFER_SIZE` pieces of [`MAX_STEPS_PER_MOVE`] steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HomingParams {
    /// Speed of the approach; 0 uses the default speed.
    pub v_max: StepRate,
    /// Longest distance searched for the switch; 0 uses 110 % of the axis range.
    pub max_dist: SDist,
    /// Distance moved away from the switch after it was released.
    pub dist_to_ref: SDist,
    /// Distance to back off when the switch is already on; 0 uses `max_dist / 8`.
    pub dist_if_ref_on: SDist,
}

/// Divisor of the approach speed for the final, precise approach.
const SLOW_APPROACH_DIVISOR: StepRate = 4;

impl<H: StepperHal> StepperEngine<H> {
    /// Whether reference input `reference` reads its configured hit level.
    ///
    /// Unconfigured or out-of-range inputs are never hit.
    pub fn is_reference(&mut self, reference: usize) -> bool {
        match self.reference_hit.get(reference).copied().flatten() {
            Some(level) => level.is_hit(self.hal.reference_level(reference)),
            None => false,
        }
    }

    /// Whether any configured reference switch is hit.
    pub fn is_any_reference(&mut self) -> bool {
        self.hit_reference().is_some()
    }

    /// First configured reference switch that is hit.
    pub(super) fn hit_reference(&mut self) -> Option<usize> {
        (0..NUM_REFERENCE).find(|&reference| self.is_reference(reference))
    }

    /// Spin while moving and abort once `reference` reads `value` for
    /// `stable_ms` milliseconds. Returns `true` if the move was aborted.
    pub fn move_until(&mut self, reference: usize, value: bool, stable_ms: u32) -> bool {
        self.move_until_with(|engine| engine.is_reference(reference) == value, stable_ms)
    }

    /// Spin while moving and abort once `stop` has held for `stable_ms`
    /// milliseconds. Returns `true` if the move was aborted, `false` if it
    /// ran to its end.
    pub fn move_until_with<F>(&mut self, mut stop: F, stable_ms: u32) -> bool
    where
        F: FnMut(&mut Self) -> bool,
    {
        let mut since: Option<u32> = None;
        while self.timer_running {
            if stop(self) {
                let now = self.hal.millis();
                let start = *since.get_or_insert(now);
                if now.wrapping_sub(start) >= stable_ms {
                    self.abort_move();
                    return true;
                }
            } else {
                since = None;
            }
            self.pump(WaitType::WaitReference);
        }
        false
    }

    /// Move `axis` by `dist` if `reference` is on, until it is released.
    ///
    /// Returns `true` if the switch is off afterwards.
    pub fn move_away_from_reference(
        &mut self,
        axis: usize,
        reference: usize,
        dist: SDist,
        v_max: StepRate,
    ) -> Result<bool> {
        if self.is_reference(reference) {
            info!("reference {} is on, moving away", reference);
            self.notice(Notice::ReferenceIsOn);
            let check_reference = core::mem::replace(&mut self.check_reference, false);
            let released = self
                .move_rel_axis(axis, dist, v_max)
                .map(|()| self.move_until(reference, false, REFERENCE_STABLE_TIME));
            self.check_reference = check_reference;
            if !released? {
                self.hal.on_event(&StepperEvent::Warning(Notice::ReferenceStillOn));
                return Ok(false);
            }
        }
        Ok(!self.is_reference(reference))
    }

    /// Home `axis` against its min (`to_min`) or max reference switch.
    ///
    /// Moves away from the switch if it is already on, approaches it,
    /// backs off until it releases, approaches again at a quarter of the
    /// speed and finally moves `dist_to_ref` away from it. Limit checking,
    /// reference checking, backlash and waiting for finished moves are off
    /// for the duration.
    ///
    /// The position of `axis` is set to the min or max soft limit
    /// afterwards, whether homing succeeded or not.
    ///
    /// # Errors
    ///
    /// [`MotionError::ReferenceFailed`] if the switch could not be found or
    /// released.
    pub fn move_reference(&mut self, axis: usize, to_min: bool, params: HomingParams) -> Result<()> {
        check_axis(axis)?;
        self.check_runnable()?;
        self.wait_busy();

        let limit_check = core::mem::replace(&mut self.limit_check, false);
        let wait_finish_move = core::mem::replace(&mut self.wait_finish_move, false);
        let check_reference = core::mem::replace(&mut self.check_reference, false);
        let backlash = self.timer_backlash;
        self.set_backlash_speed(None);

        let result = self.run_reference(axis, to_min, params);

        self.limit_check = limit_check;
        self.wait_finish_move = wait_finish_move;
        self.check_reference = check_reference;
        self.timer_backlash = backlash;

        let limits = self.soft_limits[axis];
        self.set_position(axis, if to_min { limits.min } else { limits.max })?;

        match result {
            Ok(true) => {
                info!("axis {} homed", axis);
                Ok(())
            }
            Ok(false) => Err(self.raise_error(Error::Motion(MotionError::ReferenceFailed { axis }))),
            Err(e) => Err(e),
        }
    }

    fn run_reference(&mut self, axis: usize, to_min: bool, params: HomingParams) -> Result<bool> {
        let reference = axis::reference_id(axis, to_min);
        let v_max = if params.v_max == 0 { self.default_max_speed() } else { params.v_max };
        let mut max_dist = if params.max_dist == 0 {
            SDist::try_from(u64::from(self.soft_limits[axis].size()) * 11 / 10).unwrap_or(SDist::MAX)
        } else {
            params.max_dist
        };
        let mut dist_if_ref_on = if params.dist_if_ref_on == 0 { max_dist / 8 } else { params.dist_if_ref_on };
        let mut dist_to_ref = params.dist_to_ref;

        // a search move must fit the queue at once, the switch is only
        // watched after the last piece is queued
        let reach = self.queue_reach();

        // signs as seen from the min switch
        max_dist = -max_dist.saturating_abs().min(reach);
        dist_to_ref = dist_to_ref.saturating_abs();
        dist_if_ref_on = dist_if_ref_on.saturating_abs().min(reach);
        if !to_min {
            max_dist = -max_dist;
            dist_to_ref = -dist_to_ref;
            dist_if_ref_on = -dist_if_ref_on;
        }

        if !self.move_away_from_reference(axis, reference, dist_if_ref_on, v_max)? {
            warn!("reference {} still on", reference);
            return Ok(false);
        }

        debug!("approach reference {}", reference);
        self.move_rel_axis(axis, max_dist, v_max)?;
        if !self.move_until(reference, true, REFERENCE_STABLE_TIME) {
            return Ok(false);
        }

        debug!("back off reference {}", reference);
        self.move_rel_axis(axis, dist_if_ref_on, v_max)?;
        if !self.move_until(reference, false, REFERENCE_STABLE_TIME) {
            return Ok(false);
        }

        let slow = (v_max / SLOW_APPROACH_DIVISOR).max(1);
        self.move_rel_axis(axis, -dist_if_ref_on, slow)?;
        if !self.move_until(reference, true, REFERENCE_STABLE_TIME) {
            return Ok(false);
        }

        if dist_to_ref != 0 {
            self.move_rel_axis(axis, dist_to_ref, slow)?;
            self.wait_busy();
        }
        Ok(true)
    }

    /// Longest move that can be queued without waiting for a free slot.
    fn queue_reach(&self) -> SDist {
        let steps = u64::from(MAX_STEPS_PER_MOVE) * self.movements.free_count() as u64;
        SDist::try_from(steps).unwrap_or(SDist::MAX)
    }

    /// Set the position of `axis` once all motion has finished.
    pub fn set_position(&mut self, axis: usize, position: SDist) -> Result<()> {
        check_axis(axis)?;
        self.wait_busy();
        self.current_position[axis] = position;
        self.calculated_position[axis] = position;
        Ok(())
    }
}
