//! Junction planning over the movement queue.

use crate::config::units::TIMER_STANDSTILL;
use crate::motion::Movement;

use super::engine::StepperEngine;
use super::hal::StepperHal;

impl<H: StepperHal> StepperEngine<H> {
    /// Index of the nearest entry before `idx` that is not an I/O action.
    pub(super) fn prev_movement_index(&self, idx: usize) -> Option<usize> {
        let mut idx = self.movements.t2h_next(idx)?;
        loop {
            if !self.movements.get(idx).is_active_io() {
                return Some(idx);
            }
            idx = self.movements.t2h_next(idx)?;
        }
    }

    /// Index of the nearest entry after `idx` the planner does not skip.
    pub(super) fn next_movement_index(&self, idx: usize) -> Option<usize> {
        let mut idx = self.movements.h2t_next(idx)?;
        loop {
            if !self.movements.get(idx).is_skip_for_optimizing() {
                return Some(idx);
            }
            idx = self.movements.h2t_next(idx)?;
        }
    }

    /// Entry a move queued now would follow.
    pub(super) fn tail_movement(&self) -> Option<Movement> {
        let tail = self.movements.t2h_first()?;
        if self.movements.get(tail).is_active_io() {
            self.prev_movement_index(tail).map(|idx| *self.movements.get(idx))
        } else {
            Some(*self.movements.get(tail))
        }
    }

    /// Re-plan junction speeds and ramps of all queued moves.
    ///
    /// The tail-to-head pass stops at the first entry whose junction did
    /// not change; the head-to-tail pass re-plans from there.
    pub(super) fn optimize_movement_queue(&mut self) {
        if self.movements.count() < 2 {
            return;
        }

        let mut no_change = self.movements.head_index();
        let mut start_possible = TIMER_STANDSTILL;

        let mut cursor = self.movements.t2h_first();
        while let Some(idx) = cursor {
            let prev = self.prev_movement_index(idx).map(|p| *self.movements.get(p));
            let has_next = self.next_movement_index(idx).is_some();
            if self
                .movements
                .get_mut(idx)
                .adjust_junction_t2h(prev.as_ref(), has_next, &mut start_possible)
            {
                no_change = idx;
                break;
            }
            cursor = self.movements.t2h_next(idx);
        }

        let n = self.state.n;
        let mut cursor = Some(no_change);
        while let Some(idx) = cursor {
            let prev = self.prev_movement_index(idx).map(|p| *self.movements.get(p));
            let next = self
                .next_movement_index(idx)
                .filter(|&next| self.movements.get(next).is_active_move());
            match next {
                Some(next) => {
                    let (current, next) = self.movements.pair_mut(idx, next);
                    current.adjust_junction_h2t(prev.as_ref(), Some(next), n);
                }
                None => self.movements.get_mut(idx).adjust_junction_h2t(prev.as_ref(), None, n),
            }
            cursor = self.movements.h2t_next(idx);
        }
        trace!("planned {} movements", self.movements.count());
    }
}
