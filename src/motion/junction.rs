//! Junction speed planning between consecutive moves.
//!
//! Runs in two passes over the queue. The tail-to-head pass lowers each
//! junction to what the moves behind it can still brake from. The
//! head-to-tail pass then lowers it further to what the moves in front can
//! accelerate to, and re-plans every ramp.

use crate::config::units::{MDist, Timer, TIMER_STANDSTILL};

use super::movement::Movement;
use super::timing::{get_timer, get_timer_accelerating};

impl Movement {
    /// Tail-to-head step.
    ///
    /// `start_possible` carries the slowest start timer the moves behind
    /// this one allow and is updated in place. Returns `true` once nothing
    /// further towards the head can change.
    pub fn adjust_junction_t2h(
        &mut self,
        prev: Option<&Movement>,
        has_next: bool,
        start_possible: &mut Timer,
    ) -> bool {
        if !self.is_active_move() {
            return !self.is_skip_for_optimizing();
        }
        let steps = self.steps;
        let Some(mv) = self.move_data_mut() else {
            return true;
        };

        *start_possible = if has_next {
            get_timer_accelerating(steps, *start_possible, mv.timers.dec)
        } else {
            // end of queue: must come to a stop
            get_timer(steps, mv.timers.dec)
        };

        if let Some(prev) = prev {
            mv.timer_run = mv.timer_max;
            if !prev.is_active_move() {
                return true;
            }
            let junction = mv.timer_max_junction.max(*start_possible);
            if junction == mv.timer_junction_to_prev {
                return true;
            }
            mv.timer_junction_to_prev = junction;
            *start_possible = junction;
        }
        false
    }

    /// Head-to-tail step.
    ///
    /// Lowers the junction to `next` to what this move can reach and
    /// re-plans the ramp. `n` is the step the executing move is at.
    pub fn adjust_junction_h2t(&mut self, prev: Option<&Movement>, mut next: Option<&mut Movement>, n: MDist) {
        if !self.is_active_move() {
            return;
        }
        let steps = self.steps;
        // a started head plans from its ramp, anything else from the move before
        let first = self.is_run_or_down_move() || (prev.is_none() && self.is_processing_move());
        let up = self.is_run_or_up_move();
        let run = self.is_run_move();
        let Some(mv) = self.move_data_mut() else {
            return;
        };

        if first {
            mv.timer_end_possible = if up {
                if run {
                    mv.ramp.timer_run
                } else {
                    get_timer_accelerating(steps, mv.ramp.timer_start, mv.timers.acc)
                }
            } else {
                mv.ramp.timer_stop
            };
        } else {
            let prev_end = prev
                .filter(|p| p.is_active_move())
                .and_then(|p| {
                    let data = p.move_data()?;
                    Some(if p.is_processing_move() {
                        data.ramp.timer_stop
                    } else {
                        data.timer_end_possible
                    })
                })
                .unwrap_or(TIMER_STANDSTILL);
            mv.timer_end_possible = get_timer_accelerating(steps, prev_end, mv.timers.acc);
            if mv.timer_end_possible > mv.timer_max {
                mv.timer_run = mv.timer_end_possible.max(mv.timer_run);
            }
        }

        let end_possible = mv.timer_end_possible;
        let next_junction = next.as_deref_mut().and_then(Movement::move_data_mut).map(|next_mv| {
            next_mv.timer_junction_to_prev = next_mv
                .timer_max_junction
                .max(end_possible.max(next_mv.timer_junction_to_prev));
            next_mv.timer_junction_to_prev
        });
        if let Some(junction) = next_junction {
            mv.timer_end_possible = junction;
        }

        if !self.replan_ramp(next_junction, n) {
            // ramp is fixed: the next move must start at its end speed
            let Some(mv) = self.move_data_mut() else {
                return;
            };
            mv.timer_end_possible = mv.ramp.timer_stop;
            if let Some(next_mv) = next.and_then(Movement::move_data_mut) {
                next_mv.timer_junction_to_prev = mv.ramp.timer_stop;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::units::{speed_to_timer, AxisMask, NUM_AXIS};
    use crate::motion::movement::{MotionLimits, Phase};

    fn limits() -> MotionLimits {
        MotionLimits {
            timer_max: [speed_to_timer(28_000); NUM_AXIS],
            timer_acc: [speed_to_timer(350); NUM_AXIS],
            timer_dec: [speed_to_timer(350); NUM_AXIS],
            max_jerk_speed: [1000; NUM_AXIS],
        }
    }

    fn x_move(prev: Option<&Movement>, steps: MDist, timer: Timer) -> Movement {
        let mut dist = [0; NUM_AXIS];
        dist[0] = steps;
        Movement::new_move(&limits(), prev, steps, &dist, AxisMask::EMPTY.with(0), timer)
    }

    fn plan(first: &mut Movement, second: &mut Movement) {
        let mut start_possible = TIMER_STANDSTILL;
        let done = second.adjust_junction_t2h(Some(&*first), false, &mut start_possible);
        assert!(!done);
        first.adjust_junction_t2h(None, true, &mut start_possible);
        first.adjust_junction_h2t(None, Some(second), 0);
        second.adjust_junction_h2t(Some(&*first), None, 0);
    }

    #[test]
    fn test_collinear_moves_join_at_speed() {
        let mut first = x_move(None, 5000, 400);
        let mut second = x_move(Some(&first), 5000, 400);
        plan(&mut first, &mut second);

        let a = first.move_data().unwrap();
        let b = second.move_data().unwrap();
        assert_eq!(b.timer_junction_to_prev, 400);
        assert_eq!(a.ramp.timer_stop, 400);
        assert_eq!(a.ramp.down_steps, 0);
        assert_eq!(b.ramp.up_steps, 0);
        assert_eq!(b.ramp.timer_start, 400);
        assert!(a.ramp.is_feasible(first.steps));
        assert!(b.ramp.is_feasible(second.steps));
    }

    #[test]
    fn test_short_tail_limits_junction() {
        // 50 steps are not enough to brake from full speed
        let mut first = x_move(None, 5000, 400);
        let mut second = x_move(Some(&first), 50, 400);
        plan(&mut first, &mut second);

        let junction = second.move_data().unwrap().timer_junction_to_prev;
        assert!(junction > 400);
        assert!(junction >= get_timer(50, 5714));
        assert!(second.move_data().unwrap().ramp.is_feasible(50));
        assert!(first.move_data().unwrap().ramp.is_feasible(5000));
    }

    #[test]
    fn test_wait_stops_planning() {
        let mut wait = Movement::new_wait(10, 20_000, None, false);
        let mut start_possible = TIMER_STANDSTILL;
        assert!(wait.adjust_junction_t2h(None, false, &mut start_possible));
        assert_eq!(start_possible, TIMER_STANDSTILL);

        let mut io = Movement::new_io(0, 1);
        assert!(!io.adjust_junction_t2h(None, false, &mut start_possible));
    }

    #[test]
    fn test_move_after_wait_starts_from_standstill() {
        let wait = Movement::new_wait(10, 20_000, None, false);
        let mut mv = x_move(None, 5000, 400);
        let mut start_possible = TIMER_STANDSTILL;
        assert!(mv.adjust_junction_t2h(Some(&wait), false, &mut start_possible));
        assert_eq!(mv.move_data().unwrap().timer_junction_to_prev, TIMER_STANDSTILL);
    }

    #[test]
    fn test_running_head_keeps_ramp() {
        let mut first = x_move(None, 1000, 200);
        first.phase = Phase::DownDec;
        let mut second = x_move(Some(&first), 1000, 200);
        first.adjust_junction_h2t(None, Some(&mut second), 900);
        // head already decelerating to a stop: the next move starts from there
        let stop = first.move_data().unwrap().ramp.timer_stop;
        assert_eq!(second.move_data().unwrap().timer_junction_to_prev, stop);
    }
}
