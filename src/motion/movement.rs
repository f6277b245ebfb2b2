//! Queued units of work: moves, waits and I/O actions.

use crate::buffer::DirCount;
use crate::config::units::{
    speed_to_timer, timer_to_speed, AxisMask, MDist, StepRate, Timer, NUM_AXIS, TIMER_STANDSTILL,
};

use super::ramp::{AccDec, Ramp};
use super::timing::{get_dec_steps, get_timer, mul_div, round_mul_div, step_multiplier};

/// Execution phase of a queued [`Movement`].
///
/// Ordered: the processing phases of a move lie between `UpAcc` and `DownAcc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// Queued, not started.
    Ready,
    /// Accelerating towards the plateau.
    UpAcc,
    /// Slowing down towards the plateau (entered faster than it).
    UpDec,
    /// On the plateau.
    Run,
    /// Decelerating towards the exit speed.
    DownDec,
    /// Accelerating towards a faster exit speed.
    DownAcc,
    /// A wait in progress.
    Waiting,
    /// Finished, about to be dequeued.
    #[default]
    Done,
}

/// Per-axis limits the engine hands to move construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotionLimits {
    /// Fastest timer per axis.
    pub timer_max: [Timer; NUM_AXIS],
    /// Acceleration start timer per axis.
    pub timer_acc: [Timer; NUM_AXIS],
    /// Deceleration start timer per axis.
    pub timer_dec: [Timer; NUM_AXIS],
    /// Largest speed step allowed at a junction, per axis.
    pub max_jerk_speed: [StepRate; NUM_AXIS],
}

/// A linear multi-axis move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MoveData {
    /// Planned distance per axis.
    pub planned: [MDist; NUM_AXIS],
    /// Distance per axis as fed to the step distribution (scaled by multipliers).
    pub distance: [MDist; NUM_AXIS],
    /// Pulses per tick and direction per axis.
    pub dir_count: DirCount,
    /// Remaining pulses emitted on the last tick of a multiplied move.
    pub last_step_dir_count: DirCount,
    /// Catch-up move that must not change the tracked position.
    pub backlash: bool,
    /// Fastest timer allowed for this move.
    pub timer_max: Timer,
    /// Plateau timer after planning.
    pub timer_run: Timer,
    /// Acceleration and deceleration start timers.
    pub timers: AccDec,
    /// Fastest timer reachable at the end of the move.
    pub timer_end_possible: Timer,
    /// Timer at the junction to the previous move.
    pub timer_junction_to_prev: Timer,
    /// Fastest timer the junction to the previous move allows.
    pub timer_max_junction: Timer,
    /// Speed profile.
    pub ramp: Ramp,
}

/// A timed pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WaitData {
    /// Timer of one wait tick.
    pub timer: Timer,
    /// Absolute clock (ms) ending the wait.
    pub end_time: Option<u32>,
    /// Wait is released by clearing pause and conditional-wait.
    pub conditional: bool,
}

impl WaitData {
    /// Whether the wait is over at clock `now` (ms).
    ///
    /// `held` is set while motion is paused or the conditional hold is on.
    pub fn is_end(&self, held: bool, now: u32) -> bool {
        if self.conditional && !held {
            return true;
        }
        // wrapping compare: the clock overflows after 49 days
        self.end_time.is_some_and(|end| now.wrapping_sub(end) as i32 >= 0)
    }
}

/// An I/O action fired when the entry becomes head of the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IoControl {
    /// Tool id.
    pub tool: u8,
    /// Level to set.
    pub level: u16,
}

/// Payload of a [`Movement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MovementKind {
    /// Linear move.
    Move(MoveData),
    /// Timed pause.
    Wait(WaitData),
    /// I/O action.
    Io(IoControl),
}

/// One entry of the movement queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Movement {
    /// Scheduling ticks of the entry: steps of the longest axis, or wait ticks.
    pub steps: MDist,
    /// Execution phase.
    pub phase: Phase,
    /// Payload.
    pub kind: MovementKind,
}

impl Default for Movement {
    fn default() -> Self {
        Self {
            steps: 0,
            phase: Phase::Done,
            kind: MovementKind::Wait(WaitData::default()),
        }
    }
}

impl Movement {
    /// Build a move of `steps` ticks.
    ///
    /// `timer_max` is the requested speed; it is slowed down until no axis
    /// exceeds its own limit. If `prev` is an active move, the fastest
    /// junction speed to it is computed as well.
    pub fn new_move(
        limits: &MotionLimits,
        prev: Option<&Movement>,
        steps: MDist,
        dist: &[MDist; NUM_AXIS],
        directions: AxisMask,
        timer_max: Timer,
    ) -> Self {
        let mut mv = MoveData {
            planned: *dist,
            distance: *dist,
            timer_max,
            ..MoveData::default()
        };

        for (i, &d) in dist.iter().enumerate() {
            if d != 0 {
                let axis_timer = mul_div(mv.timer_max, steps, d);
                if axis_timer < limits.timer_max[i] {
                    mv.timer_max = mv.timer_max.max(mul_div(limits.timer_max[i], d, steps));
                }
            }
        }

        for (i, &d) in dist.iter().enumerate() {
            if d != 0 {
                mv.timers.acc = mv.timers.acc.max(mul_div(limits.timer_acc[i], d, steps));
                mv.timers.dec = mv.timers.dec.max(mul_div(limits.timer_dec[i], d, steps));
            }
        }

        distribute_multiplier(&mut mv, steps, dist, directions);

        mv.timer_run = mv.timer_max;
        mv.timer_junction_to_prev = TIMER_STANDSTILL;
        mv.timer_max_junction = TIMER_STANDSTILL;

        match prev.filter(|p| p.is_active_move()) {
            Some(prev) => {
                if let Some(prev_move) = prev.move_data() {
                    mv.timer_max_junction = max_junction_timer(limits, prev.steps, prev_move, steps, &mv);
                }
                mv.timer_end_possible = TIMER_STANDSTILL;
            }
            None => mv.timer_end_possible = get_timer(steps, mv.timers.acc),
        }

        mv.ramp = Ramp::build(steps, mv.timers, mv.timer_run, TIMER_STANDSTILL, TIMER_STANDSTILL);

        Self {
            steps,
            phase: Phase::Ready,
            kind: MovementKind::Move(mv),
        }
    }

    /// Build a wait of `ticks` ticks of `timer` each.
    pub fn new_wait(ticks: MDist, timer: Timer, end_time: Option<u32>, conditional: bool) -> Self {
        Self {
            steps: ticks,
            phase: Phase::Ready,
            kind: MovementKind::Wait(WaitData {
                timer,
                end_time,
                conditional,
            }),
        }
    }

    /// Build an I/O action.
    pub fn new_io(tool: u8, level: u16) -> Self {
        Self {
            steps: 0,
            phase: Phase::Ready,
            kind: MovementKind::Io(IoControl { tool, level }),
        }
    }

    /// Build a decelerate-to-stop move from the executing move `current`.
    ///
    /// `timer` is the timer `current` runs at now; `dec_timer` the
    /// deceleration to use. The result is a ready move covering just the
    /// steps needed to stop.
    pub fn new_stop(current: &Movement, timer: Timer, dec_timer: Timer) -> Self {
        let mut stop = *current;
        let down_steps = get_dec_steps(timer, dec_timer);
        if let MovementKind::Move(mv) = &mut stop.kind {
            mv.timers.dec = dec_timer;
            for (distance, planned) in mv.distance.iter_mut().zip(mv.planned.iter_mut()) {
                *distance = round_mul_div(u64::from(*distance), u64::from(down_steps), u64::from(current.steps).max(1))
                    as MDist;
                *planned = round_mul_div(u64::from(*planned), u64::from(down_steps), u64::from(current.steps).max(1))
                    as MDist;
            }
            mv.last_step_dir_count = mv.dir_count.directions_only();
            mv.timer_run = timer;
            mv.ramp.ramp_up(mv.timers, timer, timer);
            mv.ramp.ramp_down(down_steps, mv.timers, TIMER_STANDSTILL);
        }
        stop.steps = down_steps;
        stop.phase = Phase::Ready;
        stop
    }

    /// Move payload, if this is a move.
    #[inline]
    pub fn move_data(&self) -> Option<&MoveData> {
        match &self.kind {
            MovementKind::Move(mv) => Some(mv),
            _ => None,
        }
    }

    /// Mutable move payload, if this is a move.
    #[inline]
    pub fn move_data_mut(&mut self) -> Option<&mut MoveData> {
        match &mut self.kind {
            MovementKind::Move(mv) => Some(mv),
            _ => None,
        }
    }

    /// Wait payload, if this is a wait.
    #[inline]
    pub fn wait_data(&self) -> Option<&WaitData> {
        match &self.kind {
            MovementKind::Wait(wait) => Some(wait),
            _ => None,
        }
    }

    /// Planned distance of `axis` (0 for waits and I/O).
    #[inline]
    pub fn distance(&self, axis: usize) -> MDist {
        self.move_data().map_or(0, |mv| mv.planned[axis])
    }

    /// Direction of `axis`.
    #[inline]
    pub fn direction_up(&self, axis: usize) -> bool {
        self.move_data().is_some_and(|mv| mv.dir_count.direction_up(axis))
    }

    /// Pulses per tick of the fastest axis.
    pub fn max_step_multiplier(&self) -> u8 {
        self.move_data().map_or(1, |mv| mv.dir_count.max_count().max(1))
    }

    /// Queued move, started or not.
    #[inline]
    pub fn is_active_move(&self) -> bool {
        self.is_ready_for_move() || self.is_processing_move()
    }

    /// Queued move that has not started.
    #[inline]
    pub fn is_ready_for_move(&self) -> bool {
        self.phase == Phase::Ready && matches!(self.kind, MovementKind::Move(_))
    }

    /// Move being executed.
    #[inline]
    pub fn is_processing_move(&self) -> bool {
        self.phase >= Phase::UpAcc && self.phase <= Phase::DownAcc
    }

    /// Move in its up phase.
    #[inline]
    pub fn is_up_move(&self) -> bool {
        self.is_processing_move() && self.phase < Phase::Run
    }

    /// Move on its plateau.
    #[inline]
    pub fn is_run_move(&self) -> bool {
        self.phase == Phase::Run
    }

    /// Move in its up phase or on its plateau.
    #[inline]
    pub fn is_run_or_up_move(&self) -> bool {
        self.is_processing_move() && self.phase <= Phase::Run
    }

    /// Move on its plateau or in its down phase.
    #[inline]
    pub fn is_run_or_down_move(&self) -> bool {
        self.is_processing_move() && self.phase >= Phase::Run
    }

    /// Move in its down phase.
    #[inline]
    pub fn is_down_move(&self) -> bool {
        self.is_processing_move() && self.phase > Phase::Run
    }

    /// Queued or running wait.
    #[inline]
    pub fn is_active_wait(&self) -> bool {
        matches!(self.kind, MovementKind::Wait(_)) && matches!(self.phase, Phase::Ready | Phase::Waiting)
    }

    /// Queued I/O action.
    #[inline]
    pub fn is_active_io(&self) -> bool {
        matches!(self.kind, MovementKind::Io(_)) && self.phase == Phase::Ready
    }

    /// Entry the planner walks over without treating it as a barrier.
    #[inline]
    pub fn is_skip_for_optimizing(&self) -> bool {
        self.is_active_io()
    }

    /// Whether the entry is finished.
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Done
    }

    /// Re-plan the ramp for the current junction timers.
    ///
    /// `next_junction` is the next move's junction timer, `None` to stop at
    /// the end. `n` is the step the executing move is at. The new ramp is
    /// kept only if the move has not yet passed the point it changes.
    pub fn replan_ramp(&mut self, next_junction: Option<Timer>, n: MDist) -> bool {
        if self.is_down_move() {
            return false;
        }
        let steps = self.steps;
        let ready = self.is_ready_for_move();
        let up = self.is_up_move();
        let run = self.is_run_move();
        let Some(mv) = self.move_data_mut() else {
            return false;
        };

        let mut ramp = mv.ramp;
        ramp.ramp_up(mv.timers, mv.timer_run, mv.timer_junction_to_prev);
        ramp.ramp_down(steps, mv.timers, next_junction.unwrap_or(mv.timers.dec));
        ramp.ramp_run(steps, mv.timers);

        if ready || (up && n < ramp.up_steps) || (run && n < ramp.down_start_at) {
            mv.ramp = ramp;
            true
        } else {
            false
        }
    }
}

/// Pick the step multiplier and spread it over the axes.
///
/// Slower axes get fewer pulses per tick. Their distance is scaled so the
/// per-tick accumulator overflows at the right rate, and the pulses the
/// regular ticks leave over are emitted on the last tick.
fn distribute_multiplier(mv: &mut MoveData, steps: MDist, dist: &[MDist; NUM_AXIS], directions: AxisMask) {
    let max_multiplier = step_multiplier(mv.timer_max);
    mv.dir_count = DirCount::EMPTY;
    mv.last_step_dir_count = DirCount::EMPTY;

    if max_multiplier <= 1 {
        for axis in 0..NUM_AXIS {
            mv.dir_count = mv.dir_count.with_axis(axis, 1, directions.contains(axis));
        }
        mv.last_step_dir_count = mv.dir_count;
        return;
    }

    let max = MDist::from(max_multiplier);
    let mut full_steps = steps / max;
    if steps % max == 0 {
        full_steps -= 1;
    }

    for axis in 0..NUM_AXIS {
        let mut multiplier = max_multiplier;
        let mut remainder: u64 = 0;
        let d = dist[axis];
        if d != 0 {
            if full_steps != 0 {
                multiplier = (d / full_steps).min(max) as u8;
                if d % full_steps != 0 && multiplier < max_multiplier {
                    multiplier += 1;
                }
                let m = MDist::from(multiplier);
                if multiplier != max_multiplier {
                    mv.distance[axis] = mul_div(d, max, m);
                } else if d != steps && d % m != 0 {
                    mv.distance[axis] = (d / m + 1) * m;
                }

                let seed = u64::from(steps / max / 2);
                let sum = u64::from(mv.distance[axis]) * u64::from(full_steps);
                let emitted = (seed + sum) / u64::from(steps) * u64::from(multiplier);
                remainder = u64::from(d).saturating_sub(emitted);
            } else {
                remainder = u64::from(d);
            }
        }
        let up = directions.contains(axis);
        mv.dir_count = mv.dir_count.with_axis(axis, multiplier, up);
        debug_assert!(remainder <= u64::from(DirCount::MAX_COUNT));
        mv.last_step_dir_count = mv.last_step_dir_count.with_axis(axis, last_tick_count(remainder), up);
    }
}

/// Pulses left for the last tick, saturated to what a descriptor holds.
fn last_tick_count(remainder: u64) -> u8 {
    u8::try_from(remainder).map_or(DirCount::MAX_COUNT, |count| count.min(DirCount::MAX_COUNT))
}

/// Fastest junction timer between `prev` and `this` that respects every
/// axis' jerk limit.
fn max_junction_timer(
    limits: &MotionLimits,
    prev_steps: MDist,
    prev: &MoveData,
    steps: MDist,
    this: &MoveData,
) -> Timer {
    let s1 = prev_steps;
    let s2 = steps;
    let timer_acc_limit = prev.timers.acc;
    let mut junction = prev.timer_max.min(this.timer_max);

    // an axis moving full distance in both moves in the same direction has no
    // jerk: join at the slower of both speeds
    let main_axis = (0..NUM_AXIS).find(|&axis| {
        s1 == prev.planned[axis]
            && s2 == this.planned[axis]
            && prev.dir_count.direction_up(axis) == this.dir_count.direction_up(axis)
    });
    if main_axis.is_some() {
        junction = prev.timer_max.max(this.timer_max);
    }

    let move_junction = junction;
    let reduced = |jerk: u64, max_jerk: StepRate| -> Timer {
        let speed = round_mul_div(
            u64::from(timer_to_speed(move_junction)),
            u64::from(max_jerk),
            jerk,
        );
        speed_to_timer(speed.min(u64::from(StepRate::MAX)) as StepRate)
    };

    for axis in 0..NUM_AXIS {
        if Some(axis) == main_axis {
            continue;
        }
        let d1 = prev.planned[axis];
        let d2 = this.planned[axis];
        let mut v1 = u64::from(timer_to_speed(prev.timer_max));
        let mut v2 = u64::from(timer_to_speed(this.timer_max));
        if d1 != s1 {
            v1 = round_mul_div(v1, u64::from(d1), u64::from(s1));
        }
        if d2 != s2 {
            v2 = round_mul_div(v2, u64::from(d2), u64::from(s2));
        }

        let max_jerk = limits.max_jerk_speed[axis];
        let same_direction = prev.dir_count.direction_up(axis) == this.dir_count.direction_up(axis);
        if v1 == 0 || v2 == 0 || same_direction {
            let jerk = v1.abs_diff(v2);
            if jerk > u64::from(max_jerk) {
                junction = junction.max(reduced(jerk, max_jerk).min(timer_acc_limit));
            }
        } else if main_axis.is_none() {
            // reversal without a dominant axis: stop and go
            junction = timer_acc_limit;
        } else {
            let jerk = v1 + v2;
            if jerk > u64::from(max_jerk) {
                junction = junction.max(reduced(jerk, max_jerk).min(timer_acc_limit));
            }
        }
    }
    junction
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> MotionLimits {
        MotionLimits {
            timer_max: [speed_to_timer(28_000); NUM_AXIS],
            timer_acc: [speed_to_timer(350); NUM_AXIS],
            timer_dec: [speed_to_timer(350); NUM_AXIS],
            max_jerk_speed: [1000; NUM_AXIS],
        }
    }

    fn single_axis(steps: MDist, up: bool) -> ([MDist; NUM_AXIS], AxisMask) {
        let mut dist = [0; NUM_AXIS];
        dist[0] = steps;
        let dirs = if up { AxisMask::EMPTY.with(0) } else { AxisMask::EMPTY };
        (dist, dirs)
    }

    #[test]
    fn test_last_tick_count_saturates() {
        assert_eq!(last_tick_count(0), 0);
        assert_eq!(last_tick_count(9), 9);
        assert_eq!(last_tick_count(u64::from(DirCount::MAX_COUNT) + 1), DirCount::MAX_COUNT);
        // would wrap to 4 as a u8
        assert_eq!(last_tick_count(260), DirCount::MAX_COUNT);
    }

    #[test]
    fn test_new_move_single_axis() {
        let (dist, dirs) = single_axis(1000, true);
        let mv = Movement::new_move(&limits(), None, 1000, &dist, dirs, 200);
        let data = mv.move_data().unwrap();
        assert_eq!(mv.phase, Phase::Ready);
        assert_eq!(data.timer_max, 200);
        assert_eq!(data.timers.acc, 5714);
        assert_eq!(data.ramp.up_steps, 448);
        assert_eq!(data.ramp.down_steps, 448);
        assert!(data.dir_count.direction_up(0));
        // 200 ticks is above the interrupt budget: two pulses per tick
        assert_eq!(data.dir_count.count(0), 2);
        assert_eq!(data.last_step_dir_count.count(0), 2);
        assert!(mv.is_active_move());
    }

    #[test]
    fn test_axis_speed_limit_slows_move() {
        let mut l = limits();
        l.timer_max[1] = speed_to_timer(1000);
        let mut dist = [0; NUM_AXIS];
        dist[0] = 1000;
        dist[1] = 1000;
        let mv = Movement::new_move(&l, None, 1000, &dist, AxisMask::EMPTY, 200);
        assert_eq!(mv.move_data().unwrap().timer_max, 2000);
    }

    #[test]
    fn test_fast_move_uses_multiplier() {
        let mut dist = [0; NUM_AXIS];
        dist[0] = 1000;
        dist[1] = 500;
        let mv = Movement::new_move(&limits(), None, 1000, &dist, AxisMask::EMPTY.with(1), 80);
        let data = mv.move_data().unwrap();
        assert_eq!(mv.max_step_multiplier(), 3);
        assert!(data.dir_count.count(1) <= 3);
        assert!(data.dir_count.direction_up(1));
        assert!(!data.dir_count.direction_up(0));
    }

    #[test]
    fn test_collinear_junction_keeps_speed() {
        let (dist, dirs) = single_axis(5000, true);
        let first = Movement::new_move(&limits(), None, 5000, &dist, dirs, 200);
        let second = Movement::new_move(&limits(), Some(&first), 5000, &dist, dirs, 200);
        assert_eq!(second.move_data().unwrap().timer_max_junction, 200);
    }

    #[test]
    fn test_collinear_junction_takes_slower_speed() {
        let (dist, dirs) = single_axis(5000, true);
        let first = Movement::new_move(&limits(), None, 5000, &dist, dirs, 200);
        let second = Movement::new_move(&limits(), Some(&first), 5000, &dist, dirs, 400);
        assert_eq!(second.move_data().unwrap().timer_max_junction, 400);
    }

    #[test]
    fn test_reversal_forces_stop() {
        let (dist, up) = single_axis(5000, true);
        let (_, down) = single_axis(5000, false);
        let first = Movement::new_move(&limits(), None, 5000, &dist, up, 200);
        let second = Movement::new_move(&limits(), Some(&first), 5000, &dist, down, 200);
        assert_eq!(second.move_data().unwrap().timer_max_junction, 5714);
    }

    #[test]
    fn test_corner_reduced_to_jerk() {
        let mut x = [0; NUM_AXIS];
        x[0] = 5000;
        let mut y = [0; NUM_AXIS];
        y[1] = 5000;
        let first = Movement::new_move(&limits(), None, 5000, &x, AxisMask::EMPTY, 400);
        let second = Movement::new_move(&limits(), Some(&first), 5000, &y, AxisMask::EMPTY, 400);
        // both axes see a 5000 steps/s jump, jerk 1000 allows a fifth of it
        assert_eq!(second.move_data().unwrap().timer_max_junction, 2000);
    }

    #[test]
    fn test_stop_move_covers_dec_steps() {
        let (dist, dirs) = single_axis(5000, true);
        let mut mv = Movement::new_move(&limits(), None, 5000, &dist, dirs, 200);
        mv.phase = Phase::Run;
        let stop = Movement::new_stop(&mv, 200, 5714);
        assert_eq!(stop.steps, 448);
        assert_eq!(stop.phase, Phase::Ready);
        let data = stop.move_data().unwrap();
        assert_eq!(data.ramp.up_steps, 0);
        assert_eq!(data.ramp.down_start_at, 0);
        assert_eq!(data.planned[0], 448);
    }

    #[test]
    fn test_wait_end() {
        let conditional = WaitData {
            timer: 20_000,
            end_time: None,
            conditional: true,
        };
        assert!(!conditional.is_end(true, 0));
        assert!(conditional.is_end(false, 0));

        let clock = WaitData {
            timer: 20_000,
            end_time: Some(500),
            conditional: false,
        };
        assert!(!clock.is_end(false, 499));
        assert!(clock.is_end(false, 500));
        assert!(clock.is_end(true, 501));
    }

    #[test]
    fn test_wait_and_io_are_not_moves() {
        let wait = Movement::new_wait(10, 20_000, None, false);
        assert!(wait.is_active_wait());
        assert!(!wait.is_active_move());
        let io = Movement::new_io(1, 255);
        assert!(io.is_active_io());
        assert!(io.is_skip_for_optimizing());
        assert_eq!(io.distance(0), 0);
    }

    #[test]
    fn test_replan_rejected_after_point_passed() {
        let (dist, dirs) = single_axis(1000, true);
        let mut mv = Movement::new_move(&limits(), None, 1000, &dist, dirs, 200);
        mv.phase = Phase::Run;
        assert!(mv.replan_ramp(Some(200), 10));
        assert_eq!(mv.move_data().unwrap().ramp.down_steps, 0);
        // stopping now would need a down phase starting at 552
        assert!(!mv.replan_ramp(None, 999));
        assert_eq!(mv.move_data().unwrap().ramp.down_steps, 0);
        mv.phase = Phase::DownDec;
        assert!(!mv.replan_ramp(None, 0));
    }
}
