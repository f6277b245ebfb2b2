//! The engine: owned queues, live state and configuration.

use crate::buffer::{RingBufferQueue, StepBuffer};
use crate::config::units::{
    axis, speed_to_timer, timer_to_speed, AxisMask, MDist, SDist, SpeedOverride, StepRate, Timer, NUM_AXIS,
    NUM_REFERENCE, TIMER_STANDSTILL,
};
use crate::config::{validate_config, AxisConfig, BackgroundMode, ReferenceLevel, SoftLimits, StepperConfig};
use crate::error::{Error, FatalError, MotionError, Result};
use crate::motion::timing::{isqrt, mul_div};
use crate::motion::{MotionLimits, Movement, MovementState};

use super::builder::StepperEngineBuilder;
use super::event::{Notice, StepperEvent};
use super::hal::StepperHal;

/// Slots of the movement queue.
pub const MOVEMENT_BUFFER_SIZE: usize = 16;

/// Slots of the step buffer.
pub const STEP_BUFFER_SIZE: usize = 32;

/// Step-buffer fill level above which a wait or I/O entry is not started yet.
pub const SYNC_STEP_BUFFER_COUNT: usize = 8;

/// Milliseconds a reference input must hold its level to count (debounce).
pub const REFERENCE_STABLE_TIME: u32 = 2;

/// Enable level of a fully powered axis.
pub const LEVEL_MAX: u8 = 255;

/// Enable level of a switched off axis.
pub const LEVEL_OFF: u8 = 0;

/// Multi-axis stepper motion engine.
///
/// Owns the movement queue, the step buffer, the state of the executing
/// movement and the hardware behind `H`. Thread-context calls (queueing,
/// control) and interrupt-context calls ([`on_step_timer`](Self::on_step_timer),
/// [`fill_step_buffer`](Self::fill_step_buffer)) all take `&mut self`; sharing
/// between both contexts goes through [`SharedStepper`](crate::SharedStepper).
pub struct StepperEngine<H: StepperHal> {
    pub(super) hal: H,

    pub(super) movements: RingBufferQueue<Movement, MOVEMENT_BUFFER_SIZE>,
    pub(super) steps: RingBufferQueue<StepBuffer, STEP_BUFFER_SIZE>,
    pub(super) state: MovementState,

    pub(super) limits: MotionLimits,
    pub(super) timer_max_default: Timer,
    pub(super) soft_limits: [SoftLimits; NUM_AXIS],
    pub(super) backlash: [MDist; NUM_AXIS],
    pub(super) timer_backlash: Timer,
    pub(super) invert_direction: AxisMask,
    pub(super) reference_hit: [Option<ReferenceLevel>; NUM_REFERENCE],
    pub(super) speed_override: SpeedOverride,
    pub(super) background: BackgroundMode,

    pub(super) wait_finish_move: bool,
    pub(super) check_reference: bool,
    pub(super) limit_check: bool,

    /// Position as output to the drivers.
    pub(super) current_position: [SDist; NUM_AXIS],
    /// Position after all queued moves.
    pub(super) calculated_position: [SDist; NUM_AXIS],
    /// Direction of the last queued move per axis, for backlash.
    pub(super) last_direction: AxisMask,
    /// Direction last written to the drivers, before inversion.
    pub(super) last_direction_up: Option<AxisMask>,

    pub(super) timer_running: bool,
    pub(super) emergency_stop: bool,
    pub(super) pause: bool,
    pub(super) wait_conditional: bool,
    pub(super) background_pending: bool,

    pub(super) idle_level: u8,
    pub(super) enable_timeout_all: u16,
    pub(super) enable_timeout: [u8; NUM_AXIS],
    pub(super) enable_level: [u8; NUM_AXIS],
    /// Seconds left until the axis drops to the idle level, 0 = not counting.
    pub(super) time_enable: [u8; NUM_AXIS],
    pub(super) timer_start_or_on_idle: u32,
    pub(super) timer_last_check_enable: u32,

    pub(super) total_steps: u64,
    pub(super) isr_busy_count: u32,
    pub(super) last_error: Option<Error>,
    pub(super) fatal_error: Option<FatalError>,
}

impl<H: StepperHal> StepperEngine<H> {
    /// Create an engine driving `hal`, configured from `config`.
    ///
    /// Switches all enables off and starts the idle timer.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration fails validation.
    pub fn new(hal: H, config: &StepperConfig) -> Result<Self> {
        validate_config(config)?;

        let default_axis = AxisConfig::default();
        let mut engine = Self {
            hal,
            movements: RingBufferQueue::new(),
            steps: RingBufferQueue::new(),
            state: MovementState::default(),
            limits: MotionLimits {
                timer_max: [speed_to_timer(default_axis.max_speed); NUM_AXIS],
                timer_acc: [speed_to_timer(default_axis.acc); NUM_AXIS],
                timer_dec: [speed_to_timer(default_axis.dec); NUM_AXIS],
                max_jerk_speed: [default_axis.jerk; NUM_AXIS],
            },
            timer_max_default: speed_to_timer(config.default_max_speed),
            soft_limits: [SoftLimits::default(); NUM_AXIS],
            backlash: [0; NUM_AXIS],
            timer_backlash: config.backlash_speed.map_or(TIMER_STANDSTILL, speed_to_timer),
            invert_direction: AxisMask::EMPTY,
            reference_hit: [None; NUM_REFERENCE],
            speed_override: SpeedOverride::from_percent(config.speed_override),
            background: config.background,
            wait_finish_move: config.wait_finish_move,
            check_reference: config.check_reference,
            limit_check: config.limit_check,
            current_position: [0; NUM_AXIS],
            calculated_position: [0; NUM_AXIS],
            last_direction: AxisMask::EMPTY,
            last_direction_up: None,
            timer_running: false,
            emergency_stop: false,
            pause: false,
            wait_conditional: false,
            background_pending: false,
            idle_level: config.idle_level,
            enable_timeout_all: config.enable_timeout,
            enable_timeout: [0; NUM_AXIS],
            enable_level: [LEVEL_OFF; NUM_AXIS],
            time_enable: [0; NUM_AXIS],
            timer_start_or_on_idle: 0,
            timer_last_check_enable: 0,
            total_steps: 0,
            isr_busy_count: 0,
            last_error: None,
            fatal_error: None,
        };

        for (axis, axis_config) in config.axes.iter().enumerate() {
            engine.apply_axis_config(axis, axis_config);
        }

        for axis in 0..NUM_AXIS {
            engine.hal.set_enable(axis, LEVEL_OFF);
        }
        engine.go_idle();

        Ok(engine)
    }

    fn apply_axis_config(&mut self, axis: usize, config: &AxisConfig) {
        self.limits.timer_max[axis] = speed_to_timer(config.max_speed);
        self.limits.timer_acc[axis] = speed_to_timer(config.acc_speed());
        self.limits.timer_dec[axis] = speed_to_timer(config.dec_speed());
        self.limits.max_jerk_speed[axis] = config.jerk;
        self.soft_limits[axis] = config.soft_limits();
        self.backlash[axis] = config.backlash;
        self.invert_direction.set(axis, config.invert_direction);
        self.enable_timeout[axis] = config.enable_timeout;
        self.reference_hit[axis * 2] = config.reference_min;
        self.reference_hit[axis * 2 + 1] = config.reference_max;
    }

    /// The hardware layer.
    #[inline]
    pub fn hal(&self) -> &H {
        &self.hal
    }

    /// The hardware layer, mutably.
    #[inline]
    pub fn hal_mut(&mut self) -> &mut H {
        &mut self.hal
    }

    /// Consume the engine and hand back the hardware layer.
    pub fn release(self) -> H {
        self.hal
    }

    /// Start building an engine.
    pub fn builder() -> StepperEngineBuilder<H> {
        StepperEngineBuilder::new()
    }

    // ---------------------------------------------------------------
    // Configuration

    /// Derive jerk, acceleration and deceleration of all axes from a
    /// single max speed, scaled from a machine tuned for 28000 steps/s.
    pub fn set_usual(&mut self, v_max: StepRate) {
        const DEF_SPEED: u64 = 28_000;
        const DEF_ACC: u64 = 350;
        const DEF_DEC: u64 = 380;
        const DEF_JERK: StepRate = 1000;
        const MIN_ACC_DEC: StepRate = 62;

        let jerk = mul_div(v_max, DEF_JERK, DEF_SPEED as StepRate);
        let sqrt = round_sqrt(u64::from(v_max) * 10_000 / DEF_SPEED);
        let acc = ((sqrt * DEF_ACC / 100) as StepRate).max(MIN_ACC_DEC);
        let dec = ((sqrt * DEF_DEC / 100) as StepRate).max(MIN_ACC_DEC);

        self.timer_max_default = speed_to_timer(v_max);
        self.limits.timer_acc = [speed_to_timer(acc); NUM_AXIS];
        self.limits.timer_dec = [speed_to_timer(dec); NUM_AXIS];
        self.limits.max_jerk_speed = [jerk; NUM_AXIS];
    }

    /// Speed of moves queued without an explicit speed.
    pub fn set_default_max_speed(&mut self, v_max: StepRate) {
        self.timer_max_default = speed_to_timer(v_max);
    }

    /// Speed of moves queued without an explicit speed.
    pub fn default_max_speed(&self) -> StepRate {
        timer_to_speed(self.timer_max_default)
    }

    /// Set the max speed of `axis`.
    pub fn set_max_speed(&mut self, axis: usize, v_max: StepRate) -> Result<()> {
        check_axis(axis)?;
        self.limits.timer_max[axis] = speed_to_timer(v_max);
        Ok(())
    }

    /// Max speed of `axis`, capped by the default speed.
    ///
    /// # Panics
    ///
    /// Panics if `axis >= NUM_AXIS`.
    pub fn max_speed(&self, axis: usize) -> StepRate {
        self.default_max_speed().min(timer_to_speed(self.limits.timer_max[axis]))
    }

    /// Set the acceleration start speed of `axis`.
    pub fn set_acc(&mut self, axis: usize, v0_acc: StepRate) -> Result<()> {
        check_axis(axis)?;
        self.limits.timer_acc[axis] = speed_to_timer(v0_acc);
        Ok(())
    }

    /// Acceleration start speed of `axis`.
    ///
    /// # Panics
    ///
    /// Panics if `axis >= NUM_AXIS`.
    pub fn acc(&self, axis: usize) -> StepRate {
        timer_to_speed(self.limits.timer_acc[axis])
    }

    /// Set the deceleration stop speed of `axis`.
    pub fn set_dec(&mut self, axis: usize, v0_dec: StepRate) -> Result<()> {
        check_axis(axis)?;
        self.limits.timer_dec[axis] = speed_to_timer(v0_dec);
        Ok(())
    }

    /// Deceleration stop speed of `axis`.
    ///
    /// # Panics
    ///
    /// Panics if `axis >= NUM_AXIS`.
    pub fn dec(&self, axis: usize) -> StepRate {
        timer_to_speed(self.limits.timer_dec[axis])
    }

    /// Set the jerk speed of `axis`.
    pub fn set_jerk_speed(&mut self, axis: usize, jerk: StepRate) -> Result<()> {
        check_axis(axis)?;
        self.limits.max_jerk_speed[axis] = jerk;
        Ok(())
    }

    /// Jerk speed of `axis`.
    ///
    /// # Panics
    ///
    /// Panics if `axis >= NUM_AXIS`.
    pub fn jerk_speed(&self, axis: usize) -> StepRate {
        self.limits.max_jerk_speed[axis]
    }

    /// Set the soft limits of `axis`.
    pub fn set_limits(&mut self, axis: usize, limits: SoftLimits) -> Result<()> {
        check_axis(axis)?;
        self.soft_limits[axis] = limits;
        Ok(())
    }

    /// Soft limits of `axis`.
    ///
    /// # Panics
    ///
    /// Panics if `axis >= NUM_AXIS`.
    pub fn limits(&self, axis: usize) -> SoftLimits {
        self.soft_limits[axis]
    }

    /// Set the backlash distance of `axis` in steps.
    pub fn set_backlash(&mut self, axis: usize, dist: MDist) -> Result<()> {
        check_axis(axis)?;
        self.backlash[axis] = dist;
        Ok(())
    }

    /// Speed of backlash moves; `None` disables compensation.
    pub fn set_backlash_speed(&mut self, speed: Option<StepRate>) {
        self.timer_backlash = speed.map_or(TIMER_STANDSTILL, speed_to_timer);
    }

    /// Whether backlash compensation is on.
    pub fn is_backlash_enabled(&self) -> bool {
        self.timer_backlash != TIMER_STANDSTILL
    }

    /// Set the axes whose direction output is inverted.
    pub fn set_direction(&mut self, invert: AxisMask) {
        self.invert_direction = invert;
    }

    /// Idle seconds after which all axes drop to the idle level (0 = never).
    pub fn set_enable_timeout(&mut self, seconds: u16) {
        self.enable_timeout_all = seconds;
    }

    /// Seconds without a step after which `axis` drops to the idle level (0 = never).
    pub fn set_axis_enable_timeout(&mut self, axis: usize, seconds: u8) -> Result<()> {
        check_axis(axis)?;
        self.enable_timeout[axis] = seconds;
        Ok(())
    }

    /// Enable level of idle axes.
    pub fn set_idle_level(&mut self, level: u8) {
        self.idle_level = level;
    }

    /// Current enable level of `axis`.
    ///
    /// # Panics
    ///
    /// Panics if `axis >= NUM_AXIS`.
    pub fn enable_level(&self, axis: usize) -> u8 {
        self.enable_level[axis]
    }

    /// Set the speed override applied to every emitted timer value.
    pub fn set_speed_override(&mut self, speed: SpeedOverride) {
        self.speed_override = SpeedOverride(speed.0.max(1));
    }

    /// Current speed override.
    pub fn speed_override(&self) -> SpeedOverride {
        self.speed_override
    }

    /// Make queue calls wait until the queued move has finished.
    pub fn set_wait_finish_move(&mut self, wait: bool) {
        self.wait_finish_move = wait;
    }

    /// Whether queue calls wait until the queued move has finished.
    pub fn is_wait_finish_move(&self) -> bool {
        self.wait_finish_move
    }

    /// Treat a reference switch hit during a move as fatal.
    pub fn set_check_for_reference(&mut self, check: bool) {
        self.check_reference = check;
    }

    /// Whether reference switches are checked during moves.
    pub fn is_check_for_reference(&self) -> bool {
        self.check_reference
    }

    /// Reject moves outside the soft limits.
    pub fn set_limit_check(&mut self, check: bool) {
        self.limit_check = check;
    }

    /// Whether moves are checked against the soft limits.
    pub fn is_limit_check(&self) -> bool {
        self.limit_check
    }

    /// Set the hit level of reference input `reference`; `None` marks it unused.
    pub fn set_reference_hit_value(&mut self, reference: usize, level: Option<ReferenceLevel>) -> Result<()> {
        let slot = self
            .reference_hit
            .get_mut(reference)
            .ok_or(Error::Motion(MotionError::InvalidAxis(reference / 2)))?;
        *slot = level;
        Ok(())
    }

    /// Hold conditional waits while set.
    pub fn set_wait_conditional(&mut self, wait: bool) {
        self.wait_conditional = wait;
    }

    /// Whether conditional waits are held.
    pub fn is_wait_conditional(&self) -> bool {
        self.wait_conditional
    }

    // ---------------------------------------------------------------
    // State and diagnostics

    /// Whether the step timer is running.
    #[inline]
    pub fn is_busy(&self) -> bool {
        self.timer_running
    }

    /// Whether a movement can be queued without waiting.
    #[inline]
    pub fn can_queue_movement(&self) -> bool {
        !self.movements.is_full()
    }

    /// Number of queued movements.
    #[inline]
    pub fn queued_movements(&self) -> usize {
        self.movements.count()
    }

    /// Free slots of the movement queue.
    #[inline]
    pub fn free_movements(&self) -> usize {
        self.movements.free_count()
    }

    /// Number of entries waiting in the step buffer.
    #[inline]
    pub fn buffered_steps(&self) -> usize {
        self.steps.count()
    }

    /// Steps of all moves queued so far, minus what was aborted.
    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    /// How often the timer interrupt found the deferred refill still pending.
    pub fn isr_busy_count(&self) -> u32 {
        self.isr_busy_count
    }

    /// Position of `axis` as output to the driver.
    ///
    /// # Panics
    ///
    /// Panics if `axis >= NUM_AXIS`.
    #[inline]
    pub fn current_position(&self, axis: usize) -> SDist {
        self.current_position[axis]
    }

    /// Position of `axis` once all queued moves have run.
    ///
    /// # Panics
    ///
    /// Panics if `axis >= NUM_AXIS`.
    #[inline]
    pub fn calculated_position(&self, axis: usize) -> SDist {
        self.calculated_position[axis]
    }

    /// Output positions of all axes.
    pub fn positions(&self) -> [SDist; NUM_AXIS] {
        self.current_position
    }

    /// Last error raised, cleared at the start of every queued move.
    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    /// Latched fatal error.
    pub fn fatal_error(&self) -> Option<&FatalError> {
        self.fatal_error.as_ref()
    }

    /// Whether an emergency stop is latched.
    pub fn is_emergency_stop(&self) -> bool {
        self.emergency_stop
    }

    /// Whether motion is paused.
    pub fn is_pause_move(&self) -> bool {
        self.pause
    }

    /// Queued movements, head first.
    pub fn movements(&self) -> impl Iterator<Item = &Movement> + '_ {
        self.movements.iter()
    }

    // ---------------------------------------------------------------
    // Error and event plumbing

    /// Fail if a fatal error or emergency stop is latched.
    pub(super) fn check_runnable(&self) -> Result<()> {
        if let Some(fatal) = &self.fatal_error {
            return Err(Error::Fatal(fatal.clone()));
        }
        if self.emergency_stop {
            return Err(Error::Fatal(FatalError::EmergencyStop));
        }
        Ok(())
    }

    /// Latch and report `error`, then hand it back for returning.
    pub(super) fn raise_error(&mut self, error: Error) -> Error {
        self.last_error = Some(error.clone());
        self.hal.on_event(&StepperEvent::Error(error.clone()));
        error
    }

    /// Latch a fatal error.
    pub(super) fn raise_fatal(&mut self, fatal: FatalError) {
        self.fatal_error = Some(fatal.clone());
        self.raise_error(Error::Fatal(fatal));
    }

    pub(super) fn notice(&mut self, notice: Notice) {
        self.hal.on_event(&StepperEvent::Info(notice));
    }

    /// Drive the enable of `axis` if it differs from the tracked level.
    pub(super) fn set_enable_safe(&mut self, axis: usize, level: u8) -> bool {
        set_enable_level(&mut self.hal, &mut self.enable_level, axis, level)
    }
}

/// Write `level` to `axis` unless it is already set. Returns whether it changed.
pub(super) fn set_enable_level<H: StepperHal>(
    hal: &mut H,
    levels: &mut [u8; NUM_AXIS],
    axis: usize,
    level: u8,
) -> bool {
    if levels[axis] == level {
        return false;
    }
    levels[axis] = level;
    hal.set_enable(axis, level);
    true
}

pub(super) fn check_axis(axis: usize) -> Result<()> {
    if axis::is_valid(axis) {
        Ok(())
    } else {
        Err(Error::Motion(MotionError::InvalidAxis(axis)))
    }
}

fn round_sqrt(value: u64) -> u64 {
    let root = isqrt(value);
    if value - root * root > root {
        root + 1
    } else {
        root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct NullHal {
        enables: [u8; NUM_AXIS],
        enable_writes: usize,
    }

    impl StepperHal for NullHal {
        fn step(&mut self, _pulses: [u8; NUM_AXIS], _direction_up: AxisMask, _direction_changed: bool) {}
        fn start_timer(&mut self, _ticks: Timer) {}
        fn millis(&self) -> u32 {
            0
        }
        fn reference_level(&mut self, _reference: usize) -> bool {
            false
        }
        fn set_enable(&mut self, axis: usize, level: u8) {
            self.enables[axis] = level;
            self.enable_writes += 1;
        }
    }

    fn engine() -> StepperEngine<NullHal> {
        StepperEngine::new(NullHal::default(), &StepperConfig::default()).unwrap()
    }

    #[test]
    fn test_new_engine_is_idle() {
        let engine = engine();
        assert!(!engine.is_busy());
        assert!(engine.can_queue_movement());
        assert_eq!(engine.queued_movements(), 0);
        assert_eq!(engine.free_movements(), MOVEMENT_BUFFER_SIZE);
        assert_eq!(engine.hal().enable_writes, NUM_AXIS);
        // 2 MHz / 71 ticks
        assert_eq!(engine.max_speed(0), 28_169);
        assert_eq!(engine.acc(0), 350);
        assert_eq!(engine.dec(0), 380);
    }

    #[test]
    fn test_set_usual_scales_ramps() {
        let mut engine = engine();
        engine.set_usual(28_000);
        assert_eq!(engine.jerk_speed(0), 1000);
        assert_eq!(engine.acc(0), 350);
        assert_eq!(engine.dec(0), 380);

        engine.set_usual(7000);
        assert_eq!(engine.default_max_speed(), 7017);
        assert_eq!(engine.jerk_speed(3), 250);
        // sqrt(2500) = 50
        assert_eq!(engine.acc(0), 175);
        assert_eq!(engine.dec(0), 190);

        engine.set_usual(100);
        assert_eq!(engine.acc(0), 62);
    }

    #[test]
    fn test_axis_setters_reject_invalid_axis() {
        let mut engine = engine();
        assert!(engine.set_max_speed(1, 1000).is_ok());
        assert_eq!(engine.max_speed(1), 1000);
        assert!(matches!(
            engine.set_acc(NUM_AXIS, 100),
            Err(Error::Motion(MotionError::InvalidAxis(6)))
        ));
        assert!(engine.set_reference_hit_value(NUM_REFERENCE, None).is_err());
    }

    #[test]
    fn test_enable_only_written_on_change() {
        let mut engine = engine();
        let writes = engine.hal().enable_writes;
        assert!(engine.set_enable_safe(2, LEVEL_MAX));
        assert!(!engine.set_enable_safe(2, LEVEL_MAX));
        assert_eq!(engine.hal().enable_writes, writes + 1);
        assert_eq!(engine.hal().enables[2], LEVEL_MAX);
        assert_eq!(engine.enable_level(2), LEVEL_MAX);
    }

    #[test]
    fn test_round_sqrt() {
        assert_eq!(round_sqrt(2500), 50);
        assert_eq!(round_sqrt(2551), 51);
        assert_eq!(round_sqrt(2549), 50);
    }
}
