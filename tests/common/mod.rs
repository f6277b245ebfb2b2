//! Simulated board for integration tests.
//!
//! Time only advances when the engine's step timer "fires": every spinning
//! engine call services one timer expiry, and the clock moves on by the
//! ticks that expiry was armed with.

#![allow(dead_code)]

use cnc_stepper::config::units::{AxisMask, SDist, Timer, NUM_AXIS, NUM_REFERENCE, TIMER_FREQUENCY};
use cnc_stepper::config::{AxisConfig, StepperConfig};
use cnc_stepper::stepper::{StepperEngine, StepperEvent, StepperHal, WaitAction, WaitType};

/// One call of [`StepperHal::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepRecord {
    /// Clock when the pulses went out.
    pub at_ticks: u64,
    /// Timer the entry was armed with.
    pub timer: Timer,
    pub pulses: [u8; NUM_AXIS],
    pub direction_up: AxisMask,
}

/// Position dependent switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Switch {
    /// Reads high while the axis is at or below the position.
    AtOrBelow(usize, SDist),
    /// Reads high while the axis is at or above the position.
    AtOrAbove(usize, SDist),
    /// Always reads high.
    Stuck,
}

#[derive(Debug, Default)]
pub struct SimHal {
    pub clock_ticks: u64,
    pub armed: Timer,
    /// Position as seen from the pulses on the wire.
    pub positions: [SDist; NUM_AXIS],
    pub steps: Vec<StepRecord>,
    pub events: Vec<StepperEvent>,
    pub enables: [u8; NUM_AXIS],
    pub switches: [Option<Switch>; NUM_REFERENCE],
    pub background_requests: u32,
    /// Reference reads, for sequencing checks.
    pub reference_reads: u32,
}

impl SimHal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_switch(mut self, reference: usize, switch: Switch) -> Self {
        self.switches[reference] = Some(switch);
        self
    }

    /// Advance the clock by the armed timer.
    pub fn elapse(&mut self) {
        self.clock_ticks += u64::from(self.armed);
    }

    /// Pulses emitted per axis, directions ignored.
    pub fn pulse_totals(&self) -> [u64; NUM_AXIS] {
        let mut totals = [0u64; NUM_AXIS];
        for record in &self.steps {
            for (total, &count) in totals.iter_mut().zip(record.pulses.iter()) {
                *total += u64::from(count);
            }
        }
        totals
    }

    pub fn has_event(&self, event: &StepperEvent) -> bool {
        self.events.iter().any(|e| e == event)
    }
}

impl StepperHal for SimHal {
    fn step(&mut self, pulses: [u8; NUM_AXIS], direction_up: AxisMask, _direction_changed: bool) {
        for axis in 0..NUM_AXIS {
            let delta = SDist::from(pulses[axis]);
            if direction_up.contains(axis) {
                self.positions[axis] += delta;
            } else {
                self.positions[axis] -= delta;
            }
        }
        self.steps.push(StepRecord {
            at_ticks: self.clock_ticks,
            timer: self.armed,
            pulses,
            direction_up,
        });
    }

    fn start_timer(&mut self, ticks: Timer) {
        self.armed = ticks;
    }

    fn millis(&self) -> u32 {
        (self.clock_ticks / u64::from(TIMER_FREQUENCY / 1000)) as u32
    }

    fn reference_level(&mut self, reference: usize) -> bool {
        self.reference_reads += 1;
        match self.switches[reference] {
            Some(Switch::AtOrBelow(axis, at)) => self.positions[axis] <= at,
            Some(Switch::AtOrAbove(axis, at)) => self.positions[axis] >= at,
            Some(Switch::Stuck) => true,
            None => false,
        }
    }

    fn set_enable(&mut self, axis: usize, level: u8) {
        self.enables[axis] = level;
    }

    fn request_background(&mut self) {
        self.background_requests += 1;
    }

    fn on_event(&mut self, event: &StepperEvent) {
        if !matches!(event, StepperEvent::Idle { .. }) {
            self.events.push(event.clone());
        }
    }

    fn on_wait(&mut self, _kind: WaitType) -> WaitAction {
        self.elapse();
        WaitAction::ServiceTimer
    }
}

/// Fire the step timer once, as the interrupt would.
pub fn tick(engine: &mut StepperEngine<SimHal>) {
    engine.hal_mut().elapse();
    engine.on_step_timer();
}

/// Fire the step timer until the engine is idle or `limit` expiries passed.
pub fn run_until_idle(engine: &mut StepperEngine<SimHal>, limit: usize) {
    for _ in 0..limit {
        if !engine.is_busy() {
            return;
        }
        tick(engine);
    }
}

/// Configuration with `axes` identical axes allowed to go negative.
pub fn config(axes: usize, wait_finish_move: bool) -> StepperConfig {
    let mut config = StepperConfig {
        wait_finish_move,
        ..Default::default()
    };
    for _ in 0..axes {
        config
            .axes
            .push(AxisConfig {
                limit_min: -1_000_000,
                limit_max: 1_000_000,
                ..Default::default()
            })
            .unwrap();
    }
    config
}

pub fn engine(hal: SimHal, config: &StepperConfig) -> StepperEngine<SimHal> {
    StepperEngine::new(hal, config).unwrap()
}
