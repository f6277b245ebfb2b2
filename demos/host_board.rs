//! Example: Driving STEP/DIR pins from a simulated board.
//!
//! This example demonstrates how to:
//! - Implement `StepperHal` on top of `StepDirPins`
//! - Build an engine from a TOML configuration
//! - Queue a path and watch the pulses reach the pins
//!
//! Time is simulated: every spin of the engine services one timer expiry.
//!
//! Run with: `cargo run --example host_board`

use cnc_stepper::config::units::{AxisMask, Timer, NUM_AXIS, TIMER_FREQUENCY};
use cnc_stepper::{
    parse_config, Result, StepDirPins, StepperEngine, StepperEvent, StepperHal, WaitAction,
};
use cnc_stepper::stepper::WaitType;

/// Output pin counting rising edges.
#[derive(Default)]
struct CountingPin {
    high: bool,
    rising_edges: u32,
}

impl embedded_hal::digital::ErrorType for CountingPin {
    type Error = core::convert::Infallible;
}

impl embedded_hal::digital::OutputPin for CountingPin {
    fn set_low(&mut self) -> core::result::Result<(), Self::Error> {
        self.high = false;
        Ok(())
    }

    fn set_high(&mut self) -> core::result::Result<(), Self::Error> {
        if !self.high {
            self.rising_edges += 1;
        }
        self.high = true;
        Ok(())
    }
}

/// Mock delay for demonstration.
struct NoDelay;

impl embedded_hal::delay::DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {
        // A real board would busy-wait here
    }
}

type AxisPins = StepDirPins<CountingPin, CountingPin, NoDelay>;

/// Two-axis board with a simulated timer.
struct HostBoard {
    axes: Vec<AxisPins>,
    clock_ticks: u64,
    armed: Timer,
    pin_errors: u32,
}

impl HostBoard {
    fn new(axes: usize) -> Self {
        Self {
            axes: (0..axes)
                .map(|_| StepDirPins::new(CountingPin::default(), CountingPin::default(), NoDelay))
                .collect(),
            clock_ticks: 0,
            armed: 0,
            pin_errors: 0,
        }
    }
}

impl StepperHal for HostBoard {
    fn step(&mut self, pulses: [u8; NUM_AXIS], direction_up: AxisMask, _direction_changed: bool) {
        for (axis, pins) in self.axes.iter_mut().enumerate() {
            if pins.output(pulses[axis], direction_up.contains(axis)).is_err() {
                self.pin_errors += 1;
            }
        }
    }

    fn start_timer(&mut self, ticks: Timer) {
        self.armed = ticks;
    }

    fn millis(&self) -> u32 {
        (self.clock_ticks / u64::from(TIMER_FREQUENCY / 1000)) as u32
    }

    fn reference_level(&mut self, _reference: usize) -> bool {
        false
    }

    fn set_enable(&mut self, axis: usize, level: u8) {
        println!("  enable axis {} -> {}", axis, level);
    }

    fn on_event(&mut self, event: &StepperEvent) {
        match event {
            StepperEvent::Idle { .. } | StepperEvent::Wait(_) => {}
            other => println!("  event: {:?}", other),
        }
    }

    fn on_wait(&mut self, _kind: WaitType) -> WaitAction {
        self.clock_ticks += u64::from(self.armed);
        WaitAction::ServiceTimer
    }
}

const BOARD_CONFIG: &str = r#"
default_max_speed = 20000
enable_timeout = 2

[[axes]]
name = "X"
limit_max = 100000
acceleration = 200000.0

[[axes]]
name = "Y"
limit_max = 100000
invert_direction = true
"#;

fn main() -> Result<()> {
    println!("=== Host Board Example ===\n");

    let config = parse_config(BOARD_CONFIG)?;
    let mut engine = StepperEngine::new(HostBoard::new(config.axes.len()), &config)?;

    println!("Square path:");
    let path = [[8000, 0], [8000, 8000], [0, 8000], [0, 0]];
    for corner in path {
        let mut target = engine.positions();
        target[..2].copy_from_slice(&corner);
        engine.move_abs(&target, 0)?;
        println!(
            "  at ({:>5}, {:>5}) after {} ms",
            engine.current_position(0),
            engine.current_position(1),
            engine.hal().millis()
        );
    }

    println!("\nPins:");
    let board = engine.release();
    for (axis, pins) in board.axes.into_iter().enumerate() {
        let (step, dir, _) = pins.release();
        println!(
            "  axis {}: {} STEP edges, DIR {}",
            axis,
            step.rising_edges,
            if dir.high { "high" } else { "low" }
        );
    }
    println!("  pin errors: {}", board.pin_errors);

    Ok(())
}
