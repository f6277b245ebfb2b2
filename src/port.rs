//! Sharing one engine between thread context and interrupts.
//!
//! [`SharedStepper`] keeps the engine behind a [`critical_section::Mutex`],
//! so it can live in a `static` and be reached from the step timer
//! interrupt, the background refill and the main loop:
//!
//! ```rust,ignore
//! static STEPPER: SharedStepper<Board> = SharedStepper::new();
//!
//! #[interrupt]
//! fn TIM2() {
//!     STEPPER.on_step_timer();
//! }
//!
//! #[interrupt]
//! fn SWI0() {
//!     STEPPER.on_background();
//! }
//! ```
//!
//! Every engine call runs inside one critical section. Calls that spin
//! inside the engine ([`StepperEngine::wait_busy`], a full movement queue,
//! `wait_finish_move`) would hold that section forever. Use the helpers
//! here instead, which spin outside of it, and build the engine with
//! `wait_finish_move` off.

use core::cell::{Cell, RefCell};

use critical_section::Mutex;

use crate::config::units::StepRate;
use crate::stepper::{StepperEngine, StepperHal};

/// An engine shared between thread context and interrupt handlers.
pub struct SharedStepper<H: StepperHal> {
    engine: Mutex<RefCell<Option<StepperEngine<H>>>>,
    /// A background refill is running; nested requests return at once.
    background_busy: Mutex<Cell<bool>>,
}

impl<H: StepperHal> Default for SharedStepper<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: StepperHal> SharedStepper<H> {
    /// Empty handle, usable in a `static`.
    pub const fn new() -> Self {
        Self {
            engine: Mutex::new(RefCell::new(None)),
            background_busy: Mutex::new(Cell::new(false)),
        }
    }

    /// Put `engine` in place, returning the previous one.
    pub fn install(&self, engine: StepperEngine<H>) -> Option<StepperEngine<H>> {
        critical_section::with(|cs| self.engine.borrow(cs).replace(Some(engine)))
    }

    /// Remove the engine.
    pub fn take(&self) -> Option<StepperEngine<H>> {
        critical_section::with(|cs| self.engine.borrow(cs).take())
    }

    /// Run `f` on the engine inside a critical section.
    ///
    /// Returns `None` if no engine is installed.
    pub fn with<R, F>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&mut StepperEngine<H>) -> R,
    {
        critical_section::with(|cs| self.engine.borrow(cs).borrow_mut().as_mut().map(f))
    }

    /// Step timer interrupt entry.
    pub fn on_step_timer(&self) {
        self.with(StepperEngine::on_step_timer);
    }

    /// Background refill entry, run at a lower priority than the step timer.
    ///
    /// Refills one step-buffer entry per critical section so the timer
    /// interrupt can preempt in between.
    pub fn on_background(&self) {
        let nested = critical_section::with(|cs| self.background_busy.borrow(cs).replace(true));
        if nested {
            return;
        }
        while self.with(StepperEngine::fill_step_buffer_once).unwrap_or(false) {}
        critical_section::with(|cs| self.background_busy.borrow(cs).set(false));
    }

    /// Whether the engine is stepping.
    pub fn is_busy(&self) -> bool {
        self.with(|engine| engine.is_busy()).unwrap_or(false)
    }

    /// Spin until the engine is idle.
    pub fn wait_busy(&self) {
        while self.is_busy() {
            core::hint::spin_loop();
        }
    }

    /// Spin until the movement queue has `slots` free entries, then run `f`.
    ///
    /// A move may take one extra slot for backlash and one per
    /// [`MAX_STEPS_PER_MOVE`](crate::stepper::MAX_STEPS_PER_MOVE) steps.
    pub fn with_free_slots<R, F>(&self, slots: usize, f: F) -> Option<R>
    where
        F: FnOnce(&mut StepperEngine<H>) -> R,
    {
        let mut f = Some(f);
        loop {
            let done = critical_section::with(|cs| {
                let mut engine = self.engine.borrow(cs).borrow_mut();
                let engine = engine.as_mut()?;
                if engine.free_movements() < slots {
                    return Some(None);
                }
                f.take().map(|f| Some(f(engine)))
            });
            match done {
                None => return None,
                Some(Some(result)) => return Some(result),
                Some(None) => core::hint::spin_loop(),
            }
        }
    }

    /// Decelerate to a stop and wait for the engine to go idle.
    pub fn stop_move(&self, v0_dec: StepRate) {
        if self.with(|engine| engine.request_stop(v0_dec)) == Some(true) {
            self.wait_busy();
            self.with(StepperEngine::reconcile_position);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::units::{AxisMask, Timer, NUM_AXIS};
    use crate::config::{BackgroundMode, StepperConfig};

    #[derive(Default)]
    struct CountingHal {
        pulses: [u32; NUM_AXIS],
        background_requests: u32,
    }

    impl StepperHal for CountingHal {
        fn step(&mut self, pulses: [u8; NUM_AXIS], _direction_up: AxisMask, _direction_changed: bool) {
            for (total, count) in self.pulses.iter_mut().zip(pulses) {
                *total += u32::from(count);
            }
        }
        fn start_timer(&mut self, _ticks: Timer) {}
        fn millis(&self) -> u32 {
            0
        }
        fn reference_level(&mut self, _reference: usize) -> bool {
            false
        }
        fn set_enable(&mut self, _axis: usize, _level: u8) {}
        fn request_background(&mut self) {
            self.background_requests += 1;
        }
    }

    fn shared(background: BackgroundMode) -> SharedStepper<CountingHal> {
        let config = StepperConfig {
            wait_finish_move: false,
            background,
            ..Default::default()
        };
        let shared = SharedStepper::new();
        shared.install(StepperEngine::new(CountingHal::default(), &config).unwrap());
        shared
    }

    #[test]
    fn test_empty_handle() {
        let shared: SharedStepper<CountingHal> = SharedStepper::new();
        assert!(shared.with(|e| e.is_busy()).is_none());
        assert!(!shared.is_busy());
        shared.on_step_timer();
        shared.on_background();
        assert!(shared.take().is_none());
    }

    #[test]
    fn test_inline_move_runs_from_interrupt() {
        let shared = shared(BackgroundMode::Inline);
        shared
            .with_free_slots(2, |e| e.move_rel(&[200, -50, 0, 0, 0, 0], 5000))
            .unwrap()
            .unwrap();

        while shared.is_busy() {
            shared.on_step_timer();
        }

        let engine = shared.take().unwrap();
        assert_eq!(engine.current_position(0), 200);
        assert_eq!(engine.current_position(1), -50);
        assert_eq!(engine.hal().pulses[0], 200);
        assert_eq!(engine.hal().pulses[1], 50);
    }

    #[test]
    fn test_deferred_refill() {
        let shared = shared(BackgroundMode::Deferred);
        shared
            .with_free_slots(2, |e| e.move_rel(&[0, 0, 300, 0, 0, 0], 8000))
            .unwrap()
            .unwrap();

        while shared.is_busy() {
            shared.on_step_timer();
            shared.on_background();
        }

        let engine = shared.take().unwrap();
        assert_eq!(engine.current_position(2), 300);
        assert!(engine.hal().background_requests > 0);
    }

    #[test]
    fn test_stop_move_with_interrupt_thread() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let shared = shared(BackgroundMode::Inline);
        let done = AtomicBool::new(false);
        shared
            .with_free_slots(2, |e| e.move_rel(&[60_000, 0, 0, 0, 0, 0], 5000))
            .unwrap()
            .unwrap();

        std::thread::scope(|s| {
            s.spawn(|| {
                while !done.load(Ordering::Relaxed) {
                    shared.on_step_timer();
                }
            });
            while shared.with(|e| e.current_position(0)).unwrap_or(0) < 100 {
                std::thread::yield_now();
            }
            shared.stop_move(0);
            done.store(true, Ordering::Relaxed);
        });

        let engine = shared.take().unwrap();
        let position = engine.current_position(0);
        assert!(!engine.is_busy());
        assert!(position >= 100 && position < 60_000);
        assert_eq!(engine.calculated_position(0), position);
    }
}
