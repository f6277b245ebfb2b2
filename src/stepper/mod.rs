//! The stepper engine.
//!
//! [`StepperEngine`] owns the movement queue and the step buffer. Thread
//! context queues moves and waits on them; the board's step timer interrupt
//! calls [`StepperEngine::on_step_timer`], which emits one step-buffer entry
//! per expiry and refills the buffer from the head movement.

mod builder;
mod control;
mod engine;
mod event;
mod hal;
mod pins;
mod planner;
mod queue;
mod reference;
mod scheduler;

pub use builder::StepperEngineBuilder;
pub use engine::{
    StepperEngine, LEVEL_MAX, LEVEL_OFF, MOVEMENT_BUFFER_SIZE, REFERENCE_STABLE_TIME, STEP_BUFFER_SIZE,
    SYNC_STEP_BUFFER_COUNT,
};
pub use event::{Notice, StepperEvent, WaitType};
pub use hal::{StepperHal, WaitAction};
pub use pins::{StepDirPins, DEFAULT_PULSE_WIDTH_US};
pub use queue::MAX_STEPS_PER_MOVE;
pub use reference::HomingParams;
