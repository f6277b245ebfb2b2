//! Motion planning: moves, ramps, junction speeds and per-tick timing.
//!
//! Everything here is plain data and integer math; the stepper engine owns
//! the queues and calls into this module.

mod junction;
mod movement;
mod ramp;
mod state;
pub mod timing;

pub use movement::{IoControl, MotionLimits, MoveData, Movement, MovementKind, Phase, WaitData};
pub use ramp::{AccDec, Ramp};
pub use state::MovementState;
