//! Fixed-capacity buffers shared between the planner and the step interrupt.

mod ring;
mod step;

pub use ring::RingBufferQueue;
pub use step::{DirCount, StepBuffer};
