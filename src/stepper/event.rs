//! Notifications the engine raises towards the control layer.

use crate::error::Error;
use crate::motion::IoControl;

/// Reason a caller is spinning inside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WaitType {
    /// Movement queue is full, waiting for a free slot.
    MovementQueueFull,
    /// Waiting for all queued movements to finish.
    WaitBusy,
    /// Waiting for a reference switch to change (time critical).
    WaitReference,
}

impl WaitType {
    /// Whether the waiting caller polls a switch and must not be delayed.
    #[inline]
    pub fn is_time_critical(self) -> bool {
        matches!(self, WaitType::WaitReference)
    }
}

/// Informational notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Notice {
    /// A move without any distance was dropped.
    EmptyMoveSkipped,
    /// A backlash catch-up move was queued.
    Backlash,
    /// A reference switch is already on before a reference move.
    ReferenceIsOn,
    /// Moving away did not release the reference switch.
    ReferenceStillOn,
}

/// Event raised through [`StepperHal::on_event`](super::StepperHal::on_event).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StepperEvent {
    /// The step timer was started from idle.
    Start,
    /// The engine is idle; raised on every idle poll.
    Idle {
        /// Milliseconds since the engine went idle.
        idle_ms: u32,
    },
    /// Axis enables were dropped to the idle level.
    Disable,
    /// A caller is spinning.
    Wait(WaitType),
    /// An error was latched.
    Error(Error),
    /// Something went wrong without aborting motion.
    Warning(Notice),
    /// Informational notice.
    Info(Notice),
    /// An I/O entry reached the head of the queue.
    Io(IoControl),
}
