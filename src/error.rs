//! Error types for cnc-stepper.
//!
//! Errors come in three classes. Configuration errors are returned while
//! setting the engine up. Motion errors are soft or operational: the request
//! is rejected or the motion aborted, and the caller may retry. Fatal errors
//! are latched by the engine and block all motion until
//! [`emergency_stop_resurrect`](crate::StepperEngine::emergency_stop_resurrect).

use core::fmt;

use crate::config::units::SDist;

/// Result type alias using the library's Error type.
pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for all cnc-stepper operations.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Configuration parsing or validation error
    Config(ConfigError),
    /// Rejected request or failed motion
    Motion(MotionError),
    /// Latched fault, cleared only by resurrecting the engine
    Fatal(FatalError),
}

/// Configuration-related errors.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Failed to parse TOML configuration
    ParseError(heapless::String<128>),
    /// A speed that must be positive is zero
    ZeroSpeed {
        /// Axis index
        axis: usize,
    },
    /// Jerk speed above the axis' maximum speed
    InvalidJerk {
        /// Axis index
        axis: usize,
        /// Configured jerk speed
        jerk: u32,
    },
    /// Soft limits with min > max
    InvalidSoftLimits {
        /// Minimum limit value
        min: SDist,
        /// Maximum limit value
        max: SDist,
    },
    /// Speed override outside 1..=199 %
    InvalidSpeedOverride(u8),
    /// A required builder field was not set
    MissingField(&'static str),
    /// File I/O error (std only)
    #[cfg(feature = "std")]
    IoError(heapless::String<128>),
}

/// Soft and operational motion errors.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotionError {
    /// Requested target lies outside the axis' soft limits; nothing was queued
    RangeLimit {
        /// Axis index
        axis: usize,
        /// Rejected target position
        position: SDist,
        /// Limit that was exceeded (min or max)
        limit: SDist,
    },
    /// Reference move did not find or leave the switch
    ReferenceFailed {
        /// Axis index
        axis: usize,
    },
    /// Axis index out of range
    InvalidAxis(usize),
    /// Step or direction pin operation failed
    PinError,
}

/// Latched faults.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FatalError {
    /// A reference switch triggered during a normal move
    UnexpectedReference {
        /// Reference id (`axis * 2`, `+ 1` for the max switch)
        reference: usize,
    },
    /// Emergency stop requested
    EmergencyStop,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "Configuration error: {}", e),
            Error::Motion(e) => write!(f, "Motion error: {}", e),
            Error::Fatal(e) => write!(f, "Fatal error: {}", e),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            ConfigError::ZeroSpeed { axis } => write!(f, "Axis {}: speeds must be > 0", axis),
            ConfigError::InvalidJerk { axis, jerk } => {
                write!(f, "Axis {}: jerk speed {} exceeds max speed", axis, jerk)
            }
            ConfigError::InvalidSoftLimits { min, max } => {
                write!(f, "Invalid soft limits: min ({}) must be <= max ({})", min, max)
            }
            ConfigError::InvalidSpeedOverride(p) => {
                write!(f, "Invalid speed override: {}%. Must be 1-199", p)
            }
            ConfigError::MissingField(field) => write!(f, "{} is required", field),
            #[cfg(feature = "std")]
            ConfigError::IoError(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl fmt::Display for MotionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotionError::RangeLimit { axis, position, limit } => {
                write!(f, "Axis {}: position {} exceeds limit {}", axis, position, limit)
            }
            MotionError::ReferenceFailed { axis } => write!(f, "Axis {}: reference move failed", axis),
            MotionError::InvalidAxis(axis) => write!(f, "Invalid axis {}", axis),
            MotionError::PinError => write!(f, "GPIO pin operation failed"),
        }
    }
}

impl fmt::Display for FatalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FatalError::UnexpectedReference { reference } => {
                write!(f, "Reference {} triggered during move", reference)
            }
            FatalError::EmergencyStop => write!(f, "Emergency stop"),
        }
    }
}

// Conversion impls
impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<MotionError> for Error {
    fn from(e: MotionError) -> Self {
        Error::Motion(e)
    }
}

impl From<FatalError> for Error {
    fn from(e: FatalError) -> Self {
        Error::Fatal(e)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

#[cfg(feature = "std")]
impl std::error::Error for MotionError {}

#[cfg(feature = "std")]
impl std::error::Error for FatalError {}
