//! Configuration module for cnc-stepper.
//!
//! Provides types for loading and validating the engine and axis
//! configuration from TOML files (with `std` feature) or pre-parsed data.

mod axis;
mod limits;
mod stepper;
pub mod units;
#[cfg(feature = "std")]
mod loader;
mod validation;

pub use axis::{AxisConfig, ReferenceLevel};
pub use limits::{SoftLimits, DEFAULT_LIMIT_MAX};
pub use stepper::{BackgroundMode, StepperConfig};
pub use validation::validate_config;

#[cfg(feature = "std")]
pub use loader::{load_config, parse_config};

// Re-export unit types at config level
pub use units::{AxisMask, MDist, SDist, SpeedOverride, StepRate, Timer};
