//! # cnc-stepper
//!
//! Interrupt-driven multi-axis stepper motion core with embedded-hal 1.0 support.
//!
//! ## Features
//!
//! - **Look-ahead planning**: Queued moves are joined at the highest speed
//!   every axis' jerk limit allows
//! - **Integer ramps**: Acceleration and deceleration computed per step in
//!   timer ticks, no floating point in the interrupt
//! - **Bresenham distribution**: Up to six axes stepped in lockstep
//! - **Homing and backlash**: Reference switch search and direction-change
//!   compensation
//! - **no_std compatible**: Core library works without standard library
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cnc_stepper::{SharedStepper, StepperEngine, StepperConfig};
//!
//! static STEPPER: SharedStepper<Board> = SharedStepper::new();
//!
//! let config: StepperConfig = cnc_stepper::load_config("machine.toml")?;
//! STEPPER.install(StepperEngine::new(board, &config)?);
//!
//! // Queue a move on X and Y at 8000 steps/s
//! STEPPER.with_free_slots(2, |e| e.move_rel(&[3200, -1600, 0, 0, 0, 0], 8000));
//! STEPPER.wait_busy();
//! ```
//!
//! The board calls [`SharedStepper::on_step_timer`] from its step timer
//! interrupt and implements [`StepperHal`] for pulses, timer and inputs.
//!
//! ## Feature Flags
//!
//! - `std` (default): Enables file I/O and TOML parsing
//! - `alloc`: Enables heap allocation for no_std with allocator
//! - `defmt`: Enables defmt logging for embedded targets

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]
// Allow large error types - necessary for no_std with heapless strings
#![allow(clippy::result_large_err)]

#[cfg(feature = "alloc")]
extern crate alloc;

// Logging macros, must come first
#[macro_use]
mod fmt;

// Core modules
pub mod buffer;
pub mod config;
pub mod error;
pub mod motion;
pub mod port;
pub mod stepper;

// Re-exports for ergonomic API
pub use config::{validate_config, AxisConfig, BackgroundMode, StepperConfig};
pub use error::{Error, Result};
pub use port::SharedStepper;
pub use stepper::{HomingParams, StepDirPins, StepperEngine, StepperEvent, StepperHal, WaitAction};

// Configuration loading (std only)
#[cfg(feature = "std")]
pub use config::{load_config, parse_config};

// Unit types
pub use config::units::{AxisMask, MDist, SDist, SpeedOverride, StepRate, Timer, NUM_AXIS};
