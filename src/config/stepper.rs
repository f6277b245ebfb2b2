//! Engine configuration - root configuration structure.

use heapless::Vec;
use serde::Deserialize;

use super::axis::AxisConfig;
use super::units::{StepRate, NUM_AXIS};

/// Where the step-buffer refill runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(rename_all = "snake_case")]
pub enum BackgroundMode {
    /// Refill right after the pulse output, inside the timer interrupt.
    #[default]
    Inline,
    /// Ask the HAL to run the refill later, at lower priority.
    Deferred,
}

/// Root configuration structure from TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StepperConfig {
    /// Speed of moves queued without an explicit speed.
    pub default_max_speed: StepRate,

    /// Speed override in percent.
    pub speed_override: u8,

    /// Enable level of idle axes (0 = off, 255 = full).
    pub idle_level: u8,

    /// Seconds of idle after which all axes drop to `idle_level` (0 = never).
    pub enable_timeout: u16,

    /// Queue calls wait until the queued move has finished.
    pub wait_finish_move: bool,

    /// Treat a reference switch hit during a move as fatal.
    pub check_reference: bool,

    /// Reject moves outside the soft limits.
    pub limit_check: bool,

    /// Speed of backlash catch-up moves; `None` disables compensation.
    pub backlash_speed: Option<StepRate>,

    /// Where the step-buffer refill runs.
    pub background: BackgroundMode,

    /// Axis configurations, axis 0 first.
    pub axes: Vec<AxisConfig, NUM_AXIS>,
}

impl Default for StepperConfig {
    fn default() -> Self {
        Self {
            default_max_speed: 28_000,
            speed_override: 100,
            idle_level: 0,
            enable_timeout: 0,
            wait_finish_move: true,
            check_reference: true,
            limit_check: true,
            backlash_speed: None,
            background: BackgroundMode::Inline,
            axes: Vec::new(),
        }
    }
}

impl StepperConfig {
    /// Configuration of `axis`, if present.
    pub fn axis(&self, axis: usize) -> Option<&AxisConfig> {
        self.axes.get(axis)
    }

    /// Find an axis by name.
    pub fn axis_by_name(&self, name: &str) -> Option<usize> {
        self.axes.iter().position(|a| a.name.as_str() == name)
    }
}
