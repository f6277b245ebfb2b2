//! Builder pattern for StepperEngine.

use crate::config::units::{SpeedOverride, StepRate};
use crate::config::{AxisConfig, BackgroundMode, StepperConfig};
use crate::error::{ConfigError, Error, Result};

use super::engine::StepperEngine;
use super::hal::StepperHal;

/// Builder for creating [`StepperEngine`] instances.
///
/// Starts from [`StepperConfig::default`] unless a configuration is given;
/// the individual setters override it.
pub struct StepperEngineBuilder<H: StepperHal> {
    hal: Option<H>,
    config: StepperConfig,
    speed_override: Option<SpeedOverride>,
}

impl<H: StepperHal> Default for StepperEngineBuilder<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: StepperHal> StepperEngineBuilder<H> {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            hal: None,
            config: StepperConfig::default(),
            speed_override: None,
        }
    }

    /// Set the hardware layer.
    pub fn hal(mut self, hal: H) -> Self {
        self.hal = Some(hal);
        self
    }

    /// Start from a complete configuration.
    pub fn config(mut self, config: StepperConfig) -> Self {
        self.config = config;
        self
    }

    /// Append an axis configuration. Axes beyond the sixth are ignored.
    pub fn axis(mut self, axis: AxisConfig) -> Self {
        let _ = self.config.axes.push(axis);
        self
    }

    /// Set the speed of moves queued without an explicit speed.
    pub fn default_max_speed(mut self, speed: StepRate) -> Self {
        self.config.default_max_speed = speed;
        self
    }

    /// Set where the step-buffer refill runs.
    pub fn background(mut self, mode: BackgroundMode) -> Self {
        self.config.background = mode;
        self
    }

    /// Make queue calls wait until the queued move has finished.
    pub fn wait_finish_move(mut self, wait: bool) -> Self {
        self.config.wait_finish_move = wait;
        self
    }

    /// Set the backlash speed; `None` disables compensation.
    pub fn backlash_speed(mut self, speed: Option<StepRate>) -> Self {
        self.config.backlash_speed = speed;
        self
    }

    /// Set the raw speed override factor (128 = 100 %).
    pub fn speed_override(mut self, speed: SpeedOverride) -> Self {
        self.speed_override = Some(speed);
        self
    }

    /// Build the engine.
    ///
    /// # Errors
    ///
    /// Returns an error if no HAL was given or the configuration is invalid.
    pub fn build(self) -> Result<StepperEngine<H>> {
        let hal = self
            .hal
            .ok_or_else(|| Error::Config(ConfigError::MissingField("hal")))?;

        let mut engine = StepperEngine::new(hal, &self.config)?;
        if let Some(speed) = self.speed_override {
            engine.set_speed_override(speed);
        }
        Ok(engine)
    }
}
