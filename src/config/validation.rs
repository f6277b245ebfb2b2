//! Configuration validation.

use crate::error::{ConfigError, Error, Result};

use super::{AxisConfig, StepperConfig};

/// Validate an engine configuration.
///
/// Checks:
/// - Speeds are positive
/// - Jerk speed does not exceed the axis' max speed
/// - Soft limits are valid (min <= max)
/// - Speed override is in range
pub fn validate_config(config: &StepperConfig) -> Result<()> {
    if config.default_max_speed == 0 {
        return Err(Error::Config(ConfigError::ZeroSpeed { axis: 0 }));
    }

    if !(1..=199).contains(&config.speed_override) {
        return Err(Error::Config(ConfigError::InvalidSpeedOverride(config.speed_override)));
    }

    for (axis, axis_config) in config.axes.iter().enumerate() {
        validate_axis(axis, axis_config)?;
    }

    Ok(())
}

fn validate_axis(axis: usize, config: &AxisConfig) -> Result<()> {
    if config.max_speed == 0 || config.acc_speed() == 0 || config.dec_speed() == 0 {
        return Err(Error::Config(ConfigError::ZeroSpeed { axis }));
    }

    if config.jerk > config.max_speed {
        return Err(Error::Config(ConfigError::InvalidJerk { axis, jerk: config.jerk }));
    }

    if !config.soft_limits().is_valid() {
        return Err(Error::Config(ConfigError::InvalidSoftLimits {
            min: config.limit_min,
            max: config.limit_max,
        }));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_axis(axis: AxisConfig) -> StepperConfig {
        let mut config = StepperConfig::default();
        config.axes.push(axis).ok();
        config
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&StepperConfig::default()).is_ok());
        assert!(validate_config(&with_axis(AxisConfig::default())).is_ok());
    }

    #[test]
    fn test_zero_speed_rejected() {
        let config = with_axis(AxisConfig {
            max_speed: 0,
            ..Default::default()
        });
        assert!(matches!(
            validate_config(&config),
            Err(Error::Config(ConfigError::ZeroSpeed { axis: 0 }))
        ));
    }

    #[test]
    fn test_negative_acceleration_rejected() {
        let config = with_axis(AxisConfig {
            acceleration: Some(-5.0),
            ..Default::default()
        });
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_jerk_above_max_speed_rejected() {
        let config = with_axis(AxisConfig {
            max_speed: 500,
            jerk: 1000,
            ..Default::default()
        });
        assert!(matches!(
            validate_config(&config),
            Err(Error::Config(ConfigError::InvalidJerk { axis: 0, jerk: 1000 }))
        ));
    }

    #[test]
    fn test_inverted_limits_rejected() {
        let config = with_axis(AxisConfig {
            limit_min: 10,
            limit_max: -10,
            ..Default::default()
        });
        assert!(matches!(
            validate_config(&config),
            Err(Error::Config(ConfigError::InvalidSoftLimits { min: 10, max: -10 }))
        ));
    }

    #[test]
    fn test_speed_override_range() {
        let config = StepperConfig {
            speed_override: 0,
            ..Default::default()
        };
        assert!(matches!(
            validate_config(&config),
            Err(Error::Config(ConfigError::InvalidSpeedOverride(0)))
        ));
    }
}
