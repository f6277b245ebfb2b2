//! Configuration loading from files (std only).

use std::fs;
use std::path::Path;

use crate::error::{ConfigError, Error, Result};

use super::StepperConfig;

/// Load configuration from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
///
/// # Example
///
/// ```rust,ignore
/// use cnc_stepper::load_config;
///
/// let config = load_config("stepper.toml")?;
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<StepperConfig> {
    let content = fs::read_to_string(path.as_ref()).map_err(|e| {
        let msg = heapless::String::try_from(e.to_string().as_str()).unwrap_or_default();
        Error::Config(ConfigError::IoError(msg))
    })?;

    parse_config(&content)
}

/// Parse configuration from a TOML string.
///
/// # Errors
///
/// Returns an error if the TOML is invalid or fails validation.
pub fn parse_config(content: &str) -> Result<StepperConfig> {
    let config: StepperConfig = toml::from_str(content).map_err(|e| {
        let msg = heapless::String::try_from(e.message()).unwrap_or_default();
        Error::Config(ConfigError::ParseError(msg))
    })?;

    super::validation::validate_config(&config)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackgroundMode, ReferenceLevel};

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.default_max_speed, 28_000);
        assert_eq!(config.speed_override, 100);
        assert!(config.wait_finish_move);
        assert!(config.axes.is_empty());
    }

    #[test]
    fn test_parse_axes() {
        let toml = r#"
default_max_speed = 20000
background = "deferred"
backlash_speed = 5000

[[axes]]
name = "X"
max_speed = 25000
limit_max = 40000
backlash = 12
reference_min = "low"

[[axes]]
name = "Y"
acceleration = 160000.0
invert_direction = true
"#;

        let config = parse_config(toml).unwrap();
        assert_eq!(config.background, BackgroundMode::Deferred);
        assert_eq!(config.backlash_speed, Some(5000));
        assert_eq!(config.axes.len(), 2);
        assert_eq!(config.axis_by_name("Y"), Some(1));

        let x = config.axis(0).unwrap();
        assert_eq!(x.max_speed, 25_000);
        assert_eq!(x.backlash, 12);
        assert_eq!(x.reference_min, Some(ReferenceLevel::Low));
        assert_eq!(x.reference_max, None);

        let y = config.axis(1).unwrap();
        assert_eq!(y.acc_speed(), 400);
        assert!(y.invert_direction);
    }

    #[test]
    fn test_parse_invalid_toml() {
        let result = parse_config("default_max_speed = \"fast\"");
        assert!(matches!(result, Err(Error::Config(ConfigError::ParseError(_)))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_config("/nonexistent/stepper.toml");
        assert!(matches!(result, Err(Error::Config(ConfigError::IoError(_)))));
    }
}
