//! Per-axis configuration from TOML.

use heapless::String;
use serde::Deserialize;

use super::limits::{SoftLimits, DEFAULT_LIMIT_MAX};
use super::units::{start_speed_from_acceleration, MDist, SDist, StepRate};

/// Input level that means "switch hit".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(rename_all = "snake_case")]
pub enum ReferenceLevel {
    /// Hit when the input reads high.
    High,
    /// Hit when the input reads low.
    Low,
}

impl ReferenceLevel {
    /// Whether `level` read from the input means the switch is hit.
    #[inline]
    pub fn is_hit(self, level: bool) -> bool {
        level == (self == ReferenceLevel::High)
    }
}

/// Configuration of one axis.
///
/// Speeds are in steps per second. `acc` and `dec` are the start and stop
/// speed `v0` of a ramp; the acceleration is `v0²`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AxisConfig {
    /// Human-readable name (max 16 chars).
    pub name: String<16>,

    /// Fastest speed of the axis.
    pub max_speed: StepRate,

    /// Start speed of the acceleration ramp.
    pub acc: StepRate,

    /// Stop speed of the deceleration ramp.
    pub dec: StepRate,

    /// Acceleration in steps/s², overrides `acc` if set.
    pub acceleration: Option<f32>,

    /// Deceleration in steps/s², overrides `dec` if set.
    pub deceleration: Option<f32>,

    /// Largest speed step allowed at a junction without a ramp.
    pub jerk: StepRate,

    /// Lowest allowed position.
    pub limit_min: SDist,

    /// Highest allowed position.
    pub limit_max: SDist,

    /// Mechanical play caught up on every direction change, in steps.
    pub backlash: MDist,

    /// Invert the direction output.
    pub invert_direction: bool,

    /// Seconds without a step after which the enable drops to the idle level (0 = never).
    pub enable_timeout: u8,

    /// Level of the min reference switch, `None` if there is none.
    pub reference_min: Option<ReferenceLevel>,

    /// Level of the max reference switch, `None` if there is none.
    pub reference_max: Option<ReferenceLevel>,
}

impl Default for AxisConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            max_speed: 28_000,
            acc: 350,
            dec: 380,
            acceleration: None,
            deceleration: None,
            jerk: 1000,
            limit_min: 0,
            limit_max: DEFAULT_LIMIT_MAX,
            backlash: 0,
            invert_direction: false,
            enable_timeout: 0,
            reference_min: None,
            reference_max: None,
        }
    }
}

impl AxisConfig {
    /// Effective acceleration start speed.
    pub fn acc_speed(&self) -> StepRate {
        self.acceleration.map_or(self.acc, start_speed_from_acceleration)
    }

    /// Effective deceleration stop speed.
    pub fn dec_speed(&self) -> StepRate {
        self.deceleration.map_or(self.dec, start_speed_from_acceleration)
    }

    /// Soft limits of the axis.
    pub fn soft_limits(&self) -> SoftLimits {
        SoftLimits::new(self.limit_min, self.limit_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acceleration_overrides_acc() {
        let config = AxisConfig {
            acceleration: Some(160_000.0),
            ..Default::default()
        };
        assert_eq!(config.acc_speed(), 400);
        assert_eq!(config.dec_speed(), 380);
    }

    #[test]
    fn test_reference_level() {
        assert!(ReferenceLevel::High.is_hit(true));
        assert!(!ReferenceLevel::High.is_hit(false));
        assert!(ReferenceLevel::Low.is_hit(false));
    }
}
