//! Soft limit types.

use super::units::{MDist, SDist};

/// Largest position the default limits allow.
pub const DEFAULT_LIMIT_MAX: SDist = 0x00ff_ffff;

/// Soft limits of one axis, in steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SoftLimits {
    /// Minimum allowed position.
    pub min: SDist,
    /// Maximum allowed position.
    pub max: SDist,
}

impl Default for SoftLimits {
    fn default() -> Self {
        Self {
            min: 0,
            max: DEFAULT_LIMIT_MAX,
        }
    }
}

impl SoftLimits {
    /// Create new soft limits.
    pub const fn new(min: SDist, max: SDist) -> Self {
        Self { min, max }
    }

    /// Check if limits are valid (min <= max).
    pub fn is_valid(&self) -> bool {
        self.min <= self.max
    }

    /// Check if a position is within limits.
    pub fn contains(&self, position: SDist) -> bool {
        position >= self.min && position <= self.max
    }

    /// Limit the rejected `position` exceeded, or `None` if it is inside.
    pub fn violated_by(&self, position: SDist) -> Option<SDist> {
        if position < self.min {
            Some(self.min)
        } else if position > self.max {
            Some(self.max)
        } else {
            None
        }
    }

    /// Travel between both limits.
    pub fn size(&self) -> MDist {
        self.max.abs_diff(self.min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_soft_limits_contains() {
        let limits = SoftLimits::new(-100, 100);

        assert!(limits.contains(0));
        assert!(limits.contains(100));
        assert!(limits.contains(-100));
        assert!(!limits.contains(101));
        assert_eq!(limits.violated_by(101), Some(100));
        assert_eq!(limits.violated_by(-101), Some(-100));
        assert_eq!(limits.violated_by(5), None);
    }

    #[test]
    fn test_default_limits() {
        let limits = SoftLimits::default();
        assert!(limits.is_valid());
        assert_eq!(limits.size(), 0x00ff_ffff);
        assert!(!SoftLimits::new(10, -10).is_valid());
    }
}
