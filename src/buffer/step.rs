//! Step-buffer entries: one physical output event each.

use crate::config::units::{Timer, NUM_AXIS};

const FIELD_BITS: u32 = 5;
const COUNT_MASK: u32 = 0x0f;
const DIRECTION_BIT: u32 = 0x10;
const NO_COUNT_BIT: u32 = 1 << 31;

/// Packed per-axis pulse count and direction of one scheduling tick.
///
/// Each axis owns a 5-bit field: a 4-bit pulse count and a direction bit.
/// Bit 31 marks entries that must not move the tracked machine position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DirCount(u32);

impl DirCount {
    /// Largest pulse count one axis field holds.
    pub const MAX_COUNT: u8 = COUNT_MASK as u8;

    /// Descriptor with no pulses and all directions down.
    pub const EMPTY: Self = Self(0);

    /// Raw packed value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    const fn shift(axis: usize) -> u32 {
        axis as u32 * FIELD_BITS
    }

    /// Pulse count of `axis`.
    #[inline]
    pub const fn count(self, axis: usize) -> u8 {
        ((self.0 >> Self::shift(axis)) & COUNT_MASK) as u8
    }

    /// Whether `axis` moves in positive direction.
    #[inline]
    pub const fn direction_up(self, axis: usize) -> bool {
        (self.0 >> Self::shift(axis)) & DIRECTION_BIT != 0
    }

    /// Set the pulse count of `axis`, saturating at [`MAX_COUNT`](Self::MAX_COUNT).
    #[inline]
    pub fn set_count(&mut self, axis: usize, count: u8) {
        let shift = Self::shift(axis);
        let count = u32::from(count).min(COUNT_MASK);
        self.0 = (self.0 & !(COUNT_MASK << shift)) | (count << shift);
    }

    /// Set the direction of `axis`.
    #[inline]
    pub fn set_direction_up(&mut self, axis: usize, up: bool) {
        let bit = DIRECTION_BIT << Self::shift(axis);
        if up {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
    }

    /// Copy with `axis` set to `count` pulses in direction `up`.
    #[inline]
    pub fn with_axis(mut self, axis: usize, count: u8, up: bool) -> Self {
        self.set_count(axis, count);
        self.set_direction_up(axis, up);
        self
    }

    /// Copy with all pulse counts cleared, directions kept.
    pub fn directions_only(self) -> Self {
        let mut out = self;
        for axis in 0..NUM_AXIS {
            out.set_count(axis, 0);
        }
        out
    }

    /// Largest pulse count over all axes.
    pub fn max_count(self) -> u8 {
        (0..NUM_AXIS).map(|axis| self.count(axis)).max().unwrap_or(0)
    }

    /// Whether the entry is excluded from position tracking.
    #[inline]
    pub const fn is_no_count(self) -> bool {
        self.0 & NO_COUNT_BIT != 0
    }

    /// Exclude the entry from position tracking.
    #[inline]
    pub fn set_no_count(&mut self) {
        self.0 |= NO_COUNT_BIT;
    }

    /// Keep only the fields of axes whose bit is set in `axes`, plus the no-count flag.
    pub fn masked(self, axes: u8) -> Self {
        let mut mask = self.0 & NO_COUNT_BIT;
        for axis in 0..NUM_AXIS {
            if axes & (1 << axis) != 0 {
                mask |= (COUNT_MASK | DIRECTION_BIT) << Self::shift(axis);
            }
        }
        Self(self.0 & mask)
    }

    /// Direction bits of all axes as an axis mask.
    pub fn direction_mask(self) -> u8 {
        (0..NUM_AXIS).fold(0u8, |mask, axis| {
            if self.direction_up(axis) {
                mask | (1 << axis)
            } else {
                mask
            }
        })
    }
}

/// One entry of the step buffer: pulses to emit and the delay until the next entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StepBuffer {
    /// Delay in timer ticks after this entry.
    pub timer: Timer,
    /// Pulses and directions.
    pub dir_count: DirCount,
}

impl StepBuffer {
    /// Build an entry.
    #[inline]
    pub const fn new(timer: Timer, dir_count: DirCount) -> Self {
        Self { timer, dir_count }
    }
}
