//! Linear unit transforms (multiplier / divisor / offset).
//!
//! Thresholds are entered by users in a display unit and stored in the
//! stream's raw internal unit; the conversion happens exactly once, at
//! trigger creation time. Message templating applies the forward transform
//! for display only.

use serde::{Deserialize, Serialize};

/// A linear transform from internal units to display units:
/// `display = raw * multiplier / divisor + offset`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mdo {
    pub multiplier: f64,
    pub divisor: f64,
    pub offset: f64,
}

impl Mdo {
    pub fn new(multiplier: f64, divisor: f64, offset: f64) -> Self {
        Self {
            multiplier,
            divisor,
            offset,
        }
    }

    /// Internal value to display value.
    ///
    /// # Examples
    ///
    /// ```
    /// use streamgate_common::mdo::Mdo;
    ///
    /// let half = Mdo::new(1.0, 2.0, 0.0);
    /// assert_eq!(half.compute(100.0), 50.0);
    /// ```
    pub fn compute(&self, value: f64) -> f64 {
        value * self.multiplier / self.divisor + self.offset
    }

    /// Display value back to internal value. Inverse of [`Mdo::compute`].
    pub fn compute_reverse(&self, value: f64) -> f64 {
        (value - self.offset) * self.divisor / self.multiplier
    }
}

impl Default for Mdo {
    fn default() -> Self {
        Self {
            multiplier: 1.0,
            divisor: 1.0,
            offset: 0.0,
        }
    }
}

/// Display-unit descriptor for a stream or variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputUnit {
    pub unit_short: String,
    pub unit_full: String,
}

/// The optional unit configuration of one stream: how to convert raw
/// values for display, and what to call the result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamUnits {
    pub mdo: Mdo,
    pub unit: OutputUnit,
}
