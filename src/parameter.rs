//! Parameter descriptors, used to validate and clamp externally supplied configuration.

use std::ops::RangeInclusive;

use four_cc::FourCC;

use crate::Error;

// -------------------------------------------------------------------------------------------------

/// A continuous (float) parameter descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatParameter {
    id: FourCC,
    name: &'static str,
    range: RangeInclusive<f32>,
    default: f32,
    unit: &'static str,
}

impl FloatParameter {
    /// Create a new float parameter descriptor.
    pub const fn new(
        id: FourCC,
        name: &'static str,
        range: RangeInclusive<f32>,
        default: f32,
    ) -> Self {
        assert!(
            default >= *range.start() && default <= *range.end(),
            "Invalid parameter default value"
        );
        Self {
            id,
            name,
            range,
            default,
            unit: "",
        }
    }

    /// Optional unit for string displays.
    pub const fn with_unit(mut self, unit: &'static str) -> Self {
        self.unit = unit;
        self
    }

    pub fn id(&self) -> FourCC {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn unit(&self) -> &'static str {
        self.unit
    }

    /// The parameter's value range.
    pub fn range(&self) -> &RangeInclusive<f32> {
        &self.range
    }

    /// The parameter's default value.
    pub fn default_value(&self) -> f32 {
        self.default
    }

    /// Clamp the given plain value to the parameter's range. NaN gives the default value.
    pub fn clamp_value(&self, value: f32) -> f32 {
        if value.is_nan() {
            self.default
        } else {
            value.clamp(*self.range.start(), *self.range.end())
        }
    }

    /// Normalize the given plain value to a 0.0-1.0 range.
    pub fn normalize_value(&self, value: f32) -> f32 {
        let span = *self.range.end() - *self.range.start();
        if span <= 0.0 {
            return 0.0;
        }
        (self.clamp_value(value) - *self.range.start()) / span
    }

    /// Check if the given value is within the parameter's range.
    pub fn validate(&self, value: f32) -> Result<(), Error> {
        if value.is_nan() || !self.range.contains(&value) {
            return Err(Error::ParameterError(format!(
                "'{}' must be in range {}..={}{}, but is {}",
                self.name,
                self.range.start(),
                self.range.end(),
                self.unit,
                value
            )));
        }
        Ok(())
    }
}

// -------------------------------------------------------------------------------------------------

/// A discrete (integer) parameter descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegerParameter {
    id: FourCC,
    name: &'static str,
    range: RangeInclusive<i32>,
    default: i32,
}

impl IntegerParameter {
    pub const fn new(
        id: FourCC,
        name: &'static str,
        range: RangeInclusive<i32>,
        default: i32,
    ) -> Self {
        assert!(
            default >= *range.start() && default <= *range.end(),
            "Invalid parameter default value"
        );
        Self {
            id,
            name,
            range,
            default,
        }
    }

    pub fn id(&self) -> FourCC {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn range(&self) -> &RangeInclusive<i32> {
        &self.range
    }

    pub fn default_value(&self) -> i32 {
        self.default
    }

    pub fn clamp_value(&self, value: i32) -> i32 {
        value.clamp(*self.range.start(), *self.range.end())
    }

    pub fn validate(&self, value: i32) -> Result<(), Error> {
        if !self.range.contains(&value) {
            return Err(Error::ParameterError(format!(
                "'{}' must be in range {}..={}, but is {}",
                self.name,
                self.range.start(),
                self.range.end(),
                value
            )));
        }
        Ok(())
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const GAIN: FloatParameter =
        FloatParameter::new(FourCC(*b"gain"), "Gain", 0.0..=2.0, 1.0).with_unit("x");
    const STEPS: IntegerParameter = IntegerParameter::new(FourCC(*b"stps"), "Steps", 1..=64, 16);

    #[test]
    fn clamping_and_validation() {
        assert_eq!(GAIN.clamp_value(3.0), 2.0);
        assert_eq!(GAIN.clamp_value(-1.0), 0.0);
        assert_eq!(GAIN.clamp_value(f32::NAN), 1.0);
        assert_eq!(GAIN.normalize_value(1.0), 0.5);
        assert!(GAIN.validate(1.5).is_ok());
        assert!(matches!(GAIN.validate(2.5), Err(Error::ParameterError(_))));
        assert!(GAIN.validate(f32::NAN).is_err());

        assert_eq!(STEPS.clamp_value(0), 1);
        assert_eq!(STEPS.clamp_value(100), 64);
        assert!(STEPS.validate(65).is_err());
        assert_eq!(STEPS.id(), FourCC(*b"stps"));
    }
}
