//! DC removal filter.

// -------------------------------------------------------------------------------------------------

/// Cutoff presets of the [`DcFilter`].
#[derive(
    Debug, Default, Copy, Clone, PartialEq, strum::Display, strum::EnumString, strum::VariantNames,
)]
pub enum DcFilterMode {
    /// ~1Hz: leaves long reverb tails untouched.
    Slow,
    /// ~5Hz.
    #[default]
    Default,
    /// ~20Hz: may thin out sub bass.
    Fast,
}

impl DcFilterMode {
    fn cutoff_hz(&self) -> f64 {
        match self {
            DcFilterMode::Slow => 1.0,
            DcFilterMode::Default => 5.0,
            DcFilterMode::Fast => 20.0,
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Leaky differentiator DC blocker: `y[n] = x[n] - x[n-1] + pole * y[n-1]`.
///
/// State is kept in `f64`, so very slow poles stay accurate in long feedback loops.
#[derive(Debug, Clone)]
pub struct DcFilter {
    pole: f64,
    last_input: f64,
    last_output: f64,
}

impl DcFilter {
    /// Create a new DC filter for the given sample rate and cutoff preset.
    /// An invalid sample rate falls back to a pole of 0.999.
    pub fn with_mode(sample_rate: u32, mode: DcFilterMode) -> Self {
        let pole = if sample_rate > 0 {
            (1.0 - std::f64::consts::TAU * mode.cutoff_hz() / sample_rate as f64).clamp(0.0, 1.0)
        } else {
            0.999
        };
        Self {
            pole,
            last_input: 0.0,
            last_output: 0.0,
        }
    }

    pub fn reset(&mut self) {
        self.last_input = 0.0;
        self.last_output = 0.0;
    }

    #[inline]
    pub fn process_sample(&mut self, sample: f32) -> f32 {
        let input = sample as f64;
        self.last_output = input - self.last_input + self.pole * self.last_output;
        self.last_input = input;
        self.last_output as f32
    }
}

impl Default for DcFilter {
    fn default() -> Self {
        Self::with_mode(44100, DcFilterMode::Default)
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_offset() {
        let mut filter = DcFilter::with_mode(48000, DcFilterMode::Fast);
        let mut output = 1.0;
        for _ in 0..48000 {
            output = filter.process_sample(0.3);
        }
        assert!(output.abs() < 1e-3, "residual dc: {output}");

        filter.reset();
        assert_eq!(filter.process_sample(0.5), 0.5);
        assert_eq!("Slow".parse(), Ok(DcFilterMode::Slow));
    }
}
