//! One-pole low/high-pass filters, used as dampers and tone shapers.

use std::f32::consts::TAU;

// -------------------------------------------------------------------------------------------------

/// One-pole low-pass filter: `y(n) = y(n-1) + a * (x(n) - y(n-1))`.
#[derive(Debug, Default, Clone)]
pub struct OnePoleLowpass {
    coefficient: f32,
    state: f32,
}

impl OnePoleLowpass {
    pub fn new(sample_rate: u32, cutoff: f32) -> Self {
        let mut filter = Self::default();
        filter.set_cutoff(sample_rate, cutoff);
        filter
    }

    pub fn set_cutoff(&mut self, sample_rate: u32, cutoff: f32) {
        self.coefficient = cutoff_coefficient(sample_rate, cutoff);
    }

    pub fn reset(&mut self) {
        self.state = 0.0;
    }

    #[inline]
    pub fn process_sample(&mut self, input: f32) -> f32 {
        self.state += self.coefficient * (input - self.state);
        self.state
    }
}

// -------------------------------------------------------------------------------------------------

/// One-pole high-pass filter, derived from the low-pass: `x(n) - lowpass(x(n))`.
#[derive(Debug, Default, Clone)]
pub struct OnePoleHighpass {
    lowpass: OnePoleLowpass,
}

impl OnePoleHighpass {
    pub fn new(sample_rate: u32, cutoff: f32) -> Self {
        Self {
            lowpass: OnePoleLowpass::new(sample_rate, cutoff),
        }
    }

    pub fn set_cutoff(&mut self, sample_rate: u32, cutoff: f32) {
        self.lowpass.set_cutoff(sample_rate, cutoff);
    }

    pub fn reset(&mut self) {
        self.lowpass.reset();
    }

    #[inline]
    pub fn process_sample(&mut self, input: f32) -> f32 {
        input - self.lowpass.process_sample(input)
    }
}

// -------------------------------------------------------------------------------------------------

/// Smoothing coefficient for a one-pole filter with the given cutoff in Hz.
pub fn cutoff_coefficient(sample_rate: u32, cutoff: f32) -> f32 {
    if sample_rate == 0 {
        return 1.0;
    }
    let nyquist = sample_rate as f32 * 0.5;
    let cutoff = cutoff.clamp(1.0, nyquist);
    1.0 - (-TAU * cutoff / sample_rate as f32).exp()
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowpass_settles_on_dc() {
        let mut filter = OnePoleLowpass::new(48000, 1000.0);
        let mut output = 0.0;
        for _ in 0..48000 {
            output = filter.process_sample(1.0);
        }
        assert!((output - 1.0).abs() < 1e-4);
    }

    #[test]
    fn highpass_removes_dc() {
        let mut filter = OnePoleHighpass::new(48000, 20.0);
        let mut output = 1.0;
        for _ in 0..48000 {
            output = filter.process_sample(0.5);
        }
        assert!(output.abs() < 1e-3);
    }

    #[test]
    fn coefficient_bounds() {
        assert_eq!(cutoff_coefficient(0, 1000.0), 1.0);
        let c = cutoff_coefficient(44100, 1e9);
        assert!(c > 0.0 && c <= 1.0);
        let c = cutoff_coefficient(44100, -5.0);
        assert!(c > 0.0 && c < 0.01);
    }
}
