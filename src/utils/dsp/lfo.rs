//! Low frequency modulation sources.

// -------------------------------------------------------------------------------------------------

/// Shape of an [`Lfo`] cycle.
#[derive(
    Debug, Default, Copy, Clone, PartialEq, strum::Display, strum::EnumString, strum::VariantNames,
)]
pub enum LfoWaveform {
    Sine,
    #[default]
    Triangle,
}

// -------------------------------------------------------------------------------------------------

/// Naive, bipolar (`-1.0..=1.0`) oscillator for delay line modulation.
#[derive(Debug, Default, Clone)]
pub struct Lfo {
    phase: f64,
    phase_inc: f64,
    waveform: LfoWaveform,
}

impl Lfo {
    pub fn new(sample_rate: u32, rate: f64, waveform: LfoWaveform) -> Self {
        let mut lfo = Self {
            phase: 0.0,
            phase_inc: 0.0,
            waveform,
        };
        lfo.set_rate(sample_rate, rate);
        lfo
    }

    /// Rate in Hz. Rates at or above the sample rate wrap around.
    pub fn set_rate(&mut self, sample_rate: u32, rate: f64) {
        self.phase_inc = if sample_rate > 0 {
            (rate / sample_rate as f64).abs().fract()
        } else {
            0.0
        };
    }

    /// Set or reset the LFO's phase, normalized to `0.0..1.0`.
    pub fn set_phase(&mut self, phase: f64) {
        self.phase = phase.rem_euclid(1.0);
    }

    /// Builder variant of [`Self::set_phase`].
    pub fn with_phase(mut self, phase: f64) -> Self {
        self.set_phase(phase);
        self
    }

    /// Current value, then step one frame ahead.
    #[inline]
    pub fn next(&mut self) -> f64 {
        let value = match self.waveform {
            LfoWaveform::Sine => (self.phase * std::f64::consts::TAU).sin(),
            LfoWaveform::Triangle => {
                if self.phase < 0.5 {
                    4.0 * self.phase - 1.0
                } else {
                    -4.0 * self.phase + 3.0
                }
            }
        };
        self.phase += self.phase_inc;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        value
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triangle_range_and_period() {
        let mut lfo = Lfo::new(1000, 10.0, LfoWaveform::Triangle);
        let values = (0..100).map(|_| lfo.next()).collect::<Vec<_>>();
        assert!(values.iter().all(|v| (-1.0..=1.0).contains(v)));
        assert!((values[0] + 1.0).abs() < 1e-9);
        assert!((values[50] - 1.0).abs() < 1e-9);
        assert!(values[25].abs() < 1e-9);
        assert!((values[99] + 0.96).abs() < 1e-9);
    }

    #[test]
    fn phase_offsets() {
        let mut lfo = Lfo::new(48000, 0.5, LfoWaveform::Sine).with_phase(1.25);
        assert!((lfo.next() - 1.0).abs() < 1e-9);
    }
}
