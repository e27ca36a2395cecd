use four_cc::FourCC;

use crate::{
    parameter::{FloatParameter, IntegerParameter},
    Error,
};

// -------------------------------------------------------------------------------------------------

/// How grain playback rates get picked.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    strum::EnumString,
    strum::Display,
    strum::VariantNames,
)]
#[strum(ascii_case_insensitive)]
pub enum GrainPitchMode {
    /// Uniform random semitone offsets within the pitch spread.
    Random,
    /// Consonant intervals from a fixed table. Larger spreads unlock wider intervals.
    #[default]
    Harmonic,
}

// -------------------------------------------------------------------------------------------------

/// Parameters controlling the granular engine.
///
/// Values are clamped via [`clamped`](Self::clamped) before they reach the audio thread, so
/// out of range values never end up in the DSP loop. Use [`validate`](Self::validate) to
/// report invalid values to users instead.
#[derive(Clone, Debug, PartialEq)]
pub struct GranularParameters {
    /// Grain spawn density (0.0 = 2 grains/s, 1.0 = 20 grains/s).
    pub density: f32,
    /// Shortest grain length in milliseconds.
    pub grain_size_min_ms: f32,
    /// Longest grain length in milliseconds (>= min).
    pub grain_size_max_ms: f32,
    /// Max number of simultaneously playing grains (0..=128).
    pub max_grains: usize,
    /// Probability that a due grain actually spawns (0.0 - 1.0).
    pub probability: f32,
    /// Max random distance behind the write head in milliseconds.
    pub spray_ms: f32,
    /// Max random +/- jitter of the start position in milliseconds.
    pub jitter_ms: f32,
    /// Amount of wet output that is fed back into the circulating buffer (0.0 - 0.95).
    pub feedback: f32,
    /// Pitch selection mode.
    pub pitch_mode: GrainPitchMode,
    /// Pitch spread in semitones.
    pub pitch_spread: f32,
    /// Random stereo spread of grains (0.0 = center, 1.0 = full left/right).
    pub stereo_spread: f32,
    /// Wet high-pass cutoff in Hz.
    pub highpass_hz: f32,
    /// Wet low-pass cutoff in Hz.
    pub lowpass_hz: f32,
}

impl GranularParameters {
    pub const DENSITY: FloatParameter =
        FloatParameter::new(FourCC(*b"gden"), "Density", 0.0..=1.0, 0.5);
    pub const GRAIN_SIZE_MIN: FloatParameter =
        FloatParameter::new(FourCC(*b"gsmn"), "Grain Size Min", 1.0..=2000.0, 60.0)
            .with_unit("ms");
    pub const GRAIN_SIZE_MAX: FloatParameter =
        FloatParameter::new(FourCC(*b"gsmx"), "Grain Size Max", 1.0..=2000.0, 250.0)
            .with_unit("ms");
    pub const MAX_GRAINS: IntegerParameter =
        IntegerParameter::new(FourCC(*b"gmax"), "Max Grains", 0..=128, 32);
    pub const PROBABILITY: FloatParameter =
        FloatParameter::new(FourCC(*b"gprb"), "Probability", 0.0..=1.0, 0.8);
    pub const SPRAY: FloatParameter =
        FloatParameter::new(FourCC(*b"gspr"), "Spray", 0.0..=2000.0, 500.0).with_unit("ms");
    pub const JITTER: FloatParameter =
        FloatParameter::new(FourCC(*b"gjit"), "Jitter", 0.0..=100.0, 10.0).with_unit("ms");
    pub const FEEDBACK: FloatParameter =
        FloatParameter::new(FourCC(*b"gfdb"), "Feedback", 0.0..=0.95, 0.5);
    pub const PITCH_SPREAD: FloatParameter =
        FloatParameter::new(FourCC(*b"gpit"), "Pitch Spread", 0.0..=48.0, 12.0).with_unit("st");
    pub const STEREO_SPREAD: FloatParameter =
        FloatParameter::new(FourCC(*b"gpan"), "Stereo Spread", 0.0..=1.0, 0.7);
    pub const HIGHPASS: FloatParameter =
        FloatParameter::new(FourCC(*b"ghpf"), "Highpass", 20.0..=20000.0, 80.0).with_unit("Hz");
    pub const LOWPASS: FloatParameter =
        FloatParameter::new(FourCC(*b"glpf"), "Lowpass", 20.0..=20000.0, 8000.0).with_unit("Hz");

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_density(mut self, density: f32) -> Self {
        self.density = density;
        self
    }

    pub fn with_grain_size(mut self, min_ms: f32, max_ms: f32) -> Self {
        self.grain_size_min_ms = min_ms;
        self.grain_size_max_ms = max_ms;
        self
    }

    pub fn with_max_grains(mut self, max_grains: usize) -> Self {
        self.max_grains = max_grains;
        self
    }

    pub fn with_spray(mut self, spray_ms: f32) -> Self {
        self.spray_ms = spray_ms;
        self
    }

    pub fn with_feedback(mut self, feedback: f32) -> Self {
        self.feedback = feedback;
        self
    }

    pub fn with_pitch_mode(mut self, pitch_mode: GrainPitchMode, spread: f32) -> Self {
        self.pitch_mode = pitch_mode;
        self.pitch_spread = spread;
        self
    }

    /// Grains per second for the current density.
    pub fn grains_per_second(&self) -> f32 {
        2.0 + Self::DENSITY.clamp_value(self.density) * 18.0
    }

    /// Validate all parameters.
    pub fn validate(&self) -> Result<(), Error> {
        Self::DENSITY.validate(self.density)?;
        Self::GRAIN_SIZE_MIN.validate(self.grain_size_min_ms)?;
        Self::GRAIN_SIZE_MAX.validate(self.grain_size_max_ms)?;
        if self.grain_size_max_ms < self.grain_size_min_ms {
            return Err(Error::ParameterError(
                "Grain size max must be >= grain size min".to_string(),
            ));
        }
        Self::MAX_GRAINS.validate(self.max_grains.min(i32::MAX as usize) as i32)?;
        Self::PROBABILITY.validate(self.probability)?;
        Self::SPRAY.validate(self.spray_ms)?;
        Self::JITTER.validate(self.jitter_ms)?;
        Self::FEEDBACK.validate(self.feedback)?;
        Self::PITCH_SPREAD.validate(self.pitch_spread)?;
        Self::STEREO_SPREAD.validate(self.stereo_spread)?;
        Self::HIGHPASS.validate(self.highpass_hz)?;
        Self::LOWPASS.validate(self.lowpass_hz)?;
        Ok(())
    }

    /// Copy of the parameters with all values clamped into their valid ranges.
    /// A max grain size below the min size is raised to the min size.
    pub fn clamped(&self) -> Self {
        let grain_size_min_ms = Self::GRAIN_SIZE_MIN.clamp_value(self.grain_size_min_ms);
        let grain_size_max_ms = Self::GRAIN_SIZE_MAX
            .clamp_value(self.grain_size_max_ms)
            .max(grain_size_min_ms);
        Self {
            density: Self::DENSITY.clamp_value(self.density),
            grain_size_min_ms,
            grain_size_max_ms,
            max_grains: self
                .max_grains
                .min(*Self::MAX_GRAINS.range().end() as usize),
            probability: Self::PROBABILITY.clamp_value(self.probability),
            spray_ms: Self::SPRAY.clamp_value(self.spray_ms),
            jitter_ms: Self::JITTER.clamp_value(self.jitter_ms),
            feedback: Self::FEEDBACK.clamp_value(self.feedback),
            pitch_mode: self.pitch_mode,
            pitch_spread: Self::PITCH_SPREAD.clamp_value(self.pitch_spread),
            stereo_spread: Self::STEREO_SPREAD.clamp_value(self.stereo_spread),
            highpass_hz: Self::HIGHPASS.clamp_value(self.highpass_hz),
            lowpass_hz: Self::LOWPASS.clamp_value(self.lowpass_hz),
        }
    }

    /// Values which contribute to the seed's parameter hash.
    pub fn hash_values(&self) -> [f32; 6] {
        [
            self.density,
            self.probability,
            self.feedback,
            self.pitch_spread,
            self.stereo_spread,
            self.pitch_mode as u8 as f32,
        ]
    }
}

impl Default for GranularParameters {
    fn default() -> Self {
        Self {
            density: Self::DENSITY.default_value(),
            grain_size_min_ms: Self::GRAIN_SIZE_MIN.default_value(),
            grain_size_max_ms: Self::GRAIN_SIZE_MAX.default_value(),
            max_grains: Self::MAX_GRAINS.default_value() as usize,
            probability: Self::PROBABILITY.default_value(),
            spray_ms: Self::SPRAY.default_value(),
            jitter_ms: Self::JITTER.default_value(),
            feedback: Self::FEEDBACK.default_value(),
            pitch_mode: GrainPitchMode::default(),
            pitch_spread: Self::PITCH_SPREAD.default_value(),
            stereo_spread: Self::STEREO_SPREAD.default_value(),
            highpass_hz: Self::HIGHPASS.default_value(),
            lowpass_hz: Self::LOWPASS.default_value(),
        }
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamping() {
        let parameters = GranularParameters {
            density: 4.0,
            grain_size_min_ms: 300.0,
            grain_size_max_ms: 100.0,
            max_grains: 1000,
            feedback: 2.0,
            lowpass_hz: 5.0,
            pitch_spread: f32::NAN,
            ..Default::default()
        };
        assert!(parameters.validate().is_err());

        let clamped = parameters.clamped();
        assert_eq!(clamped.density, 1.0);
        assert_eq!(clamped.grain_size_min_ms, 300.0);
        assert_eq!(clamped.grain_size_max_ms, 300.0);
        assert_eq!(clamped.max_grains, 128);
        assert_eq!(clamped.feedback, 0.95);
        assert_eq!(clamped.lowpass_hz, 20.0);
        assert_eq!(clamped.pitch_spread, 12.0);
        assert!(clamped.validate().is_ok());
        assert!(GranularParameters::default().validate().is_ok());
    }

    #[test]
    fn density_mapping() {
        let parameters = GranularParameters::new().with_density(0.0);
        assert_eq!(parameters.grains_per_second(), 2.0);
        let parameters = parameters.with_density(1.0);
        assert_eq!(parameters.grains_per_second(), 20.0);

        let parameters = GranularParameters::new()
            .with_grain_size(500.0, 20.0)
            .with_max_grains(8)
            .with_pitch_mode(GrainPitchMode::Random, 7.0);
        assert!(parameters.validate().is_err());
        assert_eq!(parameters.clamped().grain_size_max_ms, 500.0);
        assert_eq!(parameters.clamped().max_grains, 8);
    }

    #[test]
    fn pitch_mode_from_string() {
        assert_eq!("harmonic".parse(), Ok(GrainPitchMode::Harmonic));
        assert_eq!("Random".parse(), Ok(GrainPitchMode::Random));
    }
}
