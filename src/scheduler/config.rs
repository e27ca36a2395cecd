use std::ops::RangeInclusive;

use four_cc::FourCC;

use super::event::VoiceId;
use crate::{
    parameter::{FloatParameter, IntegerParameter},
    seed::SeedBucket,
    Error,
};

// -------------------------------------------------------------------------------------------------

/// Max number of Euclidean lanes in a [`SchedulerConfig`].
pub const MAX_LANES: usize = 8;

const VELOCITY: FloatParameter = FloatParameter::new(FourCC(*b"velo"), "Velocity", 0.0..=1.0, 0.5);
const NOTE: IntegerParameter = IntegerParameter::new(FourCC(*b"note"), "Note", 0..=127, 64);

fn validate_velocity_range(range: &RangeInclusive<f32>) -> Result<(), Error> {
    VELOCITY.validate(*range.start())?;
    VELOCITY.validate(*range.end())?;
    if range.start() > range.end() {
        return Err(Error::ParameterError(format!(
            "Invalid velocity range: {range:?}"
        )));
    }
    Ok(())
}

fn validate_note_range(range: &RangeInclusive<u8>) -> Result<(), Error> {
    NOTE.validate(*range.start() as i32)?;
    NOTE.validate(*range.end() as i32)?;
    if range.start() > range.end() {
        return Err(Error::ParameterError(format!("Invalid note range: {range:?}")));
    }
    Ok(())
}

fn clamp_velocity_range(range: &RangeInclusive<f32>) -> RangeInclusive<f32> {
    let a = VELOCITY.clamp_value(*range.start());
    let b = VELOCITY.clamp_value(*range.end());
    a.min(b)..=a.max(b)
}

fn clamp_note_range(range: &RangeInclusive<u8>) -> RangeInclusive<u8> {
    let a = NOTE.clamp_value(*range.start() as i32) as u8;
    let b = NOTE.clamp_value(*range.end() as i32) as u8;
    a.min(b)..=a.max(b)
}

// -------------------------------------------------------------------------------------------------

/// A Euclidean rhythm lane.
#[derive(Debug, Clone, PartialEq)]
pub struct EuclideanLane {
    pub enabled: bool,
    pub steps: usize,
    pub hits: usize,
    /// Left rotation of the pattern in steps.
    pub rotation: usize,
    /// Probability that a hit actually triggers.
    pub probability: f32,
    pub velocity_range: RangeInclusive<f32>,
    /// Note range. Notes are quantized to the phrase's scale within this range.
    pub note_range: RangeInclusive<u8>,
    pub voice: VoiceId,
}

impl EuclideanLane {
    pub const STEPS: IntegerParameter =
        IntegerParameter::new(FourCC(*b"lstp"), "Steps", 0..=64, 16);
    pub const HITS: IntegerParameter = IntegerParameter::new(FourCC(*b"lhit"), "Hits", 0..=64, 4);
    pub const ROTATION: IntegerParameter =
        IntegerParameter::new(FourCC(*b"lrot"), "Rotation", 0..=64, 0);
    pub const PROBABILITY: FloatParameter =
        FloatParameter::new(FourCC(*b"lprb"), "Probability", 0.0..=1.0, 1.0);

    /// Create a new, enabled lane with the given voice and pattern shape.
    pub fn new(voice: VoiceId, steps: usize, hits: usize) -> Self {
        Self {
            enabled: true,
            steps,
            hits,
            rotation: Self::ROTATION.default_value() as usize,
            probability: Self::PROBABILITY.default_value(),
            velocity_range: 0.4..=0.8,
            note_range: 40..=76,
            voice,
        }
    }

    pub fn with_rotation(mut self, rotation: usize) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_probability(mut self, probability: f32) -> Self {
        self.probability = probability;
        self
    }

    pub fn with_velocity_range(mut self, range: RangeInclusive<f32>) -> Self {
        self.velocity_range = range;
        self
    }

    pub fn with_note_range(mut self, range: RangeInclusive<u8>) -> Self {
        self.note_range = range;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// True when the pattern producing properties of the two lanes differ.
    pub fn shape_differs(&self, other: &Self) -> bool {
        self.steps != other.steps
            || self.hits != other.hits
            || self.rotation != other.rotation
            || self.voice != other.voice
    }

    pub fn validate(&self) -> Result<(), Error> {
        Self::STEPS.validate(self.steps.min(i32::MAX as usize) as i32)?;
        Self::HITS.validate(self.hits.min(i32::MAX as usize) as i32)?;
        Self::ROTATION.validate(self.rotation.min(i32::MAX as usize) as i32)?;
        Self::PROBABILITY.validate(self.probability)?;
        validate_velocity_range(&self.velocity_range)?;
        validate_note_range(&self.note_range)?;
        Ok(())
    }

    pub fn clamped(&self) -> Self {
        let clamp_usize = |parameter: &IntegerParameter, value: usize| {
            parameter.clamp_value(value.min(i32::MAX as usize) as i32) as usize
        };
        Self {
            enabled: self.enabled,
            steps: clamp_usize(&Self::STEPS, self.steps),
            hits: clamp_usize(&Self::HITS, self.hits),
            rotation: clamp_usize(&Self::ROTATION, self.rotation),
            probability: Self::PROBABILITY.clamp_value(self.probability),
            velocity_range: clamp_velocity_range(&self.velocity_range),
            note_range: clamp_note_range(&self.note_range),
            voice: self.voice,
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// The free random melodic voice: a number of notes at random positions in each phrase.
#[derive(Debug, Clone, PartialEq)]
pub struct MelodicLane {
    pub enabled: bool,
    /// Number of notes per phrase.
    pub note_count: usize,
    pub velocity_range: RangeInclusive<f32>,
    pub note_range: RangeInclusive<u8>,
    pub voice: VoiceId,
}

impl MelodicLane {
    pub const NOTE_COUNT: IntegerParameter =
        IntegerParameter::new(FourCC(*b"mnot"), "Note Count", 0..=64, 6);

    pub fn validate(&self) -> Result<(), Error> {
        Self::NOTE_COUNT.validate(self.note_count.min(i32::MAX as usize) as i32)?;
        validate_velocity_range(&self.velocity_range)?;
        validate_note_range(&self.note_range)?;
        Ok(())
    }

    pub fn clamped(&self) -> Self {
        Self {
            enabled: self.enabled,
            note_count: Self::NOTE_COUNT.clamp_value(self.note_count.min(i32::MAX as usize) as i32)
                as usize,
            velocity_range: clamp_velocity_range(&self.velocity_range),
            note_range: clamp_note_range(&self.note_range),
            voice: self.voice,
        }
    }
}

impl Default for MelodicLane {
    fn default() -> Self {
        Self {
            enabled: true,
            note_count: Self::NOTE_COUNT.default_value() as usize,
            velocity_range: 0.3..=0.7,
            note_range: 59..=83,
            voice: VoiceId::Lead,
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Phrase scheduler configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    /// Master enable flag. A disabled scheduler produces empty phrases.
    pub enabled: bool,
    /// Time window of the seed's time component.
    pub seed_bucket: SeedBucket,
    /// Phrase duration in seconds.
    pub phrase_seconds: f32,
    /// Pattern cycles per phrase.
    pub tempo: f32,
    /// Harmonic tension, selects the phrase scales.
    pub tension: f32,
    pub lanes: Vec<EuclideanLane>,
    pub melodic: MelodicLane,
}

impl SchedulerConfig {
    pub const PHRASE_SECONDS: FloatParameter =
        FloatParameter::new(FourCC(*b"phrs"), "Phrase Length", 1.0..=600.0, 16.0).with_unit("s");
    pub const TEMPO: FloatParameter =
        FloatParameter::new(FourCC(*b"tmpo"), "Tempo", 0.01..=64.0, 4.0).with_unit("cycles");
    pub const TENSION: FloatParameter =
        FloatParameter::new(FourCC(*b"tens"), "Tension", 0.0..=1.0, 0.2);

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed_bucket(mut self, seed_bucket: SeedBucket) -> Self {
        self.seed_bucket = seed_bucket;
        self
    }

    pub fn with_phrase_seconds(mut self, phrase_seconds: f32) -> Self {
        self.phrase_seconds = phrase_seconds;
        self
    }

    pub fn with_tempo(mut self, tempo: f32) -> Self {
        self.tempo = tempo;
        self
    }

    pub fn with_tension(mut self, tension: f32) -> Self {
        self.tension = tension;
        self
    }

    pub fn with_lanes(mut self, lanes: Vec<EuclideanLane>) -> Self {
        self.lanes = lanes;
        self
    }

    pub fn with_melodic(mut self, melodic: MelodicLane) -> Self {
        self.melodic = melodic;
        self
    }

    pub fn validate(&self) -> Result<(), Error> {
        Self::PHRASE_SECONDS.validate(self.phrase_seconds)?;
        Self::TEMPO.validate(self.tempo)?;
        Self::TENSION.validate(self.tension)?;
        if self.lanes.len() > MAX_LANES {
            return Err(Error::ParameterError(format!(
                "At most {MAX_LANES} lanes are supported, but got {}",
                self.lanes.len()
            )));
        }
        for lane in &self.lanes {
            lane.validate()?;
        }
        self.melodic.validate()?;
        Ok(())
    }

    /// Copy of the config with all values clamped and excess lanes removed.
    pub fn clamped(&self) -> Self {
        Self {
            enabled: self.enabled,
            seed_bucket: self.seed_bucket,
            phrase_seconds: Self::PHRASE_SECONDS.clamp_value(self.phrase_seconds),
            tempo: Self::TEMPO.clamp_value(self.tempo),
            tension: Self::TENSION.clamp_value(self.tension),
            lanes: self
                .lanes
                .iter()
                .take(MAX_LANES)
                .map(EuclideanLane::clamped)
                .collect(),
            melodic: self.melodic.clamped(),
        }
    }

    /// Values which contribute to the seed's parameter hash.
    pub fn hash_values(&self) -> [f32; 3] {
        [self.phrase_seconds, self.tempo, self.tension]
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            seed_bucket: SeedBucket::default(),
            phrase_seconds: Self::PHRASE_SECONDS.default_value(),
            tempo: Self::TEMPO.default_value(),
            tension: Self::TENSION.default_value(),
            lanes: vec![
                EuclideanLane::new(VoiceId::Pad, 4, 1)
                    .with_probability(0.9)
                    .with_velocity_range(0.3..=0.5)
                    .with_note_range(40..=64),
                EuclideanLane::new(VoiceId::Pluck, 8, 3)
                    .with_rotation(1)
                    .with_probability(0.7)
                    .with_note_range(52..=79),
                EuclideanLane::new(VoiceId::Percussion, 16, 5)
                    .with_probability(0.6)
                    .with_velocity_range(0.2..=0.6)
                    .with_note_range(36..=48),
            ],
            melodic: MelodicLane::default(),
        }
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation() {
        assert!(SchedulerConfig::default().validate().is_ok());

        let config = SchedulerConfig::new().with_tempo(0.0).with_tension(2.0);
        assert!(config.validate().is_err());
        let clamped = config.clamped();
        assert_eq!(clamped.tempo, 0.01);
        assert_eq!(clamped.tension, 1.0);

        let lane = EuclideanLane::new(VoiceId::Pluck, 100, 3)
            .with_velocity_range(0.9..=0.1)
            .with_note_range(200..=100);
        assert!(lane.validate().is_err());
        let clamped = lane.clamped();
        assert_eq!(clamped.steps, 64);
        assert_eq!(clamped.velocity_range, 0.1..=0.9);
        assert_eq!(clamped.note_range, 100..=127);
        assert!(clamped.validate().is_ok());

        let config = SchedulerConfig::new()
            .with_lanes(vec![EuclideanLane::new(VoiceId::Pad, 4, 1); MAX_LANES + 2]);
        assert!(config.validate().is_err());
        assert_eq!(config.clamped().lanes.len(), MAX_LANES);
    }

    #[test]
    fn lane_shapes() {
        let lane = EuclideanLane::new(VoiceId::Pluck, 8, 3);
        assert!(!lane.shape_differs(&lane.clone().with_probability(0.1)));
        assert!(lane.shape_differs(&lane.clone().with_rotation(2)));
    }
}
