//! Granular texture engine: a circulating stereo buffer, continuously re-played by short,
//! windowed, randomly pitched and panned grains.

use std::sync::LazyLock;

use crate::{
    seed::{SeedMaterial, SeededRng},
    utils::{
        buffer::InterleavedBufferMut,
        dsp::{
            filters::onepole::{OnePoleHighpass, OnePoleLowpass},
            pan::PanTable,
            soft_clip,
            window::HannWindow,
        },
    },
    Error,
};

// -------------------------------------------------------------------------------------------------

mod buffer;
mod grain;
mod parameters;

pub use buffer::CirculatingBuffer;
pub use grain::{Grain, GrainPool, GrainSpawn};
pub use parameters::{GrainPitchMode, GranularParameters};

use grain::GRAIN_WINDOW_SIZE;

// -------------------------------------------------------------------------------------------------

/// Number of grain slots in the engine's pool.
pub const GRAIN_POOL_SIZE: usize = 128;

/// Seed tag of the granular engine's random generator.
pub const GRANULAR_SEED_TAG: &str = "granular";

/// Semitone intervals used in [`GrainPitchMode::Harmonic`], ordered by consonance.
const HARMONIC_INTERVALS: [i32; 11] = [0, 7, 12, -12, 19, 5, -7, 24, -5, 4, -24];

/// Static, shared grain envelope.
static GRAIN_WINDOW: LazyLock<HannWindow<GRAIN_WINDOW_SIZE>> = LazyLock::new(HannWindow::new);
/// Static, shared equal-power pan law.
static PAN_TABLE: LazyLock<PanTable<1025>> = LazyLock::new(PanTable::new);

// -------------------------------------------------------------------------------------------------

/// Granular processor which turns its stereo input into a cloud of grains.
///
/// Input is written into a [`CirculatingBuffer`] together with the soft-clipped wet
/// feedback. Grains get spawned in regular intervals, gated by a probability, and read
/// from the buffer behind the write head. All grain decisions come from a [`SeededRng`],
/// so the same seed and input always render the same output.
pub struct GranularEngine {
    sample_rate: u32,
    parameters: GranularParameters,
    pool: GrainPool<GRAIN_POOL_SIZE>,
    buffer: CirculatingBuffer,
    rng: SeededRng,
    spawn_counter: usize,
    samples_per_grain: usize,
    highpass: [OnePoleHighpass; 2],
    lowpass: [OnePoleLowpass; 2],
}

impl GranularEngine {
    /// Create a new engine with a circulating buffer of `buffer_seconds` length.
    pub fn new(sample_rate: u32, buffer_seconds: f32, seed: &SeedMaterial) -> Result<Self, Error> {
        if sample_rate == 0 {
            return Err(Error::SampleRateError(sample_rate));
        }
        if !(buffer_seconds.is_finite() && buffer_seconds > 0.0) {
            return Err(Error::ParameterError(format!(
                "Granular buffer length must be > 0 seconds, but is {buffer_seconds}"
            )));
        }
        // make sure LUTs are not lazily initialized in the audio thread
        LazyLock::force(&GRAIN_WINDOW);
        LazyLock::force(&PAN_TABLE);

        let parameters = GranularParameters::default();
        let mut engine = Self {
            sample_rate,
            parameters: parameters.clone(),
            pool: GrainPool::new(),
            buffer: CirculatingBuffer::with_duration(sample_rate, buffer_seconds),
            rng: SeededRng::from_state(0),
            spawn_counter: 0,
            samples_per_grain: 1,
            highpass: [
                OnePoleHighpass::new(sample_rate, parameters.highpass_hz),
                OnePoleHighpass::new(sample_rate, parameters.highpass_hz),
            ],
            lowpass: [
                OnePoleLowpass::new(sample_rate, parameters.lowpass_hz),
                OnePoleLowpass::new(sample_rate, parameters.lowpass_hz),
            ],
        };
        engine.reseed(seed);
        engine.set_parameters(&parameters);
        Ok(engine)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// The currently applied, clamped parameters.
    pub fn parameters(&self) -> &GranularParameters {
        &self.parameters
    }

    /// Apply new parameters. Values are clamped into their valid ranges.
    /// Lowering `max_grains` immediately stops grains above the new limit.
    pub fn set_parameters(&mut self, parameters: &GranularParameters) {
        self.parameters = parameters.clamped();
        let grains_per_second = self.parameters.grains_per_second();
        self.samples_per_grain =
            ((self.sample_rate as f32 / grains_per_second).round() as usize).max(1);
        for filter in &mut self.highpass {
            filter.set_cutoff(self.sample_rate, self.parameters.highpass_hz);
        }
        for filter in &mut self.lowpass {
            filter.set_cutoff(self.sample_rate, self.parameters.lowpass_hz);
        }
        self.pool.set_max_grains(self.parameters.max_grains);
    }

    /// Restart the grain random generator from the given seed material.
    /// Derives a new tagged seed, so call this from the control thread only.
    pub fn reseed(&mut self, seed: &SeedMaterial) {
        self.rng = SeededRng::new(&seed.with_tag(GRANULAR_SEED_TAG));
    }

    /// Replace the grain random generator with a prepared one. Real-time safe.
    pub fn set_rng(&mut self, rng: SeededRng) {
        self.rng = rng;
    }

    /// Fill the circulating buffer with low level noise from the system random generator.
    /// This is intentionally not reproducible.
    pub fn prime_with_noise(&mut self, level: f32) {
        self.buffer.fill_noise(&mut crate::seed::system_rng(), level);
    }

    /// Number of currently playing grains.
    pub fn active_grain_count(&self) -> usize {
        self.pool.active_count()
    }

    /// Read-only access to the grain pool.
    pub fn grain_pool(&self) -> &GrainPool<GRAIN_POOL_SIZE> {
        &self.pool
    }

    /// Stop all grains, clear the buffer and filter states.
    pub fn reset(&mut self) {
        self.pool.clear();
        self.buffer.flush();
        self.spawn_counter = 0;
        for filter in &mut self.highpass {
            filter.reset();
        }
        for filter in &mut self.lowpass {
            filter.reset();
        }
    }

    /// Process a single stereo frame: feed `input` into the buffer and return the wet grains.
    #[inline]
    pub fn process_frame(&mut self, input: [f32; 2]) -> [f32; 2] {
        self.spawn_counter += 1;
        if self.spawn_counter >= self.samples_per_grain {
            self.spawn_counter = 0;
            if self.rng.chance(self.parameters.probability as f64) {
                self.spawn_grain();
            }
        }

        let (wet_left, wet_right) = self.pool.process_frame(&self.buffer, &GRAIN_WINDOW);

        let wet_left = self.lowpass[0].process_sample(self.highpass[0].process_sample(wet_left));
        let wet_right = self.lowpass[1].process_sample(self.highpass[1].process_sample(wet_right));

        let feedback = self.parameters.feedback;
        self.buffer.write_frame([
            input[0] + soft_clip(wet_left * feedback),
            input[1] + soft_clip(wet_right * feedback),
        ]);

        [wet_left, wet_right]
    }

    /// Process an interleaved stereo buffer in place: the input is replaced with the wet
    /// grain output.
    pub fn process(&mut self, input_output: &mut [f32]) {
        debug_assert!(
            input_output.len() % 2 == 0,
            "Expecting an interleaved stereo buffer"
        );
        for frame in input_output.frames_mut::<2>() {
            *frame = self.process_frame(*frame);
        }
    }

    /// Pick properties for a new grain and try to spawn it. Random draws always happen in
    /// the same order: length, spray, jitter, pitch, pan.
    fn spawn_grain(&mut self) {
        let frames_per_ms = self.sample_rate as f64 / 1000.0;
        let buffer_length = self.buffer.len() as f64;

        let length_ms = self.rng.next_range(
            self.parameters.grain_size_min_ms as f64,
            self.parameters.grain_size_max_ms as f64,
        );
        let length = ((length_ms * frames_per_ms).round() as usize).max(1);

        let spray_frames = (self.parameters.spray_ms as f64 * frames_per_ms).min(buffer_length);
        let spray = self.rng.next() * spray_frames;
        let jitter_frames = (self.parameters.jitter_ms as f64 * frames_per_ms).min(buffer_length);
        let jitter = self.rng.next_range(-jitter_frames, jitter_frames);
        // the most recently written frame sits right behind the write index
        let read_position = self.buffer.write_index() as f64 - 1.0 - spray - jitter;

        let semitones = match self.parameters.pitch_mode {
            GrainPitchMode::Random => {
                let spread = self.parameters.pitch_spread as f64;
                self.rng.next_range(-spread, spread)
            }
            GrainPitchMode::Harmonic => {
                let count = ((self.parameters.pitch_spread / 12.0 * 11.0).floor() as usize)
                    .clamp(1, HARMONIC_INTERVALS.len());
                let intervals = &HARMONIC_INTERVALS[..count];
                self.rng.pick(intervals).copied().unwrap_or(0) as f64
            }
        };
        let playback_rate = 2.0_f64.powf(semitones / 12.0);

        let stereo_spread = self.parameters.stereo_spread as f64;
        let pan = self.rng.next_range(-stereo_spread, stereo_spread);
        let (pan_left_gain, pan_right_gain) = PAN_TABLE.gains(pan as f32);

        self.pool.spawn(&GrainSpawn {
            read_position,
            length,
            playback_rate,
            pan_left_gain,
            pan_right_gain,
        });
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: u32 = 44100;

    fn test_input(frames: usize) -> Vec<f32> {
        let mut rng = SeededRng::from_state(1234);
        (0..frames * 2)
            .map(|_| rng.next_range(-0.5, 0.5) as f32)
            .collect()
    }

    #[test]
    fn invalid_construction() {
        let seed = SeedMaterial::default();
        assert!(matches!(
            GranularEngine::new(0, 1.0, &seed),
            Err(Error::SampleRateError(0))
        ));
        assert!(GranularEngine::new(SAMPLE_RATE, 0.0, &seed).is_err());
        assert!(GranularEngine::new(SAMPLE_RATE, f32::NAN, &seed).is_err());
    }

    #[test]
    fn silence_from_empty_buffer() {
        let mut engine = GranularEngine::new(SAMPLE_RATE, 2.0, &SeedMaterial::default()).unwrap();
        engine.set_parameters(&GranularParameters {
            density: 1.0,
            probability: 1.0,
            ..Default::default()
        });
        let mut buffer = vec![0.0; SAMPLE_RATE as usize * 2];
        engine.process(&mut buffer);
        assert!(engine.active_grain_count() > 0);
        assert!(buffer.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn grain_count_stays_bounded() {
        let mut engine = GranularEngine::new(SAMPLE_RATE, 2.0, &SeedMaterial::default()).unwrap();
        engine.set_parameters(&GranularParameters {
            density: 1.0,
            probability: 1.0,
            grain_size_min_ms: 1500.0,
            grain_size_max_ms: 2000.0,
            max_grains: 1000,
            ..Default::default()
        });
        assert_eq!(engine.parameters().max_grains, GRAIN_POOL_SIZE);

        engine.set_parameters(&GranularParameters {
            max_grains: 8,
            ..engine.parameters().clone()
        });
        let mut max_active = 0;
        for _ in 0..SAMPLE_RATE {
            engine.process_frame([0.1, 0.1]);
            max_active = max_active.max(engine.active_grain_count());
        }
        assert_eq!(max_active, 8);

        engine.set_parameters(&GranularParameters {
            max_grains: 3,
            ..engine.parameters().clone()
        });
        assert_eq!(engine.active_grain_count(), 3);
        for _ in 0..SAMPLE_RATE / 2 {
            engine.process_frame([0.1, 0.1]);
            assert!(engine.active_grain_count() <= 3);
        }

        engine.reset();
        assert_eq!(engine.active_grain_count(), 0);
    }

    #[test]
    fn feedback_is_clamped() {
        let mut engine = GranularEngine::new(SAMPLE_RATE, 1.0, &SeedMaterial::default()).unwrap();
        engine.set_parameters(&GranularParameters {
            feedback: 2.0,
            density: 1.0,
            probability: 1.0,
            ..Default::default()
        });
        assert_eq!(engine.parameters().feedback, 0.95);

        let mut buffer = test_input(SAMPLE_RATE as usize * 4);
        engine.process(&mut buffer);
        assert!(buffer.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn deterministic_output() {
        let seed = SeedMaterial::new("h480000", "a6a79d47");
        let parameters = GranularParameters {
            density: 0.8,
            probability: 0.9,
            pitch_mode: GrainPitchMode::Random,
            ..Default::default()
        };
        let render = |seed: &SeedMaterial| {
            let mut engine = GranularEngine::new(SAMPLE_RATE, 1.0, seed).unwrap();
            engine.set_parameters(&parameters);
            let mut buffer = test_input(SAMPLE_RATE as usize);
            engine.process(&mut buffer);
            buffer
        };
        let first = render(&seed);
        let second = render(&seed);
        assert_eq!(first, second);
        assert!(first.iter().any(|s| *s != 0.0));

        let other = render(&SeedMaterial::new("h480001", "a6a79d47"));
        assert_ne!(first, other);
    }

    #[test]
    fn reseeding() {
        let seed = SeedMaterial::new("h480000", "a6a79d47");
        let other = SeedMaterial::new("h480001", "a6a79d47");
        let parameters = GranularParameters::new().with_density(1.0);
        let render = |engine: &mut GranularEngine| {
            engine.set_parameters(&parameters);
            let mut buffer = test_input(SAMPLE_RATE as usize / 2);
            engine.process(&mut buffer);
            buffer
        };

        let mut fresh = GranularEngine::new(SAMPLE_RATE, 1.0, &other).unwrap();
        let mut reseeded = GranularEngine::new(SAMPLE_RATE, 1.0, &seed).unwrap();
        reseeded.reseed(&other);
        assert_eq!(render(&mut fresh), render(&mut reseeded));

        // a prepared generator behaves like reseeding on the control thread
        let mut prepared = GranularEngine::new(SAMPLE_RATE, 1.0, &seed).unwrap();
        prepared.set_rng(other.with_tag(GRANULAR_SEED_TAG).rng());
        let mut reseeded = GranularEngine::new(SAMPLE_RATE, 1.0, &seed).unwrap();
        reseeded.reseed(&other);
        assert_eq!(render(&mut prepared), render(&mut reseeded));
    }

    #[test]
    fn harmonic_rates() {
        let mut engine = GranularEngine::new(SAMPLE_RATE, 1.0, &SeedMaterial::default()).unwrap();
        // a zero spread only allows the unison interval
        engine.set_parameters(&GranularParameters {
            density: 1.0,
            probability: 1.0,
            pitch_spread: 0.0,
            pitch_mode: GrainPitchMode::Harmonic,
            ..Default::default()
        });
        for _ in 0..SAMPLE_RATE {
            engine.process_frame([0.0, 0.0]);
        }
        let mut count = 0;
        engine.grain_pool().for_each_active(|_, grain| {
            assert_eq!(grain.playback_rate(), 1.0);
            count += 1;
        });
        assert!(count > 0);
    }
}
