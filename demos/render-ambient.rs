//! Renders a generative ambient stream into a wav file, using a simple sine voice layer.

use std::{error::Error, path::PathBuf};

use arg::{parse_args, Args};
use hound::{SampleFormat, WavSpec, WavWriter};

use ambigen::{
    EngineConfig, EngineController, RenderStatusEvent, SeedBucket, TriggerEvent, VoiceId,
    VoiceLayer,
};

// -------------------------------------------------------------------------------------------------

#[cfg(all(debug_assertions, feature = "assert-allocs"))]
#[global_allocator]
static A: assert_no_alloc::AllocDisabler = assert_no_alloc::AllocDisabler;

// -------------------------------------------------------------------------------------------------

const DEFAULT_LOG_LEVEL: log::Level = if cfg!(debug_assertions) {
    log::Level::Debug
} else {
    log::Level::Info
};

const BLOCK_FRAMES: usize = 512;
const MAX_VOICES: usize = 16;

// -------------------------------------------------------------------------------------------------

#[derive(Args, Debug, Default)]
struct Arguments {
    #[arg(short = "o", long = "output")]
    /// Path of the wav file to write. Defaults to \"ambient.wav\".
    output_path: Option<PathBuf>,
    #[arg(short = "d", long = "duration")]
    /// Rendered duration in seconds. Defaults to 60.
    duration: Option<u32>,
    #[arg(short = "r", long = "sample-rate")]
    /// Output sample rate. Defaults to 44100.
    sample_rate: Option<u32>,
    #[arg(short = "t", long = "tension")]
    /// Harmonic tension in range 0 - 1.
    tension: Option<f32>,
    #[arg(long = "density")]
    /// Grain density in range 0 - 1.
    density: Option<f32>,
    #[arg(short = "b", long = "bucket")]
    /// Seed bucket: \"minute\", \"hour\" or \"day\".
    bucket: Option<SeedBucket>,
    #[arg(short = "s", long = "time")]
    /// Unix time in seconds the seed is derived from. Defaults to 0.
    unix_seconds: Option<u64>,
    #[arg(short = "l", long = "log-level")]
    /// Set logging level to \"debug\", \"info\", \"warn\" or \"error\".
    log_level: Option<log::Level>,
}

// -------------------------------------------------------------------------------------------------

/// A single decaying sine voice.
#[derive(Default, Clone, Copy)]
struct SineVoice {
    phase: f32,
    step: f32,
    level: f32,
    attack: f32,
    decay: f32,
    rising: bool,
    peak: f32,
    pan: f32,
}

impl SineVoice {
    fn is_active(&self) -> bool {
        self.rising || self.level > 0.0001
    }

    fn next(&mut self) -> f32 {
        if self.rising {
            self.level += self.attack;
            if self.level >= self.peak {
                self.level = self.peak;
                self.rising = false;
            }
        } else {
            self.level *= self.decay;
        }
        let sample = self.phase.sin() * self.level;
        self.phase = (self.phase + self.step) % std::f32::consts::TAU;
        sample
    }
}

/// Minimal voice layer: a fixed pool of sine voices with a per voice kind envelope.
struct SineVoices {
    sample_rate: f32,
    voices: [SineVoice; MAX_VOICES],
}

impl SineVoices {
    fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate as f32,
            voices: [SineVoice::default(); MAX_VOICES],
        }
    }
}

impl VoiceLayer for SineVoices {
    fn trigger(&mut self, event: &TriggerEvent) {
        let (attack_seconds, decay_seconds, gain) = match event.voice {
            VoiceId::Pad => (2.0, 6.0, 0.12),
            VoiceId::Lead => (0.3, 2.5, 0.1),
            VoiceId::Pluck => (0.005, 0.8, 0.1),
            VoiceId::Percussion => (0.001, 0.15, 0.15),
        };
        // reuse a free voice or steal the quietest one
        let index = self
            .voices
            .iter()
            .position(|voice| !voice.is_active())
            .unwrap_or_else(|| {
                self.voices
                    .iter()
                    .enumerate()
                    .min_by(|(_, a), (_, b)| a.level.total_cmp(&b.level))
                    .map_or(0, |(index, _)| index)
            });
        let voice = &mut self.voices[index];
        let note = event.parameters.note as f32 + (event.parameters.timbre - 0.5) * 0.1;
        let frequency = 440.0 * 2.0_f32.powf((note - 69.0) / 12.0);
        *voice = SineVoice {
            phase: 0.0,
            step: frequency / self.sample_rate * std::f32::consts::TAU,
            level: 0.0,
            peak: event.parameters.velocity * gain,
            attack: event.parameters.velocity * gain / (attack_seconds * self.sample_rate),
            decay: 0.001_f32.powf(1.0 / (decay_seconds * self.sample_rate)),
            rising: true,
            pan: event.parameters.timbre * 2.0 - 1.0,
        };
    }

    fn process(&mut self, output: &mut [f32]) {
        for frame in output.chunks_exact_mut(2) {
            for voice in self.voices.iter_mut().filter(|voice| voice.is_active()) {
                let sample = voice.next();
                frame[0] += sample * (1.0 - voice.pan) * 0.5;
                frame[1] += sample * (1.0 + voice.pan) * 0.5;
            }
        }
    }
}

// -------------------------------------------------------------------------------------------------

fn main() -> Result<(), Box<dyn Error>> {
    let args = parse_args::<Arguments>();

    simple_logger::SimpleLogger::new()
        .with_level(args.log_level.unwrap_or(DEFAULT_LOG_LEVEL).to_level_filter())
        .init()?;

    let sample_rate = args.sample_rate.unwrap_or(44100);
    let unix_seconds = args.unix_seconds.unwrap_or(0);
    let output_path = args
        .output_path
        .clone()
        .unwrap_or_else(|| PathBuf::from("ambient.wav"));

    let mut config = EngineConfig::new(sample_rate);
    config.max_frames = BLOCK_FRAMES;
    config.granular_prime_level = 0.02;
    config.scheduler = config
        .scheduler
        .with_tension(args.tension.unwrap_or(0.2))
        .with_seed_bucket(args.bucket.unwrap_or_default());
    if let Some(density) = args.density {
        config.granular.density = density;
    }

    let (status_sender, status_receiver) = crossbeam_channel::bounded(1024);
    let (mut controller, mut render_loop) = EngineController::new(
        config,
        SineVoices::new(sample_rate),
        unix_seconds,
        Some(status_sender),
    )?;

    let spec = WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(&output_path, spec)?;

    let total_frames = args.duration.unwrap_or(60) as u64 * sample_rate as u64;
    let mut buffer = vec![0.0; BLOCK_FRAMES * 2];
    let mut fired_events = 0;
    while render_loop.elapsed_frames() < total_frames {
        let elapsed = render_loop.elapsed_frames();
        let frames = (total_frames - elapsed).min(BLOCK_FRAMES as u64) as usize;
        controller.update(unix_seconds + elapsed / sample_rate as u64, elapsed)?;
        render_loop.process(&mut buffer[..frames * 2]);
        for sample in &buffer[..frames * 2] {
            writer.write_sample(*sample)?;
        }
        for event in status_receiver.try_iter() {
            match event {
                RenderStatusEvent::EventFired { .. } => fired_events += 1,
                RenderStatusEvent::EventsDropped { count, .. } => {
                    log::warn!("Dropped {count} events")
                }
                RenderStatusEvent::EventsCancelled { .. } => (),
            }
        }
    }
    writer.finalize()?;

    log::info!(
        "Rendered {} seconds with {} events into '{}'",
        total_frames / sample_rate as u64,
        fired_events,
        output_path.display()
    );
    Ok(())
}
