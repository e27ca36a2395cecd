use std::any::Any;

use four_cc::FourCC;

use crate::{
    effect::{Effect, EffectMessage, EffectMessagePayload},
    parameter::FloatParameter,
    utils::{
        buffer::InterleavedBufferMut,
        dsp::{
            allpass::{AllpassStage, DiffuserChain},
            delay::{ms_to_frames, DelayLine},
            filters::{
                dc::{DcFilter, DcFilterMode},
                onepole::OnePoleLowpass,
            },
            lfo::{Lfo, LfoWaveform},
            soft_clip,
        },
        db_to_linear, SILENCE_DB,
    },
    Error,
};

// -------------------------------------------------------------------------------------------------

/// Number of feedback delay lines.
const NUM_LINES: usize = 8;

/// Base line delays in frames at 44.1 kHz. All primes, to avoid overlapping modes.
const BASE_LINE_DELAYS: [f32; NUM_LINES] =
    [1087.0, 1283.0, 1511.0, 1777.0, 1987.0, 2243.0, 2503.0, 2719.0];
const BASE_SAMPLE_RATE: f32 = 44100.0;

/// Slow, per line triangle LFO rates in Hz.
const LINE_LFO_RATES: [f64; NUM_LINES] = [0.07, 0.09, 0.11, 0.13, 0.15, 0.17, 0.19, 0.23];

/// Pre and post diffuser stage lengths in ms. Left and right are slightly detuned.
const PRE_DIFFUSER_MS: [[f32; 6]; 2] = [
    [4.77, 3.59, 12.73, 9.31, 7.13, 5.29],
    [4.93, 3.71, 12.11, 9.83, 6.89, 5.51],
];
const POST_DIFFUSER_MS: [[f32; 6]; 2] = [
    [5.71, 8.93, 3.31, 11.09, 6.67, 4.13],
    [5.93, 8.51, 3.47, 10.79, 6.91, 4.37],
];
/// Per line mid diffusion stage lengths in ms.
const MID_DIFFUSER_MS: [f32; NUM_LINES] = [1.31, 1.73, 2.11, 2.53, 2.97, 3.37, 3.89, 4.41];
const MID_DIFFUSER_FEEDBACK: f32 = 0.5;

/// Output taps: two rows of the Hadamard matrix, so left and right are uncorrelated.
const LEFT_TAPS: [f32; NUM_LINES] = [1.0, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0];
const RIGHT_TAPS: [f32; NUM_LINES] = [1.0, 1.0, -1.0, -1.0, 1.0, 1.0, -1.0, -1.0];
const OUTPUT_GAIN: f32 = 0.5 * std::f32::consts::FRAC_1_SQRT_2 * 0.5;

/// Gain of the diffused input when injected into the lines.
const INPUT_GAIN: f32 = 0.5;

/// Max feedback gain: the loop gain stays < 1 for all parameter settings.
pub const MAX_FEEDBACK: f32 = 0.99;
/// Max delay line modulation depth at `modulation = 1.0`.
pub const MAX_MOD_DEPTH_MS: f32 = 3.0;
/// Max size multiplier.
const MAX_SIZE: f32 = 2.0;
/// Max predelay time.
const MAX_PREDELAY_MS: f32 = 500.0;

// -------------------------------------------------------------------------------------------------

/// Reverb CPU/quality tiers. All tiers share the same parameter semantics.
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
pub enum ReverbQuality {
    /// 4 pre-diffuser stages, no post diffusion and no mid diffusion.
    Low,
    /// 4 pre and 4 post-diffuser stages, no mid diffusion.
    Medium,
    /// 6 pre and 6 post-diffuser stages, plus mid diffusion in the feedback loop.
    #[default]
    High,
}

impl ReverbQuality {
    fn pre_diffuser_stages(&self) -> usize {
        match self {
            Self::Low | Self::Medium => 4,
            Self::High => 6,
        }
    }

    fn post_diffuser_stages(&self) -> usize {
        match self {
            Self::Low => 0,
            Self::Medium => 4,
            Self::High => 6,
        }
    }

    fn mid_diffusion(&self) -> bool {
        matches!(self, Self::High)
    }
}

// -------------------------------------------------------------------------------------------------

/// Parameters of the [`ReverbEffect`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReverbParameters {
    /// Decay amount, mapped to the feedback gain `0.85 + decay * 0.14`.
    pub decay: f32,
    /// Delay time multiplier (0.5 - 2.0).
    pub size: f32,
    /// Diffuser feedback amount.
    pub diffusion: f32,
    /// Delay line LFO depth.
    pub modulation: f32,
    /// Predelay in milliseconds.
    pub predelay_ms: f32,
    /// Stereo width (0 = mono, 1 = full).
    pub width: f32,
    /// High frequency damping in the feedback loop.
    pub damping: f32,
    /// Dry/wet mix (0 = dry, 1 = wet).
    pub mix: f32,
    pub quality: ReverbQuality,
}

impl ReverbParameters {
    pub const DECAY: FloatParameter =
        FloatParameter::new(FourCC(*b"rdcy"), "Decay", 0.0..=1.0, 0.7);
    pub const SIZE: FloatParameter =
        FloatParameter::new(FourCC(*b"rsiz"), "Size", 0.5..=MAX_SIZE, 1.0).with_unit("x");
    pub const DIFFUSION: FloatParameter =
        FloatParameter::new(FourCC(*b"rdif"), "Diffusion", 0.0..=1.0, 0.7);
    pub const MODULATION: FloatParameter =
        FloatParameter::new(FourCC(*b"rmod"), "Modulation", 0.0..=1.0, 0.3);
    pub const PREDELAY: FloatParameter =
        FloatParameter::new(FourCC(*b"rpre"), "Predelay", 0.0..=MAX_PREDELAY_MS, 20.0)
            .with_unit("ms");
    pub const WIDTH: FloatParameter =
        FloatParameter::new(FourCC(*b"rwid"), "Width", 0.0..=1.0, 1.0);
    pub const DAMPING: FloatParameter =
        FloatParameter::new(FourCC(*b"rdmp"), "Damping", 0.0..=1.0, 0.4);
    pub const MIX: FloatParameter = FloatParameter::new(FourCC(*b"rmix"), "Mix", 0.0..=1.0, 0.35);

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_decay(mut self, decay: f32) -> Self {
        self.decay = decay;
        self
    }

    pub fn with_size(mut self, size: f32) -> Self {
        self.size = size;
        self
    }

    pub fn with_damping(mut self, damping: f32) -> Self {
        self.damping = damping;
        self
    }

    pub fn with_mix(mut self, mix: f32) -> Self {
        self.mix = mix;
        self
    }

    pub fn with_quality(mut self, quality: ReverbQuality) -> Self {
        self.quality = quality;
        self
    }

    /// Feedback gain of the delay lines for the current decay.
    pub fn feedback_gain(&self) -> f32 {
        (0.85 + Self::DECAY.clamp_value(self.decay) * 0.14).min(MAX_FEEDBACK)
    }

    pub fn validate(&self) -> Result<(), Error> {
        Self::DECAY.validate(self.decay)?;
        Self::SIZE.validate(self.size)?;
        Self::DIFFUSION.validate(self.diffusion)?;
        Self::MODULATION.validate(self.modulation)?;
        Self::PREDELAY.validate(self.predelay_ms)?;
        Self::WIDTH.validate(self.width)?;
        Self::DAMPING.validate(self.damping)?;
        Self::MIX.validate(self.mix)?;
        Ok(())
    }

    pub fn clamped(&self) -> Self {
        Self {
            decay: Self::DECAY.clamp_value(self.decay),
            size: Self::SIZE.clamp_value(self.size),
            diffusion: Self::DIFFUSION.clamp_value(self.diffusion),
            modulation: Self::MODULATION.clamp_value(self.modulation),
            predelay_ms: Self::PREDELAY.clamp_value(self.predelay_ms),
            width: Self::WIDTH.clamp_value(self.width),
            damping: Self::DAMPING.clamp_value(self.damping),
            mix: Self::MIX.clamp_value(self.mix),
            quality: self.quality,
        }
    }

    /// Values which contribute to the seed's parameter hash.
    pub fn hash_values(&self) -> [f32; 4] {
        [self.decay, self.size, self.diffusion, self.damping]
    }
}

impl Default for ReverbParameters {
    fn default() -> Self {
        Self {
            decay: Self::DECAY.default_value(),
            size: Self::SIZE.default_value(),
            diffusion: Self::DIFFUSION.default_value(),
            modulation: Self::MODULATION.default_value(),
            predelay_ms: Self::PREDELAY.default_value(),
            width: Self::WIDTH.default_value(),
            damping: Self::DAMPING.default_value(),
            mix: Self::MIX.default_value(),
            quality: ReverbQuality::default(),
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Message type for `ReverbEffect` to change parameters.
#[derive(Clone, Debug)]
pub enum ReverbEffectMessage {
    /// Reset/clear all delay lines.
    Reset,
    /// Apply a new, complete parameter set. Values get clamped.
    SetParameters(ReverbParameters),
}

impl EffectMessage for ReverbEffectMessage {
    fn effect_name(&self) -> &'static str {
        ReverbEffect::EFFECT_NAME
    }
    fn payload(&self) -> &dyn Any {
        self
    }
}

// -------------------------------------------------------------------------------------------------

/// In-place fast Walsh-Hadamard transform of 8 values, scaled by `1/sqrt(8)` so the
/// transform is orthonormal and preserves the energy of the vector.
#[inline]
pub fn hadamard_8(values: &mut [f32; NUM_LINES]) {
    let mut h = 1;
    while h < NUM_LINES {
        let mut i = 0;
        while i < NUM_LINES {
            for j in i..i + h {
                let a = values[j];
                let b = values[j + h];
                values[j] = a + b;
                values[j + h] = a - b;
            }
            i += h * 2;
        }
        h *= 2;
    }
    const SCALE: f32 = 0.353_553_4; // 1/sqrt(8)
    for value in values.iter_mut() {
        *value *= SCALE;
    }
}

/// Damping low-pass cutoff: 20 kHz at `damping = 0`, 200 Hz at `damping = 1`.
fn damping_cutoff(damping: f32) -> f32 {
    20000.0 * 0.01_f32.powf(damping)
}

// -------------------------------------------------------------------------------------------------

/// Allocated DSP state of the reverb. Created in `initialize`.
struct FdnState {
    predelay: [DelayLine; 2],
    pre_diffusers: [DiffuserChain; 2],
    post_diffusers: [DiffuserChain; 2],
    mid_diffusers: [AllpassStage; NUM_LINES],
    lines: [DelayLine; NUM_LINES],
    dampers: [OnePoleLowpass; NUM_LINES],
    lfos: [Lfo; NUM_LINES],
    dc_filters: [DcFilter; 2],
    base_delays: [f32; NUM_LINES],
}

impl FdnState {
    fn new(sample_rate: u32) -> Self {
        let rate_scale = sample_rate as f32 / BASE_SAMPLE_RATE;
        let base_delays = BASE_LINE_DELAYS.map(|frames| frames * rate_scale);
        let max_mod_depth = ms_to_frames(sample_rate, MAX_MOD_DEPTH_MS);
        let lines = base_delays
            .map(|frames| DelayLine::new((frames * MAX_SIZE + max_mod_depth).ceil() as usize + 2));
        let predelay = std::array::from_fn(|_| {
            DelayLine::with_max_delay_ms(sample_rate, MAX_PREDELAY_MS + 1.0)
        });
        let pre_diffusers = PRE_DIFFUSER_MS.map(|ms| DiffuserChain::from_ms(sample_rate, &ms, 0.5));
        let post_diffusers =
            POST_DIFFUSER_MS.map(|ms| DiffuserChain::from_ms(sample_rate, &ms, 0.4));
        let mid_diffusers = MID_DIFFUSER_MS.map(|ms| {
            AllpassStage::new(ms_to_frames(sample_rate, ms).round().max(1.0) as usize)
        });
        // fixed, evenly spread phases: modulation stays reproducible
        let lfos = std::array::from_fn(|i| {
            Lfo::new(sample_rate, LINE_LFO_RATES[i], LfoWaveform::Triangle)
                .with_phase(i as f64 / NUM_LINES as f64)
        });
        let dampers = std::array::from_fn(|_| OnePoleLowpass::default());
        let dc_filters =
            std::array::from_fn(|_| DcFilter::with_mode(sample_rate, DcFilterMode::Slow));
        Self {
            predelay,
            pre_diffusers,
            post_diffusers,
            mid_diffusers,
            lines,
            dampers,
            lfos,
            dc_filters,
            base_delays,
        }
    }

    fn flush(&mut self) {
        for line in self.predelay.iter_mut().chain(self.lines.iter_mut()) {
            line.flush();
        }
        for chain in self
            .pre_diffusers
            .iter_mut()
            .chain(self.post_diffusers.iter_mut())
        {
            chain.flush();
        }
        for stage in &mut self.mid_diffusers {
            stage.flush();
        }
        for damper in &mut self.dampers {
            damper.reset();
        }
        for filter in &mut self.dc_filters {
            filter.reset();
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Stereo 8-line feedback delay network reverb.
///
/// Signal flow: predelay, pre-diffusers, 8 modulated and damped delay lines mixed through a
/// Hadamard matrix, decorrelated output taps, post-diffusers, soft clip, DC blocker and
/// mid/side width.
pub struct ReverbEffect {
    sample_rate: u32,
    parameters: ReverbParameters,
    feedback: f32,
    predelay_frames: f32,
    mod_depth_frames: f32,
    state: Option<Box<FdnState>>,
}

impl Default for ReverbEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl ReverbEffect {
    pub const EFFECT_NAME: &str = "ReverbEffect";

    /// Creates a new `ReverbEffect` with default parameter values.
    pub fn new() -> Self {
        Self::with_parameters(ReverbParameters::default())
    }

    /// Creates a new `ReverbEffect` with the given parameters. Values get clamped.
    pub fn with_parameters(parameters: ReverbParameters) -> Self {
        let mut reverb = Self {
            sample_rate: 0,
            parameters: ReverbParameters::default(),
            feedback: 0.0,
            predelay_frames: 0.0,
            mod_depth_frames: 0.0,
            state: None,
        };
        reverb.set_parameters(&parameters);
        reverb
    }

    /// The currently applied, clamped parameters.
    pub fn current_parameters(&self) -> &ReverbParameters {
        &self.parameters
    }

    /// Apply new parameters. Real-time safe.
    pub fn set_parameters(&mut self, parameters: &ReverbParameters) {
        let parameters = parameters.clamped();
        self.feedback = parameters.feedback_gain();
        self.predelay_frames = ms_to_frames(self.sample_rate, parameters.predelay_ms);
        self.mod_depth_frames =
            ms_to_frames(self.sample_rate, parameters.modulation * MAX_MOD_DEPTH_MS);
        if let Some(state) = self.state.as_mut() {
            let quality = parameters.quality;
            let cutoff = damping_cutoff(parameters.damping);
            for chain in &mut state.pre_diffusers {
                chain.set_feedback(0.5 + parameters.diffusion * 0.25);
                chain.set_active_stages(quality.pre_diffuser_stages());
            }
            for chain in &mut state.post_diffusers {
                chain.set_feedback(0.4 + parameters.diffusion * 0.25);
                chain.set_active_stages(quality.post_diffuser_stages());
            }
            for damper in &mut state.dampers {
                damper.set_cutoff(self.sample_rate, cutoff);
            }
        }
        self.parameters = parameters;
    }

    /// Clear all delay lines and filter states.
    pub fn reset(&mut self) {
        if let Some(state) = self.state.as_mut() {
            state.flush();
        }
    }

    /// Process a single stereo frame.
    #[inline]
    fn process_frame(state: &mut FdnState, settings: FrameSettings, input: [f32; 2]) -> [f32; 2] {
        // predelay and input diffusion
        let mut diffused = [0.0; 2];
        for channel in 0..2 {
            state.predelay[channel].write(input[channel]);
            let predelayed = state.predelay[channel].read(1.0 + settings.predelay_frames);
            diffused[channel] = state.pre_diffusers[channel].process_sample(predelayed);
        }

        // read and damp modulated lines
        let mut reads = [0.0; NUM_LINES];
        let mut mixed = [0.0; NUM_LINES];
        for i in 0..NUM_LINES {
            let modulation = state.lfos[i].next() as f32 * settings.mod_depth_frames;
            let delay = state.base_delays[i] * settings.size + modulation;
            reads[i] = state.lines[i].read(delay);
            mixed[i] = state.dampers[i].process_sample(reads[i]);
        }
        hadamard_8(&mut mixed);

        // feedback and input injection
        for i in 0..NUM_LINES {
            let polarity = if (i / 2) % 2 == 0 { 1.0 } else { -1.0 };
            let injection = diffused[i % 2] * INPUT_GAIN * polarity;
            let mut sample = mixed[i] * settings.feedback + injection;
            if settings.mid_diffusion {
                sample = state.mid_diffusers[i].process_sample(sample, MID_DIFFUSER_FEEDBACK);
            }
            state.lines[i].write(soft_clip(sample));
        }

        // output taps
        let mut wet = [0.0; 2];
        for i in 0..NUM_LINES {
            wet[0] += reads[i] * LEFT_TAPS[i];
            wet[1] += reads[i] * RIGHT_TAPS[i];
        }
        for channel in 0..2 {
            let sample = state.post_diffusers[channel].process_sample(wet[channel] * OUTPUT_GAIN);
            wet[channel] = state.dc_filters[channel].process_sample(soft_clip(sample));
        }

        // mid/side width
        let mid = (wet[0] + wet[1]) * 0.5;
        let side = (wet[0] - wet[1]) * 0.5 * settings.width;
        [mid + side, mid - side]
    }
}

/// Per block constant values, passed to the frame processing function.
#[derive(Clone, Copy)]
struct FrameSettings {
    feedback: f32,
    size: f32,
    predelay_frames: f32,
    mod_depth_frames: f32,
    width: f32,
    mid_diffusion: bool,
}

impl Effect for ReverbEffect {
    fn name(&self) -> &'static str {
        Self::EFFECT_NAME
    }

    fn parameters(&self) -> Vec<&FloatParameter> {
        vec![
            &ReverbParameters::DECAY,
            &ReverbParameters::SIZE,
            &ReverbParameters::DIFFUSION,
            &ReverbParameters::MODULATION,
            &ReverbParameters::PREDELAY,
            &ReverbParameters::WIDTH,
            &ReverbParameters::DAMPING,
            &ReverbParameters::MIX,
        ]
    }

    fn initialize(
        &mut self,
        sample_rate: u32,
        channel_count: usize,
        _max_frames: usize,
    ) -> Result<(), Error> {
        if sample_rate == 0 {
            return Err(Error::SampleRateError(sample_rate));
        }
        if channel_count != 2 {
            return Err(Error::ChannelLayoutError(channel_count));
        }
        self.sample_rate = sample_rate;
        self.state = Some(Box::new(FdnState::new(sample_rate)));
        // recalculate sample rate dependent values
        let parameters = self.parameters;
        self.set_parameters(&parameters);
        log::debug!("Initialized reverb at {sample_rate} Hz");
        Ok(())
    }

    fn process(&mut self, output: &mut [f32]) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        let settings = FrameSettings {
            feedback: self.feedback,
            size: self.parameters.size,
            predelay_frames: self.predelay_frames,
            mod_depth_frames: self.mod_depth_frames,
            width: self.parameters.width,
            mid_diffusion: self.parameters.quality.mid_diffusion(),
        };
        let wet_amount = self.parameters.mix;
        let dry_amount = 1.0 - wet_amount;
        for frame in output.frames_mut::<2>() {
            let wet = Self::process_frame(state, settings, *frame);
            frame[0] = frame[0] * dry_amount + wet[0] * wet_amount;
            frame[1] = frame[1] * dry_amount + wet[1] * wet_amount;
        }
    }

    fn process_tail(&self) -> Option<usize> {
        let state = self.state.as_ref()?;
        // frames until the loop decayed into silence
        let average_delay = state.base_delays.iter().sum::<f32>() / NUM_LINES as f32
            * self.parameters.size;
        let loops = db_to_linear(SILENCE_DB).ln() / self.feedback.ln();
        Some((average_delay * loops) as usize + self.predelay_frames as usize)
    }

    fn process_message(&mut self, message: &EffectMessagePayload) -> Result<(), Error> {
        if let Some(message) = message.payload().downcast_ref::<ReverbEffectMessage>() {
            match message {
                ReverbEffectMessage::Reset => self.reset(),
                ReverbEffectMessage::SetParameters(parameters) => self.set_parameters(parameters),
            }
            Ok(())
        } else {
            Err(Error::ParameterError(
                "ReverbEffect: Invalid/unknown message payload".to_owned(),
            ))
        }
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: u32 = 44100;

    fn initialized(parameters: ReverbParameters) -> ReverbEffect {
        let mut reverb = ReverbEffect::with_parameters(parameters);
        reverb.initialize(SAMPLE_RATE, 2, 1024).unwrap();
        reverb
    }

    fn rms(buffer: &[f32]) -> f32 {
        (buffer.iter().map(|s| s * s).sum::<f32>() / buffer.len() as f32).sqrt()
    }

    #[test]
    fn hadamard_is_orthonormal() {
        let mut unit = [0.0; NUM_LINES];
        unit[0] = 1.0;
        hadamard_8(&mut unit);
        for value in unit {
            assert!((value - 0.353_553_4).abs() < 1e-6);
        }

        let mut values = [0.3, -0.1, 0.8, 0.25, -0.6, 0.0, 0.1, 0.9];
        let energy = values.iter().map(|v| v * v).sum::<f32>();
        hadamard_8(&mut values);
        let mixed_energy = values.iter().map(|v| v * v).sum::<f32>();
        assert!((energy - mixed_energy).abs() < 1e-5);
    }

    #[test]
    fn initialize_checks_layout() {
        let mut reverb = ReverbEffect::new();
        assert_eq!(reverb.name(), ReverbEffect::EFFECT_NAME);
        assert_eq!(reverb.parameters().len(), 8);
        assert!(matches!(
            reverb.initialize(0, 2, 256),
            Err(Error::SampleRateError(0))
        ));
        assert!(matches!(
            reverb.initialize(SAMPLE_RATE, 1, 256),
            Err(Error::ChannelLayoutError(1))
        ));

        // not initialized: leaves the buffer untouched
        let mut buffer = vec![0.5; 64];
        reverb.process(&mut buffer);
        assert!(buffer.iter().all(|s| *s == 0.5));
        assert_eq!(reverb.process_tail(), None);
    }

    #[test]
    fn feedback_is_capped() {
        assert_eq!(ReverbParameters::new().with_decay(1.0).feedback_gain(), MAX_FEEDBACK);
        assert_eq!(ReverbParameters::new().with_decay(0.0).feedback_gain(), 0.85);
        assert_eq!(ReverbParameters::new().with_decay(7.0).feedback_gain(), MAX_FEEDBACK);

        let parameters = ReverbParameters::new().with_size(3.0).with_mix(-1.0);
        assert!(parameters.validate().is_err());
        let clamped = parameters.clamped();
        assert_eq!(clamped.size, 2.0);
        assert_eq!(clamped.mix, 0.0);
    }

    #[test]
    fn stable_at_max_decay() {
        let mut reverb = initialized(
            ReverbParameters::new()
                .with_decay(1.0)
                .with_damping(0.0)
                .with_mix(1.0),
        );
        let second = SAMPLE_RATE as usize * 2;
        let mut buffer = vec![0.0; second * 10];
        buffer[0] = 1.0;
        buffer[1] = 1.0;
        reverb.process(&mut buffer);

        assert!(buffer.iter().all(|s| s.is_finite() && s.abs() <= 1.5));
        let first_second = rms(&buffer[..second]);
        let last_second = rms(&buffer[second * 9..]);
        assert!(first_second > 0.0);
        assert!(last_second < first_second * 0.5);
    }

    #[test]
    fn quality_tiers() {
        let mut outputs = Vec::new();
        for quality in [ReverbQuality::Low, ReverbQuality::Medium, ReverbQuality::High] {
            let mut reverb = initialized(
                ReverbParameters::new()
                    .with_quality(quality)
                    .with_mix(1.0),
            );
            {
                let state = reverb.state.as_ref().unwrap();
                assert_eq!(
                    state.pre_diffusers[0].active_stages(),
                    quality.pre_diffuser_stages()
                );
                assert_eq!(
                    state.post_diffusers[1].active_stages(),
                    quality.post_diffuser_stages()
                );
            }
            let mut buffer = vec![0.0; 8192];
            buffer[0] = 1.0;
            buffer[1] = 1.0;
            reverb.process(&mut buffer);
            assert!(buffer.iter().all(|s| s.is_finite()));
            assert!(buffer.iter().any(|s| *s != 0.0));
            outputs.push(buffer);
        }
        assert_ne!(outputs[0], outputs[2]);
    }

    #[test]
    fn messages() {
        let mut reverb = initialized(ReverbParameters::new().with_mix(1.0));
        let mut buffer = vec![0.3; 4096];
        reverb.process(&mut buffer);

        reverb
            .process_message(&ReverbEffectMessage::Reset)
            .unwrap();
        let mut silence = vec![0.0; 4096];
        reverb.process(&mut silence);
        assert!(silence.iter().all(|s| *s == 0.0));

        reverb
            .process_message(&ReverbEffectMessage::SetParameters(
                ReverbParameters::new().with_decay(0.2),
            ))
            .unwrap();
        assert_eq!(reverb.current_parameters().decay, 0.2);
        assert_eq!(reverb.current_parameters().mix, 0.35);

        struct OtherMessage;
        impl EffectMessage for OtherMessage {
            fn effect_name(&self) -> &'static str {
                "Other"
            }
            fn payload(&self) -> &dyn Any {
                self
            }
        }
        assert!(reverb.process_message(&OtherMessage).is_err());
    }

    #[test]
    fn tail_length() {
        let short = initialized(ReverbParameters::new().with_decay(0.0));
        let long = initialized(ReverbParameters::new().with_decay(1.0));
        assert!(short.process_tail().unwrap() < long.process_tail().unwrap());
    }
}
