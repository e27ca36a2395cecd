//! Couples the phrase scheduler, voice layer, granular engine and reverb.
//!
//! [`EngineController::new`] splits the engine into a control side [`EngineController`],
//! which generates phrases and publishes parameter snapshots, and a real-time
//! [`RenderLoop`], which renders interleaved stereo audio.

use basedrop::Collector;
use crossbeam_channel::Sender;

use crate::{
    effect::{
        reverb::{ReverbEffect, ReverbParameters},
        Effect,
    },
    granular::{GranularEngine, GranularParameters, GRANULAR_SEED_TAG},
    scheduler::{
        trigger::{
            trigger_queue, TriggerEvent, TriggerQueue, TriggerSender, DEFAULT_PENDING_EVENTS,
        },
        PhraseScheduler, SchedulerConfig, SourceId, VoiceId,
    },
    seed::{parameter_hash, SeedMaterial, SeededRng},
    utils::{
        buffer::{clear_buffer, InterleavedBufferMut},
        dsp::sanitize,
        snapshot::{snapshot_channel, SnapshotReceiver, SnapshotSender},
    },
    Error,
};

// -------------------------------------------------------------------------------------------------

/// Interface of the external voice layer, which synthesizes the triggered events.
///
/// NB: both functions are called in the real-time render thread, so they must not block or
/// allocate.
pub trait VoiceLayer: Send + 'static {
    /// Start a new voice for the given event. Called exactly at the event's fire frame.
    fn trigger(&mut self, event: &TriggerEvent);

    /// Add the dry voice output to the given interleaved stereo buffer.
    fn process(&mut self, output: &mut [f32]);
}

/// A voice layer which ignores all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentVoices;

impl VoiceLayer for SilentVoices {
    fn trigger(&mut self, _event: &TriggerEvent) {}
    fn process(&mut self, _output: &mut [f32]) {}
}

// -------------------------------------------------------------------------------------------------

/// Immutable parameter snapshot, handed from the control to the render thread.
#[derive(Debug, Clone)]
pub struct EngineSnapshot {
    /// Seed material of the currently armed phrase.
    pub seed: SeedMaterial,
    /// Counter which changes whenever `seed` changes.
    pub seed_generation: u64,
    /// First frame of the phrase which introduced `seed`.
    pub seed_start_frame: u64,
    pub phrase_index: u64,
    pub phrase_frames: u64,
    pub granular: GranularParameters,
    pub reverb: ReverbParameters,
    /// Grain generator for `seed`, prepared on the control thread.
    pub granular_rng: SeededRng,
}

impl EngineSnapshot {
    /// Snapshot with the given seed and default parameters.
    pub fn with_seed(seed: SeedMaterial) -> Self {
        let granular_rng = seed.with_tag(GRANULAR_SEED_TAG).rng();
        Self {
            seed,
            seed_generation: 0,
            seed_start_frame: 0,
            phrase_index: 0,
            phrase_frames: 0,
            granular: GranularParameters::default(),
            reverb: ReverbParameters::default(),
            granular_rng,
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Status notifications from the render thread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderStatusEvent {
    /// An event got passed to the voice layer.
    EventFired {
        voice: VoiceId,
        source: SourceId,
        phrase_index: u64,
        fire_frame: u64,
    },
    /// Pending events got cancelled.
    EventsCancelled { count: usize, frame: u64 },
    /// Events got dropped because the pending event queue is full.
    EventsDropped { count: usize, frame: u64 },
}

// -------------------------------------------------------------------------------------------------

/// Engine setup, applied when creating an engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub sample_rate: u32,
    /// Max number of frames passed to [`RenderLoop::process`] at once.
    pub max_frames: usize,
    /// Length of the granular circulating buffer.
    pub granular_buffer_seconds: f32,
    /// Level of the noise the granular buffer is filled with initially. 0 disables priming.
    pub granular_prime_level: f32,
    /// Phrases are armed and published this many seconds before they start.
    pub lookahead_seconds: f32,
    /// Max number of pending trigger events in the render thread.
    pub pending_events: usize,
    pub scheduler: SchedulerConfig,
    pub granular: GranularParameters,
    pub reverb: ReverbParameters,
}

impl EngineConfig {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.sample_rate == 0 {
            return Err(Error::SampleRateError(self.sample_rate));
        }
        if !(self.lookahead_seconds.is_finite() && self.lookahead_seconds >= 0.0) {
            return Err(Error::ParameterError(format!(
                "Invalid lookahead: {}",
                self.lookahead_seconds
            )));
        }
        self.scheduler.validate()?;
        self.granular.validate()?;
        self.reverb.validate()?;
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            max_frames: 4096,
            granular_buffer_seconds: 4.0,
            granular_prime_level: 0.0,
            lookahead_seconds: 0.5,
            pending_events: DEFAULT_PENDING_EVENTS,
            scheduler: SchedulerConfig::default(),
            granular: GranularParameters::default(),
            reverb: ReverbParameters::default(),
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Real-time side of the engine: renders voices, grains and reverb.
pub struct RenderLoop<V: VoiceLayer> {
    snapshots: SnapshotReceiver<EngineSnapshot>,
    triggers: TriggerQueue,
    voices: V,
    granular: GranularEngine,
    reverb: ReverbEffect,
    status_sender: Option<Sender<RenderStatusEvent>>,
    seed_generation: u64,
    /// Grain generator of a new seed and the frame it takes over at.
    pending_granular_rng: Option<(u64, SeededRng)>,
    frame: u64,
}

impl<V: VoiceLayer> RenderLoop<V> {
    /// Number of frames rendered so far.
    pub fn elapsed_frames(&self) -> u64 {
        self.frame
    }

    pub fn voices(&self) -> &V {
        &self.voices
    }

    pub fn voices_mut(&mut self) -> &mut V {
        &mut self.voices
    }

    /// Number of pending, not yet fired trigger events.
    pub fn pending_events(&self) -> usize {
        self.triggers.pending_count()
    }

    /// Number of currently playing grains.
    pub fn active_grain_count(&self) -> usize {
        self.granular.active_grain_count()
    }

    /// Render the next block of interleaved stereo frames into `output`.
    pub fn process(&mut self, output: &mut [f32]) {
        #[cfg(feature = "assert-allocs")]
        assert_no_alloc::assert_no_alloc(|| self.process_block(output));

        #[cfg(not(feature = "assert-allocs"))]
        self.process_block(output);
    }

    fn process_block(&mut self, output: &mut [f32]) {
        debug_assert!(output.len() % 2 == 0, "Expecting an interleaved stereo buffer");
        clear_buffer(output);

        if self.snapshots.update() {
            self.apply_snapshot();
        }

        let stats = self.triggers.apply_messages(self.frame);
        if stats.cancelled > 0 {
            self.send_status(RenderStatusEvent::EventsCancelled {
                count: stats.cancelled,
                frame: self.frame,
            });
        }
        if stats.dropped > 0 {
            self.send_status(RenderStatusEvent::EventsDropped {
                count: stats.dropped,
                frame: self.frame,
            });
        }

        // run voices in sub blocks, split at event times
        let frame_count = output.len() / 2;
        let mut offset = 0;
        while offset < frame_count {
            let current_frame = self.frame + offset as u64;
            let voices = &mut self.voices;
            let status_sender = &self.status_sender;
            self.triggers.fire_due_events(current_frame, |event| {
                voices.trigger(&event);
                if let Some(sender) = status_sender {
                    let _ = sender.try_send(RenderStatusEvent::EventFired {
                        voice: event.voice,
                        source: event.source,
                        phrase_index: event.phrase_index,
                        fire_frame: event.fire_frame,
                    });
                }
            });
            let block_frames = self
                .triggers
                .frames_until_next_event(current_frame)
                .clamp(1, frame_count - offset);
            self.voices
                .process(&mut output[offset * 2..(offset + block_frames) * 2]);
            offset += block_frames;
        }

        // grains are fed by the dry voices
        for (offset, frame) in output.frames_mut::<2>().enumerate() {
            self.switch_granular_rng(self.frame + offset as u64);
            let wet = self.granular.process_frame(*frame);
            frame[0] += wet[0];
            frame[1] += wet[1];
        }

        self.reverb.process(output);

        for sample in output.iter_mut() {
            *sample = sanitize(*sample);
        }
        self.frame += frame_count as u64;
    }

    fn apply_snapshot(&mut self) {
        let snapshot = self.snapshots.current();
        self.granular.set_parameters(&snapshot.granular);
        self.reverb.set_parameters(&snapshot.reverb);
        if snapshot.seed_generation != self.seed_generation {
            self.seed_generation = snapshot.seed_generation;
            let pending = (snapshot.seed_start_frame, snapshot.granular_rng.clone());
            // a generator which is due already must not get lost
            if let Some((start_frame, rng)) = self.pending_granular_rng.replace(pending) {
                if start_frame <= self.frame {
                    self.granular.set_rng(rng);
                }
            }
        }
    }

    /// Hand a pending grain generator to the granular engine when its phrase started.
    /// Keeps grain decisions independent of when snapshots arrive.
    #[inline]
    fn switch_granular_rng(&mut self, current_frame: u64) {
        if self
            .pending_granular_rng
            .as_ref()
            .is_some_and(|(start_frame, _)| *start_frame <= current_frame)
        {
            if let Some((_, rng)) = self.pending_granular_rng.take() {
                self.granular.set_rng(rng);
            }
        }
    }

    fn send_status(&self, event: RenderStatusEvent) {
        if let Some(sender) = &self.status_sender {
            let _ = sender.try_send(event);
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Control side of the engine.
///
/// Call [`update`](Self::update) regularly, e.g. once per rendered block or from a timer,
/// with the current wall clock time and the number of rendered frames. This arms upcoming
/// phrases and frees memory which the render thread released.
pub struct EngineController {
    collector: Collector,
    snapshot_sender: SnapshotSender<EngineSnapshot>,
    trigger_sender: TriggerSender,
    scheduler: PhraseScheduler,
    snapshot: EngineSnapshot,
    lookahead_frames: u64,
    next_phrase: Option<u64>,
    /// Index and seed of all armed phrases which may still have pending events.
    live_phrases: Vec<(u64, SeedMaterial)>,
    stopped: bool,
}

impl EngineController {
    /// Create a new engine. `unix_seconds` is the wall clock time used to derive the initial
    /// seed bucket: the engine never reads the system clock itself.
    ///
    /// Returns the controller and the render loop, which should be moved into the audio
    /// thread.
    pub fn new<V: VoiceLayer>(
        config: EngineConfig,
        voices: V,
        unix_seconds: u64,
        status_sender: Option<Sender<RenderStatusEvent>>,
    ) -> Result<(Self, RenderLoop<V>), Error> {
        config.validate()?;
        let scheduler = PhraseScheduler::new(config.scheduler.clone(), config.sample_rate)?;

        let seed = Self::seed_material(
            scheduler.config(),
            &config.granular,
            &config.reverb,
            unix_seconds,
        );
        let mut snapshot = EngineSnapshot::with_seed(seed);
        snapshot.phrase_frames = scheduler.phrase_length_frames();
        snapshot.granular = config.granular.clamped();
        snapshot.reverb = config.reverb.clamped();

        let mut granular = GranularEngine::new(
            config.sample_rate,
            config.granular_buffer_seconds,
            &snapshot.seed,
        )?;
        granular.set_parameters(&snapshot.granular);
        if config.granular_prime_level > 0.0 {
            granular.prime_with_noise(config.granular_prime_level);
        }

        let mut reverb = ReverbEffect::with_parameters(snapshot.reverb);
        reverb.initialize(config.sample_rate, 2, config.max_frames)?;

        let collector = Collector::new();
        let (snapshot_sender, snapshots) = snapshot_channel(&collector.handle(), snapshot.clone());
        let (trigger_sender, triggers) = trigger_queue(&collector.handle(), config.pending_events);

        let lookahead_frames = ((config.lookahead_seconds as f64 * config.sample_rate as f64)
            as u64)
            .min(scheduler.phrase_length_frames());

        log::info!(
            "Created engine at {} Hz with seed '{}'",
            config.sample_rate,
            snapshot.seed
        );

        let controller = Self {
            collector,
            snapshot_sender,
            trigger_sender,
            scheduler,
            snapshot,
            lookahead_frames,
            next_phrase: None,
            live_phrases: Vec::new(),
            stopped: false,
        };
        let render_loop = RenderLoop {
            snapshots,
            triggers,
            voices,
            granular,
            reverb,
            status_sender,
            seed_generation: 0,
            pending_granular_rng: None,
            frame: 0,
        };
        Ok((controller, render_loop))
    }

    /// The most recently published snapshot.
    pub fn snapshot(&self) -> &EngineSnapshot {
        &self.snapshot
    }

    pub fn scheduler(&self) -> &PhraseScheduler {
        &self.scheduler
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Arm all phrases which start within the lookahead window and release memory
    /// returned from the render thread. Returns the index of the last armed phrase.
    pub fn update(
        &mut self,
        unix_seconds: u64,
        elapsed_frames: u64,
    ) -> Result<Option<u64>, Error> {
        self.collector.collect();
        if self.stopped {
            return Ok(None);
        }
        let current_phrase = self.scheduler.phrase_index_at(elapsed_frames);
        let mut next_phrase = self
            .next_phrase
            .map_or(current_phrase, |next| next.max(current_phrase));
        let mut armed = None;
        while self.scheduler.phrase_start_frame(next_phrase)
            <= elapsed_frames + self.lookahead_frames
        {
            self.arm_phrase(next_phrase, unix_seconds, elapsed_frames)?;
            armed = Some(next_phrase);
            next_phrase += 1;
        }
        self.next_phrase = Some(next_phrase);
        Ok(armed)
    }

    /// Apply new granular parameters. Invalid parameters are rejected.
    pub fn set_granular_parameters(&mut self, parameters: GranularParameters) -> Result<(), Error> {
        parameters.validate()?;
        self.snapshot.granular = parameters;
        self.publish_snapshot();
        Ok(())
    }

    /// Apply new reverb parameters. Invalid parameters are rejected.
    pub fn set_reverb_parameters(&mut self, parameters: ReverbParameters) -> Result<(), Error> {
        parameters.validate()?;
        self.snapshot.reverb = parameters;
        self.publish_snapshot();
        Ok(())
    }

    /// Enable or disable a lane. Disabling cancels all of the lane's events which fire after
    /// `at_frame`. Enabling schedules the lane's events of the armed phrase.
    /// Returns false when nothing changed.
    pub fn set_lane_enabled(
        &mut self,
        lane_index: usize,
        enabled: bool,
        at_frame: u64,
    ) -> Result<bool, Error> {
        let Some(source) = self.scheduler.set_lane_enabled(lane_index, enabled) else {
            return Ok(false);
        };
        self.restart_source(source, at_frame)?;
        Ok(true)
    }

    /// Enable or disable the melodic voice, like [`set_lane_enabled`](Self::set_lane_enabled).
    pub fn set_melodic_enabled(&mut self, enabled: bool, at_frame: u64) -> Result<bool, Error> {
        let Some(source) = self.scheduler.set_melodic_enabled(enabled) else {
            return Ok(false);
        };
        self.restart_source(source, at_frame)?;
        Ok(true)
    }

    /// Apply a new scheduler config. Events of all structurally changed sources after
    /// `at_frame` get replaced. A changed phrase length restarts the phrase sequence.
    pub fn set_scheduler_config(
        &mut self,
        config: SchedulerConfig,
        at_frame: u64,
    ) -> Result<(), Error> {
        config.validate()?;
        let phrase_frames = self.scheduler.phrase_length_frames();
        let changed_sources = self.scheduler.set_config(config);
        if self.scheduler.phrase_length_frames() != phrase_frames {
            log::debug!("Phrase length changed: restarting phrases");
            self.trigger_sender.cancel_all(at_frame)?;
            self.scheduler.disarm();
            self.next_phrase = None;
            self.live_phrases.clear();
            return Ok(());
        }
        for source in changed_sources {
            self.restart_source(source, at_frame)?;
        }
        Ok(())
    }

    /// Cancel all events after `at_frame` and stop arming new phrases.
    pub fn stop(&mut self, at_frame: u64) -> Result<(), Error> {
        self.trigger_sender.cancel_all(at_frame)?;
        self.scheduler.disarm();
        self.next_phrase = None;
        self.live_phrases.clear();
        self.stopped = true;
        log::info!("Stopped engine at frame {at_frame}");
        Ok(())
    }

    /// Resume arming phrases after a [`stop`](Self::stop).
    pub fn start(&mut self) {
        self.stopped = false;
    }

    fn seed_material(
        scheduler: &SchedulerConfig,
        granular: &GranularParameters,
        reverb: &ReverbParameters,
        unix_seconds: u64,
    ) -> SeedMaterial {
        let mut values = Vec::with_capacity(13);
        values.extend_from_slice(&scheduler.hash_values());
        values.extend_from_slice(&granular.clamped().hash_values());
        values.extend_from_slice(&reverb.clamped().hash_values());
        SeedMaterial::new(
            &scheduler.seed_bucket.key(unix_seconds),
            &parameter_hash(&values),
        )
    }

    fn arm_phrase(
        &mut self,
        phrase_index: u64,
        unix_seconds: u64,
        from_frame: u64,
    ) -> Result<(), Error> {
        // the seed is only ever updated at phrase boundaries
        let seed = Self::seed_material(
            self.scheduler.config(),
            &self.snapshot.granular,
            &self.snapshot.reverb,
            unix_seconds,
        );
        if seed != self.snapshot.seed {
            log::debug!("New seed for phrase {phrase_index}: '{seed}'");
            self.snapshot.granular_rng = seed.with_tag(GRANULAR_SEED_TAG).rng();
            self.snapshot.seed = seed;
            self.snapshot.seed_generation += 1;
            self.snapshot.seed_start_frame = self.scheduler.phrase_start_frame(phrase_index);
        }
        self.snapshot.phrase_index = phrase_index;
        self.snapshot.phrase_frames = self.scheduler.phrase_length_frames();

        let phrase = self.scheduler.arm(phrase_index, &self.snapshot);
        self.publish_snapshot();
        self.trigger_sender.schedule(&phrase, from_frame)?;

        let scheduler = &self.scheduler;
        self.live_phrases
            .retain(|(index, _)| scheduler.phrase_start_frame(index + 1) > from_frame);
        self.live_phrases.push((phrase_index, self.snapshot.seed.clone()));
        Ok(())
    }

    /// Replace pending events of the given source after `at_frame` with its events of all
    /// live phrases, each generated from the seed it was armed with. A disabled source has
    /// no events, so this cancels it.
    fn restart_source(&mut self, source: SourceId, at_frame: u64) -> Result<(), Error> {
        let phrases = self
            .live_phrases
            .iter()
            .filter(|(index, _)| self.scheduler.phrase_start_frame(index + 1) > at_frame)
            .map(|(index, seed)| {
                let snapshot = EngineSnapshot {
                    seed: seed.clone(),
                    ..self.snapshot.clone()
                };
                self.scheduler.generate_phrase(*index, &snapshot)
            })
            .collect::<Vec<_>>();
        self.trigger_sender.replace(source, at_frame, &phrases)?;
        Ok(())
    }

    fn publish_snapshot(&mut self) {
        if self.snapshot_sender.send(self.snapshot.clone()) {
            log::debug!("Replaced a not yet consumed engine snapshot");
        }
    }
}

// -------------------------------------------------------------------------------------------------
