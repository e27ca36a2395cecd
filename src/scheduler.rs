//! Deterministic phrase scheduling.
//!
//! The [`PhraseScheduler`] runs in the control thread and computes all events of a phrase
//! up front, using only the phrase's [`SeedMaterial`] and index. The resulting [`Phrase`] is
//! handed to the render thread through the [`trigger`] queue, which fires the events
//! frame-accurately and handles cancellation.

use crate::{
    engine::EngineSnapshot,
    seed::{SeedMaterial, SeededRng},
    Error,
};

// -------------------------------------------------------------------------------------------------

mod config;
mod euclidean;
mod event;
mod scale;
pub mod trigger;

pub use config::{EuclideanLane, MelodicLane, SchedulerConfig, MAX_LANES};
pub use euclidean::{euclidean_pattern, pattern_hit_offsets};
pub use event::{EventParameters, Phrase, ScheduledEvent, SourceId, VoiceId};
pub use scale::{scale_weights, select_scale, Scale, ScaleBand, SCALES};

// -------------------------------------------------------------------------------------------------

/// Max random micro timing shift of events.
const MICRO_TIMING_MS: f64 = 8.0;

// -------------------------------------------------------------------------------------------------

/// Scheduler states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerState {
    /// No phrase scheduled.
    #[default]
    Idle,
    /// Events of the given phrase are published.
    Armed { phrase_index: u64 },
}

// -------------------------------------------------------------------------------------------------

/// Generates whole phrases of events from a seed and a [`SchedulerConfig`].
pub struct PhraseScheduler {
    config: SchedulerConfig,
    sample_rate: u32,
    state: SchedulerState,
}

impl PhraseScheduler {
    /// Create a new idle scheduler. Invalid config values get clamped.
    pub fn new(config: SchedulerConfig, sample_rate: u32) -> Result<Self, Error> {
        if sample_rate == 0 {
            return Err(Error::SampleRateError(sample_rate));
        }
        if let Err(err) = config.validate() {
            log::warn!("Clamping invalid scheduler config: {err}");
        }
        Ok(Self {
            config: config.clamped(),
            sample_rate,
            state: SchedulerState::Idle,
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Phrase length in sample frames.
    pub fn phrase_length_frames(&self) -> u64 {
        ((self.config.phrase_seconds as f64 * self.sample_rate as f64).round() as u64).max(1)
    }

    /// Index of the phrase which contains the given frame.
    pub fn phrase_index_at(&self, elapsed_frames: u64) -> u64 {
        elapsed_frames / self.phrase_length_frames()
    }

    /// First frame of the given phrase.
    pub fn phrase_start_frame(&self, phrase_index: u64) -> u64 {
        phrase_index.saturating_mul(self.phrase_length_frames())
    }

    /// Generate all events of the given phrase. This is a pure function of the config,
    /// the snapshot's seed and the phrase index: calling it twice gives identical phrases.
    pub fn generate_phrase(&self, phrase_index: u64, snapshot: &EngineSnapshot) -> Phrase {
        let length_frames = self.phrase_length_frames();
        let seed = &snapshot.seed;

        let scale = select_scale(
            self.config.tension,
            &mut seed.with_tag("scale").with_index(phrase_index).rng(),
        );

        let mut events = Vec::new();
        if self.config.enabled {
            let phrase_seed = seed.with_tag("phrase").with_index(phrase_index);
            for (lane_index, lane) in self.config.lanes.iter().enumerate() {
                if lane.enabled {
                    self.generate_lane_events(
                        &mut events,
                        lane_index,
                        lane,
                        &phrase_seed,
                        scale,
                        length_frames,
                    );
                }
            }
            if self.config.melodic.enabled {
                self.generate_melodic_events(&mut events, phrase_index, seed, scale, length_frames);
            }
        }
        events.sort_by(|a, b| {
            a.time_offset
                .cmp(&b.time_offset)
                .then(a.source.cmp(&b.source))
                .then(a.index.cmp(&b.index))
        });

        Phrase {
            index: phrase_index,
            start_frame: self.phrase_start_frame(phrase_index),
            length_frames,
            scale,
            events,
        }
    }

    /// Enter the armed state for the given phrase and return its events.
    pub fn arm(&mut self, phrase_index: u64, snapshot: &EngineSnapshot) -> Phrase {
        let phrase = self.generate_phrase(phrase_index, snapshot);
        log::debug!(
            "Armed phrase {} in '{}' with {} events",
            phrase_index,
            phrase.scale.name,
            phrase.events.len()
        );
        self.state = SchedulerState::Armed { phrase_index };
        phrase
    }

    /// Return to the idle state.
    pub fn disarm(&mut self) {
        self.state = SchedulerState::Idle;
    }

    /// Enable or disable a lane. Returns the affected source when the state changed, so
    /// its pending events can be cancelled.
    pub fn set_lane_enabled(&mut self, lane_index: usize, enabled: bool) -> Option<SourceId> {
        let lane = self.config.lanes.get_mut(lane_index)?;
        if lane.enabled == enabled {
            return None;
        }
        lane.enabled = enabled;
        Some(SourceId::Lane(lane_index))
    }

    /// Enable or disable the melodic voice. Returns the affected source when changed.
    pub fn set_melodic_enabled(&mut self, enabled: bool) -> Option<SourceId> {
        if self.config.melodic.enabled == enabled {
            return None;
        }
        self.config.melodic.enabled = enabled;
        Some(SourceId::Melodic)
    }

    /// Apply a new config. Returns all sources whose structure changed.
    pub fn set_config(&mut self, config: SchedulerConfig) -> Vec<SourceId> {
        let config = config.clamped();
        let all_sources = |config: &SchedulerConfig| {
            (0..config.lanes.len())
                .map(SourceId::Lane)
                .chain(std::iter::once(SourceId::Melodic))
                .collect::<Vec<_>>()
        };
        let changed = if config.enabled != self.config.enabled
            || config.phrase_seconds != self.config.phrase_seconds
            || config.tempo != self.config.tempo
            || config.tension != self.config.tension
            || config.seed_bucket != self.config.seed_bucket
        {
            let mut sources = all_sources(&self.config);
            sources.extend(all_sources(&config));
            sources.sort();
            sources.dedup();
            sources
        } else {
            let lane_count = config.lanes.len().max(self.config.lanes.len());
            let mut sources = (0..lane_count)
                .filter(|index| {
                    match (self.config.lanes.get(*index), config.lanes.get(*index)) {
                        (Some(old), Some(new)) => {
                            old.enabled != new.enabled || old.shape_differs(new)
                        }
                        _ => true,
                    }
                })
                .map(SourceId::Lane)
                .collect::<Vec<_>>();
            if config.melodic != self.config.melodic {
                sources.push(SourceId::Melodic);
            }
            sources
        };
        self.config = config;
        changed
    }

    fn generate_lane_events(
        &self,
        events: &mut Vec<ScheduledEvent>,
        lane_index: usize,
        lane: &EuclideanLane,
        phrase_seed: &SeedMaterial,
        scale: &Scale,
        length_frames: u64,
    ) {
        let lane_seed = phrase_seed.with_tag("lane").with_index(lane_index);
        let mut rng = lane_seed.rng();
        let pattern = euclidean_pattern(lane.steps, lane.hits, lane.rotation);
        let offsets = pattern_hit_offsets(&pattern, self.config.tempo as f64, length_frames);
        for (index, offset) in offsets.into_iter().enumerate() {
            // one gate draw per hit, so gates never shift the master sequence
            if !rng.chance(lane.probability as f64) {
                continue;
            }
            let mut local = lane_seed.with_index(index).rng();
            if let Some((parameters, time_offset)) = self.event_parameters(
                &mut local,
                scale,
                lane.note_range.clone(),
                lane.velocity_range.clone(),
                offset,
                length_frames,
            ) {
                events.push(ScheduledEvent {
                    time_offset,
                    voice: lane.voice,
                    parameters,
                    source: SourceId::Lane(lane_index),
                    index,
                });
            }
        }
    }

    fn generate_melodic_events(
        &self,
        events: &mut Vec<ScheduledEvent>,
        phrase_index: u64,
        seed: &SeedMaterial,
        scale: &Scale,
        length_frames: u64,
    ) {
        let melodic = &self.config.melodic;
        let lead_seed = seed.with_tag("lead").with_index(phrase_index);
        let mut rng = lead_seed.rng();
        for index in 0..melodic.note_count {
            let offset = (rng.next() * length_frames as f64) as u64;
            let mut local = lead_seed.with_index(index).rng();
            if let Some((parameters, time_offset)) = self.event_parameters(
                &mut local,
                scale,
                melodic.note_range.clone(),
                melodic.velocity_range.clone(),
                offset,
                length_frames,
            ) {
                events.push(ScheduledEvent {
                    time_offset,
                    voice: melodic.voice,
                    parameters,
                    source: SourceId::Melodic,
                    index,
                });
            }
        }
    }

    /// Draw per event parameters from the event's local generator. Returns `None` when the
    /// note range contains no scale notes.
    fn event_parameters(
        &self,
        rng: &mut SeededRng,
        scale: &Scale,
        note_range: std::ops::RangeInclusive<u8>,
        velocity_range: std::ops::RangeInclusive<f32>,
        offset: u64,
        length_frames: u64,
    ) -> Option<(EventParameters, u64)> {
        let note = scale.pick_note(note_range, rng)?;
        let velocity =
            rng.next_range(*velocity_range.start() as f64, *velocity_range.end() as f64) as f32;
        let timbre = rng.next() as f32;
        let max_shift = MICRO_TIMING_MS * self.sample_rate as f64 / 1000.0;
        let micro_timing = rng.next_range(-max_shift, max_shift).round() as i32;
        let time_offset = (offset as i64 + micro_timing as i64).clamp(0, length_frames as i64 - 1);
        Some((
            EventParameters {
                note,
                velocity,
                timbre,
                micro_timing,
            },
            time_offset as u64,
        ))
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: u32 = 48000;

    fn snapshot() -> EngineSnapshot {
        EngineSnapshot::with_seed(SeedMaterial::new("h480000", "0badf00d"))
    }

    fn single_lane_config(lane: EuclideanLane) -> SchedulerConfig {
        SchedulerConfig::new()
            .with_lanes(vec![lane])
            .with_melodic(MelodicLane {
                enabled: false,
                ..Default::default()
            })
    }

    #[test]
    fn phrase_generation_is_idempotent() {
        let scheduler = PhraseScheduler::new(SchedulerConfig::default(), SAMPLE_RATE).unwrap();
        let snapshot = snapshot();
        let first = scheduler.generate_phrase(3, &snapshot);
        let second = scheduler.generate_phrase(3, &snapshot);
        assert_eq!(first, second);
        assert!(!first.events.is_empty());

        let other = scheduler.generate_phrase(4, &snapshot);
        assert_ne!(first.events, other.events);
        assert_eq!(other.start_frame, 4 * 16 * SAMPLE_RATE as u64);
    }

    #[test]
    fn events_are_sorted_and_inside_the_phrase() {
        let scheduler = PhraseScheduler::new(SchedulerConfig::default(), SAMPLE_RATE).unwrap();
        let phrase = scheduler.generate_phrase(0, &snapshot());
        assert!(phrase
            .events
            .windows(2)
            .all(|w| w[0].time_offset <= w[1].time_offset));
        for event in &phrase.events {
            assert!(event.time_offset < phrase.length_frames);
            assert!(phrase.scale.contains(event.parameters.note));
            assert!((0.0..=1.0).contains(&event.parameters.velocity));
        }
        assert_eq!(
            phrase.events_of(SourceId::Melodic).count(),
            scheduler.config().melodic.note_count
        );
    }

    #[test]
    fn lane_hits() {
        let lane = EuclideanLane::new(VoiceId::Pluck, 8, 3).with_probability(1.0);
        let scheduler =
            PhraseScheduler::new(single_lane_config(lane).with_tempo(4.0), SAMPLE_RATE).unwrap();
        let phrase = scheduler.generate_phrase(0, &snapshot());
        assert_eq!(phrase.events.len(), 12);
        assert!(phrase.events.iter().all(|e| e.voice == VoiceId::Pluck));
    }

    #[test]
    fn empty_note_set_is_skipped() {
        // F is not part of any low tension scale
        let lane = EuclideanLane::new(VoiceId::Pad, 4, 4).with_note_range(41..=41);
        let scheduler =
            PhraseScheduler::new(single_lane_config(lane).with_tension(0.0), SAMPLE_RATE)
                .unwrap();
        let phrase = scheduler.generate_phrase(0, &snapshot());
        assert!(phrase.events.is_empty());
    }

    #[test]
    fn disabled_scheduler_is_silent() {
        let mut config = SchedulerConfig::default();
        config.enabled = false;
        let scheduler = PhraseScheduler::new(config, SAMPLE_RATE).unwrap();
        assert!(scheduler.generate_phrase(1, &snapshot()).events.is_empty());
    }

    #[test]
    fn state_and_structure_changes() {
        let mut scheduler = PhraseScheduler::new(SchedulerConfig::default(), SAMPLE_RATE).unwrap();
        assert!(PhraseScheduler::new(SchedulerConfig::default(), 0).is_err());
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        let phrase_frames = scheduler.phrase_length_frames();
        assert_eq!(scheduler.phrase_index_at(phrase_frames * 2 + 10), 2);

        let phrase = scheduler.arm(2, &snapshot());
        assert_eq!(phrase.index, 2);
        assert_eq!(scheduler.state(), SchedulerState::Armed { phrase_index: 2 });
        scheduler.disarm();
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        assert_eq!(scheduler.set_lane_enabled(1, false), Some(SourceId::Lane(1)));
        assert_eq!(scheduler.set_lane_enabled(1, false), None);
        assert_eq!(scheduler.set_lane_enabled(42, false), None);
        assert!(scheduler
            .generate_phrase(0, &snapshot())
            .events_of(SourceId::Lane(1))
            .next()
            .is_none());
        assert_eq!(scheduler.set_melodic_enabled(false), Some(SourceId::Melodic));

        let mut config = scheduler.config().clone();
        config.lanes[0].rotation = 3;
        config.lanes[2].probability = 0.1;
        assert_eq!(scheduler.set_config(config), vec![SourceId::Lane(0)]);

        let config = scheduler.config().clone().with_tempo(2.0);
        assert_eq!(scheduler.set_config(config).len(), 4);
    }
}
