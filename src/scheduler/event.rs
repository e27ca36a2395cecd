use std::fmt;

use super::scale::Scale;

// -------------------------------------------------------------------------------------------------

/// Voice kinds the external voice layer provides.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::VariantNames,
)]
#[strum(ascii_case_insensitive)]
pub enum VoiceId {
    Pad,
    Lead,
    Pluck,
    Percussion,
}

// -------------------------------------------------------------------------------------------------

/// Generative source an event originates from. Cancellation operates per source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SourceId {
    /// Euclidean lane with the given lane index.
    Lane(usize),
    /// The free random melodic voice.
    Melodic,
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceId::Lane(index) => write!(f, "lane|{index}"),
            SourceId::Melodic => f.write_str("lead"),
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Per event randomized parameters, passed on to the voice layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventParameters {
    /// MIDI note number.
    pub note: u8,
    /// Velocity in range `0.0..=1.0`.
    pub velocity: f32,
    /// Free timbre control in range `0.0..=1.0`, interpreted by the voice.
    pub timbre: f32,
    /// Applied micro timing shift in frames.
    pub micro_timing: i32,
}

// -------------------------------------------------------------------------------------------------

/// A single event of a phrase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledEvent {
    /// Offset in sample frames from the phrase start.
    pub time_offset: u64,
    pub voice: VoiceId,
    pub parameters: EventParameters,
    pub source: SourceId,
    /// Index of the event within its source.
    pub index: usize,
}

// -------------------------------------------------------------------------------------------------

/// All events of one phrase, sorted by time offset.
#[derive(Debug, Clone, PartialEq)]
pub struct Phrase {
    /// Phrase index, counted from the engine start.
    pub index: u64,
    /// First sample frame of the phrase.
    pub start_frame: u64,
    /// Phrase length in sample frames.
    pub length_frames: u64,
    /// The scale all notes of this phrase are quantized to.
    pub scale: &'static Scale,
    pub events: Vec<ScheduledEvent>,
}

impl Phrase {
    /// Events of the given source only.
    pub fn events_of(&self, source: SourceId) -> impl Iterator<Item = &ScheduledEvent> {
        self.events.iter().filter(move |e| e.source == source)
    }
}
