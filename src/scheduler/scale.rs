//! Tension driven scale selection.

use std::ops::RangeInclusive;

use crate::seed::SeededRng;

// -------------------------------------------------------------------------------------------------

/// Pitch class of the shared scale root (E).
pub const ROOT_PITCH_CLASS: u8 = 4;

// -------------------------------------------------------------------------------------------------

/// Tension groups of the scale table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ScaleBand {
    Consonant,
    Color,
    High,
}

// -------------------------------------------------------------------------------------------------

/// A musical scale, rooted at E, with a tension rating.
#[derive(Debug, PartialEq)]
pub struct Scale {
    pub name: &'static str,
    /// Tension rating (0 = calm, 1 = very tense).
    pub tension: f32,
    pub band: ScaleBand,
    /// Semitone offsets from the root.
    pub intervals: &'static [u8],
}

impl Scale {
    /// True when the given MIDI note is part of the scale.
    pub fn contains(&self, note: u8) -> bool {
        let degree = ((note as u16 + 12 - ROOT_PITCH_CLASS as u16) % 12) as u8;
        self.intervals.contains(&degree)
    }

    /// All scale notes within the given note range, ascending.
    pub fn notes_in_range(&self, range: RangeInclusive<u8>) -> impl Iterator<Item = u8> + '_ {
        range.filter(|note| self.contains(*note))
    }

    /// Number of scale notes within the given note range.
    pub fn note_count_in_range(&self, range: RangeInclusive<u8>) -> usize {
        self.notes_in_range(range).count()
    }

    /// Pick a random scale note within the given range. `None` when no scale note is
    /// inside the range.
    pub fn pick_note(&self, range: RangeInclusive<u8>, rng: &mut SeededRng) -> Option<u8> {
        let count = self.note_count_in_range(range.clone());
        if count == 0 {
            return None;
        }
        let index = rng.next_int(0, count as i32 - 1) as usize;
        self.notes_in_range(range).nth(index)
    }
}

// -------------------------------------------------------------------------------------------------

/// All available scales, ordered by tension.
pub static SCALES: [Scale; 11] = [
    Scale {
        name: "E Major",
        tension: 0.00,
        band: ScaleBand::Consonant,
        intervals: &[0, 2, 4, 5, 7, 9, 11],
    },
    Scale {
        name: "E Major Pentatonic",
        tension: 0.03,
        band: ScaleBand::Consonant,
        intervals: &[0, 2, 4, 7, 9],
    },
    Scale {
        name: "E Lydian",
        tension: 0.10,
        band: ScaleBand::Consonant,
        intervals: &[0, 2, 4, 6, 7, 9, 11],
    },
    Scale {
        name: "E Mixolydian",
        tension: 0.18,
        band: ScaleBand::Consonant,
        intervals: &[0, 2, 4, 5, 7, 9, 10],
    },
    Scale {
        name: "E Minor Pentatonic",
        tension: 0.22,
        band: ScaleBand::Consonant,
        intervals: &[0, 3, 5, 7, 10],
    },
    Scale {
        name: "E Dorian",
        tension: 0.25,
        band: ScaleBand::Consonant,
        intervals: &[0, 2, 3, 5, 7, 9, 10],
    },
    Scale {
        name: "E Aeolian",
        tension: 0.35,
        band: ScaleBand::Color,
        intervals: &[0, 2, 3, 5, 7, 8, 10],
    },
    Scale {
        name: "E Harmonic Minor",
        tension: 0.50,
        band: ScaleBand::Color,
        intervals: &[0, 2, 3, 5, 7, 8, 11],
    },
    Scale {
        name: "E Melodic Minor",
        tension: 0.55,
        band: ScaleBand::Color,
        intervals: &[0, 2, 3, 5, 7, 9, 11],
    },
    Scale {
        name: "E Octatonic",
        tension: 0.85,
        band: ScaleBand::High,
        intervals: &[0, 2, 3, 5, 6, 8, 9, 11],
    },
    Scale {
        name: "E Phrygian Dominant",
        tension: 0.90,
        band: ScaleBand::High,
        intervals: &[0, 1, 4, 5, 7, 8, 10],
    },
];

// -------------------------------------------------------------------------------------------------

/// Scale bands which are selectable at the given tension.
fn bands_for_tension(tension: f32) -> &'static [ScaleBand] {
    if tension <= 0.25 {
        &[ScaleBand::Consonant]
    } else if tension <= 0.55 {
        &[ScaleBand::Consonant, ScaleBand::Color]
    } else if tension <= 0.80 {
        &[ScaleBand::Color, ScaleBand::High]
    } else {
        &[ScaleBand::High]
    }
}

/// Selectable scales and their normalized probabilities for the given tension.
/// Scales closer to the tension get a higher weight: `1 / (distance + 0.1)`.
pub fn scale_weights(tension: f32) -> Vec<(&'static Scale, f64)> {
    let tension = if tension.is_nan() { 0.0 } else { tension.clamp(0.0, 1.0) };
    let bands = bands_for_tension(tension);
    let mut weights = SCALES
        .iter()
        .filter(|scale| bands.contains(&scale.band))
        .map(|scale| (scale, 1.0 / ((scale.tension as f64 - tension as f64).abs() + 0.1)))
        .collect::<Vec<_>>();
    let total = weights.iter().map(|(_, weight)| weight).sum::<f64>();
    for (_, weight) in weights.iter_mut() {
        *weight /= total;
    }
    weights
}

/// Pick a scale for the given tension with a single draw from the given generator.
pub fn select_scale(tension: f32, rng: &mut SeededRng) -> &'static Scale {
    let weights = scale_weights(tension);
    let draw = rng.next();
    let mut accumulated = 0.0;
    for (scale, weight) in &weights {
        accumulated += weight;
        if draw < accumulated {
            return *scale;
        }
    }
    // float rounding: fall back to the last candidate
    weights.last().map_or(&SCALES[0], |(scale, _)| *scale)
}

// -------------------------------------------------------------------------------------------------
