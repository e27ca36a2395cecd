//! Shared utilities: buffer helpers, DSP building blocks and real-time plumbing.

pub mod buffer;
pub mod dsp;
pub(crate) mod event;
pub mod snapshot;

// -------------------------------------------------------------------------------------------------

/// Level below which a signal is considered silent.
pub const SILENCE_DB: f32 = -60.0;

// -------------------------------------------------------------------------------------------------

/// Convert a decibel value to a linear gain.
pub fn db_to_linear(value: f32) -> f32 {
    (value * std::f32::consts::LN_10 / 20.0).exp()
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_conversion() {
        assert_eq!(db_to_linear(0.0), 1.0);
        assert!((db_to_linear(SILENCE_DB) - 0.001).abs() < 1e-6);
        assert!((db_to_linear(-6.0) - 0.501).abs() < 1e-3);
    }
}
