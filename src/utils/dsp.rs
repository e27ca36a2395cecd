//! Common, shared DSP tools for the granular engine and reverb.

pub mod allpass;
pub mod delay;
pub mod filters;
pub mod lfo;
pub mod pan;
pub mod window;

// -------------------------------------------------------------------------------------------------

/// Smooth `tanh` saturation, bounded to `-1.0..=1.0`.
#[inline]
pub fn soft_clip(sample: f32) -> f32 {
    sample.tanh()
}

/// Replace NaN or infinite samples with silence.
#[inline]
pub fn sanitize(sample: f32) -> f32 {
    if sample.is_finite() {
        sample
    } else {
        0.0
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clipping() {
        assert_eq!(soft_clip(0.0), 0.0);
        assert!(soft_clip(1000.0) <= 1.0);
        assert!(soft_clip(-1000.0) >= -1.0);
        assert_eq!(sanitize(f32::NAN), 0.0);
        assert_eq!(sanitize(f32::INFINITY), 0.0);
        assert_eq!(sanitize(0.5), 0.5);
    }
}
