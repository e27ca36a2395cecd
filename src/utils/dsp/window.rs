//! Precomputed grain envelope windows.

// -------------------------------------------------------------------------------------------------

/// Precomputed Hann window, evaluated by normalized phase.
/// `N` must be a pow2 value.
pub struct HannWindow<const N: usize> {
    lut: [f32; N],
}

impl<const N: usize> HannWindow<N> {
    const _VERIFY_N: () = assert!(N.is_power_of_two(), "Window size must be a pow2 value");

    pub fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::_VERIFY_N;
        let mut lut = [0.0; N];
        for (i, value) in lut.iter_mut().enumerate() {
            // sample the closed window, so the last entry reaches zero again
            let phase = i as f32 / (N - 1) as f32;
            *value = 0.5 * (1.0 - (std::f32::consts::TAU * phase).cos());
        }
        Self { lut }
    }

    /// Evaluate the window at normalized phase `0.0..=1.0`, linearly interpolated.
    /// Phases out of range return silence.
    #[inline]
    pub fn sample(&self, phase: f32) -> f32 {
        if !(0.0..=1.0).contains(&phase) {
            return 0.0;
        }
        let index_float = phase * (N - 1) as f32;
        let index = (index_float as usize).min(N - 1);
        let fraction = index_float - index as f32;
        if index < N - 1 {
            self.lut[index] * (1.0 - fraction) + self.lut[index + 1] * fraction
        } else {
            self.lut[N - 1]
        }
    }
}

impl<const N: usize> Default for HannWindow<N> {
    fn default() -> Self {
        Self::new()
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hann_shape() {
        let window = HannWindow::<1024>::new();
        assert!(window.sample(0.0).abs() < 1e-6);
        assert!((window.sample(0.5) - 1.0).abs() < 1e-3);
        assert!(window.sample(1.0).abs() < 1e-6);
        assert!((window.sample(0.25) - 0.5).abs() < 1e-2);
        assert_eq!(window.sample(1.5), 0.0);
        assert_eq!(window.sample(f32::NAN), 0.0);
    }
}
