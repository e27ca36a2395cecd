//! Equal-power panning.

use std::f32::consts::FRAC_PI_4;

// -------------------------------------------------------------------------------------------------

/// Precomputed equal-power pan law.
///
/// `angle = (pan + 1) * PI / 4`, `left = cos(angle)`, `right = sin(angle)`, so
/// `left^2 + right^2 == 1` for every pan position. `N` must be >= 2.
pub struct PanTable<const N: usize> {
    left: [f32; N],
    right: [f32; N],
}

impl<const N: usize> PanTable<N> {
    const _VERIFY_N: () = assert!(N >= 2, "Pan table needs at least two entries");

    pub fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::_VERIFY_N;
        let mut left = [0.0; N];
        let mut right = [0.0; N];
        #[allow(clippy::needless_range_loop)]
        for i in 0..N {
            let pan = Self::index_to_pan(i);
            let angle = (pan + 1.0) * FRAC_PI_4;
            left[i] = angle.cos();
            right[i] = angle.sin();
        }
        // pin exact values at the hard edges
        left[0] = 1.0;
        right[0] = 0.0;
        left[N - 1] = 0.0;
        right[N - 1] = 1.0;
        Self { left, right }
    }

    #[inline]
    fn index_to_pan(index: usize) -> f32 {
        index as f32 / (N - 1) as f32 * 2.0 - 1.0
    }

    /// Left and right gains for the given pan position in range `-1.0..=1.0`.
    /// Values out of range are clamped, NaN is treated as center.
    #[inline]
    pub fn gains(&self, pan: f32) -> (f32, f32) {
        let pan = if pan.is_nan() { 0.0 } else { pan.clamp(-1.0, 1.0) };
        let index = ((pan + 1.0) * 0.5 * (N - 1) as f32).round() as usize;
        let index = index.min(N - 1);
        (self.left[index], self.right[index])
    }
}

impl<const N: usize> Default for PanTable<N> {
    fn default() -> Self {
        Self::new()
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_power() {
        let table = PanTable::<1025>::new();

        let (l, r) = table.gains(0.0);
        assert!((l - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
        assert!((r - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);

        assert_eq!(table.gains(-1.0), (1.0, 0.0));
        assert_eq!(table.gains(1.0), (0.0, 1.0));

        for i in 0..=200 {
            let pan = i as f32 / 100.0 - 1.0;
            let (l, r) = table.gains(pan);
            assert!((l * l + r * r - 1.0).abs() < 1e-5, "pan {pan}");
        }

        assert_eq!(table.gains(5.0), table.gains(1.0));
        assert_eq!(table.gains(f32::NAN), table.gains(0.0));
    }
}
