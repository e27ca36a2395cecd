//! Euclidean rhythm patterns.

// -------------------------------------------------------------------------------------------------

/// Build a Euclidean rhythm with `hits` evenly distributed over `steps`.
///
/// Hit `i` lands on step `round(i * steps / hits)`, rounding halves up. The pattern is then
/// rotated left by `rotation mod steps` steps. `hits == 0` gives no hits, `hits >= steps`
/// hits every step and `steps == 0` an empty pattern.
pub fn euclidean_pattern(steps: usize, hits: usize, rotation: usize) -> Vec<bool> {
    if steps == 0 {
        return Vec::new();
    }
    if hits >= steps {
        return vec![true; steps];
    }
    let mut pattern = vec![false; steps];
    for i in 0..hits {
        pattern[(2 * i * steps + hits) / (2 * hits)] = true;
    }
    pattern.rotate_left(rotation % steps);
    pattern
}

/// Frame offsets of all hits of the pattern, repeated for `ceil(tempo)` cycles of
/// `phrase_frames / tempo` frames each. Hits falling behind the phrase end are skipped.
pub fn pattern_hit_offsets(pattern: &[bool], tempo: f64, phrase_frames: u64) -> Vec<u64> {
    if pattern.is_empty() || !(tempo.is_finite() && tempo > 0.0) || phrase_frames == 0 {
        return Vec::new();
    }
    let steps = pattern.len() as f64;
    let cycles = tempo.ceil() as u64;
    let cycle_frames = phrase_frames as f64 / tempo;
    let mut offsets = Vec::new();
    for cycle in 0..cycles {
        for (step, _) in pattern.iter().enumerate().filter(|(_, hit)| **hit) {
            let offset = ((cycle as f64 + step as f64 / steps) * cycle_frames).floor() as u64;
            if offset < phrase_frames {
                offsets.push(offset);
            }
        }
    }
    offsets
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn hit_indices(pattern: &[bool]) -> Vec<usize> {
        pattern
            .iter()
            .enumerate()
            .filter_map(|(i, hit)| hit.then_some(i))
            .collect()
    }

    #[test]
    fn patterns() {
        assert_eq!(hit_indices(&euclidean_pattern(8, 3, 0)), vec![0, 3, 5]);
        assert_eq!(hit_indices(&euclidean_pattern(8, 3, 1)), vec![2, 4, 7]);
        assert_eq!(hit_indices(&euclidean_pattern(8, 3, 9)), vec![2, 4, 7]);
        assert_eq!(hit_indices(&euclidean_pattern(16, 4, 0)), vec![0, 4, 8, 12]);
        // halves round up
        assert_eq!(hit_indices(&euclidean_pattern(6, 4, 0)), vec![0, 2, 3, 5]);
        assert_eq!(hit_indices(&euclidean_pattern(5, 2, 0)), vec![0, 3]);
        assert_eq!(euclidean_pattern(8, 0, 3), vec![false; 8]);
        assert_eq!(euclidean_pattern(8, 8, 0), vec![true; 8]);
        assert_eq!(euclidean_pattern(8, 12, 0), vec![true; 8]);
        assert!(euclidean_pattern(0, 3, 1).is_empty());
    }

    #[test]
    fn hit_offsets() {
        let pattern = euclidean_pattern(4, 2, 0);
        assert_eq!(
            pattern_hit_offsets(&pattern, 2.0, 800),
            vec![0, 200, 400, 600]
        );
        // partial last cycle
        assert_eq!(pattern_hit_offsets(&pattern, 1.5, 900), vec![0, 300, 600]);
        assert!(pattern_hit_offsets(&pattern, 0.0, 900).is_empty());
        assert!(pattern_hit_offsets(&[], 1.0, 900).is_empty());
    }
}
