use assume::assume;
use rand::Rng;

// -------------------------------------------------------------------------------------------------

/// Stereo ring buffer which holds the recent input (plus grain feedback) grains read from.
///
/// The buffer starts out zeroed, so reading it before anything got written yields silence.
#[derive(Debug, Clone)]
pub struct CirculatingBuffer {
    frames: Vec<[f32; 2]>,
    write_index: usize,
    frames_written: u64,
}

impl CirculatingBuffer {
    /// Create a new zeroed buffer with the given length in frames (at least one frame).
    pub fn new(length: usize) -> Self {
        let frames = vec![[0.0; 2]; length.max(1)];
        Self {
            frames,
            write_index: 0,
            frames_written: 0,
        }
    }

    /// Create a new buffer holding the given amount of seconds.
    pub fn with_duration(sample_rate: u32, seconds: f32) -> Self {
        let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        Self::new((sample_rate as f32 * seconds).round() as usize)
    }

    /// Buffer length in frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames_written == 0
    }

    /// The index the next frame will be written to.
    pub fn write_index(&self) -> usize {
        self.write_index
    }

    /// Write a frame at the write index and advance it.
    #[inline]
    pub fn write_frame(&mut self, frame: [f32; 2]) {
        let len = self.frames.len();
        assume!(unsafe: self.write_index < len, "Write index is always wrapped");
        self.frames[self.write_index] = frame;
        self.write_index += 1;
        if self.write_index >= len {
            self.write_index = 0;
        }
        self.frames_written = self.frames_written.saturating_add(1);
    }

    /// Read a frame at a fractional position, linearly interpolated. Positions wrap
    /// around the buffer length in both directions.
    #[inline]
    pub fn read_frame(&self, position: f64) -> [f32; 2] {
        if self.frames_written == 0 || !position.is_finite() {
            return [0.0; 2];
        }
        let len = self.frames.len();
        let position = position.rem_euclid(len as f64);
        let index = (position as usize).min(len - 1);
        let fraction = (position - index as f64) as f32;
        let next = if index + 1 < len { index + 1 } else { 0 };
        assume!(unsafe: index < len && next < len);
        let a = self.frames[index];
        let b = self.frames[next];
        [
            a[0] + (b[0] - a[0]) * fraction,
            a[1] + (b[1] - a[1]) * fraction,
        ]
    }

    /// Fill the whole buffer with low level white noise, so grains have some initial
    /// material to play before any input arrived.
    pub fn fill_noise<R: Rng>(&mut self, rng: &mut R, level: f32) {
        for frame in self.frames.iter_mut() {
            *frame = [
                rng.random_range(-1.0..=1.0) * level,
                rng.random_range(-1.0..=1.0) * level,
            ];
        }
        self.frames_written = self.frames_written.max(self.frames.len() as u64);
    }

    /// Zero all frames and rewind.
    pub fn flush(&mut self) {
        self.frames.fill([0.0; 2]);
        self.write_index = 0;
        self.frames_written = 0;
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    use crate::seed::system_rng;

    #[test]
    fn read_write() {
        let mut buffer = CirculatingBuffer::new(4);
        assert!(buffer.is_empty());
        assert_eq!(buffer.read_frame(1.5), [0.0, 0.0]);

        for i in 0..4 {
            buffer.write_frame([i as f32, -(i as f32)]);
        }
        assert_eq!(buffer.write_index(), 0);
        assert_eq!(buffer.read_frame(1.0), [1.0, -1.0]);
        assert_eq!(buffer.read_frame(1.5), [1.5, -1.5]);
        // wraps from the last to the first frame
        assert_eq!(buffer.read_frame(3.5), [1.5, -1.5]);
        assert_eq!(buffer.read_frame(-1.0), [3.0, -3.0]);
        assert_eq!(buffer.read_frame(f64::NAN), [0.0, 0.0]);
    }

    #[test]
    fn noise_fill() {
        let mut buffer = CirculatingBuffer::with_duration(100, 1.0);
        assert_eq!(buffer.len(), 100);
        buffer.fill_noise(&mut system_rng(), 0.1);
        assert!(!buffer.is_empty());
        for i in 0..buffer.len() {
            let [l, r] = buffer.read_frame(i as f64);
            assert!(l.abs() <= 0.1 && r.abs() <= 0.1);
        }
        buffer.flush();
        assert_eq!(buffer.read_frame(10.0), [0.0, 0.0]);
    }
}
