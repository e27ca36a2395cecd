//! Delay buffers to delay or lookup signals.

use assume::assume;

// -------------------------------------------------------------------------------------------------

/// Mono delay line buffer with fractional delay time support.
///
/// The buffer is allocated once with a power of two size >= the max delay time, so reads
/// and writes wrap with a simple bit mask and never touch uninitialized memory.
#[derive(Debug, Default, Clone)]
pub struct DelayLine {
    buffer: Vec<f32>,
    buffer_mask: usize,
    write_pos: usize,
}

impl DelayLine {
    /// Create a new delay buffer with the given max delay time in sample frames.
    pub fn new(max_delay_frames: usize) -> Self {
        // one extra frame for the interpolation partner of the max delay read
        let buffer_frames = (max_delay_frames + 2).next_power_of_two();
        let buffer = vec![0.0; buffer_frames];
        let buffer_mask = buffer_frames - 1;
        let write_pos = 0;
        Self {
            buffer,
            buffer_mask,
            write_pos,
        }
    }

    /// Create a new delay buffer which can hold the given max delay time in milliseconds.
    pub fn with_max_delay_ms(sample_rate: u32, max_delay_ms: f32) -> Self {
        Self::new(ms_to_frames(sample_rate, max_delay_ms).ceil() as usize)
    }

    /// Max delay in frames which can be read with [`Self::read`].
    pub fn max_delay(&self) -> usize {
        self.buffer.len() - 2
    }

    /// Reset the delay buffer and write position.
    pub fn flush(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }

    /// Write a new sample and advance the write position.
    #[inline]
    pub fn write(&mut self, sample: f32) {
        assume!(unsafe: self.write_pos < self.buffer.len());
        self.buffer[self.write_pos] = sample;
        self.write_pos = (self.write_pos + 1) & self.buffer_mask;
    }

    /// Read a sample that got written `delay` frames ago (1 = most recent sample).
    /// Fractional delays are linearly interpolated. The delay is clamped to the buffer size.
    #[inline]
    pub fn read(&self, delay: f32) -> f32 {
        let delay = delay.clamp(1.0, self.max_delay() as f32);
        let delay_floor = delay.floor();
        let fraction = delay - delay_floor;
        let index1 = (self.write_pos + self.buffer.len() - delay_floor as usize) & self.buffer_mask;
        let index2 = (index1 + self.buffer.len() - 1) & self.buffer_mask;
        assume!(unsafe: index1 < self.buffer.len());
        assume!(unsafe: index2 < self.buffer.len());
        let val1 = self.buffer[index1];
        let val2 = self.buffer[index2];
        val1 + (val2 - val1) * fraction
    }

    /// Read a sample at an integer delay (1 = most recent sample).
    #[inline]
    pub fn read_frames(&self, delay: usize) -> f32 {
        let delay = delay.clamp(1, self.max_delay());
        let index = (self.write_pos + self.buffer.len() - delay) & self.buffer_mask;
        assume!(unsafe: index < self.buffer.len());
        self.buffer[index]
    }
}

// -------------------------------------------------------------------------------------------------

/// Convert a time in milliseconds to (fractional) sample frames.
#[inline]
pub fn ms_to_frames(sample_rate: u32, ms: f32) -> f32 {
    ms.max(0.0) * sample_rate as f32 / 1000.0
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_and_fractional_reads() {
        let mut delay = DelayLine::new(8);
        assert!(delay.max_delay() >= 8);
        for i in 1..=8 {
            delay.write(i as f32);
        }
        assert_eq!(delay.read_frames(1), 8.0);
        assert_eq!(delay.read_frames(3), 6.0);
        assert_eq!(delay.read(2.0), 7.0);
        assert!((delay.read(2.5) - 6.5).abs() < 1e-6);
    }

    #[test]
    fn unwritten_reads_are_silent() {
        let delay = DelayLine::with_max_delay_ms(48000, 10.0);
        assert_eq!(delay.read(100.0), 0.0);
        assert_eq!(delay.read(1e9), 0.0);
        assert_eq!(delay.read(-4.0), 0.0);
    }

    #[test]
    fn wraps_around() {
        let mut delay = DelayLine::new(4);
        for i in 0..100 {
            delay.write(i as f32);
        }
        assert_eq!(delay.read_frames(1), 99.0);
        assert_eq!(delay.read_frames(4), 96.0);
        delay.flush();
        assert_eq!(delay.read_frames(1), 0.0);
    }
}
