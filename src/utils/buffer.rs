//! Interleaved buffer helpers.

// -------------------------------------------------------------------------------------------------

/// Frame based views into interleaved sample buffers.
pub trait InterleavedBufferMut {
    /// Iterate over all complete frames of the buffer as fixed size arrays.
    /// Incomplete trailing samples are skipped.
    fn frames_mut<const CHANNELS: usize>(&mut self) -> impl Iterator<Item = &mut [f32; CHANNELS]>;
}

impl InterleavedBufferMut for [f32] {
    fn frames_mut<const CHANNELS: usize>(&mut self) -> impl Iterator<Item = &mut [f32; CHANNELS]> {
        self.chunks_exact_mut(CHANNELS)
            .filter_map(|frame| <&mut [f32; CHANNELS]>::try_from(frame).ok())
    }
}

// -------------------------------------------------------------------------------------------------

/// Fill the given buffer with silence.
#[inline]
pub fn clear_buffer(buffer: &mut [f32]) {
    buffer.fill(0.0);
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames() {
        let mut buffer = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let frames = buffer.frames_mut::<2>().map(|f| *f).collect::<Vec<_>>();
        assert_eq!(frames, vec![[1.0, 2.0], [3.0, 4.0]]);

        for frame in buffer.frames_mut::<2>() {
            frame.swap(0, 1);
        }
        assert_eq!(buffer, vec![2.0, 1.0, 4.0, 3.0, 5.0]);

        clear_buffer(&mut buffer);
        assert_eq!(buffer, vec![0.0; 5]);
    }
}
