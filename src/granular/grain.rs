use assume::assume;

use super::buffer::CirculatingBuffer;
use crate::utils::dsp::window::HannWindow;

// -------------------------------------------------------------------------------------------------

/// Size of the shared grain window LUT.
pub(crate) const GRAIN_WINDOW_SIZE: usize = 2048;

// -------------------------------------------------------------------------------------------------

/// Spawn properties of a single grain, as picked by the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrainSpawn {
    /// Start position in the circulating buffer in frames. May be fractional.
    pub read_position: f64,
    /// Grain length in frames. Must be > 0.
    pub length: usize,
    /// Playback rate (1.0 = original pitch).
    pub playback_rate: f64,
    /// Left channel pan gain.
    pub pan_left_gain: f32,
    /// Right channel pan gain.
    pub pan_right_gain: f32,
}

// -------------------------------------------------------------------------------------------------

/// A single grain slot in a [`GrainPool`].
#[derive(Debug, Clone, Copy)]
pub struct Grain {
    active: bool,
    read_position: f64,
    length: usize,
    elapsed: usize,
    playback_rate: f64,
    pan_left_gain: f32,
    pan_right_gain: f32,
}

impl Default for Grain {
    fn default() -> Self {
        Self::new()
    }
}

impl Grain {
    /// Create a new inactive grain.
    pub const fn new() -> Self {
        Self {
            active: false,
            read_position: 0.0,
            length: 0,
            elapsed: 0,
            playback_rate: 1.0,
            pan_left_gain: 0.0,
            pan_right_gain: 0.0,
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Grain length in frames.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Frames played so far.
    pub fn elapsed(&self) -> usize {
        self.elapsed
    }

    pub fn playback_rate(&self) -> f64 {
        self.playback_rate
    }

    /// Left and right pan gains.
    pub fn pan_gains(&self) -> (f32, f32) {
        (self.pan_left_gain, self.pan_right_gain)
    }

    fn activate(&mut self, spawn: &GrainSpawn) {
        debug_assert!(spawn.length > 0, "Grains should never have a zero length");
        self.active = true;
        self.read_position = spawn.read_position;
        self.length = spawn.length.max(1);
        self.elapsed = 0;
        self.playback_rate = spawn.playback_rate;
        self.pan_left_gain = spawn.pan_left_gain;
        self.pan_right_gain = spawn.pan_right_gain;
    }

    fn deactivate(&mut self) {
        self.active = false;
        self.elapsed = 0;
    }

    /// Render one frame of this grain and advance. Returns the panned (left, right) output.
    #[inline]
    fn process(
        &mut self,
        buffer: &CirculatingBuffer,
        window: &HannWindow<GRAIN_WINDOW_SIZE>,
    ) -> (f32, f32) {
        debug_assert!(self.active, "Should only process active grains");
        assume!(unsafe: self.length > 0, "Grain length is asserted in activate");

        let phase = self.elapsed as f32 / self.length as f32;
        let envelope = window.sample(phase);
        let position = self.read_position + self.elapsed as f64 * self.playback_rate;
        let [left, right] = buffer.read_frame(position);
        let sample = (left + right) * 0.5 * envelope;

        self.elapsed += 1;
        if self.elapsed >= self.length {
            self.deactivate();
        }
        (sample * self.pan_left_gain, sample * self.pan_right_gain)
    }
}

// -------------------------------------------------------------------------------------------------

/// Fixed size pool of grains. Spawning and mixing never allocates.
///
/// The number of simultaneously active grains never exceeds `min(max_grains, POOL_SIZE)`.
#[derive(Debug, Clone)]
pub struct GrainPool<const POOL_SIZE: usize> {
    grains: [Grain; POOL_SIZE],
    max_grains: usize,
    active_count: usize,
}

impl<const POOL_SIZE: usize> Default for GrainPool<POOL_SIZE> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const POOL_SIZE: usize> GrainPool<POOL_SIZE> {
    /// Create a new pool with all grains inactive and `max_grains` set to the pool size.
    pub fn new() -> Self {
        Self {
            grains: [Grain::new(); POOL_SIZE],
            max_grains: POOL_SIZE,
            active_count: 0,
        }
    }

    /// Number of grain slots.
    pub const fn capacity(&self) -> usize {
        POOL_SIZE
    }

    pub fn max_grains(&self) -> usize {
        self.max_grains
    }

    /// Number of currently playing grains.
    pub fn active_count(&self) -> usize {
        self.active_count
    }

    /// Limit the number of simultaneously active grains. Values above the pool size are
    /// clamped. Grains exceeding the new limit are stopped, starting with the highest slots.
    pub fn set_max_grains(&mut self, max_grains: usize) {
        self.max_grains = max_grains.min(POOL_SIZE);
        for grain in self.grains.iter_mut().rev() {
            if self.active_count <= self.max_grains {
                break;
            }
            if grain.is_active() {
                grain.deactivate();
                self.active_count -= 1;
            }
        }
    }

    /// Activate a grain in the first free slot. Returns the slot index, or None when the
    /// pool is full or the spawn has a zero length.
    pub fn spawn(&mut self, spawn: &GrainSpawn) -> Option<usize> {
        if spawn.length == 0 || self.active_count >= self.max_grains {
            return None;
        }
        let index = self.grains.iter().position(|g| !g.is_active())?;
        self.grains[index].activate(spawn);
        self.active_count += 1;
        Some(index)
    }

    /// Call the given function for all active grains with their slot index.
    pub fn for_each_active<F: FnMut(usize, &Grain)>(&self, mut f: F) {
        for (index, grain) in self.grains.iter().enumerate() {
            if grain.is_active() {
                f(index, grain);
            }
        }
    }

    /// Render one frame of all active grains, summed into a (left, right) pair.
    pub fn process_frame(
        &mut self,
        buffer: &CirculatingBuffer,
        window: &HannWindow<GRAIN_WINDOW_SIZE>,
    ) -> (f32, f32) {
        let mut wet_left = 0.0;
        let mut wet_right = 0.0;
        if self.active_count == 0 {
            return (wet_left, wet_right);
        }
        for grain in self.grains.iter_mut() {
            if grain.is_active() {
                let (left, right) = grain.process(buffer, window);
                wet_left += left;
                wet_right += right;
                if !grain.is_active() {
                    self.active_count -= 1;
                }
            }
        }
        (wet_left, wet_right)
    }

    /// Stop all grains.
    pub fn clear(&mut self) {
        for grain in self.grains.iter_mut() {
            grain.deactivate();
        }
        self.active_count = 0;
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn(length: usize) -> GrainSpawn {
        GrainSpawn {
            read_position: 0.0,
            length,
            playback_rate: 1.0,
            pan_left_gain: std::f32::consts::FRAC_1_SQRT_2,
            pan_right_gain: std::f32::consts::FRAC_1_SQRT_2,
        }
    }

    #[test]
    fn spawn_respects_limits() {
        let mut pool = GrainPool::<8>::new();
        pool.set_max_grains(100);
        assert_eq!(pool.max_grains(), 8);

        for i in 0..8 {
            assert_eq!(pool.spawn(&spawn(100)), Some(i));
        }
        assert_eq!(pool.spawn(&spawn(100)), None);
        assert_eq!(pool.active_count(), 8);

        pool.clear();
        assert_eq!(pool.active_count(), 0);
        assert_eq!(pool.spawn(&spawn(0)), None);

        pool.set_max_grains(0);
        assert_eq!(pool.spawn(&spawn(100)), None);
    }

    #[test]
    fn lowering_max_grains_stops_highest_slots() {
        let mut pool = GrainPool::<16>::new();
        for _ in 0..10 {
            pool.spawn(&spawn(100));
        }
        pool.set_max_grains(4);
        assert_eq!(pool.active_count(), 4);

        let mut active = Vec::new();
        pool.for_each_active(|index, grain| {
            assert_eq!(grain.length(), 100);
            active.push(index);
        });
        assert_eq!(active, vec![0, 1, 2, 3]);

        // spawning is blocked until grains finish
        assert_eq!(pool.spawn(&spawn(100)), None);
    }

    #[test]
    fn grains_finish_after_their_length() {
        let buffer = CirculatingBuffer::new(64);
        let window = HannWindow::<GRAIN_WINDOW_SIZE>::new();
        let mut pool = GrainPool::<4>::new();
        pool.spawn(&spawn(3));
        pool.spawn(&spawn(5));
        for _ in 0..3 {
            pool.process_frame(&buffer, &window);
        }
        assert_eq!(pool.active_count(), 1);
        for _ in 0..2 {
            pool.process_frame(&buffer, &window);
        }
        assert_eq!(pool.active_count(), 0);
    }
}
