//! Deterministic, seedable random streams for all musical decisions.
//!
//! Everything that must sound the same for the same seed flows through [`SeededRng`]: a
//! mulberry32 generator whose 32-bit state is derived from the seed bytes with an xmur3
//! string hash. Both algorithms only use wrapping 32-bit integer math, so a sequence is
//! bit-identical across platforms and across implementations in other languages.
//!
//! Randomness which intentionally is *not* reproducible (e.g. noise used to pre-fill the
//! granular buffer) uses [`system_rng`] instead.

use std::{fmt, sync::Arc};

use rand::{rngs::SmallRng, RngCore, SeedableRng};

// -------------------------------------------------------------------------------------------------

/// Generator state used when no or empty seed material is given.
pub const DEFAULT_SEED_STATE: u32 = 0x9E37_79B9;

// -------------------------------------------------------------------------------------------------

/// Coarse wall-clock window used as the time component of a [`SeedMaterial`].
#[derive(
    Debug,
    Default,
    Copy,
    Clone,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::VariantNames,
)]
#[strum(ascii_case_insensitive)]
pub enum SeedBucket {
    Minute,
    #[default]
    Hour,
    Day,
}

impl SeedBucket {
    /// Length of the bucket window in seconds.
    pub const fn window_seconds(&self) -> u64 {
        match self {
            SeedBucket::Minute => 60,
            SeedBucket::Hour => 60 * 60,
            SeedBucket::Day => 24 * 60 * 60,
        }
    }

    /// Bucket key for the given unix time in seconds.
    ///
    /// The time is passed in by the caller: the core never reads the system clock itself.
    pub fn key(&self, unix_seconds: u64) -> String {
        let prefix = match self {
            SeedBucket::Minute => 'm',
            SeedBucket::Hour => 'h',
            SeedBucket::Day => 'd',
        };
        format!("{prefix}{}", unix_seconds / self.window_seconds())
    }
}

// -------------------------------------------------------------------------------------------------

/// Immutable seed string: `time bucket | parameter hash | purpose tag...`.
///
/// Cloning is cheap. Derived materials are built with [`with_tag`](Self::with_tag) and
/// [`with_index`](Self::with_index), which append `|tag` segments.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SeedMaterial(Arc<str>);

impl SeedMaterial {
    /// Create seed material from a time bucket key and a parameter hash.
    pub fn new(bucket_key: &str, parameter_hash: &str) -> Self {
        Self(Arc::from(format!("{bucket_key}|{parameter_hash}")))
    }

    /// Wrap an externally assembled seed string as is.
    pub fn from_raw(seed: impl Into<String>) -> Self {
        Self(Arc::from(seed.into()))
    }

    /// Derive new material with the given purpose tag appended.
    pub fn with_tag(&self, tag: &str) -> Self {
        Self(Arc::from(format!("{}|{tag}", self.0)))
    }

    /// Derive new material with the given index appended.
    pub fn with_index(&self, index: impl fmt::Display) -> Self {
        Self(Arc::from(format!("{}|{index}", self.0)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Create a fresh generator for this material.
    pub fn rng(&self) -> SeededRng {
        SeededRng::new(self)
    }
}

impl Default for SeedMaterial {
    fn default() -> Self {
        Self(Arc::from(""))
    }
}

impl fmt::Debug for SeedMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SeedMaterial").field(&&*self.0).finish()
    }
}

impl fmt::Display for SeedMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// -------------------------------------------------------------------------------------------------

/// xmur3 string hash. Returns the first 32-bit value of the hash stream.
pub fn hash_bytes(bytes: &[u8]) -> u32 {
    let mut h = 1_779_033_703_u32 ^ (bytes.len() as u32);
    for &byte in bytes {
        h = (h ^ byte as u32).wrapping_mul(3_432_918_353);
        h = h.rotate_left(13);
    }
    h = (h ^ (h >> 16)).wrapping_mul(2_246_822_507);
    h = (h ^ (h >> 13)).wrapping_mul(3_266_489_909);
    h ^ (h >> 16)
}

/// Hash a set of continuous parameter values into a short, stable hex string.
///
/// Values are quantized to three decimals first, so tiny float noise from UIs does not
/// change the seed.
pub fn parameter_hash(values: &[f32]) -> String {
    let quantized = values
        .iter()
        .map(|v| {
            let v = if v.is_finite() { *v } else { 0.0 };
            format!("{v:.3}")
        })
        .collect::<Vec<_>>()
        .join(",");
    format!("{:08x}", hash_bytes(quantized.as_bytes()))
}

// -------------------------------------------------------------------------------------------------

/// Deterministic mulberry32 random number generator.
///
/// Construct a new instance for every [`SeedMaterial`]: generators must not be shared
/// between unrelated musical dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeededRng {
    state: u32,
}

impl SeededRng {
    /// Create a generator from seed material.
    pub fn new(seed: &SeedMaterial) -> Self {
        Self::from_bytes(seed.as_bytes())
    }

    /// Create a generator from raw seed bytes. Empty bytes give the default generator.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        if bytes.is_empty() {
            Self::from_state(DEFAULT_SEED_STATE)
        } else {
            Self::from_state(hash_bytes(bytes))
        }
    }

    /// Create a generator from a raw 32-bit state.
    pub const fn from_state(state: u32) -> Self {
        Self { state }
    }

    /// Advance the state and return the next raw 32-bit value.
    #[inline]
    pub fn next_raw(&mut self) -> u32 {
        self.state = self.state.wrapping_add(0x6D2B_79F5);
        let mut t = self.state;
        t = (t ^ (t >> 15)).wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        t ^ (t >> 14)
    }

    /// Next value in range `[0, 1)`.
    #[inline]
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> f64 {
        self.next_raw() as f64 / 4_294_967_296.0
    }

    /// Uniform value in range `[min, max)`.
    #[inline]
    pub fn next_range(&mut self, min: f64, max: f64) -> f64 {
        min + (max - min) * self.next()
    }

    /// Uniform integer in the inclusive range `[min, max]`. Swapped bounds are accepted.
    pub fn next_int(&mut self, min: i32, max: i32) -> i32 {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        let span = (max as i64 - min as i64 + 1) as f64;
        (min as i64 + (self.next() * span).floor() as i64).min(max as i64) as i32
    }

    /// Probability gate: true when the next draw is `<= probability`.
    #[inline]
    pub fn chance(&mut self, probability: f64) -> bool {
        self.next() <= probability
    }

    /// Pick a random item from the given slice. Returns `None` for empty slices.
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let index = self.next_int(0, items.len() as i32 - 1) as usize;
        items.get(index)
    }
}

impl Default for SeededRng {
    fn default() -> Self {
        Self::from_state(DEFAULT_SEED_STATE)
    }
}

impl RngCore for SeededRng {
    fn next_u32(&mut self) -> u32 {
        self.next_raw()
    }

    fn next_u64(&mut self) -> u64 {
        let low = self.next_raw() as u64;
        let high = self.next_raw() as u64;
        (high << 32) | low
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.next_raw().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }
}

impl SeedableRng for SeededRng {
    type Seed = [u8; 4];

    fn from_seed(seed: Self::Seed) -> Self {
        Self::from_state(u32::from_le_bytes(seed))
    }
}

// -------------------------------------------------------------------------------------------------

/// Non reproducible random generator for call sites which intentionally should not follow
/// the musical seed.
pub fn system_rng() -> SmallRng {
    SmallRng::from_os_rng()
}

// -------------------------------------------------------------------------------------------------
