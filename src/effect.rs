use std::any::Any;

use crate::{parameter::FloatParameter, Error};

// -------------------------------------------------------------------------------------------------

pub mod reverb;

// -------------------------------------------------------------------------------------------------

/// A message addressed to one concrete [`Effect`] type.
///
/// Each effect defines its own message enum. The effect receives it as a type erased payload
/// in [`Effect::process_message`] and downcasts it back via [`payload`](Self::payload).
pub trait EffectMessage: Any + Send + Sync {
    /// Name of the effect this message is meant for, see [`Effect::name`].
    fn effect_name(&self) -> &'static str;

    fn payload(&self) -> &dyn Any;
}

/// Type erased message, as passed to [`Effect::process_message`].
pub type EffectMessagePayload = dyn EffectMessage;

// -------------------------------------------------------------------------------------------------

/// In-place processor for interleaved `f32` frames, owned by the render loop.
///
/// `initialize` runs on the control side and may allocate. `process` and `process_message`
/// run in the render thread: they must neither lock nor allocate.
pub trait Effect: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Descriptors of all user facing parameters.
    fn parameters(&self) -> Vec<&FloatParameter>;

    /// Prepare internal state for the given stream layout.
    fn initialize(
        &mut self,
        sample_rate: u32,
        channel_count: usize,
        max_frames: usize,
    ) -> Result<(), Error>;

    fn process(&mut self, output: &mut [f32]);

    /// Length of the audible tail in frames after the input went silent, when known.
    fn process_tail(&self) -> Option<usize> {
        None
    }

    /// Apply a message of this effect's own message type. Other payloads are rejected.
    fn process_message(&mut self, _message: &EffectMessagePayload) -> Result<(), Error> {
        Err(Error::ParameterError(format!(
            "{} does not accept messages",
            self.name()
        )))
    }
}
