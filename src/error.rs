use std::{error, fmt};

// -------------------------------------------------------------------------------------------------

/// Provides an enumeration of all possible errors reported by ambigen.
///
/// Errors are only ever reported on the control side. The real-time render path clamps,
/// drops or silences instead of failing.
#[derive(Debug, Clone, PartialEq)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    ParameterError(String),
    SampleRateError(u32),
    ChannelLayoutError(usize),
    QueueFull(&'static str),
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ParameterError(str) => write!(f, "Invalid parameter: {str}"),
            Self::SampleRateError(rate) => write!(f, "Unsupported sample rate: {rate}"),
            Self::ChannelLayoutError(channels) => {
                write!(f, "Unsupported channel count: {channels} (expected stereo)")
            }
            Self::QueueFull(name) => write!(f, "The {name} queue is full"),
        }
    }
}
