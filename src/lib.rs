#![doc = include_str!("../README.md")]

// private mods (will be partly re-exported)
mod effect;
mod engine;
mod error;
mod parameter;

// public, flat re-exports
pub use error::Error;

pub use engine::{
    EngineConfig, EngineController, EngineSnapshot, RenderLoop, RenderStatusEvent, SilentVoices,
    VoiceLayer,
};

pub use parameter::{FloatParameter, IntegerParameter};

pub use scheduler::{
    trigger::TriggerEvent, EuclideanLane, MelodicLane, Phrase, PhraseScheduler, SchedulerConfig,
    SchedulerState, SourceId, VoiceId,
};

pub use seed::{SeedBucket, SeedMaterial, SeededRng};

pub use effect::{Effect, EffectMessage, EffectMessagePayload};

// public mods
pub mod granular;
pub mod scheduler;
pub mod seed;
pub mod utils;

pub mod effects {
    //! DSP effect implementations.

    pub use super::effect::reverb::{
        hadamard_8, ReverbEffect, ReverbEffectMessage, ReverbParameters, ReverbQuality,
    };
}
