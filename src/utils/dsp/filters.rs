//! Simple filters for tone shaping, damping and DC removal.

pub mod dc;
pub mod onepole;
