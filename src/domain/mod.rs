//! Domain layer types and invariants.

pub mod content;
pub mod now_playing;
pub mod theme;
