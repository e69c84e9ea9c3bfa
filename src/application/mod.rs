//! Application services: content assembly, now-playing lookups and rendering.

pub mod content;
pub mod error;
pub mod now_playing;
pub mod render;
