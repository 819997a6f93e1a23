//! Domain layer types and invariants.

pub mod entities;
pub mod error;
pub mod slug;
pub mod time_frames;
pub mod types;
