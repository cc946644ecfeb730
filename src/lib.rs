//! Streaming foreground-region video effects.
//!
//! A [`playback::PlaybackController`] pulls frames from a [`source::VideoSource`],
//! derives a foreground mask with a [`segmentation::ForegroundModel`], extracts
//! moving regions, renders them with a [`transform::FrameTransform`] and hands
//! the result to a [`output::DisplaySink`] at a fixed pace.

pub mod config;
pub mod error;
pub mod output;
pub mod playback;
pub mod segmentation;
pub mod source;
pub mod transform;

pub use config::{BackgroundConfig, PlaybackConfig};
pub use error::PlaybackError;
pub use playback::{PlaybackController, PlaybackEvent, PlaybackState};
pub use transform::StrategyKind;
