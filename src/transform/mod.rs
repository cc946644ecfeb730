mod blur;
mod overlay;

pub use blur::{gaussian_kernel, SelectiveBlurStrategy};
pub use overlay::OverlayStrategy;

use crate::config::PlaybackConfig;
use crate::segmentation::{ForegroundMask, Region};
use anyhow::Result;
use image::RgbImage;

/// Everything a strategy may look at for one frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameContext<'a> {
    pub frame: &'a RgbImage,
    pub mask: &'a ForegroundMask,
    /// Empty unless the strategy asked for regions.
    pub regions: &'a [Region],
}

/// Per-frame rendering policy.
///
/// Implementations are pure: the result depends only on the context passed in.
pub trait FrameTransform: Send {
    fn apply(&self, ctx: FrameContext<'_>) -> Result<RgbImage>;

    /// Whether the pipeline must run region extraction before calling `apply`.
    fn needs_regions(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str;
}

/// Selects which [`FrameTransform`] the playback loop uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum StrategyKind {
    /// Black out everything outside the foreground mask
    #[default]
    Overlay,
    /// Blur the bounding box of every moving region
    SelectiveBlur,
}

impl StrategyKind {
    pub fn build(self, config: &PlaybackConfig) -> Box<dyn FrameTransform> {
        match self {
            StrategyKind::Overlay => Box::new(OverlayStrategy),
            StrategyKind::SelectiveBlur => Box::new(SelectiveBlurStrategy::new(
                config.blur_kernel,
                config.min_region_area,
            )),
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyKind::Overlay => write!(f, "overlay"),
            StrategyKind::SelectiveBlur => write!(f, "selective-blur"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_matching_strategy() {
        let config = PlaybackConfig::default();
        let overlay = StrategyKind::Overlay.build(&config);
        assert_eq!(overlay.name(), "overlay");
        assert!(!overlay.needs_regions());

        let blur = StrategyKind::SelectiveBlur.build(&config);
        assert_eq!(blur.name(), "selective-blur");
        assert!(blur.needs_regions());
    }

    #[test]
    fn display_matches_cli_names() {
        assert_eq!(StrategyKind::SelectiveBlur.to_string(), "selective-blur");
        assert_eq!(StrategyKind::Overlay.to_string(), "overlay");
    }
}
