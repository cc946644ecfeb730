mod background;
mod components;
pub mod types;

pub use background::AdaptiveBackground;
pub use components::ConnectedComponents;
pub use types::{ForegroundMask, ForegroundModel, Region, RegionExtractor, BACKGROUND, FOREGROUND};

use crate::config::BackgroundConfig;

/// Create the default background model
pub fn create_default_model() -> Box<dyn ForegroundModel> {
    Box::new(AdaptiveBackground::new(BackgroundConfig::default()))
}

/// Create the default region extractor
pub fn create_default_extractor() -> Box<dyn RegionExtractor> {
    Box::new(ConnectedComponents)
}
