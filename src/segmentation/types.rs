use anyhow::Result;
use image::{GrayImage, RgbImage};

/// Binary mask: 255 marks foreground, 0 background.
/// Dimensions match the frame it was computed from.
pub type ForegroundMask = GrayImage;

pub const FOREGROUND: u8 = 255;
pub const BACKGROUND: u8 = 0;

/// Bounding rectangle of one connected foreground component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Number of foreground pixels in the component.
    pub area: u64,
}

impl Region {
    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }

    /// The rectangle limited to a `width` x `height` frame.
    pub fn clipped(&self, width: u32, height: u32) -> Option<Region> {
        if self.x >= width || self.y >= height {
            return None;
        }
        Some(Region {
            width: self.right().min(width) - self.x,
            height: self.bottom().min(height) - self.y,
            ..*self
        })
    }
}

/// Stateful per-pixel background model.
/// Allows swapping between different background-subtraction algorithms.
pub trait ForegroundModel: Send {
    /// Update the model with `frame` and return its foreground mask.
    ///
    /// Frames must arrive in temporal order. Skipped or reordered frames
    /// only degrade the mask.
    fn apply(&mut self, frame: &RgbImage) -> Result<ForegroundMask>;

    /// Forget the learned background.
    ///
    /// Call this when a new video is loaded.
    fn reset(&mut self) {
        // Default implementation: no-op for stateless models
    }
}

/// Extracts connected foreground components from a mask.
pub trait RegionExtractor: Send {
    /// Regions with `area >= min_area`, in no particular order.
    fn extract(&self, mask: &ForegroundMask, min_area: u64) -> Result<Vec<Region>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clipping_limits_to_frame() {
        let region = Region { x: 90, y: 10, width: 30, height: 30, area: 900 };
        let clipped = region.clipped(100, 100).unwrap();
        assert_eq!((clipped.width, clipped.height), (10, 30));
        assert!(region.clipped(90, 100).is_none());
    }

    #[test]
    fn huge_rect_does_not_overflow() {
        let region = Region { x: 5, y: 7, width: u32::MAX, height: u32::MAX, area: 1 };
        assert_eq!(region.right(), u32::MAX);
        assert_eq!(region.bottom(), u32::MAX);
        let clipped = region.clipped(64, 48).unwrap();
        assert_eq!((clipped.x, clipped.y, clipped.width, clipped.height), (5, 7, 59, 41));
    }
}
