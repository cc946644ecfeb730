use super::{FrameContext, FrameTransform};
use crate::segmentation::BACKGROUND;
use anyhow::{ensure, Result};
use image::{Rgb, RgbImage};

/// Keep foreground pixels, black out the rest.
#[derive(Debug, Default, Clone, Copy)]
pub struct OverlayStrategy;

impl FrameTransform for OverlayStrategy {
    fn apply(&self, ctx: FrameContext<'_>) -> Result<RgbImage> {
        let _span = tracing::debug_span!("overlay").entered();

        ensure!(
            ctx.frame.dimensions() == ctx.mask.dimensions(),
            "mask is {:?} but frame is {:?}",
            ctx.mask.dimensions(),
            ctx.frame.dimensions()
        );

        let (width, height) = ctx.frame.dimensions();
        Ok(RgbImage::from_fn(width, height, |x, y| {
            if ctx.mask.get_pixel(x, y)[0] == BACKGROUND {
                Rgb([0, 0, 0])
            } else {
                *ctx.frame.get_pixel(x, y)
            }
        }))
    }

    fn name(&self) -> &'static str {
        "overlay"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmentation::{ForegroundMask, FOREGROUND};
    use image::Luma;

    fn noisy_frame() -> RgbImage {
        RgbImage::from_fn(16, 12, |x, y| Rgb([(x * 13) as u8, (y * 17) as u8, (x + y) as u8 + 1]))
    }

    fn run(frame: &RgbImage, mask: &ForegroundMask) -> Result<RgbImage> {
        OverlayStrategy.apply(FrameContext {
            frame,
            mask,
            regions: &[],
        })
    }

    #[test]
    fn all_background_blacks_out_everything() {
        let frame = noisy_frame();
        let mask = ForegroundMask::from_pixel(16, 12, Luma([BACKGROUND]));
        let result = run(&frame, &mask).unwrap();
        assert!(result.as_raw().iter().all(|&v| v == 0));
    }

    #[test]
    fn all_foreground_is_identity() {
        let frame = noisy_frame();
        let mask = ForegroundMask::from_pixel(16, 12, Luma([FOREGROUND]));
        assert_eq!(run(&frame, &mask).unwrap(), frame);
    }

    #[test]
    fn partial_mask_passes_only_foreground() {
        let frame = noisy_frame();
        let mut mask = ForegroundMask::new(16, 12);
        mask.put_pixel(3, 4, Luma([FOREGROUND]));
        // Shadow-style intermediate values still count as foreground.
        mask.put_pixel(5, 6, Luma([127]));

        let result = run(&frame, &mask).unwrap();
        assert_eq!(result.get_pixel(3, 4), frame.get_pixel(3, 4));
        assert_eq!(result.get_pixel(5, 6), frame.get_pixel(5, 6));
        assert_eq!(result.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(result.get_pixel(15, 11), &Rgb([0, 0, 0]));
    }

    #[test]
    fn mismatched_mask_is_an_error() {
        let frame = noisy_frame();
        let mask = ForegroundMask::new(8, 8);
        assert!(run(&frame, &mask).is_err());
    }
}
