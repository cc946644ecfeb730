use super::{FrameContext, FrameTransform};
use crate::segmentation::Region;
use anyhow::Result;
use image::RgbImage;

/// Blur the bounding rectangle of every region that is large enough.
///
/// Regions are blurred one after another into the same buffer, so
/// overlapping rectangles get blurred twice.
#[derive(Debug, Clone)]
pub struct SelectiveBlurStrategy {
    kernel: Vec<f32>,
    min_area: u64,
}

impl SelectiveBlurStrategy {
    pub fn new(kernel_size: u32, min_area: u64) -> Self {
        Self {
            kernel: gaussian_kernel(kernel_size),
            min_area,
        }
    }

    pub fn kernel_size(&self) -> usize {
        self.kernel.len()
    }
}

impl FrameTransform for SelectiveBlurStrategy {
    fn apply(&self, ctx: FrameContext<'_>) -> Result<RgbImage> {
        let _span = tracing::debug_span!("selective_blur", regions = ctx.regions.len()).entered();

        let mut result = ctx.frame.clone();
        let (width, height) = result.dimensions();

        for region in ctx.regions.iter().filter(|r| r.area >= self.min_area) {
            if let Some(rect) = region.clipped(width, height) {
                blur_rect(&mut result, &rect, &self.kernel);
            }
        }
        Ok(result)
    }

    fn needs_regions(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "selective-blur"
    }
}

/// Normalised 1-D Gaussian taps for an odd `size`.
///
/// Sigma is derived from the size as `0.3 * ((size - 1) / 2 - 1) + 0.8`.
pub fn gaussian_kernel(size: u32) -> Vec<f32> {
    let size = (size.max(1) | 1) as usize;
    let half = (size / 2) as f32;
    let sigma = 0.3 * (half - 1.0) + 0.8;

    let taps: Vec<f32> = (0..size)
        .map(|i| {
            let d = i as f32 - half;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f32 = taps.iter().sum();
    taps.into_iter().map(|t| t / sum).collect()
}

/// Separable in-place blur of `rect`. Samples outside the rectangle come from
/// the surrounding image, mirrored (without repeating the edge) at its border.
fn blur_rect(image: &mut RgbImage, rect: &Region, kernel: &[f32]) {
    let (width, height) = image.dimensions();
    let half = (kernel.len() / 2) as i64;
    let (x0, y0) = (rect.x as i64, rect.y as i64);
    let (x1, y1) = (rect.right() as i64, rect.bottom() as i64);
    let rect_width = rect.width as usize;

    // Horizontal pass over every row the vertical pass will touch.
    let band_rows = (y1 - y0) as usize + 2 * half as usize;
    let mut band = vec![[0.0f32; 3]; band_rows * rect_width];
    for (row, y) in (y0 - half..y1 + half).enumerate() {
        let sy = reflect_101(y, height);
        for (col, x) in (x0..x1).enumerate() {
            let mut acc = [0.0f32; 3];
            for (k, weight) in kernel.iter().enumerate() {
                let sx = reflect_101(x + k as i64 - half, width);
                let pixel = image.get_pixel(sx, sy);
                for c in 0..3 {
                    acc[c] += weight * pixel[c] as f32;
                }
            }
            band[row * rect_width + col] = acc;
        }
    }

    for y in y0..y1 {
        let row = (y - y0) as usize;
        for (col, x) in (x0..x1).enumerate() {
            let mut acc = [0.0f32; 3];
            for (k, weight) in kernel.iter().enumerate() {
                let sample = band[(row + k) * rect_width + col];
                for c in 0..3 {
                    acc[c] += weight * sample[c];
                }
            }
            let pixel = image.get_pixel_mut(x as u32, y as u32);
            for c in 0..3 {
                pixel[c] = acc[c].round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

fn reflect_101(index: i64, len: u32) -> u32 {
    let len = len as i64;
    if len <= 1 {
        return 0;
    }
    let period = 2 * (len - 1);
    let i = index.rem_euclid(period);
    (if i >= len { period - i } else { i }) as u32
}
