use super::types::{ForegroundMask, ForegroundModel, BACKGROUND, FOREGROUND};
use crate::config::BackgroundConfig;
use anyhow::Result;
use image::{Luma, RgbImage};
use ndarray::{Array2, Array3};

/// Adaptive per-pixel background model.
///
/// Every pixel carries one Gaussian: a mean per channel and a shared variance.
/// A pixel whose squared distance to the mean exceeds `var_threshold`
/// variances is foreground. Only background pixels update the statistics, so
/// moving objects do not leave ghosts behind them. A pixel that stays
/// foreground for longer than `absorb_after` frames is taken to be new
/// background (a parked car, a moved chair) and re-seeded.
pub struct AdaptiveBackground {
    config: BackgroundConfig,
    dims: Option<(u32, u32)>,
    frames_seen: u32,

    // Model statistics, indexed [row, col(, channel)]
    mean: Array3<f32>,
    variance: Array2<f32>,
    foreground_run: Array2<u32>,
}

impl AdaptiveBackground {
    pub fn new(config: BackgroundConfig) -> Self {
        Self {
            config,
            dims: None,
            frames_seen: 0,
            mean: Array3::zeros((0, 0, 3)),
            variance: Array2::zeros((0, 0)),
            foreground_run: Array2::zeros((0, 0)),
        }
    }

    /// Frames absorbed since the last reset.
    pub fn frames_seen(&self) -> u32 {
        self.frames_seen
    }

    /// Seed the model from `frame`.
    fn seed(&mut self, frame: &RgbImage) {
        let (width, height) = frame.dimensions();
        let (w, h) = (width as usize, height as usize);

        tracing::debug!("Seeding background model at {}x{}", width, height);

        self.mean = Array3::from_shape_fn((h, w, 3), |(y, x, c)| {
            frame.get_pixel(x as u32, y as u32)[c] as f32
        });
        self.variance = Array2::from_elem((h, w), self.config.var_init);
        self.foreground_run = Array2::zeros((h, w));
        self.dims = Some((width, height));
        self.frames_seen = 1;
    }

    fn learning_rate(&self) -> f32 {
        let span = self.frames_seen.min(self.config.history).max(1);
        1.0 / span as f32
    }
}

impl ForegroundModel for AdaptiveBackground {
    fn apply(&mut self, frame: &RgbImage) -> Result<ForegroundMask> {
        let _span = tracing::debug_span!("background_apply").entered();

        let (width, height) = frame.dimensions();
        if self.dims != Some((width, height)) {
            self.seed(frame);
            return Ok(ForegroundMask::from_pixel(width, height, Luma([BACKGROUND])));
        }

        self.frames_seen = self.frames_seen.saturating_add(1);
        let alpha = self.learning_rate();
        let config = &self.config;
        let mut mask = ForegroundMask::new(width, height);

        for (x, y, pixel) in frame.enumerate_pixels() {
            let (row, col) = (y as usize, x as usize);

            let mut diff = [0.0f32; 3];
            let mut dist2 = 0.0f32;
            for (c, d) in diff.iter_mut().enumerate() {
                *d = pixel[c] as f32 - self.mean[[row, col, c]];
                dist2 += *d * *d;
            }

            let variance = self.variance[[row, col]];
            if dist2 > config.var_threshold * variance {
                let run = &mut self.foreground_run[[row, col]];
                *run += 1;
                if *run > config.absorb_after {
                    *run = 0;
                    for c in 0..3 {
                        self.mean[[row, col, c]] = pixel[c] as f32;
                    }
                    self.variance[[row, col]] = config.var_init;
                } else {
                    mask.put_pixel(x, y, Luma([FOREGROUND]));
                }
                continue;
            }

            self.foreground_run[[row, col]] = 0;
            for (c, d) in diff.iter().enumerate() {
                self.mean[[row, col, c]] += alpha * d;
            }
            let updated = variance + alpha * (dist2 / 3.0 - variance);
            self.variance[[row, col]] = updated.clamp(config.var_min, config.var_max);
        }

        Ok(mask)
    }

    fn reset(&mut self) {
        tracing::debug!("Resetting background model");
        self.dims = None;
        self.frames_seen = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn backdrop() -> RgbImage {
        RgbImage::from_fn(40, 30, |x, y| Rgb([(x * 3) as u8, (y * 5) as u8, 60]))
    }

    fn with_block(mut frame: RgbImage, x0: u32, y0: u32, size: u32) -> RgbImage {
        for y in y0..y0 + size {
            for x in x0..x0 + size {
                frame.put_pixel(x, y, Rgb([250, 250, 250]));
            }
        }
        frame
    }

    fn foreground_count(mask: &ForegroundMask) -> usize {
        mask.pixels().filter(|p| p[0] == FOREGROUND).count()
    }

    #[test]
    fn first_frame_is_all_background() {
        let mut model = AdaptiveBackground::new(BackgroundConfig::default());
        let mask = model.apply(&with_block(backdrop(), 5, 5, 10)).unwrap();
        assert_eq!(mask.dimensions(), (40, 30));
        assert_eq!(foreground_count(&mask), 0);
    }

    #[test]
    fn static_scene_stays_background() {
        let mut model = AdaptiveBackground::new(BackgroundConfig::default());
        for _ in 0..10 {
            let mask = model.apply(&backdrop()).unwrap();
            assert_eq!(foreground_count(&mask), 0);
        }
        assert_eq!(model.frames_seen(), 10);
    }

    #[test]
    fn moving_block_is_foreground_without_ghosts() {
        let mut model = AdaptiveBackground::new(BackgroundConfig::default());
        for _ in 0..5 {
            model.apply(&backdrop()).unwrap();
        }

        let mask = model.apply(&with_block(backdrop(), 2, 2, 8)).unwrap();
        assert_eq!(foreground_count(&mask), 64);
        assert_eq!(mask.get_pixel(2, 2)[0], FOREGROUND);

        // The old position must return to background once the block moves on.
        let mask = model.apply(&with_block(backdrop(), 20, 10, 8)).unwrap();
        assert_eq!(foreground_count(&mask), 64);
        assert_eq!(mask.get_pixel(2, 2)[0], BACKGROUND);
        assert_eq!(mask.get_pixel(20, 10)[0], FOREGROUND);
    }

    #[test]
    fn stationary_object_is_absorbed() {
        let config = BackgroundConfig {
            absorb_after: 3,
            ..BackgroundConfig::default()
        };
        let mut model = AdaptiveBackground::new(config);
        model.apply(&backdrop()).unwrap();

        let parked = with_block(backdrop(), 10, 10, 5);
        for _ in 0..3 {
            assert_eq!(foreground_count(&model.apply(&parked).unwrap()), 25);
        }
        assert_eq!(foreground_count(&model.apply(&parked).unwrap()), 0);
        assert_eq!(foreground_count(&model.apply(&parked).unwrap()), 0);
    }

    #[test]
    fn reset_and_resize_reseed() {
        let mut model = AdaptiveBackground::new(BackgroundConfig::default());
        model.apply(&backdrop()).unwrap();
        model.reset();
        let mask = model.apply(&with_block(backdrop(), 0, 0, 10)).unwrap();
        assert_eq!(foreground_count(&mask), 0);

        let small = RgbImage::from_pixel(8, 8, Rgb([1, 2, 3]));
        let mask = model.apply(&small).unwrap();
        assert_eq!(mask.dimensions(), (8, 8));
        assert_eq!(foreground_count(&mask), 0);
    }
}
