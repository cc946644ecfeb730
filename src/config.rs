use std::time::Duration;

/// Components smaller than this are treated as noise.
pub const DEFAULT_MIN_REGION_AREA: u64 = 500;

/// Side length of the square Gaussian kernel used by the selective blur.
pub const DEFAULT_BLUR_KERNEL: u32 = 25;

/// Tunables for the playback loop and the frame transforms.
#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    /// Target delay between the start of two consecutive frames.
    pub frame_interval: Duration,
    pub min_region_area: u64,
    pub blur_kernel: u32,
    /// Log averaged stage timings every this many frames. 0 disables it.
    pub stats_every: u64,
}

impl PlaybackConfig {
    pub fn with_fps(fps: u32) -> Self {
        Self {
            frame_interval: Duration::from_secs_f32(1.0 / fps.max(1) as f32),
            ..Self::default()
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(33),
            min_region_area: DEFAULT_MIN_REGION_AREA,
            blur_kernel: DEFAULT_BLUR_KERNEL,
            stats_every: 30,
        }
    }
}

/// Parameters of [`crate::segmentation::AdaptiveBackground`].
#[derive(Debug, Clone)]
pub struct BackgroundConfig {
    /// Number of frames after which the learning rate stops shrinking.
    pub history: u32,
    /// Squared distance, in units of variance, above which a pixel is foreground.
    pub var_threshold: f32,
    pub var_init: f32,
    pub var_min: f32,
    pub var_max: f32,
    /// Consecutive foreground frames after which a pixel is absorbed into the background.
    pub absorb_after: u32,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            history: 500,
            var_threshold: 16.0,
            var_init: 15.0,
            var_min: 4.0,
            var_max: 75.0,
            absorb_after: 150,
        }
    }
}
