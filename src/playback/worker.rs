//! The processing thread: read, segment, transform, publish, pace.

use super::state::{PlaybackState, Shared};
use super::PlaybackEvent;
use crate::config::PlaybackConfig;
use crate::error::PlaybackError;
use crate::output::DisplaySink;
use crate::segmentation::{ForegroundModel, RegionExtractor};
use crate::source::VideoSource;
use crate::transform::{FrameContext, FrameTransform, StrategyKind};
use anyhow::{Context, Result};
use crossbeam_channel::Sender;
use image::RgbImage;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Everything the processing thread owns while playback runs.
///
/// It moves into the thread on start and comes back out through the
/// thread's join handle, so only one thread can ever touch it.
pub(crate) struct Pipeline {
    pub(crate) source: Option<Box<dyn VideoSource>>,
    pub(crate) model: Box<dyn ForegroundModel>,
    pub(crate) extractor: Box<dyn RegionExtractor>,
    pub(crate) sink: Box<dyn DisplaySink>,
}

/// Why the loop stopped.
enum Exit {
    /// Playback left `Running` from outside.
    Halted,
    /// End of stream, or a read error handled like one.
    Ended { decode_error: Option<String> },
    Failed(PlaybackError),
}

/// Body of the processing thread. Returns the pipeline for the next run.
pub(crate) fn run(
    mut pipeline: Pipeline,
    shared: Arc<Shared>,
    config: PlaybackConfig,
    events: Sender<PlaybackEvent>,
) -> Pipeline {
    tracing::debug!("Processing loop started");

    match play(&mut pipeline, &shared, &config) {
        Exit::Halted => tracing::debug!("Processing loop halted"),
        Exit::Ended { decode_error } => {
            // A stop that raced with end of stream wins; the source is still rewound.
            let ended = shared.transition(PlaybackState::Running, PlaybackState::Ended);
            rewind(&mut pipeline);
            if ended {
                shared.set(PlaybackState::Loaded);
                tracing::info!("End of stream, rewound to frame 0");
                let _ = events.send(PlaybackEvent::Ended { decode_error });
            } else {
                tracing::debug!("End of stream after stop request, staying stopped");
            }
        }
        Exit::Failed(err) => {
            tracing::error!("{}", err);
            shared.transition(PlaybackState::Running, PlaybackState::Stopped);
            let _ = events.send(PlaybackEvent::Error(err));
        }
    }

    pipeline
}

fn rewind(pipeline: &mut Pipeline) {
    let Some(source) = pipeline.source.as_mut() else {
        return;
    };
    if let Err(reason) = guarded(|| source.rewind()) {
        tracing::warn!("Failed to rewind {}: {}", source.info().path.display(), reason);
    }
}

fn play(pipeline: &mut Pipeline, shared: &Shared, config: &PlaybackConfig) -> Exit {
    let Pipeline {
        source,
        model,
        extractor,
        sink,
    } = pipeline;
    let Some(source) = source.as_mut() else {
        return Exit::Failed(PlaybackError::NoVideoLoaded);
    };

    let mut kind = shared.strategy();
    let mut transform = kind.build(config);
    let mut stats = StageStats::default();

    while shared.state() == PlaybackState::Running {
        let started = Instant::now();

        let frame = match guarded(|| source.read_next()) {
            Ok(Some(frame)) => frame,
            Ok(None) => return Exit::Ended { decode_error: None },
            Err(reason) => {
                let err = PlaybackError::DecodeFailure(reason);
                tracing::warn!(
                    "{} at frame {}, treating as end of stream",
                    err,
                    source.position()
                );
                return Exit::Ended {
                    decode_error: Some(err.to_string()),
                };
            }
        };
        stats.read += started.elapsed();

        let requested = shared.strategy();
        if requested != kind {
            tracing::info!("Switching strategy from {} to {}", kind, requested);
            kind = requested;
            transform = kind.build(config);
        }

        let result = match guarded(|| {
            render(
                &mut **model,
                &**extractor,
                &*transform,
                &frame,
                config.min_region_area,
                &mut stats,
            )
        }) {
            Ok(result) => result,
            Err(reason) => return Exit::Failed(PlaybackError::TransformFailure(reason)),
        };

        let publish_start = Instant::now();
        if let Err(reason) = guarded(|| sink.publish(result)) {
            return Exit::Failed(PlaybackError::PublishFailure(reason));
        }
        stats.publish += publish_start.elapsed();

        stats.frames += 1;
        if config.stats_every > 0 && stats.frames % config.stats_every == 0 {
            stats.log(kind);
        }

        if !shared.pace_until(started + config.frame_interval) {
            break;
        }
    }

    Exit::Halted
}

/// Mask, regions (when the strategy wants them), transform.
fn render(
    model: &mut dyn ForegroundModel,
    extractor: &dyn RegionExtractor,
    transform: &dyn FrameTransform,
    frame: &RgbImage,
    min_area: u64,
    stats: &mut StageStats,
) -> Result<RgbImage> {
    let segment_start = Instant::now();
    let mask = model.apply(frame).context("background model failed")?;

    let mut regions = if transform.needs_regions() {
        extractor
            .extract(&mask, min_area)
            .context("region extraction failed")?
    } else {
        Vec::new()
    };
    regions.retain(|r| r.area >= min_area);
    stats.segment += segment_start.elapsed();

    let transform_start = Instant::now();
    let result = transform
        .apply(FrameContext {
            frame,
            mask: &mask,
            regions: &regions,
        })
        .with_context(|| format!("{} transform failed", transform.name()))?;
    stats.transform += transform_start.elapsed();

    Ok(result)
}

/// Run one stage, turning both errors and panics into a message.
fn guarded<T>(stage: impl FnOnce() -> Result<T>) -> Result<T, String> {
    match catch_unwind(AssertUnwindSafe(stage)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(format!("{err:#}")),
        Err(payload) => Err(panic_message(payload.as_ref())),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("panicked: {msg}")
    } else {
        "panicked".to_string()
    }
}

#[derive(Default)]
struct StageStats {
    frames: u64,
    read: Duration,
    segment: Duration,
    transform: Duration,
    publish: Duration,
}

impl StageStats {
    fn avg_ms(&self, total: Duration) -> f64 {
        total.as_secs_f64() * 1000.0 / self.frames.max(1) as f64
    }

    fn log(&self, kind: StrategyKind) {
        let read = self.avg_ms(self.read);
        let segment = self.avg_ms(self.segment);
        let transform = self.avg_ms(self.transform);
        let publish = self.avg_ms(self.publish);
        let total = read + segment + transform + publish;

        tracing::info!(
            "Frame {} [{}]: read={:.1}ms, segment={:.1}ms, transform={:.1}ms, publish={:.1}ms, total={:.1}ms",
            self.frames,
            kind,
            read,
            segment,
            transform,
            publish,
            total
        );
    }
}
