//! Playback state machine.
//!
//! [`PlaybackController`] owns at most one processing thread. Starting joins
//! whatever thread ran before, so two loops never touch the same source or
//! background model. Stopping is cooperative: the loop checks the state once
//! per frame and is woken out of its pacing delay.

mod state;
mod worker;

pub use state::PlaybackState;

use crate::config::PlaybackConfig;
use crate::error::PlaybackError;
use crate::output::DisplaySink;
use crate::segmentation::{self, ForegroundModel, RegionExtractor};
use crate::source::{DefaultOpener, SourceOpener};
use crate::transform::StrategyKind;
use crossbeam_channel::{unbounded, Receiver, Sender};
use state::Shared;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use worker::Pipeline;

/// Reports emitted by the controller and its processing thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    Loaded {
        path: PathBuf,
        width: u32,
        height: u32,
    },
    Started,
    Stopped,
    /// The stream ended (or failed to decode) and was rewound to frame 0.
    Ended { decode_error: Option<String> },
    Error(PlaybackError),
}

pub struct PlaybackController {
    shared: Arc<Shared>,
    config: PlaybackConfig,
    opener: Box<dyn SourceOpener>,
    /// Present whenever no processing thread holds it.
    pipeline: Option<Pipeline>,
    worker: Option<JoinHandle<Pipeline>>,
    events_tx: Sender<PlaybackEvent>,
    events_rx: Receiver<PlaybackEvent>,
}

impl PlaybackController {
    /// Controller with the default opener, background model and region extractor.
    pub fn new<S: DisplaySink + 'static>(config: PlaybackConfig, sink: S) -> Self {
        Self::with_parts(
            config,
            Box::new(DefaultOpener),
            segmentation::create_default_model(),
            segmentation::create_default_extractor(),
            Box::new(sink),
        )
    }

    pub fn with_parts(
        config: PlaybackConfig,
        opener: Box<dyn SourceOpener>,
        model: Box<dyn ForegroundModel>,
        extractor: Box<dyn RegionExtractor>,
        sink: Box<dyn DisplaySink>,
    ) -> Self {
        let (events_tx, events_rx) = unbounded();
        Self {
            shared: Arc::new(Shared::new(StrategyKind::default())),
            config,
            opener,
            pipeline: Some(Pipeline {
                source: None,
                model,
                extractor,
                sink,
            }),
            worker: None,
            events_tx,
            events_rx,
        }
    }

    /// Open `path` and make it the current video.
    ///
    /// A running playback is stopped first. On failure any previously loaded
    /// video is released and the controller goes back to `Idle`.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<(), PlaybackError> {
        let path = path.as_ref();

        if self.shared.transition(PlaybackState::Running, PlaybackState::Stopped) {
            self.emit(PlaybackEvent::Stopped);
        }
        self.reclaim();

        let Some(pipeline) = self.pipeline.as_mut() else {
            return Err(self.report(PlaybackError::TransformFailure(
                "processing pipeline was lost".to_string(),
            )));
        };

        // Release the old decoder before opening the new one.
        pipeline.source = None;

        match self.opener.open(path) {
            Ok(source) => {
                let info = source.info().clone();
                pipeline.source = Some(source);
                pipeline.model.reset();
                self.shared.set(PlaybackState::Loaded);

                tracing::info!(
                    "Loaded {} ({}x{})",
                    info.path.display(),
                    info.width,
                    info.height
                );
                self.emit(PlaybackEvent::Loaded {
                    path: info.path,
                    width: info.width,
                    height: info.height,
                });
                Ok(())
            }
            Err(err) => {
                self.shared.set(PlaybackState::Idle);
                Err(self.report(PlaybackError::cannot_open(path, &err)))
            }
        }
    }

    /// Start when loaded or stopped, stop when running.
    ///
    /// Returns the state the call moved to.
    pub fn toggle(&mut self) -> Result<PlaybackState, PlaybackError> {
        loop {
            match self.shared.state() {
                PlaybackState::Idle => return Err(self.report(PlaybackError::NoVideoLoaded)),
                PlaybackState::Running => {
                    if self
                        .shared
                        .transition(PlaybackState::Running, PlaybackState::Stopped)
                    {
                        tracing::info!("Playback stop requested");
                        self.emit(PlaybackEvent::Stopped);
                        return Ok(PlaybackState::Stopped);
                    }
                    // The processing thread moved the state first; look again.
                }
                PlaybackState::Loaded | PlaybackState::Stopped | PlaybackState::Ended => {
                    return self.start();
                }
            }
        }
    }

    fn start(&mut self) -> Result<PlaybackState, PlaybackError> {
        self.reclaim();

        let pipeline = match self.pipeline.take() {
            Some(pipeline) if pipeline.source.is_some() => pipeline,
            other => {
                self.pipeline = other;
                self.shared.set(PlaybackState::Idle);
                return Err(self.report(PlaybackError::NoVideoLoaded));
            }
        };

        self.shared.set(PlaybackState::Running);
        tracing::info!("Playback started with {} strategy", self.shared.strategy());
        self.emit(PlaybackEvent::Started);

        let shared = self.shared.clone();
        let config = self.config.clone();
        let events = self.events_tx.clone();
        self.worker = Some(thread::spawn(move || {
            worker::run(pipeline, shared, config, events)
        }));

        Ok(PlaybackState::Running)
    }

    /// Join the previous processing thread, if any, and take its pipeline back.
    fn reclaim(&mut self) {
        let Some(handle) = self.worker.take() else {
            return;
        };
        match handle.join() {
            Ok(pipeline) => self.pipeline = Some(pipeline),
            Err(_) => {
                tracing::error!("Processing thread panicked; pipeline lost");
                self.shared.set(PlaybackState::Idle);
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.state() == PlaybackState::Running
    }

    pub fn state(&self) -> PlaybackState {
        self.shared.state()
    }

    /// Takes effect from the next processed frame.
    pub fn select_strategy(&self, kind: StrategyKind) {
        tracing::info!("Strategy set to {}", kind);
        self.shared.set_strategy(kind);
    }

    pub fn strategy(&self) -> StrategyKind {
        self.shared.strategy()
    }

    /// Every report the controller makes, in order.
    pub fn events(&self) -> Receiver<PlaybackEvent> {
        self.events_rx.clone()
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    fn emit(&self, event: PlaybackEvent) {
        let _ = self.events_tx.send(event);
    }

    fn report(&self, err: PlaybackError) -> PlaybackError {
        tracing::warn!("{}", err);
        self.emit(PlaybackEvent::Error(err.clone()));
        err
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.shared
            .transition(PlaybackState::Running, PlaybackState::Stopped);
        self.reclaim();
    }
}
