use super::DisplaySink;
use anyhow::{bail, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use image::RgbImage;
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Create a connected sink/receiver pair with room for one undrawn frame.
pub fn display_channel() -> (ChannelSink, DisplayReceiver) {
    let (tx, rx) = bounded(1);
    let alive = Arc::new(());
    (
        ChannelSink {
            tx,
            stale: rx.clone(),
            display: Arc::downgrade(&alive),
            dropped: 0,
        },
        DisplayReceiver { rx, _alive: alive },
    )
}

/// Hands frames to a display thread without ever blocking the producer.
///
/// If the display has not picked up the previous frame yet, that frame is
/// discarded and replaced by the new one.
pub struct ChannelSink {
    tx: Sender<RgbImage>,
    stale: Receiver<RgbImage>,
    display: Weak<()>,
    dropped: u64,
}

impl ChannelSink {
    /// Frames replaced before the display drew them.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl DisplaySink for ChannelSink {
    fn publish(&mut self, frame: RgbImage) -> Result<()> {
        if self.display.strong_count() == 0 {
            bail!("display receiver is gone");
        }

        let frame = match self.tx.try_send(frame) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Disconnected(_)) => bail!("display receiver is gone"),
            Err(TrySendError::Full(frame)) => frame,
        };

        if self.stale.try_recv().is_ok() {
            self.dropped += 1;
        }
        match self.tx.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendError::Disconnected(_)) => bail!("display receiver is gone"),
            // The display grabbed the old frame in between; ours is simply late.
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                Ok(())
            }
        }
    }
}

/// Display-side end of [`display_channel`].
pub struct DisplayReceiver {
    rx: Receiver<RgbImage>,
    _alive: Arc<()>,
}

impl DisplayReceiver {
    /// Wait for the next frame. `None` once the sink is dropped.
    pub fn recv(&self) -> Option<RgbImage> {
        self.rx.recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<RgbImage>> {
        match self.rx.recv_timeout(timeout) {
            Ok(frame) => Ok(Some(frame)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => bail!("display sink is gone"),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = RgbImage> + '_ {
        self.rx.iter()
    }
}
