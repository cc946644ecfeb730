mod channel;
mod dump;
mod loopback;

pub use channel::{display_channel, ChannelSink, DisplayReceiver};
pub use dump::DumpSink;
pub use loopback::LoopbackSink;

use anyhow::Result;
use image::RgbImage;

/// Render target for processed frames.
///
/// `publish` is called once per processed frame, in source order, from the
/// processing thread. The sink takes ownership, so a published frame can no
/// longer change. Getting the frame onto a UI or device is the sink's job.
pub trait DisplaySink: Send {
    fn publish(&mut self, frame: RgbImage) -> Result<()>;
}

/// Fans one frame out to several sinks.
impl DisplaySink for Vec<Box<dyn DisplaySink>> {
    fn publish(&mut self, frame: RgbImage) -> Result<()> {
        let Some((last, rest)) = self.split_last_mut() else {
            return Ok(());
        };
        for sink in rest {
            sink.publish(frame.clone())?;
        }
        last.publish(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Recorder(Arc<Mutex<Vec<u32>>>);

    impl DisplaySink for Recorder {
        fn publish(&mut self, frame: RgbImage) -> Result<()> {
            self.0.lock().unwrap().push(frame.width());
            Ok(())
        }
    }

    #[test]
    fn fan_out_reaches_every_sink() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut sinks: Vec<Box<dyn DisplaySink>> = vec![
            Box::new(Recorder(seen.clone())),
            Box::new(Recorder(seen.clone())),
        ];
        sinks.publish(RgbImage::new(3, 1)).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![3, 3]);
    }

    #[test]
    fn empty_fan_out_is_fine() {
        let mut sinks: Vec<Box<dyn DisplaySink>> = Vec::new();
        sinks.publish(RgbImage::new(1, 1)).unwrap();
    }
}
