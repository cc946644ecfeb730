mod ffmpeg;
mod sequence;
pub mod staging;

pub use ffmpeg::FfmpegSource;
pub use sequence::FrameSequence;
pub use staging::StagingGuard;

use anyhow::Result;
use image::RgbImage;
use std::path::{Path, PathBuf};

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Static description of an open source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoInfo {
    /// The path the user asked for.
    pub path: PathBuf,
    /// The path actually handed to the decoder (a staged copy for non-ASCII paths).
    pub opened_path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub channels: u8,
}

/// An open, rewindable stream of frames.
///
/// Values of this trait only exist in the open state: constructors either
/// return a working source or an error.
pub trait VideoSource: Send {
    /// Read the next frame. `Ok(None)` marks the end of the stream.
    fn read_next(&mut self) -> Result<Option<RgbImage>>;

    /// Go back to frame 0.
    fn rewind(&mut self) -> Result<()>;

    fn info(&self) -> &VideoInfo;

    /// Frames read since the source was opened or last rewound.
    fn position(&self) -> u64;
}

/// Turns a path into an open source. The controller only knows this seam.
pub trait SourceOpener: Send {
    fn open(&self, path: &Path) -> Result<Box<dyn VideoSource>>;
}

impl<F> SourceOpener for F
where
    F: Fn(&Path) -> Result<Box<dyn VideoSource>> + Send,
{
    fn open(&self, path: &Path) -> Result<Box<dyn VideoSource>> {
        self(path)
    }
}

/// Opens directories as image sequences, image files as single frames and
/// everything else through ffmpeg.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultOpener;

impl SourceOpener for DefaultOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn VideoSource>> {
        if path.is_dir() {
            return Ok(Box::new(FrameSequence::open_dir(path)?));
        }
        if is_image_file(path) {
            return Ok(Box::new(FrameSequence::open_image(path)?));
        }
        Ok(Box::new(FfmpegSource::open(path)?))
    }
}

pub(crate) fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_extensions_are_case_insensitive() {
        assert!(is_image_file(Path::new("a/b/frame_001.PNG")));
        assert!(is_image_file(Path::new("shot.jpeg")));
        assert!(!is_image_file(Path::new("clip.mp4")));
        assert!(!is_image_file(Path::new("noext")));
    }

    #[test]
    fn default_opener_rejects_missing_file() {
        let result = DefaultOpener.open(Path::new("/definitely/not/here.mp4"));
        assert!(result.is_err());
    }
}
