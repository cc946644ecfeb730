use super::{is_image_file, VideoInfo, VideoSource};
use anyhow::{bail, Context, Result};
use image::RgbImage;
use std::fs;
use std::path::{Path, PathBuf};

/// An ordered, in-memory list of frames played back like a video.
///
/// Used for image directories ("a set of images") and for synthetic clips.
pub struct FrameSequence {
    info: VideoInfo,
    frames: Vec<RgbImage>,
    position: usize,
}

impl FrameSequence {
    /// Build a sequence from frames that all share the first frame's size.
    pub fn from_frames<P: Into<PathBuf>>(path: P, frames: Vec<RgbImage>) -> Result<Self> {
        let path = path.into();
        let Some(first) = frames.first() else {
            bail!("{} contains no frames", path.display());
        };
        let (width, height) = first.dimensions();

        if let Some(index) = frames.iter().position(|f| f.dimensions() != (width, height)) {
            bail!(
                "frame {} of {} is {:?}, expected {}x{}",
                index,
                path.display(),
                frames[index].dimensions(),
                width,
                height
            );
        }

        Ok(Self {
            info: VideoInfo {
                opened_path: path.clone(),
                path,
                width,
                height,
                channels: 3,
            },
            frames,
            position: 0,
        })
    }

    /// Load every image in `dir`, ordered by file name.
    pub fn open_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let mut files: Vec<PathBuf> = fs::read_dir(dir)
            .with_context(|| format!("Failed to list {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_image_file(p))
            .collect();
        files.sort();

        tracing::info!("Loading {} images from {}", files.len(), dir.display());

        let frames = files
            .iter()
            .map(|file| {
                image::open(file)
                    .map(|img| img.to_rgb8())
                    .with_context(|| format!("Failed to decode {}", file.display()))
            })
            .collect::<Result<Vec<_>>>()?;

        Self::from_frames(dir, frames)
    }

    /// A single still image, played as a one-frame clip.
    pub fn open_image<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let frame = image::open(path)
            .with_context(|| format!("Failed to decode {}", path.display()))?
            .to_rgb8();
        Self::from_frames(path, vec![frame])
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl VideoSource for FrameSequence {
    fn read_next(&mut self) -> Result<Option<RgbImage>> {
        let frame = self.frames.get(self.position).cloned();
        if frame.is_some() {
            self.position += 1;
        }
        Ok(frame)
    }

    fn rewind(&mut self) -> Result<()> {
        self.position = 0;
        Ok(())
    }

    fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn position(&self) -> u64 {
        self.position as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn solid(value: u8) -> RgbImage {
        RgbImage::from_pixel(4, 3, Rgb([value, value, value]))
    }

    #[test]
    fn reads_in_order_then_ends() {
        let mut seq = FrameSequence::from_frames("synthetic", vec![solid(1), solid(2)]).unwrap();
        assert_eq!(seq.info().width, 4);
        assert_eq!(seq.info().height, 3);

        assert_eq!(seq.read_next().unwrap().unwrap().get_pixel(0, 0)[0], 1);
        assert_eq!(seq.read_next().unwrap().unwrap().get_pixel(0, 0)[0], 2);
        assert_eq!(seq.position(), 2);
        assert!(seq.read_next().unwrap().is_none());
        assert!(seq.read_next().unwrap().is_none());
        assert_eq!(seq.position(), 2);
    }

    #[test]
    fn rewind_restarts_at_first_frame() {
        let mut seq = FrameSequence::from_frames("synthetic", vec![solid(7), solid(8)]).unwrap();
        while seq.read_next().unwrap().is_some() {}
        seq.rewind().unwrap();
        assert_eq!(seq.position(), 0);
        assert_eq!(seq.read_next().unwrap().unwrap().get_pixel(0, 0)[0], 7);
    }

    #[test]
    fn rejects_empty_and_mixed_sizes() {
        assert!(FrameSequence::from_frames("empty", Vec::new()).is_err());
        let mixed = vec![solid(0), RgbImage::new(5, 5)];
        assert!(FrameSequence::from_frames("mixed", mixed).is_err());
    }

    #[test]
    fn loads_directory_sorted_by_name() {
        let dir = std::env::temp_dir().join(format!("motionfx-seq-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        solid(20).save(dir.join("frame_002.png")).unwrap();
        solid(10).save(dir.join("frame_001.png")).unwrap();
        fs::write(dir.join("notes.txt"), b"ignored").unwrap();

        let mut seq = FrameSequence::open_dir(&dir).unwrap();
        assert_eq!(seq.len(), 2);
        assert_eq!(seq.read_next().unwrap().unwrap().get_pixel(0, 0)[0], 10);
        assert_eq!(seq.read_next().unwrap().unwrap().get_pixel(0, 0)[0], 20);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn directory_without_images_fails() {
        let dir = std::env::temp_dir().join(format!("motionfx-seq-empty-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        assert!(FrameSequence::open_dir(&dir).is_err());
        fs::remove_dir_all(&dir).unwrap();
    }
}
