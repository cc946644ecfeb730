use super::DisplaySink;
use anyhow::{Context, Result};
use image::RgbImage;
use std::fs;
use std::path::{Path, PathBuf};

/// Writes every published frame as `frame_NNNNNN.png` into a directory.
pub struct DumpSink {
    dir: PathBuf,
    written: u64,
}

impl DumpSink {
    pub fn create<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create dump directory {}", dir.display()))?;
        tracing::info!("Dumping frames to {}", dir.display());
        Ok(Self {
            dir: dir.to_path_buf(),
            written: 0,
        })
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

impl DisplaySink for DumpSink {
    fn publish(&mut self, frame: RgbImage) -> Result<()> {
        let path = self.dir.join(format!("frame_{:06}.png", self.written));
        frame
            .save(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        self.written += 1;
        Ok(())
    }
}
