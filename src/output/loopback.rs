use super::DisplaySink;
use anyhow::{Context, Result};
use image::imageops::{self, FilterType};
use image::RgbImage;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Streams processed frames into a v4l2loopback device as packed YUYV,
/// so any webcam-aware application can show them.
pub struct LoopbackSink {
    device: File,
    width: u32,
    height: u32,
    packed: Vec<u8>,
}

impl LoopbackSink {
    pub fn open<P: AsRef<Path>>(device_path: P, width: u32, height: u32) -> Result<Self> {
        let path = device_path.as_ref();
        tracing::info!(
            "Publishing to v4l2loopback device {} at {}x{}",
            path.display(),
            width,
            height
        );

        let device = File::options()
            .write(true)
            .open(path)
            .with_context(|| format!("Failed to open loopback device {}", path.display()))?;

        Ok(Self::from_writer(device, width, height))
    }

    fn from_writer(device: File, width: u32, height: u32) -> Self {
        Self {
            device,
            width,
            height,
            packed: Vec::with_capacity(width as usize * height as usize * 2),
        }
    }

    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Pack an RGB frame as YUYV (4:2:2): two pixels share one U and one V sample.
pub fn pack_yuyv(frame: &RgbImage, out: &mut Vec<u8>) {
    let (width, height) = frame.dimensions();
    out.clear();

    for y in 0..height {
        let mut x = 0;
        while x < width {
            let left = frame.get_pixel(x, y);
            let right = frame.get_pixel((x + 1).min(width - 1), y);

            let (y0, u0, v0) = rgb_to_yuv(left[0], left[1], left[2]);
            let (y1, u1, v1) = rgb_to_yuv(right[0], right[1], right[2]);

            out.extend_from_slice(&[
                y0,
                ((u0 as u16 + u1 as u16) / 2) as u8,
                y1,
                ((v0 as u16 + v1 as u16) / 2) as u8,
            ]);
            x += 2;
        }
    }
}

/// BT.601 full-range RGB to YUV.
fn rgb_to_yuv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let (r, g, b) = (r as f32, g as f32, b as f32);
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let u = -0.147 * r - 0.289 * g + 0.436 * b + 128.0;
    let v = 0.615 * r - 0.515 * g - 0.100 * b + 128.0;
    (
        y.clamp(0.0, 255.0) as u8,
        u.clamp(0.0, 255.0) as u8,
        v.clamp(0.0, 255.0) as u8,
    )
}

impl DisplaySink for LoopbackSink {
    fn publish(&mut self, frame: RgbImage) -> Result<()> {
        let frame = if frame.dimensions() == (self.width, self.height) {
            frame
        } else {
            imageops::resize(&frame, self.width, self.height, FilterType::Triangle)
        };

        pack_yuyv(&frame, &mut self.packed);
        self.device
            .write_all(&self.packed)
            .context("Failed to write frame to loopback device")
    }
}
