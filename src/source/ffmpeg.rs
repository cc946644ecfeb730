use super::{staging, VideoInfo, VideoSource};
use anyhow::{anyhow, bail, Context, Result};
use image::RgbImage;
use std::ffi::OsString;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};

/// Video file decoded by an `ffmpeg` subprocess into raw RGB24 frames.
///
/// Rewinding restarts the subprocess; the frame buffer is reused.
pub struct FfmpegSource {
    info: VideoInfo,
    child: Child,
    stdout: ChildStdout,
    buffer: Vec<u8>,
    position: u64,
}

impl FfmpegSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            bail!("{} does not exist or is not a file", path.display());
        }

        let opened_path = staging::stage_if_needed(path)?;
        let (width, height) = probe_dimensions(&opened_path)
            .with_context(|| format!("Failed to probe {}", path.display()))?;

        tracing::info!(
            "Opening video {} ({}x{})",
            path.display(),
            width,
            height
        );

        let (child, stdout) = spawn_decoder(&opened_path)?;

        Ok(Self {
            info: VideoInfo {
                path: path.to_path_buf(),
                opened_path,
                width,
                height,
                channels: 3,
            },
            child,
            stdout,
            buffer: vec![0u8; width as usize * height as usize * 3],
            position: 0,
        })
    }

    fn stop_decoder(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl VideoSource for FfmpegSource {
    fn read_next(&mut self) -> Result<Option<RgbImage>> {
        match self.stdout.read_exact(&mut self.buffer) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => {
                tracing::debug!("ffmpeg reached end of {}", self.info.path.display());
                return Ok(None);
            }
            Err(err) => return Err(err).context("Failed to read frame from ffmpeg"),
        }

        self.position += 1;
        let frame = RgbImage::from_raw(self.info.width, self.info.height, self.buffer.clone())
            .ok_or_else(|| anyhow!("ffmpeg frame does not match {}x{}", self.info.width, self.info.height))?;
        Ok(Some(frame))
    }

    fn rewind(&mut self) -> Result<()> {
        self.stop_decoder();
        let (child, stdout) = spawn_decoder(&self.info.opened_path)?;
        self.child = child;
        self.stdout = stdout;
        self.position = 0;
        Ok(())
    }

    fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn position(&self) -> u64 {
        self.position
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        self.stop_decoder();
    }
}

/// Decoder arguments. Autorotation stays off so frames keep the coded
/// dimensions that `probe_dimensions` reports.
fn decoder_args(path: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-noautorotate", "-i"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(path.as_os_str().to_owned());
    args.extend(
        ["-an", "-pix_fmt", "rgb24", "-f", "rawvideo", "-"]
            .into_iter()
            .map(OsString::from),
    );
    args
}

fn spawn_decoder(path: &Path) -> Result<(Child, ChildStdout)> {
    let mut cmd = Command::new("ffmpeg");
    cmd.args(decoder_args(path))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());

    let mut child = cmd.spawn().context("Failed to spawn ffmpeg")?;
    let stdout = match child.stdout.take() {
        Some(stdout) => stdout,
        None => {
            let _ = child.kill();
            bail!("failed to capture ffmpeg stdout");
        }
    };
    Ok((child, stdout))
}

fn probe_dimensions(path: &Path) -> Result<(u32, u32)> {
    let output = Command::new("ffprobe")
        .arg("-v")
        .arg("error")
        .arg("-select_streams")
        .arg("v:0")
        .arg("-show_entries")
        .arg("stream=width,height")
        .arg("-of")
        .arg("csv=s=x:p=0")
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .context("Failed to run ffprobe")?;

    if !output.status.success() {
        bail!(
            "ffprobe failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    parse_dimensions(&String::from_utf8_lossy(&output.stdout))
}

/// Parse ffprobe's `WIDTHxHEIGHT` line.
fn parse_dimensions(text: &str) -> Result<(u32, u32)> {
    let line = text
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .ok_or_else(|| anyhow!("no video stream found"))?;

    let (w, h) = line
        .split_once('x')
        .ok_or_else(|| anyhow!("unexpected ffprobe output: {line}"))?;
    let width: u32 = w.trim().parse().context("invalid width")?;
    let height: u32 = h.trim().trim_end_matches('x').parse().context("invalid height")?;

    if width == 0 || height == 0 {
        bail!("video stream reports empty frames ({width}x{height})");
    }
    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_probe_line() {
        assert_eq!(parse_dimensions("1920x1080\n").unwrap(), (1920, 1080));
        assert_eq!(parse_dimensions("\n 640x480 \n").unwrap(), (640, 480));
    }

    #[test]
    fn tolerates_trailing_separator() {
        assert_eq!(parse_dimensions("320x240x\n").unwrap(), (320, 240));
    }

    #[test]
    fn rejects_missing_stream() {
        assert!(parse_dimensions("").is_err());
        assert!(parse_dimensions("garbage").is_err());
        assert!(parse_dimensions("0x480").is_err());
    }

    #[test]
    fn decoder_keeps_coded_orientation() {
        let args = decoder_args(Path::new("/videos/phone.mov"));
        let position = |flag: &str| args.iter().position(|a| a == flag);

        let input = position("-i").unwrap();
        assert!(position("-noautorotate").unwrap() < input);
        assert_eq!(args[input + 1], "/videos/phone.mov");
        assert_eq!(args.last().unwrap(), "-");
        assert!(position("rgb24").is_some());
    }

    #[test]
    fn missing_file_cannot_open() {
        let err = FfmpegSource::open("/no/such/video.mkv").err().unwrap();
        assert!(err.to_string().contains("does not exist"));
    }
}
