use anyhow::{anyhow, Context, Result};
use clap::Parser;
use motionfx::config::DEFAULT_MIN_REGION_AREA;
use motionfx::output::{display_channel, DisplayReceiver, DisplaySink, DumpSink, LoopbackSink};
use motionfx::source::StagingGuard;
use motionfx::{PlaybackConfig, PlaybackController, PlaybackEvent, StrategyKind};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Video file, image file, or directory of images to play
    input: PathBuf,

    /// Effect applied to every frame
    #[arg(short, long, value_enum, default_value_t = StrategyKind::Overlay)]
    strategy: StrategyKind,

    /// Target frames per second
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Smallest moving region, in pixels, that the blur will touch
    #[arg(long, default_value_t = DEFAULT_MIN_REGION_AREA)]
    min_area: u64,

    /// v4l2loopback device to publish frames to
    #[arg(short, long)]
    output_device: Option<PathBuf>,

    /// Loopback output width
    #[arg(long, default_value_t = 1280)]
    output_width: u32,

    /// Loopback output height
    #[arg(long, default_value_t = 720)]
    output_height: u32,

    /// Write every displayed frame as a PNG into this directory
    #[arg(long)]
    dump_dir: Option<PathBuf>,

    /// Play again from the first frame whenever the video ends
    #[arg(long)]
    repeat: bool,

    /// Read commands (toggle, overlay, blur, load <path>, status, quit) from stdin
    #[arg(short, long)]
    interactive: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    // Staged copies of non-ASCII inputs are removed when this goes out of scope.
    let _staging = StagingGuard;

    tracing::info!("motionfx starting");
    tracing::info!("Input: {}", args.input.display());
    tracing::info!("Strategy: {}", args.strategy);
    tracing::info!("Target FPS: {}", args.fps);

    let mut targets: Vec<Box<dyn DisplaySink>> = Vec::new();
    if let Some(device) = &args.output_device {
        let loopback = LoopbackSink::open(device, args.output_width, args.output_height)
            .context("Failed to initialize v4l2loopback output")?;
        targets.push(Box::new(loopback));
    }
    if let Some(dir) = &args.dump_dir {
        targets.push(Box::new(
            DumpSink::create(dir).context("Failed to initialize frame dump")?,
        ));
    }
    if targets.is_empty() {
        tracing::info!("No output configured, frames are processed and discarded");
    }

    let (sink, display) = display_channel();
    let display_thread = thread::spawn(move || run_display(display, targets));

    let mut config = PlaybackConfig::with_fps(args.fps);
    config.min_region_area = args.min_area;

    let mut controller = PlaybackController::new(config, sink);
    controller.select_strategy(args.strategy);

    let outcome = if args.interactive {
        run_interactive(&mut controller, &args.input)
    } else {
        run_once(&mut controller, &args.input, args.repeat)
    };

    // Dropping the controller joins the processing thread and closes the display channel.
    drop(controller);
    let shown = display_thread
        .join()
        .map_err(|_| anyhow!("display thread panicked"))??;
    tracing::info!("Displayed {} frames", shown);

    outcome
}

/// Display context: forwards published frames to the configured outputs.
fn run_display(display: DisplayReceiver, mut targets: Vec<Box<dyn DisplaySink>>) -> Result<u64> {
    let started = Instant::now();
    let mut shown = 0u64;

    for frame in display.iter() {
        targets.publish(frame)?;
        shown += 1;

        if shown % 30 == 0 {
            let fps = shown as f64 / started.elapsed().as_secs_f64();
            tracing::debug!("Displayed {} frames, {:.1} fps", shown, fps);
        }
    }

    Ok(shown)
}

/// Load, play to the end (or forever with `repeat`), exit.
fn run_once(controller: &mut PlaybackController, input: &Path, repeat: bool) -> Result<()> {
    let events = controller.events();
    controller.load(input)?;
    controller.toggle()?;

    for event in events.iter() {
        match event {
            PlaybackEvent::Ended { decode_error } => {
                if let Some(err) = decode_error {
                    tracing::warn!("Playback ended early: {}", err);
                }
                if !repeat {
                    break;
                }
                controller.toggle()?;
            }
            PlaybackEvent::Error(err) => return Err(err.into()),
            _ => {}
        }
    }

    Ok(())
}

fn run_interactive(controller: &mut PlaybackController, input: &Path) -> Result<()> {
    let events = controller.events();
    // A bad initial path is not fatal here; the user can `load` another one.
    let _ = controller.load(input);

    println!("Commands: toggle | overlay | blur | load <path> | status | quit");
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("Failed to read command")?;
        let (command, rest) = line
            .trim()
            .split_once(' ')
            .map(|(c, r)| (c, r.trim()))
            .unwrap_or((line.trim(), ""));

        match command {
            "" => {}
            "toggle" | "t" => {
                if let Ok(state) = controller.toggle() {
                    println!("{state:?}");
                }
            }
            "overlay" => controller.select_strategy(StrategyKind::Overlay),
            "blur" => controller.select_strategy(StrategyKind::SelectiveBlur),
            "load" | "l" if !rest.is_empty() => {
                let _ = controller.load(rest);
            }
            "status" | "s" => {
                println!("{:?}, strategy {}", controller.state(), controller.strategy());
            }
            "quit" | "q" => break,
            other => println!("Unknown command: {other}"),
        }

        for event in events.try_iter() {
            match event {
                PlaybackEvent::Error(err) => println!("Error: {err}"),
                other => println!("{other:?}"),
            }
        }
    }

    Ok(())
}
