use anyhow::{Context, Result};
use clap::Parser;
use log::{info, LevelFilter};
use lumeload_strip_lib::{FrameRenderer, PixelSink, SharedStripState, StateSync};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

mod terminal;

use terminal::{ConsoleObserver, TerminalStrip};

/// Preview the LumeLoad strip in a 24-bit color terminal.
///
/// Control messages given with `--send` are applied in order, exactly as if
/// they had arrived on the device's WebSocket, then the strip is rendered
/// for the requested duration.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Number of pixels on the simulated strip.
    #[arg(short, long, default_value_t = 60)]
    pixels: usize,

    /// Minimum time between rendered frames (ms).
    #[arg(short, long, default_value_t = 20)]
    interval_ms: u64,

    /// How long to render after applying the messages (ms).
    #[arg(short, long, default_value_t = 3000)]
    duration_ms: u64,

    /// JSON control message, e.g. '{"ledEnabled":true,"ledIndex":30}'. Repeatable.
    #[arg(short = 's', long = "send", value_name = "JSON")]
    messages: Vec<String>,

    /// Log protocol details to stderr.
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    let level = if args.verbose { LevelFilter::Debug } else { LevelFilter::Info };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    if let Err(e) = run(&args) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let started = Instant::now();
    let strip = Arc::new(SharedStripState::new(args.pixels));
    let sync = StateSync::new(Arc::clone(&strip), ConsoleObserver::new(io::stdout()));

    println!("-> (connect)");
    println!("<- {}", sync.on_client_connect());
    for message in &args.messages {
        println!("-> {message}");
        if sync.on_message(message.as_bytes()).is_none() {
            println!("   (ignored)");
        }
    }

    let mut renderer = FrameRenderer::new(
        strip,
        TerminalStrip::new(io::stdout(), args.pixels),
        Duration::from_millis(args.interval_ms),
        started,
    );
    renderer.sink_mut().clear().context("Failed to draw strip")?;

    let deadline = Instant::now() + Duration::from_millis(args.duration_ms);
    loop {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        renderer.tick(now);
        let wait = renderer
            .time_until_next_frame(Instant::now())
            .min(deadline.saturating_duration_since(Instant::now()));
        std::thread::sleep(wait);
    }

    let dropped = renderer.dropped_frames();
    let sink = renderer.sink_mut();
    sink.finish().context("Failed to finish output")?;
    info!("Rendered {} frames ({dropped} dropped)", sink.commits());
    Ok(())
}
