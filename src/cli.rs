//! CLI surface (§6): source selection, output device, buffer/frame parameters, and the
//! debug/FPS/LED flags. Mutually-exclusive source selection is enforced by `clap`.

use std::path::PathBuf;

use clap::Parser;

use crate::buffer::{MAX_BUFFERS, MIN_BUFFERS};

#[derive(Debug, Parser)]
#[command(name = "uvc-gadget", about = "Userspace UVC gadget daemon")]
pub struct Args {
    /// V4L2 capture device to use as the video source, e.g. /dev/video0.
    #[arg(short = 'd', long, group = "source")]
    pub capture_device: Option<PathBuf>,

    /// Linux framebuffer device to use as the video source, e.g. /dev/fb0.
    #[arg(short = 'b', long, group = "source")]
    pub framebuffer_device: Option<PathBuf>,

    /// Static image file (MJPEG or raw YUYV) to use as the video source.
    #[arg(short = 'i', long, group = "source")]
    pub image_file: Option<PathBuf>,

    /// UVC gadget video output device, e.g. /dev/video1.
    #[arg(short = 'u', long)]
    pub uvc_device: PathBuf,

    /// Number of buffers in each streaming ring (2-32).
    #[arg(short = 'n', long, default_value_t = 4, value_parser = parse_buffer_count)]
    pub buffer_count: u32,

    /// Framebuffer/image source framerate in frames per second (1-60).
    #[arg(short = 'r', long, default_value_t = 15, value_parser = parse_framerate)]
    pub framerate: u32,

    /// Framebuffer bits per pixel (16, 24, or 32); ignored for other sources.
    #[arg(long, default_value_t = 32)]
    pub framebuffer_bpp: u32,

    /// Framebuffer/image width in pixels; required for those sources.
    #[arg(long, default_value_t = 640)]
    pub width: u32,

    /// Framebuffer/image height in pixels; required for those sources.
    #[arg(long, default_value_t = 480)]
    pub height: u32,

    /// Enable verbose (debug-level) logging.
    #[arg(short = 'v', long)]
    pub debug: bool,

    /// Print a frames-per-second counter to the log every 2s.
    #[arg(short = 'f', long)]
    pub show_fps: bool,

    /// GPIO line driving a status LED, blinked while streaming.
    #[arg(short = 'l', long)]
    pub status_led_pin: Option<String>,

    /// Blink the status LED this many times on startup (1-20).
    #[arg(short = 'x', long, default_value_t = 1)]
    pub blink_on_startup: u32,
}

fn parse_buffer_count(s: &str) -> Result<u32, String> {
    let n: u32 = s.parse().map_err(|_| "not a number".to_string())?;
    if (MIN_BUFFERS..=MAX_BUFFERS).contains(&n) {
        Ok(n)
    } else {
        Err(format!("buffer count must be between {} and {}", MIN_BUFFERS, MAX_BUFFERS))
    }
}

fn parse_framerate(s: &str) -> Result<u32, String> {
    let n: u32 = s.parse().map_err(|_| "not a number".to_string())?;
    if (1..=60).contains(&n) {
        Ok(n)
    } else {
        Err("framerate must be between 1 and 60".to_string())
    }
}

/// The fully validated runtime configuration, as consumed by the daemon.
#[derive(Debug, Clone)]
pub struct Settings {
    pub source: SourceSelection,
    pub uvc_device: PathBuf,
    pub buffer_count: u32,
    pub framerate: u32,
    pub debug: bool,
    pub show_fps: bool,
    pub status_led_pin: Option<String>,
    pub blink_on_startup: u32,
}

#[derive(Debug, Clone)]
pub enum SourceSelection {
    Capture(PathBuf),
    Framebuffer { path: PathBuf, width: u32, height: u32, bpp: u32 },
    Image { path: PathBuf },
}

impl Settings {
    pub fn from_args(args: Args) -> Result<Self, String> {
        let source = if let Some(path) = args.capture_device {
            SourceSelection::Capture(path)
        } else if let Some(path) = args.framebuffer_device {
            SourceSelection::Framebuffer {
                path,
                width: args.width,
                height: args.height,
                bpp: args.framebuffer_bpp,
            }
        } else if let Some(path) = args.image_file {
            SourceSelection::Image { path }
        } else {
            return Err("exactly one of --capture-device, --framebuffer-device, --image-file is required".into());
        };

        Ok(Self {
            source,
            uvc_device: args.uvc_device,
            buffer_count: args.buffer_count,
            framerate: args.framerate,
            debug: args.debug,
            show_fps: args.show_fps,
            status_led_pin: args.status_led_pin,
            blink_on_startup: args.blink_on_startup.clamp(1, 20),
        })
    }
}
