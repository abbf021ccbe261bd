//! A userspace USB Video Class (UVC) gadget daemon: bridges a V4L2 capture device, a
//! Linux framebuffer, or a static image file into a kernel UVC-gadget video output,
//! handling control negotiation, buffer pipelining, and stream lifecycle.

pub mod buffer;
pub mod cli;
pub mod control;
pub mod control_mapping;
pub mod endpoint;
pub mod error;
pub mod format;
pub mod kernel;
pub mod lifecycle;
pub mod pipeline;
pub mod pixel;
pub mod request;
pub mod stats;
pub mod streaming;

use cli::{Settings, SourceSelection};
use control_mapping::ControlTable;
use endpoint::{CaptureEndpoint, FramebufferEndpoint, ImageEndpoint, Source, UvcOutputEndpoint};
use error::Result;
use format::FormatTable;
use pipeline::Pipeline;

/// `dwMaxPayloadTransferSize` parameters handed to the streaming negotiator (§4.4): a
/// conservative high-speed bulk-endpoint sizing, since this daemon doesn't negotiate
/// isochronous bandwidth with the UDC directly.
const DEFAULT_MAXPACKET: u32 = 1024;
const DEFAULT_MULT: u32 = 0;
const DEFAULT_BURST: u32 = 0;

/// Builds a fully wired [`Pipeline`] from validated settings: opens the source and UVC
/// output devices, runs capture control discovery, and assembles the format table.
pub fn build(settings: &Settings) -> Result<Pipeline> {
    let uvc = UvcOutputEndpoint::open(&settings.uvc_device, DEFAULT_MAXPACKET, DEFAULT_MULT, DEFAULT_BURST)?;

    let mut controls = ControlTable::new();
    let source = match &settings.source {
        SourceSelection::Capture(path) => {
            let capture = CaptureEndpoint::open(path)?;
            capture.discover_controls(&mut controls)?;
            Source::Capture(capture)
        }
        SourceSelection::Framebuffer { path, width, height, bpp } => {
            Source::Framebuffer(FramebufferEndpoint::open(path, *width, *height, *bpp, settings.framerate)?)
        }
        SourceSelection::Image { path } => Source::Image(ImageEndpoint::open(path, settings.framerate)?),
    };

    let formats = FormatTable::default_table();

    Ok(Pipeline::new(uvc, source, controls, formats, settings.buffer_count))
}
