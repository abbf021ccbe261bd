//! Endpoint types: the tagged-variant video source (§9 "polymorphic source") and the
//! single UVC output sink every variant feeds.

pub mod capture;
pub mod framebuffer;
pub mod image;
pub mod uvc_output;

use std::os::unix::io::RawFd;

pub use capture::CaptureEndpoint;
pub use framebuffer::FramebufferEndpoint;
pub use image::ImageEndpoint;
pub use uvc_output::UvcOutputEndpoint;

/// The video source, exactly one of three flavors. Expressed as a tagged variant with
/// a shared capability set rather than a class hierarchy, per §9.
pub enum Source {
    Capture(CaptureEndpoint),
    Framebuffer(FramebufferEndpoint),
    Image(ImageEndpoint),
}

impl Source {
    /// The FD the pipeline loop should watch for readability while streaming: the
    /// capture device's FD for `Capture`, the inotify FD for `Image`, and `None` for
    /// `Framebuffer` (it is paced by wall-clock, not readiness).
    pub fn readable_fd(&self) -> Option<RawFd> {
        match self {
            Source::Capture(c) => Some(std::os::unix::io::AsRawFd::as_raw_fd(&c.device)),
            Source::Image(i) => Some(i.watch_fd()),
            Source::Framebuffer(_) => None,
        }
    }
}
