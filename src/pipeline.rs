//! The cooperative, single-threaded, `select()`-driven pipeline loop (§4.5, §5).

use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use nix::sys::select::{select, FdSet};
use nix::sys::signal::{self, SigHandler, Signal};
use nix::sys::time::{TimeVal, TimeValLike};

use crate::control_mapping::ControlTable;
use crate::endpoint::{Source, UvcOutputEndpoint};
use crate::error::{Action, Result};
use crate::format::FormatTable;
use crate::kernel::{self, raw, UvcEvent};
use crate::lifecycle::LifecycleCoordinator;
use crate::request::RequestProcessor;
use crate::stats::Stats;

/// Process-wide cancellation flag, mutated from the SIGINT/SIGTERM handler (§9).
static TERMINATE: AtomicBool = AtomicBool::new(false);

extern "C" fn on_terminate_signal(_: i32) {
    TERMINATE.store(true, Ordering::Release);
}

fn install_signal_handlers() -> Result<()> {
    let handler = SigHandler::Handler(on_terminate_signal);
    unsafe {
        signal::signal(Signal::SIGINT, handler).during(Action::Streaming)?;
        signal::signal(Signal::SIGTERM, handler).during(Action::Streaming)?;
    }
    Ok(())
}

use crate::error::ResultExt;

pub struct Pipeline {
    pub uvc: UvcOutputEndpoint,
    pub source: Source,
    pub controls: ControlTable,
    pub formats: FormatTable,
    pub coordinator: LifecycleCoordinator,
    pub buffer_count: u32,
    pub stats: Stats,
    shutdown_requested: bool,
}

impl Pipeline {
    pub fn new(uvc: UvcOutputEndpoint, source: Source, controls: ControlTable, formats: FormatTable, buffer_count: u32) -> Self {
        Self {
            uvc,
            source,
            controls,
            formats,
            coordinator: LifecycleCoordinator::new(),
            buffer_count,
            stats: Stats::new(),
            shutdown_requested: false,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        install_signal_handlers()?;

        loop {
            if TERMINATE.load(Ordering::Acquire) {
                log::info!("terminate signal received, shutting down");
                break;
            }

            std::thread::sleep(Duration::from_millis(1));

            let mut readfds = FdSet::new();
            let mut writefds = FdSet::new();
            let mut exceptfds = FdSet::new();

            let uvc_fd = self.uvc.fd();
            exceptfds.insert(uvc_fd);
            if self.coordinator.is_active() {
                writefds.insert(uvc_fd);
            }

            let source_readable = self.coordinator.is_active().then(|| self.source.readable_fd()).flatten();
            if let Some(fd) = source_readable {
                readfds.insert(fd);
            }

            let timeout = if self.coordinator.is_active() {
                Some(TimeVal::seconds(1))
            } else {
                None
            };
            let highest = [Some(uvc_fd), source_readable].iter().copied().flatten().max();

            let ready = match highest {
                Some(max_fd) => select_wrapper(max_fd, &mut readfds, &mut writefds, &mut exceptfds, timeout),
                None => continue,
            };

            match ready {
                Ok(_) => {}
                Err(e) if e.is_interrupted() => continue,
                Err(_) => break,
            }

            if exceptfds.contains(uvc_fd) {
                self.drain_events()?;
            }

            if writefds.contains(uvc_fd) {
                self.push_frame()?;
            }

            if let Some(fd) = source_readable {
                if readfds.contains(fd) {
                    self.on_source_readable(fd)?;
                }
            }

            self.stats.tick();
        }

        self.coordinator.on_stream_off(&mut self.uvc, &mut self.source)?;
        Ok(())
    }

    fn drain_events(&mut self) -> Result<()> {
        while let Some(event) = kernel::dequeue_event(self.uvc.fd())? {
            match event {
                UvcEvent::Setup(req) => {
                    RequestProcessor::handle_setup(&mut self.uvc, &mut self.controls, &self.formats, req)?;
                }
                UvcEvent::Data(data) => {
                    let outcome = RequestProcessor::handle_data(&mut self.uvc, &mut self.controls, &self.formats, data)?;
                    for write in outcome.control_writes {
                        self.apply_control_write(write.capture_id, write.value);
                    }
                    if let Some(change) = outcome.format_change {
                        self.apply_format_change(change);
                    }
                }
                UvcEvent::Connect => {
                    log::debug!("UVC CONNECT");
                }
                UvcEvent::Disconnect => {
                    log::info!("UVC DISCONNECT");
                    self.shutdown_requested = true;
                    self.coordinator.on_stream_off(&mut self.uvc, &mut self.source)?;
                }
                UvcEvent::StreamOn => {
                    log::info!("UVC STREAMON");
                    self.coordinator.on_stream_on(&mut self.uvc, &mut self.source, self.buffer_count)?;
                }
                UvcEvent::StreamOff => {
                    log::info!("UVC STREAMOFF");
                    self.coordinator.on_stream_off(&mut self.uvc, &mut self.source)?;
                }
                UvcEvent::Other(_) => {}
            }
        }
        Ok(())
    }

    fn apply_control_write(&mut self, capture_id: u32, value: i32) {
        if let Source::Capture(capture) = &self.source {
            if let Err(e) = capture.set_control(capture_id, value) {
                log::warn!("failed to forward control write: {}", e);
            }
        }
    }

    fn apply_format_change(&mut self, change: crate::request::FormatChange) {
        if let Source::Capture(capture) = &self.source {
            let fourcc = u32::from_le_bytes(change.fourcc.0);
            if let Err(e) = capture.apply_format(fourcc, change.width, change.height) {
                log::warn!("failed to apply negotiated format to source: {}", e);
            }
        }
    }

    fn push_frame(&mut self) -> Result<()> {
        match &mut self.source {
            Source::Capture(_) => self.push_frame_capture(),
            Source::Framebuffer(_) => self.push_frame_framebuffer(),
            Source::Image(_) => self.push_frame_image(),
        }
    }

    /// §4.5 Capture→UVC: the outstanding-buffers gate prevents dequeuing on the UVC side
    /// until at least two have been queued.
    fn push_frame_capture(&mut self) -> Result<()> {
        if !self.shutdown_requested && self.uvc.dqbuf_count + 1 >= self.uvc.qbuf_count {
            return Ok(());
        }
        match kernel::try_dequeue_buffer(self.uvc.fd(), raw::V4L2_BUF_TYPE_VIDEO_OUTPUT, raw::V4L2_MEMORY_USERPTR)? {
            Some(buf) => {
                self.uvc.dqbuf_count += 1;
                if buf.flags & raw::V4L2_BUF_FLAG_ERROR != 0 {
                    log::warn!("output buffer flagged with error, tearing down stream");
                    self.shutdown_requested = true;
                    self.coordinator.on_stream_off(&mut self.uvc, &mut self.source)?;
                    return Ok(());
                }
                if let Source::Capture(capture) = &mut self.source {
                    capture.requeue(buf.index)?;
                }
                self.stats.buffer_processed();
            }
            None => {}
        }
        Ok(())
    }

    fn on_source_readable(&mut self, _fd: RawFd) -> Result<()> {
        match &mut self.source {
            Source::Capture(capture) => {
                if let Some(index) = capture.try_dequeue()? {
                    let (ptr, len, bytesused) = {
                        let buf = capture.ring.get(index).expect("dequeued index is in range");
                        (
                            buf.start.map(|p| p.as_ptr()).unwrap_or(std::ptr::null_mut()),
                            buf.length,
                            buf.length as u32,
                        )
                    };
                    match kernel::queue_userptr_buffer(self.uvc.fd(), raw::V4L2_BUF_TYPE_VIDEO_OUTPUT, index, ptr, len, bytesused) {
                        Ok(()) => {
                            self.uvc.qbuf_count += 1;
                            self.coordinator.mark_first_buffer_queued();
                        }
                        Err(e) if e.is_disconnect() => {
                            log::info!("host disconnected during enqueue");
                            self.shutdown_requested = true;
                            self.coordinator.on_stream_off(&mut self.uvc, &mut self.source)?;
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
            Source::Image(image) => {
                image.poll_reload()?;
            }
            Source::Framebuffer(_) => unreachable!("framebuffer source has no readable fd"),
        }
        Ok(())
    }

    fn push_frame_framebuffer(&mut self) -> Result<()> {
        let now = Instant::now();
        let due = match &self.source {
            Source::Framebuffer(fb) => fb.due(now),
            _ => false,
        };
        if !due {
            return Ok(());
        }
        let buf = match kernel::try_dequeue_buffer(self.uvc.fd(), raw::V4L2_BUF_TYPE_VIDEO_OUTPUT, raw::V4L2_MEMORY_USERPTR)? {
            Some(b) => b,
            None => return Ok(()),
        };
        self.uvc.dqbuf_count += 1;
        if let Some(output) = self.uvc.ring.get_mut(buf.index) {
            if let (Source::Framebuffer(fb), Some(slice)) = (&mut self.source, output.as_mut_slice()) {
                let written = fb.fill_yuyv(now, slice);
                output.bytes_used = written;
            }
            let ptr = output.start.map(|p| p.as_ptr()).unwrap_or(std::ptr::null_mut());
            let len = output.length;
            let used = output.bytes_used as u32;
            kernel::queue_userptr_buffer(self.uvc.fd(), raw::V4L2_BUF_TYPE_VIDEO_OUTPUT, buf.index, ptr, len, used)?;
            self.uvc.qbuf_count += 1;
            self.coordinator.mark_first_buffer_queued();
            self.stats.buffer_processed();
        }
        Ok(())
    }

    fn push_frame_image(&mut self) -> Result<()> {
        let now = Instant::now();
        let due = match &self.source {
            Source::Image(image) => image.due(now),
            _ => false,
        };
        if !due {
            return Ok(());
        }
        let buf = match kernel::try_dequeue_buffer(self.uvc.fd(), raw::V4L2_BUF_TYPE_VIDEO_OUTPUT, raw::V4L2_MEMORY_USERPTR)? {
            Some(b) => b,
            None => return Ok(()),
        };
        self.uvc.dqbuf_count += 1;
        if let Some(output) = self.uvc.ring.get_mut(buf.index) {
            if let (Source::Image(image), Some(slice)) = (&mut self.source, output.as_mut_slice()) {
                let n = image.payload.len().min(slice.len());
                slice[..n].copy_from_slice(&image.payload[..n]);
                output.bytes_used = n;
                image.mark_filled(now);
            }
            let ptr = output.start.map(|p| p.as_ptr()).unwrap_or(std::ptr::null_mut());
            let len = output.length;
            let used = output.bytes_used as u32;
            kernel::queue_userptr_buffer(self.uvc.fd(), raw::V4L2_BUF_TYPE_VIDEO_OUTPUT, buf.index, ptr, len, used)?;
            self.uvc.qbuf_count += 1;
            self.coordinator.mark_first_buffer_queued();
            self.stats.buffer_processed();
        }
        Ok(())
    }
}

fn select_wrapper(
    highest: RawFd,
    readfds: &mut FdSet,
    writefds: &mut FdSet,
    exceptfds: &mut FdSet,
    timeout: Option<TimeVal>,
) -> Result<usize> {
    let mut timeout = timeout;
    select(highest + 1, Some(readfds), Some(writefds), Some(exceptfds), timeout.as_mut())
        .map(|n| n as usize)
        .during(Action::Multiplexing)
}
