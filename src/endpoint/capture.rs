//! The V4L2 capture-device source endpoint: zero-copy handoff of memory-mapped buffers
//! into the UVC output's user-pointer ring (§4.5 "Capture→UVC").

use std::fs::File;
use std::os::unix::io::AsRawFd;
use std::path::Path;

use crate::buffer::{Buffer, Ring};
use crate::control_mapping::{CaptureControlInfo, ControlTable, V4l2ControlId};
use crate::error::Result;
use crate::kernel::{self, raw};

pub struct CaptureEndpoint {
    pub device: File,
    pub ring: Ring,
    pub streaming: bool,
    pub qbuf_count: u64,
    pub dqbuf_count: u64,
}

impl CaptureEndpoint {
    pub fn open(path: &Path) -> Result<Self> {
        let device = kernel::open_nonblocking(path)?;
        let cap = kernel::query_capabilities(device.as_raw_fd())?;
        if cap.capabilities & raw::V4L2_CAP_VIDEO_CAPTURE == 0
            || cap.capabilities & raw::V4L2_CAP_STREAMING == 0
        {
            return Err(crate::error::Error::with_action(
                "capture device lacks VIDEO_CAPTURE + STREAMING capability",
                crate::error::Action::QueryingCapabilities,
            ));
        }
        Ok(Self {
            device,
            ring: Ring::empty(),
            streaming: false,
            qbuf_count: 0,
            dqbuf_count: 0,
        })
    }

    /// Enumerates capture controls via `VIDIOC_QUERYCTRL | NEXT_CTRL` and populates any
    /// matching rows of the control table (§4.3 discovery-time capability probing).
    pub fn discover_controls(&self, table: &mut ControlTable) -> Result<()> {
        let mut after: u32 = 0;
        while let Some(q) = kernel::query_next_control(self.device.as_raw_fd(), after)? {
            after = q.id;
            let current = kernel::get_control(self.device.as_raw_fd(), q.id).unwrap_or(q.default_value);
            table.apply_capability(&CaptureControlInfo {
                id: q.id,
                min: q.minimum,
                max: q.maximum,
                step: q.step,
                default: q.default_value,
                current,
                disabled: q.flags & raw::V4L2_CTRL_FLAG_DISABLED != 0,
                data_type: crate::control_mapping::ControlType::Integer,
            });
        }
        Ok(())
    }

    pub fn set_control(&self, id: V4l2ControlId, value: i32) -> Result<()> {
        kernel::set_control(self.device.as_raw_fd(), id, value)
    }

    pub fn apply_format(&self, fourcc: u32, width: u32, height: u32) -> Result<()> {
        kernel::set_format(self.device.as_raw_fd(), raw::V4L2_BUF_TYPE_VIDEO_CAPTURE, fourcc, width, height)?;
        Ok(())
    }

    /// Requests `count` mmap buffers, maps them, and pre-queues the whole ring, per
    /// §4.7's "request ring on capture, pre-queue all capture buffers".
    pub fn start_streaming(&mut self, count: u32) -> Result<()> {
        let fd = self.device.as_raw_fd();
        let actual = kernel::request_buffers(fd, raw::V4L2_BUF_TYPE_VIDEO_CAPTURE, raw::V4L2_MEMORY_MMAP, count)?;
        let mut ring = Ring::with_capacity(actual);
        for index in 0..actual {
            let qb = kernel::query_buffer(fd, raw::V4L2_BUF_TYPE_VIDEO_CAPTURE, raw::V4L2_MEMORY_MMAP, index)?;
            let ptr = kernel::map_buffer(fd, &qb)?;
            ring.set(index, unsafe { Buffer::mapped(index, ptr, qb.length as usize) });
            kernel::queue_mmap_buffer(fd, raw::V4L2_BUF_TYPE_VIDEO_CAPTURE, index)?;
            self.qbuf_count += 1;
        }
        self.ring = ring;
        kernel::stream_on(fd, raw::V4L2_BUF_TYPE_VIDEO_CAPTURE)?;
        self.streaming = true;
        Ok(())
    }

    /// Dequeues a source buffer, if ready; non-blocking, mirrors `v4l2_uvc_video_process`.
    pub fn try_dequeue(&mut self) -> Result<Option<u32>> {
        let fd = self.device.as_raw_fd();
        match kernel::try_dequeue_buffer(fd, raw::V4L2_BUF_TYPE_VIDEO_CAPTURE, raw::V4L2_MEMORY_MMAP)? {
            Some(buf) => {
                self.dqbuf_count += 1;
                Ok(Some(buf.index))
            }
            None => Ok(None),
        }
    }

    pub fn requeue(&mut self, index: u32) -> Result<()> {
        kernel::queue_mmap_buffer(self.device.as_raw_fd(), raw::V4L2_BUF_TYPE_VIDEO_CAPTURE, index)?;
        self.qbuf_count += 1;
        Ok(())
    }

    pub fn stop_streaming(&mut self) -> Result<()> {
        if !self.streaming {
            return Ok(());
        }
        let fd = self.device.as_raw_fd();
        kernel::stream_off(fd, raw::V4L2_BUF_TYPE_VIDEO_CAPTURE)?;
        for buf in self.ring.iter() {
            if let Some(ptr) = buf.start {
                unsafe { kernel::unmap(ptr.as_ptr(), buf.length)? };
            }
        }
        kernel::request_buffers(fd, raw::V4L2_BUF_TYPE_VIDEO_CAPTURE, raw::V4L2_MEMORY_MMAP, 0)?;
        self.ring.clear();
        self.streaming = false;
        self.qbuf_count = 0;
        self.dqbuf_count = 0;
        Ok(())
    }
}
