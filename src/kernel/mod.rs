//! Kernel I/O shim: the narrow, fallible surface the rest of the daemon uses to talk to
//! V4L2 capture/output device nodes and the UVC gadget function's event/response ioctls.
//! Every call here does exactly one ioctl (plus the mandatory EINTR retry) and otherwise
//! performs no interpretation of the result.

pub mod raw;

use std::fs::{File, OpenOptions};
use std::mem;
use std::os::unix::io::{AsRawFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::ptr;

use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::libc::{self, MAP_FAILED, MAP_SHARED, PROT_READ, PROT_WRITE};

use crate::error::{err, Action, ResultExt};
pub use crate::error::Result;

/// Retries an ioctl-wrapping closure once on `EINTR`, per §6 ("EINTR is retried at the
/// caller").
fn retrying<T>(mut f: impl FnMut() -> nix::Result<T>) -> nix::Result<T> {
    loop {
        match f() {
            Err(Errno::EINTR) => continue,
            other => return other,
        }
    }
}

pub fn open_nonblocking(path: &Path) -> Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(OFlag::O_NONBLOCK.bits())
        .open(path)
        .during(Action::OpeningDevice)
}

pub fn query_capabilities(fd: RawFd) -> Result<raw::Capability> {
    let mut cap = raw::Capability::default();
    retrying(|| unsafe { raw::querycap(fd, &mut cap) }).during(Action::QueryingCapabilities)?;
    Ok(cap)
}

pub fn set_format(fd: RawFd, buf_type: u32, fourcc: u32, width: u32, height: u32) -> Result<raw::Format> {
    let mut fmt = raw::Format {
        type_: buf_type,
        ..Default::default()
    };
    fmt.fmt.width = width;
    fmt.fmt.height = height;
    fmt.fmt.pixelformat = fourcc;
    fmt.fmt.field = 1; // V4L2_FIELD_NONE
    fmt.fmt.sizeimage = if fourcc == u32::from_le_bytes(*b"YUYV") {
        width * height * 2
    } else {
        width * height
    };
    retrying(|| unsafe { raw::s_fmt(fd, &mut fmt) }).during(Action::SettingFormat)?;
    Ok(fmt)
}

pub fn request_buffers(fd: RawFd, buf_type: u32, memory: u32, count: u32) -> Result<u32> {
    let mut req = raw::RequestBuffers {
        count,
        type_: buf_type,
        memory,
        ..Default::default()
    };
    retrying(|| unsafe { raw::reqbufs(fd, &mut req) }).during(Action::RequestingBuffers)?;
    Ok(req.count)
}

pub fn query_buffer(fd: RawFd, buf_type: u32, memory: u32, index: u32) -> Result<raw::Buffer> {
    let mut buf = raw::Buffer {
        type_: buf_type,
        memory,
        index,
        ..Default::default()
    };
    retrying(|| unsafe { raw::querybuf(fd, &mut buf) }).during(Action::MappingBuffer)?;
    Ok(buf)
}

/// Maps an MMAP-memory buffer queried via [`query_buffer`]. The returned pointer is
/// valid until [`unmap`] is called with the same length.
pub fn map_buffer(fd: RawFd, buf: &raw::Buffer) -> Result<*mut u8> {
    let offset = buf.m_union as libc::off_t;
    let ptr = unsafe {
        libc::mmap(
            ptr::null_mut(),
            buf.length as libc::size_t,
            PROT_READ | PROT_WRITE,
            MAP_SHARED,
            fd,
            offset,
        )
    };
    if ptr == MAP_FAILED {
        return err(Errno::last(), Action::MappingBuffer);
    }
    Ok(ptr as *mut u8)
}

/// # Safety
/// `ptr`/`length` must be the exact pair previously returned by [`map_buffer`].
pub unsafe fn unmap(ptr: *mut u8, length: usize) -> Result<()> {
    if libc::munmap(ptr as *mut _, length as libc::size_t) != 0 {
        return err(Errno::last(), Action::MappingBuffer);
    }
    Ok(())
}

pub fn queue_mmap_buffer(fd: RawFd, buf_type: u32, index: u32) -> Result<()> {
    let mut buf = raw::Buffer {
        type_: buf_type,
        memory: raw::V4L2_MEMORY_MMAP,
        index,
        ..Default::default()
    };
    retrying(|| unsafe { raw::qbuf(fd, &mut buf) }).during(Action::Enqueuing)?;
    Ok(())
}

/// Enqueues a user-pointer buffer (the zero-copy capture-to-UVC handoff, §4.5): the
/// output device is told to use the capture ring's mapped memory directly.
pub fn queue_userptr_buffer(fd: RawFd, buf_type: u32, index: u32, ptr: *mut u8, length: usize, bytesused: u32) -> Result<()> {
    let mut buf = raw::Buffer {
        type_: buf_type,
        memory: raw::V4L2_MEMORY_USERPTR,
        index,
        m_union: ptr as u64,
        length: length as u32,
        bytesused,
        ..Default::default()
    };
    retrying(|| unsafe { raw::qbuf(fd, &mut buf) }).during(Action::Enqueuing)?;
    Ok(())
}

pub fn dequeue_buffer(fd: RawFd, buf_type: u32, memory: u32) -> Result<raw::Buffer> {
    let mut buf = raw::Buffer {
        type_: buf_type,
        memory,
        ..Default::default()
    };
    retrying(|| unsafe { raw::dqbuf(fd, &mut buf) }).during(Action::Dequeuing)?;
    Ok(buf)
}

/// Like [`dequeue_buffer`] but surfaces `EAGAIN` as `Ok(None)` instead of an error, for
/// the non-blocking "is a buffer ready" poll used by the pipeline loop.
pub fn try_dequeue_buffer(fd: RawFd, buf_type: u32, memory: u32) -> Result<Option<raw::Buffer>> {
    let mut buf = raw::Buffer {
        type_: buf_type,
        memory,
        ..Default::default()
    };
    match retrying(|| unsafe { raw::dqbuf(fd, &mut buf) }) {
        Ok(_) => Ok(Some(buf)),
        Err(Errno::EAGAIN) => Ok(None),
        Err(e) => err(e, Action::Dequeuing),
    }
}

pub fn stream_on(fd: RawFd, buf_type: u32) -> Result<()> {
    let mut t = buf_type;
    retrying(|| unsafe { raw::streamon(fd, &mut t) }).during(Action::Streaming)?;
    Ok(())
}

pub fn stream_off(fd: RawFd, buf_type: u32) -> Result<()> {
    let mut t = buf_type;
    retrying(|| unsafe { raw::streamoff(fd, &mut t) }).during(Action::Streaming)?;
    Ok(())
}

pub fn subscribe_event(fd: RawFd, event_type: u32) -> Result<()> {
    let mut sub = raw::EventSubscription {
        type_: event_type,
        ..Default::default()
    };
    retrying(|| unsafe { raw::subscribe_event(fd, &mut sub) }).during(Action::SubscribingEvents)?;
    Ok(())
}

/// One item of `v4l2_queryctrl` iteration (`VIDIOC_QUERYCTRL | V4L2_CTRL_FLAG_NEXT_CTRL`).
/// Returns `Ok(None)` once the kernel reports `EINVAL` (no more controls).
pub fn query_next_control(fd: RawFd, after_id: u32) -> Result<Option<raw::QueryCtrl>> {
    let mut q = raw::QueryCtrl {
        id: after_id | raw::V4L2_CTRL_FLAG_NEXT_CTRL,
        ..Default::default()
    };
    match retrying(|| unsafe { raw::queryctrl(fd, &mut q) }) {
        Ok(_) => Ok(Some(q)),
        Err(Errno::EINVAL) => Ok(None),
        Err(e) => err(e, Action::QueryingControl),
    }
}

pub fn get_control(fd: RawFd, id: u32) -> Result<i32> {
    let mut c = raw::Control { id, value: 0 };
    retrying(|| unsafe { raw::g_ctrl(fd, &mut c) }).during(Action::ReadingControl)?;
    Ok(c.value)
}

pub fn set_control(fd: RawFd, id: u32, value: i32) -> Result<()> {
    let mut c = raw::Control { id, value };
    retrying(|| unsafe { raw::s_ctrl(fd, &mut c) }).during(Action::WritingControl)?;
    Ok(())
}

/// A UVC event decoded from the raw `v4l2_event` union, per §4.1/§6.
#[derive(Debug, Clone)]
pub enum UvcEvent {
    Connect,
    Disconnect,
    StreamOn,
    StreamOff,
    Setup(raw::UsbCtrlRequest),
    Data(raw::UvcRequestData),
    /// A subscribed-but-unrecognized V4L2 event; ignored by the request processor.
    Other(u32),
}

/// Dequeues and decodes one event from the output endpoint's event FD (`VIDIOC_DQEVENT`).
/// Returns `Ok(None)` on `EAGAIN` (no event pending).
pub fn dequeue_event(fd: RawFd) -> Result<Option<UvcEvent>> {
    let mut ev = raw::Event::default();
    match retrying(|| unsafe { raw::dqevent(fd, &mut ev) }) {
        Ok(_) => Ok(Some(decode_event(&ev))),
        Err(Errno::EAGAIN) => Ok(None),
        Err(e) => err(e, Action::DequeuingEvent),
    }
}

fn decode_event(ev: &raw::Event) -> UvcEvent {
    match ev.type_ {
        raw::UVC_EVENT_CONNECT => UvcEvent::Connect,
        raw::UVC_EVENT_DISCONNECT => UvcEvent::Disconnect,
        raw::UVC_EVENT_STREAMON => UvcEvent::StreamOn,
        raw::UVC_EVENT_STREAMOFF => UvcEvent::StreamOff,
        raw::UVC_EVENT_SETUP => {
            let mut req = raw::UsbCtrlRequest::default();
            let size = mem::size_of::<raw::UsbCtrlRequest>();
            unsafe {
                ptr::copy_nonoverlapping(ev.u.as_ptr(), &mut req as *mut _ as *mut u8, size);
            }
            UvcEvent::Setup(req)
        }
        raw::UVC_EVENT_DATA => {
            let mut data = raw::UvcRequestData::default();
            let size = mem::size_of::<raw::UvcRequestData>();
            unsafe {
                ptr::copy_nonoverlapping(ev.u.as_ptr(), &mut data as *mut _ as *mut u8, size);
            }
            UvcEvent::Data(data)
        }
        other => UvcEvent::Other(other),
    }
}

/// Sends the response to a pending SETUP request via `UVCIOC_SEND_RESPONSE`.
pub fn send_response(fd: RawFd, response: &raw::UvcRequestData) -> Result<()> {
    let mut resp = *response;
    retrying(|| unsafe { raw::uvc_send_response(fd, &mut resp) }).during(Action::SendingResponse)?;
    Ok(())
}

pub fn as_raw_fd(f: &impl AsRawFd) -> RawFd {
    f.as_raw_fd()
}
