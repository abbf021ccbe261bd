//! Raw `#[repr(C)]` mirrors of the V4L2/UVC kernel structures and the `nix`-generated
//! ioctl wrappers over them. Field layouts follow `linux/videodev2.h` and the UVC gadget
//! function's `uvc_request_data`/`uvc_event`; this module performs no interpretation,
//! it only describes the wire shape, matching the sibling `LinuxVideo` crate's `raw.rs`.

#![allow(non_camel_case_types)]

use nix::{ioctl_read, ioctl_readwrite, ioctl_write_ptr};

pub const V4L2_BUF_TYPE_VIDEO_CAPTURE: u32 = 1;
pub const V4L2_BUF_TYPE_VIDEO_OUTPUT: u32 = 2;

pub const V4L2_MEMORY_MMAP: u32 = 1;
pub const V4L2_MEMORY_USERPTR: u32 = 2;

pub const V4L2_CAP_VIDEO_CAPTURE: u32 = 0x0000_0001;
pub const V4L2_CAP_VIDEO_OUTPUT: u32 = 0x0000_0002;
pub const V4L2_CAP_STREAMING: u32 = 0x0400_0000;

pub const V4L2_BUF_FLAG_ERROR: u32 = 0x0000_0040;

pub const V4L2_CTRL_FLAG_DISABLED: u32 = 0x0000_0001;

pub const V4L2_EVENT_PRIVATE_START: u32 = 0x0800_0000;

pub const UVC_EVENT_CONNECT: u32 = V4L2_EVENT_PRIVATE_START;
pub const UVC_EVENT_DISCONNECT: u32 = V4L2_EVENT_PRIVATE_START + 1;
pub const UVC_EVENT_STREAMON: u32 = V4L2_EVENT_PRIVATE_START + 2;
pub const UVC_EVENT_STREAMOFF: u32 = V4L2_EVENT_PRIVATE_START + 3;
pub const UVC_EVENT_SETUP: u32 = V4L2_EVENT_PRIVATE_START + 4;
pub const UVC_EVENT_DATA: u32 = V4L2_EVENT_PRIVATE_START + 5;

pub const USB_TYPE_MASK: u8 = 0x60;
pub const USB_TYPE_STANDARD: u8 = 0x00;
pub const USB_TYPE_CLASS: u8 = 0x20;
pub const USB_RECIP_MASK: u8 = 0x1f;
pub const USB_RECIP_INTERFACE: u8 = 0x01;
pub const USB_DIR_IN: u8 = 0x80;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Capability {
    pub driver: [u8; 16],
    pub card: [u8; 32],
    pub bus_info: [u8; 32],
    pub version: u32,
    pub capabilities: u32,
    pub device_caps: u32,
    pub reserved: [u32; 3],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct PixFormat {
    pub width: u32,
    pub height: u32,
    pub pixelformat: u32,
    pub field: u32,
    pub bytesperline: u32,
    pub sizeimage: u32,
    pub colorspace: u32,
    pub priv_: u32,
    pub flags: u32,
    pub ycbcr_enc: u32,
    pub quantization: u32,
    pub xfer_func: u32,
}

/// `v4l2_format` with the union collapsed to its `pix` variant, the only one this
/// daemon uses (no multiplanar, no sliced VBI, ...).
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Format {
    pub type_: u32,
    pub fmt: PixFormat,
    // The real kernel union is 200 bytes; pad so the struct's total size matches what
    // VIDIOC_G_FMT/S_FMT expect regardless of which member the kernel touches.
    pub _pad: [u8; 200 - std::mem::size_of::<PixFormat>()],
}

impl Default for Format {
    fn default() -> Self {
        Self {
            type_: 0,
            fmt: PixFormat::default(),
            _pad: [0u8; 200 - std::mem::size_of::<PixFormat>()],
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestBuffers {
    pub count: u32,
    pub type_: u32,
    pub memory: u32,
    pub capabilities: u32,
    pub reserved: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TimeVal {
    pub tv_sec: i64,
    pub tv_usec: i64,
}

impl Default for TimeVal {
    fn default() -> Self {
        Self { tv_sec: 0, tv_usec: 0 }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeCode {
    pub type_: u32,
    pub flags: u32,
    pub frames: u8,
    pub seconds: u8,
    pub minutes: u8,
    pub hours: u8,
    pub userbits: [u8; 4],
}

/// `v4l2_buffer`, with the memory-type union collapsed to a plain `u64` wide enough to
/// hold either `offset` (MMAP) or `userptr` (USERPTR).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Buffer {
    pub index: u32,
    pub type_: u32,
    pub bytesused: u32,
    pub flags: u32,
    pub field: u32,
    pub timestamp: TimeVal,
    pub timecode: TimeCode,
    pub sequence: u32,
    pub memory: u32,
    pub m_union: u64,
    pub length: u32,
    pub reserved2: u32,
    pub request_fd: i32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryCtrl {
    pub id: u32,
    pub type_: u32,
    pub name: [u8; 32],
    pub minimum: i32,
    pub maximum: i32,
    pub step: i32,
    pub default_value: i32,
    pub flags: u32,
    pub reserved: [u32; 2],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Control {
    pub id: u32,
    pub value: i32,
}

pub const V4L2_CTRL_FLAG_NEXT_CTRL: u32 = 0x8000_0000;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct EventSubscription {
    pub type_: u32,
    pub id: u32,
    pub flags: u32,
    pub reserved: [u32; 5],
}

/// `v4l2_event`, with the inner union collapsed to a 64-byte blob; UVC events are
/// reinterpreted from that blob by `crate::kernel::uvc_event`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Event {
    pub type_: u32,
    pub u: [u8; 64],
    pub pending: u32,
    pub sequence: u32,
    pub timestamp: TimeSpec,
    pub id: u32,
    pub reserved: [u32; 8],
}

impl Default for Event {
    fn default() -> Self {
        Self {
            type_: 0,
            u: [0; 64],
            pending: 0,
            sequence: 0,
            timestamp: TimeSpec::default(),
            id: 0,
            reserved: [0; 8],
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeSpec {
    pub tv_sec: i64,
    pub tv_nsec: i64,
}

/// `struct usb_ctrlrequest` (linux/usb/ch9.h), carried in `uvc_event.req` on a SETUP event.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, Default)]
pub struct UsbCtrlRequest {
    pub b_request_type: u8,
    pub b_request: u8,
    pub w_value: u16,
    pub w_index: u16,
    pub w_length: u16,
}

/// `struct uvc_request_data`, carried in `uvc_event.data` on a DATA event and as the
/// payload of `UVCIOC_SEND_RESPONSE`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct UvcRequestData {
    pub length: i32,
    pub data: [u8; 60],
}

impl Default for UvcRequestData {
    fn default() -> Self {
        Self { length: 0, data: [0; 60] }
    }
}

ioctl_read!(querycap, b'V', 0, Capability);
ioctl_readwrite!(g_fmt, b'V', 4, Format);
ioctl_readwrite!(s_fmt, b'V', 5, Format);
ioctl_readwrite!(reqbufs, b'V', 8, RequestBuffers);
ioctl_readwrite!(querybuf, b'V', 9, Buffer);
ioctl_readwrite!(qbuf, b'V', 15, Buffer);
ioctl_readwrite!(dqbuf, b'V', 17, Buffer);
ioctl_write_ptr!(streamon, b'V', 18, u32);
ioctl_write_ptr!(streamoff, b'V', 19, u32);
ioctl_readwrite!(g_ctrl, b'V', 27, Control);
ioctl_readwrite!(s_ctrl, b'V', 28, Control);
ioctl_readwrite!(queryctrl, b'V', 36, QueryCtrl);
ioctl_readwrite!(subscribe_event, b'V', 90, EventSubscription);
ioctl_readwrite!(unsubscribe_event, b'V', 91, EventSubscription);
ioctl_read!(dqevent, b'V', 89, Event);
ioctl_write_ptr!(uvc_send_response, b'U', 1, UvcRequestData);
