//! The UVC gadget video-output endpoint: the sink device the host actually streams
//! from, plus the cross-phase request state and streaming negotiator that live on it.

use std::fs::File;
use std::os::unix::io::AsRawFd;
use std::path::Path;

use crate::buffer::Ring;
use crate::control::StreamingControl;
use crate::error::Result;
use crate::kernel::{self, raw};
use crate::streaming::StreamingNegotiator;

/// What a pending `SET_CUR` is waiting on for its DATA phase (§3 UvcRequestState,
/// §9 "request cross-phase state as a small sum type").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingControlCs {
    None,
    Probe,
    Commit,
    /// A plain (unit, control-code) write; resolved against the control table on DATA.
    Plain { unit: crate::control::Entity, code: u8 },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UvcRequestState {
    pub pending: Option<PendingCs>,
    pub last_error: u8,
}

#[derive(Debug, Clone, Copy)]
pub struct PendingCs {
    pub cs: PendingControlCs,
    pub expected_length: u16,
}

impl Default for PendingControlCs {
    fn default() -> Self {
        Self::None
    }
}

pub struct UvcOutputEndpoint {
    pub device: File,
    pub ring: Ring,
    pub streaming: bool,
    pub qbuf_count: u64,
    pub dqbuf_count: u64,
    pub negotiator: StreamingNegotiator,
    pub request_state: UvcRequestState,
    /// The format/frame/interval latched at the last successful COMMIT.
    pub active_format: Option<(u8, u8)>,
    pub last_frame_time: Option<std::time::Instant>,
    pub frames_in_window: u32,
}

impl UvcOutputEndpoint {
    pub fn open(path: &Path, maxpacket: u32, mult: u32, burst: u32) -> Result<Self> {
        let device = kernel::open_nonblocking(path)?;
        let fd = device.as_raw_fd();
        for ty in [
            raw::UVC_EVENT_SETUP,
            raw::UVC_EVENT_DATA,
            raw::UVC_EVENT_STREAMON,
            raw::UVC_EVENT_STREAMOFF,
        ] {
            kernel::subscribe_event(fd, ty)?;
        }
        Ok(Self {
            device,
            ring: Ring::empty(),
            streaming: false,
            qbuf_count: 0,
            dqbuf_count: 0,
            negotiator: StreamingNegotiator::new(maxpacket, mult, burst),
            request_state: UvcRequestState::default(),
            active_format: None,
            last_frame_time: None,
            frames_in_window: 0,
        })
    }

    pub fn fd(&self) -> std::os::unix::io::RawFd {
        self.device.as_raw_fd()
    }

    pub fn send_response(&self, length: i32, data: &[u8]) -> Result<()> {
        let mut resp = raw::UvcRequestData {
            length,
            data: [0; 60],
        };
        let n = data.len().min(60);
        resp.data[..n].copy_from_slice(&data[..n]);
        kernel::send_response(self.fd(), &resp)
    }

    pub fn send_error(&self, error_length: i32) -> Result<()> {
        kernel::send_response(
            self.fd(),
            &raw::UvcRequestData {
                length: error_length,
                data: [0; 60],
            },
        )
    }

    pub fn send_streaming_control(&self, sc: &StreamingControl) -> Result<()> {
        self.send_response(StreamingControl::WIRE_LEN as i32, sc.as_bytes_le())
    }
}
