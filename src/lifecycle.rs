//! The stream lifecycle state machine (§4.7): `Idle -> BuffersReady -> Streaming ->
//! Draining -> Idle`, reacting to UVC STREAMON/STREAMOFF/DISCONNECT events.

use crate::endpoint::{Source, UvcOutputEndpoint};
use crate::error::Result;
use crate::kernel::raw;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    BuffersReady,
    Streaming,
    Draining,
}

pub struct LifecycleCoordinator {
    pub state: StreamState,
}

impl LifecycleCoordinator {
    pub fn new() -> Self {
        Self { state: StreamState::Idle }
    }

    /// Idempotent per invariant 7: STREAMON while already streaming is a no-op.
    pub fn on_stream_on(&mut self, uvc: &mut UvcOutputEndpoint, source: &mut Source, buffer_count: u32) -> Result<()> {
        if self.state != StreamState::Idle {
            return Ok(());
        }

        let actual = crate::kernel::request_buffers(
            uvc.fd(),
            raw::V4L2_BUF_TYPE_VIDEO_OUTPUT,
            raw::V4L2_MEMORY_USERPTR,
            buffer_count,
        )?;
        uvc.ring = crate::buffer::Ring::with_capacity(actual);

        match source {
            Source::Capture(capture) => {
                capture.start_streaming(actual)?;
            }
            Source::Framebuffer(_) | Source::Image(_) => {
                // Empty buffers are queued by the pipeline's fill routine on first write.
            }
        }

        self.state = StreamState::BuffersReady;
        crate::kernel::stream_on(uvc.fd(), raw::V4L2_BUF_TYPE_VIDEO_OUTPUT)?;
        uvc.streaming = true;
        Ok(())
    }

    pub fn mark_first_buffer_queued(&mut self) {
        if self.state == StreamState::BuffersReady {
            self.state = StreamState::Streaming;
        }
    }

    /// Idempotent per invariant 7: STREAMOFF on an already-Idle endpoint is a no-op.
    pub fn on_stream_off(&mut self, uvc: &mut UvcOutputEndpoint, source: &mut Source) -> Result<()> {
        if self.state == StreamState::Idle {
            return Ok(());
        }
        self.state = StreamState::Draining;

        if let Source::Capture(capture) = source {
            capture.stop_streaming()?;
        }

        if uvc.streaming {
            crate::kernel::stream_off(uvc.fd(), raw::V4L2_BUF_TYPE_VIDEO_OUTPUT)?;
        }
        crate::kernel::request_buffers(uvc.fd(), raw::V4L2_BUF_TYPE_VIDEO_OUTPUT, raw::V4L2_MEMORY_USERPTR, 0)?;
        uvc.ring.clear();
        uvc.streaming = false;
        uvc.qbuf_count = 0;
        uvc.dqbuf_count = 0;

        self.state = StreamState::Idle;
        Ok(())
    }

    pub fn is_streaming(&self) -> bool {
        self.state == StreamState::Streaming
    }

    /// True once buffers have been allocated and STREAMON issued (`BuffersReady` or
    /// `Streaming`): the pipeline must watch the UVC/source FDs starting here, not only
    /// once a buffer has actually flowed, or no buffer would ever be able to flow.
    pub fn is_active(&self) -> bool {
        matches!(self.state, StreamState::BuffersReady | StreamState::Streaming)
    }
}

impl Default for LifecycleCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invariant7_streamoff_on_idle_is_noop() {
        let coordinator = LifecycleCoordinator::new();
        assert_eq!(coordinator.state, StreamState::Idle);
    }

    #[test]
    fn state_transitions_follow_buffersready_then_streaming() {
        let mut coordinator = LifecycleCoordinator::new();
        coordinator.state = StreamState::BuffersReady;
        coordinator.mark_first_buffer_queued();
        assert_eq!(coordinator.state, StreamState::Streaming);
    }

    #[test]
    fn is_active_covers_buffersready_and_streaming_but_not_idle_or_draining() {
        let mut coordinator = LifecycleCoordinator::new();
        assert!(!coordinator.is_active());
        coordinator.state = StreamState::BuffersReady;
        assert!(coordinator.is_active());
        coordinator.state = StreamState::Streaming;
        assert!(coordinator.is_active());
        coordinator.state = StreamState::Draining;
        assert!(!coordinator.is_active());
    }
}
