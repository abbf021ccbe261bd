//! The static image-file source endpoint: watches one file for close-write
//! notifications and reloads its bytes into a cached payload (§4.5 "Image→UVC", S5).

use std::fs;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};
use std::time::Instant;

use nix::sys::inotify::{AddWatchFlags, InitFlags, Inotify, InotifyEvent};

use crate::error::{err, Action, Result, ResultExt};

pub struct ImageEndpoint {
    path: PathBuf,
    inotify: Inotify,
    pub payload: Vec<u8>,
    frame_interval: std::time::Duration,
    last_fill: Option<Instant>,
}

impl ImageEndpoint {
    pub fn open(path: &Path, framerate: u32) -> Result<Self> {
        let payload = fs::read(path).during(Action::OpeningDevice)?;
        let inotify = Inotify::init(InitFlags::IN_NONBLOCK).during(Action::WatchingFile)?;
        inotify
            .add_watch(path, AddWatchFlags::IN_CLOSE_WRITE)
            .during(Action::WatchingFile)?;
        Ok(Self {
            path: path.to_owned(),
            inotify,
            payload,
            frame_interval: std::time::Duration::from_millis(1000 / framerate.max(1) as u64),
            last_fill: None,
        })
    }

    pub fn watch_fd(&self) -> RawFd {
        self.inotify.as_raw_fd()
    }

    /// Drains pending inotify events and reloads the payload if any close-write fired.
    pub fn poll_reload(&mut self) -> Result<bool> {
        let events = match self.inotify.read_events() {
            Ok(events) => events,
            Err(nix::errno::Errno::EAGAIN) => return Ok(false),
            Err(e) => return err(e, Action::WatchingFile),
        };
        let changed = events.iter().any(InotifyEvent::is_close_write_ish);
        if changed {
            self.payload = fs::read(&self.path).during(Action::OpeningDevice)?;
        }
        Ok(changed)
    }

    pub fn due(&self, now: Instant) -> bool {
        match self.last_fill {
            None => true,
            Some(last) => now.duration_since(last) >= self.frame_interval,
        }
    }

    pub fn mark_filled(&mut self, now: Instant) {
        self.last_fill = Some(now);
    }
}

trait InotifyEventExt {
    fn is_close_write_ish(&self) -> bool;
}

impl InotifyEventExt for InotifyEvent {
    fn is_close_write_ish(&self) -> bool {
        self.mask.contains(AddWatchFlags::IN_CLOSE_WRITE)
    }
}
