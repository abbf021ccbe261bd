use std::{fmt, io};

use nix::errno::Errno;

pub struct Error {
    action: Option<Action>,
    kind: ErrorKind,
}

impl Error {
    pub(crate) fn with_action(kind: impl Into<ErrorKind>, action: Action) -> Self {
        Self {
            action: Some(action),
            kind: kind.into(),
        }
    }

    /// Whether this error represents the kernel reporting that the host went away.
    pub(crate) fn is_disconnect(&self) -> bool {
        matches!(&self.kind, ErrorKind::Errno(Errno::ENODEV))
    }

    pub(crate) fn is_interrupted(&self) -> bool {
        matches!(&self.kind, ErrorKind::Errno(Errno::EINTR))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(action) = &self.action {
            write!(f, "error while {}: ", action)?;
        }

        match &self.kind {
            ErrorKind::Errno(e) => write!(f, "{}", e),
            ErrorKind::Io(e) => write!(f, "{}", e),
            ErrorKind::Other(e) => write!(f, "{}", e),
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub(crate) enum ErrorKind {
    Errno(Errno),
    Io(io::Error),
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl From<Box<dyn std::error::Error + Send + Sync>> for ErrorKind {
    fn from(v: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Self::Other(v)
    }
}

impl From<String> for ErrorKind {
    fn from(s: String) -> Self {
        Self::Other(s.into())
    }
}

impl From<&'_ str> for ErrorKind {
    fn from(s: &str) -> Self {
        Self::Other(s.into())
    }
}

impl From<Errno> for ErrorKind {
    fn from(e: Errno) -> Self {
        Self::Errno(e)
    }
}

impl From<io::Error> for ErrorKind {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// A list of actions during which this daemon might encounter errors.
#[derive(Debug)]
pub(crate) enum Action {
    OpeningDevice,
    QueryingCapabilities,
    SettingFormat,
    QueryingControl,
    ReadingControl,
    WritingControl,
    RequestingBuffers,
    MappingBuffer,
    Enqueuing,
    Dequeuing,
    Streaming,
    SubscribingEvents,
    DequeuingEvent,
    SendingResponse,
    WatchingFile,
    Multiplexing,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::OpeningDevice => "opening device",
            Action::QueryingCapabilities => "querying device capabilities",
            Action::SettingFormat => "setting video format",
            Action::QueryingControl => "querying a device control",
            Action::ReadingControl => "reading a device control",
            Action::WritingControl => "writing a device control",
            Action::RequestingBuffers => "requesting buffers",
            Action::MappingBuffer => "mapping a buffer",
            Action::Enqueuing => "enqueuing a buffer",
            Action::Dequeuing => "dequeuing a buffer",
            Action::Streaming => "toggling streaming state",
            Action::SubscribingEvents => "subscribing to device events",
            Action::DequeuingEvent => "dequeuing a device event",
            Action::SendingResponse => "sending a control response",
            Action::WatchingFile => "watching a file for changes",
            Action::Multiplexing => "waiting on file descriptors",
        };
        f.write_str(s)
    }
}

pub(crate) trait ResultExt<T, E> {
    fn during(self, action: Action) -> Result<T>;
}

impl<T, E: Into<ErrorKind>> ResultExt<T, E> for std::result::Result<T, E> {
    fn during(self, action: Action) -> Result<T> {
        self.map_err(|e| Error::with_action(e, action))
    }
}

pub(crate) fn err<T>(err: impl Into<ErrorKind>, action: Action) -> Result<T> {
    Err(Error::with_action(err, action))
}
