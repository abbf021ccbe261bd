//! UVC control-protocol vocabulary: request codes, entities, and the 34-byte
//! probe/commit streaming-control payload (UVC 1.5 ch. 4.3.1.1).

use std::mem;

use bitflags::bitflags;
use zerocopy::{AsBytes, FromBytes};

/// `bRequest` values for UVC class-specific control requests (UVC 1.5 Table 4-30).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
pub enum UvcRequest {
    Undefined = 0x00,
    SetCur = 0x01,
    GetCur = 0x81,
    GetMin = 0x82,
    GetMax = 0x83,
    GetRes = 0x84,
    GetLen = 0x85,
    GetInfo = 0x86,
    GetDef = 0x87,
}

impl UvcRequest {
    pub fn from_u8(b: u8) -> Option<Self> {
        Some(match b {
            0x00 => Self::Undefined,
            0x01 => Self::SetCur,
            0x81 => Self::GetCur,
            0x82 => Self::GetMin,
            0x83 => Self::GetMax,
            0x84 => Self::GetRes,
            0x85 => Self::GetLen,
            0x86 => Self::GetInfo,
            0x87 => Self::GetDef,
            _ => return None,
        })
    }
}

/// Low byte of `wIndex`: which kind of interface the control request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceKind {
    Control,
    Streaming,
}

/// High byte of `wIndex` on the Control interface: which entity owns the control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    /// Entity 0: the interface itself, which only answers `REQUEST_ERROR_CODE_CONTROL`.
    Interface,
    InputTerminal,
    ProcessingUnit,
}

impl Entity {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(Self::Interface),
            1 => Some(Self::InputTerminal),
            2 => Some(Self::ProcessingUnit),
            _ => None,
        }
    }
}

pub const REQUEST_ERROR_CODE_CONTROL: u8 = 0x02;

/// `bRequestErrorCode` values returned from `REQUEST_ERROR_CODE_CONTROL` (UVC 1.5 Table 4-16).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RequestErrorCode {
    NoError = 0x00,
    NotReady = 0x01,
    WrongState = 0x02,
    Power = 0x03,
    OutOfRange = 0x04,
    InvalidUnit = 0x05,
    InvalidControl = 0x06,
    InvalidRequest = 0x07,
    InvalidValue = 0x08,
}

/// Camera Terminal control selectors (UVC 1.5 Table 4-3), as exposed on the Input Terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
#[allow(dead_code)]
pub enum CameraTerminalControl {
    ScanningMode = 0x01,
    AutoExposureMode = 0x02,
    AutoExposurePriority = 0x03,
    ExposureTimeAbsolute = 0x04,
    ExposureTimeRelative = 0x05,
    FocusAbsolute = 0x06,
    FocusRelative = 0x07,
    IrisAbsolute = 0x09,
    IrisRelative = 0x0a,
    ZoomAbsolute = 0x0b,
    ZoomRelative = 0x0c,
    PanTiltAbsolute = 0x0d,
    PanTiltRelative = 0x0e,
    RollAbsolute = 0x0f,
    RollRelative = 0x10,
    FocusAuto = 0x11,
    PrivacyControl = 0x12,
}

/// Processing Unit control selectors (UVC 1.5 Table 4-5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
#[allow(dead_code)]
pub enum ProcessingUnitControl {
    BacklightCompensation = 0x01,
    Brightness = 0x02,
    Contrast = 0x03,
    Gain = 0x04,
    PowerLineFrequency = 0x05,
    Hue = 0x06,
    Saturation = 0x07,
    Sharpness = 0x08,
    Gamma = 0x09,
    WhiteBalanceTemperature = 0x0a,
    WhiteBalanceComponent = 0x0b,
    WhiteBalanceTemperatureAuto = 0x0c,
    WhiteBalanceComponentAuto = 0x0d,
    DigitalMultiplier = 0x0e,
    DigitalMultiplierLimit = 0x0f,
    HueAuto = 0x10,
    AnalogVideoStandard = 0x11,
    AnalogLockStatus = 0x12,
    ContrastAuto = 0x13,
}

/// Video Streaming control selectors (UVC 1.5 Table 4-47).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
#[allow(dead_code)]
pub enum StreamingControlSelector {
    Probe = 0x01,
    Commit = 0x02,
    StillProbe = 0x03,
    StillCommit = 0x04,
    StillImageTrigger = 0x05,
    StreamErrorCode = 0x06,
    GenerateKeyFrame = 0x07,
    UpdateFrameSegment = 0x08,
    SynchDelay = 0x09,
}

impl StreamingControlSelector {
    pub fn from_u8(b: u8) -> Option<Self> {
        Some(match b {
            0x01 => Self::Probe,
            0x02 => Self::Commit,
            0x03 => Self::StillProbe,
            0x04 => Self::StillCommit,
            0x05 => Self::StillImageTrigger,
            0x06 => Self::StreamErrorCode,
            0x07 => Self::GenerateKeyFrame,
            0x08 => Self::UpdateFrameSegment,
            0x09 => Self::SynchDelay,
            _ => return None,
        })
    }
}

bitflags! {
    /// `bmHint` field: which of the negotiated fields the host insists on keeping fixed.
    #[derive(Default)]
    pub struct ProbeHint: u16 {
        const FRAME_INTERVAL = 1 << 0;
        const KEY_FRAME_RATE = 1 << 1;
        const P_FRAME_RATE = 1 << 2;
        const COMP_QUALITY = 1 << 3;
        const COMP_WINDOW_SIZE = 1 << 4;
    }
}

/// The 34-byte Video Probe and Commit Control payload exchanged during streaming negotiation
/// (UVC 1.5 Table 4-75). Field names mirror the wire spec; values are little-endian in memory
/// since the struct is only ever accessed on little-endian targets this daemon runs on.
#[derive(Default, AsBytes, FromBytes, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C, packed)]
#[allow(non_snake_case)]
pub struct StreamingControl {
    pub bmHint: u16,
    pub bFormatIndex: u8,
    pub bFrameIndex: u8,
    pub dwFrameInterval: u32,
    pub wKeyFrameRate: u16,
    pub wPFrameRate: u16,
    pub wCompQuality: u16,
    pub wCompWindowSize: u16,
    pub wDelay: u16,
    pub dwMaxVideoFrameSize: u32,
    pub dwMaxPayloadTransferSize: u32,
    pub dwClockFrequency: u32,
    pub bmFramingInfo: u8,
    pub bPreferedVersion: u8,
    pub bMinVersion: u8,
    pub bMaxVersion: u8,
}

impl StreamingControl {
    pub const WIRE_LEN: usize = mem::size_of::<Self>();

    pub fn zeroed() -> Self {
        Self::default()
    }

    pub fn as_bytes_le(&self) -> &[u8] {
        zerocopy::AsBytes::as_bytes(self)
    }

    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        <Self as FromBytes>::read_from_prefix(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_length_is_34_bytes() {
        assert_eq!(StreamingControl::WIRE_LEN, 34);
    }

    #[test]
    fn request_decoding_round_trips_known_codes() {
        assert_eq!(UvcRequest::from_u8(0x01), Some(UvcRequest::SetCur));
        assert_eq!(UvcRequest::from_u8(0x87), Some(UvcRequest::GetDef));
        assert_eq!(UvcRequest::from_u8(0xAB), None);
    }

    #[test]
    fn entity_decoding() {
        assert_eq!(Entity::from_id(0), Some(Entity::Interface));
        assert_eq!(Entity::from_id(1), Some(Entity::InputTerminal));
        assert_eq!(Entity::from_id(2), Some(Entity::ProcessingUnit));
        assert_eq!(Entity::from_id(3), None);
    }
}
