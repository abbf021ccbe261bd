//! Bidirectional mapping between UVC control codes and the capture device's V4L2
//! controls, with host-visible (zero-based) ranges rescaled from capture-side ranges
//! that may be signed and non-zero-based.

use crate::control::{CameraTerminalControl, Entity, ProcessingUnitControl};

/// A single V4L2 control id, as enumerated from the capture device by `VIDIOC_QUERYCTRL`.
pub type V4l2ControlId = u32;

// A representative slice of V4L2_CID_* ids (linux/videodev2.h) needed to ground the
// mapping table below. Only the handful of controls this daemon forwards are listed;
// the rest of the V4L2 control space is irrelevant here.
pub mod v4l2_cid {
    use super::V4l2ControlId;

    pub const BRIGHTNESS: V4l2ControlId = 0x00980900;
    pub const CONTRAST: V4l2ControlId = 0x00980901;
    pub const SATURATION: V4l2ControlId = 0x00980902;
    pub const HUE: V4l2ControlId = 0x00980903;
    pub const AUTO_WHITE_BALANCE: V4l2ControlId = 0x0098090c;
    pub const GAMMA: V4l2ControlId = 0x00980910;
    pub const GAIN: V4l2ControlId = 0x00980913;
    pub const POWER_LINE_FREQUENCY: V4l2ControlId = 0x00980918;
    pub const WHITE_BALANCE_TEMPERATURE: V4l2ControlId = 0x0098091a;
    pub const SHARPNESS: V4l2ControlId = 0x0098091b;
    pub const BACKLIGHT_COMPENSATION: V4l2ControlId = 0x0098091c;
    pub const EXPOSURE_AUTO: V4l2ControlId = 0x009a0901;
    pub const EXPOSURE_ABSOLUTE: V4l2ControlId = 0x009a0902;
    pub const FOCUS_ABSOLUTE: V4l2ControlId = 0x009a090a;
    pub const FOCUS_AUTO: V4l2ControlId = 0x009a090c;
    pub const ZOOM_ABSOLUTE: V4l2ControlId = 0x009a090d;
    pub const PAN_ABSOLUTE: V4l2ControlId = 0x009a0908;
    pub const TILT_ABSOLUTE: V4l2ControlId = 0x009a0909;
    /// Not a real standalone V4L2 control on most webcams but present on some sensors;
    /// used here to ground the red/blue-balance mirroring special case (§4.3).
    pub const RED_BALANCE: V4l2ControlId = 0x0098090e;
    pub const BLUE_BALANCE: V4l2ControlId = 0x0098090f;
}

/// V4L2's reported control data type (`v4l2_queryctrl.type`), relevant subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlType {
    Integer,
    Boolean,
    Menu,
}

/// One row of the control-mapping table: a known UVC (unit, control code) pair and the
/// capture-side control id it forwards to, plus the runtime-populated ranges.
#[derive(Debug, Clone)]
pub struct ControlMapping {
    pub unit: Entity,
    pub uvc_code: u8,
    pub capture_id: V4l2ControlId,
    pub enabled: bool,
    pub data_type: ControlType,
    /// Host-visible current value, always zero-based.
    pub current: u32,
    pub length: u8,
    pub host_max: u32,
    pub step: u32,
    pub default: u32,
    /// Capture-side range, stored verbatim for the rescale formula; may be negative.
    pub capture_min: i32,
    pub capture_max: i32,
}

impl ControlMapping {
    fn new(unit: Entity, uvc_code: u8, capture_id: V4l2ControlId) -> Self {
        Self {
            unit,
            uvc_code,
            capture_id,
            enabled: false,
            data_type: ControlType::Integer,
            current: 0,
            length: 4,
            host_max: 0,
            step: 1,
            default: 0,
            capture_min: 0,
            capture_max: 0,
        }
    }

    pub fn host_min(&self) -> u32 {
        0
    }

    /// `capture-value = (host-value - host-min) * (capture-max - capture-min) /
    /// (host-max - host-min) + capture-min`, integer truncation toward zero.
    pub fn to_capture_value(&self, host_value: u32) -> i32 {
        let host_value = host_value.min(self.host_max);
        if self.host_max == 0 {
            return self.capture_min;
        }
        let span = (self.capture_max - self.capture_min) as i64;
        let scaled = (host_value as i64 * span) / self.host_max as i64;
        scaled as i32 + self.capture_min
    }

    pub fn to_host_value(&self, capture_value: i32) -> u32 {
        (capture_value - self.capture_min).max(0) as u32
    }

    /// True for the UVC white-balance-component control, whose single host value must be
    /// mirrored onto both the red-balance and blue-balance capture controls (§4.3).
    pub fn is_red_balance_mirror(&self) -> bool {
        self.capture_id == v4l2_cid::RED_BALANCE
    }
}

/// `control_mapping_size` (§9 OQ-4): the fixed number of rows the static table declares,
/// distinct from `ControlTable::len`, the dynamic count of rows actually enabled after
/// capability probing against a real capture device.
pub const STATIC_ROWS: usize = 15;

fn static_table() -> Vec<ControlMapping> {
    use CameraTerminalControl as CT;
    use ProcessingUnitControl as PU;

    vec![
        ControlMapping::new(
            Entity::InputTerminal,
            CT::ExposureTimeAbsolute as u8,
            v4l2_cid::EXPOSURE_ABSOLUTE,
        ),
        ControlMapping::new(
            Entity::InputTerminal,
            CT::AutoExposureMode as u8,
            v4l2_cid::EXPOSURE_AUTO,
        ),
        ControlMapping::new(
            Entity::InputTerminal,
            CT::FocusAbsolute as u8,
            v4l2_cid::FOCUS_ABSOLUTE,
        ),
        ControlMapping::new(Entity::InputTerminal, CT::FocusAuto as u8, v4l2_cid::FOCUS_AUTO),
        ControlMapping::new(
            Entity::InputTerminal,
            CT::ZoomAbsolute as u8,
            v4l2_cid::ZOOM_ABSOLUTE,
        ),
        ControlMapping::new(
            Entity::InputTerminal,
            CT::PanTiltAbsolute as u8,
            v4l2_cid::PAN_ABSOLUTE,
        ),
        ControlMapping::new(
            Entity::ProcessingUnit,
            PU::Brightness as u8,
            v4l2_cid::BRIGHTNESS,
        ),
        ControlMapping::new(Entity::ProcessingUnit, PU::Contrast as u8, v4l2_cid::CONTRAST),
        ControlMapping::new(
            Entity::ProcessingUnit,
            PU::Saturation as u8,
            v4l2_cid::SATURATION,
        ),
        ControlMapping::new(Entity::ProcessingUnit, PU::Hue as u8, v4l2_cid::HUE),
        ControlMapping::new(Entity::ProcessingUnit, PU::Sharpness as u8, v4l2_cid::SHARPNESS),
        ControlMapping::new(Entity::ProcessingUnit, PU::Gamma as u8, v4l2_cid::GAMMA),
        ControlMapping::new(Entity::ProcessingUnit, PU::Gain as u8, v4l2_cid::GAIN),
        ControlMapping::new(
            Entity::ProcessingUnit,
            PU::BacklightCompensation as u8,
            v4l2_cid::BACKLIGHT_COMPENSATION,
        ),
        // White-balance-component: a single UVC control whose value fans out to both
        // red-balance and blue-balance capture controls, see `is_red_balance_mirror`.
        ControlMapping::new(
            Entity::ProcessingUnit,
            PU::WhiteBalanceComponent as u8,
            v4l2_cid::RED_BALANCE,
        ),
    ]
}

/// The runtime control table: the static rows, enabled/ranged by capability probing
/// against an actually-opened capture device.
#[derive(Debug, Clone)]
pub struct ControlTable {
    rows: Vec<ControlMapping>,
}

/// What `VIDIOC_QUERYCTRL` reported for one control id, handed in by the capture-source
/// discovery step (kernel I/O is the caller's concern, not this module's).
#[derive(Debug, Clone, Copy)]
pub struct CaptureControlInfo {
    pub id: V4l2ControlId,
    pub min: i32,
    pub max: i32,
    pub step: i32,
    pub default: i32,
    pub current: i32,
    pub disabled: bool,
    pub data_type: ControlType,
}

impl ControlTable {
    pub fn new() -> Self {
        Self { rows: static_table() }
    }

    pub fn len(&self) -> usize {
        self.rows.iter().filter(|r| r.enabled).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Populates a row from a probed capture control, per the §4.3 formulas.
    pub fn apply_capability(&mut self, info: &CaptureControlInfo) {
        for row in self.rows.iter_mut().filter(|r| r.capture_id == info.id) {
            row.capture_min = info.min;
            row.capture_max = info.max;
            row.host_max = (info.max - info.min).max(0) as u32;
            row.default = (info.default - info.min).max(0) as u32;
            row.current = (info.current - info.min).max(0) as u32;
            row.step = info.step.max(0) as u32;
            row.enabled = !info.disabled;
            row.data_type = info.data_type;
        }
    }

    pub fn find(&self, unit: Entity, uvc_code: u8) -> Option<&ControlMapping> {
        self.rows
            .iter()
            .find(|r| r.unit == unit && r.uvc_code == uvc_code && r.enabled)
    }

    pub fn find_mut(&mut self, unit: Entity, uvc_code: u8) -> Option<&mut ControlMapping> {
        self.rows
            .iter_mut()
            .find(|r| r.unit == unit && r.uvc_code == uvc_code && r.enabled)
    }
}

impl Default for ControlTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brightness_info() -> CaptureControlInfo {
        CaptureControlInfo {
            id: v4l2_cid::BRIGHTNESS,
            min: -64,
            max: 64,
            step: 1,
            default: 0,
            current: 0,
            disabled: false,
            data_type: ControlType::Integer,
        }
    }

    #[test]
    fn s2_brightness_write_maps_to_capture_range() {
        let mut table = ControlTable::new();
        table.apply_capability(&brightness_info());
        let row = table
            .find(Entity::ProcessingUnit, ProcessingUnitControl::Brightness as u8)
            .unwrap();
        assert_eq!(row.host_max, 128);
        assert_eq!(row.to_capture_value(96), 32);
    }

    #[test]
    fn rescale_round_trip_is_identity_when_host_range_matches_span() {
        let mut table = ControlTable::new();
        table.apply_capability(&brightness_info());
        let row = table
            .find(Entity::ProcessingUnit, ProcessingUnitControl::Brightness as u8)
            .unwrap();
        for v in 0..=row.host_max {
            let capture = row.to_capture_value(v);
            assert_eq!(row.to_host_value(capture), v);
        }
    }

    #[test]
    fn rescale_is_monotone_non_decreasing() {
        let mut table = ControlTable::new();
        table.apply_capability(&brightness_info());
        let row = table
            .find(Entity::ProcessingUnit, ProcessingUnitControl::Brightness as u8)
            .unwrap();
        let mut prev = row.to_capture_value(0);
        for v in 1..=row.host_max {
            let cur = row.to_capture_value(v);
            assert!(cur >= prev);
            prev = cur;
        }
    }

    #[test]
    fn disabled_row_is_not_found() {
        let mut table = ControlTable::new();
        let mut info = brightness_info();
        info.disabled = true;
        table.apply_capability(&info);
        assert!(table
            .find(Entity::ProcessingUnit, ProcessingUnitControl::Brightness as u8)
            .is_none());
    }

    #[test]
    fn s6_unmapped_control_code_is_not_found() {
        let table = ControlTable::new();
        // 0xff is not assigned to any row in the static table.
        assert!(table.find(Entity::ProcessingUnit, 0xff).is_none());
    }

    #[test]
    fn red_balance_row_is_flagged_for_mirroring() {
        let table = ControlTable::new();
        let row = table
            .rows
            .iter()
            .find(|r| r.uvc_code == ProcessingUnitControl::WhiteBalanceComponent as u8)
            .unwrap();
        assert!(row.is_red_balance_mirror());
    }
}
