//! The frame-format table: the set of (format, frame size, interval) combinations this
//! gadget advertises to the host. Read-only after construction; indices are 1-based on
//! the wire, matching UVC's `bFormatIndex`/`bFrameIndex` convention.

/// A four-character pixel format code, e.g. `YUYV` or `MJPG`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCc(pub [u8; 4]);

impl FourCc {
    pub const YUYV: FourCc = FourCc(*b"YUYV");
    pub const MJPG: FourCc = FourCc(*b"MJPG");

    pub fn is_yuyv(&self) -> bool {
        *self == Self::YUYV
    }
}

/// One (format, frame size) entry together with the intervals it supports.
#[derive(Debug, Clone)]
pub struct FrameFormat {
    pub fourcc: FourCc,
    /// 1-based index into the format table.
    pub format_index: u8,
    /// 1-based index of this frame size within its format.
    pub frame_index: u8,
    pub width: u32,
    pub height: u32,
    /// Supported intervals in 100ns units, ascending.
    pub intervals: Vec<u32>,
    pub min_bitrate: u32,
    pub max_bitrate: u32,
    pub max_buffer_size: u32,
    pub capabilities: u8,
}

impl FrameFormat {
    pub fn default_interval(&self) -> u32 {
        self.intervals[0]
    }

    /// Computes `dwMaxVideoFrameSize` for this format/size, per §3: `w*h*2` for YUYV,
    /// otherwise the precomputed worst-case compressed size.
    pub fn max_video_frame_size(&self) -> u32 {
        if self.fourcc.is_yuyv() {
            self.width * self.height * 2
        } else {
            self.max_buffer_size
        }
    }

    /// Picks the smallest listed interval `>= requested`, falling back to the largest.
    pub fn select_interval(&self, requested: u32) -> u32 {
        self.intervals
            .iter()
            .copied()
            .find(|&iv| iv >= requested)
            .unwrap_or_else(|| *self.intervals.last().unwrap())
    }
}

/// The full set of formats advertised by this gadget. Guaranteed non-empty with dense,
/// 1-based `(format_index, frame_index)` pairs, each format having at least one frame.
#[derive(Debug, Clone)]
pub struct FormatTable {
    formats: Vec<FrameFormat>,
}

impl FormatTable {
    pub fn new(formats: Vec<FrameFormat>) -> Self {
        assert!(!formats.is_empty(), "format table must not be empty");
        Self { formats }
    }

    /// The default built-in table: a single YUYV format at two frame sizes, matching the
    /// defaults the original daemon ships with when no ConfigFS-derived table is supplied.
    pub fn default_table() -> Self {
        Self::new(vec![
            FrameFormat {
                fourcc: FourCc::YUYV,
                format_index: 1,
                frame_index: 1,
                width: 640,
                height: 480,
                intervals: vec![333_333, 666_666], // 30fps, 15fps
                min_bitrate: 640 * 480 * 2 * 8 * 30,
                max_bitrate: 640 * 480 * 2 * 8 * 30,
                max_buffer_size: 640 * 480 * 2,
                capabilities: 0,
            },
            FrameFormat {
                fourcc: FourCc::YUYV,
                format_index: 1,
                frame_index: 2,
                width: 320,
                height: 240,
                intervals: vec![333_333],
                min_bitrate: 320 * 240 * 2 * 8 * 30,
                max_bitrate: 320 * 240 * 2 * 8 * 30,
                max_buffer_size: 320 * 240 * 2,
                capabilities: 0,
            },
        ])
    }

    pub fn format_count(&self) -> u8 {
        self.formats
            .iter()
            .map(|f| f.format_index)
            .max()
            .unwrap_or(0)
    }

    pub fn frame_count(&self, format_index: u8) -> u8 {
        self.formats
            .iter()
            .filter(|f| f.format_index == format_index)
            .map(|f| f.frame_index)
            .max()
            .unwrap_or(0)
    }

    pub fn get(&self, format_index: u8, frame_index: u8) -> Option<&FrameFormat> {
        self.formats
            .iter()
            .find(|f| f.format_index == format_index && f.frame_index == frame_index)
    }

    /// Clamps `(format_index, frame_index)` into range, per §9 (clamp, not reject).
    /// A zero/too-low index saturates to 1 (first); an over-range index saturates to the
    /// max, matching `uvc_fill_streaming_control`'s `clamp(bIndex, 1, N)`.
    pub fn clamp(&self, format_index: u8, frame_index: u8) -> (u8, u8) {
        let fmt_count = self.format_count();
        let fi = if format_index == 0 {
            1
        } else {
            format_index.min(fmt_count)
        };
        let frame_count = self.frame_count(fi);
        let fr = if frame_index == 0 {
            1
        } else {
            frame_index.min(frame_count)
        };
        (fi, fr)
    }

    pub fn first(&self) -> &FrameFormat {
        self.get(1, 1).expect("format table always has (1, 1)")
    }

    pub fn last(&self) -> &FrameFormat {
        let fmt_count = self.format_count();
        let frame_count = self.frame_count(fmt_count);
        self.get(fmt_count, frame_count)
            .expect("format/frame count derived from the table itself")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_keeps_in_range_indices() {
        let table = FormatTable::default_table();
        assert_eq!(table.clamp(1, 1), (1, 1));
        assert_eq!(table.clamp(1, 2), (1, 2));
    }

    #[test]
    fn clamp_saturates_over_range_to_last() {
        let table = FormatTable::default_table();
        assert_eq!(table.clamp(99, 99), (1, 2));
    }

    #[test]
    fn clamp_saturates_zero_to_first() {
        let table = FormatTable::default_table();
        assert_eq!(table.clamp(0, 0), (1, 1));
    }

    #[test]
    fn interval_selection_picks_least_upper_bound() {
        let table = FormatTable::default_table();
        let fmt = table.get(1, 1).unwrap();
        assert_eq!(fmt.select_interval(100_000), 333_333);
        assert_eq!(fmt.select_interval(400_000), 666_666);
        assert_eq!(fmt.select_interval(10_000_000), 666_666);
    }

    #[test]
    fn max_video_frame_size_for_yuyv() {
        let table = FormatTable::default_table();
        let fmt = table.get(1, 1).unwrap();
        assert_eq!(fmt.max_video_frame_size(), 640 * 480 * 2);
    }
}
