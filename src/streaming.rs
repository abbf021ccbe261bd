//! The probe/commit streaming negotiator (§4.4): builds and stores the two
//! `StreamingControl` instances exchanged during UVC stream negotiation.

use crate::control::StreamingControl;
use crate::format::FormatTable;

/// Which canned value to fill a `StreamingControl` with, per the GET_MIN/GET_MAX/GET_DEF
/// distinction in §4.4. `Current` fills from an explicit `(format, frame)` pair, used for
/// SET_CUR/DATA-phase recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillAction {
    /// format-index 0 / frame-index 0: resolves to the first (smallest) entry.
    Min,
    /// The last format and last frame in the table: the largest supported combination.
    Max,
    Current { format_index: u8, frame_index: u8 },
}

/// Negotiator holding the persistent `probe`/`commit` structs for one UVC output endpoint.
#[derive(Debug, Clone)]
pub struct StreamingNegotiator {
    pub probe: StreamingControl,
    pub commit: StreamingControl,
    maxpacket: u32,
    mult: u32,
    burst: u32,
}

impl StreamingNegotiator {
    pub fn new(maxpacket: u32, mult: u32, burst: u32) -> Self {
        Self {
            probe: StreamingControl::zeroed(),
            commit: StreamingControl::zeroed(),
            maxpacket,
            mult,
            burst,
        }
    }

    fn max_payload_transfer_size(&self) -> u32 {
        self.maxpacket * (self.mult + 1) * (self.burst + 1)
    }

    /// Fills a `StreamingControl` per §4.4: named parameters, no positional `(iframe,
    /// iformat)`/`(iformat, iframe)` ambiguity (§9 OQ-2).
    pub fn fill(&self, table: &FormatTable, action: FillAction) -> StreamingControl {
        let (format_index, frame_index) = match action {
            FillAction::Min => {
                let f = table.first();
                (f.format_index, f.frame_index)
            }
            FillAction::Max => {
                let f = table.last();
                (f.format_index, f.frame_index)
            }
            FillAction::Current {
                format_index,
                frame_index,
            } => table.clamp(format_index, frame_index),
        };

        let frame = table
            .get(format_index, frame_index)
            .expect("clamped indices always resolve");

        StreamingControl {
            bmHint: 1,
            bFormatIndex: format_index,
            bFrameIndex: frame_index,
            dwFrameInterval: frame.default_interval(),
            wKeyFrameRate: 0,
            wPFrameRate: 0,
            wCompQuality: 0,
            wCompWindowSize: 0,
            wDelay: 0,
            dwMaxVideoFrameSize: frame.max_video_frame_size(),
            dwMaxPayloadTransferSize: self.max_payload_transfer_size(),
            dwClockFrequency: 48_000_000,
            bmFramingInfo: 3,
            bPreferedVersion: 1,
            bMinVersion: 1,
            bMaxVersion: 1,
        }
    }

    /// Applies a host-provided `StreamingControl` from the DATA phase: clamps indices,
    /// selects the nearest supported interval, and recomputes `dwMaxVideoFrameSize`.
    /// Returns the corrected struct; does not itself decide whether this is probe or
    /// commit (the caller stores it into the right field and, on commit, latches format).
    pub fn negotiate(&self, table: &FormatTable, requested: &StreamingControl) -> StreamingControl {
        let (format_index, frame_index) = table.clamp(requested.bFormatIndex, requested.bFrameIndex);
        let frame = table
            .get(format_index, frame_index)
            .expect("clamped indices always resolve");
        let interval = frame.select_interval(requested.dwFrameInterval);

        StreamingControl {
            bmHint: requested.bmHint,
            bFormatIndex: format_index,
            bFrameIndex: frame_index,
            dwFrameInterval: interval,
            wKeyFrameRate: requested.wKeyFrameRate,
            wPFrameRate: requested.wPFrameRate,
            wCompQuality: requested.wCompQuality,
            wCompWindowSize: requested.wCompWindowSize,
            wDelay: requested.wDelay,
            dwMaxVideoFrameSize: frame.max_video_frame_size(),
            dwMaxPayloadTransferSize: self.max_payload_transfer_size(),
            dwClockFrequency: 48_000_000,
            bmFramingInfo: 3,
            bPreferedVersion: 1,
            bMinVersion: 1,
            bMaxVersion: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_def_resolves_to_first_format() {
        let negotiator = StreamingNegotiator::new(1024, 0, 0);
        let table = FormatTable::default_table();
        let sc = negotiator.fill(&table, FillAction::Min);
        assert_eq!(sc.bFormatIndex, 1);
        assert_eq!(sc.bFrameIndex, 1);
    }

    #[test]
    fn get_max_resolves_to_last_format() {
        let negotiator = StreamingNegotiator::new(1024, 0, 0);
        let table = FormatTable::default_table();
        let sc = negotiator.fill(&table, FillAction::Max);
        assert_eq!(sc.bFormatIndex, 1);
        assert_eq!(sc.bFrameIndex, 2);
    }

    #[test]
    fn s1_probe_commit_happy_path() {
        let negotiator = StreamingNegotiator::new(1024, 0, 0);
        let table = FormatTable::default_table();

        let mut requested = StreamingControl::zeroed();
        requested.bFormatIndex = 2;
        requested.bFrameIndex = 1;
        requested.dwFrameInterval = 333_333;

        let probe = negotiator.negotiate(&table, &requested);
        assert_eq!(probe.bFormatIndex, 1); // clamped: only one format exists
        assert_eq!(probe.bFrameIndex, 1);
        let max_video_frame_size = probe.dwMaxVideoFrameSize; // packed field: copy before comparing
        assert_eq!(max_video_frame_size, 640 * 480 * 2);

        let commit = negotiator.negotiate(&table, &probe);
        assert_eq!(commit, probe);
    }
}
