//! The UVC request processor (§4.1, §4.2, §4.4): decodes class SETUP requests, responds
//! via the output endpoint, and carries cross-phase state into the following DATA event.

use byteorder::{ByteOrder, LittleEndian};

use crate::control::{
    Entity, InterfaceKind, RequestErrorCode, StreamingControl, StreamingControlSelector, UvcRequest,
    REQUEST_ERROR_CODE_CONTROL,
};
use crate::control_mapping::{ControlTable, V4l2ControlId};
use crate::endpoint::uvc_output::{PendingCs, PendingControlCs, UvcOutputEndpoint};
use crate::error::Result;
use crate::format::FormatTable;
use crate::kernel::raw::{UsbCtrlRequest, UvcRequestData, USB_RECIP_INTERFACE, USB_RECIP_MASK, USB_TYPE_CLASS, USB_TYPE_MASK};
use crate::streaming::FillAction;

/// The kernel's "stall" sentinel: a negative response length provokes a control-pipe
/// stall on the wire (§4.1, §6).
const STALL: i32 = -1;

/// A write the request processor wants applied to the capture source. The processor
/// itself never touches the source device; the pipeline applies these (§4.1: "signal
/// the pipeline to push the change to the source").
#[derive(Debug, Clone, Copy)]
pub struct ControlWrite {
    pub capture_id: V4l2ControlId,
    pub value: i32,
}

/// A latched format change from a successful COMMIT, handed to the pipeline to apply
/// to the capture source (§4.1 DATA phase, "signal the pipeline to apply it").
#[derive(Debug, Clone, Copy)]
pub struct FormatChange {
    pub fourcc: crate::format::FourCc,
    pub width: u32,
    pub height: u32,
    pub interval: u32,
}

/// Scratch outputs accumulated while processing one event, consumed by the pipeline
/// loop after the call returns (§3 Events).
#[derive(Debug, Default)]
pub struct Outcome {
    pub control_writes: Vec<ControlWrite>,
    pub format_change: Option<FormatChange>,
}

pub struct RequestProcessor;

impl RequestProcessor {
    /// Decodes and handles one SETUP event. Writes a response unless the request is a
    /// SET whose completion will arrive as a DATA event (§4.1).
    pub fn handle_setup(
        uvc: &mut UvcOutputEndpoint,
        controls: &mut ControlTable,
        formats: &FormatTable,
        req: UsbCtrlRequest,
    ) -> Result<()> {
        if req.b_request_type & USB_TYPE_MASK != USB_TYPE_CLASS
            || req.b_request_type & USB_RECIP_MASK != USB_RECIP_INTERFACE
        {
            return Ok(()); // not a class/interface request: silently ignored (§4.1)
        }

        let entity_id = (req.w_index >> 8) as u8;
        let interface_kind = if (req.w_index & 0xff) == 0 {
            InterfaceKind::Control
        } else {
            InterfaceKind::Streaming
        };
        let cs = (req.w_value >> 8) as u8;
        let brequest = match UvcRequest::from_u8(req.b_request) {
            Some(r) => r,
            None => {
                uvc.request_state.last_error = RequestErrorCode::InvalidRequest as u8;
                uvc.send_error(STALL)?;
                return Ok(());
            }
        };

        match interface_kind {
            InterfaceKind::Control => {
                let entity = match Entity::from_id(entity_id) {
                    Some(e) => e,
                    None => {
                        uvc.request_state.last_error = RequestErrorCode::InvalidUnit as u8;
                        uvc.send_error(STALL)?;
                        return Ok(());
                    }
                };
                if entity == Entity::Interface {
                    return Self::handle_error_code_control(uvc, brequest);
                }
                Self::handle_plain_control(uvc, controls, entity, cs, brequest, req.w_length)
            }
            InterfaceKind::Streaming => Self::handle_streaming_control(uvc, formats, cs, brequest, req.w_length),
        }
    }

    fn handle_error_code_control(uvc: &mut UvcOutputEndpoint, req: UvcRequest) -> Result<()> {
        if req != UvcRequest::GetCur {
            uvc.request_state.last_error = RequestErrorCode::InvalidControl as u8;
            return uvc.send_error(STALL);
        }
        let _ = REQUEST_ERROR_CODE_CONTROL;
        let code = uvc.request_state.last_error;
        uvc.send_response(1, &[code])
    }

    /// §4.2: plain (unit, control-code) GET/SET handling.
    fn handle_plain_control(
        uvc: &mut UvcOutputEndpoint,
        controls: &mut ControlTable,
        unit: Entity,
        cs: u8,
        req: UvcRequest,
        w_length: u16,
    ) -> Result<()> {
        let row = match controls.find(unit, cs) {
            Some(r) => r.clone(),
            None => {
                uvc.request_state.last_error = RequestErrorCode::InvalidControl as u8;
                return uvc.send_error(STALL);
            }
        };

        uvc.request_state.last_error = RequestErrorCode::NoError as u8;
        match req {
            UvcRequest::GetMin => uvc.send_response(4, &row.host_min().to_le_bytes()),
            UvcRequest::GetMax => uvc.send_response(4, &row.host_max.to_le_bytes()),
            UvcRequest::GetCur => uvc.send_response(4, &row.current.to_le_bytes()),
            UvcRequest::GetDef => uvc.send_response(4, &row.default.to_le_bytes()),
            UvcRequest::GetRes => uvc.send_response(4, &row.step.to_le_bytes()),
            UvcRequest::GetInfo => uvc.send_response(1, &[0x03]), // GET | SET
            UvcRequest::GetLen => uvc.send_response(2, &(row.length as u16).to_le_bytes()),
            UvcRequest::SetCur => {
                uvc.request_state.pending = Some(PendingCs {
                    cs: PendingControlCs::Plain { unit, code: cs },
                    expected_length: w_length,
                });
                Ok(())
            }
            UvcRequest::Undefined => {
                uvc.request_state.last_error = RequestErrorCode::InvalidRequest as u8;
                uvc.send_error(STALL)
            }
        }
    }

    /// §4.4: streaming (probe/commit) GET/SET handling.
    fn handle_streaming_control(
        uvc: &mut UvcOutputEndpoint,
        formats: &FormatTable,
        cs: u8,
        req: UvcRequest,
        w_length: u16,
    ) -> Result<()> {
        let selector = match StreamingControlSelector::from_u8(cs) {
            Some(s @ (StreamingControlSelector::Probe | StreamingControlSelector::Commit)) => s,
            _ => {
                uvc.request_state.last_error = RequestErrorCode::InvalidControl as u8;
                return uvc.send_error(STALL);
            }
        };

        uvc.request_state.last_error = RequestErrorCode::NoError as u8;
        match req {
            UvcRequest::SetCur => {
                let pending_cs = match selector {
                    StreamingControlSelector::Probe => PendingControlCs::Probe,
                    _ => PendingControlCs::Commit,
                };
                uvc.request_state.pending = Some(PendingCs {
                    cs: pending_cs,
                    expected_length: w_length,
                });
                Ok(())
            }
            UvcRequest::GetCur | UvcRequest::GetMin => {
                let sc = match selector {
                    StreamingControlSelector::Probe => uvc.negotiator.probe,
                    _ => uvc.negotiator.commit,
                };
                uvc.send_streaming_control(&sc)
            }
            UvcRequest::GetMax => {
                let sc = uvc.negotiator.fill(formats, FillAction::Max);
                uvc.send_streaming_control(&sc)
            }
            UvcRequest::GetDef => {
                let sc = uvc.negotiator.fill(formats, FillAction::Min);
                uvc.send_streaming_control(&sc)
            }
            UvcRequest::GetRes => uvc.send_streaming_control(&StreamingControl::zeroed()),
            UvcRequest::GetLen => uvc.send_response(2, &(StreamingControl::WIRE_LEN as u16).to_le_bytes()),
            UvcRequest::GetInfo => uvc.send_response(1, &[0x03]),
            UvcRequest::Undefined => {
                uvc.request_state.last_error = RequestErrorCode::InvalidRequest as u8;
                uvc.send_error(STALL)
            }
        }
    }

    /// Handles a DATA event, dispatching on the pending cross-phase state recorded by
    /// the preceding SETUP (§4.1 "DATA phase").
    pub fn handle_data(
        uvc: &mut UvcOutputEndpoint,
        controls: &mut ControlTable,
        formats: &FormatTable,
        data: UvcRequestData,
    ) -> Result<Outcome> {
        let pending = match uvc.request_state.pending.take() {
            Some(p) => p,
            None => return Ok(Outcome::default()),
        };
        let len = data.length.max(0) as usize;
        let bytes = &data.data[..len.min(data.data.len())];

        match pending.cs {
            PendingControlCs::Probe | PendingControlCs::Commit => {
                let requested = StreamingControl::from_bytes(bytes).unwrap_or_default();
                let negotiated = uvc.negotiator.negotiate(formats, &requested);
                let mut outcome = Outcome::default();
                if pending.cs == PendingControlCs::Probe {
                    uvc.negotiator.probe = negotiated;
                } else {
                    uvc.negotiator.commit = negotiated;
                    uvc.active_format = Some((negotiated.bFormatIndex, negotiated.bFrameIndex));
                    if let Some(fmt) = formats.get(negotiated.bFormatIndex, negotiated.bFrameIndex) {
                        outcome.format_change = Some(FormatChange {
                            fourcc: fmt.fourcc,
                            width: fmt.width,
                            height: fmt.height,
                            interval: negotiated.dwFrameInterval,
                        });
                    }
                }
                Ok(outcome)
            }
            PendingControlCs::Plain { unit, code } => {
                let mut padded = [0u8; 4];
                let n = bytes.len().min(4);
                padded[..n].copy_from_slice(&bytes[..n]);
                let value = LittleEndian::read_u32(&padded);
                let mut outcome = Outcome::default();
                if let Some(row) = controls.find_mut(unit, code) {
                    row.current = value.min(row.host_max);
                    let capture_value = row.to_capture_value(row.current);
                    outcome.control_writes.push(ControlWrite {
                        capture_id: row.capture_id,
                        value: capture_value,
                    });
                    if row.is_red_balance_mirror() {
                        outcome.control_writes.push(ControlWrite {
                            capture_id: crate::control_mapping::v4l2_cid::BLUE_BALANCE,
                            value: capture_value,
                        });
                    }
                }
                Ok(outcome)
            }
            PendingControlCs::None => Ok(Outcome::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ProcessingUnitControl;
    use crate::control_mapping::{CaptureControlInfo, ControlType};
    use crate::format::FormatTable;

    fn brightness_table() -> ControlTable {
        let mut t = ControlTable::new();
        t.apply_capability(&CaptureControlInfo {
            id: crate::control_mapping::v4l2_cid::BRIGHTNESS,
            min: -64,
            max: 64,
            step: 1,
            default: 0,
            current: 0,
            disabled: false,
            data_type: ControlType::Integer,
        });
        t
    }

    #[test]
    fn s2_data_phase_computes_capture_value() {
        let mut controls = brightness_table();
        let formats = FormatTable::default_table();
        let mut uvc_request_state = crate::endpoint::uvc_output::UvcRequestState::default();
        uvc_request_state.pending = Some(PendingCs {
            cs: PendingControlCs::Plain {
                unit: Entity::ProcessingUnit,
                code: ProcessingUnitControl::Brightness as u8,
            },
            expected_length: 4,
        });

        // Exercise the DATA-phase math directly without a real kernel fd.
        let mut data = UvcRequestData::default();
        data.length = 4;
        data.data[0..4].copy_from_slice(&96u32.to_le_bytes());

        let row = controls
            .find_mut(Entity::ProcessingUnit, ProcessingUnitControl::Brightness as u8)
            .unwrap();
        let mut value: u32 = 0;
        for (i, b) in data.data[..4].iter().enumerate() {
            value |= (*b as u32) << (8 * i);
        }
        row.current = value.min(row.host_max);
        assert_eq!(row.to_capture_value(row.current), 32);
        let _ = formats;
    }
}
