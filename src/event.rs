//! Inbound engine notifications.
//!
//! The engine hands over an [`EventKind`] plus an opaque byte payload.
//! [`Event::decode`] turns that into an owned [`Event`] so it can cross
//! from the reader task to the control task over a channel.

use heapless::Vec;

use crate::bd_addr::BdAddr;
use crate::config::{MAX_DISCOVERED, REMOTE_NAME_MAX, SDP_ATTRIB_LEN};
use crate::discovery::PeerDiscoveryEntry;

/// Largest SPP payload carried inside an event. Longer data is cut.
pub const SPP_DATA_MAX: usize = 32;

pub mod hci {
    pub const INQUIRY_COMPLETE: u8 = 0x01;
    pub const INQUIRY_RESULT: u8 = 0x02;
    pub const CONNECTION_COMPLETE: u8 = 0x03;
    pub const DISCONNECTION_COMPLETE: u8 = 0x05;
    pub const REMOTE_NAME_REQUEST_COMPLETE: u8 = 0x07;
    pub const COMMAND_COMPLETE: u8 = 0x0E;
    pub const COMMAND_STATUS: u8 = 0x0F;
    pub const ROLE_CHANGE: u8 = 0x12;
    pub const MODE_CHANGE: u8 = 0x14;
    pub const LINK_KEY_NOTIFICATION: u8 = 0x18;
    pub const VENDOR_DEBUG: u8 = 0xFF;

    pub const ACL_LINK: u8 = 0x01;

    /// Bytes per record in an inquiry result.
    pub const INQUIRY_RECORD_LEN: usize = 14;
}

/// What the engine reported, with the scalars its callback carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EventKind {
    Hci(u8),
    Sdp { command: u8, status: u16 },
    Spp { handle: u16, event: u8, result: u16 },
    TxQueueFlow { on: bool },
    /// Radio initialised. Payload is the local address.
    BluetoothOn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SdpCommand {
    Open,
    ServiceSearchAttributeResponse,
    Close,
}

impl SdpCommand {
    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0x07 => Some(Self::ServiceSearchAttributeResponse),
            0x08 => Some(Self::Open),
            0x09 => Some(Self::Close),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SppEvent {
    ConnectCnf,
    ConnectInd,
    DisconnectCnf,
    DisconnectInd,
    StopCnf,
    SendCnf,
    RecvdDataInd,
}

impl SppEvent {
    pub fn from_u8(raw: u8) -> Option<Self> {
        Some(match raw {
            1 => Self::ConnectCnf,
            2 => Self::ConnectInd,
            3 => Self::DisconnectCnf,
            4 => Self::DisconnectInd,
            5 => Self::StopCnf,
            6 => Self::SendCnf,
            7 => Self::RecvdDataInd,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkMode {
    Active,
    Hold,
    Sniff,
    Park,
}

impl LinkMode {
    pub fn from_u8(raw: u8) -> Option<Self> {
        Some(match raw {
            0 => Self::Active,
            1 => Self::Hold,
            2 => Self::Sniff,
            3 => Self::Park,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    InquiryComplete {
        status: u8,
    },
    InquiryResult {
        entries: Vec<PeerDiscoveryEntry, MAX_DISCOVERED>,
    },
    ConnectionComplete {
        status: u8,
        handle: u16,
        addr: BdAddr,
        link_type: u8,
        encryption: u8,
    },
    DisconnectionComplete {
        status: u8,
        handle: u16,
        reason: u8,
    },
    RemoteNameComplete {
        status: u8,
        addr: BdAddr,
        name: Vec<u8, REMOTE_NAME_MAX>,
    },
    CommandComplete {
        num_packets: u8,
        opcode: u16,
        status: u8,
    },
    CommandStatus {
        status: u8,
        num_packets: u8,
        opcode: u16,
    },
    RoleChange {
        status: u8,
        addr: BdAddr,
        role: u8,
    },
    ModeChange {
        status: u8,
        handle: u16,
        mode: LinkMode,
        interval: u16,
    },
    LinkKeyNotification {
        addr: BdAddr,
    },
    Sdp {
        command: SdpCommand,
        status: u16,
        data: Vec<u8, SDP_ATTRIB_LEN>,
    },
    Spp {
        handle: u16,
        event: SppEvent,
        result: u16,
        data: Vec<u8, SPP_DATA_MAX>,
    },
    TxQueueFlow {
        on: bool,
    },
    BluetoothOn {
        local_addr: BdAddr,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    UnknownKind(EventKind),
    /// Fewer bytes than the fixed fields need.
    Truncated { kind: EventKind, len: usize },
    /// A field holds a value outside its defined range.
    BadField(EventKind),
}

fn u16_at(p: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_le_bytes([*p.get(at)?, *p.get(at + 1)?]))
}

fn truncate<const N: usize>(data: &[u8]) -> Vec<u8, N> {
    let len = data.len().min(N);
    // len <= N, cannot fail
    Vec::from_slice(&data[..len]).unwrap_or_default()
}

impl Event {
    pub fn decode(kind: EventKind, payload: &[u8]) -> Result<Self, DecodeError> {
        let short = || DecodeError::Truncated {
            kind,
            len: payload.len(),
        };
        let p = payload;

        match kind {
            EventKind::Hci(code) => match code {
                hci::INQUIRY_COMPLETE => Ok(Event::InquiryComplete {
                    status: *p.first().ok_or_else(short)?,
                }),
                hci::INQUIRY_RESULT => {
                    let count = *p.first().ok_or_else(short)? as usize;
                    let mut entries = Vec::new();
                    for i in 0..count {
                        let at = 1 + i * hci::INQUIRY_RECORD_LEN;
                        let rec = p
                            .get(at..at + hci::INQUIRY_RECORD_LEN)
                            .ok_or_else(short)?;
                        let entry = PeerDiscoveryEntry {
                            addr: BdAddr::from_slice(rec).ok_or_else(short)?,
                            page_scan_mode: rec[6],
                            clock_offset: u16_at(rec, 12).ok_or_else(short)?,
                        };
                        if entries.push(entry).is_err() {
                            break;
                        }
                    }
                    Ok(Event::InquiryResult { entries })
                }
                hci::CONNECTION_COMPLETE => {
                    if p.len() < 11 {
                        return Err(short());
                    }
                    Ok(Event::ConnectionComplete {
                        status: p[0],
                        handle: u16_at(p, 1).ok_or_else(short)?,
                        addr: BdAddr::from_slice(&p[3..9]).ok_or_else(short)?,
                        link_type: p[9],
                        encryption: p[10],
                    })
                }
                hci::DISCONNECTION_COMPLETE => {
                    if p.len() < 4 {
                        return Err(short());
                    }
                    Ok(Event::DisconnectionComplete {
                        status: p[0],
                        handle: u16_at(p, 1).ok_or_else(short)?,
                        reason: p[3],
                    })
                }
                hci::REMOTE_NAME_REQUEST_COMPLETE => {
                    if p.len() < 7 {
                        return Err(short());
                    }
                    let raw = &p[7..];
                    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
                    Ok(Event::RemoteNameComplete {
                        status: p[0],
                        addr: BdAddr::from_slice(&p[1..7]).ok_or_else(short)?,
                        name: truncate(&raw[..end]),
                    })
                }
                hci::COMMAND_COMPLETE => {
                    if p.len() < 4 {
                        return Err(short());
                    }
                    Ok(Event::CommandComplete {
                        num_packets: p[0],
                        opcode: u16_at(p, 1).ok_or_else(short)?,
                        status: p[3],
                    })
                }
                hci::COMMAND_STATUS => {
                    if p.len() < 4 {
                        return Err(short());
                    }
                    Ok(Event::CommandStatus {
                        status: p[0],
                        num_packets: p[1],
                        opcode: u16_at(p, 2).ok_or_else(short)?,
                    })
                }
                hci::ROLE_CHANGE => {
                    if p.len() < 8 {
                        return Err(short());
                    }
                    Ok(Event::RoleChange {
                        status: p[0],
                        addr: BdAddr::from_slice(&p[1..7]).ok_or_else(short)?,
                        role: p[7],
                    })
                }
                hci::MODE_CHANGE => {
                    if p.len() < 6 {
                        return Err(short());
                    }
                    Ok(Event::ModeChange {
                        status: p[0],
                        handle: u16_at(p, 1).ok_or_else(short)?,
                        mode: LinkMode::from_u8(p[3]).ok_or(DecodeError::BadField(kind))?,
                        interval: u16_at(p, 4).ok_or_else(short)?,
                    })
                }
                hci::LINK_KEY_NOTIFICATION => Ok(Event::LinkKeyNotification {
                    addr: BdAddr::from_slice(p).ok_or_else(short)?,
                }),
                _ => Err(DecodeError::UnknownKind(kind)),
            },
            EventKind::Sdp { command, status } => Ok(Event::Sdp {
                command: SdpCommand::from_u8(command).ok_or(DecodeError::UnknownKind(kind))?,
                status,
                data: truncate(p),
            }),
            EventKind::Spp {
                handle,
                event,
                result,
            } => Ok(Event::Spp {
                handle,
                event: SppEvent::from_u8(event).ok_or(DecodeError::UnknownKind(kind))?,
                result,
                data: truncate(p),
            }),
            EventKind::TxQueueFlow { on } => Ok(Event::TxQueueFlow { on }),
            EventKind::BluetoothOn => Ok(Event::BluetoothOn {
                local_addr: BdAddr::from_slice(p).ok_or_else(short)?,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: [u8; 6] = [0x11, 0x22, 0x33, 0x44, 0x55, 0x66];

    #[test]
    fn test_connection_complete_offsets() {
        let mut p = [0u8; 11];
        p[1..3].copy_from_slice(&0x002Au16.to_le_bytes());
        p[3..9].copy_from_slice(&ADDR);
        p[9] = hci::ACL_LINK;
        p[10] = 1;
        let ev = Event::decode(EventKind::Hci(hci::CONNECTION_COMPLETE), &p).unwrap();
        assert_eq!(
            ev,
            Event::ConnectionComplete {
                status: 0,
                handle: 0x002A,
                addr: BdAddr(ADDR),
                link_type: 1,
                encryption: 1,
            }
        );
    }

    #[test]
    fn test_inquiry_result_records() {
        let mut p = [0u8; 1 + 2 * hci::INQUIRY_RECORD_LEN];
        p[0] = 2;
        p[1..7].copy_from_slice(&ADDR);
        p[7] = 1;
        p[13..15].copy_from_slice(&0x7001u16.to_le_bytes());
        p[15..21].copy_from_slice(&[9; 6]);
        p[21] = 2;
        let ev = Event::decode(EventKind::Hci(hci::INQUIRY_RESULT), &p).unwrap();
        let Event::InquiryResult { entries } = ev else {
            panic!("wrong event");
        };
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].addr, BdAddr(ADDR));
        assert_eq!(entries[0].page_scan_mode, 1);
        assert_eq!(entries[0].clock_offset, 0x7001);
        assert_eq!(entries[1].addr, BdAddr([9; 6]));
        assert_eq!(entries[1].page_scan_mode, 2);
    }

    #[test]
    fn test_inquiry_result_short_record() {
        let p = [1u8, 0, 0, 0];
        assert!(matches!(
            Event::decode(EventKind::Hci(hci::INQUIRY_RESULT), &p),
            Err(DecodeError::Truncated { .. })
        ));
    }

    #[test]
    fn test_name_is_cut_at_nul_and_capacity() {
        let mut p = [0u8; 7 + 20];
        p[1..7].copy_from_slice(&ADDR);
        p[7..12].copy_from_slice(b"Robot");
        let ev = Event::decode(EventKind::Hci(hci::REMOTE_NAME_REQUEST_COMPLETE), &p).unwrap();
        let Event::RemoteNameComplete { name, .. } = ev else {
            panic!("wrong event");
        };
        assert_eq!(&name[..], b"Robot");

        let mut long = [b'x'; 7 + 30];
        long[0] = 0;
        let ev = Event::decode(EventKind::Hci(hci::REMOTE_NAME_REQUEST_COMPLETE), &long).unwrap();
        let Event::RemoteNameComplete { name, .. } = ev else {
            panic!("wrong event");
        };
        assert_eq!(name.len(), REMOTE_NAME_MAX);
    }

    #[test]
    fn test_command_status_and_mode_change() {
        let p = [0x0C, 1, 0x19, 0x04];
        assert_eq!(
            Event::decode(EventKind::Hci(hci::COMMAND_STATUS), &p),
            Ok(Event::CommandStatus {
                status: 0x0C,
                num_packets: 1,
                opcode: 0x0419,
            })
        );

        let p = [0, 0x2A, 0, 2, 0x20, 0x01];
        assert_eq!(
            Event::decode(EventKind::Hci(hci::MODE_CHANGE), &p),
            Ok(Event::ModeChange {
                status: 0,
                handle: 0x2A,
                mode: LinkMode::Sniff,
                interval: 0x0120,
            })
        );
        let bad = [0, 0x2A, 0, 9, 0, 0];
        assert_eq!(
            Event::decode(EventKind::Hci(hci::MODE_CHANGE), &bad),
            Err(DecodeError::BadField(EventKind::Hci(hci::MODE_CHANGE)))
        );
    }

    #[test]
    fn test_unknown_and_short() {
        let kind = EventKind::Hci(0x42);
        assert_eq!(Event::decode(kind, &[]), Err(DecodeError::UnknownKind(kind)));
        let kind = EventKind::Hci(hci::DISCONNECTION_COMPLETE);
        assert_eq!(
            Event::decode(kind, &[0, 1]),
            Err(DecodeError::Truncated { kind, len: 2 })
        );
        let kind = EventKind::Sdp { command: 0x02, status: 0 };
        assert_eq!(Event::decode(kind, &[]), Err(DecodeError::UnknownKind(kind)));
    }

    #[test]
    fn test_spp_data_is_capped() {
        let data = [7u8; 40];
        let ev = Event::decode(
            EventKind::Spp {
                handle: 3,
                event: 7,
                result: 0,
            },
            &data,
        )
        .unwrap();
        let Event::Spp { event, data, .. } = ev else {
            panic!("wrong event");
        };
        assert_eq!(event, SppEvent::RecvdDataInd);
        assert_eq!(data.len(), SPP_DATA_MAX);
    }
}
