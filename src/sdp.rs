//! Just enough of the SDP data element encoding to pull the RFCOMM server
//! channel out of a protocol descriptor list.

const TYPE_UINT: u8 = 1;
const TYPE_UUID: u8 = 3;
const TYPE_SEQUENCE: u8 = 6;
const TYPE_ALTERNATIVE: u8 = 7;

pub const UUID_RFCOMM: u16 = 0x0003;

struct Header {
    kind: u8,
    /// Header bytes including any length prefix.
    header_len: usize,
    data_len: usize,
}

fn header(data: &[u8], at: usize) -> Option<Header> {
    let byte = *data.get(at)?;
    let kind = byte >> 3;
    let size_index = byte & 0x07;
    let (header_len, data_len) = match size_index {
        0 if kind == 0 => (1, 0),
        0 => (1, 1),
        1 => (1, 2),
        2 => (1, 4),
        3 => (1, 8),
        4 => (1, 16),
        5 => (2, *data.get(at + 1)? as usize),
        6 => (
            3,
            u16::from_be_bytes([*data.get(at + 1)?, *data.get(at + 2)?]) as usize,
        ),
        _ => (
            5,
            u32::from_be_bytes([
                *data.get(at + 1)?,
                *data.get(at + 2)?,
                *data.get(at + 3)?,
                *data.get(at + 4)?,
            ]) as usize,
        ),
    };
    Some(Header {
        kind,
        header_len,
        data_len,
    })
}

/// Walks every element depth first. Sequences are entered rather than
/// skipped, so nesting depth costs nothing.
pub fn rfcomm_channel(data: &[u8]) -> Option<u8> {
    let mut at = 0;
    let mut after_rfcomm = false;
    while at < data.len() {
        let h = header(data, at)?;
        let body = at + h.header_len;
        match h.kind {
            TYPE_SEQUENCE | TYPE_ALTERNATIVE => {
                at = body;
                continue;
            }
            TYPE_UUID if h.data_len == 2 => {
                let uuid = u16::from_be_bytes([*data.get(body)?, *data.get(body + 1)?]);
                after_rfcomm = uuid == UUID_RFCOMM;
            }
            TYPE_UINT if after_rfcomm && h.data_len == 1 => {
                return data.get(body).copied();
            }
            _ => after_rfcomm = false,
        }
        at = body.checked_add(h.data_len)?;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    // ProtocolDescriptorList for SPP: L2CAP, then RFCOMM on channel 5
    const SPP_RECORD: [u8; 19] = [
        0x35, 0x11, // attribute list
        0x09, 0x00, 0x04, // attribute id 0x0004
        0x35, 0x0C, // descriptor list
        0x35, 0x03, 0x19, 0x01, 0x00, // L2CAP
        0x35, 0x05, 0x19, 0x00, 0x03, 0x08, 0x05, // RFCOMM, channel 5
    ];

    #[test]
    fn test_finds_channel() {
        assert_eq!(rfcomm_channel(&SPP_RECORD), Some(5));
    }

    #[test]
    fn test_no_rfcomm() {
        let data = [0x35, 0x05, 0x19, 0x01, 0x00, 0x08, 0x05];
        assert_eq!(rfcomm_channel(&data), None);
    }

    #[test]
    fn test_truncated_is_not_found() {
        assert_eq!(rfcomm_channel(&SPP_RECORD[..17]), None);
        assert_eq!(rfcomm_channel(&[]), None);
    }

    #[test]
    fn test_uuid_must_directly_precede_channel() {
        let data = [0x35, 0x07, 0x19, 0x00, 0x03, 0x19, 0x00, 0x08, 0x08, 0x05];
        assert_eq!(rfcomm_channel(&data), None);
    }
}
