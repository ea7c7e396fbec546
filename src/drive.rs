//! Drive commands received over the data channel and the frame format used
//! to forward received bytes to a wired host.

use crate::config::PAYLOAD_LEN;

/// Start-of-header byte of a host frame.
pub const SOH: u8 = 0x01;
pub const HOST_FRAME_LEN: usize = 1 + PAYLOAD_LEN + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriveCommand {
    Forward,
    Reverse,
    Left,
    Right,
    ForwardLeft,
    ForwardRight,
    ReverseLeft,
    ReverseRight,
    Turbo,
    TurboLeft,
    TurboRight,
    Unknown(u8),
}

impl DriveCommand {
    pub fn from_byte(b: u8) -> Self {
        match b {
            b'c' => Self::Forward,
            b'a' => Self::Reverse,
            b'b' => Self::Left,
            b'd' => Self::Right,
            b'2' => Self::ForwardLeft,
            b'3' => Self::ForwardRight,
            b'0' => Self::ReverseLeft,
            b'1' => Self::ReverseRight,
            b'z' => Self::Turbo,
            b'x' => Self::TurboLeft,
            b'y' => Self::TurboRight,
            other => Self::Unknown(other),
        }
    }
}

/// `[SOH, d0..d3, sum]`, where `sum` wraps over the first five bytes.
/// Short input is zero padded.
pub fn host_frame(data: &[u8]) -> [u8; HOST_FRAME_LEN] {
    let mut frame = [0u8; HOST_FRAME_LEN];
    frame[0] = SOH;
    let n = data.len().min(PAYLOAD_LEN);
    frame[1..1 + n].copy_from_slice(&data[..n]);
    frame[HOST_FRAME_LEN - 1] = frame[..HOST_FRAME_LEN - 1]
        .iter()
        .fold(0u8, |acc, b| acc.wrapping_add(*b));
    frame
}
