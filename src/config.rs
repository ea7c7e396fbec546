//! Build-time capacities and the runtime [`Config`].

/// Session records pre-allocated at boot.
pub const MAX_SESSIONS: usize = 2;
/// Inquiry results kept for name resolution.
pub const MAX_DISCOVERED: usize = 7;
/// Pool slots in the registry.
pub const MAX_POOLS: usize = 5;
/// Deepest free stack a single pool may have.
pub const MAX_STACK_ITEMS: usize = 15;
/// Bytes in the static arena.
pub const ARENA_SIZE: usize = 1024;
/// Default pool layout as (chunk size, chunk count).
pub const DEFAULT_POOLS: [(usize, usize); MAX_POOLS] =
    [(8, 4), (16, 2), (32, 4), (128, 2), (260, 2)];

/// Buffer handed to the engine for the SDP attribute response.
pub const SDP_ATTRIB_LEN: usize = 32;
/// Bytes sampled per outgoing data packet.
pub const PAYLOAD_LEN: usize = 4;
/// Remote names are truncated to this many bytes.
pub const REMOTE_NAME_MAX: usize = 16;
/// Upper bound for the local device name including its suffix.
pub const LOCAL_NAME_MAX: usize = 24;

pub const INPUT_QUEUE_DEPTH: usize = 20;
pub const EVENT_QUEUE_DEPTH: usize = 8;

/// Limited inquiry access code.
pub const LIAC: u32 = 0x9E_8B00;
/// General inquiry access code.
pub const GIAC: u32 = 0x9E_8B33;

/// HCI "remote user terminated connection".
pub const REASON_USER_TERMINATED: u8 = 0x13;
/// HCI "connection terminated by local host".
pub const REASON_LOCAL_HOST: u8 = 0x16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SniffParams {
    pub max_interval: u16,
    pub min_interval: u16,
    pub attempt: u16,
    pub timeout: u16,
}

impl SniffParams {
    /// 180 ms on both bounds.
    pub const DEFAULT: Self = Self {
        max_interval: 0x0120,
        min_interval: 0x0120,
        attempt: 8,
        timeout: 1,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Local name before the address suffix is appended.
    pub device_name: &'static str,
    /// Peers whose name does not start with this are skipped.
    pub peer_name_prefix: &'static str,
    pub inquiry_lap: u32,
    pub inquiry_length: u8,
    /// Zero means unlimited.
    pub inquiry_max_responses: u8,
    pub acl_packet_type: u16,
    pub link_supervision_timeout: u16,
    /// `None` keeps links in active mode.
    pub sniff: Option<SniffParams>,
    /// Disconnect reasons after which no reconnect is attempted.
    pub reconnect_exempt_reasons: &'static [u8],
    /// Inquiry restarts tolerated per connect attempt before giving up.
    /// `None` retries forever.
    pub inquiry_retry_limit: Option<u8>,
    /// Timer ticks without input before entering low power.
    pub inactivity_timeout: u32,
}

impl Config {
    pub const DEFAULT: Self = Self {
        device_name: "BlueMSP-Demo",
        peer_name_prefix: "BlueMSP-Demo",
        inquiry_lap: LIAC,
        inquiry_length: 0x07,
        inquiry_max_responses: 0x00,
        // DM1 | DH1 | DM3 | DH3 | DM5 | DH5
        acl_packet_type: 0xCC18,
        link_supervision_timeout: 0x1900,
        sniff: Some(SniffParams::DEFAULT),
        reconnect_exempt_reasons: &[REASON_USER_TERMINATED, REASON_LOCAL_HOST],
        inquiry_retry_limit: None,
        inactivity_timeout: 30,
    };

    pub fn is_reconnect_exempt(&self, reason: u8) -> bool {
        self.reconnect_exempt_reasons.contains(&reason)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::DEFAULT
    }
}
