//! Requests into the vendor protocol engine.
//!
//! Every call only queues the request. `Ok` means the engine accepted it;
//! the outcome arrives later as an [`Event`](crate::event::Event).

use crate::bd_addr::BdAddr;
use crate::config::SniffParams;

pub const OPCODE_REMOTE_NAME_REQUEST: u16 = 0x0419;
pub const OPCODE_SNIFF_MODE: u16 = 0x0803;
pub const OPCODE_EXIT_SNIFF_MODE: u16 = 0x0804;

/// Service class of the serial port profile.
pub const UUID_SERIAL_PORT: u16 = 0x1101;
/// Attribute holding the protocol descriptor list.
pub const ATTR_PROTOCOL_DESCRIPTOR_LIST: u16 = 0x0004;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EngineError {
    /// Refused with the engine's result code.
    Rejected(u16),
    /// A link to the peer exists already.
    AlreadyConnected,
}

pub type EngineResult = Result<(), EngineError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ScanEnable {
    Off = 0x00,
    InquiryOnly = 0x01,
    PageOnly = 0x02,
    /// Discoverable and connectable.
    InquiryAndPage = 0x03,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AclConnectParams {
    pub packet_type: u16,
    pub page_scan_mode: u8,
    pub reserved: u8,
    pub clock_offset: u16,
    pub allow_role_switch: bool,
}

pub trait ProtocolEngine {
    /// Start the radio. Completion arrives as `Event::BluetoothOn`.
    fn bluetooth_on(&mut self) -> EngineResult;
    fn write_scan_enable(&mut self, mode: ScanEnable) -> EngineResult;
    fn change_local_name(&mut self, name: &[u8]) -> EngineResult;
    fn write_link_supervision_timeout(&mut self, handle: u16, timeout: u16) -> EngineResult;

    fn inquiry(&mut self, lap: u32, length: u8, max_responses: u8) -> EngineResult;
    fn remote_name_request(
        &mut self,
        addr: BdAddr,
        page_scan_mode: u8,
        reserved: u8,
        clock_offset: u16,
    ) -> EngineResult;
    fn acl_connect(&mut self, addr: BdAddr, params: AclConnectParams) -> EngineResult;
    fn acl_disconnect(&mut self, handle: u16, reason: u8) -> EngineResult;

    fn sdp_open(&mut self, addr: BdAddr) -> EngineResult;
    /// The engine writes at most `capacity` bytes of attribute data.
    fn service_search_attribute_request(
        &mut self,
        addr: BdAddr,
        uuid: u16,
        attribute_id: u16,
        capacity: u16,
    ) -> EngineResult;
    fn sdp_close(&mut self, addr: BdAddr) -> EngineResult;

    /// Register and start the local serial port server.
    fn spp_start(&mut self) -> EngineResult;
    fn spp_connect(&mut self, addr: BdAddr, channel: u8) -> EngineResult;
    fn spp_disconnect(&mut self, handle: u16) -> EngineResult;
    /// `data` is copied before returning.
    fn spp_send(&mut self, handle: u16, data: &[u8]) -> EngineResult;

    fn sniff_enter(&mut self, handle: u16, params: SniffParams) -> EngineResult;
    fn sniff_exit(&mut self, handle: u16) -> EngineResult;
}
