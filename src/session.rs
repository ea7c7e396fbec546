//! Per-peer session records.
//!
//! The table is sized at build time and every record exists from boot. A
//! record is free while it is [`ConnState::Disconnected`] with a null
//! address; handle and address lookups only ever match live records.

use crate::bd_addr::BdAddr;
use crate::config::MAX_SESSIONS;
use crate::mem::Addr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnState {
    Disconnected,
    AclConnecting,
    AclConnected,
    SdpQuerying,
    SppConnecting,
    SppConnected,
    SppDisconnecting,
    AclDisconnecting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkPower {
    /// No link.
    Off,
    Active,
    Sniff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Transfer {
    Off,
    On,
    /// On, but the last send was held back by transmit flow control.
    PendingResume,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SlotId(pub u8);

impl SlotId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlotError {
    NoFreeSlot,
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SessionRecord {
    pub peer: BdAddr,
    /// Unknown when the engine reported the link as already up.
    pub acl_handle: Option<u16>,
    pub spp_handle: u16,
    pub state: ConnState,
    pub transfer: Transfer,
    pub link: LinkPower,
    /// Paging parameters kept for the single connect retry.
    pub page_scan_mode: u8,
    pub clock_offset: u16,
    /// This side paged the peer.
    pub locally_paged: bool,
    pub acl_retry_used: bool,
    pub sdp_retry_used: bool,
    pub sniff_requested: bool,
    /// Sniff exit was requested on the way to an SPP disconnect.
    pub disconnect_on_active: bool,
    pub server_channel: Option<u8>,
    /// SDP attribute buffer held between the request and its response.
    pub sdp_buffer: Option<Addr>,
}

impl SessionRecord {
    pub const FREE: Self = Self {
        peer: BdAddr::NULL,
        acl_handle: None,
        spp_handle: 0,
        state: ConnState::Disconnected,
        transfer: Transfer::Off,
        link: LinkPower::Off,
        page_scan_mode: 0,
        clock_offset: 0,
        locally_paged: false,
        acl_retry_used: false,
        sdp_retry_used: false,
        sniff_requested: false,
        disconnect_on_active: false,
        server_channel: None,
        sdp_buffer: None,
    };

    pub fn is_free(&self) -> bool {
        self.state == ConnState::Disconnected
    }

    pub fn is_live(&self) -> bool {
        self.state != ConnState::Disconnected
    }

    pub fn pending_resume(&self) -> bool {
        self.transfer == Transfer::PendingResume
    }

    /// Sending is wanted, whether or not it is currently held back.
    pub fn transfer_enabled(&self) -> bool {
        self.transfer != Transfer::Off
    }
}

impl Default for SessionRecord {
    fn default() -> Self {
        Self::FREE
    }
}

pub struct SessionTable<const N: usize = MAX_SESSIONS> {
    slots: [SessionRecord; N],
}

impl<const N: usize> SessionTable<N> {
    pub const fn new() -> Self {
        Self {
            slots: [SessionRecord::FREE; N],
        }
    }

    pub fn reset(&mut self) {
        self.slots = [SessionRecord::FREE; N];
    }

    pub fn get(&self, slot: SlotId) -> &SessionRecord {
        &self.slots[slot.index()]
    }

    pub fn get_mut(&mut self, slot: SlotId) -> &mut SessionRecord {
        &mut self.slots[slot.index()]
    }

    /// Put the record back to the free pattern.
    pub fn release(&mut self, slot: SlotId) {
        self.slots[slot.index()] = SessionRecord::FREE;
    }

    pub fn find_free_slot(&self) -> Result<SlotId, SlotError> {
        self.position(|s| s.is_free()).ok_or(SlotError::NoFreeSlot)
    }

    pub fn find_by_link_handle(&self, handle: u16) -> Result<SlotId, SlotError> {
        self.position(|s| s.is_live() && s.acl_handle == Some(handle))
            .ok_or(SlotError::NotFound)
    }

    pub fn find_by_data_handle(&self, handle: u16) -> Result<SlotId, SlotError> {
        self.position(|s| s.is_live() && s.spp_handle == handle)
            .ok_or(SlotError::NotFound)
    }

    pub fn find_by_peer_address(&self, peer: &BdAddr) -> Result<SlotId, SlotError> {
        self.position(|s| s.is_live() && s.peer == *peer)
            .ok_or(SlotError::NotFound)
    }

    pub fn find_in_state(&self, state: ConnState) -> Option<SlotId> {
        self.position(|s| s.state == state)
    }

    pub fn all_disconnected(&self) -> bool {
        self.slots.iter().all(SessionRecord::is_free)
    }

    /// Any session between "connect" and a usable data channel.
    pub fn connect_in_progress(&self) -> Option<SlotId> {
        self.position(|s| {
            matches!(
                s.state,
                ConnState::AclConnecting
                    | ConnState::AclConnected
                    | ConnState::SdpQuerying
                    | ConnState::SppConnecting
            )
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (SlotId, &SessionRecord)> {
        self.slots
            .iter()
            .enumerate()
            .map(|(i, s)| (SlotId(i as u8), s))
    }

    pub fn ids(&self) -> impl Iterator<Item = SlotId> {
        (0..N).map(|i| SlotId(i as u8))
    }

    fn position(&self, f: impl Fn(&SessionRecord) -> bool) -> Option<SlotId> {
        self.slots.iter().position(f).map(|i| SlotId(i as u8))
    }
}

impl<const N: usize> Default for SessionTable<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PEER: BdAddr = BdAddr([1, 2, 3, 4, 5, 6]);

    #[test]
    fn test_table_starts_free() {
        let table: SessionTable = SessionTable::new();
        assert!(table.all_disconnected());
        assert_eq!(table.find_free_slot(), Ok(SlotId(0)));
        assert!(table.connect_in_progress().is_none());
    }

    #[test]
    fn test_lookups_ignore_disconnected_records() {
        let mut table: SessionTable = SessionTable::new();
        // the null address matches every free record
        assert_eq!(table.find_by_link_handle(0), Err(SlotError::NotFound));
        assert_eq!(table.find_by_peer_address(&BdAddr::NULL), Err(SlotError::NotFound));

        let rec = table.get_mut(SlotId(1));
        rec.peer = PEER;
        rec.acl_handle = Some(0x0B);
        rec.spp_handle = 0x21;
        rec.state = ConnState::SppConnected;

        assert_eq!(table.find_by_link_handle(0x0B), Ok(SlotId(1)));
        assert_eq!(table.find_by_data_handle(0x21), Ok(SlotId(1)));
        assert_eq!(table.find_by_peer_address(&PEER), Ok(SlotId(1)));
        assert_eq!(table.find_free_slot(), Ok(SlotId(0)));
        assert_eq!(table.find_in_state(ConnState::SppConnected), Some(SlotId(1)));
    }

    #[test]
    fn test_no_free_slot() {
        let mut table = SessionTable::<1>::new();
        table.get_mut(SlotId(0)).state = ConnState::AclConnecting;
        assert_eq!(table.find_free_slot(), Err(SlotError::NoFreeSlot));
        assert_eq!(table.connect_in_progress(), Some(SlotId(0)));
        table.release(SlotId(0));
        assert_eq!(table.find_free_slot(), Ok(SlotId(0)));
        assert!(table.get(SlotId(0)).peer.is_null());
    }
}
