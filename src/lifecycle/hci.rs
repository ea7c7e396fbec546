use heapless::Vec;

use super::{Application, ConnectionManager, Indication, PowerState};
use crate::bd_addr::BdAddr;
use crate::config::{MAX_DISCOVERED, REASON_USER_TERMINATED, REMOTE_NAME_MAX};
use crate::discovery::PeerDiscoveryEntry;
use crate::engine::{
    EngineError, ProtocolEngine, ScanEnable, OPCODE_EXIT_SNIFF_MODE, OPCODE_REMOTE_NAME_REQUEST,
    OPCODE_SNIFF_MODE,
};
use crate::event::{hci, LinkMode};
use crate::naming::has_prefix;
use crate::session::{ConnState, LinkPower, Transfer};

impl<E: ProtocolEngine, A: Application> ConnectionManager<'_, E, A> {
    pub fn on_bluetooth_on(&mut self, local_addr: BdAddr) {
        info!("radio on, local address {:?}", local_addr);
        self.ctx.power = PowerState::On;
        self.apply_local_name(local_addr);
        self.set_scan(ScanEnable::InquiryAndPage);
        if let Err(e) = self.engine.spp_start() {
            warn!("spp server start rejected: {:?}", e);
        }
        self.app.indicate(Indication::PoweredOn);
    }

    pub fn on_inquiry_result(&mut self, entries: &Vec<PeerDiscoveryEntry, MAX_DISCOVERED>) {
        if !self.ctx.flags.connect_in_progress {
            debug!("inquiry result outside a connect, dropped");
            return;
        }
        for entry in entries {
            if self.ctx.cache.append_if_new(*entry) {
                debug!("found {:?}", entry.addr);
            }
        }
    }

    pub fn on_inquiry_complete(&mut self, status: u8) {
        if !self.ctx.flags.connect_in_progress {
            debug!("inquiry complete outside a connect, dropped");
            return;
        }
        if status != 0 {
            warn!("inquiry failed: 0x{:02x}", status);
            self.restart_inquiry();
            return;
        }
        info!("inquiry done, {} device(s)", self.ctx.cache.len());
        if self.ctx.cache.is_empty() {
            self.restart_inquiry();
        } else {
            self.resolve_from(0);
        }
    }

    pub fn on_remote_name_complete(&mut self, status: u8, addr: BdAddr, name: &Vec<u8, REMOTE_NAME_MAX>) {
        let prefix = self.ctx.config.peer_name_prefix;

        // name check of an incoming link
        if self.ctx.flags.peer_initiated {
            if let Ok(slot) = self.ctx.sessions.find_by_peer_address(&addr) {
                if !self.ctx.sessions.get(slot).locally_paged {
                    self.ctx.flags.peer_initiated = false;
                    if status == 0 && has_prefix(name, prefix) {
                        info!("incoming peer {:?} accepted", addr);
                    } else {
                        warn!("incoming peer {:?} rejected", addr);
                        self.disconnect_acl(slot, REASON_USER_TERMINATED);
                    }
                    return;
                }
            }
        }

        if !self.ctx.flags.connect_in_progress {
            debug!("name of {:?} outside a connect, dropped", addr);
            return;
        }
        let idx = self.ctx.name_index;
        let Some(entry) = self.ctx.cache.get(idx).copied() else {
            debug!("name of {:?} with empty cache, dropped", addr);
            return;
        };
        if entry.addr != addr {
            debug!("stale name of {:?}, dropped", addr);
            return;
        }
        if status != 0 || !has_prefix(name, prefix) {
            debug!("{:?} is not a peer (status 0x{:02x})", addr, status);
            self.resolve_from(idx + 1);
            return;
        }

        let Ok(slot) = self.ctx.sessions.find_free_slot() else {
            warn!("no free slot for {:?}", addr);
            self.resolve_from(idx + 1);
            return;
        };
        let rec = self.ctx.sessions.get_mut(slot);
        rec.peer = addr;
        rec.page_scan_mode = entry.page_scan_mode;
        rec.clock_offset = entry.clock_offset;
        rec.locally_paged = true;
        rec.acl_retry_used = false;
        rec.sdp_retry_used = false;

        match self.page(slot) {
            Ok(()) => self.set_state(slot, ConnState::AclConnecting),
            Err(EngineError::AlreadyConnected) => {
                info!("already linked to {:?}", addr);
                self.ctx.sessions.get_mut(slot).link = LinkPower::Active;
                self.set_state(slot, ConnState::AclConnected);
                self.sdp_query(slot);
            }
            Err(e) => {
                warn!("connect to {:?} rejected: {:?}", addr, e);
                self.release_slot(slot);
                self.resolve_from(idx + 1);
            }
        }
    }

    pub fn on_connection_complete(&mut self, status: u8, handle: u16, addr: BdAddr, link_type: u8) {
        if link_type != hci::ACL_LINK {
            debug!("link type {} ignored", link_type);
            return;
        }
        let slot = self.ctx.sessions.find_by_peer_address(&addr).ok();

        if status != 0 {
            let Some(slot) = slot else {
                warn!("incoming link from {:?} failed: 0x{:02x}", addr, status);
                return;
            };
            let rec = self.ctx.sessions.get_mut(slot);
            if rec.state != ConnState::AclConnecting {
                debug!("late link failure for slot {}", slot.0);
                return;
            }
            if rec.locally_paged && !rec.acl_retry_used {
                rec.acl_retry_used = true;
                warn!("link to {:?} failed: 0x{:02x}, retrying", addr, status);
                match self.page(slot) {
                    Ok(()) => return,
                    Err(e) => warn!("retry rejected: {:?}", e),
                }
            }
            warn!("link to {:?} failed", addr);
            self.release_slot(slot);
            self.set_connecting(false);
            self.app.indicate(Indication::ConnectFailed);
            return;
        }

        self.set_scan(ScanEnable::Off);

        match slot {
            Some(slot) => {
                let rec = self.ctx.sessions.get_mut(slot);
                if rec.state != ConnState::AclConnecting {
                    debug!("late link complete for slot {}", slot.0);
                    return;
                }
                rec.acl_handle = Some(handle);
                rec.link = LinkPower::Active;
                self.set_state(slot, ConnState::AclConnected);
                let lsto = self.ctx.config.link_supervision_timeout;
                if let Err(e) = self.engine.write_link_supervision_timeout(handle, lsto) {
                    warn!("supervision timeout rejected: {:?}", e);
                }
                self.sdp_query(slot);
            }
            None => match self.ctx.sessions.find_free_slot() {
                Ok(slot) => {
                    let rec = self.ctx.sessions.get_mut(slot);
                    rec.peer = addr;
                    rec.acl_handle = Some(handle);
                    rec.link = LinkPower::Active;
                    rec.locally_paged = false;
                    self.set_state(slot, ConnState::AclConnected);
                    self.ctx.flags.peer_initiated = true;
                    if let Err(e) = self.engine.remote_name_request(addr, 0, 0, 0) {
                        warn!("name check of {:?} rejected: {:?}", addr, e);
                        self.ctx.flags.peer_initiated = false;
                    }
                }
                Err(_) => {
                    warn!("no free slot for incoming {:?}", addr);
                    if let Err(e) = self.engine.acl_disconnect(handle, REASON_USER_TERMINATED) {
                        warn!("disconnect rejected: {:?}", e);
                    }
                }
            },
        }
    }

    pub fn on_disconnection_complete(&mut self, status: u8, handle: u16, reason: u8) {
        if status != 0 {
            warn!("disconnect of 0x{:04x} failed: 0x{:02x}", handle, status);
            return;
        }
        let Ok(slot) = self.ctx.sessions.find_by_link_handle(handle) else {
            debug!("disconnect of unknown link 0x{:04x}", handle);
            return;
        };
        info!("slot {} link down, reason 0x{:02x}", slot.0, reason);

        let rec = *self.ctx.sessions.get(slot);
        if rec.locally_paged && self.ctx.flags.connect_in_progress {
            self.set_connecting(false);
        }
        if !rec.locally_paged {
            self.ctx.flags.peer_initiated = false;
        }
        self.release_slot(slot);
        self.app.indicate(Indication::Disconnected);
        self.set_scan(ScanEnable::InquiryAndPage);

        if rec.locally_paged && !self.ctx.config.is_reconnect_exempt(reason) {
            self.reconnect();
        }
    }

    pub fn on_command_status(&mut self, status: u8, opcode: u16) {
        if status == 0 {
            return;
        }
        match opcode {
            OPCODE_REMOTE_NAME_REQUEST => {
                if self.ctx.flags.peer_initiated {
                    warn!("name check failed: 0x{:02x}", status);
                    self.ctx.flags.peer_initiated = false;
                } else if self.ctx.flags.connect_in_progress {
                    warn!("name request failed: 0x{:02x}", status);
                    self.resolve_from(self.ctx.name_index + 1);
                }
            }
            OPCODE_SNIFF_MODE => {
                warn!("sniff request failed: 0x{:02x}", status);
                for slot in self.ctx.sessions.ids() {
                    let rec = self.ctx.sessions.get_mut(slot);
                    if rec.sniff_requested {
                        rec.sniff_requested = false;
                        self.send_data(slot);
                    }
                }
            }
            OPCODE_EXIT_SNIFF_MODE => {
                warn!("sniff exit failed: 0x{:02x}", status);
                for slot in self.ctx.sessions.ids() {
                    if self.ctx.sessions.get(slot).disconnect_on_active {
                        self.spp_disconnect(slot);
                    }
                }
            }
            _ => warn!("command 0x{:04x} failed: 0x{:02x}", opcode, status),
        }
    }

    pub fn on_command_complete(&mut self, opcode: u16, status: u8) {
        if status != 0 {
            error!("command 0x{:04x} completed with 0x{:02x}", opcode, status);
        }
    }

    pub fn on_mode_change(&mut self, status: u8, handle: u16, mode: LinkMode, interval: u16) {
        let Ok(slot) = self.ctx.sessions.find_by_link_handle(handle) else {
            debug!("mode change on unknown link 0x{:04x}", handle);
            return;
        };
        if status != 0 {
            warn!("mode change on slot {} failed: 0x{:02x}", slot.0, status);
            return;
        }

        let rec = self.ctx.sessions.get_mut(slot);
        match mode {
            LinkMode::Active => {
                rec.link = LinkPower::Active;
                info!("slot {} active", slot.0);
                if rec.disconnect_on_active {
                    self.spp_disconnect(slot);
                } else if rec.pending_resume() && self.ctx.tx_flow_on {
                    rec.transfer = Transfer::On;
                    self.send_data(slot);
                }
            }
            LinkMode::Sniff => {
                rec.link = LinkPower::Sniff;
                info!("slot {} in sniff, interval {}", slot.0, interval);
                if rec.sniff_requested {
                    rec.sniff_requested = false;
                    self.send_data(slot);
                }
            }
            LinkMode::Hold | LinkMode::Park => info!("slot {} mode {:?}", slot.0, mode),
        }
    }

    pub fn on_role_change(&mut self, status: u8, addr: BdAddr, role: u8) {
        debug!("role of {:?} now {} (0x{:02x})", addr, role, status);
    }

    pub fn on_link_key(&mut self, addr: BdAddr) {
        debug!("link key for {:?}", addr);
    }
}
