use super::{Application, ConnectionManager, Indication};
use crate::bd_addr::BdAddr;
use crate::config::{REASON_USER_TERMINATED, SDP_ATTRIB_LEN};
use crate::drive::{host_frame, DriveCommand};
use crate::engine::{ProtocolEngine, ATTR_PROTOCOL_DESCRIPTOR_LIST, UUID_SERIAL_PORT};
use crate::event::{SdpCommand, SppEvent};
use crate::sdp::rfcomm_channel;
use crate::session::{ConnState, LinkPower, SlotId, Transfer};

impl<E: ProtocolEngine, A: Application> ConnectionManager<'_, E, A> {
    /// Look up the peer's serial port channel. Only one query runs at a
    /// time; its record is the one in `SdpQuerying`.
    pub(super) fn sdp_query(&mut self, slot: SlotId) {
        if let Some(other) = self.ctx.sessions.find_in_state(ConnState::SdpQuerying) {
            if other != slot {
                warn!("slot {} still querying, slot {} dropped", other.0, slot.0);
                self.disconnect_acl(slot, REASON_USER_TERMINATED);
                return;
            }
        }
        self.ctx.sessions.get_mut(slot).server_channel = None;
        self.set_state(slot, ConnState::SdpQuerying);
        let peer = self.ctx.sessions.get(slot).peer;
        if let Err(e) = self.engine.sdp_open(peer) {
            warn!("sdp open rejected: {:?}", e);
            self.set_state(slot, ConnState::AclConnected);
            self.disconnect_acl(slot, REASON_USER_TERMINATED);
        }
    }

    fn close_sdp(&mut self, slot: SlotId) {
        let peer = self.ctx.sessions.get(slot).peer;
        if let Err(e) = self.engine.sdp_close(peer) {
            // no close confirmation will follow
            warn!("sdp close rejected: {:?}", e);
            self.on_sdp_closed(slot);
        }
    }

    fn on_sdp_closed(&mut self, slot: SlotId) {
        let rec = self.ctx.sessions.get_mut(slot);
        if let Some(buf) = rec.sdp_buffer.take() {
            self.ctx.pools.release(buf);
        }
        let (peer, channel) = (rec.peer, rec.server_channel);
        match channel {
            Some(channel) => {
                match self.engine.spp_connect(peer, channel) {
                    Ok(()) => self.set_state(slot, ConnState::SppConnecting),
                    Err(e) => {
                        warn!("spp connect rejected: {:?}", e);
                        self.disconnect_acl(slot, REASON_USER_TERMINATED);
                    }
                }
            }
            None => {
                warn!("slot {}: service not found", slot.0);
                self.disconnect_acl(slot, REASON_USER_TERMINATED);
            }
        }
    }

    pub fn on_sdp(&mut self, command: SdpCommand, status: u16, data: &[u8]) {
        let Some(slot) = self.ctx.sessions.find_in_state(ConnState::SdpQuerying) else {
            debug!("sdp {:?} with no query running", command);
            return;
        };

        match command {
            SdpCommand::Open => {
                if status != 0 {
                    warn!("sdp open failed: 0x{:04x}", status);
                    self.disconnect_acl(slot, REASON_USER_TERMINATED);
                    return;
                }
                let buf = match self.ctx.pools.alloc_mem(SDP_ATTRIB_LEN) {
                    Ok(buf) => buf,
                    Err(e) => {
                        warn!("no sdp buffer: {:?}", e);
                        self.close_sdp(slot);
                        return;
                    }
                };
                let rec = self.ctx.sessions.get_mut(slot);
                rec.sdp_buffer = Some(buf);
                let peer = rec.peer;
                if let Err(e) = self.engine.service_search_attribute_request(
                    peer,
                    UUID_SERIAL_PORT,
                    ATTR_PROTOCOL_DESCRIPTOR_LIST,
                    SDP_ATTRIB_LEN as u16,
                ) {
                    warn!("attribute request rejected: {:?}", e);
                    self.close_sdp(slot);
                }
            }
            SdpCommand::ServiceSearchAttributeResponse => {
                let Some(buf) = self.ctx.sessions.get_mut(slot).sdp_buffer.take() else {
                    debug!("attribute response with no request, dropped");
                    return;
                };
                if status == 0 {
                    let channel = match self.ctx.pools.chunk_mut(buf) {
                        Ok(chunk) => {
                            let n = data.len().min(chunk.len());
                            chunk[..n].copy_from_slice(&data[..n]);
                            rfcomm_channel(&chunk[..n])
                        }
                        Err(_) => None,
                    };
                    debug!("slot {} server channel {:?}", slot.0, channel);
                    self.ctx.sessions.get_mut(slot).server_channel = channel;
                } else {
                    warn!("attribute search failed: 0x{:04x}", status);
                }
                self.ctx.pools.release(buf);
                self.close_sdp(slot);
            }
            SdpCommand::Close => {
                if status != 0 {
                    warn!("sdp close reported 0x{:04x}", status);
                }
                self.on_sdp_closed(slot);
            }
        }
    }

    pub fn on_spp(&mut self, handle: u16, event: SppEvent, result: u16, data: &[u8]) {
        let slot = match event {
            SppEvent::ConnectCnf | SppEvent::ConnectInd => BdAddr::from_slice(data)
                .and_then(|peer| self.ctx.sessions.find_by_peer_address(&peer).ok()),
            _ => self.ctx.sessions.find_by_data_handle(handle).ok(),
        };
        let Some(slot) = slot else {
            debug!("spp {:?} for unknown session", event);
            return;
        };

        if result != 0 {
            warn!("spp {:?} on slot {} failed: 0x{:04x}", event, slot.0, result);
            let rec = self.ctx.sessions.get_mut(slot);
            if event == SppEvent::ConnectCnf && rec.state == ConnState::SppConnecting {
                if rec.sdp_retry_used {
                    self.disconnect_acl(slot, REASON_USER_TERMINATED);
                } else {
                    rec.sdp_retry_used = true;
                    self.sdp_query(slot);
                }
            }
            return;
        }

        match event {
            SppEvent::ConnectCnf => {
                let rec = self.ctx.sessions.get_mut(slot);
                if rec.state != ConnState::SppConnecting {
                    debug!("late spp confirm for slot {}", slot.0);
                    return;
                }
                rec.spp_handle = handle;
                rec.transfer = Transfer::On;
                self.set_state(slot, ConnState::SppConnected);
                self.ctx.flags.initiator = true;
                self.ctx.inquiry_retries = 0;
                self.set_connecting(false);
                self.app.indicate(Indication::Connected);

                let rec = self.ctx.sessions.get_mut(slot);
                if let (Some(params), Some(acl)) = (self.ctx.config.sniff, rec.acl_handle) {
                    if rec.link != LinkPower::Sniff {
                        rec.sniff_requested = true;
                        match self.engine.sniff_enter(acl, params) {
                            // the first payload goes out once sniff is up
                            Ok(()) => return,
                            Err(e) => {
                                warn!("sniff rejected: {:?}", e);
                                rec.sniff_requested = false;
                            }
                        }
                    }
                }
                self.send_data(slot);
            }
            SppEvent::ConnectInd => {
                let rec = self.ctx.sessions.get_mut(slot);
                rec.spp_handle = handle;
                rec.transfer = Transfer::On;
                self.set_state(slot, ConnState::SppConnected);
                self.ctx.flags.initiator = false;
                self.app.indicate(Indication::Connected);
                self.send_data(slot);
            }
            SppEvent::DisconnectCnf | SppEvent::DisconnectInd => {
                let rec = self.ctx.sessions.get_mut(slot);
                rec.transfer = Transfer::Off;
                rec.link = LinkPower::Active;
                rec.sniff_requested = false;
                rec.disconnect_on_active = false;
                self.set_state(slot, ConnState::SppDisconnecting);
                self.disconnect_acl(slot, REASON_USER_TERMINATED);
            }
            SppEvent::SendCnf => {
                let rec = self.ctx.sessions.get_mut(slot);
                if rec.state != ConnState::SppConnected || rec.transfer != Transfer::On {
                    return;
                }
                if self.ctx.tx_flow_on {
                    self.send_data(slot);
                } else {
                    rec.transfer = Transfer::PendingResume;
                }
            }
            SppEvent::RecvdDataInd => {
                if let Some(&first) = data.first() {
                    let cmd = DriveCommand::from_byte(first);
                    debug!("slot {} drive {:?}", slot.0, cmd);
                    self.app.on_drive(cmd);
                }
                self.app.on_host_frame(&host_frame(data));
            }
            SppEvent::StopCnf => info!("spp server stopped"),
        }
    }

    /// Transmit queue flow control. Sends held back while the queue was
    /// full are resumed when it drains.
    pub fn on_tx_queue_flow(&mut self, on: bool) {
        self.ctx.tx_flow_on = on;
        if !on {
            debug!("tx flow off");
            return;
        }
        for slot in self.ctx.sessions.ids() {
            let rec = self.ctx.sessions.get_mut(slot);
            if !rec.pending_resume() {
                continue;
            }
            if rec.state == ConnState::SppConnected {
                rec.transfer = Transfer::On;
                self.send_data(slot);
            } else {
                rec.transfer = Transfer::Off;
            }
        }
    }
}
