//! Connection lifecycle.
//!
//! [`ConnectionManager`] owns every session record and is driven from one
//! task. Each engine event or user input advances at most one record and
//! issues the next request; requests are fire-and-forget and their outcome
//! comes back as another event. A completion for a record that has moved
//! on (disconnected, or already past that step) is dropped.
//!
//! Per record:
//!
//! ```text
//! Disconnected -> AclConnecting -> AclConnected -> SdpQuerying
//!     -> SppConnecting -> SppConnected -> SppDisconnecting
//!     -> AclDisconnecting -> Disconnected
//! ```

mod hci;
mod profile;

use crate::advisory::Advisory;
use crate::bd_addr::BdAddr;
use crate::config::{Config, LOCAL_NAME_MAX, PAYLOAD_LEN, REASON_USER_TERMINATED};
use crate::control::UserInput;
use crate::discovery::DiscoveryCache;
use crate::drive::{DriveCommand, HOST_FRAME_LEN};
use crate::engine::{AclConnectParams, EngineResult, ProtocolEngine, ScanEnable};
use crate::error::{fatal, Fatal};
use crate::mem::{Addr, PoolRegistry};
use crate::naming::compose_local_name;
use crate::session::{ConnState, LinkPower, SessionRecord, SessionTable, SlotId, Transfer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Indication {
    PoweredOn,
    /// Blink while discoverable.
    DiscoverableBlink,
    Connected,
    Disconnected,
    ConnectFailed,
}

/// Board side of the application: sensor, motors, host link, LEDs.
pub trait Application {
    /// Fill `buf` with the next outgoing sample. Returns bytes written.
    fn sample(&mut self, buf: &mut [u8]) -> usize;

    fn on_drive(&mut self, _cmd: DriveCommand) {}

    fn on_host_frame(&mut self, _frame: &[u8; HOST_FRAME_LEN]) {}

    fn indicate(&mut self, _indication: Indication) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerState {
    Off,
    TurningOn,
    On,
}

/// Process-wide flags that gate user actions and event interpretation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SessionFlags {
    /// The current or last session was set up from this side.
    pub initiator: bool,
    /// A user connect is running: inquiry, name resolution or session setup.
    pub connect_in_progress: bool,
    /// An incoming link is waiting for its name to be checked.
    pub peer_initiated: bool,
}

/// Everything the state machine mutates. Built once at boot; `reset`
/// returns it to the boot state.
pub struct Context {
    pub config: Config,
    pub pools: PoolRegistry,
    pub sessions: SessionTable,
    pub cache: DiscoveryCache,
    pub flags: SessionFlags,
    pub power: PowerState,
    /// Transmit queue accepts more data.
    pub tx_flow_on: bool,
    /// Discovery entry whose name is being resolved.
    name_index: usize,
    inquiry_retries: u8,
    local_name: Option<Addr>,
}

impl Context {
    pub fn init(config: Config) -> Self {
        Self {
            config,
            pools: PoolRegistry::init(),
            sessions: SessionTable::new(),
            cache: DiscoveryCache::new(),
            flags: SessionFlags::default(),
            power: PowerState::Off,
            tx_flow_on: true,
            name_index: 0,
            inquiry_retries: 0,
            local_name: None,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::init(self.config);
    }

    pub fn name_index(&self) -> usize {
        self.name_index
    }
}

pub struct ConnectionManager<'a, E, A> {
    ctx: Context,
    engine: E,
    app: A,
    advisory: &'a Advisory,
}

impl<'a, E: ProtocolEngine, A: Application> ConnectionManager<'a, E, A> {
    pub fn new(config: Config, engine: E, app: A, advisory: &'a Advisory) -> Self {
        Self {
            ctx: Context::init(config),
            engine,
            app,
            advisory,
        }
    }

    pub fn reset(&mut self) {
        self.ctx.reset();
        self.advisory.reset();
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn app(&self) -> &A {
        &self.app
    }

    pub fn session(&self, slot: SlotId) -> &SessionRecord {
        self.ctx.sessions.get(slot)
    }

    pub fn handle_input(&mut self, input: UserInput) {
        match input {
            UserInput::PowerOn => self.power_on(),
            UserInput::ToggleConnect => self.toggle_connect(),
            UserInput::ToggleDataSend => self.toggle_data_send(),
            UserInput::DiscoverableTick => self.app.indicate(Indication::DiscoverableBlink),
            UserInput::LowPowerEntered => self.enter_low_power(),
        }
    }

    pub fn power_on(&mut self) {
        if self.ctx.power != PowerState::Off {
            debug!("radio already {:?}", self.ctx.power);
            return;
        }
        match self.engine.bluetooth_on() {
            Ok(()) => {
                info!("radio powering on");
                self.ctx.power = PowerState::TurningOn;
            }
            Err(e) => warn!("power on rejected: {:?}", e),
        }
    }

    /// With every slot idle, start looking for a peer. With a live data
    /// channel, take it down.
    pub fn toggle_connect(&mut self) {
        if self.ctx.power != PowerState::On {
            warn!("connect ignored, radio is off");
            return;
        }

        if self.ctx.sessions.all_disconnected() {
            if self.ctx.flags.connect_in_progress {
                info!("connect already in progress");
                return;
            }
            self.begin_connect();
            return;
        }

        match self.ctx.sessions.find_in_state(ConnState::SppConnected) {
            Some(slot) => self.user_disconnect(slot),
            None => info!("connect ignored, session setup busy"),
        }
    }

    pub fn toggle_data_send(&mut self) {
        let Some(slot) = self.ctx.sessions.find_in_state(ConnState::SppConnected) else {
            warn!("no data channel open");
            return;
        };
        let rec = self.ctx.sessions.get_mut(slot);
        if rec.transfer_enabled() {
            rec.transfer = Transfer::Off;
            info!("slot {} transfer off", slot.0);
        } else {
            rec.transfer = Transfer::On;
            info!("slot {} transfer on", slot.0);
            self.send_data(slot);
        }
    }

    /// Connect again after a locally started session was lost. Only when
    /// no other session is live, so a healthy one is never taken down.
    fn reconnect(&mut self) {
        if self.ctx.power != PowerState::On || self.ctx.flags.connect_in_progress {
            return;
        }
        if !self.ctx.sessions.all_disconnected() {
            info!("reconnect skipped, another session is live");
            return;
        }
        info!("reconnecting");
        self.begin_connect();
    }

    fn begin_connect(&mut self) {
        self.ctx.flags.initiator = true;
        self.ctx.inquiry_retries = 0;
        self.set_connecting(true);
        self.start_inquiry();
    }

    fn enter_low_power(&mut self) {
        info!("entering low power");
        for slot in self.ctx.sessions.ids() {
            self.ctx.sessions.get_mut(slot).transfer = Transfer::Off;
        }
    }

    fn set_connecting(&mut self, on: bool) {
        self.ctx.flags.connect_in_progress = on;
        self.advisory.set_connecting(on);
    }

    fn set_scan(&mut self, mode: ScanEnable) {
        match self.engine.write_scan_enable(mode) {
            Ok(()) => self
                .advisory
                .set_discoverable(mode == ScanEnable::InquiryAndPage),
            Err(e) => warn!("scan enable {:?} rejected: {:?}", mode, e),
        }
    }

    fn start_inquiry(&mut self) {
        self.ctx.cache.clear();
        self.ctx.name_index = 0;
        let c = &self.ctx.config;
        match self
            .engine
            .inquiry(c.inquiry_lap, c.inquiry_length, c.inquiry_max_responses)
        {
            Ok(()) => info!("inquiry started"),
            Err(e) => {
                warn!("inquiry rejected: {:?}", e);
                self.set_connecting(false);
                self.app.indicate(Indication::ConnectFailed);
            }
        }
    }

    /// Inquire again after a scan turned up nothing usable. Gives up after
    /// `inquiry_retry_limit` rounds when one is configured.
    fn restart_inquiry(&mut self) {
        if let Some(limit) = self.ctx.config.inquiry_retry_limit {
            if self.ctx.inquiry_retries >= limit {
                warn!("no peer after {} inquiries, giving up", limit);
                self.set_connecting(false);
                self.app.indicate(Indication::ConnectFailed);
                return;
            }
        }
        self.ctx.inquiry_retries = self.ctx.inquiry_retries.saturating_add(1);
        self.start_inquiry();
    }

    /// Ask for the name of the first cache entry at or after `start` that
    /// the engine accepts a request for.
    fn resolve_from(&mut self, start: usize) {
        let mut idx = start;
        while let Some(entry) = self.ctx.cache.get(idx).copied() {
            match self.engine.remote_name_request(
                entry.addr,
                entry.page_scan_mode,
                0,
                entry.clock_offset,
            ) {
                Ok(()) => {
                    debug!("resolving name of {:?}", entry.addr);
                    self.ctx.name_index = idx;
                    return;
                }
                Err(e) => {
                    warn!("name request for {:?} rejected: {:?}", entry.addr, e);
                    idx += 1;
                }
            }
        }
        info!("no candidate left");
        self.restart_inquiry();
    }

    fn page(&mut self, slot: SlotId) -> EngineResult {
        let rec = self.ctx.sessions.get(slot);
        let params = AclConnectParams {
            packet_type: self.ctx.config.acl_packet_type,
            page_scan_mode: rec.page_scan_mode,
            reserved: 0,
            clock_offset: rec.clock_offset,
            allow_role_switch: true,
        };
        self.engine.acl_connect(rec.peer, params)
    }

    fn set_state(&mut self, slot: SlotId, state: ConnState) {
        let rec = self.ctx.sessions.get_mut(slot);
        if rec.state != state {
            info!("slot {}: {:?} -> {:?}", slot.0, rec.state, state);
            rec.state = state;
        }
    }

    /// Free the record and anything it still holds from the pools.
    fn release_slot(&mut self, slot: SlotId) {
        if let Some(buf) = self.ctx.sessions.get_mut(slot).sdp_buffer.take() {
            self.ctx.pools.release(buf);
        }
        self.ctx.sessions.release(slot);
        debug!("slot {} released", slot.0);
    }

    fn disconnect_acl(&mut self, slot: SlotId, reason: u8) {
        let Some(handle) = self.ctx.sessions.get(slot).acl_handle else {
            // a completion could never be matched to this record
            warn!("slot {} link handle unknown, dropping session", slot.0);
            self.abandon_slot(slot);
            return;
        };
        match self.engine.acl_disconnect(handle, reason) {
            Ok(()) => self.set_state(slot, ConnState::AclDisconnecting),
            Err(e) => {
                // nothing will report this link going away
                warn!("disconnect of 0x{:04x} rejected: {:?}", handle, e);
                self.abandon_slot(slot);
            }
        }
    }

    /// Release a session whose link will never report going down.
    fn abandon_slot(&mut self, slot: SlotId) {
        if self.ctx.sessions.get(slot).locally_paged && self.ctx.flags.connect_in_progress {
            self.set_connecting(false);
        }
        self.release_slot(slot);
    }

    fn user_disconnect(&mut self, slot: SlotId) {
        let rec = self.ctx.sessions.get(slot);
        if let (LinkPower::Sniff, Some(handle)) = (rec.link, rec.acl_handle) {
            match self.engine.sniff_exit(handle) {
                Ok(()) => {
                    self.ctx.sessions.get_mut(slot).disconnect_on_active = true;
                    self.set_state(slot, ConnState::SppDisconnecting);
                    return;
                }
                Err(e) => warn!("sniff exit rejected: {:?}", e),
            }
        }
        self.spp_disconnect(slot);
    }

    fn spp_disconnect(&mut self, slot: SlotId) {
        let rec = self.ctx.sessions.get_mut(slot);
        rec.disconnect_on_active = false;
        let handle = rec.spp_handle;
        match self.engine.spp_disconnect(handle) {
            Ok(()) => self.set_state(slot, ConnState::SppDisconnecting),
            Err(e) => {
                warn!("spp disconnect rejected: {:?}", e);
                self.disconnect_acl(slot, REASON_USER_TERMINATED);
            }
        }
    }

    /// Sample one payload into a pool chunk and hand it to the engine.
    fn send_data(&mut self, slot: SlotId) {
        let rec = self.ctx.sessions.get(slot);
        if rec.state != ConnState::SppConnected || !rec.transfer_enabled() {
            return;
        }
        let handle = rec.spp_handle;

        let buf = match self.ctx.pools.alloc_mem(PAYLOAD_LEN) {
            Ok(buf) => buf,
            Err(e) => {
                warn!("no payload buffer: {:?}", e);
                return;
            }
        };
        let len = match self.ctx.pools.chunk_mut(buf) {
            Ok(chunk) => {
                let cap = chunk.len().min(PAYLOAD_LEN);
                self.app.sample(&mut chunk[..cap]).min(cap)
            }
            Err(_) => 0,
        };
        let sent = match self.ctx.pools.chunk(buf) {
            Ok(chunk) if len > 0 => self.engine.spp_send(handle, &chunk[..len]),
            _ => Ok(()),
        };
        self.ctx.pools.release(buf);

        if let Err(e) = sent {
            warn!("send on slot {} rejected: {:?}", slot.0, e);
            self.ctx.sessions.get_mut(slot).transfer = Transfer::PendingResume;
        }
    }

    /// Compose the local name once into bump space and push it to the
    /// engine.
    fn apply_local_name(&mut self, local: BdAddr) {
        let addr = match self.ctx.local_name {
            Some(addr) => addr,
            None => match self.ctx.pools.bump_allocate(LOCAL_NAME_MAX) {
                Ok(addr) => {
                    self.ctx.local_name = Some(addr);
                    addr
                }
                Err(e) => {
                    warn!("no room for local name: {:?}", e);
                    return;
                }
            },
        };
        let base = self.ctx.config.device_name;
        let Some(buf) = self.ctx.pools.bytes_mut(addr, LOCAL_NAME_MAX) else {
            return;
        };
        let len = match compose_local_name(base, &local, buf) {
            Ok(len) => len,
            Err(_) => fatal(Fatal::LocalNameTooLong),
        };
        if let Some(name) = self.ctx.pools.bytes(addr, len) {
            if let Err(e) = self.engine.change_local_name(name) {
                warn!("local name rejected: {:?}", e);
            }
        }
    }
}
