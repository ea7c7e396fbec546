//! Recording engine and board doubles for the state machine tests.

use std::mem::{discriminant, Discriminant};
use std::vec::Vec;

use crate::bd_addr::BdAddr;
use crate::config::SniffParams;
use crate::drive::{DriveCommand, HOST_FRAME_LEN};
use crate::engine::{AclConnectParams, EngineError, EngineResult, ProtocolEngine, ScanEnable};
use crate::lifecycle::{Application, Indication};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    BluetoothOn,
    ScanEnable(ScanEnable),
    LocalName(Vec<u8>),
    SupervisionTimeout(u16, u16),
    Inquiry,
    NameRequest(BdAddr),
    AclConnect(BdAddr),
    AclDisconnect(u16, u8),
    SdpOpen(BdAddr),
    AttributeRequest(BdAddr, u16),
    SdpClose(BdAddr),
    SppStart,
    SppConnect(BdAddr, u8),
    SppDisconnect(u16),
    SppSend(u16, Vec<u8>),
    SniffEnter(u16),
    SniffExit(u16),
}

#[derive(Default)]
pub struct MockEngine {
    pub requests: Vec<Request>,
    rejects: Vec<(Discriminant<Request>, EngineError, usize)>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse the next `times` requests of the same kind as `sample`.
    pub fn reject(&mut self, sample: Request, times: usize) {
        self.reject_with(sample, EngineError::Rejected(0x0C), times);
    }

    pub fn reject_with(&mut self, sample: Request, err: EngineError, times: usize) {
        self.rejects.push((discriminant(&sample), err, times));
    }

    pub fn take(&mut self) -> Vec<Request> {
        core::mem::take(&mut self.requests)
    }

    pub fn count(&self, f: impl Fn(&Request) -> bool) -> usize {
        self.requests.iter().filter(|r| f(*r)).count()
    }

    fn record(&mut self, req: Request) -> EngineResult {
        let d = discriminant(&req);
        self.requests.push(req);
        for (kind, err, times) in self.rejects.iter_mut() {
            if *kind == d && *times > 0 {
                *times -= 1;
                return Err(*err);
            }
        }
        Ok(())
    }
}

impl ProtocolEngine for MockEngine {
    fn bluetooth_on(&mut self) -> EngineResult {
        self.record(Request::BluetoothOn)
    }

    fn write_scan_enable(&mut self, mode: ScanEnable) -> EngineResult {
        self.record(Request::ScanEnable(mode))
    }

    fn change_local_name(&mut self, name: &[u8]) -> EngineResult {
        self.record(Request::LocalName(name.to_vec()))
    }

    fn write_link_supervision_timeout(&mut self, handle: u16, timeout: u16) -> EngineResult {
        self.record(Request::SupervisionTimeout(handle, timeout))
    }

    fn inquiry(&mut self, _lap: u32, _length: u8, _max_responses: u8) -> EngineResult {
        self.record(Request::Inquiry)
    }

    fn remote_name_request(&mut self, addr: BdAddr, _psm: u8, _reserved: u8, _offset: u16) -> EngineResult {
        self.record(Request::NameRequest(addr))
    }

    fn acl_connect(&mut self, addr: BdAddr, _params: AclConnectParams) -> EngineResult {
        self.record(Request::AclConnect(addr))
    }

    fn acl_disconnect(&mut self, handle: u16, reason: u8) -> EngineResult {
        self.record(Request::AclDisconnect(handle, reason))
    }

    fn sdp_open(&mut self, addr: BdAddr) -> EngineResult {
        self.record(Request::SdpOpen(addr))
    }

    fn service_search_attribute_request(
        &mut self,
        addr: BdAddr,
        _uuid: u16,
        _attribute_id: u16,
        capacity: u16,
    ) -> EngineResult {
        self.record(Request::AttributeRequest(addr, capacity))
    }

    fn sdp_close(&mut self, addr: BdAddr) -> EngineResult {
        self.record(Request::SdpClose(addr))
    }

    fn spp_start(&mut self) -> EngineResult {
        self.record(Request::SppStart)
    }

    fn spp_connect(&mut self, addr: BdAddr, channel: u8) -> EngineResult {
        self.record(Request::SppConnect(addr, channel))
    }

    fn spp_disconnect(&mut self, handle: u16) -> EngineResult {
        self.record(Request::SppDisconnect(handle))
    }

    fn spp_send(&mut self, handle: u16, data: &[u8]) -> EngineResult {
        self.record(Request::SppSend(handle, data.to_vec()))
    }

    fn sniff_enter(&mut self, handle: u16, _params: SniffParams) -> EngineResult {
        self.record(Request::SniffEnter(handle))
    }

    fn sniff_exit(&mut self, handle: u16) -> EngineResult {
        self.record(Request::SniffExit(handle))
    }
}

#[derive(Default)]
pub struct TestApp {
    pub indications: Vec<Indication>,
    pub drives: Vec<DriveCommand>,
    pub frames: Vec<[u8; HOST_FRAME_LEN]>,
    samples: u8,
}

impl TestApp {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Application for TestApp {
    fn sample(&mut self, buf: &mut [u8]) -> usize {
        self.samples = self.samples.wrapping_add(1);
        buf.fill(self.samples);
        buf.len()
    }

    fn on_drive(&mut self, cmd: DriveCommand) {
        self.drives.push(cmd);
    }

    fn on_host_frame(&mut self, frame: &[u8; HOST_FRAME_LEN]) {
        self.frames.push(*frame);
    }

    fn indicate(&mut self, indication: Indication) {
        self.indications.push(indication);
    }
}
