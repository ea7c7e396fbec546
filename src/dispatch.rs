//! Routes engine notifications to the lifecycle handlers.
//!
//! Nothing here keeps state between calls apart from a drop counter.
//! [`forward`] runs in the engine's reader context and only decodes and
//! queues; [`route`] runs in the control task that owns the
//! [`ConnectionManager`].

use core::sync::atomic::{AtomicU32, Ordering};

use crate::control::EventChannel;
use crate::engine::ProtocolEngine;
use crate::event::{Event, EventKind};
use crate::lifecycle::{Application, ConnectionManager};

static DROPPED_EVENTS: AtomicU32 = AtomicU32::new(0);

/// Events lost to a full queue or a payload that did not decode.
pub fn dropped_events() -> u32 {
    DROPPED_EVENTS.load(Ordering::Relaxed)
}

fn drop_event() {
    DROPPED_EVENTS.fetch_add(1, Ordering::Relaxed);
}

/// Engine callback entry. Never blocks.
pub fn forward(events: &EventChannel, kind: EventKind, payload: &[u8]) -> bool {
    let event = match Event::decode(kind, payload) {
        Ok(event) => event,
        Err(e) => {
            debug!("event dropped: {:?}", e);
            drop_event();
            return false;
        }
    };
    if events.try_send(event).is_err() {
        warn!("event queue full, {:?} dropped", kind);
        drop_event();
        return false;
    }
    true
}

/// Decode and handle in one step, for callers already on the control task.
pub fn dispatch<E: ProtocolEngine, A: Application>(
    manager: &mut ConnectionManager<'_, E, A>,
    kind: EventKind,
    payload: &[u8],
) {
    match Event::decode(kind, payload) {
        Ok(event) => route(manager, event),
        Err(e) => {
            debug!("event dropped: {:?}", e);
            drop_event();
        }
    }
}

pub fn route<E: ProtocolEngine, A: Application>(manager: &mut ConnectionManager<'_, E, A>, event: Event) {
    match event {
        Event::InquiryComplete { status } => manager.on_inquiry_complete(status),
        Event::InquiryResult { entries } => manager.on_inquiry_result(&entries),
        Event::ConnectionComplete {
            status,
            handle,
            addr,
            link_type,
            encryption: _,
        } => manager.on_connection_complete(status, handle, addr, link_type),
        Event::DisconnectionComplete {
            status,
            handle,
            reason,
        } => manager.on_disconnection_complete(status, handle, reason),
        Event::RemoteNameComplete { status, addr, name } => {
            manager.on_remote_name_complete(status, addr, &name)
        }
        Event::CommandComplete {
            num_packets: _,
            opcode,
            status,
        } => manager.on_command_complete(opcode, status),
        Event::CommandStatus {
            status,
            num_packets: _,
            opcode,
        } => manager.on_command_status(status, opcode),
        Event::RoleChange { status, addr, role } => manager.on_role_change(status, addr, role),
        Event::ModeChange {
            status,
            handle,
            mode,
            interval,
        } => manager.on_mode_change(status, handle, mode, interval),
        Event::LinkKeyNotification { addr } => manager.on_link_key(addr),
        Event::Sdp {
            command,
            status,
            data,
        } => manager.on_sdp(command, status, &data),
        Event::Spp {
            handle,
            event,
            result,
            data,
        } => manager.on_spp(handle, event, result, &data),
        Event::TxQueueFlow { on } => manager.on_tx_queue_flow(on),
        Event::BluetoothOn { local_addr } => manager.on_bluetooth_on(local_addr),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisory::Advisory;
    use crate::config::Config;
    use crate::event::hci;
    use crate::lifecycle::PowerState;
    use crate::testutil::{MockEngine, Request, TestApp};

    #[test]
    fn test_dispatch_decodes_and_routes() {
        let adv = Advisory::new();
        let mut manager = ConnectionManager::new(Config::DEFAULT, MockEngine::new(), TestApp::new(), &adv);
        manager.power_on();
        dispatch(&mut manager, EventKind::BluetoothOn, &[0x34, 0x12, 0, 0, 0, 0]);
        assert_eq!(manager.context().power, PowerState::On);
        assert!(manager.engine().requests.contains(&Request::SppStart));
    }

    #[test]
    fn test_bad_payload_is_dropped() {
        let adv = Advisory::new();
        let mut manager = ConnectionManager::new(Config::DEFAULT, MockEngine::new(), TestApp::new(), &adv);
        let before = dropped_events();
        dispatch(&mut manager, EventKind::Hci(hci::CONNECTION_COMPLETE), &[0, 1]);
        dispatch(&mut manager, EventKind::Hci(hci::VENDOR_DEBUG), &[]);
        assert!(manager.engine().requests.is_empty());
        assert!(dropped_events() >= before + 2);
    }

    #[test]
    fn test_drop_counter_from_several_contexts() {
        let before = dropped_events();
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..1000 {
                        drop_event();
                    }
                });
            }
        });
        assert!(dropped_events() >= before + 4000);
    }
}
