//! The control task and its queues.
//!
//! Interrupt handlers and the engine reader never touch the
//! [`ConnectionManager`]; they post [`UserInput`]s and [`Event`]s here and
//! the single control task applies them in order.

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::Timer;

use crate::advisory::Advisory;
use crate::config::{EVENT_QUEUE_DEPTH, INPUT_QUEUE_DEPTH};
use crate::dispatch;
use crate::engine::ProtocolEngine;
use crate::event::Event;
use crate::lifecycle::{Application, ConnectionManager};

pub type InputChannel = Channel<CriticalSectionRawMutex, UserInput, INPUT_QUEUE_DEPTH>;
pub type EventChannel = Channel<CriticalSectionRawMutex, Event, EVENT_QUEUE_DEPTH>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UserInput {
    PowerOn,
    ToggleConnect,
    ToggleDataSend,
    /// Indicator tick while discoverable.
    DiscoverableTick,
    LowPowerEntered,
}

/// Wait for one item and apply it. Engine events win over user input when
/// both are queued.
pub async fn step<E: ProtocolEngine, A: Application>(
    manager: &mut ConnectionManager<'_, E, A>,
    events: &EventChannel,
    inputs: &InputChannel,
) {
    match select(events.receive(), inputs.receive()).await {
        Either::First(event) => {
            trace!("event {:?}", event);
            dispatch::route(manager, event);
        }
        Either::Second(input) => {
            debug!("input {:?}", input);
            manager.handle_input(input);
        }
    }
}

pub async fn control_task<E: ProtocolEngine, A: Application>(
    manager: &mut ConnectionManager<'_, E, A>,
    events: &EventChannel,
    inputs: &InputChannel,
) -> ! {
    info!("control task running");
    loop {
        step(manager, events, inputs).await;
    }
}

/// Drives the advisory tick and the idle check. Stands in for the timer
/// interrupt on targets that run it as a task.
pub async fn timer_task(advisory: &Advisory, inputs: &InputChannel, inactivity_timeout: u32) -> ! {
    loop {
        Timer::after(advisory.tick_period()).await;
        advisory.on_timer_tick(inputs);
        if advisory.idle_check(inactivity_timeout, inputs) {
            info!("idle for {} ticks", inactivity_timeout);
        }
    }
}
