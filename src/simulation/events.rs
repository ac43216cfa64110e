//! Event system for observing changes inside a simulation

use std::sync::{Arc, Mutex};

use futures::Stream;
use log::debug;
use tokio::sync::mpsc::{channel, Receiver, Sender};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::address::DeviceAddress;
use super::state::SimulatedAdapterState;

/// Type of simulation event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    AdapterStateChanged,
    PeripheralAdded,
    ServiceAdded,
    ServiceRemoved,
    CharacteristicAdded,
    CharacteristicRemoved,
    GattConnected,
    GattDisconnected,
    CharacteristicValueChanged,
    SimulationReset,
}

/// Something that changed inside the simulation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulationEvent {
    /// `simulate_central` changed the adapter state
    AdapterStateChanged(SimulatedAdapterState),
    /// A peripheral was provisioned
    PeripheralAdded(DeviceAddress),
    ServiceAdded { address: DeviceAddress, uuid: Uuid },
    ServiceRemoved { address: DeviceAddress, uuid: Uuid },
    CharacteristicAdded { address: DeviceAddress, uuid: Uuid },
    CharacteristicRemoved { address: DeviceAddress, uuid: Uuid },
    /// The page connected to a peripheral's GATT server
    GattConnected(DeviceAddress),
    GattDisconnected(DeviceAddress),
    /// A notifying characteristic got a new value
    CharacteristicValueChanged {
        address: DeviceAddress,
        uuid: Uuid,
        value: Vec<u8>,
    },
    /// All simulation state was dropped
    SimulationReset,
}

impl SimulationEvent {
    pub fn get_type(&self) -> EventType {
        match self {
            Self::AdapterStateChanged(_) => EventType::AdapterStateChanged,
            Self::PeripheralAdded(_) => EventType::PeripheralAdded,
            Self::ServiceAdded { .. } => EventType::ServiceAdded,
            Self::ServiceRemoved { .. } => EventType::ServiceRemoved,
            Self::CharacteristicAdded { .. } => EventType::CharacteristicAdded,
            Self::CharacteristicRemoved { .. } => EventType::CharacteristicRemoved,
            Self::GattConnected(_) => EventType::GattConnected,
            Self::GattDisconnected(_) => EventType::GattDisconnected,
            Self::CharacteristicValueChanged { .. } => EventType::CharacteristicValueChanged,
            Self::SimulationReset => EventType::SimulationReset,
        }
    }

    /// The device address from this event, if any
    pub fn get_device_address(&self) -> Option<DeviceAddress> {
        match self {
            Self::PeripheralAdded(address)
            | Self::GattConnected(address)
            | Self::GattDisconnected(address) => Some(*address),
            Self::ServiceAdded { address, .. }
            | Self::ServiceRemoved { address, .. }
            | Self::CharacteristicAdded { address, .. }
            | Self::CharacteristicRemoved { address, .. }
            | Self::CharacteristicValueChanged { address, .. } => Some(*address),
            Self::AdapterStateChanged(_) | Self::SimulationReset => None,
        }
    }
}

/// Which events a subscriber is interested in
pub enum EventFilter {
    All,
    EventTypes(Vec<EventType>),
    Devices(Vec<DeviceAddress>),
    Custom(Box<dyn Fn(&SimulationEvent) -> bool + Send + Sync + 'static>),
}

impl std::fmt::Debug for EventFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => write!(f, "EventFilter::All"),
            Self::EventTypes(types) => write!(f, "EventFilter::EventTypes({:?})", types),
            Self::Devices(addresses) => write!(f, "EventFilter::Devices({:?})", addresses),
            Self::Custom(_) => write!(f, "EventFilter::Custom(<function>)"),
        }
    }
}

impl EventFilter {
    pub fn all() -> Self {
        Self::All
    }

    pub fn event_types(types: Vec<EventType>) -> Self {
        Self::EventTypes(types)
    }

    pub fn devices(addresses: Vec<DeviceAddress>) -> Self {
        Self::Devices(addresses)
    }

    pub fn custom<F>(filter_fn: F) -> Self
    where
        F: Fn(&SimulationEvent) -> bool + Send + Sync + 'static,
    {
        Self::Custom(Box::new(filter_fn))
    }

    /// Check if an event matches this filter
    pub fn matches(&self, event: &SimulationEvent) -> bool {
        match self {
            Self::All => true,
            Self::EventTypes(types) => types.contains(&event.get_type()),
            Self::Devices(addresses) => event
                .get_device_address()
                .map_or(false, |address| addresses.contains(&address)),
            Self::Custom(filter_fn) => filter_fn(event),
        }
    }
}

pub type SubscriberId = u32;

struct Subscriber {
    id: SubscriberId,
    sender: Sender<SimulationEvent>,
    filter: EventFilter,
}

#[derive(Default)]
struct Subscribers {
    next_id: SubscriberId,
    list: Vec<Subscriber>,
}

/// Distributes simulation events to subscribers.
///
/// Clones share the subscriber list; only the broker that was started owns
/// the dispatch task.
pub struct EventBroker {
    subscribers: Arc<Mutex<Subscribers>>,
    buffer: usize,
    event_sender: Sender<SimulationEvent>,
    event_receiver: Arc<Mutex<Option<Receiver<SimulationEvent>>>>,
    dispatch_task: Option<JoinHandle<()>>,
}

impl EventBroker {
    pub fn new(buffer: usize) -> Self {
        let (tx, rx) = channel(buffer);
        Self {
            subscribers: Arc::new(Mutex::new(Subscribers {
                next_id: 1,
                list: Vec::new(),
            })),
            buffer,
            event_sender: tx,
            event_receiver: Arc::new(Mutex::new(Some(rx))),
            dispatch_task: None,
        }
    }

    /// Sender that feeds this broker
    pub fn get_sender(&self) -> Sender<SimulationEvent> {
        self.event_sender.clone()
    }

    /// Start the dispatch task. Does nothing if already started.
    pub fn start(&mut self) {
        let receiver = match self.event_receiver.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        let Some(mut rx) = receiver else {
            return;
        };

        let subscribers = Arc::clone(&self.subscribers);
        self.dispatch_task = Some(tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let Ok(mut subscribers) = subscribers.lock() else {
                    break;
                };
                subscribers.list.retain(|subscriber| {
                    if !subscriber.filter.matches(&event) {
                        return !subscriber.sender.is_closed();
                    }
                    match subscriber.sender.try_send(event.clone()) {
                        Ok(()) => true,
                        Err(tokio::sync::mpsc::error::TrySendError::Full(_)) => {
                            debug!("Subscriber {} is lagging, dropped {:?}", subscriber.id, event);
                            true
                        }
                        Err(tokio::sync::mpsc::error::TrySendError::Closed(_)) => false,
                    }
                });
            }
        }));
    }

    /// Subscribe with a filter
    pub fn subscribe(&self, filter: EventFilter) -> (SubscriberId, Receiver<SimulationEvent>) {
        let (tx, rx) = channel(self.buffer);
        let mut id = 0;
        if let Ok(mut subscribers) = self.subscribers.lock() {
            id = subscribers.next_id;
            subscribers.next_id += 1;
            subscribers.list.push(Subscriber {
                id,
                sender: tx,
                filter,
            });
        }
        (id, rx)
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.list.retain(|s| s.id != id);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|s| s.list.len()).unwrap_or(0)
    }

    /// Stop dispatching and close every subscriber channel
    pub fn shutdown(&mut self) {
        if let Some(task) = self.dispatch_task.take() {
            task.abort();
        }
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.list.clear();
        }
    }
}

impl Clone for EventBroker {
    fn clone(&self) -> Self {
        Self {
            subscribers: Arc::clone(&self.subscribers),
            buffer: self.buffer,
            event_sender: self.event_sender.clone(),
            event_receiver: Arc::clone(&self.event_receiver),
            dispatch_task: None,
        }
    }
}

impl Drop for EventBroker {
    fn drop(&mut self) {
        if let Some(task) = self.dispatch_task.take() {
            task.abort();
        }
    }
}

/// Turn an event receiver into a `Stream`
pub fn receiver_to_stream(mut rx: Receiver<SimulationEvent>) -> impl Stream<Item = SimulationEvent> {
    async_stream::stream! {
        while let Some(event) = rx.recv().await {
            yield event;
        }
    }
}
