//! Parameter ports - typed scalar cells shared by the control and audio threads
//!
//! A port holds one `f32` value in an atomic cell. The control thread writes
//! it and calls [`Port::notify_all`] to wake every subscriber; the audio
//! thread only ever reads (controls) or writes (meters) the atomic value and
//! never touches the notification bus.
//!
//! # Usage
//!
//! ```ignore
//! let ports = Arc::new(layout::build_ports(Variant::X4_MONO));
//! let events = ports.subscribe();
//!
//! let sel = ports.port(layout::SELECTOR)?;
//! sel.set_value(2.0);
//! sel.notify_all();
//!
//! assert_eq!(events.try_recv(), Ok(sel.index()));
//! ```

pub mod layout;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crossbeam::channel::{self, Receiver, Sender};

use crate::error::{TesterError, TesterResult};

/// Index of a port inside its [`PortSet`]
pub type PortId = usize;

/// What a port represents, which decides how its value is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    /// Continuous control (gain)
    Control,
    /// Stepped integer control (selector, rating)
    Integer,
    /// On/off toggle
    Switch,
    /// Momentary button; non-zero means "fire"
    Trigger,
    /// Output written by the audio thread
    Meter,
}

/// Static description of a port
#[derive(Debug, Clone)]
pub struct PortMeta {
    /// Short identifier, e.g. `g_1`
    pub id: String,
    /// Human readable name
    pub name: String,
    pub kind: PortKind,
    pub min: f32,
    pub max: f32,
    pub default: f32,
    pub step: f32,
}

impl PortMeta {
    /// Create a port description with a 0..1 range and zero default
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: PortKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            min: 0.0,
            max: 1.0,
            default: 0.0,
            step: 0.0,
        }
    }

    /// Set the value range
    pub fn with_range(mut self, min: f32, max: f32) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    /// Set the default value
    pub fn with_default(mut self, default: f32) -> Self {
        self.default = default;
        self
    }

    /// Set the step for integer ports
    pub fn with_step(mut self, step: f32) -> Self {
        self.step = step;
        self
    }
}

/// Fan-out of port change notifications
#[derive(Default)]
struct NotifyBus {
    subscribers: Mutex<Vec<Sender<PortId>>>,
}

impl NotifyBus {
    fn subscribe(&self) -> Receiver<PortId> {
        let (tx, rx) = channel::unbounded();
        match self.subscribers.lock() {
            Ok(mut subs) => subs.push(tx),
            Err(e) => log::warn!("[PORTS] Subscriber list poisoned: {}", e),
        }
        rx
    }

    fn broadcast(&self, id: PortId) {
        if let Ok(mut subs) = self.subscribers.lock() {
            // Dropped receivers unsubscribe themselves
            subs.retain(|tx| tx.send(id).is_ok());
        }
    }
}

/// A single scalar port
pub struct Port {
    index: PortId,
    meta: PortMeta,
    bits: AtomicU32,
    /// Set when the value crosses from off to on, cleared by the first claimant
    rising: AtomicBool,
    bus: Arc<NotifyBus>,
}

impl Port {
    /// Port identifier
    pub fn id(&self) -> &str {
        &self.meta.id
    }

    /// Index inside the owning set
    pub fn index(&self) -> PortId {
        self.index
    }

    /// Static description
    pub fn meta(&self) -> &PortMeta {
        &self.meta
    }

    /// Current value (wait-free, safe on the audio thread)
    #[inline]
    pub fn value(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }

    /// Store a new value, clamped to the port range (wait-free)
    #[inline]
    pub fn set_value(&self, value: f32) {
        let value = if value.is_nan() {
            self.meta.default
        } else {
            value.clamp(self.meta.min, self.meta.max)
        };
        let previous = f32::from_bits(self.bits.swap(value.to_bits(), Ordering::AcqRel));
        match (previous >= 0.5, value >= 0.5) {
            (false, true) => self.rising.store(true, Ordering::Release),
            (true, false) => self.rising.store(false, Ordering::Release),
            _ => {}
        }
    }

    /// Default value from the port description
    pub fn default_value(&self) -> f32 {
        self.meta.default
    }

    /// Restore the default value (no notification)
    pub fn reset(&self) {
        self.set_value(self.meta.default);
    }

    /// Switch/trigger state
    #[inline]
    pub fn is_on(&self) -> bool {
        self.value() >= 0.5
    }

    /// Claim the last off-to-on edge.
    ///
    /// Returns true for exactly one caller per edge, so surfaces sharing the
    /// port agree on who reacts to it. Switching off drops an unclaimed edge.
    pub fn take_rising_edge(&self) -> bool {
        self.rising.swap(false, Ordering::AcqRel)
    }

    /// Tell every bound listener that this port changed.
    ///
    /// Control thread only.
    pub fn notify_all(&self) {
        self.bus.broadcast(self.index);
    }
}

impl std::fmt::Debug for Port {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Port")
            .field("id", &self.meta.id)
            .field("value", &self.value())
            .finish()
    }
}

/// All ports of one tester instance, addressable by index or id
#[derive(Default)]
pub struct PortSet {
    ports: Vec<Arc<Port>>,
    by_id: HashMap<String, PortId>,
    bus: Arc<NotifyBus>,
}

impl PortSet {
    /// Create an empty port set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a port initialized to its default value
    pub fn add(&mut self, meta: PortMeta) -> Arc<Port> {
        let index = self.ports.len();
        let port = Arc::new(Port {
            index,
            bits: AtomicU32::new(meta.default.to_bits()),
            rising: AtomicBool::new(false),
            meta,
            bus: Arc::clone(&self.bus),
        });
        self.by_id.insert(port.meta.id.clone(), index);
        self.ports.push(Arc::clone(&port));
        port
    }

    /// Look up a port by id
    pub fn get(&self, id: &str) -> Option<Arc<Port>> {
        self.by_id.get(id).map(|&i| Arc::clone(&self.ports[i]))
    }

    /// Look up a port by id, failing with [`TesterError::UnknownPort`]
    pub fn port(&self, id: &str) -> TesterResult<Arc<Port>> {
        self.get(id).ok_or_else(|| TesterError::UnknownPort(id.to_string()))
    }

    /// Look up a port by index
    pub fn by_index(&self, index: PortId) -> Option<&Arc<Port>> {
        self.ports.get(index)
    }

    /// Receive the index of every port that gets `notify_all`ed from now on
    pub fn subscribe(&self) -> Receiver<PortId> {
        self.bus.subscribe()
    }

    /// Iterate over all ports
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Port>> {
        self.ports.iter()
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gain_meta() -> PortMeta {
        PortMeta::new("g_1", "Input gain 1", PortKind::Control)
            .with_range(0.0, 100.0)
            .with_default(1.0)
    }

    #[test]
    fn test_port_defaults_and_clamp() {
        let mut set = PortSet::new();
        let port = set.add(gain_meta());

        assert_eq!(port.value(), 1.0);
        port.set_value(250.0);
        assert_eq!(port.value(), 100.0);
        port.set_value(-3.0);
        assert_eq!(port.value(), 0.0);
        port.set_value(f32::NAN);
        assert_eq!(port.value(), 1.0);
        port.set_value(4.0);
        port.reset();
        assert_eq!(port.value(), port.default_value());
    }

    #[test]
    fn test_rising_edge_claimed_once() {
        let mut set = PortSet::new();
        let switch = set.add(PortMeta::new("bte", "Blind test", PortKind::Switch));

        assert!(!switch.take_rising_edge());
        switch.set_value(1.0);
        switch.set_value(1.0);
        assert!(switch.take_rising_edge());
        assert!(!switch.take_rising_edge());

        // Off drops an edge nobody claimed
        switch.set_value(0.0);
        switch.set_value(1.0);
        switch.set_value(0.0);
        assert!(!switch.take_rising_edge());
    }

    #[test]
    fn test_lookup() {
        let mut set = PortSet::new();
        set.add(gain_meta());
        assert!(set.get("g_1").is_some());
        assert_eq!(
            set.port("g_9").unwrap_err(),
            TesterError::UnknownPort("g_9".to_string())
        );
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_notify_reaches_all_subscribers() {
        let mut set = PortSet::new();
        let port = set.add(gain_meta());
        let a = set.subscribe();
        let b = set.subscribe();

        port.notify_all();

        assert_eq!(a.try_recv(), Ok(port.index()));
        assert_eq!(b.try_recv(), Ok(port.index()));
        assert!(a.try_recv().is_err());
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let mut set = PortSet::new();
        let port = set.add(gain_meta());
        let kept = set.subscribe();
        drop(set.subscribe());

        port.notify_all();
        port.notify_all();

        assert_eq!(kept.try_iter().count(), 2);
    }
}
