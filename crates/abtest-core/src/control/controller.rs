//! Non-realtime actor of one tester instance
//!
//! The controller owns everything the audio thread must not touch: ratings,
//! channel names, the blind-test shuffler and all store traffic. It is driven
//! by two notification streams, drained in [`TesterController::poll`]:
//!
//! ```text
//! PortSet ──notify_all──► port_events ─┐
//!                                      ├─► poll() ─► ratings / shuffle / names
//! KvtStore ──commit─────► kvt_events ──┘
//! ```
//!
//! Every surface reacts to the blind switch going on, but only the one that
//! claims the edge (see [`Port::take_rising_edge`]) or the `shuf` trigger
//! draws an order. It never applies it directly: the packed word is written
//! to the store and adopted when its change notification comes back, exactly
//! like every other observer of the same store.

use std::sync::Arc;

use crossbeam::channel::Receiver;

use super::names::ChannelNames;
use crate::blind::{BlindShuffler, ShuffleState, MIN_BLIND_CHANNELS};
use crate::error::{TesterError, TesterResult};
use crate::kvt::{self, KvtChange, KvtFlags, KvtStore, KvtValue, SHUFFLE_INDICES_PATH};
use crate::port::{layout, Port, PortId, PortSet};
use crate::rating::RatingRegistry;
use crate::types::Variant;

/// Control surface state for one tester
pub struct TesterController {
    variant: Variant,
    ports: Arc<PortSet>,
    store: Arc<KvtStore>,
    ratings: RatingRegistry,
    names: ChannelNames,
    shuffler: BlindShuffler,

    port_events: Receiver<PortId>,
    kvt_events: Receiver<KvtChange>,

    /// Decoded grid order while blind mode is on
    blind_order: Option<ShuffleState>,
    /// False while the current order exists only locally
    durable: bool,
    /// Last observed state of the blind switch
    blind_on: bool,

    blind_port: Arc<Port>,
    shuffle_port: Arc<Port>,
    reset_port: Arc<Port>,
    selector_port: Arc<Port>,
    /// Blind participation switch per group; `None` means always enabled
    enable_ports: Vec<Option<Arc<Port>>>,
}

impl TesterController {
    /// Attach a controller to a port set and store
    pub fn new(
        variant: Variant,
        ports: Arc<PortSet>,
        store: Arc<KvtStore>,
        shuffler: BlindShuffler,
    ) -> TesterResult<Self> {
        let groups = variant.group_count();
        let ratings = RatingRegistry::new(variant, &ports)?;
        let enable_ports = (1..=groups)
            .map(|g| ports.get(&layout::blind_enable_id(g)))
            .collect();

        let mut controller = Self {
            variant,
            port_events: ports.subscribe(),
            kvt_events: store.subscribe(),
            blind_port: ports.port(layout::BLIND)?,
            shuffle_port: ports.port(layout::SHUFFLE)?,
            reset_port: ports.port(layout::RESET)?,
            selector_port: ports.port(layout::SELECTOR)?,
            enable_ports,
            ratings,
            names: ChannelNames::new(groups),
            shuffler,
            blind_order: None,
            durable: true,
            blind_on: false,
            ports,
            store,
        };
        controller.restore_from_store();

        log::info!(
            "[CONTROL] {} controller attached ({} groups, blind {})",
            variant,
            groups,
            if controller.blind_on { "on" } else { "off" }
        );
        Ok(controller)
    }

    /// Pick up names and a running blind test left in the store.
    ///
    /// A blind switch that is already on without a usable stored order is
    /// handled like switching it on now.
    fn restore_from_store(&mut self) {
        let word = match self.store.lock() {
            Some(guard) => {
                self.names.load(&guard);
                guard.get_u32(SHUFFLE_INDICES_PATH)
            }
            None => {
                log::warn!("[CONTROL] Store unavailable, starting from defaults");
                None
            }
        };

        if !self.blind_port.is_on() {
            return;
        }
        self.blind_on = true;
        // The switch position is the state being restored, not a new edge
        self.blind_port.take_rising_edge();

        let groups = self.variant.group_count();
        match word.map(|w| ShuffleState::from_packed(w, groups)) {
            Some(state) if state.len() >= MIN_BLIND_CHANNELS => self.blind_order = Some(state),
            _ => {
                log::info!("[CONTROL] Blind test on without a stored order, shuffling");
                if self.shuffle().is_err() {
                    log::debug!("[CONTROL] Blind switch reverted on attach");
                }
            }
        }
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn ports(&self) -> &Arc<PortSet> {
        &self.ports
    }

    pub fn store(&self) -> &Arc<KvtStore> {
        &self.store
    }

    pub fn ratings(&self) -> &RatingRegistry {
        &self.ratings
    }

    pub fn ratings_mut(&mut self) -> &mut RatingRegistry {
        &mut self.ratings
    }

    pub fn names(&self) -> &ChannelNames {
        &self.names
    }

    /// Rename a 0-based group; pushed to the store on the next `idle`
    pub fn rename(&mut self, group: usize, name: impl Into<String>) -> bool {
        self.names.set(group, name)
    }

    /// Grid order of the running blind test
    pub fn blind_order(&self) -> Option<&ShuffleState> {
        self.blind_order.as_ref()
    }

    /// Whether the current order has been written to the store
    pub fn is_durable(&self) -> bool {
        self.durable
    }

    pub fn is_blind(&self) -> bool {
        self.blind_on
    }

    /// Group shown at a blind grid position
    pub fn blind_group_at(&self, position: usize) -> Option<usize> {
        self.blind_order.as_ref()?.channel_at(position)
    }

    /// Participation flags of every group, as the next shuffle will see them
    pub fn enabled_flags(&self) -> Vec<bool> {
        self.enable_ports
            .iter()
            .map(|p| p.as_ref().map(|p| p.is_on()).unwrap_or(true))
            .collect()
    }

    /// Switch every group's blind participation on or off.
    ///
    /// Only affects the next shuffle; a running test keeps its order.
    pub fn select_all_blind(&mut self, enabled: bool) {
        let value = if enabled { 1.0 } else { 0.0 };
        for port in self.enable_ports.iter().flatten() {
            port.set_value(value);
            port.notify_all();
        }
    }

    /// Flip the blind switch from this surface and handle the result.
    ///
    /// Same path as a host or another surface moving the `bte` port.
    pub fn set_blind(&mut self, enabled: bool) -> TesterResult<()> {
        self.blind_port.set_value(if enabled { 1.0 } else { 0.0 });
        self.blind_port.notify_all();
        self.poll()?;
        Ok(())
    }

    /// Fire the re-shuffle trigger from this surface
    pub fn reshuffle(&mut self) -> TesterResult<()> {
        fire(&self.shuffle_port);
        self.poll()?;
        Ok(())
    }

    /// Fire the rating reset trigger from this surface
    pub fn reset_ratings(&mut self) -> TesterResult<()> {
        fire(&self.reset_port);
        self.poll()?;
        Ok(())
    }

    /// Handle every pending notification.
    ///
    /// Returns how many were handled. A failed shuffle is reported after the
    /// queues have been drained; its side effects (blind switch forced off)
    /// are already applied.
    pub fn poll(&mut self) -> TesterResult<usize> {
        let mut handled = 0;
        let mut result = Ok(());

        loop {
            let mut progressed = false;
            while let Ok(id) = self.port_events.try_recv() {
                if let Err(e) = self.on_port(id) {
                    result = Err(e);
                }
                handled += 1;
                progressed = true;
            }
            while let Ok(change) = self.kvt_events.try_recv() {
                self.on_kvt(&change);
                handled += 1;
                progressed = true;
            }
            if !progressed {
                break;
            }
        }

        result.map(|_| handled)
    }

    /// Periodic housekeeping: push pending names and retry an unsaved order
    pub fn idle(&mut self) {
        self.names.idle(&self.store);

        if !self.durable {
            if let Some(state) = self.blind_order.clone() {
                if self.write_order(&state) {
                    log::info!("[CONTROL] Blind order persisted after store came back");
                }
            }
        }
    }

    /// Settings reset from the host: default names and ratings
    pub fn reset_settings(&mut self) {
        self.names.reset();
        self.ratings.reset_all();
        log::info!("[CONTROL] Settings reset");
    }

    fn on_port(&mut self, id: PortId) -> TesterResult<()> {
        if id == self.blind_port.index() {
            if self.blind_port.is_on() {
                if self.blind_port.take_rising_edge() {
                    self.blind_on = true;
                    return self.shuffle();
                }
                if !self.blind_on {
                    self.blind_on = true;
                    log::debug!("[CONTROL] Blind test switched on elsewhere, waiting for order");
                }
            } else if self.blind_on {
                self.blind_on = false;
                self.blind_order = None;
                self.durable = true;
                log::info!("[CONTROL] Blind test off");
            }
        } else if id == self.shuffle_port.index() {
            if !take_trigger(&self.shuffle_port) {
                return Ok(());
            }
            if self.blind_on {
                return self.shuffle();
            }
            log::debug!("[CONTROL] Shuffle ignored, blind test is off");
        } else if id == self.reset_port.index() {
            if take_trigger(&self.reset_port) {
                self.ratings.reset_all();
            }
        } else {
            self.ratings.on_port_notify(id);
        }
        Ok(())
    }

    fn on_kvt(&mut self, change: &KvtChange) {
        if change.path == SHUFFLE_INDICES_PATH {
            let Some(word) = change.value.as_u32() else {
                let e = TesterError::MalformedState {
                    path: change.path.clone(),
                    reason: format!("expected u32, got {:?}", change.value),
                };
                log::warn!("[CONTROL] {}", e);
                return;
            };
            if !self.blind_port.is_on() {
                log::debug!("[CONTROL] Shuffle word {:#010x} ignored, blind test is off", word);
                return;
            }
            let state = ShuffleState::from_packed(word, self.variant.group_count());
            log::debug!("[CONTROL] Adopted blind order {:?}", state.order());
            self.blind_on = true;
            self.blind_order = Some(state);
            self.durable = true;
        } else if kvt::parse_channel_name_path(&change.path).is_some() {
            self.names.kvt_changed(change);
        }
    }

    /// Draw a new order and publish it.
    ///
    /// Too few enabled groups switches blind mode back off and leaves the
    /// stored word as it was.
    fn shuffle(&mut self) -> TesterResult<()> {
        let enabled = self.enabled_flags();
        let state = match self.shuffler.shuffle(&enabled) {
            Ok(state) => state,
            Err(e) => {
                log::warn!("[CONTROL] {}; blind test switched off", e);
                self.blind_on = false;
                self.blind_order = None;
                self.blind_port.set_value(0.0);
                self.blind_port.notify_all();
                return Err(e);
            }
        };

        self.ratings.reset_all();
        self.selector_port.set_value(0.0);
        self.selector_port.notify_all();

        log::info!(
            "[CONTROL] Blind test shuffled: {} groups, word {:#010x}",
            state.len(),
            state.packed()
        );

        if !self.write_order(&state) {
            log::warn!("[CONTROL] {}; keeping blind order locally", TesterError::StoreUnavailable);
            self.blind_order = Some(state);
        }
        Ok(())
    }

    /// Write the packed order; false (and non-durable) if the store is unavailable
    fn write_order(&mut self, state: &ShuffleState) -> bool {
        match self.store.lock() {
            Some(mut guard) => {
                guard.put(SHUFFLE_INDICES_PATH, KvtValue::U32(state.packed()), KvtFlags::RX);
                self.durable = true;
                true
            }
            None => {
                self.durable = false;
                false
            }
        }
    }
}

/// Press a momentary button
fn fire(port: &Port) {
    port.set_value(1.0);
    port.notify_all();
}

/// Consume a trigger press, returning whether it was pressed
fn take_trigger(port: &Port) -> bool {
    let pressed = port.value() != 0.0;
    if pressed {
        port.set_value(0.0);
    }
    pressed
}
