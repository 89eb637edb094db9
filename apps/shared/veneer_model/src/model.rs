//! Host-owned object model context
//!
//! [`ObjectModel`] owns one [`FamilyRegistry`] per family plus the
//! [`LifecycleBridge`]. The host creates it with [`ObjectModel::init`], shares it
//! as `Rc<RefCell<ObjectModel>>`, attaches it to the engine once, and calls
//! [`ObjectModel::shutdown`] when the session ends.
//!
//! ```ignore
//! let model = ObjectModel::init(ModelConfig::default())?.into_shared();
//! ObjectModel::attach(&model, &mut engine)?;
//!
//! let door = model.borrow_mut().doors_mut().get(&engine, handle);
//! ```

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde::Serialize;
use tracing::{debug, info};

use crate::bridge::{BridgeStats, LifecycleBridge, Notification, NotificationSink, NotificationSource};
use crate::config::ModelConfig;
use crate::error::Result;
use crate::families::{Door, Hazard, Pickup, Player, Structure, Toy, door, hazard, pickup, player, structure, toy};
use crate::family::{FamilyChannel, FamilyRegistry, FamilyStats};
use crate::handle::ContainerId;
use crate::kind::FamilyKind;
use crate::native::NativeWorld;
use crate::wrapper::WrapperSummary;

/// Counters for every family and the bridge
#[derive(Debug, Clone, Serialize)]
pub struct ModelStats {
    pub families: BTreeMap<FamilyKind, FamilyStats>,
    pub bridge: BridgeStats,
}

impl ModelStats {
    pub fn live(&self) -> usize {
        self.families.values().map(|stats| stats.live).sum()
    }
}

pub struct ObjectModel {
    config: ModelConfig,
    bridge: LifecycleBridge,
    doors: FamilyRegistry<Door>,
    hazards: FamilyRegistry<Hazard>,
    structures: FamilyRegistry<Structure>,
    pickups: FamilyRegistry<Pickup>,
    toys: FamilyRegistry<Toy>,
    players: FamilyRegistry<Player>,
    shut_down: bool,
}

impl ObjectModel {
    /// Build every family registry with its default dispatch table and indices
    pub fn init(config: ModelConfig) -> Result<Self> {
        let mut model = Self {
            bridge: LifecycleBridge::new(config.tracked()),
            doors: door::registry()?,
            hazards: hazard::registry()?,
            structures: structure::registry()?,
            pickups: pickup::registry()?,
            toys: toy::registry()?,
            players: player::registry()?,
            config,
            shut_down: false,
        };

        let heal = model.config.heal_stale_entries;
        model.doors.set_heal_stale(heal);
        model.hazards.set_heal_stale(heal);
        model.structures.set_heal_stale(heal);
        model.pickups.set_heal_stale(heal);
        model.toys.set_heal_stale(heal);
        model.players.set_heal_stale(heal);

        info!(
            "Object model initialized (tracking: {})",
            model
                .bridge
                .tracked()
                .iter()
                .map(FamilyKind::name)
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(model)
    }

    pub fn into_shared(self) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(self))
    }

    /// Subscribe the model to the engine's notifications
    pub fn attach(model: &Rc<RefCell<Self>>, source: &mut dyn NotificationSource) -> Result<usize> {
        LifecycleBridge::attach(model, source)
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn is_attached(&self) -> bool {
        self.bridge.is_attached()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    pub fn doors(&self) -> &FamilyRegistry<Door> {
        &self.doors
    }

    pub fn doors_mut(&mut self) -> &mut FamilyRegistry<Door> {
        &mut self.doors
    }

    pub fn hazards(&self) -> &FamilyRegistry<Hazard> {
        &self.hazards
    }

    pub fn hazards_mut(&mut self) -> &mut FamilyRegistry<Hazard> {
        &mut self.hazards
    }

    pub fn structures(&self) -> &FamilyRegistry<Structure> {
        &self.structures
    }

    pub fn structures_mut(&mut self) -> &mut FamilyRegistry<Structure> {
        &mut self.structures
    }

    pub fn pickups(&self) -> &FamilyRegistry<Pickup> {
        &self.pickups
    }

    pub fn pickups_mut(&mut self) -> &mut FamilyRegistry<Pickup> {
        &mut self.pickups
    }

    pub fn toys(&self) -> &FamilyRegistry<Toy> {
        &self.toys
    }

    pub fn toys_mut(&mut self) -> &mut FamilyRegistry<Toy> {
        &mut self.toys
    }

    pub fn players(&self) -> &FamilyRegistry<Player> {
        &self.players
    }

    pub fn players_mut(&mut self) -> &mut FamilyRegistry<Player> {
        &mut self.players
    }

    /// Family-erased view of one registry
    pub fn family(&self, family: FamilyKind) -> &dyn FamilyChannel {
        match family {
            FamilyKind::Door => &self.doors,
            FamilyKind::Hazard => &self.hazards,
            FamilyKind::Structure => &self.structures,
            FamilyKind::Pickup => &self.pickups,
            FamilyKind::Toy => &self.toys,
            FamilyKind::Player => &self.players,
        }
    }

    fn family_mut(&mut self, family: FamilyKind) -> &mut dyn FamilyChannel {
        match family {
            FamilyKind::Door => &mut self.doors,
            FamilyKind::Hazard => &mut self.hazards,
            FamilyKind::Structure => &mut self.structures,
            FamilyKind::Pickup => &mut self.pickups,
            FamilyKind::Toy => &mut self.toys,
            FamilyKind::Player => &mut self.players,
        }
    }

    pub fn doors_in(&self, room: ContainerId) -> Vec<Rc<Door>> {
        self.doors.indexed(door::ROOM_INDEX, &room)
    }

    pub fn hazards_in(&self, room: ContainerId) -> Vec<Rc<Hazard>> {
        self.hazards.indexed(hazard::ROOM_INDEX, &room)
    }

    pub fn pickups_in(&self, room: ContainerId) -> Vec<Rc<Pickup>> {
        self.pickups.indexed(pickup::ROOM_INDEX, &room)
    }

    pub fn toys_in(&self, room: ContainerId) -> Vec<Rc<Toy>> {
        self.toys.indexed(toy::ROOM_INDEX, &room)
    }

    pub fn player_by_nickname(&self, nickname: &str) -> Option<Rc<Player>> {
        self.players
            .indexed(player::NICKNAME_INDEX, &nickname.to_string())
            .into_iter()
            .next()
    }

    fn apply(&mut self, world: &dyn NativeWorld, notification: Notification) {
        let channel: &mut dyn FamilyChannel = match notification.family {
            FamilyKind::Door => &mut self.doors,
            FamilyKind::Hazard => &mut self.hazards,
            FamilyKind::Structure => &mut self.structures,
            FamilyKind::Pickup => &mut self.pickups,
            FamilyKind::Toy => &mut self.toys,
            FamilyKind::Player => &mut self.players,
        };
        self.bridge.dispatch(channel, world, notification);
    }

    /// Apply notifications queued while the model was borrowed
    pub fn pump_deferred(&mut self, world: &dyn NativeWorld) -> usize {
        let mut applied = 0;
        while let Some(notification) = self.bridge.next_deferred() {
            if !self.shut_down {
                self.apply(world, notification);
            }
            applied += 1;
        }
        applied
    }

    pub fn deferred_len(&self) -> usize {
        self.bridge.deferred_len()
    }

    /// Retire every live wrapper, drop every lifecycle listener and close every
    /// registry
    ///
    /// Notifications arriving afterwards are ignored and `get` produces nothing.
    /// Returns the number of wrappers retired.
    pub fn shutdown(&mut self) -> usize {
        if self.shut_down {
            return 0;
        }
        self.shut_down = true;
        while self.bridge.next_deferred().is_some() {}

        let mut retired = 0;
        for family in FamilyKind::ALL {
            retired += self.family_mut(family).close();
        }
        info!("Object model shut down, {} wrappers retired", retired);
        retired
    }

    pub fn stats(&self) -> ModelStats {
        ModelStats {
            families: FamilyKind::ALL
                .into_iter()
                .map(|family| (family, self.family(family).stats()))
                .collect(),
            bridge: self.bridge.stats(),
        }
    }

    /// Summaries of every live wrapper, grouped by family then ordered by handle
    pub fn snapshot(&self) -> Vec<WrapperSummary> {
        FamilyKind::ALL
            .into_iter()
            .flat_map(|family| self.family(family).summaries())
            .collect()
    }
}

impl NotificationSink for ObjectModel {
    fn bridge_mut(&mut self) -> &mut LifecycleBridge {
        &mut self.bridge
    }

    fn deliver(&mut self, world: &dyn NativeWorld, notification: Notification) {
        if self.shut_down {
            debug!(
                family = %notification.family,
                handle = %notification.handle,
                "Object model shut down, {} notification ignored",
                notification.channel
            );
            return;
        }
        self.pump_deferred(world);
        self.apply(world, notification);
        self.pump_deferred(world);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::NativeKind;
    use crate::sim::SimEngine;
    use crate::wrapper::Wrapper;

    fn attached() -> (Rc<RefCell<ObjectModel>>, SimEngine) {
        let model = ObjectModel::init(ModelConfig::default()).unwrap().into_shared();
        let mut sim = SimEngine::new();
        assert_eq!(ObjectModel::attach(&model, &mut sim).unwrap(), 12);
        (model, sim)
    }

    #[test]
    fn test_eager_registration_through_bridge() {
        let (model, mut sim) = attached();
        let door = sim.spawn(NativeKind::BasicDoor, "LCZ_A", &[ContainerId(1)]);
        let player = sim.spawn(NativeKind::ReferenceHub, "Alice", &[]);

        let model = model.borrow();
        assert!(model.doors().try_get(door).is_some());
        assert_eq!(model.doors_in(ContainerId(1)).len(), 1);
        assert_eq!(model.player_by_nickname("Alice").unwrap().handle(), player);
        assert_eq!(model.stats().bridge.delivered, 2);
    }

    #[test]
    fn test_untracked_family_resolves_lazily() {
        let config = ModelConfig {
            tracked_families: vec![FamilyKind::Door],
            ..ModelConfig::default()
        };
        let model = ObjectModel::init(config).unwrap().into_shared();
        let mut sim = SimEngine::new();
        assert_eq!(ObjectModel::attach(&model, &mut sim).unwrap(), 2);

        let toy = sim.spawn(NativeKind::LightSourceToy, "lamp", &[]);
        assert!(model.borrow().toys().try_get(toy).is_none());
        assert!(model.borrow_mut().toys_mut().get(&sim, toy).is_some());
    }

    #[test]
    fn test_removal_while_borrowed_is_deferred() {
        let (model, mut sim) = attached();
        let door = sim.spawn(NativeKind::BreakableDoor, "HCZ_B", &[]);

        {
            let mut held = model.borrow_mut();
            let wrapper = held.doors_mut().get(&sim, door).unwrap();
            wrapper.request_destroy(&mut sim).unwrap();
            assert!(!wrapper.is_destroyed());
            assert_eq!(held.deferred_len(), 1);

            assert_eq!(held.pump_deferred(&sim), 1);
            assert!(wrapper.is_destroyed());
        }
        assert_eq!(model.borrow().stats().bridge.deferred, 1);
    }

    #[test]
    fn test_shutdown_retires_everything() {
        let (model, mut sim) = attached();
        sim.spawn_composite(
            NativeKind::Locker,
            "locker",
            &[],
            &[NativeKind::LockerChamber, NativeKind::LockerChamber],
        );
        sim.spawn(NativeKind::SpeakerToy, "speaker", &[]);
        let snapshot = model.borrow().snapshot();
        assert_eq!(snapshot.len(), 4);

        assert_eq!(model.borrow_mut().shutdown(), 4);
        assert_eq!(model.borrow().stats().live(), 0);

        sim.spawn(NativeKind::BasicDoor, "late", &[]);
        assert!(model.borrow().doors().is_empty());
        assert_eq!(model.borrow_mut().shutdown(), 0);
    }

    #[test]
    fn test_no_wrappers_after_shutdown() {
        let config = ModelConfig {
            heal_stale_entries: false,
            ..ModelConfig::default()
        };
        let model = ObjectModel::init(config).unwrap().into_shared();
        let mut sim = SimEngine::new();
        ObjectModel::attach(&model, &mut sim).unwrap();
        model.borrow_mut().shutdown();

        let door = sim.spawn(NativeKind::BasicDoor, "late", &[]);
        assert!(model.borrow_mut().doors_mut().get(&sim, door).is_none());
        assert!(model.borrow().doors().is_closed());

        sim.despawn(door);
        assert!(model.borrow().doors().try_get(door).is_none());
        assert_eq!(model.borrow().stats().live(), 0);
    }
}
