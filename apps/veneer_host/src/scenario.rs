//! Scripted facility session
//!
//! Builds a small facility on a [`SimEngine`], attaches the object model, and on
//! every tick plays the part of a few plugins: spawning and collecting pickups,
//! engaging generators, breaking doors, churning dummy players and temporary
//! hazards. The schedule is a pure function of the tick number, so two runs with
//! the same configuration produce the same report.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde::Serialize;
use tracing::{debug, info, warn};

use veneer_model::families::player::DUMMY_FLAG;
use veneer_model::{
    ContainerId, FamilyKind, FamilyRegistry, ItemType, LifecycleEvent, ModelStats, NativeHandle, NativeKind,
    ObjectModel, SimEngine, Wrapper, WrapperSummary,
};

use crate::config::{Config, ScenarioConfig};

const AUDIT_OWNER: &str = "audit";

/// Lifecycle events seen by the audit listener, per family
#[derive(Debug, Default, Serialize)]
pub struct AuditLog {
    pub created: BTreeMap<FamilyKind, u64>,
    pub destroyed: BTreeMap<FamilyKind, u64>,
}

/// Final session report
#[derive(Debug, Serialize)]
pub struct Report {
    pub name: String,
    pub ticks: u64,
    pub engine_notifications: u64,
    pub live_before_shutdown: Vec<WrapperSummary>,
    pub retired_at_shutdown: usize,
    pub stats: ModelStats,
    pub audit: AuditLog,
}

pub struct Facility {
    name: String,
    engine: SimEngine,
    model: Rc<RefCell<ObjectModel>>,
    audit: Rc<RefCell<AuditLog>>,
    rooms: Vec<ContainerId>,
    scenario: ScenarioConfig,
    ticks: u64,
    npc_serial: u32,
}

fn audit<W: Wrapper>(registry: &mut FamilyRegistry<W>, log: &Rc<RefCell<AuditLog>>) {
    let log = Rc::clone(log);
    registry.subscribe(AUDIT_OWNER, 100, move |event: &LifecycleEvent<W>| {
        let mut log = log.borrow_mut();
        let counter = if event.is_created() {
            log.created.entry(W::FAMILY).or_default()
        } else {
            log.destroyed.entry(W::FAMILY).or_default()
        };
        *counter += 1;
    });
}

impl Facility {
    pub fn new(config: &Config) -> veneer_model::Result<Self> {
        let model = ObjectModel::init(config.model.clone())?.into_shared();
        let audit_log = Rc::new(RefCell::new(AuditLog::default()));

        {
            let mut model = model.borrow_mut();
            audit(model.doors_mut(), &audit_log);
            audit(model.hazards_mut(), &audit_log);
            audit(model.structures_mut(), &audit_log);
            audit(model.pickups_mut(), &audit_log);
            audit(model.toys_mut(), &audit_log);
            audit(model.players_mut(), &audit_log);
        }

        let mut engine = SimEngine::new();
        let subscriptions = ObjectModel::attach(&model, &mut engine)?;
        debug!("Bridge attached with {} subscriptions", subscriptions);

        let rooms = (1..=config.scenario.rooms).map(ContainerId).collect();
        let mut facility = Self {
            name: config.name.clone(),
            engine,
            model,
            audit: audit_log,
            rooms,
            scenario: config.scenario.clone(),
            ticks: 0,
            npc_serial: 0,
        };
        facility.build();
        Ok(facility)
    }

    fn room(&self, n: u64) -> ContainerId {
        self.rooms[(n % self.rooms.len() as u64) as usize]
    }

    /// Spawn the static layout
    fn build(&mut self) {
        let rooms = self.rooms.clone();
        for (i, pair) in rooms.windows(2).enumerate() {
            let kind = if i % 3 == 2 {
                NativeKind::BreakableDoor
            } else {
                NativeKind::BasicDoor
            };
            self.engine.spawn(kind, &format!("DOOR_{}_{}", pair[0].0, pair[1].0), pair);
        }
        for room in &rooms {
            self.engine.spawn(NativeKind::LightSourceToy, &format!("LIGHT_{}", room.0), &[*room]);
        }

        let first = rooms[0];
        let second = rooms[1];
        self.engine.spawn_composite(
            NativeKind::CheckpointDoor,
            "CHECKPOINT_A",
            &[first],
            &[NativeKind::BasicDoor, NativeKind::BasicDoor],
        );
        self.engine.spawn_with(NativeKind::ElevatorDoor, "ELEVATOR_A", &[second], 1, &[]);
        self.engine.spawn(NativeKind::PryableDoor, "GATE_A", &[second]);
        // No dedicated wrapper: resolves to the basic door
        self.engine.spawn(NativeKind::DoorBase, "MAINTENANCE_HATCH", &[first]);

        self.engine.spawn_composite(
            NativeKind::Locker,
            "RIFLE_RACK",
            &[second],
            &[NativeKind::LockerChamber, NativeKind::LockerChamber, NativeKind::LockerChamber],
        );
        for (i, room) in rooms.iter().step_by(2).enumerate() {
            self.engine.spawn(NativeKind::Generator, &format!("GENERATOR_{}", i + 1), &[*room]);
        }
        self.engine.spawn(NativeKind::Workstation, "WORKBENCH", &[first]);
        // No wrapper: reported once and left unwrapped
        self.engine.spawn(NativeKind::StructureBase, "STORAGE_CRATE", &[second]);
        self.engine.spawn_with(NativeKind::SpeakerToy, "INTERCOM", &[first], 2, &[]);
        self.engine.spawn(NativeKind::ShootingTargetToy, "RANGE_TARGET", &[second]);
        self.engine.spawn(NativeKind::SinkholeHazard, "SINKHOLE", &[second]);

        for i in 0..self.scenario.players {
            let room = self.room(i as u64);
            self.engine
                .spawn_with(NativeKind::ReferenceHub, &format!("Player-{}", i + 1), &[room], 0, &[]);
        }

        info!(
            "Facility built: {} rooms, {} native objects",
            rooms.len(),
            self.engine.object_count()
        );
    }

    /// Advance the session by one tick
    pub fn tick(&mut self) {
        let n = self.ticks;
        self.ticks += 1;

        self.spawn_pickup(n);
        if n % 3 == 2 {
            self.collect_pickup();
        }
        if n % 4 == 3 {
            self.engage_generator();
        }
        if n % 5 == 4 {
            self.breach_doors();
        }
        if n % 6 == 0 {
            self.churn_npcs();
        }
        if n % 7 == 0 {
            self.cycle_hazard(n);
        }
        if self.scenario.loss_interval > 0 && n % self.scenario.loss_interval == self.scenario.loss_interval - 1 {
            self.lose_toy();
        }
    }

    fn spawn_pickup(&mut self, n: u64) {
        let raw = (n % 8) as u32 + 1;
        let kind = match ItemType::from_u32(raw) {
            Some(ItemType::Firearm) => NativeKind::FirearmPickup,
            Some(ItemType::Ammo) => NativeKind::AmmoPickup,
            Some(ItemType::GrenadeFrag | ItemType::GrenadeFlash | ItemType::Ball) => NativeKind::ThrownProjectile,
            _ => NativeKind::ItemPickup,
        };
        let room = self.room(n);
        self.engine.spawn_with(kind, &format!("ITEM_{}", n), &[room], raw, &[]);
    }

    /// A plugin picks up the item in the lowest engine slot
    fn collect_pickup(&mut self) {
        let Some(&handle) = self.engine.live_handles(FamilyKind::Pickup).first() else {
            return;
        };
        let pickup = self.model.borrow_mut().pickups_mut().get(&self.engine, handle);
        let Some(pickup) = pickup else {
            return;
        };
        if let Err(e) = pickup.request_destroy(&mut self.engine) {
            warn!("Failed to collect {}: {}", pickup.name(), e);
        }
    }

    /// Engage the next idle generator
    fn engage_generator(&mut self) {
        let handles = self.engine.live_handles(FamilyKind::Structure);
        for handle in handles {
            let structure = self.model.borrow_mut().structures_mut().get(&self.engine, handle);
            let Some(structure) = structure else {
                continue;
            };
            if structure.is_engaged(&self.engine) != Some(false) {
                continue;
            }
            match structure.activate(&mut self.engine) {
                Ok(()) => info!("{} engaged", structure.name()),
                Err(e) => warn!("Failed to engage {}: {}", structure.name(), e),
            }
            return;
        }
    }

    /// Damage every breakable door while holding the model
    ///
    /// Doors that break report their removal while the model is borrowed; those
    /// notifications are applied by the explicit pump below.
    fn breach_doors(&mut self) {
        let handles = self.engine.live_handles(FamilyKind::Door);
        let mut model = self.model.borrow_mut();
        for handle in handles {
            let Some(door) = model.doors_mut().get(&self.engine, handle) else {
                continue;
            };
            if !door.is_breakable() {
                continue;
            }
            if let Err(e) = door.damage(&mut self.engine, 40.0) {
                warn!("Failed to damage {}: {}", door.name(), e);
            }
        }
        let applied = model.pump_deferred(&self.engine);
        if applied > 0 {
            info!("Applied {} deferred notifications after the breach", applied);
        }
    }

    fn churn_npcs(&mut self) {
        let existing: Vec<NativeHandle> = {
            let model = self.model.borrow();
            model.players().iter().filter(|p| p.is_npc()).map(|p| p.handle()).collect()
        };
        for handle in existing {
            let npc = self.model.borrow().players().try_get(handle);
            if let Some(npc) = npc {
                if let Err(e) = npc.request_destroy(&mut self.engine) {
                    warn!("Failed to remove {}: {}", npc.nickname(), e);
                }
            }
        }

        self.npc_serial += 1;
        let room = self.room(self.npc_serial as u64);
        self.engine.spawn_with(
            NativeKind::ReferenceHub,
            &format!("Dummy-{}", self.npc_serial),
            &[room],
            DUMMY_FLAG,
            &[],
        );
    }

    fn cycle_hazard(&mut self, n: u64) {
        let temporary: Vec<_> = {
            let model = self.model.borrow();
            model.hazards().iter().filter(|h| h.is_temporary()).cloned().collect()
        };
        for hazard in temporary {
            if let Err(e) = hazard.expire(&mut self.engine) {
                warn!("Failed to expire {}: {}", hazard.name(), e);
            }
        }

        let kind = if n % 2 == 0 {
            NativeKind::TantrumHazard
        } else {
            NativeKind::AmnesticCloud
        };
        let room = self.room(n);
        self.engine.spawn_with(kind, &format!("HAZARD_{}", n), &[room], 15, &[]);
    }

    /// The engine drops a toy without telling anyone; a later lookup heals it
    fn lose_toy(&mut self) {
        let Some(&handle) = self.engine.live_handles(FamilyKind::Toy).last() else {
            return;
        };
        self.engine.despawn_silently(handle);
        let found = self.model.borrow_mut().toys_mut().get(&self.engine, handle);
        debug!("Lookup after silent loss returned {}", found.is_some());
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// One-line status for periodic logging
    pub fn status(&self) -> String {
        let stats = self.model.borrow().stats();
        let parts: Vec<String> = stats
            .families
            .iter()
            .map(|(family, family_stats)| format!("{}={}", family, family_stats.live))
            .collect();
        format!("tick {}: {}", self.ticks, parts.join(" "))
    }

    /// Retire every wrapper and build the session report
    pub fn shutdown(self) -> Report {
        let live_before_shutdown = self.model.borrow().snapshot();
        let retired_at_shutdown = self.model.borrow_mut().shutdown();
        let stats = self.model.borrow().stats();
        let audit = self.audit.take();

        Report {
            name: self.name,
            ticks: self.ticks,
            engine_notifications: self.engine.notifications_fired(),
            live_before_shutdown,
            retired_at_shutdown,
            stats,
            audit,
        }
    }
}
