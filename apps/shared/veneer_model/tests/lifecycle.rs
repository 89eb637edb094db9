//! End-to-end lifecycle tests driving the object model through `SimEngine`

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

use veneer_model::families::{Door, DoorVariant, Structure, door};
use veneer_model::{
    CommandError, ContainerId, FamilyKind, FamilyRegistry, LifecycleEvent, ModelConfig, ModelError, NativeCommand,
    NativeEngine, NativeHandle, NativeKind, NativeObject, NativeWorld, ObjectModel, SecondaryIndex, SimEngine,
    Wrapper, WrapperState,
};

// ============================================================================
// Log capture
// ============================================================================

#[derive(Clone, Default)]
struct CaptureLayer {
    events: Arc<Mutex<Vec<(Level, String)>>>,
}

struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{:?}", value);
        }
    }
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        // Engine-side logs are not the model's output
        if event.metadata().target() == "veneer_model::sim" {
            return;
        }
        let mut visitor = MessageVisitor(String::new());
        event.record(&mut visitor);
        self.events.lock().unwrap().push((*event.metadata().level(), visitor.0));
    }
}

/// Run `f` with a capturing subscriber; returns its result and the captured events
fn capture<T>(f: impl FnOnce() -> T) -> (T, Vec<(Level, String)>) {
    let layer = CaptureLayer::default();
    let events = Arc::clone(&layer.events);
    let subscriber = tracing_subscriber::registry().with(layer);
    let result = tracing::subscriber::with_default(subscriber, f);
    let events = events.lock().unwrap().clone();
    (result, events)
}

fn count(events: &[(Level, String)], level: Level) -> usize {
    events.iter().filter(|(l, _)| *l == level).count()
}

// ============================================================================
// Fixtures
// ============================================================================

fn attached_model() -> (Rc<RefCell<ObjectModel>>, SimEngine) {
    let model = ObjectModel::init(ModelConfig::default()).unwrap().into_shared();
    let mut sim = SimEngine::new();
    ObjectModel::attach(&model, &mut sim).unwrap();
    (model, sim)
}

/// Engine wrapper counting every command that reaches it
struct CountingEngine {
    inner: SimEngine,
    submitted: usize,
}

impl NativeWorld for CountingEngine {
    fn describe(&self, handle: NativeHandle) -> Option<NativeObject> {
        self.inner.describe(handle)
    }
}

impl NativeEngine for CountingEngine {
    fn submit(&mut self, handle: NativeHandle, command: NativeCommand) -> Result<(), CommandError> {
        self.submitted += 1;
        self.inner.submit(handle, command)
    }
}

// ============================================================================
// Identity
// ============================================================================

#[test]
fn test_get_returns_same_instance() {
    let mut sim = SimEngine::new();
    let handle = sim.spawn(NativeKind::BasicDoor, "LCZ_A", &[]);
    let mut doors = door::registry().unwrap();

    let first = doors.get(&sim, handle).unwrap();
    let second = doors.get(&sim, handle).unwrap();
    assert!(Rc::ptr_eq(&first, &second));
    assert_eq!(doors.stats().constructed, 1);
}

#[test]
fn test_null_and_unknown_handles_yield_nothing() {
    let sim = SimEngine::new();
    let mut doors = door::registry().unwrap();

    assert!(doors.get(&sim, NativeHandle::NULL).is_none());
    assert!(doors.get(&sim, NativeHandle::new(42, 1)).is_none());
    assert!(doors.is_empty());
}

#[test]
fn test_removed_wrapper_is_destroyed_and_unregistered() {
    let (model, mut sim) = attached_model();
    let handle = sim.spawn(NativeKind::BasicDoor, "LCZ_A", &[ContainerId(1)]);
    let wrapper = model.borrow().doors().try_get(handle).unwrap();

    sim.despawn(handle);

    let model = model.borrow();
    assert!(model.doors().try_get(handle).is_none());
    assert!(wrapper.is_destroyed());
    assert_eq!(wrapper.core().state(), WrapperState::Destroyed);
    assert!(model.doors_in(ContainerId(1)).is_empty());
}

#[test]
fn test_duplicate_added_constructs_once() {
    let mut sim = SimEngine::new();
    let handle = sim.spawn(NativeKind::BreakableDoor, "HCZ_B", &[]);
    let mut doors = door::registry().unwrap();

    doors.on_added(&sim, handle);
    doors.on_added(&sim, handle);

    assert_eq!(doors.len(), 1);
    assert_eq!(doors.stats().constructed, 1);
    assert_eq!(doors.stats().added_noops, 1);
}

#[test]
fn test_lazy_get_before_added_matches_eager_path() {
    let mut sim = SimEngine::new();
    let handle = sim.spawn(NativeKind::PryableDoor, "GATE_A", &[]);
    let mut lazy = door::registry().unwrap();
    let mut eager = door::registry().unwrap();

    let from_get = lazy.get(&sim, handle).unwrap();
    lazy.on_added(&sim, handle);
    assert!(Rc::ptr_eq(&from_get, &lazy.try_get(handle).unwrap()));
    assert_eq!(lazy.stats().constructed, 1);

    eager.on_added(&sim, handle);
    let from_added = eager.try_get(handle).unwrap();
    assert_eq!(from_get.summary().variant, from_added.summary().variant);
    assert_eq!(from_get.summary().kind, from_added.summary().kind);
}

#[test]
fn test_removed_for_unknown_handle_is_noop() {
    let mut doors = door::registry().unwrap();
    assert!(!doors.on_removed(NativeHandle::new(9, 1)));
    assert_eq!(doors.stats().removed_noops, 1);
}

// ============================================================================
// Dispatch
// ============================================================================

#[test]
fn test_dispatch_uses_exact_kind() {
    let (model, mut sim) = attached_model();
    let pryable = sim.spawn(NativeKind::PryableDoor, "GATE_A", &[]);
    let elevator = sim.spawn(NativeKind::ElevatorDoor, "ELEV_A", &[]);

    let model = model.borrow();
    let pryable = model.doors().try_get(pryable).unwrap();
    assert!(matches!(pryable.variant(), DoorVariant::Gate { .. }));
    let elevator = model.doors().try_get(elevator).unwrap();
    assert!(matches!(elevator.variant(), DoorVariant::Elevator { .. }));
}

#[test]
fn test_fallback_miss_is_silent() {
    let mut sim = SimEngine::new();
    let handle = sim.spawn(NativeKind::DoorBase, "ODD", &[]);
    let mut doors = door::registry().unwrap();

    let (wrapper, events) = capture(|| doors.get(&sim, handle));
    assert_eq!(wrapper.unwrap().variant_name(), "basic");
    assert_eq!(count(&events, Level::WARN), 0);
    assert_eq!(count(&events, Level::ERROR), 0);
    assert!(events.iter().any(|(level, message)| *level == Level::DEBUG && message.contains("base wrapper")));
}

#[test]
fn test_diagnostic_miss_logs_exactly_once() {
    let mut sim = SimEngine::new();
    let handle = sim.spawn(NativeKind::StructureBase, "mystery", &[]);
    let mut model = ObjectModel::init(ModelConfig::default()).unwrap();

    let (wrapper, events) = capture(|| model.structures_mut().get(&sim, handle));
    assert!(wrapper.is_none());
    assert_eq!(count(&events, Level::WARN) + count(&events, Level::ERROR), 1);
}

#[test]
fn test_diagnostic_miss_through_bridge_logs_exactly_once() {
    let (model, mut sim) = attached_model();

    let (handle, events) = capture(|| sim.spawn(NativeKind::StructureBase, "mystery", &[]));
    assert_eq!(events.len(), 1, "{events:?}");
    assert_eq!(events[0].0, Level::WARN);
    assert!(model.borrow().structures().try_get(handle).is_none());
    assert_eq!(model.borrow().stats().families[&FamilyKind::Structure].misses, 1);
}

#[test]
fn test_refusing_candidates_log_exactly_once() {
    let mut sim = SimEngine::new();
    let handle = sim.spawn_with(NativeKind::AmmoPickup, "mislabeled", &[], 2, &[]);
    let mut model = ObjectModel::init(ModelConfig::default()).unwrap();

    let (wrapper, events) = capture(|| model.pickups_mut().get(&sim, handle));
    assert!(wrapper.is_none());
    assert_eq!(count(&events, Level::WARN), 1);
    assert_eq!(model.stats().families[&FamilyKind::Pickup].misses, 1);
}

// ============================================================================
// Composites
// ============================================================================

#[test]
fn test_composite_removal_clears_parent_and_children() {
    let (model, mut sim) = attached_model();
    let checkpoint = sim.spawn_composite(
        NativeKind::CheckpointDoor,
        "CHECKPOINT_A",
        &[ContainerId(3)],
        &[NativeKind::BasicDoor, NativeKind::BasicDoor, NativeKind::BreakableDoor],
    );

    let (parent, children) = {
        let model = model.borrow();
        let parent = model.doors().try_get(checkpoint).unwrap();
        let children: Vec<_> = parent.sub_doors().iter().map(|door| door.handle()).collect();
        assert_eq!(children.len(), 3);
        assert_eq!(model.doors().len(), 4);
        (parent, children)
    };

    sim.despawn(checkpoint);

    let model = model.borrow();
    assert!(model.doors().try_get(checkpoint).is_none());
    for child in &children {
        assert!(model.doors().try_get(*child).is_none());
    }
    assert!(model.doors().is_empty());
    assert!(parent.sub_doors().iter().all(|door| door.is_destroyed()));
    assert!(model.doors_in(ContainerId(3)).is_empty());
    // Removals for the children found nothing left to do
    assert_eq!(model.doors().stats().removed_noops, 3);
    assert_eq!(model.doors().stats().retired, 4);
}

#[test]
fn test_composite_removal_without_bridge() {
    let mut sim = SimEngine::new();
    let locker = sim.spawn_composite(
        NativeKind::Locker,
        "locker",
        &[],
        &[NativeKind::LockerChamber, NativeKind::LockerChamber, NativeKind::LockerChamber],
    );
    let mut model = ObjectModel::init(ModelConfig::default()).unwrap();
    let structures = model.structures_mut();

    let wrapper = structures.get(&sim, locker).unwrap();
    let chambers: Vec<NativeHandle> = wrapper.chambers().iter().map(|c| c.handle()).collect();
    assert_eq!(structures.len(), 4);

    structures.on_removed(locker);
    assert_eq!(structures.len(), 0);
    for chamber in chambers {
        assert!(structures.try_get(chamber).is_none());
    }
}

// ============================================================================
// Destroyed wrappers
// ============================================================================

#[test]
fn test_destroyed_wrapper_operation_policy() {
    let mut engine = CountingEngine {
        inner: SimEngine::new(),
        submitted: 0,
    };
    let handle = engine.inner.spawn(NativeKind::BreakableDoor, "HCZ_B", &[ContainerId(2)]);
    let mut doors: FamilyRegistry<Door> = door::registry().unwrap();
    let wrapper = doors.get(&engine, handle).unwrap();
    wrapper.core().attach("owner", serde_json::json!("plugin-a")).unwrap();

    engine.inner.despawn(handle);
    doors.on_removed(handle);

    // cached reads
    assert_eq!(wrapper.handle(), handle);
    assert_eq!(wrapper.name(), "HCZ_B");
    assert_eq!(wrapper.rooms(), &[ContainerId(2)]);
    assert!(wrapper.max_health().is_some());

    // live reads
    assert_eq!(wrapper.is_open(&engine), None);
    assert_eq!(wrapper.health(&engine), None);
    assert!(!wrapper.is_valid(&engine));

    // attachments
    assert_eq!(wrapper.core().attachment("owner"), None);
    assert!(matches!(
        wrapper.core().attach("owner", serde_json::json!(1)),
        Err(ModelError::Destroyed { .. })
    ));

    // mutations never reach the engine
    for result in [
        wrapper.set_open(&mut engine, true),
        wrapper.set_locked(&mut engine, true),
        wrapper.damage(&mut engine, 5.0),
        wrapper.request_destroy(&mut engine),
    ] {
        assert!(matches!(result, Err(ModelError::Destroyed { .. })));
    }
    assert_eq!(engine.submitted, 0);
}

#[test]
fn test_engine_rejection_surfaces_as_command_error() {
    let mut sim = SimEngine::new();
    let handle = sim.spawn(NativeKind::BasicDoor, "LCZ_A", &[]);
    let mut doors = door::registry().unwrap();
    let wrapper = doors.get(&sim, handle).unwrap();

    wrapper.set_locked(&mut sim, true).unwrap();
    assert!(matches!(
        wrapper.set_open(&mut sim, true),
        Err(ModelError::Command(CommandError::Rejected(..)))
    ));
    assert_eq!(wrapper.is_locked(&sim), Some(true));
}

// ============================================================================
// Stale entries
// ============================================================================

#[test]
fn test_stale_entry_is_healed_on_get() {
    let (model, mut sim) = attached_model();
    let handle = sim.spawn(NativeKind::SpeakerToy, "speaker", &[ContainerId(5)]);
    let wrapper = model.borrow().toys().try_get(handle).unwrap();

    sim.despawn_silently(handle);
    assert!(model.borrow().toys().try_get(handle).is_some());

    let (healed, events) = capture(|| model.borrow_mut().toys_mut().get(&sim, handle));
    assert!(healed.is_none());
    assert!(wrapper.is_destroyed());
    assert_eq!(count(&events, Level::WARN), 1);

    let model = model.borrow();
    assert!(model.toys().try_get(handle).is_none());
    assert!(model.toys_in(ContainerId(5)).is_empty());
    assert_eq!(model.toys().stats().stale_evictions, 1);
}

#[test]
fn test_stale_entry_kept_when_healing_disabled() {
    let config = ModelConfig {
        heal_stale_entries: false,
        ..ModelConfig::default()
    };
    let model = ObjectModel::init(config).unwrap().into_shared();
    let mut sim = SimEngine::new();
    ObjectModel::attach(&model, &mut sim).unwrap();

    let handle = sim.spawn(NativeKind::Generator, "gen", &[]);
    sim.despawn_silently(handle);

    let wrapper = model.borrow_mut().structures_mut().get(&sim, handle).unwrap();
    assert!(!wrapper.is_destroyed());
    assert!(!wrapper.is_valid(&sim));
    assert_eq!(wrapper.is_engaged(&sim), None);
}

// ============================================================================
// Lifecycle listeners and re-entrancy
// ============================================================================

#[test]
fn test_listeners_see_eager_and_lazy_paths() {
    let (model, mut sim) = attached_model();
    let log = Rc::new(RefCell::new(Vec::new()));

    let sink = Rc::clone(&log);
    model.borrow_mut().players_mut().subscribe("plugin-a", 0, move |event: &LifecycleEvent<_>| {
        sink.borrow_mut().push((event.is_created(), event.wrapper().nickname().to_string()));
    });

    let alice = sim.spawn(NativeKind::ReferenceHub, "Alice", &[]);
    sim.despawn(alice);

    assert_eq!(
        *log.borrow(),
        vec![(true, "Alice".to_string()), (false, "Alice".to_string())]
    );
    assert_eq!(model.borrow_mut().players_mut().unsubscribe_owner("plugin-a"), 1);
}

#[test]
fn test_engine_destroying_object_mid_borrow() {
    let (model, mut sim) = attached_model();
    let target = sim.spawn(NativeKind::ShootingTargetToy, "target", &[]);

    let mut held = model.borrow_mut();
    let wrapper = held.toys_mut().get(&sim, target).unwrap();
    wrapper.hit(&mut sim, 500.0).unwrap();

    // The engine destroyed the target while the model was borrowed
    assert!(!sim.is_alive(target));
    assert!(!wrapper.is_destroyed());
    assert_eq!(held.deferred_len(), 1);

    held.pump_deferred(&sim);
    assert!(wrapper.is_destroyed());
    assert!(held.toys().try_get(target).is_none());
}

#[test]
fn test_attach_twice_is_rejected() {
    let (model, mut sim) = attached_model();
    assert!(matches!(
        ObjectModel::attach(&model, &mut sim),
        Err(ModelError::AlreadyAttached)
    ));
}

// ============================================================================
// Enumeration
// ============================================================================

#[test]
fn test_snapshot_serializes() {
    let (model, mut sim) = attached_model();
    sim.spawn(NativeKind::BasicDoor, "LCZ_A", &[ContainerId(1)]);
    sim.spawn_with(NativeKind::ItemPickup, "card", &[ContainerId(1)], 1, &[]);

    let model = model.borrow();
    let snapshot = serde_json::to_value(model.snapshot()).unwrap();
    let entries = snapshot.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["family"], "door");
    assert_eq!(entries[1]["variant"], "keycard");

    let stats = serde_json::to_value(model.stats()).unwrap();
    assert_eq!(stats["families"]["pickup"]["constructed"], 1);
    assert_eq!(stats["bridge"]["delivered"], 2);
    assert!(model.pickups().find(|pickup| pickup.name() == "card").is_some());
}

// ============================================================================
// Faulty plugin indices
// ============================================================================

/// Plugin index that panics when one named structure leaves it
struct FragileIndex {
    fragile: &'static str,
}

impl SecondaryIndex<Structure> for FragileIndex {
    fn name(&self) -> &'static str {
        "fragile"
    }

    fn on_added(&mut self, _wrapper: &Rc<Structure>) {}

    fn on_removed(&mut self, wrapper: &Rc<Structure>) {
        if wrapper.name() == self.fragile {
            panic!("index exploded");
        }
    }

    fn clear(&mut self) {}

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[test]
fn test_panicking_index_does_not_stop_teardown_cascade() {
    let (model, mut sim) = attached_model();
    model
        .borrow_mut()
        .structures_mut()
        .add_index(Box::new(FragileIndex { fragile: "locker" }));
    let locker = sim.spawn_composite(
        NativeKind::Locker,
        "locker",
        &[ContainerId(1)],
        &[NativeKind::LockerChamber, NativeKind::LockerChamber, NativeKind::LockerChamber],
    );
    let parent = model.borrow().structures().try_get(locker).unwrap();
    let chambers = parent.chambers().to_vec();
    let destroyed = Rc::new(RefCell::new(0));
    let seen = Rc::clone(&destroyed);
    model.borrow_mut().structures_mut().subscribe("audit", 0, move |event| {
        if !event.is_created() {
            *seen.borrow_mut() += 1;
        }
    });

    let (_, events) = capture(|| sim.despawn(locker));

    assert!(parent.is_destroyed());
    assert!(chambers.iter().all(|chamber| chamber.is_destroyed()));
    assert_eq!(*destroyed.borrow(), 4);
    assert_eq!(count(&events, Level::ERROR), 1);

    let stats = model.borrow().stats();
    assert_eq!(stats.families[&FamilyKind::Structure].teardown_faults, 1);
    assert_eq!(stats.families[&FamilyKind::Structure].retired, 4);
    assert_eq!(stats.families[&FamilyKind::Structure].live, 0);
    assert_eq!(stats.bridge.faults, 0);
}
