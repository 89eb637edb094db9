//! Lifecycle bridge between engine notifications and the family registries
//!
//! The engine announces object creation and destruction through a
//! [`NotificationSource`]. [`LifecycleBridge::attach`] subscribes once per tracked
//! family and channel; each subscription forwards to a [`NotificationSink`]
//! (the object model) held through a weak reference.
//!
//! Engine callbacks can arrive while the sink is already borrowed, for instance
//! when a plugin holding the model asks the engine to destroy an object and the
//! engine reports the removal before returning. Those notifications are queued
//! and applied at the next delivery, or when the host calls
//! [`crate::model::ObjectModel::pump_deferred`].

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use serde::Serialize;
use tracing::{debug, error};

use crate::error::{ModelError, Result};
use crate::family::{FamilyChannel, panic_message};
use crate::handle::NativeHandle;
use crate::kind::FamilyKind;
use crate::native::NativeWorld;

/// Kind of engine notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Added,
    Removed,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Added, Channel::Removed];
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Added => f.write_str("added"),
            Channel::Removed => f.write_str("removed"),
        }
    }
}

/// One engine notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub family: FamilyKind,
    pub channel: Channel,
    pub handle: NativeHandle,
}

impl Notification {
    pub fn added(family: FamilyKind, handle: NativeHandle) -> Self {
        Self {
            family,
            channel: Channel::Added,
            handle,
        }
    }

    pub fn removed(family: FamilyKind, handle: NativeHandle) -> Self {
        Self {
            family,
            channel: Channel::Removed,
            handle,
        }
    }
}

/// Callback registered with the engine
pub type NotificationListener = Box<dyn FnMut(&dyn NativeWorld, NativeHandle)>;

/// Engine side of the bridge
pub trait NotificationSource {
    /// Register `listener` for one family and channel
    ///
    /// The engine calls it synchronously, on the engine thread, once per event.
    fn subscribe(&mut self, family: FamilyKind, channel: Channel, listener: NotificationListener);
}

/// Receiver of bridged notifications
pub trait NotificationSink: 'static {
    fn bridge_mut(&mut self) -> &mut LifecycleBridge;

    fn deliver(&mut self, world: &dyn NativeWorld, notification: Notification);
}

/// Delivery counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BridgeStats {
    pub delivered: u64,
    pub faults: u64,
    /// Notifications that arrived while the sink was busy
    pub deferred: u64,
}

#[derive(Default)]
struct DeferredQueue {
    pending: RefCell<VecDeque<Notification>>,
    total: Cell<u64>,
}

impl DeferredQueue {
    fn push(&self, notification: Notification) {
        self.pending.borrow_mut().push_back(notification);
        self.total.set(self.total.get() + 1);
    }

    fn pop(&self) -> Option<Notification> {
        self.pending.borrow_mut().pop_front()
    }

    fn len(&self) -> usize {
        self.pending.borrow().len()
    }
}

/// Subscription state and delivery boundary of the object model
pub struct LifecycleBridge {
    tracked: Vec<FamilyKind>,
    attached: bool,
    deferred: Rc<DeferredQueue>,
    stats: BridgeStats,
}

impl LifecycleBridge {
    pub fn new(tracked: Vec<FamilyKind>) -> Self {
        Self {
            tracked,
            attached: false,
            deferred: Rc::new(DeferredQueue::default()),
            stats: BridgeStats::default(),
        }
    }

    pub fn tracks(&self, family: FamilyKind) -> bool {
        self.tracked.contains(&family)
    }

    pub fn tracked(&self) -> &[FamilyKind] {
        &self.tracked
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Subscribe `sink` to every tracked family on `source`
    ///
    /// Returns the number of subscriptions made. A bridge attaches once.
    pub fn attach<S: NotificationSink>(sink: &Rc<RefCell<S>>, source: &mut dyn NotificationSource) -> Result<usize> {
        let (tracked, deferred) = {
            let mut sink = sink.borrow_mut();
            let bridge = sink.bridge_mut();
            if bridge.attached {
                return Err(ModelError::AlreadyAttached);
            }
            bridge.attached = true;
            (bridge.tracked.clone(), Rc::clone(&bridge.deferred))
        };

        let mut subscriptions = 0;
        for family in tracked {
            for channel in Channel::ALL {
                let listener = Self::listener(Rc::downgrade(sink), Rc::clone(&deferred), family, channel);
                source.subscribe(family, channel, listener);
                subscriptions += 1;
            }
        }

        debug!("Lifecycle bridge attached with {} subscriptions", subscriptions);
        Ok(subscriptions)
    }

    fn listener<S: NotificationSink>(
        sink: Weak<RefCell<S>>,
        deferred: Rc<DeferredQueue>,
        family: FamilyKind,
        channel: Channel,
    ) -> NotificationListener {
        Box::new(move |world, handle| {
            let notification = Notification { family, channel, handle };
            let Some(target) = sink.upgrade() else {
                return;
            };
            match target.try_borrow_mut() {
                Ok(mut target) => target.deliver(world, notification),
                Err(_) => {
                    debug!(family = %family, handle = %handle, "Object model busy, deferring {} notification", channel);
                    deferred.push(notification);
                }
            };
        })
    }

    /// Next queued notification, oldest first
    pub fn next_deferred(&self) -> Option<Notification> {
        self.deferred.pop()
    }

    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    /// Hand one notification to its family registry
    ///
    /// Panics escaping the registry are caught here and never reach the engine.
    pub fn dispatch(&mut self, channel: &mut dyn FamilyChannel, world: &dyn NativeWorld, notification: Notification) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| match notification.channel {
            Channel::Added => channel.deliver_added(world, notification.handle),
            Channel::Removed => {
                channel.deliver_removed(notification.handle);
            }
        }));

        self.stats.delivered += 1;
        if let Err(payload) = outcome {
            error!(
                family = %notification.family,
                handle = %notification.handle,
                "Fault while handling {} notification: {}",
                notification.channel,
                panic_message(payload.as_ref())
            );
            self.stats.faults += 1;
        }
    }

    pub fn stats(&self) -> BridgeStats {
        BridgeStats {
            deferred: self.deferred.total.get(),
            ..self.stats
        }
    }
}
