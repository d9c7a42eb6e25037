//! Subscriber types for the reactive system.
//!
//! A subscriber is any effect that depends on reactive values. This includes
//! plain effects, the effects behind computed values, and component render
//! effects. A [`Dep`] is the set of subscribers attached to one reactive
//! slot: a `(target, key)` pair in the dependency store, or the private
//! slot of a ref or computed.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use super::effect::EffectInner;

/// Unique identifier for a subscriber.
///
/// Each effect gets a unique ID when created. This ID keys the effect in
/// every dependency set it joins and makes repeated subscription idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// A set of effects subscribed to one reactive slot.
///
/// Subscribers are kept in subscription order, which is the order in which
/// a trigger notifies them. The set holds its effects strongly: an effect
/// stays reachable from every set it joined until it is stopped or re-runs.
#[derive(Clone, Default)]
pub struct Dep(Rc<RefCell<IndexMap<SubscriberId, Rc<EffectInner>>>>);

impl Dep {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an effect. Returns `false` if it was already subscribed.
    pub(crate) fn insert(&self, effect: &Rc<EffectInner>) -> bool {
        let mut subscribers = self.0.borrow_mut();
        if subscribers.contains_key(&effect.id()) {
            return false;
        }
        subscribers.insert(effect.id(), Rc::clone(effect));
        true
    }

    /// Remove an effect, keeping the order of the others.
    pub(crate) fn remove(&self, id: SubscriberId) {
        self.0.borrow_mut().shift_remove(&id);
    }

    /// Whether the given effect is subscribed.
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.0.borrow().contains_key(&id)
    }

    /// Number of subscribed effects.
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the current subscribers, so that notifying them may freely
    /// change the set.
    pub(crate) fn snapshot(&self) -> Vec<Rc<EffectInner>> {
        self.0.borrow().values().cloned().collect()
    }

    /// Reference identity.
    pub fn ptr_eq(&self, other: &Dep) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Dep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dep")
            .field("subscribers", &self.0.borrow().keys().collect::<Vec<_>>())
            .finish()
    }
}
