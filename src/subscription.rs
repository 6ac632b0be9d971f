//! Registration table for listeners, with revocable RAII subscriptions.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// An ordered table of non-owning listener references.
///
/// Entries are held as weak references: the list never keeps a listener
/// alive, and a listener that was dropped without revoking its subscription is
/// skipped and pruned on the next fan-out. The table lives on a single thread;
/// both the level meter hub and the shared ticker use it on the presentation
/// side.
pub struct SubscriberList<S: ?Sized> {
    inner: Rc<RefCell<ListInner<S>>>,
}

struct ListInner<S: ?Sized> {
    next_id: u64,
    entries: Vec<(u64, Weak<RefCell<S>>)>,
}

impl<S: ?Sized + 'static> Default for SubscriberList<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ?Sized + 'static> SubscriberList<S> {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(ListInner {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    /// Registers a subscriber and returns the handle that keeps the
    /// registration alive. Dropping the handle unregisters immediately;
    /// dropping it after the list itself is gone is a no-op.
    pub fn subscribe(&self, subscriber: &Rc<RefCell<S>>) -> Subscription {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.entries.push((id, Rc::downgrade(subscriber)));

        let list = Rc::downgrade(&self.inner);
        Subscription {
            revoke: Some(Box::new(move || {
                if let Some(inner) = list.upgrade() {
                    inner.borrow_mut().entries.retain(|(entry_id, _)| *entry_id != id);
                }
            })),
        }
    }

    /// Number of currently live subscribers.
    pub fn len(&self) -> usize {
        self.inner
            .borrow()
            .entries
            .iter()
            .filter(|(_, weak)| weak.strong_count() > 0)
            .count()
    }

    /// Returns true when no live subscriber is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Calls `f` for every live subscriber, in registration order.
    ///
    /// The iteration works on a snapshot, so a subscriber may drop its own
    /// [`Subscription`] (or register new ones) from within the callback; such
    /// changes take effect on the next call. Dead entries are pruned
    /// afterwards.
    pub fn call(&self, mut f: impl FnMut(&mut S)) {
        let snapshot: Vec<_> = self.inner.borrow().entries.clone();
        for (_, weak) in &snapshot {
            if let Some(subscriber) = weak.upgrade() {
                f(&mut *subscriber.borrow_mut());
            }
        }
        self.inner
            .borrow_mut()
            .entries
            .retain(|(_, weak)| weak.strong_count() > 0);
    }
}

/// Handle representing a listener's registration; revokes it when dropped.
///
/// The default value is an empty subscription that revokes nothing, matching
/// the state of a listener that has not subscribed anywhere yet.
#[derive(Default)]
pub struct Subscription {
    revoke: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Revokes the registration now instead of at drop time.
    pub fn reset(&mut self) {
        if let Some(revoke) = self.revoke.take() {
            revoke();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.reset();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.revoke.is_some())
            .finish()
    }
}
