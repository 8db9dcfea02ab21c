//! Hot, reference-counted event streams over the hook registry.
//!
//! A [`ChangeBroadcaster`] registers one hook with the [`MessageHookRegistry`]
//! when its first subscriber arrives and removes it when the last one leaves.
//! Matching messages are decoded into a typed event and published
//! synchronously, in subscription order, on the thread running the message
//! loop. Nothing is buffered: a subscriber only sees events raised after it
//! subscribed.

use crossbeam_channel::{Receiver, TrySendError};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::{Rc, Weak};
use tracing::{debug, info, trace, warn};

use crate::error::PlatformResult;
use crate::hook::{HookId, HookOutcome, MessageHookRegistry};
use crate::messages::WindowMessage;

/// Capacity of the channel behind [`ChangeBroadcaster::subscribe_channel`].
pub const CHANNEL_CAPACITY: usize = 1024;

/// Extra native setup tied to a broadcaster's hook, e.g. registering the
/// hook window as a clipboard format listener.
pub trait BroadcastLifecycle {
    /// Called right after the hook is added, on the 0 → 1 transition.
    fn attach(&self, registry: &MessageHookRegistry) -> PlatformResult<()>;
    /// Called right before the hook is removed, on the 1 → 0 transition.
    fn detach(&self, registry: &MessageHookRegistry);
}

type Decoder<E> = Box<dyn Fn(&WindowMessage) -> Option<E>>;

struct Subscriber<E> {
    id: u64,
    active: Cell<bool>,
    listener: Box<dyn Fn(&E)>,
}

struct BroadcastState<E> {
    name: &'static str,
    registry: MessageHookRegistry,
    decoder: Decoder<E>,
    lifecycle: Option<Box<dyn BroadcastLifecycle>>,
    subscribers: RefCell<Vec<Rc<Subscriber<E>>>>,
    hook: Cell<Option<HookId>>,
    next_id: Cell<u64>,
}

impl<E: 'static> BroadcastState<E> {
    fn publish(&self, message: &WindowMessage) {
        let Some(event) = (self.decoder)(message) else {
            return;
        };
        let snapshot: Vec<Rc<Subscriber<E>>> = self.subscribers.borrow().clone();
        trace!(name = self.name, subscribers = snapshot.len(), "Publishing change");
        for subscriber in snapshot {
            if !subscriber.active.get() {
                continue;
            }
            if catch_unwind(AssertUnwindSafe(|| (subscriber.listener)(&event))).is_err() {
                warn!(name = self.name, id = subscriber.id, "Change listener panicked");
            }
        }
    }

    fn hook_up(self: &Rc<Self>) -> PlatformResult<()> {
        let state = Rc::downgrade(self);
        let hook = self.registry.add_hook(move |message| {
            if let Some(state) = state.upgrade() {
                state.publish(message);
            }
            Ok(HookOutcome::Continue)
        })?;
        if let Some(lifecycle) = &self.lifecycle {
            if let Err(e) = lifecycle.attach(&self.registry) {
                self.registry.remove_hook(hook)?;
                return Err(e);
            }
        }
        self.hook.set(Some(hook));
        info!(name = self.name, %hook, "Change broadcaster hooked");
        Ok(())
    }
}

impl<E> BroadcastState<E> {
    fn unhook(&self) {
        let Some(hook) = self.hook.take() else {
            return;
        };
        if let Some(lifecycle) = &self.lifecycle {
            lifecycle.detach(&self.registry);
        }
        if let Err(e) = self.registry.remove_hook(hook) {
            warn!(name = self.name, %hook, error = %e, "Failed to remove change hook");
        }
        info!(name = self.name, "Change broadcaster unhooked");
    }
}

impl<E> Drop for BroadcastState<E> {
    fn drop(&mut self) {
        self.unhook();
    }
}

trait Unsubscribe {
    fn unsubscribe(&self, id: u64);
}

impl<E: 'static> Unsubscribe for BroadcastState<E> {
    fn unsubscribe(&self, id: u64) {
        let remaining = {
            let mut subscribers = self.subscribers.borrow_mut();
            let Some(pos) = subscribers.iter().position(|s| s.id == id) else {
                return;
            };
            subscribers.remove(pos).active.set(false);
            subscribers.len()
        };
        debug!(name = self.name, id, remaining, "Unsubscribed");
        if remaining == 0 {
            self.unhook();
        }
    }
}

/// A shared stream of `E` decoded from window messages. Clones share the
/// subscriber list and the hook.
pub struct ChangeBroadcaster<E> {
    state: Rc<BroadcastState<E>>,
}

impl<E> Clone for ChangeBroadcaster<E> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<E: 'static> ChangeBroadcaster<E> {
    /// `decoder` turns a message into an event, or `None` if it does not
    /// belong to this stream.
    pub fn new<D>(name: &'static str, registry: &MessageHookRegistry, decoder: D) -> Self
    where
        D: Fn(&WindowMessage) -> Option<E> + 'static,
    {
        Self::build(name, registry, Box::new(decoder), None)
    }

    pub fn with_lifecycle<D, L>(name: &'static str, registry: &MessageHookRegistry, decoder: D, lifecycle: L) -> Self
    where
        D: Fn(&WindowMessage) -> Option<E> + 'static,
        L: BroadcastLifecycle + 'static,
    {
        Self::build(name, registry, Box::new(decoder), Some(Box::new(lifecycle)))
    }

    fn build(
        name: &'static str,
        registry: &MessageHookRegistry,
        decoder: Decoder<E>,
        lifecycle: Option<Box<dyn BroadcastLifecycle>>,
    ) -> Self {
        Self {
            state: Rc::new(BroadcastState {
                name,
                registry: registry.clone(),
                decoder,
                lifecycle,
                subscribers: RefCell::new(Vec::new()),
                hook: Cell::new(None),
                next_id: Cell::new(1),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.state.name
    }

    /// Start receiving events. The first subscriber hooks the stream up.
    pub fn subscribe<F>(&self, listener: F) -> PlatformResult<Subscription>
    where
        F: Fn(&E) + 'static,
    {
        if self.state.hook.get().is_none() {
            self.state.hook_up()?;
        }
        let id = self.state.next_id.get();
        self.state.next_id.set(id + 1);
        self.state.subscribers.borrow_mut().push(Rc::new(Subscriber {
            id,
            active: Cell::new(true),
            listener: Box::new(listener),
        }));
        debug!(name = self.state.name, id, subscribers = self.subscriber_count(), "Subscribed");

        let owner: Weak<dyn Unsubscribe> = Rc::downgrade(&self.state) as Weak<dyn Unsubscribe>;
        Ok(Subscription {
            owner,
            id,
            disposed: Cell::new(false),
        })
    }

    /// Like [`subscribe`](Self::subscribe), delivering only events accepted
    /// by `filter`.
    pub fn subscribe_filtered<P, F>(&self, filter: P, listener: F) -> PlatformResult<Subscription>
    where
        P: Fn(&E) -> bool + 'static,
        F: Fn(&E) + 'static,
    {
        self.subscribe(move |event| {
            if filter(event) {
                listener(event);
            }
        })
    }

    /// Forward events to a bounded channel, for consumers on other threads.
    ///
    /// Events are dropped with a warning when the channel is full.
    pub fn subscribe_channel(&self) -> PlatformResult<(Subscription, Receiver<E>)>
    where
        E: Clone + Send,
    {
        let (tx, rx) = crossbeam_channel::bounded(CHANNEL_CAPACITY);
        let name = self.state.name;
        let subscription = self.subscribe(move |event: &E| match tx.try_send(event.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => warn!(name, "Change channel full, event dropped"),
            Err(TrySendError::Disconnected(_)) => trace!(name, "Change channel closed"),
        })?;
        Ok((subscription, rx))
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.subscribers.borrow().len()
    }

    /// Whether the stream currently holds a hook in the registry.
    pub fn is_hooked(&self) -> bool {
        self.state.hook.get().is_some()
    }
}

/// One listener's interest in a broadcaster. Disposed explicitly or on drop.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    owner: Weak<dyn Unsubscribe>,
    id: u64,
    disposed: Cell<bool>,
}

impl Subscription {
    /// Stop delivery. Disposing more than once has no effect.
    pub fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        if let Some(owner) = self.owner.upgrade() {
            owner.unsubscribe(self.id);
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("disposed", &self.disposed.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlatformError;
    use crate::messages::WindowsMessage;
    use crate::testing::FakeHookHost;

    const WM_PING: u32 = WindowsMessage::User as u32 + 7;

    fn ping(value: usize) -> WindowMessage {
        unsafe { WindowMessage::from_native(FakeHookHost::WINDOW, WM_PING, value, 0) }
    }

    fn setup() -> (FakeHookHost, MessageHookRegistry, ChangeBroadcaster<usize>) {
        let host = FakeHookHost::new();
        let registry = MessageHookRegistry::new(host.clone());
        let broadcaster =
            ChangeBroadcaster::new("ping", &registry, |m: &WindowMessage| (m.msg() == WM_PING).then(|| m.wparam()));
        (host, registry, broadcaster)
    }

    #[test]
    fn test_two_listeners_each_get_one_event_in_order() {
        let (host, _registry, broadcaster) = setup();
        let log = Rc::new(RefCell::new(Vec::new()));
        let first_log = log.clone();
        let second_log = log.clone();
        let _a = broadcaster.subscribe(move |v| first_log.borrow_mut().push(("a", *v))).unwrap();
        let _b = broadcaster.subscribe(move |v| second_log.borrow_mut().push(("b", *v))).unwrap();

        host.send(&ping(9));
        assert_eq!(*log.borrow(), vec![("a", 9), ("b", 9)]);
    }

    #[test]
    fn test_hook_follows_subscriber_count() {
        let (_host, registry, broadcaster) = setup();
        assert!(!broadcaster.is_hooked());
        assert_eq!(registry.hook_count(), 0);

        let a = broadcaster.subscribe(|_| {}).unwrap();
        let b = broadcaster.subscribe(|_| {}).unwrap();
        assert_eq!(registry.hook_count(), 1);
        assert_eq!(broadcaster.subscriber_count(), 2);

        a.dispose();
        assert_eq!(broadcaster.subscriber_count(), 1);
        assert!(broadcaster.is_hooked());
        b.dispose();
        assert_eq!(broadcaster.subscriber_count(), 0);
        assert!(!broadcaster.is_hooked());
        assert_eq!(registry.hook_count(), 0);
    }

    #[test]
    fn test_double_dispose_is_noop() {
        let (_host, _registry, broadcaster) = setup();
        let a = broadcaster.subscribe(|_| {}).unwrap();
        let _b = broadcaster.subscribe(|_| {}).unwrap();
        a.dispose();
        a.dispose();
        assert!(a.is_disposed());
        assert_eq!(broadcaster.subscriber_count(), 1);
        drop(a);
        assert_eq!(broadcaster.subscriber_count(), 1);
    }

    #[test]
    fn test_no_replay_for_late_subscribers() {
        let (host, _registry, broadcaster) = setup();
        let _early = broadcaster.subscribe(|_| {}).unwrap();
        host.send(&ping(1));

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let _late = broadcaster.subscribe(move |v| sink.borrow_mut().push(*v)).unwrap();
        assert!(seen.borrow().is_empty());
        host.send(&ping(2));
        assert_eq!(*seen.borrow(), vec![2]);
    }

    #[test]
    fn test_disposed_listener_gets_nothing() {
        let (host, _registry, broadcaster) = setup();
        let count = Rc::new(Cell::new(0));
        let counter = count.clone();
        let sub = broadcaster.subscribe(move |_| counter.set(counter.get() + 1)).unwrap();
        host.send(&ping(1));
        sub.dispose();
        host.send(&ping(2));
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_non_matching_messages_are_ignored() {
        let (host, _registry, broadcaster) = setup();
        let count = Rc::new(Cell::new(0));
        let counter = count.clone();
        let _sub = broadcaster.subscribe(move |_| counter.set(counter.get() + 1)).unwrap();
        host.post(WindowsMessage::ThemeChanged.raw());
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn test_filtered_subscription() {
        let (host, _registry, broadcaster) = setup();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let _sub = broadcaster
            .subscribe_filtered(|v| v % 2 == 0, move |v| sink.borrow_mut().push(*v))
            .unwrap();
        for value in 1..=4 {
            host.send(&ping(value));
        }
        assert_eq!(*seen.borrow(), vec![2, 4]);
    }

    #[test]
    fn test_listener_may_dispose_itself() {
        let (host, registry, broadcaster) = setup();
        let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let own = slot.clone();
        let sub = broadcaster
            .subscribe(move |_| {
                if let Some(sub) = own.borrow_mut().take() {
                    sub.dispose();
                }
            })
            .unwrap();
        *slot.borrow_mut() = Some(sub);

        host.send(&ping(1));
        assert_eq!(broadcaster.subscriber_count(), 0);
        assert_eq!(registry.hook_count(), 0);
    }

    #[test]
    fn test_channel_subscription() {
        let (host, _registry, broadcaster) = setup();
        let (sub, rx) = broadcaster.subscribe_channel().unwrap();
        host.send(&ping(5));
        host.send(&ping(6));
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![5, 6]);
        drop(sub);
        host.send(&ping(7));
        assert!(rx.try_recv().is_err());
    }

    struct Recording {
        log: Rc<RefCell<Vec<&'static str>>>,
        fail: bool,
    }

    impl BroadcastLifecycle for Recording {
        fn attach(&self, registry: &MessageHookRegistry) -> PlatformResult<()> {
            assert_eq!(registry.window_handle(), FakeHookHost::WINDOW);
            self.log.borrow_mut().push("attach");
            if self.fail {
                return Err(PlatformError::ResourceUnavailable {
                    operation: "AddClipboardFormatListener",
                    code: 5,
                });
            }
            Ok(())
        }

        fn detach(&self, _registry: &MessageHookRegistry) {
            self.log.borrow_mut().push("detach");
        }
    }

    #[test]
    fn test_lifecycle_runs_on_transitions() {
        let host = FakeHookHost::new();
        let registry = MessageHookRegistry::new(host);
        let log = Rc::new(RefCell::new(Vec::new()));
        let broadcaster = ChangeBroadcaster::with_lifecycle(
            "clipboard",
            &registry,
            |_: &WindowMessage| Some(()),
            Recording { log: log.clone(), fail: false },
        );
        let a = broadcaster.subscribe(|_| {}).unwrap();
        let b = broadcaster.subscribe(|_| {}).unwrap();
        drop(a);
        drop(b);
        assert_eq!(*log.borrow(), vec!["attach", "detach"]);
    }

    #[test]
    fn test_failed_attach_leaves_no_hook() {
        let host = FakeHookHost::new();
        let registry = MessageHookRegistry::new(host);
        let log = Rc::new(RefCell::new(Vec::new()));
        let broadcaster = ChangeBroadcaster::with_lifecycle(
            "clipboard",
            &registry,
            |_: &WindowMessage| Some(()),
            Recording { log, fail: true },
        );
        let err = broadcaster.subscribe(|_| {}).unwrap_err();
        assert_eq!(err.native_code(), Some(5));
        assert!(!broadcaster.is_hooked());
        assert_eq!(registry.hook_count(), 0);
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[test]
    fn test_dropping_broadcaster_removes_hook() {
        let (_host, registry, broadcaster) = setup();
        let sub = broadcaster.subscribe(|_| {}).unwrap();
        drop(broadcaster);
        assert_eq!(registry.hook_count(), 0);
        sub.dispose();
    }

    #[test]
    fn test_dropping_broadcaster_detaches_lifecycle() {
        let host = FakeHookHost::new();
        let registry = MessageHookRegistry::new(host);
        let log = Rc::new(RefCell::new(Vec::new()));
        let broadcaster = ChangeBroadcaster::with_lifecycle(
            "clipboard",
            &registry,
            |_: &WindowMessage| Some(()),
            Recording { log: log.clone(), fail: false },
        );
        let sub = broadcaster.subscribe(|_| {}).unwrap();
        drop(broadcaster);
        assert_eq!(*log.borrow(), vec!["attach", "detach"]);
        assert_eq!(registry.hook_count(), 0);
        sub.dispose();
        assert_eq!(*log.borrow(), vec!["attach", "detach"]);
    }
}
