//! Multiplexing of the single native window procedure.
//!
//! The registry installs one native callback through its [`NativeHookHost`]
//! on the first [`MessageHookRegistry::add_hook`] and fans every message out
//! to the registered hooks in registration order. Dispatch iterates over a
//! snapshot, so hooks may add or remove hooks (including themselves) while a
//! message is being delivered; a removed hook is never called again, even
//! later in the same dispatch.
//!
//! The registry is bound to the thread that owns the hook window and is
//! therefore neither `Send` nor `Sync`.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::{Rc, Weak};
use tracing::{debug, info, trace, warn};

use crate::error::{PlatformError, PlatformResult};
use crate::messages::WindowMessage;
use crate::native::{NativeHookHost, RawHandle};

/// What a hook did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOutcome {
    /// Not consumed; later hooks see the message too.
    Continue,
    /// Consumed with this window-procedure result; later hooks are skipped.
    Handled(isize),
}

/// Stable token for a registered hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HookId(u64);

impl fmt::Display for HookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hook#{}", self.0)
    }
}

type Handler = Box<dyn Fn(&WindowMessage) -> PlatformResult<HookOutcome>>;

struct HookEntry {
    id: HookId,
    active: Cell<bool>,
    handler: Handler,
}

struct RegistryState {
    host: Box<dyn NativeHookHost>,
    entries: RefCell<Vec<Rc<HookEntry>>>,
    installed: Cell<bool>,
    next_id: Cell<u64>,
}

impl Drop for RegistryState {
    fn drop(&mut self) {
        if self.installed.get() {
            self.host.uninstall();
        }
    }
}

/// Handle to a thread's hook registry. Clones share the registry.
#[derive(Clone)]
pub struct MessageHookRegistry {
    state: Rc<RegistryState>,
}

impl MessageHookRegistry {
    pub fn new(host: impl NativeHookHost + 'static) -> Self {
        Self {
            state: Rc::new(RegistryState {
                host: Box::new(host),
                entries: RefCell::new(Vec::new()),
                installed: Cell::new(false),
                next_id: Cell::new(1),
            }),
        }
    }

    /// Register `handler`, installing the native callback if this is the
    /// first hook ever added.
    pub fn add_hook<F>(&self, handler: F) -> PlatformResult<HookId>
    where
        F: Fn(&WindowMessage) -> PlatformResult<HookOutcome> + 'static,
    {
        self.ensure_installed()?;

        let id = HookId(self.state.next_id.get());
        self.state.next_id.set(id.0 + 1);
        self.state.entries.borrow_mut().push(Rc::new(HookEntry {
            id,
            active: Cell::new(true),
            handler: Box::new(handler),
        }));
        debug!(%id, hooks = self.hook_count(), "Message hook added");
        Ok(id)
    }

    /// Unregister a hook. Removing an unknown or already-removed hook is an
    /// `InvalidState` error.
    pub fn remove_hook(&self, id: HookId) -> PlatformResult<()> {
        let mut entries = self.state.entries.borrow_mut();
        let Some(pos) = entries.iter().position(|entry| entry.id == id) else {
            return Err(PlatformError::invalid_state(format!("{id} is not registered")));
        };
        let entry = entries.remove(pos);
        entry.active.set(false);
        debug!(%id, hooks = entries.len(), "Message hook removed");
        Ok(())
    }

    /// Deliver `message` to the registered hooks.
    ///
    /// Returns the result of the hook that consumed it, if any. A hook that
    /// fails or panics is logged and skipped.
    pub fn dispatch(&self, message: &WindowMessage) -> Option<isize> {
        let snapshot: Vec<Rc<HookEntry>> = self.state.entries.borrow().clone();
        for entry in snapshot {
            if !entry.active.get() {
                continue;
            }
            let outcome = catch_unwind(AssertUnwindSafe(|| (entry.handler)(message)));
            match outcome {
                Ok(Ok(HookOutcome::Continue)) => {}
                Ok(Ok(HookOutcome::Handled(result))) => {
                    trace!(id = %entry.id, msg = message.msg(), "Message consumed");
                    return Some(result);
                }
                Ok(Err(error)) => {
                    warn!(id = %entry.id, msg = message.msg(), %error, "Message hook failed");
                }
                Err(_) => {
                    warn!(id = %entry.id, msg = message.msg(), "Message hook panicked");
                }
            }
        }
        None
    }

    pub fn hook_count(&self) -> usize {
        self.state.entries.borrow().len()
    }

    pub fn is_installed(&self) -> bool {
        self.state.installed.get()
    }

    /// Window the native callback is attached to, 0 before installation.
    pub fn window_handle(&self) -> RawHandle {
        self.state.host.window_handle()
    }

    /// Uninstall the native callback. Only allowed once every hook is gone.
    pub fn shutdown(&self) -> PlatformResult<()> {
        let remaining = self.hook_count();
        if remaining > 0 {
            return Err(PlatformError::invalid_state(format!(
                "{remaining} message hooks still registered"
            )));
        }
        if self.state.installed.replace(false) {
            self.state.host.uninstall();
            info!("Native message callback uninstalled");
        }
        Ok(())
    }

    fn ensure_installed(&self) -> PlatformResult<()> {
        if self.state.installed.get() {
            return Ok(());
        }
        let registry = Rc::downgrade(&self.state);
        self.state.host.install(Rc::new(move |message: &WindowMessage| {
            let state = Weak::upgrade(&registry)?;
            MessageHookRegistry { state }.dispatch(message)
        }))?;
        self.state.installed.set(true);
        info!("Native message callback installed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::messages::WindowsMessage;
    use crate::testing::FakeHookHost;

    const WM_TEST: u32 = WindowsMessage::User as u32 + 1;

    fn registry() -> (FakeHookHost, MessageHookRegistry) {
        let host = FakeHookHost::new();
        (host.clone(), MessageHookRegistry::new(host))
    }

    fn recorder(log: &Rc<RefCell<Vec<&'static str>>>, name: &'static str) -> impl Fn(&WindowMessage) -> PlatformResult<HookOutcome> {
        let log = log.clone();
        move |_| {
            log.borrow_mut().push(name);
            Ok(HookOutcome::Continue)
        }
    }

    #[test]
    fn test_single_native_callback() {
        let (host, registry) = registry();
        assert_eq!(host.installed_callbacks(), 0);

        let a = registry.add_hook(|_| Ok(HookOutcome::Continue)).unwrap();
        let b = registry.add_hook(|_| Ok(HookOutcome::Continue)).unwrap();
        assert_eq!(host.installed_callbacks(), 1);
        registry.remove_hook(a).unwrap();
        registry.remove_hook(b).unwrap();
        let c = registry.add_hook(|_| Ok(HookOutcome::Continue)).unwrap();
        assert_eq!(host.installed_callbacks(), 1);
        assert_eq!(host.install_count(), 1);

        registry.remove_hook(c).unwrap();
        registry.shutdown().unwrap();
        assert_eq!(host.installed_callbacks(), 0);
    }

    #[test]
    fn test_dispatch_in_registration_order() {
        let (host, registry) = registry();
        let log = Rc::new(RefCell::new(Vec::new()));
        registry.add_hook(recorder(&log, "first")).unwrap();
        registry.add_hook(recorder(&log, "second")).unwrap();
        registry.add_hook(recorder(&log, "third")).unwrap();

        assert_eq!(host.post(WM_TEST), None);
        assert_eq!(*log.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_empty_registry_delivers_nothing() {
        let (host, registry) = registry();
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let id = registry
            .add_hook(move |_| {
                counter.set(counter.get() + 1);
                Ok(HookOutcome::Continue)
            })
            .unwrap();
        registry.remove_hook(id).unwrap();

        assert!(registry.is_installed());
        assert_eq!(host.post(WM_TEST), None);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_handled_stops_propagation() {
        let (host, registry) = registry();
        let log = Rc::new(RefCell::new(Vec::new()));
        registry.add_hook(|_| Ok(HookOutcome::Handled(42))).unwrap();
        registry.add_hook(recorder(&log, "later")).unwrap();

        assert_eq!(host.post(WM_TEST), Some(42));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_failing_hook_does_not_corrupt_dispatch() {
        let (host, registry) = registry();
        let log = Rc::new(RefCell::new(Vec::new()));
        let failing = registry
            .add_hook(|_| Err(PlatformError::invalid_state("boom")))
            .unwrap();
        let panicking = registry
            .add_hook(|_| -> PlatformResult<HookOutcome> { panic!("hook panic") })
            .unwrap();
        registry.add_hook(recorder(&log, "survivor")).unwrap();

        host.post(WM_TEST);
        assert_eq!(*log.borrow(), vec!["survivor"]);

        registry.remove_hook(failing).unwrap();
        registry.remove_hook(panicking).unwrap();
        assert_eq!(registry.hook_count(), 1);
        host.post(WM_TEST);
        assert_eq!(log.borrow().len(), 2);
    }

    #[test]
    fn test_remove_twice_is_invalid_state() {
        let (_host, registry) = registry();
        let id = registry.add_hook(|_| Ok(HookOutcome::Continue)).unwrap();
        registry.remove_hook(id).unwrap();
        let err = registry.remove_hook(id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn test_hook_removed_during_dispatch_is_not_called() {
        let (host, registry) = registry();
        let log = Rc::new(RefCell::new(Vec::new()));
        let victim: Rc<Cell<Option<HookId>>> = Rc::new(Cell::new(None));

        let reg = registry.clone();
        let target = victim.clone();
        registry
            .add_hook(move |_| {
                if let Some(id) = target.take() {
                    reg.remove_hook(id)?;
                }
                Ok(HookOutcome::Continue)
            })
            .unwrap();
        victim.set(Some(registry.add_hook(recorder(&log, "victim")).unwrap()));

        host.post(WM_TEST);
        assert!(log.borrow().is_empty());
        assert_eq!(registry.hook_count(), 1);
    }

    #[test]
    fn test_hook_added_during_dispatch_sees_next_message() {
        let (host, registry) = registry();
        let log = Rc::new(RefCell::new(Vec::new()));
        let reg = registry.clone();
        let added = Rc::new(Cell::new(false));
        let log_for_hook = log.clone();
        let flag = added.clone();
        registry
            .add_hook(move |_| {
                if !flag.replace(true) {
                    reg.add_hook(recorder(&log_for_hook, "late"))?;
                }
                Ok(HookOutcome::Continue)
            })
            .unwrap();

        host.post(WM_TEST);
        assert!(log.borrow().is_empty());
        host.post(WM_TEST);
        assert_eq!(*log.borrow(), vec!["late"]);
        assert_eq!(host.install_count(), 1);
    }

    #[test]
    fn test_install_failure_registers_nothing() {
        let (host, registry) = registry();
        host.fail_next_install(1407);
        let err = registry.add_hook(|_| Ok(HookOutcome::Continue)).unwrap_err();
        assert_eq!(err.native_code(), Some(1407));
        assert_eq!(registry.hook_count(), 0);
        assert!(!registry.is_installed());

        registry.add_hook(|_| Ok(HookOutcome::Continue)).unwrap();
        assert_eq!(host.installed_callbacks(), 1);
    }

    #[test]
    fn test_shutdown_refused_while_hooks_remain() {
        let (host, registry) = registry();
        registry.add_hook(|_| Ok(HookOutcome::Continue)).unwrap();
        assert!(registry.shutdown().is_err());
        assert_eq!(host.installed_callbacks(), 1);
        assert_eq!(host.uninstall_count(), 0);
    }

    #[test]
    fn test_shutdown_uninstalls_once() {
        let (host, registry) = registry();
        let id = registry.add_hook(|_| Ok(HookOutcome::Continue)).unwrap();
        registry.remove_hook(id).unwrap();
        registry.shutdown().unwrap();
        registry.shutdown().unwrap();
        assert_eq!(host.uninstall_count(), 1);
        assert!(!registry.is_installed());

        registry.add_hook(|_| Ok(HookOutcome::Continue)).unwrap();
        assert_eq!(host.install_count(), 2);
        assert_eq!(host.installed_callbacks(), 1);
    }

    #[test]
    fn test_dropping_registry_uninstalls() {
        let (host, registry) = registry();
        registry.add_hook(|_| Ok(HookOutcome::Continue)).unwrap();
        drop(registry);
        assert_eq!(host.installed_callbacks(), 0);
        assert_eq!(host.uninstall_count(), 1);
        assert_eq!(host.post(WM_TEST), None);
    }
}
