//! Mock input hook for unit testing.
//!
//! Allows tests to feed synthetic [`InputEvent`]s through the installed
//! callbacks without an event tap or a Windows message loop.  The mock is
//! cheap to clone; every clone observes the same installed callbacks, so a
//! test can keep one copy while the session owns another.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use keyshim_core::{Decision, InputEvent};

use super::{HookCallbacks, HookError, HookHandle, PlatformHook};

type Slot = Arc<Mutex<Option<Box<dyn HookCallbacks>>>>;

#[derive(Clone, Default)]
pub struct MockHook {
    installed: Slot,
    install_count: Arc<AtomicUsize>,
    uninstall_count: Arc<AtomicUsize>,
    fail_install: bool,
}

impl MockHook {
    pub fn new() -> Self {
        Self::default()
    }

    /// A hook whose installation always fails.
    pub fn failing() -> Self {
        Self {
            fail_install: true,
            ..Self::default()
        }
    }

    /// Delivers a key event, as if captured from hardware.  Returns `None`
    /// when no hook is installed.
    pub fn feed_key(&self, event: &InputEvent) -> Option<Decision> {
        let mut slot = self.installed.lock().expect("lock poisoned");
        slot.as_mut().map(|callbacks| callbacks.on_key(event))
    }

    /// Delivers a mouse move.  Returns the warp target, if any.
    pub fn feed_mouse_move(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let mut slot = self.installed.lock().expect("lock poisoned");
        slot.as_mut().and_then(|callbacks| callbacks.on_mouse_move(x, y))
    }

    pub fn is_installed(&self) -> bool {
        self.installed.lock().expect("lock poisoned").is_some()
    }

    pub fn install_count(&self) -> usize {
        self.install_count.load(Ordering::SeqCst)
    }

    pub fn uninstall_count(&self) -> usize {
        self.uninstall_count.load(Ordering::SeqCst)
    }
}

impl PlatformHook for MockHook {
    fn install(&self, callbacks: Box<dyn HookCallbacks>) -> Result<HookHandle, HookError> {
        if self.fail_install {
            return Err(HookError::InstallFailed("mock install failure".to_string()));
        }
        *self.installed.lock().expect("lock poisoned") = Some(callbacks);
        self.install_count.fetch_add(1, Ordering::SeqCst);

        let slot = Arc::clone(&self.installed);
        let uninstalls = Arc::clone(&self.uninstall_count);
        Ok(HookHandle::new(
            move || {
                if let Some(mut callbacks) = slot.lock().expect("lock poisoned").take() {
                    callbacks.on_uninstall();
                }
                uninstalls.fetch_add(1, Ordering::SeqCst);
            },
            None,
        ))
    }

    fn supports_mouse_clip(&self) -> bool {
        true
    }
}
