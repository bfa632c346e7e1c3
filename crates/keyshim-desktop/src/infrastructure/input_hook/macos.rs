//! macOS `CGEventTap` input hook.
//!
//! The tap is created on a dedicated thread and attached to that thread's
//! run loop.  The loop runs in 100 ms slices so the thread can notice the
//! stop flag and exit cooperatively.
//!
//! # Suppression and flag rewriting
//!
//! Returning `None` from the tap callback passes the (possibly mutated)
//! original event on.  To drop an event its type is set to
//! `kCGEventNull`; to strip modifier bits its flags are rewritten in place.
//!
//! # Tap timeouts
//!
//! macOS disables a tap whose callback is too slow or when the user enters a
//! secure input field, and reports this with a `TapDisabledBy*` pseudo-event.
//! The callback records that, and the run loop turns the tap back on at the
//! next slice.
//!
//! # Safety
//!
//! `unsafe` is used only for the CoreFoundation run-loop statics and the
//! CoreGraphics suppression-interval call.

#![cfg(target_os = "macos")]

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, SyncSender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use core_foundation::runloop::{kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoop};
use core_graphics::display::CGDisplay;
use core_graphics::event::{
    CGEvent, CGEventFlags, CGEventTap, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement,
    CGEventType, EventField,
};
use core_graphics::geometry::CGPoint;
use keyshim_core::{Decision, EventKind, InputEvent, PhysicalKey, RawFlags};
use tracing::{debug, error, info, warn};

use super::{HookCallbacks, HookError, HookHandle, PlatformHook};
use crate::infrastructure::input_synthesis::INJECTED_MARKER;

const RUN_LOOP_SLICE: Duration = Duration::from_millis(100);

/// Local-events suppression interval restored after a cursor warp.
const DEFAULT_SUPPRESSION_INTERVAL_SECS: f64 = 0.25;

#[link(name = "CoreGraphics", kind = "framework")]
extern "C" {
    fn CGSetLocalEventsSuppressionInterval(seconds: f64) -> i32;
}

/// Installs a keyboard (and optionally mouse-move) event tap.
pub struct MacosEventTap {
    clip_mouse: bool,
}

impl MacosEventTap {
    pub fn new(clip_mouse: bool) -> Self {
        Self { clip_mouse }
    }
}

impl PlatformHook for MacosEventTap {
    fn install(&self, callbacks: Box<dyn HookCallbacks>) -> Result<HookHandle, HookError> {
        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let clip_mouse = self.clip_mouse;

        let thread_running = Arc::clone(&running);
        let thread = thread::Builder::new()
            .name("keyshim-event-tap".to_string())
            .spawn(move || run_tap(callbacks, clip_mouse, thread_running, ready_tx))
            .map_err(|e| HookError::InstallFailed(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(HookHandle::new(
                move || running.store(false, Ordering::SeqCst),
                Some(thread),
            )),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(HookError::InstallFailed("event tap thread exited during setup".to_string()))
            }
        }
    }

    fn supports_mouse_clip(&self) -> bool {
        self.clip_mouse
    }
}

/// Entry point for the event tap thread.
fn run_tap(
    callbacks: Box<dyn HookCallbacks>,
    clip_mouse: bool,
    running: Arc<AtomicBool>,
    ready: SyncSender<Result<(), HookError>>,
) {
    let callbacks = Rc::new(RefCell::new(callbacks));
    let tap_disabled = Rc::new(Cell::new(false));

    let mut events = vec![CGEventType::KeyDown, CGEventType::KeyUp, CGEventType::FlagsChanged];
    if clip_mouse {
        events.push(CGEventType::MouseMoved);
    }

    let tap_callbacks = Rc::clone(&callbacks);
    let disabled = Rc::clone(&tap_disabled);
    let tap = CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::Default,
        events,
        move |_proxy, event_type, event| {
            handle_tap_event(&tap_callbacks, &disabled, event_type, event);
            None
        },
    );

    let tap = match tap {
        Ok(tap) => tap,
        Err(()) => {
            let _ = ready.send(Err(HookError::InstallFailed(
                "CGEventTapCreate failed; check Accessibility and Input Monitoring permissions"
                    .to_string(),
            )));
            return;
        }
    };

    let Ok(source) = tap.mach_port.create_runloop_source(0) else {
        let _ = ready.send(Err(HookError::InstallFailed(
            "could not create run loop source for event tap".to_string(),
        )));
        return;
    };

    // SAFETY: kCFRunLoopCommonModes is an immutable CoreFoundation constant.
    unsafe {
        CFRunLoop::get_current().add_source(&source, kCFRunLoopCommonModes);
    }
    tap.enable();
    info!(clip_mouse, "event tap installed");
    let _ = ready.send(Ok(()));

    while running.load(Ordering::SeqCst) {
        // SAFETY: kCFRunLoopDefaultMode is an immutable CoreFoundation constant.
        unsafe {
            CFRunLoop::run_in_mode(kCFRunLoopDefaultMode, RUN_LOOP_SLICE, true);
        }
        if tap_disabled.replace(false) {
            warn!("event tap was disabled by the system, re-enabling");
            tap.enable();
        }
    }

    callbacks.borrow_mut().on_uninstall();
    info!("event tap removed");
}

/// Applies the callbacks' decision to one tapped event.
fn handle_tap_event(
    callbacks: &Rc<RefCell<Box<dyn HookCallbacks>>>,
    tap_disabled: &Cell<bool>,
    event_type: CGEventType,
    event: &CGEvent,
) {
    let kind = match event_type {
        CGEventType::KeyDown => EventKind::KeyDown,
        CGEventType::KeyUp => EventKind::KeyUp,
        CGEventType::FlagsChanged => EventKind::FlagsChanged,
        CGEventType::MouseMoved => {
            let Ok(mut callbacks) = callbacks.try_borrow_mut() else {
                return;
            };
            let location = event.location();
            if let Some((x, y)) = callbacks.on_mouse_move(location.x, location.y) {
                warp_cursor(x, y);
            }
            return;
        }
        CGEventType::TapDisabledByTimeout | CGEventType::TapDisabledByUserInput => {
            tap_disabled.set(true);
            return;
        }
        _ => return,
    };

    if event.get_integer_value_field(EventField::EVENT_SOURCE_USER_DATA) == INJECTED_MARKER {
        return;
    }

    let keycode = event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE) as u16;
    let input = InputEvent::new(kind, PhysicalKey::new(keycode), RawFlags(event.get_flags().bits()));

    // Re-entry is possible if posting an event spins the run loop; pass
    // the nested event through rather than panic on the borrow.
    let Ok(mut callbacks) = callbacks.try_borrow_mut() else {
        debug!(?input, "re-entrant tap event passed through");
        return;
    };

    match callbacks.on_key(&input) {
        Decision::PassthroughUnmodified => {}
        Decision::PassthroughModifiedFlags(flags) => {
            event.set_flags(CGEventFlags::from_bits_truncate(flags.bits()));
        }
        Decision::Suppress(_) => event.set_type(CGEventType::Null),
    }
}

/// Moves the pointer without the warp itself producing a suppression pause
/// or looping back through the tap.
fn warp_cursor(x: f64, y: f64) {
    // SAFETY: plain CoreGraphics call taking a scalar.
    unsafe {
        CGSetLocalEventsSuppressionInterval(0.0);
    }
    if let Err(code) = CGDisplay::warp_mouse_cursor_position(CGPoint::new(x, y)) {
        error!(code, x, y, "CGWarpMouseCursorPosition failed");
    }
    // SAFETY: as above.
    unsafe {
        CGSetLocalEventsSuppressionInterval(DEFAULT_SUPPRESSION_INTERVAL_SECS);
    }
}
