//! Windows `WH_KEYBOARD_LL` input hook.
//!
//! The hook is installed on a dedicated thread that owns a Win32 message
//! loop.  Windows calls the hook procedure on that same thread, so the
//! callbacks live in a thread-local and never cross threads.  Uninstalling
//! posts `WM_QUIT` to the loop; the thread then unhooks and exits.
//!
//! Low-level hooks cannot rewrite an event's modifier state, so a
//! flag-stripping decision is passed through unchanged here.
//!
//! # Safety
//!
//! This module uses `unsafe` code exclusively for Windows API FFI calls.

#![cfg(target_os = "windows")]

use std::cell::RefCell;
use std::sync::mpsc::{self, SyncSender};
use std::thread;

use keyshim_core::keymap::windows_vk::{FLAG_ALT, FLAG_CTRL, FLAG_SHIFT, FLAG_WIN};
use keyshim_core::{Decision, InputEvent, PhysicalKey, RawFlags};
use tracing::{debug, info, warn};
use windows::Win32::Foundation::{LPARAM, LRESULT, WPARAM};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::Input::KeyboardAndMouse::{GetAsyncKeyState, VkKeyScanW};
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetMessageW, PeekMessageW, PostThreadMessageW,
    SetWindowsHookExW, UnhookWindowsHookEx, HC_ACTION, KBDLLHOOKSTRUCT, MSG, PM_NOREMOVE,
    WH_KEYBOARD_LL, WM_KEYDOWN, WM_KEYUP, WM_QUIT, WM_SYSKEYDOWN, WM_SYSKEYUP, WM_USER,
};

use super::{HookCallbacks, HookError, HookHandle, PlatformHook};
use crate::infrastructure::input_synthesis::INJECTED_MARKER;

const VK_SHIFT: i32 = 0x10;
const VK_CONTROL: i32 = 0x11;
const VK_MENU: i32 = 0x12;
const VK_LWIN: i32 = 0x5B;
const VK_RWIN: i32 = 0x5C;

thread_local! {
    static CALLBACKS: RefCell<Option<Box<dyn HookCallbacks>>> = RefCell::new(None);
}

/// Installs a low-level keyboard hook on its own message-loop thread.
#[derive(Debug, Default)]
pub struct WindowsKeyboardHook;

impl WindowsKeyboardHook {
    pub fn new() -> Self {
        Self
    }
}

impl PlatformHook for WindowsKeyboardHook {
    fn install(&self, callbacks: Box<dyn HookCallbacks>) -> Result<HookHandle, HookError> {
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);

        let thread = thread::Builder::new()
            .name("keyshim-hook-loop".to_string())
            .spawn(move || run_hook_message_loop(callbacks, ready_tx))
            .map_err(|e| HookError::InstallFailed(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(thread_id)) => Ok(HookHandle::new(
                move || {
                    // SAFETY: posting a message to a thread id is always sound;
                    // failure only means the thread has already gone.
                    if let Err(e) =
                        unsafe { PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) }
                    {
                        warn!(error = %e, "failed to post WM_QUIT to hook thread");
                    }
                },
                Some(thread),
            )),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(HookError::InstallFailed("hook thread exited during setup".to_string()))
            }
        }
    }
}

/// Entry point for the dedicated Win32 message loop thread.
fn run_hook_message_loop(
    callbacks: Box<dyn HookCallbacks>,
    ready: SyncSender<Result<u32, HookError>>,
) {
    CALLBACKS.with(|slot| *slot.borrow_mut() = Some(callbacks));

    let mut msg = MSG::default();
    // SAFETY: PeekMessageW forces creation of this thread's message queue so
    // that a later PostThreadMessageW cannot be lost.
    unsafe {
        let _ = PeekMessageW(&mut msg, None, WM_USER, WM_USER, PM_NOREMOVE);
    }

    // SAFETY: SetWindowsHookExW requires the calling thread to pump messages,
    // which the loop below does.
    let hook = match unsafe { SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_hook_proc), None, 0) } {
        Ok(hook) => hook,
        Err(e) => {
            CALLBACKS.with(|slot| slot.borrow_mut().take());
            let _ = ready.send(Err(HookError::InstallFailed(format!(
                "WH_KEYBOARD_LL hook installation failed: {e}"
            ))));
            return;
        }
    };

    // SAFETY: trivially safe thread query.
    let thread_id = unsafe { GetCurrentThreadId() };
    info!(thread_id, "keyboard hook installed");
    let _ = ready.send(Ok(thread_id));

    // SAFETY: Standard Win32 GetMessage/DispatchMessage loop pattern.
    unsafe {
        while GetMessageW(&mut msg, None, 0, 0).as_bool() {
            DispatchMessageW(&msg);
        }
        if let Err(e) = UnhookWindowsHookEx(hook) {
            warn!(error = %e, "UnhookWindowsHookEx failed");
        }
    }

    if let Some(mut callbacks) = CALLBACKS.with(|slot| slot.borrow_mut().take()) {
        callbacks.on_uninstall();
    }
    info!("keyboard hook removed");
}

/// Low-level keyboard hook callback.
///
/// # Safety
///
/// Called by Windows on the hook thread.  It must return quickly or the OS
/// silently removes the hook.
unsafe extern "system" fn keyboard_hook_proc(
    n_code: i32,
    w_param: WPARAM,
    l_param: LPARAM,
) -> LRESULT {
    if n_code != HC_ACTION as i32 {
        return CallNextHookEx(None, n_code, w_param, l_param);
    }

    // SAFETY: l_param points to a KBDLLHOOKSTRUCT when n_code == HC_ACTION.
    let kbs = &*(l_param.0 as *const KBDLLHOOKSTRUCT);

    if kbs.dwExtraInfo == INJECTED_MARKER as usize {
        return CallNextHookEx(None, n_code, w_param, l_param);
    }

    let key = PhysicalKey::new(kbs.vkCode as u16);
    let flags = current_modifier_flags();
    let event = match w_param.0 as u32 {
        WM_KEYDOWN | WM_SYSKEYDOWN => InputEvent::key_down(key, flags),
        WM_KEYUP | WM_SYSKEYUP => InputEvent::key_up(key, flags),
        _ => return CallNextHookEx(None, n_code, w_param, l_param),
    };

    let decision = CALLBACKS.with(|slot| match slot.try_borrow_mut() {
        Ok(mut guard) => guard.as_mut().map(|callbacks| callbacks.on_key(&event)),
        Err(_) => {
            debug!(?event, "re-entrant hook event passed through");
            None
        }
    });

    match decision {
        Some(Decision::Suppress(_)) => LRESULT(1),
        _ => CallNextHookEx(None, n_code, w_param, l_param),
    }
}

/// Snapshot of the live modifier state packed into the keymap's flag bits.
fn current_modifier_flags() -> RawFlags {
    // SAFETY: GetAsyncKeyState only reads global key state.
    let down = |vk: i32| unsafe { GetAsyncKeyState(vk) } < 0;
    let mut bits = 0;
    if down(VK_CONTROL) {
        bits |= FLAG_CTRL;
    }
    if down(VK_MENU) {
        bits |= FLAG_ALT;
    }
    if down(VK_LWIN) || down(VK_RWIN) {
        bits |= FLAG_WIN;
    }
    if down(VK_SHIFT) {
        bits |= FLAG_SHIFT;
    }
    RawFlags(bits)
}

/// Resolves a literal character through the active keyboard layout.
///
/// Only characters reachable without a shift state are accepted, so `"a"`
/// resolves but `"A"` or `"!"` do not.
pub fn vk_char_lookup(ch: char) -> Option<PhysicalKey> {
    let mut units = [0u16; 2];
    let encoded = ch.encode_utf16(&mut units);
    if encoded.len() != 1 {
        return None;
    }
    // SAFETY: VkKeyScanW only reads the current thread's keyboard layout.
    let scan = unsafe { VkKeyScanW(encoded[0]) };
    if scan == -1 {
        return None;
    }
    let vk = (scan as u16) & 0xFF;
    let shift_state = ((scan as u16) >> 8) & 0xFF;
    (shift_state == 0).then(|| PhysicalKey::new(vk))
}
