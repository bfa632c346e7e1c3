//! Integration tests for the session lifecycle.
//!
//! These tests drive `Session` end-to-end with the mock hook, the scripted
//! focus probe, the recording key synthesizer and mockall collaborators:
//! config → tables → engine → hook → monitor → launcher → teardown.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use mockall::mock;

use keyshim_core::engine::mock::MockKeySynthesizer;
use keyshim_core::keymap::macos_cg::FLAG_MASK_COMMAND;
use keyshim_core::{
    Decision, FocusState, InputEvent, Keystroke, MacosKeymap, PhysicalKey, PlatformKeymap,
    RawFlags, RemapEntry, WindowBounds, WindowsKeymap,
};
use keyshim_desktop::application::session::{PlatformServices, Session};
use keyshim_desktop::infrastructure::focus::mock::ScriptedFocusProbe;
use keyshim_desktop::infrastructure::focus::FocusProbe;
use keyshim_desktop::infrastructure::input_hook::mock::MockHook;
use keyshim_desktop::infrastructure::launcher::{LaunchError, TargetLauncher};
use keyshim_desktop::infrastructure::storage::config::{AppConfig, ConfigFileError, Mode};
use keyshim_desktop::infrastructure::ui_bridge::{FileOpener, TrayUi};

// ── Collaborator mocks ────────────────────────────────────────────────────────

mock! {
    Launcher {}
    impl TargetLauncher for Launcher {
        fn launch_and_wait(&self) -> Result<i32, LaunchError>;
        fn terminate(&self) -> Result<(), LaunchError>;
    }
}

mock! {
    Opener {}
    impl FileOpener for Opener {
        fn open(&self, path: &Path) -> std::io::Result<()>;
    }
}

#[derive(Default)]
struct RecordingUi {
    errors: Mutex<Vec<String>>,
}

impl TrayUi for RecordingUi {
    fn report_error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

const F13: PhysicalKey = PhysicalKey::new(0x69);
const MAC_CTRL: PhysicalKey = PhysicalKey::new(0x3B);
const MAC_CMD: PhysicalKey = PhysicalKey::new(0x37);
const MAC_C: PhysicalKey = PhysicalKey::new(0x08);
const VK_LCONTROL: PhysicalKey = PhysicalKey::new(0xA2);
const VK_LWIN: PhysicalKey = PhysicalKey::new(0x5B);

struct Harness {
    hook: MockHook,
    synth: Arc<MockKeySynthesizer>,
    ui: Arc<RecordingUi>,
}

fn services(
    keymap: Arc<dyn PlatformKeymap>,
    probe: Option<ScriptedFocusProbe>,
    launcher: MockLauncher,
    hook: MockHook,
) -> (PlatformServices, Harness) {
    let synth = Arc::new(MockKeySynthesizer::new());
    let ui = Arc::new(RecordingUi::default());
    let lookup_keymap = Arc::clone(&keymap);
    let services = PlatformServices {
        keymap,
        synthesizer: synth.clone(),
        hook: Box::new(hook.clone()),
        focus_probe: probe.map(|p| Box::new(p) as Box<dyn FocusProbe>),
        char_lookup: Box::new(move |ch: char| lookup_keymap.char_key(ch)),
        launcher: Arc::new(launcher),
        opener: Arc::new(MockOpener::new()),
        ui: ui.clone(),
    };
    (services, Harness { hook, synth, ui })
}

fn mac_config(mode: Mode) -> AppConfig {
    let mut cfg = AppConfig::empty(mode);
    cfg.remap_keys = vec![RemapEntry::new("f13", "ctrl"), RemapEntry::new("cmd", "ctrl")];
    cfg.passthrough_hotkeys = vec!["cmd+q".to_string()];
    // The first probe is published before the hook goes live; a long
    // interval keeps the monitor from racing the hook's non-blocking read.
    cfg.monitor.poll_interval_ms = 60_000;
    cfg
}

fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(5));
    }
}

/// Runs the session on a thread and returns a receiver for its result.
fn spawn_session(session: Session) -> mpsc::Receiver<anyhow::Result<i32>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(session.run());
    });
    rx
}

// ── Server mode ───────────────────────────────────────────────────────────────

#[test]
fn test_server_session_remaps_until_quit_and_releases_held_keys() {
    // Arrange
    let mut cfg = AppConfig::empty(Mode::Server);
    cfg.remap_keys = vec![RemapEntry::new("ctrl", "cmd")];
    let (services, h) = services(Arc::new(WindowsKeymap), None, MockLauncher::new(), MockHook::new());
    let (session, control) = Session::new(cfg, services, PathBuf::from("keyshim.log")).unwrap();

    // Act
    let result = spawn_session(session);
    wait_until(|| h.hook.is_installed());
    let decision = h
        .hook
        .feed_key(&InputEvent::key_down(VK_LCONTROL, RawFlags::EMPTY))
        .unwrap();
    control.quit();
    let exit_code = result.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();

    // Assert
    assert_eq!(decision, Decision::Suppress(vec![Keystroke::down(VK_LWIN)]));
    assert_eq!(exit_code, 0);
    assert!(!h.hook.is_installed());
    assert_eq!(h.hook.install_count(), 1);
    assert_eq!(h.hook.uninstall_count(), 1);
    // The still-held remapped key is released on teardown.
    assert_eq!(
        h.synth.recorded(),
        vec![Keystroke::down(VK_LWIN), Keystroke::up(VK_LWIN)]
    );
}

#[test]
fn test_server_session_without_focus_probe_treats_target_as_focused() {
    // Arrange
    let mut cfg = AppConfig::empty(Mode::Server);
    cfg.remap_keys = vec![RemapEntry::new("ctrl", "cmd")];
    let (services, h) = services(Arc::new(WindowsKeymap), None, MockLauncher::new(), MockHook::new());
    let (session, control) = Session::new(cfg, services, PathBuf::from("keyshim.log")).unwrap();

    // Act
    let result = spawn_session(session);
    wait_until(|| h.hook.is_installed());
    let unrelated = h
        .hook
        .feed_key(&InputEvent::key_down(PhysicalKey::new(0x41), RawFlags::EMPTY))
        .unwrap();
    control.quit();
    result.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();

    // Assert
    assert_eq!(unrelated, Decision::PassthroughModifiedFlags(RawFlags::EMPTY));
}

// ── Configuration failures ────────────────────────────────────────────────────

#[test]
fn test_invalid_config_fails_before_hook_is_installed() {
    // Arrange
    let mut cfg = AppConfig::empty(Mode::Server);
    cfg.passthrough_hotkeys = vec!["cmd+shift".to_string()];
    let (services, h) = services(Arc::new(MacosKeymap), None, MockLauncher::new(), MockHook::new());

    // Act
    let result = Session::new(cfg, services, PathBuf::from("keyshim.log"));

    // Assert
    assert!(matches!(result, Err(ConfigFileError::Invalid(_))));
    assert_eq!(h.hook.install_count(), 0);
}

#[test]
fn test_unusable_clip_margin_fails_before_hook_is_installed() {
    // Arrange
    let mut cfg = mac_config(Mode::Client);
    cfg.monitor.clip_margin_px = f64::NAN;
    let (services, h) = services(Arc::new(MacosKeymap), None, MockLauncher::new(), MockHook::new());

    // Act
    let result = Session::new(cfg, services, PathBuf::from("keyshim.log"));

    // Assert
    assert!(matches!(
        result,
        Err(ConfigFileError::Monitor { field: "clip_margin_px", .. })
    ));
    assert_eq!(h.hook.install_count(), 0);
}

#[test]
fn test_hook_install_failure_is_returned_and_monitor_stops() {
    // Arrange
    let probe = ScriptedFocusProbe::repeating(FocusState::active(None));
    let calls = probe.call_counter();
    let (services, _h) = services(
        Arc::new(MacosKeymap),
        Some(probe),
        MockLauncher::new(),
        MockHook::failing(),
    );
    let (session, _control) =
        Session::new(mac_config(Mode::Server), services, PathBuf::from("keyshim.log")).unwrap();

    // Act
    let result = session.run();
    let calls_after_run = calls.load(std::sync::atomic::Ordering::SeqCst);
    thread::sleep(Duration::from_millis(50));

    // Assert
    assert!(result.is_err());
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), calls_after_run);
}

// ── Focus gating and mouse clipping ───────────────────────────────────────────

#[test]
fn test_unfocused_target_passes_everything_through() {
    // Arrange
    let probe = ScriptedFocusProbe::repeating(FocusState::inactive());
    let (services, h) = services(Arc::new(MacosKeymap), Some(probe), MockLauncher::new(), MockHook::new());
    let (session, control) =
        Session::new(mac_config(Mode::Server), services, PathBuf::from("keyshim.log")).unwrap();

    // Act
    let result = spawn_session(session);
    wait_until(|| h.hook.is_installed());
    let decision = h
        .hook
        .feed_key(&InputEvent::flags_changed(F13, RawFlags::EMPTY))
        .unwrap();
    control.quit();
    result.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();

    // Assert
    assert_eq!(decision, Decision::PassthroughUnmodified);
    assert!(h.synth.recorded().is_empty());
}

#[test]
fn test_focused_target_remaps_and_strips_flags() {
    // Arrange
    let bounds = WindowBounds::new(0.0, 0.0, 1920.0, 1080.0);
    let probe = ScriptedFocusProbe::repeating(FocusState::active(Some(bounds)));
    let (services, h) = services(Arc::new(MacosKeymap), Some(probe), MockLauncher::new(), MockHook::new());
    let (session, control) =
        Session::new(mac_config(Mode::Server), services, PathBuf::from("keyshim.log")).unwrap();

    // Act
    let result = spawn_session(session);
    wait_until(|| h.hook.is_installed());
    let f13_down = h.hook.feed_key(&InputEvent::flags_changed(F13, RawFlags::EMPTY)).unwrap();
    let f13_up = h.hook.feed_key(&InputEvent::flags_changed(F13, RawFlags::EMPTY)).unwrap();
    let c_with_cmd = h
        .hook
        .feed_key(&InputEvent::key_down(MAC_C, RawFlags(FLAG_MASK_COMMAND | 0x100)))
        .unwrap();
    control.quit();
    result.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();

    // Assert
    assert_eq!(f13_down, Decision::Suppress(vec![Keystroke::down(MAC_CTRL)]));
    assert_eq!(f13_up, Decision::Suppress(vec![Keystroke::up(MAC_CTRL)]));
    assert_eq!(c_with_cmd, Decision::PassthroughModifiedFlags(RawFlags(0x100)));
}

#[test]
fn test_passthrough_hotkey_is_replayed_through_session() {
    // Arrange
    let probe = ScriptedFocusProbe::repeating(FocusState::active(None));
    let (services, h) = services(Arc::new(MacosKeymap), Some(probe), MockLauncher::new(), MockHook::new());
    let (session, control) =
        Session::new(mac_config(Mode::Server), services, PathBuf::from("keyshim.log")).unwrap();
    let q = PhysicalKey::new(0x0C);

    // Act
    let result = spawn_session(session);
    wait_until(|| h.hook.is_installed());
    let decision = h
        .hook
        .feed_key(&InputEvent::key_down(q, RawFlags(FLAG_MASK_COMMAND)))
        .unwrap();
    control.quit();
    result.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();

    // Assert
    assert_eq!(
        decision,
        Decision::Suppress(vec![Keystroke::down(MAC_CMD), Keystroke::down(q)])
    );
}

#[test]
fn test_mouse_is_clipped_to_focused_window() {
    // Arrange
    let bounds = WindowBounds::new(100.0, 0.0, 800.0, 600.0);
    let probe = ScriptedFocusProbe::repeating(FocusState::active(Some(bounds)));
    let (services, h) = services(Arc::new(MacosKeymap), Some(probe), MockLauncher::new(), MockHook::new());
    let (session, control) =
        Session::new(mac_config(Mode::Server), services, PathBuf::from("keyshim.log")).unwrap();

    // Act
    let result = spawn_session(session);
    wait_until(|| h.hook.is_installed());
    let inside = h.hook.feed_mouse_move(400.0, 300.0);
    let outside = h.hook.feed_mouse_move(2000.0, 900.0);
    control.quit();
    result.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();

    // Assert
    assert_eq!(inside, None);
    assert_eq!(outside, Some((950.0, 600.0)));
}

#[test]
fn test_mouse_clip_can_be_disabled() {
    // Arrange
    let bounds = WindowBounds::new(100.0, 0.0, 800.0, 600.0);
    let probe = ScriptedFocusProbe::repeating(FocusState::active(Some(bounds)));
    let (services, h) = services(Arc::new(MacosKeymap), Some(probe), MockLauncher::new(), MockHook::new());
    let mut cfg = mac_config(Mode::Server);
    cfg.monitor.clip_mouse = false;
    let (session, control) = Session::new(cfg, services, PathBuf::from("keyshim.log")).unwrap();

    // Act
    let result = spawn_session(session);
    wait_until(|| h.hook.is_installed());
    let outside = h.hook.feed_mouse_move(2000.0, 900.0);
    control.quit();
    result.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();

    // Assert
    assert_eq!(outside, None);
}

// ── Client mode ───────────────────────────────────────────────────────────────

#[test]
fn test_client_session_exits_with_target_exit_code() {
    // Arrange
    let mut launcher = MockLauncher::new();
    launcher.expect_launch_and_wait().times(1).returning(|| Ok(7));
    launcher.expect_terminate().times(0);
    let probe = ScriptedFocusProbe::repeating(FocusState::inactive());
    let (services, h) = services(Arc::new(MacosKeymap), Some(probe), launcher, MockHook::new());
    let (session, _control) =
        Session::new(mac_config(Mode::Client), services, PathBuf::from("keyshim.log")).unwrap();

    // Act
    let exit_code = session.run().unwrap();

    // Assert
    assert_eq!(exit_code, 7);
    assert_eq!(h.hook.install_count(), 1);
    assert_eq!(h.hook.uninstall_count(), 1);
}

#[test]
fn test_launch_failure_is_reported_and_hook_keeps_running() {
    // Arrange
    let mut launcher = MockLauncher::new();
    launcher
        .expect_launch_and_wait()
        .times(1)
        .returning(|| Err(LaunchError::MissingPath));
    launcher.expect_terminate().times(1).returning(|| Ok(()));
    let probe = ScriptedFocusProbe::repeating(FocusState::active(None));
    let (services, h) = services(Arc::new(MacosKeymap), Some(probe), launcher, MockHook::new());
    let (session, control) =
        Session::new(mac_config(Mode::Client), services, PathBuf::from("keyshim.log")).unwrap();

    // Act
    let result = spawn_session(session);
    wait_until(|| !h.ui.errors.lock().unwrap().is_empty());
    let still_installed = h.hook.is_installed();
    control.quit();
    let exit_code = result.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();

    // Assert
    assert!(still_installed);
    assert_eq!(exit_code, 0);
    assert_eq!(
        h.ui.errors.lock().unwrap().as_slice(),
        ["no target application path configured".to_string()]
    );
    assert_eq!(h.hook.uninstall_count(), 1);
}

// ── Tray actions ──────────────────────────────────────────────────────────────

#[test]
fn test_open_log_file_uses_session_log_path() {
    // Arrange
    let mut opener = MockOpener::new();
    opener
        .expect_open()
        .withf(|path: &Path| path == Path::new("/tmp/keyshim.log"))
        .times(1)
        .returning(|_| Ok(()));
    let (mut services, _h) = services(Arc::new(MacosKeymap), None, MockLauncher::new(), MockHook::new());
    services.opener = Arc::new(opener);
    let (_session, control) = Session::new(
        AppConfig::empty(Mode::Server),
        services,
        PathBuf::from("/tmp/keyshim.log"),
    )
    .unwrap();

    // Act / Assert
    assert!(control.open_log_file().is_ok());
    assert_eq!(control.log_path(), Path::new("/tmp/keyshim.log"));
}
