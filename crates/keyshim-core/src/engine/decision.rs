//! The decision engine: remap, replay or pass through each key event.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, warn, Span};

use super::event::{EventKind, InputEvent};
use super::synthesis::{KeySynthesizer, Keystroke, SynthesisError};
use crate::domain::focus::FocusState;
use crate::domain::hotkey::HotkeyTuple;
use crate::domain::injected::InjectedKeySet;
use crate::domain::key::{PhysicalKey, RawFlags};
use crate::domain::tables::KeyTables;
use crate::keymap::PlatformKeymap;

/// What the hook adapter must do with the native event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Deliver the original event untouched.
    PassthroughUnmodified,
    /// Deliver the original event with its modifier flags replaced.
    PassthroughModifiedFlags(RawFlags),
    /// Drop the original event.  The listed keystrokes have already been
    /// injected in its place.
    Suppress(Vec<Keystroke>),
}

/// A failure inside the decision pipeline.  Never leaves
/// [`DecisionEngine::handle`]; it is logged and the event passes through.
#[derive(Debug, Error)]
pub enum HookFault {
    #[error("key synthesis failed: {0}")]
    Synthesis(#[from] SynthesisError),

    #[error("decision pipeline panicked: {0}")]
    Panic(String),
}

/// Owns the configured tables and the injected-key bookkeeping, and turns
/// each [`InputEvent`] into a [`Decision`].
///
/// One engine lives inside one hook callback context.  It is never shared
/// between threads, so `handle` takes `&mut self` and nothing is locked.
pub struct DecisionEngine {
    tables: KeyTables,
    injected: InjectedKeySet,
    keymap: Arc<dyn PlatformKeymap>,
    synthesizer: Arc<dyn KeySynthesizer>,
    /// Flag bits of every remapped modifier key.
    strip_mask: RawFlags,
    span: Span,
}

impl DecisionEngine {
    /// Builds an engine.  All log output is recorded inside `span`.
    pub fn new(
        tables: KeyTables,
        keymap: Arc<dyn PlatformKeymap>,
        synthesizer: Arc<dyn KeySynthesizer>,
        span: Span,
    ) -> Self {
        let strip_mask = tables
            .remaps
            .sources()
            .filter_map(|source| keymap.modifier_of(source))
            .fold(RawFlags::EMPTY, |mask, m| mask.union(keymap.modifier_mask(m)));

        span.in_scope(|| {
            debug!(
                platform = keymap.platform(),
                remaps = tables.remaps.len(),
                passthrough = tables.passthrough.len(),
                strip_mask = strip_mask.bits(),
                "decision engine ready"
            );
        });

        Self {
            tables,
            injected: InjectedKeySet::new(),
            keymap,
            synthesizer,
            strip_mask,
            span,
        }
    }

    /// Decides the fate of one event.  Never fails and never panics: any
    /// internal fault degrades to [`Decision::PassthroughUnmodified`].
    pub fn handle(&mut self, event: &InputEvent, focus: &FocusState) -> Decision {
        let span = self.span.clone();
        let _entered = span.enter();

        match panic::catch_unwind(AssertUnwindSafe(|| self.decide(event, focus))) {
            Ok(Ok(decision)) => decision,
            Ok(Err(fault)) => {
                warn!(?event, error = %fault, "passing event through after fault");
                Decision::PassthroughUnmodified
            }
            Err(payload) => {
                let fault = HookFault::Panic(panic_message(payload.as_ref()));
                error!(?event, error = %fault, "passing event through after panic");
                Decision::PassthroughUnmodified
            }
        }
    }

    /// The fallible pipeline behind [`DecisionEngine::handle`].
    pub fn decide(&mut self, event: &InputEvent, focus: &FocusState) -> Result<Decision, HookFault> {
        if !focus.target_active {
            return Ok(Decision::PassthroughUnmodified);
        }

        match event.kind {
            EventKind::FlagsChanged => self.on_flags_changed(event),
            EventKind::KeyDown => self.on_key(event, true),
            EventKind::KeyUp => self.on_key(event, false),
        }
    }

    /// Keys the engine is currently holding down.
    pub fn injected(&self) -> &InjectedKeySet {
        &self.injected
    }

    /// Flag bits cleared from events that pass through.
    pub fn strip_mask(&self) -> RawFlags {
        self.strip_mask
    }

    /// Releases every key the engine still holds.  Called on teardown so a
    /// remapped modifier cannot stay stuck after the hook is gone.
    pub fn release_held(&mut self) -> Result<(), HookFault> {
        self.release_injected(&mut Vec::new())
    }

    fn on_flags_changed(&mut self, event: &InputEvent) -> Result<Decision, HookFault> {
        let Some(target) = self.tables.remaps.get(event.key) else {
            return Ok(Decision::PassthroughUnmodified);
        };

        // The key's new state is read from its flag bit.  Only a key the
        // platform reports no bit for falls back to toggling.
        let down = match self.keymap.state_mask(event.key) {
            Some(mask) => event.flags.contains(mask),
            None => !self.injected.contains(target),
        };

        let stroke = self.inject(target, down)?;
        debug!(source = %event.key, %target, down, "remapped modifier");
        Ok(Decision::Suppress(vec![stroke]))
    }

    fn on_key(&mut self, event: &InputEvent, down: bool) -> Result<Decision, HookFault> {
        let modifiers = self.keymap.modifiers_from_flags(event.flags);
        let hotkey = HotkeyTuple::new(modifiers, event.key);

        if self.tables.passthrough.contains(&hotkey) {
            return self.replay_passthrough(&hotkey, down);
        }

        if let Some(target) = self.tables.remaps.get(event.key) {
            let stroke = self.inject(target, down)?;
            debug!(source = %event.key, %target, down, "remapped key");
            return Ok(Decision::Suppress(vec![stroke]));
        }

        Ok(Decision::PassthroughModifiedFlags(event.flags.without(self.strip_mask)))
    }

    /// Releases held synthetic keys, then replays the hotkey verbatim.
    ///
    /// The replayed modifiers and key mirror what the user is physically
    /// holding, so they are not recorded as injected.  If the replay breaks
    /// off, modifiers it already pressed are lifted again before the fault
    /// is returned.
    fn replay_passthrough(&mut self, hotkey: &HotkeyTuple, down: bool) -> Result<Decision, HookFault> {
        let mut strokes = Vec::new();
        self.release_injected(&mut strokes)?;

        let modifier_keys: Vec<PhysicalKey> = hotkey
            .modifiers
            .iter()
            .map(|m| self.keymap.modifier_key(m))
            .collect();

        if down {
            let mut pressed = Vec::with_capacity(modifier_keys.len());
            for &key in &modifier_keys {
                match self.emit(Keystroke::down(key)) {
                    Ok(stroke) => {
                        strokes.push(stroke);
                        pressed.push(key);
                    }
                    Err(fault) => {
                        self.lift(&pressed);
                        return Err(fault);
                    }
                }
            }
            match self.emit(Keystroke::down(hotkey.key)) {
                Ok(stroke) => strokes.push(stroke),
                Err(fault) => {
                    self.lift(&pressed);
                    return Err(fault);
                }
            }
        } else {
            strokes.push(self.emit(Keystroke::up(hotkey.key))?);
            for &key in modifier_keys.iter().rev() {
                strokes.push(self.emit(Keystroke::up(key))?);
            }
        }

        debug!(%hotkey, down, injected = strokes.len(), "replayed passthrough hotkey");
        Ok(Decision::Suppress(strokes))
    }

    /// Emits an up for every held synthetic key.  A key leaves the set once
    /// its up was accepted; on failure the keys not yet released are marked
    /// down again so a later release can retry them.
    fn release_injected(&mut self, strokes: &mut Vec<Keystroke>) -> Result<(), HookFault> {
        let held = self.injected.release_all();
        for (i, &key) in held.iter().enumerate() {
            match self.emit(Keystroke::up(key)) {
                Ok(stroke) => strokes.push(stroke),
                Err(fault) => {
                    for &unreleased in &held[i..] {
                        self.injected.mark_down(unreleased);
                    }
                    return Err(fault);
                }
            }
        }
        Ok(())
    }

    /// Best-effort release of replayed modifiers, last pressed first.
    fn lift(&self, pressed: &[PhysicalKey]) {
        for &key in pressed.iter().rev() {
            if let Err(fault) = self.emit(Keystroke::up(key)) {
                warn!(%key, error = %fault, "could not lift replayed modifier");
            }
        }
    }

    /// Emits a remapped transition and records it.  The set only changes
    /// once the OS accepted the event.
    fn inject(&mut self, key: PhysicalKey, down: bool) -> Result<Keystroke, HookFault> {
        let stroke = self.emit(Keystroke { key, down })?;
        if down {
            self.injected.mark_down(key);
        } else {
            self.injected.mark_up(key);
        }
        Ok(stroke)
    }

    fn emit(&self, stroke: Keystroke) -> Result<Keystroke, HookFault> {
        self.synthesizer.emit(stroke)?;
        Ok(stroke)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::hotkey::AnsiCharLookup;
    use crate::domain::tables::{build_tables, RemapEntry};
    use crate::engine::mock::MockKeySynthesizer;
    use crate::keymap::macos_cg::{
        FLAG_MASK_ALTERNATE, FLAG_MASK_COMMAND, FLAG_MASK_CONTROL, FLAG_MASK_SECONDARY_FN, FLAG_MASK_SHIFT,
    };
    use crate::keymap::MacosKeymap;

    const F13: PhysicalKey = PhysicalKey::new(0x69);
    const CTRL: PhysicalKey = PhysicalKey::new(0x3B);
    const CMD: PhysicalKey = PhysicalKey::new(0x37);
    const A: PhysicalKey = PhysicalKey::new(0x00);
    const Q: PhysicalKey = PhysicalKey::new(0x0C);
    const ALT: PhysicalKey = PhysicalKey::new(0x3A);
    const SHIFT: PhysicalKey = PhysicalKey::new(0x38);
    const FN: PhysicalKey = PhysicalKey::new(0x3F);

    fn engine(remaps: &[(&str, &str)], passthrough: &[&str]) -> (DecisionEngine, Arc<MockKeySynthesizer>) {
        let entries: Vec<RemapEntry> = remaps.iter().map(|(f, t)| RemapEntry::new(*f, *t)).collect();
        let specs: Vec<String> = passthrough.iter().map(|s| s.to_string()).collect();
        let tables = build_tables(&entries, &specs, &MacosKeymap, &AnsiCharLookup(&MacosKeymap))
            .expect("valid tables");
        let synth = Arc::new(MockKeySynthesizer::new());
        let engine = DecisionEngine::new(tables, Arc::new(MacosKeymap), synth.clone(), Span::none());
        (engine, synth)
    }

    fn focused() -> FocusState {
        FocusState::active(None)
    }

    #[test]
    fn test_strip_mask_covers_only_remapped_modifiers() {
        let (engine, _) = engine(&[("cmd", "ctrl"), ("f13", "ctrl")], &[]);
        assert_eq!(engine.strip_mask(), RawFlags(FLAG_MASK_COMMAND));
    }

    #[test]
    fn test_unfocused_target_passes_everything_through() {
        // Arrange
        let (mut engine, synth) = engine(&[("cmd", "ctrl")], &["cmd+q"]);
        let event = InputEvent::flags_changed(CMD, RawFlags(FLAG_MASK_COMMAND));

        // Act
        let decision = engine.handle(&event, &FocusState::inactive());

        // Assert
        assert_eq!(decision, Decision::PassthroughUnmodified);
        assert!(synth.recorded().is_empty());
    }

    #[test]
    fn test_flags_changed_on_unmapped_modifier_passes_through() {
        let (mut engine, synth) = engine(&[("cmd", "ctrl")], &[]);
        let event = InputEvent::flags_changed(PhysicalKey::new(0x38), RawFlags(FLAG_MASK_SHIFT));

        assert_eq!(engine.handle(&event, &focused()), Decision::PassthroughUnmodified);
        assert!(synth.recorded().is_empty());
    }

    #[test]
    fn test_remapped_modifier_down_and_up_follow_flag_bit() {
        let (mut engine, synth) = engine(&[("cmd", "ctrl")], &[]);

        let down = engine.handle(&InputEvent::flags_changed(CMD, RawFlags(FLAG_MASK_COMMAND)), &focused());
        assert_eq!(down, Decision::Suppress(vec![Keystroke::down(CTRL)]));
        assert!(engine.injected().contains(CTRL));

        let up = engine.handle(&InputEvent::flags_changed(CMD, RawFlags::EMPTY), &focused());
        assert_eq!(up, Decision::Suppress(vec![Keystroke::up(CTRL)]));
        assert!(engine.injected().is_empty());
        assert_eq!(synth.recorded(), vec![Keystroke::down(CTRL), Keystroke::up(CTRL)]);
    }

    #[test]
    fn test_plain_key_is_remapped_on_down_and_up() {
        let (mut engine, _) = engine(&[("a", "f13")], &[]);

        let down = engine.handle(&InputEvent::key_down(A, RawFlags::EMPTY), &focused());
        let up = engine.handle(&InputEvent::key_up(A, RawFlags::EMPTY), &focused());

        assert_eq!(down, Decision::Suppress(vec![Keystroke::down(F13)]));
        assert_eq!(up, Decision::Suppress(vec![Keystroke::up(F13)]));
        assert!(engine.injected().is_empty());
    }

    #[test]
    fn test_unrelated_key_has_remap_source_bits_stripped() {
        // Arrange: cmd is remapped, so the cmd bit must not reach the target
        let (mut engine, synth) = engine(&[("cmd", "ctrl")], &[]);
        let other_bits = 0x0000_0100;
        let flags = RawFlags(FLAG_MASK_COMMAND | FLAG_MASK_SHIFT | other_bits);

        // Act
        let decision = engine.handle(&InputEvent::key_down(A, flags), &focused());

        // Assert
        assert_eq!(
            decision,
            Decision::PassthroughModifiedFlags(RawFlags(FLAG_MASK_SHIFT | other_bits))
        );
        assert!(synth.recorded().is_empty());
    }

    #[test]
    fn test_synthesis_failure_fails_open_and_leaves_set_untouched() {
        let (mut engine, synth) = engine(&[("cmd", "ctrl")], &[]);
        synth.set_failing(true);

        let decision = engine.handle(&InputEvent::flags_changed(CMD, RawFlags(FLAG_MASK_COMMAND)), &focused());

        assert_eq!(decision, Decision::PassthroughUnmodified);
        assert!(engine.injected().is_empty());
    }

    #[test]
    fn test_decide_surfaces_synthesis_error() {
        let (mut engine, synth) = engine(&[("cmd", "ctrl")], &[]);
        synth.set_failing(true);

        let result = engine.decide(&InputEvent::flags_changed(CMD, RawFlags(FLAG_MASK_COMMAND)), &focused());

        assert!(matches!(result, Err(HookFault::Synthesis(SynthesisError::Platform(_)))));
    }

    struct PanickingSynthesizer;

    impl KeySynthesizer for PanickingSynthesizer {
        fn emit_key_down(&self, _key: PhysicalKey) -> Result<(), SynthesisError> {
            panic!("injected fault");
        }

        fn emit_key_up(&self, _key: PhysicalKey) -> Result<(), SynthesisError> {
            panic!("injected fault");
        }
    }

    #[test]
    fn test_panic_inside_pipeline_fails_open() {
        // Arrange
        let tables = build_tables(
            &[RemapEntry::new("cmd", "ctrl")],
            &[],
            &MacosKeymap,
            &AnsiCharLookup(&MacosKeymap),
        )
        .expect("valid tables");
        let mut engine = DecisionEngine::new(
            tables,
            Arc::new(MacosKeymap),
            Arc::new(PanickingSynthesizer),
            Span::none(),
        );

        // Act
        let decision = engine.handle(&InputEvent::flags_changed(CMD, RawFlags(FLAG_MASK_COMMAND)), &focused());

        // Assert
        assert_eq!(decision, Decision::PassthroughUnmodified);
    }

    #[test]
    fn test_release_held_lifts_every_injected_key() {
        let (mut engine, synth) = engine(&[("cmd", "ctrl")], &[]);
        engine.handle(&InputEvent::flags_changed(CMD, RawFlags(FLAG_MASK_COMMAND)), &focused());
        synth.clear();

        engine.release_held().expect("mock never fails");

        assert_eq!(synth.recorded(), vec![Keystroke::up(CTRL)]);
        assert!(engine.injected().is_empty());
    }

    #[test]
    fn test_passthrough_key_up_releases_key_before_modifiers() {
        let (mut engine, _) = engine(&[], &["ctrl+cmd+a"]);
        let flags = RawFlags(FLAG_MASK_CONTROL | FLAG_MASK_COMMAND);

        let decision = engine.handle(&InputEvent::key_up(A, flags), &focused());

        assert_eq!(
            decision,
            Decision::Suppress(vec![Keystroke::up(A), Keystroke::up(CMD), Keystroke::up(CTRL)])
        );
    }

    #[test]
    fn test_failed_cleanup_keeps_unreleased_keys_for_teardown() {
        // Arrange: alt->ctrl and f13->shift are both held
        let (mut engine, synth) = engine(&[("alt", "ctrl"), ("f13", "shift")], &["cmd+q"]);
        engine.handle(&InputEvent::flags_changed(ALT, RawFlags(FLAG_MASK_ALTERNATE)), &focused());
        engine.handle(&InputEvent::key_down(F13, RawFlags(FLAG_MASK_ALTERNATE)), &focused());
        assert_eq!(engine.injected().len(), 2);
        synth.clear();
        synth.fail_after(1);

        // Act: the cleanup releases shift, then synthesis starts failing
        let decision = engine.handle(&InputEvent::key_down(Q, RawFlags(FLAG_MASK_COMMAND)), &focused());

        // Assert
        assert_eq!(decision, Decision::PassthroughUnmodified);
        assert_eq!(synth.recorded(), vec![Keystroke::up(SHIFT)]);
        assert!(engine.injected().contains(CTRL));
        assert!(!engine.injected().contains(SHIFT));

        // Teardown with a healthy synthesizer releases the rest exactly once
        *synth.remaining.lock().expect("lock poisoned") = None;
        synth.clear();
        engine.release_held().expect("mock recovered");
        assert_eq!(synth.recorded(), vec![Keystroke::up(CTRL)]);
        assert!(engine.injected().is_empty());
    }

    #[test]
    fn test_failed_release_held_can_be_retried() {
        let (mut engine, synth) = engine(&[("cmd", "ctrl")], &[]);
        engine.handle(&InputEvent::flags_changed(CMD, RawFlags(FLAG_MASK_COMMAND)), &focused());
        synth.set_failing(true);

        assert!(engine.release_held().is_err());
        assert!(engine.injected().contains(CTRL));

        synth.set_failing(false);
        synth.clear();
        engine.release_held().expect("mock recovered");
        assert_eq!(synth.recorded(), vec![Keystroke::up(CTRL)]);
    }

    /// Records like the mock but refuses key-downs of one key.
    struct RejectingSynthesizer {
        inner: MockKeySynthesizer,
        rejected: PhysicalKey,
    }

    impl KeySynthesizer for RejectingSynthesizer {
        fn emit_key_down(&self, key: PhysicalKey) -> Result<(), SynthesisError> {
            if key == self.rejected {
                return Err(SynthesisError::Platform("rejected".to_string()));
            }
            self.inner.emit_key_down(key)
        }

        fn emit_key_up(&self, key: PhysicalKey) -> Result<(), SynthesisError> {
            self.inner.emit_key_up(key)
        }
    }

    #[test]
    fn test_aborted_replay_lifts_modifiers_it_pressed() {
        // Arrange
        let tables = build_tables(&[], &["ctrl+cmd+a".to_string()], &MacosKeymap, &AnsiCharLookup(&MacosKeymap))
            .expect("valid tables");
        let synth = Arc::new(RejectingSynthesizer {
            inner: MockKeySynthesizer::new(),
            rejected: A,
        });
        let mut engine = DecisionEngine::new(tables, Arc::new(MacosKeymap), synth.clone(), Span::none());
        let flags = RawFlags(FLAG_MASK_CONTROL | FLAG_MASK_COMMAND);

        // Act
        let decision = engine.handle(&InputEvent::key_down(A, flags), &focused());

        // Assert
        assert_eq!(decision, Decision::PassthroughUnmodified);
        assert_eq!(
            synth.inner.recorded(),
            vec![
                Keystroke::down(CTRL),
                Keystroke::down(CMD),
                Keystroke::up(CMD),
                Keystroke::up(CTRL),
            ]
        );
        assert!(engine.injected().is_empty());
    }

    #[test]
    fn test_fn_release_after_passthrough_injects_up_not_down() {
        // Arrange: fn->ctrl is held when the cmd+q passthrough fires
        let (mut engine, synth) = engine(&[("fn", "ctrl")], &["cmd+q"]);
        engine.handle(&InputEvent::flags_changed(FN, RawFlags(FLAG_MASK_SECONDARY_FN)), &focused());
        let replay = engine.handle(
            &InputEvent::key_down(Q, RawFlags(FLAG_MASK_COMMAND | FLAG_MASK_SECONDARY_FN)),
            &focused(),
        );
        assert_eq!(
            replay,
            Decision::Suppress(vec![Keystroke::up(CTRL), Keystroke::down(CMD), Keystroke::down(Q)])
        );

        // Act: the physical fn key comes up
        let release = engine.handle(&InputEvent::flags_changed(FN, RawFlags::EMPTY), &focused());

        // Assert
        assert_eq!(release, Decision::Suppress(vec![Keystroke::up(CTRL)]));
        assert_eq!(synth.recorded().last(), Some(&Keystroke::up(CTRL)));
        assert!(engine.injected().is_empty());
    }

    #[test]
    fn test_fn_press_reads_direction_from_flag_bit() {
        let (mut engine, _) = engine(&[("fn", "ctrl")], &[]);

        // An fn event without the fn bit is a release even if nothing is held
        let decision = engine.handle(&InputEvent::flags_changed(FN, RawFlags::EMPTY), &focused());

        assert_eq!(decision, Decision::Suppress(vec![Keystroke::up(CTRL)]));
        assert!(engine.injected().is_empty());
    }
}
