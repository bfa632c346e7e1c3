//! Recording key synthesizer for tests.
//!
//! Every emitted keystroke is pushed into a `Mutex<Vec<Keystroke>>` so test
//! assertions can inspect exactly what was injected and in what order.
//!
//! # `should_fail` flag
//!
//! Set `should_fail` to make every call return [`SynthesisError::Platform`].
//! It is an atomic so a test can flip it after handing an `Arc` of the mock
//! to the engine.  [`MockKeySynthesizer::fail_after`] instead lets a fixed
//! number of strokes through before failing, to break a sequence midway.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::synthesis::{KeySynthesizer, Keystroke, SynthesisError};
use crate::domain::key::PhysicalKey;

#[derive(Debug, Default)]
pub struct MockKeySynthesizer {
    pub strokes: Mutex<Vec<Keystroke>>,
    pub should_fail: AtomicBool,
    pub remaining: Mutex<Option<usize>>,
}

impl MockKeySynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A snapshot of everything emitted so far.
    pub fn recorded(&self) -> Vec<Keystroke> {
        match self.strokes.lock() {
            Ok(strokes) => strokes.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Forgets everything emitted so far.
    pub fn clear(&self) {
        if let Ok(mut strokes) = self.strokes.lock() {
            strokes.clear();
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.should_fail.store(failing, Ordering::SeqCst);
    }

    /// Accepts the next `strokes` keystrokes, then fails every call.
    pub fn fail_after(&self, strokes: usize) {
        if let Ok(mut remaining) = self.remaining.lock() {
            *remaining = Some(strokes);
        }
    }

    fn record(&self, stroke: Keystroke) -> Result<(), SynthesisError> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(SynthesisError::Platform("mock failure".to_string()));
        }
        if let Ok(mut remaining) = self.remaining.lock() {
            match remaining.as_mut() {
                Some(0) => return Err(SynthesisError::Platform("mock failure".to_string())),
                Some(n) => *n -= 1,
                None => {}
            }
        }
        self.strokes
            .lock()
            .map_err(|_| SynthesisError::Platform("mock poisoned".to_string()))?
            .push(stroke);
        Ok(())
    }
}

impl KeySynthesizer for MockKeySynthesizer {
    fn emit_key_down(&self, key: PhysicalKey) -> Result<(), SynthesisError> {
        self.record(Keystroke::down(key))
    }

    fn emit_key_up(&self, key: PhysicalKey) -> Result<(), SynthesisError> {
        self.record(Keystroke::up(key))
    }
}
