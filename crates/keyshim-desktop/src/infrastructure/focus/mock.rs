//! Scripted focus probe for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use keyshim_core::FocusState;

use super::{FocusError, FocusProbe};

/// Replays a fixed list of probe results, then keeps returning the last
/// successful state (or inactive if there was none).
pub struct ScriptedFocusProbe {
    script: VecDeque<Result<FocusState, FocusError>>,
    last: FocusState,
    calls: Arc<AtomicUsize>,
}

impl ScriptedFocusProbe {
    pub fn new(script: Vec<Result<FocusState, FocusError>>) -> Self {
        Self {
            script: script.into(),
            last: FocusState::inactive(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A probe that always reports `state`.
    pub fn repeating(state: FocusState) -> Self {
        Self::new(vec![Ok(state)])
    }

    /// Shared counter of how many times the probe ran.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl FocusProbe for ScriptedFocusProbe {
    fn probe(&mut self) -> Result<FocusState, FocusError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.pop_front() {
            Some(Ok(state)) => {
                self.last = state;
                Ok(state)
            }
            Some(Err(e)) => Err(e),
            None => Ok(self.last),
        }
    }
}
