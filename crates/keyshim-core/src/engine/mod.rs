//! The per-event decision pipeline.
//!
//! # How an event flows (for beginners)
//!
//! 1. The OS hook fires and the platform adapter turns the native event into
//!    an [`InputEvent`].
//! 2. The adapter reads the latest [`crate::FocusState`] and hands both to
//!    [`DecisionEngine::handle`].
//! 3. The engine returns a [`Decision`]: let the event through, let it
//!    through with some modifier bits cleared, or swallow it.  When it
//!    swallows an event it has already emitted replacement keystrokes through
//!    its [`KeySynthesizer`].
//!
//! `handle` never fails.  Any error or panic inside the pipeline becomes
//! [`Decision::PassthroughUnmodified`] so a bug can never eat the user's
//! input.

pub mod decision;
pub mod event;
pub mod mock;
pub mod synthesis;

pub use decision::{Decision, DecisionEngine, HookFault};
pub use event::{EventKind, InputEvent};
pub use synthesis::{KeySynthesizer, Keystroke, SynthesisError};
