//! Domain entities for the key remapping engine.
//!
//! This module contains pure logic with no OS dependencies: the key and
//! modifier primitives, hotkey parsing, the configured tables, the
//! injected-key bookkeeping and the focus state the hook consults.

pub mod focus;
pub mod hotkey;
pub mod injected;
pub mod key;
pub mod tables;
