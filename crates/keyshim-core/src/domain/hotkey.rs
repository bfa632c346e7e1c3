//! Key-spec parsing and the canonical hotkey form.
//!
//! # Grammar
//!
//! A spec is a `+`-separated list of tokens.  Each token is one of
//!
//! - a modifier: `ctrl`, `alt`, `cmd`, `shift`;
//! - a named key such as `f13`, `page_up` or `ctrl_r`, optionally written in
//!   angle brackets (`<f13>`);
//! - a single literal character such as `a` or `/`.
//!
//! Tokens are trimmed and matched case-insensitively.  A hotkey needs exactly
//! one non-modifier token and names each modifier at most once; `ctrl+alt+a`
//! is valid, `ctrl+alt`, `a+b` and `ctrl+ctrl+a` are not.
//! A single-key field takes exactly one token, and there a bare modifier name
//! means the left-hand modifier key itself.
//!
//! Characters are resolved through a [`CharLookup`] because the key that
//! produces a character depends on the active keyboard layout.

use std::fmt;

use thiserror::Error;

use super::key::{Modifier, ModifierState, PhysicalKey};
use crate::keymap::PlatformKeymap;

/// Errors produced while parsing key specs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeySpecError {
    /// A single key could not be resolved.
    #[error("invalid key spec {spec:?}: {reason}")]
    InvalidKeySpec { spec: String, reason: String },

    /// A hotkey had zero or several non-modifier keys.
    #[error("invalid hotkey spec {spec:?}: {reason}")]
    InvalidHotkeySpec { spec: String, reason: String },
}

impl KeySpecError {
    fn key(spec: &str, reason: impl Into<String>) -> Self {
        Self::InvalidKeySpec {
            spec: spec.to_string(),
            reason: reason.into(),
        }
    }

    fn hotkey(spec: &str, reason: impl Into<String>) -> Self {
        Self::InvalidHotkeySpec {
            spec: spec.to_string(),
            reason: reason.into(),
        }
    }
}

/// Resolves a literal character to the key that types it.
pub trait CharLookup {
    fn key_for_char(&self, ch: char) -> Option<PhysicalKey>;
}

impl<F> CharLookup for F
where
    F: Fn(char) -> Option<PhysicalKey>,
{
    fn key_for_char(&self, ch: char) -> Option<PhysicalKey> {
        self(ch)
    }
}

/// Character lookup backed by a keymap's static US-ANSI table.
pub struct AnsiCharLookup<'a>(pub &'a dyn PlatformKeymap);

impl CharLookup for AnsiCharLookup<'_> {
    fn key_for_char(&self, ch: char) -> Option<PhysicalKey> {
        self.0.char_key(ch)
    }
}

/// The canonical, comparable form of a hotkey or an observed key combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HotkeyTuple {
    pub modifiers: ModifierState,
    pub key: PhysicalKey,
}

impl HotkeyTuple {
    pub fn new(modifiers: ModifierState, key: PhysicalKey) -> Self {
        Self { modifiers, key }
    }

    /// Renders the tuple back into spec syntax, modifiers first in canonical
    /// order (`ctrl+alt+cmd+shift+key`).
    ///
    /// Returns `None` if the key has neither a name nor a US-ANSI character
    /// in `keymap`.
    pub fn to_spec(&self, keymap: &dyn PlatformKeymap) -> Option<String> {
        let key_token = match keymap.key_name(self.key) {
            Some(name) => name.to_string(),
            None => keymap.key_char(self.key)?.to_string(),
        };
        let mut tokens: Vec<String> = self.modifiers.iter().map(|m| m.token().to_string()).collect();
        tokens.push(key_token);
        Some(tokens.join("+"))
    }
}

impl fmt::Display for HotkeyTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for modifier in self.modifiers.iter() {
            write!(f, "{}+", modifier.token())?;
        }
        write!(f, "{}", self.key)
    }
}

enum Token {
    Modifier(Modifier),
    Key(PhysicalKey),
}

/// Splits a spec into trimmed, non-empty tokens.
fn tokens(spec: &str) -> Result<Vec<&str>, KeySpecError> {
    let parts: Vec<&str> = spec.split('+').map(str::trim).collect();
    if parts.iter().any(|part| part.is_empty()) {
        return Err(KeySpecError::key(spec, "empty key token"));
    }
    Ok(parts)
}

fn strip_brackets(token: &str) -> &str {
    token
        .strip_prefix('<')
        .and_then(|inner| inner.strip_suffix('>'))
        .unwrap_or(token)
}

fn resolve_key(
    spec: &str,
    token: &str,
    keymap: &dyn PlatformKeymap,
    chars: &dyn CharLookup,
) -> Result<PhysicalKey, KeySpecError> {
    let mut it = token.chars();
    if let (Some(ch), None) = (it.next(), it.next()) {
        return chars
            .key_for_char(ch)
            .ok_or_else(|| KeySpecError::key(spec, format!("no key types {ch:?} on this keyboard layout")));
    }
    keymap
        .named_key(token)
        .ok_or_else(|| KeySpecError::key(spec, format!("unknown key name {token:?}")))
}

fn resolve_token(
    spec: &str,
    raw: &str,
    keymap: &dyn PlatformKeymap,
    chars: &dyn CharLookup,
) -> Result<Token, KeySpecError> {
    let lowered = strip_brackets(raw).to_lowercase();
    if let Some(modifier) = Modifier::from_token(&lowered) {
        return Ok(Token::Modifier(modifier));
    }
    resolve_key(spec, &lowered, keymap, chars).map(Token::Key)
}

/// Parses a hotkey spec such as `"ctrl+alt+a"` into its canonical tuple.
pub fn parse_hotkey(
    spec: &str,
    keymap: &dyn PlatformKeymap,
    chars: &dyn CharLookup,
) -> Result<HotkeyTuple, KeySpecError> {
    let mut modifiers = ModifierState::NONE;
    let mut key = None;

    for raw in tokens(spec)? {
        match resolve_token(spec, raw, keymap, chars)? {
            Token::Modifier(modifier) if modifiers.contains(modifier) => {
                return Err(KeySpecError::hotkey(
                    spec,
                    format!("modifier {} given more than once", modifier.token()),
                ));
            }
            Token::Modifier(modifier) => modifiers.insert(modifier),
            Token::Key(found) if key.is_none() => key = Some(found),
            Token::Key(_) => {
                return Err(KeySpecError::hotkey(spec, "more than one non-modifier key"));
            }
        }
    }

    key.map(|key| HotkeyTuple::new(modifiers, key))
        .ok_or_else(|| KeySpecError::hotkey(spec, "hotkey has only modifier keys"))
}

/// Parses a single-key spec such as `"f13"` or `"ctrl"`.
pub fn parse_single(
    spec: &str,
    keymap: &dyn PlatformKeymap,
    chars: &dyn CharLookup,
) -> Result<PhysicalKey, KeySpecError> {
    let parts = tokens(spec)?;
    let [raw] = parts.as_slice() else {
        return Err(KeySpecError::key(spec, "expected a single key, found a key combination"));
    };
    match resolve_token(spec, raw, keymap, chars)? {
        Token::Modifier(modifier) => Ok(keymap.modifier_key(modifier)),
        Token::Key(key) => Ok(key),
    }
}
