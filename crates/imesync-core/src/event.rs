#![forbid(unsafe_code)]

//! Key events forwarded through `sendKeyEvent`.
//!
//! Only the keys that edit text or move the caret are modelled; anything else
//! is the keyboard's business and never reaches the reconciliation core.

use bitflags::bitflags;

bitflags! {
    /// Modifier keys held during a key event.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Modifiers: u8 {
        const NONE  = 0b0000;
        const SHIFT = 0b0001;
        const ALT   = 0b0010;
        const CTRL  = 0b0100;
        const META  = 0b1000;
    }
}

/// Key transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAction {
    Down,
    Up,
}

/// Keys with a local editing effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// Backspace: delete the selection or the code point before the caret.
    Del,
    /// Delete the selection or the code point after the caret.
    ForwardDel,
    DpadLeft,
    DpadRight,
    Enter,
    Char(char),
}

/// A key event as the keyboard sends it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    pub action: KeyAction,
    pub code: KeyCode,
    pub modifiers: Modifiers,
}

impl KeyEvent {
    /// Key-down event with no modifiers.
    #[must_use]
    pub const fn down(code: KeyCode) -> Self {
        Self {
            action: KeyAction::Down,
            code,
            modifiers: Modifiers::NONE,
        }
    }

    /// Key-up event with no modifiers.
    #[must_use]
    pub const fn up(code: KeyCode) -> Self {
        Self {
            action: KeyAction::Up,
            code,
            modifiers: Modifiers::NONE,
        }
    }

    #[must_use]
    pub const fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    #[must_use]
    pub const fn is_down(&self) -> bool {
        matches!(self.action, KeyAction::Down)
    }
}
