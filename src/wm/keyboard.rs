//! Keyboard Module
//!
//! Built-in key bindings and the router that turns key presses into
//! window manager actions. Bindings are fixed: Alt+Return spawns a terminal,
//! Alt+Q quits, Alt+C captures every window, Alt+R releases every window.

use std::collections::BTreeSet;

use tracing::debug;
use x11rb::protocol::xproto::{Keycode, Keysym};

use crate::wm::display::DisplayServer;
use crate::wm::events::KeyEvent;

// Keysym constants from X11/keysymdef.h
pub const XK_RETURN: Keysym = 0xff0d;
pub const XK_Q: Keysym = 0x0051;
pub const XK_C: Keysym = 0x0043;
pub const XK_R: Keysym = 0x0052;

/// Mod1 (Alt)
pub const MOD1_MASK: u16 = 1 << 3;

/// AnyModifier in the core protocol encoding.
const ANY_MODIFIER: u32 = 1 << 15;

/// The bit above AnyModifier marks the key-release variant of a grab. Grabs
/// must only ever target the press variant.
pub const RELEASE_MODIFIER: u32 = ANY_MODIFIER << 1;

/// Keysym column used when reporting unbound keys
pub const DIAGNOSTIC_KEYSYM_INDEX: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    SpawnTerminal,
    Quit,
    CaptureAll,
    ReleaseAll,
}

/// One logical binding and every physical key code that produces it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBinding {
    pub action: Action,
    pub keysym: Keysym,
    /// Modifier mask in the 32-bit grab encoding, may carry the release bit
    pub modifiers: u32,
    pub keycodes: BTreeSet<Keycode>,
}

impl KeyBinding {
    fn new(action: Action, keysym: Keysym) -> Self {
        Self {
            action,
            keysym,
            modifiers: u32::from(MOD1_MASK),
            keycodes: BTreeSet::new(),
        }
    }

    /// Modifier mask to grab with: the binding's mask with the release bit
    /// cleared. `None` if what is left does not fit the 16-bit wire field.
    pub fn press_modifiers(&self) -> Option<u16> {
        u16::try_from(self.modifiers & !RELEASE_MODIFIER).ok()
    }
}

/// Ordered binding list. Order is match priority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBindingSet {
    bindings: Vec<KeyBinding>,
}

impl KeyBindingSet {
    /// The built-in bindings with key codes resolved against the current map.
    pub fn builtin<D: DisplayServer + ?Sized>(display: &D) -> Self {
        let mut set = Self {
            bindings: vec![
                KeyBinding::new(Action::SpawnTerminal, XK_RETURN),
                KeyBinding::new(Action::Quit, XK_Q),
                KeyBinding::new(Action::CaptureAll, XK_C),
                KeyBinding::new(Action::ReleaseAll, XK_R),
            ],
        };
        set.resolve(display);
        set
    }

    /// Re-resolve every binding's key codes, e.g. after a layout change.
    pub fn resolve<D: DisplayServer + ?Sized>(&mut self, display: &D) {
        for binding in &mut self.bindings {
            binding.keycodes = display.keycodes_for(binding.keysym).into_iter().collect();
            debug!(
                "Binding {:?} ({}) resolved to keycodes {:?}",
                binding.action,
                keysym_name(binding.keysym),
                binding.keycodes
            );
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyBinding> {
        self.bindings.iter()
    }

    /// First binding, in priority order, that accepts this key press.
    ///
    /// Requires the primary modifier to be held; other modifiers are ignored.
    pub fn route(&self, key: &KeyEvent) -> Option<Action> {
        self.bindings
            .iter()
            .find(|b| u32::from(key.state) & b.modifiers != 0 && b.keycodes.contains(&key.keycode))
            .map(|b| b.action)
    }
}

/// Human readable keysym for diagnostics.
pub fn keysym_name(keysym: Keysym) -> String {
    let named = match keysym {
        0 => Some("NoSymbol"),
        0x0020 => Some("space"),
        0xff08 => Some("BackSpace"),
        0xff09 => Some("Tab"),
        0xff0d => Some("Return"),
        0xff1b => Some("Escape"),
        0xff50 => Some("Home"),
        0xff51 => Some("Left"),
        0xff52 => Some("Up"),
        0xff53 => Some("Right"),
        0xff54 => Some("Down"),
        0xff57 => Some("End"),
        0xffe1 => Some("Shift_L"),
        0xffe2 => Some("Shift_R"),
        0xffe3 => Some("Control_L"),
        0xffe4 => Some("Control_R"),
        0xffe9 => Some("Alt_L"),
        0xffea => Some("Alt_R"),
        0xffeb => Some("Super_L"),
        0xffec => Some("Super_R"),
        0xffff => Some("Delete"),
        _ => None,
    };
    if let Some(name) = named {
        return name.to_string();
    }

    match keysym {
        0xffbe..=0xffc9 => format!("F{}", keysym - 0xffbe + 1),
        // Latin-1 keysyms are their own code points
        0x0021..=0x007e | 0x00a0..=0x00ff => char::from_u32(keysym).map(String::from).unwrap_or_default(),
        // Unicode keysyms
        0x0100_0100..=0x0110_ffff => char::from_u32(keysym - 0x0100_0000)
            .map(String::from)
            .unwrap_or_else(|| format!("{keysym:#x}")),
        _ => format!("{keysym:#x}"),
    }
}
