//! Screen Module
//!
//! Per-screen acquisition of substructure redirection and global key grabs.
//! Each screen is attempted independently: losing the redirect race on one
//! screen leaves it unmanaged and has no effect on the others.

use std::collections::BTreeSet;

use tracing::{info, warn};
use x11rb::protocol::xproto::Window;

use crate::error::WmError;
use crate::wm::display::{DisplayServer, ScreenInfo};
use crate::wm::keyboard::KeyBindingSet;

/// A screen of the display and whether this manager owns its redirect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Screen {
    pub info: ScreenInfo,
    pub redirect_acquired: bool,
}

impl Screen {
    pub fn new(info: ScreenInfo) -> Self {
        Self {
            info,
            redirect_acquired: false,
        }
    }

    pub fn id(&self) -> usize {
        self.info.id
    }

    pub fn root(&self) -> Window {
        self.info.root
    }
}

/// Select substructure redirect on the screen's root, then grab every
/// binding's keys there.
///
/// Returns `Ok(false)` when another client already owns redirection on this
/// screen. Nothing is grabbed in that case.
pub fn try_acquire<D: DisplayServer + ?Sized>(
    display: &D,
    screen: &mut Screen,
    bindings: &KeyBindingSet,
) -> Result<bool, WmError> {
    match display.select_substructure_redirect(screen.root()) {
        Ok(()) => {}
        Err(WmError::AccessDenied(detail)) => {
            warn!(
                "Screen {}: substructure redirect already owned by another client ({})",
                screen.id(),
                detail
            );
            return Ok(false);
        }
        Err(e) => return Err(e),
    }

    screen.redirect_acquired = true;
    grab_keys(display, screen, bindings)?;
    info!("Screen {}: managing root window {:#x}", screen.id(), screen.root());
    Ok(true)
}

/// Install a passive grab for every key code of every binding.
pub fn grab_keys<D: DisplayServer + ?Sized>(
    display: &D,
    screen: &Screen,
    bindings: &KeyBindingSet,
) -> Result<(), WmError> {
    for binding in bindings.iter() {
        let Some(modifiers) = binding.press_modifiers() else {
            warn!(
                "Binding {:?} has an unusable modifier mask {:#x}",
                binding.action, binding.modifiers
            );
            continue;
        };
        for &keycode in &binding.keycodes {
            display.grab_key(screen.root(), modifiers, keycode)?;
        }
    }
    Ok(())
}

/// Replace the key grabs on the screen's root after the key codes changed.
///
/// Grabs on codes that no longer carry a bound keysym are dropped first.
pub fn regrab_keys<D: DisplayServer + ?Sized>(
    display: &D,
    screen: &Screen,
    bindings: &KeyBindingSet,
) -> Result<(), WmError> {
    let masks: BTreeSet<u16> = bindings.iter().filter_map(|b| b.press_modifiers()).collect();
    for modifiers in masks {
        display.ungrab_keys(screen.root(), modifiers)?;
    }
    grab_keys(display, screen, bindings)
}

/// Try every screen of the display and keep the ones we now manage.
pub fn acquire_screens<D: DisplayServer + ?Sized>(
    display: &D,
    bindings: &KeyBindingSet,
) -> Result<Vec<Screen>, WmError> {
    let mut managed = Vec::new();
    for info in display.screens() {
        let mut screen = Screen::new(info);
        if try_acquire(display, &mut screen, bindings)? {
            managed.push(screen);
        }
    }

    if managed.is_empty() {
        return Err(WmError::NoUnmanagedScreens);
    }
    Ok(managed)
}
