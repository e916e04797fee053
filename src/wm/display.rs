//! Display Module
//!
//! The window manager talks to the display server only through the
//! `DisplayServer` trait. `X11Server` implements it over x11rb; tests drive
//! the engine with an in-memory fake.

use x11rb::protocol::xproto::{ConfigureWindowAux, EventMask, Keycode, Keysym, Window};

use crate::error::WmError;
use crate::shared::Geometry;
use crate::wm::events::WmEvent;

/// Static per-screen information from the connection setup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenInfo {
    /// Screen number
    pub id: usize,
    /// Root window
    pub root: Window,
    /// Root depth, used for frames
    pub root_depth: u8,
    /// Default frame border colour
    pub white_pixel: u32,
}

/// The subset of GetWindowAttributes the engine looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowAttributes {
    pub override_redirect: bool,
    pub viewable: bool,
}

/// Border drawn around every frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameStyle {
    pub border_width: u16,
    /// `None` uses the screen's white pixel
    pub border_pixel: Option<u32>,
}

impl Default for FrameStyle {
    fn default() -> Self {
        Self {
            border_width: 2,
            border_pixel: None,
        }
    }
}

/// Command sink and event source for the window manager.
///
/// Requests are submitted in program order but are not flushed until
/// `flush` or until a request needs a reply. Only the checked request
/// (`select_substructure_redirect`) reports its protocol error directly;
/// errors from every other void request show up later as
/// `WmEvent::ProtocolError`.
pub trait DisplayServer {
    /// All screens of the display, in setup order.
    fn screens(&self) -> Vec<ScreenInfo>;

    /// Block until the next event arrives.
    ///
    /// Returns `Ok(None)` when the wait was interrupted so the caller can
    /// observe a pending shutdown request.
    fn next_event(&mut self) -> Result<Option<WmEvent>, WmError>;

    /// Return an already queued event without blocking.
    fn poll_event(&mut self) -> Result<Option<WmEvent>, WmError>;

    /// Select substructure redirection on `root` and wait for the server's
    /// verdict. Fails with `WmError::AccessDenied` when another client
    /// already holds the redirect.
    fn select_substructure_redirect(&self, root: Window) -> Result<(), WmError>;

    fn grab_key(&self, root: Window, modifiers: u16, keycode: Keycode) -> Result<(), WmError>;

    /// Drop the passive grabs of every key with exactly `modifiers` on `root`.
    fn ungrab_keys(&self, root: Window, modifiers: u16) -> Result<(), WmError>;

    fn grab_button(&self, window: Window, button: u8, modifiers: u16, mask: EventMask) -> Result<(), WmError>;

    fn window_attributes(&self, window: Window) -> Result<WindowAttributes, WmError>;

    /// Geometry relative to the window's parent.
    fn geometry(&self, window: Window) -> Result<Geometry, WmError>;

    /// Children of `window` in stacking order, bottom first.
    fn children(&self, window: Window) -> Result<Vec<Window>, WmError>;

    /// Create an unmapped frame window as a child of the screen root.
    fn create_frame(&self, screen: &ScreenInfo, geometry: Geometry, style: FrameStyle) -> Result<Window, WmError>;

    fn reparent(&self, window: Window, parent: Window, x: i16, y: i16) -> Result<(), WmError>;

    fn map(&self, window: Window) -> Result<(), WmError>;

    fn unmap(&self, window: Window) -> Result<(), WmError>;

    fn destroy(&self, window: Window) -> Result<(), WmError>;

    fn configure(&self, window: Window, changes: &ConfigureWindowAux) -> Result<(), WmError>;

    /// Every key code that produces `keysym` in any column of the map.
    fn keycodes_for(&self, keysym: Keysym) -> Vec<Keycode>;

    /// Keysym in column `index` for `keycode`, 0 if unmapped.
    fn keysym_at(&self, keycode: Keycode, index: u8) -> Keysym;

    fn refresh_keyboard_mapping(&mut self) -> Result<(), WmError>;

    fn window_class(&self, window: Window) -> Option<String>;

    fn window_name(&self, window: Window) -> Option<String>;

    fn flush(&self) -> Result<(), WmError>;
}
