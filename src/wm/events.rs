//! Events Module
//!
//! The closed set of events the window manager dispatches on. Anything the
//! server sends that is not listed here arrives as `WmEvent::Unhandled` and
//! is logged and ignored, never treated as a failure.

use x11rb::protocol::xproto::{ConfigureWindowAux, Keycode, Window};
use x11rb::protocol::Event;

/// Pointer button or motion event, in root coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerEvent {
    /// Window the event was reported to (the grabbing frame)
    pub window: Window,
    pub root_x: i16,
    pub root_y: i16,
    /// Button number for press/release, 0 for motion
    pub button: u8,
    /// Modifier and button state before the event
    pub state: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub keycode: Keycode,
    pub state: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WmEvent {
    CreateNotify { window: Window },
    DestroyNotify { window: Window },
    ConfigureRequest { window: Window, changes: ConfigureWindowAux },
    ConfigureNotify { window: Window },
    MapRequest { parent: Window, window: Window },
    MapNotify { window: Window },
    MappingNotify,
    /// `event` is the window the notification was selected on
    UnmapNotify { event: Window, window: Window },
    ReparentNotify { window: Window, parent: Window },
    ClientMessage { window: Window },
    MotionNotify(PointerEvent),
    ButtonPress(PointerEvent),
    ButtonRelease(PointerEvent),
    KeyPress(KeyEvent),
    KeyRelease(KeyEvent),
    /// Error reply to an unchecked request
    ProtocolError(String),
    Unhandled(String),
}

impl WmEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateNotify { .. } => "CreateNotify",
            Self::DestroyNotify { .. } => "DestroyNotify",
            Self::ConfigureRequest { .. } => "ConfigureRequest",
            Self::ConfigureNotify { .. } => "ConfigureNotify",
            Self::MapRequest { .. } => "MapRequest",
            Self::MapNotify { .. } => "MapNotify",
            Self::MappingNotify => "MappingNotify",
            Self::UnmapNotify { .. } => "UnmapNotify",
            Self::ReparentNotify { .. } => "ReparentNotify",
            Self::ClientMessage { .. } => "ClientMessage",
            Self::MotionNotify(_) => "MotionNotify",
            Self::ButtonPress(_) => "ButtonPress",
            Self::ButtonRelease(_) => "ButtonRelease",
            Self::KeyPress(_) => "KeyPress",
            Self::KeyRelease(_) => "KeyRelease",
            Self::ProtocolError(_) => "ProtocolError",
            Self::Unhandled(_) => "Unhandled",
        }
    }
}

impl From<Event> for WmEvent {
    fn from(event: Event) -> Self {
        match event {
            Event::CreateNotify(e) => Self::CreateNotify { window: e.window },
            Event::DestroyNotify(e) => Self::DestroyNotify { window: e.window },
            Event::ConfigureRequest(e) => Self::ConfigureRequest {
                window: e.window,
                changes: ConfigureWindowAux::from_configure_request(&e),
            },
            Event::ConfigureNotify(e) => Self::ConfigureNotify { window: e.window },
            Event::MapRequest(e) => Self::MapRequest {
                parent: e.parent,
                window: e.window,
            },
            Event::MapNotify(e) => Self::MapNotify { window: e.window },
            Event::MappingNotify(_) => Self::MappingNotify,
            Event::UnmapNotify(e) => Self::UnmapNotify {
                event: e.event,
                window: e.window,
            },
            Event::ReparentNotify(e) => Self::ReparentNotify {
                window: e.window,
                parent: e.parent,
            },
            Event::ClientMessage(e) => Self::ClientMessage { window: e.window },
            Event::MotionNotify(e) => Self::MotionNotify(PointerEvent {
                window: e.event,
                root_x: e.root_x,
                root_y: e.root_y,
                button: 0,
                state: u16::from(e.state),
            }),
            Event::ButtonPress(e) => Self::ButtonPress(PointerEvent {
                window: e.event,
                root_x: e.root_x,
                root_y: e.root_y,
                button: e.detail,
                state: u16::from(e.state),
            }),
            Event::ButtonRelease(e) => Self::ButtonRelease(PointerEvent {
                window: e.event,
                root_x: e.root_x,
                root_y: e.root_y,
                button: e.detail,
                state: u16::from(e.state),
            }),
            Event::KeyPress(e) => Self::KeyPress(KeyEvent {
                keycode: e.detail,
                state: u16::from(e.state),
            }),
            Event::KeyRelease(e) => Self::KeyRelease(KeyEvent {
                keycode: e.detail,
                state: u16::from(e.state),
            }),
            Event::Error(e) => Self::ProtocolError(format!(
                "{:?} in request {} (bad value {:#x})",
                e.error_kind,
                e.request_name.unwrap_or("unknown"),
                e.bad_value
            )),
            other => Self::Unhandled(format!("{other:?}")),
        }
    }
}
