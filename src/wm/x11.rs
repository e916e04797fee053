//! X11 backend
//!
//! `DisplayServer` over an x11rb `RustConnection`. Waiting for events polls
//! the connection's file descriptor with mio and a short timeout, so a
//! pending shutdown request is noticed even on an idle display.

use std::io;
use std::os::unix::io::AsRawFd;
use std::time::Duration;

use tracing::{debug, info};
use x11rb::connection::Connection;
use x11rb::errors::{ConnectError, ConnectionError};
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;

use crate::error::WmError;
use crate::shared::Geometry;
use crate::signals::ShutdownSignal;
use crate::wm::display::{DisplayServer, FrameStyle, ScreenInfo, WindowAttributes};
use crate::wm::events::WmEvent;

/// Core protocol major version we speak
const REQUIRED_PROTOCOL_MAJOR: u16 = 11;

/// Upper bound on how long a shutdown request can go unnoticed
const WAIT_TIMEOUT: Duration = Duration::from_millis(100);

const X11_TOKEN: mio::Token = mio::Token(0);

/// Cached GetKeyboardMapping reply
#[derive(Debug, Clone, Default)]
struct KeyboardMap {
    min_keycode: Keycode,
    keysyms_per_keycode: u8,
    keysyms: Vec<Keysym>,
}

impl KeyboardMap {
    fn fetch(conn: &RustConnection) -> Result<Self, WmError> {
        let setup = conn.setup();
        let min_keycode = setup.min_keycode;
        let count = setup.max_keycode - min_keycode + 1;
        let reply = conn.get_keyboard_mapping(min_keycode, count)?.reply()?;
        debug!(
            "Keyboard mapping: {} keycodes from {}, {} keysyms each",
            count, min_keycode, reply.keysyms_per_keycode
        );
        Ok(Self {
            min_keycode,
            keysyms_per_keycode: reply.keysyms_per_keycode,
            keysyms: reply.keysyms,
        })
    }

    fn keycodes_for(&self, keysym: Keysym) -> Vec<Keycode> {
        let per = usize::from(self.keysyms_per_keycode);
        if per == 0 {
            return Vec::new();
        }
        self.keysyms
            .chunks(per)
            .enumerate()
            .filter(|(_, column)| column.contains(&keysym))
            .filter_map(|(offset, _)| u8::try_from(usize::from(self.min_keycode) + offset).ok())
            .collect()
    }

    fn keysym_at(&self, keycode: Keycode, index: u8) -> Keysym {
        if keycode < self.min_keycode || index >= self.keysyms_per_keycode {
            return 0;
        }
        let idx = usize::from(keycode - self.min_keycode) * usize::from(self.keysyms_per_keycode) + usize::from(index);
        self.keysyms.get(idx).copied().unwrap_or(0)
    }
}

pub struct X11Server {
    conn: RustConnection,
    screens: Vec<ScreenInfo>,
    keymap: KeyboardMap,
    poll: mio::Poll,
    events: mio::Events,
    shutdown: ShutdownSignal,
}

impl X11Server {
    /// Connect to `display` (or `$DISPLAY`) and check the server is usable.
    pub fn connect(display: Option<&str>, shutdown: ShutdownSignal) -> Result<Self, WmError> {
        let (conn, default_screen) = RustConnection::connect(display)?;

        let setup = conn.setup();
        if setup.protocol_major_version != REQUIRED_PROTOCOL_MAJOR {
            return Err(WmError::UnsupportedProtocol {
                found: setup.protocol_major_version,
                required: REQUIRED_PROTOCOL_MAJOR,
            });
        }

        let screens: Vec<ScreenInfo> = setup
            .roots
            .iter()
            .enumerate()
            .map(|(id, screen)| ScreenInfo {
                id,
                root: screen.root,
                root_depth: screen.root_depth,
                white_pixel: screen.white_pixel,
            })
            .collect();
        info!(
            "Connected to X server, {} screen(s), default screen {}",
            screens.len(),
            default_screen
        );

        let keymap = KeyboardMap::fetch(&conn)?;

        let poll = mio::Poll::new().map_err(ConnectError::IoError)?;
        let fd = conn.stream().as_raw_fd();
        poll.registry()
            .register(&mut mio::unix::SourceFd(&fd), X11_TOKEN, mio::Interest::READABLE)
            .map_err(ConnectError::IoError)?;

        Ok(Self {
            conn,
            screens,
            keymap,
            poll,
            events: mio::Events::with_capacity(1),
            shutdown,
        })
    }
}

impl DisplayServer for X11Server {
    fn screens(&self) -> Vec<ScreenInfo> {
        self.screens.clone()
    }

    fn next_event(&mut self) -> Result<Option<WmEvent>, WmError> {
        loop {
            if let Some(event) = self.conn.poll_for_event()? {
                return Ok(Some(event.into()));
            }
            if self.shutdown.is_pending() {
                return Ok(None);
            }

            self.conn.flush()?;
            match self.poll.poll(&mut self.events, Some(WAIT_TIMEOUT)) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(ConnectionError::IoError(e).into()),
            }
        }
    }

    fn poll_event(&mut self) -> Result<Option<WmEvent>, WmError> {
        Ok(self.conn.poll_for_event()?.map(WmEvent::from))
    }

    fn select_substructure_redirect(&self, root: Window) -> Result<(), WmError> {
        // Checked request: waits for the server and reports BadAccess here
        self.conn
            .change_window_attributes(
                root,
                &ChangeWindowAttributesAux::new().event_mask(EventMask::SUBSTRUCTURE_REDIRECT),
            )?
            .check()?;
        Ok(())
    }

    fn grab_key(&self, root: Window, modifiers: u16, keycode: Keycode) -> Result<(), WmError> {
        self.conn.grab_key(
            true,
            root,
            ModMask::from(modifiers),
            keycode,
            GrabMode::ASYNC,
            GrabMode::ASYNC,
        )?;
        Ok(())
    }

    fn ungrab_keys(&self, root: Window, modifiers: u16) -> Result<(), WmError> {
        self.conn.ungrab_key(Grab::ANY, root, ModMask::from(modifiers))?;
        Ok(())
    }

    fn grab_button(&self, window: Window, button: u8, modifiers: u16, mask: EventMask) -> Result<(), WmError> {
        self.conn.grab_button(
            true,
            window,
            mask,
            GrabMode::ASYNC,
            GrabMode::ASYNC,
            x11rb::NONE,
            x11rb::NONE,
            ButtonIndex::from(button),
            ModMask::from(modifiers),
        )?;
        Ok(())
    }

    fn window_attributes(&self, window: Window) -> Result<WindowAttributes, WmError> {
        let reply = self.conn.get_window_attributes(window)?.reply()?;
        Ok(WindowAttributes {
            override_redirect: reply.override_redirect,
            viewable: reply.map_state == MapState::VIEWABLE,
        })
    }

    fn geometry(&self, window: Window) -> Result<Geometry, WmError> {
        let reply = self.conn.get_geometry(window)?.reply()?;
        Ok(Geometry::new(
            reply.x.into(),
            reply.y.into(),
            reply.width.into(),
            reply.height.into(),
        ))
    }

    fn children(&self, window: Window) -> Result<Vec<Window>, WmError> {
        Ok(self.conn.query_tree(window)?.reply()?.children)
    }

    fn create_frame(&self, screen: &ScreenInfo, geometry: Geometry, style: FrameStyle) -> Result<Window, WmError> {
        let frame = self.conn.generate_id()?;
        let border_pixel = style.border_pixel.unwrap_or(screen.white_pixel);
        self.conn.create_window(
            screen.root_depth,
            frame,
            screen.root,
            geometry.x as i16,
            geometry.y as i16,
            geometry.width as u16,
            geometry.height as u16,
            style.border_width,
            WindowClass::INPUT_OUTPUT,
            x11rb::COPY_FROM_PARENT,
            &CreateWindowAux::new()
                .border_pixel(border_pixel)
                .event_mask(EventMask::SUBSTRUCTURE_REDIRECT | EventMask::SUBSTRUCTURE_NOTIFY),
        )?;
        Ok(frame)
    }

    fn reparent(&self, window: Window, parent: Window, x: i16, y: i16) -> Result<(), WmError> {
        self.conn.reparent_window(window, parent, x, y)?;
        Ok(())
    }

    fn map(&self, window: Window) -> Result<(), WmError> {
        self.conn.map_window(window)?;
        Ok(())
    }

    fn unmap(&self, window: Window) -> Result<(), WmError> {
        self.conn.unmap_window(window)?;
        Ok(())
    }

    fn destroy(&self, window: Window) -> Result<(), WmError> {
        self.conn.destroy_window(window)?;
        Ok(())
    }

    fn configure(&self, window: Window, changes: &ConfigureWindowAux) -> Result<(), WmError> {
        self.conn.configure_window(window, changes)?;
        Ok(())
    }

    fn keycodes_for(&self, keysym: Keysym) -> Vec<Keycode> {
        self.keymap.keycodes_for(keysym)
    }

    fn keysym_at(&self, keycode: Keycode, index: u8) -> Keysym {
        self.keymap.keysym_at(keycode, index)
    }

    fn refresh_keyboard_mapping(&mut self) -> Result<(), WmError> {
        self.keymap = KeyboardMap::fetch(&self.conn)?;
        Ok(())
    }

    fn window_class(&self, window: Window) -> Option<String> {
        let reply = self
            .conn
            .get_property(false, window, AtomEnum::WM_CLASS, AtomEnum::STRING, 0, 1024)
            .ok()?
            .reply()
            .ok()?;
        // WM_CLASS is instance\0class\0; report the class
        let mut parts = reply.value.split(|&b| b == 0).filter(|part| !part.is_empty());
        let instance = parts.next()?;
        let class = parts.next().unwrap_or(instance);
        Some(String::from_utf8_lossy(class).into_owned())
    }

    fn window_name(&self, window: Window) -> Option<String> {
        let reply = self
            .conn
            .get_property(false, window, AtomEnum::WM_NAME, AtomEnum::STRING, 0, 1024)
            .ok()?
            .reply()
            .ok()?;
        if reply.value.is_empty() {
            return None;
        }
        Some(String::from_utf8_lossy(&reply.value).into_owned())
    }

    fn flush(&self) -> Result<(), WmError> {
        self.conn.flush()?;
        Ok(())
    }
}
