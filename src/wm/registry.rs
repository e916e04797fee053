//! Frame Registry
//!
//! Creates and destroys frames and keeps the frame → client mapping. The
//! mapping is keyed by frame: every key is a frame window we created and
//! have not yet destroyed, and every entry's `frame` field equals its key.

use std::collections::HashMap;

use tracing::{debug, info, warn};
use x11rb::protocol::xproto::{EventMask, Window};

use crate::error::WmError;
use crate::shared::window_state::{ClientInfo, Geometry};
use crate::wm::client::ManagedWindow;
use crate::wm::display::{DisplayServer, FrameStyle};
use crate::wm::screen::Screen;

/// Pointer button used for drag and raise
pub const DRAG_BUTTON: u8 = 3;

/// Why a window was left alone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    OverrideRedirect,
    NotViewable,
    AlreadyManaged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    Captured { frame: Window },
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureAllOutcome {
    /// The registry was non-empty; nothing was done.
    AlreadyCaptured,
    Captured(usize),
}

#[derive(Debug, Default)]
pub struct FrameRegistry {
    frames: HashMap<Window, ManagedWindow>,
}

impl FrameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn contains_frame(&self, frame: Window) -> bool {
        self.frames.contains_key(&frame)
    }

    pub fn get(&self, frame: Window) -> Option<&ManagedWindow> {
        self.frames.get(&frame)
    }

    /// Frame currently wrapping `client`.
    pub fn frame_of(&self, client: Window) -> Option<Window> {
        self.frames
            .values()
            .find(|managed| managed.client == client)
            .map(|managed| managed.frame)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ManagedWindow> {
        self.frames.values()
    }

    fn insert(&mut self, managed: ManagedWindow) {
        debug_assert!(self.frame_of(managed.client).is_none());
        self.frames.insert(managed.frame, managed);
    }

    /// Wrap `window` in a new frame on `screen`.
    ///
    /// Override-redirect and unviewable windows are left unmanaged; that is
    /// not an error.
    pub fn capture_window<D: DisplayServer + ?Sized>(
        &mut self,
        display: &D,
        screen: &Screen,
        window: Window,
        style: FrameStyle,
    ) -> Result<CaptureOutcome, WmError> {
        if self.contains_frame(window) || self.frame_of(window).is_some() {
            debug!("Window {:#x} is already managed", window);
            return Ok(CaptureOutcome::Skipped(SkipReason::AlreadyManaged));
        }

        let info = ClientInfo {
            class: display.window_class(window),
            name: display.window_name(window),
        };

        let attrs = display.window_attributes(window)?;
        if attrs.override_redirect {
            info!("Capturing window {:#x} {}... override-redirect, left alone", window, info);
            return Ok(CaptureOutcome::Skipped(SkipReason::OverrideRedirect));
        }
        if !attrs.viewable {
            info!("Capturing window {:#x} {}... not viewable", window, info);
            return Ok(CaptureOutcome::Skipped(SkipReason::NotViewable));
        }

        let geometry = display.geometry(window)?;
        let frame = display.create_frame(&screen.info, geometry, style)?;

        display.reparent(window, frame, 0, 0)?;
        self.insert(ManagedWindow {
            client: window,
            frame,
            screen: screen.id(),
            geometry,
            info: info.clone(),
        });

        // Reparenting unmaps a mapped window, so the frame is mapped last
        display.map(frame)?;
        display.grab_button(
            frame,
            DRAG_BUTTON,
            0,
            EventMask::BUTTON_PRESS | EventMask::BUTTON_MOTION | EventMask::BUTTON_RELEASE,
        )?;

        info!(
            "Captured window {:#x} {} into frame {:#x} at {}x{}+{}+{}",
            window, info, frame, geometry.width, geometry.height, geometry.x, geometry.y
        );
        Ok(CaptureOutcome::Captured { frame })
    }

    /// Capture every top-level window of every managed screen.
    ///
    /// Does nothing while any capture exists, so frames are never framed.
    pub fn capture_all<D: DisplayServer + ?Sized>(
        &mut self,
        display: &D,
        screens: &[Screen],
        style: FrameStyle,
    ) -> Result<CaptureAllOutcome, WmError> {
        if !self.is_empty() {
            info!("There are captive windows already ({})", self.len());
            return Ok(CaptureAllOutcome::AlreadyCaptured);
        }

        let mut captured = 0;
        for screen in screens {
            for window in display.children(screen.root())? {
                match self.capture_window(display, screen, window, style) {
                    Ok(CaptureOutcome::Captured { .. }) => captured += 1,
                    Ok(CaptureOutcome::Skipped(_)) => {}
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => warn!("Failed to capture window {:#x}: {}", window, e),
                }
            }
        }
        Ok(CaptureAllOutcome::Captured(captured))
    }

    /// Put the client of `frame` back on the root at the frame's position and
    /// destroy the frame.
    pub fn release_window<D: DisplayServer + ?Sized>(
        &mut self,
        display: &D,
        screen: &Screen,
        frame: Window,
    ) -> Result<(), WmError> {
        let managed = self.frames.get(&frame).ok_or(WmError::UnknownFrame(frame))?;
        let client = managed.client;

        let geometry = match display.geometry(frame) {
            Ok(geometry) => geometry,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!("Frame {:#x} geometry unavailable ({}), using last known", frame, e);
                managed.geometry
            }
        };

        display.reparent(client, screen.root(), geometry.x as i16, geometry.y as i16)?;
        display.unmap(frame)?;
        display.destroy(frame)?;
        let info = self.frames.remove(&frame).map(|managed| managed.info).unwrap_or_default();

        info!(
            "Released window {:#x} {} from frame {:#x} to {}+{}",
            client, info, frame, geometry.x, geometry.y
        );
        Ok(())
    }

    /// Release every frame found among the screens' root children.
    ///
    /// Best effort: a failure on one window is logged and the rest are still
    /// released. Returns how many frames were released.
    pub fn release_all<D: DisplayServer + ?Sized>(&mut self, display: &D, screens: &[Screen]) -> usize {
        info!("Releasing all windows...");
        let mut released = 0;
        for screen in screens {
            let children = match display.children(screen.root()) {
                Ok(children) => children,
                Err(e) => {
                    warn!("Screen {}: can't list root children: {}", screen.id(), e);
                    continue;
                }
            };

            for window in children {
                if !self.contains_frame(window) {
                    debug!("Screen {}: {:#x} is not a frame", screen.id(), window);
                    continue;
                }
                match self.release_window(display, screen, window) {
                    Ok(()) => released += 1,
                    Err(e) => warn!("Failed to release frame {:#x}: {}", window, e),
                }
            }
        }

        if !self.is_empty() {
            warn!("{} frames could not be released", self.len());
        }
        released
    }

    /// Record a new position for a frame after it was moved.
    pub fn record_position(&mut self, frame: Window, x: i32, y: i32) {
        if let Some(managed) = self.frames.get_mut(&frame) {
            managed.geometry = managed.geometry.moved_to(x, y);
        }
    }

    /// Record a new size for a frame after its client was resized.
    pub fn record_size(&mut self, frame: Window, width: u32, height: u32) {
        if let Some(managed) = self.frames.get_mut(&frame) {
            managed.geometry = Geometry {
                width,
                height,
                ..managed.geometry
            };
        }
    }
}
