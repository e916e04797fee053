//! Window Manager Module
//!
//! The engine: screen acquisition at startup, the frame registry, drag and
//! raise, key routing and the fault tolerant event loop that ties them
//! together.
//!
//! The loop runs `Running -> Draining -> Stopped`. A quit key or SIGINT
//! releases every window and then dispatches whatever is still queued
//! without blocking. SIGTERM releases every window and stops at once.
//! Handler failures are counted; the loop survives up to `MAX_FAULTS` of
//! them and gives up on the next one after a last release-all.

pub mod client;
pub mod display;
pub mod events;
pub mod keyboard;
pub mod moveresize;
pub mod registry;
pub mod screen;
pub mod settings;
pub mod x11;

#[cfg(test)]
pub mod testing;

use tracing::{debug, error, info, trace, warn};
use x11rb::protocol::xproto::{ConfigureWindowAux, Window};

use crate::error::{ErrorBudget, WmError};
use crate::launcher::Launcher;
use crate::shared::Geometry;
use crate::signals::{ShutdownRequest, ShutdownSignal};
use crate::wm::display::{DisplayServer, FrameStyle};
use crate::wm::events::WmEvent;
use crate::wm::keyboard::{keysym_name, Action, KeyBindingSet, DIAGNOSTIC_KEYSYM_INDEX};
use crate::wm::moveresize::DragState;
use crate::wm::registry::{CaptureAllOutcome, CaptureOutcome, FrameRegistry};
use crate::wm::screen::{acquire_screens, regrab_keys, Screen};
use crate::wm::settings::WindowManagerSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Draining,
    Stopped,
}

/// How a loop that did not fail came to an end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Quit key or SIGINT, after draining the queue
    Quit,
    /// SIGTERM, after releasing every window
    Terminated,
}

pub struct WindowManager<D: DisplayServer, L: Launcher> {
    display: D,
    launcher: L,

    /// Screens whose redirect we hold
    screens: Vec<Screen>,

    registry: FrameRegistry,
    drag: DragState,
    bindings: KeyBindingSet,
    errors: ErrorBudget,
    state: LoopState,
    shutdown: ShutdownSignal,

    style: FrameStyle,
    terminal: Vec<String>,
}

impl<D: DisplayServer, L: Launcher> WindowManager<D, L> {
    /// Acquire every screen we can and frame the windows already there.
    ///
    /// Fails with `NoUnmanagedScreens` when another manager owns every screen.
    pub fn new(
        display: D,
        launcher: L,
        settings: WindowManagerSettings,
        shutdown: ShutdownSignal,
    ) -> Result<Self, WmError> {
        let bindings = KeyBindingSet::builtin(&display);
        let screens = acquire_screens(&display, &bindings)?;
        info!("Managing {} screen(s)", screens.len());

        let mut wm = Self {
            display,
            launcher,
            screens,
            registry: FrameRegistry::new(),
            drag: DragState::new(),
            bindings,
            errors: ErrorBudget::default(),
            state: LoopState::Running,
            shutdown,
            style: settings.style,
            terminal: settings.terminal,
        };

        match wm.registry.capture_all(&wm.display, &wm.screens, wm.style) {
            Ok(CaptureAllOutcome::Captured(count)) => info!("Captured {} existing window(s)", count),
            Ok(CaptureAllOutcome::AlreadyCaptured) => {}
            // Frames made on earlier screens must not outlive us
            Err(e) => return Err(wm.abort(e)),
        }
        wm.display.flush()?;
        Ok(wm)
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    pub fn registry(&self) -> &FrameRegistry {
        &self.registry
    }

    pub fn errors(&self) -> &ErrorBudget {
        &self.errors
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Run the event loop until it stops or fails.
    ///
    /// Every failure except a closed connection is preceded by a release of
    /// all windows.
    pub fn run(&mut self) -> Result<Outcome, WmError> {
        info!("Starting main event loop");
        loop {
            match self.state {
                LoopState::Running => {
                    match self.shutdown.take() {
                        Some(ShutdownRequest::Interrupt) => {
                            info!("Interrupted, shutting down");
                            self.begin_drain();
                            continue;
                        }
                        Some(ShutdownRequest::Terminate) => {
                            info!("Terminated, releasing all windows");
                            self.release_all();
                            self.state = LoopState::Stopped;
                            self.display.flush()?;
                            return Ok(Outcome::Terminated);
                        }
                        None => {}
                    }

                    match self.display.next_event() {
                        Ok(Some(event)) => self.dispatch(event)?,
                        Ok(None) => {}
                        Err(e) => return Err(self.abort(e)),
                    }
                }
                LoopState::Draining => match self.display.poll_event() {
                    Ok(Some(event)) => self.dispatch(event)?,
                    Ok(None) => {
                        debug!("Event queue drained");
                        self.state = LoopState::Stopped;
                    }
                    Err(e) => return Err(self.abort(e)),
                },
                LoopState::Stopped => {
                    self.display.flush()?;
                    info!("Exiting main loop");
                    return Ok(Outcome::Quit);
                }
            }
        }
    }

    /// Handle one event and classify whatever went wrong.
    fn dispatch(&mut self, event: WmEvent) -> Result<(), WmError> {
        let name = event.name();
        match self.handle_event(event) {
            Ok(()) => Ok(()),
            Err(e) if e.is_fatal() => Err(self.abort(e)),
            Err(e) => self.fault(name, e),
        }
    }

    /// Count a transient fault. Past the budget, clean up and give up.
    fn fault(&mut self, event: &str, e: WmError) -> Result<(), WmError> {
        if self.errors.record() {
            error!(
                "Error handling {} ({}/{}): {}",
                event,
                self.errors.count(),
                self.errors.threshold(),
                e
            );
            return Ok(());
        }

        error!("Error handling {}: {}", event, e);
        error!("Too many errors ({}), releasing all windows", self.errors.count());
        Err(self.abort(WmError::ErrorBudgetExhausted(self.errors.count())))
    }

    /// Last-chance cleanup before a fatal error leaves the loop.
    fn abort(&mut self, e: WmError) -> WmError {
        self.state = LoopState::Stopped;
        if matches!(e, WmError::ConnectionClosed) {
            error!("Connection to the X server closed");
            return e;
        }
        self.release_all();
        if let Err(flush_err) = self.display.flush() {
            warn!("Flush after emergency release failed: {}", flush_err);
        }
        e
    }

    fn handle_event(&mut self, event: WmEvent) -> Result<(), WmError> {
        match event {
            WmEvent::ConfigureRequest { window, changes } => self.on_configure_request(window, changes),
            WmEvent::MapRequest { parent, window } => self.on_map_request(parent, window),
            WmEvent::UnmapNotify { event, window } => self.on_unmap_notify(event, window),
            WmEvent::MappingNotify => self.on_mapping_notify(),
            WmEvent::MotionNotify(pointer) => self.drag.on_motion(&self.display, &mut self.registry, &pointer),
            WmEvent::ButtonPress(pointer) => self.drag.on_press(&self.display, &pointer),
            WmEvent::ButtonRelease(_) => {
                self.drag.on_release();
                Ok(())
            }
            WmEvent::KeyPress(key) => match self.bindings.route(&key) {
                Some(action) => self.perform(action),
                None => {
                    let keysym = self.display.keysym_at(key.keycode, DIAGNOSTIC_KEYSYM_INDEX);
                    info!(
                        "Key pressed but not handled: keycode {} ({}), state {:#x}",
                        key.keycode,
                        keysym_name(keysym),
                        key.state
                    );
                    Ok(())
                }
            },
            WmEvent::ProtocolError(detail) => {
                warn!("X error: {}", detail);
                Ok(())
            }
            WmEvent::Unhandled(kind) => {
                debug!("Unhandled event: {}", kind);
                Ok(())
            }
            ignored @ (WmEvent::CreateNotify { .. }
            | WmEvent::DestroyNotify { .. }
            | WmEvent::ConfigureNotify { .. }
            | WmEvent::MapNotify { .. }
            | WmEvent::ReparentNotify { .. }
            | WmEvent::ClientMessage { .. }
            | WmEvent::KeyRelease(_)) => {
                trace!("{:?}", ignored);
                Ok(())
            }
        }
    }

    fn perform(&mut self, action: Action) -> Result<(), WmError> {
        if action == Action::Quit {
            self.begin_drain();
            return Ok(());
        }
        if self.state != LoopState::Running {
            debug!("Ignoring {:?} while shutting down", action);
            return Ok(());
        }

        match action {
            Action::SpawnTerminal => self.launcher.launch(&self.terminal),
            Action::CaptureAll => {
                match self.registry.capture_all(&self.display, &self.screens, self.style)? {
                    CaptureAllOutcome::Captured(count) => info!("Captured {} window(s)", count),
                    CaptureAllOutcome::AlreadyCaptured => {}
                }
                Ok(())
            }
            Action::ReleaseAll => {
                self.release_all();
                Ok(())
            }
            Action::Quit => Ok(()),
        }
    }

    /// Running -> Draining, releasing every window on the way. Later calls
    /// do nothing.
    fn begin_drain(&mut self) {
        if self.state != LoopState::Running {
            debug!("Quit already in progress");
            return;
        }
        info!("Quitting");
        self.release_all();
        self.state = LoopState::Draining;
    }

    fn release_all(&mut self) {
        self.drag.on_release();
        let released = self.registry.release_all(&self.display, &self.screens);
        info!("Released {} window(s)", released);
    }

    fn screen_for_root(&self, root: Window) -> Option<Screen> {
        self.screens
            .iter()
            .find(|screen| screen.root() == root)
            .or_else(|| self.screens.first())
            .copied()
    }

    fn on_map_request(&mut self, parent: Window, window: Window) -> Result<(), WmError> {
        self.display.map(window)?;
        if self.registry.contains_frame(parent) {
            debug!("Window {:#x} mapped inside frame {:#x}", window, parent);
            return Ok(());
        }
        if self.state != LoopState::Running {
            debug!("Window {:#x} mapped without a frame while shutting down", window);
            return Ok(());
        }

        let Some(screen) = self.screen_for_root(parent) else {
            return Ok(());
        };
        if let CaptureOutcome::Skipped(reason) =
            self.registry.capture_window(&self.display, &screen, window, self.style)?
        {
            debug!("Window {:#x} not captured: {:?}", window, reason);
        }
        Ok(())
    }

    /// Clients configure themselves freely. A managed client stays at the
    /// frame origin: its position and stacking are applied to the frame, its
    /// size to both.
    fn on_configure_request(&mut self, window: Window, changes: ConfigureWindowAux) -> Result<(), WmError> {
        let Some(frame) = self.registry.frame_of(window) else {
            return self.display.configure(window, &changes);
        };
        let Some(current) = self.registry.get(frame).map(|managed| managed.geometry) else {
            return Ok(());
        };

        let inside_frame = ConfigureWindowAux {
            x: None,
            y: None,
            sibling: None,
            stack_mode: None,
            ..changes
        };
        self.display.configure(window, &inside_frame)?;

        // A sibling client is stacked through its frame
        let frame_changes = ConfigureWindowAux {
            x: changes.x,
            y: changes.y,
            width: changes.width,
            height: changes.height,
            border_width: None,
            sibling: changes
                .sibling
                .map(|sibling| self.registry.frame_of(sibling).unwrap_or(sibling)),
            stack_mode: changes.stack_mode,
        };
        if frame_changes == ConfigureWindowAux::new() {
            return Ok(());
        }
        self.display.configure(frame, &frame_changes)?;

        let geometry = Geometry {
            x: changes.x.unwrap_or(current.x),
            y: changes.y.unwrap_or(current.y),
            width: changes.width.unwrap_or(current.width),
            height: changes.height.unwrap_or(current.height),
        };
        self.registry.record_position(frame, geometry.x, geometry.y);
        self.registry.record_size(frame, geometry.width, geometry.height);
        debug!(
            "Frame {:#x} configured to {}x{}+{}+{}",
            frame, geometry.width, geometry.height, geometry.x, geometry.y
        );
        Ok(())
    }

    /// A client that unmaps itself inside its frame is released.
    fn on_unmap_notify(&mut self, event: Window, window: Window) -> Result<(), WmError> {
        let Some(frame) = self.registry.frame_of(window) else {
            debug!("Unmap of unmanaged window {:#x}", window);
            return Ok(());
        };
        if frame != event {
            return Ok(());
        }
        let Some(screen) = self
            .registry
            .get(frame)
            .and_then(|managed| self.screens.iter().find(|s| s.id() == managed.screen))
            .copied()
        else {
            return Ok(());
        };
        if self.drag.window() == Some(frame) {
            self.drag.on_release();
        }
        self.registry.release_window(&self.display, &screen, frame)
    }

    fn on_mapping_notify(&mut self) -> Result<(), WmError> {
        self.display.refresh_keyboard_mapping()?;
        self.bindings.resolve(&self.display);
        for screen in &self.screens {
            regrab_keys(&self.display, screen, &self.bindings)?;
        }
        info!("Keyboard mapping changed, key grabs refreshed");
        Ok(())
    }
}
