//! In-memory display server for tests
//!
//! Models just enough of the X server for the engine: a window tree with
//! stacking order, map state and viewability, override-redirect, redirect
//! ownership per root, passive grabs and a keyboard map.
//!
//! Errors follow the server: a request with a reply on a missing window fails
//! at once, a void request on one succeeds and queues a `ProtocolError`
//! event. When the event queue runs dry the fake reports the connection as
//! closed, which ends any loop that is still waiting. Clones share state, so
//! a test can keep a handle on a fake it handed to the engine.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

use x11rb::protocol::xproto::{ConfigureWindowAux, EventMask, Keycode, Keysym, StackMode, Window};

use crate::error::WmError;
use crate::launcher::Launcher;
use crate::shared::Geometry;
use crate::wm::display::{DisplayServer, FrameStyle, ScreenInfo, WindowAttributes};
use crate::wm::events::WmEvent;
use crate::wm::keyboard::{XK_C, XK_Q, XK_R, XK_RETURN};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeRequest {
    CreateFrame(Window),
    Reparent { window: Window, parent: Window, x: i16, y: i16 },
    Map(Window),
    Unmap(Window),
    Destroy(Window),
    Configure(Window),
    GrabKey { root: Window, modifiers: u16, keycode: Keycode },
    GrabButton { window: Window, button: u8 },
}

#[derive(Debug, Clone)]
struct FakeWindow {
    parent: Option<Window>,
    geometry: Geometry,
    border_width: u16,
    mapped: bool,
    override_redirect: bool,
    class: Option<String>,
}

#[derive(Debug, Default)]
struct FakeState {
    next_id: Window,
    screens: Vec<ScreenInfo>,
    windows: HashMap<Window, FakeWindow>,
    /// Children per parent, bottom of the stack first
    stacking: HashMap<Window, Vec<Window>>,
    redirect_owned: HashSet<Window>,
    key_grabs: Vec<(Window, u16, Keycode)>,
    button_grabs: Vec<(Window, u8)>,
    keymap: HashMap<Keysym, Vec<Keycode>>,
    events: VecDeque<WmEvent>,
    requests: Vec<FakeRequest>,
    keymap_refreshes: usize,
    query_trees: HashMap<Window, usize>,
    failing_query_trees: HashSet<Window>,
}

#[derive(Debug, Clone)]
pub struct FakeServer {
    state: Rc<RefCell<FakeState>>,
}

fn bad_window(window: Window) -> WmError {
    WmError::Protocol(format!("Window in request (bad value {window:#x})"))
}

/// A void request on a missing window: the error shows up later as an event.
fn queue_bad_window(state: &mut FakeState, request: &str, window: Window) -> Result<(), WmError> {
    state.events.push_back(WmEvent::ProtocolError(format!(
        "Window in request {request} (bad value {window:#x})"
    )));
    Ok(())
}

impl FakeServer {
    pub const KEY_RETURN: Keycode = 36;
    pub const KEY_Q: Keycode = 24;
    pub const KEY_C: Keycode = 54;
    pub const KEY_R: Keycode = 27;

    pub fn new(screens: usize) -> Self {
        let mut state = FakeState {
            next_id: 0x0040_0000,
            ..FakeState::default()
        };
        for id in 0..screens {
            let root = 0x100 * (id as Window + 1);
            state.screens.push(ScreenInfo {
                id,
                root,
                root_depth: 24,
                white_pixel: 0xffffff,
            });
            state.windows.insert(
                root,
                FakeWindow {
                    parent: None,
                    geometry: Geometry::new(0, 0, 1920, 1080),
                    border_width: 0,
                    mapped: true,
                    override_redirect: false,
                    class: None,
                },
            );
            state.stacking.insert(root, Vec::new());
        }
        state.keymap.insert(XK_RETURN, vec![Self::KEY_RETURN]);
        state.keymap.insert(XK_Q, vec![Self::KEY_Q]);
        state.keymap.insert(XK_C, vec![Self::KEY_C]);
        state.keymap.insert(XK_R, vec![Self::KEY_R]);
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    pub fn roots(&self) -> Vec<Window> {
        self.state.borrow().screens.iter().map(|s| s.root).collect()
    }

    /// Pretend another manager holds the redirect on `root`.
    pub fn set_redirect_owned(&self, root: Window) {
        self.state.borrow_mut().redirect_owned.insert(root);
    }

    pub fn add_keycode(&self, keysym: Keysym, keycode: Keycode) {
        self.state.borrow_mut().keymap.entry(keysym).or_default().push(keycode);
    }

    /// Move `keysym` to a different key, as a layout change would.
    pub fn remap(&self, keysym: Keysym, keycode: Keycode) {
        self.state.borrow_mut().keymap.insert(keysym, vec![keycode]);
    }

    /// Add a mapped, managed-looking top level window.
    pub fn add_client(&self, parent: Window, geometry: Geometry) -> Window {
        let window = self.add_window(parent, geometry, true, false);
        self.state.borrow_mut().windows.get_mut(&window).unwrap().class = Some("XTerm".into());
        window
    }

    pub fn add_window(&self, parent: Window, geometry: Geometry, mapped: bool, override_redirect: bool) -> Window {
        let mut state = self.state.borrow_mut();
        let window = state.next_id;
        state.next_id += 1;
        state.windows.insert(
            window,
            FakeWindow {
                parent: Some(parent),
                geometry,
                border_width: 0,
                mapped,
                override_redirect,
                class: None,
            },
        );
        state.stacking.entry(parent).or_default().push(window);
        state.stacking.insert(window, Vec::new());
        window
    }

    pub fn push_event(&self, event: WmEvent) {
        self.state.borrow_mut().events.push_back(event);
    }

    pub fn pending_events(&self) -> usize {
        self.state.borrow().events.len()
    }

    pub fn exists(&self, window: Window) -> bool {
        self.state.borrow().windows.contains_key(&window)
    }

    pub fn parent_of(&self, window: Window) -> Option<Window> {
        self.state.borrow().windows.get(&window).and_then(|w| w.parent)
    }

    pub fn geometry_of(&self, window: Window) -> Geometry {
        self.state.borrow().windows[&window].geometry
    }

    pub fn border_width_of(&self, window: Window) -> u16 {
        self.state.borrow().windows[&window].border_width
    }

    pub fn is_mapped(&self, window: Window) -> bool {
        self.state.borrow().windows.get(&window).is_some_and(|w| w.mapped)
    }

    pub fn stacking(&self, parent: Window) -> Vec<Window> {
        self.state.borrow().stacking.get(&parent).cloned().unwrap_or_default()
    }

    pub fn key_grabs_on(&self, root: Window) -> Vec<(u16, Keycode)> {
        self.state
            .borrow()
            .key_grabs
            .iter()
            .filter(|(r, _, _)| *r == root)
            .map(|&(_, modifiers, keycode)| (modifiers, keycode))
            .collect()
    }

    pub fn button_grabs_on(&self, window: Window) -> Vec<u8> {
        self.state
            .borrow()
            .button_grabs
            .iter()
            .filter(|(w, _)| *w == window)
            .map(|&(_, button)| button)
            .collect()
    }

    pub fn requests(&self) -> Vec<FakeRequest> {
        self.state.borrow().requests.clone()
    }

    pub fn keymap_refreshes(&self) -> usize {
        self.state.borrow().keymap_refreshes
    }

    /// How many times the children of `window` were listed.
    pub fn query_trees(&self, window: Window) -> usize {
        self.state.borrow().query_trees.get(&window).copied().unwrap_or(0)
    }

    /// Make listing the children of `window` fail from now on.
    pub fn fail_query_tree(&self, window: Window) {
        self.state.borrow_mut().failing_query_trees.insert(window);
    }

    fn viewable(state: &FakeState, window: Window) -> bool {
        let mut current = Some(window);
        while let Some(id) = current {
            match state.windows.get(&id) {
                Some(w) if w.mapped => current = w.parent,
                _ => return false,
            }
        }
        true
    }

    fn detach(state: &mut FakeState, window: Window) {
        if let Some(parent) = state.windows.get(&window).and_then(|w| w.parent) {
            if let Some(siblings) = state.stacking.get_mut(&parent) {
                siblings.retain(|&w| w != window);
            }
        }
    }
}

impl DisplayServer for FakeServer {
    fn screens(&self) -> Vec<ScreenInfo> {
        self.state.borrow().screens.clone()
    }

    fn next_event(&mut self) -> Result<Option<WmEvent>, WmError> {
        self.state
            .borrow_mut()
            .events
            .pop_front()
            .map(Some)
            .ok_or(WmError::ConnectionClosed)
    }

    fn poll_event(&mut self) -> Result<Option<WmEvent>, WmError> {
        Ok(self.state.borrow_mut().events.pop_front())
    }

    fn select_substructure_redirect(&self, root: Window) -> Result<(), WmError> {
        if self.state.borrow().redirect_owned.contains(&root) {
            return Err(WmError::AccessDenied(format!(
                "Access in request ChangeWindowAttributes (bad value {root:#x})"
            )));
        }
        Ok(())
    }

    fn grab_key(&self, root: Window, modifiers: u16, keycode: Keycode) -> Result<(), WmError> {
        let mut state = self.state.borrow_mut();
        state.key_grabs.push((root, modifiers, keycode));
        state.requests.push(FakeRequest::GrabKey {
            root,
            modifiers,
            keycode,
        });
        Ok(())
    }

    fn ungrab_keys(&self, root: Window, modifiers: u16) -> Result<(), WmError> {
        self.state
            .borrow_mut()
            .key_grabs
            .retain(|&(r, m, _)| r != root || m != modifiers);
        Ok(())
    }

    fn grab_button(&self, window: Window, button: u8, _modifiers: u16, _mask: EventMask) -> Result<(), WmError> {
        let mut state = self.state.borrow_mut();
        state.button_grabs.push((window, button));
        state.requests.push(FakeRequest::GrabButton { window, button });
        Ok(())
    }

    fn window_attributes(&self, window: Window) -> Result<WindowAttributes, WmError> {
        let state = self.state.borrow();
        let w = state.windows.get(&window).ok_or_else(|| bad_window(window))?;
        Ok(WindowAttributes {
            override_redirect: w.override_redirect,
            viewable: Self::viewable(&state, window),
        })
    }

    fn geometry(&self, window: Window) -> Result<Geometry, WmError> {
        let state = self.state.borrow();
        state
            .windows
            .get(&window)
            .map(|w| w.geometry)
            .ok_or_else(|| bad_window(window))
    }

    fn children(&self, window: Window) -> Result<Vec<Window>, WmError> {
        let mut state = self.state.borrow_mut();
        *state.query_trees.entry(window).or_default() += 1;
        if !state.windows.contains_key(&window) || state.failing_query_trees.contains(&window) {
            return Err(bad_window(window));
        }
        Ok(state.stacking.get(&window).cloned().unwrap_or_default())
    }

    fn create_frame(&self, screen: &ScreenInfo, geometry: Geometry, style: FrameStyle) -> Result<Window, WmError> {
        let frame = self.add_window(screen.root, geometry, false, false);
        let mut state = self.state.borrow_mut();
        state.windows.get_mut(&frame).unwrap().border_width = style.border_width;
        state.requests.push(FakeRequest::CreateFrame(frame));
        Ok(frame)
    }

    fn reparent(&self, window: Window, parent: Window, x: i16, y: i16) -> Result<(), WmError> {
        let mut state = self.state.borrow_mut();
        if !state.windows.contains_key(&window) {
            return queue_bad_window(&mut state, "ReparentWindow", window);
        }
        if !state.windows.contains_key(&parent) {
            return queue_bad_window(&mut state, "ReparentWindow", parent);
        }
        Self::detach(&mut state, window);
        let w = state.windows.get_mut(&window).unwrap();
        w.parent = Some(parent);
        w.geometry = w.geometry.moved_to(x.into(), y.into());
        state.stacking.entry(parent).or_default().push(window);
        state.requests.push(FakeRequest::Reparent { window, parent, x, y });
        Ok(())
    }

    fn map(&self, window: Window) -> Result<(), WmError> {
        let mut state = self.state.borrow_mut();
        if !state.windows.contains_key(&window) {
            return queue_bad_window(&mut state, "MapWindow", window);
        }
        state.windows.get_mut(&window).unwrap().mapped = true;
        state.requests.push(FakeRequest::Map(window));
        Ok(())
    }

    fn unmap(&self, window: Window) -> Result<(), WmError> {
        let mut state = self.state.borrow_mut();
        if !state.windows.contains_key(&window) {
            return queue_bad_window(&mut state, "UnmapWindow", window);
        }
        state.windows.get_mut(&window).unwrap().mapped = false;
        state.requests.push(FakeRequest::Unmap(window));
        Ok(())
    }

    fn destroy(&self, window: Window) -> Result<(), WmError> {
        let mut state = self.state.borrow_mut();
        if !state.windows.contains_key(&window) {
            return queue_bad_window(&mut state, "DestroyWindow", window);
        }
        Self::detach(&mut state, window);
        state.windows.remove(&window);
        state.stacking.remove(&window);
        state.requests.push(FakeRequest::Destroy(window));
        Ok(())
    }

    fn configure(&self, window: Window, changes: &ConfigureWindowAux) -> Result<(), WmError> {
        let mut state = self.state.borrow_mut();
        if !state.windows.contains_key(&window) {
            return queue_bad_window(&mut state, "ConfigureWindow", window);
        }
        let w = state.windows.get_mut(&window).unwrap();
        if let Some(x) = changes.x {
            w.geometry.x = x;
        }
        if let Some(y) = changes.y {
            w.geometry.y = y;
        }
        if let Some(width) = changes.width {
            w.geometry.width = width;
        }
        if let Some(height) = changes.height {
            w.geometry.height = height;
        }
        if let Some(border_width) = changes.border_width {
            w.border_width = border_width as u16;
        }
        let parent = w.parent;
        if changes.stack_mode == Some(StackMode::ABOVE) {
            if let Some(siblings) = parent.and_then(|p| state.stacking.get_mut(&p)) {
                siblings.retain(|&s| s != window);
                siblings.push(window);
            }
        }
        state.requests.push(FakeRequest::Configure(window));
        Ok(())
    }

    fn keycodes_for(&self, keysym: Keysym) -> Vec<Keycode> {
        self.state.borrow().keymap.get(&keysym).cloned().unwrap_or_default()
    }

    fn keysym_at(&self, keycode: Keycode, _index: u8) -> Keysym {
        self.state
            .borrow()
            .keymap
            .iter()
            .find(|(_, codes)| codes.contains(&keycode))
            .map(|(&keysym, _)| keysym)
            .unwrap_or(0)
    }

    fn refresh_keyboard_mapping(&mut self) -> Result<(), WmError> {
        self.state.borrow_mut().keymap_refreshes += 1;
        Ok(())
    }

    fn window_class(&self, window: Window) -> Option<String> {
        self.state.borrow().windows.get(&window).and_then(|w| w.class.clone())
    }

    fn window_name(&self, _window: Window) -> Option<String> {
        None
    }

    fn flush(&self) -> Result<(), WmError> {
        Ok(())
    }
}

/// Records launches instead of spawning anything
#[derive(Debug, Default)]
pub struct RecordingLauncher {
    launched: RefCell<Vec<Vec<String>>>,
}

impl RecordingLauncher {
    pub fn launched(&self) -> Vec<Vec<String>> {
        self.launched.borrow().clone()
    }
}

impl Launcher for RecordingLauncher {
    fn launch(&self, argv: &[String]) -> Result<(), WmError> {
        self.launched.borrow_mut().push(argv.to_vec());
        Ok(())
    }
}
