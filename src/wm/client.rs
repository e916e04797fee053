use x11rb::protocol::xproto::Window;

use crate::shared::window_state::{ClientInfo, Geometry};

/// A client window wrapped in one of our frames
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedWindow {
    /// Client window ID
    pub client: Window,

    /// Frame window ID (the registry key)
    pub frame: Window,

    /// Screen number the frame lives on
    pub screen: usize,

    /// Last known frame geometry, root relative
    pub geometry: Geometry,

    /// WM_CLASS / WM_NAME at capture time
    pub info: ClientInfo,
}
