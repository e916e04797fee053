//! Window state shared between the registry and the drag controller

/// Window geometry in the parent's coordinate space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Geometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Geometry {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Same size, new origin.
    pub fn moved_to(self, x: i32, y: i32) -> Self {
        Self { x, y, ..self }
    }
}

/// Informational client metadata (WM_CLASS / WM_NAME)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub class: Option<String>,
    pub name: Option<String>,
}

impl std::fmt::Display for ClientInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {:?}",
            self.class.as_deref().unwrap_or("<no class>"),
            self.name.as_deref().unwrap_or("")
        )
    }
}
