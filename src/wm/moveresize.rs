//! MoveResize Module
//!
//! Button-3 drag to move a frame, button-3 press to raise it.
//!
//! A drag starts on the first motion sample with button 3 held. The offset
//! between the frame origin and the pointer is taken once at that point and
//! every later sample places the frame at `offset + pointer`, so no error
//! accumulates across samples.

use tracing::debug;
use x11rb::protocol::xproto::{ConfigureWindowAux, StackMode, Window};

use crate::error::WmError;
use crate::wm::display::DisplayServer;
use crate::wm::events::PointerEvent;
use crate::wm::registry::{FrameRegistry, DRAG_BUTTON};

/// Button3 bit of the core key/button state
pub const BUTTON3_MASK: u16 = 1 << 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ActiveDrag {
    window: Window,
    /// Window origin minus pointer root position at drag start
    offset: (i32, i32),
}

/// At most one drag in flight. The offset exists exactly when a window does.
#[derive(Debug, Default)]
pub struct DragState {
    active: Option<ActiveDrag>,
}

impl DragState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn window(&self) -> Option<Window> {
        self.active.map(|drag| drag.window)
    }

    pub fn offset(&self) -> Option<(i32, i32)> {
        self.active.map(|drag| drag.offset)
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Handle a motion sample: start a drag or move the dragged window.
    pub fn on_motion<D: DisplayServer + ?Sized>(
        &mut self,
        display: &D,
        registry: &mut FrameRegistry,
        event: &PointerEvent,
    ) -> Result<(), WmError> {
        if event.state & BUTTON3_MASK == 0 {
            return Ok(());
        }

        let pointer = (i32::from(event.root_x), i32::from(event.root_y));
        match self.active {
            None => {
                let origin = display.geometry(event.window)?;
                let offset = (origin.x - pointer.0, origin.y - pointer.1);
                debug!("Drag start on {:#x}, offset {:?}", event.window, offset);
                self.active = Some(ActiveDrag {
                    window: event.window,
                    offset,
                });
            }
            Some(drag) => {
                let x = drag.offset.0 + pointer.0;
                let y = drag.offset.1 + pointer.1;
                display.configure(drag.window, &ConfigureWindowAux::new().x(x).y(y))?;
                registry.record_position(drag.window, x, y);
            }
        }
        Ok(())
    }

    /// Button-3 press raises the pressed window. It does not touch the drag.
    pub fn on_press<D: DisplayServer + ?Sized>(&self, display: &D, event: &PointerEvent) -> Result<(), WmError> {
        if event.button != DRAG_BUTTON {
            return Ok(());
        }
        debug!("Raising {:#x}", event.window);
        display.configure(event.window, &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE))
    }

    /// Button release ends any drag. Releasing with no drag is a no-op.
    pub fn on_release(&mut self) {
        if let Some(drag) = self.active.take() {
            debug!("Drag end on {:#x}", drag.window);
        }
    }
}
