//! Input handlers and the signals they raise.

use crate::camera::Camera;
use crate::context::GraphicsContext;
use crate::scene::Arena;
use crate::window::{Action, Key, Modifiers, MouseButton, WindowEvent};

/// What an input handler may touch while reacting to an event.
pub struct EventContext<'a> {
    pub graphics: &'a mut GraphicsContext,
    pub cameras: &'a mut Arena<Camera>,
}

/// Handlers for the five kinds of input the window delivers.
///
/// Every handler defaults to doing nothing.
pub trait WindowCallbacks {
    fn framebuffer_size(&mut self, _cx: &mut EventContext, _width: u32, _height: u32) {}

    fn cursor_position(&mut self, _cx: &mut EventContext, _x: f64, _y: f64) {}

    fn mouse_button(
        &mut self,
        _cx: &mut EventContext,
        _button: MouseButton,
        _action: Action,
        _modifiers: Modifiers,
    ) {
    }

    fn key(&mut self, _cx: &mut EventContext, _key: Key, _action: Action, _modifiers: Modifiers) {}

    fn scroll(&mut self, _cx: &mut EventContext, _dx: f64, _dy: f64) {}

    /// Routes `event` to the matching handler. `Close` has no handler.
    fn handle_event(&mut self, cx: &mut EventContext, event: &WindowEvent) {
        match *event {
            WindowEvent::FramebufferSize(w, h) => self.framebuffer_size(cx, w, h),
            WindowEvent::CursorPos(x, y, _) => self.cursor_position(cx, x, y),
            WindowEvent::MouseButton(button, action, modifiers) => {
                self.mouse_button(cx, button, action, modifiers)
            }
            WindowEvent::Key(key, action, modifiers) => self.key(cx, key, action, modifiers),
            WindowEvent::Scroll(dx, dy, _) => self.scroll(cx, dx, dy),
            WindowEvent::Close => {}
        }
    }
}

/// A list of listeners notified with a value.
pub struct Signal<T> {
    slots: Vec<Box<dyn FnMut(&T)>>,
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Signal { slots: Vec::new() }
    }
}

impl<T> Signal<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a listener called on every subsequent emission.
    pub fn connect(&mut self, slot: impl FnMut(&T) + 'static) {
        self.slots.push(Box::new(slot));
    }

    /// Calls every listener, in connection order.
    pub fn emit(&mut self, value: T) {
        for slot in &mut self.slots {
            slot(&value);
        }
    }

    pub fn disconnect_all(&mut self) {
        self.slots.clear();
    }

    pub fn listener_count(&self) -> usize {
        self.slots.len()
    }
}
