//! Window and input events, independent of the windowing library.

/// State of a key or a mouse button.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Release,
    Press,
}

/// A mouse button. `Button1` is the left button and `Button2` the right one.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Button1,
    Button2,
    Button3,
    Button4,
}

/// The keys the viewer distinguishes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Key0,
    Key1,
    Key2,
    Key3,
    Key4,
    Key5,
    Key6,
    Key7,
    Key8,
    Key9,
    A,
    D,
    O,
    P,
    R,
    S,
    W,
    Escape,
    Enter,
    Space,
    Tab,
    Up,
    Down,
    Left,
    Right,
    LShift,
    RShift,
    LControl,
    RControl,
    Unknown,
}

bitflags! {
    /// Modifier keys held during an event.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u32 {
        const Shift = 0b0001;
        const Control = 0b0010;
        const Alt = 0b0100;
        const Super = 0b1000;
    }
}

/// An event delivered to the window callbacks.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum WindowEvent {
    /// New framebuffer size, in physical pixels.
    FramebufferSize(u32, u32),
    CursorPos(f64, f64, Modifiers),
    MouseButton(MouseButton, Action, Modifiers),
    Key(Key, Action, Modifiers),
    Scroll(f64, f64, Modifiers),
    Close,
}
