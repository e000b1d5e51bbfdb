//! The window, its input events and the handlers reacting to them.

mod callbacks;
mod canvas;
mod events;

pub use callbacks::{EventContext, Signal, WindowCallbacks};
pub use canvas::{Canvas, WindowSetup};
pub use events::{Action, Key, Modifiers, MouseButton, WindowEvent};
