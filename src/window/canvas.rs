//! A native window presenting through wgpu, with its input translated to [`WindowEvent`]s.

use crate::context::{GraphicsContext, WgpuDevice};
use crate::error::{GraphicsError, Result};
use crate::window::{Action, Key, Modifiers, MouseButton, WindowEvent};
use std::sync::Arc;
use winit::application::ApplicationHandler;
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, MouseScrollDelta, WindowEvent as WinitWindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode, ModifiersState, PhysicalKey};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Window, WindowAttributes, WindowId};

/// Pixels scrolled per wheel notch.
const LINE_SCROLL: f64 = 10.0;

/// How the window is first shown.
#[derive(Clone, Debug, PartialEq)]
pub struct WindowSetup {
    pub title: String,
    /// Inner size, in physical pixels.
    pub size: (u32, u32),
    /// Outer position. `None` lets the system place the window.
    pub position: Option<(i32, i32)>,
    pub maximized: bool,
}

impl Default for WindowSetup {
    fn default() -> Self {
        WindowSetup {
            title: "Model Viewer".to_string(),
            size: (800, 600),
            position: None,
            maximized: false,
        }
    }
}

/// Collects the events of one pump of the event loop.
struct EventCollector {
    events: Vec<WindowEvent>,
    modifiers: Modifiers,
    resized: Option<(u32, u32)>,
}

impl ApplicationHandler for EventCollector {
    fn resumed(&mut self, _event_loop: &ActiveEventLoop) {}

    fn window_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WinitWindowEvent,
    ) {
        let modifiers = self.modifiers;
        match event {
            WinitWindowEvent::CloseRequested => self.events.push(WindowEvent::Close),
            WinitWindowEvent::Resized(size) => {
                if size.width > 0 && size.height > 0 {
                    self.resized = Some((size.width, size.height));
                    self.events
                        .push(WindowEvent::FramebufferSize(size.width, size.height));
                }
            }
            WinitWindowEvent::CursorMoved { position, .. } => self
                .events
                .push(WindowEvent::CursorPos(position.x, position.y, modifiers)),
            WinitWindowEvent::MouseInput { state, button, .. } => {
                self.events.push(WindowEvent::MouseButton(
                    translate_mouse_button(button),
                    translate_action(state),
                    modifiers,
                ))
            }
            WinitWindowEvent::MouseWheel { delta, .. } => {
                let (dx, dy) = match delta {
                    MouseScrollDelta::LineDelta(dx, dy) => {
                        (dx as f64 * LINE_SCROLL, dy as f64 * LINE_SCROLL)
                    }
                    MouseScrollDelta::PixelDelta(delta) => (delta.x, delta.y),
                };
                self.events.push(WindowEvent::Scroll(dx, dy, modifiers));
            }
            WinitWindowEvent::KeyboardInput { event, .. } => {
                if !event.repeat {
                    self.events.push(WindowEvent::Key(
                        translate_key(event.physical_key),
                        translate_action(event.state),
                        modifiers,
                    ));
                }
            }
            WinitWindowEvent::ModifiersChanged(new_modifiers) => {
                self.modifiers = translate_modifiers(new_modifiers.state());
            }
            _ => {}
        }
    }
}

/// A window with a wgpu surface.
pub struct Canvas {
    event_loop: EventLoop<()>,
    window: Arc<Window>,
    modifiers: Modifiers,
    pending: Vec<WindowEvent>,
}

impl Canvas {
    /// Opens the window and creates the graphics context presenting to it.
    pub fn open(setup: &WindowSetup) -> Result<(Canvas, GraphicsContext)> {
        let event_loop = EventLoop::new().map_err(|e| GraphicsError::Surface(e.to_string()))?;

        let mut attributes = WindowAttributes::default()
            .with_title(setup.title.clone())
            .with_inner_size(PhysicalSize::new(setup.size.0.max(1), setup.size.1.max(1)))
            .with_maximized(setup.maximized);
        if let Some((x, y)) = setup.position {
            attributes = attributes.with_position(PhysicalPosition::new(x, y));
        }

        #[allow(deprecated)]
        let window = event_loop
            .create_window(attributes)
            .map_err(|e| GraphicsError::Surface(e.to_string()))?;
        let window = Arc::new(window);

        let device = pollster::block_on(create_device(window.clone()))?;
        let size = window.inner_size();
        log::info!(
            "Opened a {}x{} window with surface format {:?}.",
            size.width,
            size.height,
            device.surface_format()
        );

        let canvas = Canvas {
            event_loop,
            window,
            modifiers: Modifiers::empty(),
            pending: vec![WindowEvent::FramebufferSize(
                size.width.max(1),
                size.height.max(1),
            )],
        };
        Ok((canvas, GraphicsContext::new(device)))
    }

    /// Processes the pending window system events and returns them translated.
    ///
    /// Resizes are applied to the surface of `ctx` before being returned.
    pub fn poll_events(&mut self, ctx: &mut GraphicsContext) -> Vec<WindowEvent> {
        let mut collector = EventCollector {
            events: std::mem::take(&mut self.pending),
            modifiers: self.modifiers,
            resized: None,
        };

        let timeout = Some(std::time::Duration::ZERO);
        if let PumpStatus::Exit(code) = self.event_loop.pump_app_events(timeout, &mut collector) {
            log::debug!("Event loop exited with code {}.", code);
            collector.events.push(WindowEvent::Close);
        }

        if let Some((width, height)) = collector.resized {
            if let Some(device) = ctx.downcast_device_mut::<WgpuDevice>() {
                device.resize_surface(width, height);
            }
        }

        self.modifiers = collector.modifiers;
        collector.events
    }

    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }

    pub fn set_title(&self, title: &str) {
        self.window.set_title(title);
    }

    /// Inner size, in physical pixels.
    pub fn size(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width, size.height)
    }

    /// Outer position, when the platform reports one.
    pub fn position(&self) -> Option<(i32, i32)> {
        self.window.outer_position().ok().map(|p| (p.x, p.y))
    }

    pub fn is_maximized(&self) -> bool {
        self.window.is_maximized()
    }

    /// The current state of the window, for saving.
    pub fn setup(&self) -> WindowSetup {
        WindowSetup {
            title: self.window.title(),
            size: self.size(),
            position: self.position(),
            maximized: self.is_maximized(),
        }
    }
}

async fn create_device(window: Arc<Window>) -> Result<WgpuDevice> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });

    let size = window.inner_size();
    let surface = instance
        .create_surface(window)
        .map_err(|e| GraphicsError::Surface(e.to_string()))?;

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        })
        .await
        .map_err(|e| GraphicsError::Surface(e.to_string()))?;

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("modelview device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            ..Default::default()
        })
        .await
        .map_err(|e| GraphicsError::Surface(e.to_string()))?;
    log::info!("Using adapter {:?}.", adapter.get_info().name);

    // Shaders write display values, so prefer a surface that does no sRGB conversion.
    let caps = surface.get_capabilities(&adapter);
    let format = caps
        .formats
        .iter()
        .find(|f| !f.is_srgb())
        .or_else(|| caps.formats.first())
        .copied()
        .ok_or_else(|| GraphicsError::Surface("the surface supports no format".to_string()))?;

    let config = wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format,
        width: size.width.max(1),
        height: size.height.max(1),
        present_mode: wgpu::PresentMode::AutoVsync,
        alpha_mode: caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto),
        view_formats: vec![],
        desired_maximum_frame_latency: 2,
    };
    surface.configure(&device, &config);

    Ok(WgpuDevice::with_surface(device, queue, surface, config))
}

fn translate_action(action: ElementState) -> Action {
    match action {
        ElementState::Pressed => Action::Press,
        ElementState::Released => Action::Release,
    }
}

fn translate_modifiers(modifiers: ModifiersState) -> Modifiers {
    let mut res = Modifiers::empty();
    if modifiers.shift_key() {
        res.insert(Modifiers::Shift)
    }
    if modifiers.control_key() {
        res.insert(Modifiers::Control)
    }
    if modifiers.alt_key() {
        res.insert(Modifiers::Alt)
    }
    if modifiers.super_key() {
        res.insert(Modifiers::Super)
    }
    res
}

fn translate_mouse_button(button: winit::event::MouseButton) -> MouseButton {
    match button {
        winit::event::MouseButton::Left => MouseButton::Button1,
        winit::event::MouseButton::Right => MouseButton::Button2,
        winit::event::MouseButton::Middle => MouseButton::Button3,
        _ => MouseButton::Button4,
    }
}

fn translate_key(physical_key: PhysicalKey) -> Key {
    let PhysicalKey::Code(code) = physical_key else {
        return Key::Unknown;
    };

    match code {
        KeyCode::Digit0 => Key::Key0,
        KeyCode::Digit1 => Key::Key1,
        KeyCode::Digit2 => Key::Key2,
        KeyCode::Digit3 => Key::Key3,
        KeyCode::Digit4 => Key::Key4,
        KeyCode::Digit5 => Key::Key5,
        KeyCode::Digit6 => Key::Key6,
        KeyCode::Digit7 => Key::Key7,
        KeyCode::Digit8 => Key::Key8,
        KeyCode::Digit9 => Key::Key9,
        KeyCode::KeyA => Key::A,
        KeyCode::KeyD => Key::D,
        KeyCode::KeyO => Key::O,
        KeyCode::KeyP => Key::P,
        KeyCode::KeyR => Key::R,
        KeyCode::KeyS => Key::S,
        KeyCode::KeyW => Key::W,
        KeyCode::Escape => Key::Escape,
        KeyCode::Enter => Key::Enter,
        KeyCode::Space => Key::Space,
        KeyCode::Tab => Key::Tab,
        KeyCode::ArrowUp => Key::Up,
        KeyCode::ArrowDown => Key::Down,
        KeyCode::ArrowLeft => Key::Left,
        KeyCode::ArrowRight => Key::Right,
        KeyCode::ShiftLeft => Key::LShift,
        KeyCode::ShiftRight => Key::RShift,
        KeyCode::ControlLeft => Key::LControl,
        KeyCode::ControlRight => Key::RControl,
        _ => Key::Unknown,
    }
}
