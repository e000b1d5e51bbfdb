/*!
# modelview

The rendering and camera core of a desktop 3D model viewer.

A [`Camera`](camera::Camera) switches between perspective and orthographic
projections and is driven by [`OrbitalControls`](camera::OrbitalControls). Geometry
lives in [`VertexBuffer`](resource::VertexBuffer)s wrapped by
[`GpuGeometry`](resource::GpuGeometry), and every [`Material`](resource::Material)
resolves its shader program through the [`ShaderCache`](resource::ShaderCache) of the
[`Renderer`](renderer::Renderer).

All GPU state goes through an explicit [`GraphicsContext`](context::GraphicsContext).
It drives wgpu in the viewer and a recording headless device in tests:

```no_run
use modelview::prelude::*;

let mut ctx = GraphicsContext::headless();
let renderer = Renderer::setup(&mut ctx, std::path::Path::new("shaders")).unwrap();
let mut viewer = Viewer::new(renderer, std::path::Path::new(SETTINGS_FILE));
viewer.frame(&mut ctx).unwrap();
```

Controls of the viewer:

* `left click + drag`: orbit around the target.
* `right click + drag`: change the field of view, or the zoom of an orthographic camera.
* `1` / `2`: perspective / orthographic projection.
* `W`: toggle wireframe.
* `Ctrl + S`: save the settings. They are also saved on exit.
* `Escape`: quit.
*/
#![allow(non_upper_case_globals)]
#![allow(clippy::module_inception)]
#![allow(clippy::too_many_arguments)]

#[macro_use]
extern crate bitflags;

pub use glamx;

pub mod camera;
pub mod context;
pub mod error;
pub mod light;
pub mod loader;
pub mod math;
pub mod procedural;
pub mod renderer;
pub mod resource;
pub mod scene;
pub mod settings;
pub mod viewer;
pub mod window;

pub mod prelude {
    pub use crate::camera::*;
    pub use crate::context::*;
    pub use crate::error::{GeometryError, GraphicsError};
    pub use crate::light::*;
    pub use crate::loader::*;
    pub use crate::procedural::*;
    pub use crate::renderer::*;
    pub use crate::resource::*;
    pub use crate::scene::*;
    pub use crate::settings::*;
    pub use crate::viewer::{Viewer, ViewerOptions};
    pub use crate::window::*;
    pub use glamx::{Mat3, Mat4, Quat, Vec2, Vec3, Vec4};
}
