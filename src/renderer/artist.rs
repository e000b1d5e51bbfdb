//! The three ways a piece of geometry reaches the GPU.
//!
//! Every strategy validates the vertex data before touching the device, so a refused
//! geometry leaves no partial upload or draw behind.

use crate::context::{DrawCall, GraphicsContext};
use crate::error::{GeometryError, GraphicsError, Result};
use crate::resource::{AttributeKind, GpuGeometry, PrimitiveType, VertexBuffer};
use glamx::{Mat4, Vec3, Vec4};

/// How a piece of geometry is drawn.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DrawStrategy {
    /// Indexed triangles with per-vertex normals.
    Indexed,
    /// Triangle soup without indices.
    NonIndexed,
    /// One point or one line, drawn from the shared basis buffer.
    PointLine,
}

impl DrawStrategy {
    /// The strategy matching the shape of `geometry`.
    pub fn for_geometry(geometry: &GpuGeometry) -> Self {
        let buffer = geometry.buffer();
        match geometry.primitive() {
            PrimitiveType::Points | PrimitiveType::Lines if buffer.indices().is_none() => {
                DrawStrategy::PointLine
            }
            _ if buffer.indices().is_some() => DrawStrategy::Indexed,
            _ => DrawStrategy::NonIndexed,
        }
    }

    /// Checks the cross-attribute invariants this strategy relies on.
    pub fn validate(self, buffer: &VertexBuffer) -> std::result::Result<(), GeometryError> {
        match self {
            DrawStrategy::Indexed => validate_indexed(buffer),
            DrawStrategy::NonIndexed => validate_non_indexed(buffer),
            DrawStrategy::PointLine => point_line_positions(buffer).map(|_| ()),
        }
    }
}

fn check_length(
    attribute: &'static str,
    found: Option<usize>,
    expected: usize,
) -> std::result::Result<(), GeometryError> {
    match found {
        Some(found) if found != expected => Err(GeometryError::LengthMismatch {
            attribute,
            expected,
            found,
        }),
        _ => Ok(()),
    }
}

fn validate_attributes(buffer: &VertexBuffer) -> std::result::Result<usize, GeometryError> {
    let vertices = buffer.vertices().ok_or(GeometryError::Missing("position"))?;
    let normals = buffer.normals().ok_or(GeometryError::Missing("normal"))?;

    check_length("normal", Some(normals.len()), vertices.len())?;
    check_length("color", buffer.colors().map(|c| c.len()), vertices.len())?;
    check_length("texel", buffer.texels().map(|t| t.len()), vertices.len())?;
    Ok(vertices.len())
}

/// Positions, normals and indices present, matching lengths, every index in range.
pub fn validate_indexed(buffer: &VertexBuffer) -> std::result::Result<(), GeometryError> {
    let vertex_count = validate_attributes(buffer)?;
    let indices = buffer.indices().ok_or(GeometryError::Missing("index"))?;

    match indices.iter().max() {
        Some(&index) if index as usize >= vertex_count => Err(GeometryError::IndexOutOfRange {
            index,
            vertex_count,
        }),
        _ => Ok(()),
    }
}

/// Positions and normals present with matching lengths, whole triangles, no indices.
pub fn validate_non_indexed(buffer: &VertexBuffer) -> std::result::Result<(), GeometryError> {
    if buffer.indices().is_some() {
        return Err(GeometryError::UnexpectedIndices);
    }

    let vertex_count = validate_attributes(buffer)?;
    if vertex_count % 3 != 0 {
        return Err(GeometryError::NotTriangles(vertex_count));
    }
    Ok(())
}

/// The one or two positions of a point or line marker.
pub fn point_line_positions(buffer: &VertexBuffer) -> std::result::Result<&[Vec3], GeometryError> {
    let vertices = buffer.vertices().ok_or(GeometryError::Missing("position"))?;
    match vertices.len() {
        1 | 2 => Ok(vertices),
        n => Err(GeometryError::PointLineCount(n)),
    }
}

/// Maps the basis vertices `(1, 0, 0)` and `(0, 1, 0)` onto `points[0]` and `points[1]`.
pub fn shear_matrix(points: &[Vec3]) -> Mat4 {
    let a = points.first().copied().unwrap_or(Vec3::ZERO);
    let b = points.get(1).copied().unwrap_or(Vec3::ZERO);
    Mat4::from_cols(a.extend(0.0), b.extend(0.0), Vec4::ZERO, Vec4::W)
}

/// Copies the vertex data to the geometry's buffers, once.
pub fn upload(ctx: &mut GraphicsContext, geometry: &mut GpuGeometry) -> Result<()> {
    let handles = *geometry.handles().ok_or(GraphicsError::NotInitialized)?;
    if handles.uploaded {
        return Ok(());
    }

    let buffer = geometry.buffer();
    for kind in AttributeKind::ALL.iter() {
        let data: Option<&[u8]> = match kind {
            AttributeKind::Position => buffer.vertices().map(bytemuck::cast_slice),
            AttributeKind::Normal => buffer.normals().map(bytemuck::cast_slice),
            AttributeKind::Color => buffer.colors().map(bytemuck::cast_slice),
            AttributeKind::Texel => buffer.texels().map(bytemuck::cast_slice),
        };
        if let Some(data) = data {
            ctx.upload_buffer(handles.buffer(*kind), data)?;
        }
    }
    if let Some(indices) = buffer.indices() {
        ctx.upload_buffer(handles.indices, bytemuck::cast_slice(indices))?;
    }

    log::trace!("Uploaded {} vertices to {:?}.", buffer.vertex_count(), handles.vertex_array);
    geometry.mark_uploaded();
    Ok(())
}

/// Validates, uploads if needed, and issues an indexed or array draw.
///
/// The program and its uniforms must already be set.
pub fn draw(ctx: &mut GraphicsContext, geometry: &mut GpuGeometry, strategy: DrawStrategy) -> Result<()> {
    if strategy == DrawStrategy::PointLine {
        return Err(GraphicsError::Unsupported("drawing markers as meshes"));
    }

    let vertex_array = geometry
        .handles()
        .map(|h| h.vertex_array)
        .ok_or(GraphicsError::NotInitialized)?;
    strategy.validate(geometry.buffer())?;
    upload(ctx, geometry)?;

    let buffer = geometry.buffer();
    let (count, indexed) = match strategy {
        DrawStrategy::Indexed => (buffer.indices().map_or(0, |i| i.len()), true),
        _ => (buffer.vertex_count(), false),
    };

    let _ = ctx.bind_vertex_array(Some(vertex_array));
    ctx.draw(DrawCall {
        primitive: geometry.primitive(),
        first: 0,
        count: count as u32,
        indexed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::HeadlessDevice;
    use crate::procedural::{Cuboid, Line, Plane, Point};

    fn indexed_triangle() -> VertexBuffer {
        let mut buffer = VertexBuffer::new();
        for v in [Vec3::ZERO, Vec3::X, Vec3::Y].iter() {
            buffer.add_vertex(*v);
            buffer.add_normal(Vec3::Z);
        }
        for i in 0..3 {
            buffer.add_index(i);
        }
        buffer
    }

    #[test]
    fn strategy_follows_the_geometry() {
        assert_eq!(
            DrawStrategy::for_geometry(&Cuboid::new(1.0, 1.0, 1.0).into_geometry()),
            DrawStrategy::Indexed
        );
        let soup = Plane::non_indexed(Vec3::ZERO, Vec3::X, Vec3::new(1.0, 1.0, 0.0));
        assert_eq!(
            DrawStrategy::for_geometry(&soup.into_geometry()),
            DrawStrategy::NonIndexed
        );
        assert_eq!(
            DrawStrategy::for_geometry(&Point::new(Vec3::ZERO).into_geometry()),
            DrawStrategy::PointLine
        );
        assert_eq!(
            DrawStrategy::for_geometry(&Line::new(Vec3::ZERO, Vec3::X).into_geometry()),
            DrawStrategy::PointLine
        );
    }

    #[test]
    fn indexed_rejects_out_of_range_indices() {
        let mut buffer = indexed_triangle();
        assert_eq!(validate_indexed(&buffer), Ok(()));

        buffer.add_index(3);
        assert_eq!(
            validate_indexed(&buffer),
            Err(GeometryError::IndexOutOfRange {
                index: 3,
                vertex_count: 3
            })
        );
    }

    #[test]
    fn indexed_rejects_mismatched_attributes() {
        let mut buffer = indexed_triangle();
        buffer.add_normal(Vec3::Z);
        assert!(matches!(
            validate_indexed(&buffer),
            Err(GeometryError::LengthMismatch { attribute: "normal", .. })
        ));

        let mut buffer = indexed_triangle();
        buffer.add_color(Vec4::ONE);
        assert!(matches!(
            validate_indexed(&buffer),
            Err(GeometryError::LengthMismatch { attribute: "color", .. })
        ));

        let mut buffer = indexed_triangle();
        buffer.normals_mut().clear();
        assert_eq!(validate_indexed(&buffer), Err(GeometryError::Missing("normal")));
    }

    #[test]
    fn non_indexed_rejects_partial_triangles() {
        let mut buffer = VertexBuffer::new();
        for _ in 0..4 {
            buffer.add_vertex(Vec3::ZERO);
            buffer.add_normal(Vec3::Z);
        }
        assert_eq!(validate_non_indexed(&buffer), Err(GeometryError::NotTriangles(4)));

        let mut with_indices = indexed_triangle();
        assert_eq!(
            validate_non_indexed(&with_indices),
            Err(GeometryError::UnexpectedIndices)
        );
        with_indices.indices_mut().clear();
        assert_eq!(validate_non_indexed(&with_indices), Ok(()));
    }

    #[test]
    fn markers_hold_one_or_two_points() {
        let mut buffer = VertexBuffer::new();
        assert_eq!(point_line_positions(&buffer), Err(GeometryError::Missing("position")));
        for _ in 0..3 {
            buffer.add_vertex(Vec3::ONE);
        }
        assert_eq!(point_line_positions(&buffer), Err(GeometryError::PointLineCount(3)));
    }

    #[test]
    fn shear_maps_the_basis_onto_the_points() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(-4.0, 5.0, 0.5);
        let shear = shear_matrix(&[a, b]);
        assert_eq!(shear.transform_point3(Vec3::X), a);
        assert_eq!(shear.transform_point3(Vec3::Y), b);
    }

    #[test]
    fn invalid_geometry_is_never_uploaded() {
        let mut ctx = GraphicsContext::headless();
        let mut buffer = indexed_triangle();
        buffer.add_index(9);
        let mut geometry = GpuGeometry::new(buffer, PrimitiveType::Triangles);
        geometry.initialize(&mut ctx).unwrap();

        let result = draw(&mut ctx, &mut geometry, DrawStrategy::Indexed);
        assert!(matches!(result, Err(GraphicsError::InvalidGeometry(_))));
        assert!(!geometry.is_uploaded());

        let device = ctx.downcast_device::<HeadlessDevice>().unwrap();
        assert_eq!(device.upload_count(), 0);
        assert!(device.draw_calls().is_empty());
    }

    #[test]
    fn uninitialized_geometry_is_refused() {
        let mut ctx = GraphicsContext::headless();
        let mut geometry = GpuGeometry::new(indexed_triangle(), PrimitiveType::Triangles);
        assert!(matches!(
            draw(&mut ctx, &mut geometry, DrawStrategy::Indexed),
            Err(GraphicsError::NotInitialized)
        ));
    }
}
