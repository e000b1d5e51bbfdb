//! Imports glTF models into geometry pieces and the texture files they reference.

use crate::loader::LoadError;
use crate::resource::{GpuGeometry, PrimitiveType, VertexBuffer};
use glamx::{Mat3, Mat4, Vec2, Vec3, Vec4};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// What a texture file is used for by the material of a model.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TextureKind {
    Diffuse,
    Specular,
    Emissive,
    Unknown,
}

/// The result of a model import.
#[derive(Debug, Default)]
pub struct LoadedModel {
    /// One uninitialized geometry per triangle primitive, node transforms applied.
    pub pieces: Vec<GpuGeometry>,
    /// Texture files by usage, resolved against the model's directory.
    pub textures: HashMap<TextureKind, Vec<PathBuf>>,
}

impl LoadedModel {
    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    /// The first texture file of the given kind.
    pub fn texture(&self, kind: TextureKind) -> Option<&Path> {
        self.textures
            .get(&kind)
            .and_then(|paths| paths.first())
            .map(|p| p.as_path())
    }

    fn add_texture(&mut self, kind: TextureKind, path: PathBuf) {
        let paths = self.textures.entry(kind).or_insert_with(Vec::new);
        if !paths.contains(&path) {
            paths.push(path);
        }
    }
}

/// Loads `.gltf` and `.glb` files.
#[derive(Copy, Clone, Debug, Default)]
pub struct ModelLoader;

impl ModelLoader {
    pub fn new() -> Self {
        ModelLoader
    }

    /// File extensions this loader understands, lowercase and without the dot.
    pub fn supported_extensions() -> &'static [&'static str] {
        &["gltf", "glb"]
    }

    /// Imports the model at `path`.
    ///
    /// Failures are logged and yield an empty model.
    pub fn load(&self, path: &Path) -> LoadedModel {
        match self.try_load(path) {
            Ok(model) => {
                log::info!(
                    "Loaded {} with {} pieces and {} texture kinds.",
                    path.display(),
                    model.pieces.len(),
                    model.textures.len()
                );
                model
            }
            Err(e) => {
                log::error!("Failed to load model {}: {}", path.display(), e);
                LoadedModel::default()
            }
        }
    }

    fn try_load(&self, path: &Path) -> Result<LoadedModel, LoadError> {
        if !path.is_file() {
            return Err(LoadError::NotFound(path.to_path_buf()));
        }

        let gltf::Gltf { document, blob } = gltf::Gltf::open(path)?;
        let base = path.parent();
        let buffers = gltf::import_buffers(&document, base, blob)?;

        let mut model = LoadedModel::default();
        if let Some(scene) = document.default_scene().or_else(|| document.scenes().next()) {
            for node in scene.nodes() {
                import_node(&node, Mat4::IDENTITY, &buffers, base, &mut model)?;
            }
        }

        Ok(model)
    }
}

fn import_node(
    node: &gltf::Node,
    parent: Mat4,
    buffers: &[gltf::buffer::Data],
    base: Option<&Path>,
    model: &mut LoadedModel,
) -> Result<(), LoadError> {
    let transform = parent * Mat4::from_cols_array_2d(&node.transform().matrix());

    if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                log::warn!(
                    "Skipping a {:?} primitive of mesh {}.",
                    primitive.mode(),
                    mesh.index()
                );
                continue;
            }

            let buffer = import_primitive(&primitive, buffers, transform)
                .ok_or(LoadError::MissingPositions(mesh.index()))?;
            model
                .pieces
                .push(GpuGeometry::new(buffer, PrimitiveType::Triangles));
            collect_textures(&primitive.material(), base, model);
        }
    }

    for child in node.children() {
        import_node(&child, transform, buffers, base, model)?;
    }
    Ok(())
}

fn import_primitive(
    primitive: &gltf::Primitive,
    buffers: &[gltf::buffer::Data],
    transform: Mat4,
) -> Option<VertexBuffer> {
    let reader = primitive.reader(|buffer| Some(buffers.get(buffer.index())?.0.as_slice()));
    let normal_matrix = Mat3::from_mat4(transform).inverse().transpose();

    let mut buffer = VertexBuffer::new();
    for p in reader.read_positions()? {
        buffer.add_vertex(transform.transform_point3(Vec3::from(p)));
    }

    let indices: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..buffer.vertex_count() as u32).collect(),
    };
    for index in &indices {
        buffer.add_index(*index);
    }

    match reader.read_normals() {
        Some(normals) => {
            for n in normals {
                buffer.add_normal((normal_matrix * Vec3::from(n)).normalize_or_zero());
            }
        }
        None => {
            let positions = buffer.vertices().unwrap_or(&[]).to_vec();
            for n in smooth_normals(&positions, &indices) {
                buffer.add_normal(n);
            }
        }
    }

    if let Some(texels) = reader.read_tex_coords(0) {
        for t in texels.into_f32() {
            buffer.add_texel(Vec2::from(t));
        }
    }
    if let Some(colors) = reader.read_colors(0) {
        for c in colors.into_rgba_f32() {
            buffer.add_color(Vec4::from(c));
        }
    }

    Some(buffer)
}

/// Area-weighted vertex normals of an indexed triangle list.
pub fn smooth_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];

    for triangle in indices.chunks_exact(3) {
        let [a, b, c] = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);
        if a >= positions.len() || b >= positions.len() || c >= positions.len() {
            continue;
        }

        let face = (positions[b] - positions[a]).cross(positions[c] - positions[a]);
        normals[a] += face;
        normals[b] += face;
        normals[c] += face;
    }

    normals.iter().map(|n| n.normalize_or_zero()).collect()
}

fn collect_textures(material: &gltf::Material, base: Option<&Path>, model: &mut LoadedModel) {
    let mut add = |kind: TextureKind, texture: gltf::Texture| {
        match texture.source().source() {
            gltf::image::Source::Uri { uri, .. } if !uri.starts_with("data:") => {
                let path = base.map_or_else(|| PathBuf::from(uri), |dir| dir.join(uri));
                model.add_texture(kind, path);
            }
            _ => log::debug!("Ignoring an embedded {:?} texture.", kind),
        }
    };

    let pbr = material.pbr_metallic_roughness();
    if let Some(info) = pbr.base_color_texture() {
        add(TextureKind::Diffuse, info.texture());
    }
    if let Some(info) = material.emissive_texture() {
        add(TextureKind::Emissive, info.texture());
    }
    if let Some(info) = material.specular().and_then(|s| s.specular_texture()) {
        add(TextureKind::Specular, info.texture());
    }
    if let Some(info) = pbr.metallic_roughness_texture() {
        add(TextureKind::Unknown, info.texture());
    }
    if let Some(normal) = material.normal_texture() {
        add(TextureKind::Unknown, normal.texture());
    }
    if let Some(occlusion) = material.occlusion_texture() {
        add(TextureKind::Unknown, occlusion.texture());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    // One triangle: three positions followed by three u16 indices and two bytes of padding.
    const TRIANGLE: &str = r#"{
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [ { "nodes": [0] } ],
        "nodes": [ { "mesh": 0, "translation": [0.0, 0.0, 1.0] } ],
        "meshes": [ {
            "primitives": [ { "attributes": { "POSITION": 0 }, "indices": 1, "material": 0 } ]
        } ],
        "materials": [ {
            "pbrMetallicRoughness": { "baseColorTexture": { "index": 0 } },
            "emissiveTexture": { "index": 1 }
        } ],
        "textures": [ { "source": 0 }, { "source": 1 } ],
        "images": [ { "uri": "diffuse.png" }, { "uri": "glow.png" } ],
        "buffers": [ { "byteLength": 44, "uri": "triangle.bin" } ],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
            { "buffer": 0, "byteOffset": 36, "byteLength": 6 }
        ],
        "accessors": [
            { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
              "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] },
            { "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }
        ]
    }"#;

    fn write_triangle(dir: &Path) -> PathBuf {
        let positions: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let indices: [u16; 4] = [0, 1, 2, 0];
        let mut bytes = bytemuck::cast_slice::<f32, u8>(&positions).to_vec();
        bytes.extend_from_slice(bytemuck::cast_slice(&indices));

        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join("triangle.bin"), bytes).unwrap();
        let path = dir.join("triangle.gltf");
        fs::write(&path, TRIANGLE).unwrap();
        path
    }

    #[test]
    fn imports_geometry_and_texture_paths() {
        let dir = std::env::temp_dir().join("modelview-model-loader");
        let path = write_triangle(&dir);

        let model = ModelLoader::new().load(&path);
        assert_eq!(model.pieces.len(), 1);

        let buffer = model.pieces[0].buffer();
        assert_eq!(buffer.indices(), Some(&[0, 1, 2][..]));
        assert_eq!(buffer.vertices().unwrap()[1], Vec3::new(1.0, 0.0, 1.0));
        for n in buffer.normals().unwrap() {
            assert!((*n - Vec3::Z).length() < 1.0e-6);
        }

        assert_eq!(model.texture(TextureKind::Diffuse), Some(dir.join("diffuse.png").as_path()));
        assert_eq!(model.texture(TextureKind::Emissive), Some(dir.join("glow.png").as_path()));
        assert_eq!(model.texture(TextureKind::Specular), None);
    }

    #[test]
    fn failures_yield_an_empty_model() {
        let missing = std::env::temp_dir().join("modelview-missing.gltf");
        assert!(ModelLoader::new().load(&missing).is_empty());

        let dir = std::env::temp_dir().join("modelview-broken-model");
        fs::create_dir_all(&dir).unwrap();
        let broken = dir.join("broken.gltf");
        fs::write(&broken, "{ not json").unwrap();
        let model = ModelLoader::new().load(&broken);
        assert!(model.is_empty());
        assert!(model.textures.is_empty());
    }

    #[test]
    fn smooth_normals_average_adjacent_faces() {
        let positions = [Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::Z];
        let normals = smooth_normals(&positions, &[0, 1, 2, 0, 3, 1]);
        assert!((normals[2] - Vec3::Z).length() < 1.0e-6);
        assert!((normals[3] - Vec3::Y).length() < 1.0e-6);

        let shared = Vec3::new(0.0, 1.0, 1.0).normalize();
        assert!((normals[0] - shared).length() < 1.0e-6);
    }
}
