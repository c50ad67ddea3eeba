//! glTF import into CPU-side mesh data.
//!
//! Both `.gltf` and `.glb` files load; node transforms are baked into vertex
//! positions so the renderer sees a flat mesh list. A primitive that cannot be
//! read is logged and skipped rather than failing the whole scene, while an
//! unreadable file is an error the caller must handle.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine as _;
use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Vec2, Vec3};

/// Errors raised while importing a scene file.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("glTF parse error: {0}")]
    Gltf(#[from] gltf::Error),
    #[error("model has no scene to load")]
    NoScene,
    #[error("buffer {0} expects a binary chunk but the file has none")]
    MissingBlob(usize),
    #[error("unsupported buffer URI {0:?}")]
    UnsupportedUri(String),
    #[error("image {0} has a buffer view outside its buffer")]
    ImageViewOutOfRange(usize),
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("image decode error: {0}")]
    Image(#[from] image::ImageError),
}

/// One vertex in the layout the model pipeline consumes.
///
/// Field order matches shader locations 0 through 4.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub tangent: [f32; 3],
    pub bitangent: [f32; 3],
}

/// What a texture contributes to the material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    Diffuse,
    Specular,
    Normal,
}

impl TextureKind {
    pub fn label(self) -> &'static str {
        match self {
            TextureKind::Diffuse => "diffuse",
            TextureKind::Specular => "specular",
            TextureKind::Normal => "normal",
        }
    }
}

/// Where a texture's encoded bytes live.
#[derive(Debug, Clone)]
pub enum TextureSource {
    /// Image file referenced by the model, already resolved against its directory.
    File(PathBuf),
    /// Image bytes embedded in the model (GLB chunk or data URI).
    Embedded { tag: String, bytes: Arc<[u8]> },
}

impl TextureSource {
    /// Stable key for the decode/upload cache. The same file or embedded image
    /// always maps to the same key.
    pub fn cache_key(&self) -> String {
        match self {
            TextureSource::File(path) => path.to_string_lossy().into_owned(),
            TextureSource::Embedded { tag, .. } => tag.clone(),
        }
    }

    /// Decode this source to RGBA8 pixels.
    pub fn decode(&self) -> Result<image::RgbaImage, ImportError> {
        match self {
            TextureSource::File(path) => load_image(path),
            TextureSource::Embedded { bytes, .. } => decode_image(bytes),
        }
    }
}

/// A texture a mesh wants bound, before any GPU work has happened.
#[derive(Debug, Clone)]
pub struct TextureRef {
    pub source: TextureSource,
    pub kind: TextureKind,
}

/// CPU-side geometry and material references for one drawable mesh.
#[derive(Debug, Clone)]
pub struct MeshData {
    pub name: String,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    /// Constant colour factor multiplied into the diffuse term.
    pub base_color: [f32; 4],
    pub textures: Vec<TextureRef>,
}

impl MeshData {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Everything imported from one model file.
#[derive(Debug, Clone, Default)]
pub struct SceneData {
    pub meshes: Vec<MeshData>,
}

/// Post-processing applied while importing.
#[derive(Debug, Clone, Copy)]
pub struct ImportOptions {
    /// Build smooth per-vertex normals when the source has none.
    pub generate_normals: bool,
    /// Build tangent frames from UVs when the source has none.
    pub generate_tangents: bool,
    /// Merge bit-identical vertices and reindex.
    pub join_identical: bool,
    /// Flip the V texture coordinate.
    pub flip_v: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            generate_normals: true,
            generate_tangents: true,
            join_identical: true,
            flip_v: false,
        }
    }
}

/// Colour for meshes whose primitive carries no material at all.
const DEFAULT_BASE_COLOR: [f32; 4] = [0.8, 0.8, 0.8, 1.0];

/// Load a glTF scene into CPU memory.
///
/// An empty scene imports as zero meshes, not an error.
pub fn load_scene(path: &Path, options: ImportOptions) -> Result<SceneData, ImportError> {
    tracing::info!("importing model {}", path.display());
    let bytes = std::fs::read(path)?;
    let gltf::Gltf { document, blob } = gltf::Gltf::from_slice(&bytes)?;
    let dir = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
    let buffers = load_buffers(&document, blob, &dir)?;

    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or(ImportError::NoScene)?;

    let mut meshes = Vec::new();
    for node in scene.nodes() {
        collect_node(&node, Mat4::IDENTITY, &buffers, &dir, options, &mut meshes);
    }
    tracing::info!(
        "imported {} mesh(es), {} vertices total",
        meshes.len(),
        meshes.iter().map(|m| m.vertices.len()).sum::<usize>()
    );
    Ok(SceneData { meshes })
}

/// Read and decode an image file to RGBA8.
pub fn load_image(path: &Path) -> Result<image::RgbaImage, ImportError> {
    let bytes = std::fs::read(path)?;
    decode_image(&bytes)
}

/// Decode encoded image bytes (PNG or JPEG) to RGBA8.
pub fn decode_image(bytes: &[u8]) -> Result<image::RgbaImage, ImportError> {
    Ok(image::load_from_memory(bytes)?.to_rgba8())
}

fn load_buffers(
    document: &gltf::Document,
    mut blob: Option<Vec<u8>>,
    dir: &Path,
) -> Result<Vec<Vec<u8>>, ImportError> {
    let mut buffers = Vec::with_capacity(document.buffers().count());
    for buffer in document.buffers() {
        let data = match buffer.source() {
            gltf::buffer::Source::Bin => blob
                .take()
                .ok_or(ImportError::MissingBlob(buffer.index()))?,
            gltf::buffer::Source::Uri(uri) => {
                if let Some(rest) = uri.strip_prefix("data:") {
                    decode_data_uri(uri, rest)?
                } else if uri.contains("://") {
                    return Err(ImportError::UnsupportedUri(uri.to_owned()));
                } else {
                    std::fs::read(dir.join(uri))?
                }
            }
        };
        buffers.push(data);
    }
    Ok(buffers)
}

fn decode_data_uri(uri: &str, rest: &str) -> Result<Vec<u8>, ImportError> {
    let payload = rest
        .split_once(";base64,")
        .map(|(_, payload)| payload)
        .ok_or_else(|| ImportError::UnsupportedUri(uri.to_owned()))?;
    Ok(base64::engine::general_purpose::STANDARD.decode(payload)?)
}

fn collect_node(
    node: &gltf::Node,
    parent: Mat4,
    buffers: &[Vec<u8>],
    dir: &Path,
    options: ImportOptions,
    out: &mut Vec<MeshData>,
) {
    let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());
    if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
            let name = mesh_name(&mesh, &primitive);
            if let Some(data) = import_primitive(&name, &primitive, world, buffers, dir, options) {
                out.push(data);
            }
        }
    }
    for child in node.children() {
        collect_node(&child, world, buffers, dir, options, out);
    }
}

fn mesh_name(mesh: &gltf::Mesh, primitive: &gltf::Primitive) -> String {
    let base = mesh
        .name()
        .map(str::to_owned)
        .unwrap_or_else(|| format!("mesh{}", mesh.index()));
    if mesh.primitives().len() > 1 {
        format!("{base}#{}", primitive.index())
    } else {
        base
    }
}

fn import_primitive(
    name: &str,
    primitive: &gltf::Primitive,
    world: Mat4,
    buffers: &[Vec<u8>],
    dir: &Path,
    options: ImportOptions,
) -> Option<MeshData> {
    if primitive.mode() != gltf::mesh::Mode::Triangles {
        tracing::warn!(
            "skipping {name}: unsupported primitive mode {:?}",
            primitive.mode()
        );
        return None;
    }
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
    let Some(positions) = reader.read_positions() else {
        tracing::warn!("skipping {name}: primitive has no positions");
        return None;
    };

    let linear = Mat3::from_mat4(world);
    let normal_matrix = Mat3::from_mat4(world.inverse().transpose());

    let mut vertices: Vec<Vertex> = positions
        .map(|p| Vertex {
            position: world.transform_point3(Vec3::from(p)).to_array(),
            ..Vertex::zeroed()
        })
        .collect();

    let mut has_normals = false;
    if let Some(normals) = reader.read_normals() {
        has_normals = true;
        for (vertex, n) in vertices.iter_mut().zip(normals) {
            vertex.normal = (normal_matrix * Vec3::from(n)).normalize_or_zero().to_array();
        }
    }

    let mut has_uvs = false;
    if let Some(uvs) = reader.read_tex_coords(0) {
        has_uvs = true;
        for (vertex, uv) in vertices.iter_mut().zip(uvs.into_f32()) {
            vertex.uv = if options.flip_v {
                [uv[0], 1.0 - uv[1]]
            } else {
                uv
            };
        }
    }

    let mut has_tangents = false;
    if let Some(tangents) = reader.read_tangents() {
        if has_normals {
            has_tangents = true;
            for (vertex, t) in vertices.iter_mut().zip(tangents) {
                let tangent = (linear * Vec3::new(t[0], t[1], t[2])).normalize_or_zero();
                // Per glTF, w holds the handedness of the bitangent.
                let bitangent = Vec3::from(vertex.normal).cross(tangent) * t[3];
                vertex.tangent = tangent.to_array();
                vertex.bitangent = bitangent.to_array();
            }
        } else {
            // Per glTF, tangents on a primitive without normals must be ignored.
            tracing::warn!("{name}: ignoring authored tangents, primitive has no normals");
        }
    }

    let indices: Vec<u32> = match reader.read_indices() {
        Some(read) => read.into_u32().collect(),
        None => (0..vertices.len() as u32).collect(),
    };
    if let Some(&bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
        tracing::error!(
            "skipping {name}: index {bad} out of bounds for {} vertices",
            vertices.len()
        );
        return None;
    }
    if indices.len() % 3 != 0 {
        tracing::warn!(
            "skipping {name}: index count {} is not a multiple of 3",
            indices.len()
        );
        return None;
    }

    if !has_normals && options.generate_normals {
        generate_smooth_normals(&mut vertices, &indices);
    }
    if !has_tangents && has_uvs && options.generate_tangents {
        generate_tangent_frames(&mut vertices, &indices);
    }

    let material = primitive.material();
    let base_color = if material.index().is_some() {
        material.pbr_metallic_roughness().base_color_factor()
    } else {
        DEFAULT_BASE_COLOR
    };
    let textures = material_textures(&material, buffers, dir);

    let (vertices, indices) = if options.join_identical {
        join_identical(vertices, indices)
    } else {
        (vertices, indices)
    };

    tracing::debug!(
        "imported {name}: {} vertices, {} triangles, {} texture(s)",
        vertices.len(),
        indices.len() / 3,
        textures.len()
    );

    Some(MeshData {
        name: name.to_owned(),
        vertices,
        indices,
        base_color,
        textures,
    })
}

fn material_textures(
    material: &gltf::Material,
    buffers: &[Vec<u8>],
    dir: &Path,
) -> Vec<TextureRef> {
    let pbr = material.pbr_metallic_roughness();
    let mut refs = Vec::new();
    let mut push = |texture: gltf::Texture, kind: TextureKind| {
        match texture_source(&texture.source(), buffers, dir) {
            Ok(source) => refs.push(TextureRef { source, kind }),
            Err(err) => tracing::warn!("ignoring {} texture: {err}", kind.label()),
        }
    };
    if let Some(info) = pbr.base_color_texture() {
        push(info.texture(), TextureKind::Diffuse);
    }
    if let Some(info) = pbr.metallic_roughness_texture() {
        push(info.texture(), TextureKind::Specular);
    }
    if let Some(normal) = material.normal_texture() {
        push(normal.texture(), TextureKind::Normal);
    }
    refs
}

fn texture_source(
    image: &gltf::Image,
    buffers: &[Vec<u8>],
    dir: &Path,
) -> Result<TextureSource, ImportError> {
    match image.source() {
        gltf::image::Source::Uri { uri, .. } => {
            if let Some(rest) = uri.strip_prefix("data:") {
                Ok(TextureSource::Embedded {
                    tag: format!("#image{}", image.index()),
                    bytes: decode_data_uri(uri, rest)?.into(),
                })
            } else if uri.contains("://") {
                Err(ImportError::UnsupportedUri(uri.to_owned()))
            } else {
                Ok(TextureSource::File(dir.join(uri)))
            }
        }
        gltf::image::Source::View { view, .. } => {
            let buffer = buffers
                .get(view.buffer().index())
                .ok_or(ImportError::MissingBlob(view.buffer().index()))?;
            let bytes = buffer
                .get(view.offset()..view.offset() + view.length())
                .ok_or(ImportError::ImageViewOutOfRange(image.index()))?;
            Ok(TextureSource::Embedded {
                tag: format!("#image{}", image.index()),
                bytes: Arc::from(bytes),
            })
        }
    }
}

/// Area-weighted smooth normals for geometry that ships without any.
///
/// Faces accumulate per position rather than per index, so co-located vertices
/// of an unindexed triangle soup share one averaged normal and the later join
/// can still merge them.
fn generate_smooth_normals(vertices: &mut [Vertex], indices: &[u32]) {
    let mut accum: HashMap<[u32; 3], Vec3> = HashMap::with_capacity(vertices.len());
    for tri in indices.chunks_exact(3) {
        let [ia, ib, ic] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        let pa = Vec3::from(vertices[ia].position);
        let pb = Vec3::from(vertices[ib].position);
        let pc = Vec3::from(vertices[ic].position);
        // Unnormalized cross weights each face by its area.
        let face = (pb - pa).cross(pc - pa);
        for i in [ia, ib, ic] {
            *accum.entry(position_key(&vertices[i])).or_insert(Vec3::ZERO) += face;
        }
    }
    for vertex in vertices.iter_mut() {
        if let Some(&normal) = accum.get(&position_key(vertex)) {
            vertex.normal = normal.normalize_or_zero().to_array();
        }
    }
}

/// Exact position bits, the welding key for normal accumulation.
fn position_key(vertex: &Vertex) -> [u32; 3] {
    [
        vertex.position[0].to_bits(),
        vertex.position[1].to_bits(),
        vertex.position[2].to_bits(),
    ]
}

/// Tangent frames from UV derivatives, for normal mapping without authored tangents.
fn generate_tangent_frames(vertices: &mut [Vertex], indices: &[u32]) {
    let mut tan = vec![Vec3::ZERO; vertices.len()];
    let mut bitan = vec![Vec3::ZERO; vertices.len()];
    for tri in indices.chunks_exact(3) {
        let [ia, ib, ic] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        let p0 = Vec3::from(vertices[ia].position);
        let p1 = Vec3::from(vertices[ib].position);
        let p2 = Vec3::from(vertices[ic].position);
        let uv0 = Vec2::from(vertices[ia].uv);
        let uv1 = Vec2::from(vertices[ib].uv);
        let uv2 = Vec2::from(vertices[ic].uv);

        let e1 = p1 - p0;
        let e2 = p2 - p0;
        let d1 = uv1 - uv0;
        let d2 = uv2 - uv0;
        let det = d1.x * d2.y - d2.x * d1.y;
        if det.abs() <= f32::EPSILON {
            continue;
        }
        let r = 1.0 / det;
        let t = (e1 * d2.y - e2 * d1.y) * r;
        let b = (e2 * d1.x - e1 * d2.x) * r;
        for i in [ia, ib, ic] {
            tan[i] += t;
            bitan[i] += b;
        }
    }
    for (vertex, (t_acc, b_acc)) in vertices.iter_mut().zip(tan.into_iter().zip(bitan)) {
        let n = Vec3::from(vertex.normal);
        // Gram-Schmidt against the normal, then pick the handedness the UVs imply.
        let t = (t_acc - n * n.dot(t_acc)).normalize_or_zero();
        let handed = if n.cross(t).dot(b_acc) < 0.0 { -1.0 } else { 1.0 };
        vertex.tangent = t.to_array();
        vertex.bitangent = (n.cross(t) * handed).to_array();
    }
}

/// Merge bit-identical vertices and rebuild the index list.
fn join_identical(vertices: Vec<Vertex>, indices: Vec<u32>) -> (Vec<Vertex>, Vec<u32>) {
    let mut lookup: HashMap<[u32; 14], u32> = HashMap::with_capacity(vertices.len());
    let mut merged: Vec<Vertex> = Vec::with_capacity(vertices.len());
    let mut remap: Vec<u32> = Vec::with_capacity(vertices.len());
    for vertex in &vertices {
        let next = merged.len() as u32;
        let slot = *lookup.entry(bit_key(vertex)).or_insert(next);
        if slot == next {
            merged.push(*vertex);
        }
        remap.push(slot);
    }
    let indices = indices.into_iter().map(|i| remap[i as usize]).collect();
    (merged, indices)
}

/// Exact bit pattern of every attribute, so merging never blends values.
fn bit_key(vertex: &Vertex) -> [u32; 14] {
    let mut key = [0u32; 14];
    let floats = vertex
        .position
        .iter()
        .chain(&vertex.normal)
        .chain(&vertex.uv)
        .chain(&vertex.tangent)
        .chain(&vertex.bitangent);
    for (slot, value) in key.iter_mut().zip(floats) {
        *slot = value.to_bits();
    }
    key
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use super::*;
    use crate::TextureCache;

    const TRIANGLE_B64: &str = "AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAA";
    const QUAD_B64: &str = "AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAAAACAPwAAAAAAAAAAAACAPwAAgD8AAAAAAAAAAAAAgD8AAAAA";
    const BAD_INDEX_B64: &str = "AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAAAAABAAcA";
    // Two unindexed triangles folded 90 degrees along the (0,0,0)-(0,1,0) edge.
    const BENT_QUAD_B64: &str = "AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAAAAAAAAAAAAAAAAAAAAAAAAAAgD8AAAAAAAAAAAAAAAAAAIA/";
    // The triangle above plus three (1,0,0,1) vec4 tangents.
    const TANGENT_TRI_B64: &str = "AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAAAACAPwAAAAAAAAAAAACAPwAAgD8AAAAAAAAAAAAAgD8AAIA/AAAAAAAAAAAAAIA/";

    fn write_model(json: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.gltf");
        fs::write(&path, json).unwrap();
        (dir, path)
    }

    fn triangle_gltf(nodes: &str) -> String {
        format!(
            r#"{{
  "asset": {{ "version": "2.0" }},
  "scene": 0,
  "scenes": [{{ "nodes": [0] }}],
  "nodes": {nodes},
  "meshes": [{{ "name": "tri", "primitives": [{{ "attributes": {{ "POSITION": 0 }} }}] }}],
  "accessors": [{{
    "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
    "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]
  }}],
  "bufferViews": [{{ "buffer": 0, "byteOffset": 0, "byteLength": 36 }}],
  "buffers": [{{ "byteLength": 36, "uri": "data:application/octet-stream;base64,{TRIANGLE_B64}" }}]
}}"#
        )
    }

    #[test]
    fn empty_scene_imports_zero_meshes() {
        let (_dir, path) = write_model(r#"{ "asset": { "version": "2.0" }, "scene": 0, "scenes": [{ "nodes": [] }] }"#);
        let scene = load_scene(&path, ImportOptions::default()).unwrap();
        assert!(scene.meshes.is_empty());
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_scene(&dir.path().join("absent.gltf"), ImportOptions::default()).unwrap_err();
        assert!(matches!(err, ImportError::Io(_)));
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let (_dir, path) = write_model("this is not a model");
        let err = load_scene(&path, ImportOptions::default()).unwrap_err();
        assert!(matches!(err, ImportError::Gltf(_)));
    }

    #[test]
    fn file_without_scenes_is_rejected() {
        let (_dir, path) = write_model(r#"{ "asset": { "version": "2.0" } }"#);
        let err = load_scene(&path, ImportOptions::default()).unwrap_err();
        assert!(matches!(err, ImportError::NoScene));
    }

    #[test]
    fn triangle_imports_with_generated_normals() {
        let (_dir, path) = write_model(&triangle_gltf(r#"[{ "mesh": 0 }]"#));
        let scene = load_scene(&path, ImportOptions::default()).unwrap();

        assert_eq!(scene.meshes.len(), 1);
        let mesh = &scene.meshes[0];
        assert_eq!(mesh.name, "tri");
        assert_eq!(mesh.vertices.len(), 3);
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert_eq!(mesh.base_color, [0.8, 0.8, 0.8, 1.0]);
        for vertex in &mesh.vertices {
            // Face normal of a CCW triangle in the XY plane.
            assert_eq!(vertex.normal, [0.0, 0.0, 1.0]);
            assert_eq!(vertex.uv, [0.0, 0.0]);
            // No UVs, so no tangent frame either.
            assert_eq!(vertex.tangent, [0.0, 0.0, 0.0]);
        }
    }

    #[test]
    fn generate_normals_off_leaves_normals_zeroed() {
        let (_dir, path) = write_model(&triangle_gltf(r#"[{ "mesh": 0 }]"#));
        let options = ImportOptions {
            generate_normals: false,
            ..ImportOptions::default()
        };
        let scene = load_scene(&path, options).unwrap();
        for vertex in &scene.meshes[0].vertices {
            assert_eq!(vertex.normal, [0.0, 0.0, 0.0]);
        }
    }

    #[test]
    fn authored_tangents_without_normals_are_ignored() {
        let json = format!(
            r#"{{
  "asset": {{ "version": "2.0" }},
  "scene": 0,
  "scenes": [{{ "nodes": [0] }}],
  "nodes": [{{ "mesh": 0 }}],
  "meshes": [{{ "primitives": [{{ "attributes": {{ "POSITION": 0, "TANGENT": 1 }} }}] }}],
  "accessors": [
    {{
      "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
      "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]
    }},
    {{ "bufferView": 1, "componentType": 5126, "count": 3, "type": "VEC4" }}
  ],
  "bufferViews": [
    {{ "buffer": 0, "byteOffset": 0, "byteLength": 36 }},
    {{ "buffer": 0, "byteOffset": 36, "byteLength": 48 }}
  ],
  "buffers": [{{ "byteLength": 84, "uri": "data:application/octet-stream;base64,{TANGENT_TRI_B64}" }}]
}}"#
        );
        let (_dir, path) = write_model(&json);
        let scene = load_scene(&path, ImportOptions::default()).unwrap();

        let mesh = &scene.meshes[0];
        assert_eq!(mesh.vertices.len(), 3);
        for vertex in &mesh.vertices {
            assert_eq!(vertex.normal, [0.0, 0.0, 1.0]);
            // No UVs either, so nothing regenerates a frame afterwards.
            assert_eq!(vertex.tangent, [0.0, 0.0, 0.0]);
            assert_eq!(vertex.bitangent, [0.0, 0.0, 0.0]);
        }
    }

    #[test]
    fn node_transforms_bake_into_positions() {
        let nodes = r#"[
            { "children": [1], "translation": [5.0, 0.0, 0.0] },
            { "mesh": 0, "translation": [0.0, 1.0, 0.0] }
        ]"#;
        let (_dir, path) = write_model(&triangle_gltf(nodes));
        let scene = load_scene(&path, ImportOptions::default()).unwrap();

        let mesh = &scene.meshes[0];
        assert_eq!(mesh.vertices[0].position, [5.0, 1.0, 0.0]);
        assert_eq!(mesh.vertices[1].position, [6.0, 1.0, 0.0]);
        assert_eq!(mesh.vertices[2].position, [5.0, 2.0, 0.0]);
    }

    #[test]
    fn unindexed_duplicates_join_into_shared_vertices() {
        let json = format!(
            r#"{{
  "asset": {{ "version": "2.0" }},
  "scene": 0,
  "scenes": [{{ "nodes": [0] }}],
  "nodes": [{{ "mesh": 0 }}],
  "meshes": [{{ "primitives": [{{ "attributes": {{ "POSITION": 0 }} }}] }}],
  "accessors": [{{
    "bufferView": 0, "componentType": 5126, "count": 6, "type": "VEC3",
    "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]
  }}],
  "bufferViews": [{{ "buffer": 0, "byteOffset": 0, "byteLength": 72 }}],
  "buffers": [{{ "byteLength": 72, "uri": "data:application/octet-stream;base64,{QUAD_B64}" }}]
}}"#
        );
        let (_dir, path) = write_model(&json);

        let joined = load_scene(&path, ImportOptions::default()).unwrap();
        assert_eq!(joined.meshes[0].vertices.len(), 4);
        assert_eq!(joined.meshes[0].indices.len(), 6);
        assert_eq!(joined.meshes[0].triangle_count(), 2);

        let raw = load_scene(
            &path,
            ImportOptions {
                join_identical: false,
                ..ImportOptions::default()
            },
        )
        .unwrap();
        assert_eq!(raw.meshes[0].vertices.len(), 6);
    }

    #[test]
    fn generated_normals_smooth_across_unindexed_seams() {
        let json = format!(
            r#"{{
  "asset": {{ "version": "2.0" }},
  "scene": 0,
  "scenes": [{{ "nodes": [0] }}],
  "nodes": [{{ "mesh": 0 }}],
  "meshes": [{{ "primitives": [{{ "attributes": {{ "POSITION": 0 }} }}] }}],
  "accessors": [{{
    "bufferView": 0, "componentType": 5126, "count": 6, "type": "VEC3",
    "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 1.0]
  }}],
  "bufferViews": [{{ "buffer": 0, "byteOffset": 0, "byteLength": 72 }}],
  "buffers": [{{ "byteLength": 72, "uri": "data:application/octet-stream;base64,{BENT_QUAD_B64}" }}]
}}"#
        );
        let (_dir, path) = write_model(&json);
        let scene = load_scene(&path, ImportOptions::default()).unwrap();

        // Seam vertices appear once per face in the soup; their normals must
        // blend both faces and come out bit-identical, or the join cannot
        // merge them back.
        let mesh = &scene.meshes[0];
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);

        let seam = Vec3::from(mesh.vertices[0].normal);
        let blended = Vec3::new(1.0, 0.0, 1.0).normalize();
        assert!((seam - blended).length() < 1e-6);
        assert_eq!(mesh.vertices[0].normal, mesh.vertices[2].normal);
        // Off-seam vertices keep their single face normal.
        assert_eq!(mesh.vertices[1].normal, [0.0, 0.0, 1.0]);
        assert_eq!(mesh.vertices[3].normal, [1.0, 0.0, 0.0]);
    }

    #[test]
    fn out_of_bounds_index_skips_the_mesh() {
        let json = format!(
            r#"{{
  "asset": {{ "version": "2.0" }},
  "scene": 0,
  "scenes": [{{ "nodes": [0] }}],
  "nodes": [{{ "mesh": 0 }}],
  "meshes": [{{ "primitives": [{{ "attributes": {{ "POSITION": 0 }}, "indices": 1 }}] }}],
  "accessors": [
    {{
      "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
      "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]
    }},
    {{ "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }}
  ],
  "bufferViews": [
    {{ "buffer": 0, "byteOffset": 0, "byteLength": 36 }},
    {{ "buffer": 0, "byteOffset": 36, "byteLength": 6 }}
  ],
  "buffers": [{{ "byteLength": 42, "uri": "data:application/octet-stream;base64,{BAD_INDEX_B64}" }}]
}}"#
        );
        let (_dir, path) = write_model(&json);
        let scene = load_scene(&path, ImportOptions::default()).unwrap();
        assert!(scene.meshes.is_empty());
    }

    #[test]
    fn external_buffer_file_loads() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = Vec::new();
        for v in [[0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
            for c in v {
                bytes.extend_from_slice(&c.to_le_bytes());
            }
        }
        fs::write(dir.path().join("tri.bin"), &bytes).unwrap();
        let json = r#"{
  "asset": { "version": "2.0" },
  "scene": 0,
  "scenes": [{ "nodes": [0] }],
  "nodes": [{ "mesh": 0 }],
  "meshes": [{ "primitives": [{ "attributes": { "POSITION": 0 } }] }],
  "accessors": [{
    "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
    "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]
  }],
  "bufferViews": [{ "buffer": 0, "byteOffset": 0, "byteLength": 36 }],
  "buffers": [{ "byteLength": 36, "uri": "tri.bin" }]
}"#;
        let path = dir.path().join("model.gltf");
        fs::write(&path, json).unwrap();

        let scene = load_scene(&path, ImportOptions::default()).unwrap();
        assert_eq!(scene.meshes[0].vertices.len(), 3);
    }

    #[test]
    fn material_textures_resolve_against_model_directory() {
        let json = format!(
            r#"{{
  "asset": {{ "version": "2.0" }},
  "scene": 0,
  "scenes": [{{ "nodes": [0] }}],
  "nodes": [{{ "mesh": 0 }}],
  "meshes": [{{ "primitives": [{{ "attributes": {{ "POSITION": 0 }}, "material": 0 }}] }}],
  "materials": [{{
    "pbrMetallicRoughness": {{
      "baseColorTexture": {{ "index": 0 }},
      "baseColorFactor": [1.0, 0.5, 0.25, 1.0]
    }}
  }}],
  "textures": [{{ "source": 0 }}],
  "images": [{{ "uri": "albedo.png" }}],
  "accessors": [{{
    "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
    "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]
  }}],
  "bufferViews": [{{ "buffer": 0, "byteOffset": 0, "byteLength": 36 }}],
  "buffers": [{{ "byteLength": 36, "uri": "data:application/octet-stream;base64,{TRIANGLE_B64}" }}]
}}"#
        );
        let (dir, path) = write_model(&json);
        let scene = load_scene(&path, ImportOptions::default()).unwrap();

        let mesh = &scene.meshes[0];
        assert_eq!(mesh.base_color, [1.0, 0.5, 0.25, 1.0]);
        assert_eq!(mesh.textures.len(), 1);
        let texture = &mesh.textures[0];
        assert_eq!(texture.kind, TextureKind::Diffuse);
        match &texture.source {
            TextureSource::File(resolved) => {
                assert_eq!(*resolved, dir.path().join("albedo.png"));
            }
            other => panic!("expected file source, got {other:?}"),
        }
    }

    #[test]
    fn two_meshes_sharing_an_image_create_one_texture() {
        let json = format!(
            r#"{{
  "asset": {{ "version": "2.0" }},
  "scene": 0,
  "scenes": [{{ "nodes": [0, 1] }}],
  "nodes": [{{ "mesh": 0 }}, {{ "mesh": 1 }}],
  "meshes": [
    {{ "name": "left", "primitives": [{{ "attributes": {{ "POSITION": 0 }}, "material": 0 }}] }},
    {{ "name": "right", "primitives": [{{ "attributes": {{ "POSITION": 0 }}, "material": 1 }}] }}
  ],
  "materials": [
    {{ "pbrMetallicRoughness": {{ "baseColorTexture": {{ "index": 0 }} }} }},
    {{ "pbrMetallicRoughness": {{ "baseColorTexture": {{ "index": 1 }} }} }}
  ],
  "textures": [{{ "source": 0 }}, {{ "source": 0 }}],
  "images": [{{ "uri": "shared.png" }}],
  "accessors": [{{
    "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
    "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]
  }}],
  "bufferViews": [{{ "buffer": 0, "byteOffset": 0, "byteLength": 36 }}],
  "buffers": [{{ "byteLength": 36, "uri": "data:application/octet-stream;base64,{TRIANGLE_B64}" }}]
}}"#
        );
        let (_dir, path) = write_model(&json);
        let scene = load_scene(&path, ImportOptions::default()).unwrap();
        assert_eq!(scene.meshes.len(), 2);
        assert!(scene.meshes.iter().all(|m| m.textures.len() == 1));

        // Drive both meshes' references through one cache, the way a model
        // upload does.
        let mut cache = TextureCache::new();
        let mut creates = 0;
        let handles: Vec<i32> = scene
            .meshes
            .iter()
            .flat_map(|mesh| &mesh.textures)
            .map(|texture| {
                cache
                    .load(&texture.source.cache_key(), texture.kind, || {
                        creates += 1;
                        creates
                    })
                    .handle
            })
            .collect();
        assert_eq!(creates, 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(handles, vec![1, 1]);
    }

    #[test]
    fn embedded_image_bytes_decode() {
        let mut png = Vec::new();
        image::RgbaImage::from_pixel(2, 2, image::Rgba([10, 20, 30, 255]))
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        let encoded = base64::engine::general_purpose::STANDARD.encode(&png);
        let json = format!(
            r#"{{
  "asset": {{ "version": "2.0" }},
  "scene": 0,
  "scenes": [{{ "nodes": [0] }}],
  "nodes": [{{ "mesh": 0 }}],
  "meshes": [{{ "primitives": [{{ "attributes": {{ "POSITION": 0 }}, "material": 0 }}] }}],
  "materials": [{{
    "pbrMetallicRoughness": {{ "baseColorTexture": {{ "index": 0 }} }}
  }}],
  "textures": [{{ "source": 0 }}],
  "images": [{{ "uri": "data:image/png;base64,{encoded}" }}],
  "accessors": [{{
    "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
    "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]
  }}],
  "bufferViews": [{{ "buffer": 0, "byteOffset": 0, "byteLength": 36 }}],
  "buffers": [{{ "byteLength": 36, "uri": "data:application/octet-stream;base64,{TRIANGLE_B64}" }}]
}}"#
        );
        let (_dir, path) = write_model(&json);
        let scene = load_scene(&path, ImportOptions::default()).unwrap();

        let texture = &scene.meshes[0].textures[0];
        assert_eq!(texture.source.cache_key(), "#image0");
        let pixels = texture.source.decode().unwrap();
        assert_eq!(pixels.dimensions(), (2, 2));
        assert_eq!(pixels.get_pixel(0, 0).0, [10, 20, 30, 255]);
    }

    #[test]
    fn decode_image_rejects_garbage() {
        let err = decode_image(&[0u8; 16]).unwrap_err();
        assert!(matches!(err, ImportError::Image(_)));
    }

    #[test]
    fn load_image_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_image(&dir.path().join("absent.png")).unwrap_err();
        assert!(matches!(err, ImportError::Io(_)));
    }
}
