//! GPU-side mesh and model aggregates.
//!
//! [`GpuModel::from_scene`] uploads every mesh of an imported scene and
//! deduplicates textures through a per-model cache, so a texture referenced by
//! many meshes is decoded and uploaded once. All GPU resources release when
//! the model drops.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use meshview_assets::{MeshData, SceneData, TextureCache, TextureKind, Vertex};
use meshview_common::Transform;
use wgpu::util::DeviceExt;

use crate::texture::{GpuTexture, MaterialDefaults, SharedTexture};

/// Material uniform block, bound at group 2 binding 0.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct MaterialParams {
    base_color: [f32; 4],
    has_normal_map: u32,
    _pad: [u32; 3],
}

/// Per-model uniform block: model matrix plus its normal matrix.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct ModelUniforms {
    model: [[f32; 4]; 4],
    normal: [[f32; 4]; 4],
}

impl ModelUniforms {
    fn new(transform: &Transform) -> Self {
        let model = transform.matrix();
        Self {
            model: model.to_cols_array_2d(),
            normal: model.inverse().transpose().to_cols_array_2d(),
        }
    }
}

/// Vertex buffer layout matching [`meshview_assets::Vertex`].
pub fn vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    const ATTRIBUTES: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x3,
        2 => Float32x2,
        3 => Float32x3,
        4 => Float32x3,
    ];
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &ATTRIBUTES,
    }
}

/// A usable frame needs both basis vectors; a lone tangent cannot span TBN
/// and would feed `normalize` a zero bitangent in the shader.
fn has_tangent_frames(vertices: &[Vertex]) -> bool {
    vertices
        .iter()
        .any(|v| v.tangent != [0.0; 3] && v.bitangent != [0.0; 3])
}

/// One uploaded mesh: geometry buffers plus its material bind group.
pub struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    material_bind_group: wgpu::BindGroup,
}

impl GpuMesh {
    /// Upload one mesh. Texture decode failures downgrade to the neutral
    /// fallback pixel with a warning; geometry upload itself cannot fail.
    pub fn upload(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        material_layout: &wgpu::BindGroupLayout,
        defaults: &MaterialDefaults,
        cache: &mut TextureCache<SharedTexture>,
        data: &MeshData,
    ) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{}_vertex_buffer", data.name)),
            contents: bytemuck::cast_slice(&data.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{}_index_buffer", data.name)),
            contents: bytemuck::cast_slice(&data.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let mut diffuse = None;
        let mut specular = None;
        let mut normal = None;
        for texture_ref in &data.textures {
            let key = texture_ref.source.cache_key();
            let entry = cache.load(&key, texture_ref.kind, || match texture_ref.source.decode() {
                Ok(pixels) => {
                    tracing::debug!("uploading {} texture {key}", texture_ref.kind.label());
                    Arc::new(GpuTexture::upload(
                        device,
                        queue,
                        &pixels,
                        texture_ref.kind,
                        Some(&key),
                    ))
                }
                Err(err) => {
                    tracing::warn!("texture {key}: {err}; using fallback pixel");
                    Arc::new(GpuTexture::fallback(device, queue, texture_ref.kind))
                }
            });
            let slot = match texture_ref.kind {
                TextureKind::Diffuse => &mut diffuse,
                TextureKind::Specular => &mut specular,
                TextureKind::Normal => &mut normal,
            };
            *slot = Some(entry.handle);
        }

        let has_tangents = has_tangent_frames(&data.vertices);
        let has_normal_map = match (&normal, has_tangents) {
            (Some(_), true) => true,
            (Some(_), false) => {
                tracing::warn!("{}: normal map ignored, mesh has no tangent frame", data.name);
                false
            }
            (None, _) => false,
        };

        let params = MaterialParams {
            base_color: data.base_color,
            has_normal_map: has_normal_map as u32,
            _pad: [0; 3],
        };
        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{}_material_params", data.name)),
            contents: bytemuck::bytes_of(&params),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let diffuse = diffuse.unwrap_or_else(|| defaults.white.clone());
        let specular = specular.unwrap_or_else(|| defaults.white.clone());
        let normal = normal.unwrap_or_else(|| defaults.flat_normal.clone());
        let material_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{}_material_bind_group", data.name)),
            layout: material_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&diffuse.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&diffuse.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&specular.view),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(&specular.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::TextureView(&normal.view),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: wgpu::BindingResource::Sampler(&normal.sampler),
                },
            ],
        });

        Self {
            vertex_buffer,
            index_buffer,
            index_count: data.indices.len() as u32,
            material_bind_group,
        }
    }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_bind_group(2, &self.material_bind_group, &[]);
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..self.index_count, 0, 0..1);
    }
}

/// All meshes of one imported scene plus the model-level transform.
pub struct GpuModel {
    pub transform: Transform,
    meshes: Vec<GpuMesh>,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl GpuModel {
    pub fn from_scene(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        model_layout: &wgpu::BindGroupLayout,
        material_layout: &wgpu::BindGroupLayout,
        defaults: &MaterialDefaults,
        scene: &SceneData,
    ) -> Self {
        let mut cache = TextureCache::new();
        let meshes: Vec<GpuMesh> = scene
            .meshes
            .iter()
            .map(|data| GpuMesh::upload(device, queue, material_layout, defaults, &mut cache, data))
            .collect();
        tracing::info!(
            "uploaded {} mesh(es), {} distinct texture(s)",
            meshes.len(),
            cache.len()
        );

        let transform = Transform::default();
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("model_uniform_buffer"),
            contents: bytemuck::bytes_of(&ModelUniforms::new(&transform)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("model_bind_group"),
            layout: model_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        Self {
            transform,
            meshes,
            uniform_buffer,
            bind_group,
        }
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    /// Push the current transform to the GPU. Call before drawing each frame.
    pub fn update(&self, queue: &wgpu::Queue) {
        queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::bytes_of(&ModelUniforms::new(&self.transform)),
        );
    }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_bind_group(1, &self.bind_group, &[]);
        for mesh in &self.meshes {
            mesh.draw(pass);
        }
    }
}
