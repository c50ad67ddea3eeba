//! GPU texture upload and the built-in neutral pixels.

use std::sync::Arc;

use meshview_assets::TextureKind;

/// Cache handle type: one texture shared by every mesh that references it.
pub type SharedTexture = Arc<GpuTexture>;

/// A sampled texture with its view and sampler, ready to bind.
#[derive(Debug)]
pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

impl GpuTexture {
    /// Upload decoded RGBA8 pixels. Colour data goes up as sRGB, specular and
    /// normal data stay linear.
    pub fn upload(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        pixels: &image::RgbaImage,
        kind: TextureKind,
        label: Option<&str>,
    ) -> Self {
        let (width, height) = pixels.dimensions();
        Self::from_raw(device, queue, pixels.as_raw(), width, height, format_for(kind), label)
    }

    /// 1x1 neutral pixel for a slot: white for colour and specular data, flat
    /// +Z for normal maps. Used both for empty slots and as the stand-in when
    /// an image fails to decode.
    pub fn fallback(device: &wgpu::Device, queue: &wgpu::Queue, kind: TextureKind) -> Self {
        let (rgba, label) = match kind {
            TextureKind::Normal => ([128, 128, 255, 255], "fallback_flat_normal"),
            TextureKind::Diffuse | TextureKind::Specular => ([255, 255, 255, 255], "fallback_white"),
        };
        Self::from_raw(device, queue, &rgba, 1, 1, format_for(kind), Some(label))
    }

    fn from_raw(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        data: &[u8],
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        label: Option<&str>,
    ) -> Self {
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label,
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            size,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label,
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        Self {
            texture,
            view,
            sampler,
        }
    }
}

fn format_for(kind: TextureKind) -> wgpu::TextureFormat {
    match kind {
        TextureKind::Diffuse => wgpu::TextureFormat::Rgba8UnormSrgb,
        TextureKind::Specular | TextureKind::Normal => wgpu::TextureFormat::Rgba8Unorm,
    }
}

/// Neutral textures created once and bound wherever a mesh has no image of
/// its own.
#[derive(Debug)]
pub struct MaterialDefaults {
    pub white: SharedTexture,
    pub flat_normal: SharedTexture,
}

impl MaterialDefaults {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        Self {
            white: Arc::new(GpuTexture::fallback(device, queue, TextureKind::Diffuse)),
            flat_normal: Arc::new(GpuTexture::fallback(device, queue, TextureKind::Normal)),
        }
    }
}
