//! Scene import and texture bookkeeping for the meshview tools.
//!
//! Everything here is CPU-side and device-free: [`import::load_scene`] turns a
//! glTF file into [`SceneData`], and [`cache::TextureCache`] guarantees one
//! decode per distinct texture source. GPU upload lives in
//! `meshview-render-wgpu`, which keeps this crate testable without a device.

pub mod cache;
pub mod import;

pub use cache::{CacheEntry, TextureCache};
pub use import::{
    decode_image, load_image, load_scene, ImportError, ImportOptions, MeshData, SceneData,
    TextureKind, TextureRef, TextureSource, Vertex,
};
