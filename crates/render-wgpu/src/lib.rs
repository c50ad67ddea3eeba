//! wgpu renderer for the meshview tools.
//!
//! [`SceneRenderer`] owns the device, surface and pipeline; [`GpuModel`] holds
//! the uploaded meshes of one scene; [`FlyCamera`] is the view state the
//! desktop app drives. Shader programs are compiled from WGSL files at run
//! time and failures are tagged with the stage that produced them, so a broken
//! shader downgrades the viewer to a cleared background instead of killing it.

pub mod camera;
pub mod gpu;
pub mod mesh;
pub mod shader;
pub mod texture;

pub use camera::{FlyCamera, MoveDirection};
pub use gpu::{RendererError, SceneRenderer, LIGHT_COLOR, LIGHT_POSITION};
pub use mesh::{GpuMesh, GpuModel};
pub use shader::{ShaderError, ShaderStage};
pub use texture::{GpuTexture, MaterialDefaults, SharedTexture};
