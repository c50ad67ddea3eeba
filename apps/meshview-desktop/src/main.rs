//! Desktop glTF viewer with a free-fly camera.
//!
//! Lifecycle: the event loop starts empty, `resumed` builds the window,
//! renderer, shader program and model, and from then on every frame drains
//! held keys into camera movement, spins the model and redraws. Setup
//! failures end the process with an error; shader and asset trouble degrade
//! to a cleared background or a partial scene instead.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context as _;
use clap::Parser;
use meshview_assets::ImportOptions;
use meshview_render_wgpu::{FlyCamera, GpuModel, MoveDirection, SceneRenderer};
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{DeviceEvent, DeviceId, ElementState, KeyEvent, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{CursorGrabMode, Window, WindowId};

const WINDOW_WIDTH: u32 = 1280;
const WINDOW_HEIGHT: u32 = 720;
/// Idle model spin, degrees per second.
const SPIN_RATE: f32 = 20.0;
/// Longest frame step fed to movement, so a stall cannot teleport the camera.
const MAX_FRAME_STEP: f32 = 0.1;

#[derive(Debug, Parser)]
#[command(name = "meshview", version, about = "Minimal glTF scene viewer")]
struct Cli {
    /// Model to view (.gltf or .glb).
    #[arg(default_value = "assets/models/cube.gltf")]
    model: PathBuf,
    /// Vertex shader source.
    #[arg(long, default_value = "assets/shaders/model.vert.wgsl")]
    vertex_shader: PathBuf,
    /// Fragment shader source.
    #[arg(long, default_value = "assets/shaders/model.frag.wgsl")]
    fragment_shader: PathBuf,
    /// Flip the V texture coordinate on import.
    #[arg(long)]
    flip_v: bool,
    /// Debug-level logging (RUST_LOG still wins when set).
    #[arg(long, short)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    tracing::info!("meshview starting");

    let event_loop = EventLoop::new().context("failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);
    let mut app = ViewerApp {
        cli,
        state: None,
        init_error: None,
    };
    event_loop.run_app(&mut app).context("event loop failed")?;
    match app.init_error {
        Some(err) => Err(err),
        None => {
            tracing::info!("viewer shut down");
            Ok(())
        }
    }
}

struct ViewerApp {
    cli: Cli,
    state: Option<ViewerState>,
    init_error: Option<anyhow::Error>,
}

struct ViewerState {
    window: Arc<Window>,
    renderer: SceneRenderer,
    camera: FlyCamera,
    model: Option<GpuModel>,
    keys_held: HashSet<KeyCode>,
    last_frame: Instant,
}

impl ViewerApp {
    fn init(&self, event_loop: &ActiveEventLoop) -> anyhow::Result<ViewerState> {
        let window = Arc::new(
            event_loop
                .create_window(
                    Window::default_attributes()
                        .with_title("MeshView")
                        .with_inner_size(LogicalSize::new(WINDOW_WIDTH, WINDOW_HEIGHT)),
                )
                .context("failed to create window")?,
        );
        let size = window.inner_size();
        let mut renderer = SceneRenderer::new(window.clone(), size.width, size.height)
            .context("renderer setup failed")?;

        if let Err(err) = renderer.load_pipeline(&self.cli.vertex_shader, &self.cli.fragment_shader)
        {
            tracing::error!("{err}");
            tracing::warn!("no usable shader program; showing background only");
        }

        let options = ImportOptions {
            flip_v: self.cli.flip_v,
            ..ImportOptions::default()
        };
        let model = match meshview_assets::load_scene(&self.cli.model, options) {
            Ok(scene) => {
                if scene.meshes.is_empty() {
                    tracing::warn!("{} contains no meshes", self.cli.model.display());
                }
                Some(renderer.upload_model(&scene))
            }
            Err(err) => {
                tracing::warn!(
                    "failed to load {}: {err}; showing empty scene",
                    self.cli.model.display()
                );
                None
            }
        };

        if let Err(err) = window
            .set_cursor_grab(CursorGrabMode::Confined)
            .or_else(|_| window.set_cursor_grab(CursorGrabMode::Locked))
        {
            tracing::warn!("cursor grab unavailable: {err}");
        }
        window.set_cursor_visible(false);
        window.request_redraw();

        Ok(ViewerState {
            window,
            renderer,
            camera: FlyCamera::new(),
            model,
            keys_held: HashSet::new(),
            last_frame: Instant::now(),
        })
    }
}

impl ViewerState {
    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let dt = self.last_frame.elapsed().as_secs_f32().min(MAX_FRAME_STEP);
        self.last_frame = Instant::now();

        let ViewerState {
            keys_held, camera, ..
        } = self;
        for key in keys_held.iter() {
            if let Some(direction) = move_binding(*key) {
                camera.translate(direction, dt);
            }
        }
        if let Some(model) = &mut self.model {
            model.transform.rotation.y += SPIN_RATE * dt;
        }

        match self.renderer.render(&self.camera, self.model.as_ref()) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let size = self.window.inner_size();
                self.renderer.resize(size.width, size.height);
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                tracing::error!("surface out of memory, shutting down");
                event_loop.exit();
            }
            Err(err) => tracing::warn!("frame dropped: {err}"),
        }
        self.window.request_redraw();
    }
}

impl ApplicationHandler for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        match self.init(event_loop) {
            Ok(state) => {
                tracing::info!("viewer ready");
                self.state = Some(state);
            }
            Err(err) => {
                self.init_error = Some(err);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => state.renderer.resize(size.width, size.height),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: key_state,
                        ..
                    },
                ..
            } => match key_state {
                ElementState::Pressed if code == KeyCode::Escape => event_loop.exit(),
                ElementState::Pressed => {
                    state.keys_held.insert(code);
                }
                ElementState::Released => {
                    state.keys_held.remove(&code);
                }
            },
            WindowEvent::MouseWheel { delta, .. } => {
                let scroll = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(position) => position.y as f32 / 40.0,
                };
                state.camera.process_scroll(scroll);
            }
            WindowEvent::RedrawRequested => state.redraw(event_loop),
            _ => {}
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        if let (Some(state), DeviceEvent::MouseMotion { delta: (dx, dy) }) =
            (self.state.as_mut(), event)
        {
            state.camera.process_mouse(dx as f32, dy as f32);
        }
    }
}

fn move_binding(code: KeyCode) -> Option<MoveDirection> {
    match code {
        KeyCode::KeyW => Some(MoveDirection::Forward),
        KeyCode::KeyS => Some(MoveDirection::Backward),
        KeyCode::KeyA => Some(MoveDirection::Left),
        KeyCode::KeyD => Some(MoveDirection::Right),
        KeyCode::Space => Some(MoveDirection::Up),
        KeyCode::ControlLeft => Some(MoveDirection::Down),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn wasd_maps_to_planar_movement() {
        assert_eq!(move_binding(KeyCode::KeyW), Some(MoveDirection::Forward));
        assert_eq!(move_binding(KeyCode::KeyS), Some(MoveDirection::Backward));
        assert_eq!(move_binding(KeyCode::KeyA), Some(MoveDirection::Left));
        assert_eq!(move_binding(KeyCode::KeyD), Some(MoveDirection::Right));
    }

    #[test]
    fn vertical_keys_map_to_world_up_and_down() {
        assert_eq!(move_binding(KeyCode::Space), Some(MoveDirection::Up));
        assert_eq!(move_binding(KeyCode::ControlLeft), Some(MoveDirection::Down));
        assert_eq!(move_binding(KeyCode::Tab), None);
    }
}
