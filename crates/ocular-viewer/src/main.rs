//! Interactive viewer: renders a demo scene offscreen, presents it, and
//! reports what lies under the cursor on click.

mod scene;

use anyhow::{Context, Result};
use ouroboros::self_referencing;
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalPosition};
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use ocular_engine::device::{Gpu, GpuInit, SurfaceErrorAction};
use ocular_engine::logging::{LoggingConfig, init_logging};
use ocular_engine::target::Size;

use scene::Scene;

#[self_referencing]
struct WindowEntry {
    window: Window,

    #[borrows(window)]
    #[covariant]
    gpu: Gpu<'this>,
}

struct Viewer {
    gpu_init: GpuInit,
    entry: Option<WindowEntry>,
    /// Rebuilt whenever the framebuffer size changes.
    scene: Option<Scene>,
    cursor: Option<PhysicalPosition<f64>>,
}

impl Viewer {
    fn new(gpu_init: GpuInit) -> Self {
        Self {
            gpu_init,
            entry: None,
            scene: None,
            cursor: None,
        }
    }

    fn create_window(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title("ocular viewer")
            .with_inner_size(LogicalSize::new(960.0, 640.0));
        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;

        let gpu_init = self.gpu_init.clone();
        let entry = WindowEntryTryBuilder {
            window,
            gpu_builder: |w| pollster::block_on(Gpu::new(w, gpu_init)),
        }
        .try_build()
        .context("GPU initialization failed for window")?;

        entry.with_window(|w| w.request_redraw());
        self.entry = Some(entry);
        Ok(())
    }

    /// Renders the scene and presents it. Returns `false` on a fatal surface error.
    fn redraw(&mut self) -> Result<bool> {
        let Some(entry) = self.entry.as_mut() else {
            return Ok(true);
        };
        let scene = &mut self.scene;

        entry.with_gpu_mut(|gpu| -> Result<bool> {
            let surface = gpu.size();
            let size = Size::new(surface.width, surface.height);
            if size.is_empty() {
                return Ok(true);
            }

            if scene.as_ref().map(Scene::size) != Some(size) {
                *scene = Some(Scene::create(&*gpu, size)?);
            }
            let Some(scene) = scene.as_mut() else {
                return Ok(true);
            };

            scene.render();

            let mut frame = match gpu.begin_frame() {
                Ok(frame) => frame,
                Err(err) => {
                    return Ok(gpu.handle_surface_error(err) != SurfaceErrorAction::Fatal);
                }
            };
            scene.present(&mut frame.target(gpu.surface_format()))?;
            gpu.submit(frame);
            Ok(true)
        })
    }

    fn pick_at_cursor(&self) {
        let (Some(scene), Some(cursor)) = (self.scene.as_ref(), self.cursor) else {
            return;
        };
        let (x, y) = (cursor.x.max(0.0) as u32, cursor.y.max(0.0) as u32);

        match scene.pick(x, y) {
            Ok(Some(pick)) if pick.object_id == ocular_engine::target::NO_OBJECT => {
                log::info!("({x}, {y}): background");
            }
            Ok(Some(pick)) => {
                log::info!("({x}, {y}): object {} at distance {:.3}", pick.object_id, pick.distance);
            }
            Ok(None) => {}
            Err(e) => log::error!("pick failed: {e:#}"),
        }
    }
}

impl ApplicationHandler for Viewer {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.entry.is_some() {
            return;
        }
        if let Err(e) = self.create_window(event_loop) {
            log::error!("failed to create window: {e:#}");
            event_loop.exit();
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Wait);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                self.scene = None;
                self.entry = None;
                event_loop.exit();
            }

            WindowEvent::Resized(new_size) => {
                if let Some(entry) = self.entry.as_mut() {
                    entry.with_gpu_mut(|gpu| gpu.resize(new_size));
                    entry.with_window(|w| w.request_redraw());
                }
            }

            WindowEvent::CursorMoved { position, .. } => self.cursor = Some(position),
            WindowEvent::CursorLeft { .. } => self.cursor = None,

            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => self.pick_at_cursor(),

            WindowEvent::RedrawRequested => match self.redraw() {
                Ok(true) => {}
                Ok(false) => {
                    log::error!("surface lost beyond recovery; exiting");
                    event_loop.exit();
                }
                Err(e) => {
                    log::error!("frame failed: {e:#}");
                    event_loop.exit();
                }
            },

            _ => {}
        }
    }
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
    let mut viewer = Viewer::new(GpuInit::default());

    event_loop
        .run_app(&mut viewer)
        .context("winit event loop terminated with error")?;

    Ok(())
}
