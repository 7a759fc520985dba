// Distributed under the GNU Affero General Public License v3.0 or later.
// See accompanying file LICENSE or https://www.gnu.org/licenses/agpl-3.0.html for details.

pub mod assets;
pub mod error;
pub mod handles;
pub mod render;
pub mod settings;

use std::ffi::c_void;
use std::rc::Rc;
use std::thread::sleep;
use std::time::{Duration, Instant};

use sdl2::event::Event;
use sdl2::keyboard::Keycode;
use sdl2::video::SwapInterval;

pub use crate::assets::image_decoder::{ChannelLayout, DecodedImage, ImageCrateDecoder, ImageDecoder};
pub use crate::error::{EngineError, EngineResult, ShaderStage};
pub use crate::handles::{Residency, TextureHandle};
pub use crate::render::bindless_scene::{BindlessScene, SceneConfig};
pub use crate::render::glow_backend::GlowBackend;
pub use crate::render::handle_acquisition::HandleAcquisitionService;
pub use crate::render::handle_table::{HandleTable, ShaderVisibleBuffer};
pub use crate::render::null_backend::{BackendCall, NullBackend};
pub use crate::render::renderer_backends::GraphicsBackend;
pub use crate::render::texture::ResidentTexture;
pub use crate::settings::Settings;

/// Opens the window, sets up the bindless scene and runs the frame loop
/// until the window is closed.
pub struct Engine {
    settings: Settings,
}

impl Engine {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    pub fn run(&self) -> EngineResult<()> {
        let (window, video, mut events_loop, _context, backend) = self.create_sdl2_context()?;
        backend.log_context_info();
        let backend = Rc::new(backend);

        let decoder = ImageCrateDecoder::new(self.settings.textures.flip_vertically);
        let mut scene = BindlessScene::setup(
            backend,
            &decoder,
            &SceneConfig::from_settings(&self.settings),
        )?;

        if self.settings.window.vsync {
            if let Err(e) = video.gl_set_swap_interval(SwapInterval::VSync) {
                log::warn!("VSync unavailable: {}", e);
            }
        }

        let target_frame = Duration::from_secs_f64(1.0 / self.settings.renderer.target_fps.max(1) as f64);

        'render: loop {
            let frame_start = Instant::now();

            for event in events_loop.poll_iter() {
                match event {
                    Event::Quit { .. }
                    | Event::KeyDown {
                        keycode: Some(Keycode::Escape),
                        ..
                    } => break 'render,
                    Event::KeyDown {
                        keycode: Some(Keycode::Right),
                        ..
                    } => scene.step_texture_index(1),
                    Event::KeyDown {
                        keycode: Some(Keycode::Left),
                        ..
                    } => scene.step_texture_index(-1),
                    _ => {}
                }
            }

            let (width, height) = window.drawable_size();
            scene.draw_frame(width, height);
            window.gl_swap_window();

            let frame_time = frame_start.elapsed();
            if frame_time < target_frame {
                sleep(target_frame - frame_time);
            }
        }

        log::info!("Shutting down");
        Ok(())
    }

    fn create_sdl2_context(
        &self,
    ) -> EngineResult<(
        sdl2::video::Window,
        sdl2::VideoSubsystem,
        sdl2::EventPump,
        sdl2::video::GLContext,
        GlowBackend,
    )> {
        let sdl = sdl2::init().map_err(EngineError::Window)?;
        let video = sdl.video().map_err(EngineError::Window)?;
        let gl_attr = video.gl_attr();
        gl_attr.set_context_profile(sdl2::video::GLProfile::Core);
        gl_attr.set_context_version(4, 6);
        gl_attr.set_context_flags().forward_compatible().set();

        let window_settings = &self.settings.window;
        let window = video
            .window(&window_settings.title, window_settings.width, window_settings.height)
            .opengl()
            .resizable()
            .build()
            .map_err(|e| EngineError::Window(e.to_string()))?;
        let gl_context = window.gl_create_context().map_err(EngineError::Window)?;
        window
            .gl_make_current(&gl_context)
            .map_err(EngineError::Window)?;

        let backend = unsafe {
            let gl = glow::Context::from_loader_function(|s| video.gl_get_proc_address(s) as *const _);
            GlowBackend::new(gl, |s| video.gl_get_proc_address(s) as *const c_void)
        };
        let event_loop = sdl.event_pump().map_err(EngineError::Window)?;

        Ok((window, video, event_loop, gl_context, backend))
    }
}
