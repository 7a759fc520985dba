// Distributed under the GNU Affero General Public License v3.0 or later.
// See accompanying file LICENSE or https://www.gnu.org/licenses/agpl-3.0.html for details.

use std::path::PathBuf;
use std::rc::Rc;

use crate::assets::image_decoder::ImageDecoder;
use crate::error::{EngineError, EngineResult};
use crate::handles::TextureHandle;
use crate::render::handle_acquisition::HandleAcquisitionService;
use crate::render::handle_table::{HandleTable, ShaderVisibleBuffer};
use crate::render::quad::QuadGeometry;
use crate::render::renderer_backends::{GraphicsBackend, SamplerParams, missing_capability};
use crate::render::shader::{BindlessShaderSources, ShaderProgram};
use crate::render::texture::ResidentTexture;
use crate::settings::Settings;

#[derive(Debug, Clone, PartialEq)]
pub struct SceneConfig {
    pub images: Vec<PathBuf>,
    pub texture_index: u32,
    pub binding_slot: u32,
    pub clear_color: [f32; 4],
    pub sampler: SamplerParams,
}

impl SceneConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            images: settings.textures.images.clone(),
            texture_index: settings.textures.texture_index,
            binding_slot: settings.textures.binding_slot,
            clear_color: settings.renderer.clear_color,
            sampler: SamplerParams::default(),
        }
    }
}

/// Everything one frame needs, acquired in a single all-or-nothing setup.
pub struct BindlessScene<B: GraphicsBackend> {
    // Fields drop in declaration order: the buffer holding the handles goes
    // first, then the textures the handles belong to.
    handle_buffer: ShaderVisibleBuffer<B>,
    table: HandleTable,
    textures: Vec<ResidentTexture<B>>,
    quad: QuadGeometry<B>,
    program: ShaderProgram<B>,
    backend: Rc<B>,
    binding_slot: u32,
    texture_index: u32,
    clear_color: [f32; 4],
}

impl<B: GraphicsBackend> BindlessScene<B> {
    /// Checks capabilities, compiles the program, acquires every texture,
    /// then builds the handle table buffer.
    ///
    /// Any failure returns early; whatever was already created is dropped
    /// and therefore released, and no buffer is ever built from a partial
    /// table.
    pub fn setup(backend: Rc<B>, decoder: &dyn ImageDecoder, config: &SceneConfig) -> EngineResult<Self> {
        if let Some(extension) = missing_capability(backend.as_ref()) {
            return Err(EngineError::CapabilityMissing {
                extension: extension.to_string(),
            });
        }
        log::info!("Bindless texture capabilities present");

        let program = ShaderProgram::compile(
            backend.clone(),
            &BindlessShaderSources::new(config.binding_slot),
        )?;
        let quad = QuadGeometry::new(backend.clone())?;

        let acquisition = HandleAcquisitionService::with_sampler(backend.clone(), config.sampler);
        let textures = acquisition.acquire_all(config.images.as_slice(), decoder)?;

        let table = HandleTable::from_textures(&textures);
        if table.is_empty() {
            return Err(EngineError::EmptyHandleTable);
        }
        table.checked_index(config.texture_index)?;

        let handle_buffer = ShaderVisibleBuffer::build(backend.clone(), &table)?;
        log::info!(
            "Handle table ready: {} handles at binding {}, drawing index {}",
            table.len(),
            config.binding_slot,
            config.texture_index
        );

        Ok(Self {
            handle_buffer,
            table,
            textures,
            quad,
            program,
            backend,
            binding_slot: config.binding_slot,
            texture_index: config.texture_index,
            clear_color: config.clear_color,
        })
    }

    pub fn draw_frame(&self, width: u32, height: u32) {
        self.backend.viewport(width, height);
        self.backend.clear(self.clear_color);

        self.program.bind();
        self.program.set_texture_index(self.texture_index);
        self.handle_buffer.publish_for_draw(self.binding_slot);
        self.quad.draw();
    }

    pub fn set_texture_index(&mut self, index: u32) -> EngineResult<()> {
        self.table.checked_index(index)?;
        self.texture_index = index;
        Ok(())
    }

    /// Moves the selection by `delta`, wrapping around the table.
    pub fn step_texture_index(&mut self, delta: i32) {
        let len = self.table.len() as i64;
        let next = (self.texture_index as i64 + delta as i64).rem_euclid(len);
        self.texture_index = next as u32;
        log::info!(
            "Drawing texture {} ({})",
            self.texture_index,
            self.textures[self.texture_index as usize].label
        );
    }

    pub fn texture_index(&self) -> u32 {
        self.texture_index
    }

    pub fn selected_handle(&self) -> TextureHandle {
        self.table.handles()[self.texture_index as usize]
    }

    pub fn table(&self) -> &HandleTable {
        &self.table
    }

    pub fn textures(&self) -> &[ResidentTexture<B>] {
        &self.textures
    }

    pub fn handle_buffer(&self) -> &ShaderVisibleBuffer<B> {
        &self.handle_buffer
    }
}
