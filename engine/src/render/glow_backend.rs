// Distributed under the GNU Affero General Public License v3.0 or later.
// See accompanying file LICENSE or https://www.gnu.org/licenses/agpl-3.0.html for details.

use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::c_void;
use std::mem::offset_of;

use glow::{Context as GlowContext, HasContext};

use crate::error::{EngineError, EngineResult, ShaderStage};
use crate::handles::TextureHandle;
use crate::render::bindless_extension::BindlessTextureFns;
use crate::render::renderer_backends::{
    BINDLESS_TEXTURE_EXTENSION, FilterMode, GraphicsBackend, PixelUpload, QuadVertex,
    SamplerParams, WrapMode,
};

#[derive(Debug, Clone, Copy)]
pub struct GlowGeometry {
    vao: glow::VertexArray,
    vbo: glow::Buffer,
    ebo: glow::Buffer,
}

/// OpenGL backend on top of glow, plus the bindless entry points glow lacks.
pub struct GlowBackend {
    gl: GlowContext,
    bindless: Option<BindlessTextureFns>,
    uniform_cache: RefCell<HashMap<(glow::Program, String), Option<glow::UniformLocation>>>,
}

impl GlowBackend {
    /// # Safety
    /// The context behind `gl` must be current on this thread, and `loader`
    /// must resolve function pointers for that same context.
    pub unsafe fn new(gl: GlowContext, loader: impl FnMut(&str) -> *const c_void) -> Self {
        let bindless = if gl.supported_extensions().contains(BINDLESS_TEXTURE_EXTENSION) {
            unsafe { BindlessTextureFns::load(loader) }
        } else {
            None
        };

        Self {
            gl,
            bindless,
            uniform_cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn log_context_info(&self) {
        unsafe {
            log::info!("OpenGL Version: {}", self.gl.get_parameter_string(glow::VERSION));
            log::info!(
                "GLSL Version: {}",
                self.gl.get_parameter_string(glow::SHADING_LANGUAGE_VERSION)
            );
            log::info!("Renderer: {}", self.gl.get_parameter_string(glow::RENDERER));
        }
        log::debug!(
            "{} extensions reported by the driver",
            self.gl.supported_extensions().len()
        );
    }

    fn compile_stage(&self, stage: ShaderStage, source: &str) -> EngineResult<glow::Shader> {
        let kind = match stage {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        };

        unsafe {
            let shader = self.gl.create_shader(kind).map_err(EngineError::Gl)?;
            self.gl.shader_source(shader, source);
            self.gl.compile_shader(shader);
            if !self.gl.get_shader_compile_status(shader) {
                let log = self.gl.get_shader_info_log(shader);
                self.gl.delete_shader(shader);
                return Err(EngineError::ShaderCompile { stage, log });
            }
            Ok(shader)
        }
    }

    fn gl_wrap(mode: WrapMode) -> i32 {
        match mode {
            WrapMode::Repeat => glow::REPEAT as i32,
            WrapMode::ClampToEdge => glow::CLAMP_TO_EDGE as i32,
        }
    }

    fn gl_filter(mode: FilterMode) -> i32 {
        match mode {
            FilterMode::Linear => glow::LINEAR as i32,
            FilterMode::Nearest => glow::NEAREST as i32,
            FilterMode::LinearMipmapLinear => glow::LINEAR_MIPMAP_LINEAR as i32,
        }
    }
}

impl GraphicsBackend for GlowBackend {
    type Texture = glow::Texture;
    type Buffer = glow::Buffer;
    type Program = glow::Program;
    type Geometry = GlowGeometry;

    fn has_extension(&self, name: &str) -> bool {
        let reported = self.gl.supported_extensions().contains(name);
        if name == BINDLESS_TEXTURE_EXTENSION {
            // Advertised but unloadable counts as missing.
            reported && self.bindless.is_some()
        } else {
            reported
        }
    }

    fn create_texture(&self) -> EngineResult<Self::Texture> {
        unsafe { self.gl.create_texture().map_err(EngineError::Gl) }
    }

    fn configure_sampling(&self, texture: Self::Texture, params: &SamplerParams) {
        unsafe {
            self.gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            self.gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_S,
                Self::gl_wrap(params.wrap_s),
            );
            self.gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_T,
                Self::gl_wrap(params.wrap_t),
            );
            self.gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MIN_FILTER,
                Self::gl_filter(params.min_filter),
            );
            self.gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MAG_FILTER,
                Self::gl_filter(params.mag_filter),
            );
        }
    }

    fn upload_texture(&self, texture: Self::Texture, upload: PixelUpload<'_>) {
        let (internal_format, format) = upload.layout.gl_formats();
        unsafe {
            self.gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            // RGB rows are not 4-byte aligned for most widths.
            self.gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
            self.gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                internal_format,
                upload.width as i32,
                upload.height as i32,
                0,
                format,
                glow::UNSIGNED_BYTE,
                glow::PixelUnpackData::Slice(Some(upload.pixels)),
            );
            self.gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 4);
        }
    }

    fn generate_mipmaps(&self, texture: Self::Texture) {
        unsafe {
            self.gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            self.gl.generate_mipmap(glow::TEXTURE_2D);
            self.gl.bind_texture(glow::TEXTURE_2D, None);
        }
    }

    fn delete_texture(&self, texture: Self::Texture) {
        unsafe { self.gl.delete_texture(texture) }
    }

    fn texture_handle(&self, texture: Self::Texture) -> TextureHandle {
        match &self.bindless {
            Some(fns) => TextureHandle(fns.get_texture_handle(texture.0.get())),
            None => TextureHandle::NULL,
        }
    }

    fn is_texture_handle_resident(&self, handle: TextureHandle) -> bool {
        self.bindless
            .as_ref()
            .is_some_and(|fns| fns.is_texture_handle_resident(handle.0))
    }

    fn make_texture_handle_resident(&self, handle: TextureHandle) {
        if let Some(fns) = &self.bindless {
            fns.make_texture_handle_resident(handle.0);
        }
    }

    fn make_texture_handle_non_resident(&self, handle: TextureHandle) {
        if let Some(fns) = &self.bindless {
            fns.make_texture_handle_non_resident(handle.0);
        }
    }

    fn create_storage_buffer(&self, data: &[u8]) -> EngineResult<Self::Buffer> {
        unsafe {
            let buffer = self.gl.create_buffer().map_err(EngineError::Gl)?;
            self.gl.bind_buffer(glow::SHADER_STORAGE_BUFFER, Some(buffer));
            self.gl
                .buffer_data_u8_slice(glow::SHADER_STORAGE_BUFFER, data, glow::STATIC_DRAW);
            self.gl.bind_buffer(glow::SHADER_STORAGE_BUFFER, None);
            Ok(buffer)
        }
    }

    fn bind_storage_buffer(&self, slot: u32, buffer: Self::Buffer) {
        unsafe {
            self.gl
                .bind_buffer_base(glow::SHADER_STORAGE_BUFFER, slot, Some(buffer));
        }
    }

    fn delete_buffer(&self, buffer: Self::Buffer) {
        unsafe { self.gl.delete_buffer(buffer) }
    }

    fn compile_program(&self, vertex_src: &str, fragment_src: &str) -> EngineResult<Self::Program> {
        let vertex_shader = self.compile_stage(ShaderStage::Vertex, vertex_src)?;
        let fragment_shader = match self.compile_stage(ShaderStage::Fragment, fragment_src) {
            Ok(shader) => shader,
            Err(e) => {
                unsafe { self.gl.delete_shader(vertex_shader) };
                return Err(e);
            }
        };

        unsafe {
            let program = match self.gl.create_program() {
                Ok(program) => program,
                Err(e) => {
                    self.gl.delete_shader(vertex_shader);
                    self.gl.delete_shader(fragment_shader);
                    return Err(EngineError::Gl(e));
                }
            };
            self.gl.attach_shader(program, vertex_shader);
            self.gl.attach_shader(program, fragment_shader);
            self.gl.link_program(program);

            let linked = self.gl.get_program_link_status(program);
            let log = self.gl.get_program_info_log(program);

            // Linked into the program; no longer needed either way.
            self.gl.detach_shader(program, vertex_shader);
            self.gl.detach_shader(program, fragment_shader);
            self.gl.delete_shader(vertex_shader);
            self.gl.delete_shader(fragment_shader);

            if !linked {
                self.gl.delete_program(program);
                return Err(EngineError::ProgramLink { log });
            }
            Ok(program)
        }
    }

    fn use_program(&self, program: Self::Program) {
        unsafe { self.gl.use_program(Some(program)) }
    }

    fn set_uniform_u32(&self, program: Self::Program, name: &str, value: u32) {
        let mut cache = self.uniform_cache.borrow_mut();
        let location = cache
            .entry((program, name.to_string()))
            .or_insert_with(|| {
                let location = unsafe { self.gl.get_uniform_location(program, name) };
                if location.is_none() {
                    log::warn!("Uniform {} not found in program", name);
                }
                location
            });
        unsafe { self.gl.uniform_1_u32(location.as_ref(), value) }
    }

    fn delete_program(&self, program: Self::Program) {
        self.uniform_cache
            .borrow_mut()
            .retain(|(cached, _), _| *cached != program);
        unsafe { self.gl.delete_program(program) }
    }

    fn create_geometry(&self, vertices: &[QuadVertex], indices: &[u32]) -> EngineResult<Self::Geometry> {
        unsafe {
            let vao = self.gl.create_vertex_array().map_err(EngineError::Gl)?;
            let vbo = self.gl.create_buffer().map_err(EngineError::Gl)?;
            let ebo = self.gl.create_buffer().map_err(EngineError::Gl)?;

            self.gl.bind_vertex_array(Some(vao));

            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
            self.gl.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                bytemuck::cast_slice(vertices),
                glow::STATIC_DRAW,
            );

            self.gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(ebo));
            self.gl.buffer_data_u8_slice(
                glow::ELEMENT_ARRAY_BUFFER,
                bytemuck::cast_slice(indices),
                glow::STATIC_DRAW,
            );

            let stride = size_of::<QuadVertex>() as i32;
            self.gl.vertex_attrib_pointer_f32(
                0,
                3,
                glow::FLOAT,
                false,
                stride,
                offset_of!(QuadVertex, position) as i32,
            );
            self.gl.enable_vertex_attrib_array(0);
            self.gl.vertex_attrib_pointer_f32(
                1,
                2,
                glow::FLOAT,
                false,
                stride,
                offset_of!(QuadVertex, uv) as i32,
            );
            self.gl.enable_vertex_attrib_array(1);

            self.gl.bind_vertex_array(None);
            Ok(GlowGeometry { vao, vbo, ebo })
        }
    }

    fn draw_indexed(&self, geometry: Self::Geometry, index_count: u32) {
        unsafe {
            self.gl.bind_vertex_array(Some(geometry.vao));
            self.gl
                .draw_elements(glow::TRIANGLES, index_count as i32, glow::UNSIGNED_INT, 0);
            self.gl.bind_vertex_array(None);
        }
    }

    fn delete_geometry(&self, geometry: Self::Geometry) {
        unsafe {
            self.gl.delete_vertex_array(geometry.vao);
            self.gl.delete_buffer(geometry.vbo);
            self.gl.delete_buffer(geometry.ebo);
        }
    }

    fn viewport(&self, width: u32, height: u32) {
        unsafe { self.gl.viewport(0, 0, width as i32, height as i32) }
    }

    fn clear(&self, color: [f32; 4]) {
        unsafe {
            self.gl.clear_color(color[0], color[1], color[2], color[3]);
            self.gl.clear(glow::COLOR_BUFFER_BIT);
        }
    }
}
