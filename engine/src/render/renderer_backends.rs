// Distributed under the GNU Affero General Public License v3.0 or later.
// See accompanying file LICENSE or https://www.gnu.org/licenses/agpl-3.0.html for details.

use std::fmt::Debug;

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

use crate::assets::image_decoder::ChannelLayout;
use crate::error::EngineResult;
use crate::handles::TextureHandle;

pub const BINDLESS_TEXTURE_EXTENSION: &str = "GL_ARB_bindless_texture";
pub const SHADER_INT64_EXTENSION: &str = "GL_ARB_gpu_shader_int64";

/// Extensions that must be present before any texture is created.
pub const REQUIRED_EXTENSIONS: [&str; 2] = [BINDLESS_TEXTURE_EXTENSION, SHADER_INT64_EXTENSION];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapMode {
    Repeat,
    ClampToEdge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Linear,
    Nearest,
    LinearMipmapLinear,
}

/// Sampler state baked into a texture before its bindless handle is taken.
/// The handle freezes this state, so it cannot be changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerParams {
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
}

impl Default for SamplerParams {
    fn default() -> Self {
        Self {
            wrap_s: WrapMode::Repeat,
            wrap_t: WrapMode::Repeat,
            min_filter: FilterMode::LinearMipmapLinear,
            mag_filter: FilterMode::Linear,
        }
    }
}

/// Borrowed view of pixel data for an upload.
#[derive(Debug, Clone, Copy)]
pub struct PixelUpload<'a> {
    pub width: u32,
    pub height: u32,
    pub layout: ChannelLayout,
    pub pixels: &'a [u8],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: Vec3,
    pub uv: Vec2,
}

/// Every GPU call the demo makes. Resource types are plain ids; ownership and
/// release ordering live in the wrappers that hold them.
pub trait GraphicsBackend {
    type Texture: Copy + Debug;
    type Buffer: Copy + Debug;
    type Program: Copy + Debug;
    type Geometry: Copy + Debug;

    fn has_extension(&self, name: &str) -> bool;

    fn create_texture(&self) -> EngineResult<Self::Texture>;
    fn configure_sampling(&self, texture: Self::Texture, params: &SamplerParams);
    fn upload_texture(&self, texture: Self::Texture, upload: PixelUpload<'_>);
    fn generate_mipmaps(&self, texture: Self::Texture);
    fn delete_texture(&self, texture: Self::Texture);

    /// Returns [`TextureHandle::NULL`] if the driver refused.
    fn texture_handle(&self, texture: Self::Texture) -> TextureHandle;
    fn is_texture_handle_resident(&self, handle: TextureHandle) -> bool;
    fn make_texture_handle_resident(&self, handle: TextureHandle);
    fn make_texture_handle_non_resident(&self, handle: TextureHandle);

    /// Creates a write-once storage buffer holding exactly `data`.
    fn create_storage_buffer(&self, data: &[u8]) -> EngineResult<Self::Buffer>;
    fn bind_storage_buffer(&self, slot: u32, buffer: Self::Buffer);
    fn delete_buffer(&self, buffer: Self::Buffer);

    fn compile_program(&self, vertex_src: &str, fragment_src: &str) -> EngineResult<Self::Program>;
    fn use_program(&self, program: Self::Program);
    fn set_uniform_u32(&self, program: Self::Program, name: &str, value: u32);
    fn delete_program(&self, program: Self::Program);

    fn create_geometry(&self, vertices: &[QuadVertex], indices: &[u32]) -> EngineResult<Self::Geometry>;
    fn draw_indexed(&self, geometry: Self::Geometry, index_count: u32);
    fn delete_geometry(&self, geometry: Self::Geometry);

    fn viewport(&self, width: u32, height: u32);
    fn clear(&self, color: [f32; 4]);
}

/// First required extension the backend lacks, if any.
pub fn missing_capability<B: GraphicsBackend + ?Sized>(backend: &B) -> Option<&'static str> {
    REQUIRED_EXTENSIONS
        .iter()
        .copied()
        .find(|extension| !backend.has_extension(extension))
}
