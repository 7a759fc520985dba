// Distributed under the GNU Affero General Public License v3.0 or later.
// See accompanying file LICENSE or https://www.gnu.org/licenses/agpl-3.0.html for details.

//! Headless backend that records what the engine asks of the GPU.
//!
//! It hands out synthetic ids and distinct non-zero handles, keeps the
//! residency table a real driver would keep, and counts protocol violations
//! (making a resident handle resident again, releasing a non-resident one)
//! instead of exhibiting undefined behaviour.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use crate::assets::image_decoder::ChannelLayout;
use crate::error::{EngineError, EngineResult, ShaderStage};
use crate::handles::TextureHandle;
use crate::render::renderer_backends::{
    GraphicsBackend, PixelUpload, QuadVertex, REQUIRED_EXTENSIONS, SamplerParams,
};

const HANDLE_BASE: u64 = 0x0000_0100_0000_0000;

#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    CreateTexture(u32),
    ConfigureSampling(u32, SamplerParams),
    UploadTexture {
        texture: u32,
        width: u32,
        height: u32,
        layout: ChannelLayout,
        bytes: usize,
    },
    GenerateMipmaps(u32),
    DeleteTexture(u32),
    GetTextureHandle(u32),
    IsTextureHandleResident(TextureHandle),
    MakeTextureHandleResident(TextureHandle),
    MakeTextureHandleNonResident(TextureHandle),
    CreateStorageBuffer { buffer: u32, size: usize },
    BindStorageBuffer { slot: u32, buffer: u32 },
    DeleteBuffer(u32),
    CompileProgram(u32),
    UseProgram(u32),
    SetUniformU32 { program: u32, name: String, value: u32 },
    DeleteProgram(u32),
    CreateGeometry { geometry: u32, vertices: usize, indices: usize },
    DrawIndexed { geometry: u32, index_count: u32 },
    DeleteGeometry(u32),
    Viewport(u32, u32),
    Clear,
}

#[derive(Debug, Default)]
struct NullState {
    next_id: u32,
    next_handle: u64,
    calls: Vec<BackendCall>,
    live_textures: HashSet<u32>,
    live_buffers: HashSet<u32>,
    live_programs: HashSet<u32>,
    live_geometry: HashSet<u32>,
    handles: HashMap<u32, TextureHandle>,
    resident: HashSet<TextureHandle>,
    buffer_contents: HashMap<u32, Vec<u8>>,
    storage_bindings: HashMap<u32, u32>,
    residency_violations: usize,
    frames_rendered: u64,
}

impl NullState {
    fn alloc_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Debug)]
pub struct NullBackend {
    extensions: HashSet<String>,
    compile_failure: Option<(ShaderStage, String)>,
    refuse_handles: bool,
    state: RefCell<NullState>,
}

impl Default for NullBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl NullBackend {
    /// A backend that reports every extension the demo requires.
    pub fn new() -> Self {
        Self {
            extensions: REQUIRED_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            compile_failure: None,
            refuse_handles: false,
            state: RefCell::new(NullState {
                next_handle: HANDLE_BASE,
                ..NullState::default()
            }),
        }
    }

    pub fn without_extension(mut self, name: &str) -> Self {
        self.extensions.remove(name);
        self
    }

    pub fn with_compile_failure(mut self, stage: ShaderStage, log: &str) -> Self {
        self.compile_failure = Some((stage, log.to_string()));
        self
    }

    /// Makes every handle request return the null handle.
    pub fn refusing_handles(mut self) -> Self {
        self.refuse_handles = true;
        self
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.state.borrow().calls.clone()
    }

    pub fn count_calls(&self, pred: impl Fn(&BackendCall) -> bool) -> usize {
        self.state.borrow().calls.iter().filter(|c| pred(c)).count()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    pub fn live_texture_count(&self) -> usize {
        self.state.borrow().live_textures.len()
    }

    pub fn live_buffer_count(&self) -> usize {
        self.state.borrow().live_buffers.len()
    }

    pub fn live_program_count(&self) -> usize {
        self.state.borrow().live_programs.len()
    }

    pub fn live_geometry_count(&self) -> usize {
        self.state.borrow().live_geometry.len()
    }

    pub fn resident_handles(&self) -> HashSet<TextureHandle> {
        self.state.borrow().resident.clone()
    }

    pub fn is_resident(&self, handle: TextureHandle) -> bool {
        self.state.borrow().resident.contains(&handle)
    }

    pub fn buffer_contents(&self, buffer: u32) -> Option<Vec<u8>> {
        self.state.borrow().buffer_contents.get(&buffer).cloned()
    }

    /// Buffer currently bound at `slot`, if any.
    pub fn storage_binding(&self, slot: u32) -> Option<u32> {
        self.state.borrow().storage_bindings.get(&slot).copied()
    }

    pub fn residency_violations(&self) -> usize {
        self.state.borrow().residency_violations
    }

    pub fn frames_rendered(&self) -> u64 {
        self.state.borrow().frames_rendered
    }
}

impl GraphicsBackend for NullBackend {
    type Texture = u32;
    type Buffer = u32;
    type Program = u32;
    type Geometry = u32;

    fn has_extension(&self, name: &str) -> bool {
        self.extensions.contains(name)
    }

    fn create_texture(&self) -> EngineResult<Self::Texture> {
        let mut state = self.state.borrow_mut();
        let id = state.alloc_id();
        state.live_textures.insert(id);
        state.calls.push(BackendCall::CreateTexture(id));
        Ok(id)
    }

    fn configure_sampling(&self, texture: Self::Texture, params: &SamplerParams) {
        self.state
            .borrow_mut()
            .calls
            .push(BackendCall::ConfigureSampling(texture, *params));
    }

    fn upload_texture(&self, texture: Self::Texture, upload: PixelUpload<'_>) {
        self.state.borrow_mut().calls.push(BackendCall::UploadTexture {
            texture,
            width: upload.width,
            height: upload.height,
            layout: upload.layout,
            bytes: upload.pixels.len(),
        });
    }

    fn generate_mipmaps(&self, texture: Self::Texture) {
        self.state
            .borrow_mut()
            .calls
            .push(BackendCall::GenerateMipmaps(texture));
    }

    fn delete_texture(&self, texture: Self::Texture) {
        let mut state = self.state.borrow_mut();
        state.live_textures.remove(&texture);
        if let Some(handle) = state.handles.remove(&texture) {
            // Deleting a texture whose handle is still resident is a driver error.
            if state.resident.remove(&handle) {
                state.residency_violations += 1;
            }
        }
        state.calls.push(BackendCall::DeleteTexture(texture));
    }

    fn texture_handle(&self, texture: Self::Texture) -> TextureHandle {
        let mut state = self.state.borrow_mut();
        state.calls.push(BackendCall::GetTextureHandle(texture));
        if self.refuse_handles || !state.live_textures.contains(&texture) {
            return TextureHandle::NULL;
        }
        if let Some(existing) = state.handles.get(&texture) {
            return *existing;
        }
        state.next_handle += 1;
        let handle = TextureHandle(state.next_handle);
        state.handles.insert(texture, handle);
        handle
    }

    fn is_texture_handle_resident(&self, handle: TextureHandle) -> bool {
        let mut state = self.state.borrow_mut();
        state.calls.push(BackendCall::IsTextureHandleResident(handle));
        state.resident.contains(&handle)
    }

    fn make_texture_handle_resident(&self, handle: TextureHandle) {
        let mut state = self.state.borrow_mut();
        state.calls.push(BackendCall::MakeTextureHandleResident(handle));
        if !state.resident.insert(handle) {
            state.residency_violations += 1;
        }
    }

    fn make_texture_handle_non_resident(&self, handle: TextureHandle) {
        let mut state = self.state.borrow_mut();
        state
            .calls
            .push(BackendCall::MakeTextureHandleNonResident(handle));
        if !state.resident.remove(&handle) {
            state.residency_violations += 1;
        }
    }

    fn create_storage_buffer(&self, data: &[u8]) -> EngineResult<Self::Buffer> {
        let mut state = self.state.borrow_mut();
        let id = state.alloc_id();
        state.live_buffers.insert(id);
        state.buffer_contents.insert(id, data.to_vec());
        state.calls.push(BackendCall::CreateStorageBuffer {
            buffer: id,
            size: data.len(),
        });
        Ok(id)
    }

    fn bind_storage_buffer(&self, slot: u32, buffer: Self::Buffer) {
        let mut state = self.state.borrow_mut();
        state.storage_bindings.insert(slot, buffer);
        state
            .calls
            .push(BackendCall::BindStorageBuffer { slot, buffer });
    }

    fn delete_buffer(&self, buffer: Self::Buffer) {
        let mut state = self.state.borrow_mut();
        state.live_buffers.remove(&buffer);
        state.buffer_contents.remove(&buffer);
        state.storage_bindings.retain(|_, bound| *bound != buffer);
        state.calls.push(BackendCall::DeleteBuffer(buffer));
    }

    fn compile_program(&self, _vertex_src: &str, _fragment_src: &str) -> EngineResult<Self::Program> {
        match &self.compile_failure {
            Some((ShaderStage::Vertex, log)) => Err(EngineError::ShaderCompile {
                stage: ShaderStage::Vertex,
                log: log.clone(),
            }),
            Some((ShaderStage::Fragment, log)) => Err(EngineError::ShaderCompile {
                stage: ShaderStage::Fragment,
                log: log.clone(),
            }),
            None => {
                let mut state = self.state.borrow_mut();
                let id = state.alloc_id();
                state.live_programs.insert(id);
                state.calls.push(BackendCall::CompileProgram(id));
                Ok(id)
            }
        }
    }

    fn use_program(&self, program: Self::Program) {
        self.state
            .borrow_mut()
            .calls
            .push(BackendCall::UseProgram(program));
    }

    fn set_uniform_u32(&self, program: Self::Program, name: &str, value: u32) {
        self.state.borrow_mut().calls.push(BackendCall::SetUniformU32 {
            program,
            name: name.to_string(),
            value,
        });
    }

    fn delete_program(&self, program: Self::Program) {
        let mut state = self.state.borrow_mut();
        state.live_programs.remove(&program);
        state.calls.push(BackendCall::DeleteProgram(program));
    }

    fn create_geometry(&self, vertices: &[QuadVertex], indices: &[u32]) -> EngineResult<Self::Geometry> {
        let mut state = self.state.borrow_mut();
        let id = state.alloc_id();
        state.live_geometry.insert(id);
        state.calls.push(BackendCall::CreateGeometry {
            geometry: id,
            vertices: vertices.len(),
            indices: indices.len(),
        });
        Ok(id)
    }

    fn draw_indexed(&self, geometry: Self::Geometry, index_count: u32) {
        let mut state = self.state.borrow_mut();
        state.frames_rendered += 1;
        state.calls.push(BackendCall::DrawIndexed {
            geometry,
            index_count,
        });
    }

    fn delete_geometry(&self, geometry: Self::Geometry) {
        let mut state = self.state.borrow_mut();
        state.live_geometry.remove(&geometry);
        state.calls.push(BackendCall::DeleteGeometry(geometry));
    }

    fn viewport(&self, width: u32, height: u32) {
        self.state
            .borrow_mut()
            .calls
            .push(BackendCall::Viewport(width, height));
    }

    fn clear(&self, _color: [f32; 4]) {
        self.state.borrow_mut().calls.push(BackendCall::Clear);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_distinct_and_non_null() {
        let backend = NullBackend::new();
        let a = backend.create_texture().unwrap();
        let b = backend.create_texture().unwrap();

        let ha = backend.texture_handle(a);
        let hb = backend.texture_handle(b);
        assert!(!ha.is_null());
        assert!(!hb.is_null());
        assert_ne!(ha, hb);
        assert_eq!(backend.texture_handle(a), ha, "handle is stable per texture");
    }

    #[test]
    fn test_double_residency_request_is_a_violation() {
        let backend = NullBackend::new();
        let texture = backend.create_texture().unwrap();
        let handle = backend.texture_handle(texture);

        backend.make_texture_handle_resident(handle);
        assert_eq!(backend.residency_violations(), 0);
        backend.make_texture_handle_resident(handle);
        assert_eq!(backend.residency_violations(), 1);
    }

    #[test]
    fn test_deleting_texture_with_resident_handle_is_a_violation() {
        let backend = NullBackend::new();
        let texture = backend.create_texture().unwrap();
        let handle = backend.texture_handle(texture);
        backend.make_texture_handle_resident(handle);

        backend.delete_texture(texture);
        assert_eq!(backend.residency_violations(), 1);
        assert!(backend.resident_handles().is_empty());
    }

    #[test]
    fn test_missing_extension_is_reported() {
        let backend = NullBackend::new().without_extension("GL_ARB_gpu_shader_int64");
        assert!(backend.has_extension("GL_ARB_bindless_texture"));
        assert!(!backend.has_extension("GL_ARB_gpu_shader_int64"));
    }

    #[test]
    fn test_deleted_buffer_is_unbound() {
        let backend = NullBackend::new();
        let buffer = backend.create_storage_buffer(&[0u8; 8]).unwrap();
        backend.bind_storage_buffer(2, buffer);
        assert_eq!(backend.storage_binding(2), Some(buffer));

        backend.delete_buffer(buffer);
        assert_eq!(backend.storage_binding(2), None);
        assert_eq!(backend.live_buffer_count(), 0);
    }
}
