// Distributed under the GNU Affero General Public License v3.0 or later.
// See accompanying file LICENSE or https://www.gnu.org/licenses/agpl-3.0.html for details.

use std::rc::Rc;

use crate::error::{EngineError, EngineResult};
use crate::handles::TextureHandle;
use crate::render::renderer_backends::GraphicsBackend;
use crate::render::texture::ResidentTexture;

pub const HANDLE_STRIDE: usize = size_of::<TextureHandle>();

/// Ordered bindless handles. Position in the table is the index shaders use.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HandleTable {
    handles: Vec<TextureHandle>,
}

impl HandleTable {
    pub fn new(handles: Vec<TextureHandle>) -> Self {
        Self { handles }
    }

    pub fn from_textures<B: GraphicsBackend>(textures: &[ResidentTexture<B>]) -> Self {
        Self::new(textures.iter().map(ResidentTexture::handle).collect())
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn get(&self, index: u32) -> Option<TextureHandle> {
        self.handles.get(index as usize).copied()
    }

    /// Fails unless `index` addresses an entry; shaders reading past the end
    /// get undefined data rather than an error.
    pub fn checked_index(&self, index: u32) -> EngineResult<TextureHandle> {
        self.get(index).ok_or(EngineError::LookupIndexOutOfRange {
            index,
            len: self.handles.len(),
        })
    }

    pub fn handles(&self) -> &[TextureHandle] {
        &self.handles
    }

    /// The exact bytes a `uint64_t[]` storage block sees: 8 bytes per handle,
    /// no padding, table order.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.handles)
    }

    pub fn byte_len(&self) -> usize {
        self.handles.len() * HANDLE_STRIDE
    }
}

/// GPU copy of a [`HandleTable`]. Written once at creation and never again.
pub struct ShaderVisibleBuffer<B: GraphicsBackend> {
    backend: Rc<B>,
    buffer: B::Buffer,
    byte_len: usize,
    len: usize,
}

impl<B: GraphicsBackend> ShaderVisibleBuffer<B> {
    pub fn build(backend: Rc<B>, table: &HandleTable) -> EngineResult<Self> {
        if table.is_empty() {
            return Err(EngineError::EmptyHandleTable);
        }

        let bytes = table.as_bytes();
        let buffer = backend.create_storage_buffer(bytes)?;
        log::debug!(
            "Built handle table buffer: {} handles, {} bytes",
            table.len(),
            bytes.len()
        );

        Ok(Self {
            backend,
            buffer,
            byte_len: bytes.len(),
            len: table.len(),
        })
    }

    /// Re-asserts the binding at `slot`. Called before every draw; binding
    /// state may have been disturbed since the last frame.
    pub fn publish_for_draw(&self, slot: u32) {
        self.backend.bind_storage_buffer(slot, self.buffer);
        log::trace!("Published handle table at binding {}", slot);
    }

    pub fn buffer(&self) -> B::Buffer {
        self.buffer
    }

    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<B: GraphicsBackend> std::fmt::Debug for ShaderVisibleBuffer<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderVisibleBuffer")
            .field("buffer", &self.buffer)
            .field("byte_len", &self.byte_len)
            .field("len", &self.len)
            .finish()
    }
}

impl<B: GraphicsBackend> Drop for ShaderVisibleBuffer<B> {
    fn drop(&mut self) {
        self.backend.delete_buffer(self.buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::null_backend::{BackendCall, NullBackend};

    fn table_of(values: &[u64]) -> HandleTable {
        HandleTable::new(values.iter().copied().map(TextureHandle).collect())
    }

    #[test]
    fn test_lookup_follows_insertion_order() {
        let table = table_of(&[0xA, 0xB, 0xC]);
        assert_eq!(table.get(0), Some(TextureHandle(0xA)));
        assert_eq!(table.get(1), Some(TextureHandle(0xB)));
        assert_eq!(table.get(2), Some(TextureHandle(0xC)));
        assert_eq!(table.get(3), None);
    }

    #[test]
    fn test_checked_index_rejects_out_of_range() {
        let table = table_of(&[1, 2]);
        assert_eq!(table.checked_index(1).unwrap(), TextureHandle(2));
        assert!(matches!(
            table.checked_index(2),
            Err(EngineError::LookupIndexOutOfRange { index: 2, len: 2 })
        ));
    }

    #[test]
    fn test_bytes_are_tightly_packed_in_order() {
        let table = table_of(&[0x0102_0304_0506_0708, 0x1112_1314_1516_1718]);
        let bytes = table.as_bytes();

        assert_eq!(bytes.len(), 16);
        assert_eq!(table.byte_len(), 16);
        assert_eq!(&bytes[..8], &0x0102_0304_0506_0708u64.to_ne_bytes());
        assert_eq!(&bytes[8..], &0x1112_1314_1516_1718u64.to_ne_bytes());
    }

    #[test]
    fn test_buffer_mirrors_table() {
        let backend = Rc::new(NullBackend::new());
        let table = table_of(&[5, 6, 7]);

        let buffer = ShaderVisibleBuffer::build(backend.clone(), &table).unwrap();
        assert_eq!(buffer.byte_len(), 24);
        assert_eq!(buffer.len(), 3);
        assert_eq!(
            backend.buffer_contents(buffer.buffer()).unwrap(),
            table.as_bytes().to_vec()
        );
    }

    #[test]
    fn test_empty_table_is_rejected() {
        let backend = Rc::new(NullBackend::new());
        let result = ShaderVisibleBuffer::build(backend.clone(), &HandleTable::default());

        assert!(matches!(result, Err(EngineError::EmptyHandleTable)));
        assert_eq!(backend.live_buffer_count(), 0);
    }

    #[test]
    fn test_publish_rebinds_without_reupload() {
        let backend = Rc::new(NullBackend::new());
        let buffer = ShaderVisibleBuffer::build(backend.clone(), &table_of(&[1])).unwrap();

        for _ in 0..3 {
            buffer.publish_for_draw(2);
        }

        assert_eq!(
            backend.count_calls(|c| matches!(c, BackendCall::BindStorageBuffer { slot: 2, .. })),
            3
        );
        assert_eq!(
            backend.count_calls(|c| matches!(c, BackendCall::CreateStorageBuffer { .. })),
            1
        );
        assert_eq!(backend.storage_binding(2), Some(buffer.buffer()));
    }

    #[test]
    fn test_drop_deletes_buffer() {
        let backend = Rc::new(NullBackend::new());
        let buffer = ShaderVisibleBuffer::build(backend.clone(), &table_of(&[1, 2])).unwrap();
        assert_eq!(backend.live_buffer_count(), 1);

        drop(buffer);
        assert_eq!(backend.live_buffer_count(), 0);
    }
}
