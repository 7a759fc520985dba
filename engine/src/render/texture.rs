// Distributed under the GNU Affero General Public License v3.0 or later.
// See accompanying file LICENSE or https://www.gnu.org/licenses/agpl-3.0.html for details.

use std::rc::Rc;

use crate::assets::image_decoder::ChannelLayout;
use crate::handles::{Residency, TextureHandle};
use crate::render::renderer_backends::GraphicsBackend;

/// A texture object together with its bindless handle.
///
/// Owns both: dropping it releases residency (only if still resident) and
/// then deletes the texture, so the handle never outlives its texture.
pub struct ResidentTexture<B: GraphicsBackend> {
    backend: Rc<B>,
    texture: B::Texture,
    handle: TextureHandle,
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub layout: ChannelLayout,
}

impl<B: GraphicsBackend> ResidentTexture<B> {
    /// Takes ownership of `texture`, whose `handle` must already be resident.
    pub(crate) fn new(
        backend: Rc<B>,
        texture: B::Texture,
        handle: TextureHandle,
        label: String,
        width: u32,
        height: u32,
        layout: ChannelLayout,
    ) -> Self {
        Self {
            backend,
            texture,
            handle,
            label,
            width,
            height,
            layout,
        }
    }

    pub fn handle(&self) -> TextureHandle {
        self.handle
    }

    pub fn texture(&self) -> B::Texture {
        self.texture
    }

    pub fn residency(&self) -> Residency {
        Residency::from_resident(self.backend.is_texture_handle_resident(self.handle))
    }
}

impl<B: GraphicsBackend> std::fmt::Debug for ResidentTexture<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResidentTexture")
            .field("texture", &self.texture)
            .field("handle", &format_args!("{:#018x}", self.handle.0))
            .field("label", &self.label)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("layout", &self.layout)
            .finish()
    }
}

impl<B: GraphicsBackend> Drop for ResidentTexture<B> {
    fn drop(&mut self) {
        if self.backend.is_texture_handle_resident(self.handle) {
            self.backend.make_texture_handle_non_resident(self.handle);
        }
        self.backend.delete_texture(self.texture);
        log::debug!("Released texture {} (handle {:#018x})", self.label, self.handle.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::null_backend::{BackendCall, NullBackend};

    fn resident_texture(backend: &Rc<NullBackend>) -> ResidentTexture<NullBackend> {
        let texture = backend.create_texture().unwrap();
        let handle = backend.texture_handle(texture);
        backend.make_texture_handle_resident(handle);
        ResidentTexture::new(
            backend.clone(),
            texture,
            handle,
            String::from("test"),
            1,
            1,
            ChannelLayout::Rgba,
        )
    }

    #[test]
    fn test_drop_releases_residency_before_deleting() {
        let backend = Rc::new(NullBackend::new());
        let texture = resident_texture(&backend);
        let handle = texture.handle();
        let id = texture.texture();
        assert_eq!(texture.residency(), Residency::Resident);

        backend.clear_calls();
        drop(texture);

        let calls = backend.calls();
        let release = calls
            .iter()
            .position(|c| *c == BackendCall::MakeTextureHandleNonResident(handle))
            .expect("residency should be released");
        let delete = calls
            .iter()
            .position(|c| *c == BackendCall::DeleteTexture(id))
            .expect("texture should be deleted");
        assert!(release < delete);
        assert_eq!(backend.residency_violations(), 0);
        assert_eq!(backend.live_texture_count(), 0);
    }

    #[test]
    fn test_drop_skips_release_when_not_resident() {
        let backend = Rc::new(NullBackend::new());
        let texture = resident_texture(&backend);
        backend.make_texture_handle_non_resident(texture.handle());

        drop(texture);

        assert_eq!(
            backend.count_calls(|c| matches!(c, BackendCall::MakeTextureHandleNonResident(_))),
            1,
            "only the explicit release should have happened"
        );
        assert_eq!(backend.residency_violations(), 0);
    }
}
