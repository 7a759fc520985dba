// Distributed under the GNU Affero General Public License v3.0 or later.
// See accompanying file LICENSE or https://www.gnu.org/licenses/agpl-3.0.html for details.

use std::path::Path;
use std::rc::Rc;

use crate::assets::image_decoder::{DecodedImage, ImageDecoder};
use crate::error::{EngineError, EngineResult};
use crate::render::renderer_backends::{GraphicsBackend, PixelUpload, SamplerParams};
use crate::render::texture::ResidentTexture;

/// Turns decoded images into textures with resident bindless handles.
pub struct HandleAcquisitionService<B: GraphicsBackend> {
    backend: Rc<B>,
    sampler: SamplerParams,
}

impl<B: GraphicsBackend> HandleAcquisitionService<B> {
    pub fn new(backend: Rc<B>) -> Self {
        Self::with_sampler(backend, SamplerParams::default())
    }

    pub fn with_sampler(backend: Rc<B>, sampler: SamplerParams) -> Self {
        Self { backend, sampler }
    }

    /// Uploads `image` and returns a texture whose handle is resident.
    ///
    /// The decoded pixels are consumed; the CPU copy is gone once the upload
    /// has been issued.
    pub fn acquire(&self, image: DecodedImage) -> EngineResult<ResidentTexture<B>> {
        image.validate()?;

        let texture = self.backend.create_texture()?;
        match self.prepare(texture, image) {
            Ok(resident) => Ok(resident),
            Err(e) => {
                self.backend.delete_texture(texture);
                Err(e)
            }
        }
    }

    fn prepare(&self, texture: B::Texture, image: DecodedImage) -> EngineResult<ResidentTexture<B>> {
        let backend = &self.backend;
        let DecodedImage {
            label,
            pixels,
            width,
            height,
            layout,
        } = image;

        // Sampler state must be final before the handle is taken.
        backend.configure_sampling(texture, &self.sampler);
        backend.upload_texture(
            texture,
            PixelUpload {
                width,
                height,
                layout,
                pixels: &pixels,
            },
        );
        backend.generate_mipmaps(texture);
        drop(pixels);

        let handle = backend.texture_handle(texture);
        if handle.is_null() {
            return Err(EngineError::HandleAcquisition { label });
        }

        // Requesting residency for an already resident handle is an error in
        // the driver, so this check is required.
        if !backend.is_texture_handle_resident(handle) {
            backend.make_texture_handle_resident(handle);
        }

        log::debug!(
            "Acquired handle {:#018x} for {} ({}x{}, {:?})",
            handle.0,
            label,
            width,
            height,
            layout
        );
        Ok(ResidentTexture::new(
            backend.clone(),
            texture,
            handle,
            label,
            width,
            height,
            layout,
        ))
    }

    /// Decodes and acquires every path in order.
    ///
    /// Stops at the first failure; textures acquired before it are released
    /// as the partial list is dropped.
    pub fn acquire_all<P: AsRef<Path>>(
        &self,
        paths: &[P],
        decoder: &dyn ImageDecoder,
    ) -> EngineResult<Vec<ResidentTexture<B>>> {
        let mut textures = Vec::with_capacity(paths.len());
        for path in paths {
            let image = decoder.decode(path.as_ref())?;
            textures.push(self.acquire(image)?);
        }
        log::info!("Acquired {} resident texture handles", textures.len());
        Ok(textures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::image_decoder::ChannelLayout;
    use crate::handles::{Residency, TextureHandle};
    use crate::render::null_backend::{BackendCall, NullBackend};
    use crate::render::renderer_backends::{FilterMode, WrapMode};
    use std::cell::Cell;
    use std::path::PathBuf;

    /// Decoder that serves solid images and fails on paths containing "broken".
    struct FakeDecoder {
        decoded: Cell<usize>,
    }

    impl FakeDecoder {
        fn new() -> Self {
            Self {
                decoded: Cell::new(0),
            }
        }
    }

    impl ImageDecoder for FakeDecoder {
        fn decode(&self, path: &Path) -> EngineResult<DecodedImage> {
            if path.to_string_lossy().contains("broken") {
                return Err(EngineError::Decode {
                    path: path.to_path_buf(),
                    source: image::ImageError::IoError(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        "missing",
                    )),
                });
            }
            self.decoded.set(self.decoded.get() + 1);
            Ok(DecodedImage::solid_rgba(path.display().to_string(), 2, 2, [255, 0, 0, 255]))
        }
    }

    fn service() -> (Rc<NullBackend>, HandleAcquisitionService<NullBackend>) {
        let backend = Rc::new(NullBackend::new());
        (backend.clone(), HandleAcquisitionService::new(backend))
    }

    #[test]
    fn test_acquired_handle_is_resident() {
        let (backend, service) = service();
        let texture = service
            .acquire(DecodedImage::solid_rgba("a", 4, 4, [1, 2, 3, 4]))
            .unwrap();

        assert_eq!(texture.residency(), Residency::Resident);
        assert!(backend.is_resident(texture.handle()));
        assert_eq!(backend.residency_violations(), 0);
    }

    #[test]
    fn test_residency_is_requested_exactly_once() {
        let (backend, service) = service();
        let _texture = service
            .acquire(DecodedImage::solid_rgba("a", 1, 1, [0; 4]))
            .unwrap();

        assert_eq!(
            backend.count_calls(|c| matches!(c, BackendCall::MakeTextureHandleResident(_))),
            1
        );
    }

    #[test]
    fn test_acquisition_follows_upload_then_handle_then_residency() {
        let (backend, service) = service();
        let texture = service
            .acquire(DecodedImage::new("rgb", vec![7; 3 * 5 * 3], 5, 3, ChannelLayout::Rgb))
            .unwrap();
        let id = texture.texture();
        let handle = texture.handle();

        let calls = backend.calls();
        assert_eq!(
            calls,
            vec![
                BackendCall::CreateTexture(id),
                BackendCall::ConfigureSampling(
                    id,
                    SamplerParams {
                        wrap_s: WrapMode::Repeat,
                        wrap_t: WrapMode::Repeat,
                        min_filter: FilterMode::LinearMipmapLinear,
                        mag_filter: FilterMode::Linear,
                    }
                ),
                BackendCall::UploadTexture {
                    texture: id,
                    width: 5,
                    height: 3,
                    layout: ChannelLayout::Rgb,
                    bytes: 45,
                },
                BackendCall::GenerateMipmaps(id),
                BackendCall::GetTextureHandle(id),
                BackendCall::IsTextureHandleResident(handle),
                BackendCall::MakeTextureHandleResident(handle),
            ]
        );
    }

    #[test]
    fn test_invalid_image_creates_no_texture() {
        let (backend, service) = service();
        let result = service.acquire(DecodedImage::new("bad", vec![0; 3], 2, 2, ChannelLayout::Rgb));

        assert!(matches!(result, Err(EngineError::InvalidImage { .. })));
        assert_eq!(backend.count_calls(|c| matches!(c, BackendCall::CreateTexture(_))), 0);
    }

    #[test]
    fn test_refused_handle_deletes_texture() {
        let backend = Rc::new(NullBackend::new().refusing_handles());
        let service = HandleAcquisitionService::new(backend.clone());

        let result = service.acquire(DecodedImage::solid_rgba("a", 1, 1, [0; 4]));
        assert!(matches!(result, Err(EngineError::HandleAcquisition { .. })));
        assert_eq!(backend.live_texture_count(), 0);
        assert!(backend.resident_handles().is_empty());
    }

    #[test]
    fn test_acquire_all_preserves_input_order() {
        let (_backend, service) = service();
        let decoder = FakeDecoder::new();
        let paths = ["a.png", "b.png", "c.png"];

        let textures = service.acquire_all(&paths, &decoder).unwrap();
        let labels: Vec<&str> = textures.iter().map(|t| t.label.as_str()).collect();
        assert_eq!(labels, vec!["a.png", "b.png", "c.png"]);

        let handles: Vec<TextureHandle> = textures.iter().map(ResidentTexture::handle).collect();
        assert_eq!(handles.len(), 3);
        assert!(handles.windows(2).all(|w| w[0] != w[1]));
    }

    #[test]
    fn test_acquire_all_releases_partial_work_on_decode_failure() {
        let (backend, service) = service();
        let decoder = FakeDecoder::new();
        let paths = vec![
            PathBuf::from("a.png"),
            PathBuf::from("b.png"),
            PathBuf::from("broken.png"),
            PathBuf::from("d.png"),
        ];

        let result = service.acquire_all(&paths, &decoder);
        assert!(matches!(result, Err(EngineError::Decode { .. })));
        assert_eq!(decoder.decoded.get(), 2, "decoding stops at the failure");
        assert_eq!(backend.live_texture_count(), 0);
        assert!(backend.resident_handles().is_empty());
        assert_eq!(backend.residency_violations(), 0);
    }
}
