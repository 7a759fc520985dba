// Distributed under the GNU Affero General Public License v3.0 or later.
// See accompanying file LICENSE or https://www.gnu.org/licenses/agpl-3.0.html for details.

//! `GL_ARB_bindless_texture` entry points.
//!
//! glow does not wrap this extension, so the four functions the demo needs
//! are resolved through the same proc-address loader that built the context.

use std::ffi::c_void;

type GetTextureHandleFn = unsafe extern "system" fn(texture: u32) -> u64;
type IsTextureHandleResidentFn = unsafe extern "system" fn(handle: u64) -> u8;
type MakeTextureHandleResidentFn = unsafe extern "system" fn(handle: u64);
type MakeTextureHandleNonResidentFn = unsafe extern "system" fn(handle: u64);

#[derive(Clone, Copy)]
pub struct BindlessTextureFns {
    get_texture_handle: GetTextureHandleFn,
    is_texture_handle_resident: IsTextureHandleResidentFn,
    make_texture_handle_resident: MakeTextureHandleResidentFn,
    make_texture_handle_non_resident: MakeTextureHandleNonResidentFn,
}

impl std::fmt::Debug for BindlessTextureFns {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindlessTextureFns").finish_non_exhaustive()
    }
}

impl BindlessTextureFns {
    /// Resolves all four entry points; `None` if any of them is missing.
    ///
    /// # Safety
    /// `loader` must return either null or a pointer to the named GL function
    /// of the context that is current on this thread.
    pub unsafe fn load(mut loader: impl FnMut(&str) -> *const c_void) -> Option<Self> {
        let mut resolve = |name: &str| {
            let ptr = loader(name);
            if ptr.is_null() {
                log::warn!("{} could not be resolved", name);
                None
            } else {
                Some(ptr)
            }
        };

        let get_texture_handle = resolve("glGetTextureHandleARB")?;
        let is_texture_handle_resident = resolve("glIsTextureHandleResidentARB")?;
        let make_texture_handle_resident = resolve("glMakeTextureHandleResidentARB")?;
        let make_texture_handle_non_resident = resolve("glMakeTextureHandleNonResidentARB")?;

        unsafe {
            Some(Self {
                get_texture_handle: std::mem::transmute::<*const c_void, GetTextureHandleFn>(
                    get_texture_handle,
                ),
                is_texture_handle_resident: std::mem::transmute::<
                    *const c_void,
                    IsTextureHandleResidentFn,
                >(is_texture_handle_resident),
                make_texture_handle_resident: std::mem::transmute::<
                    *const c_void,
                    MakeTextureHandleResidentFn,
                >(make_texture_handle_resident),
                make_texture_handle_non_resident: std::mem::transmute::<
                    *const c_void,
                    MakeTextureHandleNonResidentFn,
                >(make_texture_handle_non_resident),
            })
        }
    }

    pub fn get_texture_handle(&self, texture: u32) -> u64 {
        unsafe { (self.get_texture_handle)(texture) }
    }

    pub fn is_texture_handle_resident(&self, handle: u64) -> bool {
        unsafe { (self.is_texture_handle_resident)(handle) != 0 }
    }

    pub fn make_texture_handle_resident(&self, handle: u64) {
        unsafe { (self.make_texture_handle_resident)(handle) }
    }

    pub fn make_texture_handle_non_resident(&self, handle: u64) {
        unsafe { (self.make_texture_handle_non_resident)(handle) }
    }
}
