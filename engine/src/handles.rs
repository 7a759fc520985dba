// Distributed under the GNU Affero General Public License v3.0 or later.
// See accompanying file LICENSE or https://www.gnu.org/licenses/agpl-3.0.html for details.

use bytemuck::{Pod, Zeroable};

/// Driver-issued 64-bit bindless texture handle.
///
/// Only meaningful while the texture object it was derived from is alive.
/// The layout is exactly one `u64` so a slice of handles is byte-for-byte
/// the array a shader reads as `uint64_t[]`.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct TextureHandle(pub u64);

impl TextureHandle {
    pub const NULL: TextureHandle = TextureHandle(0);

    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Residency {
    NonResident,
    Resident,
}

impl Residency {
    pub fn from_resident(resident: bool) -> Self {
        if resident {
            Residency::Resident
        } else {
            Residency::NonResident
        }
    }
}
