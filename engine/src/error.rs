// Distributed under the GNU Affero General Public License v3.0 or later.
// See accompanying file LICENSE or https://www.gnu.org/licenses/agpl-3.0.html for details.

use std::path::PathBuf;

use thiserror::Error;

use crate::settings::SettingsError;

/// Every way startup can fail. All variants are fatal for the demo: the
/// caller reports them and exits before the draw loop.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Required GPU capability missing: {extension}")]
    CapabilityMissing { extension: String },

    #[error("Failed to decode image {path:?}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Invalid image {label}: {reason}")]
    InvalidImage { label: String, reason: String },

    #[error("{stage} shader compilation failed: {log}")]
    ShaderCompile { stage: ShaderStage, log: String },

    #[error("Program linking failed: {log}")]
    ProgramLink { log: String },

    #[error("Driver returned no bindless handle for texture {label}")]
    HandleAcquisition { label: String },

    #[error("Cannot build a handle table from zero textures")]
    EmptyHandleTable,

    #[error("Texture lookup index {index} is out of range for a table of {len} handles")]
    LookupIndexOutOfRange { index: u32, len: usize },

    #[error("OpenGL error: {0}")]
    Gl(String),

    #[error("Window error: {0}")]
    Window(String),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShaderStage::Vertex => write!(f, "Vertex"),
            ShaderStage::Fragment => write!(f, "Fragment"),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
