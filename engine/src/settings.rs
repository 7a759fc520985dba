// Distributed under the GNU Affero General Public License v3.0 or later.
// See accompanying file LICENSE or https://www.gnu.org/licenses/agpl-3.0.html for details.

use dirs_next::config_dir;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

/// Overrides the settings file location when set.
pub const CONFIG_ENV_VAR: &str = "BINDLESS_DEMO_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WindowSettings {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextureSettings {
    /// Loaded in order; position in this list is the index into the handle table.
    pub images: Vec<PathBuf>,
    pub texture_index: u32,
    pub binding_slot: u32,
    pub flip_vertically: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RendererSettings {
    pub clear_color: [f32; 4],
    pub target_fps: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    pub window: WindowSettings,
    pub textures: TextureSettings,
    pub renderer: RendererSettings,
}

impl Default for Settings {
    fn default() -> Self {
        let images = ["Aatrox.png", "Ahri.png", "Akali.png", "Akshan.png", "Yuumi.png"]
            .iter()
            .map(|name| Path::new("resources/textures").join(name))
            .collect();

        Self {
            window: WindowSettings {
                title: String::from("Bindless Texture Example"),
                width: 800,
                height: 600,
                vsync: true,
            },
            textures: TextureSettings {
                images,
                texture_index: 4,
                binding_slot: 2,
                flip_vertically: true,
            },
            renderer: RendererSettings {
                clear_color: [0.0, 0.0, 0.0, 1.0],
                target_fps: 60,
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Deserialization Error: {0}")]
    Deserialize(#[from] toml::de::Error),

    #[error("Serialization Error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Configuration Directory Not Found")]
    ConfigDirNotFound,
}

impl Settings {
    /// Path of the per-user settings file.
    pub fn user_settings_path() -> Result<PathBuf, SettingsError> {
        let config_dir = config_dir().ok_or(SettingsError::ConfigDirNotFound)?;
        Ok(config_dir.join("BindlessDemo").join("settings.toml"))
    }

    pub fn load_from_file(path: &Path) -> Result<Self, SettingsError> {
        let content = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Saves settings to `path`, creating parent directories as needed.
    pub fn save_to_file(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Resolves the settings for this run.
    ///
    /// An explicit file named by [`CONFIG_ENV_VAR`] must load, since the user
    /// asked for it. Otherwise the user settings file is used; if it does not
    /// exist the hardcoded defaults are written there, and if it does not
    /// parse the defaults are used without touching the file.
    pub fn load() -> Result<Self, SettingsError> {
        if let Some(explicit) = env::var_os(CONFIG_ENV_VAR) {
            let path = PathBuf::from(explicit);
            log::info!("Loading settings from {:?} ({})", path, CONFIG_ENV_VAR);
            return Settings::load_from_file(&path);
        }

        let user_path = Settings::user_settings_path()?;
        Settings::load_or_create(&user_path)
    }

    fn load_or_create(path: &Path) -> Result<Self, SettingsError> {
        if path.exists() {
            match Settings::load_from_file(path) {
                Ok(settings) => {
                    log::info!("Loaded settings from {:?}", path);
                    Ok(settings)
                }
                Err(e) => {
                    log::warn!("Failed to load settings from {:?}: {}. Using defaults.", path, e);
                    Ok(Settings::default())
                }
            }
        } else {
            let settings = Settings::default();
            settings.save_to_file(path)?;
            log::info!("Settings not found. Defaults written to {:?}", path);
            Ok(settings)
        }
    }
}
