// Distributed under the GNU Affero General Public License v3.0 or later.
// See accompanying file LICENSE or https://www.gnu.org/licenses/agpl-3.0.html for details.

use bindless_engine::{Engine, Settings};
use env_logger::Env;
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("Failed to load settings: {}", e);
            return ExitCode::FAILURE;
        }
    };
    log::info!(
        "Loading {} textures, drawing index {}",
        settings.textures.images.len(),
        settings.textures.texture_index
    );

    match Engine::new(settings).run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
