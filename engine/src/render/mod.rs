// Distributed under the GNU Affero General Public License v3.0 or later.
// See accompanying file LICENSE or https://www.gnu.org/licenses/agpl-3.0.html for details.

pub mod bindless_extension;
pub mod bindless_scene;
pub mod glow_backend;
pub mod handle_acquisition;
pub mod handle_table;
pub mod null_backend;
pub mod quad;
pub mod renderer_backends;
pub mod shader;
pub mod texture;
