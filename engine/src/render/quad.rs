// Distributed under the GNU Affero General Public License v3.0 or later.
// See accompanying file LICENSE or https://www.gnu.org/licenses/agpl-3.0.html for details.

use std::rc::Rc;

use glam::{Vec2, Vec3};

use crate::error::EngineResult;
use crate::render::renderer_backends::{GraphicsBackend, QuadVertex};

pub const QUAD_VERTICES: [QuadVertex; 4] = [
    // bottom left
    QuadVertex {
        position: Vec3::new(-0.5, -0.5, 0.0),
        uv: Vec2::new(0.0, 0.0),
    },
    // bottom right
    QuadVertex {
        position: Vec3::new(0.5, -0.5, 0.0),
        uv: Vec2::new(1.0, 0.0),
    },
    // top right
    QuadVertex {
        position: Vec3::new(0.5, 0.5, 0.0),
        uv: Vec2::new(1.0, 1.0),
    },
    // top left
    QuadVertex {
        position: Vec3::new(-0.5, 0.5, 0.0),
        uv: Vec2::new(0.0, 1.0),
    },
];

pub const QUAD_INDICES: [u32; 6] = [0, 1, 2, 2, 3, 0];

/// Centered textured quad.
pub struct QuadGeometry<B: GraphicsBackend> {
    backend: Rc<B>,
    geometry: B::Geometry,
}

impl<B: GraphicsBackend> QuadGeometry<B> {
    pub fn new(backend: Rc<B>) -> EngineResult<Self> {
        let geometry = backend.create_geometry(&QUAD_VERTICES, &QUAD_INDICES)?;
        Ok(Self { backend, geometry })
    }

    pub fn draw(&self) {
        self.backend
            .draw_indexed(self.geometry, QUAD_INDICES.len() as u32);
    }
}

impl<B: GraphicsBackend> Drop for QuadGeometry<B> {
    fn drop(&mut self) {
        self.backend.delete_geometry(self.geometry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_layout_is_tightly_packed() {
        assert_eq!(size_of::<QuadVertex>(), 20);
        assert_eq!(bytemuck::cast_slice::<QuadVertex, u8>(&QUAD_VERTICES).len(), 80);
    }

    #[test]
    fn test_indices_cover_two_triangles() {
        assert_eq!(QUAD_INDICES.len(), 6);
        assert!(QUAD_INDICES.iter().all(|i| (*i as usize) < QUAD_VERTICES.len()));
    }
}
