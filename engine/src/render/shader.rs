// Distributed under the GNU Affero General Public License v3.0 or later.
// See accompanying file LICENSE or https://www.gnu.org/licenses/agpl-3.0.html for details.

use std::rc::Rc;

use crate::error::EngineResult;
use crate::render::renderer_backends::GraphicsBackend;

const VERTEX_SOURCE: &str = include_str!("../../resources/shaders/bindless.vert");
const FRAGMENT_SOURCE: &str = include_str!("../../resources/shaders/bindless.frag");

pub const TEXTURE_INDEX_UNIFORM: &str = "u_texture_index";
pub const TEXTURE_TABLE_BINDING_DEFINE: &str = "TEXTURE_TABLE_BINDING";

/// Shader sources for the bindless quad, with the storage buffer binding
/// taken from the host so the two sides cannot drift apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindlessShaderSources {
    pub vertex: String,
    pub fragment: String,
}

impl BindlessShaderSources {
    pub fn new(binding_slot: u32) -> Self {
        Self {
            vertex: VERTEX_SOURCE.to_string(),
            fragment: inject_define(FRAGMENT_SOURCE, TEXTURE_TABLE_BINDING_DEFINE, binding_slot),
        }
    }
}

/// Inserts `#define name value` right after the `#version` line.
fn inject_define(source: &str, name: &str, value: u32) -> String {
    let define = format!("#define {} {}\n", name, value);
    match source.find('\n') {
        Some(end) if source.starts_with("#version") => {
            let (version, rest) = source.split_at(end + 1);
            format!("{}{}{}", version, define, rest)
        }
        _ => format!("{}{}", define, source),
    }
}

pub struct ShaderProgram<B: GraphicsBackend> {
    backend: Rc<B>,
    program: B::Program,
}

impl<B: GraphicsBackend> ShaderProgram<B> {
    pub fn compile(backend: Rc<B>, sources: &BindlessShaderSources) -> EngineResult<Self> {
        let program = backend.compile_program(&sources.vertex, &sources.fragment)?;
        log::debug!("Compiled bindless program {:?}", program);
        Ok(Self { backend, program })
    }

    pub fn bind(&self) {
        self.backend.use_program(self.program);
    }

    /// Program must be bound.
    pub fn set_texture_index(&self, index: u32) {
        self.backend
            .set_uniform_u32(self.program, TEXTURE_INDEX_UNIFORM, index);
    }

    pub fn program(&self) -> B::Program {
        self.program
    }
}

impl<B: GraphicsBackend> Drop for ShaderProgram<B> {
    fn drop(&mut self) {
        self.backend.delete_program(self.program);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EngineError, ShaderStage};
    use crate::render::null_backend::NullBackend;

    #[test]
    fn test_binding_define_follows_version_line() {
        let sources = BindlessShaderSources::new(2);
        let mut lines = sources.fragment.lines();
        assert_eq!(lines.next(), Some("#version 460"));
        assert_eq!(lines.next(), Some("#define TEXTURE_TABLE_BINDING 2"));
    }

    #[test]
    fn test_binding_slot_is_configurable() {
        let sources = BindlessShaderSources::new(9);
        assert!(sources.fragment.contains("#define TEXTURE_TABLE_BINDING 9\n"));
        assert!(sources.fragment.contains("binding = TEXTURE_TABLE_BINDING"));
    }

    #[test]
    fn test_fragment_reads_index_from_uniform() {
        let sources = BindlessShaderSources::new(2);
        assert!(sources.fragment.contains(&format!("uniform uint {}", TEXTURE_INDEX_UNIFORM)));
        assert!(!sources.vertex.contains(TEXTURE_TABLE_BINDING_DEFINE));
    }

    #[test]
    fn test_inject_define_without_version_prepends() {
        assert_eq!(inject_define("void main() {}", "X", 1), "#define X 1\nvoid main() {}");
    }

    #[test]
    fn test_compile_failure_surfaces_log() {
        let backend = Rc::new(NullBackend::new().with_compile_failure(ShaderStage::Fragment, "0:12: bad"));
        let result = ShaderProgram::compile(backend.clone(), &BindlessShaderSources::new(2));

        match result {
            Err(EngineError::ShaderCompile { stage, log }) => {
                assert_eq!(stage, ShaderStage::Fragment);
                assert_eq!(log, "0:12: bad");
            }
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => panic!("compile should fail"),
        }
        assert_eq!(backend.live_program_count(), 0);
    }

    #[test]
    fn test_drop_deletes_program() {
        let backend = Rc::new(NullBackend::new());
        let program = ShaderProgram::compile(backend.clone(), &BindlessShaderSources::new(2)).unwrap();
        assert_eq!(backend.live_program_count(), 1);
        drop(program);
        assert_eq!(backend.live_program_count(), 0);
    }
}
