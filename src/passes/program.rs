//! Shader program compilation and variant caching.
//!
//! Feature toggles such as position restriction change shader *behavior*,
//! not just parameters, so they are compiled in rather than branched on at
//! runtime: a header of constants is textually injected ahead of the
//! vertex and fragment source, the shader branches on those constants, and
//! the compiler folds the branches away. Compiled variants are cached
//! keyed by [`PipelineKey`] so toggling a feature back and forth never
//! recompiles from source concatenation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::RecordLayout;

/// Errors from shader compilation or pipeline creation.
#[derive(Error, Debug, Clone)]
pub enum ProgramError {
    /// A shader stage failed to compile; carries the compiler diagnostic.
    #[error("Shader compilation failed for `{name}`: {diagnostic}")]
    Compile {
        /// Program name.
        name: String,
        /// Compiler output.
        diagnostic: String,
    },

    /// Pipeline creation failed; carries the validation diagnostic.
    #[error("Pipeline creation failed for `{name}`: {diagnostic}")]
    Link {
        /// Program name.
        name: String,
        /// Validation output.
        diagnostic: String,
    },
}

/// Physics kernel compiled into the physics pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Kernel {
    /// Velocity accumulates toward the pointer target each step.
    Attractor,
    /// Free flight; velocity is only changed by boundary handling.
    Ballistic,
}

/// Boundary behavior compiled into the physics pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionMode {
    /// Positions may leave the visible [-1, 1] area.
    Unrestricted,
    /// Positions are clamped to [-1, 1] and velocity reflects.
    Restricted,
}

/// Cache key selecting one compiled program variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    /// Physics kernel.
    pub kernel: Kernel,
    /// Boundary behavior.
    pub position_mode: PositionMode,
    /// Record layout, which fixes the texel stride in every shader.
    pub layout: RecordLayout,
}

impl PipelineKey {
    /// The injected constant header for this variant.
    ///
    /// Every feature constant is always declared so the shader source can
    /// reference it unconditionally; the values select the variant.
    pub fn header(&self) -> String {
        format!(
            "const ATTRACT_TO_TARGET: bool = {};\n\
             const RESTRICT_POSITION: bool = {};\n\
             const SLOTS: u32 = {}u;\n",
            self.kernel == Kernel::Attractor,
            self.position_mode == PositionMode::Restricted,
            self.layout.slots(),
        )
    }

    /// Compose a full module: injected header, then the vertex stage
    /// source, then the fragment stage source.
    pub fn compose(&self, vert: &str, frag: &str) -> String {
        let mut module = self.header();
        module.push('\n');
        module.push_str(vert);
        module.push('\n');
        module.push_str(frag);
        module
    }
}

/// A validated shader module holding both stages of one program variant.
pub struct ShaderProgram {
    /// The compiled module; entry points are `vs_main` and `fs_main`.
    pub module: wgpu::ShaderModule,
}

impl ShaderProgram {
    /// Compose and compile a program variant.
    ///
    /// Compilation errors are captured through a validation error scope so
    /// the compiler's diagnostic text reaches the operator instead of the
    /// uncaptured-error handler. On failure nothing is retained.
    pub fn compile(
        device: &wgpu::Device,
        name: &str,
        vert: &str,
        frag: &str,
        key: &PipelineKey,
    ) -> Result<Self, ProgramError> {
        let source = key.compose(vert, frag);

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(name),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(ProgramError::Compile {
                name: name.to_string(),
                diagnostic: error.to_string(),
            });
        }

        Ok(Self { module })
    }
}

/// Run `build` inside a validation error scope, mapping any captured
/// error to [`ProgramError::Link`]. Used around pipeline creation.
pub(crate) fn link_scope<T>(
    device: &wgpu::Device,
    name: &str,
    build: impl FnOnce() -> T,
) -> Result<T, ProgramError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = build();
    if let Some(error) = pollster::block_on(device.pop_error_scope()) {
        return Err(ProgramError::Link {
            name: name.to_string(),
            diagnostic: error.to_string(),
        });
    }
    Ok(value)
}

/// Compiled program variants keyed by program name and [`PipelineKey`].
///
/// The cache outlives simulation rebuilds: reinitializing with a different
/// particle count reuses the modules already compiled for the same variant.
#[derive(Default)]
pub struct ProgramCache {
    programs: HashMap<(String, PipelineKey), ShaderProgram>,
}

impl ProgramCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a compiled variant, compiling and inserting it on miss.
    pub fn get_or_compile(
        &mut self,
        device: &wgpu::Device,
        name: &str,
        vert: &str,
        frag: &str,
        key: &PipelineKey,
    ) -> Result<&ShaderProgram, ProgramError> {
        let cache_key = (name.to_string(), *key);
        if !self.programs.contains_key(&cache_key) {
            let program = ShaderProgram::compile(device, name, vert, frag, key)?;
            tracing::debug!(program = name, ?key, "compiled shader variant");
            self.programs.insert(cache_key.clone(), program);
        }
        Ok(&self.programs[&cache_key])
    }

    /// Number of cached variants.
    pub fn len(&self) -> usize {
        self.programs.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(kernel: Kernel, mode: PositionMode) -> PipelineKey {
        PipelineKey {
            kernel,
            position_mode: mode,
            layout: RecordLayout::PosVel2,
        }
    }

    #[test]
    fn test_header_declares_every_feature() {
        let header = key(Kernel::Attractor, PositionMode::Unrestricted).header();
        assert!(header.contains("const ATTRACT_TO_TARGET: bool = true;"));
        assert!(header.contains("const RESTRICT_POSITION: bool = false;"));
        assert!(header.contains("const SLOTS: u32 = 1u;"));
    }

    #[test]
    fn test_restricted_header_flips_constant() {
        let header = key(Kernel::Ballistic, PositionMode::Restricted).header();
        assert!(header.contains("const ATTRACT_TO_TARGET: bool = false;"));
        assert!(header.contains("const RESTRICT_POSITION: bool = true;"));
    }

    #[test]
    fn test_two_slot_layout_changes_stride() {
        let k = PipelineKey {
            kernel: Kernel::Ballistic,
            position_mode: PositionMode::Unrestricted,
            layout: RecordLayout::PosAgeVel3,
        };
        assert!(k.header().contains("const SLOTS: u32 = 2u;"));
    }

    #[test]
    fn test_compose_orders_header_vert_frag() {
        let k = key(Kernel::Attractor, PositionMode::Unrestricted);
        let module = k.compose("// vert", "// frag");
        let header_end = module.find("// vert").unwrap();
        let frag_start = module.find("// frag").unwrap();
        assert!(module[..header_end].contains("RESTRICT_POSITION"));
        assert!(header_end < frag_start);
    }
}
