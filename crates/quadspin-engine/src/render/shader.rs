use std::fmt;

use crate::error::PipelineError;

/// Bundled vertex stage. Declares the `position`/`color` attributes and the
/// `projection`/`modelView` uniforms.
pub const VERTEX_SHADER: &str = include_str!("shaders/quad.vert.wgsl");

/// Bundled fragment stage.
pub const FRAGMENT_SHADER: &str = include_str!("shaders/quad.frag.wgsl");

/// Pipeline stage a shader source is compiled for.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum StageKind {
    Vertex,
    Fragment,
}

impl StageKind {
    pub(crate) fn naga_stage(self) -> naga::ShaderStage {
        match self {
            StageKind::Vertex => naga::ShaderStage::Vertex,
            StageKind::Fragment => naga::ShaderStage::Fragment,
        }
    }

    pub(crate) fn visibility(self) -> wgpu::ShaderStages {
        match self {
            StageKind::Vertex => wgpu::ShaderStages::VERTEX,
            StageKind::Fragment => wgpu::ShaderStages::FRAGMENT,
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StageKind::Vertex => "vertex",
            StageKind::Fragment => "fragment",
        })
    }
}

/// WGSL source for one stage, not yet compiled.
#[derive(Debug, Clone)]
pub struct ShaderStage {
    kind: StageKind,
    source: String,
}

impl ShaderStage {
    pub fn new(kind: StageKind, source: impl Into<String>) -> Self {
        Self {
            kind,
            source: source.into(),
        }
    }

    pub fn kind(&self) -> StageKind {
        self.kind
    }

    /// Parses and validates the source, and locates the stage's entry point.
    ///
    /// Nothing is created on the GPU here; a failed stage therefore leaves no
    /// object behind. The error carries the rendered diagnostic.
    pub fn compile(self) -> Result<CompiledStage, PipelineError> {
        let module = naga::front::wgsl::parse_str(&self.source)
            .map_err(|e| self.failed(e.emit_to_string(&self.source)))?;

        let mut validator = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::empty(),
        );
        validator
            .validate(&module)
            .map_err(|e| self.failed(e.emit_to_string(&self.source)))?;

        let stage = self.kind.naga_stage();
        let Some(entry_point) = module
            .entry_points
            .iter()
            .position(|ep| ep.stage == stage)
        else {
            return Err(self.failed(format!("no @{} entry point found", self.kind)));
        };

        log::debug!(
            "compiled {} stage (entry point `{}`)",
            self.kind,
            module.entry_points[entry_point].name
        );

        Ok(CompiledStage {
            kind: self.kind,
            source: self.source,
            module,
            entry_point,
        })
    }

    fn failed(&self, log: String) -> PipelineError {
        // Never report an empty diagnostic.
        let log = if log.trim().is_empty() {
            format!("{} stage rejected without diagnostic", self.kind)
        } else {
            log
        };
        PipelineError::Compile {
            stage: self.kind,
            log,
        }
    }
}

/// A stage that compiled successfully. Only these can be linked.
#[derive(Debug, Clone)]
pub struct CompiledStage {
    kind: StageKind,
    source: String,
    module: naga::Module,
    /// Index into `module.entry_points`.
    entry_point: usize,
}

impl CompiledStage {
    pub fn kind(&self) -> StageKind {
        self.kind
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn entry_point_name(&self) -> &str {
        &self.module.entry_points[self.entry_point].name
    }

    pub(crate) fn module(&self) -> &naga::Module {
        &self.module
    }

    pub(crate) fn entry_point(&self) -> &naga::EntryPoint {
        &self.module.entry_points[self.entry_point]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_stages_compile() {
        let vs = ShaderStage::new(StageKind::Vertex, VERTEX_SHADER)
            .compile()
            .unwrap();
        let fs = ShaderStage::new(StageKind::Fragment, FRAGMENT_SHADER)
            .compile()
            .unwrap();
        assert_eq!(vs.entry_point_name(), "vs_main");
        assert_eq!(fs.entry_point_name(), "fs_main");
    }

    #[test]
    fn syntax_error_reports_a_log() {
        let err = ShaderStage::new(StageKind::Vertex, "@vertex fn main( -> {")
            .compile()
            .unwrap_err();
        match err {
            PipelineError::Compile { stage, log } => {
                assert_eq!(stage, StageKind::Vertex);
                assert!(!log.trim().is_empty());
            }
            other => panic!("expected a compile error, got {other:?}"),
        }
    }

    #[test]
    fn type_error_reports_a_log() {
        // Well-formed syntax, but returns the wrong type.
        let src = "@fragment fn fs_main() -> @location(0) vec4<f32> { return 1.0; }";
        let err = ShaderStage::new(StageKind::Fragment, src)
            .compile()
            .unwrap_err();
        let PipelineError::Compile { stage, log } = err else {
            panic!("expected a compile error");
        };
        assert_eq!(stage, StageKind::Fragment);
        assert!(!log.is_empty());
    }

    #[test]
    fn stage_without_matching_entry_point_is_rejected() {
        let err = ShaderStage::new(StageKind::Vertex, FRAGMENT_SHADER)
            .compile()
            .unwrap_err();
        assert_eq!(
            err,
            PipelineError::Compile {
                stage: StageKind::Vertex,
                log: "no @vertex entry point found".to_string(),
            }
        );
    }

    #[test]
    fn stage_kind_selects_wgpu_visibility() {
        assert_eq!(StageKind::Vertex.visibility(), wgpu::ShaderStages::VERTEX);
        assert_eq!(StageKind::Fragment.visibility(), wgpu::ShaderStages::FRAGMENT);
        assert_eq!(StageKind::Fragment.to_string(), "fragment");
    }
}
