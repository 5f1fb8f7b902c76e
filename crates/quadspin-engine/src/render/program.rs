//! CPU-side program linking.
//!
//! Linking checks that the vertex stage feeds every fragment input and that
//! shared uniforms agree, then records where each named vertex input and
//! resource lives. No GPU objects are involved; `ShaderPipeline` turns a linked
//! `Program` into a render pipeline.

use crate::error::PipelineError;

use super::shader::{CompiledStage, StageKind};

pub const POSITION: &str = "position";
pub const COLOR: &str = "color";
pub const PROJECTION: &str = "projection";
pub const MODEL_VIEW: &str = "modelView";

/// Bind-group slot of a uniform (`@group(g) @binding(b)`).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct UniformSlot {
    pub group: u32,
    pub binding: u32,
}

/// Resolved vertex attribute locations. `None` means the program does not
/// reference the attribute.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct AttributeLocations {
    pub position: Option<u32>,
    pub color: Option<u32>,
}

/// Resolved uniform locations. `None` means the program does not reference
/// the uniform.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct UniformLocations {
    pub projection: Option<UniformSlot>,
    pub model_view: Option<UniformSlot>,
}

/// A named vertex entry-point input.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub location: u32,
    pub(crate) ty: naga::TypeInner,
}

impl Attribute {
    /// Float scalar or vector input; what an `f32` vertex buffer can feed.
    pub fn is_float(&self) -> bool {
        match self.ty {
            naga::TypeInner::Scalar(scalar) | naga::TypeInner::Vector { scalar, .. } => {
                scalar.kind == naga::ScalarKind::Float
            }
            _ => false,
        }
    }
}

/// Whether a resource lives in the uniform address space.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ResourceKind {
    Uniform,
    Other,
}

/// A named, bound global of either stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub name: String,
    pub slot: UniformSlot,
    pub kind: ResourceKind,
    /// Stages that declare the resource.
    pub visibility: wgpu::ShaderStages,
    pub(crate) ty: naga::TypeInner,
}

impl Resource {
    /// `mat4x4<f32>`, the only uniform shape the renderer uploads.
    pub fn is_mat4(&self) -> bool {
        matches!(
            self.ty,
            naga::TypeInner::Matrix {
                columns: naga::VectorSize::Quad,
                rows: naga::VectorSize::Quad,
                scalar: naga::Scalar::F32,
            }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Slot {
    Location(u32),
    Position,
}

/// A stage input or output that crosses the stage boundary.
#[derive(Debug, Clone, PartialEq)]
struct Varying {
    name: String,
    slot: Slot,
    ty: naga::TypeInner,
    interpolation: Option<naga::Interpolation>,
    sampling: Option<naga::Sampling>,
}

/// Two compiled stages linked into one program.
#[derive(Debug, Clone)]
pub struct Program {
    vertex: CompiledStage,
    fragment: CompiledStage,
    attributes: Vec<Attribute>,
    resources: Vec<Resource>,
    fragment_outputs: Vec<u32>,
}

impl Program {
    /// Links `vertex` and `fragment`.
    ///
    /// All problems found are reported together in the link log.
    pub fn link(vertex: CompiledStage, fragment: CompiledStage) -> Result<Self, PipelineError> {
        let mut log = Vec::new();

        for (stage, expected) in [(&vertex, StageKind::Vertex), (&fragment, StageKind::Fragment)] {
            if stage.kind() != expected {
                log.push(format!(
                    "expected a {expected} stage, got a {} stage",
                    stage.kind()
                ));
            }
        }
        if !log.is_empty() {
            return Err(PipelineError::Link { log: log.join("\n") });
        }

        let vertex_inputs = entry_inputs(&vertex);
        let vertex_outputs = entry_outputs(&vertex);
        let fragment_inputs = entry_inputs(&fragment);
        let fragment_outputs = entry_outputs(&fragment);

        if !vertex_outputs.iter().any(|v| v.slot == Slot::Position) {
            log.push("vertex stage does not write @builtin(position)".to_string());
        }

        for input in &fragment_inputs {
            let Slot::Location(location) = input.slot else { continue };
            match vertex_outputs
                .iter()
                .find(|out| out.slot == Slot::Location(location))
            {
                None => log.push(format!(
                    "fragment input `{}` at @location({location}) is not written by the vertex stage",
                    input.name
                )),
                Some(out) if out.ty != input.ty => log.push(format!(
                    "@location({location}) type mismatch: vertex writes {}, fragment reads {}",
                    type_name(&out.ty),
                    type_name(&input.ty)
                )),
                Some(out)
                    if out.interpolation != input.interpolation
                        || out.sampling != input.sampling =>
                {
                    log.push(format!(
                        "@location({location}) interpolation mismatch: vertex writes {}, fragment reads {}",
                        interpolation_name(out),
                        interpolation_name(input)
                    ))
                }
                Some(_) => {}
            }
        }

        let resources = merge_resources(&vertex, &fragment, &mut log);

        if !log.is_empty() {
            return Err(PipelineError::Link { log: log.join("\n") });
        }

        let attributes = vertex_inputs
            .into_iter()
            .filter_map(|v| match v.slot {
                Slot::Location(location) => Some(Attribute {
                    name: v.name,
                    location,
                    ty: v.ty,
                }),
                Slot::Position => None,
            })
            .collect();

        let fragment_outputs = fragment_outputs
            .into_iter()
            .filter_map(|v| match v.slot {
                Slot::Location(location) => Some(location),
                Slot::Position => None,
            })
            .collect();

        Ok(Self {
            vertex,
            fragment,
            attributes,
            resources,
            fragment_outputs,
        })
    }

    pub fn vertex(&self) -> &CompiledStage {
        &self.vertex
    }

    pub fn fragment(&self) -> &CompiledStage {
        &self.fragment
    }

    /// Location of the vertex input called `name`, if referenced.
    pub fn attribute_location(&self, name: &str) -> Option<u32> {
        self.attribute(name).map(|a| a.location)
    }

    /// Slot of the uniform called `name`, if referenced by either stage.
    pub fn uniform_location(&self, name: &str) -> Option<UniformSlot> {
        self.resources
            .iter()
            .find(|r| r.name == name && r.kind == ResourceKind::Uniform)
            .map(|r| r.slot)
    }

    pub fn attribute_locations(&self) -> AttributeLocations {
        AttributeLocations {
            position: self.attribute_location(POSITION),
            color: self.attribute_location(COLOR),
        }
    }

    pub fn uniform_locations(&self) -> UniformLocations {
        UniformLocations {
            projection: self.uniform_location(PROJECTION),
            model_view: self.uniform_location(MODEL_VIEW),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.name == name)
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// `@location`s the fragment stage writes.
    pub fn fragment_outputs(&self) -> &[u32] {
        &self.fragment_outputs
    }
}

fn entry_inputs(stage: &CompiledStage) -> Vec<Varying> {
    let module = stage.module();
    let mut out = Vec::new();
    for arg in &stage.entry_point().function.arguments {
        collect_varyings(module, arg.name.as_deref(), arg.ty, arg.binding.as_ref(), &mut out);
    }
    out
}

fn entry_outputs(stage: &CompiledStage) -> Vec<Varying> {
    let module = stage.module();
    let mut out = Vec::new();
    if let Some(result) = &stage.entry_point().function.result {
        collect_varyings(module, None, result.ty, result.binding.as_ref(), &mut out);
    }
    out
}

/// Flattens an entry-point argument or result into its bound pieces.
///
/// Unbound values are structs whose members carry the bindings. Builtins other
/// than `position` never cross the stage boundary and are dropped.
fn collect_varyings(
    module: &naga::Module,
    name: Option<&str>,
    ty: naga::Handle<naga::Type>,
    binding: Option<&naga::Binding>,
    out: &mut Vec<Varying>,
) {
    let inner = &module.types[ty].inner;
    match binding {
        Some(naga::Binding::Location {
            location,
            interpolation,
            sampling,
            ..
        }) => out.push(Varying {
            name: name.unwrap_or_default().to_string(),
            slot: Slot::Location(*location),
            ty: inner.clone(),
            interpolation: *interpolation,
            sampling: *sampling,
        }),
        Some(naga::Binding::BuiltIn(naga::BuiltIn::Position { .. })) => out.push(Varying {
            name: name.unwrap_or_default().to_string(),
            slot: Slot::Position,
            ty: inner.clone(),
            interpolation: None,
            sampling: None,
        }),
        Some(naga::Binding::BuiltIn(_)) => {}
        None => {
            if let naga::TypeInner::Struct { members, .. } = inner {
                for member in members {
                    collect_varyings(
                        module,
                        member.name.as_deref(),
                        member.ty,
                        member.binding.as_ref(),
                        out,
                    );
                }
            }
        }
    }
}

fn stage_resources(stage: &CompiledStage) -> Vec<Resource> {
    let module = stage.module();
    module
        .global_variables
        .iter()
        .filter_map(|(_, var)| {
            let binding = var.binding.as_ref()?;
            let kind = match var.space {
                naga::AddressSpace::Uniform => ResourceKind::Uniform,
                _ => ResourceKind::Other,
            };
            Some(Resource {
                name: var.name.clone().unwrap_or_default(),
                slot: UniformSlot {
                    group: binding.group,
                    binding: binding.binding,
                },
                kind,
                visibility: stage.kind().visibility(),
                ty: module.types[var.ty].inner.clone(),
            })
        })
        .collect()
}

/// Merges the resources of both stages, reporting conflicting declarations.
fn merge_resources(
    vertex: &CompiledStage,
    fragment: &CompiledStage,
    log: &mut Vec<String>,
) -> Vec<Resource> {
    let mut merged = stage_resources(vertex);

    for resource in stage_resources(fragment) {
        let same_slot = merged.iter_mut().find(|r| r.slot == resource.slot);
        match same_slot {
            Some(existing) if existing.kind == resource.kind && existing.ty == resource.ty => {
                existing.visibility |= resource.visibility;
            }
            Some(existing) => log.push(format!(
                "@group({}) @binding({}) declared as `{}` ({}) in the vertex stage and `{}` ({}) in the fragment stage",
                resource.slot.group,
                resource.slot.binding,
                existing.name,
                type_name(&existing.ty),
                resource.name,
                type_name(&resource.ty)
            )),
            None => {
                if merged.iter().any(|r| r.name == resource.name) {
                    log.push(format!(
                        "`{}` is bound to different slots in the vertex and fragment stages",
                        resource.name
                    ));
                } else {
                    merged.push(resource);
                }
            }
        }
    }

    merged
}

/// WGSL-style `@interpolate` arguments of a varying, e.g. `perspective, center`.
fn interpolation_name(varying: &Varying) -> String {
    let Some(interpolation) = varying.interpolation else {
        return "none".to_string();
    };
    let mut name = format!("{interpolation:?}").to_lowercase();
    if let Some(sampling) = varying.sampling {
        name.push_str(", ");
        name.push_str(&format!("{sampling:?}").to_lowercase());
    }
    name
}

pub(crate) fn type_name(ty: &naga::TypeInner) -> String {
    fn scalar(s: naga::Scalar) -> String {
        let prefix = match s.kind {
            naga::ScalarKind::Float => "f",
            naga::ScalarKind::Sint => "i",
            naga::ScalarKind::Uint => "u",
            naga::ScalarKind::Bool => return "bool".to_string(),
            _ => return format!("{s:?}"),
        };
        format!("{prefix}{}", u32::from(s.width) * 8)
    }

    match ty {
        naga::TypeInner::Scalar(s) => scalar(*s),
        naga::TypeInner::Vector { size, scalar: s } => {
            format!("vec{}<{}>", *size as u8, scalar(*s))
        }
        naga::TypeInner::Matrix {
            columns,
            rows,
            scalar: s,
        } => format!("mat{}x{}<{}>", *columns as u8, *rows as u8, scalar(*s)),
        other => format!("{other:?}"),
    }
}
