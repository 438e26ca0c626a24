//! WGSL source for decoding and accumulating a force layout on the device.
//!
//! The generated module declares one record struct and one loader per
//! distinct kind of the layout, plus `accumulate_forces`, a loop over the
//! force table with one `switch` arm per kind. Unknown kind ids fall through
//! to the empty `default` arm.
//!
//! Built-in kinds get their evaluation bodies. Curl noise calls
//! `noise_gradient(q: vec3<f32>) -> vec3<f32>`, and a custom kind `n` calls
//! `eval_custom_n(f, p, v, t) -> vec3<f32>`; both must be provided by the
//! host shader.

use std::fmt::Write;

use super::builtin::{CURL_BASE_SCALE, CURL_SECOND_SAMPLE_OFFSET, DRAG_PARALLEL, DRAG_PERPENDICULAR};
use super::{FieldType, ForceKind, ForceLayout, ForceSchema};
use crate::utils::FALLBACK_AXIS;

#[derive(Copy, Clone, Debug)]
pub struct ShaderBindings {
    pub group: u32,
    pub data: u32,
    pub table: u32,
    pub frame: u32,
}

impl Default for ShaderBindings {
    fn default() -> Self {
        Self {
            group: 1,
            data: 0,
            table: 1,
            frame: 2,
        }
    }
}

fn wgsl_type(ty: FieldType) -> &'static str {
    match ty {
        FieldType::Scalar => "f32",
        FieldType::Vec2 => "vec2<f32>",
        FieldType::Vec3 => "vec3<f32>",
        FieldType::Vec4 => "vec4<f32>",
    }
}

pub fn record_name(kind: ForceKind) -> String {
    let mut name = String::new();
    for part in kind.name().split('_') {
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            name.extend(first.to_uppercase());
            name.push_str(chars.as_str());
        }
    }
    name.push_str("Force");
    name
}

fn write_record(out: &mut String, kind: ForceKind, schema: &ForceSchema) {
    let record = record_name(kind);
    let _ = writeln!(out, "struct {record} {{");
    for (field, ty) in schema.fields() {
        let _ = writeln!(out, "    {field}: {},", wgsl_type(ty));
    }
    if schema.is_empty() {
        let _ = writeln!(out, "    _pad: f32,");
    }
    let _ = writeln!(out, "}}\n");

    let _ = writeln!(out, "fn load_{}(o: u32) -> {record} {{", kind.name());
    let _ = writeln!(out, "    var r: {record};");
    let mut offset = 0;
    for (field, ty) in schema.fields() {
        let load = |i: usize| format!("force_data[o + {}u]", offset + i);
        let value = match ty {
            FieldType::Scalar => load(0),
            _ => {
                let parts: Vec<String> = (0..ty.width()).map(load).collect();
                format!("{}({})", wgsl_type(ty), parts.join(", "))
            }
        };
        let _ = writeln!(out, "    r.{field} = {value};");
        offset += ty.width();
    }
    let _ = writeln!(out, "    return r;\n}}\n");
}

fn write_builtin_eval(out: &mut String, kind: ForceKind) {
    let body = match kind {
        ForceKind::Gravity => "    return to_local(f.acceleration);".to_string(),
        ForceKind::CurlNoise => format!(
            "    let phase = vec3<f32>(force_frame.time * f.speed);\n\
             \x20   let q = world_p * {CURL_BASE_SCALE:?} * f.scale + phase;\n\
             \x20   let g1 = noise_gradient(q);\n\
             \x20   let g2 = noise_gradient(q + vec3<f32>({:?}, {:?}, {:?}));\n\
             \x20   return to_local(safe_normalize(cross(g1, g2)) * f.strength);",
            CURL_SECOND_SAMPLE_OFFSET.x, CURL_SECOND_SAMPLE_OFFSET.y, CURL_SECOND_SAMPLE_OFFSET.z
        ),
        ForceKind::Point => "    let dir = f.position - world_p;\n\
             \x20   let dist = length(dir);\n\
             \x20   if (dist <= 0.0) { return vec3<f32>(0.0); }\n\
             \x20   let t = clamp(1.0 - dist / f.falloff_distance, 0.0, 1.0);\n\
             \x20   return to_local(dir / dist * pow(t, f.falloff_power) * f.strength);"
            .to_string(),
        ForceKind::Vortex => format!(
            "    let axis = normalize_or(f.axis, vec3<f32>({:?}, {:?}, {:?}));\n\
             \x20   let rel = world_p - f.position;\n\
             \x20   let radial = rel - axis * dot(rel, axis);\n\
             \x20   let dist = length(radial);\n\
             \x20   if (dist <= 0.0) {{ return vec3<f32>(0.0); }}\n\
             \x20   let t = clamp(1.0 - dist / f.falloff_distance, 0.0, 1.0);\n\
             \x20   let swirl = safe_normalize(cross(axis, radial));\n\
             \x20   return to_local(swirl * f.strength * pow(t, f.falloff_power));",
            FALLBACK_AXIS.x, FALLBACK_AXIS.y, FALLBACK_AXIS.z
        ),
        ForceKind::Custom(_) => return,
    };
    let _ = writeln!(
        out,
        "fn eval_{}(f: {}, world_p: vec3<f32>) -> vec3<f32> {{\n{body}\n}}\n",
        kind.name(),
        record_name(kind)
    );
}

/// WGSL module for `layout`, bound with `bindings`.
pub fn shader_source(layout: &ForceLayout, bindings: ShaderBindings) -> String {
    let mut out = String::new();
    let ShaderBindings {
        group,
        data,
        table,
        frame,
    } = bindings;

    let _ = writeln!(out, "// generated from a layout of {} forces\n", layout.entries().len());
    out.push_str("struct ForceEntry {\n    kind: u32,\n    offset: u32,\n}\n\n");
    out.push_str("struct ForceFrame {\n");
    out.push_str("    local_to_world: mat4x4<f32>,\n");
    out.push_str("    world_to_local: mat4x4<f32>,\n");
    out.push_str("    time: f32,\n");
    out.push_str("    resistance: f32,\n");
    out.push_str("}\n\n");

    let binding = |index: u32| format!("@group({group}) @binding({index})");
    let _ = writeln!(out, "{} var<storage, read> force_data: array<f32>;", binding(data));
    let _ = writeln!(
        out,
        "{} var<storage, read> force_table: array<ForceEntry>;",
        binding(table)
    );
    let _ = writeln!(out, "{} var<uniform> force_frame: ForceFrame;\n", binding(frame));

    out.push_str("fn normalize_or(v: vec3<f32>, fallback: vec3<f32>) -> vec3<f32> {\n");
    out.push_str("    let l2 = dot(v, v);\n");
    out.push_str("    if (l2 < 1e-12) { return fallback; }\n");
    out.push_str("    return v * inverseSqrt(l2);\n");
    out.push_str("}\n\n");
    out.push_str("fn safe_normalize(v: vec3<f32>) -> vec3<f32> {\n");
    out.push_str("    return normalize_or(v, vec3<f32>(0.0));\n");
    out.push_str("}\n\n");
    out.push_str("fn to_local(v: vec3<f32>) -> vec3<f32> {\n");
    out.push_str("    return (force_frame.world_to_local * vec4<f32>(v, 0.0)).xyz;\n");
    out.push_str("}\n\n");

    for (kind, schema) in layout.kinds() {
        write_record(&mut out, kind, schema);
        write_builtin_eval(&mut out, kind);
    }

    out.push_str("fn directional_drag(v: vec3<f32>, t: vec3<f32>) -> vec3<f32> {\n");
    out.push_str("    let parallel = t * dot(v, t);\n");
    let _ = writeln!(
        out,
        "    let drag = parallel * {DRAG_PARALLEL:?} + (v - parallel) * {DRAG_PERPENDICULAR:?};"
    );
    out.push_str("    return -drag * force_frame.resistance;\n");
    out.push_str("}\n\n");

    out.push_str(
        "fn accumulate_forces(p: vec3<f32>, v: vec3<f32>, t: vec3<f32>) -> vec3<f32> {\n",
    );
    out.push_str("    let world_p = (force_frame.local_to_world * vec4<f32>(p, 1.0)).xyz;\n");
    out.push_str("    var acc = vec3<f32>(0.0);\n");
    out.push_str("    for (var i = 0u; i < arrayLength(&force_table); i = i + 1u) {\n");
    out.push_str("        let e = force_table[i];\n");
    out.push_str("        let o = e.offset / 4u;\n");
    out.push_str("        switch e.kind {\n");
    for (kind, _) in layout.kinds() {
        let name = kind.name();
        let call = if kind.is_builtin() {
            format!("eval_{name}(load_{name}(o), world_p)")
        } else {
            format!("eval_{name}(load_{name}(o), p, v, t)")
        };
        let _ = writeln!(out, "            case {}u: {{ acc += {call}; }}", kind.id());
    }
    out.push_str("            default: {}\n");
    out.push_str("        }\n    }\n    return acc;\n}\n");
    out
}

#[cfg(test)]
mod test {
    use glam::Vec3;

    use super::*;
    use crate::force::{FieldSource, ForceRegistry, ForceSet};

    #[test]
    fn record_names() {
        assert_eq!(record_name(ForceKind::Gravity), "GravityForce");
        assert_eq!(record_name(ForceKind::CurlNoise), "CurlNoiseForce");
        assert_eq!(record_name(ForceKind::Custom(3)), "Custom3Force");
    }

    #[test]
    fn one_arm_per_distinct_kind() {
        let mut registry = ForceRegistry::with_builtins();
        let wind = registry
            .register_custom(
                2,
                ForceSchema::new()
                    .with_field("direction", FieldType::Vec3)
                    .with_field("gust", FieldType::Scalar),
                None,
            )
            .unwrap();
        let gravity = registry
            .instantiate(ForceKind::Gravity, [("acceleration", Vec3::NEG_Y.into())])
            .unwrap();
        let wind = registry
            .instantiate(
                wind,
                [
                    ("direction", FieldSource::from(Vec3::X)),
                    ("gust", FieldSource::from(0.3)),
                ],
            )
            .unwrap();
        let set = ForceSet::from_instances(vec![gravity.clone(), wind, gravity]).unwrap();
        let source = shader_source(&ForceLayout::new(&set), ShaderBindings::default());

        assert_eq!(source.matches("struct GravityForce").count(), 1);
        assert!(source
            .contains("struct Custom2Force {\n    direction: vec3<f32>,\n    gust: f32,\n}"));
        assert!(source.contains("r.gust = force_data[o + 3u];"));
        assert!(source.contains("case 0u: { acc += eval_gravity(load_gravity(o), world_p); }"));
        assert!(source.contains("case 18u: { acc += eval_custom_2(load_custom_2(o), p, v, t); }"));
        assert!(source.contains("default: {}"));
        assert!(!source.contains("VortexForce"));
    }

    #[test]
    fn vortex_axis_falls_back_to_up() {
        let registry = ForceRegistry::with_builtins();
        let vortex = registry
            .instantiate(
                ForceKind::Vortex,
                [
                    ("position", Vec3::ZERO.into()),
                    ("axis", Vec3::ZERO.into()),
                    ("strength", 1f32.into()),
                    ("falloff_distance", 1f32.into()),
                    ("falloff_power", 1f32.into()),
                ],
            )
            .unwrap();
        let set = ForceSet::from_instances(vec![vortex]).unwrap();
        let source = shader_source(&ForceLayout::new(&set), ShaderBindings::default());

        assert!(source.contains("let axis = normalize_or(f.axis, vec3<f32>(0.0, 1.0, 0.0));"));
        assert!(source.contains("if (l2 < 1e-12) { return fallback; }"));
        assert!(!source.contains("normalize(f.axis)"));
    }
}
