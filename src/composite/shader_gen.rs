//! Composite shader generation
//!
//! Synthesizes the WGSL program for a given overlay configuration. The
//! program text is a pure function of the weight list and blend profile:
//! identical inputs produce byte-identical sources, so a settled re-toggle
//! reproduces the exact program it replaced.

use serde::{Deserialize, Serialize};

use crate::error::CompositeError;

/// Base luminance below which `BlackKey` output becomes fully transparent.
const BLACK_KEY_THRESHOLD: f32 = 0.005;

/// How the fragment stage derives output alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlendProfile {
    /// Composite is written opaque
    #[default]
    Opaque,
    /// Near-black base pixels become fully transparent, letting the
    /// background show through mask-like overlay textures
    BlackKey,
}

/// Generated program text for one composite configuration.
///
/// Each source is self-contained (shared declarations are repeated in both)
/// so the stages can be compiled as independent modules.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderSource {
    pub vertex: String,
    pub fragment: String,
}

/// Generate the composite program for `weights.len()` overlays.
///
/// The vertex stage passes the surface UV through unchanged. The fragment
/// stage seeds the output with the base sample, then accumulates each
/// overlay sample scaled by its weight. The sum is intentionally unclamped:
/// stacked overlays brighten rather than blend, which is the wanted
/// highlight-accumulation look for diagnostic markers.
///
/// With zero overlays the program samples only the base texture and
/// declares no overlay bindings.
pub fn composite_shader(weights: &[f32], profile: BlendProfile) -> ShaderSource {
    let common = common_decls(weights.len());

    let vertex_entry = r#"
@vertex
fn vs_main(@location(0) position: vec3<f32>, @location(1) uv: vec2<f32>) -> VsOut {
    var out: VsOut;
    out.position = scene.mvp * vec4<f32>(position, 1.0);
    out.uv = uv;
    return out;
}
"#;

    let mut fragment_entry =
        String::from("\n@fragment\nfn fs_main(in: VsOut) -> @location(0) vec4<f32> {\n");
    fragment_entry.push_str("    let base = textureSample(base_texture, tex_sampler, in.uv);\n");
    fragment_entry.push_str("    var color = base.rgb;\n");
    for (i, weight) in weights.iter().enumerate() {
        fragment_entry.push_str(&format!(
            "    color = color + textureSample(overlay_{i}, tex_sampler, in.uv).rgb * {};\n",
            wgsl_f32(*weight)
        ));
    }
    match profile {
        BlendProfile::Opaque => {
            fragment_entry.push_str("    return vec4<f32>(color, 1.0);\n");
        }
        BlendProfile::BlackKey => {
            fragment_entry.push_str("    let peak = max(base.r, max(base.g, base.b));\n");
            fragment_entry.push_str(&format!(
                "    let alpha = select(1.0, 0.0, peak < {});\n",
                wgsl_f32(BLACK_KEY_THRESHOLD)
            ));
            fragment_entry.push_str("    return vec4<f32>(color, alpha);\n");
        }
    }
    fragment_entry.push_str("}\n");

    ShaderSource {
        vertex: format!("{common}{vertex_entry}"),
        fragment: format!("{common}{fragment_entry}"),
    }
}

/// Shared declarations: frame uniforms, sampler, and the texture bindings
/// sized to the overlay count.
fn common_decls(overlay_count: usize) -> String {
    let mut out = String::from(
        r#"struct SceneUniforms {
    mvp: mat4x4<f32>,
};

@group(0) @binding(0)
var<uniform> scene: SceneUniforms;

@group(0) @binding(1)
var tex_sampler: sampler;

@group(1) @binding(0)
var base_texture: texture_2d<f32>;
"#,
    );

    for i in 0..overlay_count {
        out.push_str(&format!(
            "\n@group(1) @binding({})\nvar overlay_{i}: texture_2d<f32>;\n",
            i + 1
        ));
    }

    out.push_str(
        r#"
struct VsOut {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};
"#,
    );

    out
}

/// Format an f32 as a WGSL literal: stable across calls (shortest
/// round-trip form), always carrying a decimal point so the literal stays
/// typed f32.
fn wgsl_f32(v: f32) -> String {
    if !v.is_finite() {
        return "0.0".to_string();
    }
    let s = format!("{v}");
    if s.contains('.') {
        s
    } else {
        format!("{s}.0")
    }
}

/// Parse and validate both stages with naga before they reach the device.
pub fn validate(source: &ShaderSource) -> Result<(), CompositeError> {
    validate_stage("vertex", &source.vertex)?;
    validate_stage("fragment", &source.fragment)
}

fn validate_stage(stage: &str, wgsl: &str) -> Result<(), CompositeError> {
    let module = naga::front::wgsl::parse_str(wgsl)
        .map_err(|e| CompositeError::ShaderBuild(format!("{stage} parse error: {e}")))?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    validator
        .validate(&module)
        .map_err(|e| CompositeError::ShaderBuild(format!("{stage} validation error: {e}")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overlay_texture_count(wgsl: &str) -> usize {
        let module = naga::front::wgsl::parse_str(wgsl).unwrap();
        module
            .global_variables
            .iter()
            .filter(|(_, var)| {
                var.name
                    .as_deref()
                    .map(|n| n.starts_with("overlay_") && n != "overlay_sampler")
                    .unwrap_or(false)
            })
            .count()
    }

    #[test]
    fn test_identical_inputs_are_byte_identical() {
        let a = composite_shader(&[1.0, 0.5], BlendProfile::Opaque);
        let b = composite_shader(&[1.0, 0.5], BlendProfile::Opaque);
        assert_eq!(a, b);
    }

    #[test]
    fn test_unit_count_matches_weight_count() {
        for n in 0..5 {
            let weights = vec![0.85; n];
            let shader = composite_shader(&weights, BlendProfile::Opaque);
            assert_eq!(overlay_texture_count(&shader.fragment), n);
        }
    }

    #[test]
    fn test_zero_overlays_declares_no_overlay_bindings() {
        let shader = composite_shader(&[], BlendProfile::Opaque);
        assert!(!shader.fragment.contains("overlay_0"));
        assert!(!shader.vertex.contains("overlay_0"));
        validate(&shader).unwrap();
    }

    #[test]
    fn test_generated_programs_validate() {
        for n in [0, 1, 3, 8] {
            let weights: Vec<f32> = (0..n).map(|i| 0.25 * (i + 1) as f32).collect();
            for profile in [BlendProfile::Opaque, BlendProfile::BlackKey] {
                let shader = composite_shader(&weights, profile);
                validate(&shader).unwrap_or_else(|e| panic!("n={n} {profile:?}: {e}"));
            }
        }
    }

    #[test]
    fn test_weights_are_embedded_as_literals() {
        let shader = composite_shader(&[0.85, 1.0], BlendProfile::Opaque);
        assert!(shader.fragment.contains("* 0.85;"));
        assert!(shader.fragment.contains("* 1.0;"));
    }

    #[test]
    fn test_black_key_gates_alpha_on_base() {
        let keyed = composite_shader(&[1.0], BlendProfile::BlackKey);
        assert!(keyed.fragment.contains("select(1.0, 0.0, peak < 0.005)"));

        let opaque = composite_shader(&[1.0], BlendProfile::Opaque);
        assert!(!opaque.fragment.contains("select"));
    }

    #[test]
    fn test_wgsl_f32_formatting() {
        assert_eq!(wgsl_f32(1.0), "1.0");
        assert_eq!(wgsl_f32(0.85), "0.85");
        assert_eq!(wgsl_f32(0.005), "0.005");
        assert_eq!(wgsl_f32(2.5), "2.5");
    }
}
