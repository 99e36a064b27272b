//! WGSL sources of every program.
//!
//! A module is the shared prelude, the light-input bindings for lit-pass
//! programs, then the program body. Bodies that differ only in alpha testing
//! or the light visualisation swizzle share one file and are specialised by
//! substituting the prelude constants.

use crate::renderer::shaders::ShaderKind;
use crate::renderer::state::Swizzle;

const PRELUDE: &str = include_str!("../../shader/prelude.wgsl");
const LIGHT_INPUTS: &str = include_str!("../../shader/light_inputs.wgsl");

fn body(kind: ShaderKind) -> &'static str {
    match kind {
        ShaderKind::ObjectPass1 => include_str!("../../shader/object_pass1.wgsl"),
        ShaderKind::ObjectRefPass1 => include_str!("../../shader/object_ref_pass1.wgsl"),
        ShaderKind::GrassPass1 => include_str!("../../shader/grass_pass1.wgsl"),
        ShaderKind::NormalMap => include_str!("../../shader/normal_map.wgsl"),
        ShaderKind::ObjectPass2 | ShaderKind::ObjectRefPass2 => {
            include_str!("../../shader/object_pass2.wgsl")
        }
        ShaderKind::SphereMap => include_str!("../../shader/sphere_map.wgsl"),
        ShaderKind::DetailledObjectPass2 => {
            include_str!("../../shader/detailled_object_pass2.wgsl")
        }
        ShaderKind::GrassPass2 => include_str!("../../shader/grass_pass2.wgsl"),
        ShaderKind::ObjectUnlit => include_str!("../../shader/object_unlit.wgsl"),
        ShaderKind::Splatting => include_str!("../../shader/splatting.wgsl"),
        ShaderKind::Transparent => include_str!("../../shader/transparent.wgsl"),
        ShaderKind::TransparentFog => include_str!("../../shader/transparent_fog.wgsl"),
        ShaderKind::DisplaceMask => include_str!("../../shader/displace_mask.wgsl"),
        ShaderKind::Displace => include_str!("../../shader/displace.wgsl"),
        ShaderKind::Shadow => include_str!("../../shader/shadow.wgsl"),
        ShaderKind::RefShadow => include_str!("../../shader/ref_shadow.wgsl"),
        ShaderKind::GrassShadow => include_str!("../../shader/grass_shadow.wgsl"),
        ShaderKind::Rsm => include_str!("../../shader/rsm.wgsl"),
        ShaderKind::PassThrough => include_str!("../../shader/pass_through.wgsl"),
    }
}

/// The cascade depth pass has no fragment stage at all.
pub fn has_fragment_stage(kind: ShaderKind) -> bool {
    kind != ShaderKind::Shadow
}

/// Swizzle variant actually compiled for `kind`: only lit programs have a
/// light visualisation path.
pub fn variant(kind: ShaderKind, swizzle: Swizzle) -> Swizzle {
    if kind.reads_light_inputs() {
        swizzle
    } else {
        Swizzle::Rgba
    }
}

pub fn program_source(kind: ShaderKind, swizzle: Swizzle) -> String {
    let light_viz = variant(kind, swizzle) == Swizzle::LightViz;
    let alpha_ref = kind == ShaderKind::ObjectRefPass2;

    let mut source = PRELUDE
        .replace("{{LIGHT_VIZ}}", bool_literal(light_viz))
        .replace("{{ALPHA_REF}}", bool_literal(alpha_ref));
    if kind.reads_light_inputs() {
        source.push('\n');
        source.push_str(LIGHT_INPUTS);
    }
    source.push('\n');
    source.push_str(body(kind));
    source
}

fn bool_literal(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_are_substituted_per_variant() {
        let plain = program_source(ShaderKind::ObjectPass2, Swizzle::Rgba);
        assert!(plain.contains("const LIGHT_VIZ: bool = false;"));
        assert!(plain.contains("const ALPHA_REF: bool = false;"));
        assert!(!plain.contains("{{"));

        let viz = program_source(ShaderKind::ObjectRefPass2, Swizzle::LightViz);
        assert!(viz.contains("const LIGHT_VIZ: bool = true;"));
        assert!(viz.contains("const ALPHA_REF: bool = true;"));
    }

    #[test]
    fn light_inputs_only_reach_lit_programs() {
        assert!(program_source(ShaderKind::Splatting, Swizzle::Rgba).contains("fn lit_color"));
        assert!(!program_source(ShaderKind::Transparent, Swizzle::Rgba).contains("fn lit_color"));
    }

    #[test]
    fn unlit_programs_ignore_the_light_viz_swizzle() {
        assert_eq!(variant(ShaderKind::Transparent, Swizzle::LightViz), Swizzle::Rgba);
        assert_eq!(variant(ShaderKind::GrassPass2, Swizzle::LightViz), Swizzle::LightViz);
        let source = program_source(ShaderKind::Rsm, Swizzle::LightViz);
        assert!(source.contains("const LIGHT_VIZ: bool = false;"));
    }

    #[test]
    fn every_body_declares_both_entry_points() {
        for kind in ShaderKind::ALL {
            let source = program_source(kind, Swizzle::Rgba);
            assert!(source.contains("fn vs_main"), "{kind:?}");
            assert_eq!(
                source.contains("fn fs_main"),
                has_fragment_stage(kind),
                "{kind:?}"
            );
        }
    }
}
