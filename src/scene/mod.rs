//! Render context and mesh-surface registry
//!
//! The scene shell owns the loaded eye model; this module holds the part
//! the compositing core needs to see: named surfaces with a material slot,
//! a visibility flag, and an opacity, plus the generation counter that
//! invalidates in-flight composites when the displayed eye changes.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::composite::CompositeMaterial;

/// Which eye's imagery is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EyeSide {
    #[default]
    Left,
    Right,
}

impl EyeSide {
    pub fn label(&self) -> &'static str {
        match self {
            EyeSide::Left => "Left",
            EyeSide::Right => "Right",
        }
    }
}

/// One drawable surface of the loaded model.
///
/// `material` is the installed composite; `None` means the surface still
/// renders its original material.
pub struct MeshSurface {
    /// Node name in the model hierarchy
    pub name: String,
    /// Material name, the convention composites are matched against
    pub material_name: String,
    pub visible: bool,
    pub opacity: f32,
    pub material: Option<Arc<CompositeMaterial>>,
}

impl MeshSurface {
    fn new(name: &str, material_name: &str) -> Self {
        Self {
            name: name.to_string(),
            material_name: material_name.to_string(),
            visible: true,
            opacity: 1.0,
            material: None,
        }
    }
}

/// Material name of the inner back surface the composite targets.
pub const MATERIAL_BACK: &str = "Material_Back";
/// Anterior surface materials, toggled as a group.
pub const MATERIAL_SCLERA: &str = "Material_Sclera";
pub const MATERIAL_IRIS: &str = "Material_Iris";
pub const MATERIAL_CORNEA: &str = "Material_Cornea";

/// The surface registry for the currently displayed eye.
pub struct RenderContext {
    side: EyeSide,
    surfaces: Vec<MeshSurface>,
    generation: u64,
}

impl RenderContext {
    /// Build the registry for one eye side.
    pub fn new(side: EyeSide) -> Self {
        Self {
            side,
            surfaces: standard_surfaces(),
            generation: 0,
        }
    }

    pub fn side(&self) -> EyeSide {
        self.side
    }

    /// Context id; bumped on every side switch so stale composites can be
    /// told apart from current ones.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn surfaces(&self) -> &[MeshSurface] {
        &self.surfaces
    }

    pub fn surfaces_mut(&mut self) -> &mut [MeshSurface] {
        &mut self.surfaces
    }

    pub fn surface(&self, name: &str) -> Option<&MeshSurface> {
        self.surfaces.iter().find(|s| s.name == name)
    }

    pub fn surface_mut(&mut self, name: &str) -> Option<&mut MeshSurface> {
        self.surfaces.iter_mut().find(|s| s.name == name)
    }

    /// Discard the current context and present the other model instance:
    /// fresh surfaces, original materials, next generation.
    pub fn switch_side(&mut self, side: EyeSide) {
        self.side = side;
        self.surfaces = standard_surfaces();
        self.generation += 1;
        log::info!("render context switched to {} eye", side.label());
    }

    /// Install a composite on every surface matching the material name.
    /// Returns how many surfaces took it.
    pub fn install_material(
        &mut self,
        material_name: &str,
        material: Arc<CompositeMaterial>,
    ) -> usize {
        let mut installed = 0;
        for surface in &mut self.surfaces {
            if surface.material_name == material_name {
                surface.material = Some(material.clone());
                installed += 1;
            }
        }
        installed
    }
}

/// The surfaces of the standard eye model.
fn standard_surfaces() -> Vec<MeshSurface> {
    vec![
        MeshSurface::new("fundus", MATERIAL_BACK),
        MeshSurface::new("sclera", MATERIAL_SCLERA),
        MeshSurface::new("iris", MATERIAL_IRIS),
        MeshSurface::new("cornea", MATERIAL_CORNEA),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context_surfaces() {
        let ctx = RenderContext::new(EyeSide::Left);
        assert_eq!(ctx.surfaces().len(), 4);
        assert!(ctx.surface("fundus").is_some());
        assert!(ctx.surfaces().iter().all(|s| s.visible && s.material.is_none()));
    }

    #[test]
    fn test_switch_side_bumps_generation_and_resets() {
        let mut ctx = RenderContext::new(EyeSide::Left);
        ctx.surface_mut("sclera").unwrap().visible = false;

        ctx.switch_side(EyeSide::Right);
        assert_eq!(ctx.side(), EyeSide::Right);
        assert_eq!(ctx.generation(), 1);
        assert!(ctx.surface("sclera").unwrap().visible);
    }
}
