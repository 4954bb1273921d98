//! Surface dissolve stage: a `MaterialExtension` over `StandardMaterial`.
//!
//! PBR lighting runs untouched; the extension fragment then classifies the
//! fragment's object-space position against the erosion front and applies
//! the policy — dissolved fragments are discarded, edge-band fragments get
//! the flat edge color, solid fragments keep their lit color.

use bevy::{
    asset::embedded_asset,
    pbr::{MaterialExtension, MaterialPlugin, StandardMaterial},
    prelude::*,
    render::render_resource::{AsBindGroup, ShaderType},
    shader::ShaderRef,
};

pub use bevy::pbr::ExtendedMaterial;

use crate::data::DissolveParams;

/// Convenience alias for the extended material asset.
pub type DissolveMaterial = ExtendedMaterial<StandardMaterial, DissolveExtension>;

/// Plugin that registers the [`DissolveExtension`] with Bevy's renderer.
pub struct DissolveMaterialPlugin;

impl Plugin for DissolveMaterialPlugin {
    fn build(&self, app: &mut App) {
        embedded_asset!(app, "shaders/dissolve.wgsl");
        app.add_plugins(MaterialPlugin::<DissolveMaterial>::default());
    }
}

/// Uniform data sent to the GPU for the dissolve stage.
#[derive(Clone, Copy, ShaderType, Debug)]
pub struct DissolveUniform {
    pub edge_color: LinearRgba,
    pub frequency: f32,
    pub amplitude: f32,
    pub progress: f32,
    pub edge_width: f32,
}

/// Shader extension injecting the dissolve boundary test into an existing
/// lit material.
#[derive(Asset, AsBindGroup, TypePath, Debug, Clone)]
pub struct DissolveExtension {
    #[uniform(100)]
    pub uniform: DissolveUniform,
}

impl Default for DissolveExtension {
    fn default() -> Self {
        Self::from_params(&DissolveParams::default())
    }
}

impl DissolveExtension {
    pub fn from_params(params: &DissolveParams) -> Self {
        Self {
            uniform: DissolveUniform {
                edge_color: params.edge_color,
                frequency: params.frequency,
                amplitude: params.amplitude,
                progress: params.progress,
                edge_width: params.edge_width,
            },
        }
    }

    /// Copy the shared parameter values into the uniform.
    pub fn apply(&mut self, params: &DissolveParams) {
        self.uniform.edge_color = params.edge_color;
        self.uniform.frequency = params.frequency;
        self.uniform.amplitude = params.amplitude;
        self.uniform.progress = params.progress;
        self.uniform.edge_width = params.edge_width;
    }
}

/// Push changed `DissolveParams` into the surface material uniform.
pub fn sync_surface_materials(
    mut materials: ResMut<Assets<DissolveMaterial>>,
    query: Query<(&DissolveParams, &MeshMaterial3d<DissolveMaterial>), Changed<DissolveParams>>,
) {
    for (params, material) in &query {
        if let Some(material) = materials.get_mut(&material.0) {
            material.extension.apply(params);
        }
    }
}

impl MaterialExtension for DissolveExtension {
    fn fragment_shader() -> ShaderRef {
        "embedded://bevy_dissolve/shaders/dissolve.wgsl".into()
    }

    // Dissolved fragments must also vanish from the depth/normal prepass,
    // or they would cast shadows and occlude through the holes.
    fn prepass_fragment_shader() -> ShaderRef {
        "embedded://bevy_dissolve/shaders/dissolve.wgsl".into()
    }

    fn deferred_fragment_shader() -> ShaderRef {
        "embedded://bevy_dissolve/shaders/dissolve.wgsl".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_overrides_every_fragment_stage() {
        // The erosion discard must run in the prepass and deferred variants
        // too, or dissolved fragments still write depth and cast shadows.
        for shader in [
            DissolveExtension::fragment_shader(),
            DissolveExtension::prepass_fragment_shader(),
            DissolveExtension::deferred_fragment_shader(),
        ] {
            assert!(matches!(shader, ShaderRef::Path(_)));
        }
    }

    #[test]
    fn apply_copies_all_params() {
        let mut extension = DissolveExtension::default();
        let params = DissolveParams {
            frequency: 0.5,
            amplitude: 8.0,
            progress: 1.25,
            edge_width: 0.4,
            edge_color: LinearRgba::rgb(4.0, 1.0, 0.25),
        };
        extension.apply(&params);
        assert_eq!(extension.uniform.frequency, 0.5);
        assert_eq!(extension.uniform.progress, 1.25);
        assert_eq!(extension.uniform.edge_color, params.edge_color);
    }
}
