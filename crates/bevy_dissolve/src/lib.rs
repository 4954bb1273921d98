//! # bevy_dissolve
//!
//! Interactive dissolve effect for Bevy: a procedural noise boundary erodes
//! a mesh surface while particles stream off the dissolving front, composited
//! with a glow pass.
//!
//! The boundary is a pure function of object-space position — the surface
//! shader, the particle shader, and the CPU helpers in [`boundary`] all
//! evaluate the same simplex field, so every consumer agrees on where the
//! front is. Raising [`DissolveParams::progress`] sweeps the front across
//! the mesh; playback can also drive it automatically.
//!
//! ## Quick Start
//!
//! ```ignore
//! use bevy::prelude::*;
//! use bevy_dissolve::{DissolveEffect, DissolveMaterial, DissolvePlugin};
//!
//! fn main() {
//!     App::new()
//!         .add_plugins(DefaultPlugins)
//!         .add_plugins(DissolvePlugin)
//!         .add_systems(Startup, setup)
//!         .run();
//! }
//!
//! fn setup(
//!     mut commands: Commands,
//!     mut meshes: ResMut<Assets<Mesh>>,
//!     mut materials: ResMut<Assets<DissolveMaterial>>,
//!     asset_server: Res<AssetServer>,
//! ) {
//!     commands.spawn((
//!         Mesh3d(meshes.add(Torus::default())),
//!         MeshMaterial3d(materials.add(DissolveMaterial::default())),
//!         DissolveEffect {
//!             sprite: asset_server.load("textures/particle.png"),
//!         },
//!     ));
//! }
//! ```

pub mod boundary;
pub mod compositor;
pub mod data;
pub mod environment;
pub mod material;
pub mod motion;
pub mod noise;
pub mod particles;
pub mod presets;

pub use boundary::{classify, classify_point, erosion, Phase};
pub use compositor::{GlowPlugin, GlowSettings};
pub use data::{
    Direction, DissolveParams, MotionModel, ParticleParams, Playback, TrajectoryConfig,
    VelocityConfig,
};
pub use environment::{CubemapNaming, EnvironmentCubemap, EnvironmentFailed};
pub use material::{DissolveExtension, DissolveMaterial, DissolveMaterialPlugin};
pub use motion::{ParticleAttributeSet, ParticleSample};
pub use particles::{DissolveEffect, DissolveRng, ParticleLayer, ParticleMaterial};
pub use presets::{default_presets, DissolvePreset};

use bevy::prelude::*;

const NOISE_SHADER_SRC: &str = include_str!("shaders/noise.wgsl");

/// Strong handle keeping the shared noise shader library alive so the
/// material shaders can `#import bevy_dissolve::noise`.
#[derive(Resource)]
pub struct NoiseShaderLibrary(pub Handle<Shader>);

/// Advance `progress` for playing effects. Paused effects are not written
/// to, so change detection stays quiet while scrubbing manually.
fn advance_progress(time: Res<Time>, mut query: Query<(&mut DissolveParams, &Playback)>) {
    for (mut params, playback) in &mut query {
        let step = playback.progress_step(time.delta_secs());
        if step != 0.0 {
            params.progress += step;
        }
    }
}

/// Main dissolve plugin. Registers types, materials, the glow compositor,
/// and the systems that keep every consumer of the shared parameters in
/// sync.
pub struct DissolvePlugin;

impl Plugin for DissolvePlugin {
    fn build(&self, app: &mut App) {
        app.register_type::<DissolveParams>()
            .register_type::<Playback>()
            .register_type::<Direction>()
            .register_type::<ParticleParams>()
            .register_type::<MotionModel>()
            .register_type::<TrajectoryConfig>()
            .register_type::<VelocityConfig>()
            .init_resource::<DissolveRng>()
            .add_message::<EnvironmentFailed>()
            .add_plugins((
                DissolveMaterialPlugin,
                particles::ParticleMaterialPlugin,
                GlowPlugin,
            ))
            .add_systems(
                Update,
                (
                    advance_progress,
                    material::sync_surface_materials,
                    particles::flag_stale_particle_layers,
                    particles::rebuild_particle_layers,
                    particles::sync_particle_materials,
                )
                    .chain(),
            )
            .add_systems(
                Update,
                (
                    environment::start_cubemap_loads,
                    environment::poll_pending_cubemaps,
                )
                    .chain(),
            );

        // The noise library is imported by both material shaders; add it to
        // Assets<Shader> directly so its import path is registered.
        let noise_shader = {
            let mut shaders = app.world_mut().resource_mut::<Assets<Shader>>();
            shaders.add(Shader::from_wgsl(
                NOISE_SHADER_SRC.to_string(),
                "bevy_dissolve_noise.wgsl",
            ))
        };
        app.insert_resource(NoiseShaderLibrary(noise_shader));
    }
}
