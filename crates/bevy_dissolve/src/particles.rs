//! Particle layer: one camera-facing quad per source mesh vertex, evaluated
//! entirely in the vertex shader from seeded per-vertex attributes.
//!
//! The CPU seeds attributes once per mesh attach (`motion::seed`) and bakes
//! them into a quad mesh; the shader runs the same motion math as
//! `motion::evaluate` every frame. Swapping the effect's mesh regenerates
//! the whole layer in one synchronous pass — attribute buffers are replaced,
//! never patched.

use bevy::{
    asset::{embedded_asset, RenderAssetUsages},
    camera::visibility::NoFrustumCulling,
    light::NotShadowCaster,
    mesh::{Indices, MeshVertexAttribute, MeshVertexBufferLayoutRef, PrimitiveTopology},
    pbr::{Material, MaterialPipeline, MaterialPipelineKey, MaterialPlugin},
    prelude::*,
    render::render_resource::{
        AsBindGroup, RenderPipelineDescriptor, ShaderType, SpecializedMeshPipelineError,
        VertexFormat,
    },
    shader::ShaderRef,
    window::PrimaryWindow,
};

use crate::data::{DissolveParams, MotionModel, ParticleParams};
use crate::motion::{self, ParticleAttributeSet};

// ---------------------------------------------------------------------------
// Custom vertex attributes
// ---------------------------------------------------------------------------

/// Per-particle seeds: billboard angle, spin rate, spin radius (trajectory).
pub const ATTRIBUTE_PARTICLE_SEED: MeshVertexAttribute =
    MeshVertexAttribute::new("Particle_Seed", 493_817_201, VertexFormat::Float32x4);
/// First Bézier control point.
pub const ATTRIBUTE_CONTROL0: MeshVertexAttribute =
    MeshVertexAttribute::new("Particle_Control0", 493_817_202, VertexFormat::Float32x3);
/// Second Bézier control point.
pub const ATTRIBUTE_CONTROL1: MeshVertexAttribute =
    MeshVertexAttribute::new("Particle_Control1", 493_817_203, VertexFormat::Float32x3);
/// Path end point.
pub const ATTRIBUTE_END_POS: MeshVertexAttribute =
    MeshVertexAttribute::new("Particle_EndPos", 493_817_204, VertexFormat::Float32x3);
/// Drift direction (xyz) and per-particle max offset (w).
pub const ATTRIBUTE_VELOCITY: MeshVertexAttribute =
    MeshVertexAttribute::new("Particle_Velocity", 493_817_205, VertexFormat::Float32x4);

// ---------------------------------------------------------------------------
// Material
// ---------------------------------------------------------------------------

/// Uniform block for the particle shader. Boundary fields mirror
/// `DissolveParams`; the rest comes from `ParticleParams` and the clock.
#[derive(Clone, Copy, ShaderType, Debug, Default)]
pub struct ParticleUniform {
    pub color: LinearRgba,
    pub frequency: f32,
    pub amplitude: f32,
    pub progress: f32,
    pub edge_width: f32,
    pub base_size: f32,
    pub pixel_density: f32,
    pub time: f32,
    pub loop_speed: f32,
    pub turbulence_strength: f32,
    pub turbulence_frequency: f32,
    pub channel_offset: f32,
    pub appear_lead: f32,
    pub linger_trail: f32,
    pub alpha_threshold: f32,
}

/// Unlit, additively blended billboard material for the particle layer.
#[derive(Asset, AsBindGroup, TypePath, Debug, Clone)]
#[bind_group_data(ParticleMaterialKey)]
pub struct ParticleMaterial {
    #[uniform(0)]
    pub uniform: ParticleUniform,
    /// RGBA sprite; alpha is the cutout mask.
    #[texture(1)]
    #[sampler(2)]
    pub sprite: Option<Handle<Image>>,
    /// Which motion strategy the shader should run (pipeline key).
    pub velocity_model: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParticleMaterialKey {
    pub velocity_model: bool,
}

impl From<&ParticleMaterial> for ParticleMaterialKey {
    fn from(material: &ParticleMaterial) -> Self {
        Self {
            velocity_model: material.velocity_model,
        }
    }
}

impl Material for ParticleMaterial {
    fn vertex_shader() -> ShaderRef {
        "embedded://bevy_dissolve/shaders/particles.wgsl".into()
    }

    fn fragment_shader() -> ShaderRef {
        "embedded://bevy_dissolve/shaders/particles.wgsl".into()
    }

    fn alpha_mode(&self) -> AlphaMode {
        // Additive blending: sorts into the transparent pass, no depth write.
        AlphaMode::Add
    }

    fn specialize(
        _pipeline: &MaterialPipeline,
        descriptor: &mut RenderPipelineDescriptor,
        layout: &MeshVertexBufferLayoutRef,
        key: MaterialPipelineKey<Self>,
    ) -> Result<(), SpecializedMeshPipelineError> {
        let attributes = if key.bind_group_data.velocity_model {
            vec![
                Mesh::ATTRIBUTE_POSITION.at_shader_location(0),
                Mesh::ATTRIBUTE_UV_0.at_shader_location(1),
                ATTRIBUTE_PARTICLE_SEED.at_shader_location(2),
                ATTRIBUTE_VELOCITY.at_shader_location(3),
            ]
        } else {
            vec![
                Mesh::ATTRIBUTE_POSITION.at_shader_location(0),
                Mesh::ATTRIBUTE_UV_0.at_shader_location(1),
                ATTRIBUTE_PARTICLE_SEED.at_shader_location(2),
                ATTRIBUTE_CONTROL0.at_shader_location(3),
                ATTRIBUTE_CONTROL1.at_shader_location(4),
                ATTRIBUTE_END_POS.at_shader_location(5),
            ]
        };
        let vertex_layout = layout.0.get_layout(&attributes)?;
        descriptor.vertex.buffers = vec![vertex_layout];

        if key.bind_group_data.velocity_model {
            descriptor.vertex.shader_defs.push("VELOCITY_MODEL".into());
            if let Some(fragment) = descriptor.fragment.as_mut() {
                fragment.shader_defs.push("VELOCITY_MODEL".into());
            }
        }
        descriptor.primitive.cull_mode = None;
        Ok(())
    }
}

/// Plugin registering the particle material and its embedded shader.
pub struct ParticleMaterialPlugin;

impl Plugin for ParticleMaterialPlugin {
    fn build(&self, app: &mut App) {
        embedded_asset!(app, "shaders/particles.wgsl");
        app.add_plugins(MaterialPlugin::<ParticleMaterial>::default());
    }
}

// ---------------------------------------------------------------------------
// Effect components
// ---------------------------------------------------------------------------

/// Marks an entity (with a `Mesh3d` and a dissolve surface material) as a
/// dissolve effect. The plugin attaches and maintains the particle layer.
#[derive(Component, Clone, Default)]
#[require(DissolveParams, crate::data::Playback, ParticleParams)]
pub struct DissolveEffect {
    /// Particle sprite; a plain white disc is a reasonable fallback.
    pub sprite: Handle<Image>,
}

/// Bookkeeping for the spawned particle layer. Inserted and owned by the
/// plugin; `attributes` is the CPU copy of the seeded data, always sized
/// exactly to the active mesh's vertex count.
#[derive(Component)]
pub struct ParticleLayer {
    pub child: Entity,
    pub material: Handle<ParticleMaterial>,
    pub attributes: ParticleAttributeSet,
    /// Label of the motion model the layer was seeded with; a change
    /// triggers a reseed.
    pub motion_label: &'static str,
}

/// Marker requesting a (re)build of the particle layer. Inserted on mesh
/// swap or motion-model change, consumed the same frame the mesh asset is
/// available.
#[derive(Component)]
pub struct NeedsReseed;

/// Seedable randomness source for particle seeding. Reseeded per call by
/// default; tests and reproducibility-minded callers can overwrite it with
/// `fastrand::Rng::with_seed`.
#[derive(Resource)]
pub struct DissolveRng(pub fastrand::Rng);

impl Default for DissolveRng {
    fn default() -> Self {
        Self(fastrand::Rng::new())
    }
}

// ---------------------------------------------------------------------------
// Mesh building
// ---------------------------------------------------------------------------

/// Bake an attribute set into a renderable quad mesh: four corners per
/// particle, expanded to a camera-facing sprite in the vertex shader.
pub fn build_particle_mesh(attrs: &ParticleAttributeSet) -> Mesh {
    let count = attrs.len();
    let mut positions = Vec::with_capacity(count * 4);
    let mut corners = Vec::with_capacity(count * 4);
    let mut seeds = Vec::with_capacity(count * 4);
    let mut indices = Vec::with_capacity(count * 6);

    const CORNERS: [[f32; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

    let mut mesh = Mesh::new(
        PrimitiveTopology::TriangleList,
        RenderAssetUsages::default(),
    );

    match attrs {
        ParticleAttributeSet::Trajectory(a) => {
            let mut control0 = Vec::with_capacity(count * 4);
            let mut control1 = Vec::with_capacity(count * 4);
            let mut end_pos = Vec::with_capacity(count * 4);

            for i in 0..count {
                let base = (i * 4) as u32;
                for corner in CORNERS {
                    positions.push(a.base[i].to_array());
                    corners.push(corner);
                    seeds.push([a.angle[i], a.spin_rate[i], a.spin_radius[i], 0.0]);
                    control0.push(a.control0[i].to_array());
                    control1.push(a.control1[i].to_array());
                    end_pos.push(a.end_pos[i].to_array());
                }
                indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
            }

            mesh.insert_attribute(ATTRIBUTE_CONTROL0, control0);
            mesh.insert_attribute(ATTRIBUTE_CONTROL1, control1);
            mesh.insert_attribute(ATTRIBUTE_END_POS, end_pos);
        }
        ParticleAttributeSet::Velocity(a) => {
            let mut velocities = Vec::with_capacity(count * 4);

            for i in 0..count {
                let base = (i * 4) as u32;
                for corner in CORNERS {
                    positions.push(a.base[i].to_array());
                    corners.push(corner);
                    seeds.push([a.angle[i], 0.0, 0.0, 0.0]);
                    let v = a.velocity[i];
                    velocities.push([v.x, v.y, v.z, a.max_offset[i]]);
                }
                indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
            }

            mesh.insert_attribute(ATTRIBUTE_VELOCITY, velocities);
        }
    }

    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
    mesh.insert_attribute(Mesh::ATTRIBUTE_UV_0, corners);
    mesh.insert_attribute(ATTRIBUTE_PARTICLE_SEED, seeds);
    mesh.insert_indices(Indices::U32(indices));
    mesh
}

/// Read the position attribute out of a source mesh.
pub fn mesh_positions(mesh: &Mesh) -> Vec<Vec3> {
    mesh.attribute(Mesh::ATTRIBUTE_POSITION)
        .and_then(|values| values.as_float3())
        .map(|values| values.iter().map(|p| Vec3::from_array(*p)).collect())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Systems
// ---------------------------------------------------------------------------

/// Flag effects whose source mesh or motion model changed. A fresh effect,
/// a hot-swapped `Mesh3d`, and a motion-variant switch all route through the
/// same reseed path.
pub fn flag_stale_particle_layers(
    mut commands: Commands,
    changed_meshes: Query<
        Entity,
        (
            With<DissolveEffect>,
            Or<(Changed<Mesh3d>, Added<DissolveEffect>)>,
        ),
    >,
    changed_motion: Query<(Entity, &ParticleParams, &ParticleLayer), Changed<ParticleParams>>,
) {
    for entity in &changed_meshes {
        commands.entity(entity).insert(NeedsReseed);
    }
    for (entity, params, layer) in &changed_motion {
        if params.motion.label() != layer.motion_label {
            commands.entity(entity).insert(NeedsReseed);
        }
    }
}

/// Rebuild flagged particle layers: seed fresh attributes from the current
/// mesh, bake the quad mesh, and swap the child's handles — one synchronous
/// sequence, so no frame ever renders a half-updated layer. Dissolve
/// parameters are not touched: an in-flight transition continues across a
/// mesh swap.
pub fn rebuild_particle_layers(
    mut commands: Commands,
    mut rng: ResMut<DissolveRng>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<ParticleMaterial>>,
    mut query: Query<
        (
            Entity,
            &Mesh3d,
            &DissolveEffect,
            &ParticleParams,
            Option<&mut ParticleLayer>,
        ),
        With<NeedsReseed>,
    >,
) {
    for (entity, mesh3d, effect, params, layer) in &mut query {
        // Source mesh asset not resident yet — retry next frame.
        let Some(source) = meshes.get(&mesh3d.0) else {
            continue;
        };
        let positions = mesh_positions(source);

        let attributes = motion::seed(&mut rng.0, &positions, &params.motion);
        let particle_mesh = meshes.add(build_particle_mesh(&attributes));

        match layer {
            Some(mut layer) => {
                // Keep the existing material (its uniforms carry the
                // in-flight parameter state); replace geometry wholesale.
                if let Some(material) = materials.get_mut(&layer.material) {
                    material.velocity_model =
                        matches!(params.motion, MotionModel::Velocity(_));
                }
                commands.entity(layer.child).insert(Mesh3d(particle_mesh));
                layer.attributes = attributes;
                layer.motion_label = params.motion.label();
            }
            None => {
                let material = materials.add(ParticleMaterial {
                    uniform: ParticleUniform::default(),
                    sprite: Some(effect.sprite.clone()),
                    velocity_model: matches!(params.motion, MotionModel::Velocity(_)),
                });
                let child = commands
                    .spawn((
                        Mesh3d(particle_mesh),
                        MeshMaterial3d(material.clone()),
                        Transform::IDENTITY,
                        NotShadowCaster,
                        // Quads are displaced in the vertex shader; the
                        // baked AABB says nothing about where they end up.
                        NoFrustumCulling,
                    ))
                    .id();
                commands.entity(entity).add_child(child);
                commands.entity(entity).insert(ParticleLayer {
                    child,
                    material,
                    attributes,
                    motion_label: params.motion.label(),
                });
            }
        }

        commands.entity(entity).remove::<NeedsReseed>();
    }
}

/// Fan the shared parameters out to the particle material every frame.
/// Time advances regardless of play state so turbulence keeps breathing
/// while paused.
pub fn sync_particle_materials(
    time: Res<Time>,
    windows: Query<&Window, With<PrimaryWindow>>,
    mut materials: ResMut<Assets<ParticleMaterial>>,
    query: Query<(&DissolveParams, &ParticleParams, &ParticleLayer)>,
    mut visibilities: Query<&mut Visibility>,
) {
    let pixel_density = windows
        .single()
        .map(|window| window.scale_factor())
        .unwrap_or(1.0);

    for (dissolve, particles, layer) in &query {
        if let Some(material) = materials.get_mut(&layer.material) {
            let u = &mut material.uniform;
            u.color = particles.color;
            u.frequency = dissolve.frequency;
            u.amplitude = dissolve.amplitude;
            u.progress = dissolve.progress;
            u.edge_width = dissolve.edge_width;
            u.base_size = particles.base_size;
            u.pixel_density = pixel_density;
            u.time = time.elapsed_secs();

            if let MotionModel::Velocity(cfg) = &particles.motion {
                u.loop_speed = cfg.speed;
                u.turbulence_strength = cfg.turbulence_strength;
                u.turbulence_frequency = cfg.turbulence_frequency;
                u.channel_offset = cfg.channel_offset;
                u.appear_lead = cfg.appear_lead;
                u.linger_trail = cfg.linger_trail;
                u.alpha_threshold = cfg.alpha_threshold;
            }
        }

        if let Ok(mut visibility) = visibilities.get_mut(layer.child) {
            *visibility = if particles.visible {
                Visibility::Inherited
            } else {
                Visibility::Hidden
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{TrajectoryConfig, VelocityConfig};

    fn positions() -> Vec<Vec3> {
        vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ]
    }

    #[test]
    fn quad_mesh_has_four_corners_per_particle() {
        let mut rng = fastrand::Rng::with_seed(3);
        let attrs = motion::seed(
            &mut rng,
            &positions(),
            &MotionModel::Trajectory(TrajectoryConfig::default()),
        );
        let mesh = build_particle_mesh(&attrs);
        assert_eq!(mesh.count_vertices(), 12);
        assert_eq!(
            mesh.indices().map(|i| i.len()),
            Some(18),
            "two triangles per particle"
        );
        assert!(mesh.attribute(ATTRIBUTE_CONTROL0).is_some());
        assert!(mesh.attribute(ATTRIBUTE_VELOCITY).is_none());
    }

    #[test]
    fn velocity_mesh_carries_velocity_attribute() {
        let mut rng = fastrand::Rng::with_seed(3);
        let attrs = motion::seed(
            &mut rng,
            &positions(),
            &MotionModel::Velocity(VelocityConfig::default()),
        );
        let mesh = build_particle_mesh(&attrs);
        assert!(mesh.attribute(ATTRIBUTE_VELOCITY).is_some());
        assert!(mesh.attribute(ATTRIBUTE_CONTROL0).is_none());
    }

    #[test]
    fn empty_attribute_set_builds_empty_mesh() {
        let mut rng = fastrand::Rng::with_seed(3);
        let attrs = motion::seed(&mut rng, &[], &MotionModel::default());
        let mesh = build_particle_mesh(&attrs);
        assert_eq!(mesh.count_vertices(), 0);
    }

    #[test]
    fn round_trip_through_mesh_positions() {
        let source = positions();
        let mut mesh = Mesh::new(
            PrimitiveTopology::TriangleList,
            RenderAssetUsages::default(),
        );
        mesh.insert_attribute(
            Mesh::ATTRIBUTE_POSITION,
            source.iter().map(|p| p.to_array()).collect::<Vec<_>>(),
        );
        assert_eq!(mesh_positions(&mesh), source);
    }
}
