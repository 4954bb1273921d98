//! Demo scene: camera, lighting, environment, and the dissolve target.

use bevy::{
    asset::RenderAssetUsages,
    prelude::*,
    render::render_resource::{Extent3d, TextureDimension, TextureFormat},
    render::view::Hdr,
};
use bevy_dissolve::{
    CubemapNaming, DissolveEffect, DissolveExtension, DissolveMaterial, EnvironmentCubemap,
    GlowSettings, Playback,
};

/// Marks the entity being dissolved; the UI and hotkeys operate on it.
#[derive(Component)]
pub struct DissolveTarget;

/// Shapes the viewer can cycle through with Tab.
#[derive(Resource, Default)]
pub struct ShapeCycle {
    pub index: usize,
}

const SHAPE_NAMES: [&str; 5] = ["Torus", "Sphere", "Cuboid", "Cylinder", "Capsule"];

fn shape_mesh(index: usize) -> Mesh {
    match index % SHAPE_NAMES.len() {
        0 => Torus::new(1.2, 2.4).mesh().major_resolution(48).build(),
        1 => Sphere::new(2.2).mesh().ico(5).unwrap_or_else(|_| Sphere::new(2.2).mesh().build()),
        2 => Cuboid::new(3.0, 3.0, 3.0).mesh().build(),
        3 => Cylinder::new(1.6, 3.2).mesh().resolution(48).build(),
        _ => Capsule3d::new(1.4, 2.4).mesh().build(),
    }
}

/// Soft radial-gradient disc used as the particle sprite, generated at
/// startup so the demo has no binary asset dependencies.
fn particle_sprite() -> Image {
    const SIZE: u32 = 64;
    let mut data = Vec::with_capacity((SIZE * SIZE * 4) as usize);
    let center = (SIZE as f32 - 1.0) * 0.5;
    for y in 0..SIZE {
        for x in 0..SIZE {
            let dx = (x as f32 - center) / center;
            let dy = (y as f32 - center) / center;
            let d = (dx * dx + dy * dy).sqrt();
            let alpha = ((1.0 - d) * 2.0).clamp(0.0, 1.0).powi(2);
            let value = (alpha * 255.0) as u8;
            data.extend_from_slice(&[255, 255, 255, value]);
        }
    }
    Image::new(
        Extent3d {
            width: SIZE,
            height: SIZE,
            depth_or_array_layers: 1,
        },
        TextureDimension::D2,
        data,
        TextureFormat::Rgba8UnormSrgb,
        RenderAssetUsages::default(),
    )
}

fn setup(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<DissolveMaterial>>,
    mut images: ResMut<Assets<Image>>,
) {
    commands.spawn((
        Camera3d::default(),
        Hdr,
        Msaa::Off,
        GlowSettings::default(),
        Transform::from_xyz(0.0, 3.0, 11.0).looking_at(Vec3::ZERO, Vec3::Y),
        EnvironmentCubemap::new(CubemapNaming::new("textures/cubemap/", ".png")),
    ));

    commands.spawn((
        DirectionalLight {
            illuminance: 8_000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(4.0, 8.0, 4.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    let surface = materials.add(DissolveMaterial {
        base: StandardMaterial {
            base_color: Color::srgb(0.72, 0.73, 0.78),
            metallic: 1.0,
            perceptual_roughness: 0.2,
            ..default()
        },
        extension: DissolveExtension::default(),
    });

    commands.spawn((
        DissolveTarget,
        Mesh3d(meshes.add(shape_mesh(0))),
        MeshMaterial3d(surface),
        DissolveEffect {
            sprite: images.add(particle_sprite()),
        },
        Transform::IDENTITY,
    ));
}

/// Tab swaps the target mesh in place; the effect regenerates its particle
/// layer while the in-flight dissolve parameters carry over.
fn cycle_shape(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut cycle: ResMut<ShapeCycle>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut targets: Query<&mut Mesh3d, With<DissolveTarget>>,
) {
    if !keyboard.just_pressed(KeyCode::Tab) {
        return;
    }
    cycle.index = (cycle.index + 1) % SHAPE_NAMES.len();
    for mut mesh in &mut targets {
        mesh.0 = meshes.add(shape_mesh(cycle.index));
    }
}

fn playback_hotkeys(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut targets: Query<&mut Playback, With<DissolveTarget>>,
) {
    for mut playback in &mut targets {
        if keyboard.just_pressed(KeyCode::Space) {
            playback.playing = !playback.playing;
        }
        if keyboard.just_pressed(KeyCode::KeyR) {
            playback.direction = match playback.direction {
                bevy_dissolve::Direction::Forward => bevy_dissolve::Direction::Backward,
                bevy_dissolve::Direction::Backward => bevy_dissolve::Direction::Forward,
            };
        }
    }
}

/// Arrow keys orbit the camera around the origin.
fn orbit_camera(
    time: Res<Time>,
    keyboard: Res<ButtonInput<KeyCode>>,
    mut cameras: Query<&mut Transform, With<Camera3d>>,
) {
    let mut yaw = 0.0;
    if keyboard.pressed(KeyCode::ArrowLeft) {
        yaw += 1.0;
    }
    if keyboard.pressed(KeyCode::ArrowRight) {
        yaw -= 1.0;
    }
    if yaw == 0.0 {
        return;
    }
    let rotation = Quat::from_rotation_y(yaw * time.delta_secs());
    for mut transform in &mut cameras {
        transform.translation = rotation * transform.translation;
        transform.look_at(Vec3::ZERO, Vec3::Y);
    }
}

pub struct ScenePlugin;

impl Plugin for ScenePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ShapeCycle>()
            .add_systems(Startup, setup)
            .add_systems(Update, (cycle_shape, playback_hotkeys, orbit_camera));
    }
}
