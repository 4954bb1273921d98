//! Environment cubemap loading: six face images assembled into a cube
//! texture, used both as the scene skybox and as the reflection source for
//! the dissolving surface's metallic shading.

use bevy::{
    asset::LoadState,
    core_pipeline::Skybox,
    image::Image,
    prelude::*,
    render::render_resource::{TextureViewDescriptor, TextureViewDimension},
};
use thiserror::Error;

/// Face suffixes in wgpu cube layer order (+X, -X, +Y, -Y, +Z, -Z).
pub const FACE_SUFFIXES: [&str; 6] = ["posx", "negx", "posy", "negy", "posz", "negz"];

/// Errors raised while assembling an environment cubemap.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EnvironmentError {
    #[error("cubemap face failed to load: {path}")]
    FaceLoadFailed { path: String },
    #[error("cubemap face {path} is {width}x{height}, expected {expected}x{expected} to match the first face")]
    FaceSizeMismatch {
        path: String,
        width: u32,
        height: u32,
        expected: u32,
    },
    #[error("cubemap face {path} is {width}x{height}, faces must be square")]
    FaceNotSquare {
        path: String,
        width: u32,
        height: u32,
    },
    #[error("cubemap face {path} uses format {format}, expected {expected} to match the first face")]
    FaceFormatMismatch {
        path: String,
        format: String,
        expected: String,
    },
    #[error("cubemap face {path} has no CPU-side pixel data to stack")]
    FaceDataMissing { path: String },
}

/// Emitted when cubemap assembly fails; the effect keeps running without
/// reflections.
#[derive(Message, Debug, Clone)]
pub struct EnvironmentFailed {
    pub error: EnvironmentError,
}

/// Naming scheme for the six face images: `{prefix}{face}{postfix}` with
/// `face` in [`FACE_SUFFIXES`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CubemapNaming {
    pub prefix: String,
    pub postfix: String,
}

impl CubemapNaming {
    pub fn new(prefix: impl Into<String>, postfix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            postfix: postfix.into(),
        }
    }

    /// The six asset paths in cube layer order.
    pub fn face_paths(&self) -> [String; 6] {
        FACE_SUFFIXES.map(|face| format!("{}{}{}", self.prefix, face, self.postfix))
    }
}

/// Request component: spawn on the camera entity that should receive the
/// skybox and reflections. Replaced by `Skybox` + `EnvironmentMapLight`
/// once all six faces are resident, or removed with an [`EnvironmentFailed`]
/// message on error.
#[derive(Component, Clone, Debug)]
pub struct EnvironmentCubemap {
    pub naming: CubemapNaming,
    /// Skybox and reflection brightness in lux.
    pub brightness: f32,
}

impl EnvironmentCubemap {
    pub fn new(naming: CubemapNaming) -> Self {
        Self {
            naming,
            brightness: 1000.0,
        }
    }
}

/// Internal bookkeeping while faces stream in.
#[derive(Component)]
pub struct PendingCubemap {
    paths: [String; 6],
    faces: [Handle<Image>; 6],
}

/// Kick off the six face loads for fresh [`EnvironmentCubemap`] requests.
pub fn start_cubemap_loads(
    mut commands: Commands,
    asset_server: Res<AssetServer>,
    query: Query<(Entity, &EnvironmentCubemap), Without<PendingCubemap>>,
) {
    for (entity, request) in &query {
        let paths = request.naming.face_paths();
        let faces = paths.clone().map(|path| asset_server.load(path));
        commands
            .entity(entity)
            .insert(PendingCubemap { paths, faces });
    }
}

/// Poll pending cubemaps; once all six faces are resident, stack them into
/// a cube texture and attach the skybox and environment light.
pub fn poll_pending_cubemaps(
    mut commands: Commands,
    asset_server: Res<AssetServer>,
    mut images: ResMut<Assets<Image>>,
    mut failures: MessageWriter<EnvironmentFailed>,
    query: Query<(Entity, &EnvironmentCubemap, &PendingCubemap)>,
) {
    for (entity, request, pending) in &query {
        // Fail fast on the first broken face.
        if let Some(index) = pending.faces.iter().position(|handle| {
            matches!(asset_server.load_state(handle), LoadState::Failed(_))
        }) {
            let error = EnvironmentError::FaceLoadFailed {
                path: pending.paths[index].clone(),
            };
            error!("environment cubemap: {error}");
            failures.write(EnvironmentFailed { error });
            commands
                .entity(entity)
                .remove::<(EnvironmentCubemap, PendingCubemap)>();
            continue;
        }

        let faces: Vec<&Image> = pending
            .faces
            .iter()
            .filter_map(|handle| images.get(handle))
            .collect();
        if faces.len() < pending.faces.len() {
            continue; // Still streaming in.
        }

        let cubemap = match assemble_cubemap(&faces, &pending.paths) {
            Ok(image) => image,
            Err(error) => {
                error!("environment cubemap: {error}");
                failures.write(EnvironmentFailed { error });
                commands
                    .entity(entity)
                    .remove::<(EnvironmentCubemap, PendingCubemap)>();
                continue;
            }
        };
        let handle = images.add(cubemap);

        commands
            .entity(entity)
            .remove::<PendingCubemap>()
            .insert((
                Skybox {
                    image: handle.clone(),
                    brightness: request.brightness,
                    rotation: Quat::IDENTITY,
                },
                EnvironmentMapLight {
                    diffuse_map: handle.clone(),
                    specular_map: handle,
                    intensity: request.brightness,
                    rotation: Quat::IDENTITY,
                    affects_lightmapped_mesh_diffuse: true,
                },
            ));
    }
}

/// Stack the six faces into one image and reinterpret it as a cube texture.
fn assemble_cubemap(faces: &[&Image], paths: &[String; 6]) -> Result<Image, EnvironmentError> {
    let first = faces[0];
    let side = first.width();
    if first.height() != side {
        return Err(EnvironmentError::FaceNotSquare {
            path: paths[0].clone(),
            width: first.width(),
            height: first.height(),
        });
    }

    let mut stacked = first.clone();
    let mut data = stacked
        .data
        .take()
        .ok_or_else(|| EnvironmentError::FaceDataMissing {
            path: paths[0].clone(),
        })?;

    for (path, face) in paths.iter().zip(faces).skip(1) {
        if face.width() != side || face.height() != side {
            return Err(EnvironmentError::FaceSizeMismatch {
                path: path.clone(),
                width: face.width(),
                height: face.height(),
                expected: side,
            });
        }
        if face.texture_descriptor.format != stacked.texture_descriptor.format {
            return Err(EnvironmentError::FaceFormatMismatch {
                path: path.clone(),
                format: format!("{:?}", face.texture_descriptor.format),
                expected: format!("{:?}", stacked.texture_descriptor.format),
            });
        }
        let bytes = face
            .data
            .as_deref()
            .ok_or_else(|| EnvironmentError::FaceDataMissing { path: path.clone() })?;
        data.extend_from_slice(bytes);
    }

    stacked.data = Some(data);
    stacked.texture_descriptor.size.height = side * 6;
    stacked.reinterpret_stacked_2d_as_array(6);
    stacked.texture_view_descriptor = Some(TextureViewDescriptor {
        dimension: Some(TextureViewDimension::Cube),
        ..Default::default()
    });
    Ok(stacked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::asset::RenderAssetUsages;
    use bevy::render::render_resource::{Extent3d, TextureDimension, TextureFormat};

    fn test_face() -> Image {
        Image::new_fill(
            Extent3d {
                width: 2,
                height: 2,
                depth_or_array_layers: 1,
            },
            TextureDimension::D2,
            &[0, 0, 0, 255],
            TextureFormat::Rgba8UnormSrgb,
            RenderAssetUsages::all(),
        )
    }

    #[test]
    fn assemble_stacks_six_faces() {
        let face = test_face();
        let faces = [&face; 6];
        let paths = CubemapNaming::new("sky/", ".png").face_paths();
        let cubemap = assemble_cubemap(&faces, &paths).unwrap();
        assert_eq!(cubemap.texture_descriptor.size.depth_or_array_layers, 6);
        assert_eq!(
            cubemap.data.as_ref().map(|d| d.len()),
            Some(6 * 2 * 2 * 4)
        );
    }

    #[test]
    fn face_without_cpu_data_is_an_error() {
        let good = test_face();
        let mut gpu_only = test_face();
        gpu_only.data = None;
        let faces = [&good, &gpu_only, &good, &good, &good, &good];
        let paths = CubemapNaming::new("sky/", ".png").face_paths();
        let err = assemble_cubemap(&faces, &paths).unwrap_err();
        assert_eq!(
            err,
            EnvironmentError::FaceDataMissing {
                path: "sky/negx.png".into()
            }
        );
    }

    #[test]
    fn face_paths_follow_naming_scheme() {
        let naming = CubemapNaming::new("textures/sky/", ".png");
        let paths = naming.face_paths();
        assert_eq!(paths[0], "textures/sky/posx.png");
        assert_eq!(paths[5], "textures/sky/negz.png");
    }

    #[test]
    fn face_order_matches_cube_layer_order() {
        assert_eq!(
            FACE_SUFFIXES,
            ["posx", "negx", "posy", "negy", "posz", "negz"]
        );
    }

    #[test]
    fn errors_render_readable_messages() {
        let err = EnvironmentError::FaceLoadFailed {
            path: "sky/posx.png".into(),
        };
        assert!(err.to_string().contains("sky/posx.png"));

        let err = EnvironmentError::FaceSizeMismatch {
            path: "sky/negy.png".into(),
            width: 256,
            height: 512,
            expected: 512,
        };
        assert!(err.to_string().contains("256x512"));
    }
}
