//! Built-in dissolve presets and RON save/load helpers.

use serde::{Deserialize, Serialize};

use crate::data::{
    DissolveParams, MotionModel, ParticleParams, Playback, TrajectoryConfig, VelocityConfig,
};

/// A complete, serializable effect configuration: boundary parameters,
/// playback state, and particle setup.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct DissolvePreset {
    pub params: DissolveParams,
    pub playback: Playback,
    pub particles: ParticleParams,
}

/// Return the built-in presets as `(name, preset)` pairs.
pub fn default_presets() -> Vec<(&'static str, DissolvePreset)> {
    vec![
        ("Classic", classic()),
        ("Ember Burst", ember_burst()),
        ("Slow Smolder", slow_smolder()),
        ("Rising Ash", rising_ash()),
    ]
}

/// The reference look: blue edge glow, Bézier-path particles.
fn classic() -> DissolvePreset {
    DissolvePreset::default()
}

/// Fast, orange, energetic scatter along wide Bézier paths.
fn ember_burst() -> DissolvePreset {
    use bevy::color::LinearRgba;
    DissolvePreset {
        params: DissolveParams {
            frequency: 0.45,
            amplitude: 12.0,
            edge_width: 1.2,
            edge_color: LinearRgba::new(1.8, 0.55, 0.1, 1.0),
            ..DissolveParams::default()
        },
        playback: Playback {
            speed: 0.2,
            ..Playback::default()
        },
        particles: ParticleParams {
            color: LinearRgba::new(1.8, 0.55, 0.1, 1.0),
            base_size: 60.0,
            motion: MotionModel::Trajectory(TrajectoryConfig {
                end_distance: 30.0,
                control_distance: 14.0,
                spin_rate: 4.0,
                ..TrajectoryConfig::default()
            }),
            ..ParticleParams::default()
        },
    }
}

/// Tight noise, narrow band, slow front.
fn slow_smolder() -> DissolvePreset {
    use bevy::color::LinearRgba;
    DissolvePreset {
        params: DissolveParams {
            frequency: 0.9,
            amplitude: 6.0,
            edge_width: 0.35,
            edge_color: LinearRgba::new(1.2, 0.25, 0.08, 1.0),
            progress: -4.0,
            ..DissolveParams::default()
        },
        playback: Playback {
            speed: 0.02,
            ..Playback::default()
        },
        particles: ParticleParams {
            color: LinearRgba::new(1.2, 0.3, 0.1, 1.0),
            base_size: 40.0,
            motion: MotionModel::Trajectory(TrajectoryConfig {
                end_distance: 6.0,
                control_distance: 3.0,
                ..TrajectoryConfig::default()
            }),
            ..ParticleParams::default()
        },
    }
}

/// Velocity-model drift: particles rise off the front and loop.
fn rising_ash() -> DissolvePreset {
    use bevy::color::LinearRgba;
    DissolvePreset {
        params: DissolveParams {
            edge_color: LinearRgba::new(0.9, 0.85, 0.7, 1.0),
            ..DissolveParams::default()
        },
        particles: ParticleParams {
            color: LinearRgba::new(0.9, 0.85, 0.7, 1.0),
            base_size: 50.0,
            motion: MotionModel::Velocity(VelocityConfig::default()),
            ..ParticleParams::default()
        },
        playback: Playback::default(),
    }
}

/// Serialize a preset to pretty RON.
pub fn to_ron(preset: &DissolvePreset) -> Result<String, ron::Error> {
    ron::ser::to_string_pretty(preset, ron::ser::PrettyConfig::default())
}

/// Parse a preset from RON text.
pub fn from_ron(text: &str) -> Result<DissolvePreset, ron::error::SpannedError> {
    ron::from_str(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_round_trip_through_ron() {
        for (name, preset) in default_presets() {
            let text = to_ron(&preset).unwrap_or_else(|e| panic!("serialize {name}: {e}"));
            let parsed = from_ron(&text).unwrap_or_else(|e| panic!("parse {name}: {e}"));
            assert_eq!(parsed, preset, "round trip changed preset {name}");
        }
    }

    #[test]
    fn preset_names_are_unique() {
        let presets = default_presets();
        for (i, (name, _)) in presets.iter().enumerate() {
            assert!(
                presets.iter().skip(i + 1).all(|(other, _)| other != name),
                "duplicate preset name {name}"
            );
        }
    }

    #[test]
    fn classic_preset_matches_component_defaults() {
        let preset = classic();
        assert_eq!(preset.params, DissolveParams::default());
        assert!(!preset.playback.playing);
    }
}
