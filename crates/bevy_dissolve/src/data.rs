//! Core data model for the dissolve effect.
//!
//! All types are serializable (serde + RON) and reflectable (Bevy Reflect).
//! `DissolveParams` is the single owned parameter set: the surface material
//! and the particle material are both synced from it every frame, so an
//! editor slider bound to it drives the whole effect.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Dissolve boundary parameters
// ---------------------------------------------------------------------------

/// Shared boundary parameters. One instance per effect entity; every
/// consumer (surface shader, particle shader, CPU evaluation) reads these
/// same values — they are never copied into a second source of truth.
#[derive(Component, Serialize, Deserialize, Clone, Debug, PartialEq, Reflect)]
#[reflect(Component, Default)]
pub struct DissolveParams {
    /// Spatial frequency of the erosion noise (object-space units).
    pub frequency: f32,
    /// Scale applied to the raw noise, widening the erosion value range.
    pub amplitude: f32,
    /// The control variable: raising it sweeps the erosion front across the
    /// mesh. Signed and unbounded.
    pub progress: f32,
    /// Width of the highlighted band between solid and dissolved. Zero or
    /// negative collapses the band — degenerate but legal.
    pub edge_width: f32,
    /// Flat override color for edge-band fragments.
    pub edge_color: LinearRgba,
}

impl Default for DissolveParams {
    fn default() -> Self {
        Self {
            frequency: 0.25,
            amplitude: 16.0,
            progress: -7.0,
            edge_width: 0.8,
            edge_color: LinearRgba::new(0.3, 0.61, 1.0, 1.0),
        }
    }
}

// ---------------------------------------------------------------------------
// Playback
// ---------------------------------------------------------------------------

/// Which way `progress` moves while playing.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Reflect)]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

impl Direction {
    pub const ALL: [Self; 2] = [Self::Forward, Self::Backward];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Forward => "Forward",
            Self::Backward => "Backward",
        }
    }

    pub fn sign(&self) -> f32 {
        match self {
            Self::Forward => 1.0,
            Self::Backward => -1.0,
        }
    }
}

/// Playback state. `progress` advances by `sign * speed * delta * 60` per
/// frame while playing; time-varying turbulence keeps animating regardless.
#[derive(Component, Serialize, Deserialize, Clone, Debug, PartialEq, Reflect)]
#[reflect(Component, Default)]
pub struct Playback {
    pub playing: bool,
    pub speed: f32,
    pub direction: Direction,
}

impl Default for Playback {
    fn default() -> Self {
        Self {
            playing: false,
            speed: 0.08,
            direction: Direction::Forward,
        }
    }
}

impl Playback {
    /// Progress increment for one frame of `delta` seconds. The `* 60`
    /// normalizes speed to per-frame units at a 60 Hz reference rate.
    pub fn progress_step(&self, delta: f32) -> f32 {
        if self.playing {
            self.direction.sign() * self.speed * delta * 60.0
        } else {
            0.0
        }
    }
}

// ---------------------------------------------------------------------------
// Particle parameters
// ---------------------------------------------------------------------------

/// Particle appearance and motion configuration.
#[derive(Component, Serialize, Deserialize, Clone, Debug, PartialEq, Reflect)]
#[reflect(Component, Default)]
pub struct ParticleParams {
    /// Additive tint applied to the sprite.
    pub color: LinearRgba,
    /// Point size in pixels at one unit of view depth (scaled by device
    /// pixel density, divided by view depth in the shader).
    pub base_size: f32,
    /// Hide/show the particle layer without tearing it down.
    pub visible: bool,
    /// Motion strategy, chosen at effect construction.
    pub motion: MotionModel,
}

impl Default for ParticleParams {
    fn default() -> Self {
        Self {
            color: LinearRgba::new(0.3, 0.61, 1.0, 1.0),
            base_size: 80.0,
            visible: true,
            motion: MotionModel::default(),
        }
    }
}

/// The two particle motion strategies. Trajectory particles ride a fixed
/// Bézier path whose progress follows the erosion front; velocity particles
/// drift on their own looping period and are gated by a widened band around
/// the front.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Reflect)]
pub enum MotionModel {
    Trajectory(TrajectoryConfig),
    Velocity(VelocityConfig),
}

impl Default for MotionModel {
    fn default() -> Self {
        Self::Trajectory(TrajectoryConfig::default())
    }
}

impl MotionModel {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Trajectory(_) => "Trajectory",
            Self::Velocity(_) => "Velocity",
        }
    }
}

/// Tunables for the Bézier-path motion model.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Reflect)]
pub struct TrajectoryConfig {
    /// Maximum distance of the randomized path end point from the vertex.
    pub end_distance: f32,
    /// Maximum distance of the first control point; the second control
    /// point extends the same offset by `control_stretch`.
    pub control_distance: f32,
    pub control_stretch: f32,
    /// Orbital wobble radius range, sampled uniformly per particle.
    pub spin_radius_min: f32,
    pub spin_radius_max: f32,
    /// Per-particle wobble rate is a random value in [0, spin_rate].
    pub spin_rate: f32,
}

impl Default for TrajectoryConfig {
    fn default() -> Self {
        Self {
            end_distance: 20.0,
            control_distance: 10.0,
            control_stretch: 1.5,
            spin_radius_min: 0.5,
            spin_radius_max: 1.0,
            spin_rate: 2.0,
        }
    }
}

/// Tunables for the looping-drift motion model.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Reflect)]
pub struct VelocityConfig {
    /// Maximum travel distance per loop.
    pub max_offset: f32,
    /// Loop speed: `life = fract(elapsed * speed / (max_offset / 2))`.
    pub speed: f32,
    /// Upward bias of the randomized velocity direction.
    pub up_bias: f32,
    /// Turbulence displacement amplitude and spatial frequency.
    pub turbulence_strength: f32,
    pub turbulence_frequency: f32,
    /// Time offset between the horizontal and vertical turbulence channels
    /// so they decorrelate.
    pub channel_offset: f32,
    /// How far ahead of the front particles appear, and how far behind they
    /// linger. The band is intentionally wider than the solid/edge band so
    /// particles fade in before the surface visibly erodes.
    pub appear_lead: f32,
    pub linger_trail: f32,
    /// Sprite alpha below this is discarded.
    pub alpha_threshold: f32,
}

impl Default for VelocityConfig {
    fn default() -> Self {
        Self {
            max_offset: 2.0,
            speed: 0.02,
            up_bias: 0.7,
            turbulence_strength: 0.6,
            turbulence_frequency: 1.2,
            channel_offset: 17.0,
            appear_lead: 2.0,
            linger_trail: 2.0,
            alpha_threshold: 0.1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_step_matches_reference_rate() {
        let playback = Playback {
            playing: true,
            speed: 0.08,
            direction: Direction::Forward,
        };
        let step = playback.progress_step(1.0 / 60.0);
        assert!((step - 0.08).abs() < 1e-6, "step = {step}");
    }

    #[test]
    fn progress_step_respects_direction_and_pause() {
        let mut playback = Playback {
            playing: true,
            speed: 0.5,
            direction: Direction::Backward,
        };
        assert!(playback.progress_step(0.1) < 0.0);
        playback.playing = false;
        assert_eq!(playback.progress_step(0.1), 0.0);
    }
}
