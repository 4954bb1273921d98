//! Particle emission and motion: seeding per-vertex attributes and the
//! CPU-side evaluation of both motion strategies.
//!
//! Seeding takes a `fastrand::Rng` collaborator so callers control
//! determinism — production reseeds per mesh attach, tests pass a fixed
//! seed. `evaluate` is the reference implementation of the math the
//! particle vertex shader runs; the two are kept line-for-line parallel.

use bevy::math::Vec3;
use std::f32::consts::{PI, TAU};

use crate::boundary::{classify, erosion, path_progress, Phase};
use crate::data::{MotionModel, TrajectoryConfig, VelocityConfig};
use crate::noise::simplex4;

/// Per-particle output of one evaluation step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParticleSample {
    /// Object-space position.
    pub position: Vec3,
    /// Whether the particle is inside its visibility band this frame.
    pub visible: bool,
}

/// Per-particle attribute arrays, one entry per source mesh vertex.
/// Re-seeding replaces the whole set — buffers are never patched in place.
#[derive(Clone, Debug)]
pub enum ParticleAttributeSet {
    Trajectory(TrajectoryAttributes),
    Velocity(VelocityAttributes),
}

/// Attributes for the Bézier-path strategy.
#[derive(Clone, Debug, Default)]
pub struct TrajectoryAttributes {
    pub base: Vec<Vec3>,
    pub control0: Vec<Vec3>,
    pub control1: Vec<Vec3>,
    pub end_pos: Vec<Vec3>,
    /// Wobble rate, radians/second scale of the orbital term.
    pub spin_rate: Vec<f32>,
    pub spin_radius: Vec<f32>,
    /// Billboard rotation, radians.
    pub angle: Vec<f32>,
}

/// Attributes for the looping-drift strategy.
#[derive(Clone, Debug, Default)]
pub struct VelocityAttributes {
    pub base: Vec<Vec3>,
    pub velocity: Vec<Vec3>,
    /// Per-particle travel distance; each particle loops on its own period.
    pub max_offset: Vec<f32>,
    pub angle: Vec<f32>,
}

impl ParticleAttributeSet {
    pub fn len(&self) -> usize {
        match self {
            Self::Trajectory(a) => a.base.len(),
            Self::Velocity(a) => a.base.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evaluate every particle at `elapsed` seconds against the current
    /// boundary parameters (frequency, amplitude, progress, edge width).
    pub fn evaluate(
        &self,
        elapsed: f32,
        frequency: f32,
        amplitude: f32,
        progress: f32,
        edge_width: f32,
        motion: &MotionModel,
    ) -> Vec<ParticleSample> {
        match (self, motion) {
            (Self::Trajectory(attrs), MotionModel::Trajectory(cfg)) => {
                attrs.evaluate(elapsed, frequency, amplitude, progress, edge_width, cfg)
            }
            (Self::Velocity(attrs), MotionModel::Velocity(cfg)) => {
                attrs.evaluate(elapsed, frequency, amplitude, progress, edge_width, cfg)
            }
            // Attribute set and config variants are paired by `seed`; a
            // mismatch means the caller swapped the motion model without
            // reseeding. Report everything at rest.
            (Self::Trajectory(attrs), _) => attrs
                .base
                .iter()
                .map(|&p| ParticleSample {
                    position: p,
                    visible: false,
                })
                .collect(),
            (Self::Velocity(attrs), _) => attrs
                .base
                .iter()
                .map(|&p| ParticleSample {
                    position: p,
                    visible: false,
                })
                .collect(),
        }
    }
}

/// Generate a fresh attribute set for the given vertex positions. Zero
/// vertices yield an empty (but correctly-typed) set.
pub fn seed(
    rng: &mut fastrand::Rng,
    positions: &[Vec3],
    motion: &MotionModel,
) -> ParticleAttributeSet {
    match motion {
        MotionModel::Trajectory(cfg) => {
            ParticleAttributeSet::Trajectory(seed_trajectory(rng, positions, cfg))
        }
        MotionModel::Velocity(cfg) => {
            ParticleAttributeSet::Velocity(seed_velocity(rng, positions, cfg))
        }
    }
}

fn seed_trajectory(
    rng: &mut fastrand::Rng,
    positions: &[Vec3],
    cfg: &TrajectoryConfig,
) -> TrajectoryAttributes {
    let count = positions.len();
    let mut attrs = TrajectoryAttributes {
        base: Vec::with_capacity(count),
        control0: Vec::with_capacity(count),
        control1: Vec::with_capacity(count),
        end_pos: Vec::with_capacity(count),
        spin_rate: Vec::with_capacity(count),
        spin_radius: Vec::with_capacity(count),
        angle: Vec::with_capacity(count),
    };

    for &p in positions {
        let end_dir = random_unit_sphere(rng) * (rng.f32() * cfg.end_distance);
        let control_dir = random_unit_sphere(rng) * (rng.f32() * cfg.control_distance);

        attrs.base.push(p);
        attrs.control0.push(p + control_dir);
        attrs.control1.push(p + control_dir * cfg.control_stretch);
        attrs.end_pos.push(p + end_dir);
        attrs.spin_rate.push(rng.f32() * cfg.spin_rate);
        attrs
            .spin_radius
            .push(cfg.spin_radius_min + rng.f32() * (cfg.spin_radius_max - cfg.spin_radius_min));
        attrs.angle.push(rng.f32() * TAU);
    }

    attrs
}

fn seed_velocity(
    rng: &mut fastrand::Rng,
    positions: &[Vec3],
    cfg: &VelocityConfig,
) -> VelocityAttributes {
    let count = positions.len();
    let mut attrs = VelocityAttributes {
        base: Vec::with_capacity(count),
        velocity: Vec::with_capacity(count),
        max_offset: Vec::with_capacity(count),
        angle: Vec::with_capacity(count),
    };

    for &p in positions {
        // Mostly-upward drift direction.
        let dir = Vec3::new(
            (rng.f32() - 0.5) * (1.0 - cfg.up_bias),
            cfg.up_bias + rng.f32() * (1.0 - cfg.up_bias),
            (rng.f32() - 0.5) * (1.0 - cfg.up_bias),
        )
        .normalize_or_zero();

        attrs.base.push(p);
        attrs.velocity.push(dir);
        // Each particle gets its own travel distance, hence its own period.
        attrs
            .max_offset
            .push(cfg.max_offset * (0.5 + 0.5 * rng.f32()));
        attrs.angle.push(rng.f32() * TAU);
    }

    attrs
}

impl TrajectoryAttributes {
    /// Path progress is a function of the erosion front, not of time; the
    /// orbital wobble is the only time-varying term and it vanishes at both
    /// ends of the transition.
    pub fn evaluate(
        &self,
        elapsed: f32,
        frequency: f32,
        amplitude: f32,
        progress: f32,
        edge_width: f32,
        _cfg: &TrajectoryConfig,
    ) -> Vec<ParticleSample> {
        let mut out = Vec::with_capacity(self.base.len());

        for i in 0..self.base.len() {
            let base = self.base[i];
            let e = erosion(base, frequency, amplitude);
            let t = path_progress(e, progress, edge_width);

            let mut pos = bezier4(
                base,
                self.control0[i],
                self.control1[i],
                self.end_pos[i],
                t,
            );

            let spin_factor = (t * PI).sin();
            let phase = elapsed * self.spin_rate[i];
            pos += Vec3::new(phase.sin(), phase.cos(), phase.sin())
                * self.spin_radius[i]
                * spin_factor;

            let visible = classify(e, progress, edge_width) == Phase::Edge;
            out.push(ParticleSample {
                position: pos,
                visible,
            });
        }

        out
    }
}

impl VelocityAttributes {
    /// Each particle drifts along its velocity, looping on its own period,
    /// plus two decorrelated channels of time-shifted 4D turbulence.
    /// Visibility uses the widened band so particles appear slightly before
    /// the surface erodes and linger slightly after.
    pub fn evaluate(
        &self,
        elapsed: f32,
        frequency: f32,
        amplitude: f32,
        progress: f32,
        edge_width: f32,
        cfg: &VelocityConfig,
    ) -> Vec<ParticleSample> {
        let mut out = Vec::with_capacity(self.base.len());

        for i in 0..self.base.len() {
            let base = self.base[i];
            let e = erosion(base, frequency, amplitude);
            let visible = e >= progress - cfg.appear_lead
                && e <= progress + edge_width + cfg.linger_trail;

            // Particles outside the band hold their base position; drift
            // and turbulence only apply while the front is nearby.
            let mut position = base;
            if visible {
                let half = self.max_offset[i] * 0.5;
                // Zero travel distance pins the particle at its path start
                // rather than dividing by zero.
                let life = if half > 0.0 {
                    fract(elapsed * cfg.speed / half)
                } else {
                    0.0
                };
                position += self.velocity[i] * life * half;

                let sample_at = base * cfg.turbulence_frequency;
                let horizontal = simplex4(sample_at.extend(elapsed));
                let vertical = simplex4(sample_at.extend(elapsed + cfg.channel_offset));
                position +=
                    Vec3::new(horizontal, vertical, horizontal) * cfg.turbulence_strength;
            }

            out.push(ParticleSample { position, visible });
        }

        out
    }
}

/// Cubic Bézier via repeated interpolation.
#[inline]
pub fn bezier4(a: Vec3, b: Vec3, c: Vec3, d: Vec3, t: f32) -> Vec3 {
    let ab = a.lerp(b, t);
    let bc = b.lerp(c, t);
    let cd = c.lerp(d, t);
    ab.lerp(bc, t).lerp(bc.lerp(cd, t), t)
}

/// GLSL-style fract: always in [0, 1).
#[inline]
fn fract(x: f32) -> f32 {
    x - x.floor()
}

fn random_unit_sphere(rng: &mut fastrand::Rng) -> Vec3 {
    loop {
        let v = Vec3::new(
            rng.f32() * 2.0 - 1.0,
            rng.f32() * 2.0 - 1.0,
            rng.f32() * 2.0 - 1.0,
        );
        let len_sq = v.length_squared();
        if len_sq > 0.001 && len_sq <= 1.0 {
            return v / len_sq.sqrt();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{MotionModel, TrajectoryConfig, VelocityConfig};

    fn cube_positions() -> Vec<Vec3> {
        vec![
            Vec3::new(-0.5, -0.5, -0.5),
            Vec3::new(0.5, -0.5, -0.5),
            Vec3::new(0.5, 0.5, -0.5),
            Vec3::new(-0.5, 0.5, -0.5),
            Vec3::new(-0.5, -0.5, 0.5),
            Vec3::new(0.5, -0.5, 0.5),
            Vec3::new(0.5, 0.5, 0.5),
            Vec3::new(-0.5, 0.5, 0.5),
        ]
    }

    #[test]
    fn seed_sizes_match_vertex_count() {
        let mut rng = fastrand::Rng::with_seed(7);
        let positions = cube_positions();

        let set = seed(&mut rng, &positions, &MotionModel::default());
        assert_eq!(set.len(), positions.len());

        let set = seed(
            &mut rng,
            &positions,
            &MotionModel::Velocity(VelocityConfig::default()),
        );
        assert_eq!(set.len(), positions.len());
    }

    #[test]
    fn zero_vertices_zero_particles() {
        let mut rng = fastrand::Rng::with_seed(7);
        let set = seed(&mut rng, &[], &MotionModel::default());
        assert!(set.is_empty());
        let samples = set.evaluate(0.0, 0.25, 16.0, 0.0, 0.8, &MotionModel::default());
        assert!(samples.is_empty());
    }

    #[test]
    fn reseeding_replaces_everything() {
        let mut rng = fastrand::Rng::with_seed(7);
        let big = cube_positions();
        let small = vec![Vec3::ZERO, Vec3::ONE];

        let set = seed(&mut rng, &big, &MotionModel::default());
        assert_eq!(set.len(), 8);
        let set = seed(&mut rng, &small, &MotionModel::default());
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn solid_phase_round_trip_keeps_base_positions() {
        let mut rng = fastrand::Rng::with_seed(42);
        let positions = cube_positions();
        let motion = MotionModel::Trajectory(TrajectoryConfig::default());
        let set = seed(&mut rng, &positions, &motion);

        // Progress far below every erosion value: the front has not reached
        // any vertex, so every particle sits at its base position.
        let samples = set.evaluate(0.0, 0.25, 16.0, -1.0e9, 0.8, &motion);
        for (sample, &base) in samples.iter().zip(&positions) {
            assert!(
                (sample.position - base).length() < 1e-4,
                "particle drifted at rest: {:?} vs {:?}",
                sample.position,
                base
            );
            assert!(!sample.visible);
        }
    }

    #[test]
    fn velocity_outside_band_stays_at_base() {
        let mut rng = fastrand::Rng::with_seed(11);
        let positions = cube_positions();
        let motion = MotionModel::Velocity(VelocityConfig::default());
        let set = seed(&mut rng, &positions, &motion);

        // The front is nowhere near any vertex: no drift, no turbulence,
        // even at a time where both terms would otherwise be nonzero.
        let samples = set.evaluate(37.5, 0.25, 16.0, -1.0e9, 0.8, &motion);
        for (sample, &base) in samples.iter().zip(&positions) {
            assert_eq!(sample.position, base);
            assert!(!sample.visible);
        }
    }

    #[test]
    fn velocity_life_wraps_at_period_boundary() {
        // max_offset 2.0, speed 0.02, elapsed 50:
        // life = fract(50 * 0.02 / 1.0) = fract(1.0) = 0 -> zero drift.
        let cfg = VelocityConfig {
            turbulence_strength: 0.0,
            ..Default::default()
        };
        let attrs = VelocityAttributes {
            base: vec![Vec3::new(1.0, 2.0, 3.0)],
            velocity: vec![Vec3::Y],
            max_offset: vec![2.0],
            angle: vec![0.0],
        };
        let samples = attrs.evaluate(50.0, 0.25, 16.0, 0.0, 0.8, &cfg);
        assert!((samples[0].position - Vec3::new(1.0, 2.0, 3.0)).length() < 1e-4);
    }

    #[test]
    fn velocity_zero_max_offset_is_guarded() {
        let cfg = VelocityConfig {
            turbulence_strength: 0.0,
            ..Default::default()
        };
        let attrs = VelocityAttributes {
            base: vec![Vec3::ZERO],
            velocity: vec![Vec3::Y],
            max_offset: vec![0.0],
            angle: vec![0.0],
        };
        let samples = attrs.evaluate(123.0, 0.25, 16.0, 0.0, 0.8, &cfg);
        assert_eq!(samples[0].position, Vec3::ZERO);
    }

    #[test]
    fn velocity_band_is_wider_than_edge_band() {
        let cfg = VelocityConfig::default();
        let attrs = VelocityAttributes {
            base: vec![Vec3::ZERO], // erosion = 0
            velocity: vec![Vec3::Y],
            max_offset: vec![2.0],
            angle: vec![0.0],
        };
        // progress = 1.5: the vertex is already Dissolved (0 < 1.5), but
        // still within the widened band [progress - 2, progress + edge + 2].
        let samples = attrs.evaluate(0.0, 0.25, 16.0, 1.5, 0.8, &cfg);
        assert!(samples[0].visible);
        // Far past the linger trail: gone.
        let samples = attrs.evaluate(0.0, 0.25, 16.0, 10.0, 0.8, &cfg);
        assert!(!samples[0].visible);
    }

    #[test]
    fn trajectory_visible_only_in_edge_band() {
        let attrs = TrajectoryAttributes {
            base: vec![Vec3::ZERO], // erosion = 0
            control0: vec![Vec3::ZERO],
            control1: vec![Vec3::ZERO],
            end_pos: vec![Vec3::ZERO],
            spin_rate: vec![0.0],
            spin_radius: vec![0.0],
            angle: vec![0.0],
        };
        let cfg = TrajectoryConfig::default();

        let solid = attrs.evaluate(0.0, 0.25, 16.0, -7.0, 0.8, &cfg);
        assert!(!solid[0].visible);
        let edge = attrs.evaluate(0.0, 0.25, 16.0, -0.4, 0.8, &cfg);
        assert!(edge[0].visible);
        let dissolved = attrs.evaluate(0.0, 0.25, 16.0, 0.5, 0.8, &cfg);
        assert!(!dissolved[0].visible);
    }

    #[test]
    fn bezier_endpoints() {
        let a = Vec3::ZERO;
        let b = Vec3::new(1.0, 2.0, 0.0);
        let c = Vec3::new(2.0, -1.0, 0.0);
        let d = Vec3::new(3.0, 0.0, 1.0);
        assert_eq!(bezier4(a, b, c, d, 0.0), a);
        assert!((bezier4(a, b, c, d, 1.0) - d).length() < 1e-6);
    }

    #[test]
    fn seeding_is_deterministic_per_seed() {
        let positions = cube_positions();
        let motion = MotionModel::default();

        let mut rng1 = fastrand::Rng::with_seed(99);
        let mut rng2 = fastrand::Rng::with_seed(99);
        let a = seed(&mut rng1, &positions, &motion);
        let b = seed(&mut rng2, &positions, &motion);

        let (ParticleAttributeSet::Trajectory(a), ParticleAttributeSet::Trajectory(b)) = (a, b)
        else {
            panic!("expected trajectory attributes");
        };
        assert_eq!(a.end_pos, b.end_pos);
        assert_eq!(a.angle, b.angle);
    }
}
