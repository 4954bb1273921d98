//! The boundary function: maps an object-space point to an erosion value
//! and classifies it against the dissolve front.
//!
//! Object-space positions keep the erosion pattern rigidly attached to the
//! mesh surface, so the effect reads as material eating away rather than a
//! screen-space wipe. The classification is derived per sample, never
//! stored.

use bevy::math::Vec3;

use crate::data::DissolveParams;
use crate::noise::simplex3;

/// Classification of a point against the dissolve front.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Untouched: the underlying lit shading applies.
    Solid,
    /// Inside the highlight band: rendered with the flat edge color.
    Edge,
    /// Behind the front: the fragment is discarded entirely.
    Dissolved,
}

/// Erosion value of an object-space point.
#[inline]
pub fn erosion(position: Vec3, frequency: f32, amplitude: f32) -> f32 {
    simplex3(position * frequency) * amplitude
}

/// Classify an erosion value against `progress` and the edge band.
///
/// `edge_width <= 0` collapses the band: points go straight from `Solid`
/// to `Dissolved`.
#[inline]
pub fn classify(erosion: f32, progress: f32, edge_width: f32) -> Phase {
    if erosion < progress {
        Phase::Dissolved
    } else if erosion < progress + edge_width {
        Phase::Edge
    } else {
        Phase::Solid
    }
}

/// Classify an object-space point using the shared parameter set.
#[inline]
pub fn classify_point(position: Vec3, params: &DissolveParams) -> Phase {
    classify(
        erosion(position, params.frequency, params.amplitude),
        params.progress,
        params.edge_width,
    )
}

/// Smooth cubic in/out easing on [0, 1].
#[inline]
pub fn in_out_cubic(t: f32) -> f32 {
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        (t - 1.0) * (2.0 * t - 2.0) * (2.0 * t - 2.0) + 1.0
    }
}

/// Normalized, eased path progress for a trajectory particle whose base
/// point has the given erosion value. Rises from 0 (front not yet reached)
/// to 1 (front passed by a full band width) as `progress` increases — a
/// function of the front position, not of wall-clock time.
#[inline]
pub fn path_progress(erosion: f32, progress: f32, edge_width: f32) -> f32 {
    if edge_width <= 0.0 {
        // Degenerate band: step straight from path start to path end.
        return if progress > erosion { 1.0 } else { 0.0 };
    }
    let t = ((progress - erosion) / edge_width).clamp(0.0, 1.0);
    in_out_cubic(t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_scenario_solid_then_dissolved() {
        // A vertex at the object-space origin has noise(0) = 0, so
        // erosion = 0 regardless of frequency/amplitude.
        let e = erosion(Vec3::ZERO, 0.25, 16.0);
        assert_eq!(e, 0.0);

        // progress = -7.0, edge_width = 0.8: 0 >= -6.2 -> Solid
        assert_eq!(classify(e, -7.0, 0.8), Phase::Solid);
        // progress = 0.5: 0 < 0.5 -> Dissolved
        assert_eq!(classify(e, 0.5, 0.8), Phase::Dissolved);
    }

    #[test]
    fn monotonic_in_progress() {
        // Raising progress can only move a point solid -> edge -> dissolved.
        let e = 1.3;
        let mut prev = 0u8;
        for i in 0..200 {
            let progress = -5.0 + i as f32 * 0.05;
            let rank = match classify(e, progress, 0.8) {
                Phase::Solid => 0,
                Phase::Edge => 1,
                Phase::Dissolved => 2,
            };
            assert!(rank >= prev, "phase regressed at progress {progress}");
            prev = rank;
        }
        assert_eq!(prev, 2);
    }

    #[test]
    fn extremes_classify_uniformly() {
        let verts = [
            Vec3::new(0.3, 1.2, -0.7),
            Vec3::new(-2.0, 0.1, 4.5),
            Vec3::new(5.5, -3.3, 2.2),
        ];
        let erosions: Vec<f32> = verts.iter().map(|v| erosion(*v, 0.25, 16.0)).collect();
        let min = erosions.iter().cloned().fold(f32::INFINITY, f32::min);
        let max = erosions.iter().cloned().fold(f32::NEG_INFINITY, f32::max);

        for &e in &erosions {
            assert_eq!(classify(e, min - 1.0, 0.8), Phase::Solid);
            assert_eq!(classify(e, max + 1.0, 0.8), Phase::Dissolved);
        }
    }

    #[test]
    fn zero_edge_width_never_edge() {
        for i in 0..400 {
            let e = -10.0 + i as f32 * 0.05;
            assert_ne!(classify(e, 0.0, 0.0), Phase::Edge);
        }
    }

    #[test]
    fn classify_is_pure() {
        let p = Vec3::new(0.9, -1.4, 2.2);
        let params = DissolveParams::default();
        assert_eq!(classify_point(p, &params), classify_point(p, &params));
    }

    #[test]
    fn easing_endpoints_and_midpoint() {
        assert_eq!(in_out_cubic(0.0), 0.0);
        assert!((in_out_cubic(1.0) - 1.0).abs() < 1e-6);
        assert!((in_out_cubic(0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn path_progress_tracks_front() {
        // Front far below the erosion value: still at path start.
        assert_eq!(path_progress(4.0, -10.0, 0.8), 0.0);
        // Front a full band past: at path end.
        assert!((path_progress(4.0, 4.8, 0.8) - 1.0).abs() < 1e-6);
        // Degenerate band steps instead of dividing by zero.
        assert_eq!(path_progress(4.0, 3.9, 0.0), 0.0);
        assert_eq!(path_progress(4.0, 4.1, 0.0), 1.0);
    }
}
