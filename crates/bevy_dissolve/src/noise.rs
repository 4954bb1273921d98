//! Procedural simplex noise, 3D and 4D.
//!
//! Pure functions of their input coordinates: deterministic, continuous,
//! allocation-free, output in roughly [-1, 1]. The permutation-polynomial
//! formulation (no gradient tables) is the same one used by
//! `shaders/noise.wgsl`, so CPU-side classification and the shaders sample
//! the *same* noise field.

use bevy::math::{Vec2, Vec3, Vec3Swizzles, Vec4, Vec4Swizzles};

#[inline]
fn mod289_v3(x: Vec3) -> Vec3 {
    x - (x * (1.0 / 289.0)).floor() * 289.0
}

#[inline]
fn mod289_v4(x: Vec4) -> Vec4 {
    x - (x * (1.0 / 289.0)).floor() * 289.0
}

#[inline]
fn mod289(x: f32) -> f32 {
    x - (x * (1.0 / 289.0)).floor() * 289.0
}

#[inline]
fn permute_v4(x: Vec4) -> Vec4 {
    mod289_v4((x * 34.0 + 1.0) * x)
}

#[inline]
fn permute(x: f32) -> f32 {
    mod289((x * 34.0 + 1.0) * x)
}

#[inline]
fn taylor_inv_sqrt_v4(r: Vec4) -> Vec4 {
    Vec4::splat(1.792_842_9) - 0.853_734_7 * r
}

#[inline]
fn taylor_inv_sqrt(r: f32) -> f32 {
    1.792_842_9 - 0.853_734_7 * r
}

#[inline]
fn step_v3(edge: Vec3, x: Vec3) -> Vec3 {
    Vec3::select(x.cmpge(edge), Vec3::ONE, Vec3::ZERO)
}

#[inline]
fn step_v4(edge: Vec4, x: Vec4) -> Vec4 {
    Vec4::select(x.cmpge(edge), Vec4::ONE, Vec4::ZERO)
}

/// 3D simplex noise.
pub fn simplex3(v: Vec3) -> f32 {
    const C: Vec2 = Vec2::new(1.0 / 6.0, 1.0 / 3.0);
    const D: Vec4 = Vec4::new(0.0, 0.5, 1.0, 2.0);

    // First corner
    let mut i = (v + Vec3::splat(v.dot(Vec3::splat(C.y)))).floor();
    let x0 = v - i + Vec3::splat(i.dot(Vec3::splat(C.x)));

    // Other corners. A three-way tie (exact lattice points and the main
    // diagonal) collapses the min/max selection into invalid corners; pick
    // the x >= y >= z simplex there so every corner contribution cancels
    // at lattice points and the value is exactly zero.
    let g = step_v3(x0.yzx(), x0);
    let l = Vec3::ONE - g;
    let (i1, i2) = if g == Vec3::ONE {
        (Vec3::X, Vec3::new(1.0, 1.0, 0.0))
    } else {
        (g.min(l.zxy()), g.max(l.zxy()))
    };

    let x1 = x0 - i1 + Vec3::splat(C.x);
    let x2 = x0 - i2 + Vec3::splat(C.y);
    let x3 = x0 - Vec3::splat(D.y);

    // Permutations
    i = mod289_v3(i);
    let p = permute_v4(
        permute_v4(
            permute_v4(Vec4::splat(i.z) + Vec4::new(0.0, i1.z, i2.z, 1.0))
                + Vec4::splat(i.y)
                + Vec4::new(0.0, i1.y, i2.y, 1.0),
        ) + Vec4::splat(i.x)
            + Vec4::new(0.0, i1.x, i2.x, 1.0),
    );

    // Gradients: 7x7 points over a square, mapped onto an octahedron
    // Must round toward the f32 above 1/7 or floor(j * ns.z) misclassifies
    // gradients near lattice multiples of 7.
    let n_ = 1.0 / 7.0;
    let ns = n_ * D.wyz() - D.xzx();

    let j = p - 49.0 * (p * ns.z * ns.z).floor();

    let x_ = (j * ns.z).floor();
    let y_ = (j - 7.0 * x_).floor();

    let x = x_ * ns.x + Vec4::splat(ns.y);
    let y = y_ * ns.x + Vec4::splat(ns.y);
    let h = Vec4::ONE - x.abs() - y.abs();

    let b0 = Vec4::new(x.x, x.y, y.x, y.y);
    let b1 = Vec4::new(x.z, x.w, y.z, y.w);

    let s0 = b0.floor() * 2.0 + 1.0;
    let s1 = b1.floor() * 2.0 + 1.0;
    let sh = -step_v4(h, Vec4::ZERO);

    let a0 = b0.xzyw() + s0.xzyw() * sh.xxyy();
    let a1 = b1.xzyw() + s1.xzyw() * sh.zzww();

    let mut p0 = Vec3::new(a0.x, a0.y, h.x);
    let mut p1 = Vec3::new(a0.z, a0.w, h.y);
    let mut p2 = Vec3::new(a1.x, a1.y, h.z);
    let mut p3 = Vec3::new(a1.z, a1.w, h.w);

    // Normalise gradients
    let norm = taylor_inv_sqrt_v4(Vec4::new(
        p0.dot(p0),
        p1.dot(p1),
        p2.dot(p2),
        p3.dot(p3),
    ));
    p0 *= norm.x;
    p1 *= norm.y;
    p2 *= norm.z;
    p3 *= norm.w;

    // Mix final noise value
    let m = (Vec4::splat(0.6)
        - Vec4::new(x0.dot(x0), x1.dot(x1), x2.dot(x2), x3.dot(x3)))
    .max(Vec4::ZERO);
    let m = m * m;
    42.0 * (m * m).dot(Vec4::new(p0.dot(x0), p1.dot(x1), p2.dot(x2), p3.dot(x3)))
}

fn grad4(j: f32, ip: Vec4) -> Vec4 {
    let ones = Vec4::new(1.0, 1.0, 1.0, -1.0);
    let mut pxyz = ((Vec3::splat(j) * ip.xyz()).fract() * 7.0).floor() * ip.z - 1.0;
    let pw = 1.5 - pxyz.abs().dot(ones.xyz());
    let s = Vec4::select(
        Vec4::new(pxyz.x, pxyz.y, pxyz.z, pw).cmplt(Vec4::ZERO),
        Vec4::ONE,
        Vec4::ZERO,
    );
    pxyz += (s.xyz() * 2.0 - 1.0) * s.w;
    Vec4::new(pxyz.x, pxyz.y, pxyz.z, pw)
}

/// 4D simplex noise. The fourth coordinate is typically time, which turns
/// the field into an evolving turbulence source.
pub fn simplex4(v: Vec4) -> f32 {
    // (sqrt(5) - 1) / 4
    const F4: f32 = 0.309_016_99;
    const C: Vec4 = Vec4::new(
        0.138_196_6,   // (5 - sqrt(5)) / 20  = G4
        0.276_393_2,   // 2 * G4
        0.414_589_8,   // 3 * G4
        -0.447_213_6,  // -1 + 4 * G4
    );

    // First corner
    let mut i = (v + Vec4::splat(v.dot(Vec4::splat(F4)))).floor();
    let x0 = v - i + Vec4::splat(i.dot(Vec4::splat(C.x)));

    // Rank ordering to find the simplex the point lies in
    let is_x = step_v3(x0.yzw(), x0.xxx());
    let is_yz = step_v3(Vec3::new(x0.z, x0.w, x0.w), Vec3::new(x0.y, x0.y, x0.z));

    let i0_x = is_x.x + is_x.y + is_x.z;
    let mut i0_y = 1.0 - is_x.x;
    let mut i0_z = 1.0 - is_x.y;
    let mut i0_w = 1.0 - is_x.z;
    i0_y += is_yz.x + is_yz.y;
    i0_z += 1.0 - is_yz.x;
    i0_w += 1.0 - is_yz.y;
    i0_z += is_yz.z;
    i0_w += 1.0 - is_yz.z;
    let i0 = Vec4::new(i0_x, i0_y, i0_z, i0_w);

    // i0 now contains the unique values 0, 1, 2, 3 in each channel
    let i3 = i0.clamp(Vec4::ZERO, Vec4::ONE);
    let i2 = (i0 - 1.0).clamp(Vec4::ZERO, Vec4::ONE);
    let i1 = (i0 - 2.0).clamp(Vec4::ZERO, Vec4::ONE);

    let x1 = x0 - i1 + Vec4::splat(C.x);
    let x2 = x0 - i2 + Vec4::splat(C.y);
    let x3 = x0 - i3 + Vec4::splat(C.z);
    let x4 = x0 + Vec4::splat(C.w);

    // Permutations
    i = mod289_v4(i);
    let j0 = permute(permute(permute(permute(i.w) + i.z) + i.y) + i.x);
    let j1 = permute_v4(
        permute_v4(
            permute_v4(
                permute_v4(Vec4::splat(i.w) + Vec4::new(i1.w, i2.w, i3.w, 1.0))
                    + Vec4::splat(i.z)
                    + Vec4::new(i1.z, i2.z, i3.z, 1.0),
            ) + Vec4::splat(i.y)
                + Vec4::new(i1.y, i2.y, i3.y, 1.0),
        ) + Vec4::splat(i.x)
            + Vec4::new(i1.x, i2.x, i3.x, 1.0),
    );

    // Gradients: 7x7x6 points over a cube, mapped onto a 4-octahedron
    let ip = Vec4::new(1.0 / 294.0, 1.0 / 49.0, 1.0 / 7.0, 0.0);

    let mut p0 = grad4(j0, ip);
    let mut p1 = grad4(j1.x, ip);
    let mut p2 = grad4(j1.y, ip);
    let mut p3 = grad4(j1.z, ip);
    let mut p4 = grad4(j1.w, ip);

    // Normalise gradients
    let norm = taylor_inv_sqrt_v4(Vec4::new(
        p0.dot(p0),
        p1.dot(p1),
        p2.dot(p2),
        p3.dot(p3),
    ));
    p0 *= norm.x;
    p1 *= norm.y;
    p2 *= norm.z;
    p3 *= norm.w;
    p4 *= taylor_inv_sqrt(p4.dot(p4));

    // Mix contributions from the five corners
    let m0 = (Vec3::splat(0.6) - Vec3::new(x0.dot(x0), x1.dot(x1), x2.dot(x2))).max(Vec3::ZERO);
    let m1 = (Vec2::splat(0.6) - Vec2::new(x3.dot(x3), x4.dot(x4))).max(Vec2::ZERO);
    let m0 = m0 * m0;
    let m1 = m1 * m1;

    49.0 * ((m0 * m0).dot(Vec3::new(p0.dot(x0), p1.dot(x1), p2.dot(x2)))
        + (m1 * m1).dot(Vec2::new(p3.dot(x3), p4.dot(x4))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_at_origin() {
        // Every lattice corner contribution vanishes at the origin; the
        // boundary scenario in the docs relies on this.
        assert_eq!(simplex3(Vec3::ZERO), 0.0);
        assert_eq!(simplex4(Vec4::ZERO), 0.0);
    }

    #[test]
    fn gradient_decode_near_lattice_multiples_of_seven() {
        // A point whose hash decode straddles a multiple of 7. A 1/7
        // constant rounded one ulp low flips the floor and returns a value
        // far outside [-1, 1] here.
        let n = simplex3(Vec3::new(-7.4, 2.12, -1.76));
        assert!((n + 0.5547189).abs() < 1e-2, "gradient decode drifted: {n}");
    }

    #[test]
    fn deterministic() {
        let p = Vec3::new(1.25, -3.5, 0.75);
        assert_eq!(simplex3(p), simplex3(p));
        let q = Vec4::new(1.25, -3.5, 0.75, 9.0);
        assert_eq!(simplex4(q), simplex4(q));
    }

    #[test]
    fn bounded_roughly_unit() {
        for ix in -20..20 {
            for iy in -20..20 {
                let p = Vec3::new(ix as f32 * 0.37, iy as f32 * 0.53, (ix + iy) as f32 * 0.11);
                let n = simplex3(p);
                assert!(n.abs() <= 1.05, "simplex3({p:?}) = {n} out of range");

                let n4 = simplex4(p.extend(ix as f32 * 0.29));
                assert!(n4.abs() <= 1.05, "simplex4 out of range: {n4}");
            }
        }
    }

    #[test]
    fn continuous_at_small_scale() {
        let p = Vec3::new(0.8, 1.9, -2.3);
        let eps = 1e-3;
        let a = simplex3(p);
        let b = simplex3(p + Vec3::splat(eps));
        assert!((a - b).abs() < 0.05, "noise jumped: {a} vs {b}");
    }

    #[test]
    fn varies_over_space() {
        let a = simplex3(Vec3::new(0.5, 0.5, 0.5));
        let b = simplex3(Vec3::new(2.5, 0.5, 0.5));
        assert_ne!(a, b);
    }

    #[test]
    fn time_axis_decorrelates() {
        let p = Vec3::new(0.4, 0.6, 0.8);
        let a = simplex4(p.extend(0.0));
        let b = simplex4(p.extend(5.0));
        assert_ne!(a, b);
    }
}
