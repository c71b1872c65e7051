// q_shared.rs — definitions shared by the renderer and the rest of the engine
// Converted from: qcommon/q_shared.h, q_shared.c

pub type Vec3 = [f32; 3];

/// Max length of a quake game pathname.
pub const MAX_QPATH: usize = 64;

// ============================================================
// Texinfo surface flags (SURF_*) as stored on disk
// ============================================================

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct SurfaceFlags: i32 {
        const LIGHT    = 0x1;  // value will hold the light strength
        const SLICK    = 0x2;  // effects game physics
        const SKY      = 0x4;  // don't draw, but add to skybox
        const WARP     = 0x8;  // turbulent water warp
        const TRANS33  = 0x10;
        const TRANS66  = 0x20;
        const FLOWING  = 0x40; // scroll towards angle
        const NODRAW   = 0x80; // don't bother referencing the texture
    }
}
pub const SURF_LIGHT: SurfaceFlags = SurfaceFlags::LIGHT;
pub const SURF_SKY: SurfaceFlags = SurfaceFlags::SKY;
pub const SURF_WARP: SurfaceFlags = SurfaceFlags::WARP;
pub const SURF_TRANS33: SurfaceFlags = SurfaceFlags::TRANS33;
pub const SURF_TRANS66: SurfaceFlags = SurfaceFlags::TRANS66;

// ============================================================
// Plane
// ============================================================

// Plane types; 0-2 are axial planes.
pub const PLANE_X: u8 = 0;
pub const PLANE_Y: u8 = 1;
pub const PLANE_Z: u8 = 2;
pub const PLANE_NON_AXIAL: u8 = 3;

/// In-memory plane. `signbits` has bit `j` set when `normal[j]` is negative,
/// used by the box-on-plane-side test.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CPlane {
    pub normal: Vec3,
    pub dist: f32,
    pub plane_type: u8,
    pub signbits: u8,
}

/// Sign bits of a plane normal: bit `j` is set for a negative component.
pub fn signbits_for_plane(normal: &Vec3) -> u8 {
    let mut bits = 0u8;
    for (j, n) in normal.iter().enumerate() {
        if *n < 0.0 {
            bits |= 1 << j;
        }
    }
    bits
}

// ============================================================
// Image types
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageType {
    Skin,
    Sprite,
    Wall,
    Pic,
    Sky,
}

// ============================================================
// MATHLIB — Vector operations
// ============================================================

#[inline]
pub fn dot_product(a: &Vec3, b: &Vec3) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub fn vector_subtract(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
pub fn vector_add(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

/// Normalize in place, returns original length.
pub fn vector_normalize(v: &mut Vec3) -> f32 {
    let length = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if length != 0.0 {
        let ilength = 1.0 / length;
        v[0] *= ilength;
        v[1] *= ilength;
        v[2] *= ilength;
    }
    length
}

/// Normalized copy of `v`; the zero vector stays zero.
pub fn vector_normalized(v: &Vec3) -> Vec3 {
    let mut out = *v;
    vector_normalize(&mut out);
    out
}

pub fn vector_length(v: &Vec3) -> f32 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

pub fn cross_product(v1: &Vec3, v2: &Vec3) -> Vec3 {
    [
        v1[1] * v2[2] - v1[2] * v2[1],
        v1[2] * v2[0] - v1[0] * v2[2],
        v1[0] * v2[1] - v1[1] * v2[0],
    ]
}

/// Length of the corner made of the largest absolute extent on each axis.
pub fn radius_from_bounds(mins: &Vec3, maxs: &Vec3) -> f32 {
    let mut corner = [0.0f32; 3];
    for i in 0..3 {
        corner[i] = mins[i].abs().max(maxs[i].abs());
    }
    vector_length(&corner)
}

// ============================================================
// String hashing
// ============================================================

/// Jenkins one-at-a-time hash of a string. Model and image caches compare
/// names by this hash.
pub fn com_hash_string(s: &str) -> u32 {
    let mut hash: u32 = 0;
    for &b in s.as_bytes() {
        hash = hash.wrapping_add(b as u32);
        hash = hash.wrapping_add(hash << 10);
        hash ^= hash >> 6;
    }
    hash = hash.wrapping_add(hash << 3);
    hash ^= hash >> 11;
    hash = hash.wrapping_add(hash << 15);
    hash
}

/// Extension of a path including the dot, or "" if it has none.
pub fn com_file_extension(path: &str) -> &str {
    let file = path.rsplit('/').next().unwrap_or(path);
    match file.rfind('.') {
        Some(dot) => &file[dot..],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dot_and_cross() {
        let x = [1.0, 0.0, 0.0];
        let y = [0.0, 1.0, 0.0];
        assert_eq!(dot_product(&x, &y), 0.0);
        assert_eq!(cross_product(&x, &y), [0.0, 0.0, 1.0]);
        assert_eq!(cross_product(&y, &x), [0.0, 0.0, -1.0]);
    }

    #[test]
    fn test_vector_normalize_returns_length() {
        let mut v = [3.0, 4.0, 0.0];
        let len = vector_normalize(&mut v);
        assert!((len - 5.0).abs() < 1e-6);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_vector_normalize_zero_stays_zero() {
        let mut v = [0.0; 3];
        assert_eq!(vector_normalize(&mut v), 0.0);
        assert_eq!(v, [0.0; 3]);
    }

    #[test]
    fn test_signbits_for_plane() {
        assert_eq!(signbits_for_plane(&[1.0, 1.0, 1.0]), 0);
        assert_eq!(signbits_for_plane(&[-1.0, 0.0, 0.0]), 0b001);
        assert_eq!(signbits_for_plane(&[0.0, -0.5, -0.5]), 0b110);
        assert_eq!(signbits_for_plane(&[-0.1, -0.1, -0.9]), 0b111);
    }

    #[test]
    fn test_radius_from_bounds_asymmetric() {
        let mins = [-20.0, -5.0, -3.0];
        let maxs = [10.0, 15.0, 8.0];
        // corner is [20, 15, 8]
        let expected = (20.0f32 * 20.0 + 15.0 * 15.0 + 8.0 * 8.0).sqrt();
        assert!((radius_from_bounds(&mins, &maxs) - expected).abs() < 1e-4);
    }

    #[test]
    fn test_radius_from_bounds_negative_only() {
        let mins = [-30.0, -20.0, -10.0];
        let maxs = [-5.0, -2.0, -1.0];
        let expected = (30.0f32 * 30.0 + 20.0 * 20.0 + 10.0 * 10.0).sqrt();
        assert!((radius_from_bounds(&mins, &maxs) - expected).abs() < 1e-4);
    }

    #[test]
    fn test_hash_known_values() {
        // Reference values of the one-at-a-time hash.
        assert_eq!(com_hash_string(""), 0);
        assert_eq!(com_hash_string("a"), 0xca2e_9442);
        assert_eq!(
            com_hash_string("The quick brown fox jumps over the lazy dog"),
            0x519e_91f5
        );
    }

    #[test]
    fn test_hash_is_order_sensitive() {
        assert_ne!(com_hash_string("ab"), com_hash_string("ba"));
        assert_eq!(
            com_hash_string("models/items/armor/tris.md2"),
            com_hash_string("models/items/armor/tris.md2")
        );
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(com_file_extension("maps/base1.bsp"), ".bsp");
        assert_eq!(com_file_extension("models/a.b/tris"), "");
        assert_eq!(com_file_extension("sprites/s_bfg1.sp2"), ".sp2");
    }

    #[test]
    fn test_surface_flags_bits() {
        assert_eq!(SURF_WARP.bits(), 0x8);
        assert_eq!(SURF_SKY.bits(), 0x4);
        let f = SurfaceFlags::from_bits_truncate(0x8 | 0x10);
        assert!(f.contains(SURF_WARP));
        assert!(f.contains(SURF_TRANS33));
        assert!(!f.contains(SURF_SKY));
    }
}
