//! Small parsing and numeric helpers shared by the `wad` and `bsp` crates.

pub mod text;

pub use text::take_until_unbalanced;

/// Degeneracy / coplanarity / vertex-equality tolerance, in world units.
///
/// One constant for every "close enough" decision in the geometry code, per
/// the source format's own convention of never needing more than one epsilon.
pub const EPSILON: f32 = 1e-3;

/// Returns true if two floats are within [`EPSILON`] of each other.
pub fn nearly_eq(a: f32, b: f32) -> bool {
    (a - b).abs() <= EPSILON
}

/// Returns true if two vectors are within [`EPSILON`] of each other componentwise.
pub fn nearly_eq_vec(a: glam::Vec3, b: glam::Vec3) -> bool {
    nearly_eq(a.x, b.x) && nearly_eq(a.y, b.y) && nearly_eq(a.z, b.z)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn epsilon_tolerance() {
        assert!(nearly_eq(1.0, 1.0 + EPSILON / 2.0));
        assert!(!nearly_eq(1.0, 1.0 + EPSILON * 10.0));
    }
}
