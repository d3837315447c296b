//! Core data types shared across the crate.
//!
//! - Tags and geometric primitives
//! - Model dimension and the DOF layout it implies
//! - Nodes

use crate::error::{Error, Result};
use nalgebra::{Matrix3, Vector3};

/// Integer identity of a model component within its category.
pub type Tag = i32;

/// A point in 3D space. 2-D models leave the z coordinate at zero.
pub type Point3 = Vector3<f64>;

/// A 3D vector (offset, orientation, force, etc.).
pub type Vec3 = Vector3<f64>;

/// Spatial dimension of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dimension {
    /// Planar frame: `ux, uy, rz` per node.
    Two,
    /// Space frame: `ux, uy, uz, rx, ry, rz` per node.
    #[default]
    Three,
}

impl Dimension {
    /// Build from a numeric model dimension (2 or 3).
    pub fn from_ndm(ndm: usize) -> Result<Self> {
        match ndm {
            2 => Ok(Self::Two),
            3 => Ok(Self::Three),
            _ => Err(Error::configuration(format!(
                "model dimension must be 2 or 3, got {ndm}"
            ))),
        }
    }

    /// Number of spatial dimensions.
    pub fn ndm(self) -> usize {
        match self {
            Self::Two => 2,
            Self::Three => 3,
        }
    }

    /// Degrees of freedom per node.
    pub fn ndf(self) -> usize {
        match self {
            Self::Two => 3,
            Self::Three => 6,
        }
    }

    /// Size of the basic (rigid-body free) system of a two-node frame member.
    pub fn n_basic(self) -> usize {
        match self {
            Self::Two => 3,
            Self::Three => 6,
        }
    }
}

/// A model node: tag and reference coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub tag: Tag,
    pub crd: Point3,
}

impl Node {
    pub fn new(tag: Tag, crd: Point3) -> Self {
        Self { tag, crd }
    }
}

/// Skew-symmetric matrix such that `skew(a) * b == a.cross(&b)`.
pub fn skew(a: &Vec3) -> Matrix3<f64> {
    Matrix3::new(
        0.0, -a.z, a.y,
        a.z, 0.0, -a.x,
        -a.y, a.x, 0.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_dimension_layout() {
        assert_eq!(Dimension::Two.ndf(), 3);
        assert_eq!(Dimension::Three.ndf(), 6);
        assert_eq!(Dimension::Two.n_basic(), 3);
        assert_eq!(Dimension::Three.n_basic(), 6);
        assert!(Dimension::from_ndm(1).is_err());
        assert_eq!(Dimension::from_ndm(2).unwrap(), Dimension::Two);
    }

    #[test]
    fn test_skew_matches_cross() {
        let a = Vec3::new(1.0, -2.0, 0.5);
        let b = Vec3::new(0.3, 4.0, -1.0);
        let lhs = skew(&a) * b;
        let rhs = a.cross(&b);
        for i in 0..3 {
            assert_relative_eq!(lhs[i], rhs[i], epsilon = 1e-14);
        }
    }
}
