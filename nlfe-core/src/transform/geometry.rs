//! Reference geometry and the constant matrices of the small-displacement
//! chain `ug -> T_off -> T_lg -> T_bl -> v`.
//!
//! DOF ordering per node is `ux, uy, rz` in 2-D and
//! `ux, uy, uz, rx, ry, rz` in 3-D. Local axes are stored as the rows of a
//! `Matrix3` (`e1` along the member, `e2`, `e3`).

use crate::error::{Error, Result};
use crate::transform::GeomTransf;
use crate::types::{skew, Dimension, Point3, Vec3};
use nalgebra::{DMatrix, DVector, Matrix3};

/// Resolved end points, global offsets, axes and length of one member.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FrameGeometry {
    pub dim: Dimension,
    pub xi: Point3,
    pub xj: Point3,
    /// Rigid offsets in the global frame.
    pub oi: Vec3,
    pub oj: Vec3,
    pub axes: Matrix3<f64>,
    pub l0: f64,
}

impl FrameGeometry {
    /// Resolve a transform definition against the member's nodal
    /// coordinates.
    ///
    /// Offsets flagged as length-normalized are scaled by the nodal distance;
    /// offsets flagged as local are rotated to global using the axes of the
    /// bare nodal chord.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] for zero length, an orientation vector
    /// parallel to the member, or out-of-plane offsets in 2-D.
    pub fn resolve(def: &GeomTransf, xi: Point3, xj: Point3) -> Result<Self> {
        let dim = def.dimension();
        let (mut oi, mut oj) = def.offsets().unwrap_or((Vec3::zeros(), Vec3::zeros()));

        if dim == Dimension::Two && (oi.z != 0.0 || oj.z != 0.0 || xi.z != 0.0 || xj.z != 0.0) {
            return Err(Error::configuration(format!(
                "transform {} is planar but has out-of-plane coordinates or offsets",
                def.tag()
            )));
        }

        let nodal = xj - xi;
        if def.is_offsets_normalized() {
            let dist = nodal.norm();
            oi *= dist;
            oj *= dist;
        }
        if def.is_offsets_local() {
            let prelim = frame_axes(def, &nodal)?;
            oi = prelim.transpose() * oi;
            oj = prelim.transpose() * oj;
        }

        let chord = (xj + oj) - (xi + oi);
        let axes = frame_axes(def, &chord)?;

        Ok(Self {
            dim,
            xi,
            xj,
            oi,
            oj,
            axes,
            l0: chord.norm(),
        })
    }

    pub fn ndf(&self) -> usize {
        self.dim.ndf()
    }

    /// Global DOFs of the member.
    pub fn n_dof(&self) -> usize {
        2 * self.dim.ndf()
    }
}

/// Local axes for a member along `chord`.
fn frame_axes(def: &GeomTransf, chord: &Vec3) -> Result<Matrix3<f64>> {
    let length = chord.norm();
    if !(length > 0.0) || !length.is_finite() {
        return Err(Error::configuration(format!(
            "transform {}: member has zero length",
            def.tag()
        )));
    }
    let e1 = chord / length;

    match def.dimension() {
        Dimension::Two => {
            let e2 = Vec3::new(-e1.y, e1.x, 0.0);
            Ok(Matrix3::from_rows(&[
                e1.transpose(),
                e2.transpose(),
                Vec3::z().transpose(),
            ]))
        }
        Dimension::Three => {
            let vecxz = def.orientation().ok_or_else(|| {
                Error::configuration(format!(
                    "transform {} is spatial but has no orientation vector",
                    def.tag()
                ))
            })?;
            let y = vecxz.cross(&e1);
            if y.norm() <= 1e-10 * vecxz.norm() {
                return Err(Error::configuration(format!(
                    "transform {}: orientation vector is parallel to the member axis",
                    def.tag()
                )));
            }
            let e2 = y.normalize();
            let e3 = e1.cross(&e2);
            Ok(Matrix3::from_rows(&[
                e1.transpose(),
                e2.transpose(),
                e3.transpose(),
            ]))
        }
    }
}

/// Rigid-link matrix mapping nodal DOFs to member end DOFs for the given
/// global offsets.
pub(crate) fn offset_matrix(dim: Dimension, oi: &Vec3, oj: &Vec3) -> DMatrix<f64> {
    let ndf = dim.ndf();
    let mut t = DMatrix::identity(2 * ndf, 2 * ndf);
    for (node, o) in [oi, oj].into_iter().enumerate() {
        let b = node * ndf;
        match dim {
            Dimension::Two => {
                t[(b, b + 2)] = -o.y;
                t[(b + 1, b + 2)] = o.x;
            }
            Dimension::Three => {
                let s = skew(o);
                for r in 0..3 {
                    for c in 0..3 {
                        t[(b + r, b + 3 + c)] = -s[(r, c)];
                    }
                }
            }
        }
    }
    t
}

/// Global-to-local rotation for all member DOFs.
pub(crate) fn rotation_matrix(dim: Dimension, axes: &Matrix3<f64>) -> DMatrix<f64> {
    let ndf = dim.ndf();
    let mut t = DMatrix::zeros(2 * ndf, 2 * ndf);
    match dim {
        Dimension::Two => {
            for b in [0, 3] {
                for r in 0..2 {
                    for c in 0..2 {
                        t[(b + r, b + c)] = axes[(r, c)];
                    }
                }
                t[(b + 2, b + 2)] = 1.0;
            }
        }
        Dimension::Three => {
            for b in [0, 3, 6, 9] {
                for r in 0..3 {
                    for c in 0..3 {
                        t[(b + r, b + c)] = axes[(r, c)];
                    }
                }
            }
        }
    }
    t
}

/// Local-to-basic compatibility matrix of a member of length `l`.
pub(crate) fn basic_matrix(dim: Dimension, l: f64) -> DMatrix<f64> {
    let il = 1.0 / l;
    match dim {
        Dimension::Two => {
            let mut t = DMatrix::zeros(3, 6);
            t[(0, 0)] = -1.0;
            t[(0, 3)] = 1.0;
            for row in [1, 2] {
                t[(row, 1)] = il;
                t[(row, 4)] = -il;
            }
            t[(1, 2)] = 1.0;
            t[(2, 5)] = 1.0;
            t
        }
        Dimension::Three => {
            let mut t = DMatrix::zeros(6, 12);
            t[(0, 0)] = -1.0;
            t[(0, 6)] = 1.0;
            for row in [1, 2] {
                t[(row, 1)] = il;
                t[(row, 7)] = -il;
            }
            t[(1, 5)] = 1.0;
            t[(2, 11)] = 1.0;
            for row in [3, 4] {
                t[(row, 2)] = -il;
                t[(row, 8)] = il;
            }
            t[(3, 4)] = 1.0;
            t[(4, 10)] = 1.0;
            t[(5, 3)] = -1.0;
            t[(5, 9)] = 1.0;
            t
        }
    }
}

/// Scatter local support reactions `p0` (`[Px_i, Vy_i, Vy_j]` in 2-D,
/// `[Px_i, Vy_i, Vy_j, Vz_i, Vz_j]` in 3-D) onto local member DOFs.
pub(crate) fn place_reactions(dim: Dimension, p0: &DVector<f64>) -> DVector<f64> {
    let ndf = dim.ndf();
    let mut pl = DVector::zeros(2 * ndf);
    if p0.len() >= 3 {
        pl[0] += p0[0];
        pl[1] += p0[1];
        pl[ndf + 1] += p0[2];
    }
    if dim == Dimension::Three && p0.len() >= 5 {
        pl[2] += p0[3];
        pl[ndf + 2] += p0[4];
    }
    pl
}

/// Local P-Delta stiffness `N/L [[1, -1], [-1, 1]]` on the transverse
/// translations.
pub(crate) fn pdelta_matrix(dim: Dimension, n_over_l: f64) -> DMatrix<f64> {
    let ndf = dim.ndf();
    let mut k = DMatrix::zeros(2 * ndf, 2 * ndf);
    let transverse: &[usize] = match dim {
        Dimension::Two => &[1],
        Dimension::Three => &[1, 2],
    };
    for &d in transverse {
        k[(d, d)] = n_over_l;
        k[(d + ndf, d + ndf)] = n_over_l;
        k[(d, d + ndf)] = -n_over_l;
        k[(d + ndf, d)] = -n_over_l;
    }
    k
}
