//! Geometric transformation of two-node frame members.
//!
//! A transform maps between the element's **basic system** (rigid-body
//! modes removed) and the global DOFs of its two nodes:
//!
//! | dim | basic deformations `v` | basic forces `q` |
//! |-----|------------------------|------------------|
//! | 2-D | `[Δ, θz_i, θz_j]` | `[N, Mz_i, Mz_j]` |
//! | 3-D | `[Δ, θz_i, θz_j, θy_i, θy_j, φ]` | `[N, Mz_i, Mz_j, My_i, My_j, T]` |
//!
//! [`GeomTransf`] is the immutable definition held in the registry and
//! shared between elements. Each element calls [`GeomTransf::instantiate`]
//! to get its own [`FrameTransform`], which carries the kinematic state
//! (corotational chord angle, nodal quaternions) and commits and reverts
//! in lockstep with the element.
//!
//! # Submodules
//!
//! - [`linear`] - linear and P-Delta kinematics
//! - [`corotational2d`] - planar corotational kinematics
//! - [`corotational3d`] - spatial corotational kinematics

use crate::error::{Error, Result};
use crate::state::{Snapshot, Stateful};
use crate::types::{Dimension, Point3, Tag, Vec3};
use nalgebra::{DMatrix, DVector, Matrix3};
use std::fmt::Debug;

pub(crate) mod geometry;
mod jet;
pub mod corotational2d;
pub mod corotational3d;
pub mod linear;

pub use corotational2d::Corotational2d;
pub use corotational3d::Corotational3d;
pub use linear::LinearTransform;

use geometry::FrameGeometry;

/// Kinematic formulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformKind {
    /// Small displacements, reference configuration.
    Linear,
    /// Linear plus the axial-force geometric stiffness `N/L`.
    PDelta,
    /// Member frame follows the deformed chord.
    Corotational,
}

/// Immutable transform definition.
#[derive(Debug, Clone, PartialEq)]
pub struct GeomTransf {
    tag: Tag,
    kind: TransformKind,
    dim: Dimension,
    vecxz: Option<Vec3>,
    offsets: Option<(Vec3, Vec3)>,
    offsets_local: bool,
    offsets_normalized: bool,
}

impl GeomTransf {
    /// Planar transform. The orientation is implied by the plane.
    pub fn planar(tag: Tag, kind: TransformKind) -> Self {
        Self {
            tag,
            kind,
            dim: Dimension::Two,
            vecxz: None,
            offsets: None,
            offsets_local: false,
            offsets_normalized: false,
        }
    }

    /// Space transform with the vector `vecxz` lying in the local x-z
    /// plane.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] if `vecxz` is zero or not finite.
    pub fn spatial(tag: Tag, kind: TransformKind, vecxz: Vec3) -> Result<Self> {
        if !(vecxz.norm() > 0.0) || vecxz.iter().any(|c| !c.is_finite()) {
            return Err(Error::configuration(format!(
                "transform {tag}: invalid orientation vector {vecxz:?}"
            )));
        }
        Ok(Self {
            vecxz: Some(vecxz),
            dim: Dimension::Three,
            ..Self::planar(tag, kind)
        })
    }

    /// Build for a model of dimension `dim`, with `vecxz` required in 3-D
    /// and rejected in 2-D.
    pub fn new(tag: Tag, kind: TransformKind, dim: Dimension, vecxz: Option<Vec3>) -> Result<Self> {
        match (dim, vecxz) {
            (Dimension::Two, None) => Ok(Self::planar(tag, kind)),
            (Dimension::Two, Some(_)) => Err(Error::configuration(format!(
                "transform {tag}: planar transforms take no orientation vector"
            ))),
            (Dimension::Three, Some(v)) => Self::spatial(tag, kind, v),
            (Dimension::Three, None) => Err(Error::configuration(format!(
                "transform {tag}: spatial transforms need an orientation vector"
            ))),
        }
    }

    /// Rigid joint offsets at end i and end j.
    pub fn with_offsets(mut self, oi: Vec3, oj: Vec3) -> Self {
        self.offsets = Some((oi, oj));
        self
    }

    /// Interpret offsets in the member's local frame.
    pub fn offsets_local(mut self, local: bool) -> Self {
        self.offsets_local = local;
        self
    }

    /// Interpret offsets as fractions of the nodal distance.
    pub fn offsets_normalized(mut self, normalized: bool) -> Self {
        self.offsets_normalized = normalized;
        self
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn kind(&self) -> TransformKind {
        self.kind
    }

    pub fn dimension(&self) -> Dimension {
        self.dim
    }

    pub fn orientation(&self) -> Option<Vec3> {
        self.vecxz
    }

    pub fn offsets(&self) -> Option<(Vec3, Vec3)> {
        self.offsets
    }

    pub fn is_offsets_local(&self) -> bool {
        self.offsets_local
    }

    pub fn is_offsets_normalized(&self) -> bool {
        self.offsets_normalized
    }

    /// Per-element transform for a member from `xi` to `xj`.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] for degenerate geometry (see
    /// [`FrameTransform`] implementors).
    pub fn instantiate(&self, xi: Point3, xj: Point3) -> Result<Box<dyn FrameTransform>> {
        let geom = FrameGeometry::resolve(self, xi, xj)?;
        Ok(match (self.kind, self.dim) {
            (TransformKind::Linear, _) => Box::new(LinearTransform::new(self.tag, geom, false)),
            (TransformKind::PDelta, _) => Box::new(LinearTransform::new(self.tag, geom, true)),
            (TransformKind::Corotational, Dimension::Two) => {
                Box::new(Corotational2d::new(self.tag, geom))
            }
            (TransformKind::Corotational, Dimension::Three) => {
                Box::new(Corotational3d::new(self.tag, geom))
            }
        })
    }
}

/// Per-element kinematic state of a frame transform.
///
/// The element drives it once per iteration with
/// [`FrameTransform::update`], then reads basic deformations and pushes
/// basic forces and stiffness back to global. The transform never calls
/// back into the element.
pub trait FrameTransform: Stateful + Send + Sync + Debug {
    fn tag(&self) -> Tag;

    fn class_name(&self) -> &'static str;

    fn dimension(&self) -> Dimension;

    /// Undeformed length between the offset end points.
    fn initial_length(&self) -> f64;

    /// Current chord length (equal to the initial length for small
    /// displacement formulations).
    fn deformed_length(&self) -> f64;

    /// Current local axes as matrix rows `e1, e2, e3`.
    fn local_axes(&self) -> Matrix3<f64>;

    /// Set trial global displacements of both nodes (`2 * ndf` values) and
    /// recompute the trial kinematics.
    ///
    /// # Errors
    ///
    /// [`Error::UpdateFailure`] for a wrong-size or non-finite vector, or
    /// a collapsed chord.
    fn update(&mut self, ug: &DVector<f64>) -> Result<()>;

    /// Trial basic deformations `v`.
    fn basic_trial_disp(&self) -> DVector<f64>;

    /// Global end forces from basic forces `q` and local support reactions
    /// `p0` of member loads.
    fn global_resisting_force(&self, q: &DVector<f64>, p0: &DVector<f64>) -> DVector<f64>;

    /// Global tangent from basic stiffness `kb` at basic forces `q`.
    fn global_stiff(&self, kb: &DMatrix<f64>, q: &DVector<f64>) -> DMatrix<f64>;

    /// Global stiffness at the reference configuration.
    fn global_initial_stiff(&self, kb: &DMatrix<f64>) -> DMatrix<f64>;

    fn committed_snapshot(&self) -> Snapshot;

    fn restore_snapshot(&mut self, snapshot: &Snapshot) -> Result<()>;
}

/// Validate a global displacement vector for a member with `ndf` DOFs per
/// node.
pub(crate) fn check_displacement(tag: Tag, ndf: usize, ug: &DVector<f64>) -> Result<()> {
    if ug.len() != 2 * ndf {
        return Err(Error::update_failure(
            tag,
            format!("transform expects {} displacements, got {}", 2 * ndf, ug.len()),
        ));
    }
    if ug.iter().any(|u| !u.is_finite()) {
        return Err(Error::update_failure(tag, "non-finite nodal displacement"));
    }
    Ok(())
}
