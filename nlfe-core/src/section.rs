//! Cross-section force-deformation interface and implementations.
//!
//! A section relates generalized deformations (axial strain, curvatures,
//! twist) to stress resultants at one integration point of a beam-column.
//! Like materials, sections are stateful and copied on retrieval.
//!
//! # Submodules
//!
//! - [`elastic`] - uncoupled linear elastic section
//! - [`fiber`] - fiber discretization over uniaxial materials

use crate::error::{Error, Result};
use crate::state::{Snapshot, Stateful};
use crate::types::{Dimension, Tag};
use nalgebra::{DMatrix, DVector};
use std::fmt::Debug;

pub mod elastic;
pub mod fiber;

pub use elastic::ElasticSection;
pub use fiber::{Fiber, FiberSection};

/// Stress resultant carried by one row of a section's response vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionResponse {
    /// Axial force / axial strain.
    P,
    /// Bending about local z / curvature κz.
    Mz,
    /// Bending about local y / curvature κy.
    My,
    /// Torque / twist rate.
    T,
}

/// Response layout of a planar beam section.
pub const PLANAR_RESPONSE: [SectionResponse; 2] = [SectionResponse::P, SectionResponse::Mz];

/// Response layout of a space beam section.
pub const SPATIAL_RESPONSE: [SectionResponse; 4] = [
    SectionResponse::P,
    SectionResponse::Mz,
    SectionResponse::My,
    SectionResponse::T,
];

/// Response layout for a frame of the given dimension.
pub fn frame_response(dim: Dimension) -> &'static [SectionResponse] {
    match dim {
        Dimension::Two => &PLANAR_RESPONSE,
        Dimension::Three => &SPATIAL_RESPONSE,
    }
}

/// Section force-deformation relation.
pub trait Section: Stateful + Send + Sync + Debug {
    fn tag(&self) -> Tag;

    fn class_name(&self) -> &'static str;

    /// Ordering of the deformation/resultant vectors.
    fn response_types(&self) -> &[SectionResponse];

    /// Number of resultants.
    fn order(&self) -> usize {
        self.response_types().len()
    }

    /// Set trial deformations and recompute resultants and tangent.
    ///
    /// # Errors
    ///
    /// [`Error::UpdateFailure`] if any constituent rejects its strain.
    fn set_trial_deformation(&mut self, deformation: &DVector<f64>) -> Result<()>;

    /// Trial deformations.
    fn deformation(&self) -> DVector<f64>;

    /// Trial stress resultants.
    fn stress_resultant(&self) -> DVector<f64>;

    /// Trial tangent stiffness.
    fn tangent(&self) -> DMatrix<f64>;

    /// Virgin tangent stiffness.
    fn initial_tangent(&self) -> DMatrix<f64>;

    /// Trial flexibility, the inverse of [`Section::tangent`].
    fn flexibility(&self) -> Result<DMatrix<f64>> {
        self.tangent().try_inverse().ok_or_else(|| {
            Error::update_failure(self.tag(), "section tangent is singular")
        })
    }

    /// Virgin flexibility.
    fn initial_flexibility(&self) -> Result<DMatrix<f64>> {
        self.initial_tangent().try_inverse().ok_or_else(|| {
            Error::InvalidSection(format!("section {} has a singular initial tangent", self.tag()))
        })
    }

    fn clone_box(&self) -> Box<dyn Section>;

    fn committed_snapshot(&self) -> Snapshot;

    fn restore_snapshot(&mut self, snapshot: &Snapshot) -> Result<()>;
}

impl Clone for Box<dyn Section> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Check a deformation vector against the section order.
pub(crate) fn check_deformation(tag: Tag, order: usize, deformation: &DVector<f64>) -> Result<()> {
    if deformation.len() != order {
        return Err(Error::update_failure(
            tag,
            format!(
                "section expects {} deformations, got {}",
                order,
                deformation.len()
            ),
        ));
    }
    if deformation.iter().any(|d| !d.is_finite()) {
        return Err(Error::update_failure(tag, "non-finite section deformation"));
    }
    Ok(())
}
