//! Element trait and implementations.
//!
//! Every element follows the same state machine. The driver sets trial
//! nodal displacements, calls [`Element::update`] to recompute the trial
//! state, reads tangent and resisting force, and on convergence commits:
//!
//! ```text
//! Initial --update--> Trial --commit_state--> Committed
//!    ^                  |                        |
//!    +--revert (never   +--revert_to_last_commit-+
//!        committed)
//! ```
//!
//! `revert_to_start` returns to `Initial` from anywhere. Commit and revert
//! cascade to every owned section, material and transform.
//!
//! # Submodules
//!
//! - [`gauss`] - quadrature rules for integration along the member
//! - [`beam`] - integration schemes, interpolation and member loads
//! - [`truss`] - two-node axial bar
//! - [`disp_beam`] - displacement-based beam-column
//! - [`force_beam`] - force-based beam-column

use crate::error::{Error, Result};
use crate::state::{Phase, Snapshot, Stateful};
use crate::types::Tag;
use nalgebra::{DMatrix, DVector};
use std::fmt::{self, Debug};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub mod beam;
pub mod disp_beam;
pub mod force_beam;
pub mod gauss;
pub mod truss;

pub use beam::BeamIntegration;
pub use disp_beam::DispBeamColumn;
pub use force_beam::{ForceBeamColumn, ForceBeamConfig};
pub use gauss::{gauss_legendre, gauss_lobatto};
pub use truss::Truss;

/// Load applied along a beam-column, in the member's local frame.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ElementLoad {
    /// Distributed load per unit length: transverse `wy`, `wz`, axial `wx`.
    BeamUniform { wy: f64, wz: f64, wx: f64 },
    /// Concentrated load at `a_over_l` of the length from end i.
    BeamPoint {
        py: f64,
        pz: f64,
        px: f64,
        a_over_l: f64,
    },
}

impl fmt::Display for ElementLoad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BeamUniform { .. } => f.write_str("beamUniform"),
            Self::BeamPoint { .. } => f.write_str("beamPoint"),
        }
    }
}

/// Finite element interface.
///
/// Elements must be thread-safe (Send + Sync) so the model can update them
/// in parallel. All matrix and vector outputs are in global coordinates,
/// ordered node by node with `dofs_per_node` entries each.
pub trait Element: Stateful + Send + Sync + Debug {
    fn tag(&self) -> Tag;

    fn class_name(&self) -> &'static str;

    /// Connected node tags, in element order.
    fn nodes(&self) -> &[Tag];

    /// Number of nodes in this element.
    fn n_nodes(&self) -> usize {
        self.nodes().len()
    }

    /// Degrees of freedom per node.
    fn dofs_per_node(&self) -> usize;

    /// Total degrees of freedom for this element.
    fn n_dofs(&self) -> usize {
        self.n_nodes() * self.dofs_per_node()
    }

    /// Current lifecycle phase.
    fn phase(&self) -> Phase;

    /// Store trial nodal displacements. Takes effect on the next
    /// [`Element::update`].
    ///
    /// # Errors
    ///
    /// Returns error if the vector length is not [`Element::n_dofs`].
    fn set_trial_displacement(&mut self, ug: &DVector<f64>) -> Result<()>;

    /// Store trial nodal accelerations used by
    /// [`Element::resisting_force_inc_inertia`].
    fn set_trial_acceleration(&mut self, ag: &DVector<f64>) -> Result<()>;

    /// Trial nodal accelerations.
    fn trial_acceleration(&self) -> &DVector<f64>;

    /// Nodal displacements at the last commit.
    fn committed_displacement(&self) -> &DVector<f64>;

    /// Recompute the trial state from the current trial displacements.
    ///
    /// Calling it twice with unchanged input gives identical results.
    ///
    /// # Errors
    ///
    /// [`Error::UpdateFailure`] if a material, section or the transform
    /// rejects the trial state.
    fn update(&mut self) -> Result<()>;

    /// Trial tangent stiffness.
    fn tangent_stiff(&self) -> DMatrix<f64>;

    /// Stiffness of the virgin element in the reference configuration.
    fn initial_stiff(&self) -> DMatrix<f64>;

    fn mass(&self) -> DMatrix<f64>;

    /// Trial internal force minus applied element loads.
    fn resisting_force(&self) -> DVector<f64>;

    /// [`Element::resisting_force`] plus inertia `M a`.
    fn resisting_force_inc_inertia(&self) -> DVector<f64> {
        self.resisting_force() + self.mass() * self.trial_acceleration()
    }

    /// Add `factor` times `load` to the applied element loads.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedLoad`] if the element takes no such load.
    fn add_load(&mut self, load: &ElementLoad, factor: f64) -> Result<()>;

    /// Remove all applied element loads.
    fn zero_load(&mut self);

    /// Committed state, including owned sub-objects as children.
    fn committed_snapshot(&self) -> Snapshot;

    /// Restore committed and trial state from a snapshot taken on an
    /// equivalent element.
    fn restore_snapshot(&mut self, snapshot: &Snapshot) -> Result<()>;
}

/// Trial and committed nodal motion held by every element.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct NodalMotion {
    pub disp: DVector<f64>,
    pub committed_disp: DVector<f64>,
    pub accel: DVector<f64>,
}

impl NodalMotion {
    pub fn new(n_dofs: usize) -> Self {
        Self {
            disp: DVector::zeros(n_dofs),
            committed_disp: DVector::zeros(n_dofs),
            accel: DVector::zeros(n_dofs),
        }
    }

    fn check(&self, tag: Tag, v: &DVector<f64>) -> Result<()> {
        if v.len() != self.disp.len() {
            return Err(Error::update_failure(
                tag,
                format!("element expects {} nodal values, got {}", self.disp.len(), v.len()),
            ));
        }
        Ok(())
    }

    pub fn set_disp(&mut self, tag: Tag, ug: &DVector<f64>) -> Result<()> {
        self.check(tag, ug)?;
        self.disp.copy_from(ug);
        Ok(())
    }

    pub fn set_accel(&mut self, tag: Tag, ag: &DVector<f64>) -> Result<()> {
        self.check(tag, ag)?;
        self.accel.copy_from(ag);
        Ok(())
    }

    pub fn commit(&mut self) {
        self.committed_disp.copy_from(&self.disp);
    }

    pub fn revert(&mut self) {
        self.disp.copy_from(&self.committed_disp);
    }

    pub fn reset(&mut self) {
        self.disp.fill(0.0);
        self.committed_disp.fill(0.0);
        self.accel.fill(0.0);
    }

    /// Restore committed and trial displacements from a slice.
    pub fn restore(&mut self, committed: &[f64]) {
        self.committed_disp.copy_from_slice(committed);
        self.disp.copy_from(&self.committed_disp);
    }
}

/// Error for a load the element cannot take.
pub(crate) fn unsupported_load(class_name: &'static str, load: &ElementLoad) -> Error {
    Error::UnsupportedLoad {
        class_name,
        load: load.to_string(),
    }
}
