//! Uniaxial material interface and implementations.
//!
//! A uniaxial material maps a trial strain to stress and tangent, keeps a
//! committed history, and can be deep-copied so that every element or fiber
//! retrieving it from the registry evolves independently.
//!
//! # Submodules
//!
//! - [`elastic`] - linear elastic
//! - [`elastic_pp`] - elastic-perfectly plastic
//! - [`origin_oriented`] - backbone-driven origin-oriented hysteresis

use crate::error::{Error, Result};
use crate::state::{Snapshot, Stateful};
use crate::types::Tag;
use std::fmt::Debug;

pub mod elastic;
pub mod elastic_pp;
pub mod origin_oriented;

pub use elastic::Elastic;
pub use elastic_pp::ElasticPerfectlyPlastic;
pub use origin_oriented::OriginOriented;

/// Stress-strain relation of a single fiber or spring.
pub trait UniaxialMaterial: Stateful + Send + Sync + Debug {
    /// Registry tag.
    fn tag(&self) -> Tag;

    /// Type identifier, stable across versions.
    fn class_name(&self) -> &'static str;

    /// Set the trial strain and recompute trial stress and tangent.
    ///
    /// # Errors
    ///
    /// [`Error::UpdateFailure`] if the strain is non-finite or outside the
    /// material's domain of validity. Trial state is left unchanged.
    fn set_trial_strain(&mut self, strain: f64) -> Result<()>;

    /// Trial strain.
    fn strain(&self) -> f64;

    /// Trial stress.
    fn stress(&self) -> f64;

    /// Trial tangent modulus.
    fn tangent(&self) -> f64;

    /// Tangent modulus of the virgin material.
    fn initial_tangent(&self) -> f64;

    /// Deep copy, including trial and committed history.
    fn clone_box(&self) -> Box<dyn UniaxialMaterial>;

    /// Committed state for external persistence.
    fn committed_snapshot(&self) -> Snapshot;

    /// Restore committed (and trial) state from a snapshot.
    fn restore_snapshot(&mut self, snapshot: &Snapshot) -> Result<()>;
}

impl Clone for Box<dyn UniaxialMaterial> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Reject NaN and infinite strains before they reach any constitutive law.
pub(crate) fn check_strain(tag: Tag, strain: f64) -> Result<()> {
    if strain.is_finite() {
        Ok(())
    } else {
        Err(Error::update_failure(
            tag,
            format!("non-finite trial strain {strain}"),
        ))
    }
}
