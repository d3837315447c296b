//! Linear elastic uniaxial material.

use crate::error::{Error, Result};
use crate::material::{check_strain, UniaxialMaterial};
use crate::state::{Snapshot, Stateful};
use crate::types::Tag;

/// σ = E ε.
#[derive(Debug, Clone, PartialEq)]
pub struct Elastic {
    tag: Tag,
    e: f64,
    trial_strain: f64,
    committed_strain: f64,
}

impl Elastic {
    /// Create an elastic material with modulus `e`.
    ///
    /// # Errors
    ///
    /// Returns error if `e` is not positive.
    pub fn new(tag: Tag, e: f64) -> Result<Self> {
        if !(e > 0.0) {
            return Err(Error::InvalidMaterial(format!(
                "elastic modulus must be positive, got {e}"
            )));
        }
        Ok(Self {
            tag,
            e,
            trial_strain: 0.0,
            committed_strain: 0.0,
        })
    }

    pub fn modulus(&self) -> f64 {
        self.e
    }
}

impl Stateful for Elastic {
    fn commit_state(&mut self) -> Result<()> {
        self.committed_strain = self.trial_strain;
        Ok(())
    }

    fn revert_to_last_commit(&mut self) -> Result<()> {
        self.trial_strain = self.committed_strain;
        Ok(())
    }

    fn revert_to_start(&mut self) -> Result<()> {
        self.trial_strain = 0.0;
        self.committed_strain = 0.0;
        Ok(())
    }
}

impl UniaxialMaterial for Elastic {
    fn tag(&self) -> Tag {
        self.tag
    }

    fn class_name(&self) -> &'static str {
        "Elastic"
    }

    fn set_trial_strain(&mut self, strain: f64) -> Result<()> {
        check_strain(self.tag, strain)?;
        self.trial_strain = strain;
        Ok(())
    }

    fn strain(&self) -> f64 {
        self.trial_strain
    }

    fn stress(&self) -> f64 {
        self.e * self.trial_strain
    }

    fn tangent(&self) -> f64 {
        self.e
    }

    fn initial_tangent(&self) -> f64 {
        self.e
    }

    fn clone_box(&self) -> Box<dyn UniaxialMaterial> {
        Box::new(self.clone())
    }

    fn committed_snapshot(&self) -> Snapshot {
        Snapshot::new(self.class_name(), self.tag, vec![self.committed_strain])
    }

    fn restore_snapshot(&mut self, snapshot: &Snapshot) -> Result<()> {
        snapshot.expect_shape(self.class_name(), 1, 0)?;
        self.committed_strain = snapshot.data[0];
        self.trial_strain = self.committed_strain;
        Ok(())
    }
}
