//! Elastic-perfectly plastic uniaxial material.
//!
//! Stress is capped at `fy_pos` in tension and `fy_neg` in compression.
//! The only history variable is the plastic strain.

use crate::error::{Error, Result};
use crate::material::{check_strain, UniaxialMaterial};
use crate::state::{Snapshot, Stateful};
use crate::types::Tag;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct PlasticState {
    strain: f64,
    stress: f64,
    tangent: f64,
    plastic_strain: f64,
}

/// Elastic-perfectly plastic material with independent yield stresses.
#[derive(Debug, Clone, PartialEq)]
pub struct ElasticPerfectlyPlastic {
    tag: Tag,
    e: f64,
    fy_pos: f64,
    fy_neg: f64,
    trial: PlasticState,
    committed: PlasticState,
}

impl ElasticPerfectlyPlastic {
    /// # Errors
    ///
    /// Returns error unless `e > 0`, `fy_pos > 0` and `fy_neg < 0`.
    pub fn new(tag: Tag, e: f64, fy_pos: f64, fy_neg: f64) -> Result<Self> {
        if !(e > 0.0) {
            return Err(Error::InvalidMaterial(format!(
                "elastic modulus must be positive, got {e}"
            )));
        }
        if !(fy_pos > 0.0) || !(fy_neg < 0.0) {
            return Err(Error::InvalidMaterial(format!(
                "yield stresses must satisfy fy_neg < 0 < fy_pos, got ({fy_neg}, {fy_pos})"
            )));
        }
        let virgin = PlasticState {
            tangent: e,
            ..PlasticState::default()
        };
        Ok(Self {
            tag,
            e,
            fy_pos,
            fy_neg,
            trial: virgin,
            committed: virgin,
        })
    }

    /// Symmetric yield stress `fy` in tension and compression.
    pub fn symmetric(tag: Tag, e: f64, fy: f64) -> Result<Self> {
        Self::new(tag, e, fy, -fy)
    }

    /// Trial plastic strain.
    pub fn plastic_strain(&self) -> f64 {
        self.trial.plastic_strain
    }

    fn virgin(&self) -> PlasticState {
        PlasticState {
            tangent: self.e,
            ..PlasticState::default()
        }
    }
}

impl Stateful for ElasticPerfectlyPlastic {
    fn commit_state(&mut self) -> Result<()> {
        self.committed = self.trial;
        Ok(())
    }

    fn revert_to_last_commit(&mut self) -> Result<()> {
        self.trial = self.committed;
        Ok(())
    }

    fn revert_to_start(&mut self) -> Result<()> {
        self.trial = self.virgin();
        self.committed = self.trial;
        Ok(())
    }
}

impl UniaxialMaterial for ElasticPerfectlyPlastic {
    fn tag(&self) -> Tag {
        self.tag
    }

    fn class_name(&self) -> &'static str {
        "ElasticPP"
    }

    fn set_trial_strain(&mut self, strain: f64) -> Result<()> {
        check_strain(self.tag, strain)?;

        let ep = self.committed.plastic_strain;
        let elastic_stress = self.e * (strain - ep);

        self.trial = if elastic_stress > self.fy_pos {
            PlasticState {
                strain,
                stress: self.fy_pos,
                tangent: 0.0,
                plastic_strain: strain - self.fy_pos / self.e,
            }
        } else if elastic_stress < self.fy_neg {
            PlasticState {
                strain,
                stress: self.fy_neg,
                tangent: 0.0,
                plastic_strain: strain - self.fy_neg / self.e,
            }
        } else {
            PlasticState {
                strain,
                stress: elastic_stress,
                tangent: self.e,
                plastic_strain: ep,
            }
        };
        Ok(())
    }

    fn strain(&self) -> f64 {
        self.trial.strain
    }

    fn stress(&self) -> f64 {
        self.trial.stress
    }

    fn tangent(&self) -> f64 {
        self.trial.tangent
    }

    fn initial_tangent(&self) -> f64 {
        self.e
    }

    fn clone_box(&self) -> Box<dyn UniaxialMaterial> {
        Box::new(self.clone())
    }

    fn committed_snapshot(&self) -> Snapshot {
        let c = &self.committed;
        Snapshot::new(
            self.class_name(),
            self.tag,
            vec![c.strain, c.stress, c.tangent, c.plastic_strain],
        )
    }

    fn restore_snapshot(&mut self, snapshot: &Snapshot) -> Result<()> {
        snapshot.expect_shape(self.class_name(), 4, 0)?;
        let d = &snapshot.data;
        self.committed = PlasticState {
            strain: d[0],
            stress: d[1],
            tangent: d[2],
            plastic_strain: d[3],
        };
        self.trial = self.committed;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn steel() -> ElasticPerfectlyPlastic {
        ElasticPerfectlyPlastic::symmetric(1, 200e3, 400.0).unwrap()
    }

    #[test]
    fn test_elastic_branch() {
        let mut mat = steel();
        mat.set_trial_strain(1e-3).unwrap();
        assert_relative_eq!(mat.stress(), 200.0, epsilon = 1e-9);
        assert_relative_eq!(mat.tangent(), 200e3);
    }

    #[test]
    fn test_yield_and_unload() {
        let mut mat = steel();
        mat.set_trial_strain(0.01).unwrap();
        assert_relative_eq!(mat.stress(), 400.0);
        assert_relative_eq!(mat.tangent(), 0.0);
        assert_relative_eq!(mat.plastic_strain(), 0.01 - 0.002, epsilon = 1e-12);
        mat.commit_state().unwrap();

        // Unload elastically from the plastic offset
        mat.set_trial_strain(0.009).unwrap();
        assert_relative_eq!(mat.stress(), 400.0 - 200e3 * 0.001, epsilon = 1e-9);
        assert_relative_eq!(mat.tangent(), 200e3);
    }

    #[test]
    fn test_compression_yield() {
        let mut mat = ElasticPerfectlyPlastic::new(1, 100.0, 2.0, -1.0).unwrap();
        mat.set_trial_strain(-0.05).unwrap();
        assert_relative_eq!(mat.stress(), -1.0);
    }

    #[test]
    fn test_trial_derives_from_committed() {
        let mut mat = steel();
        mat.set_trial_strain(0.01).unwrap();
        // Not committed: a new trial starts from the virgin state again
        mat.set_trial_strain(0.001).unwrap();
        assert_relative_eq!(mat.stress(), 200.0, epsilon = 1e-9);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(ElasticPerfectlyPlastic::new(1, 0.0, 1.0, -1.0).is_err());
        assert!(ElasticPerfectlyPlastic::new(1, 1.0, -1.0, -1.0).is_err());
        assert!(ElasticPerfectlyPlastic::new(1, 1.0, 1.0, 1.0).is_err());
    }

    #[test]
    fn test_snapshot_restores_history() {
        let mut mat = steel();
        mat.set_trial_strain(0.02).unwrap();
        mat.commit_state().unwrap();
        let snap = mat.committed_snapshot();

        let mut fresh = steel();
        fresh.restore_snapshot(&snap).unwrap();
        fresh.set_trial_strain(0.019).unwrap();
        mat.set_trial_strain(0.019).unwrap();
        assert_relative_eq!(fresh.stress(), mat.stress());
        assert_relative_eq!(fresh.plastic_strain(), mat.plastic_strain());
    }
}
