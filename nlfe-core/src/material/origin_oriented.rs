//! Origin-oriented hysteretic material driven by two backbones.
//!
//! Loading beyond the largest previously reached strain on either side
//! follows that side's envelope. Unloading and reloading inside the
//! envelope run along the secant from the origin to the peak point of the
//! side currently loaded, so crossing zero aims straight at the opposite
//! peak.
//!
//! Strains past a backbone's [`Backbone::strain_limit`] are rejected as an
//! update failure rather than extrapolated.

use crate::backbone::Backbone;
use crate::error::{Error, Result};
use crate::material::{check_strain, UniaxialMaterial};
use crate::state::{Snapshot, Stateful};
use crate::types::Tag;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct HysteresisState {
    strain: f64,
    stress: f64,
    tangent: f64,
    /// Largest tensile strain reached (>= 0).
    peak_pos: f64,
    /// Largest compressive strain magnitude reached (>= 0).
    peak_neg: f64,
}

#[derive(Debug, Clone)]
pub struct OriginOriented {
    tag: Tag,
    positive: Arc<dyn Backbone>,
    negative: Arc<dyn Backbone>,
    trial: HysteresisState,
    committed: HysteresisState,
}

impl OriginOriented {
    /// Build from the tension and compression envelopes. Both envelopes are
    /// expressed with positive strain and stress.
    ///
    /// # Errors
    ///
    /// Returns error if either envelope has a non-positive initial tangent.
    pub fn new(tag: Tag, positive: Arc<dyn Backbone>, negative: Arc<dyn Backbone>) -> Result<Self> {
        for (side, bb) in [("positive", &positive), ("negative", &negative)] {
            if !(bb.tangent(0.0) > 0.0) {
                return Err(Error::InvalidMaterial(format!(
                    "{side} backbone {} must have a positive initial tangent",
                    bb.tag()
                )));
            }
        }
        let virgin = HysteresisState {
            tangent: positive.tangent(0.0),
            ..HysteresisState::default()
        };
        Ok(Self {
            tag,
            positive,
            negative,
            trial: virgin,
            committed: virgin,
        })
    }

    /// Same envelope in tension and compression.
    pub fn symmetric(tag: Tag, backbone: Arc<dyn Backbone>) -> Result<Self> {
        Self::new(tag, backbone.clone(), backbone)
    }

    /// Trial peak strains `(tension, compression magnitude)`.
    pub fn peaks(&self) -> (f64, f64) {
        (self.trial.peak_pos, self.trial.peak_neg)
    }

    /// Response on one side for strain magnitude `e >= 0` given the
    /// committed peak on that side. Returns (stress magnitude, tangent,
    /// new peak).
    fn side_response(&self, backbone: &dyn Backbone, e: f64, peak: f64) -> Result<(f64, f64, f64)> {
        if e > backbone.strain_limit() {
            return Err(Error::update_failure(
                self.tag,
                format!(
                    "strain magnitude {e} exceeds backbone {} limit {}",
                    backbone.tag(),
                    backbone.strain_limit()
                ),
            ));
        }
        if e >= peak {
            Ok((backbone.stress(e), backbone.tangent(e), e))
        } else {
            let secant = backbone.stress(peak) / peak;
            Ok((secant * e, secant, peak))
        }
    }
}

impl Stateful for OriginOriented {
    fn commit_state(&mut self) -> Result<()> {
        self.committed = self.trial;
        Ok(())
    }

    fn revert_to_last_commit(&mut self) -> Result<()> {
        self.trial = self.committed;
        Ok(())
    }

    fn revert_to_start(&mut self) -> Result<()> {
        self.trial = HysteresisState {
            tangent: self.positive.tangent(0.0),
            ..HysteresisState::default()
        };
        self.committed = self.trial;
        Ok(())
    }
}

impl UniaxialMaterial for OriginOriented {
    fn tag(&self) -> Tag {
        self.tag
    }

    fn class_name(&self) -> &'static str {
        "OriginOriented"
    }

    fn set_trial_strain(&mut self, strain: f64) -> Result<()> {
        check_strain(self.tag, strain)?;
        let c = self.committed;

        self.trial = if strain >= 0.0 {
            let (stress, tangent, peak) = self.side_response(self.positive.as_ref(), strain, c.peak_pos)?;
            HysteresisState {
                strain,
                stress,
                tangent,
                peak_pos: peak,
                peak_neg: c.peak_neg,
            }
        } else {
            let (stress, tangent, peak) = self.side_response(self.negative.as_ref(), -strain, c.peak_neg)?;
            HysteresisState {
                strain,
                stress: -stress,
                tangent,
                peak_pos: c.peak_pos,
                peak_neg: peak,
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
        self.positive.tangent(0.0)
    }

    fn clone_box(&self) -> Box<dyn UniaxialMaterial> {
        Box::new(self.clone())
    }

    fn committed_snapshot(&self) -> Snapshot {
        let c = &self.committed;
        Snapshot::new(
            self.class_name(),
            self.tag,
            vec![c.strain, c.stress, c.tangent, c.peak_pos, c.peak_neg],
        )
    }

    fn restore_snapshot(&mut self, snapshot: &Snapshot) -> Result<()> {
        snapshot.expect_shape(self.class_name(), 5, 0)?;
        let d = &snapshot.data;
        self.committed = HysteresisState {
            strain: d[0],
            stress: d[1],
            tangent: d[2],
            peak_pos: d[3],
            peak_neg: d[4],
        };
        self.trial = self.committed;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backbone::MultilinearBackbone;
    use approx::assert_relative_eq;

    fn material() -> OriginOriented {
        let bb: Arc<dyn Backbone> =
            Arc::new(MultilinearBackbone::new(10, &[(0.002, 400.0), (0.05, 500.0)]).unwrap());
        OriginOriented::symmetric(1, bb).unwrap()
    }

    #[test]
    fn test_virgin_loading_follows_envelope() {
        let mut mat = material();
        mat.set_trial_strain(0.001).unwrap();
        assert_relative_eq!(mat.stress(), 200.0, epsilon = 1e-9);
        assert_relative_eq!(mat.tangent(), 200e3, epsilon = 1e-6);
        mat.set_trial_strain(-0.001).unwrap();
        assert_relative_eq!(mat.stress(), -200.0, epsilon = 1e-9);
    }

    #[test]
    fn test_unloading_aims_at_origin() {
        let mut mat = material();
        mat.set_trial_strain(0.01).unwrap();
        mat.commit_state().unwrap();
        let peak_stress = mat.stress();

        mat.set_trial_strain(0.005).unwrap();
        assert_relative_eq!(mat.stress(), peak_stress * 0.5, epsilon = 1e-9);
        assert_relative_eq!(mat.tangent(), peak_stress / 0.01, epsilon = 1e-6);
        assert_eq!(mat.peaks(), (0.01, 0.0));
    }

    #[test]
    fn test_compression_side_keeps_tension_peak() {
        let mut mat = material();
        mat.set_trial_strain(0.01).unwrap();
        mat.commit_state().unwrap();
        mat.set_trial_strain(-0.003).unwrap();
        mat.commit_state().unwrap();
        assert_eq!(mat.peaks(), (0.01, 0.003));

        // Reloading in tension below the old peak stays on the secant
        mat.set_trial_strain(0.002).unwrap();
        let secant = mat.positive.stress(0.01) / 0.01;
        assert_relative_eq!(mat.stress(), secant * 0.002, epsilon = 1e-9);
    }

    #[test]
    fn test_strain_beyond_backbone_fails() {
        let mut mat = material();
        mat.set_trial_strain(0.01).unwrap();
        let err = mat.set_trial_strain(0.06).unwrap_err();
        assert!(matches!(err, Error::UpdateFailure { tag: 1, .. }));
        // Trial state untouched by the failed call
        assert_relative_eq!(mat.strain(), 0.01);
    }

    #[test]
    fn test_revert_to_start_clears_peaks() {
        let mut mat = material();
        mat.set_trial_strain(0.02).unwrap();
        mat.commit_state().unwrap();
        mat.revert_to_start().unwrap();
        assert_eq!(mat.peaks(), (0.0, 0.0));
        assert_relative_eq!(mat.tangent(), mat.initial_tangent());
    }
}
