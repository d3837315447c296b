//! Linear elastic beam section with uncoupled axial, flexural and torsional
//! rigidities.

use crate::error::{Error, Result};
use crate::section::{check_deformation, frame_response, Section, SectionResponse};
use crate::state::{Snapshot, Stateful};
use crate::types::{Dimension, Tag};
use nalgebra::{DMatrix, DVector};

#[derive(Debug, Clone, PartialEq)]
pub struct ElasticSection {
    tag: Tag,
    dim: Dimension,
    /// Diagonal rigidities in response order: EA, EIz[, EIy, GJ].
    rigidity: Vec<f64>,
    trial: DVector<f64>,
    committed: DVector<f64>,
}

impl ElasticSection {
    /// Planar section: `[P, Mz]`.
    pub fn planar(tag: Tag, e: f64, area: f64, iz: f64) -> Result<Self> {
        Self::build(tag, Dimension::Two, vec![e * area, e * iz])
    }

    /// Space section: `[P, Mz, My, T]`.
    pub fn spatial(tag: Tag, e: f64, area: f64, iz: f64, iy: f64, g: f64, j: f64) -> Result<Self> {
        Self::build(
            tag,
            Dimension::Three,
            vec![e * area, e * iz, e * iy, g * j],
        )
    }

    fn build(tag: Tag, dim: Dimension, rigidity: Vec<f64>) -> Result<Self> {
        if rigidity.iter().any(|k| !(*k > 0.0)) {
            return Err(Error::InvalidSection(format!(
                "elastic section {tag} needs positive rigidities, got {rigidity:?}"
            )));
        }
        let n = rigidity.len();
        Ok(Self {
            tag,
            dim,
            rigidity,
            trial: DVector::zeros(n),
            committed: DVector::zeros(n),
        })
    }

    pub fn dimension(&self) -> Dimension {
        self.dim
    }
}

impl Stateful for ElasticSection {
    fn commit_state(&mut self) -> Result<()> {
        self.committed.copy_from(&self.trial);
        Ok(())
    }

    fn revert_to_last_commit(&mut self) -> Result<()> {
        self.trial.copy_from(&self.committed);
        Ok(())
    }

    fn revert_to_start(&mut self) -> Result<()> {
        self.trial.fill(0.0);
        self.committed.fill(0.0);
        Ok(())
    }
}

impl Section for ElasticSection {
    fn tag(&self) -> Tag {
        self.tag
    }

    fn class_name(&self) -> &'static str {
        "ElasticSection"
    }

    fn response_types(&self) -> &[SectionResponse] {
        frame_response(self.dim)
    }

    fn set_trial_deformation(&mut self, deformation: &DVector<f64>) -> Result<()> {
        check_deformation(self.tag, self.order(), deformation)?;
        self.trial.copy_from(deformation);
        Ok(())
    }

    fn deformation(&self) -> DVector<f64> {
        self.trial.clone()
    }

    fn stress_resultant(&self) -> DVector<f64> {
        DVector::from_iterator(
            self.rigidity.len(),
            self.rigidity.iter().zip(self.trial.iter()).map(|(k, e)| k * e),
        )
    }

    fn tangent(&self) -> DMatrix<f64> {
        DMatrix::from_diagonal(&DVector::from_column_slice(&self.rigidity))
    }

    fn initial_tangent(&self) -> DMatrix<f64> {
        self.tangent()
    }

    fn flexibility(&self) -> Result<DMatrix<f64>> {
        let inv: Vec<f64> = self.rigidity.iter().map(|k| 1.0 / k).collect();
        Ok(DMatrix::from_diagonal(&DVector::from_vec(inv)))
    }

    fn clone_box(&self) -> Box<dyn Section> {
        Box::new(self.clone())
    }

    fn committed_snapshot(&self) -> Snapshot {
        Snapshot::new(self.class_name(), self.tag, self.committed.iter().copied().collect())
    }

    fn restore_snapshot(&mut self, snapshot: &Snapshot) -> Result<()> {
        snapshot.expect_shape(self.class_name(), self.order(), 0)?;
        self.committed.copy_from_slice(&snapshot.data);
        self.trial.copy_from(&self.committed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_spatial_resultants() {
        let mut sec = ElasticSection::spatial(1, 10.0, 2.0, 3.0, 4.0, 5.0, 6.0).unwrap();
        assert_eq!(sec.order(), 4);
        sec.set_trial_deformation(&DVector::from_vec(vec![1.0, 1.0, 1.0, 1.0]))
            .unwrap();
        let s = sec.stress_resultant();
        assert_relative_eq!(s[0], 20.0);
        assert_relative_eq!(s[1], 30.0);
        assert_relative_eq!(s[2], 40.0);
        assert_relative_eq!(s[3], 30.0);
    }

    #[test]
    fn test_wrong_order_rejected() {
        let mut sec = ElasticSection::planar(1, 10.0, 1.0, 1.0).unwrap();
        assert!(sec
            .set_trial_deformation(&DVector::from_vec(vec![0.0, 0.0, 0.0]))
            .is_err());
    }

    #[test]
    fn test_invalid_rigidity() {
        assert!(ElasticSection::planar(1, 10.0, 0.0, 1.0).is_err());
    }

    #[test]
    fn test_commit_and_revert() {
        let mut sec = ElasticSection::planar(1, 1.0, 1.0, 1.0).unwrap();
        sec.set_trial_deformation(&DVector::from_vec(vec![0.1, 0.2])).unwrap();
        sec.commit_state().unwrap();
        sec.set_trial_deformation(&DVector::from_vec(vec![0.5, 0.5])).unwrap();
        sec.revert_to_last_commit().unwrap();
        assert_relative_eq!(sec.deformation()[1], 0.2);
    }
}
