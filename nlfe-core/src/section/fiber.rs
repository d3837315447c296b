//! Fiber section.
//!
//! The cross-section is discretized into fibers, each with its own copy of a
//! uniaxial material. Plane sections remain plane: fiber strain is
//! `ε - ȳ κz + z̄ κy` where `ȳ, z̄` are measured from the area centroid.
//! Space sections add an uncoupled elastic torsional rigidity `GJ`.

use crate::error::{Error, Result};
use crate::material::UniaxialMaterial;
use crate::section::{check_deformation, frame_response, Section, SectionResponse};
use crate::state::{Snapshot, Stateful};
use crate::types::{Dimension, Tag};
use nalgebra::{DMatrix, DVector};

/// One fiber: location in the section's local (y, z) plane, area, and an
/// exclusively owned material.
#[derive(Debug, Clone)]
pub struct Fiber {
    pub y: f64,
    pub z: f64,
    pub area: f64,
    pub material: Box<dyn UniaxialMaterial>,
}

impl Fiber {
    pub fn new(y: f64, z: f64, area: f64, material: Box<dyn UniaxialMaterial>) -> Self {
        Self {
            y,
            z,
            area,
            material,
        }
    }

    /// Planar fiber at height `y`.
    pub fn planar(y: f64, area: f64, material: Box<dyn UniaxialMaterial>) -> Self {
        Self::new(y, 0.0, area, material)
    }
}

#[derive(Debug, Clone)]
pub struct FiberSection {
    tag: Tag,
    dim: Dimension,
    fibers: Vec<Fiber>,
    gj: Option<f64>,
    y_bar: f64,
    z_bar: f64,
    trial: DVector<f64>,
    committed: DVector<f64>,
    resultant: DVector<f64>,
    tangent: DMatrix<f64>,
}

impl FiberSection {
    /// Planar fiber section with response `[P, Mz]`.
    pub fn planar(tag: Tag, fibers: Vec<Fiber>) -> Result<Self> {
        Self::build(tag, Dimension::Two, fibers, None)
    }

    /// Space fiber section with response `[P, Mz, My, T]`.
    pub fn spatial(tag: Tag, fibers: Vec<Fiber>, gj: f64) -> Result<Self> {
        if !(gj > 0.0) {
            return Err(Error::InvalidSection(format!(
                "fiber section {tag} needs a positive torsional rigidity, got {gj}"
            )));
        }
        Self::build(tag, Dimension::Three, fibers, Some(gj))
    }

    fn build(tag: Tag, dim: Dimension, fibers: Vec<Fiber>, gj: Option<f64>) -> Result<Self> {
        if fibers.is_empty() {
            return Err(Error::InvalidSection(format!(
                "fiber section {tag} has no fibers"
            )));
        }
        if let Some(f) = fibers.iter().find(|f| !(f.area > 0.0)) {
            return Err(Error::InvalidSection(format!(
                "fiber section {tag} has a fiber with area {}",
                f.area
            )));
        }

        let area: f64 = fibers.iter().map(|f| f.area).sum();
        let y_bar = fibers.iter().map(|f| f.y * f.area).sum::<f64>() / area;
        let z_bar = match dim {
            Dimension::Two => 0.0,
            Dimension::Three => fibers.iter().map(|f| f.z * f.area).sum::<f64>() / area,
        };

        let order = frame_response(dim).len();
        let mut section = Self {
            tag,
            dim,
            fibers,
            gj,
            y_bar,
            z_bar,
            trial: DVector::zeros(order),
            committed: DVector::zeros(order),
            resultant: DVector::zeros(order),
            tangent: DMatrix::zeros(order, order),
        };
        section.form_response();
        Ok(section)
    }

    pub fn fibers(&self) -> &[Fiber] {
        &self.fibers
    }

    /// Area centroid `(ȳ, z̄)`.
    pub fn centroid(&self) -> (f64, f64) {
        (self.y_bar, self.z_bar)
    }

    /// Coefficients mapping section deformations to fiber strain.
    fn strain_map(&self, fiber: &Fiber) -> [f64; 3] {
        [1.0, -(fiber.y - self.y_bar), fiber.z - self.z_bar]
    }

    fn fiber_strain(&self, fiber: &Fiber, e: &DVector<f64>) -> f64 {
        let a = self.strain_map(fiber);
        match self.dim {
            Dimension::Two => a[0] * e[0] + a[1] * e[1],
            Dimension::Three => a[0] * e[0] + a[1] * e[1] + a[2] * e[2],
        }
    }

    /// Integrate resultants and tangent from the fibers' current trial state.
    fn form_response(&mut self) {
        let n_axial = match self.dim {
            Dimension::Two => 2,
            Dimension::Three => 3,
        };
        self.resultant.fill(0.0);
        self.tangent.fill(0.0);

        for fiber in &self.fibers {
            let a = self.strain_map(fiber);
            let force = fiber.material.stress() * fiber.area;
            let stiff = fiber.material.tangent() * fiber.area;
            for i in 0..n_axial {
                self.resultant[i] += a[i] * force;
                for j in 0..n_axial {
                    self.tangent[(i, j)] += a[i] * a[j] * stiff;
                }
            }
        }

        if let Some(gj) = self.gj {
            self.resultant[3] = gj * self.trial[3];
            self.tangent[(3, 3)] = gj;
        }
    }
}

impl Stateful for FiberSection {
    fn commit_state(&mut self) -> Result<()> {
        for fiber in &mut self.fibers {
            fiber.material.commit_state()?;
        }
        self.committed.copy_from(&self.trial);
        Ok(())
    }

    fn revert_to_last_commit(&mut self) -> Result<()> {
        for fiber in &mut self.fibers {
            fiber.material.revert_to_last_commit()?;
        }
        self.trial.copy_from(&self.committed);
        self.form_response();
        Ok(())
    }

    fn revert_to_start(&mut self) -> Result<()> {
        for fiber in &mut self.fibers {
            fiber.material.revert_to_start()?;
        }
        self.trial.fill(0.0);
        self.committed.fill(0.0);
        self.form_response();
        Ok(())
    }
}

impl Section for FiberSection {
    fn tag(&self) -> Tag {
        self.tag
    }

    fn class_name(&self) -> &'static str {
        "FiberSection"
    }

    fn response_types(&self) -> &[SectionResponse] {
        frame_response(self.dim)
    }

    fn set_trial_deformation(&mut self, deformation: &DVector<f64>) -> Result<()> {
        check_deformation(self.tag, self.order(), deformation)?;

        let strains: Vec<f64> = self
            .fibers
            .iter()
            .map(|f| self.fiber_strain(f, deformation))
            .collect();

        for i in 0..self.fibers.len() {
            if let Err(err) = self.fibers[i].material.set_trial_strain(strains[i]) {
                // Put the fibers already moved back on their previous trial strain
                let previous: Vec<f64> = self
                    .fibers
                    .iter()
                    .map(|f| self.fiber_strain(f, &self.trial))
                    .collect();
                for (fiber, strain) in self.fibers[..i].iter_mut().zip(previous) {
                    fiber.material.set_trial_strain(strain)?;
                }
                return Err(err);
            }
        }

        self.trial.copy_from(deformation);
        self.form_response();
        Ok(())
    }

    fn deformation(&self) -> DVector<f64> {
        self.trial.clone()
    }

    fn stress_resultant(&self) -> DVector<f64> {
        self.resultant.clone()
    }

    fn tangent(&self) -> DMatrix<f64> {
        self.tangent.clone()
    }

    fn initial_tangent(&self) -> DMatrix<f64> {
        let order = self.order();
        let n_axial = if self.gj.is_some() { 3 } else { 2 };
        let mut k = DMatrix::zeros(order, order);
        for fiber in &self.fibers {
            let a = self.strain_map(fiber);
            let stiff = fiber.material.initial_tangent() * fiber.area;
            for i in 0..n_axial {
                for j in 0..n_axial {
                    k[(i, j)] += a[i] * a[j] * stiff;
                }
            }
        }
        if let Some(gj) = self.gj {
            k[(3, 3)] = gj;
        }
        k
    }

    fn clone_box(&self) -> Box<dyn Section> {
        Box::new(self.clone())
    }

    fn committed_snapshot(&self) -> Snapshot {
        let children = self
            .fibers
            .iter()
            .map(|f| f.material.committed_snapshot())
            .collect();
        Snapshot::new(self.class_name(), self.tag, self.committed.iter().copied().collect())
            .with_children(children)
    }

    fn restore_snapshot(&mut self, snapshot: &Snapshot) -> Result<()> {
        snapshot.expect_shape(self.class_name(), self.order(), self.fibers.len())?;
        for (fiber, child) in self.fibers.iter_mut().zip(&snapshot.children) {
            fiber.material.restore_snapshot(child)?;
        }
        self.committed.copy_from_slice(&snapshot.data);
        self.trial.copy_from(&self.committed);
        self.form_response();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::{Elastic, ElasticPerfectlyPlastic};
    use approx::assert_relative_eq;

    /// Rectangle b x h split into `n` layers along y.
    fn layered(n: usize, b: f64, h: f64, material: &dyn UniaxialMaterial) -> Vec<Fiber> {
        let dy = h / n as f64;
        (0..n)
            .map(|i| {
                let y = -h / 2.0 + dy * (i as f64 + 0.5);
                Fiber::planar(y, b * dy, material.clone_box())
            })
            .collect()
    }

    #[test]
    fn test_elastic_rectangle_rigidities() {
        let mat = Elastic::new(1, 1000.0).unwrap();
        let sec = FiberSection::planar(1, layered(100, 2.0, 4.0, &mat)).unwrap();
        let k = sec.tangent();
        // EA = 1000 * 8, EI = 1000 * 2 * 4^3 / 12 (midpoint rule error ~ 1/n^2)
        assert_relative_eq!(k[(0, 0)], 8000.0, epsilon = 1e-9);
        assert_relative_eq!(k[(1, 1)], 1000.0 * 2.0 * 64.0 / 12.0, max_relative = 1e-3);
        assert_relative_eq!(k[(0, 1)], 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_positive_curvature_compresses_top() {
        let mat = Elastic::new(1, 1.0).unwrap();
        let fibers = vec![
            Fiber::planar(1.0, 1.0, mat.clone_box()),
            Fiber::planar(-1.0, 1.0, mat.clone_box()),
        ];
        let mut sec = FiberSection::planar(1, fibers).unwrap();
        sec.set_trial_deformation(&DVector::from_vec(vec![0.0, 0.5])).unwrap();
        assert_relative_eq!(sec.fibers()[0].material.strain(), -0.5);
        assert_relative_eq!(sec.fibers()[1].material.strain(), 0.5);
        // Mz = -Σ y σ A = -(1 * -0.5) - (-1 * 0.5) = 1
        assert_relative_eq!(sec.stress_resultant()[1], 1.0);
    }

    #[test]
    fn test_centroid_offset() {
        let mat = Elastic::new(1, 1.0).unwrap();
        let fibers = vec![
            Fiber::planar(3.0, 1.0, mat.clone_box()),
            Fiber::planar(1.0, 1.0, mat.clone_box()),
        ];
        let sec = FiberSection::planar(1, fibers).unwrap();
        assert_relative_eq!(sec.centroid().0, 2.0);
        assert_relative_eq!(sec.tangent()[(0, 1)], 0.0);
    }

    #[test]
    fn test_spatial_requires_torsion() {
        let mat = Elastic::new(1, 1.0).unwrap();
        let fibers = vec![Fiber::new(0.0, 0.0, 1.0, mat.clone_box())];
        assert!(FiberSection::spatial(1, fibers.clone(), 0.0).is_err());
        let sec = FiberSection::spatial(1, fibers, 5.0).unwrap();
        assert_eq!(sec.order(), 4);
        assert_relative_eq!(sec.tangent()[(3, 3)], 5.0);
    }

    #[test]
    fn test_yielding_and_revert() {
        let mat = ElasticPerfectlyPlastic::symmetric(1, 100.0, 1.0).unwrap();
        let mut sec = FiberSection::planar(1, layered(10, 1.0, 1.0, &mat)).unwrap();
        let k0 = sec.tangent();

        sec.set_trial_deformation(&DVector::from_vec(vec![0.05, 0.0])).unwrap();
        assert_relative_eq!(sec.stress_resultant()[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(sec.tangent()[(0, 0)], 0.0);

        sec.revert_to_last_commit().unwrap();
        assert_relative_eq!(sec.tangent()[(0, 0)], k0[(0, 0)]);
        assert_relative_eq!(sec.stress_resultant()[0], 0.0);
    }

    #[test]
    fn test_empty_section_rejected() {
        assert!(FiberSection::planar(1, Vec::new()).is_err());
    }
}
