//! Linear and P-Delta frame transforms.
//!
//! Both work in the reference configuration: `v = T_bl T_lg T_off ug`.
//! P-Delta adds the local geometric stiffness `N/L` on the transverse
//! translations and the matching `N Δ/L` shear couple to the resisting
//! force.

use crate::error::Result;
use crate::state::{Snapshot, Stateful};
use crate::transform::geometry::{
    basic_matrix, offset_matrix, pdelta_matrix, place_reactions, rotation_matrix, FrameGeometry,
};
use crate::transform::{check_displacement, FrameTransform};
use crate::types::{Dimension, Tag};
use nalgebra::{DMatrix, DVector, Matrix3};

#[derive(Debug, Clone)]
pub struct LinearTransform {
    tag: Tag,
    geom: FrameGeometry,
    pdelta: bool,
    /// Global to local: `T_lg T_off`.
    to_local: DMatrix<f64>,
    /// Local to basic: `T_bl`.
    to_basic: DMatrix<f64>,
    trial_ug: DVector<f64>,
    committed_ug: DVector<f64>,
}

impl LinearTransform {
    pub(crate) fn new(tag: Tag, geom: FrameGeometry, pdelta: bool) -> Self {
        let to_local = rotation_matrix(geom.dim, &geom.axes) * offset_matrix(geom.dim, &geom.oi, &geom.oj);
        let to_basic = basic_matrix(geom.dim, geom.l0);
        let n = geom.n_dof();
        Self {
            tag,
            geom,
            pdelta,
            to_local,
            to_basic,
            trial_ug: DVector::zeros(n),
            committed_ug: DVector::zeros(n),
        }
    }

    /// Displacements of the member ends in local coordinates.
    pub fn local_disp(&self) -> DVector<f64> {
        &self.to_local * &self.trial_ug
    }

    fn compatibility(&self) -> DMatrix<f64> {
        &self.to_basic * &self.to_local
    }
}

impl Stateful for LinearTransform {
    fn commit_state(&mut self) -> Result<()> {
        self.committed_ug.copy_from(&self.trial_ug);
        Ok(())
    }

    fn revert_to_last_commit(&mut self) -> Result<()> {
        self.trial_ug.copy_from(&self.committed_ug);
        Ok(())
    }

    fn revert_to_start(&mut self) -> Result<()> {
        self.trial_ug.fill(0.0);
        self.committed_ug.fill(0.0);
        Ok(())
    }
}

impl FrameTransform for LinearTransform {
    fn tag(&self) -> Tag {
        self.tag
    }

    fn class_name(&self) -> &'static str {
        match (self.pdelta, self.geom.dim) {
            (false, Dimension::Two) => "LinearCrdTransf2d",
            (false, Dimension::Three) => "LinearCrdTransf3d",
            (true, Dimension::Two) => "PDeltaCrdTransf2d",
            (true, Dimension::Three) => "PDeltaCrdTransf3d",
        }
    }

    fn dimension(&self) -> Dimension {
        self.geom.dim
    }

    fn initial_length(&self) -> f64 {
        self.geom.l0
    }

    fn deformed_length(&self) -> f64 {
        self.geom.l0
    }

    fn local_axes(&self) -> Matrix3<f64> {
        self.geom.axes
    }

    fn update(&mut self, ug: &DVector<f64>) -> Result<()> {
        check_displacement(self.tag, self.geom.ndf(), ug)?;
        self.trial_ug.copy_from(ug);
        Ok(())
    }

    fn basic_trial_disp(&self) -> DVector<f64> {
        &self.to_basic * self.local_disp()
    }

    fn global_resisting_force(&self, q: &DVector<f64>, p0: &DVector<f64>) -> DVector<f64> {
        let mut pl = self.to_basic.tr_mul(q) + place_reactions(self.geom.dim, p0);
        if self.pdelta {
            let kg = pdelta_matrix(self.geom.dim, q[0] / self.geom.l0);
            pl += kg * self.local_disp();
        }
        self.to_local.tr_mul(&pl)
    }

    fn global_stiff(&self, kb: &DMatrix<f64>, q: &DVector<f64>) -> DMatrix<f64> {
        let mut kg = self.global_initial_stiff(kb);
        if self.pdelta {
            let kl = pdelta_matrix(self.geom.dim, q[0] / self.geom.l0);
            kg += self.to_local.tr_mul(&(kl * &self.to_local));
        }
        kg
    }

    fn global_initial_stiff(&self, kb: &DMatrix<f64>) -> DMatrix<f64> {
        let a = self.compatibility();
        a.tr_mul(&(kb * &a))
    }

    fn committed_snapshot(&self) -> Snapshot {
        Snapshot::new(self.class_name(), self.tag, self.committed_ug.iter().copied().collect())
    }

    fn restore_snapshot(&mut self, snapshot: &Snapshot) -> Result<()> {
        snapshot.expect_shape(self.class_name(), self.geom.n_dof(), 0)?;
        self.committed_ug.copy_from_slice(&snapshot.data);
        self.trial_ug.copy_from(&self.committed_ug);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{GeomTransf, TransformKind};
    use crate::types::{Point3, Vec3};
    use approx::assert_relative_eq;

    fn planar(kind: TransformKind, xj: Point3) -> Box<dyn FrameTransform> {
        GeomTransf::planar(1, kind)
            .instantiate(Point3::zeros(), xj)
            .unwrap()
    }

    #[test]
    fn test_unit_axial_translation() {
        let mut t = planar(TransformKind::Linear, Point3::new(3.0, 4.0, 0.0));
        // Node j moves one unit along the member axis
        let ug = DVector::from_vec(vec![0.0, 0.0, 0.0, 0.6, 0.8, 0.0]);
        t.update(&ug).unwrap();
        let v = t.basic_trial_disp();
        assert_relative_eq!(v[0], 1.0, epsilon = 1e-14);
        assert_relative_eq!(v[1], 0.0, epsilon = 1e-14);
        assert_relative_eq!(v[2], 0.0, epsilon = 1e-14);
    }

    #[test]
    fn test_unit_axial_translation_3d() {
        let mut t = GeomTransf::spatial(1, TransformKind::Linear, Vec3::z())
            .unwrap()
            .instantiate(Point3::zeros(), Point3::new(0.0, 2.0, 0.0))
            .unwrap();
        let mut ug = DVector::zeros(12);
        ug[7] = 1.0;
        t.update(&ug).unwrap();
        let v = t.basic_trial_disp();
        assert_relative_eq!(v[0], 1.0, epsilon = 1e-14);
        for i in 1..6 {
            assert_relative_eq!(v[i], 0.0, epsilon = 1e-14);
        }
    }

    #[test]
    fn test_cantilever_stiffness() {
        // Basic stiffness of an elastic beam, EA = 10, EI = 3, L = 2
        let (ea, ei, l) = (10.0, 3.0, 2.0);
        let kb = DMatrix::from_row_slice(
            3,
            3,
            &[
                ea / l, 0.0, 0.0,
                0.0, 4.0 * ei / l, 2.0 * ei / l,
                0.0, 2.0 * ei / l, 4.0 * ei / l,
            ],
        );
        let t = planar(TransformKind::Linear, Point3::new(l, 0.0, 0.0));
        let k = t.global_initial_stiff(&kb);
        assert_relative_eq!(k[(3, 3)], ea / l, epsilon = 1e-12);
        assert_relative_eq!(k[(4, 4)], 12.0 * ei / l.powi(3), epsilon = 1e-12);
        assert_relative_eq!(k[(4, 5)], -6.0 * ei / l.powi(2), epsilon = 1e-12);
        assert_relative_eq!(k[(5, 5)], 4.0 * ei / l, epsilon = 1e-12);
        // Symmetric
        assert_relative_eq!((&k - k.transpose()).norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_pdelta_geometric_stiffness() {
        let l = 5.0;
        let kb = DMatrix::zeros(3, 3);
        let q = DVector::from_vec(vec![-10.0, 0.0, 0.0]);
        let lin = planar(TransformKind::Linear, Point3::new(l, 0.0, 0.0));
        let pd = planar(TransformKind::PDelta, Point3::new(l, 0.0, 0.0));

        assert_relative_eq!(lin.global_stiff(&kb, &q)[(1, 1)], 0.0);
        let k = pd.global_stiff(&kb, &q);
        assert_relative_eq!(k[(1, 1)], -2.0, epsilon = 1e-14);
        assert_relative_eq!(k[(1, 4)], 2.0, epsilon = 1e-14);
        assert_relative_eq!(k[(0, 0)], 0.0);
    }

    #[test]
    fn test_pdelta_force_matches_stiffness() {
        let l = 4.0;
        let mut t = planar(TransformKind::PDelta, Point3::new(l, 0.0, 0.0));
        let ug = DVector::from_vec(vec![0.0, 0.0, 0.0, 0.0, 0.1, 0.0]);
        t.update(&ug).unwrap();
        let q = DVector::from_vec(vec![8.0, 0.0, 0.0]);
        let p = t.global_resisting_force(&q, &DVector::zeros(0));
        // Shear couple N * Δ / L at both ends
        assert_relative_eq!(p[1], -0.2, epsilon = 1e-14);
        assert_relative_eq!(p[4], 0.2, epsilon = 1e-14);
        assert_relative_eq!(p[0], -8.0, epsilon = 1e-14);
        assert_relative_eq!(p[3], 8.0, epsilon = 1e-14);
    }

    #[test]
    fn test_offsets_transfer_moment() {
        // Horizontal rigid link of 0.5 at end i; a vertical end force then
        // carries a moment about node i.
        let t = GeomTransf::planar(1, TransformKind::Linear)
            .with_offsets(Vec3::new(0.5, 0.0, 0.0), Vec3::zeros())
            .instantiate(Point3::zeros(), Point3::new(2.5, 0.0, 0.0))
            .unwrap();
        assert_relative_eq!(t.initial_length(), 2.0);
        // Pure end moment at i
        let q = DVector::from_vec(vec![0.0, 1.0, 0.0]);
        let p = t.global_resisting_force(&q, &DVector::zeros(0));
        // Shear 1/L at each end, plus the link moment 0.5 * V_i
        assert_relative_eq!(p[1], 0.5, epsilon = 1e-14);
        assert_relative_eq!(p[2], 1.0 + 0.5 * 0.5, epsilon = 1e-14);
        assert_relative_eq!(p[4], -0.5, epsilon = 1e-14);
    }

    #[test]
    fn test_commit_revert() {
        let mut t = planar(TransformKind::Linear, Point3::new(1.0, 0.0, 0.0));
        let ug = DVector::from_vec(vec![0.0, 0.0, 0.0, 0.1, 0.0, 0.0]);
        t.update(&ug).unwrap();
        t.commit_state().unwrap();
        t.update(&DVector::zeros(6)).unwrap();
        t.revert_to_last_commit().unwrap();
        assert_relative_eq!(t.basic_trial_disp()[0], 0.1);

        let snap = t.committed_snapshot();
        let mut fresh = planar(TransformKind::Linear, Point3::new(1.0, 0.0, 0.0));
        fresh.restore_snapshot(&snap).unwrap();
        assert_relative_eq!(fresh.basic_trial_disp()[0], 0.1);
    }
}
