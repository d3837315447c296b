//! Spatial corotational transform.
//!
//! Nodal rotations are tracked as unit quaternions. Every update applies
//! the rotation increment since the last commit to the committed
//! quaternion, so the result depends only on the trial displacements and
//! the committed state.
//!
//! The element frame has `e1` along the deformed chord and `e2, e3` taken
//! from the mean of the nodal triads. Local end rotations are extracted
//! from the nodal triads relative to that frame:
//!
//! ```text
//! θz = asin((e2·n1 - e1·n2) / 2)
//! θy = asin((e1·n3 - e3·n1) / 2)
//! θx = asin((e3·n2 - e2·n3) / 2)
//! ```
//!
//! Nodal moments are conjugate to spins `δn = w × n`. The resisting force
//! is `Bᵀ q` with `B = ∂v/∂(u, w)` taken exactly, and the tangent is its
//! derivative with respect to the nodal DOFs, including the left Jacobian
//! of the rotation increment. It is not symmetric away from the committed
//! rotations.

use crate::error::{Error, Result};
use crate::state::{Snapshot, Stateful};
use crate::transform::geometry::{
    basic_matrix, offset_matrix, place_reactions, rotation_matrix, FrameGeometry,
};
use crate::transform::{check_displacement, FrameTransform};
use crate::transform::jet::{Hessian, ScalarJet, VectorJet};
use crate::types::{skew, Dimension, Tag, Vec3};
use nalgebra::{DMatrix, DVector, Matrix3, Quaternion, UnitQuaternion};

#[derive(Debug, Clone, Copy, PartialEq)]
struct FrameState {
    ug: [f64; 12],
    qi: UnitQuaternion<f64>,
    qj: UnitQuaternion<f64>,
    /// Element axes as rows.
    axes: Matrix3<f64>,
    ln: f64,
    v: [f64; 6],
    oi: Vec3,
    oj: Vec3,
}

#[derive(Debug, Clone)]
pub struct Corotational3d {
    tag: Tag,
    geom: FrameGeometry,
    trial: FrameState,
    committed: FrameState,
}

/// Left Jacobian of the rotation exponential, `exp(θ + δ) ≈ exp(J δ) exp(θ)`.
fn left_jacobian(theta: &Vec3) -> Matrix3<f64> {
    let phi = theta.norm();
    let w = skew(theta);
    let (a, b) = if phi < 1e-4 {
        (0.5 - phi * phi / 24.0, 1.0 / 6.0 - phi * phi / 120.0)
    } else {
        (
            (1.0 - phi.cos()) / (phi * phi),
            (phi - phi.sin()) / (phi * phi * phi),
        )
    };
    Matrix3::identity() + w * a + w * w * b
}

fn row(m: &Matrix3<f64>, i: usize) -> Vec3 {
    m.row(i).transpose()
}

/// End rotations `(θx, θy, θz)` of a nodal triad (columns `n1, n2, n3`)
/// relative to the element axes.
fn local_rotations(axes: &Matrix3<f64>, triad: &Matrix3<f64>) -> (f64, f64, f64) {
    let (e1, e2, e3) = (row(axes, 0), row(axes, 1), row(axes, 2));
    let n1 = triad.column(0).into_owned();
    let n2 = triad.column(1).into_owned();
    let n3 = triad.column(2).into_owned();
    let half_asin = |x: f64| (0.5 * x).clamp(-1.0, 1.0).asin();
    (
        half_asin(e3.dot(&n2) - e2.dot(&n3)),
        half_asin(e1.dot(&n3) - e3.dot(&n1)),
        half_asin(e2.dot(&n1) - e1.dot(&n2)),
    )
}

impl Corotational3d {
    pub(crate) fn new(tag: Tag, geom: FrameGeometry) -> Self {
        let initial = FrameState {
            ug: [0.0; 12],
            qi: UnitQuaternion::identity(),
            qj: UnitQuaternion::identity(),
            axes: geom.axes,
            ln: geom.l0,
            v: [0.0; 6],
            oi: geom.oi,
            oj: geom.oj,
        };
        Self {
            tag,
            geom,
            trial: initial,
            committed: initial,
        }
    }

    /// Frame state for displacements `ug`, rotating from the committed
    /// quaternions by the increment since the committed displacements.
    fn frame_state(&self, ug: [f64; 12], base: &FrameState) -> Result<FrameState> {
        let g = &self.geom;
        let spin = |at: usize| {
            Vec3::new(
                ug[at] - base.ug[at],
                ug[at + 1] - base.ug[at + 1],
                ug[at + 2] - base.ug[at + 2],
            )
        };
        let qi = UnitQuaternion::new(spin(3)) * base.qi;
        let qj = UnitQuaternion::new(spin(9)) * base.qj;
        let ri = qi.to_rotation_matrix().into_inner();
        let rj = qj.to_rotation_matrix().into_inner();

        let oi = ri * g.oi;
        let oj = rj * g.oj;
        let xi = g.xi + Vec3::new(ug[0], ug[1], ug[2]) + oi;
        let xj = g.xj + Vec3::new(ug[6], ug[7], ug[8]) + oj;

        let chord = xj - xi;
        let ln = chord.norm();
        if !(ln > 1e-12 * g.l0) || !ln.is_finite() {
            return Err(Error::update_failure(
                self.tag,
                format!("corotational chord collapsed to length {ln}"),
            ));
        }
        let e1 = chord / ln;

        // Nodal triads: reference axes carried by each nodal rotation
        let reference = g.axes.transpose();
        let ti = ri * reference;
        let tj = rj * reference;

        let mean_e2 = (ti.column(1) + tj.column(1)) * 0.5;
        let e3 = e1.cross(&mean_e2);
        let e3_norm = e3.norm();
        if !(e3_norm > 1e-12) {
            return Err(Error::update_failure(
                self.tag,
                "nodal triads are folded onto the chord",
            ));
        }
        let e3 = e3 / e3_norm;
        let e2 = e3.cross(&e1);
        let axes = Matrix3::from_rows(&[e1.transpose(), e2.transpose(), e3.transpose()]);

        let (txi, tyi, tzi) = local_rotations(&axes, &ti);
        let (txj, tyj, tzj) = local_rotations(&axes, &tj);

        Ok(FrameState {
            ug,
            qi,
            qj,
            axes,
            ln,
            v: [ln - g.l0, tzi, tzj, tyi, tyj, txj - txi],
            oi,
            oj,
        })
    }

    /// Basic deformations with their variations over end translations and
    /// nodal spins at the trial state, in the order of `v`.
    fn variations(&self) -> [ScalarJet; 6] {
        let s = &self.trial;
        let g = &self.geom;
        let reference = g.axes.transpose();
        let ti = s.qi.to_rotation_matrix().into_inner() * reference;
        let tj = s.qj.to_rotation_matrix().into_inner() * reference;

        let xi = VectorJet::end_point(
            g.xi + Vec3::new(s.ug[0], s.ug[1], s.ug[2]) + s.oi,
            s.oi,
            0,
            3,
        );
        let xj = VectorJet::end_point(
            g.xj + Vec3::new(s.ug[6], s.ug[7], s.ug[8]) + s.oj,
            s.oj,
            6,
            9,
        );
        let triad = |t: &Matrix3<f64>, rot: usize| {
            [0, 1, 2].map(|k| VectorJet::rotated(t.column(k).into_owned(), rot))
        };
        let ni = triad(&ti, 3);
        let nj = triad(&tj, 9);

        let chord = xj.minus(&xi);
        let e1 = chord.normalize();
        let mean_e2 = ni[1].plus(&nj[1]).scaled(0.5);
        let e3 = e1.cross(&mean_e2).normalize();
        let e2 = e3.cross(&e1);

        let rotations = |n: &[VectorJet; 3]| {
            (
                e3.dot(&n[1]).minus(&e2.dot(&n[2])).half_asin(),
                e1.dot(&n[2]).minus(&e3.dot(&n[0])).half_asin(),
                e2.dot(&n[0]).minus(&e1.dot(&n[1])).half_asin(),
            )
        };
        let (txi, tyi, tzi) = rotations(&ni);
        let (txj, tyj, tzj) = rotations(&nj);
        let ln = chord.dot(&chord).sqrt();
        let twist = txj.minus(&txi);
        [ln, tzi, tzj, tyi, tyj, twist]
    }

    fn basic_jacobian(variations: &[ScalarJet; 6]) -> DMatrix<f64> {
        DMatrix::from_fn(6, 12, |r, c| variations[r].grad[c])
    }

    /// Spins per unit change of the nodal DOFs: identity on translations,
    /// the left Jacobian of the rotation increment since commit on each
    /// rotation block.
    fn spin_map(&self) -> DMatrix<f64> {
        let (t, c) = (&self.trial.ug, &self.committed.ug);
        let mut m = DMatrix::identity(12, 12);
        for at in [3, 9] {
            let theta = Vec3::new(t[at] - c[at], t[at + 1] - c[at + 1], t[at + 2] - c[at + 2]);
            m.fixed_view_mut::<3, 3>(at, at)
                .copy_from(&left_jacobian(&theta));
        }
        m
    }

    /// Rigid-link Jacobian at the current nodal rotations.
    fn link_jacobian(&self) -> DMatrix<f64> {
        offset_matrix(Dimension::Three, &self.trial.oi, &self.trial.oj)
    }

    /// Current nodal rotation quaternions `(i, j)`.
    pub fn nodal_rotations(&self) -> (UnitQuaternion<f64>, UnitQuaternion<f64>) {
        (self.trial.qi, self.trial.qj)
    }
}

impl Stateful for Corotational3d {
    fn commit_state(&mut self) -> Result<()> {
        self.committed = self.trial;
        Ok(())
    }

    fn revert_to_last_commit(&mut self) -> Result<()> {
        self.trial = self.committed;
        Ok(())
    }

    fn revert_to_start(&mut self) -> Result<()> {
        *self = Self::new(self.tag, self.geom.clone());
        Ok(())
    }
}

impl FrameTransform for Corotational3d {
    fn tag(&self) -> Tag {
        self.tag
    }

    fn class_name(&self) -> &'static str {
        "CorotCrdTransf3d"
    }

    fn dimension(&self) -> Dimension {
        Dimension::Three
    }

    fn initial_length(&self) -> f64 {
        self.geom.l0
    }

    fn deformed_length(&self) -> f64 {
        self.trial.ln
    }

    fn local_axes(&self) -> Matrix3<f64> {
        self.trial.axes
    }

    fn update(&mut self, ug: &DVector<f64>) -> Result<()> {
        check_displacement(self.tag, 6, ug)?;
        let mut u = [0.0; 12];
        u.copy_from_slice(ug.as_slice());
        self.trial = self.frame_state(u, &self.committed)?;
        Ok(())
    }

    fn basic_trial_disp(&self) -> DVector<f64> {
        DVector::from_column_slice(&self.trial.v)
    }

    fn global_resisting_force(&self, q: &DVector<f64>, p0: &DVector<f64>) -> DVector<f64> {
        let mut p = Self::basic_jacobian(&self.variations()).tr_mul(q);
        if p0.len() >= 5 {
            let reactions = place_reactions(Dimension::Three, p0);
            let end_forces = rotation_matrix(Dimension::Three, &self.trial.axes).tr_mul(&reactions);
            p += self.link_jacobian().tr_mul(&end_forces);
        }
        p
    }

    /// Derivative of [`FrameTransform::global_resisting_force`] with respect
    /// to the nodal DOFs. Member-load reactions add no geometric stiffness.
    fn global_stiff(&self, kb: &DMatrix<f64>, q: &DVector<f64>) -> DMatrix<f64> {
        let variations = self.variations();
        let b = Self::basic_jacobian(&variations);
        let mut geometric = Hessian::zeros();
        for (v, qk) in variations.iter().zip(q.iter()) {
            geometric += v.hess * *qk;
        }
        let kd = b.tr_mul(&(kb * &b)) + DMatrix::from_column_slice(12, 12, geometric.as_slice());
        kd * self.spin_map()
    }

    fn global_initial_stiff(&self, kb: &DMatrix<f64>) -> DMatrix<f64> {
        let g = &self.geom;
        let a = basic_matrix(Dimension::Three, g.l0)
            * rotation_matrix(Dimension::Three, &g.axes)
            * offset_matrix(Dimension::Three, &g.oi, &g.oj);
        a.tr_mul(&(kb * &a))
    }

    fn committed_snapshot(&self) -> Snapshot {
        let c = &self.committed;
        let mut data = Vec::with_capacity(20);
        data.extend_from_slice(&c.ug);
        for q in [c.qi, c.qj] {
            data.extend_from_slice(&[q.w, q.i, q.j, q.k]);
        }
        Snapshot::new(self.class_name(), self.tag, data)
    }

    fn restore_snapshot(&mut self, snapshot: &Snapshot) -> Result<()> {
        snapshot.expect_shape(self.class_name(), 20, 0)?;
        let d = &snapshot.data;
        let mut ug = [0.0; 12];
        ug.copy_from_slice(&d[..12]);
        let quat = |at: usize| {
            UnitQuaternion::from_quaternion(Quaternion::new(d[at], d[at + 1], d[at + 2], d[at + 3]))
        };

        let base = FrameState {
            ug,
            qi: quat(12),
            qj: quat(16),
            ..self.committed
        };
        let state = self.frame_state(ug, &base)?;
        self.committed = state;
        self.trial = state;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{GeomTransf, TransformKind};
    use crate::types::Point3;
    use approx::assert_relative_eq;

    fn member(xj: Point3, vecxz: Vec3) -> Corotational3d {
        let def = GeomTransf::spatial(1, TransformKind::Corotational, vecxz).unwrap();
        let geom = FrameGeometry::resolve(&def, Point3::zeros(), xj).unwrap();
        Corotational3d::new(1, geom)
    }

    /// Rigid rotation by the rotation vector `phi` about node i.
    fn rigid_rotation(xj: Point3, phi: Vec3) -> DVector<f64> {
        let r = UnitQuaternion::new(phi).to_rotation_matrix().into_inner();
        let uj = r * xj - xj;
        DVector::from_vec(vec![
            0.0, 0.0, 0.0, phi.x, phi.y, phi.z,
            uj.x, uj.y, uj.z, phi.x, phi.y, phi.z,
        ])
    }

    #[test]
    fn test_rigid_rotation_has_no_deformation() {
        let xj = Point3::new(2.0, 1.0, 0.5);
        let mut t = member(xj, Vec3::z());
        t.update(&rigid_rotation(xj, Vec3::new(0.4, -0.9, 1.3))).unwrap();
        let v = t.basic_trial_disp();
        for i in 0..6 {
            assert_relative_eq!(v[i], 0.0, epsilon = 1e-12);
        }
        assert_relative_eq!(t.deformed_length(), t.initial_length(), epsilon = 1e-12);
    }

    #[test]
    fn test_small_displacement_matches_linear() {
        let xj = Point3::new(3.0, 0.0, 0.0);
        let mut t = member(xj, Vec3::z());
        let mut lin = GeomTransf::spatial(1, TransformKind::Linear, Vec3::z())
            .unwrap()
            .instantiate(Point3::zeros(), xj)
            .unwrap();

        let mut ug = DVector::zeros(12);
        ug[0] = 1e-7;
        ug[5] = 2e-7;
        ug[7] = 3e-7;
        ug[8] = -1e-7;
        ug[9] = 4e-7;
        ug[10] = -2e-7;
        t.update(&ug).unwrap();
        lin.update(&ug).unwrap();

        let (vc, vl) = (t.basic_trial_disp(), lin.basic_trial_disp());
        for i in 0..6 {
            assert_relative_eq!(vc[i], vl[i], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_update_is_idempotent() {
        let xj = Point3::new(0.0, 0.0, 4.0);
        let mut t = member(xj, Vec3::x());
        let ug = DVector::from_vec(vec![
            0.1, 0.2, -0.1, 0.3, -0.2, 0.5, 0.4, -0.3, 0.2, -0.6, 0.1, 0.2,
        ]);
        t.update(&ug).unwrap();
        let v1 = t.basic_trial_disp();
        t.update(&ug).unwrap();
        let v2 = t.basic_trial_disp();
        for i in 0..6 {
            assert_eq!(v1[i].to_bits(), v2[i].to_bits());
        }
    }

    #[test]
    fn test_large_rotation_bounded() {
        let xj = Point3::new(1.0, 0.0, 0.0);
        let mut t = member(xj, Vec3::z());
        let mut ug = rigid_rotation(xj, Vec3::new(0.0, 0.0, 2.5));
        ug[11] += 0.3;
        t.update(&ug).unwrap();
        let v = t.basic_trial_disp();
        assert!(v.iter().all(|x| x.is_finite()));
        assert_relative_eq!(v[2], 0.3, epsilon = 1e-12);
        assert_relative_eq!(v[1], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_incremental_rotation_accumulates() {
        let xj = Point3::new(1.0, 0.0, 0.0);
        let mut t = member(xj, Vec3::z());
        // Two committed steps about z give the same frame as one
        t.update(&rigid_rotation(xj, Vec3::new(0.0, 0.0, 0.4))).unwrap();
        t.commit_state().unwrap();
        t.update(&rigid_rotation(xj, Vec3::new(0.0, 0.0, 0.9))).unwrap();
        let (qi, _) = t.nodal_rotations();
        assert_relative_eq!(qi.angle(), 0.9, epsilon = 1e-12);
        assert_relative_eq!(t.local_axes()[(0, 1)], 0.9_f64.sin(), epsilon = 1e-12);
    }

    #[test]
    fn test_initial_stiffness_matches_linear() {
        let xj = Point3::new(1.0, 2.0, 2.0);
        let t = member(xj, Vec3::z());
        let lin = GeomTransf::spatial(1, TransformKind::Linear, Vec3::z())
            .unwrap()
            .instantiate(Point3::zeros(), xj)
            .unwrap();
        let kb = DMatrix::from_diagonal(&DVector::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]));
        let diff = t.global_initial_stiff(&kb) - lin.global_initial_stiff(&kb);
        assert_relative_eq!(diff.norm(), 0.0, epsilon = 1e-12);

        // At the reference configuration the material part of the tangent
        // is the linear stiffness
        let k = t.global_stiff(&kb, &DVector::zeros(6));
        assert_relative_eq!((k - lin.global_initial_stiff(&kb)).norm(), 0.0, epsilon = 1e-12);
    }

    fn spatial_kb(l: f64) -> DMatrix<f64> {
        let (ea, eiz, eiy, gj) = (100.0, 10.0, 8.0, 5.0);
        let mut kb = DMatrix::zeros(6, 6);
        kb[(0, 0)] = ea / l;
        for (a, b, ei) in [(1, 2, eiz), (3, 4, eiy)] {
            kb[(a, a)] = 4.0 * ei / l;
            kb[(b, b)] = 4.0 * ei / l;
            kb[(a, b)] = 2.0 * ei / l;
            kb[(b, a)] = 2.0 * ei / l;
        }
        kb[(5, 5)] = gj / l;
        kb
    }

    /// Central-difference check of the tangent against the resisting force
    /// around `ug`.
    fn check_tangent(t: &mut Corotational3d, kb: &DMatrix<f64>, ug: &DVector<f64>) {
        let mut force = |ug: &DVector<f64>| {
            t.update(ug).unwrap();
            let q = kb * t.basic_trial_disp();
            (t.global_resisting_force(&q, &DVector::zeros(0)), q)
        };
        let h = 1e-6;
        let mut fd = DMatrix::zeros(12, 12);
        for j in 0..12 {
            let mut up = ug.clone();
            up[j] += h;
            let mut dn = ug.clone();
            dn[j] -= h;
            let (fp, _) = force(&up);
            let (fm, _) = force(&dn);
            fd.set_column(j, &((fp - fm) / (2.0 * h)));
        }
        let (_, q) = force(ug);
        let k = t.global_stiff(kb, &q);
        for i in 0..12 {
            for j in 0..12 {
                assert_relative_eq!(k[(i, j)], fd[(i, j)], epsilon = 1e-5, max_relative = 1e-5);
            }
        }
    }

    #[test]
    fn test_tangent_matches_finite_difference() {
        let l = 2.0;
        let kb = spatial_kb(l);
        let def = GeomTransf::spatial(1, TransformKind::Corotational, Vec3::z())
            .unwrap()
            .with_offsets(Vec3::new(0.1, 0.05, 0.0), Vec3::new(-0.1, 0.0, 0.02));
        let geom = FrameGeometry::resolve(&def, Point3::zeros(), Point3::new(l, 0.0, 0.0)).unwrap();
        let mut t = Corotational3d::new(1, geom);

        // Translations only, then torsion and biaxial bending
        let translated = DVector::from_vec(vec![
            0.01, 0.02, -0.01, 0.0, 0.0, 0.0, -0.05, 0.3, 0.2, 0.0, 0.0, 0.0,
        ]);
        check_tangent(&mut t, &kb, &translated);
        let twisted = DVector::from_vec(vec![
            0.01, 0.02, -0.01, 0.1, -0.05, 0.08, -0.05, 0.3, 0.2, -0.12, 0.2, 0.15,
        ]);
        check_tangent(&mut t, &kb, &twisted);

        // Around a committed rotated configuration
        t.update(&twisted).unwrap();
        t.commit_state().unwrap();
        let mut further = twisted.clone();
        further[4] += 0.05;
        further[11] -= 0.1;
        check_tangent(&mut t, &kb, &further);
    }

    #[test]
    fn test_commit_revert_and_snapshot() {
        let xj = Point3::new(2.0, 0.0, 0.0);
        let mut t = member(xj, Vec3::z());
        let mut ug = rigid_rotation(xj, Vec3::new(0.2, 0.3, 0.1));
        ug[6] += 0.01;
        t.update(&ug).unwrap();
        t.commit_state().unwrap();
        let committed = t.basic_trial_disp();

        t.update(&DVector::zeros(12)).unwrap();
        t.revert_to_last_commit().unwrap();
        assert_eq!(t.basic_trial_disp(), committed);

        let snap = t.committed_snapshot();
        let mut fresh = member(xj, Vec3::z());
        fresh.restore_snapshot(&snap).unwrap();
        let restored = fresh.basic_trial_disp();
        for i in 0..6 {
            assert_relative_eq!(restored[i], committed[i], epsilon = 1e-14);
        }

        t.revert_to_start().unwrap();
        assert_eq!(t.nodal_rotations().0, UnitQuaternion::identity());
    }
}
