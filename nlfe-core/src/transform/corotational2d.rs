//! Planar corotational transform.
//!
//! The member frame follows the chord between the (rotated) offset end
//! points. Basic deformations are
//!
//! ```text
//! v = [Ln - L0, θi - α, θj - α]
//! ```
//!
//! where `α` is the rigid chord rotation. `α` is unwrapped relative to the
//! committed value, so it stays continuous through rotations beyond ±π and
//! repeated updates with the same displacements give identical results.

use crate::error::{Error, Result};
use crate::state::{Snapshot, Stateful};
use crate::transform::geometry::{place_reactions, rotation_matrix, FrameGeometry};
use crate::transform::{check_displacement, FrameTransform};
use crate::types::{Dimension, Tag, Vec3};
use nalgebra::{DMatrix, DVector, Matrix3};
use std::f64::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq)]
struct ChordState {
    ug: [f64; 6],
    /// Chord rotation from the reference configuration.
    alpha: f64,
    ln: f64,
    cos: f64,
    sin: f64,
    v: [f64; 3],
    /// Offsets rotated by the nodal rotations.
    oi: Vec3,
    oj: Vec3,
}

#[derive(Debug, Clone)]
pub struct Corotational2d {
    tag: Tag,
    geom: FrameGeometry,
    alpha0: f64,
    trial: ChordState,
    committed: ChordState,
}

/// Map an angle to `[-π, π]`.
fn wrap(angle: f64) -> f64 {
    angle - 2.0 * PI * (angle / (2.0 * PI)).round()
}

fn rotate(theta: f64, o: &Vec3) -> Vec3 {
    let (s, c) = theta.sin_cos();
    Vec3::new(c * o.x - s * o.y, s * o.x + c * o.y, 0.0)
}

impl Corotational2d {
    pub(crate) fn new(tag: Tag, geom: FrameGeometry) -> Self {
        let alpha0 = geom.axes[(0, 1)].atan2(geom.axes[(0, 0)]);
        let initial = ChordState {
            ug: [0.0; 6],
            alpha: 0.0,
            ln: geom.l0,
            cos: geom.axes[(0, 0)],
            sin: geom.axes[(0, 1)],
            v: [0.0; 3],
            oi: geom.oi,
            oj: geom.oj,
        };
        Self {
            tag,
            geom,
            alpha0,
            trial: initial,
            committed: initial,
        }
    }

    /// Chord state for displacements `ug`, unwrapping the chord angle
    /// around `alpha_ref`.
    fn chord_state(&self, ug: [f64; 6], alpha_ref: f64) -> Result<ChordState> {
        let g = &self.geom;
        let oi = rotate(ug[2], &g.oi);
        let oj = rotate(ug[5], &g.oj);

        let dx = (g.xj.x + oj.x + ug[3]) - (g.xi.x + oi.x + ug[0]);
        let dy = (g.xj.y + oj.y + ug[4]) - (g.xi.y + oi.y + ug[1]);
        let ln = dx.hypot(dy);
        if !(ln > 1e-12 * g.l0) || !ln.is_finite() {
            return Err(Error::update_failure(
                self.tag,
                format!("corotational chord collapsed to length {ln}"),
            ));
        }

        let beta = dy.atan2(dx);
        let alpha = alpha_ref + wrap(beta - self.alpha0 - alpha_ref);

        Ok(ChordState {
            ug,
            alpha,
            ln,
            cos: dx / ln,
            sin: dy / ln,
            v: [ln - g.l0, ug[2] - alpha, ug[5] - alpha],
            oi,
            oj,
        })
    }

    /// Current chord rotation from the reference configuration.
    pub fn chord_rotation(&self) -> f64 {
        self.trial.alpha
    }

    /// Variations of the chord length and chord angle (scaled by `Ln`)
    /// with respect to end-point DOFs.
    fn chord_rows(&self) -> (DVector<f64>, DVector<f64>) {
        let (c, s) = (self.trial.cos, self.trial.sin);
        let r = DVector::from_column_slice(&[-c, -s, 0.0, c, s, 0.0]);
        let z = DVector::from_column_slice(&[s, -c, 0.0, -s, c, 0.0]);
        (r, z)
    }

    /// `dv / dd` for end-point DOFs `d`.
    fn compatibility(&self) -> DMatrix<f64> {
        let (c, s, ln) = (self.trial.cos, self.trial.sin, self.trial.ln);
        DMatrix::from_row_slice(3, 6, &[
            -c, -s, 0.0, c, s, 0.0,
            -s / ln, c / ln, 1.0, s / ln, -c / ln, 0.0,
            -s / ln, c / ln, 0.0, s / ln, -c / ln, 1.0,
        ])
    }

    /// Rigid-link Jacobian `dd / dug` at the current nodal rotations.
    fn link_jacobian(&self) -> DMatrix<f64> {
        let mut t = DMatrix::identity(6, 6);
        for (b, o) in [(0, &self.trial.oi), (3, &self.trial.oj)] {
            t[(b, b + 2)] = -o.y;
            t[(b + 1, b + 2)] = o.x;
        }
        t
    }

    fn current_axes(&self) -> Matrix3<f64> {
        let (c, s) = (self.trial.cos, self.trial.sin);
        Matrix3::new(
            c, s, 0.0,
            -s, c, 0.0,
            0.0, 0.0, 1.0,
        )
    }

    /// Forces on the end points for basic forces `q`.
    fn end_forces(&self, q: &DVector<f64>) -> DVector<f64> {
        self.compatibility().tr_mul(q)
    }
}

impl Stateful for Corotational2d {
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

impl FrameTransform for Corotational2d {
    fn tag(&self) -> Tag {
        self.tag
    }

    fn class_name(&self) -> &'static str {
        "CorotCrdTransf2d"
    }

    fn dimension(&self) -> Dimension {
        Dimension::Two
    }

    fn initial_length(&self) -> f64 {
        self.geom.l0
    }

    fn deformed_length(&self) -> f64 {
        self.trial.ln
    }

    fn local_axes(&self) -> Matrix3<f64> {
        self.current_axes()
    }

    fn update(&mut self, ug: &DVector<f64>) -> Result<()> {
        check_displacement(self.tag, 3, ug)?;
        let mut u = [0.0; 6];
        u.copy_from_slice(ug.as_slice());
        self.trial = self.chord_state(u, self.committed.alpha)?;
        Ok(())
    }

    fn basic_trial_disp(&self) -> DVector<f64> {
        DVector::from_column_slice(&self.trial.v)
    }

    fn global_resisting_force(&self, q: &DVector<f64>, p0: &DVector<f64>) -> DVector<f64> {
        let mut pd = self.end_forces(q);
        if p0.len() >= 3 {
            let reactions = place_reactions(Dimension::Two, p0);
            pd += rotation_matrix(Dimension::Two, &self.current_axes()).tr_mul(&reactions);
        }
        self.link_jacobian().tr_mul(&pd)
    }

    fn global_stiff(&self, kb: &DMatrix<f64>, q: &DVector<f64>) -> DMatrix<f64> {
        let a = self.compatibility();
        let ln = self.trial.ln;
        let (r, z) = self.chord_rows();

        let kd = a.tr_mul(&(kb * &a))
            + &z * z.transpose() * (q[0] / ln)
            + (&r * z.transpose() + &z * r.transpose()) * ((q[1] + q[2]) / (ln * ln));

        let t = self.link_jacobian();
        let mut k = t.tr_mul(&(kd * &t));

        // Second variation of the rotated offsets
        let pd = self.end_forces(q);
        for (b, o) in [(0, &self.trial.oi), (3, &self.trial.oj)] {
            k[(b + 2, b + 2)] -= pd[b] * o.x + pd[b + 1] * o.y;
        }
        k
    }

    fn global_initial_stiff(&self, kb: &DMatrix<f64>) -> DMatrix<f64> {
        let reference = Self::new(self.tag, self.geom.clone());
        let at = reference.compatibility() * reference.link_jacobian();
        at.tr_mul(&(kb * &at))
    }

    fn committed_snapshot(&self) -> Snapshot {
        let mut data = Vec::with_capacity(7);
        data.push(self.committed.alpha);
        data.extend_from_slice(&self.committed.ug);
        Snapshot::new(self.class_name(), self.tag, data)
    }

    fn restore_snapshot(&mut self, snapshot: &Snapshot) -> Result<()> {
        snapshot.expect_shape(self.class_name(), 7, 0)?;
        let alpha = snapshot.data[0];
        let mut ug = [0.0; 6];
        ug.copy_from_slice(&snapshot.data[1..]);

        let mut state = self.chord_state(ug, alpha)?;
        state.alpha = alpha;
        state.v = [state.ln - self.geom.l0, ug[2] - alpha, ug[5] - alpha];
        self.committed = state;
        self.trial = state;
        Ok(())
    }
}
