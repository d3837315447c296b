//! Vectors and scalars carried with their first and second variations over
//! the twelve end DOFs `[u_i, w_i, u_j, w_j]` of a spatial frame member.
//!
//! Rotational DOFs are spins: a vector carried by a nodal rotation varies
//! as `δn = w × n`. Second variations apply the outer spin after the inner
//! one, so rotation blocks of a Hessian are in general not symmetric.

use crate::types::{skew, Vec3};
use nalgebra::{Matrix3, SMatrix, SVector};

pub(crate) type Jacobian = SMatrix<f64, 3, 12>;
pub(crate) type Hessian = SMatrix<f64, 12, 12>;
pub(crate) type Gradient = SVector<f64, 12>;

fn unit(k: usize) -> Vec3 {
    let mut e = Vec3::zeros();
    e[k] = 1.0;
    e
}

/// `λ · (e_a × (e_b × p))` for all spin directions `a, b`.
fn spin_curvature(p: &Vec3, lambda: &Vec3) -> Matrix3<f64> {
    p * lambda.transpose() - Matrix3::identity() * lambda.dot(p)
}

#[derive(Debug, Clone)]
pub(crate) struct VectorJet {
    pub value: Vec3,
    pub jac: Jacobian,
    /// Second variation of each component.
    hess: [Hessian; 3],
}

#[derive(Debug, Clone)]
pub(crate) struct ScalarJet {
    pub value: f64,
    pub grad: Gradient,
    pub hess: Hessian,
}

impl VectorJet {
    /// Vector carried by the nodal rotation whose spin block starts at `rot`.
    pub fn rotated(value: Vec3, rot: usize) -> Self {
        let mut jac = Jacobian::zeros();
        jac.fixed_view_mut::<3, 3>(0, rot).copy_from(&(-skew(&value)));
        let hess = [0, 1, 2].map(|k| {
            let mut h = Hessian::zeros();
            h.fixed_view_mut::<3, 3>(rot, rot)
                .copy_from(&spin_curvature(&value, &unit(k)));
            h
        });
        Self { value, jac, hess }
    }

    /// Member end point at `position`, reached from its node through the
    /// rotated rigid link `offset`.
    pub fn end_point(position: Vec3, offset: Vec3, trans: usize, rot: usize) -> Self {
        let mut jet = Self::rotated(offset, rot);
        jet.value = position;
        jet.jac
            .fixed_view_mut::<3, 3>(0, trans)
            .copy_from(&Matrix3::identity());
        jet
    }

    /// Second variation of `mu · self` for a fixed `mu`.
    fn contract(&self, mu: &Vec3) -> Hessian {
        self.hess[0] * mu.x + self.hess[1] * mu.y + self.hess[2] * mu.z
    }

    pub fn plus(&self, other: &Self) -> Self {
        Self {
            value: self.value + other.value,
            jac: self.jac + other.jac,
            hess: [0, 1, 2].map(|k| self.hess[k] + other.hess[k]),
        }
    }

    pub fn minus(&self, other: &Self) -> Self {
        Self {
            value: self.value - other.value,
            jac: self.jac - other.jac,
            hess: [0, 1, 2].map(|k| self.hess[k] - other.hess[k]),
        }
    }

    pub fn scaled(&self, s: f64) -> Self {
        Self {
            value: self.value * s,
            jac: self.jac * s,
            hess: [0, 1, 2].map(|k| self.hess[k] * s),
        }
    }

    pub fn cross(&self, b: &Self) -> Self {
        let a = self;
        let value = a.value.cross(&b.value);
        let jac = skew(&a.value) * b.jac - skew(&b.value) * a.jac;
        let hess = [0, 1, 2].map(|k| {
            let e = unit(k);
            let s = skew(&e);
            a.contract(&b.value.cross(&e)) + b.contract(&e.cross(&a.value))
                - a.jac.transpose() * s * b.jac
                + b.jac.transpose() * s * a.jac
        });
        Self { value, jac, hess }
    }

    pub fn normalize(&self) -> Self {
        let r = self.value.norm();
        let u = self.value / r;
        let p = Matrix3::identity() - u * u.transpose();
        let jac = p * self.jac / r;
        let hess = [0, 1, 2].map(|k| {
            let g: Vec3 = p.column(k).into_owned() / r;
            let curvature = (u * g.transpose() + g * u.transpose() + p * (u[k] / r)) * (-1.0 / r);
            self.jac.transpose() * curvature * self.jac + self.contract(&g)
        });
        Self { value: u, jac, hess }
    }

    pub fn dot(&self, b: &Self) -> ScalarJet {
        ScalarJet {
            value: self.value.dot(&b.value),
            grad: self.jac.tr_mul(&b.value) + b.jac.tr_mul(&self.value),
            hess: self.contract(&b.value)
                + b.contract(&self.value)
                + self.jac.tr_mul(&b.jac)
                + b.jac.tr_mul(&self.jac),
        }
    }
}

impl ScalarJet {
    pub fn minus(&self, other: &Self) -> Self {
        Self {
            value: self.value - other.value,
            grad: self.grad - other.grad,
            hess: self.hess - other.hess,
        }
    }

    /// Compose with a scalar function given its value and two derivatives
    /// at `self.value`.
    fn map(&self, f: f64, df: f64, d2f: f64) -> Self {
        Self {
            value: f,
            grad: self.grad * df,
            hess: self.grad * self.grad.transpose() * d2f + self.hess * df,
        }
    }

    pub fn sqrt(&self) -> Self {
        let s = self.value.sqrt();
        self.map(s, 0.5 / s, -0.25 / (s * self.value))
    }

    /// `asin(x / 2)`, the end-rotation measure of the corotational frame.
    pub fn half_asin(&self) -> Self {
        let s = (0.5 * self.value).clamp(-1.0, 1.0);
        let c = (1.0 - s * s).max(f64::EPSILON);
        self.map(s.asin(), 0.5 / c.sqrt(), 0.25 * s / (c * c.sqrt()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_chord_length_variations() {
        let xi = VectorJet::end_point(Vec3::new(0.5, -0.2, 0.1), Vec3::zeros(), 0, 3);
        let xj = VectorJet::end_point(Vec3::new(2.0, 1.0, -0.4), Vec3::zeros(), 6, 9);
        let c = xj.minus(&xi);
        let ln = c.dot(&c).sqrt();
        let e = c.value / ln.value;
        let p = (Matrix3::identity() - e * e.transpose()) / ln.value;

        assert_relative_eq!(ln.value, c.value.norm(), epsilon = 1e-14);
        for r in 0..3 {
            assert_relative_eq!(ln.grad[6 + r], e[r], epsilon = 1e-14);
            assert_relative_eq!(ln.grad[r], -e[r], epsilon = 1e-14);
            for s in 0..3 {
                assert_relative_eq!(ln.hess[(6 + r, 6 + s)], p[(r, s)], epsilon = 1e-12);
                assert_relative_eq!(ln.hess[(r, 6 + s)], -p[(r, s)], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_rotation_preserves_length_to_second_order() {
        let n = VectorJet::rotated(Vec3::new(0.3, -1.2, 0.7), 3);
        let sq = n.dot(&n);
        assert_relative_eq!(sq.grad.norm(), 0.0, epsilon = 1e-14);
        assert_relative_eq!(sq.hess.norm(), 0.0, epsilon = 1e-14);

        let u = n.normalize();
        assert_relative_eq!(u.dot(&u).hess.norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_cross_product_of_translations() {
        let a = VectorJet::end_point(Vec3::new(1.0, 0.0, 0.0), Vec3::zeros(), 0, 3);
        let b = VectorJet::end_point(Vec3::new(0.0, 1.0, 0.0), Vec3::zeros(), 6, 9);
        let c = a.cross(&b);
        assert_relative_eq!((c.value - Vec3::z()).norm(), 0.0, epsilon = 1e-14);
        // z-component a_x b_y - a_y b_x has unit mixed second variation
        let h = c.hess[2];
        assert_relative_eq!(h[(0, 7)], 1.0, epsilon = 1e-14);
        assert_relative_eq!(h[(7, 0)], 1.0, epsilon = 1e-14);
        assert_relative_eq!(h[(1, 6)], -1.0, epsilon = 1e-14);
        assert_relative_eq!(h[(6, 1)], -1.0, epsilon = 1e-14);
        assert_relative_eq!((h - h.transpose()).norm(), 0.0, epsilon = 1e-14);
    }
}
