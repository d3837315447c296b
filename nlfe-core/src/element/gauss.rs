//! One-dimensional quadrature rules for beam-column integration.
//!
//! Rules are tabulated on `[-1, 1]`:
//!
//! - Gauss-Legendre, 1 to 5 points (exact to degree `2n - 1`)
//! - Gauss-Lobatto, 2 to 6 points (exact to degree `2n - 3`, end points
//!   included so the member ends are monitored)
//!
//! # Usage
//!
//! ```
//! use nlfe_core::element::gauss::gauss_legendre;
//!
//! let integral: f64 = gauss_legendre(2)
//!     .unwrap()
//!     .iter()
//!     .map(|(x, w)| w * x * x)
//!     .sum();
//! assert!((integral - 2.0 / 3.0).abs() < 1e-14);
//! ```

use crate::error::{Error, Result};

/// Gauss-Legendre points and weights on `[-1, 1]`.
///
/// # Arguments
///
/// * `n` - Number of integration points (1 to 5)
///
/// # Errors
///
/// Returns [`Error::Configuration`] for an unsupported `n`.
pub fn gauss_legendre(n: usize) -> Result<Vec<(f64, f64)>> {
    Ok(match n {
        1 => vec![(0.0, 2.0)],
        2 => {
            let p = 1.0 / 3.0_f64.sqrt();
            vec![(-p, 1.0), (p, 1.0)]
        }
        3 => {
            let p = (3.0 / 5.0_f64).sqrt();
            vec![(-p, 5.0 / 9.0), (0.0, 8.0 / 9.0), (p, 5.0 / 9.0)]
        }
        4 => {
            // Points: ±√((3 ∓ 2√(6/5))/7), weights (18 ± √30)/36
            let sqrt_6_5 = (6.0 / 5.0_f64).sqrt();
            let p1 = ((3.0 - 2.0 * sqrt_6_5) / 7.0).sqrt();
            let p2 = ((3.0 + 2.0 * sqrt_6_5) / 7.0).sqrt();
            let sqrt_30 = 30.0_f64.sqrt();
            let w1 = (18.0 + sqrt_30) / 36.0;
            let w2 = (18.0 - sqrt_30) / 36.0;
            vec![(-p2, w2), (-p1, w1), (p1, w1), (p2, w2)]
        }
        5 => {
            // Points: 0, ±(1/3)√(5 ∓ 2√(10/7)); weights 128/225, (322 ± 13√70)/900
            let r = 2.0 * (10.0 / 7.0_f64).sqrt();
            let p1 = (5.0 - r).sqrt() / 3.0;
            let p2 = (5.0 + r).sqrt() / 3.0;
            let s70 = 13.0 * 70.0_f64.sqrt();
            let w1 = (322.0 + s70) / 900.0;
            let w2 = (322.0 - s70) / 900.0;
            vec![
                (-p2, w2),
                (-p1, w1),
                (0.0, 128.0 / 225.0),
                (p1, w1),
                (p2, w2),
            ]
        }
        _ => {
            return Err(Error::configuration(format!(
                "Gauss-Legendre rule needs 1 to 5 points, got {n}"
            )))
        }
    })
}

/// Gauss-Lobatto points and weights on `[-1, 1]`, end points included.
///
/// # Arguments
///
/// * `n` - Number of integration points (2 to 6)
///
/// # Errors
///
/// Returns [`Error::Configuration`] for an unsupported `n`.
pub fn gauss_lobatto(n: usize) -> Result<Vec<(f64, f64)>> {
    Ok(match n {
        2 => vec![(-1.0, 1.0), (1.0, 1.0)],
        3 => vec![(-1.0, 1.0 / 3.0), (0.0, 4.0 / 3.0), (1.0, 1.0 / 3.0)],
        4 => {
            let p = 1.0 / 5.0_f64.sqrt();
            vec![
                (-1.0, 1.0 / 6.0),
                (-p, 5.0 / 6.0),
                (p, 5.0 / 6.0),
                (1.0, 1.0 / 6.0),
            ]
        }
        5 => {
            let p = (3.0 / 7.0_f64).sqrt();
            vec![
                (-1.0, 0.1),
                (-p, 49.0 / 90.0),
                (0.0, 32.0 / 45.0),
                (p, 49.0 / 90.0),
                (1.0, 0.1),
            ]
        }
        6 => {
            let s7 = 7.0_f64.sqrt();
            let p1 = (1.0 / 3.0 - 2.0 * s7 / 21.0).sqrt();
            let p2 = (1.0 / 3.0 + 2.0 * s7 / 21.0).sqrt();
            let w1 = (14.0 + s7) / 30.0;
            let w2 = (14.0 - s7) / 30.0;
            vec![
                (-1.0, 1.0 / 15.0),
                (-p2, w2),
                (-p1, w1),
                (p1, w1),
                (p2, w2),
                (1.0, 1.0 / 15.0),
            ]
        }
        _ => {
            return Err(Error::configuration(format!(
                "Gauss-Lobatto rule needs 2 to 6 points, got {n}"
            )))
        }
    })
}

/// Map a rule on `[-1, 1]` to `[0, 1]` with weights summing to one.
pub fn to_unit_interval(rule: &[(f64, f64)]) -> Vec<(f64, f64)> {
    rule.iter()
        .map(|&(x, w)| (0.5 * (x + 1.0), 0.5 * w))
        .collect()
}
