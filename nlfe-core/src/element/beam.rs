//! Pieces shared by the beam-column formulations: integration schemes,
//! section interpolation in the basic system, member loads and mass.
//!
//! Positions along the member are normalized, `ξ = x / L ∈ [0, 1]`.

use crate::element::gauss::{gauss_legendre, gauss_lobatto, to_unit_interval};
use crate::element::ElementLoad;
use crate::error::{Error, Result};
use crate::section::{Section, SectionResponse};
use crate::types::Dimension;
use nalgebra::{DMatrix, DVector};

/// Placement of the section integration points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeamIntegration {
    /// Interior points, no section at the member ends.
    Legendre(usize),
    /// Points at both ends, where force-based members yield first.
    Lobatto(usize),
}

impl Default for BeamIntegration {
    fn default() -> Self {
        Self::Lobatto(5)
    }
}

impl BeamIntegration {
    /// `(ξ, weight)` pairs on `[0, 1]`; weights sum to one.
    pub fn points(&self) -> Result<Vec<(f64, f64)>> {
        let rule = match *self {
            Self::Legendre(n) => gauss_legendre(n)?,
            Self::Lobatto(n) => gauss_lobatto(n)?,
        };
        Ok(to_unit_interval(&rule))
    }
}

/// Check that a section's response can be carried by a member of
/// dimension `dim`.
pub(crate) fn check_section(dim: Dimension, section: &dyn Section) -> Result<()> {
    if dim == Dimension::Two {
        let spatial = section
            .response_types()
            .iter()
            .any(|r| matches!(r, SectionResponse::My | SectionResponse::T));
        if spatial {
            return Err(Error::InvalidSection(format!(
                "section {} carries out-of-plane response in a planar member",
                section.tag()
            )));
        }
    }
    Ok(())
}

/// Section deformations from basic deformations for a cubic transverse /
/// linear axial displacement field: `e = B(ξ) v`.
pub(crate) fn strain_interpolation(
    dim: Dimension,
    types: &[SectionResponse],
    xi: f64,
    l: f64,
) -> DMatrix<f64> {
    let mut b = DMatrix::zeros(types.len(), dim.n_basic());
    let il = 1.0 / l;
    let (c1, c2) = (il * (6.0 * xi - 4.0), il * (6.0 * xi - 2.0));
    for (row, response) in types.iter().enumerate() {
        match response {
            SectionResponse::P => b[(row, 0)] = il,
            SectionResponse::Mz => {
                b[(row, 1)] = c1;
                b[(row, 2)] = c2;
            }
            SectionResponse::My => {
                b[(row, 3)] = c1;
                b[(row, 4)] = c2;
            }
            SectionResponse::T => b[(row, 5)] = il,
        }
    }
    b
}

/// Section forces from basic forces in equilibrium without member loads:
/// `s = b(ξ) q`.
pub(crate) fn force_interpolation(dim: Dimension, types: &[SectionResponse], xi: f64) -> DMatrix<f64> {
    let mut b = DMatrix::zeros(types.len(), dim.n_basic());
    for (row, response) in types.iter().enumerate() {
        match response {
            SectionResponse::P => b[(row, 0)] = 1.0,
            SectionResponse::Mz => {
                b[(row, 1)] = xi - 1.0;
                b[(row, 2)] = xi;
            }
            SectionResponse::My => {
                b[(row, 3)] = xi - 1.0;
                b[(row, 4)] = xi;
            }
            SectionResponse::T => b[(row, 5)] = 1.0,
        }
    }
    b
}

/// Member loads applied to a two-node beam-column.
///
/// Keeps the fixed-end basic forces `q0`, the basic-system support
/// reactions `p0` and the list of applied loads so force-based members can
/// evaluate the particular section forces.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct BeamLoads {
    dim: Dimension,
    pub q0: DVector<f64>,
    pub p0: DVector<f64>,
    applied: Vec<(ElementLoad, f64)>,
    /// Bumped on every change so callers can detect new loads.
    version: u64,
}

impl BeamLoads {
    pub fn new(dim: Dimension) -> Self {
        let n_reactions = match dim {
            Dimension::Two => 3,
            Dimension::Three => 5,
        };
        Self {
            dim,
            q0: DVector::zeros(dim.n_basic()),
            p0: DVector::zeros(n_reactions),
            applied: Vec::new(),
            version: 0,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn zero(&mut self) {
        self.q0.fill(0.0);
        self.p0.fill(0.0);
        self.applied.clear();
        self.version += 1;
    }

    /// Accumulate `factor * load` on a member of length `l`.
    pub fn add(&mut self, load: &ElementLoad, factor: f64, l: f64) -> Result<()> {
        let spatial = self.dim == Dimension::Three;
        match *load {
            ElementLoad::BeamUniform { wy, wz, wx } => {
                let (wy, wz, wx) = (wy * factor, wz * factor, wx * factor);
                let vy = 0.5 * wy * l;
                let mz = vy * l / 6.0;
                let p = wx * l;

                self.p0[0] -= p;
                self.p0[1] -= vy;
                self.p0[2] -= vy;
                self.q0[0] -= 0.5 * p;
                self.q0[1] -= mz;
                self.q0[2] += mz;

                if spatial {
                    let vz = 0.5 * wz * l;
                    let my = vz * l / 6.0;
                    self.p0[3] -= vz;
                    self.p0[4] -= vz;
                    self.q0[3] += my;
                    self.q0[4] -= my;
                }
            }
            ElementLoad::BeamPoint {
                py,
                pz,
                px,
                a_over_l,
            } => {
                if !(0.0..=1.0).contains(&a_over_l) {
                    return Err(Error::configuration(format!(
                        "point load position a/L = {a_over_l} is outside the member"
                    )));
                }
                let (py, pz, n) = (py * factor, pz * factor, px * factor);
                let a = a_over_l * l;
                let b = l - a;
                let l2 = 1.0 / (l * l);

                self.p0[0] -= n;
                self.p0[1] -= py * (1.0 - a_over_l);
                self.p0[2] -= py * a_over_l;
                self.q0[0] -= n * a_over_l;
                self.q0[1] -= a * b * b * py * l2;
                self.q0[2] += a * a * b * py * l2;

                if spatial {
                    self.p0[3] -= pz * (1.0 - a_over_l);
                    self.p0[4] -= pz * a_over_l;
                    self.q0[3] += a * b * b * pz * l2;
                    self.q0[4] -= a * a * b * pz * l2;
                }
            }
        }
        self.applied.push((*load, factor));
        self.version += 1;
        Ok(())
    }

    /// Section forces at `ξ` due to member loads on a simply supported
    /// member of length `l`.
    pub fn section_forces(&self, types: &[SectionResponse], xi: f64, l: f64) -> DVector<f64> {
        let mut sp = DVector::zeros(types.len());
        let x = xi * l;
        for &(load, factor) in &self.applied {
            match load {
                ElementLoad::BeamUniform { wy, wz, wx } => {
                    let (wy, wz, wx) = (wy * factor, wz * factor, wx * factor);
                    for (row, response) in types.iter().enumerate() {
                        sp[row] += match response {
                            SectionResponse::P => wx * (l - x),
                            SectionResponse::Mz => wy * 0.5 * x * (x - l),
                            SectionResponse::My => wz * 0.5 * x * (l - x),
                            SectionResponse::T => 0.0,
                        };
                    }
                }
                ElementLoad::BeamPoint {
                    py,
                    pz,
                    px,
                    a_over_l,
                } => {
                    let (py, pz, n) = (py * factor, pz * factor, px * factor);
                    let a = a_over_l * l;
                    let before = x <= a;
                    let (vy1, vy2) = (py * (1.0 - a_over_l), py * a_over_l);
                    let (vz1, vz2) = (pz * (1.0 - a_over_l), pz * a_over_l);
                    for (row, response) in types.iter().enumerate() {
                        sp[row] += match (response, before) {
                            (SectionResponse::P, true) => n,
                            (SectionResponse::P, false) => 0.0,
                            (SectionResponse::Mz, true) => -x * vy1,
                            (SectionResponse::Mz, false) => -(l - x) * vy2,
                            (SectionResponse::My, true) => x * vz1,
                            (SectionResponse::My, false) => (l - x) * vz2,
                            (SectionResponse::T, _) => 0.0,
                        };
                    }
                }
            }
        }
        sp
    }
}

/// Lumped translational mass of a two-node member with `rho` mass per
/// unit length.
pub(crate) fn lumped_mass(dim: Dimension, rho: f64, l: f64) -> DMatrix<f64> {
    let ndf = dim.ndf();
    let mut m = DMatrix::zeros(2 * ndf, 2 * ndf);
    let half = 0.5 * rho * l;
    for node in 0..2 {
        for d in 0..dim.ndm() {
            let i = node * ndf + d;
            m[(i, i)] = half;
        }
    }
    m
}
