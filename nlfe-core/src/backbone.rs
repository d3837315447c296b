//! Monotonic backbone (envelope) curves.
//!
//! Backbones are configuration-only: the registry hands out shared
//! references, and hysteretic materials read them without mutation.

use crate::error::{Error, Result};
use crate::types::Tag;
use std::fmt::Debug;

/// Envelope of a hysteretic law, defined for non-negative strain.
pub trait Backbone: Send + Sync + Debug {
    fn tag(&self) -> Tag;

    fn class_name(&self) -> &'static str;

    /// Envelope stress at `strain >= 0`.
    fn stress(&self, strain: f64) -> f64;

    /// Envelope tangent at `strain >= 0`.
    fn tangent(&self, strain: f64) -> f64;

    /// Largest strain for which the envelope is defined.
    fn strain_limit(&self) -> f64;
}

/// Piecewise-linear envelope through the origin and a list of
/// (strain, stress) points with strictly increasing strain.
#[derive(Debug, Clone, PartialEq)]
pub struct MultilinearBackbone {
    tag: Tag,
    strains: Vec<f64>,
    stresses: Vec<f64>,
}

impl MultilinearBackbone {
    /// # Errors
    ///
    /// Returns error if `points` is empty, any strain is not positive, or
    /// strains are not strictly increasing.
    pub fn new(tag: Tag, points: &[(f64, f64)]) -> Result<Self> {
        if points.is_empty() {
            return Err(Error::InvalidMaterial(
                "backbone needs at least one point".into(),
            ));
        }
        let mut strains = Vec::with_capacity(points.len() + 1);
        let mut stresses = Vec::with_capacity(points.len() + 1);
        strains.push(0.0);
        stresses.push(0.0);
        for &(strain, stress) in points {
            let prev = strains[strains.len() - 1];
            if !(strain > prev) || !stress.is_finite() {
                return Err(Error::InvalidMaterial(format!(
                    "backbone strains must be positive and strictly increasing, got {strain} after {prev}"
                )));
            }
            strains.push(strain);
            stresses.push(stress);
        }
        Ok(Self {
            tag,
            strains,
            stresses,
        })
    }

    /// Bilinear envelope: elastic to (`eps_y`, `fy`) then hardening slope
    /// up to `eps_u`.
    pub fn bilinear(tag: Tag, e: f64, fy: f64, hardening: f64, eps_u: f64) -> Result<Self> {
        let eps_y = fy / e;
        let fu = fy + hardening * (eps_u - eps_y);
        Self::new(tag, &[(eps_y, fy), (eps_u, fu)])
    }

    /// Index of the segment containing `strain` (segment `i` spans
    /// `strains[i]..=strains[i + 1]`).
    fn segment(&self, strain: f64) -> Option<usize> {
        (0..self.strains.len() - 1).find(|&i| strain <= self.strains[i + 1])
    }
}

impl Backbone for MultilinearBackbone {
    fn tag(&self) -> Tag {
        self.tag
    }

    fn class_name(&self) -> &'static str {
        "Multilinear"
    }

    fn stress(&self, strain: f64) -> f64 {
        let strain = strain.max(0.0);
        match self.segment(strain) {
            Some(i) => {
                let (e0, e1) = (self.strains[i], self.strains[i + 1]);
                let (s0, s1) = (self.stresses[i], self.stresses[i + 1]);
                s0 + (s1 - s0) * (strain - e0) / (e1 - e0)
            }
            None => self.stresses[self.stresses.len() - 1],
        }
    }

    fn tangent(&self, strain: f64) -> f64 {
        let strain = strain.max(0.0);
        match self.segment(strain) {
            Some(i) => {
                (self.stresses[i + 1] - self.stresses[i]) / (self.strains[i + 1] - self.strains[i])
            }
            None => 0.0,
        }
    }

    fn strain_limit(&self) -> f64 {
        self.strains[self.strains.len() - 1]
    }
}
