//! Two-node axial bar.
//!
//! Small-displacement truss over a uniaxial material:
//! - strain `ε = d · (u_j − u_i) / L` on the translational DOFs
//! - stiffness `(A E_t / L) d dᵀ` in the `[i, j]` block pattern
//! - rotational DOFs of frame models carry nothing
//!
//! Element loads are not supported.

use crate::element::{unsupported_load, Element, ElementLoad, NodalMotion};
use crate::error::{Error, Result};
use crate::material::UniaxialMaterial;
use crate::state::{Lifecycle, Phase, Snapshot, Stateful};
use crate::types::{Dimension, Point3, Tag, Vec3};
use nalgebra::{DMatrix, DVector};

/// Axial bar element.
#[derive(Debug, Clone)]
pub struct Truss {
    tag: Tag,
    nodes: [Tag; 2],
    dim: Dimension,
    material: Box<dyn UniaxialMaterial>,
    area: f64,
    length: f64,
    /// Unit vector from node i to node j.
    dir: Vec3,
    rho: f64,
    consistent_mass: bool,
    motion: NodalMotion,
    lifecycle: Lifecycle,
}

impl Truss {
    /// Create a truss between `coords[0]` and `coords[1]`, taking
    /// ownership of its own material copy.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] for a non-positive area or coincident
    /// nodes.
    pub fn new(
        tag: Tag,
        nodes: [Tag; 2],
        coords: [Point3; 2],
        dim: Dimension,
        material: Box<dyn UniaxialMaterial>,
        area: f64,
    ) -> Result<Self> {
        if !(area > 0.0) {
            return Err(Error::configuration(format!(
                "truss {tag}: area must be positive, got {area}"
            )));
        }
        let dx = coords[1] - coords[0];
        let length = dx.norm();
        if !(length > f64::EPSILON) {
            return Err(Error::configuration(format!(
                "truss {tag}: nodes {} and {} coincide",
                nodes[0], nodes[1]
            )));
        }
        Ok(Self {
            tag,
            nodes,
            dim,
            material,
            area,
            length,
            dir: dx / length,
            rho: 0.0,
            consistent_mass: false,
            motion: NodalMotion::new(2 * dim.ndf()),
            lifecycle: Lifecycle::new(),
        })
    }

    /// Mass per unit length.
    pub fn with_density(mut self, rho: f64) -> Self {
        self.rho = rho;
        self
    }

    /// Use the consistent instead of the lumped mass matrix.
    pub fn consistent_mass(mut self, consistent: bool) -> Self {
        self.consistent_mass = consistent;
        self
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn area(&self) -> f64 {
        self.area
    }

    pub fn material(&self) -> &dyn UniaxialMaterial {
        self.material.as_ref()
    }

    /// Axial force `A σ` in the trial state.
    pub fn axial_force(&self) -> f64 {
        self.area * self.material.stress()
    }

    fn strain(&self) -> f64 {
        let ndf = self.dim.ndf();
        let ug = &self.motion.disp;
        let du: f64 = (0..self.dim.ndm())
            .map(|d| self.dir[d] * (ug[ndf + d] - ug[d]))
            .sum();
        du / self.length
    }

    fn stiffness_with(&self, tangent: f64) -> DMatrix<f64> {
        let ndf = self.dim.ndf();
        let mut k = DMatrix::zeros(2 * ndf, 2 * ndf);
        let ea_l = self.area * tangent / self.length;
        let ndm = self.dim.ndm();
        for a in 0..ndm {
            for b in 0..ndm {
                let kab = ea_l * self.dir[a] * self.dir[b];
                k[(a, b)] = kab;
                k[(ndf + a, ndf + b)] = kab;
                k[(a, ndf + b)] = -kab;
                k[(ndf + a, b)] = -kab;
            }
        }
        k
    }
}

impl Stateful for Truss {
    fn commit_state(&mut self) -> Result<()> {
        self.material.commit_state()?;
        self.motion.commit();
        self.lifecycle.on_commit();
        Ok(())
    }

    fn revert_to_last_commit(&mut self) -> Result<()> {
        self.material.revert_to_last_commit()?;
        self.motion.revert();
        self.lifecycle.on_revert();
        Ok(())
    }

    fn revert_to_start(&mut self) -> Result<()> {
        self.material.revert_to_start()?;
        self.motion.reset();
        self.lifecycle.on_revert_to_start();
        Ok(())
    }
}

impl Element for Truss {
    fn tag(&self) -> Tag {
        self.tag
    }

    fn class_name(&self) -> &'static str {
        "Truss"
    }

    fn nodes(&self) -> &[Tag] {
        &self.nodes
    }

    fn dofs_per_node(&self) -> usize {
        self.dim.ndf()
    }

    fn phase(&self) -> Phase {
        self.lifecycle.phase()
    }

    fn set_trial_displacement(&mut self, ug: &DVector<f64>) -> Result<()> {
        self.motion.set_disp(self.tag, ug)
    }

    fn set_trial_acceleration(&mut self, ag: &DVector<f64>) -> Result<()> {
        self.motion.set_accel(self.tag, ag)
    }

    fn trial_acceleration(&self) -> &DVector<f64> {
        &self.motion.accel
    }

    fn committed_displacement(&self) -> &DVector<f64> {
        &self.motion.committed_disp
    }

    fn update(&mut self) -> Result<()> {
        let strain = self.strain();
        self.material
            .set_trial_strain(strain)
            .map_err(|e| Error::update_failure(self.tag, e.to_string()))?;
        self.lifecycle.on_update();
        Ok(())
    }

    fn tangent_stiff(&self) -> DMatrix<f64> {
        self.stiffness_with(self.material.tangent())
    }

    fn initial_stiff(&self) -> DMatrix<f64> {
        self.stiffness_with(self.material.initial_tangent())
    }

    fn mass(&self) -> DMatrix<f64> {
        let ndf = self.dim.ndf();
        let mut m = DMatrix::zeros(2 * ndf, 2 * ndf);
        if self.rho == 0.0 {
            return m;
        }
        let total = self.rho * self.length;
        for d in 0..self.dim.ndm() {
            if self.consistent_mass {
                let (diag, off) = (total / 3.0, total / 6.0);
                m[(d, d)] = diag;
                m[(ndf + d, ndf + d)] = diag;
                m[(d, ndf + d)] = off;
                m[(ndf + d, d)] = off;
            } else {
                m[(d, d)] = 0.5 * total;
                m[(ndf + d, ndf + d)] = 0.5 * total;
            }
        }
        m
    }

    fn resisting_force(&self) -> DVector<f64> {
        let ndf = self.dim.ndf();
        let mut p = DVector::zeros(2 * ndf);
        let n = self.axial_force();
        for d in 0..self.dim.ndm() {
            p[d] = -n * self.dir[d];
            p[ndf + d] = n * self.dir[d];
        }
        p
    }

    fn add_load(&mut self, load: &ElementLoad, _factor: f64) -> Result<()> {
        Err(unsupported_load(self.class_name(), load))
    }

    fn zero_load(&mut self) {}

    fn committed_snapshot(&self) -> Snapshot {
        Snapshot::new(
            self.class_name(),
            self.tag,
            self.motion.committed_disp.iter().copied().collect(),
        )
        .with_children(vec![self.material.committed_snapshot()])
    }

    fn restore_snapshot(&mut self, snapshot: &Snapshot) -> Result<()> {
        snapshot.expect_shape(self.class_name(), self.n_dofs(), 1)?;
        self.material.restore_snapshot(&snapshot.children[0])?;
        self.motion.restore(&snapshot.data);
        self.lifecycle = Lifecycle::new();
        self.lifecycle.on_commit();
        Ok(())
    }
}
