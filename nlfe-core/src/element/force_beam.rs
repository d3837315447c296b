//! Force-based (flexibility) beam-column.
//!
//! Section forces follow from the basic forces by equilibrium,
//! `s(ξ) = b(ξ) q + sp(ξ)`, which holds exactly along the member including
//! member loads. Compatibility is satisfied iteratively: element state
//! determination adjusts `q` until the integrated section deformations
//! match the basic deformations from the transform,
//!
//! ```text
//! F  = Σ w L bᵀ fs b
//! vr = Σ w L bᵀ e
//! dq = F⁻¹ (v − vr)
//! ```
//!
//! The loop is bounded by [`ForceBeamConfig::max_iterations`]. On
//! non-convergence a warning is logged and the last estimate is kept, so
//! the global solver can still converge to an equilibrium state.

use crate::element::beam::{check_section, force_interpolation, lumped_mass, BeamIntegration, BeamLoads};
use crate::element::{Element, ElementLoad, NodalMotion};
use crate::error::{Error, Result};
use crate::section::Section;
use crate::state::{Lifecycle, Phase, Snapshot, Stateful};
use crate::transform::{FrameTransform, GeomTransf};
use crate::types::{Dimension, Point3, Tag};
use nalgebra::{DMatrix, DVector};
use tracing::warn;

/// Element state determination controls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForceBeamConfig {
    /// Maximum compatibility iterations per update.
    pub max_iterations: usize,
    /// Convergence tolerance on the work increment `|dvᵀ dq|`.
    pub tolerance: f64,
}

impl Default for ForceBeamConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            tolerance: 1e-12,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct BasicState {
    v: DVector<f64>,
    q: DVector<f64>,
    kb: DMatrix<f64>,
    /// Load version `q` was computed for; `None` forces a new iteration.
    loads_version: Option<u64>,
}

#[derive(Debug)]
pub struct ForceBeamColumn {
    tag: Tag,
    nodes: [Tag; 2],
    dim: Dimension,
    transform: Box<dyn FrameTransform>,
    sections: Vec<Box<dyn Section>>,
    points: Vec<(f64, f64)>,
    config: ForceBeamConfig,
    rho: f64,
    loads: BeamLoads,
    motion: NodalMotion,
    lifecycle: Lifecycle,
    kb_initial: DMatrix<f64>,
    trial: BasicState,
    committed: BasicState,
    /// Iterations used by the last update.
    iterations: usize,
}

impl ForceBeamColumn {
    /// Build a member with its own transform instance and one copy of
    /// `section` per integration point.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] if the transform cannot be instantiated or
    /// the integration rule is unsupported; [`Error::InvalidSection`] if
    /// the section does not fit the member or the initial element
    /// flexibility is singular.
    pub fn new(
        tag: Tag,
        nodes: [Tag; 2],
        coords: [Point3; 2],
        transform: &GeomTransf,
        section: &dyn Section,
        integration: BeamIntegration,
    ) -> Result<Self> {
        let dim = transform.dimension();
        check_section(dim, section)?;
        let transform = transform.instantiate(coords[0], coords[1])?;
        let points = integration.points()?;
        let sections: Vec<Box<dyn Section>> = points.iter().map(|_| section.clone_box()).collect();

        let l = transform.initial_length();
        let n = dim.n_basic();
        let mut f0 = DMatrix::zeros(n, n);
        for (s, &(xi, w)) in sections.iter().zip(&points) {
            let b = force_interpolation(dim, s.response_types(), xi);
            f0 += b.tr_mul(&(s.initial_flexibility()? * &b)) * (w * l);
        }
        let kb_initial = f0.try_inverse().ok_or_else(|| {
            Error::InvalidSection(format!("element {tag}: initial flexibility is singular"))
        })?;

        let state = BasicState {
            v: DVector::zeros(n),
            q: DVector::zeros(n),
            kb: kb_initial.clone(),
            loads_version: None,
        };
        Ok(Self {
            tag,
            nodes,
            dim,
            transform,
            sections,
            points,
            config: ForceBeamConfig::default(),
            rho: 0.0,
            loads: BeamLoads::new(dim),
            motion: NodalMotion::new(2 * dim.ndf()),
            lifecycle: Lifecycle::new(),
            kb_initial,
            trial: state.clone(),
            committed: state,
            iterations: 0,
        })
    }

    pub fn with_config(mut self, config: ForceBeamConfig) -> Self {
        self.config = config;
        self
    }

    /// Mass per unit length, lumped at the nodes.
    pub fn with_density(mut self, rho: f64) -> Self {
        self.rho = rho;
        self
    }

    pub fn config(&self) -> &ForceBeamConfig {
        &self.config
    }

    pub fn sections(&self) -> &[Box<dyn Section>] {
        &self.sections
    }

    pub fn transform(&self) -> &dyn FrameTransform {
        self.transform.as_ref()
    }

    /// Basic forces in the trial state.
    pub fn basic_force(&self) -> &DVector<f64> {
        &self.trial.q
    }

    /// Compatibility iterations used by the last update.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Element stiffness from the current section flexibilities.
    fn current_stiffness(&self) -> Result<DMatrix<f64>> {
        let l = self.transform.initial_length();
        let n = self.dim.n_basic();
        let mut f = DMatrix::zeros(n, n);
        for (section, &(xi, w)) in self.sections.iter().zip(&self.points) {
            let b = force_interpolation(self.dim, section.response_types(), xi);
            f += b.tr_mul(&(section.flexibility()? * &b)) * (w * l);
        }
        f.try_inverse()
            .ok_or_else(|| Error::update_failure(self.tag, "element flexibility is singular"))
    }

    /// Iterate on `q` until the sections are compatible with `v`.
    fn state_determination(&mut self, v: &DVector<f64>) -> Result<()> {
        let tag = self.tag;
        let l = self.transform.initial_length();
        let n = self.dim.n_basic();
        let dv = v - &self.trial.v;

        let mut q = &self.trial.q + &self.trial.kb * &dv;
        let mut kb = self.trial.kb.clone();
        let mut work = f64::INFINITY;
        let mut iterations = 0;

        while iterations < self.config.max_iterations.max(1) {
            iterations += 1;
            let mut f = DMatrix::zeros(n, n);
            let mut vr = DVector::zeros(n);

            for (section, &(xi, w)) in self.sections.iter_mut().zip(&self.points) {
                let types = section.response_types().to_vec();
                let b = force_interpolation(self.dim, &types, xi);
                let s = &b * &q + self.loads.section_forces(&types, xi, l);

                let fs = section
                    .flexibility()
                    .map_err(|e| Error::update_failure(tag, e.to_string()))?;
                let e = section.deformation() + &fs * (&s - section.stress_resultant());
                section
                    .set_trial_deformation(&e)
                    .map_err(|err| Error::update_failure(tag, err.to_string()))?;

                let fs = section
                    .flexibility()
                    .map_err(|err| Error::update_failure(tag, err.to_string()))?;
                let e_res = &e + &fs * (&s - section.stress_resultant());
                let wl = w * l;
                f += b.tr_mul(&(&fs * &b)) * wl;
                vr += b.tr_mul(&e_res) * wl;
            }

            kb = f
                .try_inverse()
                .ok_or_else(|| Error::update_failure(tag, "element flexibility is singular"))?;
            let dvr = v - &vr;
            let dq = &kb * &dvr;
            work = dvr.dot(&dq).abs();
            q += dq;
            if work < self.config.tolerance {
                break;
            }
        }

        if work >= self.config.tolerance {
            warn!(
                element = tag,
                iterations,
                residual = work,
                "force-based element state determination did not converge"
            );
        }

        self.iterations = iterations;
        self.trial.v.copy_from(v);
        self.trial.q = q;
        self.trial.kb = kb;
        self.trial.loads_version = Some(self.loads.version());
        Ok(())
    }
}

impl Stateful for ForceBeamColumn {
    fn commit_state(&mut self) -> Result<()> {
        self.transform.commit_state()?;
        for section in &mut self.sections {
            section.commit_state()?;
        }
        self.committed = self.trial.clone();
        self.motion.commit();
        self.lifecycle.on_commit();
        Ok(())
    }

    fn revert_to_last_commit(&mut self) -> Result<()> {
        self.transform.revert_to_last_commit()?;
        for section in &mut self.sections {
            section.revert_to_last_commit()?;
        }
        self.trial = self.committed.clone();
        self.motion.revert();
        self.lifecycle.on_revert();
        Ok(())
    }

    fn revert_to_start(&mut self) -> Result<()> {
        self.transform.revert_to_start()?;
        for section in &mut self.sections {
            section.revert_to_start()?;
        }
        let n = self.dim.n_basic();
        self.trial = BasicState {
            v: DVector::zeros(n),
            q: DVector::zeros(n),
            kb: self.kb_initial.clone(),
            loads_version: None,
        };
        self.committed = self.trial.clone();
        self.iterations = 0;
        self.motion.reset();
        self.lifecycle.on_revert_to_start();
        Ok(())
    }
}

impl Element for ForceBeamColumn {
    fn tag(&self) -> Tag {
        self.tag
    }

    fn class_name(&self) -> &'static str {
        match self.dim {
            Dimension::Two => "ForceBeamColumn2d",
            Dimension::Three => "ForceBeamColumn3d",
        }
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

    /// If a section rejects its deformation during state determination,
    /// the sections already visited keep their new trial state while the
    /// basic forces and stiffness are not updated; the element stays
    /// inconsistent until the driver reverts it.
    fn update(&mut self) -> Result<()> {
        self.transform.update(&self.motion.disp)?;
        let v = self.transform.basic_trial_disp();

        let unchanged = (&v - &self.trial.v).norm() <= f64::EPSILON
            && self.trial.loads_version == Some(self.loads.version());
        if !unchanged {
            self.state_determination(&v)?;
        }
        self.lifecycle.on_update();
        Ok(())
    }

    fn tangent_stiff(&self) -> DMatrix<f64> {
        self.transform.global_stiff(&self.trial.kb, &self.trial.q)
    }

    fn initial_stiff(&self) -> DMatrix<f64> {
        self.transform.global_initial_stiff(&self.kb_initial)
    }

    fn mass(&self) -> DMatrix<f64> {
        lumped_mass(self.dim, self.rho, self.transform.initial_length())
    }

    fn resisting_force(&self) -> DVector<f64> {
        self.transform
            .global_resisting_force(&self.trial.q, &self.loads.p0)
    }

    fn add_load(&mut self, load: &ElementLoad, factor: f64) -> Result<()> {
        self.loads.add(load, factor, self.transform.initial_length())
    }

    fn zero_load(&mut self) {
        self.loads.zero();
    }

    fn committed_snapshot(&self) -> Snapshot {
        let data = self
            .committed
            .v
            .iter()
            .chain(self.committed.q.iter())
            .chain(self.motion.committed_disp.iter())
            .copied()
            .collect();
        let mut children = Vec::with_capacity(1 + self.sections.len());
        children.push(self.transform.committed_snapshot());
        children.extend(self.sections.iter().map(|s| s.committed_snapshot()));
        Snapshot::new(self.class_name(), self.tag, data).with_children(children)
    }

    fn restore_snapshot(&mut self, snapshot: &Snapshot) -> Result<()> {
        let n = self.dim.n_basic();
        snapshot.expect_shape(
            self.class_name(),
            2 * n + self.n_dofs(),
            1 + self.sections.len(),
        )?;
        self.transform.restore_snapshot(&snapshot.children[0])?;
        for (section, child) in self.sections.iter_mut().zip(&snapshot.children[1..]) {
            section.restore_snapshot(child)?;
        }
        let kb = self.current_stiffness()?;
        self.committed = BasicState {
            v: DVector::from_column_slice(&snapshot.data[..n]),
            q: DVector::from_column_slice(&snapshot.data[n..2 * n]),
            kb,
            loads_version: Some(self.loads.version()),
        };
        self.trial = self.committed.clone();
        self.motion.restore(&snapshot.data[2 * n..]);
        self.lifecycle = Lifecycle::new();
        self.lifecycle.on_commit();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::{Elastic, ElasticPerfectlyPlastic};
    use crate::section::{ElasticSection, Fiber, FiberSection};
    use crate::transform::TransformKind;
    use approx::assert_relative_eq;

    const EA: f64 = 1000.0;
    const EI: f64 = 30.0;
    const L: f64 = 2.0;

    fn elastic_beam() -> ForceBeamColumn {
        let section = ElasticSection::planar(1, 1.0, EA, EI).unwrap();
        ForceBeamColumn::new(
            1,
            [1, 2],
            [Point3::zeros(), Point3::new(L, 0.0, 0.0)],
            &GeomTransf::planar(1, TransformKind::Linear),
            &section,
            BeamIntegration::Lobatto(5),
        )
        .unwrap()
    }

    fn fiber_beam(kind: TransformKind) -> ForceBeamColumn {
        let mut fibers: Vec<Fiber> = (0..6)
            .map(|i| {
                let y = -0.25 + 0.1 * i as f64;
                let mat = ElasticPerfectlyPlastic::symmetric(i, 1000.0, 2.0).unwrap();
                Fiber::planar(y, 0.05, Box::new(mat))
            })
            .collect();
        // Elastic skin keeps the section tangent invertible after yield
        for y in [-0.25, 0.25] {
            fibers.push(Fiber::planar(y, 0.005, Box::new(Elastic::new(9, 1000.0).unwrap())));
        }
        let section = FiberSection::planar(1, fibers).unwrap();
        ForceBeamColumn::new(
            2,
            [1, 2],
            [Point3::zeros(), Point3::new(L, 0.0, 0.0)],
            &GeomTransf::planar(1, kind),
            &section,
            BeamIntegration::Lobatto(4),
        )
        .unwrap()
    }

    #[test]
    fn test_elastic_stiffness_is_exact() {
        let mut beam = elastic_beam();
        let k = beam.initial_stiff();
        assert_relative_eq!(k[(0, 0)], EA / L, epsilon = 1e-9);
        assert_relative_eq!(k[(1, 1)], 12.0 * EI / L.powi(3), epsilon = 1e-9);
        assert_relative_eq!(k[(2, 5)], 2.0 * EI / L, epsilon = 1e-9);

        let ug = DVector::from_vec(vec![0.0, 0.0, 0.0, 1e-3, 2e-3, -1e-3]);
        beam.set_trial_displacement(&ug).unwrap();
        beam.update().unwrap();
        let ku = &k * &ug;
        assert_relative_eq!((beam.resisting_force() - ku).norm(), 0.0, epsilon = 1e-9);
        assert_relative_eq!((beam.tangent_stiff() - k).norm(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_uniform_load_fixed_end_forces() {
        let mut beam = elastic_beam();
        let load = ElementLoad::BeamUniform {
            wy: -12.0,
            wz: 0.0,
            wx: 0.0,
        };
        beam.add_load(&load, 1.0).unwrap();
        beam.update().unwrap();
        let p = beam.resisting_force();
        assert_relative_eq!(p[1], 12.0, epsilon = 1e-9);
        assert_relative_eq!(p[4], 12.0, epsilon = 1e-9);
        assert_relative_eq!(p[2], 4.0, epsilon = 1e-9);
        assert_relative_eq!(p[5], -4.0, epsilon = 1e-9);
    }

    #[test]
    fn test_update_is_idempotent() {
        let mut beam = fiber_beam(TransformKind::Corotational);
        let ug = DVector::from_vec(vec![0.0, 0.0, 0.0, 0.0, 0.05, 0.02]);
        beam.set_trial_displacement(&ug).unwrap();
        beam.update().unwrap();
        let first = beam.resisting_force();
        beam.update().unwrap();
        assert_eq!(beam.resisting_force(), first);
    }

    #[test]
    fn test_nonlinear_commit_revert() {
        let mut beam = fiber_beam(TransformKind::Linear);
        let k0 = beam.tangent_stiff();

        let small = DVector::from_vec(vec![0.0, 0.0, 0.0, 0.0, 0.002, 0.0]);
        beam.set_trial_displacement(&small).unwrap();
        beam.update().unwrap();
        beam.commit_state().unwrap();
        let (k1, p1) = (beam.tangent_stiff(), beam.resisting_force());

        let large = DVector::from_vec(vec![0.0, 0.0, 0.0, 0.0, 0.05, 0.0]);
        beam.set_trial_displacement(&large).unwrap();
        beam.update().unwrap();
        assert!(beam.tangent_stiff()[(4, 4)] < k1[(4, 4)]);

        beam.revert_to_last_commit().unwrap();
        beam.update().unwrap();
        assert_relative_eq!((beam.tangent_stiff() - &k1).norm(), 0.0, epsilon = 1e-12);
        assert_relative_eq!((beam.resisting_force() - &p1).norm(), 0.0, epsilon = 1e-12);

        beam.revert_to_start().unwrap();
        assert_eq!(beam.phase(), Phase::Initial);
        assert_relative_eq!((beam.tangent_stiff() - &k0).norm(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(beam.resisting_force().norm(), 0.0);
    }

    #[test]
    fn test_bounded_iterations_keep_estimate() {
        let mut beam = fiber_beam(TransformKind::Linear).with_config(ForceBeamConfig {
            max_iterations: 1,
            tolerance: 1e-12,
        });
        let ug = DVector::from_vec(vec![0.0, 0.0, 0.0, 0.0, 0.05, 0.0]);
        beam.set_trial_displacement(&ug).unwrap();
        beam.update().unwrap();
        assert_eq!(beam.iterations(), 1);
        assert!(beam.resisting_force().iter().all(|f| f.is_finite()));
    }

    #[test]
    fn test_singular_section_rejected() {
        // One fiber on the axis carries no bending stiffness
        let fiber = Fiber::planar(0.0, 1.0, Box::new(Elastic::new(1, 10.0).unwrap()));
        let section = FiberSection::planar(1, vec![fiber]).unwrap();
        let result = ForceBeamColumn::new(
            1,
            [1, 2],
            [Point3::zeros(), Point3::new(1.0, 0.0, 0.0)],
            &GeomTransf::planar(1, TransformKind::Linear),
            &section,
            BeamIntegration::default(),
        );
        assert!(matches!(result, Err(Error::InvalidSection(_))));
    }

    #[test]
    fn test_snapshot_restore() {
        let mut beam = fiber_beam(TransformKind::Corotational);
        let ug = DVector::from_vec(vec![0.0, 0.0, 0.0, 0.001, 0.04, 0.01]);
        beam.set_trial_displacement(&ug).unwrap();
        beam.update().unwrap();
        beam.commit_state().unwrap();
        let snap = beam.committed_snapshot();
        assert_eq!(snap.data.len(), 3 + 3 + 6);

        let mut fresh = fiber_beam(TransformKind::Corotational);
        fresh.restore_snapshot(&snap).unwrap();
        assert_eq!(fresh.phase(), Phase::Committed);
        assert_relative_eq!(
            (fresh.resisting_force() - beam.resisting_force()).norm(),
            0.0,
            epsilon = 1e-12
        );
        fresh.update().unwrap();
        assert_eq!(fresh.committed_snapshot(), snap);
    }
}
