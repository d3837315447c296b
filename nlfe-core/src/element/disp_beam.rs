//! Displacement-based beam-column.
//!
//! Transverse displacements are interpolated with cubic Hermite functions
//! and axial displacements linearly, so section deformations follow
//! directly from the basic deformations:
//!
//! ```text
//! e(ξ) = B(ξ) v
//! q    = Σ w L Bᵀ s(e)
//! kb   = Σ w L Bᵀ ks B
//! ```
//!
//! Member loads enter as fixed-end forces `q0` and support reactions `p0`.

use crate::element::beam::{check_section, lumped_mass, strain_interpolation, BeamIntegration, BeamLoads};
use crate::element::{Element, ElementLoad, NodalMotion};
use crate::error::{Error, Result};
use crate::section::Section;
use crate::state::{Lifecycle, Phase, Snapshot, Stateful};
use crate::transform::{FrameTransform, GeomTransf};
use crate::types::{Dimension, Point3, Tag};
use nalgebra::{DMatrix, DVector};

#[derive(Debug)]
pub struct DispBeamColumn {
    tag: Tag,
    nodes: [Tag; 2],
    dim: Dimension,
    transform: Box<dyn FrameTransform>,
    sections: Vec<Box<dyn Section>>,
    /// `(ξ, w)` on the unit interval, one per section.
    points: Vec<(f64, f64)>,
    rho: f64,
    loads: BeamLoads,
    motion: NodalMotion,
    lifecycle: Lifecycle,
    /// Basic forces from the section resultants, without `q0`.
    q: DVector<f64>,
    kb: DMatrix<f64>,
}

impl DispBeamColumn {
    /// Build a member with its own transform instance and one copy of
    /// `section` per integration point.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] if the transform cannot be instantiated
    /// between the nodes or the integration rule is unsupported;
    /// [`Error::InvalidSection`] if the section does not fit the member
    /// dimension.
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
        let sections = points.iter().map(|_| section.clone_box()).collect();

        let mut element = Self {
            tag,
            nodes,
            dim,
            transform,
            sections,
            points,
            rho: 0.0,
            loads: BeamLoads::new(dim),
            motion: NodalMotion::new(2 * dim.ndf()),
            lifecycle: Lifecycle::new(),
            q: DVector::zeros(dim.n_basic()),
            kb: DMatrix::zeros(dim.n_basic(), dim.n_basic()),
        };
        element.form_basic();
        Ok(element)
    }

    /// Mass per unit length, lumped at the nodes.
    pub fn with_density(mut self, rho: f64) -> Self {
        self.rho = rho;
        self
    }

    pub fn sections(&self) -> &[Box<dyn Section>] {
        &self.sections
    }

    pub fn transform(&self) -> &dyn FrameTransform {
        self.transform.as_ref()
    }

    /// Basic forces including fixed-end forces.
    pub fn basic_force(&self) -> DVector<f64> {
        &self.q + &self.loads.q0
    }

    /// Integrate basic force and stiffness from the current section state.
    fn form_basic(&mut self) {
        let l = self.transform.initial_length();
        self.q.fill(0.0);
        self.kb.fill(0.0);
        for (section, &(xi, w)) in self.sections.iter().zip(&self.points) {
            let b = strain_interpolation(self.dim, section.response_types(), xi, l);
            let wl = w * l;
            self.q += b.tr_mul(&section.stress_resultant()) * wl;
            self.kb += b.tr_mul(&(section.tangent() * &b)) * wl;
        }
    }
}

impl Stateful for DispBeamColumn {
    fn commit_state(&mut self) -> Result<()> {
        self.transform.commit_state()?;
        for section in &mut self.sections {
            section.commit_state()?;
        }
        self.motion.commit();
        self.lifecycle.on_commit();
        Ok(())
    }

    fn revert_to_last_commit(&mut self) -> Result<()> {
        self.transform.revert_to_last_commit()?;
        for section in &mut self.sections {
            section.revert_to_last_commit()?;
        }
        self.motion.revert();
        self.form_basic();
        self.lifecycle.on_revert();
        Ok(())
    }

    fn revert_to_start(&mut self) -> Result<()> {
        self.transform.revert_to_start()?;
        for section in &mut self.sections {
            section.revert_to_start()?;
        }
        self.motion.reset();
        self.form_basic();
        self.lifecycle.on_revert_to_start();
        Ok(())
    }
}

impl Element for DispBeamColumn {
    fn tag(&self) -> Tag {
        self.tag
    }

    fn class_name(&self) -> &'static str {
        match self.dim {
            Dimension::Two => "DispBeamColumn2d",
            Dimension::Three => "DispBeamColumn3d",
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

    /// Sections are updated in order. If section `k` rejects its
    /// deformation, sections before it keep their new trial state while
    /// `q` and `kb` still describe the previous one; the element stays
    /// inconsistent until the driver reverts it.
    fn update(&mut self) -> Result<()> {
        self.transform.update(&self.motion.disp)?;
        let v = self.transform.basic_trial_disp();
        let l = self.transform.initial_length();
        let tag = self.tag;

        for (section, &(xi, _)) in self.sections.iter_mut().zip(&self.points) {
            let b = strain_interpolation(self.dim, section.response_types(), xi, l);
            section
                .set_trial_deformation(&(b * &v))
                .map_err(|e| Error::update_failure(tag, e.to_string()))?;
        }
        self.form_basic();
        self.lifecycle.on_update();
        Ok(())
    }

    fn tangent_stiff(&self) -> DMatrix<f64> {
        self.transform.global_stiff(&self.kb, &self.basic_force())
    }

    fn initial_stiff(&self) -> DMatrix<f64> {
        let l = self.transform.initial_length();
        let n = self.dim.n_basic();
        let kb0 = self
            .sections
            .iter()
            .zip(&self.points)
            .fold(DMatrix::zeros(n, n), |acc, (section, &(xi, w))| {
                let b = strain_interpolation(self.dim, section.response_types(), xi, l);
                acc + b.tr_mul(&(section.initial_tangent() * &b)) * (w * l)
            });
        self.transform.global_initial_stiff(&kb0)
    }

    fn mass(&self) -> DMatrix<f64> {
        lumped_mass(self.dim, self.rho, self.transform.initial_length())
    }

    fn resisting_force(&self) -> DVector<f64> {
        self.transform
            .global_resisting_force(&self.basic_force(), &self.loads.p0)
    }

    fn add_load(&mut self, load: &ElementLoad, factor: f64) -> Result<()> {
        self.loads.add(load, factor, self.transform.initial_length())
    }

    fn zero_load(&mut self) {
        self.loads.zero();
    }

    fn committed_snapshot(&self) -> Snapshot {
        let mut children = Vec::with_capacity(1 + self.sections.len());
        children.push(self.transform.committed_snapshot());
        children.extend(self.sections.iter().map(|s| s.committed_snapshot()));
        Snapshot::new(
            self.class_name(),
            self.tag,
            self.motion.committed_disp.iter().copied().collect(),
        )
        .with_children(children)
    }

    fn restore_snapshot(&mut self, snapshot: &Snapshot) -> Result<()> {
        snapshot.expect_shape(self.class_name(), self.n_dofs(), 1 + self.sections.len())?;
        self.transform.restore_snapshot(&snapshot.children[0])?;
        for (section, child) in self.sections.iter_mut().zip(&snapshot.children[1..]) {
            section.restore_snapshot(child)?;
        }
        self.motion.restore(&snapshot.data);
        self.form_basic();
        self.lifecycle = Lifecycle::new();
        self.lifecycle.on_commit();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backbone::{Backbone, MultilinearBackbone};
    use crate::material::{ElasticPerfectlyPlastic, OriginOriented};
    use crate::section::{ElasticSection, Fiber, FiberSection};
    use crate::transform::TransformKind;
    use crate::types::Vec3;
    use approx::assert_relative_eq;
    use std::sync::Arc;

    const EA: f64 = 1000.0;
    const EI: f64 = 30.0;
    const L: f64 = 2.0;

    fn elastic_beam(kind: TransformKind) -> DispBeamColumn {
        let section = ElasticSection::planar(1, 1.0, EA, EI).unwrap();
        DispBeamColumn::new(
            1,
            [1, 2],
            [Point3::zeros(), Point3::new(L, 0.0, 0.0)],
            &GeomTransf::planar(1, kind),
            &section,
            BeamIntegration::Legendre(2),
        )
        .unwrap()
    }

    #[test]
    fn test_elastic_stiffness_is_exact() {
        let beam = elastic_beam(TransformKind::Linear);
        let k = beam.initial_stiff();
        assert_relative_eq!(k[(0, 0)], EA / L, epsilon = 1e-10);
        assert_relative_eq!(k[(1, 1)], 12.0 * EI / L.powi(3), epsilon = 1e-10);
        assert_relative_eq!(k[(1, 2)], 6.0 * EI / L.powi(2), epsilon = 1e-10);
        assert_relative_eq!(k[(2, 2)], 4.0 * EI / L, epsilon = 1e-10);
        assert_relative_eq!(k[(2, 5)], 2.0 * EI / L, epsilon = 1e-10);
        assert_relative_eq!((&k - beam.tangent_stiff()).norm(), 0.0, epsilon = 1e-10);
    }

    #[test]
    fn test_resisting_force_consistent_with_stiffness() {
        let mut beam = elastic_beam(TransformKind::Linear);
        let ug = DVector::from_vec(vec![0.0, 0.0, 0.0, 1e-3, 2e-3, -1e-3]);
        beam.set_trial_displacement(&ug).unwrap();
        beam.update().unwrap();
        assert_eq!(beam.phase(), Phase::Trial);
        let ku = beam.initial_stiff() * &ug;
        assert_relative_eq!((beam.resisting_force() - ku).norm(), 0.0, epsilon = 1e-10);
    }

    #[test]
    fn test_uniform_load_fixed_end_forces() {
        let mut beam = elastic_beam(TransformKind::Linear);
        let load = ElementLoad::BeamUniform {
            wy: -6.0,
            wz: 0.0,
            wx: 0.0,
        };
        beam.add_load(&load, 2.0).unwrap();
        let p = beam.resisting_force();
        // w = -12 over L = 2: shear 12 and end moments ±4
        assert_relative_eq!(p[1], 12.0, epsilon = 1e-12);
        assert_relative_eq!(p[4], 12.0, epsilon = 1e-12);
        assert_relative_eq!(p[2], 4.0, epsilon = 1e-12);
        assert_relative_eq!(p[5], -4.0, epsilon = 1e-12);

        beam.zero_load();
        assert_relative_eq!(beam.resisting_force().norm(), 0.0);
    }

    #[test]
    fn test_commit_then_revert_leaves_outputs_unchanged() {
        let fy = 5.0;
        let fibers = (0..4)
            .map(|i| {
                let y = -0.15 + 0.1 * i as f64;
                let mat = ElasticPerfectlyPlastic::symmetric(i, 1000.0, fy).unwrap();
                Fiber::planar(y, 0.05, Box::new(mat))
            })
            .collect();
        let section = FiberSection::planar(1, fibers).unwrap();
        let mut beam = DispBeamColumn::new(
            2,
            [1, 2],
            [Point3::zeros(), Point3::new(L, 0.0, 0.0)],
            &GeomTransf::planar(1, TransformKind::Corotational),
            &section,
            BeamIntegration::Lobatto(3),
        )
        .unwrap();
        let k0 = beam.tangent_stiff();

        beam.set_trial_displacement(&DVector::from_vec(vec![0.0, 0.0, 0.0, 0.0, 0.01, 0.0]))
            .unwrap();
        beam.update().unwrap();
        beam.commit_state().unwrap();
        let (k1, p1) = (beam.tangent_stiff(), beam.resisting_force());

        // Trial step well into yield, then rejected
        beam.set_trial_displacement(&DVector::from_vec(vec![0.0, 0.0, 0.0, 0.0, 0.2, 0.05]))
            .unwrap();
        beam.update().unwrap();
        beam.revert_to_last_commit().unwrap();
        assert_eq!(beam.phase(), Phase::Committed);
        assert_relative_eq!((beam.tangent_stiff() - &k1).norm(), 0.0, epsilon = 1e-12);
        assert_relative_eq!((beam.resisting_force() - &p1).norm(), 0.0, epsilon = 1e-12);

        beam.revert_to_start().unwrap();
        assert_relative_eq!((beam.tangent_stiff() - &k0).norm(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(beam.resisting_force().norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rejected_section_recovers_on_revert() {
        let backbone: Arc<dyn Backbone> =
            Arc::new(MultilinearBackbone::bilinear(1, 1000.0, 5.0, 10.0, 0.02).unwrap());
        let fibers = [-0.1, 0.1]
            .into_iter()
            .enumerate()
            .map(|(i, y)| {
                let mat = OriginOriented::symmetric(i as Tag, backbone.clone()).unwrap();
                Fiber::planar(y, 0.05, Box::new(mat))
            })
            .collect();
        let section = FiberSection::planar(1, fibers).unwrap();
        let mut beam = DispBeamColumn::new(
            3,
            [1, 2],
            [Point3::zeros(), Point3::new(L, 0.0, 0.0)],
            &GeomTransf::planar(1, TransformKind::Linear),
            &section,
            BeamIntegration::Lobatto(3),
        )
        .unwrap();

        beam.set_trial_displacement(&DVector::from_vec(vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.01]))
            .unwrap();
        beam.update().unwrap();
        beam.commit_state().unwrap();
        let (k1, p1) = (beam.tangent_stiff(), beam.resisting_force());

        // Curvature 4θ/L at the j end pushes its fibers past the backbone
        // while the other two sections accept theirs
        beam.set_trial_displacement(&DVector::from_vec(vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.15]))
            .unwrap();
        let err = beam.update().unwrap_err();
        assert!(matches!(err, Error::UpdateFailure { tag: 3, .. }));
        assert!(err.is_recoverable());

        beam.revert_to_last_commit().unwrap();
        assert_relative_eq!((beam.tangent_stiff() - &k1).norm(), 0.0, epsilon = 1e-12);
        assert_relative_eq!((beam.resisting_force() - &p1).norm(), 0.0, epsilon = 1e-12);
        beam.update().unwrap();
        assert_relative_eq!((beam.resisting_force() - &p1).norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_planar_member_rejects_spatial_section() {
        let section = ElasticSection::spatial(1, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0).unwrap();
        let result = DispBeamColumn::new(
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
    fn test_spatial_torsion_and_mass() {
        let section = ElasticSection::spatial(1, 1.0, 100.0, 3.0, 2.0, 1.0, 5.0).unwrap();
        let transf = GeomTransf::spatial(1, TransformKind::Linear, Vec3::z()).unwrap();
        let mut beam = DispBeamColumn::new(
            1,
            [1, 2],
            [Point3::zeros(), Point3::new(0.0, 0.0, L)],
            &transf,
            &section,
            BeamIntegration::Lobatto(4),
        );
        // Vertical member parallel to vecxz
        assert!(beam.is_err());

        beam = DispBeamColumn::new(
            1,
            [1, 2],
            [Point3::zeros(), Point3::new(L, 0.0, 0.0)],
            &transf,
            &section,
            BeamIntegration::Lobatto(4),
        );
        let beam = beam.unwrap().with_density(3.0);
        let k = beam.initial_stiff();
        assert_relative_eq!(k[(3, 3)], 5.0 / L, epsilon = 1e-10);
        assert_relative_eq!(k[(2, 2)], 12.0 * 2.0 / L.powi(3), epsilon = 1e-10);
        let m = beam.mass();
        assert_relative_eq!(m[(0, 0)], 3.0);
        assert_relative_eq!(m[(3, 3)], 0.0);
    }

    #[test]
    fn test_snapshot_restore() {
        let mut beam = elastic_beam(TransformKind::Corotational);
        let ug = DVector::from_vec(vec![0.0, 0.0, 0.0, 0.01, 0.3, 0.2]);
        beam.set_trial_displacement(&ug).unwrap();
        beam.update().unwrap();
        beam.commit_state().unwrap();
        let snap = beam.committed_snapshot();
        assert_eq!(snap.children.len(), 3);

        let mut fresh = elastic_beam(TransformKind::Corotational);
        fresh.restore_snapshot(&snap).unwrap();
        assert_relative_eq!(
            (fresh.resisting_force() - beam.resisting_force()).norm(),
            0.0,
            epsilon = 1e-12
        );
        assert_eq!(fresh.committed_snapshot(), snap);
    }
}
