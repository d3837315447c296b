//! Analysis instance: registry, nodes, elements and global trial state.
//!
//! A [`Model`] wires elements to nodes and drives their state machine.
//! It does not assemble or solve; an external driver reads element
//! tangents and forces through [`Model::element`] and
//! [`Model::element_dofs`].
//!
//! Global DOFs are numbered node by node in insertion order,
//! `dof = node_index * ndf + local_dof`.

use crate::element::{BeamIntegration, DispBeamColumn, Element, ElementLoad, ForceBeamColumn, ForceBeamConfig, Truss};
use crate::error::{Error, Result};
use crate::registry::{Key, Registry, Sections, Transforms, UniaxialMaterials};
use crate::state::Snapshot;
use crate::types::{Dimension, Node, Point3, Tag};
use nalgebra::DVector;
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::debug;

/// Model configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelConfig {
    /// Spatial dimension; fixes DOFs per node.
    pub dimension: Dimension,
    /// Update elements on the rayon thread pool.
    pub parallel_update: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            dimension: Dimension::Three,
            parallel_update: true,
        }
    }
}

impl ModelConfig {
    pub fn planar() -> Self {
        Self {
            dimension: Dimension::Two,
            ..Self::default()
        }
    }
}

#[derive(Debug)]
struct ElementEntry {
    element: Box<dyn Element>,
    /// Global DOF of each element DOF.
    dofs: Vec<usize>,
}

/// One analysis instance.
#[derive(Debug)]
pub struct Model {
    config: ModelConfig,
    registry: Registry,
    nodes: Vec<Node>,
    node_index: HashMap<Tag, usize>,
    elements: Vec<ElementEntry>,
    element_index: HashMap<Tag, usize>,
    trial_disp: DVector<f64>,
    committed_disp: DVector<f64>,
    trial_accel: DVector<f64>,
}

impl Model {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            registry: Registry::new(),
            nodes: Vec::new(),
            node_index: HashMap::new(),
            elements: Vec::new(),
            element_index: HashMap::new(),
            trial_disp: DVector::zeros(0),
            committed_disp: DVector::zeros(0),
            trial_accel: DVector::zeros(0),
        }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn dimension(&self) -> Dimension {
        self.config.dimension
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn n_elements(&self) -> usize {
        self.elements.len()
    }

    /// Total number of global DOFs.
    pub fn n_dofs(&self) -> usize {
        self.nodes.len() * self.config.dimension.ndf()
    }

    /// Add a node at `crd`. Planar models require `crd.z == 0`.
    pub fn add_node(&mut self, tag: Tag, crd: Point3) -> Result<()> {
        if self.node_index.contains_key(&tag) {
            return Err(Error::NameConflict {
                category: "Node",
                key: tag.to_string(),
            });
        }
        if self.config.dimension == Dimension::Two && crd.z != 0.0 {
            return Err(Error::configuration(format!(
                "node {tag}: planar model node has z = {}",
                crd.z
            )));
        }
        self.node_index.insert(tag, self.nodes.len());
        self.nodes.push(Node::new(tag, crd));

        let n = self.n_dofs();
        self.trial_disp.resize_vertically_mut(n, 0.0);
        self.committed_disp.resize_vertically_mut(n, 0.0);
        self.trial_accel.resize_vertically_mut(n, 0.0);
        Ok(())
    }

    pub fn node(&self, tag: Tag) -> Result<&Node> {
        self.node_index
            .get(&tag)
            .map(|&i| &self.nodes[i])
            .ok_or_else(|| Error::NotFound {
                category: "Node",
                key: tag.to_string(),
            })
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Global index of `dof` at node `node`.
    pub fn dof(&self, node: Tag, dof: usize) -> Result<usize> {
        let ndf = self.config.dimension.ndf();
        if dof >= ndf {
            return Err(Error::configuration(format!(
                "dof {dof} out of range for {ndf} DOFs per node"
            )));
        }
        let index = self.node_index.get(&node).ok_or_else(|| Error::NotFound {
            category: "Node",
            key: node.to_string(),
        })?;
        Ok(index * ndf + dof)
    }

    /// Add a constructed element.
    ///
    /// # Errors
    ///
    /// - [`Error::NameConflict`] if the tag is already used
    /// - [`Error::NotFound`] if a connected node does not exist
    /// - [`Error::Configuration`] if the element's DOFs per node do not
    ///   match the model
    pub fn add_element(&mut self, element: Box<dyn Element>) -> Result<()> {
        let tag = element.tag();
        if self.element_index.contains_key(&tag) {
            return Err(Error::NameConflict {
                category: "Element",
                key: tag.to_string(),
            });
        }
        let ndf = self.config.dimension.ndf();
        if element.dofs_per_node() != ndf {
            return Err(Error::configuration(format!(
                "element {tag} has {} DOFs per node, model has {ndf}",
                element.dofs_per_node()
            )));
        }

        let mut dofs = Vec::with_capacity(element.n_dofs());
        for &node in element.nodes() {
            let first = self.dof(node, 0)?;
            dofs.extend(first..first + ndf);
        }

        debug!(element = tag, class = element.class_name(), "added element");
        self.element_index.insert(tag, self.elements.len());
        self.elements.push(ElementEntry { element, dofs });
        Ok(())
    }

    fn coords(&self, nodes: [Tag; 2]) -> Result<[Point3; 2]> {
        Ok([self.node(nodes[0])?.crd, self.node(nodes[1])?.crd])
    }

    /// Build a [`Truss`] with a copy of the registered material.
    pub fn add_truss(
        &mut self,
        tag: Tag,
        nodes: [Tag; 2],
        material: impl Into<Key>,
        area: f64,
    ) -> Result<()> {
        let coords = self.coords(nodes)?;
        let material = self.registry.get::<UniaxialMaterials>(material)?;
        let truss = Truss::new(tag, nodes, coords, self.config.dimension, material, area)?;
        self.add_element(Box::new(truss))
    }

    /// Build a [`DispBeamColumn`] from registered transform and section.
    pub fn add_disp_beam(
        &mut self,
        tag: Tag,
        nodes: [Tag; 2],
        transform: impl Into<Key>,
        section: impl Into<Key>,
        integration: BeamIntegration,
    ) -> Result<()> {
        let coords = self.coords(nodes)?;
        let transform = self.registry.get::<Transforms>(transform)?;
        self.check_transform_dimension(transform.dimension())?;
        let section = self.registry.get::<Sections>(section)?;
        let beam = DispBeamColumn::new(tag, nodes, coords, &transform, section.as_ref(), integration)?;
        self.add_element(Box::new(beam))
    }

    /// Build a [`ForceBeamColumn`] from registered transform and section.
    pub fn add_force_beam(
        &mut self,
        tag: Tag,
        nodes: [Tag; 2],
        transform: impl Into<Key>,
        section: impl Into<Key>,
        integration: BeamIntegration,
        config: ForceBeamConfig,
    ) -> Result<()> {
        let coords = self.coords(nodes)?;
        let transform = self.registry.get::<Transforms>(transform)?;
        self.check_transform_dimension(transform.dimension())?;
        let section = self.registry.get::<Sections>(section)?;
        let beam = ForceBeamColumn::new(tag, nodes, coords, &transform, section.as_ref(), integration)?
            .with_config(config);
        self.add_element(Box::new(beam))
    }

    fn check_transform_dimension(&self, dim: Dimension) -> Result<()> {
        if dim != self.config.dimension {
            return Err(Error::configuration(format!(
                "{}-D transform in a {}-D model",
                dim.ndm(),
                self.config.dimension.ndm()
            )));
        }
        Ok(())
    }

    pub fn element(&self, tag: Tag) -> Result<&dyn Element> {
        let index = self.element_position(tag)?;
        Ok(self.elements[index].element.as_ref())
    }

    pub fn element_mut(&mut self, tag: Tag) -> Result<&mut dyn Element> {
        let index = self.element_position(tag)?;
        Ok(self.elements[index].element.as_mut())
    }

    /// Global DOFs of element `tag`, in element order.
    pub fn element_dofs(&self, tag: Tag) -> Result<&[usize]> {
        let index = self.element_position(tag)?;
        Ok(&self.elements[index].dofs)
    }

    /// Element tags in insertion order.
    pub fn element_tags(&self) -> Vec<Tag> {
        self.elements.iter().map(|e| e.element.tag()).collect()
    }

    fn element_position(&self, tag: Tag) -> Result<usize> {
        self.element_index
            .get(&tag)
            .copied()
            .ok_or_else(|| Error::NotFound {
                category: "Element",
                key: tag.to_string(),
            })
    }

    pub fn trial_displacement(&self) -> &DVector<f64> {
        &self.trial_disp
    }

    pub fn set_trial_displacement(&mut self, u: &DVector<f64>) -> Result<()> {
        check_len(self.n_dofs(), u)?;
        self.trial_disp.copy_from(u);
        Ok(())
    }

    /// Set one trial displacement component.
    pub fn set_nodal_displacement(&mut self, node: Tag, dof: usize, value: f64) -> Result<()> {
        let i = self.dof(node, dof)?;
        self.trial_disp[i] = value;
        Ok(())
    }

    pub fn set_trial_acceleration(&mut self, a: &DVector<f64>) -> Result<()> {
        check_len(self.n_dofs(), a)?;
        self.trial_accel.copy_from(a);
        Ok(())
    }

    /// Push the global trial state to every element and update it.
    ///
    /// # Errors
    ///
    /// The first [`Error::UpdateFailure`] in element order. Elements after
    /// a failing one may still have been updated; the driver is expected to
    /// revert.
    pub fn update(&mut self) -> Result<()> {
        let disp = &self.trial_disp;
        let accel = &self.trial_accel;
        let update_one = |entry: &mut ElementEntry| -> Result<()> {
            let ug = DVector::from_iterator(entry.dofs.len(), entry.dofs.iter().map(|&d| disp[d]));
            let ag = DVector::from_iterator(entry.dofs.len(), entry.dofs.iter().map(|&d| accel[d]));
            entry.element.set_trial_displacement(&ug)?;
            entry.element.set_trial_acceleration(&ag)?;
            entry.element.update()
        };

        if self.config.parallel_update {
            let results: Vec<Result<()>> = self.elements.par_iter_mut().map(update_one).collect();
            results.into_iter().collect()
        } else {
            self.elements.iter_mut().try_for_each(update_one)
        }
    }

    pub fn commit(&mut self) -> Result<()> {
        for entry in &mut self.elements {
            entry.element.commit_state()?;
        }
        self.committed_disp.copy_from(&self.trial_disp);
        debug!(elements = self.elements.len(), "committed model state");
        Ok(())
    }

    pub fn revert_to_last_commit(&mut self) -> Result<()> {
        for entry in &mut self.elements {
            entry.element.revert_to_last_commit()?;
        }
        self.trial_disp.copy_from(&self.committed_disp);
        debug!(elements = self.elements.len(), "reverted to last commit");
        Ok(())
    }

    pub fn revert_to_start(&mut self) -> Result<()> {
        for entry in &mut self.elements {
            entry.element.revert_to_start()?;
        }
        self.trial_disp.fill(0.0);
        self.committed_disp.fill(0.0);
        self.trial_accel.fill(0.0);
        debug!(elements = self.elements.len(), "reverted to start");
        Ok(())
    }

    /// Apply `factor * load` to element `tag`.
    pub fn add_element_load(&mut self, tag: Tag, load: &ElementLoad, factor: f64) -> Result<()> {
        self.element_mut(tag)?.add_load(load, factor)
    }

    pub fn zero_loads(&mut self) {
        for entry in &mut self.elements {
            entry.element.zero_load();
        }
    }

    /// Committed snapshots of all elements, in insertion order.
    pub fn committed_snapshots(&self) -> Vec<Snapshot> {
        self.elements
            .iter()
            .map(|e| e.element.committed_snapshot())
            .collect()
    }

    /// Restore every element from [`Model::committed_snapshots`] of an
    /// equivalent model. Snapshots are matched by element tag.
    ///
    /// The global committed and trial displacements are rebuilt from the
    /// restored elements; accelerations and DOFs no element touches are
    /// zeroed.
    pub fn restore_snapshots(&mut self, snapshots: &[Snapshot]) -> Result<()> {
        for snapshot in snapshots {
            self.element_mut(snapshot.tag)?.restore_snapshot(snapshot)?;
        }

        self.committed_disp.fill(0.0);
        for entry in &self.elements {
            let ue = entry.element.committed_displacement();
            for (&d, &value) in entry.dofs.iter().zip(ue.iter()) {
                self.committed_disp[d] = value;
            }
        }
        self.trial_disp.copy_from(&self.committed_disp);
        self.trial_accel.fill(0.0);
        debug!(snapshots = snapshots.len(), "restored model state");
        Ok(())
    }
}

fn check_len(expected: usize, v: &DVector<f64>) -> Result<()> {
    if v.len() != expected {
        return Err(Error::Length {
            expected,
            got: v.len(),
        });
    }
    Ok(())
}
