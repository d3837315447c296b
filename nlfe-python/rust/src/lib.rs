//! Python bindings for the NLFE runtime core.
//!
//! A thin adapter over nlfe-core: the `Model` class builds components by
//! tag, drives the element state machine, and hands element tangents and
//! forces back as NumPy arrays. Solving stays on the Python side.

use nalgebra::{DMatrix, DVector};
use numpy::{PyArray1, PyArray2, PyReadonlyArray1, PyReadonlyArray2, PyUntypedArrayMethods};
use pyo3::exceptions::{PyKeyError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use std::sync::Arc;

use nlfe_core::backbone::MultilinearBackbone;
use nlfe_core::element::{BeamIntegration, ElementLoad, ForceBeamConfig};
use nlfe_core::material::{Elastic, ElasticPerfectlyPlastic, OriginOriented, UniaxialMaterial};
use nlfe_core::model::{Model, ModelConfig};
use nlfe_core::registry::{Backbones, Sections, TimeSeriesSet, Transforms, UniaxialMaterials};
use nlfe_core::section::{ElasticSection, Fiber, FiberSection};
use nlfe_core::time_series::{Constant, Linear, Path};
use nlfe_core::transform::{GeomTransf, TransformKind};
use nlfe_core::types::{Dimension, Point3, Tag, Vec3};
use nlfe_core::{Error, Stateful};

fn to_py_err(err: Error) -> PyErr {
    match err {
        Error::NameConflict { .. } | Error::NotFound { .. } => PyKeyError::new_err(err.to_string()),
        Error::UpdateFailure { .. } => PyRuntimeError::new_err(err.to_string()),
        _ => PyValueError::new_err(err.to_string()),
    }
}

fn matrix_to_py<'py>(py: Python<'py>, m: &DMatrix<f64>) -> PyResult<Bound<'py, PyArray2<f64>>> {
    let data: Vec<Vec<f64>> = m.row_iter().map(|r| r.iter().copied().collect()).collect();
    PyArray2::from_vec2(py, &data)
        .map_err(|e| PyRuntimeError::new_err(format!("Failed to create array: {}", e)))
}

fn vector_to_py<'py>(py: Python<'py>, v: &DVector<f64>) -> Bound<'py, PyArray1<f64>> {
    PyArray1::from_vec(py, v.iter().copied().collect())
}

fn vec3(v: Option<[f64; 3]>) -> Option<Vec3> {
    v.map(|[x, y, z]| Vec3::new(x, y, z))
}

fn parse_integration(rule: &str, n: usize) -> PyResult<BeamIntegration> {
    match rule {
        "legendre" => Ok(BeamIntegration::Legendre(n)),
        "lobatto" => Ok(BeamIntegration::Lobatto(n)),
        _ => Err(PyValueError::new_err(format!(
            "Unknown integration rule: {}. Valid rules: legendre, lobatto",
            rule
        ))),
    }
}

/// Standalone copy of a registered uniaxial material, driven strain by
/// strain from Python.
#[pyclass(name = "MaterialHandle")]
pub struct PyMaterialHandle {
    inner: Box<dyn UniaxialMaterial>,
}

#[pymethods]
impl PyMaterialHandle {
    fn set_strain(&mut self, strain: f64) -> PyResult<()> {
        self.inner.set_trial_strain(strain).map_err(to_py_err)
    }

    fn commit(&mut self) -> PyResult<()> {
        self.inner.commit_state().map_err(to_py_err)
    }

    fn revert(&mut self) -> PyResult<()> {
        self.inner.revert_to_last_commit().map_err(to_py_err)
    }

    fn revert_to_start(&mut self) -> PyResult<()> {
        self.inner.revert_to_start().map_err(to_py_err)
    }

    #[getter]
    fn strain(&self) -> f64 {
        self.inner.strain()
    }

    #[getter]
    fn stress(&self) -> f64 {
        self.inner.stress()
    }

    #[getter]
    fn tangent(&self) -> f64 {
        self.inner.tangent()
    }

    #[getter]
    fn initial_tangent(&self) -> f64 {
        self.inner.initial_tangent()
    }

    fn __repr__(&self) -> String {
        format!(
            "MaterialHandle({} {}, strain={:.3e}, stress={:.3e})",
            self.inner.class_name(),
            self.inner.tag(),
            self.inner.strain(),
            self.inner.stress()
        )
    }
}

/// Analysis instance: registry, nodes and elements.
#[pyclass(name = "Model")]
pub struct PyModel {
    inner: Model,
}

#[pymethods]
impl PyModel {
    /// Create an empty model.
    ///
    /// Args:
    ///     ndm: Spatial dimension (2 or 3)
    ///     parallel: Update elements in parallel
    #[new]
    #[pyo3(signature = (ndm=3, parallel=true))]
    fn new(ndm: usize, parallel: bool) -> PyResult<Self> {
        let dimension = Dimension::from_ndm(ndm).map_err(to_py_err)?;
        Ok(Self {
            inner: Model::new(ModelConfig {
                dimension,
                parallel_update: parallel,
            }),
        })
    }

    /// Allow or forbid replacing registered components.
    fn set_clobber(&mut self, clobber: bool) {
        self.inner.registry_mut().set_clobber(clobber);
    }

    #[getter]
    fn ndm(&self) -> usize {
        self.inner.dimension().ndm()
    }

    #[getter]
    fn n_dofs(&self) -> usize {
        self.inner.n_dofs()
    }

    #[getter]
    fn n_elements(&self) -> usize {
        self.inner.n_elements()
    }

    #[pyo3(signature = (tag, x, y, z=0.0))]
    fn node(&mut self, tag: Tag, x: f64, y: f64, z: f64) -> PyResult<()> {
        self.inner.add_node(tag, Point3::new(x, y, z)).map_err(to_py_err)
    }

    fn elastic_material(&mut self, tag: Tag, e: f64) -> PyResult<()> {
        let mat = Elastic::new(tag, e).map_err(to_py_err)?;
        self.add_material(tag, Box::new(mat))
    }

    /// Elastic-perfectly plastic material; `fyn` defaults to `-fy`.
    #[pyo3(signature = (tag, e, fy, fyn=None))]
    fn epp_material(&mut self, tag: Tag, e: f64, fy: f64, fyn: Option<f64>) -> PyResult<()> {
        let mat = ElasticPerfectlyPlastic::new(tag, e, fy, fyn.unwrap_or(-fy)).map_err(to_py_err)?;
        self.add_material(tag, Box::new(mat))
    }

    /// Multilinear backbone from an Nx2 array of (strain, stress) points.
    fn multilinear_backbone(&mut self, tag: Tag, points: PyReadonlyArray2<f64>) -> PyResult<()> {
        let shape = points.shape();
        if shape.len() != 2 || shape[1] != 2 {
            return Err(PyValueError::new_err("points must be Nx2 array"));
        }
        let array = points.as_array();
        let pts: Vec<(f64, f64)> = (0..shape[0]).map(|i| (array[[i, 0]], array[[i, 1]])).collect();
        let backbone = MultilinearBackbone::new(tag, &pts).map_err(to_py_err)?;
        self.inner
            .registry_mut()
            .add::<Backbones>(tag, Arc::new(backbone))
            .map_err(to_py_err)
    }

    /// Origin-oriented hysteretic material over registered backbones.
    #[pyo3(signature = (tag, positive, negative=None))]
    fn origin_oriented_material(&mut self, tag: Tag, positive: Tag, negative: Option<Tag>) -> PyResult<()> {
        let registry = self.inner.registry();
        let pos = registry.get::<Backbones>(positive).map_err(to_py_err)?;
        let neg = registry
            .get::<Backbones>(negative.unwrap_or(positive))
            .map_err(to_py_err)?;
        let mat = OriginOriented::new(tag, pos, neg).map_err(to_py_err)?;
        self.add_material(tag, Box::new(mat))
    }

    /// Copy of a registered material for strain-driven testing.
    fn material(&self, tag: Tag) -> PyResult<PyMaterialHandle> {
        let inner = self
            .inner
            .registry()
            .get::<UniaxialMaterials>(tag)
            .map_err(to_py_err)?;
        Ok(PyMaterialHandle { inner })
    }

    /// Elastic section; planar when `iy`, `g` and `j` are omitted.
    #[pyo3(signature = (tag, e, a, iz, iy=None, g=None, j=None))]
    #[allow(clippy::too_many_arguments)]
    fn elastic_section(
        &mut self,
        tag: Tag,
        e: f64,
        a: f64,
        iz: f64,
        iy: Option<f64>,
        g: Option<f64>,
        j: Option<f64>,
    ) -> PyResult<()> {
        let section = match (iy, g, j) {
            (None, None, None) => ElasticSection::planar(tag, e, a, iz),
            (Some(iy), Some(g), Some(j)) => ElasticSection::spatial(tag, e, a, iz, iy, g, j),
            _ => return Err(PyValueError::new_err("iy, g and j must be given together")),
        }
        .map_err(to_py_err)?;
        self.inner
            .registry_mut()
            .add::<Sections>(tag, Box::new(section))
            .map_err(to_py_err)
    }

    /// Fiber section from an Nx3 array of (y, z, area) over one material.
    ///
    /// A space section is built when `gj` is given.
    #[pyo3(signature = (tag, fibers, material, gj=None))]
    fn fiber_section(
        &mut self,
        tag: Tag,
        fibers: PyReadonlyArray2<f64>,
        material: Tag,
        gj: Option<f64>,
    ) -> PyResult<()> {
        let shape = fibers.shape();
        if shape.len() != 2 || shape[1] != 3 {
            return Err(PyValueError::new_err("fibers must be Nx3 array"));
        }
        let mat = self
            .inner
            .registry()
            .get::<UniaxialMaterials>(material)
            .map_err(to_py_err)?;
        let array = fibers.as_array();
        let fibers: Vec<Fiber> = (0..shape[0])
            .map(|i| Fiber::new(array[[i, 0]], array[[i, 1]], array[[i, 2]], mat.clone()))
            .collect();
        let section = match gj {
            Some(gj) => FiberSection::spatial(tag, fibers, gj),
            None => FiberSection::planar(tag, fibers),
        }
        .map_err(to_py_err)?;
        self.inner
            .registry_mut()
            .add::<Sections>(tag, Box::new(section))
            .map_err(to_py_err)
    }

    /// Geometric transformation definition.
    ///
    /// Args:
    ///     kind: "linear", "pdelta" or "corotational"
    ///     vecxz: Orientation vector (3-D models only)
    ///     offset_i, offset_j: Rigid joint offsets
    ///     offsets_local: Offsets given in the local frame
    ///     offsets_normalized: Offsets given as fractions of the nodal distance
    #[pyo3(signature = (tag, kind, vecxz=None, offset_i=None, offset_j=None, offsets_local=false, offsets_normalized=false))]
    #[allow(clippy::too_many_arguments)]
    fn geom_transf(
        &mut self,
        tag: Tag,
        kind: &str,
        vecxz: Option<[f64; 3]>,
        offset_i: Option<[f64; 3]>,
        offset_j: Option<[f64; 3]>,
        offsets_local: bool,
        offsets_normalized: bool,
    ) -> PyResult<()> {
        let kind = match kind {
            "linear" => TransformKind::Linear,
            "pdelta" => TransformKind::PDelta,
            "corotational" => TransformKind::Corotational,
            _ => {
                return Err(PyValueError::new_err(format!(
                    "Unknown transform: {}. Valid kinds: linear, pdelta, corotational",
                    kind
                )))
            }
        };
        let mut transf =
            GeomTransf::new(tag, kind, self.inner.dimension(), vec3(vecxz)).map_err(to_py_err)?;
        if offset_i.is_some() || offset_j.is_some() {
            let zero = Vec3::zeros();
            transf = transf
                .with_offsets(vec3(offset_i).unwrap_or(zero), vec3(offset_j).unwrap_or(zero))
                .offsets_local(offsets_local)
                .offsets_normalized(offsets_normalized);
        }
        self.inner
            .registry_mut()
            .add::<Transforms>(tag, Arc::new(transf))
            .map_err(to_py_err)
    }

    fn constant_series(&mut self, tag: Tag, factor: f64) -> PyResult<()> {
        self.inner
            .registry_mut()
            .add::<TimeSeriesSet>(tag, Box::new(Constant::new(tag, factor)))
            .map_err(to_py_err)
    }

    fn linear_series(&mut self, tag: Tag, factor: f64) -> PyResult<()> {
        self.inner
            .registry_mut()
            .add::<TimeSeriesSet>(tag, Box::new(Linear::new(tag, factor)))
            .map_err(to_py_err)
    }

    #[pyo3(signature = (tag, times, values, factor=1.0, use_last=false))]
    fn path_series(
        &mut self,
        tag: Tag,
        times: PyReadonlyArray1<f64>,
        values: PyReadonlyArray1<f64>,
        factor: f64,
        use_last: bool,
    ) -> PyResult<()> {
        let times = times.as_array().to_vec();
        let values = values.as_array().to_vec();
        let path = Path::new(tag, times, values, factor)
            .map_err(to_py_err)?
            .use_last(use_last);
        self.inner
            .registry_mut()
            .add::<TimeSeriesSet>(tag, Box::new(path))
            .map_err(to_py_err)
    }

    /// Load factor of a registered time series at `time`.
    fn load_factor(&self, series: Tag, time: f64) -> PyResult<f64> {
        let series = self
            .inner
            .registry()
            .get::<TimeSeriesSet>(series)
            .map_err(to_py_err)?;
        Ok(series.factor(time))
    }

    fn truss(&mut self, tag: Tag, ni: Tag, nj: Tag, material: Tag, area: f64) -> PyResult<()> {
        self.inner
            .add_truss(tag, [ni, nj], material, area)
            .map_err(to_py_err)
    }

    #[pyo3(signature = (tag, ni, nj, transf, section, integration="lobatto", n=5))]
    #[allow(clippy::too_many_arguments)]
    fn disp_beam(
        &mut self,
        tag: Tag,
        ni: Tag,
        nj: Tag,
        transf: Tag,
        section: Tag,
        integration: &str,
        n: usize,
    ) -> PyResult<()> {
        let rule = parse_integration(integration, n)?;
        self.inner
            .add_disp_beam(tag, [ni, nj], transf, section, rule)
            .map_err(to_py_err)
    }

    #[pyo3(signature = (tag, ni, nj, transf, section, integration="lobatto", n=5, max_iterations=10, tolerance=1e-12))]
    #[allow(clippy::too_many_arguments)]
    fn force_beam(
        &mut self,
        tag: Tag,
        ni: Tag,
        nj: Tag,
        transf: Tag,
        section: Tag,
        integration: &str,
        n: usize,
        max_iterations: usize,
        tolerance: f64,
    ) -> PyResult<()> {
        let rule = parse_integration(integration, n)?;
        let config = ForceBeamConfig {
            max_iterations,
            tolerance,
        };
        self.inner
            .add_force_beam(tag, [ni, nj], transf, section, rule, config)
            .map_err(to_py_err)
    }

    #[pyo3(signature = (element, wy, wz=0.0, wx=0.0, factor=1.0))]
    fn beam_uniform(&mut self, element: Tag, wy: f64, wz: f64, wx: f64, factor: f64) -> PyResult<()> {
        let load = ElementLoad::BeamUniform { wy, wz, wx };
        self.inner
            .add_element_load(element, &load, factor)
            .map_err(to_py_err)
    }

    #[pyo3(signature = (element, py, a_over_l, pz=0.0, px=0.0, factor=1.0))]
    #[allow(clippy::too_many_arguments)]
    fn beam_point(
        &mut self,
        element: Tag,
        py: f64,
        a_over_l: f64,
        pz: f64,
        px: f64,
        factor: f64,
    ) -> PyResult<()> {
        let load = ElementLoad::BeamPoint {
            py,
            pz,
            px,
            a_over_l,
        };
        self.inner
            .add_element_load(element, &load, factor)
            .map_err(to_py_err)
    }

    fn zero_loads(&mut self) {
        self.inner.zero_loads();
    }

    /// Set the global trial displacement vector (length `n_dofs`).
    fn set_trial_displacement(&mut self, u: PyReadonlyArray1<f64>) -> PyResult<()> {
        let u = DVector::from_vec(u.as_array().to_vec());
        self.inner.set_trial_displacement(&u).map_err(to_py_err)
    }

    fn set_trial_acceleration(&mut self, a: PyReadonlyArray1<f64>) -> PyResult<()> {
        let a = DVector::from_vec(a.as_array().to_vec());
        self.inner.set_trial_acceleration(&a).map_err(to_py_err)
    }

    fn update(&mut self) -> PyResult<()> {
        self.inner.update().map_err(to_py_err)
    }

    fn commit(&mut self) -> PyResult<()> {
        self.inner.commit().map_err(to_py_err)
    }

    fn revert_to_last_commit(&mut self) -> PyResult<()> {
        self.inner.revert_to_last_commit().map_err(to_py_err)
    }

    fn revert_to_start(&mut self) -> PyResult<()> {
        self.inner.revert_to_start().map_err(to_py_err)
    }

    fn dof(&self, node: Tag, dof: usize) -> PyResult<usize> {
        self.inner.dof(node, dof).map_err(to_py_err)
    }

    fn element_dofs(&self, element: Tag) -> PyResult<Vec<usize>> {
        self.inner
            .element_dofs(element)
            .map(|d| d.to_vec())
            .map_err(to_py_err)
    }

    fn element_tangent<'py>(&self, py: Python<'py>, element: Tag) -> PyResult<Bound<'py, PyArray2<f64>>> {
        let e = self.inner.element(element).map_err(to_py_err)?;
        matrix_to_py(py, &e.tangent_stiff())
    }

    fn element_initial_stiffness<'py>(
        &self,
        py: Python<'py>,
        element: Tag,
    ) -> PyResult<Bound<'py, PyArray2<f64>>> {
        let e = self.inner.element(element).map_err(to_py_err)?;
        matrix_to_py(py, &e.initial_stiff())
    }

    fn element_mass<'py>(&self, py: Python<'py>, element: Tag) -> PyResult<Bound<'py, PyArray2<f64>>> {
        let e = self.inner.element(element).map_err(to_py_err)?;
        matrix_to_py(py, &e.mass())
    }

    /// Resisting force, with inertia when `inertia` is set.
    #[pyo3(signature = (element, inertia=false))]
    fn element_force<'py>(
        &self,
        py: Python<'py>,
        element: Tag,
        inertia: bool,
    ) -> PyResult<Bound<'py, PyArray1<f64>>> {
        let e = self.inner.element(element).map_err(to_py_err)?;
        let p = if inertia {
            e.resisting_force_inc_inertia()
        } else {
            e.resisting_force()
        };
        Ok(vector_to_py(py, &p))
    }

    fn __repr__(&self) -> String {
        format!(
            "Model(ndm={}, nodes={}, elements={})",
            self.inner.dimension().ndm(),
            self.inner.n_nodes(),
            self.inner.n_elements()
        )
    }
}

impl PyModel {
    fn add_material(&mut self, tag: Tag, material: Box<dyn UniaxialMaterial>) -> PyResult<()> {
        self.inner
            .registry_mut()
            .add::<UniaxialMaterials>(tag, material)
            .map_err(to_py_err)
    }
}

/// Get library version.
#[pyfunction]
fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Python module definition.
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyModel>()?;
    m.add_class::<PyMaterialHandle>()?;
    m.add_function(wrap_pyfunction!(version, m)?)?;
    Ok(())
}
