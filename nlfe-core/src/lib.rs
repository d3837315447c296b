//! NLFE Core - runtime core for nonlinear frame analysis
//!
//! Building blocks an external solver drives one iteration at a time:
//! - Tagged component registry with copy-on-retrieve for stateful parts
//! - Element trial/commit/revert state machine
//! - Linear, P-Delta and corotational frame transformations
//! - Truss, displacement-based and force-based beam-column elements
//!
//! # Architecture
//!
//! - [`Registry`]: per-category tables of materials, sections, time series,
//!   backbones and transform definitions
//! - [`Element`] trait: state determination, tangent, resisting force
//! - [`FrameTransform`] trait: basic ↔ global mapping owned by each element
//! - [`Model`]: nodes, elements and global trial state; drives updates in
//!   parallel with Rayon
//!
//! The core never assembles or solves the global system.

pub mod backbone;
pub mod element;
pub mod error;
pub mod material;
pub mod model;
pub mod registry;
pub mod section;
pub mod state;
pub mod time_series;
pub mod transform;
pub mod types;

pub use backbone::{Backbone, MultilinearBackbone};
pub use element::{BeamIntegration, DispBeamColumn, Element, ElementLoad, ForceBeamColumn, ForceBeamConfig, Truss};
pub use error::{Error, Result};
pub use material::UniaxialMaterial;
pub use model::{Model, ModelConfig};
pub use registry::{Backbones, Category, Key, Registry, Sections, TimeSeriesSet, Transforms, UniaxialMaterials};
pub use section::{Section, SectionResponse};
pub use state::{Phase, Snapshot, Stateful};
pub use time_series::TimeSeries;
pub use transform::{FrameTransform, GeomTransf, TransformKind};
pub use types::{Dimension, Node, Point3, Tag, Vec3};
