//! Tagged component registry.
//!
//! Every independently created model object (uniaxial materials, sections,
//! coordinate transforms, time series, backbones) lives in one table per
//! category. Tables are keyed by the canonical string of a [`Key`], so an
//! integer tag `5` and the name `"5"` address the same entry.
//!
//! Retrieval semantics depend on the category:
//!
//! | Category | Stored | `get` returns |
//! |----------|--------|---------------|
//! | [`UniaxialMaterials`] | `Box<dyn UniaxialMaterial>` | deep copy |
//! | [`Sections`] | `Box<dyn Section>` | deep copy |
//! | [`TimeSeriesSet`] | `Box<dyn TimeSeries>` | deep copy |
//! | [`Transforms`] | `Arc<GeomTransf>` | shared reference |
//! | [`Backbones`] | `Arc<dyn Backbone>` | shared reference |
//!
//! # Example
//!
//! ```
//! use nlfe_core::material::Elastic;
//! use nlfe_core::registry::{Registry, UniaxialMaterials};
//!
//! let mut reg = Registry::new();
//! reg.add::<UniaxialMaterials>(5, Box::new(Elastic::new(5, 200e3).unwrap())).unwrap();
//! assert!(reg.add::<UniaxialMaterials>(5, Box::new(Elastic::new(5, 1.0).unwrap())).is_err());
//! let copy = reg.get::<UniaxialMaterials>(5).unwrap();
//! assert_eq!(copy.tag(), 5);
//! ```

use crate::backbone::Backbone;
use crate::error::{Error, Result};
use crate::material::UniaxialMaterial;
use crate::section::Section;
use crate::time_series::TimeSeries;
use crate::transform::GeomTransf;
use crate::types::Tag;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Lookup key: integer tag or string name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Tag(Tag),
    Name(String),
}

impl Key {
    /// Table key shared by tag- and name-based lookups.
    pub fn canonical(&self) -> String {
        match self {
            Key::Tag(tag) => tag.to_string(),
            Key::Name(name) => name.clone(),
        }
    }
}

impl From<Tag> for Key {
    fn from(tag: Tag) -> Self {
        Key::Tag(tag)
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(name.to_string())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(name)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

/// Storage for one category.
#[derive(Debug)]
pub struct Table<T> {
    entries: HashMap<String, T>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

/// A registry category: what it stores and what retrieval hands out.
pub trait Category {
    /// Human-readable category name used in errors and logs.
    const LABEL: &'static str;

    type Stored: Send + Sync;

    type Handle;

    fn table(registry: &Registry) -> &Table<Self::Stored>;

    fn table_mut(registry: &mut Registry) -> &mut Table<Self::Stored>;

    /// Produce the value returned by [`Registry::get`].
    fn retrieve(stored: &Self::Stored) -> Self::Handle;

    /// The component's own tag.
    fn tag(stored: &Self::Stored) -> Tag;
}

/// Uniaxial materials, copied on retrieval.
pub struct UniaxialMaterials;

/// Beam sections, copied on retrieval.
pub struct Sections;

/// Time series, copied on retrieval.
pub struct TimeSeriesSet;

/// Coordinate transform definitions, shared.
pub struct Transforms;

/// Backbone curves, shared.
pub struct Backbones;

impl Category for UniaxialMaterials {
    const LABEL: &'static str = "UniaxialMaterial";
    type Stored = Box<dyn UniaxialMaterial>;
    type Handle = Box<dyn UniaxialMaterial>;

    fn table(registry: &Registry) -> &Table<Self::Stored> {
        &registry.materials
    }

    fn table_mut(registry: &mut Registry) -> &mut Table<Self::Stored> {
        &mut registry.materials
    }

    fn retrieve(stored: &Self::Stored) -> Self::Handle {
        stored.clone_box()
    }

    fn tag(stored: &Self::Stored) -> Tag {
        stored.tag()
    }
}

impl Category for Sections {
    const LABEL: &'static str = "Section";
    type Stored = Box<dyn Section>;
    type Handle = Box<dyn Section>;

    fn table(registry: &Registry) -> &Table<Self::Stored> {
        &registry.sections
    }

    fn table_mut(registry: &mut Registry) -> &mut Table<Self::Stored> {
        &mut registry.sections
    }

    fn retrieve(stored: &Self::Stored) -> Self::Handle {
        stored.clone_box()
    }

    fn tag(stored: &Self::Stored) -> Tag {
        stored.tag()
    }
}

impl Category for TimeSeriesSet {
    const LABEL: &'static str = "TimeSeries";
    type Stored = Box<dyn TimeSeries>;
    type Handle = Box<dyn TimeSeries>;

    fn table(registry: &Registry) -> &Table<Self::Stored> {
        &registry.series
    }

    fn table_mut(registry: &mut Registry) -> &mut Table<Self::Stored> {
        &mut registry.series
    }

    fn retrieve(stored: &Self::Stored) -> Self::Handle {
        stored.clone_box()
    }

    fn tag(stored: &Self::Stored) -> Tag {
        stored.tag()
    }
}

impl Category for Transforms {
    const LABEL: &'static str = "CrdTransf";
    type Stored = Arc<GeomTransf>;
    type Handle = Arc<GeomTransf>;

    fn table(registry: &Registry) -> &Table<Self::Stored> {
        &registry.transforms
    }

    fn table_mut(registry: &mut Registry) -> &mut Table<Self::Stored> {
        &mut registry.transforms
    }

    fn retrieve(stored: &Self::Stored) -> Self::Handle {
        Arc::clone(stored)
    }

    fn tag(stored: &Self::Stored) -> Tag {
        stored.tag()
    }
}

impl Category for Backbones {
    const LABEL: &'static str = "HystereticBackbone";
    type Stored = Arc<dyn Backbone>;
    type Handle = Arc<dyn Backbone>;

    fn table(registry: &Registry) -> &Table<Self::Stored> {
        &registry.backbones
    }

    fn table_mut(registry: &mut Registry) -> &mut Table<Self::Stored> {
        &mut registry.backbones
    }

    fn retrieve(stored: &Self::Stored) -> Self::Handle {
        Arc::clone(stored)
    }

    fn tag(stored: &Self::Stored) -> Tag {
        stored.tag()
    }
}

/// Owner of every tagged component of one model.
#[derive(Default)]
pub struct Registry {
    clobber: bool,
    materials: Table<Box<dyn UniaxialMaterial>>,
    sections: Table<Box<dyn Section>>,
    series: Table<Box<dyn TimeSeries>>,
    transforms: Table<Arc<GeomTransf>>,
    backbones: Table<Arc<dyn Backbone>>,
}

impl Registry {
    /// Empty registry with clobbering disabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow (or forbid) `add` to replace existing entries.
    pub fn set_clobber(&mut self, clobber: bool) {
        self.clobber = clobber;
    }

    pub fn can_clobber(&self) -> bool {
        self.clobber
    }

    /// Insert `item` under `key`.
    ///
    /// # Errors
    ///
    /// [`Error::NameConflict`] if the key is taken and clobbering is
    /// disabled. The existing entry is left untouched.
    pub fn add<C: Category>(&mut self, key: impl Into<Key>, item: C::Stored) -> Result<()> {
        let key = key.into().canonical();
        let clobber = self.clobber;
        let table = C::table_mut(self);

        if table.entries.contains_key(&key) && !clobber {
            return Err(Error::NameConflict {
                category: C::LABEL,
                key,
            });
        }

        if table.entries.insert(key.clone(), item).is_some() {
            debug!(category = C::LABEL, key = %key, "replaced registry entry");
        } else {
            debug!(category = C::LABEL, key = %key, "added registry entry");
        }
        Ok(())
    }

    /// Insert `item` under its own tag.
    pub fn add_tagged<C: Category>(&mut self, item: C::Stored) -> Result<()> {
        let tag = C::tag(&item);
        self.add::<C>(tag, item)
    }

    /// Retrieve by key: a deep copy for stateful categories, a shared
    /// reference otherwise.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if nothing is registered under `key`.
    pub fn get<C: Category>(&self, key: impl Into<Key>) -> Result<C::Handle> {
        let key = key.into().canonical();
        C::table(self)
            .entries
            .get(&key)
            .map(C::retrieve)
            .ok_or(Error::NotFound {
                category: C::LABEL,
                key,
            })
    }

    /// Release the entry under `key` and hand it back.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if nothing is registered under `key`.
    pub fn remove<C: Category>(&mut self, key: impl Into<Key>) -> Result<C::Stored> {
        let key = key.into().canonical();
        match C::table_mut(self).entries.remove(&key) {
            Some(item) => {
                debug!(category = C::LABEL, key = %key, "removed registry entry");
                Ok(item)
            }
            None => Err(Error::NotFound {
                category: C::LABEL,
                key,
            }),
        }
    }

    pub fn contains<C: Category>(&self, key: impl Into<Key>) -> bool {
        C::table(self)
            .entries
            .contains_key(&key.into().canonical())
    }

    /// Number of entries in category `C`.
    pub fn len<C: Category>(&self) -> usize {
        C::table(self).entries.len()
    }

    /// Sorted keys of category `C`.
    pub fn keys<C: Category>(&self) -> Vec<String> {
        let mut keys: Vec<String> = C::table(self).entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Drop every entry of every category. The clobber flag is kept.
    pub fn clear(&mut self) {
        self.materials.entries.clear();
        self.sections.entries.clear();
        self.series.entries.clear();
        self.transforms.entries.clear();
        self.backbones.entries.clear();
        debug!("cleared registry");
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("clobber", &self.clobber)
            .field("materials", &self.keys::<UniaxialMaterials>())
            .field("sections", &self.keys::<Sections>())
            .field("series", &self.keys::<TimeSeriesSet>())
            .field("transforms", &self.keys::<Transforms>())
            .field("backbones", &self.keys::<Backbones>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backbone::MultilinearBackbone;
    use crate::material::{Elastic, ElasticPerfectlyPlastic};
    use crate::time_series::Linear;
    use crate::transform::{GeomTransf, TransformKind};
    use approx::assert_relative_eq;

    fn elastic(tag: Tag, e: f64) -> Box<dyn UniaxialMaterial> {
        Box::new(Elastic::new(tag, e).unwrap())
    }

    #[test]
    fn test_duplicate_tag_without_clobber() {
        let mut reg = Registry::new();
        reg.add::<UniaxialMaterials>(5, elastic(5, 100.0)).unwrap();

        let err = reg
            .add::<UniaxialMaterials>(5, elastic(5, 300.0))
            .unwrap_err();
        assert_eq!(
            err,
            Error::NameConflict {
                category: "UniaxialMaterial",
                key: "5".into()
            }
        );

        // Original entry is unchanged
        let mat = reg.get::<UniaxialMaterials>(5).unwrap();
        assert_relative_eq!(mat.initial_tangent(), 100.0);
    }

    #[test]
    fn test_duplicate_tag_with_clobber() {
        let mut reg = Registry::new();
        reg.add::<UniaxialMaterials>(5, elastic(5, 100.0)).unwrap();
        reg.set_clobber(true);
        reg.add::<UniaxialMaterials>(5, elastic(5, 300.0)).unwrap();

        let mat = reg.get::<UniaxialMaterials>(5).unwrap();
        assert_relative_eq!(mat.initial_tangent(), 300.0);
        assert_eq!(reg.len::<UniaxialMaterials>(), 1);
    }

    #[test]
    fn test_get_after_remove() {
        let mut reg = Registry::new();
        reg.add_tagged::<UniaxialMaterials>(elastic(2, 1.0)).unwrap();
        let removed = reg.remove::<UniaxialMaterials>(2).unwrap();
        assert_eq!(removed.tag(), 2);

        let err = reg.get::<UniaxialMaterials>(2).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
        assert!(reg.remove::<UniaxialMaterials>(2).is_err());
    }

    #[test]
    fn test_stateful_get_yields_independent_copies() {
        let mut reg = Registry::new();
        reg.add::<UniaxialMaterials>(1, Box::new(ElasticPerfectlyPlastic::symmetric(1, 100.0, 1.0).unwrap()))
            .unwrap();

        let mut a = reg.get::<UniaxialMaterials>(1).unwrap();
        let b = reg.get::<UniaxialMaterials>(1).unwrap();
        a.set_trial_strain(0.05).unwrap();
        a.commit_state().unwrap();

        assert_relative_eq!(a.stress(), 1.0);
        assert_relative_eq!(b.stress(), 0.0);
        assert_relative_eq!(reg.get::<UniaxialMaterials>(1).unwrap().strain(), 0.0);
    }

    #[test]
    fn test_shared_categories_hand_out_same_instance() {
        let mut reg = Registry::new();
        let bb: Arc<dyn Backbone> = Arc::new(MultilinearBackbone::new(3, &[(1.0, 1.0)]).unwrap());
        reg.add_tagged::<Backbones>(bb).unwrap();
        let a = reg.get::<Backbones>(3).unwrap();
        let b = reg.get::<Backbones>(3).unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        reg.add_tagged::<Transforms>(Arc::new(GeomTransf::planar(1, TransformKind::Linear)))
            .unwrap();
        let t = reg.get::<Transforms>(1).unwrap();
        reg.remove::<Transforms>(1).unwrap();
        // Holders keep the definition alive after removal
        assert_eq!(t.tag(), 1);
        assert_eq!(Arc::strong_count(&t), 1);
    }

    #[test]
    fn test_tag_and_name_share_table() {
        let mut reg = Registry::new();
        reg.add::<TimeSeriesSet>("7", Box::new(Linear::new(7, 1.0)))
            .unwrap();
        assert!(reg.contains::<TimeSeriesSet>(7));
        assert!(reg.add::<TimeSeriesSet>(7, Box::new(Linear::new(7, 2.0))).is_err());

        reg.add::<TimeSeriesSet>("ramp", Box::new(Linear::new(8, 2.0)))
            .unwrap();
        assert_eq!(reg.keys::<TimeSeriesSet>(), vec!["7".to_string(), "ramp".to_string()]);
        assert_relative_eq!(reg.get::<TimeSeriesSet>("ramp").unwrap().factor(1.0), 2.0);
    }

    #[test]
    fn test_categories_are_independent() {
        let mut reg = Registry::new();
        reg.add::<UniaxialMaterials>(1, elastic(1, 1.0)).unwrap();
        reg.add::<TimeSeriesSet>(1, Box::new(Linear::new(1, 1.0))).unwrap();
        assert!(!reg.contains::<Sections>(1));

        reg.clear();
        assert_eq!(reg.len::<UniaxialMaterials>(), 0);
        assert_eq!(reg.len::<TimeSeriesSet>(), 0);
    }
}
