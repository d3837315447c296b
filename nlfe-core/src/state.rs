//! Trial/committed state lifecycle shared by every stateful component.
//!
//! Materials, sections, transforms and elements all follow the same
//! protocol: trial state is recomputed freely, `commit_state` promotes it,
//! `revert_to_last_commit` discards it, `revert_to_start` wipes history.
//!
//! [`Snapshot`] is the committed-state accessor used by external
//! serializers to rebuild identical state on another instance.

use crate::error::{Error, Result};
use crate::types::Tag;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Lifecycle phase of a stateful component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// As constructed; no trial state computed yet.
    #[default]
    Initial,
    /// Trial state differs (possibly) from the last commit.
    Trial,
    /// Trial state equals the last committed state.
    Committed,
}

/// Commit/revert protocol.
pub trait Stateful {
    /// Promote trial state to committed.
    fn commit_state(&mut self) -> Result<()>;

    /// Discard trial state, restoring the last committed snapshot.
    fn revert_to_last_commit(&mut self) -> Result<()>;

    /// Discard all history, restoring the as-constructed configuration.
    fn revert_to_start(&mut self) -> Result<()>;
}

/// Phase bookkeeping embedded in elements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Lifecycle {
    phase: Phase,
    commits: usize,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Number of commits since construction or the last `revert_to_start`.
    pub fn commits(&self) -> usize {
        self.commits
    }

    pub fn on_update(&mut self) {
        self.phase = Phase::Trial;
    }

    pub fn on_commit(&mut self) {
        self.phase = Phase::Committed;
        self.commits += 1;
    }

    pub fn on_revert(&mut self) {
        self.phase = if self.commits == 0 {
            Phase::Initial
        } else {
            Phase::Committed
        };
    }

    pub fn on_revert_to_start(&mut self) {
        *self = Self::default();
    }
}

/// Committed state of a component, in a form an external serializer can
/// move between instances.
///
/// `data` is component-defined; `children` carries the snapshots of owned
/// sub-objects (sections of an element, fibers of a section, ...).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Snapshot {
    pub class_name: String,
    pub tag: Tag,
    pub data: Vec<f64>,
    pub children: Vec<Snapshot>,
}

impl Snapshot {
    pub fn new(class_name: &str, tag: Tag, data: Vec<f64>) -> Self {
        Self {
            class_name: class_name.to_string(),
            tag,
            data,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<Snapshot>) -> Self {
        self.children = children;
        self
    }

    /// Check that this snapshot was taken from a `class_name` component
    /// carrying exactly `len` data values and `n_children` children.
    pub fn expect_shape(&self, class_name: &str, len: usize, n_children: usize) -> Result<()> {
        if self.class_name != class_name {
            return Err(Error::snapshot(format!(
                "expected {} snapshot, got {}",
                class_name, self.class_name
            )));
        }
        if self.data.len() != len {
            return Err(Error::snapshot(format!(
                "{} snapshot carries {} values, expected {}",
                class_name,
                self.data.len(),
                len
            )));
        }
        if self.children.len() != n_children {
            return Err(Error::snapshot(format!(
                "{} snapshot carries {} children, expected {}",
                class_name,
                self.children.len(),
                n_children
            )));
        }
        Ok(())
    }
}
