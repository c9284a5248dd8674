//! # Traversers
//!
//! A traverser is the unit of work: a value positioned at a step. Traversers
//! that leave the pipeline are re-pointed at the `halt` step id and become
//! results.

use crate::constants::steps::HALT;
use crate::structure::{Element, Value};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::fmt;

/// Identifier of a step inside a compiled pipeline
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(String);

impl StepId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Step id carried by traversers that finished the pipeline
    pub fn halt() -> Self {
        Self(HALT.to_string())
    }

    pub fn is_halt(&self) -> bool {
        self.0 == HALT
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Traverser {
    pub value: Value,
    pub step_id: StepId,
    pub bulk: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sack: Option<Json>,
    /// Ordering stamp, assigned only by the master
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
}

impl Traverser {
    pub fn new(value: impl Into<Value>, step_id: StepId) -> Self {
        Self {
            value: value.into(),
            step_id,
            bulk: 1,
            sack: None,
            order: None,
        }
    }

    pub fn is_halted(&self) -> bool {
        self.step_id.is_halt()
    }

    pub fn is_ordered(&self) -> bool {
        self.order.is_some()
    }

    pub fn element(&self) -> Option<&Element> {
        self.value.as_element()
    }

    /// Derive a traverser for a new value that keeps bulk, sack and stamp
    pub fn split(&self, value: impl Into<Value>, step_id: StepId) -> Self {
        Self {
            value: value.into(),
            step_id,
            bulk: self.bulk,
            sack: self.sack.clone(),
            order: self.order,
        }
    }

    /// Re-point this traverser at another step
    pub fn advance(mut self, step_id: StepId) -> Self {
        self.step_id = step_id;
        self
    }

    pub fn with_bulk(mut self, bulk: i64) -> Self {
        self.bulk = bulk;
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }
}

impl fmt::Display for Traverser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.value, self.step_id)?;
        if self.bulk != 1 {
            write!(f, "x{}", self.bulk)?;
        }
        if let Some(order) = self.order {
            write!(f, "#{order}")?;
        }
        Ok(())
    }
}

/// Insertion-ordered collection of traversers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraverserSet(Vec<Traverser>);

impl TraverserSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, traverser: Traverser) {
        self.0.push(traverser);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Traverser> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Traverser] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<Traverser> {
        self.0
    }

    pub fn drain(&mut self) -> std::vec::Drain<'_, Traverser> {
        self.0.drain(..)
    }

    /// Sum of bulks
    pub fn bulk_size(&self) -> i64 {
        self.0.iter().map(|t| t.bulk).sum()
    }

    /// Stable sort by ordering stamp. Unstamped traversers sort last.
    pub fn sort_by_order(&mut self) {
        self.0.sort_by_key(|t| (t.order.is_none(), t.order.unwrap_or_default()));
    }

    /// Replace stamps with the dense sequence `0..len` in current order
    pub fn renumber(&mut self) {
        for (position, traverser) in self.0.iter_mut().enumerate() {
            traverser.order = Some(position as i32);
        }
    }

    pub fn values(&self) -> Vec<Value> {
        self.0.iter().map(|t| t.value.clone()).collect()
    }
}

impl From<Vec<Traverser>> for TraverserSet {
    fn from(traversers: Vec<Traverser>) -> Self {
        Self(traversers)
    }
}

impl FromIterator<Traverser> for TraverserSet {
    fn from_iter<I: IntoIterator<Item = Traverser>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<Traverser> for TraverserSet {
    fn extend<I: IntoIterator<Item = Traverser>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl IntoIterator for TraverserSet {
    type Item = Traverser;
    type IntoIter = std::vec::IntoIter<Traverser>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a TraverserSet {
    type Item = &'a Traverser;
    type IntoIter = std::slice::Iter<'a, Traverser>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
