//! # Side Effects
//!
//! Keyed values that steps write while traversers flow. The master holds the
//! authoritative map. Workers hold a replica in distributed mode: local adds
//! merge into the replica and are also logged as pending deltas that the
//! worker flushes to the master as `SideEffectAdd` messages. A `SideEffectSet`
//! from the master overwrites the replica without touching the log.

use crate::error::{Result, TraversalError};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use std::collections::BTreeMap;
use std::sync::Arc;

/// How deltas for a key are merged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reducer {
    /// Numeric addition
    Sum,
    /// Merge objects of counters by adding per-key counts
    MergeCounts,
    /// Last write wins
    Overwrite,
    /// Concatenate arrays
    Append,
}

impl Reducer {
    pub fn identity(&self) -> Json {
        match self {
            Reducer::Sum => Json::from(0),
            Reducer::MergeCounts => Json::Object(Map::new()),
            Reducer::Overwrite => Json::Null,
            Reducer::Append => Json::Array(Vec::new()),
        }
    }

    pub fn reduce(&self, key: &str, current: &Json, delta: &Json) -> Result<Json> {
        match self {
            Reducer::Sum => add_numbers(key, self, current, delta),
            Reducer::MergeCounts => {
                let (Json::Object(current), Json::Object(delta)) = (current, delta) else {
                    return Err(mismatch(key, self, delta));
                };
                let mut merged = current.clone();
                for (group, count) in delta {
                    let existing = merged.get(group).cloned().unwrap_or_else(|| Json::from(0));
                    let sum = add_numbers(key, self, &existing, count)?;
                    merged.insert(group.clone(), sum);
                }
                Ok(Json::Object(merged))
            }
            Reducer::Overwrite => Ok(delta.clone()),
            Reducer::Append => {
                let Json::Array(current) = current else {
                    return Err(mismatch(key, self, current));
                };
                let mut appended = current.clone();
                match delta {
                    Json::Array(items) => appended.extend(items.iter().cloned()),
                    other => appended.push(other.clone()),
                }
                Ok(Json::Array(appended))
            }
        }
    }
}

/// Integer addition when both sides are integers, float addition otherwise.
/// Integer overflow is an error rather than a silent wrap.
fn add_numbers(key: &str, reducer: &Reducer, a: &Json, b: &Json) -> Result<Json> {
    match (a.as_i64(), b.as_i64()) {
        (Some(x), Some(y)) => x.checked_add(y).map(Json::from).ok_or_else(|| {
            TraversalError::pipeline(
                format!("side-effect:{key}"),
                format!("integer overflow adding {x} and {y}"),
            )
        }),
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => Ok(Json::from(x + y)),
            _ => Err(mismatch(key, reducer, b)),
        },
    }
}

fn mismatch(key: &str, reducer: &Reducer, value: &Json) -> TraversalError {
    TraversalError::pipeline(
        format!("side-effect:{key}"),
        format!("{reducer:?} reducer cannot merge {value}"),
    )
}

#[derive(Debug, Default)]
struct SideEffectsInner {
    values: BTreeMap<String, Json>,
    reducers: BTreeMap<String, Reducer>,
    distributed: bool,
    pending: BTreeMap<String, Json>,
}

/// Shared side-effect map. Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct SideEffects {
    inner: Arc<RwLock<SideEffectsInner>>,
}

impl SideEffects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a key with its reducer, seeding it with the reducer's identity
    pub fn register(&self, key: &str, reducer: Reducer) {
        let mut inner = self.inner.write();
        inner.reducers.insert(key.to_string(), reducer);
        inner
            .values
            .entry(key.to_string())
            .or_insert_with(|| reducer.identity());
    }

    pub fn set_distributed(&self, distributed: bool) {
        self.inner.write().distributed = distributed;
    }

    pub fn is_distributed(&self) -> bool {
        self.inner.read().distributed
    }

    pub fn reducer(&self, key: &str) -> Option<Reducer> {
        self.inner.read().reducers.get(key).copied()
    }

    /// Merge a delta into the local value; distributed replicas also log it
    pub fn add(&self, key: &str, delta: Json) -> Result<()> {
        let mut inner = self.inner.write();
        let reducer = *inner
            .reducers
            .get(key)
            .ok_or_else(|| unknown_key(key))?;

        let current = inner
            .values
            .get(key)
            .cloned()
            .unwrap_or_else(|| reducer.identity());
        let merged = reducer.reduce(key, &current, &delta)?;
        inner.values.insert(key.to_string(), merged);

        if inner.distributed {
            let pending = match inner.pending.get(key) {
                Some(logged) => reducer.reduce(key, logged, &delta)?,
                None => reducer.reduce(key, &reducer.identity(), &delta)?,
            };
            inner.pending.insert(key.to_string(), pending);
        }
        Ok(())
    }

    /// Overwrite the local value without logging
    pub fn set(&self, key: &str, value: Json) -> Result<()> {
        let mut inner = self.inner.write();
        if !inner.reducers.contains_key(key) {
            return Err(unknown_key(key));
        }
        inner.values.insert(key.to_string(), value);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<Json> {
        self.inner.read().values.get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.read().values.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().values.is_empty()
    }

    pub fn snapshot(&self) -> BTreeMap<String, Json> {
        self.inner.read().values.clone()
    }

    /// Take the deltas logged since the last call
    pub fn take_pending(&self) -> Vec<(String, Json)> {
        std::mem::take(&mut self.inner.write().pending)
            .into_iter()
            .collect()
    }
}

fn unknown_key(key: &str) -> TraversalError {
    TraversalError::pipeline(
        format!("side-effect:{key}"),
        "unknown side-effect key".to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reducers() {
        assert_eq!(Reducer::Sum.reduce("k", &json!(2), &json!(3)).unwrap(), json!(5));
        assert_eq!(Reducer::Sum.reduce("k", &json!(2), &json!(0.5)).unwrap(), json!(2.5));
        assert_eq!(
            Reducer::MergeCounts
                .reduce("k", &json!({"a": 1}), &json!({"a": 2, "b": 1}))
                .unwrap(),
            json!({"a": 3, "b": 1})
        );
        assert_eq!(
            Reducer::Append.reduce("k", &json!([1]), &json!([2, 3])).unwrap(),
            json!([1, 2, 3])
        );
        assert_eq!(Reducer::Overwrite.reduce("k", &json!(1), &json!("x")).unwrap(), json!("x"));
        assert!(Reducer::Sum.reduce("k", &json!(1), &json!("x")).is_err());
    }

    #[test]
    fn test_sum_overflow_is_a_pipeline_error() {
        let result = Reducer::Sum.reduce("k", &json!(i64::MAX), &json!(1));
        assert!(matches!(result, Err(TraversalError::Pipeline { .. })));

        let result = Reducer::MergeCounts.reduce("k", &json!({"a": i64::MAX}), &json!({"a": 1}));
        assert!(matches!(result, Err(TraversalError::Pipeline { .. })));

        assert_eq!(
            Reducer::Sum.reduce("k", &json!(i64::MAX - 1), &json!(1)).unwrap(),
            json!(i64::MAX)
        );
        assert!(Reducer::Sum.reduce("k", &json!(1), &json!("x")).is_err());
    }

    #[test]
    fn test_distributed_adds_are_logged_and_merged() {
        let side_effects = SideEffects::new();
        side_effects.register("names", Reducer::Append);
        side_effects.set_distributed(true);

        side_effects.add("names", json!(["marko"])).unwrap();
        side_effects.add("names", json!(["josh"])).unwrap();
        assert_eq!(side_effects.get("names"), Some(json!(["marko", "josh"])));

        let pending = side_effects.take_pending();
        assert_eq!(pending, vec![("names".to_string(), json!(["marko", "josh"]))]);
        assert!(side_effects.take_pending().is_empty());
    }

    #[test]
    fn test_set_overwrites_without_logging() {
        let side_effects = SideEffects::new();
        side_effects.register("total", Reducer::Sum);
        side_effects.set_distributed(true);

        side_effects.set("total", json!(42)).unwrap();
        assert_eq!(side_effects.get("total"), Some(json!(42)));
        assert!(side_effects.take_pending().is_empty());
    }

    #[test]
    fn test_master_mode_does_not_log() {
        let side_effects = SideEffects::new();
        side_effects.register("total", Reducer::Sum);
        side_effects.add("total", json!(1)).unwrap();
        assert!(side_effects.take_pending().is_empty());
        assert!(side_effects.add("missing", json!(1)).is_err());
    }
}
