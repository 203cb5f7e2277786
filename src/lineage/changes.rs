//! Column change detection across a time-ordered run of snapshots.
//!
//! Walks snapshots in key order and emits one [`ChangeInterval`] at every
//! boundary where column membership differs from the previous snapshot.
//! `start` is the first snapshot of the unchanged run, `end` is the first
//! snapshot that differs. The first snapshot never produces a record.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Named point-in-time column set of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub key: String,
    pub columns: BTreeSet<String>,
}

impl Snapshot {
    pub fn new<I, S>(key: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            key: key.into(),
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Snapshots of a `{key -> columns}` map, in lexicographic key order.
    pub fn from_map(map: &BTreeMap<String, Vec<String>>) -> Vec<Snapshot> {
        map.iter()
            .map(|(key, cols)| Snapshot::new(key.clone(), cols.iter().cloned()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeInterval {
    pub start: String,
    pub end: String,
    pub added: BTreeSet<String>,
    pub removed: BTreeSet<String>,
}

impl ChangeInterval {
    /// "start-end", used as the key of change-process records.
    pub fn label(&self) -> String {
        format!("{}-{}", self.start, self.end)
    }
}

/// Detect column-set changes. Input must already be sorted by key.
pub fn detect_changes(snapshots: &[Snapshot]) -> Vec<ChangeInterval> {
    let mut out = Vec::new();
    let Some(first) = snapshots.first() else {
        return out;
    };

    let mut last_columns = &first.columns;
    let mut interval_start = first.key.as_str();

    for snap in &snapshots[1..] {
        let added: BTreeSet<String> = snap.columns.difference(last_columns).cloned().collect();
        let removed: BTreeSet<String> = last_columns.difference(&snap.columns).cloned().collect();

        if !added.is_empty() || !removed.is_empty() {
            out.push(ChangeInterval {
                start: interval_start.to_string(),
                end: snap.key.clone(),
                added,
                removed,
            });
            interval_start = snap.key.as_str();
        }
        last_columns = &snap.columns;
    }

    out
}
