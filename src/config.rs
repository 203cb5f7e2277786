//! Runtime configuration (config.json).
//!
//! JSON shape, every field optional:
//! {
//!   "namespace": "DataSUS",      // middle segment of synthesized qualified names
//!   "key_prefix_len": null,      // acronym width for the `key` command; inferred when null
//!   "strict_head": false,        // surface ambiguous lineage heads as errors
//!   "lineage_depth": 999999,     // depth passed to the lineage endpoint
//!   "process_type": "ETL"        // processType attribute of change processes
//! }

use anyhow::Context;
use serde::Deserialize;
use std::fs;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LineageConfig {
    pub namespace: String,
    pub key_prefix_len: Option<usize>,
    pub strict_head: bool,
    pub lineage_depth: u32,
    pub process_type: String,
}

impl Default for LineageConfig {
    fn default() -> Self {
        Self {
            namespace: "DataSUS".to_string(),
            key_prefix_len: None,
            strict_head: false,
            lineage_depth: 999_999,
            process_type: "ETL".to_string(),
        }
    }
}

impl LineageConfig {
    /// Read a config file; absent fields keep their defaults.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let text =
            fs::read_to_string(path).with_context(|| format!("read config file {}", path))?;
        serde_json::from_str(&text).with_context(|| format!("parse config file {}", path))
    }

    /// Namespace used for entities that belong to a single table.
    pub fn table_namespace(&self, acronym: &str) -> String {
        format!("{}.{}", self.namespace, acronym)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_object_keeps_defaults() {
        let cfg: LineageConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.namespace, "DataSUS");
        assert_eq!(cfg.key_prefix_len, None);
        assert!(!cfg.strict_head);
        assert_eq!(cfg.lineage_depth, 999_999);
    }

    #[test]
    fn partial_override() {
        let cfg: LineageConfig =
            serde_json::from_str(r#"{"namespace": "Sus", "strict_head": true}"#).unwrap();
        assert_eq!(cfg.namespace, "Sus");
        assert!(cfg.strict_head);
        assert_eq!(cfg.process_type, "ETL");
        assert_eq!(cfg.table_namespace("AC"), "Sus.AC");
    }

    #[test]
    fn fixed_key_prefix() {
        let cfg: LineageConfig = serde_json::from_str(r#"{"key_prefix_len": 3}"#).unwrap();
        assert_eq!(cfg.key_prefix_len, Some(3));
    }
}
