//! Wire shapes exchanged with the catalog, plus the type system it enforces.
//!
//! Every payload is a `{typeName, attributes}` envelope. Relationship
//! attributes hold `{guid}` references (or lists of them); the catalog
//! resolves them into `relationshipAttributes` on read.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub type Attributes = serde_json::Map<String, Value>;

/// Catalog type names.
pub mod types {
    pub const DATABASE: &str = "dt_database";
    pub const TABLE: &str = "dt_table";
    pub const COLUMN: &str = "dt_table_column";
    pub const FILE: &str = "dt_table_file";
    pub const MONTHLY_TABLE: &str = "dt_monthly_table";
    pub const ANNUAL_TABLE: &str = "dt_annual_table";
    pub const TIMELINE: &str = "dt_timeline";
    pub const PROCESS_CHANGE_COLUMN: &str = "dt_process_change_column";
    pub const DATASET_PROCESSING_LINEAGE: &str = "dt_dataset_processing_lineage";
}

/// Relationship definitions as pairs of end names.
///
/// An attribute named after one end, holding references, makes the referenced
/// entity expose the opposite end in its `relationshipAttributes`.
pub mod relations {
    pub const DATABASE_TABLES: (&str, &str) = ("tables_database", "belongs_database");
    pub const TABLE_COLUMNS: (&str, &str) = ("columns_table", "belongs_to_table");
    pub const TABLE_SNAPSHOTS: (&str, &str) = ("snapshots_table", "table_snapshot");
    pub const SNAPSHOT_COLUMNS: (&str, &str) = ("columns_snapshot", "snapshots_column");
    pub const SNAPSHOT_FILES: (&str, &str) = ("files_snapshot", "columns_file_table");
    pub const TABLE_FILES: (&str, &str) = ("files_table", "is_file_table");
    pub const TIMELINE_PROCESSES: (&str, &str) = ("processes_timeline", "timeline");

    pub const ALL: &[(&str, &str)] = &[
        DATABASE_TABLES,
        TABLE_COLUMNS,
        TABLE_SNAPSHOTS,
        SNAPSHOT_COLUMNS,
        SNAPSHOT_FILES,
        TABLE_FILES,
        TIMELINE_PROCESSES,
    ];

    /// Opposite end of a relationship attribute, if the name is a known end.
    pub fn inverse_of(end: &str) -> Option<&'static str> {
        ALL.iter().find_map(|&(a, b)| {
            if a == end {
                Some(b)
            } else if b == end {
                Some(a)
            } else {
                None
            }
        })
    }
}

/// `{typeName, attributes}` envelope submitted to the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityPayload {
    pub type_name: String,
    #[serde(default)]
    pub attributes: Attributes,
}

impl EntityPayload {
    pub fn new(type_name: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            type_name: type_name.into(),
            attributes,
        }
    }

    pub fn qualified_name(&self) -> Option<&str> {
        self.attributes.get("qualifiedName").and_then(Value::as_str)
    }
}

/// Reference to another entity inside a payload.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    pub guid: String,
    #[serde(rename = "typeName", default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
}

impl EntityRef {
    pub fn guid(guid: impl Into<String>) -> Self {
        Self {
            guid: guid.into(),
            type_name: None,
        }
    }

    pub fn typed(guid: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            guid: guid.into(),
            type_name: Some(type_name.into()),
        }
    }
}

/// Minimal entity description returned by searches and mutations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityHeader {
    pub guid: String,
    pub type_name: String,
    #[serde(default)]
    pub attributes: Attributes,
}

impl EntityHeader {
    pub fn name(&self) -> Option<&str> {
        self.attributes.get("name").and_then(Value::as_str)
    }

    pub fn to_ref(&self) -> EntityRef {
        EntityRef::typed(self.guid.clone(), self.type_name.clone())
    }
}

/// Full entity with resolved relationships.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub guid: String,
    pub type_name: String,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default)]
    pub relationship_attributes: BTreeMap<String, Value>,
}

impl Entity {
    pub fn name(&self) -> Option<&str> {
        self.attributes.get("name").and_then(Value::as_str)
    }

    /// GUIDs referenced through a relationship end (missing end => empty).
    pub fn related_guids(&self, end: &str) -> Vec<String> {
        self.relationship_attributes
            .get(end)
            .map(|v| referenced_guids(v).into_iter().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

/// Entity plus every entity its relationships point to, keyed by GUID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityWithRefs {
    pub entity: Entity,
    #[serde(default)]
    pub referred_entities: BTreeMap<String, Entity>,
}

/// Directed lineage relationship between two catalog entities.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Edge {
    #[serde(rename = "fromEntityId")]
    pub from_id: String,
    #[serde(rename = "toEntityId")]
    pub to_id: String,
}

impl Edge {
    pub fn new(from_id: impl Into<String>, to_id: impl Into<String>) -> Self {
        Self {
            from_id: from_id.into(),
            to_id: to_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineageGraph {
    pub base_entity_guid: String,
    #[serde(default)]
    pub relations: Vec<Edge>,
}

/// Result of a create call: which entities were inserted and which updated in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MutationResponse {
    #[serde(rename = "CREATE", default)]
    pub created: Vec<EntityHeader>,
    #[serde(rename = "UPDATE", default)]
    pub updated: Vec<EntityHeader>,
}

impl MutationResponse {
    pub fn entities(&self) -> impl Iterator<Item = &EntityHeader> {
        self.created.iter().chain(self.updated.iter())
    }
}

/// GUIDs inside a `{guid}` reference or a list of them. Anything else yields nothing.
pub fn referenced_guids(value: &Value) -> Vec<&str> {
    match value {
        Value::Object(obj) => obj.get("guid").and_then(Value::as_str).into_iter().collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.get("guid").and_then(Value::as_str))
            .collect(),
        _ => Vec::new(),
    }
}

/// Human-readable label for the number of processing steps in a lineage.
pub fn format_steps(count: usize) -> String {
    match count {
        0 => "no processing steps".to_string(),
        1 => "1 processing step".to_string(),
        n => format!("{} processing steps", n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn inverse_ends_are_symmetric() {
        assert_eq!(relations::inverse_of("columns_table"), Some("belongs_to_table"));
        assert_eq!(relations::inverse_of("belongs_to_table"), Some("columns_table"));
        assert_eq!(relations::inverse_of("name"), None);
    }

    #[test]
    fn referenced_guids_accepts_single_and_list() {
        assert_eq!(referenced_guids(&json!({"guid": "g1"})), vec!["g1"]);
        assert_eq!(
            referenced_guids(&json!([{"guid": "g1"}, {"guid": "g2", "typeName": "t"}])),
            vec!["g1", "g2"]
        );
        assert!(referenced_guids(&json!("g1")).is_empty());
    }

    #[test]
    fn edges_use_catalog_field_names() {
        let edge: Edge =
            serde_json::from_value(json!({"fromEntityId": "a", "toEntityId": "b"})).unwrap();
        assert_eq!(edge, Edge::new("a", "b"));
    }

    #[test]
    fn step_labels() {
        assert_eq!(format_steps(0), "no processing steps");
        assert_eq!(format_steps(1), "1 processing step");
        assert_eq!(format_steps(4), "4 processing steps");
    }
}
