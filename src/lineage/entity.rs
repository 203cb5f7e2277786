//! Derived entities synthesized by an assembly run.
//!
//! Each variant serializes into the common `{typeName, attributes}` envelope.
//! Qualified names are `<typeName>.<namespace>@<key>`, so identical input
//! always yields identical names.

use crate::Result;
use crate::catalog::model::{Attributes, EntityPayload, EntityRef, types};

use serde::Serialize;
use serde_json::Value;

pub fn qualified_name(type_name: &str, namespace: &str, key: &str) -> String {
    format!("{}.{}@{}", type_name, namespace, key)
}

/// One table snapshot for a single month.
#[derive(Debug, Clone, Serialize)]
pub struct MonthlyTable {
    pub name: String,
    pub description: String,
    #[serde(rename = "qualifiedName")]
    pub qualified_name: String,
    pub year: i32,
    pub month: u32,
    /// Column references, in sorted column-name order.
    pub columns_snapshot: Vec<EntityRef>,
    pub table_snapshot: EntityRef,
}

/// Column-change history of one table.
#[derive(Debug, Clone, Serialize)]
pub struct Timeline {
    pub name: String,
    pub description: String,
    #[serde(rename = "qualifiedName")]
    pub qualified_name: String,
}

/// Process linking two monthly snapshots across a column-set change.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeProcess {
    pub name: String,
    pub description: String,
    #[serde(rename = "qualifiedName")]
    pub qualified_name: String,
    pub added_columns: Vec<EntityRef>,
    pub deleted_columns: Vec<EntityRef>,
    pub inputs: Vec<EntityRef>,
    pub outputs: Vec<EntityRef>,
    #[serde(rename = "processType")]
    pub process_type: String,
    pub timeline: EntityRef,
}

/// Files and columns touched by an ETL batch over a period of snapshots.
///
/// Attribute precedence, lowest first: `defaults`, then `overrides`
/// (caller-supplied), then the synthesized fields.
#[derive(Debug, Clone)]
pub struct IntervalAggregate {
    pub defaults: Attributes,
    pub overrides: Attributes,
    pub qualified_name: String,
    pub id_process: Value,
    pub table: EntityRef,
    pub files: Vec<EntityRef>,
    pub columns: Vec<EntityRef>,
}

#[derive(Debug, Clone)]
pub enum DerivedEntity {
    MonthlyTable(MonthlyTable),
    Timeline(Timeline),
    ChangeProcess(ChangeProcess),
    IntervalAggregate(IntervalAggregate),
}

impl DerivedEntity {
    pub fn type_name(&self) -> &'static str {
        match self {
            DerivedEntity::MonthlyTable(_) => types::MONTHLY_TABLE,
            DerivedEntity::Timeline(_) => types::TIMELINE,
            DerivedEntity::ChangeProcess(_) => types::PROCESS_CHANGE_COLUMN,
            DerivedEntity::IntervalAggregate(_) => types::DATASET_PROCESSING_LINEAGE,
        }
    }

    pub fn qualified_name(&self) -> &str {
        match self {
            DerivedEntity::MonthlyTable(e) => &e.qualified_name,
            DerivedEntity::Timeline(e) => &e.qualified_name,
            DerivedEntity::ChangeProcess(e) => &e.qualified_name,
            DerivedEntity::IntervalAggregate(e) => &e.qualified_name,
        }
    }

    pub fn into_payload(self) -> Result<EntityPayload> {
        let type_name = self.type_name();
        let attributes = match self {
            DerivedEntity::MonthlyTable(e) => to_attributes(&e)?,
            DerivedEntity::Timeline(e) => to_attributes(&e)?,
            DerivedEntity::ChangeProcess(e) => to_attributes(&e)?,
            DerivedEntity::IntervalAggregate(e) => e.into_attributes()?,
        };
        Ok(EntityPayload::new(type_name, attributes))
    }
}

impl IntervalAggregate {
    fn into_attributes(self) -> Result<Attributes> {
        let mut attrs = self.defaults;
        attrs.extend(self.overrides);
        attrs.insert("qualifiedName".into(), Value::String(self.qualified_name));
        attrs.insert("files_interval".into(), serde_json::to_value(&self.files)?);
        attrs.insert("table".into(), serde_json::to_value(&self.table)?);
        attrs.insert("columns".into(), serde_json::to_value(&self.columns)?);
        attrs.insert("id".into(), self.id_process);
        Ok(attrs)
    }
}

fn to_attributes<T: Serialize>(value: &T) -> Result<Attributes> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(crate::LineageError::Validation(format!(
            "entity attributes must serialize to an object, got {}",
            other
        ))),
    }
}
