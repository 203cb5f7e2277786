//! Registration of the base entities lineage is built on: tables, their
//! columns, and data files attached to annual snapshots.

use crate::catalog::model::{relations, types};
use crate::catalog::{Attributes, Catalog, EntityHeader, EntityPayload, EntityRef, MutationResponse};
use crate::lineage::assembler::LineageAssembler;
use crate::lineage::entity::qualified_name;
use crate::{LineageError, Result};

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

/// One column row as read from a data dictionary.
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub domain: String,
    #[serde(default, rename = "type")]
    pub data_type: String,
    #[serde(default)]
    pub observation: String,
}

impl<C: Catalog> LineageAssembler<C> {
    /// Create a table under an existing database. `attributes` must carry
    /// `acronym`; it is stored upper-cased.
    pub fn register_table(
        &mut self,
        mut attributes: Attributes,
        database_acronym: &str,
    ) -> Result<EntityHeader> {
        let acronym = attributes
            .get("acronym")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| LineageError::Validation("table acronym is required".to_string()))?;

        let database = self
            .catalog
            .find_entity_by_attribute(types::DATABASE, "acronym", database_acronym)?
            .ok_or_else(|| LineageError::not_found("database", database_acronym))?;

        attributes.insert(
            "qualifiedName".into(),
            Value::String(qualified_name(types::TABLE, &self.config.namespace, &acronym)),
        );
        attributes.insert("acronym".into(), Value::String(acronym));
        attributes.insert(
            relations::DATABASE_TABLES.1.into(),
            serde_json::to_value(EntityRef::guid(database.guid))?,
        );

        let stored = self
            .catalog
            .create_entity(EntityPayload::new(types::TABLE, attributes))?;
        info!(guid = %stored.guid, "registered table");
        Ok(stored)
    }

    /// Bulk-create column entities for a table.
    pub fn register_columns(
        &mut self,
        table_acronym: &str,
        columns: &[ColumnDescriptor],
    ) -> Result<MutationResponse> {
        let table = self.find_table(table_acronym)?;
        let acronym = table_acronym.trim().to_uppercase();
        let namespace = self.config.table_namespace(&acronym);

        let mut payloads = Vec::with_capacity(columns.len());
        for col in columns {
            let name = col.name.trim();
            let description = col
                .description
                .clone()
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| "Undocumented".to_string());

            let mut attrs = Attributes::new();
            attrs.insert("name".into(), json!(name));
            attrs.insert(
                "qualifiedName".into(),
                json!(qualified_name(types::COLUMN, &namespace, name)),
            );
            attrs.insert("description".into(), json!(description));
            attrs.insert("primary_key".into(), json!(col.primary_key));
            attrs.insert("domain".into(), json!(col.domain));
            attrs.insert("type".into(), json!(col.data_type));
            attrs.insert("observation".into(), json!(col.observation));
            attrs.insert(
                relations::TABLE_COLUMNS.1.into(),
                serde_json::to_value(EntityRef::guid(table.guid.clone()))?,
            );
            payloads.push(EntityPayload::new(types::COLUMN, attrs));
        }

        let response = self.catalog.create_entities(payloads)?;
        info!(
            table = %acronym,
            created = response.created.len(),
            updated = response.updated.len(),
            "registered columns"
        );
        Ok(response)
    }

    /// Attach a data file to its table and annual snapshot. A file name can
    /// only be registered once.
    pub fn register_file(
        &mut self,
        mut file: Attributes,
        table_acronym: &str,
        annual_table_name: &str,
    ) -> Result<EntityHeader> {
        let name = file
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| LineageError::Validation("file name is required".to_string()))?;

        if self
            .catalog
            .find_entity_by_attribute(types::FILE, "name", &name)?
            .is_some()
        {
            return Err(LineageError::Validation(format!(
                "file {} already has metadata",
                name
            )));
        }

        let table = self.find_table(table_acronym)?;
        let annual = self
            .catalog
            .find_entity_by_attribute(types::ANNUAL_TABLE, "name", annual_table_name)?
            .ok_or_else(|| LineageError::not_found("annual table", annual_table_name))?;

        file.insert(
            "qualifiedName".into(),
            Value::String(qualified_name(types::FILE, &self.config.namespace, &name)),
        );
        file.insert(
            relations::TABLE_FILES.1.into(),
            serde_json::to_value(EntityRef::guid(table.guid))?,
        );
        file.insert(
            relations::SNAPSHOT_FILES.1.into(),
            serde_json::to_value(EntityRef::guid(annual.guid))?,
        );

        let stored = self
            .catalog
            .create_entity(EntityPayload::new(types::FILE, file))?;
        info!(guid = %stored.guid, file = %name, "registered file");
        Ok(stored)
    }
}
