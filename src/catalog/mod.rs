//! Catalog collaborator: the request/response contract the engine talks to.
//!
//! This module owns:
//! - wire shapes and the catalog type system (model)
//! - typed snapshot searches (query)
//! - an in-memory catalog used by tests and the CLI fixture mode (memory)

pub mod memory;
pub mod model;
pub mod query;

pub use memory::InMemoryCatalog;
pub use model::{
    Attributes, Edge, Entity, EntityHeader, EntityPayload, EntityRef, EntityWithRefs,
    LineageGraph, MutationResponse, format_steps,
};
pub use query::{CatalogQuery, Period, PeriodFilter, PeriodRange};

use crate::Result;

/// Synchronous catalog service.
///
/// Calls block until the catalog answers. A failed bulk create rejects the
/// whole batch.
pub trait Catalog {
    fn find_entity_by_attribute(
        &self,
        type_name: &str,
        attr_name: &str,
        value: &str,
    ) -> Result<Option<EntityHeader>>;

    fn get_entity_by_guid(&self, guid: &str) -> Result<EntityWithRefs>;

    fn get_entities_by_guid(&self, guids: &[String]) -> Result<Vec<Entity>>;

    fn get_lineage_by_guid(&self, guid: &str, depth: u32) -> Result<LineageGraph>;

    fn create_entity(&mut self, payload: EntityPayload) -> Result<EntityHeader>;

    fn create_entities(&mut self, payloads: Vec<EntityPayload>) -> Result<MutationResponse>;

    fn search_entities(&self, query: &CatalogQuery) -> Result<Vec<EntityHeader>>;

    fn delete_entity(&mut self, guid: &str) -> Result<()>;
}
