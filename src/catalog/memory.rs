//! In-memory catalog.
//!
//! Entities are stored as submitted and keyed by GUID. Relationships are
//! resolved on read from `{guid}` references, and lineage edges are derived
//! from process entities' `inputs`/`outputs` (input -> process -> output).
//!
//! Creating an entity whose (typeName, qualifiedName) already exists updates it
//! in place and keeps its GUID, so re-running an assembly is idempotent.

use crate::catalog::model::{
    Edge, Entity, EntityHeader, EntityPayload, EntityWithRefs, LineageGraph, MutationResponse,
    referenced_guids, relations,
};
use crate::catalog::{Catalog, CatalogQuery};
use crate::{LineageError, Result};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::debug;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InMemoryCatalog {
    #[serde(default)]
    entities: BTreeMap<String, EntityPayload>,
    #[serde(default)]
    next_id: u64,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Insert an entity under a caller-chosen GUID (fixtures, tests).
    pub fn insert(&mut self, guid: impl Into<String>, payload: EntityPayload) {
        self.entities.insert(guid.into(), payload);
    }

    pub fn guid_of(&self, type_name: &str, qualified_name: &str) -> Option<&str> {
        self.entities
            .iter()
            .find(|(_, p)| p.type_name == type_name && p.qualified_name() == Some(qualified_name))
            .map(|(guid, _)| guid.as_str())
    }

    fn entity(&self, guid: &str) -> Result<Entity> {
        let payload = self
            .entities
            .get(guid)
            .ok_or_else(|| LineageError::not_found("entity", guid))?;
        Ok(Entity {
            guid: guid.to_string(),
            type_name: payload.type_name.clone(),
            attributes: payload.attributes.clone(),
            relationship_attributes: self.relationship_attributes(guid, payload),
        })
    }

    /// Own relationship ends plus the inverse ends of everything pointing here.
    fn relationship_attributes(
        &self,
        guid: &str,
        payload: &EntityPayload,
    ) -> BTreeMap<String, Value> {
        let mut out = BTreeMap::new();
        for (attr, value) in &payload.attributes {
            if relations::inverse_of(attr).is_some() && !referenced_guids(value).is_empty() {
                out.insert(attr.clone(), value.clone());
            }
        }

        for (other_guid, other) in &self.entities {
            for (attr, value) in &other.attributes {
                let Some(inverse) = relations::inverse_of(attr) else {
                    continue;
                };
                if !referenced_guids(value).contains(&guid) {
                    continue;
                }
                let slot = out
                    .entry(inverse.to_string())
                    .or_insert_with(|| Value::Array(Vec::new()));
                if let Value::Array(items) = slot {
                    items.push(json!({ "guid": other_guid, "typeName": other.type_name }));
                }
            }
        }
        out
    }

    fn check_payload(&self, payload: &EntityPayload) -> Result<()> {
        if payload.type_name.trim().is_empty() {
            return Err(LineageError::Catalog("typeName is required".to_string()));
        }
        match payload.qualified_name() {
            Some(qn) if !qn.trim().is_empty() => {}
            _ => {
                return Err(LineageError::Catalog(format!(
                    "{} entity is missing a qualifiedName",
                    payload.type_name
                )));
            }
        }
        for (attr, value) in &payload.attributes {
            for guid in referenced_guids(value) {
                if !self.entities.contains_key(guid) {
                    return Err(LineageError::Catalog(format!(
                        "attribute {} of {} references unknown guid {}",
                        attr, payload.type_name, guid
                    )));
                }
            }
        }
        Ok(())
    }

    fn allocate_guid(&mut self) -> String {
        loop {
            self.next_id += 1;
            let guid = format!("guid-{:06}", self.next_id);
            if !self.entities.contains_key(&guid) {
                return guid;
            }
        }
    }

    /// Returns the stored header and whether the entity was newly created.
    fn upsert(&mut self, payload: EntityPayload) -> (EntityHeader, bool) {
        let existing = payload
            .qualified_name()
            .and_then(|qn| self.guid_of(&payload.type_name, qn))
            .map(str::to_string);
        let created = existing.is_none();
        let guid = match existing {
            Some(guid) => guid,
            None => self.allocate_guid(),
        };
        let out = header(&guid, &payload);
        self.entities.insert(guid, payload);
        (out, created)
    }

    fn process_edges(&self) -> Vec<Edge> {
        let mut edges = Vec::new();
        for (guid, payload) in &self.entities {
            if let Some(inputs) = payload.attributes.get("inputs") {
                for input in referenced_guids(inputs) {
                    edges.push(Edge::new(input, guid.as_str()));
                }
            }
            if let Some(outputs) = payload.attributes.get("outputs") {
                for output in referenced_guids(outputs) {
                    edges.push(Edge::new(guid.as_str(), output));
                }
            }
        }
        edges
    }
}

fn header(guid: &str, payload: &EntityPayload) -> EntityHeader {
    EntityHeader {
        guid: guid.to_string(),
        type_name: payload.type_name.clone(),
        attributes: payload.attributes.clone(),
    }
}

/// Breadth-first walk along one orientation of the edges, bounded by `max_hops`.
fn walk<'a, F>(
    origin: &'a str,
    max_hops: u64,
    edges: &'a [Edge],
    orient: F,
    out: &mut BTreeSet<Edge>,
) where
    F: Fn(&'a Edge) -> (&'a str, &'a str),
{
    let mut seen: BTreeSet<&'a str> = BTreeSet::new();
    let mut queue: VecDeque<(&'a str, u64)> = VecDeque::new();
    seen.insert(origin);
    queue.push_back((origin, 0));

    while let Some((node, dist)) = queue.pop_front() {
        if dist >= max_hops {
            continue;
        }
        for edge in edges {
            let (here, next) = orient(edge);
            if here != node {
                continue;
            }
            out.insert(edge.clone());
            if seen.insert(next) {
                queue.push_back((next, dist + 1));
            }
        }
    }
}

impl Catalog for InMemoryCatalog {
    fn find_entity_by_attribute(
        &self,
        type_name: &str,
        attr_name: &str,
        value: &str,
    ) -> Result<Option<EntityHeader>> {
        Ok(self
            .entities
            .iter()
            .find(|(_, p)| {
                p.type_name == type_name
                    && p.attributes.get(attr_name).and_then(Value::as_str) == Some(value)
            })
            .map(|(guid, p)| header(guid, p)))
    }

    fn get_entity_by_guid(&self, guid: &str) -> Result<EntityWithRefs> {
        let entity = self.entity(guid)?;
        let mut referred_entities = BTreeMap::new();
        for value in entity.relationship_attributes.values() {
            for referred in referenced_guids(value) {
                // Dangling references (deleted targets) are skipped.
                if let Ok(e) = self.entity(referred) {
                    referred_entities.insert(referred.to_string(), e);
                }
            }
        }
        Ok(EntityWithRefs {
            entity,
            referred_entities,
        })
    }

    fn get_entities_by_guid(&self, guids: &[String]) -> Result<Vec<Entity>> {
        guids.iter().map(|g| self.entity(g)).collect()
    }

    fn get_lineage_by_guid(&self, guid: &str, depth: u32) -> Result<LineageGraph> {
        if !self.entities.contains_key(guid) {
            return Err(LineageError::not_found("entity", guid));
        }

        // One lineage level is entity -> process -> entity.
        let max_hops = u64::from(depth) * 2;
        let edges = self.process_edges();
        let mut relations = BTreeSet::new();
        walk(
            guid,
            max_hops,
            &edges,
            |e| (e.from_id.as_str(), e.to_id.as_str()),
            &mut relations,
        );
        walk(
            guid,
            max_hops,
            &edges,
            |e| (e.to_id.as_str(), e.from_id.as_str()),
            &mut relations,
        );

        Ok(LineageGraph {
            base_entity_guid: guid.to_string(),
            relations: relations.into_iter().collect(),
        })
    }

    fn create_entity(&mut self, payload: EntityPayload) -> Result<EntityHeader> {
        self.check_payload(&payload)?;
        let (header, created) = self.upsert(payload);
        debug!(guid = %header.guid, type_name = %header.type_name, created, "stored entity");
        Ok(header)
    }

    fn create_entities(&mut self, payloads: Vec<EntityPayload>) -> Result<MutationResponse> {
        // Validate the whole batch before touching storage.
        for payload in &payloads {
            self.check_payload(payload)?;
        }

        let mut response = MutationResponse::default();
        for payload in payloads {
            let (header, created) = self.upsert(payload);
            if created {
                response.created.push(header);
            } else {
                response.updated.push(header);
            }
        }
        debug!(
            created = response.created.len(),
            updated = response.updated.len(),
            "stored entity batch"
        );
        Ok(response)
    }

    fn search_entities(&self, query: &CatalogQuery) -> Result<Vec<EntityHeader>> {
        debug!(dsl = %query.to_dsl(), "search");
        Ok(self
            .entities
            .iter()
            .filter(|(_, p)| query.matches(&p.type_name, &p.attributes))
            .map(|(guid, p)| header(guid, p))
            .collect())
    }

    fn delete_entity(&mut self, guid: &str) -> Result<()> {
        self.entities
            .remove(guid)
            .map(|_| ())
            .ok_or_else(|| LineageError::not_found("entity", guid))
    }
}
