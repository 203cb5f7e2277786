//! Lineage assembly: turn raw snapshot data into derived catalog entities.
//!
//! Every run fetches what it needs fresh from the catalog, builds the
//! column-name -> GUID map once, and submits derived entities in batches.
//! A failed batch aborts the remaining steps.

use crate::catalog::model::{relations, types};
use crate::catalog::{
    Attributes, Catalog, CatalogQuery, EntityHeader, EntityRef, EntityWithRefs, LineageGraph,
    Period, PeriodFilter, PeriodRange, format_steps,
};
use crate::config::LineageConfig;
use crate::lineage::changes::{ChangeInterval, Snapshot, detect_changes};
use crate::lineage::entity::{
    ChangeProcess, DerivedEntity, IntervalAggregate, MonthlyTable, Timeline, qualified_name,
};
use crate::lineage::head::{resolve_head, resolve_head_strict};
use crate::lineage::key::LineageKey;
use crate::{LineageError, Result};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info, warn};

/// Period requested for an interval aggregate. Months are required for
/// monthly granularity and ignored for annual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct AggregateInterval {
    pub start_year: i32,
    pub end_year: i32,
    #[serde(default)]
    pub start_month: Option<u32>,
    #[serde(default)]
    pub end_month: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Monthly,
    Annual,
}

/// Everything a monthly lineage run stored.
#[derive(Debug, Clone, Serialize)]
pub struct MonthlyLineage {
    pub monthly: Vec<EntityHeader>,
    pub timeline: EntityHeader,
    pub intervals: Vec<ChangeInterval>,
    pub processes: Vec<EntityHeader>,
}

/// Current head of an entity's lineage.
#[derive(Debug, Clone, Serialize)]
pub struct LineageHead {
    pub head: EntityWithRefs,
    pub lineage: LineageGraph,
    pub steps: usize,
    pub steps_label: String,
}

pub struct LineageAssembler<C> {
    pub(crate) catalog: C,
    pub(crate) config: LineageConfig,
}

impl<C: Catalog> LineageAssembler<C> {
    pub fn new(catalog: C, config: LineageConfig) -> Self {
        Self { catalog, config }
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn config(&self) -> &LineageConfig {
        &self.config
    }

    pub fn into_catalog(self) -> C {
        self.catalog
    }

    pub(crate) fn find_table(&self, acronym: &str) -> Result<EntityHeader> {
        let acronym = acronym.trim().to_uppercase();
        self.catalog
            .find_entity_by_attribute(types::TABLE, "acronym", &acronym)?
            .ok_or_else(|| LineageError::not_found("table", acronym))
    }

    /// Build monthly snapshot entities, a timeline, and one change process per
    /// detected column-set change.
    pub fn build_monthly_lineage(
        &mut self,
        table_acronym: &str,
        snapshots: &BTreeMap<String, Vec<String>>,
    ) -> Result<MonthlyLineage> {
        let acronym = table_acronym.trim().to_uppercase();
        let namespace = self.config.table_namespace(&acronym);

        // 1) Table.
        let table = self.find_table(&acronym)?;

        // 2) Column name -> GUID, once per run.
        let full_table = self.catalog.get_entity_by_guid(&table.guid)?;
        let column_ids = column_ids(&full_table);
        let table_name = full_table
            .entity
            .name()
            .unwrap_or(acronym.as_str())
            .to_string();
        debug!(table = %acronym, columns = column_ids.len(), "resolved table columns");

        // Keys and column names are normalized once; detection below sees the same sets.
        let normalized = normalize_snapshots(snapshots)?;

        // 3) Monthly snapshot entities.
        let mut payloads = Vec::with_capacity(normalized.len());
        for (key, cols) in &normalized {
            let parsed = LineageKey::parse(key, acronym.len())?;
            if !parsed.acronym.eq_ignore_ascii_case(&acronym) {
                return Err(LineageError::Validation(format!(
                    "lineage key {} does not belong to table {}",
                    key, acronym
                )));
            }
            let columns_snapshot = cols
                .iter()
                .map(|c| column_ref(&column_ids, &acronym, c))
                .collect::<Result<Vec<_>>>()?;
            let entity = DerivedEntity::MonthlyTable(MonthlyTable {
                name: key.clone(),
                description: format!(
                    "Columns of {} tables for year {} and month {:02}",
                    acronym,
                    parsed.year(),
                    parsed.month
                ),
                qualified_name: qualified_name(types::MONTHLY_TABLE, &namespace, key),
                year: parsed.year(),
                month: parsed.month,
                columns_snapshot,
                table_snapshot: EntityRef::guid(table.guid.clone()),
            });
            payloads.push(entity.into_payload()?);
        }
        let monthly: Vec<EntityHeader> = if payloads.is_empty() {
            warn!(table = %acronym, "no snapshots supplied");
            Vec::new()
        } else {
            self.catalog.create_entities(payloads)?.entities().cloned().collect()
        };
        info!(table = %acronym, count = monthly.len(), "stored monthly snapshots");

        // 4) Timeline.
        let timeline = DerivedEntity::Timeline(Timeline {
            name: format!("Timeline of {}", table_name),
            description: format!("Column change timeline of {}", table_name),
            qualified_name: qualified_name(types::TIMELINE, &self.config.namespace, &table_name),
        });
        let timeline = self.catalog.create_entity(timeline.into_payload()?)?;

        // 5) Change intervals.
        let intervals = detect_changes(&Snapshot::from_map(&normalized));
        info!(table = %acronym, count = intervals.len(), "detected column changes");

        // 6) + 7) One process per interval, linking the boundary snapshots.
        let by_name: HashMap<String, &EntityHeader> = monthly
            .iter()
            .filter(|h| h.type_name == types::MONTHLY_TABLE)
            .filter_map(|h| h.name().map(|n| (name_key(n), h)))
            .collect();

        let mut payloads = Vec::with_capacity(intervals.len());
        for interval in &intervals {
            let start = lookup_snapshot(&by_name, &interval.start)?;
            let end = lookup_snapshot(&by_name, &interval.end)?;
            let added_columns = interval
                .added
                .iter()
                .map(|c| column_ref(&column_ids, &acronym, c))
                .collect::<Result<Vec<_>>>()?;
            let deleted_columns = interval
                .removed
                .iter()
                .map(|c| column_ref(&column_ids, &acronym, c))
                .collect::<Result<Vec<_>>>()?;

            let entity = DerivedEntity::ChangeProcess(ChangeProcess {
                name: format!("Column change | {} - {}", interval.start, interval.end),
                description: format!(
                    "Column change in table {} between {} and {}",
                    acronym, interval.start, interval.end
                ),
                qualified_name: qualified_name(
                    types::PROCESS_CHANGE_COLUMN,
                    &namespace,
                    &interval.label(),
                ),
                added_columns,
                deleted_columns,
                inputs: vec![start.to_ref()],
                outputs: vec![end.to_ref()],
                process_type: self.config.process_type.clone(),
                timeline: EntityRef::guid(timeline.guid.clone()),
            });
            payloads.push(entity.into_payload()?);
        }
        let processes: Vec<EntityHeader> = if payloads.is_empty() {
            Vec::new()
        } else {
            self.catalog.create_entities(payloads)?.entities().cloned().collect()
        };
        info!(table = %acronym, count = processes.len(), "stored change processes");

        Ok(MonthlyLineage {
            monthly,
            timeline,
            intervals,
            processes,
        })
    }

    /// Aggregate the files and columns of every snapshot inside `interval`
    /// into one processing-lineage record.
    ///
    /// `process` must carry `id_process`. If it has neither `name` nor
    /// `description`, both are defaulted.
    pub fn build_interval_aggregate(
        &mut self,
        interval: &AggregateInterval,
        table_acronym: &str,
        process: &Attributes,
        granularity: Granularity,
    ) -> Result<EntityHeader> {
        let id_process = process
            .get("id_process")
            .filter(|v| !v.is_null())
            .cloned()
            .ok_or_else(|| LineageError::Validation("id_process is required".to_string()))?;
        let id_key = match &id_process {
            Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            other => {
                return Err(LineageError::Validation(format!(
                    "id_process must be a string or number, got {}",
                    other
                )));
            }
        };

        let acronym = table_acronym.trim().to_uppercase();
        let (filter, default_name, default_description) =
            period_filter(interval, &acronym, granularity)?;

        // 1) Table.
        let table = self.find_table(&acronym)?;

        // 2) Snapshots inside the period.
        let type_name = match granularity {
            Granularity::Monthly => types::MONTHLY_TABLE,
            Granularity::Annual => types::ANNUAL_TABLE,
        };
        let query = CatalogQuery {
            type_name: type_name.to_string(),
            name_prefix: acronym.clone(),
            table_guid: Some(table.guid.clone()),
            filter,
        };
        let headers = self.catalog.search_entities(&query)?;
        debug!(dsl = %query.to_dsl(), matched = headers.len(), "snapshot search");

        // 3) Union of referenced columns and files.
        let mut columns = BTreeSet::new();
        let mut files = BTreeSet::new();
        if headers.is_empty() {
            warn!(table = %acronym, "no snapshots inside the requested period");
        } else {
            let guids: Vec<String> = headers.into_iter().map(|h| h.guid).collect();
            for entity in self.catalog.get_entities_by_guid(&guids)? {
                columns.extend(entity.related_guids(relations::SNAPSHOT_COLUMNS.0));
                files.extend(entity.related_guids(relations::SNAPSHOT_FILES.0));
            }
        }

        // 4) Aggregate record.
        let mut defaults = Attributes::new();
        if !process.contains_key("name") && !process.contains_key("description") {
            defaults.insert("name".into(), Value::String(default_name));
            defaults.insert("description".into(), Value::String(default_description));
        }
        let mut overrides = process.clone();
        overrides.remove("id_process");

        let entity = DerivedEntity::IntervalAggregate(IntervalAggregate {
            defaults,
            overrides,
            qualified_name: qualified_name(
                types::DATASET_PROCESSING_LINEAGE,
                &self.config.table_namespace(&acronym),
                &id_key,
            ),
            id_process,
            table: EntityRef::guid(table.guid),
            files: files.into_iter().map(EntityRef::guid).collect(),
            columns: columns.into_iter().map(EntityRef::guid).collect(),
        });
        let stored = self.catalog.create_entity(entity.into_payload()?)?;
        info!(guid = %stored.guid, table = %acronym, "stored interval aggregate");
        Ok(stored)
    }

    /// Follow an entity's lineage to its current head. Without a unique head
    /// the origin entity is its own head, unless `strict_head` is configured.
    pub fn resolve_current_lineage_head(&self, guid: &str) -> Result<LineageHead> {
        let origin = self.catalog.get_entity_by_guid(guid)?;
        let lineage = self
            .catalog
            .get_lineage_by_guid(&origin.entity.guid, self.config.lineage_depth)?;

        let head_guid = if self.config.strict_head {
            resolve_head_strict(&lineage.relations)?
        } else {
            resolve_head(&lineage.relations)
        };

        let head = match head_guid {
            Some(head_guid) if head_guid != origin.entity.guid => {
                self.catalog.get_entity_by_guid(&head_guid)?
            }
            Some(_) => origin,
            None => {
                debug!(guid, edges = lineage.relations.len(), "no lineage head, using origin");
                origin
            }
        };

        let steps = lineage.relations.len();
        Ok(LineageHead {
            head,
            steps,
            steps_label: format_steps(steps),
            lineage,
        })
    }
}

/// Column name -> GUID from a table's `columns_table` relationship.
fn column_ids(table: &EntityWithRefs) -> HashMap<String, String> {
    table
        .entity
        .related_guids(relations::TABLE_COLUMNS.0)
        .into_iter()
        .filter_map(|guid| {
            let name = table.referred_entities.get(&guid)?.name()?.trim().to_string();
            Some((name, guid))
        })
        .collect()
}

fn column_ref(ids: &HashMap<String, String>, acronym: &str, column: &str) -> Result<EntityRef> {
    ids.get(column)
        .map(|guid| EntityRef::guid(guid.clone()))
        .ok_or_else(|| LineageError::not_found("column", format!("{}.{}", acronym, column)))
}

/// Trim keys, then trim, sort and dedup each column list. Keys that only
/// differ by case or surrounding whitespace are rejected: the monthly
/// entities they produce could not be told apart by name.
fn normalize_snapshots(
    snapshots: &BTreeMap<String, Vec<String>>,
) -> Result<BTreeMap<String, Vec<String>>> {
    let mut seen: HashMap<String, &str> = HashMap::new();
    let mut out = BTreeMap::new();
    for (key, cols) in snapshots {
        if let Some(first) = seen.insert(name_key(key), key) {
            return Err(LineageError::Validation(format!(
                "lineage keys {:?} and {:?} collide",
                first, key
            )));
        }
        let mut cols: Vec<String> = cols.iter().map(|c| c.trim().to_string()).collect();
        cols.sort();
        cols.dedup();
        out.insert(key.trim().to_string(), cols);
    }
    Ok(out)
}

fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

fn lookup_snapshot<'a>(
    by_name: &HashMap<String, &'a EntityHeader>,
    key: &str,
) -> Result<&'a EntityHeader> {
    by_name
        .get(&name_key(key))
        .copied()
        .ok_or_else(|| LineageError::not_found("monthly snapshot", key))
}

/// Filter plus default name/description for an aggregate period.
fn period_filter(
    interval: &AggregateInterval,
    acronym: &str,
    granularity: Granularity,
) -> Result<(PeriodFilter, String, String)> {
    if interval.start_year > interval.end_year {
        return Err(LineageError::Validation(format!(
            "start year {} is after end year {}",
            interval.start_year, interval.end_year
        )));
    }

    match granularity {
        Granularity::Annual => Ok((
            PeriodFilter::Annual {
                start_year: interval.start_year,
                end_year: interval.end_year,
            },
            format!(
                "Files of {} - {}-{}",
                acronym, interval.start_year, interval.end_year
            ),
            format!(
                "Files of {} processed for the years {} to {}",
                acronym, interval.start_year, interval.end_year
            ),
        )),
        Granularity::Monthly => {
            let (Some(start_month), Some(end_month)) = (interval.start_month, interval.end_month)
            else {
                return Err(LineageError::Validation(
                    "monthly interval requires start_month and end_month".to_string(),
                ));
            };
            for m in [start_month, end_month] {
                if !(1..=12).contains(&m) {
                    return Err(LineageError::Validation(format!(
                        "month {} outside 1-12",
                        m
                    )));
                }
            }
            let range = PeriodRange {
                start: Period::new(interval.start_year, start_month),
                end: Period::new(interval.end_year, end_month),
            };
            if range.start > range.end {
                return Err(LineageError::Validation(format!(
                    "interval start {:02}/{} is after end {:02}/{}",
                    start_month, interval.start_year, end_month, interval.end_year
                )));
            }
            Ok((
                PeriodFilter::Monthly(range),
                format!(
                    "Files of {} - {:02}{}-{:02}{}",
                    acronym, start_month, interval.start_year, end_month, interval.end_year
                ),
                format!("Files of {} that went through a process", acronym),
            ))
        }
    }
}
