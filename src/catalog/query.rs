//! Period filters for snapshot searches.
//!
//! The catalog speaks a DSL (`dt_monthly_table where name like "AC*" and ...`);
//! we keep the filter typed and render the DSL text only at the edge.

use crate::catalog::model::{Attributes, referenced_guids, relations};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Calendar year + month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    /// Read `year`/`month` attributes; month may be stored as number or "MM" string.
    pub fn from_attributes(attrs: &Attributes) -> Option<Self> {
        let year = attrs.get("year").and_then(as_i64)?;
        let month = attrs.get("month").and_then(as_i64)?;
        Some(Self::new(
            i32::try_from(year).ok()?,
            u32::try_from(month).ok()?,
        ))
    }
}

/// Inclusive `[start, end]` range over (year, month).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodRange {
    pub start: Period,
    pub end: Period,
}

impl PeriodRange {
    /// "year greater, or year equal and month in range" on both bounds.
    pub fn contains(&self, p: Period) -> bool {
        let after_start = p.year > self.start.year
            || (p.year == self.start.year && p.month >= self.start.month);
        let before_end =
            p.year < self.end.year || (p.year == self.end.year && p.month <= self.end.month);
        after_start && before_end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "granularity", rename_all = "snake_case")]
pub enum PeriodFilter {
    Monthly(PeriodRange),
    Annual { start_year: i32, end_year: i32 },
}

impl PeriodFilter {
    pub fn matches(&self, attrs: &Attributes) -> bool {
        match self {
            PeriodFilter::Monthly(range) => {
                Period::from_attributes(attrs).is_some_and(|p| range.contains(p))
            }
            PeriodFilter::Annual {
                start_year,
                end_year,
            } => attrs
                .get("year")
                .and_then(as_i64)
                .is_some_and(|y| y >= i64::from(*start_year) && y <= i64::from(*end_year)),
        }
    }
}

/// Search for snapshot entities of one table inside a period.
///
/// `table_guid` pins the search to snapshots whose `table_snapshot` points at
/// that table; the name prefix alone also matches longer acronyms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogQuery {
    pub type_name: String,
    pub name_prefix: String,
    #[serde(default)]
    pub table_guid: Option<String>,
    pub filter: PeriodFilter,
}

impl CatalogQuery {
    /// Render the equivalent catalog DSL query.
    pub fn to_dsl(&self) -> String {
        let period = match self.filter {
            PeriodFilter::Monthly(PeriodRange { start, end }) => format!(
                "((year > {sy}) or (year = {sy} and month >= {sm})) and ((year < {ey}) or (year = {ey} and month <= {em}))",
                sy = start.year,
                sm = start.month,
                ey = end.year,
                em = end.month
            ),
            PeriodFilter::Annual {
                start_year,
                end_year,
            } => format!("(year >= {} and year <= {})", start_year, end_year),
        };
        let table = match &self.table_guid {
            Some(guid) => format!(" and {}.__guid = \"{}\"", relations::TABLE_SNAPSHOTS.1, guid),
            None => String::new(),
        };
        format!(
            "{} where name like \"{}*\"{} and {}",
            self.type_name, self.name_prefix, table, period
        )
    }

    pub fn matches(&self, type_name: &str, attrs: &Attributes) -> bool {
        let name_ok = attrs
            .get("name")
            .and_then(Value::as_str)
            .is_some_and(|n| n.starts_with(&self.name_prefix));
        let table_ok = self.table_guid.as_deref().is_none_or(|guid| {
            attrs
                .get(relations::TABLE_SNAPSHOTS.1)
                .is_some_and(|v| referenced_guids(v).contains(&guid))
        });
        type_name == self.type_name && name_ok && table_ok && self.filter.matches(attrs)
    }
}

fn as_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn attrs(v: Value) -> Attributes {
        match v {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let range = PeriodRange {
            start: Period::new(2021, 11),
            end: Period::new(2023, 2),
        };
        assert!(range.contains(Period::new(2021, 11)));
        assert!(range.contains(Period::new(2022, 1)));
        assert!(range.contains(Period::new(2023, 2)));
        assert!(!range.contains(Period::new(2021, 10)));
        assert!(!range.contains(Period::new(2023, 3)));
    }

    #[test]
    fn month_may_be_a_string() {
        let p = Period::from_attributes(&attrs(json!({"year": 1999, "month": "07"})));
        assert_eq!(p, Some(Period::new(1999, 7)));
        assert_eq!(Period::from_attributes(&attrs(json!({"year": 1999}))), None);
    }

    #[test]
    fn query_matches_type_prefix_and_period() {
        let q = CatalogQuery {
            type_name: "dt_annual_table".into(),
            name_prefix: "AC".into(),
            table_guid: None,
            filter: PeriodFilter::Annual {
                start_year: 2020,
                end_year: 2021,
            },
        };
        assert!(q.matches("dt_annual_table", &attrs(json!({"name": "AC2020", "year": 2020}))));
        assert!(!q.matches("dt_annual_table", &attrs(json!({"name": "BA2020", "year": 2020}))));
        assert!(!q.matches("dt_annual_table", &attrs(json!({"name": "AC2019", "year": 2019}))));
        assert!(!q.matches("dt_monthly_table", &attrs(json!({"name": "AC2020", "year": 2020}))));
    }

    #[test]
    fn dsl_rendering() {
        let q = CatalogQuery {
            type_name: "dt_monthly_table".into(),
            name_prefix: "AC".into(),
            table_guid: None,
            filter: PeriodFilter::Monthly(PeriodRange {
                start: Period::new(2020, 1),
                end: Period::new(2020, 6),
            }),
        };
        assert_eq!(
            q.to_dsl(),
            "dt_monthly_table where name like \"AC*\" and ((year > 2020) or (year = 2020 and month >= 1)) and ((year < 2020) or (year = 2020 and month <= 6))"
        );
    }

    #[test]
    fn table_guid_narrows_prefix_matches() {
        let q = CatalogQuery {
            type_name: "dt_annual_table".into(),
            name_prefix: "AC".into(),
            table_guid: Some("t-ac".into()),
            filter: PeriodFilter::Annual {
                start_year: 2021,
                end_year: 2021,
            },
        };
        let own = attrs(json!({"name": "AC2021", "year": 2021, "table_snapshot": {"guid": "t-ac"}}));
        let other = attrs(json!({"name": "ACR2021", "year": 2021, "table_snapshot": {"guid": "t-acr"}}));
        let unlinked = attrs(json!({"name": "AC2021", "year": 2021}));
        assert!(q.matches("dt_annual_table", &own));
        assert!(!q.matches("dt_annual_table", &other));
        assert!(!q.matches("dt_annual_table", &unlinked));
        assert_eq!(
            q.to_dsl(),
            "dt_annual_table where name like \"AC*\" and table_snapshot.__guid = \"t-ac\" and (year >= 2021 and year <= 2021)"
        );
    }
}
