use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::status::StatusMapping;

/// Reserved label for rows without a module, and for rows without a category
/// label in manual classification.
pub const EMPTY_SENTINEL: &str = "(empty)";

/// Semantic columns a defect sheet may carry
///
/// Which of these are present is decided when the sheet is loaded; a missing
/// column disables the statistics that depend on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Id,
    Title,
    Module,
    Status,
    CreatedAt,
    UpdatedAt,
    CompletedAt,
    Category,
}

impl Column {
    /// Header names accepted for this column, in priority order.
    pub fn header_names(self) -> &'static [&'static str] {
        match self {
            Column::Id => &["事项ID", "ID"],
            Column::Title => &["标题"],
            Column::Module => &["缺陷模块"],
            Column::Status => &["状态"],
            Column::CreatedAt => &["创建时间"],
            Column::UpdatedAt => &["更新时间"],
            Column::CompletedAt => &["完成时间"],
            Column::Category => &["缺陷分析类型", "分析类型", "缺陷分类"],
        }
    }

    pub const ALL: [Column; 8] = [
        Column::Id,
        Column::Title,
        Column::Module,
        Column::Status,
        Column::CreatedAt,
        Column::UpdatedAt,
        Column::CompletedAt,
        Column::Category,
    ];
}

/// One defect row
///
/// `status_mapped` is derived from `status_raw` once, when the status is set,
/// and neither is touched afterwards.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    pub id: Option<String>,
    pub title: Option<String>,
    pub module: Option<String>,
    status_raw: Option<String>,
    status_mapped: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
    pub category_label: Option<String>,
}

impl Record {
    pub fn new(title: &str) -> Self {
        Record {
            title: Some(title.to_string()),
            ..Default::default()
        }
    }

    pub fn status_raw(&self) -> Option<&str> {
        self.status_raw.as_deref()
    }

    pub fn status_mapped(&self) -> Option<&str> {
        self.status_mapped.as_deref()
    }

    /// Sets both status fields using the standard mapping.
    pub fn with_status(self, raw: &str) -> Self {
        self.with_status_mapping(Some(raw), StatusMapping::standard())
    }

    pub fn with_status_mapping(mut self, raw: Option<&str>, mapping: &StatusMapping) -> Self {
        self.status_raw = raw.map(str::to_string);
        self.status_mapped = mapping.normalize(raw);
        self
    }

    pub fn with_module(mut self, module: &str) -> Self {
        self.module = Some(module.to_string());
        self
    }

    pub fn with_category(mut self, label: &str) -> Self {
        self.category_label = Some(label.to_string());
        self
    }

    pub fn with_created(mut self, raw: &str) -> Self {
        self.created_at = parse_timestamp(raw);
        self
    }

    pub fn with_updated(mut self, raw: &str) -> Self {
        self.updated_at = parse_timestamp(raw);
        self
    }

    pub fn with_completed(mut self, raw: &str) -> Self {
        self.completed_at = parse_timestamp(raw);
        self
    }

    /// Label used for bucketed displays: mapped status, falling back to raw.
    pub fn display_status(&self) -> Option<&str> {
        self.status_mapped().or(self.status_raw())
    }
}

/// An immutable table of defect rows plus the set of columns it was loaded with.
#[derive(Clone, Debug, Default)]
pub struct Table {
    columns: BTreeSet<Column>,
    records: Vec<Record>,
}

impl Table {
    pub fn new(columns: impl IntoIterator<Item = Column>, records: Vec<Record>) -> Self {
        Table {
            columns: columns.into_iter().collect(),
            records,
        }
    }

    pub fn has_column(&self, column: Column) -> bool {
        self.columns.contains(&column)
    }

    pub fn has_columns(&self, columns: &[Column]) -> bool {
        columns.iter().all(|c| self.has_column(*c))
    }

    pub fn columns(&self) -> impl Iterator<Item = Column> + '_ {
        self.columns.iter().copied()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sorted distinct modules, with [`EMPTY_SENTINEL`] first when any row has
    /// no module. Empty when the sheet has no module column.
    pub fn modules(&self) -> Vec<String> {
        if !self.has_column(Column::Module) {
            return Vec::new();
        }

        let mut has_empty = false;
        let mut distinct = BTreeSet::new();
        for record in &self.records {
            match &record.module {
                Some(module) => {
                    distinct.insert(module.clone());
                }
                None => has_empty = true,
            }
        }

        let mut modules = Vec::with_capacity(distinct.len() + 1);
        if has_empty {
            modules.push(EMPTY_SENTINEL.to_string());
        }
        modules.extend(distinct);
        modules
    }

    /// Sorted distinct canonical statuses.
    pub fn statuses(&self) -> Vec<String> {
        if !self.has_column(Column::Status) {
            return Vec::new();
        }

        self.records
            .iter()
            .filter_map(|r| r.status_mapped())
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"];

/// Loosely parse a timestamp cell
///
/// Accepts RFC 3339, `YYYY-MM-DD` / `YYYY/MM/DD` dates with or without a time
/// of day. Anything else yields `None`; callers must drop such rows from
/// time-based statistics rather than substitute a default.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_common_timestamp_shapes() {
        let expected = date(2024, 3, 1).and_hms_opt(10, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-03-01 10:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T10:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024/03/01 10:00"), Some(expected));
        assert_eq!(parse_timestamp(" 2024-03-01 10:00:00.000 "), Some(expected));
        assert_eq!(
            parse_timestamp("2024-03-01"),
            date(2024, 3, 1).and_hms_opt(0, 0, 0)
        );
    }

    #[test]
    fn garbage_timestamps_become_none() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp("2024-13-45"), None);
    }

    #[test]
    fn status_fields_are_derived_once() {
        let record = Record::new("t").with_status("新建");
        assert_eq!(record.status_raw(), Some("新建"));
        assert_eq!(record.status_mapped(), Some("待修复"));
    }

    #[test]
    fn modules_put_empty_sentinel_first() {
        let table = Table::new(
            [Column::Title, Column::Module],
            vec![
                Record::new("a").with_module("订单模块"),
                Record::new("b"),
                Record::new("c").with_module("用户模块"),
                Record::new("d").with_module("订单模块"),
            ],
        );
        assert_eq!(table.modules(), vec![EMPTY_SENTINEL, "用户模块", "订单模块"]);
    }

    #[test]
    fn derived_lists_are_empty_without_columns() {
        let table = Table::new([Column::Title], vec![Record::new("a").with_status("新建")]);
        assert!(table.modules().is_empty());
        assert!(table.statuses().is_empty());
    }
}
