use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::status::{AWAITING_VERIFICATION, CLOSED, PENDING_FIX};
use crate::table::{Column, Record, Table};

/// New and fixed defects per calendar day.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DailyStats {
    pub daily_new: BTreeMap<NaiveDate, usize>,
    pub daily_fixed: BTreeMap<NaiveDate, usize>,
}

/// Count of titled rows per canonical status.
pub fn status_count(table: &Table, rows: &[&Record]) -> Option<BTreeMap<String, usize>> {
    if !table.has_columns(&[Column::Status, Column::Title]) {
        return None;
    }

    let mut counts = BTreeMap::new();
    for record in titled(rows) {
        if let Some(status) = record.display_status() {
            *counts.entry(status.to_string()).or_insert(0) += 1;
        }
    }
    Some(counts)
}

/// Backlog age histogram: days since creation for every row still waiting
/// for a fix, measured in calendar days against `today`.
pub fn stay_duration(table: &Table, rows: &[&Record], today: NaiveDate) -> BTreeMap<i64, usize> {
    let mut ages = BTreeMap::new();
    if !table.has_columns(&[Column::Status, Column::CreatedAt, Column::Title]) {
        return ages;
    }

    let pending = titled(rows).filter(|r| r.status_mapped() == Some(PENDING_FIX));
    for record in pending {
        if let Some(created) = record.created_at {
            let age = (today - created.date()).num_days();
            *ages.entry(age).or_insert(0) += 1;
        }
    }
    ages
}

/// Per-day new defects (by creation date) and fixed defects.
///
/// A defect counts as fixed on the day it moved to verification (its update
/// time, while still awaiting verification) or on the day it was completed
/// (its completion time, once closed). Both sources are summed per day.
pub fn daily_stats(table: &Table, rows: &[&Record]) -> DailyStats {
    let mut stats = DailyStats::default();

    if table.has_columns(&[Column::CreatedAt, Column::Title]) {
        count_dates(&mut stats.daily_new, titled(rows).map(|r| r.created_at));
    }

    if table.has_columns(&[Column::Status, Column::Title]) {
        if table.has_column(Column::UpdatedAt) {
            let verifying = titled(rows).filter(|r| r.status_raw() == Some(AWAITING_VERIFICATION));
            count_dates(&mut stats.daily_fixed, verifying.map(|r| r.updated_at));
        }
        if table.has_column(Column::CompletedAt) {
            let closed = titled(rows).filter(|r| r.status_raw() == Some(CLOSED));
            count_dates(&mut stats.daily_fixed, closed.map(|r| r.completed_at));
        }
    }

    stats
}

fn count_dates(
    counts: &mut BTreeMap<NaiveDate, usize>,
    timestamps: impl Iterator<Item = Option<NaiveDateTime>>,
) {
    for ts in timestamps.flatten() {
        *counts.entry(ts.date()).or_insert(0) += 1;
    }
}

fn titled<'a, 't>(rows: &'a [&'t Record]) -> impl Iterator<Item = &'t Record> + 'a {
    rows.iter().copied().filter(|r| r.title.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn all_columns(records: Vec<Record>) -> Table {
        Table::new(Column::ALL, records)
    }

    #[test]
    fn backlog_age_uses_calendar_days() {
        let table = all_columns(vec![
            Record::new("a").with_status("新建").with_created("2024-06-05 23:59:00"),
            Record::new("b").with_status("修复中").with_created("2024-06-10 08:00:00"),
            Record::new("c").with_status("已关闭").with_created("2024-06-01"),
            Record::new("d").with_status("待修复").with_created("not a date"),
        ]);
        let rows: Vec<&Record> = table.records().iter().collect();
        let ages = stay_duration(&table, &rows, ymd(2024, 6, 10));

        assert_eq!(ages, BTreeMap::from([(0, 1), (5, 1)]));
    }

    #[test]
    fn fixed_series_sums_both_sources() {
        let table = all_columns(vec![
            Record::new("verify")
                .with_status("待验证")
                .with_updated("2024-03-01 09:00:00")
                .with_completed("2024-02-01"),
            Record::new("closed")
                .with_status("已关闭")
                .with_updated("2024-01-15")
                .with_completed("2024-03-01 10:00:00"),
            Record::new("closed, bad time")
                .with_status("已关闭")
                .with_completed("??"),
        ]);
        let rows: Vec<&Record> = table.records().iter().collect();
        let daily = daily_stats(&table, &rows);

        assert_eq!(daily.daily_fixed, BTreeMap::from([(ymd(2024, 3, 1), 2)]));
    }

    #[test]
    fn untitled_rows_are_not_counted() {
        let mut untitled = Record::new("x").with_status("新建");
        untitled.title = None;
        let table = all_columns(vec![untitled, Record::new("y").with_status("新建")]);
        let rows: Vec<&Record> = table.records().iter().collect();

        assert_eq!(
            status_count(&table, &rows),
            Some(BTreeMap::from([("待修复".to_string(), 1)]))
        );
    }

    #[test]
    fn missing_status_column_skips_status_groups() {
        let table = Table::new(
            [Column::Title, Column::CreatedAt],
            vec![Record::new("a").with_created("2024-01-02")],
        );
        let rows: Vec<&Record> = table.records().iter().collect();

        assert_eq!(status_count(&table, &rows), None);
        assert!(stay_duration(&table, &rows, ymd(2024, 1, 3)).is_empty());
        let daily = daily_stats(&table, &rows);
        assert_eq!(daily.daily_new, BTreeMap::from([(ymd(2024, 1, 2), 1)]));
        assert!(daily.daily_fixed.is_empty());
    }
}
