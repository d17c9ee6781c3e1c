use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::AnalysisError;
use crate::table::{Column, EMPTY_SENTINEL, Record, Table};

/// Bucket for rows that no keyword matched.
pub const OTHER_BUCKET: &str = "(other)";

/// How the category breakdown is produced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassificationMode {
    /// Use the category column already present in the sheet.
    #[default]
    Manual,
    /// Match titles against an ordered keyword list.
    Keyword,
}

impl FromStr for ClassificationMode {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "manual" => Ok(ClassificationMode::Manual),
            "keyword" => Ok(ClassificationMode::Keyword),
            other => Err(AnalysisError::UnknownClassificationMode(other.to_string())),
        }
    }
}

impl fmt::Display for ClassificationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassificationMode::Manual => write!(f, "manual"),
            ClassificationMode::Keyword => write!(f, "keyword"),
        }
    }
}

/// Category counts for the filtered rows, or `None` when the mode's source
/// column is missing from the sheet.
pub fn classify(
    table: &Table,
    rows: &[&Record],
    mode: ClassificationMode,
    keywords: &[String],
) -> Option<BTreeMap<String, usize>> {
    match mode {
        ClassificationMode::Manual => {
            if !table.has_columns(&[Column::Category, Column::Title]) {
                return None;
            }
            Some(count_by(rows, |record| {
                record
                    .category_label
                    .clone()
                    .unwrap_or_else(|| EMPTY_SENTINEL.to_string())
            }))
        }
        ClassificationMode::Keyword => {
            if !table.has_column(Column::Title) {
                return None;
            }
            let buckets = keyword_buckets(rows, keywords);
            let mut counts = BTreeMap::new();
            for (record, bucket) in rows.iter().zip(buckets) {
                if record.title.is_some() {
                    *counts.entry(bucket.to_string()).or_insert(0) += 1;
                }
            }
            Some(counts)
        }
    }
}

/// Final keyword bucket of every row, in row order.
///
/// Keywords are applied one pass at a time in list order and each pass
/// overwrites the bucket of every row it matches. A row therefore ends up in
/// the *last* matching keyword, not the first. Dashboards built on this
/// output depend on that ordering, so it is kept as is.
pub fn keyword_buckets<'k>(rows: &[&Record], keywords: &'k [String]) -> Vec<&'k str> {
    let titles: Vec<Option<String>> = rows
        .iter()
        .map(|r| r.title.as_deref().map(str::to_lowercase))
        .collect();
    let mut buckets = vec![OTHER_BUCKET; rows.len()];

    for keyword in keywords {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            continue;
        }
        let needle = keyword.to_lowercase();
        for (bucket, title) in buckets.iter_mut().zip(&titles) {
            if title.as_ref().is_some_and(|t| t.contains(&needle)) {
                *bucket = keyword;
            }
        }
    }

    buckets
}

fn count_by<F>(rows: &[&Record], key: F) -> BTreeMap<String, usize>
where
    F: Fn(&Record) -> String,
{
    let mut counts = BTreeMap::new();
    for record in rows.iter().filter(|r| r.title.is_some()) {
        *counts.entry(key(record)).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keywords(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn later_keyword_overwrites_earlier_match() {
        let records: Vec<Record> = ["login data error", "data only", "login only", "unrelated"]
            .into_iter()
            .map(Record::new)
            .collect();
        let rows: Vec<&Record> = records.iter().collect();
        let kws = keywords(&["login", "data"]);

        assert_eq!(
            keyword_buckets(&rows, &kws),
            vec!["data", "data", "login", OTHER_BUCKET]
        );
    }

    #[test]
    fn keyword_match_ignores_case_and_padding() {
        let records = vec![Record::new("Login FAILED"), Record::new("a.b")];
        let rows: Vec<&Record> = records.iter().collect();
        let kws = keywords(&["  login ", "", "."]);

        // "." is a literal substring, not a pattern
        assert_eq!(keyword_buckets(&rows, &kws), vec!["login", "."]);
    }

    #[test]
    fn manual_mode_buckets_missing_labels_as_empty() {
        let table = Table::new(
            [Column::Title, Column::Category],
            vec![
                Record::new("a").with_category("A类"),
                Record::new("b"),
                Record::new("c").with_category("A类"),
            ],
        );
        let rows: Vec<&Record> = table.records().iter().collect();
        let counts = classify(&table, &rows, ClassificationMode::Manual, &[]).unwrap();

        assert_eq!(counts.get("A类"), Some(&2));
        assert_eq!(counts.get(EMPTY_SENTINEL), Some(&1));
    }

    #[test]
    fn manual_mode_without_category_column_is_skipped() {
        let table = Table::new([Column::Title], vec![Record::new("a")]);
        let rows: Vec<&Record> = table.records().iter().collect();
        assert!(classify(&table, &rows, ClassificationMode::Manual, &[]).is_none());
    }

    #[test]
    fn parses_modes_and_rejects_unknown() {
        assert_eq!("Keyword".parse::<ClassificationMode>().unwrap(), ClassificationMode::Keyword);
        assert_eq!("manual".parse::<ClassificationMode>().unwrap(), ClassificationMode::Manual);
        assert!("regex".parse::<ClassificationMode>().is_err());
    }
}
