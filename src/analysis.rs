use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::aggregate::{self, DailyStats};
use crate::classifier::{self, ClassificationMode};
use crate::filter::RowFilter;
use crate::status::StatusMapping;
use crate::table::Table;

/// One analysis request
///
/// `selected_modules` may contain [`crate::table::EMPTY_SENTINEL`];
/// `selected_statuses` holds canonical bucket names. `keywords` is ordered
/// and only consulted in keyword mode.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub selected_modules: Vec<String>,
    #[serde(default)]
    pub selected_statuses: Vec<String>,
    #[serde(default)]
    pub classification_mode: ClassificationMode,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl AnalysisConfig {
    /// Fills empty selections with the table's full module/status lists, so
    /// that "nothing selected" means "everything".
    pub fn resolve_defaults(mut self, modules: &[String], statuses: &[String]) -> Self {
        if self.selected_modules.is_empty() {
            self.selected_modules = modules.to_vec();
        }
        if self.selected_statuses.is_empty() {
            self.selected_statuses = statuses.to_vec();
        }
        self
    }

    pub fn row_filter(&self) -> RowFilter {
        RowFilter::new(
            &self.selected_modules,
            &self.selected_statuses,
            StatusMapping::standard(),
        )
    }
}

/// The four statistic groups, serialized as the dashboard's chart payload.
///
/// `status_count` and `analysis_type_count` are left out entirely when the
/// sheet lacks the columns they are computed from.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AnalysisStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_count: Option<BTreeMap<String, usize>>,
    pub stay_duration: BTreeMap<i64, usize>,
    pub daily_stats: DailyStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_type_count: Option<BTreeMap<String, usize>>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Analysis {
    pub filtered_records: usize,
    pub stats: AnalysisStats,
}

/// Runs an analysis against today's local date.
///
/// Backlog ages depend on the run date, so results for the same sheet drift
/// from one day to the next; use [`analyze_on`] when a fixed date is needed.
pub fn analyze(table: &Table, config: &AnalysisConfig) -> Analysis {
    analyze_on(table, config, Local::now().date_naive())
}

pub fn analyze_on(table: &Table, config: &AnalysisConfig, today: NaiveDate) -> Analysis {
    let rows = config.row_filter().apply(table);

    let stats = AnalysisStats {
        status_count: aggregate::status_count(table, &rows),
        stay_duration: aggregate::stay_duration(table, &rows, today),
        daily_stats: aggregate::daily_stats(table, &rows),
        analysis_type_count: classifier::classify(
            table,
            &rows,
            config.classification_mode,
            &config.keywords,
        ),
    };

    Analysis {
        filtered_records: rows.len(),
        stats,
    }
}
