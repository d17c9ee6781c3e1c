use std::collections::HashSet;

use crate::status::StatusMapping;
use crate::table::{Column, EMPTY_SENTINEL, Record, Table};

/// Module and status membership predicates over a [`Table`]
///
/// Both selections are taken literally: an empty selection keeps nothing.
/// Callers that mean "everything" resolve that to the full derived lists
/// first (see `AnalysisConfig::resolve_defaults`).
#[derive(Debug, Clone)]
pub struct RowFilter {
    modules: HashSet<String>,
    include_empty_module: bool,
    raw_statuses: HashSet<String>,
}

impl RowFilter {
    pub fn new(modules: &[String], statuses: &[String], mapping: &StatusMapping) -> Self {
        let include_empty_module = modules.iter().any(|m| m == EMPTY_SENTINEL);
        let modules = modules
            .iter()
            .filter(|m| m.as_str() != EMPTY_SENTINEL)
            .cloned()
            .collect();

        let raw_statuses = statuses
            .iter()
            .flat_map(|status| mapping.raw_statuses_for(status))
            .collect();

        RowFilter {
            modules,
            include_empty_module,
            raw_statuses,
        }
    }

    fn module_matches(&self, record: &Record) -> bool {
        match &record.module {
            Some(module) => self.modules.contains(module),
            None => self.include_empty_module,
        }
    }

    fn status_matches(&self, record: &Record) -> bool {
        record
            .status_raw()
            .is_some_and(|raw| self.raw_statuses.contains(raw))
    }

    /// Rows passing the module predicate. No-op without a module column.
    pub fn by_module<'t>(&self, table: &Table, rows: Vec<&'t Record>) -> Vec<&'t Record> {
        if !table.has_column(Column::Module) {
            return rows;
        }
        rows.into_iter().filter(|r| self.module_matches(r)).collect()
    }

    /// Rows passing the status predicate. No-op without a status column.
    pub fn by_status<'t>(&self, table: &Table, rows: Vec<&'t Record>) -> Vec<&'t Record> {
        if !table.has_column(Column::Status) {
            return rows;
        }
        rows.into_iter().filter(|r| self.status_matches(r)).collect()
    }

    /// Both predicates, AND-ed. The table itself is left untouched.
    pub fn apply<'t>(&self, table: &'t Table) -> Vec<&'t Record> {
        let rows = table.records().iter().collect();
        let rows = self.by_module(table, rows);
        self.by_status(table, rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn module_table() -> Table {
        Table::new(
            [Column::Title, Column::Module],
            vec![
                Record::new("no module"),
                Record::new("user").with_module("用户模块"),
                Record::new("order").with_module("订单模块"),
            ],
        )
    }

    fn titles(rows: &[&Record]) -> Vec<String> {
        rows.iter().filter_map(|r| r.title.clone()).collect()
    }

    #[test]
    fn sentinel_keeps_rows_without_module() {
        let table = module_table();
        let filter = RowFilter::new(
            &strings(&["(empty)", "用户模块"]),
            &[],
            StatusMapping::standard(),
        );
        let rows = filter.by_module(&table, table.records().iter().collect());
        assert_eq!(titles(&rows), vec!["no module", "user"]);
    }

    #[test]
    fn sentinel_alone_selects_only_null_modules() {
        let table = module_table();
        let filter = RowFilter::new(&strings(&["(empty)"]), &[], StatusMapping::standard());
        let rows = filter.by_module(&table, table.records().iter().collect());
        assert_eq!(titles(&rows), vec!["no module"]);
    }

    #[test]
    fn plain_membership_drops_null_modules() {
        let table = module_table();
        let filter = RowFilter::new(&strings(&["订单模块"]), &[], StatusMapping::standard());
        let rows = filter.by_module(&table, table.records().iter().collect());
        assert_eq!(titles(&rows), vec!["order"]);
    }

    #[test]
    fn canonical_status_selects_every_raw_alias() {
        let table = Table::new(
            [Column::Title, Column::Status],
            vec![
                Record::new("a").with_status("新建"),
                Record::new("b").with_status("修复中"),
                Record::new("c").with_status("已关闭"),
                Record::new("d").with_status("待验证"),
            ],
        );
        let filter = RowFilter::new(
            &[],
            &strings(&["待修复", "已关闭"]),
            StatusMapping::standard(),
        );
        let rows = filter.by_status(&table, table.records().iter().collect());
        assert_eq!(titles(&rows), vec!["a", "b", "c"]);
    }

    #[test]
    fn missing_columns_disable_predicates() {
        let table = Table::new([Column::Title], vec![Record::new("a").with_module("x")]);
        let filter = RowFilter::new(&[], &[], StatusMapping::standard());
        assert_eq!(filter.apply(&table).len(), 1);
    }
}
