/*!
# Defect Dashboard

A small web tool that turns a defect-tracker spreadsheet export into the
numbers behind a status dashboard.

## Overview

A sheet (`.xlsx` or `.csv`, one defect per row) is uploaded once and kept in
memory under a session token. Every analysis request then recomputes, from
scratch, four statistic groups over the rows selected by module and status:

- **status_count** - defects per canonical status bucket
- **stay_duration** - backlog age histogram (days open) for defects still
  waiting for a fix
- **daily_stats** - defects created and fixed per calendar day
- **analysis_type_count** - category breakdown, either from the sheet's own
  category column or by matching titles against a keyword list

## Pipeline

1. **Status normalization** (`status`) - raw lifecycle labels such as `新建`
   and `修复中` collapse into the `待修复` bucket. The raw label is kept next
   to the bucket because "fixed" detection needs the real state.
2. **Row filtering** (`filter`) - module and status selections, with the
   `(empty)` sentinel standing for "no module".
3. **Aggregation** (`aggregate`) - the first three statistic groups.
4. **Classification** (`classifier`) - the category breakdown.

Missing columns never fail an analysis; they only leave the statistics that
need them empty or absent.

## Modules

- **table**: Record and Table types, column detection, timestamp parsing
- **status**: Status mapping
- **filter**: Module/status row filter
- **aggregate**: Status, backlog age and daily statistics
- **classifier**: Manual and keyword classification
- **analysis**: Analysis request and the end-to-end `analyze` entry point
- **loader**: XLSX/CSV import
- **session**: In-memory store of uploaded sheets
- **keywords**: Persistent keyword list
- **downloader**: CSV/XLSX export of computed statistics
- **config**: Server settings and port selection
- **app**: Routing and handlers (`web` feature)

## REST API Endpoints

- `POST /upload` - Upload a sheet, returns the session token and filter lists
- `POST /analyze` - Compute statistics for a session
- `POST /export?format=csv|xlsx` - Same as analyze, as a download
- `GET /keywords`, `POST /keywords`, `DELETE /keywords?keyword=` - Keyword list
*/

pub mod aggregate;
pub mod analysis;
pub mod classifier;
pub mod config;
pub mod downloader;
pub mod error;
pub mod filter;
pub mod keywords;
pub mod loader;
pub mod session;
pub mod status;
pub mod table;

#[cfg(feature = "web")]
pub mod app;

pub use analysis::{Analysis, AnalysisConfig, AnalysisStats, analyze, analyze_on};
pub use classifier::ClassificationMode;
pub use table::{Column, EMPTY_SENTINEL, Record, Table};
