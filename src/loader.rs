use calamine::{Data, DataType, Reader, Xlsx};
use encoding_rs::GB18030;
use log::debug;
use std::borrow::Cow;
use std::io::Cursor;
use std::path::Path;

use crate::error::LoadError;
use crate::status::StatusMapping;
use crate::table::{Column, Record, Table, parse_timestamp};

/// Load a defect table from a CSV file
///
/// The first line is the header row; see [`build_table`] for how headers
/// are matched to columns.
///
/// # Examples
/// ```no_run
/// use defect_dashboard::loader::from_csv;
///
/// match from_csv("defects.csv") {
///     Ok(table) => println!("Loaded {} defects", table.len()),
///     Err(e) => eprintln!("Error loading CSV: {}", e),
/// }
/// ```
pub fn from_csv(filepath: impl AsRef<Path>) -> Result<Table, LoadError> {
    let bytes = std::fs::read(filepath)?;
    from_csv_bytes(&bytes)
}

/// Parse CSV content held in memory
///
/// UTF-8 (with or without BOM) is tried first; anything else is decoded as
/// GB18030, which covers the GBK files written by Chinese-locale Excel.
/// Quoted fields may span lines.
pub fn from_csv_bytes(bytes: &[u8]) -> Result<Table, LoadError> {
    let text = decode_csv_text(bytes)?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(non_empty).collect());
    }

    build_table(rows)
}

fn decode_csv_text(bytes: &[u8]) -> Result<Cow<'_, str>, LoadError> {
    if let Ok(text) = std::str::from_utf8(bytes) {
        // Excel writes a BOM in front of UTF-8 CSV exports
        return Ok(Cow::Borrowed(text.strip_prefix('\u{feff}').unwrap_or(text)));
    }

    let decoded = GB18030
        .decode_without_bom_handling_and_without_replacement(bytes)
        .ok_or(LoadError::UnknownEncoding)?;
    debug!("CSV decoded as GB18030");
    Ok(decoded)
}

/// Load a defect table from the first worksheet of an Excel file
///
/// # Examples
/// ```no_run
/// use defect_dashboard::loader::from_excel;
///
/// match from_excel("defects.xlsx") {
///     Ok(table) => println!("Loaded {} defects", table.len()),
///     Err(e) => eprintln!("Error loading Excel: {}", e),
/// }
/// ```
pub fn from_excel(filepath: impl AsRef<Path>) -> Result<Table, LoadError> {
    let bytes = std::fs::read(filepath)?;
    from_xlsx_bytes(&bytes)
}

pub fn from_xlsx_bytes(bytes: &[u8]) -> Result<Table, LoadError> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(LoadError::NoWorksheet)??;

    let rows = range
        .rows()
        .map(|row| row.iter().map(cell_text).collect())
        .collect();

    build_table(rows)
}

/// Detect file type from the file name and load the appropriate format.
pub fn load_table(filepath: impl AsRef<Path>) -> Result<Table, LoadError> {
    let path = filepath.as_ref();
    let bytes = std::fs::read(path)?;
    load_bytes(&path.to_string_lossy(), &bytes)
}

/// Same as [`load_table`] for an uploaded file already held in memory.
pub fn load_bytes(filename: &str, bytes: &[u8]) -> Result<Table, LoadError> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());

    match extension.as_deref() {
        Some("csv") => from_csv_bytes(bytes),
        Some("xlsx") => from_xlsx_bytes(bytes),
        Some(ext) => Err(LoadError::UnsupportedExtension(ext.to_string())),
        None => Err(LoadError::MissingExtension),
    }
}

/// Turn a header row plus data rows into a [`Table`]
///
/// Headers are trimmed and matched against [`Column::header_names`]; the
/// first accepted name present wins. Unknown headers are ignored, and rows
/// whose cells are all empty are dropped.
///
/// Cell values are trimmed and whitespace-only cells read as missing, except
/// for the title: any non-empty title, even one of spaces, keeps its row in
/// the statistics.
pub fn build_table(mut rows: Vec<Vec<Option<String>>>) -> Result<Table, LoadError> {
    if rows.is_empty() {
        return Err(LoadError::EmptySheet);
    }

    let headers: Vec<String> = rows
        .remove(0)
        .into_iter()
        .map(|h| h.unwrap_or_default().trim().to_string())
        .collect();

    let positions: Vec<(Column, usize)> = Column::ALL
        .iter()
        .filter_map(|&column| {
            column
                .header_names()
                .iter()
                .find_map(|name| headers.iter().position(|h| h == name))
                .map(|index| (column, index))
        })
        .collect();

    debug!("matched columns {:?} from headers {:?}", positions, headers);

    let mapping = StatusMapping::standard();
    let records = rows
        .iter()
        .filter(|row| row.iter().any(Option::is_some))
        .map(|row| {
            let cell = |column: Column| -> Option<&str> {
                positions
                    .iter()
                    .find(|(c, _)| *c == column)
                    .and_then(|(_, index)| row.get(*index))
                    .and_then(|value| value.as_deref())
            };
            let text = |column: Column| cell(column).and_then(non_blank);
            let timestamp = |column: Column| cell(column).and_then(parse_timestamp);

            let status = text(Column::Status);
            let mut record = Record::default().with_status_mapping(status.as_deref(), mapping);
            record.id = text(Column::Id);
            record.title = cell(Column::Title).map(str::to_string);
            record.module = text(Column::Module);
            record.created_at = timestamp(Column::CreatedAt);
            record.updated_at = timestamp(Column::UpdatedAt);
            record.completed_at = timestamp(Column::CompletedAt);
            record.category_label = text(Column::Category);
            record
        })
        .collect();

    Ok(Table::new(positions.into_iter().map(|(c, _)| c), records))
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

// Only a truly empty cell is missing; whitespace is kept as text.
fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => non_empty(s),
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => Some((*f as i64).to_string()),
        Data::Float(f) => Some(f.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(_) => cell
            .as_datetime()
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string()),
        _ => None,
    }
}
