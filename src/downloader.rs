use rust_xlsxwriter::Workbook;
use std::str::FromStr;

use crate::analysis::AnalysisStats;
use crate::error::ExportError;

/// Download formats for computed statistics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Xlsx,
}

impl ExportFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "xlsx" => Ok(ExportFormat::Xlsx),
            other => Err(ExportError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// One titled group of (key, count) pairs, in display order.
struct Section {
    name: &'static str,
    rows: Vec<(String, usize)>,
}

fn sections(stats: &AnalysisStats) -> Vec<Section> {
    let mut sections = Vec::new();

    if let Some(counts) = &stats.status_count {
        sections.push(Section {
            name: "status_count",
            rows: counts.iter().map(|(k, v)| (k.clone(), *v)).collect(),
        });
    }
    sections.push(Section {
        name: "stay_duration",
        rows: stats
            .stay_duration
            .iter()
            .map(|(days, v)| (days.to_string(), *v))
            .collect(),
    });
    sections.push(Section {
        name: "daily_new",
        rows: stats
            .daily_stats
            .daily_new
            .iter()
            .map(|(date, v)| (date.format("%Y-%m-%d").to_string(), *v))
            .collect(),
    });
    sections.push(Section {
        name: "daily_fixed",
        rows: stats
            .daily_stats
            .daily_fixed
            .iter()
            .map(|(date, v)| (date.format("%Y-%m-%d").to_string(), *v))
            .collect(),
    });
    if let Some(counts) = &stats.analysis_type_count {
        sections.push(Section {
            name: "analysis_type_count",
            rows: counts.iter().map(|(k, v)| (k.clone(), *v)).collect(),
        });
    }

    sections
}

/// Render statistics as CSV with a `section,key,count` header
///
/// # Examples
/// ```
/// use defect_dashboard::analysis::AnalysisStats;
/// use defect_dashboard::downloader::to_csv;
///
/// let csv = to_csv(&AnalysisStats::default());
/// assert!(csv.starts_with("section,key,count\n"));
/// ```
pub fn to_csv(stats: &AnalysisStats) -> String {
    let mut csv_content = String::from("section,key,count\n");

    for section in sections(stats) {
        for (key, count) in section.rows {
            csv_content.push_str(section.name);
            csv_content.push(',');
            csv_content.push_str(&escape_csv(&key));
            csv_content.push(',');
            csv_content.push_str(&count.to_string());
            csv_content.push('\n');
        }
    }

    csv_content
}

/// Render statistics as an XLSX workbook with one worksheet per section.
pub fn to_xlsx(stats: &AnalysisStats) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();

    for section in sections(stats) {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(section.name)?;
        worksheet.write_string(0, 0, "key")?;
        worksheet.write_string(0, 1, "count")?;

        for (i, (key, count)) in section.rows.iter().enumerate() {
            let row = (i + 1) as u32;
            worksheet.write_string(row, 0, key)?;
            worksheet.write_number(row, 1, *count as f64)?;
        }
    }

    Ok(workbook.save_to_buffer()?)
}

pub fn export(stats: &AnalysisStats, format: ExportFormat) -> Result<Vec<u8>, ExportError> {
    match format {
        ExportFormat::Csv => Ok(to_csv(stats).into_bytes()),
        ExportFormat::Xlsx => to_xlsx(stats),
    }
}

fn escape_csv(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn csv_lists_every_section_in_order() {
        let stats = AnalysisStats {
            status_count: Some(BTreeMap::from([("待修复".to_string(), 2)])),
            stay_duration: BTreeMap::from([(3, 1), (12, 1)]),
            analysis_type_count: Some(BTreeMap::from([("a,b".to_string(), 1)])),
            ..Default::default()
        };

        assert_eq!(
            to_csv(&stats),
            "section,key,count\n\
             status_count,待修复,2\n\
             stay_duration,3,1\n\
             stay_duration,12,1\n\
             analysis_type_count,\"a,b\",1\n"
        );
    }

    #[test]
    fn xlsx_export_produces_a_zip_container() {
        let bytes = to_xlsx(&AnalysisStats::default()).unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn parses_export_formats() {
        assert_eq!("XLSX".parse::<ExportFormat>().unwrap(), ExportFormat::Xlsx);
        assert!("pdf".parse::<ExportFormat>().is_err());
    }
}
