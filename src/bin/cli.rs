use defect_dashboard::analysis::{AnalysisConfig, analyze_on};
use defect_dashboard::classifier::ClassificationMode;
use defect_dashboard::downloader;
use defect_dashboard::loader;
use chrono::{Local, NaiveDate};
use log::info;
use std::env;

const USAGE: &str = "Usage: defect-cli <file.xlsx|file.csv> [--mode manual|keyword] \
[--keywords a,b] [--modules a,b] [--statuses a,b] [--today YYYY-MM-DD] [--csv]";

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || args[1] == "--help" {
        eprintln!("{}", USAGE);
        return Ok(());
    }

    let mut config = AnalysisConfig::default();
    let mut today = Local::now().date_naive();
    let mut as_csv = false;

    let mut rest = args[2..].iter();
    while let Some(flag) = rest.next() {
        if flag == "--csv" {
            as_csv = true;
            continue;
        }
        let value = rest
            .next()
            .ok_or_else(|| format!("missing value for {}\n{}", flag, USAGE))?;
        match flag.as_str() {
            "--mode" => config.classification_mode = value.parse::<ClassificationMode>()?,
            "--keywords" => config.keywords = split_list(value),
            "--modules" => config.selected_modules = split_list(value),
            "--statuses" => config.selected_statuses = split_list(value),
            "--today" => today = NaiveDate::parse_from_str(value, "%Y-%m-%d")?,
            other => return Err(format!("unknown option {}\n{}", other, USAGE).into()),
        }
    }

    let table = loader::load_table(&args[1])?;
    info!("loaded {} records from {}", table.len(), args[1]);

    let config = config.resolve_defaults(&table.modules(), &table.statuses());
    let result = analyze_on(&table, &config, today);

    if as_csv {
        print!("{}", downloader::to_csv(&result.stats));
    } else {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }

    Ok(())
}
