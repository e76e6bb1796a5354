//! CSV loader for Facebook Ads performance data.
//!
//! Validation happens in two tiers: the critical columns (`spend`, `revenue`,
//! `roas`, `ctr`) are fatal when missing, everything else in
//! `data.required_columns` only warns. Cleaning mirrors what marketers export
//! from Ads Manager: currency symbols and thousands separators in numeric
//! fields, blank cells, and occasional zero-spend rows that would poison the
//! averages.

use crate::config::AnalystConfig;
use crate::types::AdRecord;
use chrono::NaiveDate;
use csv::StringRecord;
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Bundled example dataset used by `run --sample`.
pub const SAMPLE_DATASET: &str = include_str!("../../data/sample_fb_ads.csv");

/// Columns the pipeline cannot run without.
const CRITICAL_COLUMNS: [&str; 4] = ["spend", "revenue", "roas", "ctr"];

#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("data file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("critical columns missing from dataset: {}", .0.join(", "))]
    MissingCriticalColumns(Vec<String>),

    #[error("dataset contains no usable rows")]
    Empty,
}

/// Loads and validates the ads dataset.
pub struct DataLoader {
    required_columns: Vec<String>,
}

impl DataLoader {
    pub fn new(config: &AnalystConfig) -> Self {
        Self {
            required_columns: config.data.required_columns.clone(),
        }
    }

    /// Load and validate a CSV file from disk.
    pub fn load(&self, path: &Path) -> Result<Vec<AdRecord>, DataError> {
        if !path.exists() {
            return Err(DataError::NotFound(path.to_path_buf()));
        }
        info!(path = %path.display(), "Loading ads dataset");
        let file = std::fs::File::open(path).map_err(|e| {
            DataError::Csv(csv::Error::from(e))
        })?;
        self.load_from_reader(file)
    }

    /// Load the bundled sample dataset.
    pub fn load_sample(&self) -> Result<Vec<AdRecord>, DataError> {
        info!("Loading bundled sample dataset");
        self.load_from_reader(SAMPLE_DATASET.as_bytes())
    }

    /// Load and validate CSV data from any reader.
    pub fn load_from_reader<R: Read>(&self, reader: R) -> Result<Vec<AdRecord>, DataError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        let columns = self.validate_headers(&headers)?;

        let mut records = Vec::new();
        let mut dropped_zero_spend = 0usize;
        let mut bad_dates = 0usize;

        for row in rdr.records() {
            let row = row?;
            let record = parse_row(&row, &columns, &mut bad_dates);
            if record.spend <= 0.0 {
                dropped_zero_spend += 1;
                continue;
            }
            records.push(record);
        }

        if dropped_zero_spend > 0 {
            info!(count = dropped_zero_spend, "Dropped zero-spend rows");
        }
        if bad_dates > 0 {
            warn!(count = bad_dates, "Rows with unparseable dates");
        }
        if records.is_empty() {
            return Err(DataError::Empty);
        }

        info!(rows = records.len(), "Dataset loaded and validated");
        Ok(records)
    }

    /// Check the header row against critical and required columns.
    ///
    /// Returns the header -> index map used for field extraction.
    fn validate_headers(
        &self,
        headers: &StringRecord,
    ) -> Result<HashMap<String, usize>, DataError> {
        let columns: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim().to_lowercase(), i))
            .collect();

        let missing_critical: Vec<String> = CRITICAL_COLUMNS
            .iter()
            .filter(|c| !columns.contains_key(**c))
            .map(|c| (*c).to_string())
            .collect();
        if !missing_critical.is_empty() {
            return Err(DataError::MissingCriticalColumns(missing_critical));
        }

        let missing_optional: Vec<&String> = self
            .required_columns
            .iter()
            .filter(|c| !columns.contains_key(c.as_str()))
            .collect();
        if !missing_optional.is_empty() {
            warn!(
                columns = ?missing_optional,
                "Expected columns missing - related breakdowns will be skipped"
            );
        }

        Ok(columns)
    }
}

/// Parse one CSV row into a cleaned record.
fn parse_row(
    row: &StringRecord,
    columns: &HashMap<String, usize>,
    bad_dates: &mut usize,
) -> AdRecord {
    let field = |name: &str| -> Option<&str> {
        columns
            .get(name)
            .and_then(|&i| row.get(i))
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };

    let date = match field("date") {
        Some(s) => {
            let parsed = parse_date(s);
            if parsed.is_none() {
                *bad_dates += 1;
            }
            parsed
        }
        None => None,
    };

    let spend = parse_numeric(field("spend"));
    let revenue = parse_numeric(field("revenue"));
    let impressions = parse_numeric(field("impressions")) as u64;
    let clicks = parse_numeric(field("clicks")) as u64;
    let purchases = parse_numeric(field("purchases")) as u64;

    // Blank ctr/roas cells are derived from the raw counts.
    let ctr = match field("ctr") {
        Some(s) => parse_numeric(Some(s)),
        None if impressions > 0 => clicks as f64 / impressions as f64,
        None => 0.0,
    };
    let roas = match field("roas") {
        Some(s) => parse_numeric(Some(s)),
        None if spend > 0.0 => revenue / spend,
        None => 0.0,
    };

    AdRecord {
        date,
        campaign_name: field("campaign_name").unwrap_or("Unknown Campaign").to_string(),
        adset_name: field("adset_name").map(String::from),
        creative_type: field("creative_type").map(String::from),
        creative_message: field("creative_message").map(String::from),
        audience_type: field("audience_type").map(String::from),
        platform: field("platform").map(String::from),
        spend,
        impressions,
        clicks,
        purchases,
        revenue,
        ctr,
        roas,
    }
}

/// Lenient numeric parse: strips currency symbols, commas, and percent signs;
/// anything unparseable coerces to 0.
fn parse_numeric(value: Option<&str>) -> f64 {
    let Some(raw) = value else { return 0.0 };
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    cleaned.parse::<f64>().unwrap_or(0.0)
}

/// Accept ISO dates first, then the US export format.
fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%m/%d/%Y"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loader() -> DataLoader {
        DataLoader::new(&AnalystConfig::default())
    }

    const GOOD_CSV: &str = "\
date,campaign_name,spend,impressions,clicks,purchases,revenue,ctr,roas,creative_type,creative_message
2024-01-01,Campaign_A,500,50000,1000,50,2500,0.02,5.0,Video,Limited time offer
2024-01-02,Campaign_B,300,30000,300,15,900,0.01,3.0,Image,Shop the sale
";

    #[test]
    fn test_load_valid_csv() {
        let records = loader().load_from_reader(GOOD_CSV.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].campaign_name, "Campaign_A");
        assert_eq!(records[0].roas, 5.0);
        assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2024, 1, 1));
    }

    #[test]
    fn test_missing_critical_column_fails() {
        let csv = "date,campaign_name,spend,revenue,ctr\n2024-01-01,A,100,200,0.02\n";
        let err = loader().load_from_reader(csv.as_bytes()).unwrap_err();
        match err {
            DataError::MissingCriticalColumns(cols) => {
                assert_eq!(cols, vec!["roas".to_string()]);
            }
            other => panic!("expected MissingCriticalColumns, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_spend_rows_dropped() {
        let csv = "\
campaign_name,spend,revenue,ctr,roas
A,0,0,0.01,0
B,100,300,0.02,3.0
";
        let records = loader().load_from_reader(csv.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].campaign_name, "B");
    }

    #[test]
    fn test_all_rows_zero_spend_is_empty() {
        let csv = "campaign_name,spend,revenue,ctr,roas\nA,0,0,0.01,0\n";
        assert!(matches!(
            loader().load_from_reader(csv.as_bytes()),
            Err(DataError::Empty)
        ));
    }

    #[test]
    fn test_currency_symbols_cleaned() {
        let csv = "campaign_name,spend,revenue,ctr,roas\nA,\"$1,250.50\",\"$5,000\",0.02,4.0\n";
        let records = loader().load_from_reader(csv.as_bytes()).unwrap();
        assert_eq!(records[0].spend, 1250.50);
        assert_eq!(records[0].revenue, 5000.0);
    }

    #[test]
    fn test_blank_ctr_derived_from_counts() {
        let csv = "\
campaign_name,spend,impressions,clicks,revenue,ctr,roas
A,100,10000,250,400,,4.0
";
        let records = loader().load_from_reader(csv.as_bytes()).unwrap();
        assert!((records[0].ctr - 0.025).abs() < 1e-9);
    }

    #[test]
    fn test_sample_dataset_loads() {
        let records = loader().load_sample().unwrap();
        assert!(records.len() >= 30, "sample should be big enough for quantitative checks");
        assert!(records.iter().all(|r| r.spend > 0.0));
        assert!(records.iter().any(|r| r.date.is_some()));
    }
}
