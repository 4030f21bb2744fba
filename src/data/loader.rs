use crate::data::bar::Bar;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::path::Path;

//accepted naive layouts, tried in order after rfc3339 and unix seconds
const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y.%m.%d %H:%M:%S",
    "%Y.%m.%d %H:%M",
];

#[derive(Debug, Deserialize)]
struct CsvRecord {
    #[serde(alias = "time")]
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
}

//parses a feed timestamp
//naive values are taken as-is on the feed clock
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }

    if let Ok(secs) = raw.parse::<i64>() {
        return DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| anyhow!("Unix timestamp out of range: {}", secs));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| anyhow!("Unrecognised timestamp '{}'", raw))
}

//loads bars from a csv file
pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Bar>> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .context(format!("Failed to open CSV file: {:?}", path))?;

    let mut bars = Vec::new();

    for (index, result) in reader.deserialize().enumerate() {
        let record: CsvRecord =
            result.context(format!("Failed to parse CSV record at line {}", index + 2))?;

        let timestamp = parse_timestamp(&record.timestamp).context(format!(
            "Failed to parse timestamp '{}' at line {}",
            record.timestamp,
            index + 2
        ))?;

        let bar = Bar::new(timestamp, record.open, record.high, record.low, record.close)
            .context(format!("Invalid bar at line {}", index + 2))?;

        bars.push(bar);
    }

    //sort by timestamp to ensure chronological order
    bars.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

    Ok(bars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Write;

    #[test]
    fn parses_supported_timestamp_layouts() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 4, 10, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-03-04T10:30:00Z").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-03-04 10:30:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2024.03.04 10:30").unwrap(), expected);
        assert_eq!(
            parse_timestamp(&expected.timestamp().to_string()).unwrap(),
            expected
        );
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn loads_and_sorts_bars() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "time,open,high,low,close,tick_volume").unwrap();
        writeln!(file, "2024-03-04 10:30,1.1010,1.1020,1.1000,1.1015,120").unwrap();
        writeln!(file, "2024-03-04 10:00,1.1000,1.1012,1.0995,1.1010,98").unwrap();
        file.flush().unwrap();

        let bars = load_csv(file.path()).unwrap();
        assert_eq!(bars.len(), 2);
        assert!(bars[0].timestamp < bars[1].timestamp);
        assert_eq!(bars[0].low, 1.0995);
    }

    #[test]
    fn reports_invalid_bar_line() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "timestamp,open,high,low,close").unwrap();
        writeln!(file, "2024-03-04 10:00,1.1000,1.0990,1.1010,1.1000").unwrap();
        file.flush().unwrap();

        let err = load_csv(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("line 2"));
    }
}
