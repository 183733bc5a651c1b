use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Fields of a WFDB header's record line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeaderSummary {
    pub record: String,
    pub n_signals: usize,
    /// Sampling frequency in Hz, when given.
    pub fs: Option<f64>,
    pub n_samples: Option<u64>,
}

impl HeaderSummary {
    pub fn duration_secs(&self) -> Option<f64> {
        match (self.fs, self.n_samples) {
            (Some(fs), Some(n)) if fs > 0.0 => Some(n as f64 / fs),
            _ => None,
        }
    }
}

/// Parse the record line of a `.hea` file:
/// `name[/segments] n_signals [fs[/counter][(base)] [n_samples ...]]`.
/// Comment lines (`#`) and blank lines before it are skipped.
pub fn parse_header(text: &str) -> Result<HeaderSummary> {
    let line = text
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with('#'))
        .context("header has no record line")?;
    let mut fields = line.split_whitespace();
    let record = fields
        .next()
        .map(|name| name.split('/').next().unwrap_or(name).to_string())
        .context("record line is empty")?;
    let n_signals: usize = fields
        .next()
        .context("record line lacks a signal count")?
        .parse()
        .with_context(|| format!("invalid signal count in '{}'", line))?;
    let fs = match fields.next() {
        Some(token) => {
            let value = token
                .split(|c| c == '/' || c == '(')
                .next()
                .unwrap_or(token);
            Some(
                value
                    .parse::<f64>()
                    .with_context(|| format!("invalid sampling frequency '{}'", token))?,
            )
        }
        None => None,
    };
    let n_samples = match fields.next() {
        Some(token) => Some(
            token
                .parse::<u64>()
                .with_context(|| format!("invalid sample count '{}'", token))?,
        ),
        None => None,
    };
    Ok(HeaderSummary {
        record,
        n_signals,
        fs,
        n_samples,
    })
}

pub fn read_header(path: &Path) -> Result<HeaderSummary> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_header(&text).with_context(|| format!("parsing header {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mitdb_record_line() {
        let text = "100 2 360 650000\n100.dat 212 200 11 1024 995 -22131 0 MLII\n";
        let summary = parse_header(text).unwrap();
        assert_eq!(
            summary,
            HeaderSummary {
                record: "100".into(),
                n_signals: 2,
                fs: Some(360.0),
                n_samples: Some(650000),
            }
        );
        let secs = summary.duration_secs().unwrap();
        assert!((secs - 1805.555).abs() < 1e-2);
    }

    #[test]
    fn handles_counter_frequency_and_segments() {
        let text = "# generated\n\nmulti/3 12 250/1000(0) 5000\n";
        let summary = parse_header(text).unwrap();
        assert_eq!(summary.record, "multi");
        assert_eq!(summary.n_signals, 12);
        assert_eq!(summary.fs, Some(250.0));
        assert_eq!(summary.n_samples, Some(5000));
    }

    #[test]
    fn optional_fields_may_be_absent() {
        let summary = parse_header("rec 1").unwrap();
        assert_eq!(summary.fs, None);
        assert_eq!(summary.duration_secs(), None);
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(parse_header("").is_err());
        assert!(parse_header("rec two").is_err());
        assert!(parse_header("rec 2 fast").is_err());
    }
}
