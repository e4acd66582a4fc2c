use std::{fmt::Write, path::Path, sync::LazyLock};

use eyre::{Context, Result};
use itertools::Itertools;
use regex::Regex;
use tracing::{debug, info};

use crate::{REQUIRED_COLUMNS, ReportError};

/// Field values that count as missing, whatever the column
const NA_VALUES: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

static FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]*)"|([^\s"]+)"#).expect("field regex"));

/// One benchmark run
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub hardware: String,
    pub task: String,
    /// Seconds
    pub runtime: f64,
    pub auc: f64,
    /// Values of the columns the chart ignores, in [`ResultsTable::extra_columns`] order
    pub extra: Vec<String>,
}

impl Record {
    pub fn is_gpu(&self, marker: &str) -> bool {
        self.hardware.contains(marker)
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ResultsTable {
    pub extra_columns: Vec<String>,
    pub records: Vec<Record>,
    /// Lines skipped because they could not be split into the header's columns
    pub malformed: usize,
    /// Rows dropped because a field was missing or not numeric
    pub dropped: usize,
}

enum Line {
    Blank,
    Fields(Vec<String>),
    Malformed,
}

/// Splits a line on whitespace, honouring double quotes and `#` comments
fn split_line(line: &str) -> Line {
    let mut in_quotes = false;
    let mut end = line.len();
    for (idx, ch) in line.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '#' if !in_quotes => {
                end = idx;
                break;
            }
            _ => {}
        }
    }
    if in_quotes {
        return Line::Malformed;
    }

    let fields = FIELD
        .captures_iter(&line[..end])
        .filter_map(|cap| cap.get(1).or_else(|| cap.get(2)))
        .map(|m| m.as_str().to_owned())
        .collect::<Vec<_>>();
    if fields.is_empty() {
        Line::Blank
    } else {
        Line::Fields(fields)
    }
}

fn coerce_number(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|x| !x.is_nan())
}

impl ResultsTable {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Read results file {}", path.display()))?;
        let table = Self::parse(&raw).wrap_err_with(|| format!("Parse {}", path.display()))?;
        info!(
            "Loaded {} rows from {} ({} malformed, {} dropped)",
            table.records.len(),
            path.display(),
            table.malformed,
            table.dropped
        );
        Ok(table)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let mut lines = raw
            .lines()
            .enumerate()
            .map(|(idx, line)| (idx + 1, split_line(line)))
            .filter(|(_, line)| !matches!(line, Line::Blank));

        let header = loop {
            match lines.next() {
                Some((_, Line::Fields(fields))) => break fields,
                Some((n, _)) => debug!("Skipping malformed header candidate on line {n}"),
                None => return Err(ReportError::EmptyInput.into()),
            }
        };

        let position = |name: &str| {
            header
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| ReportError::MissingColumn(name.to_owned()))
        };
        let [hardware_idx, task_idx, runtime_idx, auc_idx] = [
            position(REQUIRED_COLUMNS[0])?,
            position(REQUIRED_COLUMNS[1])?,
            position(REQUIRED_COLUMNS[2])?,
            position(REQUIRED_COLUMNS[3])?,
        ];
        let required = [hardware_idx, task_idx, runtime_idx, auc_idx];
        let extra_idx = (0..header.len())
            .filter(|i| !required.contains(i))
            .collect::<Vec<_>>();

        let mut table = ResultsTable {
            extra_columns: extra_idx.iter().map(|&i| header[i].clone()).collect(),
            ..Default::default()
        };

        for (n, line) in lines {
            let fields = match line {
                Line::Fields(fields) if fields.len() <= header.len() => fields,
                _ => {
                    debug!("Skipping malformed line {n}");
                    table.malformed += 1;
                    continue;
                }
            };

            if fields.len() < header.len() || fields.iter().any(|f| NA_VALUES.contains(&f.as_str()))
            {
                debug!("Dropping line {n}: missing values");
                table.dropped += 1;
                continue;
            }

            let (Some(runtime), Some(auc)) =
                (coerce_number(&fields[runtime_idx]), coerce_number(&fields[auc_idx]))
            else {
                debug!("Dropping line {n}: runtime or AUC is not numeric");
                table.dropped += 1;
                continue;
            };

            table.records.push(Record {
                hardware: fields[hardware_idx].clone(),
                task: fields[task_idx].clone(),
                runtime,
                auc,
                extra: extra_idx.iter().map(|&i| fields[i].clone()).collect(),
            });
        }
        Ok(table)
    }

    /// Rows of one task category, in file order
    pub fn for_task(&self, task: &str) -> Vec<&Record> {
        self.records.iter().filter(|r| r.task == task).collect()
    }

    /// Text dump of a filtered view with its gpu classification
    pub fn format_view(&self, rows: &[&Record], marker: &str) -> String {
        let mut headers = vec!["hardware", "task", "runtime", "AUC"];
        headers.extend(self.extra_columns.iter().map(String::as_str));
        headers.push("gpu");

        let cells = rows
            .iter()
            .map(|r| {
                let mut row = vec![
                    r.hardware.clone(),
                    r.task.clone(),
                    r.runtime.to_string(),
                    r.auc.to_string(),
                ];
                row.extend(r.extra.iter().cloned());
                row.push(r.is_gpu(marker).to_string());
                row
            })
            .collect::<Vec<_>>();

        let widths = headers
            .iter()
            .enumerate()
            .map(|(i, h)| {
                cells
                    .iter()
                    .map(|row| row[i].chars().count())
                    .chain([h.chars().count()])
                    .max()
                    .unwrap_or_default()
            })
            .collect::<Vec<_>>();

        let mut out = String::new();
        _ = writeln!(out, "{}", pad(headers.iter().copied(), &widths));
        for row in &cells {
            _ = writeln!(out, "{}", pad(row.iter().map(String::as_str), &widths));
        }
        out
    }
}

fn pad<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    cells
        .zip(widths)
        .map(|(c, &w)| format!("{c:<w$}"))
        .join("  ")
        .trim_end()
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULTS: &str = r#"# hardware results for the GBM benchmark
hardware task runtime AUC notes
CPU-A GBM 500.2 0.91 baseline
GPU-A GBM 120.7 0.91 "dgx one"   # trailing comment
CPU-B GBM TBD 0.90 pending
GPU-B XGB 80.0 0.92 other
CPU-A GBM 510.0 0.91 rerun
broken line with too many fields here
GPU-C GBM 99.0 NA missing
CPU-C GBM 700.0
"#;

    #[test]
    fn parses_and_cleans() {
        let table = ResultsTable::parse(RESULTS).unwrap();
        assert_eq!(table.extra_columns, vec!["notes"]);
        assert_eq!(table.records.len(), 4);
        assert_eq!(table.malformed, 1);
        assert_eq!(table.dropped, 3);
        assert_eq!(table.records[1].extra, vec!["dgx one"]);
        assert!(table.records.iter().all(|r| r.runtime.is_finite() && r.auc.is_finite()));
    }

    #[test]
    fn unparsable_runtime_is_dropped() {
        let table = ResultsTable::parse(RESULTS).unwrap();
        assert!(table.records.iter().all(|r| r.hardware != "CPU-B"));
        assert!(table.records.iter().all(|r| r.hardware != "GPU-C"));
    }

    #[test]
    fn filter_keeps_file_order_and_duplicates() {
        let table = ResultsTable::parse(RESULTS).unwrap();
        let gbm = table.for_task("GBM");
        let names = gbm.iter().map(|r| r.hardware.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["CPU-A", "GPU-A", "CPU-A"]);
        assert_eq!(gbm[0].runtime, 500.2);
        assert_eq!(gbm[2].runtime, 510.0);
        assert!(table.for_task("gbm").is_empty());
    }

    #[test]
    fn other_tasks_are_excluded() {
        let table = ResultsTable::parse(RESULTS).unwrap();
        assert!(table.for_task("GBM").iter().all(|r| r.hardware != "GPU-B"));
        assert_eq!(table.for_task("XGB").len(), 1);
    }

    #[test]
    fn gpu_match_is_case_sensitive_substring() {
        let record = |hardware: &str| Record {
            hardware: hardware.to_owned(),
            task: "GBM".to_owned(),
            runtime: 1.0,
            auc: 1.0,
            extra: vec![],
        };
        assert!(record("GPU-A").is_gpu("GPU"));
        assert!(record("8xGPUs").is_gpu("GPU"));
        assert!(!record("gpu-a").is_gpu("GPU"));
        assert!(!record("Xeon").is_gpu("GPU"));
    }

    #[test]
    fn missing_column_is_an_error() {
        let err = ResultsTable::parse("hardware task runtime\nA GBM 1.0\n").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReportError>(),
            Some(ReportError::MissingColumn(c)) if c == "AUC"
        ));
    }

    #[test]
    fn empty_input_is_an_error() {
        let err = ResultsTable::parse("# only comments\n\n").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReportError>(),
            Some(ReportError::EmptyInput)
        ));
    }

    #[test]
    fn nan_and_unterminated_quotes() {
        let table = ResultsTable::parse(
            "hardware task runtime AUC\nA GBM nan 0.5\nB GBM 1.0 \"0.5\nC GBM 2 0.5\n",
        )
        .unwrap();
        assert_eq!(table.records.len(), 1);
        assert_eq!(table.records[0].hardware, "C");
        assert_eq!(table.malformed, 1);
        assert_eq!(table.dropped, 1);
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = ResultsTable::load(Path::new("/nonexistent/results.txt")).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/results.txt"));
    }

    #[test]
    fn format_view_includes_gpu_column() {
        let table = ResultsTable::parse(RESULTS).unwrap();
        let text = table.format_view(&table.for_task("GBM"), "GPU");
        let lines = text.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("hardware"));
        assert!(lines[0].ends_with("gpu"));
        assert!(lines[2].starts_with("GPU-A"));
        assert!(lines[2].ends_with("true"));
        assert!(lines[1].ends_with("false"));
    }

    #[test]
    fn format_view_aligns_non_ascii_labels() {
        let table =
            ResultsTable::parse("hardware task runtime AUC
GPU-Ärger GBM 1 0.5
CPU-A GBM 2 0.5
")
                .unwrap();
        let text = table.format_view(&table.for_task("GBM"), "GPU");
        let offsets = text
            .lines()
            .skip(1)
            .map(|line| {
                let chars = line.chars().collect::<Vec<_>>();
                chars.windows(3).position(|w| w == ['G', 'B', 'M']).unwrap()
            })
            .collect::<Vec<_>>();
        let header_offset = text.lines().next().unwrap().find("task").unwrap();
        assert_eq!(offsets, vec![header_offset, header_offset]);
    }
}
