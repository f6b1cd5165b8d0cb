//! Feature table (CSV) reader and writer
//!
//! The table is the handoff between `analyze` and `train`. Columns are fixed:
//!
//! ```text
//! name,length,num_args,num_returns,num_if,num_for,num_while,max_depth,file[,label]
//! ```
//!
//! Reading picks [`Dataset::Labeled`] when the header has a `label` column
//! and [`Dataset::Unlabeled`] otherwise. Columns are matched by header name,
//! so a hand-edited table with reordered columns still reads correctly.

use crate::error::{Error, Result};
use crate::models::{Dataset, FunctionMetrics, FunctionRecord, LabeledRecord, RiskLabel};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::Path;

/// Column names in written order, without `label`
pub const COLUMNS: [&str; 9] = [
    "name",
    "length",
    "num_args",
    "num_returns",
    "num_if",
    "num_for",
    "num_while",
    "max_depth",
    "file",
];

pub const LABEL_COLUMN: &str = "label";

#[derive(Debug, Serialize)]
struct UnlabeledRow<'a> {
    name: &'a str,
    length: u32,
    num_args: u32,
    num_returns: u32,
    num_if: u32,
    num_for: u32,
    num_while: u32,
    max_depth: u32,
    file: &'a str,
}

#[derive(Debug, Serialize)]
struct LabeledRow<'a> {
    name: &'a str,
    length: u32,
    num_args: u32,
    num_returns: u32,
    num_if: u32,
    num_for: u32,
    num_while: u32,
    max_depth: u32,
    file: &'a str,
    label: u8,
}

#[derive(Debug, Deserialize)]
struct RawRow {
    name: String,
    length: u32,
    num_args: u32,
    num_returns: u32,
    num_if: u32,
    num_for: u32,
    num_while: u32,
    max_depth: u32,
    #[serde(default)]
    file: Option<String>,
    #[serde(default)]
    label: Option<i64>,
}

impl<'a> UnlabeledRow<'a> {
    fn from_record(r: &'a FunctionRecord) -> Self {
        let m = &r.metrics;
        Self {
            name: &r.name,
            length: m.length,
            num_args: m.num_args,
            num_returns: m.num_returns,
            num_if: m.num_if,
            num_for: m.num_for,
            num_while: m.num_while,
            max_depth: m.max_depth,
            file: r.file.as_deref().unwrap_or(""),
        }
    }
}

impl<'a> LabeledRow<'a> {
    fn from_record(r: &'a LabeledRecord) -> Self {
        let m = &r.record.metrics;
        Self {
            name: &r.record.name,
            length: m.length,
            num_args: m.num_args,
            num_returns: m.num_returns,
            num_if: m.num_if,
            num_for: m.num_for,
            num_while: m.num_while,
            max_depth: m.max_depth,
            file: r.record.file.as_deref().unwrap_or(""),
            label: r.label.as_u8(),
        }
    }
}

impl RawRow {
    fn into_record(self) -> FunctionRecord {
        FunctionRecord {
            name: self.name,
            file: self.file.filter(|f| !f.is_empty()),
            metrics: FunctionMetrics {
                length: self.length,
                num_args: self.num_args,
                num_returns: self.num_returns,
                num_if: self.num_if,
                num_for: self.num_for,
                num_while: self.num_while,
                max_depth: self.max_depth,
            },
        }
    }
}

/// Write unlabeled records as produced by the batch aggregator
pub fn write_records<W: Write>(writer: W, records: &[FunctionRecord]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    if records.is_empty() {
        wtr.write_record(COLUMNS)?;
    }
    for record in records {
        wtr.serialize(UnlabeledRow::from_record(record))?;
    }
    wtr.flush().map_err(|e| Error::Csv(e.into()))?;
    Ok(())
}

/// Write labeled training rows
pub fn write_labeled<W: Write>(writer: W, rows: &[LabeledRecord]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    if rows.is_empty() {
        let mut header = COLUMNS.to_vec();
        header.push(LABEL_COLUMN);
        wtr.write_record(header)?;
    }
    for row in rows {
        wtr.serialize(LabeledRow::from_record(row))?;
    }
    wtr.flush().map_err(|e| Error::Csv(e.into()))?;
    Ok(())
}

/// Write unlabeled records to `path`, creating parent directories
pub fn save_records(path: &Path, records: &[FunctionRecord]) -> Result<()> {
    let file = create_with_parents(path)?;
    write_records(file, records)
}

/// Write labeled rows to `path`, creating parent directories
pub fn save_labeled(path: &Path, rows: &[LabeledRecord]) -> Result<()> {
    let file = create_with_parents(path)?;
    write_labeled(file, rows)
}

/// Read a feature table, choosing the record variant from the header
pub fn read<R: Read>(reader: R) -> Result<Dataset> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers = rdr.headers()?.clone();

    for required in COLUMNS.iter().filter(|c| **c != "file") {
        if !headers.iter().any(|h| h == *required) {
            return Err(Error::Schema(format!("missing {required} column")));
        }
    }
    let labeled = headers.iter().any(|h| h == LABEL_COLUMN);

    let mut records = Vec::new();
    let mut labeled_rows = Vec::new();

    for (idx, row) in rdr.deserialize::<RawRow>().enumerate() {
        // Header is line 1
        let line = idx + 2;
        let mut raw = row?;
        if labeled {
            let label = raw
                .label
                .take()
                .ok_or_else(|| Error::Schema(format!("empty label on line {line}")))
                .and_then(|value| {
                    RiskLabel::try_from(value)
                        .map_err(|e| Error::Schema(format!("{e} on line {line}")))
                })?;
            labeled_rows.push(raw.into_record().labeled(label));
        } else {
            records.push(raw.into_record());
        }
    }

    Ok(if labeled {
        Dataset::Labeled(labeled_rows)
    } else {
        Dataset::Unlabeled(records)
    })
}

/// Read a feature table from disk
pub fn load(path: &Path) -> Result<Dataset> {
    let file = std::fs::File::open(path).map_err(|e| Error::io(path, e))?;
    read(std::io::BufReader::new(file))
}

fn create_with_parents(path: &Path) -> Result<std::fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    std::fs::File::create(path).map_err(|e| Error::io(path, e))
}
