//! CSV record source and daily table export.
//!
//! An uploaded CSV is just another raw event producer: columns are mapped by
//! header name and every row becomes a `RawEvent`, with missing, empty or
//! undecodable cells left absent for the normalizer to default.

use csv::{ByteRecord, ReaderBuilder, Writer};
use imbalance_core::{DailyRow, RawEvent, RawTimestamp, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Header names of the columns holding each event field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvColumns {
    pub ts_event: String,
    pub side: String,
    pub action: String,
    pub size: String,
    pub price: String,
}

impl Default for CsvColumns {
    fn default() -> Self {
        Self {
            ts_event: "ts_event".to_string(),
            side: "side".to_string(),
            action: "action".to_string(),
            size: "size".to_string(),
            price: "price".to_string(),
        }
    }
}

/// Resolved column positions; `None` when the header lacks the column.
#[derive(Debug, Clone, Copy)]
struct ColumnIndices {
    ts_event: Option<usize>,
    side: Option<usize>,
    action: Option<usize>,
    size: Option<usize>,
    price: Option<usize>,
}

impl ColumnIndices {
    fn resolve(headers: &ByteRecord, columns: &CsvColumns) -> Self {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| String::from_utf8_lossy(h).trim().eq_ignore_ascii_case(name))
        };
        Self {
            ts_event: find(&columns.ts_event),
            side: find(&columns.side),
            action: find(&columns.action),
            size: find(&columns.size),
            price: find(&columns.price),
        }
    }
}

/// Lazy reader of raw events from a headered CSV.
pub struct CsvEventSource<R: Read> {
    reader: csv::Reader<R>,
    indices: ColumnIndices,
    record: ByteRecord,
}

impl CsvEventSource<File> {
    /// Open a CSV file.
    pub fn from_path(path: impl AsRef<Path>, columns: &CsvColumns) -> Result<Self> {
        Self::from_reader(File::open(path)?, columns)
    }
}

impl<R: Read> CsvEventSource<R> {
    /// Read CSV from any reader.
    pub fn from_reader(reader: R, columns: &CsvColumns) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let indices = ColumnIndices::resolve(reader.byte_headers()?, columns);
        Ok(Self {
            reader,
            indices,
            record: ByteRecord::new(),
        })
    }

    /// Whether the header carried a timestamp column at all. Without one
    /// every row will be dropped during normalization.
    pub fn has_timestamp_column(&self) -> bool {
        self.indices.ts_event.is_some()
    }

    /// A mapped cell as text. Cells that are not UTF-8 count as absent.
    fn cell(&self, index: Option<usize>) -> Option<&str> {
        index
            .and_then(|i| self.record.get(i))
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
            .filter(|cell| !cell.is_empty())
    }

    fn number(&self, index: Option<usize>) -> Option<f64> {
        self.cell(index).and_then(|cell| cell.parse::<f64>().ok())
    }

    fn current_event(&self) -> RawEvent {
        RawEvent {
            ts_event: self.cell(self.indices.ts_event).map(RawTimestamp::from),
            side: self.cell(self.indices.side).map(str::to_string),
            action: self.cell(self.indices.action).map(str::to_string),
            size: self.number(self.indices.size),
            price: self.number(self.indices.price),
        }
    }
}

impl<R: Read> Iterator for CsvEventSource<R> {
    type Item = Result<RawEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.reader.read_byte_record(&mut self.record) {
            Ok(true) => Some(Ok(self.current_event())),
            Ok(false) => None,
            Err(e) => Some(Err(e.into())),
        }
    }
}

/// Write daily rows as CSV. Undefined values are left blank.
pub fn write_daily_csv<W: Write>(writer: W, rows: &[DailyRow]) -> Result<()> {
    let mut writer = Writer::from_writer(writer);
    writer.write_record([
        "date",
        "bid_volume",
        "ask_volume",
        "price",
        "imbalance",
        "price_change",
    ])?;

    let opt = |v: Option<f64>| v.map(|x| x.to_string()).unwrap_or_default();
    for row in rows {
        writer.write_record([
            row.date.to_string(),
            row.bid_volume.to_string(),
            row.ask_volume.to_string(),
            opt(row.price),
            opt(row.imbalance),
            opt(row.price_change),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
