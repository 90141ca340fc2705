//! Closing-price table: trading dates as rows, tickers as columns.

use chrono::NaiveDate;
use csv::{ReaderBuilder, Writer};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::debug;

use crate::config::DATE_FORMAT;
use crate::error::{FrontierError, Result};

pub const DATE_COLUMN: &str = "Date";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceTable {
    tickers: Vec<String>,
    // BTreeMap keeps the date index ascending and unique
    rows: BTreeMap<NaiveDate, Vec<Option<f64>>>,
}

impl PriceTable {
    pub fn new(tickers: Vec<String>) -> Self {
        PriceTable { tickers, rows: BTreeMap::new() }
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn dates(&self) -> impl Iterator<Item = &NaiveDate> + '_ {
        self.rows.keys()
    }

    pub fn rows(&self) -> impl Iterator<Item = (&NaiveDate, &[Option<f64>])> + '_ {
        self.rows.iter().map(|(d, cells)| (d, cells.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All values of one ticker in date order, or `None` for an unknown ticker.
    pub fn column(&self, ticker: &str) -> Option<Vec<Option<f64>>> {
        let idx = self.tickers.iter().position(|t| t == ticker)?;
        Some(self.rows.values().map(|cells| cells[idx]).collect())
    }

    fn column_index(&mut self, ticker: &str) -> usize {
        if let Some(idx) = self.tickers.iter().position(|t| t == ticker) {
            return idx;
        }
        self.tickers.push(ticker.to_string());
        for cells in self.rows.values_mut() {
            cells.push(None);
        }
        self.tickers.len() - 1
    }

    /// Merge one ticker's observations into the table.
    ///
    /// Dates not yet in the index become new rows with every other column
    /// missing. If a date appears twice in `series` the later value wins.
    pub fn insert_series(&mut self, ticker: &str, series: &[(NaiveDate, Option<f64>)]) {
        let idx = self.column_index(ticker);
        let width = self.tickers.len();
        for (date, close) in series {
            let cells = self.rows.entry(*date).or_insert_with(|| vec![None; width]);
            cells[idx] = *close;
        }
    }

    /// Replace each missing cell with the closest earlier value in the same column.
    /// Gaps before a column's first observation are left missing.
    pub fn forward_fill(&mut self) {
        let mut last: Vec<Option<f64>> = vec![None; self.tickers.len()];
        let mut filled = 0usize;
        for cells in self.rows.values_mut() {
            for (cell, prev) in cells.iter_mut().zip(last.iter_mut()) {
                match cell {
                    Some(_) => *prev = *cell,
                    None if prev.is_some() => {
                        *cell = *prev;
                        filled += 1;
                    }
                    None => {}
                }
            }
        }
        debug!("forward-filled {} cells", filled);
    }

    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path)?;
        self.to_writer(file)
    }

    /// Header `Date,<ticker>...`; missing cells are written as empty fields.
    pub fn to_writer<W: Write>(&self, w: W) -> Result<()> {
        let mut writer = Writer::from_writer(w);

        let mut header = Vec::with_capacity(self.tickers.len() + 1);
        header.push(DATE_COLUMN.to_string());
        header.extend(self.tickers.iter().cloned());
        writer.write_record(&header)?;

        for (date, cells) in &self.rows {
            let mut record = Vec::with_capacity(cells.len() + 1);
            record.push(date.format(DATE_FORMAT).to_string());
            record.extend(cells.iter().map(|c| c.map(|p| p.to_string()).unwrap_or_default()));
            writer.write_record(&record)?;
        }

        writer.flush()?;
        Ok(())
    }

    pub fn read_csv(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    /// Parse a table written by [`PriceTable::to_writer`]. The first column is
    /// the date index whatever its header says.
    pub fn from_reader<R: Read>(r: R) -> Result<Self> {
        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(r);
        let headers = reader.headers()?.clone();
        if headers.is_empty() {
            return Err(FrontierError::MissingColumn(DATE_COLUMN.to_string()));
        }

        let mut table = PriceTable::new(headers.iter().skip(1).map(|h| h.trim().to_string()).collect());

        for (i, record) in reader.records().enumerate() {
            let record = record?;
            // Line 1 is the header
            let row = i + 2;

            let raw_date = record.get(0).unwrap_or_default();
            let date = NaiveDate::parse_from_str(raw_date.trim(), DATE_FORMAT).map_err(|e| {
                FrontierError::Parse { row, message: format!("bad date '{}': {}", raw_date, e) }
            })?;

            let cells = record
                .iter()
                .skip(1)
                .map(|cell| parse_price(cell).map_err(|message| FrontierError::Parse { row, message }))
                .collect::<Result<Vec<_>>>()?;

            if table.rows.insert(date, cells).is_some() {
                return Err(FrontierError::Parse { row, message: format!("duplicate date {}", raw_date) });
            }
        }

        Ok(table)
    }
}

fn parse_price(cell: &str) -> std::result::Result<Option<f64>, String> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Ok(None);
    }
    cell.parse::<f64>()
        .map(Some)
        .map_err(|e| format!("bad price '{}': {}", cell, e))
}
