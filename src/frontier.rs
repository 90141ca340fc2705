//! Monte Carlo result rows and the max-Sharpe lookup.

use csv::ReaderBuilder;
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::info;

use crate::error::{FrontierError, Result};

const REQUIRED_COLUMNS: &[&str] = &["Risk", "Return", "Sharpe"];

/// One simulated portfolio. Extra columns such as weights are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SimulationRow {
    /// Annualized standard deviation.
    #[serde(rename = "Risk")]
    pub risk: f64,
    /// Annualized return.
    #[serde(rename = "Return")]
    pub ret: f64,
    #[serde(rename = "Sharpe")]
    pub sharpe: f64,
}

pub fn load_results(path: impl AsRef<Path>) -> Result<Vec<SimulationRow>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let rows = from_reader(file)?;
    info!("loaded {} simulated portfolios from {}", rows.len(), path.display());
    Ok(rows)
}

pub fn from_reader<R: Read>(r: R) -> Result<Vec<SimulationRow>> {
    let mut reader = ReaderBuilder::new().trim(csv::Trim::All).from_reader(r);

    let headers = reader.headers()?.clone();
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == *column) {
            return Err(FrontierError::MissingColumn(column.to_string()));
        }
    }

    let rows = reader
        .deserialize::<SimulationRow>()
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Index and row of the highest Sharpe ratio.
///
/// Ties resolve to the earliest row. NaN ratios are never selected.
pub fn max_sharpe(rows: &[SimulationRow]) -> Option<(usize, &SimulationRow)> {
    let mut best: Option<(usize, &SimulationRow)> = None;
    for (i, r) in rows.iter().enumerate() {
        if r.sharpe.is_nan() {
            continue;
        }
        match best {
            // only a strictly greater ratio replaces the current best
            Some((_, b)) if r.sharpe <= b.sharpe => {}
            _ => best = Some((i, r)),
        }
    }
    best
}
