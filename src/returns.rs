//! Daily log returns appended next to the closing prices.
//!
//! Price cells are copied through verbatim. A cell that does not parse as a
//! number (empty, `N/A`, ...) counts as a price of 0.

use csv::{ReaderBuilder, StringRecord, Writer};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, info};

use crate::error::{FrontierError, Result};
use crate::prices::DATE_COLUMN;

pub const RETURN_SUFFIX: &str = "_DailyReturn";

/// `ln(curr / prev)`, or 0 when either price is missing or not positive.
pub fn log_return(prev: f64, curr: f64) -> f64 {
    if prev > 0.0 && curr > 0.0 {
        (curr / prev).ln()
    } else {
        0.0
    }
}

fn lenient_price(cell: &str) -> f64 {
    cell.trim().parse::<f64>().unwrap_or(0.0)
}

/// One row of returns per price row; the first row is all zeros.
///
/// A zero price zeroes both the return into and out of that day.
pub fn daily_log_returns(prices: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let mut prev: Option<&Vec<f64>> = None;
    prices
        .iter()
        .map(|curr| {
            let row = match prev {
                None => vec![0.0; curr.len()],
                Some(p) => p.iter().zip(curr).map(|(&a, &b)| log_return(a, b)).collect(),
            };
            prev = Some(curr);
            row
        })
        .collect()
}

/// Copy a price CSV from `r` to `w`, adding one `<ticker>_DailyReturn`
/// column per ticker. Returns the number of data rows written.
pub fn write_with_returns<R: Read, W: Write>(r: R, w: W) -> Result<usize> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(r);
    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Err(FrontierError::MissingColumn(DATE_COLUMN.to_string()));
    }

    let records = reader.records().collect::<std::result::Result<Vec<StringRecord>, _>>()?;
    let prices: Vec<Vec<f64>> = records
        .iter()
        .map(|rec| rec.iter().skip(1).map(lenient_price).collect())
        .collect();
    let unparsed = records
        .iter()
        .flat_map(|rec| rec.iter().skip(1))
        .filter(|cell| cell.trim().parse::<f64>().is_err())
        .count();
    if unparsed > 0 {
        debug!("{} price cells were empty or not numeric", unparsed);
    }

    let returns = daily_log_returns(&prices);
    let mut writer = Writer::from_writer(w);

    let mut header: Vec<String> = headers.iter().map(str::to_string).collect();
    header.extend(headers.iter().skip(1).map(|t| format!("{}{}", t, RETURN_SUFFIX)));
    writer.write_record(&header)?;

    for (rec, rets) in records.iter().zip(&returns) {
        let mut out: Vec<String> = rec.iter().map(str::to_string).collect();
        out.extend(rets.iter().map(|r| r.to_string()));
        writer.write_record(&out)?;
    }

    writer.flush()?;
    Ok(records.len())
}

/// Read a price CSV from `input` and write it with returns to `output`.
pub fn append_daily_returns(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Result<usize> {
    let input = File::open(input.as_ref())?;
    let output = File::create(output.as_ref())?;
    let rows = write_with_returns(input, output)?;
    info!("computed daily log returns over {} rows", rows);
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRICES: &str = "\
Date,AAPL,TSLA
2020-01-02,100,
2020-01-03,110,20
2020-01-06,99,25
";

    fn returns_of(csv: &str) -> Vec<Vec<f64>> {
        let mut reader = ReaderBuilder::new().from_reader(csv.as_bytes());
        let prices: Vec<Vec<f64>> = reader
            .records()
            .map(|r| r.unwrap().iter().skip(1).map(lenient_price).collect())
            .collect();
        daily_log_returns(&prices)
    }

    #[test]
    fn test_log_return_guards_non_positive_prices() {
        assert_eq!(log_return(0.0, 10.0), 0.0);
        assert_eq!(log_return(10.0, 0.0), 0.0);
        assert_eq!(log_return(-1.0, 10.0), 0.0);
        assert!((log_return(100.0, 110.0) - 0.0953101798).abs() < 1e-9);
    }

    #[test]
    fn test_first_row_is_zero_and_missing_prices_give_zero() {
        let rets = returns_of(PRICES);

        assert_eq!(rets.len(), 3);
        assert_eq!(rets[0], vec![0.0, 0.0]);
        assert!((rets[1][0] - (110.0f64 / 100.0).ln()).abs() < 1e-12);
        // TSLA had no price the day before
        assert_eq!(rets[1][1], 0.0);
        assert!((rets[2][0] - (99.0f64 / 110.0).ln()).abs() < 1e-12);
        assert!((rets[2][1] - (25.0f64 / 20.0).ln()).abs() < 1e-12);
    }

    #[test]
    fn test_non_numeric_cell_counts_as_zero_price() {
        let input = "Date,AAPL\n2020-01-02,100\n2020-01-03,N/A\n2020-01-06,110\n";
        let mut out = Vec::new();
        assert_eq!(write_with_returns(input.as_bytes(), &mut out).unwrap(), 3);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Date,AAPL,AAPL_DailyReturn");
        assert_eq!(lines[1], "2020-01-02,100,0");
        // the original cell text is kept; the zero price zeroes both returns
        assert_eq!(lines[2], "2020-01-03,N/A,0");
        assert_eq!(lines[3], "2020-01-06,110,0");
    }

    #[test]
    fn test_output_layout() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("stocks.csv");
        let output = dir.path().join("stocks_with_DailyReturns.csv");
        std::fs::write(&input, PRICES).unwrap();

        assert_eq!(append_daily_returns(&input, &output).unwrap(), 3);

        let text = std::fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Date,AAPL,TSLA,AAPL_DailyReturn,TSLA_DailyReturn");
        assert_eq!(lines[1], "2020-01-02,100,,0,0");
        assert!(lines[2].starts_with("2020-01-03,110,20,0.09531"));
        assert!(lines[2].ends_with(",0"));
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_missing_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = append_daily_returns(dir.path().join("absent.csv"), dir.path().join("out.csv"));
        assert!(err.is_err());
    }
}
