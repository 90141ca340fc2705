//! Efficient-frontier scatter chart.
//!
//! Every simulated portfolio is drawn at (risk, return) and coloured by its
//! Sharpe ratio; the max-Sharpe portfolio gets its own labelled red marker.

use plotly::common::{ColorBar, ColorScale, ColorScalePalette, Font, Line, Marker, Mode, Position, Title};
use plotly::layout::themes::PLOTLY_WHITE;
use plotly::layout::{Axis, Legend};
use plotly::{Layout, Plot, Scatter};
use std::path::Path;
use tracing::info;

use crate::error::{FrontierError, Result};
use crate::frontier::{max_sharpe, SimulationRow};

pub const CHART_TITLE: &str = "Efficient Frontier - Monte Carlo Simulation";
pub const HIGHLIGHT_NAME: &str = "Max Sharpe Portfolio";

pub struct FrontierPlot {
    plot: Plot,
    best_index: usize,
    best: SimulationRow,
}

/// Label drawn above the highlighted portfolio.
pub fn sharpe_label(sharpe: f64) -> String {
    format!("Sharpe: {:.2}", sharpe)
}

/// Build the chart for `rows`. Fails on an empty table or one with no
/// comparable Sharpe ratio.
pub fn frontier_plot(rows: &[SimulationRow]) -> Result<FrontierPlot> {
    let (best_index, best) = max_sharpe(rows).ok_or(FrontierError::EmptyResults)?;
    let best = *best;
    info!(
        "max Sharpe {:.4} at row {} (risk {:.4}, return {:.4})",
        best.sharpe, best_index, best.risk, best.ret
    );

    let risk: Vec<f64> = rows.iter().map(|r| r.risk).collect();
    let ret: Vec<f64> = rows.iter().map(|r| r.ret).collect();
    let sharpe: Vec<f64> = rows.iter().map(|r| r.sharpe).collect();

    let cloud = Scatter::new(risk, ret)
        .mode(Mode::Markers)
        .name("Portfolios")
        .marker(
            Marker::new()
                .color_array(sharpe)
                .color_scale(ColorScale::Palette(ColorScalePalette::Viridis))
                .show_scale(true)
                .color_bar(ColorBar::new().title(Title::from("Sharpe Ratio")))
                .opacity(0.6),
        )
        .hover_template("Sharpe=%{marker.color}<br>Risk=%{x}<br>Return=%{y}<extra></extra>")
        .show_legend(false);

    let highlight = Scatter::new(vec![best.risk], vec![best.ret])
        .mode(Mode::MarkersText)
        .name(HIGHLIGHT_NAME)
        .marker(
            Marker::new()
                .color("red")
                .size(10)
                .line(Line::new().color("black").width(1.0)),
        )
        .text_array(vec![sharpe_label(best.sharpe)])
        .text_position(Position::TopCenter);

    let mut plot = Plot::new();
    plot.add_trace(cloud);
    plot.add_trace(highlight);
    plot.set_layout(
        Layout::new()
            .title(Title::from(CHART_TITLE).font(Font::new().size(20)))
            .x_axis(Axis::new().title(Title::from("Annualized Risk (Std Dev)")))
            .y_axis(Axis::new().title(Title::from("Annualized Return")))
            .legend(Legend::new().x(0.75).y(0.02))
            .template(&*PLOTLY_WHITE),
    );

    Ok(FrontierPlot { plot, best_index, best })
}

impl FrontierPlot {
    pub fn best(&self) -> &SimulationRow {
        &self.best
    }

    /// Position of the highlighted row in the input table.
    pub fn best_index(&self) -> usize {
        self.best_index
    }

    pub fn to_html(&self) -> String {
        self.plot.to_html()
    }

    #[cfg(test)]
    pub(crate) fn to_json(&self) -> String {
        self.plot.to_json()
    }

    /// Write a self-contained interactive page, replacing any existing file.
    pub fn write_html(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_html())?;
        info!("wrote {}", path.display());
        Ok(())
    }

    /// Open the chart in the default browser.
    pub fn show(&self) {
        self.plot.show();
    }
}
