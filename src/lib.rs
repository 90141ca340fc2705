//! Closing-price downloads, daily log returns and efficient-frontier charts.

pub mod config;
pub mod error;
pub mod frontier;
pub mod prices;
pub mod returns;
pub mod stocks;
pub mod visualisation;
