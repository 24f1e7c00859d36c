//! Domain types: panels, the validated price table, strategy parameters.

pub mod config;
pub mod panel;
pub mod price_table;

pub use config::{periods_per_year, StrategyConfig, HOURS_PER_YEAR};
pub use panel::{Panel, PositionPanel, RankPanel, ReturnPanel, ReturnSeries};
pub use price_table::PriceTable;
