//! Price data: quotes, resampling, CSV ingest, Parquet cache, synthetic panels.

pub mod cache;
pub mod csv_io;
pub mod provider;
pub mod resample;
pub mod synthetic;

pub use cache::{PanelCache, PanelMeta};
pub use csv_io::{parse_timestamp, read_price_csv, read_price_csv_from, write_price_csv, write_price_csv_file};
pub use provider::{
    CacheProvider, CsvProvider, DataSource, FetchResult, PriceProvider, Quote, SyntheticProvider,
};
pub use resample::{resample_quotes, resample_with_universe, ResampleOutcome};
pub use synthetic::{synthetic_default, synthetic_panel, DEFAULT_UNIVERSE};
