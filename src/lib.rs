//! FARS Explorer - traffic fatality data summaries & state accident maps
//!
//! Reads yearly `accident_<year>.csv.bz2` files, counts accidents per month
//! across years, and plots one state's accident locations for a year.

pub mod charts;
pub mod config;
pub mod data;
mod fars;

pub use charts::{fars_map_state, MapError, MapOutcome, StateMap, StateMapRenderer};
pub use config::{ConfigError, FarsConfig, MapConfig};
pub use data::{
    fars_read, fars_read_years, fars_summarize_years, make_filename, FarsLoader, LoaderError,
    SummaryError, YearOutcome,
};
pub use fars::Fars;

#[cfg(test)]
mod testutil;
