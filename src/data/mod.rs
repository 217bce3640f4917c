//! Data module - FARS file loading and year summaries

mod loader;
mod processor;

pub use loader::{fars_read, make_filename, require_columns, FarsLoader, LoaderError, WholeNumber};
pub use processor::{
    count_by_year_month, fars_read_years, fars_summarize_years, pivot_summary, write_summary_csv,
    SummaryError, YearOutcome, YearlyExtractor,
};
