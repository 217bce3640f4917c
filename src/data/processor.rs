//! Year Summary Processor Module
//! Extracts month/year projections per year and pivots them into a monthly summary.

use super::loader::{fars_read, require_columns, FarsLoader, LoaderError, WholeNumber};
use polars::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

pub const MONTH_COL: &str = "MONTH";
pub const YEAR_COL: &str = "year";
const COUNT_COL: &str = "n";

#[derive(Error, Debug)]
pub enum SummaryError {
    #[error(transparent)]
    Loader(#[from] LoaderError),
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Failed to write summary: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of extracting one requested year.
#[derive(Debug)]
pub enum YearOutcome {
    /// `[MONTH, year]` projection, one row per accident.
    Loaded { year: i64, projection: DataFrame },
    /// The year's file does not exist.
    Invalid { year: i64, error: LoaderError },
}

impl YearOutcome {
    pub fn year(&self) -> i64 {
        match self {
            YearOutcome::Loaded { year, .. } | YearOutcome::Invalid { year, .. } => *year,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, YearOutcome::Loaded { .. })
    }

    pub fn projection(&self) -> Option<&DataFrame> {
        match self {
            YearOutcome::Loaded { projection, .. } => Some(projection),
            YearOutcome::Invalid { .. } => None,
        }
    }

    pub fn into_projection(self) -> Option<DataFrame> {
        match self {
            YearOutcome::Loaded { projection, .. } => Some(projection),
            YearOutcome::Invalid { .. } => None,
        }
    }
}

/// Builds per-year projections and the wide month-by-year summary.
pub struct YearlyExtractor;

impl YearlyExtractor {
    /// Load each year independently, tag it and keep only `[MONTH, year]`.
    ///
    /// Missing files become `YearOutcome::Invalid` with a warning; any other
    /// failure aborts the whole batch.
    pub fn read_years<Y: WholeNumber>(
        loader: &FarsLoader,
        years: &[Y],
    ) -> Result<Vec<YearOutcome>, LoaderError> {
        let mut outcomes = Vec::with_capacity(years.len());

        for &year in years {
            let year = year.whole();
            let path = loader.path_for_year(year);

            let outcome = match fars_read(&path) {
                Ok(df) => {
                    let filename = path.display().to_string();
                    let projection = Self::project_year(df, year, &filename)?;
                    YearOutcome::Loaded { year, projection }
                }
                Err(error) if error.is_missing_file() => {
                    warn!(year, "invalid year: {}", year);
                    YearOutcome::Invalid { year, error }
                }
                Err(error) => return Err(error),
            };
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }

    fn project_year(df: DataFrame, year: i64, filename: &str) -> Result<DataFrame, LoaderError> {
        require_columns(&df, &[MONTH_COL], filename)?;

        let projection = df
            .lazy()
            .with_column(lit(year).alias(YEAR_COL))
            .select([
                col(MONTH_COL).cast(DataType::Int64),
                col(YEAR_COL).cast(DataType::Int64),
            ])
            .collect()?;

        debug!(year, rows = projection.height(), "projected year");
        Ok(projection)
    }

    /// Count accidents per month for each loaded year.
    ///
    /// Output columns: `MONTH`, then one column per year in ascending order.
    /// When no year loads the result has only an empty `MONTH` column.
    pub fn summarize_years<Y: WholeNumber>(
        loader: &FarsLoader,
        years: &[Y],
    ) -> Result<DataFrame, SummaryError> {
        let mut projections = Self::read_years(loader, years)?
            .into_iter()
            .filter_map(YearOutcome::into_projection);

        let Some(mut long) = projections.next() else {
            warn!("no data for any requested year; summary is empty");
            return Ok(empty_summary()?);
        };
        for projection in projections {
            long.vstack_mut(&projection)?;
        }

        let counts = count_by_year_month(&long)?;
        Ok(pivot_summary(&counts)?)
    }
}

fn empty_summary() -> PolarsResult<DataFrame> {
    DataFrame::new(vec![Column::new(MONTH_COL.into(), Vec::<i64>::new())])
}

/// Long-form `[year, MONTH, n]` counts, sorted by year then month.
pub fn count_by_year_month(long: &DataFrame) -> PolarsResult<DataFrame> {
    long.clone()
        .lazy()
        .group_by([col(YEAR_COL), col(MONTH_COL)])
        .agg([len().alias(COUNT_COL)])
        .sort_by_exprs(
            [col(YEAR_COL), col(MONTH_COL)],
            SortMultipleOptions::default(),
        )
        .collect()
}

/// Pivot `[year, MONTH, n]` counts to one row per month and one column per year.
///
/// Absent (month, year) pairs stay null rather than zero. Rows missing a
/// year, month or count are left out with a warning.
pub fn pivot_summary(counts: &DataFrame) -> PolarsResult<DataFrame> {
    let years = counts.column(YEAR_COL)?.cast(&DataType::Int64)?;
    let months = counts.column(MONTH_COL)?.cast(&DataType::Int64)?;
    let totals = counts.column(COUNT_COL)?.cast(&DataType::UInt32)?;

    let mut cells: BTreeMap<(i64, i64), u32> = BTreeMap::new();
    let mut seen_years: BTreeSet<i64> = BTreeSet::new();
    let mut seen_months: BTreeSet<i64> = BTreeSet::new();
    let mut dropped = 0usize;

    for ((year, month), n) in years
        .i64()?
        .into_iter()
        .zip(months.i64()?.into_iter())
        .zip(totals.u32()?.into_iter())
    {
        if let (Some(year), Some(month), Some(n)) = (year, month, n) {
            cells.insert((month, year), n);
            seen_years.insert(year);
            seen_months.insert(month);
        } else {
            dropped += 1;
        }
    }
    if dropped > 0 {
        warn!(dropped, "rows without year or month left out of summary");
    }

    let month_values: Vec<i64> = seen_months.iter().copied().collect();
    let mut columns = vec![Column::new(MONTH_COL.into(), month_values.clone())];
    for year in seen_years {
        let values: Vec<Option<u32>> = month_values
            .iter()
            .map(|&month| cells.get(&(month, year)).copied())
            .collect();
        columns.push(Column::new(year.to_string().into(), values));
    }

    DataFrame::new(columns)
}

/// Write a summary table as CSV with a header row.
pub fn write_summary_csv<P: AsRef<Path>>(
    summary: &mut DataFrame,
    path: P,
) -> Result<(), SummaryError> {
    let mut file = File::create(path.as_ref())?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(summary)?;
    Ok(())
}

/// `YearlyExtractor::read_years` against the current directory.
pub fn fars_read_years<Y: WholeNumber>(years: &[Y]) -> Result<Vec<YearOutcome>, LoaderError> {
    YearlyExtractor::read_years(&FarsLoader::default(), years)
}

/// `YearlyExtractor::summarize_years` against the current directory.
pub fn fars_summarize_years<Y: WholeNumber>(years: &[Y]) -> Result<DataFrame, SummaryError> {
    YearlyExtractor::summarize_years(&FarsLoader::default(), years)
}
