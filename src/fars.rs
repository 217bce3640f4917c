//! Entry point tying the loader, year summaries and state maps to one config.

use crate::charts::{MapError, MapOutcome, StateMapRenderer};
use crate::config::FarsConfig;
use crate::data::{FarsLoader, LoaderError, SummaryError, WholeNumber, YearOutcome, YearlyExtractor};
use polars::prelude::DataFrame;
use std::path::Path;

pub struct Fars {
    config: FarsConfig,
    loader: FarsLoader,
}

impl Default for Fars {
    fn default() -> Self {
        Self::new(FarsConfig::default())
    }
}

impl Fars {
    pub fn new(config: FarsConfig) -> Self {
        let loader = FarsLoader::new(config.data_dir.clone());
        Self { config, loader }
    }

    pub fn config(&self) -> &FarsConfig {
        &self.config
    }

    pub fn loader(&self) -> &FarsLoader {
        &self.loader
    }

    /// Full table for one year.
    pub fn read<Y: WholeNumber>(&self, year: Y) -> Result<DataFrame, LoaderError> {
        self.loader.read_year(year)
    }

    pub fn read_years<Y: WholeNumber>(&self, years: &[Y]) -> Result<Vec<YearOutcome>, LoaderError> {
        YearlyExtractor::read_years(&self.loader, years)
    }

    pub fn summarize_years<Y: WholeNumber>(&self, years: &[Y]) -> Result<DataFrame, SummaryError> {
        YearlyExtractor::summarize_years(&self.loader, years)
    }

    /// Map one state's accidents for `year` into `output`.
    pub fn map_state<S: WholeNumber, Y: WholeNumber>(
        &self,
        state_num: S,
        year: Y,
        output: &Path,
    ) -> Result<MapOutcome, MapError> {
        let renderer = StateMapRenderer::from_config(self.config.map.clone())?;
        renderer.map_state(&self.loader, state_num, year, output)
    }
}
