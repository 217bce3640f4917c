//! State Accident Map Module
//! Filters one year's accidents to a state, clears unreported coordinates and
//! plots the remaining points on a base map with plotters.

use super::basemap::{base_map_from_config, BaseMap};
use crate::config::MapConfig;
use crate::data::{require_columns, FarsLoader, LoaderError, WholeNumber};
use plotters::coord::Shift;
use plotters::prelude::{
    BitMapBackend, ChartBuilder, Circle, Color, DrawingArea, DrawingAreaErrorKind,
    DrawingBackend, IntoDrawingArea, IntoFont, PathElement, SVGBackend, BLACK, WHITE,
};
use polars::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

pub const STATE_COL: &str = "STATE";
pub const LATITUDE_COL: &str = "LATITUDE";
pub const LONGITUDE_COL: &str = "LONGITUD";

/// Thresholds above which the data provider means "not reported".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateSentinels {
    pub latitude: f64,
    pub longitude: f64,
}

pub const FARS_SENTINELS: CoordinateSentinels = CoordinateSentinels {
    latitude: 90.0,
    longitude: 900.0,
};

#[derive(Error, Debug)]
pub enum MapError {
    #[error(transparent)]
    Loader(#[from] LoaderError),
    #[error("invalid STATE number: {state}")]
    InvalidState {
        state: i64,
        /// State codes present in the year's table, ascending.
        present: Vec<i64>,
    },
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Failed to render map: {0}")]
    Render(String),
    #[error("Failed to prepare map output: {0}")]
    Io(#[from] std::io::Error),
}

/// Whether a system sans-serif font resolves; text is skipped otherwise.
fn fonts_available() -> bool {
    ("sans-serif", 12.0).into_font().layout_box("0").is_ok()
}

fn render_err<E: std::error::Error + Send + Sync>(err: DrawingAreaErrorKind<E>) -> MapError {
    MapError::Render(err.to_string())
}

/// Longitude/latitude extent in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Extent of `(lon, lat)` points, `None` when empty.
    pub fn from_points(points: &[(f64, f64)]) -> Option<Self> {
        let lons: Vec<Option<f64>> = points.iter().map(|&(lon, _)| Some(lon)).collect();
        let lats: Vec<Option<f64>> = points.iter().map(|&(_, lat)| Some(lat)).collect();
        Self::from_columns(&lons, &lats)
    }

    /// Ranges of each column taken independently, skipping nulls.
    pub fn from_columns(lons: &[Option<f64>], lats: &[Option<f64>]) -> Option<Self> {
        let (min_lon, max_lon) = value_range(lons)?;
        let (min_lat, max_lat) = value_range(lats)?;
        Some(Self {
            min_lon,
            max_lon,
            min_lat,
            max_lat,
        })
    }

    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        (self.min_lon..=self.max_lon).contains(&lon) && (self.min_lat..=self.max_lat).contains(&lat)
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_lon <= other.max_lon
            && other.min_lon <= self.max_lon
            && self.min_lat <= other.max_lat
            && other.min_lat <= self.max_lat
    }

    /// Grow each side by `fraction` of its span, never below `min_span` degrees.
    pub fn padded(&self, fraction: f64, min_span: f64) -> Self {
        let pad = |lo: f64, hi: f64| {
            let span = (hi - lo).max(min_span);
            let mid = (lo + hi) / 2.0;
            let half = span * (0.5 + fraction);
            (mid - half, mid + half)
        };
        let (min_lon, max_lon) = pad(self.min_lon, self.max_lon);
        let (min_lat, max_lat) = pad(self.min_lat, self.max_lat);
        Self {
            min_lon,
            max_lon,
            min_lat,
            max_lat,
        }
    }

    /// Closed rectangle, counter-clockwise from the south-west corner.
    pub fn ring(&self) -> Vec<(f64, f64)> {
        vec![
            (self.min_lon, self.min_lat),
            (self.max_lon, self.min_lat),
            (self.max_lon, self.max_lat),
            (self.min_lon, self.max_lat),
            (self.min_lon, self.min_lat),
        ]
    }
}

fn value_range(values: &[Option<f64>]) -> Option<(f64, f64)> {
    values.iter().flatten().fold(None, |acc, &v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

/// What gets drawn for one state and year.
#[derive(Debug, Clone)]
pub struct StateMap {
    pub state: i64,
    pub year: i64,
    /// Accidents in the state, including those without usable coordinates.
    pub accidents: usize,
    pub bounds: BoundingBox,
    /// `(LONGITUD, LATITUDE)` of every accident with both values reported.
    pub points: Vec<(f64, f64)>,
}

#[derive(Debug, Clone)]
pub enum MapOutcome {
    Rendered(StateMap),
    /// The state had no accidents; nothing was drawn.
    NoAccidents { state: i64, year: i64 },
    /// Every accident lacked a usable latitude or longitude; nothing was drawn.
    NoCoordinates { state: i64, year: i64, accidents: usize },
}

impl StateMap {
    /// Build the plot plan from rows already filtered to `state`.
    pub fn from_filtered(state: i64, year: i64, filtered: &DataFrame) -> Result<MapOutcome, MapError> {
        if filtered.height() == 0 {
            info!(state, year, "no accidents to plot");
            return Ok(MapOutcome::NoAccidents { state, year });
        }

        let sanitized = sanitize_coordinates(filtered, FARS_SENTINELS)?;
        let lons: Vec<Option<f64>> = sanitized.column(LONGITUDE_COL)?.f64()?.into_iter().collect();
        let lats: Vec<Option<f64>> = sanitized.column(LATITUDE_COL)?.f64()?.into_iter().collect();

        let Some(bounds) = BoundingBox::from_columns(&lons, &lats) else {
            info!(state, year, "no accidents with reported coordinates to plot");
            return Ok(MapOutcome::NoCoordinates {
                state,
                year,
                accidents: filtered.height(),
            });
        };

        let points = lons
            .iter()
            .zip(lats.iter())
            .filter_map(|(lon, lat)| Some(((*lon)?, (*lat)?)))
            .collect();

        Ok(MapOutcome::Rendered(StateMap {
            state,
            year,
            accidents: filtered.height(),
            bounds,
            points,
        }))
    }
}

/// Distinct state codes in a yearly table, ascending.
pub fn state_codes(df: &DataFrame) -> PolarsResult<Vec<i64>> {
    let states = df.column(STATE_COL)?.cast(&DataType::Int64)?;
    let mut codes: Vec<i64> = states.i64()?.into_iter().flatten().collect();
    codes.sort_unstable();
    codes.dedup();
    Ok(codes)
}

/// Rows whose `STATE` equals `state` as an integer.
pub fn filter_state(df: &DataFrame, state: i64) -> PolarsResult<DataFrame> {
    df.clone()
        .lazy()
        .filter(col(STATE_COL).cast(DataType::Int64).eq(lit(state)))
        .collect()
}

/// Copy of `df` with sentinel coordinates replaced by null and both
/// coordinate columns as Float64.
pub fn sanitize_coordinates(
    df: &DataFrame,
    sentinels: CoordinateSentinels,
) -> PolarsResult<DataFrame> {
    let mut out = df.clone();
    for (name, limit) in [
        (LONGITUDE_COL, sentinels.longitude),
        (LATITUDE_COL, sentinels.latitude),
    ] {
        let values = df.column(name)?.cast(&DataType::Float64)?;
        let cleaned: Float64Chunked = values
            .f64()?
            .into_iter()
            .map(|v| v.filter(|&x| x <= limit))
            .collect();
        out.with_column(cleaned.with_name(name.into()).into_series())?;
    }
    Ok(out)
}

/// Draws state maps with a configured base map.
pub struct StateMapRenderer {
    config: MapConfig,
    base_map: Box<dyn BaseMap>,
}

impl StateMapRenderer {
    pub fn new(config: MapConfig, base_map: Box<dyn BaseMap>) -> Self {
        Self { config, base_map }
    }

    /// Renderer whose base map comes from `config.base_map`.
    pub fn from_config(config: MapConfig) -> Result<Self, MapError> {
        let base_map = base_map_from_config(&config)?;
        Ok(Self::new(config, base_map))
    }

    pub fn base_map(&self) -> &dyn BaseMap {
        self.base_map.as_ref()
    }

    /// Load `year`, validate and filter `state_num`, and work out what to draw.
    ///
    /// A missing year file is fatal here.
    pub fn plan<S: WholeNumber, Y: WholeNumber>(
        loader: &FarsLoader,
        state_num: S,
        year: Y,
    ) -> Result<MapOutcome, MapError> {
        let year = year.whole();
        let df = loader.read_year(year)?;
        let filename = loader.path_for_year(year).display().to_string();
        require_columns(&df, &[STATE_COL, LATITUDE_COL, LONGITUDE_COL], &filename)?;

        let state = state_num.whole();
        let present = state_codes(&df)?;
        if !present.contains(&state) {
            return Err(MapError::InvalidState { state, present });
        }

        let filtered = filter_state(&df, state)?;
        StateMap::from_filtered(state, year, &filtered)
    }

    /// Plan and, when there is something to plot, render to `output`.
    pub fn map_state<S: WholeNumber, Y: WholeNumber>(
        &self,
        loader: &FarsLoader,
        state_num: S,
        year: Y,
        output: &Path,
    ) -> Result<MapOutcome, MapError> {
        let outcome = Self::plan(loader, state_num, year)?;
        if let MapOutcome::Rendered(map) = &outcome {
            self.render(map, output)?;
        }
        Ok(outcome)
    }

    /// Write the map image; `.svg` paths get SVG, anything else a bitmap.
    pub fn render(&self, map: &StateMap, output: &Path) -> Result<(), MapError> {
        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let size = (self.config.width, self.config.height);
        let is_svg = output
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("svg"));

        if is_svg {
            self.draw(SVGBackend::new(output, size).into_drawing_area(), map)?;
        } else {
            self.draw(BitMapBackend::new(output, size).into_drawing_area(), map)?;
        }

        info!(
            state = map.state,
            year = map.year,
            points = map.points.len(),
            base_map = self.base_map.name(),
            output = %output.display(),
            "rendered state map"
        );
        Ok(())
    }

    fn draw<DB: DrawingBackend>(
        &self,
        root: DrawingArea<DB, Shift>,
        map: &StateMap,
    ) -> Result<(), MapError> {
        root.fill(&WHITE).map_err(render_err)?;

        let labelled = fonts_available();
        if !labelled {
            warn!("no sans-serif font found; drawing map without labels");
        }

        let view = map.bounds.padded(0.05, 0.5);
        let mut builder = ChartBuilder::on(&root);
        builder.margin(10);
        if labelled {
            builder
                .caption(
                    format!("State {} accidents, {}", map.state, map.year),
                    ("sans-serif", 20),
                )
                .x_label_area_size(30)
                .y_label_area_size(40);
        }
        let mut chart = builder
            .build_cartesian_2d(view.min_lon..view.max_lon, view.min_lat..view.max_lat)
            .map_err(render_err)?;

        let mut mesh = chart.configure_mesh();
        if labelled {
            mesh.x_desc("Longitude").y_desc("Latitude");
        } else {
            mesh.x_labels(0).y_labels(0);
        }
        mesh.draw().map_err(render_err)?;

        chart
            .draw_series(
                self.base_map
                    .outlines(&view)
                    .into_iter()
                    .map(|ring| PathElement::new(ring, BLACK.mix(0.5).stroke_width(1))),
            )
            .map_err(render_err)?;

        let radius = self.config.point_radius;
        chart
            .draw_series(
                map.points
                    .iter()
                    .map(|&(lon, lat)| Circle::new((lon, lat), radius, BLACK.filled())),
            )
            .map_err(render_err)?;

        root.present().map_err(render_err)?;
        Ok(())
    }
}

/// Map `state_num` for `year` from the current directory into
/// `state_<state>_<year>.png`.
pub fn fars_map_state<S: WholeNumber, Y: WholeNumber>(
    state_num: S,
    year: Y,
) -> Result<MapOutcome, MapError> {
    let renderer = StateMapRenderer::from_config(MapConfig::default())?;
    let output = PathBuf::from(format!("state_{}_{}.png", state_num.whole(), year.whole()));
    renderer.map_state(&FarsLoader::default(), state_num, year, &output)
}
