//! Base Map Module
//! Geographic outlines drawn underneath the accident points.

use super::map::{BoundingBox, MapError};
use crate::config::MapConfig;
use crate::data::{fars_read, require_columns, LoaderError};
use polars::prelude::*;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

const GROUP_COL: &str = "group";
const LON_COL: &str = "lon";
const LAT_COL: &str = "lat";

/// Supplies the polygons to draw for a map view.
pub trait BaseMap {
    fn name(&self) -> &str;

    /// Closed `(lon, lat)` rings overlapping `view`.
    fn outlines(&self, view: &BoundingBox) -> Vec<Vec<(f64, f64)>>;
}

/// Draws only the frame of the view.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlankBaseMap;

impl BaseMap for BlankBaseMap {
    fn name(&self) -> &str {
        "blank"
    }

    fn outlines(&self, view: &BoundingBox) -> Vec<Vec<(f64, f64)>> {
        vec![view.ring()]
    }
}

/// Polygons read from an outline CSV with `group,lon,lat` columns.
#[derive(Debug, Clone)]
pub struct OutlineBaseMap {
    name: String,
    polygons: Vec<Vec<(f64, f64)>>,
}

impl OutlineBaseMap {
    pub fn new(name: impl Into<String>, polygons: Vec<Vec<(f64, f64)>>) -> Self {
        Self {
            name: name.into(),
            polygons,
        }
    }

    /// Load outlines; rows sharing a `group` form one polygon in file order.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LoaderError> {
        let path = path.as_ref();
        let filename = path.display().to_string();
        let df = fars_read(path)?;
        require_columns(&df, &[GROUP_COL, LON_COL, LAT_COL], &filename)?;

        let groups = df.column(GROUP_COL)?.cast(&DataType::String)?;
        let lons = df.column(LON_COL)?.cast(&DataType::Float64)?;
        let lats = df.column(LAT_COL)?.cast(&DataType::Float64)?;

        let mut index: HashMap<String, usize> = HashMap::new();
        let mut polygons: Vec<Vec<(f64, f64)>> = Vec::new();

        for ((group, lon), lat) in groups
            .str()?
            .into_iter()
            .zip(lons.f64()?.into_iter())
            .zip(lats.f64()?.into_iter())
        {
            let (Some(group), Some(lon), Some(lat)) = (group, lon, lat) else {
                continue;
            };
            let slot = *index.entry(group.to_string()).or_insert_with(|| {
                polygons.push(Vec::new());
                polygons.len() - 1
            });
            polygons[slot].push((lon, lat));
        }

        for ring in polygons.iter_mut() {
            if let (Some(&first), Some(&last)) = (ring.first(), ring.last()) {
                if first != last {
                    ring.push(first);
                }
            }
        }

        debug!(file = %filename, polygons = polygons.len(), "loaded base map outlines");
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| filename.clone());
        Ok(Self::new(name, polygons))
    }

    pub fn polygon_count(&self) -> usize {
        self.polygons.len()
    }
}

impl BaseMap for OutlineBaseMap {
    fn name(&self) -> &str {
        &self.name
    }

    fn outlines(&self, view: &BoundingBox) -> Vec<Vec<(f64, f64)>> {
        self.polygons
            .iter()
            .filter(|ring| {
                BoundingBox::from_points(ring).is_some_and(|extent| extent.intersects(view))
            })
            .cloned()
            .collect()
    }
}

/// Outline file from the config when set, otherwise the blank frame.
pub fn base_map_from_config(config: &MapConfig) -> Result<Box<dyn BaseMap>, MapError> {
    match &config.base_map {
        Some(path) => Ok(Box::new(OutlineBaseMap::load(path)?)),
        None => Ok(Box::new(BlankBaseMap)),
    }
}
