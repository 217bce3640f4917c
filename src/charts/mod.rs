//! Charts module - State accident maps

mod basemap;
mod map;

pub use basemap::{base_map_from_config, BaseMap, BlankBaseMap, OutlineBaseMap};
pub use map::{
    fars_map_state, filter_state, sanitize_coordinates, state_codes, BoundingBox,
    CoordinateSentinels, MapError, MapOutcome, StateMap, StateMapRenderer, FARS_SENTINELS,
};
